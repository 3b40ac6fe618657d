use crate::{
    dalg_objects::{
        data_petri_net::DataPetriNet,
        variable::{Value, VariableIndex, VariableType, parse_boolean},
    },
    math::interval::{Interval, RelationalOperator},
};

use super::guard_parser::{Token, strip_whitespace, tokenize};

fn guard_tokens(guard: &str) -> Vec<Token> {
    let stripped = strip_whitespace(&guard.replace('\n', ""));
    tokenize(guard, &stripped).unwrap_or_default()
}

fn is_unary_position(tokens: &[Token], index: usize) -> bool {
    index == 0
        || match tokens[index - 1] {
            Token::Operator(_) | Token::Open => true,
            _ => false,
        }
}

/**
 * The literal that ends at `index`, reading leftwards.
 */
fn literal_ending_at(tokens: &[Token], index: usize) -> Option<String> {
    let literal = literal_text(&tokens[index])?;
    if let Token::Number(_) = tokens[index] {
        if index >= 1
            && tokens[index - 1] == Token::Operator("-")
            && is_unary_position(tokens, index - 1)
        {
            return Some(format!("-{}", literal));
        }
    }
    Some(literal)
}

/**
 * The literal that starts at `index`, reading rightwards.
 */
fn literal_starting_at(tokens: &[Token], index: usize) -> Option<String> {
    match tokens.get(index)? {
        Token::Operator("-") => match tokens.get(index + 1)? {
            Token::Number(number) => Some(format!("-{}", number)),
            _ => None,
        },
        token => literal_text(token),
    }
}

fn literal_text(token: &Token) -> Option<String> {
    match token {
        Token::Number(number) => Some(number.clone()),
        Token::Text(text) => Some(text.clone()),
        Token::Identifier(name) => parse_boolean(name).map(|boolean| boolean.to_string()),
        _ => None,
    }
}

/**
 * Returns the literals that the guard compares to the variable with `==`, on either side.
 */
pub fn values_for(guard: &str, variable: &str) -> Vec<String> {
    let tokens = guard_tokens(guard);
    let mut result = vec![];
    for (index, token) in tokens.iter().enumerate() {
        if *token != Token::Identifier(variable.to_string()) {
            continue;
        }
        let left = if index >= 2 && tokens[index - 1] == Token::Operator("==") {
            literal_ending_at(&tokens, index - 2)
        } else {
            None
        };
        let found = left.or_else(|| {
            if tokens.get(index + 1) == Some(&Token::Operator("==")) {
                literal_starting_at(&tokens, index + 2)
            } else {
                None
            }
        });
        if let Some(value) = found {
            result.push(value);
        }
    }
    result
}

fn relational(token: &Token) -> Option<RelationalOperator> {
    match token {
        Token::Operator("<") => Some(RelationalOperator::Smaller),
        Token::Operator("<=") => Some(RelationalOperator::SmallerEqual),
        Token::Operator(">") => Some(RelationalOperator::Larger),
        Token::Operator(">=") => Some(RelationalOperator::LargerEqual),
        _ => None,
    }
}

fn boundary(text: &str, variable_type: VariableType) -> Option<f64> {
    Value::parse(text, variable_type).ok()?.as_f64()
}

/**
 * Returns the relational bounds that the guard places directly on the variable. A bound written
 * with the variable on the right-hand side is turned around.
 */
pub fn intervals_for(guard: &str, variable: &str, variable_type: VariableType) -> Vec<Interval> {
    if !variable_type.is_numeric() {
        return vec![];
    }
    let tokens = guard_tokens(guard);
    let mut result = vec![];
    for (index, token) in tokens.iter().enumerate() {
        if *token != Token::Identifier(variable.to_string()) {
            continue;
        }
        let left = if index >= 2 {
            relational(&tokens[index - 1]).and_then(|operator| {
                let value = literal_ending_at(&tokens, index - 2)?;
                Some(Interval::bound(
                    operator.mirror(),
                    boundary(&value, variable_type)?,
                ))
            })
        } else {
            None
        };
        let found = left.or_else(|| {
            let operator = relational(tokens.get(index + 1)?)?;
            let value = literal_starting_at(&tokens, index + 2)?;
            Some(Interval::bound(operator, boundary(&value, variable_type)?))
        });
        if let Some(interval) = found {
            if !result.contains(&interval) {
                result.push(interval);
            }
        }
    }
    result
}

/// Derives candidate values and intervals of variables from the guards of a net.
pub trait ModelAnalyser {
    /**
     * The values that guards compare the variable to, parsed according to its type.
     */
    fn guard_values(&self, variable: VariableIndex) -> Vec<Value>;

    /**
     * The distinct relational bounds that guards place on the variable.
     */
    fn guard_intervals(&self, variable: VariableIndex) -> Vec<Interval>;

    /**
     * Adds the guard values of every variable to its semantic information, and replaces the
     * intervals of every numeric variable with its guard intervals.
     */
    fn analyse(&mut self);
}

impl ModelAnalyser for DataPetriNet {
    fn guard_values(&self, variable: VariableIndex) -> Vec<Value> {
        let (name, variable_type) = match self.variables.get_index(variable) {
            Some((name, variable)) => (name, variable.variable_type),
            None => return vec![],
        };
        let mut result: Vec<Value> = vec![];
        for guard in self.get_guard_texts() {
            for text in values_for(guard, name) {
                match Value::parse(&text, variable_type) {
                    Ok(value) => {
                        if !result.contains(&value) {
                            result.push(value);
                        }
                    }
                    Err(err) => log::warn!(
                        "value `{}` of variable `{}` in guard `{}` is ignored: {}",
                        text,
                        name,
                        guard,
                        err
                    ),
                }
            }
        }
        result
    }

    fn guard_intervals(&self, variable: VariableIndex) -> Vec<Interval> {
        let (name, variable_type) = match self.variables.get_index(variable) {
            Some((name, variable)) => (name, variable.variable_type),
            None => return vec![],
        };
        let mut result = vec![];
        for guard in self.get_guard_texts() {
            for interval in intervals_for(guard, name, variable_type) {
                if !result.contains(&interval) {
                    result.push(interval);
                }
            }
        }
        result
    }

    fn analyse(&mut self) {
        for variable in 0..self.variables.len() {
            let values = self.guard_values(variable);
            let intervals = self.guard_intervals(variable);
            if let Some((_, variable)) = self.variables.get_index_mut(variable) {
                let info = &mut variable.semantic_information;
                let with_weights = info.has_weights();
                for value in values {
                    info.values.push(value);
                    if with_weights {
                        info.weights.push(1.0);
                    }
                }
                info.remove_value_duplicates();
                if variable.variable_type.is_numeric() {
                    info.intervals = intervals;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        dalg_objects::variable::VariableType,
        math::interval::{Interval, RelationalOperator},
    };

    use super::{intervals_for, values_for};

    #[test]
    fn values_on_both_sides() {
        assert_eq!(
            values_for("cancer_type == 'Lymphoma' || 'Leukemia' == cancer_type", "cancer_type"),
            vec!["Lymphoma".to_string(), "Leukemia".to_string()]
        );
        assert_eq!(
            values_for("x == -5 && y == 3 && TRUE == z", "x"),
            vec!["-5".to_string()]
        );
        assert_eq!(values_for("TRUE == z", "z"), vec!["true".to_string()]);
        assert!(values_for("x == y", "x").is_empty());
        assert!(values_for("x > 3", "x").is_empty());
    }

    #[test]
    fn intervals_on_both_sides() {
        assert_eq!(
            intervals_for("amount < 10 && 2 <= amount", "amount", VariableType::Integer),
            vec![
                Interval::bound(RelationalOperator::Smaller, 10.0),
                Interval::bound(RelationalOperator::LargerEqual, 2.0)
            ]
        );
        assert_eq!(
            intervals_for(
                "due > '2000-01-02T00:00:00'",
                "due",
                VariableType::Date
            ),
            vec![Interval::bound(RelationalOperator::Larger, 946771200.0)]
        );
        assert!(intervals_for("name < 3", "name", VariableType::String).is_empty());
    }
}
