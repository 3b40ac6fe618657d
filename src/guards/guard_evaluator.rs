use crate::dalg_objects::variable::{Value, VariableState};

use super::guard::{ArithmeticOperator, Expression, Guard, GuardError};

/// The result of evaluating an expression. A value computed from a variable that has not been
/// written yet stays unresolved; it carries the placeholder of the variable's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Resolved(Value),
    Unresolved(Value),
}

impl Evaluated {
    pub fn get_value(&self) -> &Value {
        match self {
            Evaluated::Resolved(value) | Evaluated::Unresolved(value) => value,
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Evaluated::Resolved(_) => true,
            Evaluated::Unresolved(_) => false,
        }
    }

    pub fn holds(&self) -> bool {
        match self {
            Evaluated::Resolved(value) => value.truthy(),
            Evaluated::Unresolved(_) => false,
        }
    }

    fn boolean(value: bool) -> Self {
        Evaluated::Resolved(Value::Boolean(value))
    }
}

impl Expression {
    pub fn evaluate(&self, state: &VariableState) -> Evaluated {
        match self {
            Expression::Literal(value) => Evaluated::Resolved(value.clone()),
            Expression::Variable {
                index,
                variable_type,
            } => match state.get(*index) {
                Some(value) => Evaluated::Resolved(value.clone()),
                None => Evaluated::Unresolved(variable_type.sentinel()),
            },
            Expression::Negate(inner) => {
                let inner = inner.evaluate(state);
                let negated = match inner.get_value() {
                    Value::Integer(x) | Value::Date(x) => match x.checked_neg() {
                        Some(y) => Value::Integer(y),
                        None => Value::Double(-(*x as f64)),
                    },
                    Value::Double(x) => Value::Double(-x),
                    Value::String(_) | Value::Boolean(_) => return Evaluated::boolean(false),
                };
                if inner.is_resolved() {
                    Evaluated::Resolved(negated)
                } else {
                    Evaluated::Unresolved(negated)
                }
            }
            Expression::Or(parts) => {
                Evaluated::boolean(parts.iter().any(|part| part.evaluate(state).holds()))
            }
            Expression::And(parts) => {
                Evaluated::boolean(parts.iter().all(|part| part.evaluate(state).holds()))
            }
            Expression::Equal(parts) => {
                let values: Vec<Evaluated> = parts.iter().map(|part| part.evaluate(state)).collect();
                if values.iter().any(|value| !value.is_resolved()) {
                    return Evaluated::boolean(false);
                }
                Evaluated::boolean(
                    values[1..]
                        .iter()
                        .all(|value| value.get_value() == values[0].get_value()),
                )
            }
            Expression::NotEqual(parts) => {
                let values: Vec<Evaluated> = parts.iter().map(|part| part.evaluate(state)).collect();
                if values.iter().any(|value| !value.is_resolved()) {
                    return Evaluated::boolean(true);
                }
                Evaluated::boolean(
                    values[1..]
                        .iter()
                        .all(|value| value.get_value() != values[0].get_value()),
                )
            }
            Expression::Compare(operator, left, right) => {
                let left = left.evaluate(state);
                let right = right.evaluate(state);
                if !left.is_resolved() || !right.is_resolved() {
                    return Evaluated::boolean(false);
                }
                match (left.get_value().as_f64(), right.get_value().as_f64()) {
                    (Some(a), Some(b)) => Evaluated::boolean(operator.apply(a, b)),
                    _ => Evaluated::boolean(false),
                }
            }
            Expression::Arithmetic(operator, parts) => {
                let mut resolved = true;
                let mut result: Option<Value> = None;
                for part in parts {
                    let evaluated = part.evaluate(state);
                    resolved &= evaluated.is_resolved();
                    let value = evaluated.get_value();
                    if !value.is_numeric() {
                        return Evaluated::boolean(false);
                    }
                    result = Some(match result {
                        None => value.clone(),
                        Some(accumulator) => match apply(*operator, &accumulator, value) {
                            Some(next) => next,
                            None => return Evaluated::boolean(false),
                        },
                    });
                }
                match result {
                    Some(value) if resolved => Evaluated::Resolved(value),
                    Some(value) => Evaluated::Unresolved(value),
                    None => Evaluated::boolean(false),
                }
            }
        }
    }
}

/**
 * Applies an arithmetic operator to two numeric values. Integers stay integers, except for
 * division and on overflow. Returns None for an integer division by zero.
 */
fn apply(operator: ArithmeticOperator, a: &Value, b: &Value) -> Option<Value> {
    let integers = match (a, b) {
        (Value::Integer(x) | Value::Date(x), Value::Integer(y) | Value::Date(y)) => Some((*x, *y)),
        _ => None,
    };
    if let Some((x, y)) = integers {
        let checked = match operator {
            ArithmeticOperator::Add => x.checked_add(y),
            ArithmeticOperator::Subtract => x.checked_sub(y),
            ArithmeticOperator::Multiply => x.checked_mul(y),
            ArithmeticOperator::Divide => {
                if y == 0 {
                    return None;
                }
                return Some(Value::Double(x as f64 / y as f64));
            }
        };
        if let Some(result) = checked {
            return Some(Value::Integer(result));
        }
    }
    let x = a.as_f64()?;
    let y = b.as_f64()?;
    Some(Value::Double(match operator {
        ArithmeticOperator::Add => x + y,
        ArithmeticOperator::Subtract => x - y,
        ArithmeticOperator::Multiply => x * y,
        ArithmeticOperator::Divide => x / y,
    }))
}

impl Guard {
    /**
     * Decides whether the guard holds for the given variable values.
     */
    pub fn evaluate(&self, state: &VariableState) -> Result<bool, GuardError> {
        let expression = match &self.expression {
            None => return Ok(true),
            Some(expression) => expression,
        };
        if let Some(missing) = self.variables.iter().find(|index| **index >= state.len()) {
            return Err(GuardError::UnknownVariable {
                guard: self.text.clone(),
                variable: format!("#{}", missing),
            });
        }
        Ok(expression.evaluate(state).holds())
    }
}
