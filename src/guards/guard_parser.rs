use crate::{
    dalg_objects::variable::{Value, VariableTable, lookup_variable, parse_boolean, parse_date},
    math::interval::RelationalOperator,
};

use super::guard::{ArithmeticOperator, Expression, Guard, GuardError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(String),
    Text(String),
    Identifier(String),
    Operator(&'static str),
    Open,
    Close,
}

impl Token {
    pub(crate) fn is_operand(&self) -> bool {
        match self {
            Token::Number(_) | Token::Text(_) | Token::Identifier(_) => true,
            _ => false,
        }
    }
}

const OPERATORS: [&str; 12] = [
    "||", "&&", "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/",
];

/**
 * Removes all whitespace that is not inside quotes.
 */
pub(crate) fn strip_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                result.push(c);
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                    result.push(c);
                } else if !c.is_whitespace() {
                    result.push(c);
                }
            }
        }
    }
    result
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == ':' || c == '\''
}

pub(crate) fn tokenize(guard: &str, stripped: &str) -> Result<Vec<Token>, GuardError> {
    let chars: Vec<char> = stripped.chars().collect();
    let mut tokens = vec![];
    let mut i = 0;
    'chars: while i < chars.len() {
        let c = chars[i];
        if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i += 1;
        } else if c == '"' || c == '\'' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end] != c {
                end += 1;
            }
            if end >= chars.len() {
                return Err(GuardError::malformed(guard, "unterminated quote"));
            }
            tokens.push(Token::Text(chars[start..end].iter().collect()));
            i = end + 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else if is_identifier_start(c) {
            let start = i;
            while i < chars.len() && is_identifier_part(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Identifier(chars[start..i].iter().collect()));
        } else {
            for operator in OPERATORS {
                let length = operator.len();
                if i + length <= chars.len()
                    && chars[i..i + length].iter().copied().eq(operator.chars())
                {
                    tokens.push(Token::Operator(operator));
                    i += length;
                    continue 'chars;
                }
            }
            return Err(GuardError::malformed(
                guard,
                format!("unexpected character `{}`", c),
            ));
        }
    }
    Ok(tokens)
}

fn check_balance(guard: &str, tokens: &[Token]) -> Result<(), GuardError> {
    let mut depth: i64 = 0;
    for token in tokens {
        match token {
            Token::Open => depth += 1,
            Token::Close => {
                depth -= 1;
                if depth < 0 {
                    return Err(GuardError::Unbalanced {
                        guard: guard.to_string(),
                    });
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(GuardError::Unbalanced {
            guard: guard.to_string(),
        });
    }
    Ok(())
}

struct Parser<'a> {
    guard: &'a str,
    tokens: Vec<Token>,
    position: usize,
    variables: &'a VariableTable,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_operator(&self) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Operator(operator)) => Some(operator),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn malformed(&self, reason: impl Into<String>) -> GuardError {
        GuardError::malformed(self.guard, reason)
    }

    fn parse_or(&mut self) -> Result<Expression, GuardError> {
        let mut parts = vec![self.parse_and()?];
        while self.peek_operator() == Some("||") {
            self.position += 1;
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expression::Or(parts)
        })
    }

    fn parse_and(&mut self) -> Result<Expression, GuardError> {
        let mut parts = vec![self.parse_equality()?];
        while self.peek_operator() == Some("&&") {
            self.position += 1;
            parts.push(self.parse_equality()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expression::And(parts)
        })
    }

    fn parse_equality(&mut self) -> Result<Expression, GuardError> {
        let mut parts = vec![self.parse_relational()?];
        let mut chain: Option<&'static str> = None;
        while let Some(operator @ ("==" | "!=")) = self.peek_operator() {
            if chain.is_some_and(|previous| previous != operator) {
                return Err(self.malformed("`==` and `!=` mixed without parentheses"));
            }
            chain = Some(operator);
            self.position += 1;
            parts.push(self.parse_relational()?);
        }
        Ok(match chain {
            None => parts.remove(0),
            Some("==") => Expression::Equal(parts),
            Some(_) => Expression::NotEqual(parts),
        })
    }

    fn relational_operator(&self) -> Option<RelationalOperator> {
        match self.peek_operator()? {
            "<" => Some(RelationalOperator::Smaller),
            "<=" => Some(RelationalOperator::SmallerEqual),
            ">" => Some(RelationalOperator::Larger),
            ">=" => Some(RelationalOperator::LargerEqual),
            _ => None,
        }
    }

    fn parse_relational(&mut self) -> Result<Expression, GuardError> {
        let left = self.parse_additive()?;
        if let Some(operator) = self.relational_operator() {
            self.position += 1;
            let right = self.parse_additive()?;
            if self.relational_operator().is_some() {
                return Err(self.malformed("chained relational comparison"));
            }
            return Ok(Expression::Compare(
                operator,
                Box::new(left),
                Box::new(right),
            ));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, GuardError> {
        let mut result = self.parse_multiplicative()?;
        loop {
            let operator = match self.peek_operator() {
                Some("+") => ArithmeticOperator::Add,
                Some("-") => ArithmeticOperator::Subtract,
                _ => return Ok(result),
            };
            self.position += 1;
            let right = self.parse_multiplicative()?;
            result = fold_left(result, operator, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, GuardError> {
        let mut result = self.parse_unary()?;
        loop {
            let operator = match self.peek_operator() {
                Some("*") => ArithmeticOperator::Multiply,
                Some("/") => ArithmeticOperator::Divide,
                _ => return Ok(result),
            };
            self.position += 1;
            let right = self.parse_unary()?;
            result = fold_left(result, operator, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, GuardError> {
        if self.peek_operator() == Some("-") {
            self.position += 1;
            //a minus in operand position belongs to the literal that follows it
            if let Some(Token::Number(number)) = self.peek().cloned() {
                self.position += 1;
                return self.number(&format!("-{}", number));
            }
            let inner = self.parse_unary()?;
            return Ok(Expression::Negate(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, GuardError> {
        let result = match self.next() {
            Some(Token::Open) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => inner,
                    _ => {
                        return Err(GuardError::Unbalanced {
                            guard: self.guard.to_string(),
                        });
                    }
                }
            }
            Some(Token::Number(number)) => self.number(&number)?,
            Some(Token::Text(text)) => match parse_date(&text) {
                Some(date) => Expression::Literal(Value::Date(date)),
                None => Expression::Literal(Value::String(text)),
            },
            Some(Token::Identifier(name)) => {
                if let Some(boolean) = parse_boolean(&name) {
                    Expression::Literal(Value::Boolean(boolean))
                } else if let Some((index, variable)) = lookup_variable(self.variables, &name) {
                    Expression::Variable {
                        index,
                        variable_type: variable.variable_type,
                    }
                } else {
                    return Err(GuardError::UnknownVariable {
                        guard: self.guard.to_string(),
                        variable: name,
                    });
                }
            }
            Some(Token::Operator(operator)) => {
                return Err(self.malformed(format!("operand expected, found `{}`", operator)));
            }
            Some(Token::Close) => return Err(self.malformed("empty operand before `)`")),
            None => return Err(self.malformed("operand expected at the end")),
        };

        if self.peek().is_some_and(|token| token.is_operand() || *token == Token::Open) {
            return Err(self.malformed("two adjacent operands"));
        }
        Ok(result)
    }

    fn number(&self, text: &str) -> Result<Expression, GuardError> {
        if let Ok(value) = text.parse::<i64>() {
            Ok(Expression::Literal(Value::Integer(value)))
        } else if let Ok(value) = text.parse::<f64>() {
            Ok(Expression::Literal(Value::Double(value)))
        } else {
            Err(self.malformed(format!("`{}` is not a number", text)))
        }
    }
}

fn fold_left(left: Expression, operator: ArithmeticOperator, right: Expression) -> Expression {
    match left {
        Expression::Arithmetic(left_operator, mut parts) if left_operator == operator => {
            parts.push(right);
            Expression::Arithmetic(operator, parts)
        }
        left => Expression::Arithmetic(operator, vec![left, right]),
    }
}

impl Guard {
    /**
     * Compiles guard text against the variables of a net.
     */
    pub fn compile(text: &str, variables: &VariableTable) -> Result<Self, GuardError> {
        let stripped = strip_whitespace(&text.replace('\n', ""));
        if stripped.is_empty() {
            return Ok(Guard::from_expression(text, None));
        }

        let tokens = tokenize(text, &stripped)?;
        check_balance(text, &tokens)?;

        let mut parser = Parser {
            guard: text,
            tokens,
            position: 0,
            variables,
        };
        let expression = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.malformed(format!("unexpected {:?}", token)));
        }
        Ok(Guard::from_expression(text, Some(expression)))
    }
}
