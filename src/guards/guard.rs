use serde::{Serialize, Serializer};
use std::fmt::{self, Display};
use strum_macros::{Display as StrumDisplay, EnumString};
use thiserror::Error;

use crate::{
    dalg_objects::variable::{Value, VariableIndex, VariableType},
    math::interval::RelationalOperator,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("malformed guard `{guard}`: {reason}")]
    Malformed { guard: String, reason: String },

    #[error("guard `{guard}` refers to unknown variable `{variable}`")]
    UnknownVariable { guard: String, variable: String },

    #[error("unbalanced parentheses in guard `{guard}`")]
    Unbalanced { guard: String },
}

impl GuardError {
    pub fn malformed(guard: &str, reason: impl Into<String>) -> Self {
        GuardError::Malformed {
            guard: guard.to_string(),
            reason: reason.into(),
        }
    }

    pub fn get_guard(&self) -> &str {
        match self {
            GuardError::Malformed { guard, .. }
            | GuardError::UnknownVariable { guard, .. }
            | GuardError::Unbalanced { guard } => guard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum ArithmeticOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Variable {
        index: VariableIndex,
        variable_type: VariableType,
    },
    Negate(Box<Expression>),
    Or(Vec<Expression>),
    And(Vec<Expression>),
    Equal(Vec<Expression>),
    NotEqual(Vec<Expression>),
    Compare(RelationalOperator, Box<Expression>, Box<Expression>),
    /// folds left over the operands
    Arithmetic(ArithmeticOperator, Vec<Expression>),
}

impl Expression {
    pub fn collect_variables(&self, result: &mut Vec<VariableIndex>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Variable { index, .. } => {
                if !result.contains(index) {
                    result.push(*index);
                }
            }
            Expression::Negate(inner) => inner.collect_variables(result),
            Expression::Or(parts)
            | Expression::And(parts)
            | Expression::Equal(parts)
            | Expression::NotEqual(parts)
            | Expression::Arithmetic(_, parts) => {
                parts.iter().for_each(|part| part.collect_variables(result))
            }
            Expression::Compare(_, left, right) => {
                left.collect_variables(result);
                right.collect_variables(result);
            }
        }
    }
}

/// A guard compiled against the variables of a net. The empty guard always holds.
#[derive(Debug, Clone)]
pub struct Guard {
    pub(crate) text: String,
    pub(crate) expression: Option<Expression>,
    pub(crate) variables: Vec<VariableIndex>,
}

impl Guard {
    pub fn always() -> Self {
        Self {
            text: String::new(),
            expression: None,
            variables: vec![],
        }
    }

    pub(crate) fn from_expression(text: &str, expression: Option<Expression>) -> Self {
        let mut variables = vec![];
        if let Some(expression) = &expression {
            expression.collect_variables(&mut variables);
        }
        Self {
            text: text.to_string(),
            expression,
            variables,
        }
    }

    pub fn get_text(&self) -> &str {
        &self.text
    }

    pub fn get_expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    pub fn is_trivial(&self) -> bool {
        self.expression.is_none()
    }

    /**
     * The variables the guard reads, in order of first occurrence.
     */
    pub fn get_read_variables(&self) -> &[VariableIndex] {
        &self.variables
    }
}

impl Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Serialize for Guard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}
