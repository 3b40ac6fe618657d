use anyhow::{Result, anyhow};
use bitvec::{bitvec, vec::BitVec};
use chrono::{DateTime, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{self, Display},
};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

use super::semantic_information::SemanticInformation;

pub type VariableIndex = usize;

/// The variables of a net by name; the position of a variable is its index.
pub type VariableTable = IndexMap<String, Variable>;

pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The declared type of a data variable, named as in PNML data Petri nets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    StrumDisplay,
    Serialize,
    Deserialize,
)]
pub enum VariableType {
    #[strum(serialize = "java.lang.Integer", serialize = "integer")]
    Integer,
    #[strum(serialize = "java.lang.Long", serialize = "long")]
    Long,
    #[strum(serialize = "java.lang.Double", serialize = "double")]
    Double,
    #[strum(serialize = "java.lang.String", serialize = "string")]
    String,
    #[strum(serialize = "java.lang.Boolean", serialize = "boolean")]
    Boolean,
    #[strum(serialize = "java.util.Date", serialize = "date")]
    Date,
}

impl VariableType {
    /**
     * The attribute type under which values of this type appear in an event log.
     */
    pub fn type_tag(&self) -> &'static str {
        match self {
            VariableType::Integer | VariableType::Long => "int",
            VariableType::Double => "float",
            VariableType::String => "string",
            VariableType::Boolean => "boolean",
            VariableType::Date => "date",
        }
    }

    pub fn is_numeric(&self) -> bool {
        match self {
            VariableType::Integer
            | VariableType::Long
            | VariableType::Double
            | VariableType::Date => true,
            VariableType::String | VariableType::Boolean => false,
        }
    }

    /**
     * Integer-like types move in whole units; doubles do not.
     */
    pub fn is_discrete(&self) -> bool {
        match self {
            VariableType::Integer | VariableType::Long | VariableType::Date => true,
            _ => false,
        }
    }

    /**
     * The smallest step that excludes a boundary of a strict interval.
     */
    pub fn minimal_increment(&self) -> f64 {
        if self.is_discrete() { 1.0 } else { 1e-16 }
    }

    /**
     * The placeholder that stands in for a variable that has not been written yet.
     */
    pub fn sentinel(&self) -> Value {
        match self {
            VariableType::Date => Value::Date(253370761260),
            VariableType::Integer | VariableType::Long => Value::Integer(-123456789),
            VariableType::String => Value::String("__UNDEFINED1701__".to_string()),
            VariableType::Boolean => Value::Boolean(false),
            VariableType::Double => Value::Double(-123456789.0),
        }
    }
}

/// A typed variable value. Dates are seconds since the epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    Date(i64),
}

impl Value {
    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(x) | Value::Date(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            Value::String(_) | Value::Boolean(_) => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Integer(x) | Value::Date(x) => *x != 0,
            Value::Double(x) => *x != 0.0,
            Value::String(x) => !x.is_empty(),
            Value::Boolean(x) => *x,
        }
    }

    /**
     * Creates a value of the given type from a number; integer-like types are truncated towards zero.
     */
    pub fn from_f64(value: f64, variable_type: VariableType) -> Result<Self> {
        if !value.is_finite() {
            return Err(anyhow!("cannot store {} in a {} variable", value, variable_type));
        }
        match variable_type {
            VariableType::Integer | VariableType::Long => Ok(Value::Integer(value as i64)),
            VariableType::Date => Ok(Value::Date(value as i64)),
            VariableType::Double => Ok(Value::Double(value)),
            VariableType::String => Ok(Value::String(value.to_string())),
            VariableType::Boolean => Ok(Value::Boolean(value != 0.0)),
        }
    }

    /**
     * Parses the textual form of a value, as it appears in guards and configurations.
     */
    pub fn parse(text: &str, variable_type: VariableType) -> Result<Self> {
        let text = text.trim();
        let unquoted = unquote(text).unwrap_or(text);
        match variable_type {
            VariableType::Integer | VariableType::Long => {
                if let Ok(x) = unquoted.parse::<i64>() {
                    Ok(Value::Integer(x))
                } else {
                    let x = unquoted
                        .parse::<f64>()
                        .map_err(|_| anyhow!("`{}` is not an integer", text))?;
                    Value::from_f64(x, variable_type)
                }
            }
            VariableType::Double => Ok(Value::Double(
                unquoted
                    .parse::<f64>()
                    .map_err(|_| anyhow!("`{}` is not a number", text))?,
            )),
            VariableType::Date => {
                if let Some(x) = parse_date(unquoted) {
                    Ok(Value::Date(x))
                } else {
                    Ok(Value::Date(unquoted.parse::<i64>().map_err(|_| {
                        anyhow!("`{}` is neither a date nor a number of seconds", text)
                    })?))
                }
            }
            VariableType::String => Ok(Value::String(unquoted.to_string())),
            VariableType::Boolean => match parse_boolean(unquoted) {
                Some(x) => Ok(Value::Boolean(x)),
                None => Err(anyhow!("`{}` is not a boolean", text)),
            },
        }
    }

    /**
     * Converts this value to the declared type of a variable.
     */
    pub fn coerce(self, variable_type: VariableType) -> Result<Self> {
        match (self, variable_type) {
            (Value::Integer(x), VariableType::Integer | VariableType::Long) => {
                Ok(Value::Integer(x))
            }
            (Value::Date(x), VariableType::Integer | VariableType::Long) => Ok(Value::Integer(x)),
            (Value::Integer(x), VariableType::Date) | (Value::Date(x), VariableType::Date) => {
                Ok(Value::Date(x))
            }
            (Value::Integer(x), VariableType::Double) | (Value::Date(x), VariableType::Double) => {
                Ok(Value::Double(x as f64))
            }
            (Value::Double(x), _) => Value::from_f64(x, variable_type),
            (Value::Boolean(x), VariableType::Boolean) => Ok(Value::Boolean(x)),
            (Value::String(x), VariableType::String) => Ok(Value::String(x)),
            (Value::String(x), _) => Value::parse(&x, variable_type),
            (value, VariableType::String) => Ok(Value::String(value.to_string())),
            (value, variable_type) => Err(anyhow!(
                "cannot convert {} to a {} value",
                value,
                variable_type
            )),
        }
    }

    /**
     * A total order used to sort snapshots; numbers before text.
     */
    pub fn sort_key_cmp(&self, other: &Self) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) | (Value::Date(a), Value::Date(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::String(x) => write!(f, "{}", x),
            Value::Boolean(x) => write!(f, "{}", x),
            Value::Date(x) => match DateTime::from_timestamp(*x, 0) {
                Some(date) => write!(f, "{}", date.to_rfc3339()),
                None => write!(f, "{}", x),
            },
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

pub fn parse_date(text: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT)
        .ok()
        .map(|date| date.and_utc().timestamp())
}

pub fn parse_boolean(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/**
 * Returns the text between matching single or double quotes, if the text is quoted.
 */
pub fn unquote(text: &str) -> Option<&str> {
    if text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
    {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub original_name: String,
    pub variable_type: VariableType,
    pub min_value: Option<Value>,
    pub max_value: Option<Value>,
    pub initial_value: Option<Value>,
    pub semantic_information: SemanticInformation,
}

impl Variable {
    pub fn new(name: &str, variable_type: VariableType) -> Self {
        Self {
            name: name.to_string(),
            original_name: name.to_string(),
            variable_type,
            min_value: None,
            max_value: None,
            initial_value: None,
            semantic_information: SemanticInformation::new(variable_type, None),
        }
    }

    pub fn with_bounds(mut self, min: Value, max: Value) -> Self {
        if let (Some(min), Some(max)) = (min.as_f64(), max.as_f64()) {
            self.semantic_information.min = min;
            self.semantic_information.max = max;
        }
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn with_initial_value(mut self, value: Value) -> Self {
        self.semantic_information.initial_value = Some(value.clone());
        self.initial_value = Some(value);
        self
    }

    pub fn with_semantic_information(mut self, semantic_information: SemanticInformation) -> Self {
        self.semantic_information = semantic_information;
        self
    }
}

/**
 * Finds a variable by its name, or else by its original name.
 */
pub fn lookup_variable<'a>(
    variables: &'a VariableTable,
    name: &str,
) -> Option<(VariableIndex, &'a Variable)> {
    if let Some((index, _, variable)) = variables.get_full(name) {
        return Some((index, variable));
    }
    variables
        .values()
        .enumerate()
        .find(|(_, variable)| variable.original_name == name)
}

/// The values of all variables of a net during one trace.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableState {
    pub(crate) values: Vec<Option<Value>>,
    pub(crate) written: BitVec,
}

impl VariableState {
    pub fn new(number_of_variables: usize) -> Self {
        Self {
            values: vec![None; number_of_variables],
            written: bitvec![0; number_of_variables],
        }
    }

    pub fn get(&self, variable: VariableIndex) -> Option<&Value> {
        self.values.get(variable).and_then(|value| value.as_ref())
    }

    pub fn has_value(&self, variable: VariableIndex) -> bool {
        self.get(variable).is_some()
    }

    pub fn has_been_written(&self, variable: VariableIndex) -> bool {
        self.written.get(variable).map(|bit| *bit).unwrap_or(false)
    }

    /**
     * Stores a value that was produced during the trace.
     */
    pub fn write(&mut self, variable: VariableIndex, value: Value) {
        self.values[variable] = Some(value);
        self.written.set(variable, true);
    }

    /**
     * Stores a value without marking the variable as written in the trace.
     */
    pub fn preset(&mut self, variable: VariableIndex, value: Option<Value>) {
        self.values[variable] = value;
        self.written.set(variable, false);
    }

    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|value| *value = None);
        self.written.fill(false);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Value, VariableType, parse_date};

    #[test]
    fn numeric_equality_across_types() {
        assert_eq!(Value::Integer(1), Value::Double(1.0));
        assert_ne!(Value::Integer(1), Value::String("1".to_string()));
        assert_eq!(Value::Date(5), Value::Integer(5));
    }

    #[test]
    fn parse_variable_types() {
        assert_eq!(
            VariableType::from_str("java.lang.Double").unwrap(),
            VariableType::Double
        );
        assert_eq!(VariableType::from_str("date").unwrap(), VariableType::Date);
        assert_eq!(VariableType::Long.type_tag(), "int");
    }

    #[test]
    fn parse_values() {
        assert_eq!(
            Value::parse("'2003-01-01T00:00:00'", VariableType::Date).unwrap(),
            Value::Date(parse_date("2003-01-01T00:00:00").unwrap())
        );
        assert_eq!(
            Value::parse("TRUE", VariableType::Boolean).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            Value::parse("4.0", VariableType::Integer).unwrap(),
            Value::Integer(4)
        );
        assert!(Value::parse("abc", VariableType::Double).is_err());
    }

    #[test]
    fn coerce_values() {
        assert_eq!(
            Value::Double(3.7).coerce(VariableType::Integer).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            Value::String("false".to_string())
                .coerce(VariableType::Boolean)
                .unwrap(),
            Value::Boolean(false)
        );
        assert!(Value::Boolean(true).coerce(VariableType::Double).is_err());
    }
}
