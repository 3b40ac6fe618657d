use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    guards::guard::Guard,
    math::{
        interval::{Interval, RelationalOperator},
        truncated_distribution::TruncatedDistribution,
    },
};

use super::variable::{Value, VariableType, parse_date};

pub const DEFAULT_PRECISION: u32 = 2;

/// Guard texts that mark a dependency as referring to the previous value of the variable itself.
pub const SELF_REFERENCE_CONDITIONS: [&str; 5] = [
    "SELF_REFERENCE",
    "self",
    "SELF",
    "self_reference",
    "Self_Reference",
];

/// Refers to the activity name of the firing transition in an `==` self-reference.
pub const EVENT_NAME: &str = "_EVENT_NAME_";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum UsedInformation {
    #[strum(serialize = "values")]
    Values,
    #[strum(serialize = "intervals")]
    Intervals,
    #[strum(serialize = "distribution")]
    Distribution,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum ConstraintOperator {
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    Smaller,
    #[strum(serialize = "<=")]
    SmallerEqual,
    #[strum(serialize = ">")]
    Larger,
    #[strum(serialize = ">=")]
    LargerEqual,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
}

impl ConstraintOperator {
    pub fn relational(&self) -> Option<RelationalOperator> {
        match self {
            ConstraintOperator::Smaller => Some(RelationalOperator::Smaller),
            ConstraintOperator::SmallerEqual => Some(RelationalOperator::SmallerEqual),
            ConstraintOperator::Larger => Some(RelationalOperator::Larger),
            ConstraintOperator::LargerEqual => Some(RelationalOperator::LargerEqual),
            _ => None,
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        match self {
            ConstraintOperator::Add
            | ConstraintOperator::Subtract
            | ConstraintOperator::Multiply
            | ConstraintOperator::Divide => true,
            _ => false,
        }
    }
}

/// What a variable must satisfy once the condition of a dependency holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub operator: ConstraintOperator,
    pub value: Value,
}

impl Constraint {
    pub fn new(operator: ConstraintOperator, value: impl Into<Value>) -> Self {
        Self {
            operator,
            value: value.into(),
        }
    }

    pub fn interval(&self) -> Option<Interval> {
        let operator = self.operator.relational()?;
        Some(Interval::bound(operator, self.value.as_f64()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub condition: String,
    pub constraint: Constraint,
    #[serde(skip)]
    pub(crate) guard: Option<Guard>,
}

impl Dependency {
    pub fn new(condition: &str, constraint: Constraint) -> Self {
        Self {
            condition: condition.to_string(),
            constraint,
            guard: None,
        }
    }

    pub fn is_self_reference(&self) -> bool {
        SELF_REFERENCE_CONDITIONS.contains(&self.condition.trim())
    }

    /**
     * The compiled condition; only available after the net has been finalised.
     */
    pub fn get_guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }
}

/// Rules on how values of one variable are generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticInformation {
    pub used_information: UsedInformation,
    pub values: Vec<Value>,
    /// empty means all values are equally likely
    pub weights: Vec<f64>,
    pub intervals: Vec<Interval>,
    pub distribution: Option<TruncatedDistribution>,
    pub dependencies: Vec<Dependency>,
    pub fixed_variable: bool,
    pub trace_variable: bool,
    pub include_inverse_intervals: bool,
    pub use_initial_value: bool,
    pub generate_initial_value: bool,
    pub initial_value: Option<Value>,
    pub precision: u32,
    pub self_reference_deviation: f64,
    pub min: f64,
    pub max: f64,
}

impl SemanticInformation {
    pub fn new(variable_type: VariableType, initial_value: Option<Value>) -> Self {
        let (min, max) = default_bounds(variable_type);
        Self {
            used_information: UsedInformation::Values,
            values: vec![],
            weights: vec![],
            intervals: vec![],
            distribution: None,
            dependencies: vec![],
            fixed_variable: false,
            trace_variable: false,
            include_inverse_intervals: false,
            use_initial_value: false,
            generate_initial_value: false,
            initial_value,
            precision: DEFAULT_PRECISION,
            self_reference_deviation: 0.0,
            min,
            max,
        }
    }

    pub fn with_values(mut self, values: Vec<Value>, weights: Vec<f64>) -> Self {
        self.used_information = UsedInformation::Values;
        self.values = values;
        self.weights = weights;
        self
    }

    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.used_information = UsedInformation::Intervals;
        self.intervals = intervals;
        self
    }

    pub fn with_distribution(mut self, distribution: TruncatedDistribution) -> Self {
        self.used_information = UsedInformation::Distribution;
        self.distribution = Some(distribution);
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_dependency(mut self, condition: &str, constraint: Constraint) -> Self {
        self.dependencies.push(Dependency::new(condition, constraint));
        self
    }

    pub fn has_weights(&self) -> bool {
        !self.weights.is_empty() && self.weights.len() == self.values.len()
    }

    pub fn number_of_non_self_dependencies(&self) -> usize {
        self.dependencies
            .iter()
            .filter(|dependency| !dependency.is_self_reference())
            .count()
    }

    /**
     * Removes repeated values, keeping the weight of the first occurrence.
     */
    pub fn remove_value_duplicates(&mut self) {
        let with_weights = self.has_weights();
        let mut values: Vec<Value> = vec![];
        let mut weights = vec![];
        for (index, value) in self.values.iter().enumerate() {
            if !values.contains(value) {
                values.push(value.clone());
                if with_weights {
                    weights.push(self.weights[index]);
                }
            }
        }
        self.values = values;
        self.weights = weights;
    }
}

fn default_bounds(variable_type: VariableType) -> (f64, f64) {
    match variable_type {
        VariableType::Integer | VariableType::Long | VariableType::Double => (0.0, 100.0),
        VariableType::Date => (
            parse_date("2000-01-01T00:00:00").unwrap_or(946684800) as f64,
            parse_date("2001-01-01T00:00:00").unwrap_or(978307200) as f64,
        ),
        VariableType::String | VariableType::Boolean => (0.0, 0.0),
    }
}
