use anyhow::{Result, anyhow};
use rand::Rng;

use crate::{
    dalg_objects::{
        data_petri_net::{DataPetriNet, TransitionIndex},
        semantic_information::{
            Constraint, ConstraintOperator, Dependency, EVENT_NAME, UsedInformation,
        },
        variable::{
            Value, Variable, VariableIndex, VariableState, VariableType, lookup_variable,
            parse_date,
        },
    },
    math::{
        interval::{Interval, RelationalOperator, tighten, with_inverses},
        precision::{round_down, round_to, round_up},
        probabilities::{choose_uniform, choose_weighted, normalise},
        truncated_distribution::uniform,
    },
    semantics::data_petri_net_semantics::DPNState,
};

/// How often a draw is repeated to avoid a value that is known to be invalid.
pub const NUMBER_OF_TRIES: usize = 10;

/// The value of a string variable for which nothing could be generated.
pub const NO_VALUES_DEFINED: &str = "__NO_VALUES_DEFINED__";

/// Generates the values of variables that a transition writes, following their semantic information.
#[derive(Debug, Clone, Copy)]
pub struct ValueGenerator<'a> {
    net: &'a DataPetriNet,
}

impl<'a> ValueGenerator<'a> {
    pub fn new(net: &'a DataPetriNet) -> Self {
        Self { net }
    }

    /**
     * The variables written by the transition: first those without dependencies, then the others
     * by their number of dependencies.
     */
    pub fn generation_order(&self, transition: TransitionIndex) -> Vec<VariableIndex> {
        let (mut result, mut dependent): (Vec<VariableIndex>, Vec<VariableIndex>) = self
            .net
            .get_transition(transition)
            .get_writes_variables()
            .iter()
            .partition(|variable| {
                self.net
                    .get_variable(**variable)
                    .map(|variable| variable.semantic_information.dependencies.is_empty())
                    .unwrap_or(true)
            });
        dependent.sort_by_key(|variable| {
            self.net
                .get_variable(*variable)
                .map(|variable| variable.semantic_information.dependencies.len())
                .unwrap_or(0)
        });
        result.extend(dependent);
        result
    }

    /**
     * Writes new values to all variables that the transition writes. A fixed variable keeps the
     * value it got earlier in the trace. Returns the variables that received a value.
     */
    pub fn generate_values<R: Rng + ?Sized>(
        &self,
        state: &mut DPNState,
        transition: TransitionIndex,
        rng: &mut R,
    ) -> Result<Vec<VariableIndex>> {
        let mut result = vec![];
        for variable in self.generation_order(transition) {
            let fixed = self
                .get_variable(variable)?
                .semantic_information
                .fixed_variable;
            if fixed && state.variables.has_been_written(variable) {
                continue;
            }
            let value = self.generate_value(&state.variables, variable, Some(transition), rng)?;
            state.variables.write(variable, value);
            result.push(variable);
        }
        Ok(result)
    }

    /**
     * Clears all variables, then gives the variables that use an initial value their declared or
     * a generated value.
     */
    pub fn generate_initial_values<R: Rng + ?Sized>(
        &self,
        variables: &mut VariableState,
        rng: &mut R,
    ) -> Result<()> {
        variables.clear();
        for (index, variable) in self.net.get_variables().values().enumerate() {
            let info = &variable.semantic_information;
            if !info.use_initial_value {
                continue;
            }
            let value = if info.generate_initial_value {
                self.generate_value(variables, index, None, rng)?
            } else {
                match info.initial_value.as_ref().or(variable.initial_value.as_ref()) {
                    Some(value) => self.conform(value.clone(), variable, rng),
                    None => default_initial_value(variable.variable_type),
                }
            };
            variables.write(index, value);
        }
        Ok(())
    }

    fn get_variable(&self, variable: VariableIndex) -> Result<&'a Variable> {
        self.net.get_variable(variable).ok_or_else(|| {
            anyhow!(
                "non-existing variable {} referenced, while there are {}",
                variable,
                self.net.get_number_of_variables()
            )
        })
    }

    /**
     * Generates one value. Satisfied dependencies come first, then a self-reference, then the
     * values, distribution or intervals of the variable.
     */
    pub fn generate_value<R: Rng + ?Sized>(
        &self,
        variables: &VariableState,
        index: VariableIndex,
        transition: Option<TransitionIndex>,
        rng: &mut R,
    ) -> Result<Value> {
        let variable = self.get_variable(index)?;
        let info = &variable.semantic_information;
        let mut invalid_values = vec![];

        if !info.dependencies.is_empty() {
            let mut equal = vec![];
            let mut intervals = vec![];
            let mut not_equal = vec![];
            for constraint in self.satisfied_constraints(variable, variables)? {
                match constraint.operator {
                    ConstraintOperator::Equal => equal.push(constraint.value.clone()),
                    ConstraintOperator::NotEqual => not_equal.push(constraint.value.clone()),
                    _ => {
                        if let Some(interval) = constraint.interval() {
                            intervals.push(interval);
                        }
                    }
                }
            }

            if !equal.is_empty() {
                return Ok(retry(rng, &invalid_values, |rng| {
                    let value = match choose_uniform(rng, equal.len()) {
                        Some(choice) => equal[choice].clone(),
                        None => return self.replacement_value(variable, rng),
                    };
                    self.conform(value, variable, rng)
                }));
            }
            invalid_values.extend(not_equal);
            if !intervals.is_empty() {
                let offset = variable.variable_type.minimal_increment();
                let ((low, high), in_bounds) = tighten(&intervals, info.min, info.max, offset);
                if in_bounds {
                    return Ok(retry(rng, &invalid_values, |rng| {
                        self.sample_range(variable, low, high, rng)
                    }));
                }
            }
        }

        if variables.has_value(index) {
            if let Some(dependency) = info
                .dependencies
                .iter()
                .find(|dependency| dependency.is_self_reference())
            {
                if let Some(value) =
                    self.self_reference_value(variables, index, dependency, transition, rng)?
                {
                    return Ok(value);
                }
            }
        }

        match info.used_information {
            UsedInformation::Values => Ok(self.choose_value(variable, &invalid_values, rng)),
            UsedInformation::Distribution => match &info.distribution {
                Some(distribution) => Ok(retry(rng, &invalid_values, |rng| {
                    match variable.variable_type {
                        VariableType::Integer | VariableType::Long => {
                            Value::Integer(distribution.sample_integer(rng))
                        }
                        _ => self.conform(Value::Double(distribution.sample(rng)), variable, rng),
                    }
                })),
                None => Ok(self.replacement_value(variable, rng)),
            },
            UsedInformation::Intervals => Ok(retry(rng, &invalid_values, |rng| {
                self.choose_interval_value(variable, rng)
            })),
        }
    }

    /**
     * The constraints of all dependencies whose condition holds, in declaration order.
     */
    fn satisfied_constraints(
        &self,
        variable: &'a Variable,
        variables: &VariableState,
    ) -> Result<Vec<&'a Constraint>> {
        let mut result = vec![];
        for dependency in variable.semantic_information.dependencies.iter() {
            if dependency.is_self_reference() {
                continue;
            }
            let guard = dependency.get_guard().ok_or_else(|| {
                anyhow!(
                    "dependency `{}` of variable `{}` has not been compiled",
                    dependency.condition,
                    variable.name
                )
            })?;
            if guard.evaluate(variables)? {
                result.push(&dependency.constraint);
            }
        }
        Ok(result)
    }

    /**
     * Derives a value from the current value of the variable. Returns None if the constraint does
     * not describe such a derivation.
     */
    fn self_reference_value<R: Rng + ?Sized>(
        &self,
        variables: &VariableState,
        index: VariableIndex,
        dependency: &Dependency,
        transition: Option<TransitionIndex>,
        rng: &mut R,
    ) -> Result<Option<Value>> {
        let variable = self.get_variable(index)?;
        let info = &variable.semantic_information;
        let constraint = &dependency.constraint;
        let current = match variables.get(index) {
            Some(value) => value,
            None => return Ok(None),
        };

        match constraint.operator {
            ConstraintOperator::Equal => {
                if let Value::String(name) = &constraint.value {
                    if name == EVENT_NAME {
                        return Ok(Some(match transition {
                            Some(transition) => Value::String(
                                self.net
                                    .get_transition(transition)
                                    .configuration
                                    .activity_name
                                    .clone(),
                            ),
                            None => current.clone(),
                        }));
                    }
                    if let Some((other, _)) = lookup_variable(self.net.get_variables(), name) {
                        return Ok(Some(match variables.get(other) {
                            Some(value) => self.conform(value.clone(), variable, rng),
                            None => self.replacement_value(variable, rng),
                        }));
                    }
                }
                Ok(Some(self.conform(constraint.value.clone(), variable, rng)))
            }
            ConstraintOperator::Add
            | ConstraintOperator::Subtract
            | ConstraintOperator::Multiply
            | ConstraintOperator::Divide => {
                let (Some(operand), Some(current)) = (constraint.value.as_f64(), current.as_f64())
                else {
                    return Ok(None);
                };
                let discrete = variable.variable_type.is_discrete();
                let deviation = info.self_reference_deviation.abs();
                let mut operand = if deviation > 0.0 {
                    operand + uniform(rng, -deviation, deviation)
                } else {
                    operand
                };
                if discrete {
                    operand = operand.round();
                }
                let mut value = match constraint.operator {
                    ConstraintOperator::Add => current + operand,
                    ConstraintOperator::Subtract => current - operand,
                    ConstraintOperator::Multiply => current * operand,
                    _ => current / operand,
                };
                if discrete {
                    value = value.round();
                }
                let value = if value > info.max {
                    info.max
                } else if value < info.min {
                    info.min
                } else if variable.variable_type == VariableType::Double {
                    round_to(value, info.precision)
                } else {
                    value
                };
                Ok(Value::from_f64(value, variable.variable_type).ok())
            }
            _ => Ok(None),
        }
    }

    /**
     * A weighted choice among the declared values that are not invalid.
     */
    fn choose_value<R: Rng + ?Sized>(
        &self,
        variable: &Variable,
        invalid_values: &[Value],
        rng: &mut R,
    ) -> Value {
        let info = &variable.semantic_information;
        let with_weights = info.has_weights();
        let mut possible_values = vec![];
        let mut weights = vec![];
        for (index, value) in info.values.iter().enumerate() {
            if !invalid_values.contains(value) {
                possible_values.push(value);
                weights.push(if with_weights { info.weights[index] } else { 1.0 });
            }
        }
        match choose_weighted(rng, &normalise(&weights)) {
            Some(choice) => self.conform(possible_values[choice].clone(), variable, rng),
            None => self.replacement_value(variable, rng),
        }
    }

    /**
     * Samples from a random declared interval (and its inverse, if configured) that lies within the bounds of the variable.
     */
    fn choose_interval_value<R: Rng + ?Sized>(&self, variable: &Variable, rng: &mut R) -> Value {
        let info = &variable.semantic_information;
        let variable_type = variable.variable_type;
        if !variable_type.is_numeric() {
            return self.replacement_value(variable, rng);
        }
        let candidates = if info.include_inverse_intervals {
            with_inverses(&info.intervals)
        } else {
            info.intervals.clone()
        };
        let offset = variable_type.minimal_increment();
        let valid: Vec<&Interval> = candidates
            .iter()
            .filter(|interval| interval.is_within(info.min, info.max, offset))
            .collect();
        let interval = match choose_uniform(rng, valid.len()) {
            Some(choice) => valid[choice],
            None => return self.replacement_value(variable, rng),
        };

        let (low, high) = interval.to_range(info.min, info.max, offset);
        let value = uniform(rng, low, high);
        let value = if variable_type.is_discrete() {
            match interval {
                Interval::Bound(operator, _) if operator.is_strict() => value.floor(),
                _ => value.round(),
            }
        } else {
            match interval {
                Interval::Bound(RelationalOperator::Smaller, _) => round_down(value, info.precision),
                Interval::Bound(RelationalOperator::Larger, _) => round_up(value, info.precision),
                _ => round_to(value, info.precision),
            }
        };
        match Value::from_f64(value, variable_type) {
            Ok(value) => value,
            Err(_) => self.replacement_value(variable, rng),
        }
    }

    /**
     * Samples uniformly from the closed range; integer-like types are truncated.
     */
    fn sample_range<R: Rng + ?Sized>(
        &self,
        variable: &Variable,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Value {
        let precision = variable.semantic_information.precision;
        let value = if low == high { low } else { uniform(rng, low, high) };
        let value = match variable.variable_type {
            VariableType::Double => round_to(value, precision),
            _ => value,
        };
        match Value::from_f64(value, variable.variable_type) {
            Ok(value) if variable.variable_type.is_numeric() => value,
            _ => self.replacement_value(variable, rng),
        }
    }

    /**
     * Converts a value to the type of the variable, rounding doubles to its precision.
     */
    fn conform<R: Rng + ?Sized>(&self, value: Value, variable: &Variable, rng: &mut R) -> Value {
        match value.clone().coerce(variable.variable_type) {
            Ok(Value::Double(x)) => {
                Value::Double(round_to(x, variable.semantic_information.precision))
            }
            Ok(value) => value,
            Err(err) => {
                log::warn!(
                    "value {} does not fit variable `{}`: {}",
                    value,
                    variable.name,
                    err
                );
                self.replacement_value(variable, rng)
            }
        }
    }

    /**
     * A placeholder for when the semantic information of a variable yields no value.
     */
    pub fn replacement_value<R: Rng + ?Sized>(&self, variable: &Variable, rng: &mut R) -> Value {
        let info = &variable.semantic_information;
        match variable.variable_type {
            VariableType::Date => Value::Date(uniform(rng, info.min, info.max) as i64),
            VariableType::Integer | VariableType::Long => {
                Value::Integer(uniform(rng, info.min, info.max) as i64)
            }
            VariableType::String => Value::String(NO_VALUES_DEFINED.to_string()),
            VariableType::Boolean => Value::Boolean(false),
            VariableType::Double => Value::Double(uniform(rng, info.min, info.max)),
        }
    }
}

/**
 * Draws up to `NUMBER_OF_TRIES` times until a value is not invalid; then accepts one more draw.
 */
fn retry<R: Rng + ?Sized>(
    rng: &mut R,
    invalid_values: &[Value],
    mut draw: impl FnMut(&mut R) -> Value,
) -> Value {
    for _ in 0..NUMBER_OF_TRIES {
        let value = draw(rng);
        if !invalid_values.contains(&value) {
            return value;
        }
    }
    draw(rng)
}

fn default_initial_value(variable_type: VariableType) -> Value {
    match variable_type {
        VariableType::Integer | VariableType::Long => Value::Integer(0),
        VariableType::Double => Value::Double(0.0),
        VariableType::String => Value::String(String::new()),
        VariableType::Boolean => Value::Boolean(false),
        VariableType::Date => Value::Date(parse_date("2000-01-01T00:00:00").unwrap_or(946684800)),
    }
}
