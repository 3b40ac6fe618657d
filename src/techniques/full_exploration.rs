use anyhow::{Result, anyhow};
use itertools::Itertools;
use rand::Rng;

use crate::{
    dalg_framework::{
        sim_status::{RunControl, RunOutcome},
        simulation_error::SimulationError,
    },
    dalg_objects::{
        data_petri_net::{DataPetriNet, TransitionIndex},
        event_log::EventLog,
        semantic_information::UsedInformation,
        simulation_configuration::SimulationConfiguration,
        variable::{Value, VariableIndex, VariableState},
    },
    guards::guard_analyser::ModelAnalyser,
    math::{
        interval::{Interval, merge_all, tighten},
        truncated_distribution::uniform,
    },
    semantics::semantics::Semantics,
};

use super::{
    exhaustive_exploration::{explore, replay},
    trace_generation::{TraceGenerator, ValueSource},
};

/**
 * The finitely many values of a variable that full exploration tries: the discrete values
 * together with one representative value per interval.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteDomain {
    pub variable: VariableIndex,
    pub values: Vec<Value>,
    pub intervals: Vec<Interval>,
    pub interval_values: Vec<Value>,
}

impl DiscreteDomain {
    pub fn new<R: Rng + ?Sized>(
        net: &DataPetriNet,
        config: &SimulationConfiguration,
        generator: &TraceGenerator,
        variable: VariableIndex,
        rng: &mut R,
    ) -> Result<Self> {
        let declaration = net
            .get_variable(variable)
            .ok_or_else(|| anyhow!("non-existing variable {} referenced", variable))?;
        let info = &declaration.semantic_information;
        let variable_type = declaration.variable_type;
        let offset = variable_type.minimal_increment();

        let mut values = vec![];
        let mut intervals = vec![];
        match info.used_information {
            UsedInformation::Values => values.extend(info.values.iter().cloned()),
            UsedInformation::Intervals => intervals.extend(info.intervals.iter().copied()),
            UsedInformation::Distribution => {}
        }
        for interval in net.guard_intervals(variable) {
            if !intervals.contains(&interval) {
                intervals.push(interval);
            }
        }
        for value in net.guard_values(variable) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        let values: Vec<Value> = values
            .into_iter()
            .filter_map(|value| value.coerce(variable_type).ok())
            .unique_by(|value| value.to_string())
            .collect();

        if config.merge_intervals {
            intervals = merge_all(intervals, offset);
        }
        let interval_values = intervals
            .iter()
            .filter_map(|interval| {
                let ((low, high), in_bounds) = match interval {
                    Interval::Between(low, high) => ((*low, *high), low <= high),
                    _ => tighten(&[*interval], info.min, info.max, offset),
                };
                if !in_bounds {
                    return None;
                }
                let sample = if low == high { low } else { uniform(rng, low, high) };
                let sample = if variable_type.is_discrete() {
                    sample.trunc()
                } else {
                    sample
                };
                Value::from_f64(sample, variable_type).ok()
            })
            .collect();

        let mut result = Self {
            variable,
            values,
            intervals,
            interval_values,
        };
        if result.is_empty() {
            result.values.push(
                generator
                    .get_value_generator()
                    .replacement_value(declaration, rng),
            );
        }
        Ok(result)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.interval_values.is_empty()
    }

    /**
     * All values of the domain: the discrete ones first.
     */
    pub fn combined_values(&self) -> Vec<Value> {
        self.values
            .iter()
            .chain(self.interval_values.iter())
            .cloned()
            .collect()
    }
}

/**
 * Every assignment of domain values to the variables, each as a value per variable index.
 */
pub fn combinations(
    domains: &[DiscreteDomain],
    number_of_variables: usize,
) -> Vec<Vec<Option<Value>>> {
    if domains.is_empty() {
        return vec![vec![None; number_of_variables]];
    }
    domains
        .iter()
        .map(|domain| domain.combined_values())
        .multi_cartesian_product()
        .map(|values| {
            let mut assignment = vec![None; number_of_variables];
            for (domain, value) in domains.iter().zip(values) {
                assignment[domain.variable] = Some(value);
            }
            assignment
        })
        .collect()
}

/**
 * Whether the guards of all transitions of the sequence hold, with the written variables set to
 * the assignment and all other variables unset. A guard that cannot be evaluated does not hold.
 */
pub fn satisfies_guards(
    net: &DataPetriNet,
    sequence: &[TransitionIndex],
    assignment: &[Option<Value>],
    variables: &mut VariableState,
) -> bool {
    variables.clear();
    for transition in sequence {
        for variable in net.get_transition(*transition).get_writes_variables() {
            if let Some(Some(value)) = assignment.get(*variable) {
                variables.write(*variable, value.clone());
            }
        }
    }
    sequence.iter().all(|transition| {
        match net.get_transition(*transition).get_guard().evaluate(variables) {
            Ok(holds) => holds,
            Err(error) => {
                log::debug!("combination fails: {}", error);
                false
            }
        }
    })
}

/**
 * Generates one trace per sequence of the token game, with the first assignment of values from
 * the discrete domains of the variables that satisfies all guards along the sequence.
 */
pub fn generate_full_exploration_logs<R: Rng + ?Sized>(
    net: &DataPetriNet,
    config: &SimulationConfiguration,
    control: &mut RunControl,
    rng: &mut R,
    logs: &mut Vec<EventLog>,
) -> Result<RunOutcome> {
    let (result, outcome) = explore(net, config, control)?;
    if outcome == RunOutcome::Cancelled {
        return Ok(outcome);
    }
    let mut skeletons: Vec<&[TransitionIndex]> =
        result.valid.iter().map(|sequence| sequence.as_slice()).collect();
    if !config.only_ending_traces {
        skeletons.extend(result.other.iter().map(|sequence| sequence.as_slice()));
    }
    if skeletons.is_empty() {
        return Err(SimulationError::no_traces_possible().into());
    }

    let mut generator = TraceGenerator::new(net, config);
    let written: Vec<VariableIndex> = net
        .get_transitions()
        .iter()
        .flat_map(|transition| transition.get_writes_variables().iter().copied())
        .unique()
        .sorted()
        .collect();
    let domains = written
        .iter()
        .map(|variable| DiscreteDomain::new(net, config, &generator, *variable, rng))
        .collect::<Result<Vec<_>>>()?;
    let combinations = combinations(&domains, net.get_number_of_variables());
    log::info!(
        "try {} combinations of values on {} sequences",
        combinations.len(),
        skeletons.len()
    );

    let mut state = net.get_initial_state()?;
    let mut variables = VariableState::new(net.get_number_of_variables());
    let no_values = vec![None; net.get_number_of_variables()];
    while logs.len() < config.number_of_logs {
        generator.start_log();
        generator.reset(&mut state, rng)?;
        let mut log = EventLog::new(&config.log_name, &config.log_creator);

        for skeleton in &skeletons {
            if log.len() >= config.number_of_traces {
                break;
            }
            if control.is_stopped() {
                logs.push(log);
                return Ok(RunOutcome::Cancelled);
            }

            let writes = skeleton
                .iter()
                .any(|transition| !net.get_transition(*transition).get_writes_variables().is_empty());
            let assignment = if writes {
                combinations.iter().find(|assignment| {
                    satisfies_guards(net, skeleton, assignment, &mut variables)
                })
            } else if satisfies_guards(net, skeleton, &no_values, &mut variables) {
                Some(&no_values)
            } else {
                None
            };

            if let Some(assignment) = assignment {
                let mut trace = generator.new_trace(&log, rng);
                replay(
                    &mut generator,
                    &mut state,
                    &mut trace,
                    skeleton,
                    ValueSource::Assign(assignment),
                    rng,
                )?;
                generator.add_trace_variables(&state, &mut trace);
                log::debug!("accept trace {}", trace);
                log.traces.push(trace.clone());
                generator.add_partial_traces(&trace, &mut log, config.max_trace_duplicates);
            }
            generator.end_trace(&mut state, rng)?;

            let traces = log.len();
            control.report(|status| status.number_of_traces = traces);
        }

        if log.is_empty() {
            return Err(SimulationError::NoTracesFound.into());
        }
        log::info!("generated log {} with {} traces", logs.len() + 1, log.len());
        logs.push(log);
        let number_of_logs = logs.len();
        control.report(|status| {
            status.number_of_logs = number_of_logs;
            status.number_of_traces = 0;
        });
    }
    Ok(RunOutcome::Completed)
}
