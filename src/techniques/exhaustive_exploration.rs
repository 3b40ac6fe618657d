use anyhow::Result;
use indexmap::IndexSet;
use itertools::Itertools;
use rand::Rng;
use rustc_hash::FxHashSet;
use std::fmt::{self, Display};

use crate::{
    dalg_framework::{
        sim_status::{RunControl, RunOutcome},
        simulation_error::SimulationError,
    },
    dalg_objects::{
        data_petri_net::{DataPetriNet, TransitionIndex},
        event_log::{EventLog, Trace},
        simulation_configuration::SimulationConfiguration,
    },
    marking::Marking,
    math::probabilities::choose_uniform,
    semantics::{data_petri_net_semantics::DPNState, semantics::Semantics},
};

use super::trace_generation::{TraceGenerator, ValueSource};

/// The transition sequences that the token game allows, ignoring data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachabilityResult {
    /// sequences that end in a final marking
    pub valid: Vec<Vec<TransitionIndex>>,
    /// sequences that end in a dead end or exceed a loop bound
    pub other: Vec<Vec<TransitionIndex>>,
    /// proper prefixes of sequences
    pub partial: Vec<Vec<TransitionIndex>>,
}

impl ReachabilityResult {
    pub fn total(&self) -> usize {
        self.valid.len() + self.other.len() + self.partial.len()
    }

    /**
     * The number of sequences that may become traces.
     */
    pub fn number_of_admissible(&self, config: &SimulationConfiguration) -> usize {
        if config.only_ending_traces {
            self.valid.len()
        } else {
            self.total()
        }
    }

    pub fn admissible(&self, config: &SimulationConfiguration) -> Vec<&[TransitionIndex]> {
        let valid = self.valid.iter().map(|sequence| sequence.as_slice());
        if config.only_ending_traces {
            valid.collect()
        } else {
            valid
                .chain(self.other.iter().map(|sequence| sequence.as_slice()))
                .chain(self.partial.iter().map(|sequence| sequence.as_slice()))
                .collect()
        }
    }
}

impl Display for ReachabilityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} valid, {} other and {} partial sequences",
            self.valid.len(),
            self.other.len(),
            self.partial.len()
        )
    }
}

#[derive(Debug, Clone)]
struct Branch {
    /// index of the marking in the arena
    marking: usize,
    path: Vec<TransitionIndex>,
    /// the markings along the path, excluding the initial one
    markings: Vec<usize>,
    visible_path: Vec<TransitionIndex>,
}

impl Branch {
    fn length(&self, config: &SimulationConfiguration) -> usize {
        if config.include_invisible_transitions_in_log {
            self.path.len()
        } else {
            self.visible_path.len()
        }
    }

    fn exceeds_loop_bounds(&self, config: &SimulationConfiguration) -> bool {
        self.markings
            .iter()
            .counts()
            .values()
            .any(|count| *count > config.max_loop_iterations)
            || self
                .path
                .iter()
                .counts()
                .values()
                .any(|count| *count > config.max_loop_iterations_transitions)
    }
}

/**
 * Explores the token game depth-first, up to the length and loop bounds, and collects the
 * transition sequences it finds. Exploration stops once enough sequences are found for the
 * requested number of traces, so the counts are a lower bound.
 */
pub fn explore(
    net: &DataPetriNet,
    config: &SimulationConfiguration,
    control: &mut RunControl,
) -> Result<(ReachabilityResult, RunOutcome)> {
    let mut result = ReachabilityResult::default();
    let mut state = net.get_initial_state()?;
    let mut arena: IndexSet<Marking> = IndexSet::new();
    let (root, _) = arena.insert_full(net.marking_signature(&state).clone());
    let mut memo: FxHashSet<(usize, Vec<TransitionIndex>)> = FxHashSet::default();

    let mut stack = vec![Branch {
        marking: root,
        path: vec![],
        markings: vec![],
        visible_path: vec![],
    }];
    control.report(|status| status.estimation_running = true);
    let mut reported = 0;

    while let Some(branch) = stack.pop() {
        if control.is_stopped() {
            return Ok((result, RunOutcome::Cancelled));
        }
        let length = branch.length(config);
        if length > config.max_trace_length {
            continue;
        }
        let found = result.number_of_admissible(config);
        if found >= config.number_of_traces {
            break;
        }
        if found != reported {
            reported = found;
            control.report(|status| status.estimated_traces = Some(found));
        }

        let long_enough = length >= config.min_trace_length;
        set_marking(net, &mut state, &arena[branch.marking]);
        if net.is_final_state(&state) {
            if long_enough {
                result.valid.push(branch.path);
            }
            continue;
        }
        if branch.exceeds_loop_bounds(config) {
            if long_enough {
                result.other.push(branch.path);
            }
            continue;
        }
        let enabled = net.get_enabled_transitions(&state, false)?;
        if enabled.is_empty() {
            if long_enough {
                result.other.push(branch.path);
            }
            continue;
        }
        if config.include_partial_traces && !branch.path.is_empty() && long_enough {
            result.partial.push(branch.path.clone());
        }

        //push in reverse, so that the first enabled transition is explored first
        for transition in enabled.into_iter().rev() {
            set_marking(net, &mut state, &arena[branch.marking]);
            net.execute_transition(&mut state, transition)?;
            let (marking, _) = arena.insert_full(net.marking_signature(&state).clone());

            let mut visible_path = branch.visible_path.clone();
            if !net.is_transition_silent(transition) {
                visible_path.push(transition);
            }
            if !config.duplicates_with_invisible_transitions
                && !memo.insert((marking, visible_path.clone()))
            {
                continue;
            }

            let mut path = branch.path.clone();
            path.push(transition);
            let mut markings = branch.markings.clone();
            markings.push(marking);
            stack.push(Branch {
                marking,
                path,
                markings,
                visible_path,
            });
        }
    }

    log::info!("explored {} markings and found {}", arena.len(), result);
    let total = result.number_of_admissible(config);
    control.report(|status| {
        status.estimated_traces = Some(total);
        status.estimation_running = false;
    });
    Ok((result, RunOutcome::Completed))
}

fn set_marking(net: &DataPetriNet, state: &mut DPNState, marking: &Marking) {
    state.marking = marking.clone();
    net.compute_enabled_transitions(state);
}

/**
 * Walks the sequence from the current state, with fresh time and data. Returns whether every
 * transition was enabled by its guard when it fired.
 */
pub fn replay<R: Rng + ?Sized>(
    generator: &mut TraceGenerator,
    state: &mut DPNState,
    trace: &mut Trace,
    sequence: &[TransitionIndex],
    source: ValueSource<'_>,
    rng: &mut R,
) -> Result<bool> {
    let net = generator.get_net();
    let mut guards_hold = true;
    let mut previous = None;
    for transition in sequence {
        if !net.is_enabled(state, *transition, true)? {
            guards_hold = false;
        }
        generator.fire(state, trace, *transition, previous, source, rng)?;
        previous = Some(*transition);
    }
    Ok(guards_hold)
}

/**
 * Explores the net and turns the sequences found into traces, drawing them at random without
 * replacement.
 */
pub fn generate_exploration_logs<R: Rng + ?Sized>(
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
    if result.number_of_admissible(config) == 0 {
        return Err(SimulationError::no_traces_possible().into());
    }

    let mut generator = TraceGenerator::new(net, config);
    let mut state = net.get_initial_state()?;
    while logs.len() < config.number_of_logs {
        generator.start_log();
        generator.reset(&mut state, rng)?;
        let mut log = EventLog::new(&config.log_name, &config.log_creator);
        let mut candidates = result.admissible(config);

        while log.len() < config.number_of_traces {
            if control.is_stopped() {
                logs.push(log);
                return Ok(RunOutcome::Cancelled);
            }
            let sequence = match choose_uniform(rng, candidates.len()) {
                Some(index) => candidates.swap_remove(index),
                None => break,
            };

            let clock = generator.get_clock();
            let mut trace = generator.new_trace(&log, rng);
            let guards_hold = replay(
                &mut generator,
                &mut state,
                &mut trace,
                sequence,
                ValueSource::Generate,
                rng,
            )?;
            let reached_final = net.is_final_state(&state);
            generator.add_trace_variables(&state, &mut trace);

            let tolerated = config.max_trace_duplicates;
            if (guards_hold || !config.replay_respects_guards)
                && generator.is_acceptable(&trace, reached_final, &log, tolerated)
            {
                log::debug!("accept trace {}", trace);
                log.traces.push(trace.clone());
                generator.add_partial_traces(&trace, &mut log, tolerated);
            } else {
                log::debug!("reject trace {}", trace);
                generator.set_clock(clock);
            }
            generator.end_trace(&mut state, rng)?;

            let traces = log.len();
            control.report(|status| status.number_of_traces = traces);
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

#[cfg(test)]
mod tests {
    use ntest::timeout;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::{
        dalg_framework::{
            sim_status::{RunControl, RunOutcome},
            simulation_error::SimulationError,
        },
        dalg_objects::event_log::EventLog,
        test_nets::{
            configuration, dead_net, guarded_choice_net, init_logging, invisible_net, loop_net,
            two_path_net,
        },
    };

    use super::{explore, generate_exploration_logs};

    #[test]
    #[timeout(10000)]
    fn two_paths() {
        init_logging();
        let net = two_path_net();
        let mut config = configuration();
        config.number_of_traces = 100;
        let (result, outcome) = explore(&net, &config, &mut RunControl::detached()).unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(result.total(), 2);
        let mut valid = result.valid.clone();
        valid.sort();
        assert_eq!(valid, vec![vec![0], vec![1]]);
        assert!(result.other.is_empty());
    }

    #[test]
    #[timeout(10000)]
    fn loops_are_bounded() {
        let net = loop_net();
        let mut config = configuration();
        config.number_of_traces = 100;
        config.max_trace_length = 10;
        config.max_loop_iterations = 2;
        config.max_loop_iterations_transitions = 10;
        let (result, _) = explore(&net, &config, &mut RunControl::detached()).unwrap();
        //start end, start redo end
        let mut valid = result.valid.clone();
        valid.sort();
        assert_eq!(valid, vec![vec![0, 1, 2], vec![0, 2]]);
        //start redo redo exceeds the bound on the marking after start
        assert_eq!(result.other, vec![vec![0, 1, 1]]);

        config.only_ending_traces = true;
        assert_eq!(result.admissible(&config).len(), 2);
        config.include_partial_traces = true;
        let (result, _) = explore(&net, &config, &mut RunControl::detached()).unwrap();
        assert!(result.partial.contains(&vec![0]));
    }

    #[test]
    #[timeout(10000)]
    fn early_stop() {
        let net = loop_net();
        let mut config = configuration();
        config.number_of_traces = 1;
        config.max_loop_iterations = 5;
        config.max_loop_iterations_transitions = 5;
        let (result, _) = explore(&net, &config, &mut RunControl::detached()).unwrap();
        assert_eq!(result.number_of_admissible(&config), 1);
    }

    #[test]
    #[timeout(10000)]
    fn invisible_paths() {
        let net = invisible_net();
        let mut config = configuration();
        config.number_of_traces = 10;
        let (result, _) = explore(&net, &config, &mut RunControl::detached()).unwrap();
        assert_eq!(result.valid, vec![vec![0, 1]]);

        //only the visible event counts
        config.min_trace_length = 2;
        let (result, _) = explore(&net, &config, &mut RunControl::detached()).unwrap();
        assert_eq!(result.total(), 0);
        config.include_invisible_transitions_in_log = true;
        let (result, _) = explore(&net, &config, &mut RunControl::detached()).unwrap();
        assert_eq!(result.total(), 1);
    }

    #[test]
    #[timeout(10000)]
    fn replayed_traces() {
        init_logging();
        let net = two_path_net();
        let mut config = configuration();
        config.number_of_traces = 5;
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut logs = vec![];
        let outcome = generate_exploration_logs(
            &net,
            &config,
            &mut RunControl::detached(),
            &mut rng,
            &mut logs,
        )
        .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        //candidates are used up after two traces
        assert_eq!(logs[0].len(), 2);
        let mut ids: Vec<&str> = logs[0]
            .traces
            .iter()
            .flat_map(|trace| trace.get_transition_ids())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["ta", "tb"]);
    }

    fn count_sequence(log: &EventLog, activities: &[&str]) -> usize {
        log.traces
            .iter()
            .filter(|trace| trace.get_activities() == activities)
            .count()
    }

    #[test]
    #[timeout(10000)]
    fn partial_traces_tolerate_duplicates() {
        init_logging();
        let net = loop_net();
        let mut config = configuration();
        config.number_of_traces = 10;
        config.max_trace_length = 10;
        config.max_loop_iterations = 2;
        config.max_loop_iterations_transitions = 10;
        config.include_partial_traces = true;

        //start redo redo, start redo end, start end, start and start redo; each at most once
        config.max_trace_duplicates = 0;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut logs = vec![];
        generate_exploration_logs(&net, &config, &mut RunControl::detached(), &mut rng, &mut logs)
            .unwrap();
        assert_eq!(logs[0].len(), 5);
        assert_eq!(count_sequence(&logs[0], &["start"]), 1);

        //the shared prefixes now come back, until the log is full
        config.max_trace_duplicates = 5;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut logs = vec![];
        generate_exploration_logs(&net, &config, &mut RunControl::detached(), &mut rng, &mut logs)
            .unwrap();
        assert_eq!(logs[0].len(), 10);
        assert!(count_sequence(&logs[0], &["start"]) >= 2);
        assert!(count_sequence(&logs[0], &["start", "redo"]) >= 2);
    }

    #[test]
    #[timeout(10000)]
    fn replay_respects_guards() {
        let net = guarded_choice_net();
        let mut config = configuration();
        config.number_of_logs = 20;
        config.number_of_traces = 2;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut logs = vec![];
        generate_exploration_logs(&net, &config, &mut RunControl::detached(), &mut rng, &mut logs)
            .unwrap();
        assert_eq!(logs.len(), 20);
        assert!(logs.iter().any(|log| !log.is_empty()));
        //a replay drawing the wrong amount for its decision is dropped
        assert!(logs.iter().any(|log| log.len() < 2));
        for trace in logs.iter().flat_map(|log| log.traces.iter()) {
            let amount = trace.events[0].variables[0].value.as_f64().unwrap();
            assert_eq!(trace.events[1].activity == "approve", amount > 500.0);
        }
    }

    #[test]
    #[timeout(10000)]
    fn replay_ignoring_guards() {
        let net = guarded_choice_net();
        let mut config = configuration();
        config.number_of_logs = 20;
        config.number_of_traces = 2;
        config.replay_respects_guards = false;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut logs = vec![];
        generate_exploration_logs(&net, &config, &mut RunControl::detached(), &mut rng, &mut logs)
            .unwrap();
        assert!(logs.iter().all(|log| log.len() == 2));
        let violating = logs
            .iter()
            .flat_map(|log| log.traces.iter())
            .filter(|trace| {
                let amount = trace.events[0].variables[0].value.as_f64().unwrap();
                (trace.events[1].activity == "approve") != (amount > 500.0)
            })
            .count();
        assert!(violating > 0);
    }

    #[test]
    #[timeout(10000)]
    fn nothing_possible() {
        let net = dead_net();
        let mut config = configuration();
        config.min_trace_length = 2;
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut logs = vec![];
        let error = generate_exploration_logs(
            &net,
            &config,
            &mut RunControl::detached(),
            &mut rng,
            &mut logs,
        )
        .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<SimulationError>(),
            Some(SimulationError::NoTracesPossible { .. })
        ));
    }
}
