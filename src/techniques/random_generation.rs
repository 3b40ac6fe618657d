use anyhow::Result;
use rand::Rng;

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
    math::probabilities::choose_weighted,
    semantics::{data_petri_net_semantics::DPNState, semantics::Semantics},
};

use super::{
    duplicates::trace_length,
    trace_generation::{LoopBounds, TraceGenerator, ValueSource},
};

/**
 * Walks the net from the current state by firing weighted random enabled transitions, until a
 * final marking is reached or a bound stops the walk. Returns the trace and whether it ended in
 * a final marking.
 */
pub fn generate_random_trace<R: Rng + ?Sized>(
    generator: &mut TraceGenerator,
    state: &mut DPNState,
    log: &EventLog,
    bounds: &mut LoopBounds,
    rng: &mut R,
) -> Result<(Trace, bool)> {
    let net = generator.get_net();
    let config = generator.get_config();
    let mut trace = generator.new_trace(log, rng);
    bounds.clear();
    bounds.visit_marking(net.marking_signature(state));
    let mut previous: Option<TransitionIndex> = None;

    while !net.is_final_state(state) {
        if config.is_too_long(trace_length(&trace, config)) {
            return Ok((trace, false));
        }

        let (enabled, probabilities) = net.get_enabled_transitions_with_probabilities(state, true)?;
        let transition = match choose_weighted(rng, &probabilities) {
            Some(index) => enabled[index],
            None => {
                let reached_final = net.is_final_state(state);
                return Ok((trace, reached_final));
            }
        };

        generator.fire(state, &mut trace, transition, previous, ValueSource::Generate, rng)?;
        bounds.visit_marking(net.marking_signature(state));
        bounds.visit_transition(transition);
        previous = Some(transition);

        //also when this firing reached a final marking
        if bounds.is_exceeded() {
            trace.events.pop();
            return Ok((trace, false));
        }
    }
    Ok((trace, true))
}

/**
 * Generates the configured number of logs, each with the configured number of traces, by random
 * walks through the net.
 */
pub fn generate_random_logs<R: Rng + ?Sized>(
    net: &DataPetriNet,
    config: &SimulationConfiguration,
    control: &mut RunControl,
    rng: &mut R,
    logs: &mut Vec<EventLog>,
) -> Result<RunOutcome> {
    let mut generator = TraceGenerator::new(net, config);
    let mut state = net.get_initial_state()?;
    let mut bounds = LoopBounds::new(config);
    let max_attempts = config
        .max_attempts_per_trace
        .saturating_mul(config.number_of_traces);

    while logs.len() < config.number_of_logs {
        generator.start_log();
        generator.reset(&mut state, rng)?;
        let mut log = EventLog::new(&config.log_name, &config.log_creator);
        let mut attempts = 0;

        while log.len() < config.number_of_traces {
            if control.is_stopped() {
                logs.push(log);
                return Ok(RunOutcome::Cancelled);
            }
            if attempts >= max_attempts {
                if log.is_empty() {
                    return Err(SimulationError::no_traces_possible().into());
                }
                log::warn!(
                    "gave up on log {} after {} attempts, with {} of {} traces",
                    logs.len() + 1,
                    attempts,
                    log.len(),
                    config.number_of_traces
                );
                break;
            }
            attempts += 1;

            let clock = generator.get_clock();
            let (mut trace, reached_final) =
                generate_random_trace(&mut generator, &mut state, &log, &mut bounds, rng)?;
            generator.add_trace_variables(&state, &mut trace);
            if generator.is_acceptable(&trace, reached_final, &log, config.max_trace_duplicates) {
                log::debug!("accept trace {}", trace);
                log.traces.push(trace);
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
    use std::sync::{Arc, atomic::AtomicBool};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::{
        dalg_framework::{
            sim_status::{RunControl, RunOutcome},
            simulation_error::SimulationError,
        },
        dalg_objects::{
            data_petri_net::DataPetriNet, event_log::EventLog,
            simulation_configuration::SimulationConfiguration,
        },
        marking::Marking,
        semantics::semantics::Semantics,
        techniques::trace_generation::{LoopBounds, TraceGenerator},
        test_nets::{
            configuration, dead_net, guarded_choice_net, init_logging, loop_net, repeat_net,
            two_path_net,
        },
    };

    use super::{generate_random_logs, generate_random_trace};

    fn run(
        net: &DataPetriNet,
        config: &SimulationConfiguration,
        seed: u64,
    ) -> (anyhow::Result<RunOutcome>, Vec<EventLog>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut logs = vec![];
        let mut control = RunControl::detached();
        let result = generate_random_logs(net, config, &mut control, &mut rng, &mut logs);
        (result, logs)
    }

    #[test]
    #[timeout(10000)]
    fn both_paths() {
        init_logging();
        let net = two_path_net();
        let mut config = configuration();
        config.number_of_logs = 2;
        config.number_of_traces = 2;
        config.max_trace_duplicates = 0;
        let (result, logs) = run(&net, &config, 1);
        assert_eq!(result.unwrap(), RunOutcome::Completed);
        assert_eq!(logs.len(), 2);
        for log in logs {
            let mut activities: Vec<&str> = log
                .traces
                .iter()
                .flat_map(|trace| trace.get_activities())
                .collect();
            activities.sort();
            assert_eq!(activities, vec!["a", "b"]);
        }
    }

    #[test]
    #[timeout(10000)]
    fn guards_decide() {
        init_logging();
        let net = guarded_choice_net();
        let mut config = configuration();
        config.number_of_traces = 20;
        config.max_trace_duplicates = 100;
        let (result, logs) = run(&net, &config, 2);
        result.unwrap();
        for trace in &logs[0].traces {
            let amount = trace.events[0].variables[0].value.as_f64().unwrap();
            let decision = trace.events[1].activity.as_str();
            if amount > 500.0 {
                assert_eq!(decision, "approve");
            } else {
                assert_eq!(decision, "reject");
            }
        }
    }

    #[test]
    #[timeout(10000)]
    fn bounds_hold() {
        init_logging();
        let net = loop_net();
        let mut config = configuration();
        config.number_of_traces = 30;
        config.max_trace_length = 4;
        config.max_loop_iterations = 2;
        config.max_loop_iterations_transitions = 10;
        config.max_trace_duplicates = 100;
        let (result, logs) = run(&net, &config, 3);
        result.unwrap();
        for trace in &logs[0].traces {
            assert!(trace.len() <= config.max_trace_length);

            //replay the trace and count the markings
            let mut state = net.get_initial_state().unwrap();
            let mut seen: Vec<Marking> = vec![state.get_marking().clone()];
            for event in &trace.events {
                net.execute_transition(&mut state, event.transition).unwrap();
                seen.push(state.get_marking().clone());
            }
            for marking in &seen {
                let count = seen.iter().filter(|other| *other == marking).count();
                assert!(count <= config.max_loop_iterations);
            }
        }
    }

    #[test]
    #[timeout(10000)]
    fn bound_exceeded_on_the_final_marking() {
        let net = repeat_net();
        let log = EventLog::new("log", "dalg");
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        //the second move reaches the final marking, but fires move twice
        for (max_repeats, ends, length) in [(1, false, 1), (2, true, 2)] {
            let mut config = configuration();
            config.max_loop_iterations_transitions = max_repeats;
            let mut generator = TraceGenerator::new(&net, &config);
            let mut state = net.get_initial_state().unwrap();
            generator.reset(&mut state, &mut rng).unwrap();
            let mut bounds = LoopBounds::new(&config);
            let (trace, reached_final) =
                generate_random_trace(&mut generator, &mut state, &log, &mut bounds, &mut rng)
                    .unwrap();
            assert_eq!(reached_final, ends);
            assert_eq!(trace.len(), length);
        }
    }

    #[test]
    #[timeout(10000)]
    fn no_partial_traces() {
        let net = guarded_choice_net();
        let mut config = configuration();
        config.number_of_traces = 10;
        config.max_trace_duplicates = 100;
        config.include_partial_traces = true;
        let (result, logs) = run(&net, &config, 8);
        result.unwrap();
        assert_eq!(logs[0].len(), 10);
        assert!(logs[0].traces.iter().all(|trace| trace.len() == 2));
    }

    #[test]
    #[timeout(10000)]
    fn only_ending_traces() {
        init_logging();
        let net = loop_net();
        let mut config = configuration();
        config.number_of_traces = 10;
        config.only_ending_traces = true;
        config.max_trace_duplicates = 100;
        let (result, logs) = run(&net, &config, 4);
        result.unwrap();
        for trace in &logs[0].traces {
            assert_eq!(trace.events.last().unwrap().activity, "end");
        }
    }

    #[test]
    #[timeout(10000)]
    fn fixed_seed() {
        let net = guarded_choice_net();
        let mut config = configuration();
        config.number_of_traces = 10;
        config.max_trace_duplicates = 100;
        let (_, first) = run(&net, &config, 1701);
        let (_, second) = run(&net, &config, 1701);
        let sequence = |logs: &Vec<EventLog>| -> Vec<(String, Vec<String>)> {
            logs.iter()
                .flat_map(|log| log.traces.iter())
                .flat_map(|trace| trace.events.iter())
                .map(|event| {
                    (
                        event.transition_id.clone(),
                        event.variables.iter().map(|v| v.value.to_string()).collect(),
                    )
                })
                .collect()
        };
        assert_eq!(sequence(&first), sequence(&second));
        assert_eq!(first, second);
    }

    #[test]
    #[timeout(10000)]
    fn impossible_traces() {
        init_logging();
        let net = dead_net();
        let mut config = configuration();
        config.max_attempts_per_trace = 5;
        let (result, logs) = run(&net, &config, 5);
        let error = result.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<SimulationError>(),
            Some(SimulationError::NoTracesPossible { .. })
        ));
        assert!(logs.is_empty());
    }

    #[test]
    #[timeout(10000)]
    fn cancelled() {
        let net = two_path_net();
        let config = configuration();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut logs = vec![];
        let mut control = RunControl::new(Arc::new(AtomicBool::new(true)), None);
        let outcome = generate_random_logs(&net, &config, &mut control, &mut rng, &mut logs).unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(logs.len(), 1);
        assert!(logs[0].is_empty());
    }
}
