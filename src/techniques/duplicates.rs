use crate::dalg_objects::{
    event_log::{Event, EventLog, Trace},
    simulation_configuration::SimulationConfiguration,
};

/**
 * The length of a trace as it counts against the length bounds.
 */
pub fn trace_length(trace: &Trace, config: &SimulationConfiguration) -> usize {
    if config.include_invisible_transitions_in_log {
        trace.len()
    } else {
        trace.events.iter().filter(|event| !event.invisible).count()
    }
}

fn comparable_events(trace: &Trace, with_invisible: bool) -> impl Iterator<Item = &Event> {
    trace
        .events
        .iter()
        .filter(move |event| with_invisible || !event.invisible)
}

/**
 * Two traces are duplicates if they fire the same transitions in the same order and, when the
 * data perspective is considered, record the same variable values on every event.
 */
pub fn are_duplicates(a: &Trace, b: &Trace, config: &SimulationConfiguration) -> bool {
    let with_invisible = config.duplicates_with_invisible_transitions;
    if comparable_events(a, with_invisible).count() != comparable_events(b, with_invisible).count()
    {
        return false;
    }

    comparable_events(a, with_invisible)
        .zip(comparable_events(b, with_invisible))
        .all(|(event_a, event_b)| {
            if event_a.transition_id != event_b.transition_id {
                return false;
            }
            if config.duplicates_with_data_perspective {
                event_a.variables.len() == event_b.variables.len()
                    && event_a.sorted_variables() == event_b.sorted_variables()
            } else {
                true
            }
        })
}

/**
 * The number of traces in the log that are duplicates of the given trace.
 */
pub fn count_duplicates(trace: &Trace, log: &EventLog, config: &SimulationConfiguration) -> usize {
    log.traces
        .iter()
        .filter(|other| are_duplicates(trace, other, config))
        .count()
}

/**
 * Whether one more copy of the trace keeps the log within the duplicate tolerance.
 */
pub fn is_admissible_duplicate(
    trace: &Trace,
    log: &EventLog,
    config: &SimulationConfiguration,
    max_duplicates: usize,
) -> bool {
    count_duplicates(trace, log, config) <= max_duplicates
}
