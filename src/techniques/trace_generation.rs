use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::{
    dalg_objects::{
        data_petri_net::{DataPetriNet, TransitionIndex},
        event_log::{Event, EventLog, Trace, VariableSnapshot},
        simulation_configuration::SimulationConfiguration,
        variable::{Value, Variable, VariableState},
    },
    marking::Marking,
    math::{precision::round_to, probabilities::choose_uniform},
    semantics::{data_petri_net_semantics::DPNState, semantics::Semantics},
};

use super::{
    duplicates::{is_admissible_duplicate, trace_length},
    time_scheduler::TimeScheduler,
    value_generator::ValueGenerator,
};

/**
 * Counts how often markings and transitions recur within one trace.
 */
#[derive(Debug, Clone, Default)]
pub struct LoopBounds {
    markings: FxHashMap<Marking, usize>,
    transitions: FxHashMap<TransitionIndex, usize>,
    max_marking_visits: usize,
    max_transition_visits: usize,
    exceeded: bool,
}

impl LoopBounds {
    pub fn new(config: &SimulationConfiguration) -> Self {
        Self {
            max_marking_visits: config.max_loop_iterations,
            max_transition_visits: config.max_loop_iterations_transitions,
            ..Default::default()
        }
    }

    pub fn clear(&mut self) {
        self.markings.clear();
        self.transitions.clear();
        self.exceeded = false;
    }

    pub fn visit_marking(&mut self, marking: &Marking) {
        let count = self.markings.entry(marking.clone()).or_insert(0);
        *count += 1;
        if *count > self.max_marking_visits {
            self.exceeded = true;
        }
    }

    pub fn visit_transition(&mut self, transition: TransitionIndex) {
        let count = self.transitions.entry(transition).or_insert(0);
        *count += 1;
        if *count > self.max_transition_visits {
            self.exceeded = true;
        }
    }

    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }
}

/**
 * Hands out trace names for one log.
 */
#[derive(Debug, Clone)]
pub struct TraceNamer {
    unused: Vec<String>,
    used: FxHashMap<String, usize>,
}

impl TraceNamer {
    pub fn new(config: &SimulationConfiguration) -> Self {
        Self {
            unused: config.trace_names.clone(),
            used: config
                .trace_names
                .iter()
                .map(|name| (name.clone(), 0))
                .collect(),
        }
    }

    pub fn next_name<R: Rng + ?Sized>(
        &mut self,
        config: &SimulationConfiguration,
        log: &EventLog,
        rng: &mut R,
    ) -> String {
        let names = &config.trace_names;
        match (choose_uniform(rng, names.len()), config.allow_duplicate_trace_names) {
            (None, true) => "trace".to_string(),
            (None, false) => format!("trace{}", log.len() + 1),
            (Some(index), true) => names[index].clone(),
            (Some(index), false) => {
                if let Some(unused) = choose_uniform(rng, self.unused.len()) {
                    let name = self.unused.swap_remove(unused);
                    *self.used.entry(name.clone()).or_insert(0) += 1;
                    format!("{}1", name)
                } else {
                    let name = &names[index];
                    let count = self.used.entry(name.clone()).or_insert(0);
                    *count += 1;
                    format!("{}{}", name, count)
                }
            }
        }
    }
}

/**
 * Where the values of the variables written by a fired transition come from.
 */
#[derive(Debug, Clone, Copy)]
pub enum ValueSource<'c> {
    Generate,
    /// a value per variable index
    Assign(&'c [Option<Value>]),
}

/**
 * The machinery shared by all strategies to turn firings into events: the clock, the value
 * generator, the time scheduler and the trace names.
 */
#[derive(Debug, Clone)]
pub struct TraceGenerator<'a> {
    net: &'a DataPetriNet,
    config: &'a SimulationConfiguration,
    scheduler: TimeScheduler<'a>,
    values: ValueGenerator<'a>,
    namer: TraceNamer,
    clock: DateTime<FixedOffset>,
}

impl<'a> TraceGenerator<'a> {
    pub fn new(net: &'a DataPetriNet, config: &'a SimulationConfiguration) -> Self {
        Self {
            net,
            config,
            scheduler: TimeScheduler::new(net, config),
            values: ValueGenerator::new(net),
            namer: TraceNamer::new(config),
            clock: config.get_start_time(),
        }
    }

    pub fn get_net(&self) -> &'a DataPetriNet {
        self.net
    }

    pub fn get_config(&self) -> &'a SimulationConfiguration {
        self.config
    }

    pub fn get_value_generator(&self) -> &ValueGenerator<'a> {
        &self.values
    }

    pub fn get_clock(&self) -> DateTime<FixedOffset> {
        self.clock
    }

    pub fn set_clock(&mut self, clock: DateTime<FixedOffset>) {
        self.clock = clock;
    }

    /**
     * Prepares for a new log: fresh trace names and the clock at the start time.
     */
    pub fn start_log(&mut self) {
        self.namer = TraceNamer::new(self.config);
        self.clock = self.config.get_start_time();
    }

    /**
     * Puts the state back to the initial marking with freshly initialised variables.
     */
    pub fn reset<R: Rng + ?Sized>(&self, state: &mut DPNState, rng: &mut R) -> Result<()> {
        self.net.reset_state(state);
        self.values
            .generate_initial_values(state.get_variables_mut(), rng)
            .context("generating initial values")
    }

    /**
     * To be called after every trace attempt.
     */
    pub fn end_trace<R: Rng + ?Sized>(&mut self, state: &mut DPNState, rng: &mut R) -> Result<()> {
        self.reset(state, rng)?;
        if self.config.fixed_timestamp {
            self.clock = self.config.get_start_time();
        }
        Ok(())
    }

    pub fn new_trace<R: Rng + ?Sized>(&mut self, log: &EventLog, rng: &mut R) -> Trace {
        Trace::new(&self.namer.next_name(self.config, log, rng))
    }

    /**
     * Fires the transition, moves the clock and records the event together with the values that
     * the transition writes.
     */
    pub fn fire<R: Rng + ?Sized>(
        &mut self,
        state: &mut DPNState,
        trace: &mut Trace,
        transition: TransitionIndex,
        previous: Option<TransitionIndex>,
        source: ValueSource<'_>,
        rng: &mut R,
    ) -> Result<()> {
        self.net.execute_transition(state, transition)?;
        self.clock = self.scheduler.forward(&self.clock, transition, previous, rng);
        if self.config.values_in_origin_event {
            self.write_values(state, transition, source, rng)?;
            trace.events.push(self.create_event(state, transition));
        } else {
            trace.events.push(self.create_event(state, transition));
            self.write_values(state, transition, source, rng)?;
        }
        Ok(())
    }

    fn write_values<R: Rng + ?Sized>(
        &self,
        state: &mut DPNState,
        transition: TransitionIndex,
        source: ValueSource<'_>,
        rng: &mut R,
    ) -> Result<()> {
        let writes = self.net.get_transition(transition).get_writes_variables();
        if writes.is_empty() {
            return Ok(());
        }
        match source {
            ValueSource::Generate => {
                self.values
                    .generate_values(state, transition, rng)
                    .with_context(|| {
                        format!(
                            "generating values for transition `{}`",
                            self.net.get_transition(transition).id
                        )
                    })?;
            }
            ValueSource::Assign(values) => {
                for variable in writes {
                    if let Some(Some(value)) = values.get(*variable) {
                        state.get_variables_mut().write(*variable, value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /**
     * An event for the transition, with a snapshot of the event-scoped variables that the
     * transition includes.
     */
    pub fn create_event(&self, state: &DPNState, transition: TransitionIndex) -> Event {
        let fired = self.net.get_transition(transition);
        let variables = self
            .net
            .get_variables()
            .values()
            .enumerate()
            .filter(|(_, variable)| !variable.semantic_information.trace_variable)
            .filter(|(_, variable)| fired.configuration.includes_variable(&variable.original_name))
            .filter_map(|(index, variable)| snapshot(state.get_variables(), index, variable))
            .collect();
        Event {
            activity: fired.configuration.activity_name.clone(),
            transition,
            transition_id: fired.id.clone(),
            timestamp: self.scheduler.event_timestamp(&self.clock),
            invisible: fired.invisible,
            variables,
        }
    }

    /**
     * Records the trace-scoped variables as they are at the end of the trace.
     */
    pub fn add_trace_variables(&self, state: &DPNState, trace: &mut Trace) {
        trace.variables = self
            .net
            .get_variables()
            .values()
            .enumerate()
            .filter(|(_, variable)| variable.semantic_information.trace_variable)
            .filter_map(|(index, variable)| snapshot(state.get_variables(), index, variable))
            .collect();
    }

    /**
     * Whether the trace may join the log: it ends properly if required, it does not repeat
     * existing traces too often and it is long enough.
     */
    pub fn is_acceptable(
        &self,
        trace: &Trace,
        reached_final: bool,
        log: &EventLog,
        max_duplicates: usize,
    ) -> bool {
        (!self.config.only_ending_traces || reached_final)
            && is_admissible_duplicate(trace, log, self.config, max_duplicates)
            && trace_length(trace, self.config) >= self.config.min_trace_length
    }

    /**
     * Adds the prefixes of the trace to the log, as long as the log has room.
     */
    pub fn add_partial_traces(&self, trace: &Trace, log: &mut EventLog, max_duplicates: usize) {
        if !self.config.include_partial_traces {
            return;
        }
        for partial in determine_partial_traces(trace, self.config) {
            if log.len() >= self.config.number_of_traces {
                break;
            }
            if is_admissible_duplicate(&partial, log, self.config, max_duplicates) {
                log::debug!("add partial trace {}", partial);
                log.traces.push(partial);
            }
        }
    }
}

fn snapshot(
    variables: &VariableState,
    index: usize,
    variable: &Variable,
) -> Option<VariableSnapshot> {
    let value = match variables.get(index)? {
        Value::Double(x) => Value::Double(round_to(*x, variable.semantic_information.precision)),
        value => value.clone(),
    };
    Some(VariableSnapshot::new(
        &variable.original_name,
        value,
        variable.variable_type.type_tag(),
    ))
}

/**
 * The prefixes of a trace, longest first, that are long enough to be traces themselves.
 */
pub fn determine_partial_traces(trace: &Trace, config: &SimulationConfiguration) -> Vec<Trace> {
    let mut result = vec![];
    let mut partial = trace.clone();
    while partial.len() > 1 {
        partial.events.pop();
        if trace_length(&partial, config) >= config.min_trace_length {
            result.push(partial.clone());
        } else {
            break;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::{
        dalg_objects::{
            event_log::{EventLog, Trace},
            semantic_information::SemanticInformation,
            variable::{Value, VariableType},
        },
        marking::Marking,
        semantics::semantics::Semantics,
        test_nets::{configuration, guarded_choice_net, loop_net},
    };

    use super::{LoopBounds, TraceGenerator, TraceNamer, ValueSource, determine_partial_traces};

    #[test]
    fn loop_bounds() {
        let mut config = configuration();
        config.max_loop_iterations = 2;
        config.max_loop_iterations_transitions = 1;
        let mut bounds = LoopBounds::new(&config);
        let marking = Marking::from_vec(vec![1, 0]);
        bounds.visit_marking(&marking);
        bounds.visit_marking(&marking);
        bounds.visit_transition(0);
        assert!(!bounds.is_exceeded());
        bounds.visit_marking(&marking);
        assert!(bounds.is_exceeded());

        bounds.clear();
        bounds.visit_transition(0);
        assert!(!bounds.is_exceeded());
        bounds.visit_transition(0);
        assert!(bounds.is_exceeded());
    }

    #[test]
    fn trace_names() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut config = configuration();
        let mut log = EventLog::new("log", "dalg");
        config.trace_names = vec![];
        config.allow_duplicate_trace_names = true;
        assert_eq!(TraceNamer::new(&config).next_name(&config, &log, &mut rng), "trace");
        config.allow_duplicate_trace_names = false;
        log.traces.push(Trace::new("trace1"));
        assert_eq!(TraceNamer::new(&config).next_name(&config, &log, &mut rng), "trace2");

        config.trace_names = vec!["case".to_string(), "order".to_string()];
        let mut namer = TraceNamer::new(&config);
        let names: Vec<String> = (0..4)
            .map(|_| namer.next_name(&config, &log, &mut rng))
            .collect();
        //after both names were used once, the counters go up
        assert!(names[..2].contains(&"case1".to_string()));
        assert!(names[..2].contains(&"order1".to_string()));
        assert!(names[2..].iter().all(|name| name.ends_with('2') || name.ends_with('3')));

        config.allow_duplicate_trace_names = true;
        let name = namer.next_name(&config, &log, &mut rng);
        assert!(name == "case" || name == "order");
    }

    #[test]
    fn events_carry_values() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let net = guarded_choice_net();
        let config = configuration();
        let mut generator = TraceGenerator::new(&net, &config);
        let mut state = net.get_initial_state().unwrap();
        generator.reset(&mut state, &mut rng).unwrap();
        let log = EventLog::new("log", "dalg");
        let mut trace = generator.new_trace(&log, &mut rng);

        generator
            .fire(&mut state, &mut trace, 0, None, ValueSource::Generate, &mut rng)
            .unwrap();
        let event = &trace.events[0];
        assert_eq!(event.activity, "register");
        assert_eq!(event.variables.len(), 1);
        assert_eq!(event.variables[0].name, "amount");
        assert_eq!(event.variables[0].type_tag, "int");
        assert!(
            event.variables[0].value == Value::Integer(100)
                || event.variables[0].value == Value::Integer(1000)
        );
        assert!(event.timestamp >= config.get_start_time());
    }

    #[test]
    fn values_after_the_event() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let net = guarded_choice_net();
        let mut config = configuration();
        config.values_in_origin_event = false;
        let mut generator = TraceGenerator::new(&net, &config);
        let mut state = net.get_initial_state().unwrap();
        generator.reset(&mut state, &mut rng).unwrap();
        let mut trace = Trace::new("t");

        let assigned = vec![Some(Value::Integer(1000))];
        generator
            .fire(&mut state, &mut trace, 0, None, ValueSource::Assign(&assigned), &mut rng)
            .unwrap();
        assert!(trace.events[0].variables.is_empty());
        generator
            .fire(&mut state, &mut trace, 1, Some(0), ValueSource::Generate, &mut rng)
            .unwrap();
        assert_eq!(trace.events[1].variables[0].value, Value::Integer(1000));
        assert!(trace.events[1].timestamp >= trace.events[0].timestamp);
    }

    #[test]
    fn trace_variables() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut net = guarded_choice_net();
        let variable = net.get_variable_mut(0).unwrap();
        variable.semantic_information = SemanticInformation::new(VariableType::Integer, None)
            .with_values(vec![Value::Integer(1000)], vec![]);
        variable.semantic_information.trace_variable = true;
        let config = configuration();
        let mut generator = TraceGenerator::new(&net, &config);
        let mut state = net.get_initial_state().unwrap();
        generator.reset(&mut state, &mut rng).unwrap();
        let mut trace = Trace::new("t");
        generator
            .fire(&mut state, &mut trace, 0, None, ValueSource::Generate, &mut rng)
            .unwrap();
        assert!(trace.events[0].variables.is_empty());
        generator.add_trace_variables(&state, &mut trace);
        assert_eq!(trace.variables.len(), 1);
        assert_eq!(trace.variables[0].value, Value::Integer(1000));
    }

    #[test]
    fn partial_traces() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let net = loop_net();
        let mut config = configuration();
        config.min_trace_length = 2;
        let mut generator = TraceGenerator::new(&net, &config);
        let mut state = net.get_initial_state().unwrap();
        generator.reset(&mut state, &mut rng).unwrap();
        let mut trace = Trace::new("t");
        for (transition, previous) in [(0, None), (1, Some(0)), (1, Some(1)), (2, Some(1))] {
            generator
                .fire(&mut state, &mut trace, transition, previous, ValueSource::Generate, &mut rng)
                .unwrap();
        }
        assert!(net.is_final_state(&state));

        let partials = determine_partial_traces(&trace, &config);
        let lengths: Vec<usize> = partials.iter().map(|partial| partial.len()).collect();
        assert_eq!(lengths, vec![3, 2]);
        assert_eq!(partials[0].get_transition_ids(), vec!["start", "redo", "redo"]);
        generator.end_trace(&mut state, &mut rng).unwrap();
        assert_eq!(state.get_marking(), net.get_initial_marking());
    }
}
