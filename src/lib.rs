pub mod dalg_objects {
    pub mod variable;
    pub mod semantic_information;
    pub mod time_interval;
    pub mod transition_configuration;
    pub mod simulation_configuration;
    pub mod data_petri_net;
    pub mod event_log;
}
pub mod dalg_framework {
    pub mod simulation_error;
    pub mod sim_status;
}
pub mod guards {
    pub mod guard;
    pub mod guard_parser;
    pub mod guard_evaluator;
    pub mod guard_analyser;
}
pub mod math {
    pub mod precision;
    pub mod interval;
    pub mod truncated_distribution;
    pub mod probabilities;
}
pub mod semantics {
    pub mod semantics;
    pub mod data_petri_net_semantics;
}
pub mod techniques {
    pub mod value_generator;
    pub mod time_scheduler;
    pub mod duplicates;
    pub mod trace_generation;
    pub mod random_generation;
    pub mod exhaustive_exploration;
    pub mod full_exploration;
}
pub mod marking;
pub mod simulation;

#[cfg(test)]
pub mod test_nets;
