use crate::{
    dalg_objects::{
        data_petri_net::DataPetriNet,
        semantic_information::SemanticInformation,
        simulation_configuration::{DefaultConfig, SimulationConfiguration},
        variable::{Value, Variable, VariableType},
    },
    marking::Marking,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn configuration() -> SimulationConfiguration {
    let mut defaults = DefaultConfig::default();
    defaults.timestamp_anchor =
        chrono::DateTime::parse_from_rfc3339("2024-01-01T08:00:00+00:00").unwrap();
    SimulationConfiguration::new(&defaults)
}

fn finish(mut net: DataPetriNet, initial: Vec<u64>, finals: Vec<Vec<u64>>) -> DataPetriNet {
    net.set_initial_marking(Marking::from_vec(initial)).unwrap();
    for marking in finals {
        net.add_final_marking(Marking::from_vec(marking)).unwrap();
    }
    net.finalize().unwrap();
    net
}

/**
 * p0 -a-> p1 and p0 -b-> p1: exactly two traces, <a> and <b>.
 */
pub fn two_path_net() -> DataPetriNet {
    let mut net = DataPetriNet::new("two paths");
    let p0 = net.add_place("p0");
    let p1 = net.add_place("p1");
    let a = net.add_transition("ta", Some("a"));
    let b = net.add_transition("tb", Some("b"));
    for t in [a, b] {
        net.add_place_transition_arc(p0, t, 1).unwrap();
        net.add_transition_place_arc(t, p1, 1).unwrap();
    }
    finish(net, vec![1, 0], vec![vec![0, 1]])
}

/**
 * t takes two tokens from p0 and puts one in p1; u reads p1 and adds a token to p2.
 */
pub fn multi_arc_net() -> DataPetriNet {
    let mut net = DataPetriNet::new("multi arc");
    let p0 = net.add_place("p0");
    let p1 = net.add_place("p1");
    let p2 = net.add_place("p2");
    let t = net.add_transition("t", Some("t"));
    let u = net.add_transition("u", Some("u"));
    net.add_place_transition_arc(p0, t, 1).unwrap();
    net.add_place_transition_arc(p0, t, 1).unwrap();
    net.add_transition_place_arc(t, p1, 1).unwrap();
    net.add_place_transition_arc(p1, u, 1).unwrap();
    net.add_transition_place_arc(u, p1, 1).unwrap();
    net.add_transition_place_arc(u, p2, 1).unwrap();
    finish(net, vec![3, 0, 0], vec![vec![1, 1, 1]])
}

/**
 * Two tokens in p0, moved one by one to p1 by the same transition; the second move ends it.
 */
pub fn repeat_net() -> DataPetriNet {
    let mut net = DataPetriNet::new("repeat");
    let p0 = net.add_place("p0");
    let p1 = net.add_place("p1");
    let t = net.add_transition("move", Some("move"));
    net.add_place_transition_arc(p0, t, 1).unwrap();
    net.add_transition_place_arc(t, p1, 1).unwrap();
    finish(net, vec![2, 0], vec![vec![0, 2]])
}

/**
 * register writes `amount` (100 or 1000); approve needs `amount > 500`, reject `amount <= 500`.
 */
pub fn guarded_choice_net() -> DataPetriNet {
    let mut net = DataPetriNet::new("guarded choice");
    let p0 = net.add_place("p0");
    let p1 = net.add_place("p1");
    let p2 = net.add_place("p2");
    net.add_variable(
        Variable::new("amount", VariableType::Integer).with_semantic_information(
            SemanticInformation::new(VariableType::Integer, None)
                .with_values(vec![Value::Integer(100), Value::Integer(1000)], vec![])
                .with_bounds(0.0, 2000.0),
        ),
    )
    .unwrap();
    let register = net.add_transition("register", Some("register"));
    let approve = net.add_transition("approve", Some("approve"));
    let reject = net.add_transition("reject", Some("reject"));
    net.add_place_transition_arc(p0, register, 1).unwrap();
    net.add_transition_place_arc(register, p1, 1).unwrap();
    for t in [approve, reject] {
        net.add_place_transition_arc(p1, t, 1).unwrap();
        net.add_transition_place_arc(t, p2, 1).unwrap();
    }
    net.add_writes_variable(register, "amount").unwrap();
    net.set_guard(approve, "amount > 500").unwrap();
    net.set_guard(reject, "amount <= 500").unwrap();
    finish(net, vec![1, 0, 0], vec![vec![0, 0, 1]])
}

/**
 * start, then any number of redo, then end.
 */
pub fn loop_net() -> DataPetriNet {
    let mut net = DataPetriNet::new("loop");
    let p0 = net.add_place("p0");
    let p1 = net.add_place("p1");
    let p2 = net.add_place("p2");
    let start = net.add_transition("start", Some("start"));
    let redo = net.add_transition("redo", Some("redo"));
    let end = net.add_transition("end", Some("end"));
    net.add_place_transition_arc(p0, start, 1).unwrap();
    net.add_transition_place_arc(start, p1, 1).unwrap();
    net.add_place_transition_arc(p1, redo, 1).unwrap();
    net.add_transition_place_arc(redo, p1, 1).unwrap();
    net.add_place_transition_arc(p1, end, 1).unwrap();
    net.add_transition_place_arc(end, p2, 1).unwrap();
    finish(net, vec![1, 0, 0], vec![vec![0, 0, 1]])
}

/**
 * An invisible transition followed by a visible one.
 */
pub fn invisible_net() -> DataPetriNet {
    let mut net = DataPetriNet::new("invisible");
    let p0 = net.add_place("p0");
    let p1 = net.add_place("p1");
    let p2 = net.add_place("p2");
    let tau = net.add_transition("tau", None);
    let a = net.add_transition("ta", Some("a"));
    net.add_place_transition_arc(p0, tau, 1).unwrap();
    net.add_transition_place_arc(tau, p1, 1).unwrap();
    net.add_place_transition_arc(p1, a, 1).unwrap();
    net.add_transition_place_arc(a, p2, 1).unwrap();
    finish(net, vec![1, 0, 0], vec![vec![0, 0, 1]])
}

/**
 * The guard of the only transition can never hold.
 */
pub fn dead_net() -> DataPetriNet {
    let mut net = DataPetriNet::new("dead");
    let p0 = net.add_place("p0");
    let p1 = net.add_place("p1");
    net.add_variable(Variable::new("x", VariableType::Integer))
        .unwrap();
    let t = net.add_transition("t", Some("t"));
    net.add_place_transition_arc(p0, t, 1).unwrap();
    net.add_transition_place_arc(t, p1, 1).unwrap();
    net.set_guard(t, "x > 1 && x < 0").unwrap();
    finish(net, vec![1, 0], vec![vec![0, 1]])
}
