use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use super::{data_petri_net::TransitionIndex, variable::Value};

/// The value of one variable as recorded on an event or a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    pub name: String,
    pub value: Value,
    pub type_tag: String,
}

impl VariableSnapshot {
    pub fn new(name: &str, value: Value, type_tag: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            type_tag: type_tag.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub activity: String,
    pub transition: TransitionIndex,
    pub transition_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub invisible: bool,
    pub variables: Vec<VariableSnapshot>,
}

impl Event {
    /**
     * The variable snapshots in a canonical order, for comparisons that ignore the recording order.
     */
    pub fn sorted_variables(&self) -> Vec<&VariableSnapshot> {
        let mut result: Vec<&VariableSnapshot> = self.variables.iter().collect();
        result.sort_by(|a, b| a.name.cmp(&b.name).then(a.value.sort_key_cmp(&b.value)));
        result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    pub events: Vec<Event>,
    /// trace-scoped variables
    pub variables: Vec<VariableSnapshot>,
}

impl Trace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: vec![],
            variables: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get_transition_ids(&self) -> Vec<&str> {
        self.events
            .iter()
            .map(|event| event.transition_id.as_str())
            .collect()
    }

    pub fn get_activities(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.activity.as_str()).collect()
    }
}

impl Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: <{}>", self.name, self.get_activities().join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub name: String,
    pub creator: String,
    pub traces: Vec<Trace>,
}

impl EventLog {
    pub fn new(name: &str, creator: &str) -> Self {
        Self {
            name: name.to_string(),
            creator: creator.to_string(),
            traces: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn get_number_of_events(&self) -> usize {
        self.traces.iter().map(|trace| trace.len()).sum()
    }

    pub fn contains_trace_name(&self, name: &str) -> bool {
        self.traces.iter().any(|trace| trace.name == name)
    }
}

impl Display for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "event log `{}` with {} traces and {} events",
            self.name,
            self.len(),
            self.get_number_of_events()
        )?;
        for trace in self.traces.iter() {
            writeln!(f, "{}", trace)?;
        }
        Ok(())
    }
}
