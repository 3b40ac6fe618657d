use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::truncated_distribution::sample_truncated_normal;

use super::time_interval::TimeInterval;

/// A truncated normal distribution of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeDistribution {
    pub mean: f64,
    pub standard_deviation: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl TimeDistribution {
    pub fn new(mean: f64, standard_deviation: f64, minimum: f64, maximum: f64) -> Self {
        Self {
            mean,
            standard_deviation,
            minimum,
            maximum,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        sample_truncated_normal(
            rng,
            self.mean,
            self.standard_deviation,
            self.minimum,
            self.maximum,
        )
    }
}

/// How a single transition fires: its name in the log, its weight and its timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfiguration {
    pub activity_name: String,
    pub weight: f64,
    /// take timing and time intervals from the simulation configuration
    pub use_general_config: bool,
    pub no_time_forward: bool,
    pub delay: TimeDistribution,
    pub lead_time: TimeDistribution,
    /// original names of the variables that are recorded on the events of this transition
    pub included_variables: Vec<String>,
    pub time_intervals: Vec<TimeInterval>,
    pub time_interval_jitter: bool,
    /// minutes
    pub max_time_interval_jitter: u64,
}

impl TransitionConfiguration {
    pub fn new(transition_id: &str) -> Self {
        Self {
            activity_name: transition_id.to_string(),
            weight: 1.0,
            use_general_config: true,
            no_time_forward: false,
            delay: TimeDistribution::new(0.0, 1.0, 0.0, 1.0),
            lead_time: TimeDistribution::new(0.0, 1.0, 0.0, 1.0),
            included_variables: vec![],
            time_intervals: vec![],
            time_interval_jitter: false,
            max_time_interval_jitter: 0,
        }
    }

    pub fn includes_variable(&self, original_name: &str) -> bool {
        self.included_variables
            .iter()
            .any(|name| name == original_name)
    }
}
