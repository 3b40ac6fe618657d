use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::{time_interval::TimeInterval, transition_configuration::TimeDistribution};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum SimulationStrategy {
    /// weighted random walks through the net
    #[strum(serialize = "random")]
    Random,

    /// enumerate the reachable traces, then replay them with time and data
    #[strum(serialize = "random_exploration")]
    RandomExploration,

    /// enumerate the reachable traces and search a variable assignment for each of them
    #[strum(serialize = "all_traces", serialize = "full_exploration")]
    FullExploration,
}

/// The values a fresh configuration starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultConfig {
    pub strategy: SimulationStrategy,
    pub number_of_logs: usize,
    pub log_name: String,
    pub log_creator: String,
    pub number_of_traces: usize,
    pub max_trace_length: usize,
    pub min_trace_length: usize,
    pub max_loop_iterations: usize,
    pub max_trace_duplicates: usize,
    pub allow_duplicate_trace_names: bool,
    pub duplicates_with_data_perspective: bool,
    pub only_ending_traces: bool,
    pub include_partial_traces: bool,
    pub timestamp_anchor: DateTime<FixedOffset>,
    pub utc_offset: i32,
    pub fixed_timestamp: bool,
    pub delay: TimeDistribution,
    pub lead_time: TimeDistribution,
    pub seed: u64,
    pub values_in_origin_event: bool,
    pub include_invisible_transitions_in_log: bool,
    pub duplicates_with_invisible_transitions: bool,
    pub merge_intervals: bool,
    pub precision: u32,
    pub trace_names: Vec<String>,
    pub timestamp_milliseconds: bool,
    pub max_attempts_per_trace: usize,
    pub replay_respects_guards: bool,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            strategy: SimulationStrategy::Random,
            number_of_logs: 1,
            log_name: "log".to_string(),
            log_creator: "dalg".to_string(),
            number_of_traces: 1,
            max_trace_length: 10,
            min_trace_length: 1,
            max_loop_iterations: 3,
            max_trace_duplicates: 1,
            allow_duplicate_trace_names: false,
            duplicates_with_data_perspective: false,
            only_ending_traces: false,
            include_partial_traces: false,
            timestamp_anchor: Utc::now().fixed_offset(),
            utc_offset: 0,
            fixed_timestamp: false,
            delay: TimeDistribution::new(600.0, 60.0, 0.0, 10.0),
            lead_time: TimeDistribution::new(180.0, 180.0, 0.0, 360.0),
            seed: 1701,
            values_in_origin_event: true,
            include_invisible_transitions_in_log: false,
            duplicates_with_invisible_transitions: false,
            merge_intervals: true,
            precision: 2,
            trace_names: vec!["trace".to_string()],
            timestamp_milliseconds: true,
            max_attempts_per_trace: 1000,
            replay_respects_guards: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfiguration {
    pub strategy: SimulationStrategy,
    pub number_of_logs: usize,
    pub log_name: String,
    pub log_creator: String,
    pub number_of_traces: usize,
    pub max_trace_length: usize,
    pub min_trace_length: usize,
    /// how often a marking may recur within one trace
    pub max_loop_iterations: usize,
    /// how often a transition may recur within one trace
    pub max_loop_iterations_transitions: usize,
    pub max_trace_duplicates: usize,
    pub allow_duplicate_trace_names: bool,
    pub duplicates_with_data_perspective: bool,
    pub only_ending_traces: bool,
    pub include_partial_traces: bool,
    pub timestamp_anchor: DateTime<FixedOffset>,
    /// hours
    pub utc_offset: i32,
    /// every trace starts at the anchor
    pub fixed_timestamp: bool,
    pub delay: TimeDistribution,
    pub lead_time: TimeDistribution,
    pub time_intervals: Vec<TimeInterval>,
    pub time_interval_jitter: bool,
    /// minutes
    pub max_time_interval_jitter: u64,
    pub seed: u64,
    pub trace_names: Vec<String>,
    pub values_in_origin_event: bool,
    pub include_invisible_transitions_in_log: bool,
    pub duplicates_with_invisible_transitions: bool,
    pub merge_intervals: bool,
    pub timestamp_milliseconds: bool,
    pub max_attempts_per_trace: usize,
    pub replay_respects_guards: bool,
}

impl SimulationConfiguration {
    pub fn new(defaults: &DefaultConfig) -> Self {
        Self {
            strategy: defaults.strategy,
            number_of_logs: defaults.number_of_logs,
            log_name: defaults.log_name.clone(),
            log_creator: defaults.log_creator.clone(),
            number_of_traces: defaults.number_of_traces,
            max_trace_length: defaults.max_trace_length,
            min_trace_length: defaults.min_trace_length,
            max_loop_iterations: defaults.max_loop_iterations,
            max_loop_iterations_transitions: defaults.max_loop_iterations,
            max_trace_duplicates: defaults.max_trace_duplicates,
            allow_duplicate_trace_names: defaults.allow_duplicate_trace_names,
            duplicates_with_data_perspective: defaults.duplicates_with_data_perspective,
            only_ending_traces: defaults.only_ending_traces,
            include_partial_traces: defaults.include_partial_traces,
            timestamp_anchor: defaults.timestamp_anchor,
            utc_offset: defaults.utc_offset,
            fixed_timestamp: defaults.fixed_timestamp,
            delay: defaults.delay,
            lead_time: defaults.lead_time,
            time_intervals: vec![],
            time_interval_jitter: false,
            max_time_interval_jitter: 0,
            seed: defaults.seed,
            trace_names: defaults.trace_names.clone(),
            values_in_origin_event: defaults.values_in_origin_event,
            include_invisible_transitions_in_log: defaults.include_invisible_transitions_in_log,
            duplicates_with_invisible_transitions: defaults.duplicates_with_invisible_transitions,
            merge_intervals: defaults.merge_intervals,
            timestamp_milliseconds: defaults.timestamp_milliseconds,
            max_attempts_per_trace: defaults.max_attempts_per_trace,
            replay_respects_guards: defaults.replay_respects_guards,
        }
    }

    /**
     * The anchor with its wall-clock time kept and its offset replaced by the configured UTC offset.
     */
    pub fn get_start_time(&self) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset * 3600)
            .and_then(|offset| {
                offset
                    .from_local_datetime(&self.timestamp_anchor.naive_local())
                    .single()
            })
            .unwrap_or(self.timestamp_anchor)
    }

    /**
     * The bound on the length of a trace, respecting whether invisible events count.
     */
    pub fn is_too_long(&self, length: usize) -> bool {
        length >= self.max_trace_length
    }
}

impl Default for SimulationConfiguration {
    fn default() -> Self {
        Self::new(&DefaultConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::DateTime;

    use super::{DefaultConfig, SimulationConfiguration, SimulationStrategy};

    #[test]
    fn strategy_names() {
        assert_eq!(
            SimulationStrategy::from_str("random_exploration").unwrap(),
            SimulationStrategy::RandomExploration
        );
        assert_eq!(
            SimulationStrategy::from_str("full_exploration").unwrap(),
            SimulationStrategy::FullExploration
        );
        assert_eq!(SimulationStrategy::Random.to_string(), "random");
    }

    #[test]
    fn start_time_offset() {
        let mut config = SimulationConfiguration::new(&DefaultConfig::default());
        config.timestamp_anchor = DateTime::parse_from_rfc3339("2024-01-01T10:00:00+00:00").unwrap();
        config.utc_offset = 2;
        assert_eq!(
            config.get_start_time().to_rfc3339(),
            "2024-01-01T10:00:00+02:00"
        );
    }

    #[test]
    fn configuration_serializes() {
        let config = SimulationConfiguration::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SimulationConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
