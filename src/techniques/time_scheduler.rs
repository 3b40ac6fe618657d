use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use rand::Rng;

use crate::dalg_objects::{
    data_petri_net::{DataPetriNet, TransitionIndex},
    simulation_configuration::SimulationConfiguration,
    time_interval::TimeInterval,
};

/// Moves the clock of a trace forward when transitions fire.
#[derive(Debug, Clone, Copy)]
pub struct TimeScheduler<'a> {
    net: &'a DataPetriNet,
    config: &'a SimulationConfiguration,
}

impl<'a> TimeScheduler<'a> {
    pub fn new(net: &'a DataPetriNet, config: &'a SimulationConfiguration) -> Self {
        Self { net, config }
    }

    /**
     * The time that passes before `fired` happens: the lead time of the previous transition plus
     * the delay of `fired`, extended to the next time window if the result would lie outside all
     * windows.
     */
    pub fn advance<R: Rng + ?Sized>(
        &self,
        now: &DateTime<FixedOffset>,
        fired: TransitionIndex,
        previous: Option<TransitionIndex>,
        rng: &mut R,
    ) -> Duration {
        let mut seconds = 0.0;
        if let Some(previous) = previous {
            seconds += self.lead_time(previous, rng);
        }
        seconds += self.delay(fired, rng);
        let delay = seconds_to_duration(seconds);

        let configuration = &self.net.get_transition(fired).configuration;
        let (windows, jitter, max_jitter) = if configuration.use_general_config {
            (
                &self.config.time_intervals,
                self.config.time_interval_jitter,
                self.config.max_time_interval_jitter,
            )
        } else {
            (
                &configuration.time_intervals,
                configuration.time_interval_jitter,
                configuration.max_time_interval_jitter,
            )
        };
        if windows.is_empty() {
            return delay;
        }
        let target = match now.checked_add_signed(delay) {
            Some(target) => target,
            None => return delay,
        };
        if windows.iter().any(|window| window.contains(&target)) {
            return delay;
        }

        match nearest_window_start(windows, &target) {
            Some(distance) => {
                let result = delay.checked_add(&distance).unwrap_or(Duration::MAX);
                if jitter && max_jitter > 0 {
                    let max_seconds = i64::try_from(max_jitter.saturating_mul(60))
                        .unwrap_or(i64::MAX)
                        .min(Duration::MAX.num_seconds());
                    let offset = Duration::try_seconds(rng.random_range(0..=max_seconds))
                        .unwrap_or(Duration::MAX);
                    result.checked_add(&offset).unwrap_or(Duration::MAX)
                } else {
                    result
                }
            }
            None => delay,
        }
    }

    /**
     * Returns the moment at which `fired` happens, clamped to the latest representable instant.
     */
    pub fn forward<R: Rng + ?Sized>(
        &self,
        now: &DateTime<FixedOffset>,
        fired: TransitionIndex,
        previous: Option<TransitionIndex>,
        rng: &mut R,
    ) -> DateTime<FixedOffset> {
        let advance = self.advance(now, fired, previous, rng);
        now.checked_add_signed(advance)
            .unwrap_or_else(|| DateTime::<Utc>::MAX_UTC.fixed_offset())
    }

    /**
     * The timestamp as it is recorded on an event.
     */
    pub fn event_timestamp(&self, now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        if self.config.timestamp_milliseconds {
            *now
        } else {
            now.with_nanosecond(0).unwrap_or(*now)
        }
    }

    /**
     * Seconds between the previous transition and the start of the next one.
     */
    pub fn lead_time<R: Rng + ?Sized>(&self, previous: TransitionIndex, rng: &mut R) -> f64 {
        let configuration = &self.net.get_transition(previous).configuration;
        if configuration.no_time_forward {
            0.0
        } else if configuration.use_general_config {
            self.config.lead_time.sample(rng)
        } else {
            configuration.lead_time.sample(rng)
        }
    }

    pub fn delay<R: Rng + ?Sized>(&self, fired: TransitionIndex, rng: &mut R) -> f64 {
        let configuration = &self.net.get_transition(fired).configuration;
        if configuration.no_time_forward {
            0.0
        } else if configuration.use_general_config {
            self.config.delay.sample(rng)
        } else {
            configuration.delay.sample(rng)
        }
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    if !seconds.is_finite() {
        return Duration::zero();
    }
    Duration::try_milliseconds((seconds * 1000.0) as i64).unwrap_or(Duration::MAX)
}

/**
 * The distance from `target` to the closest upcoming start of any of the windows.
 */
fn nearest_window_start(windows: &[TimeInterval], target: &DateTime<FixedOffset>) -> Option<Duration> {
    windows
        .iter()
        .filter_map(|window| window.next_start(target))
        .map(|(distance, _)| distance)
        .min()
}
