use anyhow::{Context, Error, Result, anyhow};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    str::FromStr,
};

pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A weekly recurring window in which events may happen, written as `Mon,Tue|08:00:00-17:00:00`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub weekdays: Vec<Weekday>,
    pub start: NaiveTime,
    pub stop: NaiveTime,
}

impl TimeInterval {
    pub fn contains(&self, time: &DateTime<FixedOffset>) -> bool {
        self.weekdays.contains(&time.weekday())
            && self.start <= time.time()
            && time.time() <= self.stop
    }

    /**
     * Returns the first start of this window at or after `target`, together with the distance to it.
     */
    pub fn next_start(
        &self,
        target: &DateTime<FixedOffset>,
    ) -> Option<(Duration, DateTime<FixedOffset>)> {
        if self.weekdays.is_empty() {
            return None;
        }
        let offset = *target.offset();
        let mut start = offset
            .from_local_datetime(&target.date_naive().and_time(self.start))
            .single()?;

        if !(self.weekdays.contains(&target.weekday()) && start >= *target) {
            if start <= *target {
                start = start.checked_add_signed(Duration::days(1))?;
            }
            for _ in 0..7 {
                if self.weekdays.contains(&start.weekday()) {
                    break;
                }
                start = start.checked_add_signed(Duration::days(1))?;
            }
        }
        Some((start - *target, start))
    }
}

impl FromStr for TimeInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let text: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let (weekdays, times) = text
            .split_once('|')
            .ok_or_else(|| anyhow!("time interval `{}` lacks a `|`", s))?;
        let weekdays = weekdays
            .split(',')
            .map(|weekday| {
                weekday
                    .parse::<Weekday>()
                    .map_err(|_| anyhow!("`{}` is not a day of the week", weekday))
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("reading time interval `{}`", s))?;
        let (start, stop) = times
            .split_once('-')
            .ok_or_else(|| anyhow!("time interval `{}` lacks a `-`", s))?;
        let start = NaiveTime::parse_from_str(start, TIME_FORMAT)
            .with_context(|| format!("reading the start of time interval `{}`", s))?;
        let stop = NaiveTime::parse_from_str(stop, TIME_FORMAT)
            .with_context(|| format!("reading the end of time interval `{}`", s))?;
        Ok(Self {
            weekdays,
            start,
            stop,
        })
    }
}

impl Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let weekdays: Vec<String> = self.weekdays.iter().map(|day| day.to_string()).collect();
        write!(
            f,
            "{}|{}-{}",
            weekdays.join(","),
            self.start.format(TIME_FORMAT),
            self.stop.format(TIME_FORMAT)
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Weekday};

    use super::TimeInterval;

    #[test]
    fn parse_time_interval() {
        let interval = "Mon, Tue | 08:00:00-17:00:00".parse::<TimeInterval>().unwrap();
        assert_eq!(interval.weekdays, vec![Weekday::Mon, Weekday::Tue]);
        assert_eq!(interval.to_string(), "Mon,Tue|08:00:00-17:00:00");
        assert!("Mon|08:00".parse::<TimeInterval>().is_err());
        assert!("Someday|08:00:00-09:00:00".parse::<TimeInterval>().is_err());
    }

    #[test]
    fn next_start() {
        let interval = "Mon|08:00:00-17:00:00".parse::<TimeInterval>().unwrap();
        //a Saturday
        let target = DateTime::parse_from_rfc3339("2024-01-06T10:00:00+00:00").unwrap();
        assert!(!interval.contains(&target));
        let (distance, start) = interval.next_start(&target).unwrap();
        assert_eq!(
            start,
            DateTime::parse_from_rfc3339("2024-01-08T08:00:00+00:00").unwrap()
        );
        assert_eq!(distance, Duration::hours(46));

        let monday_early = DateTime::parse_from_rfc3339("2024-01-08T07:00:00+00:00").unwrap();
        assert_eq!(interval.next_start(&monday_early).unwrap().0, Duration::hours(1));

        let monday_inside = DateTime::parse_from_rfc3339("2024-01-08T09:00:00+00:00").unwrap();
        assert!(interval.contains(&monday_inside));
    }
}
