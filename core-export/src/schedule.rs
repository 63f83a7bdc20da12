//! # Schedule Specifications
//!
//! The two policies that govern when a worker fires: a fixed interval, or a
//! specific clock time each day. Occurrence arithmetic lives here as pure
//! functions so it can be tested without a running worker.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Scheduling policy for one worker.
///
/// Exactly one worker exists per spec instance. Several `DailyClock` specs
/// may be active at once (one worker each); only one `Interval` worker may
/// be active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleSpec {
    /// Fire every `period`, starting immediately.
    Interval {
        /// Time between cycle starts; must be positive.
        period: Duration,
    },
    /// Fire once per day at `time_of_day` (host timezone).
    DailyClock {
        /// Wall-clock trigger time.
        time_of_day: NaiveTime,
    },
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleSpec::Interval { period } => write!(f, "interval {}s", period.as_secs()),
            ScheduleSpec::DailyClock { time_of_day } => {
                write!(f, "daily {}", time_of_day.format("%H:%M:%S"))
            }
        }
    }
}

/// Next occurrence of `time_of_day` strictly after `now`.
///
/// If today's occurrence has already passed (or is exactly now), the
/// occurrence is tomorrow's.
pub fn next_occurrence(now: NaiveDateTime, time_of_day: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(time_of_day);
    if now < today {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn on(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_next_occurrence_later_today() {
        assert_eq!(next_occurrence(on(15, 9, 0, 0), at(14, 30, 0)), on(15, 14, 30, 0));
    }

    #[test]
    fn test_next_occurrence_already_passed() {
        assert_eq!(next_occurrence(on(15, 16, 0, 0), at(14, 30, 0)), on(16, 14, 30, 0));
    }

    #[test]
    fn test_next_occurrence_exactly_now_is_tomorrow() {
        assert_eq!(
            next_occurrence(on(15, 14, 30, 0), at(14, 30, 0)),
            on(16, 14, 30, 0)
        );
    }

    #[test]
    fn test_schedule_display() {
        let interval = ScheduleSpec::Interval {
            period: Duration::from_secs(300),
        };
        assert_eq!(interval.to_string(), "interval 300s");

        let clock = ScheduleSpec::DailyClock {
            time_of_day: at(14, 30, 0),
        };
        assert_eq!(clock.to_string(), "daily 14:30:00");
    }
}
