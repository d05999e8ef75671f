//! Wall-clock and interval scheduling for control cycles.
//!
//! Rules are evaluated once per tick against a wall-clock timestamp and a
//! monotonic millisecond counter. Each entry carries its own last-fired
//! state so a rule fires at most once per period no matter how often the
//! tick runs.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleRule {
    /// Fires on the first evaluation and then once per `every`.
    Interval { every: Duration },
    /// Fires once per day inside `[hour:00, hour:minute_window)`.
    TimeOfDay { hour: u32, minute_window: u32 },
    /// Fires once per hour bucket where `hour % every_n_hours == 0`.
    PeriodicBucket { every_n_hours: u32 },
}

#[derive(Debug)]
struct Entry {
    rule: ScheduleRule,
    last_interval_ms: Option<u64>,
    last_day: Option<NaiveDate>,
    last_bucket: Option<(NaiveDate, u32)>,
}

impl Entry {
    fn new(rule: ScheduleRule) -> Self {
        Self {
            rule,
            last_interval_ms: None,
            last_day: None,
            last_bucket: None,
        }
    }

    fn due(&mut self, wall: NaiveDateTime, mono_ms: u64) -> bool {
        match self.rule {
            ScheduleRule::Interval { every } => {
                let every_ms = every.as_millis() as u64;
                match self.last_interval_ms {
                    Some(last) if mono_ms.saturating_sub(last) < every_ms => false,
                    _ => {
                        self.last_interval_ms = Some(mono_ms);
                        true
                    }
                }
            }
            ScheduleRule::TimeOfDay {
                hour,
                minute_window,
            } => {
                let today = wall.date();
                if wall.hour() != hour || wall.minute() >= minute_window {
                    return false;
                }
                if self.last_day == Some(today) {
                    return false;
                }
                self.last_day = Some(today);
                true
            }
            ScheduleRule::PeriodicBucket { every_n_hours } => {
                let bucket = (wall.date(), wall.hour());
                if wall.hour() % every_n_hours != 0 {
                    return false;
                }
                if self.last_bucket == Some(bucket) {
                    return false;
                }
                self.last_bucket = Some(bucket);
                true
            }
        }
    }
}

#[derive(Debug)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new(rules: Vec<ScheduleRule>) -> Self {
        Self {
            entries: rules.into_iter().map(Entry::new).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of rules due now, in declaration order. Marks them fired.
    pub fn due(&mut self, wall: NaiveDateTime, mono_ms: u64) -> Vec<usize> {
        let due: Vec<usize> = self
            .entries
            .iter_mut()
            .enumerate()
            .filter_map(|(i, e)| e.due(wall, mono_ms).then_some(i))
            .collect();
        if !due.is_empty() {
            debug!(?due, mono_ms, "schedule rules due");
        }
        due
    }
}
