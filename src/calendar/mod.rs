//! Simulated Trading Calendar
//!
//! A logical clock with no wall-clock time behind it. Hour 0 is the opening
//! state of a run; each `advance_hour` moves it by one.
//!
//! Trading schedule:
//! - 8 hours per trading day
//! - Mid-day news at hour 4 of each day (`hour % 8 == 4`)
//! - End-of-day news at hour 8 of each day (`hour % 8 == 0`)

use serde::{Deserialize, Serialize};

/// Simulation hour (0 = run start)
pub type Hour = u32;

/// Trading day (0-indexed)
pub type Day = u32;

/// Hours in one trading day
pub const HOURS_PER_DAY: Hour = 8;

/// Hour of the day at which mid-day events fire
pub const MID_DAY_HOUR: Hour = 4;

/// Trading day an elapsed hour belongs to.
///
/// Hours 1..=8 are day 0, 9..=16 day 1, and so on. Hour 0 is treated as day 0.
pub fn day_of(hour: Hour) -> Day {
    hour.saturating_sub(1) / HOURS_PER_DAY
}

/// Point in the day at which the event selector runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerPoint {
    MidDay,
    EndOfDay,
}

/// Clock for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    total_hours: Hour,
}

impl Calendar {
    pub fn new(total_hours: Hour) -> Self {
        Self { total_hours }
    }

    pub fn total_hours(&self) -> Hour {
        self.total_hours
    }

    /// Number of trading days in the run (partial days round up)
    pub fn trading_days(&self) -> u32 {
        (self.total_hours + HOURS_PER_DAY - 1) / HOURS_PER_DAY
    }

    pub fn is_complete(&self, hour: Hour) -> bool {
        hour >= self.total_hours
    }

    pub fn is_mid_day(&self, hour: Hour) -> bool {
        hour % HOURS_PER_DAY == MID_DAY_HOUR
    }

    /// Hour 0 is the opening bell, not a close.
    pub fn is_end_of_day(&self, hour: Hour) -> bool {
        hour > 0 && hour % HOURS_PER_DAY == 0
    }

    /// Which selector pass, if any, runs at this hour
    pub fn trigger_point(&self, hour: Hour) -> Option<TriggerPoint> {
        if self.is_mid_day(hour) {
            Some(TriggerPoint::MidDay)
        } else if self.is_end_of_day(hour) {
            Some(TriggerPoint::EndOfDay)
        } else {
            None
        }
    }

    /// Format an hour as a human-readable string
    pub fn format(&self, hour: Hour) -> String {
        if hour == 0 {
            return "Day 1 open".to_string();
        }
        let hour_of_day = (hour - 1) % HOURS_PER_DAY + 1;
        format!("Day {} H{}", day_of(hour) + 1, hour_of_day)
    }
}

impl Default for Calendar {
    /// Ten trading days, the length of a standard game.
    fn default() -> Self {
        Self::new(80)
    }
}
