//! Daily reminder times per learner.
//! The host runs the clock; this only answers "whose reminder fell into this window".

use super::UserId;
use crate::error::{Result, ReviewError};
use chrono::{NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

/// Parses a reminder time of day such as `"20:00"`.
pub fn parse_reminder_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ReviewError::InvalidReminderTime(raw.to_string()))
}

#[derive(Clone, Debug, Default)]
pub struct ReminderSchedule {
    times: BTreeMap<UserId, NaiveTime>,
}

impl ReminderSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, user: UserId, time: NaiveTime) {
        self.times.insert(user, time);
    }

    pub fn remove(&mut self, user: UserId) -> Option<NaiveTime> {
        self.times.remove(&user)
    }

    pub fn get(&self, user: UserId) -> Option<NaiveTime> {
        self.times.get(&user).copied()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Users whose reminder time of day occurs in `(from, to]`.
    /// Windows spanning midnight or several days are handled; an empty or
    /// reversed window yields nobody.
    pub fn due_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<UserId> {
        if to <= from {
            return Vec::new();
        }

        self.times
            .iter()
            .filter(|(_, time)| {
                // First occurrence of this time of day strictly after `from`
                let mut occurrence = from.date().and_time(**time);
                if occurrence <= from {
                    occurrence += chrono::Duration::days(1);
                }
                occurrence <= to
            })
            .map(|(user, _)| *user)
            .collect()
    }
}
