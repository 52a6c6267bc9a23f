use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Institution local time is UTC+8 year-round.
const INSTITUTION_UTC_OFFSET_SECS: i32 = 8 * 3600;

pub fn institution_offset() -> FixedOffset {
    FixedOffset::east_opt(INSTITUTION_UTC_OFFSET_SECS).expect("UTC+8 is a valid offset")
}

/// Pin a wall-clock date and time to the institution's zone.
pub fn local_datetime(date: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
    institution_offset()
        .from_local_datetime(&date.and_time(time))
        .single()
}

/// A concrete class meeting, not a recurrence rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub name: String,
    pub location: String,
    pub begin: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// Teaching week the meeting belongs to, starting at 1
    pub week: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamRecord {
    pub name: String,
    pub location: String,
    pub begin: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTime {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Clock times of each class period ("第3节" etc.) for one term.
/// Timing can change between terms, so a table is only valid for its own term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPeriodTable {
    pub term: String,
    pub periods: BTreeMap<String, PeriodTime>,
}

impl ClassPeriodTable {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            periods: BTreeMap::new(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&PeriodTime> {
        self.periods.get(label)
    }
}
