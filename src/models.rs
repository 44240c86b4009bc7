use chrono::{DateTime, Duration, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::day::CalendarDay;

/// One row of the detailed report: a description plus the clock
/// segments logged against it.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeEntry {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(rename = "time_entries")]
    pub segments: Vec<TimeSegment>,
    /// Filled in after the projects lookup; display only.
    #[serde(skip)]
    pub project_name: Option<String>,
}

impl TimeEntry {
    pub fn label(&self) -> String {
        match &self.project_name {
            Some(project) => format!("{} [{}]", self.description, project),
            None => self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeSegment {
    pub start: DateTime<FixedOffset>,
    pub seconds: i64,
}

impl TimeSegment {
    /// Date of the start timestamp in the offset it was reported in.
    pub fn day(&self) -> CalendarDay {
        CalendarDay::from_date(self.start.date_naive())
    }

    /// `None` when the reported seconds do not fit a duration.
    pub fn duration(&self) -> Option<Duration> {
        self.seconds.checked_mul(1000).and_then(Duration::try_milliseconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

/// A response as handed back by the cached fetch client.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResponse {
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlipRow {
    pub day: CalendarDay,
    pub worked: Duration,
    pub slip: Duration,
    pub total_worked: Duration,
    pub total_slip: Duration,
    pub descriptions: Vec<String>,
}
