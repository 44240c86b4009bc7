use chrono::Duration;
use futures::{Stream, TryStreamExt};
use std::collections::HashMap;
use tracing::debug;

use crate::day::CalendarDay;
use crate::error::{Result, SlipError};
use crate::models::{SlipRow, TimeEntry};

#[derive(Debug, Clone)]
pub struct SlipOptions {
    pub start: CalendarDay,
    pub end: CalendarDay,
    /// Expected time on a workday.
    pub target: Duration,
    /// Case-insensitive substring; matching entries are dropped entirely.
    pub exclude: Option<String>,
    /// Carried-over balance added to both running totals.
    pub initial: Duration,
    /// Walk one day past `end` so the current day shows up.
    pub include_next_day: bool,
}

impl SlipOptions {
    pub fn last_day(&self) -> CalendarDay {
        if self.include_next_day {
            self.end.next_day()
        } else {
            self.end
        }
    }
}

#[derive(Debug, Clone)]
pub struct DayBucket {
    pub worked: Duration,
    pub descriptions: Vec<String>,
}

impl DayBucket {
    fn empty() -> Self {
        DayBucket { worked: Duration::zero(), descriptions: Vec::new() }
    }
}

/// Per-day accumulator fed one entry at a time.
pub struct DayBuckets {
    exclude: Option<String>,
    buckets: HashMap<CalendarDay, DayBucket>,
}

impl DayBuckets {
    pub fn new(exclude: Option<&str>) -> Self {
        DayBuckets {
            exclude: exclude
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            buckets: HashMap::new(),
        }
    }

    fn is_excluded(&self, entry: &TimeEntry) -> bool {
        self.exclude
            .as_deref()
            .is_some_and(|needle| entry.description.to_lowercase().contains(needle))
    }

    /// Returns false when the entry was filtered out. The filter looks at
    /// the raw description only; buckets record the display label.
    pub fn add(&mut self, entry: &TimeEntry) -> Result<bool> {
        if self.is_excluded(entry) {
            debug!(description = %entry.description, "excluded entry");
            return Ok(false);
        }

        let label = entry.label();
        for segment in &entry.segments {
            let bucket = self.buckets.entry(segment.day()).or_insert_with(DayBucket::empty);
            let worked = segment
                .duration()
                .and_then(|d| bucket.worked.checked_add(&d))
                .ok_or_else(|| overflow(&format!("{} seconds on {}", segment.seconds, segment.day())))?;
            bucket.worked = worked;
            bucket.descriptions.push(label.clone());
        }
        Ok(true)
    }

    #[cfg(test)]
    pub fn get(&self, day: &CalendarDay) -> Option<&DayBucket> {
        self.buckets.get(day)
    }

    pub fn rows(&self, options: &SlipOptions) -> Result<Vec<SlipRow>> {
        let mut total_worked = options.initial;
        let mut total_slip = options.initial;

        options
            .start
            .through(options.last_day())
            .map(|day| -> Result<SlipRow> {
                let (worked, descriptions) = match self.buckets.get(&day) {
                    Some(bucket) => (bucket.worked, dedup(&bucket.descriptions)),
                    None => (Duration::zero(), Vec::new()),
                };

                let slip = if day.is_off() {
                    Some(worked)
                } else {
                    worked.checked_sub(&options.target)
                };
                let slip = slip.ok_or_else(|| overflow(&format!("slip on {}", day)))?;
                total_worked = total_worked
                    .checked_add(&worked)
                    .ok_or_else(|| overflow(&format!("worked total on {}", day)))?;
                total_slip = total_slip
                    .checked_add(&slip)
                    .ok_or_else(|| overflow(&format!("slip total on {}", day)))?;

                Ok(SlipRow { day, worked, slip, total_worked, total_slip, descriptions })
            })
            .collect()
    }
}

fn overflow(what: &str) -> SlipError {
    SlipError::ResponseSchemaInvalid(format!("duration out of range: {}", what))
}

fn dedup(descriptions: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for d in descriptions {
        if !seen.contains(d) {
            seen.push(d.clone());
        }
    }
    seen
}

/// Drains the entry stream, then walks the day range.
pub async fn aggregate<S>(entries: S, options: &SlipOptions) -> Result<Vec<SlipRow>>
where
    S: Stream<Item = Result<TimeEntry>>,
{
    futures::pin_mut!(entries);
    let mut buckets = DayBuckets::new(options.exclude.as_deref());

    let mut seen = 0usize;
    while let Some(entry) = entries.try_next().await? {
        buckets.add(&entry)?;
        seen += 1;
    }
    debug!(entries = seen, "aggregated entries");

    buckets.rows(options)
}
