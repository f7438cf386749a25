//! Optional `[start, end]` window on `postedAt`.
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use crate::normalize::parse_timestamp;
use crate::record::CanonicalRecord;

use super::funnel::FilterStage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("invalid {bound} date {value:?}")]
    Unparseable { bound: &'static str, value: String },
    #[error("start {start} is after end {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Inclusive time window. Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Parses caller-supplied bounds. Returns `Ok(None)` when neither bound is
    /// given, which disables the stage.
    ///
    /// A bare `YYYY-MM-DD` end date covers the whole day, through `23:59:59`.
    ///
    /// # Errors
    /// Fails when a bound cannot be parsed or `start` falls after `end`.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>, DateRangeError> {
        let start = non_blank(start)
            .map(|value| parse_bound("start", value, false))
            .transpose()?;
        let end = non_blank(end)
            .map(|value| parse_bound("end", value, true))
            .transpose()?;

        if start.is_none() && end.is_none() {
            return Ok(None);
        }
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(DateRangeError::Inverted { start, end });
            }
        }
        Ok(Some(Self { start, end }))
    }

    #[must_use]
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| instant >= start) && self.end.is_none_or(|end| instant <= end)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_bound(
    bound: &'static str,
    value: &str,
    end_of_day: bool,
) -> Result<DateTime<Utc>, DateRangeError> {
    if end_of_day {
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
            return Ok(date.and_time(last_second).and_utc());
        }
    }
    parse_timestamp(value).ok_or_else(|| DateRangeError::Unparseable {
        bound,
        value: value.to_string(),
    })
}

/// Drops records outside the window, including records without a timestamp.
#[derive(Debug, Clone, Copy)]
pub struct DateRangeStage {
    range: DateRange,
}

impl DateRangeStage {
    #[must_use]
    pub fn new(range: DateRange) -> Self {
        Self { range }
    }
}

impl FilterStage for DateRangeStage {
    fn name(&self) -> &'static str {
        "date_range"
    }

    fn apply(&self, records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        records
            .into_iter()
            .filter(|record| record.posted_at.is_some_and(|at| self.range.contains(at)))
            .collect()
    }
}
