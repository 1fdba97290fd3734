use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::datetime::{DB_DATE_FORMAT, DB_DATETIME_FORMAT, DateTime};
use crate::core::{DbError, Result};

/// Lower bound used when a range starts at the null date.
pub const OPEN_RANGE_START: (i32, u32, u32) = (1970, 1, 1);
/// Upper bound used when a range ends at the null date.
pub const OPEN_RANGE_END: (i32, u32, u32) = (2020, 1, 1);

/// An inclusive range of whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

fn fallback(bound: (i32, u32, u32)) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(bound.0, bound.1, bound.2)
        .ok_or_else(|| DbError::InvalidArgument(format!("Invalid range bound {:?}", bound)))
}

impl DateRange {
    /// Builds a range from two timestamps; only their dates are kept.
    pub fn new(start: DateTime, end: DateTime) -> Result<Self> {
        let start = match start.date() {
            Some(date) => date,
            None => fallback(OPEN_RANGE_START)?,
        };
        let end = match end.date() {
            Some(date) => date,
            None => fallback(OPEN_RANGE_END)?,
        };
        Self::from_dates(start, end)
    }

    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DbError::InvalidArgument(format!(
                "Range start {} is after end {}",
                start.format(DB_DATE_FORMAT),
                end.format(DB_DATE_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end
    }

    /// Start of the first day.
    pub fn start(&self) -> DateTime {
        DateTime::At(self.start.and_time(NaiveTime::MIN))
    }

    /// Last second of the last day.
    pub fn end(&self) -> DateTime {
        match NaiveTime::from_hms_opt(23, 59, 59) {
            Some(time) => DateTime::At(self.end.and_time(time)),
            None => DateTime::At(self.end.and_time(NaiveTime::MIN)),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, both bounds included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start().format(DB_DATETIME_FORMAT),
            self.end().format(DB_DATETIME_FORMAT)
        )
    }
}
