use std::fmt;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{DbError, Result};

pub const DB_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DB_DATE_FORMAT: &str = "%Y-%m-%d";
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

lazy_static::lazy_static! {
    static ref TIMEZONE_SUFFIX: Regex =
        Regex::new(r"^(.*\d{2}:\d{2}(?::\d{2})?(?:\.\d+)?)\s*(?:Z|[+-]\d{2}(?::?\d{2})?)$")
            .expect("valid timezone regex");
}

const PARSE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A timestamp that may be the null date.
///
/// The null date is what a `NULL` timestamp column reads back as. It is
/// falsy, renders as an empty string and sorts before every real date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum DateTime {
    #[default]
    Null,
    At(NaiveDateTime),
}

impl DateTime {
    pub fn null() -> Self {
        Self::Null
    }

    pub fn new(at: NaiveDateTime) -> Self {
        Self::At(at)
    }

    /// Current local wall-clock time, truncated to seconds.
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        Self::At(now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn from_ymd_hms(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, min, sec))
            .map(Self::At)
            .ok_or_else(|| {
                DbError::InvalidArgument(format!(
                    "Invalid date {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                ))
            })
    }

    /// Parses database and ISO timestamps. A trailing zone offset is ignored,
    /// a bare date means midnight.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::Null);
        }
        let local = TIMEZONE_SUFFIX.replace(trimmed, "$1");
        let local = local.trim();

        for format in PARSE_FORMATS {
            if let Ok(at) = NaiveDateTime::parse_from_str(local, format) {
                return Ok(Self::At(at));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(local, DB_DATE_FORMAT) {
            return Ok(Self::from(date));
        }

        Err(DbError::MappingError(format!("Cannot parse date/time from '{}'", input)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn naive(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Null => None,
            Self::At(at) => Some(*at),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.naive().map(|at| at.date())
    }

    /// `strftime` rendering; the null date formats as an empty string.
    pub fn format(&self, format: &str) -> String {
        match self {
            Self::Null => String::new(),
            Self::At(at) => at.format(format).to_string(),
        }
    }

    pub fn to_db_string(&self) -> Option<String> {
        self.naive().map(|at| at.format(DB_DATETIME_FORMAT).to_string())
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::At(at) => write!(f, "{}", at.format(ISO_DATETIME_FORMAT)),
        }
    }
}

impl From<NaiveDateTime> for DateTime {
    fn from(at: NaiveDateTime) -> Self {
        Self::At(at)
    }
}

impl From<NaiveDate> for DateTime {
    fn from(date: NaiveDate) -> Self {
        Self::At(date.and_time(chrono::NaiveTime::MIN))
    }
}

impl std::str::FromStr for DateTime {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
