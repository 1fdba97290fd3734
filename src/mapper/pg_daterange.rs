use chrono::{Days, NaiveDate};
use regex::Regex;

use super::Mapper;
use crate::core::{DbError, Result, Value};
use crate::values::{DB_DATE_FORMAT, DateRange, DateTime};

lazy_static::lazy_static! {
    static ref RANGE_LITERAL: Regex =
        Regex::new(r#"^\s*([\[(])\s*"?([^,"]*?)"?\s*,\s*"?([^,")\]]*?)"?\s*([\])])\s*$"#)
            .expect("valid range regex");
}

/// Postgres `daterange` column. Reads normalize exclusive bounds so the
/// resulting [`DateRange`] is always inclusive on both ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgDaterangeMapper;

fn parse_bound(bound: &str, literal: &str) -> Result<Option<NaiveDate>> {
    let bound = bound.trim();
    if bound.is_empty() || bound.eq_ignore_ascii_case("infinity") || bound.eq_ignore_ascii_case("-infinity") {
        return Ok(None);
    }
    NaiveDate::parse_from_str(bound, DB_DATE_FORMAT)
        .map(Some)
        .map_err(|e| DbError::MappingError(format!("PgDaterangeMapper::from_db: bad bound in '{}': {}", literal, e)))
}

fn shift(date: Option<NaiveDate>, forward: bool) -> Option<NaiveDate> {
    date.and_then(|d| {
        if forward {
            d.checked_add_days(Days::new(1))
        } else {
            d.checked_sub_days(Days::new(1))
        }
    })
}

impl Mapper for PgDaterangeMapper {
    fn name(&self) -> &'static str {
        "pg_daterange"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        match value {
            Value::DateRange(range) => Ok(Value::Text(format!(
                "[{}, {}]",
                range.start_date().format(DB_DATE_FORMAT),
                range.end_date().format(DB_DATE_FORMAT)
            ))),
            v if !v.is_truthy() => Ok(Value::Null),
            other => Err(DbError::TypeMismatch(format!(
                "PgDaterangeMapper::to_db: expected DateRange, got {}",
                other.type_name()
            ))),
        }
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        if !value.is_truthy() {
            return Ok(Value::Null);
        }
        let literal = match value {
            Value::DateRange(_) => return Ok(value.clone()),
            Value::Text(s) if s.trim().eq_ignore_ascii_case("empty") => return Ok(Value::Null),
            Value::Text(s) => s.as_str(),
            other => {
                return Err(DbError::TypeMismatch(format!(
                    "PgDaterangeMapper::from_db: expected range text, got {}",
                    other.type_name()
                )));
            }
        };

        let captures = RANGE_LITERAL
            .captures(literal)
            .ok_or_else(|| DbError::MappingError(format!("PgDaterangeMapper::from_db: bad range '{}'", literal)))?;
        let group = |idx: usize| captures.get(idx).map_or("", |m| m.as_str());

        let mut start = parse_bound(group(2), literal)?;
        let mut end = parse_bound(group(3), literal)?;
        if group(1) == "(" {
            start = shift(start, true);
        }
        if group(4) == ")" {
            end = shift(end, false);
        }

        let range = DateRange::new(
            start.map_or(DateTime::Null, DateTime::from),
            end.map_or(DateTime::Null, DateTime::from),
        )?;
        Ok(Value::DateRange(range))
    }
}
