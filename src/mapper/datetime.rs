use super::Mapper;
use crate::core::{DbError, Result, Value};
use crate::values::DateTime;

/// `timestamp` column. `NULL` reads back as the null date, never as `NULL`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatetimeMapper;

impl Mapper for DatetimeMapper {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        match value {
            Value::DateTime(dt) => Ok(Value::from(dt.to_db_string())),
            v if !v.is_truthy() => Ok(Value::Null),
            other => Err(DbError::TypeMismatch(format!(
                "DatetimeMapper::to_db: expected DateTime, got {}",
                other.type_name()
            ))),
        }
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::DateTime(DateTime::Null)),
            Value::DateTime(_) => Ok(value.clone()),
            Value::Text(s) => Ok(Value::DateTime(DateTime::parse(s)?)),
            other => Err(DbError::TypeMismatch(format!(
                "DatetimeMapper::from_db: expected timestamp text, got {}",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write() {
        let mapper = DatetimeMapper;
        let dt = DateTime::from_ymd_hms(2017, 1, 31, 13, 32, 5).unwrap();
        assert_eq!(mapper.to_db(&Value::DateTime(dt)).unwrap(), Value::from("2017-01-31 13:32:05"));
        assert_eq!(mapper.to_db(&Value::DateTime(DateTime::Null)).unwrap(), Value::Null);
        assert_eq!(mapper.to_db(&Value::Null).unwrap(), Value::Null);
        assert_eq!(mapper.to_db(&Value::from("")).unwrap(), Value::Null);
        assert!(matches!(mapper.to_db(&Value::from("2017-01-31")), Err(DbError::TypeMismatch(_))));
    }

    #[test]
    fn test_read() {
        let mapper = DatetimeMapper;
        assert_eq!(mapper.from_db(&Value::Null).unwrap(), Value::DateTime(DateTime::Null));
        assert_eq!(
            mapper.from_db(&Value::from("2017-01-31 13:32:05")).unwrap(),
            Value::DateTime(DateTime::from_ymd_hms(2017, 1, 31, 13, 32, 5).unwrap())
        );
    }
}
