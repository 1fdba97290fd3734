use super::Mapper;
use crate::core::{DbError, Result, Value};
use crate::values::GeoPoint;

/// Postgres `point` column as a [`GeoPoint`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoPointMapper;

impl Mapper for GeoPointMapper {
    fn name(&self) -> &'static str {
        "geo_point"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        match value {
            Value::GeoPoint(point) => Ok(Value::Text(point.to_string())),
            v if !v.is_truthy() => Ok(Value::Null),
            other => Err(DbError::TypeMismatch(format!(
                "GeoPointMapper::to_db: expected GeoPoint, got {}",
                other.type_name()
            ))),
        }
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::GeoPoint(_) => Ok(value.clone()),
            Value::Text(s) => Ok(Value::GeoPoint(s.parse::<GeoPoint>()?)),
            other => Err(DbError::TypeMismatch(format!(
                "GeoPointMapper::from_db: expected point text, got {}",
                other.type_name()
            ))),
        }
    }
}
