use super::Mapper;
use crate::core::{Result, Value};

/// Boolean stored as `0`/`1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntboolMapper;

impl Mapper for IntboolMapper {
    fn name(&self) -> &'static str {
        "intbool"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        Ok(Value::Integer(value.is_truthy() as i64))
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Boolean(value.is_truthy()))
    }
}
