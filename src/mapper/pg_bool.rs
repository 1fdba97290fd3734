use super::Mapper;
use crate::core::{Result, Value};

/// Postgres `boolean` in its `t`/`f` text form.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgBoolMapper;

fn is_on(value: &Value) -> bool {
    value.is_truthy() && value.as_str() != Some("f")
}

impl Mapper for PgBoolMapper {
    fn name(&self) -> &'static str {
        "pg_bool"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        Ok(Value::from(if is_on(value) { "t" } else { "f" }))
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Boolean(is_on(value)))
    }
}
