use super::Mapper;
use crate::core::{Result, Value};

/// Integer column. `NULL` is written as `0` and read back as `NULL`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntMapper;

impl Mapper for IntMapper {
    fn name(&self) -> &'static str {
        "int"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        Ok(Value::Integer(value.to_int()))
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Integer(value.to_int()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_mapper() {
        let mapper = IntMapper;
        assert_eq!(mapper.to_db(&Value::from("12")).unwrap(), Value::Integer(12));
        assert_eq!(mapper.to_db(&Value::from("12.9")).unwrap(), Value::Integer(12));
        assert_eq!(mapper.to_db(&Value::Null).unwrap(), Value::Integer(0));
        assert_eq!(mapper.from_db(&Value::from("-5")).unwrap(), Value::Integer(-5));
        assert_eq!(mapper.from_db(&Value::Null).unwrap(), Value::Null);
    }
}
