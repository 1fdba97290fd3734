use super::Mapper;
use crate::core::{Result, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct FloatMapper;

impl Mapper for FloatMapper {
    fn name(&self) -> &'static str {
        "float"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        Ok(Value::Float(value.to_float()))
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Float(value.to_float()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_mapper() {
        let mapper = FloatMapper;
        assert_eq!(mapper.to_db(&Value::from("1.25")).unwrap(), Value::Float(1.25));
        assert_eq!(mapper.to_db(&Value::Null).unwrap(), Value::Float(0.0));
        assert_eq!(mapper.from_db(&Value::from("3.5")).unwrap(), Value::Float(3.5));
        assert_eq!(mapper.from_db(&Value::Null).unwrap(), Value::Null);
    }
}
