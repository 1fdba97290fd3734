use super::Mapper;
use crate::core::{Result, Value};

/// Text column. Writes the text form, reads back unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringMapper;

impl Mapper for StringMapper {
    fn name(&self) -> &'static str {
        "string"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        Ok(Value::Text(value.to_text()))
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_mapper() {
        let mapper = StringMapper;
        assert_eq!(mapper.to_db(&Value::Integer(12)).unwrap(), Value::from("12"));
        assert_eq!(mapper.to_db(&Value::Null).unwrap(), Value::from(""));
        assert_eq!(mapper.to_db(&Value::Boolean(false)).unwrap(), Value::from("0"));
        assert_eq!(mapper.from_db(&Value::Null).unwrap(), Value::Null);
        assert_eq!(mapper.from_db(&Value::from("abc")).unwrap(), Value::from("abc"));
    }
}
