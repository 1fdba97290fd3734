use super::Mapper;
use crate::core::{DbError, Result, Value};

/// JSON document column holding a list or a map. Key order is preserved.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMapper;

impl Mapper for JsonMapper {
    fn name(&self) -> &'static str {
        "json"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        let json = match value {
            v if !v.is_truthy() => serde_json::Value::Array(Vec::new()),
            Value::List(_) | Value::Map(_) => value.to_json()?,
            other => {
                return Err(DbError::TypeMismatch(format!(
                    "JsonMapper::to_db: expected a list or map, got {}",
                    other.type_name()
                )));
            }
        };
        let encoded = serde_json::to_string(&json).map_err(|e| DbError::MappingError(e.to_string()))?;
        Ok(Value::Text(encoded))
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        if !value.is_truthy() {
            return Ok(Value::List(Vec::new()));
        }
        match value {
            Value::Text(s) => {
                let json: serde_json::Value = serde_json::from_str(s)
                    .map_err(|e| DbError::MappingError(format!("JsonMapper::from_db: {}", e)))?;
                Ok(Value::from(json))
            }
            Value::List(_) | Value::Map(_) => Ok(value.clone()),
            other => Err(DbError::TypeMismatch(format!(
                "JsonMapper::from_db: expected JSON text, got {}",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_map;

    #[test]
    fn test_encode_keeps_key_order() {
        let mapper = JsonMapper;
        let value = Value::Map(value_map! { "a" => 1, "0" => 2 });
        assert_eq!(mapper.to_db(&value).unwrap(), Value::from(r#"{"a":1,"0":2}"#));
        assert_eq!(mapper.to_db(&Value::Null).unwrap(), Value::from("[]"));
        assert!(matches!(mapper.to_db(&Value::from("abc")), Err(DbError::TypeMismatch(_))));
    }

    #[test]
    fn test_decode() {
        let mapper = JsonMapper;
        assert_eq!(mapper.from_db(&Value::from("[]")).unwrap(), Value::List(vec![]));
        assert_eq!(mapper.from_db(&Value::Null).unwrap(), Value::List(vec![]));
        assert_eq!(
            mapper.from_db(&Value::from(r#"{"a":[1,"x"]}"#)).unwrap(),
            Value::Map(value_map! { "a" => Value::List(vec![Value::from(1), Value::from("x")]) })
        );
        assert!(matches!(mapper.from_db(&Value::from("{oops")), Err(DbError::MappingError(_))));
    }
}
