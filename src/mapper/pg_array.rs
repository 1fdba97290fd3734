use super::Mapper;
use crate::core::{DbError, Result, Value};

/// Postgres `text[]` literal such as `{"a","b"}`.
///
/// Elements are always written quoted. Quoting the literal itself for SQL is
/// left to the query builder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgArrayMapper;

fn escape_element(element: &str) -> String {
    element.replace('\\', "\\\\").replace('"', "\\\"")
}

fn finish_element(element: &mut String, quoted: bool) -> Value {
    let text = std::mem::take(element);
    if !quoted && text.eq_ignore_ascii_case("NULL") {
        Value::Null
    } else {
        Value::Text(text)
    }
}

/// Splits the body of an array literal on unquoted commas.
fn parse_elements(body: &str) -> Vec<Value> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            ',' if !in_quotes => {
                items.push(finish_element(&mut current, quoted));
                quoted = false;
            }
            other => current.push(other),
        }
    }
    items.push(finish_element(&mut current, quoted));
    items
}

impl Mapper for PgArrayMapper {
    fn name(&self) -> &'static str {
        "pg_array"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        let elements: Vec<String> = match value {
            v if !v.is_truthy() => return Ok(Value::from("{}")),
            Value::List(items) => items.iter().map(|item| escape_element(&item.to_text())).collect(),
            Value::Map(map) => map.values().map(|item| escape_element(&item.to_text())).collect(),
            other => {
                return Err(DbError::TypeMismatch(format!(
                    "PgArrayMapper::to_db: expected a list, got {}",
                    other.type_name()
                )));
            }
        };
        Ok(Value::Text(format!("{{\"{}\"}}", elements.join("\",\""))))
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        if !value.is_truthy() {
            return Ok(Value::List(Vec::new()));
        }
        let Value::Text(literal) = value else {
            return Err(DbError::TypeMismatch(format!(
                "PgArrayMapper::from_db: expected array literal, got {}",
                value.type_name()
            )));
        };
        let body = literal.trim().trim_start_matches('{').trim_end_matches('}');
        if body.is_empty() {
            return Ok(Value::List(Vec::new()));
        }
        Ok(Value::List(parse_elements(body)))
    }
}
