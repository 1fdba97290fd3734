use std::iter::Peekable;
use std::str::Chars;

use super::Mapper;
use crate::core::{DbError, Result, Value, ValueMap};

/// Postgres `hstore` column holding a flat map.
///
/// The written literal is a complete, already quoted SQL expression, so it is
/// returned as [`Value::Raw`]. List values are joined with `,`; nested maps
/// are not supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgHashMapper;

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_sql(s: &str) -> String {
    s.replace('\'', "''")
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

/// Reads a quoted or bare token. Bare `NULL` yields `None`.
fn read_token(chars: &mut Peekable<Chars<'_>>, literal: &str) -> Result<Option<String>> {
    let mut token = String::new();
    if chars.next_if_eq(&'"').is_some() {
        loop {
            match chars.next() {
                Some('\\') => {
                    if let Some(escaped) = chars.next() {
                        token.push(escaped);
                    }
                }
                Some('"') => return Ok(Some(token)),
                Some(c) => token.push(c),
                None => {
                    return Err(DbError::MappingError(format!(
                        "PgHashMapper::from_db: unterminated string in '{}'",
                        literal
                    )));
                }
            }
        }
    }

    while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != ',' && *c != '=') {
        token.push(c);
    }
    if token.is_empty() {
        return Err(DbError::MappingError(format!(
            "PgHashMapper::from_db: malformed hstore '{}'",
            literal
        )));
    }
    if token.eq_ignore_ascii_case("NULL") {
        return Ok(None);
    }
    Ok(Some(token))
}

fn parse_hstore(literal: &str) -> Result<ValueMap> {
    let mut map = ValueMap::new();
    let mut chars = literal.chars().peekable();

    loop {
        skip_whitespace(&mut chars);
        if chars.peek().is_none() {
            break;
        }

        let key = read_token(&mut chars, literal)?.unwrap_or_else(|| "NULL".to_string());
        skip_whitespace(&mut chars);
        if chars.next() != Some('=') || chars.next() != Some('>') {
            return Err(DbError::MappingError(format!(
                "PgHashMapper::from_db: expected '=>' after key '{}' in '{}'",
                key, literal
            )));
        }
        skip_whitespace(&mut chars);
        let value = read_token(&mut chars, literal)?;
        map.insert(key, Value::from(value));

        skip_whitespace(&mut chars);
        match chars.next() {
            Some(',') | None => {}
            Some(other) => {
                return Err(DbError::MappingError(format!(
                    "PgHashMapper::from_db: unexpected '{}' in '{}'",
                    other, literal
                )));
            }
        }
    }

    Ok(map)
}

impl Mapper for PgHashMapper {
    fn name(&self) -> &'static str {
        "pg_hash"
    }

    fn to_db(&self, value: &Value) -> Result<Value> {
        let entries: Vec<(String, Value)> = match value {
            v if !v.is_truthy() => Vec::new(),
            Value::Map(map) => map.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            Value::List(items) => items.iter().cloned().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
            other => {
                return Err(DbError::TypeMismatch(format!(
                    "PgHashMapper::to_db: expected a map, got {}",
                    other.type_name()
                )));
            }
        };

        let pairs: Vec<String> = entries
            .into_iter()
            .map(|(key, value)| {
                let key = escape_sql(&escape_quotes(&key));
                match value {
                    Value::Null => format!("\"{}\"=>NULL", key),
                    Value::List(items) => {
                        let joined: Vec<String> = items.iter().map(Value::to_text).collect();
                        format!("\"{}\"=>\"{}\"", key, escape_sql(&escape_quotes(&joined.join(","))))
                    }
                    other => format!("\"{}\"=>\"{}\"", key, escape_sql(&escape_quotes(&other.to_text()))),
                }
            })
            .collect();

        Ok(Value::Raw(format!("'{}'", pairs.join(","))))
    }

    fn from_db(&self, value: &Value) -> Result<Value> {
        if !value.is_truthy() {
            return Ok(Value::Map(ValueMap::new()));
        }
        match value {
            Value::Text(literal) => Ok(Value::Map(parse_hstore(literal)?)),
            Value::Map(_) => Ok(value.clone()),
            other => Err(DbError::TypeMismatch(format!(
                "PgHashMapper::from_db: expected hstore text, got {}",
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
    fn test_write() {
        let mapper = PgHashMapper;
        assert_eq!(
            mapper.to_db(&Value::Map(value_map! { "a" => 1, "b" => "bb" })).unwrap(),
            Value::raw(r#"'"a"=>"1","b"=>"bb"'"#)
        );
        assert_eq!(
            mapper.to_db(&Value::Map(value_map! { "a" => "'\"a" })).unwrap(),
            Value::raw(r#"'"a"=>"''\"a"'"#)
        );
        assert_eq!(
            mapper.to_db(&Value::Map(value_map! { "a" => r"\text\" })).unwrap(),
            Value::raw(r#"'"a"=>"\\text\\"'"#)
        );
        assert_eq!(
            mapper.to_db(&Value::Map(value_map! { "a" => Value::Null, "b" => Value::List(vec![1.into(), 2.into()]) }))
                .unwrap(),
            Value::raw(r#"'"a"=>NULL,"b"=>"1,2"'"#)
        );
        assert_eq!(mapper.to_db(&Value::Null).unwrap(), Value::raw("''"));
    }

    #[test]
    fn test_write_quotes_in_keys() {
        let mapper = PgHashMapper;
        assert_eq!(
            mapper.to_db(&Value::Map(value_map! { "o'k" => "v" })).unwrap(),
            Value::raw(r#"'"o''k"=>"v"'"#)
        );
        assert_eq!(
            mapper.to_db(&Value::Map(value_map! { "'); DROP TABLE t; --" => Value::Null })).unwrap(),
            Value::raw(r#"'"''); DROP TABLE t; --"=>NULL'"#)
        );
    }

    #[test]
    fn test_read() {
        let mapper = PgHashMapper;
        assert_eq!(mapper.from_db(&Value::Null).unwrap(), Value::Map(ValueMap::new()));
        assert_eq!(
            mapper.from_db(&Value::from(r#""a"=>"1", "b"=>"bb""#)).unwrap(),
            Value::Map(value_map! { "a" => "1", "b" => "bb" })
        );
        assert_eq!(
            mapper.from_db(&Value::from(r#""a"=>NULL, "q"=>"'\"a", "s"=>"\\text\\""#)).unwrap(),
            Value::Map(value_map! { "a" => Value::Null, "q" => "'\"a", "s" => r"\text\" })
        );
        assert!(mapper.from_db(&Value::from(r#""a"=>"#)).is_err());
    }
}
