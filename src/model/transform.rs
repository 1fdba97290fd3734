use std::any::TypeId;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::{DbError, Result, Value, ValueObject};
use crate::values::DB_DATE_FORMAT;

pub type TransformFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// One step of a field's input normalization pipeline.
#[derive(Clone)]
pub enum Transformer {
    /// Collapse the final value to `NULL` when it is falsy.
    Null,
    Trim,
    Lower,
    Upper,
    UcFirst,
    Int,
    /// Float coercion accepting `,` as the decimal separator.
    Float,
    Bool,
    /// Require a `DateTime` value.
    DateTime,
    /// Render a `DateTime` as `YYYY-MM-DD`, pass anything else through.
    DbDate,
    /// Require a list or map.
    Array,
    Custom(TransformFn),
    /// Require an `Object` of the given concrete type.
    InstanceOf {
        type_id: TypeId,
        type_name: &'static str,
    },
}

impl Transformer {
    pub fn custom<F>(func: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(func))
    }

    pub fn instance_of<T: ValueObject>() -> Self {
        Self::InstanceOf {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Parses a `|`-separated tag list such as `"trim|lower"`.
    pub fn parse_list(tags: &str) -> Result<Vec<Self>> {
        tags.split('|')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::parse)
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Trim => "trim",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::UcFirst => "ucfirst",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::DateTime => "datetime",
            Self::DbDate => "db_date",
            Self::Array => "array",
            Self::Custom(_) => "custom",
            Self::InstanceOf { type_name, .. } => *type_name,
        }
    }
}

impl FromStr for Transformer {
    type Err = DbError;

    fn from_str(tag: &str) -> Result<Self> {
        Ok(match tag {
            "null" => Self::Null,
            "trim" => Self::Trim,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "ucfirst" => Self::UcFirst,
            "int" => Self::Int,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "datetime" => Self::DateTime,
            "db_date" => Self::DbDate,
            "array" => Self::Array,
            other => return Err(DbError::UnknownTransformer(other.to_string())),
        })
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstanceOf { type_name, .. } => write!(f, "InstanceOf({})", type_name),
            other => f.write_str(other.name()),
        }
    }
}

fn uc_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Runs `rules` over a non-null value. `NULL` never reaches this function.
pub(crate) fn apply(rules: &[Transformer], entity: &str, field: &str, value: Value) -> Result<Value> {
    let mut value = value;
    let mut null_when_falsy = false;

    for rule in rules {
        value = match rule {
            Transformer::Null => {
                null_when_falsy = true;
                value
            }
            Transformer::Trim => Value::Text(value.to_text().trim().to_string()),
            Transformer::Lower => Value::Text(value.to_text().to_lowercase()),
            Transformer::Upper => Value::Text(value.to_text().to_uppercase()),
            Transformer::UcFirst => Value::Text(uc_first(&value.to_text())),
            Transformer::Int => Value::Integer(value.to_int()),
            Transformer::Float => match value {
                Value::Text(s) => Value::Float(Value::Text(s.replace(',', ".")).to_float()),
                other => Value::Float(other.to_float()),
            },
            Transformer::Bool => Value::Boolean(value.is_truthy()),
            Transformer::DateTime => match value {
                Value::DateTime(_) => value,
                other => {
                    return Err(DbError::TypeMismatch(format!(
                        "{}: expected DateTime for field `{}`, got {}",
                        entity,
                        field,
                        other.type_name()
                    )));
                }
            },
            Transformer::DbDate => match value {
                Value::DateTime(dt) => Value::from(dt.date().map(|d| d.format(DB_DATE_FORMAT).to_string())),
                other => other,
            },
            Transformer::Array => match value {
                Value::List(_) | Value::Map(_) => value,
                other => {
                    return Err(DbError::TypeMismatch(format!(
                        "{}: expected array for field `{}`, got {}",
                        entity,
                        field,
                        other.type_name()
                    )));
                }
            },
            Transformer::Custom(func) => func(value)?,
            Transformer::InstanceOf { type_id, type_name } => match &value {
                Value::Object(object) if object.as_any().type_id() == *type_id => value,
                other => {
                    return Err(DbError::TypeMismatch(format!(
                        "{}: expected {} for field `{}`, got {}",
                        entity,
                        type_name,
                        field,
                        other.type_name()
                    )));
                }
            },
        };
    }

    if null_when_falsy && !value.is_truthy() {
        value = Value::Null;
    }
    Ok(value)
}
