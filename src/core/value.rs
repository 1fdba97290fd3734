use std::fmt;
use std::sync::Arc;

use crate::core::{DbError, Result, SharedEntity, ValueMap, ValueObject};
use crate::values::{DateRange, DateTime, GeoPoint};

/// A dynamically typed field value.
///
/// Scalars compare and stringify the way the storage layer sees them, while
/// the object variants (`DateTime`, `DateRange`, `GeoPoint`, `Object`,
/// `Entity`) are tracked through their snapshots.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(ValueMap),
    DateTime(DateTime),
    DateRange(DateRange),
    GeoPoint(GeoPoint),
    /// SQL expression emitted verbatim by the query builder.
    Raw(String),
    Object(Arc<dyn ValueObject>),
    Entity(SharedEntity),
}

impl Value {
    pub fn object<T: ValueObject>(object: T) -> Self {
        Self::Object(Arc::new(object))
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::List(_) => "LIST",
            Self::Map(_) => "MAP",
            Self::DateTime(_) => "DATETIME",
            Self::DateRange(_) => "DATERANGE",
            Self::GeoPoint(_) => "GEOPOINT",
            Self::Raw(_) => "RAW",
            Self::Object(object) => object.type_name(),
            Self::Entity(_) => "ENTITY",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value carries a snapshot for in-place mutation detection.
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            Self::DateTime(_) | Self::DateRange(_) | Self::GeoPoint(_) | Self::Object(_) | Self::Entity(_)
        )
    }

    /// Loose truthiness: `""`, `"0"`, `0`, `0.0`, `false`, empty collections,
    /// `NULL` and the null date are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Text(s) => !(s.is_empty() || s == "0"),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::DateTime(dt) => !dt.is_null(),
            Self::Raw(sql) => !sql.is_empty(),
            Self::DateRange(_) | Self::GeoPoint(_) | Self::Object(_) | Self::Entity(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&SharedEntity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Downcasts an `Object` value to its concrete type.
    pub fn downcast_ref<T: ValueObject>(&self) -> Option<&T> {
        match self {
            Self::Object(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Snapshot string of an object value, `None` for scalars and collections.
    pub fn snapshot(&self) -> Option<String> {
        self.is_object().then(|| self.to_text())
    }

    /// String form used for change comparison and literal rendering.
    ///
    /// `true`/`false` become `"1"`/`"0"`, `NULL` becomes `""`, collections
    /// use their canonical dump and objects use their snapshot.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Boolean(true) => "1".to_string(),
            Self::Boolean(false) => "0".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Text(s) | Self::Raw(s) => s.clone(),
            Self::List(_) | Self::Map(_) => self.dump(),
            Self::DateTime(dt) => dt.to_string(),
            Self::DateRange(range) => range.to_string(),
            Self::GeoPoint(point) => point.to_string(),
            Self::Object(object) => object.snapshot(),
            Self::Entity(entity) => entity.snapshot(),
        }
    }

    /// Canonical, type-preserving rendering: `"1"` and `1` dump differently,
    /// so do a list and a map with the same values.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.write_dump(&mut out);
        out
    }

    fn write_dump(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Integer(i) => out.push_str(&i.to_string()),
            Self::Float(f) => out.push_str(&format!("{:?}", f)),
            Self::Text(s) => out.push_str(&format!("{:?}", s)),
            Self::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_dump(out);
                }
                out.push(']');
            }
            Self::Map(map) => map.write_dump(out),
            other => {
                out.push_str(other.type_name());
                out.push_str(&format!("({:?})", other.to_text()));
            }
        }
    }

    /// Leading-integer coercion: `" 12abc"` is 12, `"abc"` is 0.
    pub fn to_int(&self) -> i64 {
        match self {
            Self::Null => 0,
            Self::Boolean(b) => *b as i64,
            Self::Integer(i) => *i,
            Self::Float(f) if f.is_finite() => f.trunc() as i64,
            Self::Float(_) => 0,
            Self::Text(s) | Self::Raw(s) => {
                let number = leading_number(s, false);
                number.parse::<i64>().unwrap_or_else(|_| {
                    // Overflowing digit runs saturate.
                    if number.starts_with('-') { i64::MIN } else if number.is_empty() { 0 } else { i64::MAX }
                })
            }
            Self::List(items) => !items.is_empty() as i64,
            Self::Map(map) => !map.is_empty() as i64,
            Self::DateTime(dt) => !dt.is_null() as i64,
            Self::DateRange(_) | Self::GeoPoint(_) | Self::Object(_) | Self::Entity(_) => 1,
        }
    }

    /// Leading-float coercion: `"1.5kg"` is 1.5, `"abc"` is 0.0.
    pub fn to_float(&self) -> f64 {
        match self {
            Self::Float(f) => *f,
            Self::Text(s) | Self::Raw(s) => leading_number(s, true).parse::<f64>().unwrap_or(0.0),
            other => other.to_int() as f64,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value as Json;

        Ok(match self {
            Self::Null => Json::Null,
            Self::Boolean(b) => Json::Bool(*b),
            Self::Integer(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| DbError::TypeMismatch(format!("Float {} is not representable in JSON", f)))?,
            Self::Text(s) | Self::Raw(s) => Json::String(s.clone()),
            Self::List(items) => Json::Array(items.iter().map(Value::to_json).collect::<Result<Vec<_>>>()?),
            Self::Map(map) => {
                let mut object = serde_json::Map::with_capacity(map.len());
                for (key, value) in map.iter() {
                    object.insert(key.to_string(), value.to_json()?);
                }
                Json::Object(object)
            }
            Self::Entity(entity) => Self::Map(entity.lock()?.to_map(false)?).to_json()?,
            other => Json::String(other.to_text()),
        })
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else {
        format!("{}", f)
    }
}

/// Slices the numeric prefix of `s` after leading whitespace.
fn leading_number(s: &str, fraction: bool) -> &str {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;

    if fraction {
        if end < bytes.len() && bytes[end] == b'.' {
            let mut cursor = end + 1;
            while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
                cursor += 1;
            }
            if cursor > end + 1 || has_digits {
                has_digits = has_digits || cursor > end + 1;
                end = cursor;
            }
        }
        if has_digits && end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
            let mut cursor = end + 1;
            if matches!(bytes.get(cursor), Some(b'+') | Some(b'-')) {
                cursor += 1;
            }
            let exponent_start = cursor;
            while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
                cursor += 1;
            }
            if cursor > exponent_start {
                end = cursor;
            }
        }
    }

    if has_digits { &s[..end] } else { "" }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                (a - b).abs() < f64::EPSILON
            }
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                (*i as f64 - f).abs() < f64::EPSILON
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Raw(a), Self::Raw(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::DateRange(a), Self::DateRange(b)) => a == b,
            (Self::GeoPoint(a), Self::GeoPoint(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
                    || (a.type_name() == b.type_name() && a.snapshot() == b.snapshot())
            }
            (Self::Entity(a), Self::Entity(b)) => a.ptr_eq(b) || a.snapshot() == b.snapshot(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Self::Map(map)
    }
}

impl From<DateTime> for Value {
    fn from(dt: DateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<DateRange> for Value {
    fn from(range: DateRange) -> Self {
        Self::DateRange(range)
    }
}

impl From<GeoPoint> for Value {
    fn from(point: GeoPoint) -> Self {
        Self::GeoPoint(point)
    }
}

impl From<SharedEntity> for Value {
    fn from(entity: SharedEntity) -> Self {
        Self::Entity(entity)
    }
}

impl From<Arc<dyn ValueObject>> for Value {
    fn from(object: Arc<dyn ValueObject>) -> Self {
        Self::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(0.0)),
            },
            Json::String(s) => Self::Text(s),
            Json::Array(items) => Self::List(items.into_iter().map(Value::from).collect()),
            Json::Object(object) => Self::Map(object.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_form_of_scalars() {
        assert_eq!(Value::Boolean(true).to_text(), "1");
        assert_eq!(Value::Boolean(false).to_text(), "0");
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Float(1.5).to_text(), "1.5");
        assert_eq!(Value::Float(2.0).to_text(), "2");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from("0").is_truthy());
        assert!(Value::from("0.0").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(!Value::DateTime(DateTime::Null).is_truthy());
        assert!(Value::GeoPoint(GeoPoint::new(1.0, 2.0)).is_truthy());
    }

    #[test]
    fn test_dump_distinguishes_types() {
        let ints = Value::List(vec![Value::from(1), Value::from(2)]);
        let texts = Value::List(vec![Value::from("1"), Value::from("2")]);
        assert_ne!(ints.dump(), texts.dump());
        assert_eq!(ints.dump(), "[1, 2]");
        assert_eq!(texts.dump(), r#"["1", "2"]"#);
    }

    #[test]
    fn test_leading_number_coercion() {
        assert_eq!(Value::from(" 12abc").to_int(), 12);
        assert_eq!(Value::from("abc").to_int(), 0);
        assert_eq!(Value::from("-7.9").to_int(), -7);
        assert_eq!(Value::from("1.5kg").to_float(), 1.5);
        assert_eq!(Value::from("1e3").to_float(), 1000.0);
        assert_eq!(Value::from(".5").to_float(), 0.5);
        assert_eq!(Value::Boolean(true).to_int(), 1);
    }

    #[test]
    fn test_json_conversion_keeps_key_order() {
        let json: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":[true,null,"x"]}"#).unwrap();
        let value = Value::from(json.clone());
        let map = value.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(value.to_json().unwrap(), json);
    }
}
