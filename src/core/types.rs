use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Result, Value};
use crate::model::Entity;

/// A record of named values that remembers insertion order.
///
/// Rows coming from the adapter, entity fields and JSON objects all keep the
/// order their keys were first written in. Equality ignores that order.
///
/// Entries sit in a plain vector and lookups scan it, which suits rows of a
/// few dozen fields. Wider records pay a linear cost per key access.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: Vec<(String, Value)>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Linear scan; see the type docs.
    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|idx| &self.entries[idx].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.position(key).map(|idx| &mut self.entries[idx].1)
    }

    /// Inserts or replaces in place, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder form of [`ValueMap::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.position(key).map(|idx| self.entries.remove(idx).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }

    /// Writes every entry of `other` over `self`; new keys are appended.
    pub fn extend(&mut self, other: ValueMap) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    /// Entries of `self` followed by the entries of `other` whose keys are
    /// not in `self`.
    pub fn union(&self, other: &ValueMap) -> ValueMap {
        let mut result = self.clone();
        for (key, value) in other.iter() {
            if !result.contains_key(key) {
                result.entries.push((key.to_string(), value.clone()));
            }
        }
        result
    }

    /// Keeps only the listed keys, in the map's own order.
    pub fn only<S: AsRef<str>>(&self, keys: &[S]) -> ValueMap {
        self.entries
            .iter()
            .filter(|(k, _)| keys.iter().any(|key| key.as_ref() == k))
            .cloned()
            .collect()
    }

    pub(crate) fn write_dump(&self, out: &mut String) {
        out.push('{');
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{:?}: ", key));
            out.push_str(&value.dump());
        }
        out.push('}');
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.write_dump(&mut out);
        out
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for ValueMap {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for ValueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dump())
    }
}

/// Builds a [`ValueMap`](crate::ValueMap) from `key => value` pairs.
///
/// ```
/// let row = rustmemorm::value_map! { "id" => 1, "name" => "Bob" };
/// assert_eq!(row.len(), 2);
/// ```
#[macro_export]
macro_rules! value_map {
    () => {
        $crate::ValueMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ValueMap::new();
        $(map.insert($key, $value);)+
        map
    }};
}

/// A user-defined field value that may be mutated in place.
///
/// The entity keeps `snapshot()` of every object it stores and re-checks it
/// when asked for changes, so a value mutated through interior mutability is
/// still reported as modified.
pub trait ValueObject: Any + Send + Sync + fmt::Debug {
    fn snapshot(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A nested entity stored as a field value of another entity.
///
/// Clones share the same entity, so a child mutated through one handle is
/// seen dirty by every parent holding it.
#[derive(Clone)]
pub struct SharedEntity(Arc<Mutex<Entity>>);

impl SharedEntity {
    pub fn new(entity: Entity) -> Self {
        Self(Arc::new(Mutex::new(entity)))
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Entity>> {
        Ok(self.0.lock()?)
    }

    pub fn ptr_eq(&self, other: &SharedEntity) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Dump of the child's current values; a poisoned lock still yields the
    /// last written state.
    pub fn snapshot(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).snapshot()
    }
}

impl From<Entity> for SharedEntity {
    fn from(entity: Entity) -> Self {
        Self::new(entity)
    }
}

impl fmt::Debug for SharedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_lock() {
            Ok(entity) => f.debug_tuple("SharedEntity").field(&*entity).finish(),
            Err(_) => f.write_str("SharedEntity(<locked>)"),
        }
    }
}
