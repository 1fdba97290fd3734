use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{Level, event};

use crate::core::{Result, Value};
use crate::model::Entity;

/// Memoized entities keyed by table name and primary key.
///
/// Only found entities are stored; readers get clones. Scope one instance
/// per request or transaction.
#[derive(Debug, Default)]
pub struct RowCache {
    tables: Mutex<HashMap<String, HashMap<String, Entity>>>,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key of a primary key value. A composite key given as a map
    /// becomes `field1,field2:value1,value2`.
    pub fn key(id: &Value) -> String {
        match id {
            Value::Map(parts) => {
                let fields: Vec<&str> = parts.keys().collect();
                let values: Vec<String> = parts.values().map(Value::to_text).collect();
                format!("{}:{}", fields.join(","), values.join(","))
            }
            other => other.to_text(),
        }
    }

    pub fn has(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self
            .tables
            .lock()?
            .get(table)
            .is_some_and(|rows| rows.contains_key(key)))
    }

    pub fn get(&self, table: &str, key: &str) -> Result<Option<Entity>> {
        Ok(self.tables.lock()?.get(table).and_then(|rows| rows.get(key)).cloned())
    }

    pub fn add(&self, table: &str, key: impl Into<String>, entity: Entity) -> Result<()> {
        self.tables
            .lock()?
            .entry(table.to_string())
            .or_default()
            .insert(key.into(), entity);
        Ok(())
    }

    /// Drops one key, one table or everything.
    pub fn clear(&self, table: Option<&str>, key: Option<&str>) -> Result<()> {
        let mut tables = self.tables.lock()?;
        match (table, key) {
            (Some(table), Some(key)) => {
                if let Some(rows) = tables.get_mut(table) {
                    rows.remove(key);
                }
            }
            (Some(table), None) => {
                tables.remove(table);
            }
            (None, _) => tables.clear(),
        }
        Ok(())
    }

    /// Cached entity, or the producer's result which is cached when found.
    /// The producer runs without the cache locked.
    pub fn item<F>(&self, table: &str, key: &str, producer: F) -> Result<Option<Entity>>
    where
        F: FnOnce() -> Result<Option<Entity>>,
    {
        if let Some(entity) = self.get(table, key)? {
            event!(Level::DEBUG, table = %table, key = %key, "row cache hit");
            return Ok(Some(entity));
        }

        event!(Level::DEBUG, table = %table, key = %key, "row cache miss");
        let produced = producer()?;
        if let Some(entity) = &produced {
            self.add(table, key, entity.clone())?;
        }
        Ok(produced)
    }

    pub fn len(&self, table: &str) -> Result<usize> {
        Ok(self.tables.lock()?.get(table).map_or(0, HashMap::len))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.tables.lock()?.values().all(HashMap::is_empty))
    }
}
