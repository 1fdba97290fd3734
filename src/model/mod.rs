//! Dirty-tracking entities.
//!
//! An [`Entity`] keeps its current values together with the first original
//! and latest value of every field changed since the last reset. Values that
//! can change in place (dates, value objects, nested entities) are also
//! snapshotted so such mutations are detected without a new `set`.

pub mod definition;
pub mod transform;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use definition::{ForcedGetter, GetterFn, ModelDefinition, SetterFn, SetterRule, TriggerFn};
pub use transform::{TransformFn, Transformer};

use crate::core::{DbError, Result, SharedEntity, Value, ValueMap};

/// Text form of an object value taken when it was stored, together with the
/// value itself.
#[derive(Debug, Clone)]
struct Snapshot {
    text: String,
    value: Value,
}

impl Snapshot {
    fn of(value: &Value) -> Option<Self> {
        value.snapshot().map(|text| Self {
            text,
            value: value.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    definition: Arc<ModelDefinition>,
    values: ValueMap,
    modified_old: ValueMap,
    modified_new: ValueMap,
    /// Comparison text of each `modified_old` entry as it was first recorded.
    original_texts: BTreeMap<String, String>,
    snapshots: BTreeMap<String, Snapshot>,
    is_new: bool,
}

impl Entity {
    /// Builds an entity from `values`.
    ///
    /// New entities start from the definition's defaults. Fields with a
    /// forced setter go through it, fields with transformers go through the
    /// tracked update so normalization shows up as a change.
    pub fn new(definition: Arc<ModelDefinition>, values: ValueMap, is_new: bool) -> Result<Self> {
        let values = if is_new {
            let mut merged = definition.default_values().clone();
            merged.extend(values);
            merged
        } else {
            values
        };

        let mut entity = Self {
            definition,
            values: values.clone(),
            modified_old: ValueMap::new(),
            modified_new: ValueMap::new(),
            original_texts: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            is_new,
        };

        for (field, value) in values {
            if entity.definition.has_forced_setter(&field) {
                entity.set_resolved(&field, value, false)?;
            } else if entity.definition.has_transformers(&field) {
                entity.assign(&field, value)?;
            } else if value.is_object() {
                entity.store(&field, value)?;
            }
        }

        Ok(entity)
    }

    /// An entity without a capability table.
    pub fn plain(values: ValueMap, is_new: bool) -> Result<Self> {
        Self::new(Arc::new(ModelDefinition::default()), values, is_new)
    }

    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    pub fn entity_name(&self) -> &str {
        self.definition.name()
    }

    fn field_not_found(&self, field: &str) -> DbError {
        DbError::FieldNotFound {
            entity: self.entity_name().to_string(),
            field: field.to_string(),
        }
    }

    /// Stored value, bypassing forced getters. Absent fields are `NULL` on a
    /// new entity and an error otherwise.
    pub fn get_raw(&self, field: &str) -> Result<Value> {
        match self.values.get(field) {
            Some(value) => Ok(value.clone()),
            None if self.is_new => Ok(Value::Null),
            None => Err(self.field_not_found(field)),
        }
    }

    /// Value as callers should see it: through the forced getter if any.
    pub fn resolve(&self, field: &str) -> Result<Value> {
        match self.definition.forced_getter(field) {
            Some(getter) => getter.call(self),
            None => self.get_raw(field),
        }
    }

    pub fn get(&self, field: &str) -> Result<Value> {
        if let Some(getter) = self.definition.forced_getter(field) {
            return Err(DbError::ForbiddenGetter {
                entity: self.entity_name().to_string(),
                field: field.to_string(),
                getter: getter.method().to_string(),
            });
        }
        self.get_raw(field)
    }

    pub fn has(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// `has` plus a truthiness check of the stored value.
    pub fn has_value(&self, field: &str) -> bool {
        self.values.get(field).is_some_and(Value::is_truthy)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys()
    }

    /// Raw stored values.
    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    /// Current values with forced getters applied; `recursive` expands nested
    /// entities into maps.
    pub fn to_map(&self, recursive: bool) -> Result<ValueMap> {
        let mut result = self.values.clone();
        for (field, getter) in self.definition.forced_getters() {
            if self.has(field) {
                result.insert(field, getter.call(self)?);
            }
        }

        if recursive {
            for field in self.snapshots.keys() {
                let child = match result.get(field) {
                    Some(Value::Entity(child)) => child.clone(),
                    _ => continue,
                };
                let expanded = child.lock()?.to_map(false)?;
                result.insert(field.as_str(), Value::Map(expanded));
            }
        }

        Ok(result)
    }

    /// Public mutation: honors forced setters. Returns whether the field is
    /// now tracked as modified.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<bool> {
        self.set_resolved(field, value.into(), true)
    }

    fn set_resolved(&mut self, field: &str, value: Value, strict: bool) -> Result<bool> {
        match self.definition.forced_setter(field).cloned() {
            Some(SetterRule::Forbidden) => {
                if strict {
                    return Err(DbError::ForbiddenSetter {
                        entity: self.entity_name().to_string(),
                        field: field.to_string(),
                    });
                }
                self.assign(field, value)
            }
            Some(SetterRule::Method { func, .. }) => {
                let value = if self.definition.has_transformers(field) {
                    self.assign(field, value)?;
                    self.get_raw(field)?
                } else {
                    value
                };
                func(self, value)?;
                Ok(self.modified_new.contains_key(field))
            }
            None => self.assign(field, value),
        }
    }

    /// The tracked update primitive used by `set` and by forced setters.
    ///
    /// The value is transformed and stored unconditionally. It counts as a
    /// change when exactly one side is `NULL` or the text forms differ from
    /// the first original; a field edited back to its original is untracked.
    pub fn assign(&mut self, field: &str, value: impl Into<Value>) -> Result<bool> {
        let (old, old_text) = self.baseline(field)?;
        let new = self.store(field, value.into())?;

        if old.is_null() != new.is_null() || old_text != new.to_text() {
            if !self.modified_old.contains_key(field) {
                self.modified_old.insert(field, old.clone());
                self.original_texts.insert(field.to_string(), old_text);
            }
            self.modified_new.insert(field, new.clone());
            self.fire_triggers(field, &new, &old)?;
            Ok(true)
        } else {
            self.untrack(field);
            Ok(false)
        }
    }

    /// The value a change of `field` is measured against, with its text.
    ///
    /// Objects compare by the snapshot taken when they were stored, since the
    /// stored instance itself may have been mutated since.
    fn baseline(&self, field: &str) -> Result<(Value, String)> {
        if let Some(old) = self.modified_old.get(field) {
            let text = match self.original_texts.get(field) {
                Some(text) => text.clone(),
                None => old.to_text(),
            };
            return Ok((old.clone(), text));
        }
        if let Some(snapshot) = self.snapshots.get(field) {
            return Ok((snapshot.value.clone(), snapshot.text.clone()));
        }
        let current = self.get_raw(field)?;
        let text = current.to_text();
        Ok((current, text))
    }

    fn untrack(&mut self, field: &str) {
        self.modified_old.remove(field);
        self.modified_new.remove(field);
        self.original_texts.remove(field);
    }

    fn fire_triggers(&mut self, field: &str, new: &Value, old: &Value) -> Result<()> {
        let triggers = self.definition.triggers(field).to_vec();
        for trigger in triggers {
            trigger(self, field, new, old)?;
        }
        Ok(())
    }

    /// Transforms and writes a value, refreshing its snapshot.
    fn store(&mut self, field: &str, value: Value) -> Result<Value> {
        let value = match self.definition.transformers(field) {
            Some(rules) if !value.is_null() => transform::apply(rules, self.definition.name(), field, value)?,
            _ => value,
        };

        self.values.insert(field, value.clone());
        match Snapshot::of(&value) {
            Some(snapshot) => {
                self.snapshots.insert(field.to_string(), snapshot);
            }
            None => {
                self.snapshots.remove(field);
            }
        }
        Ok(value)
    }

    /// Writes a value without tracking it as a change, e.g. a generated key
    /// returned by an insert.
    pub fn push(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        self.store(field, value.into())?;
        self.untrack(field);
        Ok(())
    }

    /// Applies `set` to each entry in order. Stops at the first error and
    /// keeps the entries already applied.
    pub fn update(&mut self, values: ValueMap) -> Result<()> {
        for (field, value) in values {
            self.set(&field, value)?;
        }
        Ok(())
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Sets the flag here and on every nested entity.
    pub fn set_new(&mut self, is_new: bool) -> Result<()> {
        self.is_new = is_new;
        for field in self.snapshots.keys() {
            if let Some(Value::Entity(child)) = self.values.get(field) {
                child.lock()?.set_new(is_new)?;
            }
        }
        Ok(())
    }

    pub fn is_modified(&mut self, field: &str) -> Result<bool> {
        if self.has(field) && self.snapshots.contains_key(field) {
            self.check_snapshots(Some(field))?;
        }
        Ok(self.modified_new.contains_key(field))
    }

    fn check_snapshots(&mut self, only: Option<&str>) -> Result<()> {
        let fields: Vec<String> = match only {
            Some(field) if self.snapshots.contains_key(field) => vec![field.to_string()],
            _ => self.snapshots.keys().cloned().collect(),
        };

        for field in fields {
            let current = self.get_raw(&field)?;
            let changed = self
                .snapshots
                .get(&field)
                .is_some_and(|snapshot| snapshot.text != current.to_text());
            if changed {
                self.set_resolved(&field, current, false)?;
            }
        }
        Ok(())
    }

    /// New values of the modified fields.
    pub fn values_updated(&mut self) -> Result<ValueMap> {
        self.check_snapshots(None)?;
        Ok(self.modified_new.clone())
    }

    pub fn values_updated_for<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<ValueMap> {
        self.check_snapshots(None)?;
        Ok(self.modified_new.only(fields))
    }

    /// First original values of the modified fields.
    pub fn values_old(&mut self) -> Result<ValueMap> {
        self.check_snapshots(None)?;
        Ok(self.modified_old.clone())
    }

    pub fn values_old_for<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<ValueMap> {
        self.check_snapshots(None)?;
        Ok(self.modified_old.only(fields))
    }

    /// The tracked original if the field is modified, else the stored value.
    pub fn value_orig(&self, field: &str) -> Result<Value> {
        match self.modified_old.get(field) {
            Some(old) => Ok(old.clone()),
            None => self.get_raw(field),
        }
    }

    /// Clears change tracking.
    ///
    /// With `None` everything is cleared. With a map only its fields are, and
    /// each distinct nested entity in the map is reset first with the map's
    /// non-entity fields; a parent field stays modified while its child still
    /// has changes. Every child is reset once, under its own lock only.
    pub fn reset_modified(&mut self, affected: Option<&ValueMap>) -> Result<()> {
        let Some(affected) = affected else {
            self.modified_old.clear();
            self.modified_new.clear();
            self.original_texts.clear();
            let fields: Vec<String> = self.snapshots.keys().cloned().collect();
            for field in fields {
                self.refresh_snapshot(&field);
            }
            return Ok(());
        };

        let mut children: Vec<SharedEntity> = Vec::new();
        for value in affected.values() {
            if let Value::Entity(child) = value {
                if !children.iter().any(|known| known.ptr_eq(child)) {
                    children.push(child.clone());
                }
            }
        }

        let mut rest = affected.clone();
        rest.retain(|_, value| !matches!(value, Value::Entity(_)));

        let mut dirty: Vec<SharedEntity> = Vec::new();
        for child in children {
            let still_modified = {
                let mut entity = child.lock()?;
                entity.reset_modified(Some(&rest))?;
                !entity.values_updated()?.is_empty()
            };
            if still_modified {
                dirty.push(child);
            }
        }

        for (field, value) in affected.iter() {
            if let Value::Entity(child) = value {
                if dirty.iter().any(|known| known.ptr_eq(child)) {
                    continue;
                }
            }
            self.untrack(field);
            self.refresh_snapshot(field);
        }
        Ok(())
    }

    fn refresh_snapshot(&mut self, field: &str) {
        if let Some(snapshot) = self.values.get(field).and_then(Snapshot::of) {
            self.snapshots.insert(field.to_string(), snapshot);
        }
    }

    /// Canonical dump of the stored values, used as this entity's snapshot
    /// when it is nested in another one.
    pub fn snapshot(&self) -> String {
        self.values.dump()
    }
}
