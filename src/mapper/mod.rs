//! Bidirectional converters between column values and field values.

pub mod datetime;
pub mod geo_point;
pub mod int;
pub mod float;
pub mod intbool;
pub mod json;
pub mod pg_array;
pub mod pg_bool;
pub mod pg_daterange;
pub mod pg_hash;
pub mod string;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::core::{DbError, Result, Value, ValueMap};

pub use datetime::DatetimeMapper;
pub use float::FloatMapper;
pub use geo_point::GeoPointMapper;
pub use int::IntMapper;
pub use intbool::IntboolMapper;
pub use json::JsonMapper;
pub use pg_array::PgArrayMapper;
pub use pg_bool::PgBoolMapper;
pub use pg_daterange::PgDaterangeMapper;
pub use pg_hash::PgHashMapper;
pub use string::StringMapper;

/// Converter for a single column.
///
/// Both directions must accept `NULL`.
pub trait Mapper: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    fn to_db(&self, value: &Value) -> Result<Value>;

    fn from_db(&self, value: &Value) -> Result<Value>;
}

/// Converter for a virtual field stored across several real columns.
pub trait MultiColumnMapper: Send + Sync {
    fn name(&self) -> &'static str;

    /// The real columns this mapper reads and writes.
    fn columns(&self) -> &[&str];

    /// Expands the virtual value into real column values.
    fn to_db(&self, value: &Value) -> Result<ValueMap>;

    /// Builds the virtual value from a row. Returns the columns it consumed,
    /// which the caller removes from the row.
    fn from_db(&self, row: &ValueMap) -> Result<(Vec<String>, Value)>;
}

#[derive(Clone)]
pub enum MapperRef {
    Single(Arc<dyn Mapper>),
    Multi(Arc<dyn MultiColumnMapper>),
}

impl MapperRef {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Single(mapper) => mapper.name(),
            Self::Multi(mapper) => mapper.name(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    /// Whether both refer to the same instance.
    pub fn ptr_eq(&self, other: &MapperRef) -> bool {
        match (self, other) {
            (Self::Single(a), Self::Single(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Self::Multi(a), Self::Multi(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for MapperRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(mapper) => write!(f, "Single({})", mapper.name()),
            Self::Multi(mapper) => write!(f, "Multi({})", mapper.name()),
        }
    }
}

type MapperFactory = fn() -> MapperRef;

fn single_factory<M: Mapper + Default + 'static>() -> MapperRef {
    MapperRef::Single(Arc::new(M::default()))
}

fn multi_factory<M: MultiColumnMapper + Default + 'static>() -> MapperRef {
    MapperRef::Multi(Arc::new(M::default()))
}

/// Lazily instantiating registry of mappers, addressed by alias or by type
/// name. Each mapper is created at most once per registry.
pub struct MapperRegistry {
    factories: HashMap<String, MapperFactory>,
    aliases: HashMap<String, String>,
    instances: Mutex<HashMap<String, MapperRef>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            aliases: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with the standard mappers under their usual aliases.
    pub fn with_default_mappers() -> Self {
        let mut registry = Self::new();
        registry
            .register_as::<StringMapper>("string")
            .register_as::<IntMapper>("int")
            .register_as::<FloatMapper>("float")
            .register_as::<PgBoolMapper>("pg_bool")
            .register_as::<IntboolMapper>("intbool")
            .register_as::<PgArrayMapper>("pg_array")
            .register_as::<PgHashMapper>("pg_hash")
            .register_as::<DatetimeMapper>("datetime")
            .register_as::<PgDaterangeMapper>("pg_daterange")
            .register_as::<JsonMapper>("json")
            .register_as::<GeoPointMapper>("geo_point");
        registry
    }

    /// Registers a single-column mapper under its type name.
    pub fn register<M: Mapper + Default + 'static>(&mut self) -> &mut Self {
        self.factories
            .insert(std::any::type_name::<M>().to_string(), single_factory::<M>);
        self
    }

    pub fn register_as<M: Mapper + Default + 'static>(&mut self, alias: &str) -> &mut Self {
        self.register::<M>().alias(alias, std::any::type_name::<M>())
    }

    /// Registers a multi-column mapper under its type name.
    pub fn register_multi<M: MultiColumnMapper + Default + 'static>(&mut self) -> &mut Self {
        self.factories
            .insert(std::any::type_name::<M>().to_string(), multi_factory::<M>);
        self
    }

    pub fn register_multi_as<M: MultiColumnMapper + Default + 'static>(&mut self, alias: &str) -> &mut Self {
        self.register_multi::<M>().alias(alias, std::any::type_name::<M>())
    }

    pub fn alias(&mut self, alias: &str, type_name: &str) -> &mut Self {
        self.aliases.insert(alias.to_string(), type_name.to_string());
        self
    }

    fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(self.resolve_name(name))
    }

    /// The shared instance for an alias or a type name.
    pub fn get(&self, name: &str) -> Result<MapperRef> {
        let type_name = self.resolve_name(name);
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| DbError::UnknownMapper(name.to_string()))?;

        let mut instances = self.instances.lock()?;
        let mapper = instances
            .entry(type_name.to_string())
            .or_insert_with(|| factory())
            .clone();
        Ok(mapper)
    }

    pub fn get_type<M: 'static>(&self) -> Result<MapperRef> {
        self.get(std::any::type_name::<M>())
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::with_default_mappers()
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<&String> = self.aliases.keys().collect();
        aliases.sort();
        f.debug_struct("MapperRegistry")
            .field("aliases", &aliases)
            .field("registered", &self.factories.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_and_type_name_share_instance() {
        let registry = MapperRegistry::with_default_mappers();
        let by_alias = registry.get("pg_bool").unwrap();
        let by_type = registry.get_type::<PgBoolMapper>().unwrap();
        assert!(by_alias.ptr_eq(&by_type));
        assert!(by_alias.ptr_eq(&registry.get("pg_bool").unwrap()));
        assert_eq!(by_alias.name(), "pg_bool");
    }

    #[test]
    fn test_unknown_mapper() {
        let registry = MapperRegistry::with_default_mappers();
        assert!(matches!(registry.get("money"), Err(DbError::UnknownMapper(name)) if name == "money"));
        assert!(!registry.contains("money"));
        assert!(registry.contains("json"));
    }

    #[test]
    fn test_registries_do_not_share_instances() {
        let first = MapperRegistry::with_default_mappers();
        let second = MapperRegistry::with_default_mappers();
        assert!(!first.get("int").unwrap().ptr_eq(&second.get("int").unwrap()));
    }
}
