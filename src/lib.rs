// ============================================================================
// RustMemORM Library
// ============================================================================

extern crate self as rustmemorm;

pub mod core;
pub mod values;
pub mod model;
pub mod mapper;
pub mod query;
pub mod adapter;
pub mod table;
pub mod prelude;

// Re-export main types for convenience
pub use self::core::{DbError, Result, SharedEntity, Value, ValueMap, ValueObject};
pub use rustmemorm_derive::ValueObject;
pub use values::{DateRange, DateTime, GeoPoint};

// Re-export the entity and table API
pub use model::{Entity, ModelDefinition, Transformer};
pub use mapper::{Mapper, MapperRef, MapperRegistry, MultiColumnMapper};
pub use adapter::{DbAdapter, QueryResult, RecordingAdapter};
pub use query::Query;
pub use table::{
    Cast, Column, ColumnSet, EventListener, RowCache, Table, TableDefinition, TableEvent,
    TableFactory, TablesRepository,
};
