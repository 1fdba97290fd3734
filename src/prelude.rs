//! Everything an application usually needs, in one import.
//!
//! ```ignore
//! use rustmemorm::prelude::*;
//! ```

pub use crate::adapter::{DbAdapter, QueryResult};
pub use crate::core::{DbError, Result, SharedEntity, Value, ValueMap, ValueObject};
pub use rustmemorm_derive::ValueObject;
pub use crate::model::{Entity, ModelDefinition, Transformer};
pub use crate::query::Query;
pub use crate::table::{Table, TableDefinition, TableEvent, TableFactory, TablesRepository};
pub use crate::value_map;
pub use crate::values::{DateRange, DateTime, GeoPoint};
