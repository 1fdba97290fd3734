use std::sync::Arc;

use super::{RowCache, Table, TableDefinition};
use crate::adapter::DbAdapter;
use crate::core::Result;
use crate::mapper::MapperRegistry;
use crate::query::Query;

/// Builds tables that share one adapter, mapper registry and row cache.
#[derive(Clone)]
pub struct TableFactory {
    adapter: Arc<dyn DbAdapter>,
    mappers: Arc<MapperRegistry>,
    cache: Arc<RowCache>,
}

impl TableFactory {
    /// Factory with the standard mappers and a fresh row cache.
    pub fn new(adapter: Arc<dyn DbAdapter>) -> Self {
        Self::with_services(
            adapter,
            Arc::new(MapperRegistry::with_default_mappers()),
            Arc::new(RowCache::new()),
        )
    }

    pub fn with_services(adapter: Arc<dyn DbAdapter>, mappers: Arc<MapperRegistry>, cache: Arc<RowCache>) -> Self {
        Self { adapter, mappers, cache }
    }

    pub fn mappers(&self) -> &Arc<MapperRegistry> {
        &self.mappers
    }

    pub fn row_cache(&self) -> &Arc<RowCache> {
        &self.cache
    }

    /// Builds a table, resolving its casts up front so an unknown mapper
    /// fails here rather than on first use.
    pub fn make(&self, definition: TableDefinition) -> Result<Arc<Table>> {
        self.make_with_query(definition, None)
    }

    pub fn make_with_query(&self, definition: TableDefinition, query: Option<Query>) -> Result<Arc<Table>> {
        let mut table = Table::new(definition, self.adapter.clone(), self.mappers.clone(), self.cache.clone());
        if let Some(query) = query {
            table.set_base_query(query);
        }
        table.columns()?;
        Ok(Arc::new(table))
    }

    pub fn make_from_json(&self, json: &str) -> Result<Arc<Table>> {
        self.make(TableDefinition::from_json(json)?)
    }

    pub fn make_all(&self, definitions: impl IntoIterator<Item = TableDefinition>) -> Result<Vec<Arc<Table>>> {
        definitions.into_iter().map(|definition| self.make(definition)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RecordingAdapter;
    use crate::core::DbError;

    fn factory() -> TableFactory {
        TableFactory::new(Arc::new(RecordingAdapter::new()))
    }

    #[test]
    fn test_tables_share_services() {
        let factory = factory();
        let tables = factory
            .make_all([TableDefinition::new("a"), TableDefinition::new("b")])
            .unwrap();
        assert!(Arc::ptr_eq(tables[0].row_cache(), tables[1].row_cache()));
        assert!(Arc::ptr_eq(tables[0].mappers(), factory.mappers()));
    }

    #[test]
    fn test_base_query_is_bound_to_table() {
        let table = factory()
            .make_with_query(
                TableDefinition::new("users").with_alias("u"),
                Some(Query::default().where_raw("u.deleted_at IS NULL")),
            )
            .unwrap();
        assert_eq!(
            table.query().render(),
            "SELECT *\nFROM users AS u\nWHERE u.deleted_at IS NULL"
        );
    }

    #[test]
    fn test_unknown_mapper_fails_fast() {
        let result = factory().make_from_json(r#"{"name": "x", "casts": {"a": "money"}}"#);
        assert!(matches!(result, Err(DbError::UnknownMapper(_))));
    }
}
