use std::collections::BTreeMap;
use std::sync::Arc;

use super::Table;
use crate::core::{DbError, Result};

/// Tables by table name and by the name of the model they build.
#[derive(Debug, Default)]
pub struct TablesRepository {
    tables: BTreeMap<String, Arc<Table>>,
    tables_for_models: BTreeMap<String, Arc<Table>>,
}

impl TablesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table. A table whose model is the generic `Entity` is
    /// reachable by table name only.
    pub fn set(&mut self, table: Arc<Table>) {
        if table.model_name() != "Entity" {
            self.tables_for_models
                .insert(table.model_name().to_string(), table.clone());
        }
        self.tables.insert(table.name().to_string(), table);
    }

    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_for_model(&self, model_name: &str) -> Result<Arc<Table>> {
        self.tables_for_models
            .get(model_name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(format!("table for model `{}`", model_name)))
    }

    pub fn has(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn has_model(&self, model_name: &str) -> bool {
        self.tables_for_models.contains_key(model_name)
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDefinition;
    use crate::adapter::RecordingAdapter;
    use crate::table::{TableDefinition, TableFactory};

    #[test]
    fn test_lookup_by_table_and_model() {
        let factory = TableFactory::new(Arc::new(RecordingAdapter::new()));
        let mut repository = TablesRepository::new();
        repository.set(factory.make(TableDefinition::new("users")).unwrap());
        repository.set(
            factory
                .make(TableDefinition::new("posts").with_model(ModelDefinition::new("Post")))
                .unwrap(),
        );

        assert_eq!(repository.len(), 2);
        assert_eq!(repository.table("posts").unwrap().name(), "posts");
        assert_eq!(repository.table_for_model("Post").unwrap().name(), "posts");
        assert_eq!(repository.table_for_model("users").unwrap().name(), "users");
        assert!(!repository.has_model("Entity"));
        assert!(matches!(repository.table("comments"), Err(DbError::TableNotFound(_))));
        assert!(repository.table_for_model("Comment").is_err());
    }
}
