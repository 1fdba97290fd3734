//! The persistence engine: turns rows into entities and entity changes into
//! statements.

pub mod cache;
pub mod column;
pub mod definition;
pub mod events;
pub mod factory;
pub mod repository;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::{Level, event, info_span};

pub use cache::RowCache;
pub use column::{Column, ColumnSet};
pub use definition::{Cast, TableDefinition, next_alias};
pub use events::{EventListener, Listeners, TableEvent};
pub use factory::TableFactory;
pub use repository::TablesRepository;

use crate::adapter::DbAdapter;
use crate::core::{DbError, Result, Value, ValueMap};
use crate::mapper::MapperRegistry;
use crate::model::Entity;
use crate::query::Query;
use crate::values::DateTime;

pub struct Table {
    definition: TableDefinition,
    adapter: Arc<dyn DbAdapter>,
    mappers: Arc<MapperRegistry>,
    cache: Arc<RowCache>,
    columns: OnceLock<ColumnSet>,
    listeners: RwLock<Listeners>,
    base_query: Query,
}

impl Table {
    pub fn new(
        definition: TableDefinition,
        adapter: Arc<dyn DbAdapter>,
        mappers: Arc<MapperRegistry>,
        cache: Arc<RowCache>,
    ) -> Self {
        let base_query = Query::new(definition.name()).with_alias(definition.alias());
        Self {
            definition,
            adapter,
            mappers,
            cache,
            columns: OnceLock::new(),
            listeners: RwLock::new(Listeners::new()),
            base_query,
        }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn alias(&self) -> &str {
        self.definition.alias()
    }

    pub fn primary_key(&self) -> &[String] {
        self.definition.primary_key_fields()
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn model_name(&self) -> &str {
        self.definition.model().name()
    }

    pub fn adapter(&self) -> &Arc<dyn DbAdapter> {
        &self.adapter
    }

    pub fn mappers(&self) -> &Arc<MapperRegistry> {
        &self.mappers
    }

    pub fn row_cache(&self) -> &Arc<RowCache> {
        &self.cache
    }

    /// Columns parsed from the casts on first use.
    pub fn columns(&self) -> Result<&ColumnSet> {
        if let Some(columns) = self.columns.get() {
            return Ok(columns);
        }
        let built = ColumnSet::from_casts(self.definition.casts(), &self.mappers)?;
        Ok(self.columns.get_or_init(|| built))
    }

    // Events
    // ------------------------------------------------------------------------

    /// Registers a listener by event name.
    pub fn add_listener<L>(&self, event: &str, listener: L) -> Result<()>
    where
        L: EventListener + 'static,
    {
        self.on(event.parse()?, listener)
    }

    pub fn on<L>(&self, event: TableEvent, listener: L) -> Result<()>
    where
        L: EventListener + 'static,
    {
        self.listeners.write()?.add(event, Arc::new(listener));
        Ok(())
    }

    fn fire(&self, event: TableEvent, entity: &mut Entity) -> Result<()> {
        let listeners = self.listeners.read()?.for_event(event);
        for listener in listeners {
            listener.handle(event, entity)?;
        }
        Ok(())
    }

    // Queries
    // ------------------------------------------------------------------------

    /// Copy of the base query labeled `<table>::<label>`.
    pub fn sql(&self, label: &str) -> Query {
        let mut query = self.base_query.clone();
        query.set_label(Some(format!("{}::{}", self.name(), label)));
        query
    }

    pub fn query(&self) -> Query {
        self.base_query.clone()
    }

    /// Replaces the base query, binding it to this table.
    pub fn set_base_query(&mut self, query: Query) {
        self.base_query = query.bind(self.definition.name(), Some(self.definition.alias().to_string()));
    }

    fn write_sql(&self, label: &str) -> Query {
        Query::new(self.name()).label(format!("{}::{}", self.name(), label))
    }

    fn where_pk(&self, mut query: Query, pk: &Value) -> Result<Query> {
        match (self.primary_key(), pk) {
            ([field], value) => Ok(query.where_eq(field, value)),
            (fields, Value::Map(parts)) if !fields.is_empty() => {
                for field in fields {
                    let value = parts.get(field).ok_or_else(|| {
                        DbError::InvalidArgument(format!("{}: primary key part `{}` is missing", self.name(), field))
                    })?;
                    query = query.where_eq(field, value);
                }
                Ok(query)
            }
            (fields, value) => Err(DbError::InvalidArgument(format!(
                "{}: primary key ({}) cannot be matched by {}",
                self.name(),
                fields.join(", "),
                value.type_name()
            ))),
        }
    }

    /// Cache key of a primary key value, composite parts taken in key order.
    fn cache_key(&self, id: &Value) -> String {
        match id {
            Value::Map(parts) if self.definition.is_composite_key() => {
                let ordered: ValueMap = self
                    .primary_key()
                    .iter()
                    .map(|field| (field.clone(), parts.get(field).cloned().unwrap_or(Value::Null)))
                    .collect();
                RowCache::key(&Value::Map(ordered))
            }
            other => RowCache::key(other),
        }
    }

    // Reading
    // ------------------------------------------------------------------------

    /// Entity from a raw row; never new.
    pub fn make_model(&self, row: ValueMap) -> Result<Entity> {
        let values = self.map_from_db(row)?;
        Entity::new(self.definition.model().clone(), values, false)
    }

    pub fn find_list(&self, query: &Query) -> Result<Vec<Entity>> {
        let sql = query.render();
        event!(Level::DEBUG, table = %self.name(), sql = %sql, "select");
        self.adapter
            .select_list(&sql)?
            .into_iter()
            .map(|row| self.make_model(row))
            .collect()
    }

    /// Entities keyed by the text form of `field`. A later row replaces an
    /// earlier one with the same key in place.
    pub fn find_list_indexed(&self, query: &Query, field: &str) -> Result<Vec<(String, Entity)>> {
        let mut result: Vec<(String, Entity)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for entity in self.find_list(query)? {
            let key = entity.resolve(field)?.to_text();
            match positions.get(&key) {
                Some(&index) => result[index].1 = entity,
                None => {
                    positions.insert(key.clone(), result.len());
                    result.push((key, entity));
                }
            }
        }
        Ok(result)
    }

    pub fn find_one(&self, query: &Query, exception: bool) -> Result<Option<Entity>> {
        let query = query.clone().limit(1);
        let found = self.find_list(&query)?.into_iter().next();
        if found.is_none() && exception {
            return Err(DbError::NotFound {
                table: self.name().to_string(),
                query: query.render(),
            });
        }
        Ok(found)
    }

    /// Finds by primary key through the row cache. A falsy id is an
    /// argument error when `exception` is set and `None` otherwise.
    pub fn find_one_by_pk(&self, id: &Value, exception: bool) -> Result<Option<Entity>> {
        if !id.is_truthy() {
            if exception {
                return Err(DbError::InvalidArgument(format!(
                    "{}::find_one_by_pk: ID is not given",
                    self.name()
                )));
            }
            return Ok(None);
        }

        let key = self.cache_key(id);
        self.cache.item(self.name(), &key, || {
            let query = self
                .sql("find_one_by_pk")
                .filter_by_pk(self.primary_key(), std::slice::from_ref(id))?;
            self.find_one(&query, exception)
        })
    }

    /// Finds several entities by primary key, in the requested order. Only
    /// the ids missing from the row cache are queried; falsy ids and ids
    /// without a row are skipped.
    pub fn find_list_by_pk(&self, ids: &[Value]) -> Result<Vec<Entity>> {
        let ids: Vec<&Value> = ids.iter().filter(|id| id.is_truthy()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: HashMap<String, Entity> = HashMap::new();
        let mut searched: HashSet<String> = HashSet::new();
        let mut search = Vec::new();
        for id in &ids {
            let key = self.cache_key(id);
            if found.contains_key(&key) || searched.contains(&key) {
                continue;
            }
            match self.cache.get(self.name(), &key)? {
                Some(entity) => {
                    found.insert(key, entity);
                }
                None => {
                    searched.insert(key);
                    search.push((*id).clone());
                }
            }
        }
        event!(
            Level::DEBUG,
            table = %self.name(),
            cached = found.len(),
            missing = search.len(),
            "find_list_by_pk"
        );

        if !search.is_empty() {
            let query = self.sql("find_list_by_pk").filter_by_pk(self.primary_key(), &search)?;
            let fetched = self.find_list(&query)?;
            self.cache(&fetched)?;
            for entity in fetched {
                let key = self.cache_key(&self.extract_pk_values(&entity, false)?);
                found.insert(key, entity);
            }
        }

        Ok(ids
            .into_iter()
            .filter_map(|id| found.get(&self.cache_key(id)).cloned())
            .collect())
    }

    /// Drops the entity's cached row and loads it again.
    pub fn refresh(&self, entity: &Entity) -> Result<Option<Entity>> {
        let pk = self.extract_pk_values(entity, false)?;
        self.cache.clear(Some(self.name()), Some(&self.cache_key(&pk)))?;
        self.find_one_by_pk(&pk, false)
    }

    /// Counts the query's rows, then hands them to `handler` page by page.
    pub fn chunk<F>(&self, page_size: usize, query: &Query, mut handler: F) -> Result<()>
    where
        F: FnMut(Vec<Entity>) -> Result<()>,
    {
        if page_size == 0 {
            return Err(DbError::InvalidArgument("chunk: page size must be positive".to_string()));
        }

        let count = self.adapter.select_value(&query.clone().count().render())?.to_int();
        let mut items_left = count.max(0) as usize;
        let mut offset = 0;
        while items_left > 0 {
            let mut page = query.clone().limit(page_size);
            if offset > 0 {
                page = page.offset(offset);
            }
            handler(self.find_list(&page)?)?;
            offset += page_size;
            items_left = items_left.saturating_sub(page_size);
        }
        Ok(())
    }

    // Writing
    // ------------------------------------------------------------------------

    /// Keeps only the writable fields.
    pub fn filter_fields(&self, values: &ValueMap) -> ValueMap {
        let allowed = self.definition.allowed_fields();
        if allowed.is_empty() {
            values.clone()
        } else {
            values.only(allowed)
        }
    }

    /// Inserts a new entity. Returns `false` when there was nothing to write.
    ///
    /// Values returned for the primary key are pushed into the entity, the
    /// written fields stop being tracked and the entity is no longer new.
    pub fn insert(&self, entity: &mut Entity) -> Result<bool> {
        let span = info_span!("table.insert", table = %self.name());
        let _enter = span.enter();

        if self.filter_fields(&entity.to_map(false)?).is_empty() {
            event!(Level::DEBUG, "insert skipped: no writable fields");
            return Ok(false);
        }

        self.fire(TableEvent::PreInsert, entity)?;
        self.fire(TableEvent::PreSave, entity)?;

        let values = self.filter_fields(&entity.to_map(false)?);
        let insert_values = self.filter_fields(&self.map_to_db(&values)?);
        if insert_values.is_empty() {
            event!(Level::DEBUG, "insert skipped: nothing left after mapping");
            return Ok(false);
        }

        let query = self
            .write_sql("insert")
            .insert()
            .values(insert_values.clone())
            .returning(self.primary_key());
        if let Some(row) = self.adapter.select_row(&query.render())? {
            for (field, value) in self.map_from_db(row)? {
                entity.push(&field, value)?;
            }
        }

        self.fire(TableEvent::PostInsert, entity)?;
        self.fire(TableEvent::PostSave, entity)?;

        entity.reset_modified(Some(&insert_values.union(&values)))?;
        entity.set_new(false)?;
        event!(Level::DEBUG, fields = insert_values.len(), "inserted");
        Ok(true)
    }

    /// Writes the entity's pending changes. Nothing happens, hooks included,
    /// when there are none.
    pub fn update(&self, entity: &mut Entity) -> Result<bool> {
        let span = info_span!("table.update", table = %self.name());
        let _enter = span.enter();

        if entity.values_updated()?.is_empty() {
            event!(Level::DEBUG, "update skipped: no changes");
            return Ok(false);
        }

        self.fire(TableEvent::PreUpdate, entity)?;
        self.fire(TableEvent::PreSave, entity)?;

        let values = self.filter_fields(&entity.values_updated()?);
        let update_values = self.filter_fields(&self.map_to_db(&values)?);
        if update_values.is_empty() {
            event!(Level::DEBUG, "update skipped: no writable changes");
            return Ok(false);
        }

        let pk = self.extract_pk_values(entity, true)?;
        let query = self.where_pk(self.write_sql("update").update().values(update_values.clone()), &pk)?;
        self.adapter.execute(&query.render())?;
        self.cache.clear(Some(self.name()), Some(&self.cache_key(&pk)))?;

        self.fire(TableEvent::PostUpdate, entity)?;
        self.fire(TableEvent::PostSave, entity)?;

        entity.reset_modified(Some(&update_values.union(&values)))?;
        entity.set_new(false)?;
        event!(Level::DEBUG, fields = update_values.len(), "updated");
        Ok(true)
    }

    /// Deletes the entity's row by its original primary key and fires
    /// `post_delete`.
    pub fn delete(&self, entity: &mut Entity) -> Result<u64> {
        let span = info_span!("table.delete", table = %self.name());
        let _enter = span.enter();

        let pk = self.extract_pk_values(entity, true)?;
        let affected = self.execute_delete(&pk)?;
        self.fire(TableEvent::PostDelete, entity)?;
        Ok(affected)
    }

    /// Deletes by a primary key value without firing any event.
    pub fn delete_by_pk(&self, id: &Value) -> Result<u64> {
        let span = info_span!("table.delete", table = %self.name());
        let _enter = span.enter();

        if !id.is_truthy() {
            return Err(DbError::InvalidArgument(format!(
                "{}::delete_by_pk: ID is not given",
                self.name()
            )));
        }
        self.execute_delete(id)
    }

    fn execute_delete(&self, pk: &Value) -> Result<u64> {
        let query = self.where_pk(self.write_sql("delete").delete(), pk)?;
        let affected = self.adapter.execute(&query.render())?;
        self.cache.clear(Some(self.name()), Some(&self.cache_key(pk)))?;
        event!(Level::DEBUG, affected, "deleted");
        Ok(affected)
    }

    /// Stamps the soft-delete field with the current time and saves through
    /// `update`.
    pub fn soft_delete(&self, entity: &mut Entity) -> Result<bool> {
        entity.set(self.definition.soft_delete_column(), DateTime::now())?;
        self.update(entity)
    }

    /// Deletes the row, or stamps its soft-delete field when a foreign key
    /// still references it. Both branches run inside one database-side
    /// block, so `post_delete` fires without knowing which one did.
    pub fn soft_delete_on_violation(&self, entity: &mut Entity) -> Result<()> {
        let span = info_span!("table.soft_delete_on_violation", table = %self.name());
        let _enter = span.enter();

        let pk = self.extract_pk_values(entity, true)?;
        let delete = self.where_pk(Query::new(self.name()).delete(), &pk)?;
        let stamp = ValueMap::new().with(self.definition.soft_delete_column(), Value::raw("now()"));
        let update = self.where_pk(Query::new(self.name()).update().values(stamp), &pk)?;

        let sql = format!(
            "/*{}::soft_delete_on_violation*/\nDO $$\nBEGIN\n  {};\nEXCEPTION WHEN foreign_key_violation THEN\n  {};\nEND $$",
            self.name(),
            delete.render().replace('\n', " "),
            update.render().replace('\n', " ")
        );
        self.adapter.execute(&sql)?;
        self.cache.clear(Some(self.name()), Some(&self.cache_key(&pk)))?;

        event!(
            Level::WARN,
            "post_delete fired after soft_delete_on_violation; the row may only be stamped"
        );
        self.fire(TableEvent::PostDelete, entity)
    }

    /// Primary key of the entity in column form: the value itself, or a map
    /// for a composite key. `use_original` reads the values tracked before
    /// any pending edit.
    pub fn extract_pk_values(&self, entity: &Entity, use_original: bool) -> Result<Value> {
        let mut values = ValueMap::with_capacity(self.primary_key().len());
        for field in self.primary_key() {
            let value = if use_original {
                entity.value_orig(field)?
            } else {
                entity.get_raw(field)?
            };
            values.insert(field.as_str(), value);
        }

        let mut mapped = self.map_to_db(&values)?.only(self.primary_key());
        if let [field] = self.primary_key() {
            return Ok(mapped.remove(field).unwrap_or(Value::Null));
        }
        Ok(Value::Map(mapped))
    }

    /// Puts entities into the row cache under their primary keys.
    pub fn cache(&self, entities: &[Entity]) -> Result<()> {
        for entity in entities {
            let key = self.cache_key(&self.extract_pk_values(entity, false)?);
            self.cache.add(self.name(), key, entity.clone())?;
        }
        Ok(())
    }

    pub fn map_to_db(&self, values: &ValueMap) -> Result<ValueMap> {
        self.columns()?.map_to_db(values)
    }

    pub fn map_from_db(&self, row: ValueMap) -> Result<ValueMap> {
        self.columns()?.map_from_db(row)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .field("alias", &self.alias())
            .field("primary_key", &self.primary_key())
            .field("model", &self.model_name())
            .finish()
    }
}
