use super::definition::Cast;
use crate::core::{DbError, Result, Value, ValueMap};
use crate::mapper::{MapperRef, MapperRegistry};

/// Conversion rule of one field: an optional mapper plus the null policy.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    nullable: bool,
    mapper: Option<MapperRef>,
}

impl Column {
    pub fn new(name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            nullable,
            mapper: None,
        }
    }

    pub fn with_mapper(mut self, mapper: MapperRef) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn mapper(&self) -> Option<&MapperRef> {
        self.mapper.as_ref()
    }

    pub fn is_composite(&self) -> bool {
        self.mapper.as_ref().is_some_and(MapperRef::is_composite)
    }

    fn collapse_falsy(&self, value: Value) -> Value {
        if self.nullable && !value.is_truthy() {
            Value::Null
        } else {
            value
        }
    }

    fn composite_misuse(&self) -> DbError {
        DbError::MappingError(format!(
            "column `{}` has a multi-column mapper and cannot map a single value",
            self.name
        ))
    }

    /// Field value to column value. Under the null policy a falsy value is
    /// `NULL`, both before and after the mapper runs.
    pub fn to_db(&self, value: &Value) -> Result<Value> {
        if self.nullable && !value.is_truthy() {
            return Ok(Value::Null);
        }
        let mapped = match &self.mapper {
            Some(MapperRef::Single(mapper)) => mapper.to_db(value)?,
            Some(MapperRef::Multi(_)) => return Err(self.composite_misuse()),
            None => value.clone(),
        };
        Ok(self.collapse_falsy(mapped))
    }

    pub fn from_db(&self, value: &Value) -> Result<Value> {
        match &self.mapper {
            Some(MapperRef::Single(mapper)) => mapper.from_db(value),
            Some(MapperRef::Multi(_)) => Err(self.composite_misuse()),
            None => Ok(value.clone()),
        }
    }

    /// Virtual value to real column values.
    ///
    /// Under the null policy a falsy virtual value, or one the mapper expands
    /// to no columns, collapses to `NULL`, which a composite column cannot
    /// write: that is a `MappingError`. Sub-column values are passed through.
    pub fn expand(&self, value: &Value) -> Result<ValueMap> {
        let Some(MapperRef::Multi(mapper)) = &self.mapper else {
            return Err(DbError::MappingError(format!("column `{}` is not composite", self.name)));
        };
        if self.nullable && !value.is_truthy() {
            return Err(self.collapsed_to_null());
        }
        let columns = mapper.to_db(value)?;
        if self.nullable && columns.is_empty() {
            return Err(self.collapsed_to_null());
        }
        Ok(columns)
    }

    fn collapsed_to_null(&self) -> DbError {
        DbError::MappingError(format!(
            "column `{}`: expected real column values, got NULL",
            self.name
        ))
    }

    /// Builds the virtual value from a row. `None` when the row carries none
    /// of the mapper's columns.
    pub fn collapse(&self, row: &ValueMap) -> Result<Option<(Vec<String>, Value)>> {
        let Some(MapperRef::Multi(mapper)) = &self.mapper else {
            return Err(DbError::MappingError(format!("column `{}` is not composite", self.name)));
        };
        if !mapper.columns().iter().any(|column| row.contains_key(column)) {
            return Ok(None);
        }
        mapper.from_db(row).map(Some)
    }
}

/// The columns of a table split into ordinary and composite ones.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
    composite: Vec<Column>,
}

impl ColumnSet {
    pub fn from_casts(casts: &[Cast], registry: &MapperRegistry) -> Result<Self> {
        let mut set = Self::default();
        for cast in casts {
            let mut column = Column::new(cast.field(), cast.is_nullable());
            if let Some(name) = cast.mapper_name() {
                column = column.with_mapper(registry.get(name)?);
            }
            if column.is_composite() {
                set.composite.push(column);
            } else {
                set.columns.push(column);
            }
        }
        Ok(set)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn composite(&self) -> &[Column] {
        &self.composite
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .chain(self.composite.iter())
            .find(|column| column.name() == name)
    }

    fn is_virtual(&self, field: &str) -> bool {
        self.composite.iter().any(|column| column.name() == field)
    }

    /// Field values to column values.
    ///
    /// Composite fields are expanded first and replaced by their real
    /// columns; ordinary columns are then mapped in place. An ordinary cast
    /// on a virtual field runs before that field is expanded.
    pub fn map_to_db(&self, values: &ValueMap) -> Result<ValueMap> {
        let mut result = values.clone();

        for column in self.columns.iter().filter(|c| self.is_virtual(c.name())) {
            if let Some(value) = result.get_mut(column.name()) {
                *value = column.to_db(value)?;
            }
        }

        for column in &self.composite {
            let Some(value) = result.remove(column.name()) else {
                continue;
            };
            result.extend(column.expand(&value)?);
        }

        for column in self.columns.iter().filter(|c| !self.is_virtual(c.name())) {
            if let Some(value) = result.get_mut(column.name()) {
                *value = column.to_db(value)?;
            }
        }

        Ok(result)
    }

    /// Column values to field values.
    ///
    /// Ordinary columns are resolved first. Composite columns come last: each
    /// reads the row, its consumed columns are removed and the virtual value
    /// is stored under its own name, where an ordinary cast of the same name
    /// may post-process it.
    pub fn map_from_db(&self, row: ValueMap) -> Result<ValueMap> {
        let mut values = row;

        for column in self.columns.iter().filter(|c| !self.is_virtual(c.name())) {
            if let Some(value) = values.get_mut(column.name()) {
                *value = column.from_db(value)?;
            }
        }

        for column in &self.composite {
            let Some((consumed, value)) = column.collapse(&values)? else {
                continue;
            };
            for name in consumed {
                values.remove(&name);
            }
            values.insert(column.name(), value);
        }

        for column in self.columns.iter().filter(|c| self.is_virtual(c.name())) {
            if let Some(value) = values.get_mut(column.name()) {
                *value = column.from_db(value)?;
            }
        }

        Ok(values)
    }
}
