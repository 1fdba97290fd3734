use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Deserializer};

use crate::core::{DbError, Result};
use crate::model::ModelDefinition;

static ALIAS_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Next process-unique table alias: `t1`, `t2`, ...
pub fn next_alias() -> String {
    format!("t{}", ALIAS_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1)
}

fn default_primary_key() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_soft_delete_field() -> String {
    "deleted_at".to_string()
}

/// Conversion rule of one field: `null` enables the null policy, the first
/// other tag names a mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cast {
    field: String,
    tags: Vec<String>,
}

impl Cast {
    pub fn new<S: AsRef<str>>(field: impl Into<String>, tags: &[S]) -> Self {
        Self {
            field: field.into(),
            tags: tags.iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_nullable(&self) -> bool {
        self.tags.iter().any(|tag| tag == "null")
    }

    pub fn mapper_name(&self) -> Option<&str> {
        self.tags.iter().map(String::as_str).find(|tag| *tag != "null")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(tag) => tag.split('|').map(|t| t.trim().to_string()).collect(),
            OneOrMany::Many(tags) => tags,
        }
    }
}

fn deserialize_primary_key<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(field) => vec![field],
        OneOrMany::Many(fields) => fields,
    })
}

fn deserialize_casts<'de, D>(deserializer: D) -> std::result::Result<Vec<Cast>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(field, tags)| {
            let tags: Vec<String> = serde_json::from_value::<OneOrMany>(tags)
                .map_err(serde::de::Error::custom)?
                .into();
            Ok(Cast { field, tags })
        })
        .collect()
}

/// Declarative schema of a table.
///
/// ```json
/// {
///   "name": "users",
///   "primary_key": "id",
///   "available_fields": ["id", "name", "flags"],
///   "casts": { "flags": ["null", "pg_array"], "active": "pg_bool" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TableDefinition {
    name: String,
    #[serde(default = "next_alias")]
    alias: String,
    #[serde(default = "default_primary_key", deserialize_with = "deserialize_primary_key")]
    primary_key: Vec<String>,
    #[serde(default)]
    available_fields: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_casts")]
    casts: Vec<Cast>,
    #[serde(default = "default_soft_delete_field")]
    soft_delete_field: String,
    #[serde(skip)]
    model: Arc<ModelDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            model: Arc::new(ModelDefinition::new(name.clone())),
            name,
            alias: next_alias(),
            primary_key: default_primary_key(),
            available_fields: Vec::new(),
            casts: Vec::new(),
            soft_delete_field: default_soft_delete_field(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut definition: Self = serde_json::from_str(json)
            .map_err(|e| DbError::InvalidArgument(format!("table definition: {}", e)))?;
        if definition.primary_key.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "table definition `{}`: primary key is empty",
                definition.name
            )));
        }
        definition.model = Arc::new(ModelDefinition::new(definition.name.clone()));
        Ok(definition)
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn primary_key<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.primary_key = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn available_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.available_fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn cast<S: AsRef<str>>(mut self, field: impl Into<String>, tags: &[S]) -> Self {
        self.casts.push(Cast::new(field, tags));
        self
    }

    pub fn soft_delete_field(mut self, field: impl Into<String>) -> Self {
        self.soft_delete_field = field.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<Arc<ModelDefinition>>) -> Self {
        self.model = model.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn primary_key_fields(&self) -> &[String] {
        &self.primary_key
    }

    pub fn is_composite_key(&self) -> bool {
        self.primary_key.len() > 1
    }

    /// Empty means every field may be written.
    pub fn allowed_fields(&self) -> &[String] {
        &self.available_fields
    }

    pub fn casts(&self) -> &[Cast] {
        &self.casts
    }

    pub fn soft_delete_column(&self) -> &str {
        &self.soft_delete_field
    }

    pub fn model(&self) -> &Arc<ModelDefinition> {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let definition = TableDefinition::from_json(
            r#"{
                "name": "users",
                "alias": "u",
                "primary_key": ["org_id", "id"],
                "available_fields": ["org_id", "id", "tags", "active"],
                "casts": { "tags": ["null", "pg_array"], "active": "pg_bool", "note": "null|string" }
            }"#,
        )
        .unwrap();

        assert_eq!(definition.name(), "users");
        assert_eq!(definition.alias(), "u");
        assert!(definition.is_composite_key());
        assert_eq!(definition.soft_delete_column(), "deleted_at");
        assert_eq!(definition.model().name(), "users");

        let casts = definition.casts();
        assert_eq!(casts.len(), 3);
        assert_eq!(casts[0].field(), "tags");
        assert!(casts[0].is_nullable());
        assert_eq!(casts[0].mapper_name(), Some("pg_array"));
        assert_eq!(casts[1].mapper_name(), Some("pg_bool"));
        assert!(!casts[1].is_nullable());
        assert!(casts[2].is_nullable());
        assert_eq!(casts[2].mapper_name(), Some("string"));
    }

    #[test]
    fn test_defaults_and_generated_alias() {
        let first = TableDefinition::from_json(r#"{"name": "a"}"#).unwrap();
        let second = TableDefinition::new("b");
        assert_eq!(first.primary_key_fields(), ["id"]);
        assert!(first.alias().starts_with('t'));
        assert_ne!(first.alias(), second.alias());
        assert!(first.allowed_fields().is_empty());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            TableDefinition::from_json(r#"{"alias": "x"}"#),
            Err(DbError::InvalidArgument(_))
        ));
        assert!(TableDefinition::from_json(r#"{"name": "x", "primary_key": []}"#).is_err());
    }
}
