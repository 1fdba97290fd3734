//! Minimal SQL statement builder used by tables.
//!
//! Every literal is rendered quoted with `'` doubled; [`Value::Raw`] is
//! emitted verbatim and `NULL` as the keyword.

use std::fmt;

use crate::core::{DbError, Result, Value, ValueMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementKind {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
}

/// Renders a value as an SQL literal.
pub fn quote(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Raw(sql) => sql.clone(),
        other => format!("'{}'", other.to_text().replace('\'', "''")),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    label: Option<String>,
    table: String,
    alias: Option<String>,
    kind: StatementKind,
    columns: Vec<String>,
    values: ValueMap,
    returning: Vec<String>,
    conditions: Vec<String>,
    order_by: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    filters_allowed: Vec<String>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Points the query at a table, keeping everything else.
    pub fn bind(mut self, table: impl Into<String>, alias: Option<String>) -> Self {
        self.table = table.into();
        self.alias = alias;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn get_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Column reference: aliased in a SELECT, bare in writes.
    pub fn col(&self, name: &str) -> String {
        match (&self.alias, self.kind) {
            (Some(alias), StatementKind::Select) => format!("{}.{}", alias, name),
            _ => name.to_string(),
        }
    }

    pub fn select<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.kind = StatementKind::Select;
        self.columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Turns the query into a row count, dropping order and paging.
    pub fn count(mut self) -> Self {
        self.kind = StatementKind::Select;
        self.columns = vec!["count(*)".to_string()];
        self.order_by.clear();
        self.limit = None;
        self.offset = None;
        self
    }

    pub fn insert(mut self) -> Self {
        self.kind = StatementKind::Insert;
        self
    }

    pub fn update(mut self) -> Self {
        self.kind = StatementKind::Update;
        self
    }

    pub fn delete(mut self) -> Self {
        self.kind = StatementKind::Delete;
        self
    }

    /// Column values of an INSERT or UPDATE.
    pub fn values(mut self, values: ValueMap) -> Self {
        self.values = values;
        self
    }

    pub fn returning<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.returning = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn where_raw(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn where_eq(self, column: &str, value: &Value) -> Self {
        let column = self.col(column);
        match value {
            Value::Null => self.where_raw(format!("{} IS NULL", column)),
            other => self.where_raw(format!("{}={}", column, quote(other))),
        }
    }

    /// Restricts the keys accepted by `filter_by`.
    pub fn allow_filters<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.filters_allowed = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Adds `col='value'` for every entry.
    pub fn filter_by(mut self, filters: &ValueMap) -> Result<Self> {
        if !self.filters_allowed.is_empty() {
            let rejected: Vec<&str> = filters
                .keys()
                .filter(|key| !self.filters_allowed.iter().any(|allowed| allowed == key))
                .collect();
            if !rejected.is_empty() {
                return Err(DbError::InvalidArgument(format!(
                    "Filters not allowed: {}",
                    rejected.join(", ")
                )));
            }
        }
        for (key, value) in filters.iter() {
            self = self.where_eq(key, value);
        }
        Ok(self)
    }

    /// Filters by primary key values. Composite keys take one map per id.
    pub fn filter_by_pk<S: AsRef<str>>(self, primary_key: &[S], ids: &[Value]) -> Result<Self> {
        if ids.is_empty() {
            return Err(DbError::InvalidArgument("filter_by_pk: expected a non-empty id list".to_string()));
        }

        if let [pk] = primary_key {
            let list: Vec<String> = ids.iter().map(quote).collect();
            let condition = format!("{} IN ({})", self.col(pk.as_ref()), list.join(", "));
            return Ok(self.where_raw(condition));
        }

        let mut groups = Vec::with_capacity(ids.len());
        for id in ids {
            let Value::Map(parts) = id else {
                return Err(DbError::InvalidArgument(format!(
                    "filter_by_pk: composite key expects a map, got {}",
                    id.type_name()
                )));
            };
            let mut terms = Vec::with_capacity(primary_key.len());
            for pk in primary_key {
                let pk = pk.as_ref();
                let value = parts
                    .get(pk)
                    .ok_or_else(|| DbError::InvalidArgument(format!("filter_by_pk: key part `{}` is missing", pk)))?;
                terms.push(format!("{}={}", self.col(pk), quote(value)));
            }
            groups.push(format!("({})", terms.join(" AND ")));
        }
        let condition = if groups.len() == 1 {
            groups.remove(0)
        } else {
            format!("({})", groups.join(" OR "))
        };
        Ok(self.where_raw(condition))
    }

    pub fn order_by(mut self, expression: impl Into<String>) -> Self {
        self.order_by.push(expression.into());
        self
    }

    pub fn clear_order(mut self) -> Self {
        self.order_by.clear();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    fn render_where(&self, out: &mut String) {
        if !self.conditions.is_empty() {
            out.push_str("\nWHERE ");
            out.push_str(&self.conditions.join(" AND "));
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(label) = &self.label {
            out.push_str(&format!("/*{}*/\n", label.replace("*/", "* /")));
        }

        match self.kind {
            StatementKind::Select => {
                let columns = if self.columns.is_empty() {
                    "*".to_string()
                } else {
                    self.columns.join(", ")
                };
                out.push_str(&format!("SELECT {}\nFROM {}", columns, self.table));
                if let Some(alias) = &self.alias {
                    out.push_str(&format!(" AS {}", alias));
                }
                self.render_where(&mut out);
                if !self.order_by.is_empty() {
                    out.push_str(&format!("\nORDER BY {}", self.order_by.join(", ")));
                }
                if let Some(limit) = self.limit {
                    out.push_str(&format!("\nLIMIT {}", limit));
                }
                if let Some(offset) = self.offset {
                    out.push_str(&format!("\nOFFSET {}", offset));
                }
            }
            StatementKind::Insert => {
                let columns: Vec<&str> = self.values.keys().collect();
                let literals: Vec<String> = self.values.values().map(quote).collect();
                out.push_str(&format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    self.table,
                    columns.join(", "),
                    literals.join(", ")
                ));
                if !self.returning.is_empty() {
                    out.push_str(&format!(" RETURNING {}", self.returning.join(", ")));
                }
            }
            StatementKind::Update => {
                let assignments: Vec<String> = self
                    .values
                    .iter()
                    .map(|(column, value)| format!("{}={}", column, quote(value)))
                    .collect();
                out.push_str(&format!("UPDATE {} SET {}", self.table, assignments.join(", ")));
                self.render_where(&mut out);
            }
            StatementKind::Delete => {
                out.push_str(&format!("DELETE FROM {}", self.table));
                self.render_where(&mut out);
            }
        }

        out
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_map;

    fn base() -> Query {
        Query::new("test").with_alias("t")
    }

    #[test]
    fn test_select_with_label_and_limit() {
        let sql = base()
            .label("TestTable::find_one_by_pk")
            .filter_by_pk(&["id"], &[Value::from("44"), Value::from(55)])
            .unwrap()
            .limit(1);
        assert_eq!(
            sql.render(),
            "/*TestTable::find_one_by_pk*/\nSELECT *\nFROM test AS t\nWHERE t.id IN ('44', '55')\nLIMIT 1"
        );
    }

    #[test]
    fn test_composite_pk_filter() {
        let ids = vec![
            Value::Map(value_map! { "a" => 1, "b" => 2 }),
            Value::Map(value_map! { "a" => 3, "b" => 4 }),
        ];
        let sql = base().filter_by_pk(&["a", "b"], &ids).unwrap();
        assert_eq!(
            sql.render(),
            "SELECT *\nFROM test AS t\nWHERE ((t.a='1' AND t.b='2') OR (t.a='3' AND t.b='4'))"
        );
        assert!(base().filter_by_pk(&["a", "b"], &[Value::from(1)]).is_err());
        assert!(base().filter_by_pk(&["id"], &[]).is_err());
    }

    #[test]
    fn test_write_statements() {
        let insert = Query::new("test")
            .insert()
            .values(value_map! { "code" => "Code", "name" => "Name" })
            .returning(&["id"]);
        assert_eq!(insert.render(), "INSERT INTO test (code, name) VALUES ('Code', 'Name') RETURNING id");

        let update = base()
            .update()
            .values(value_map! { "code" => "New Code" })
            .where_eq("id", &Value::from(556));
        assert_eq!(update.render(), "UPDATE test SET code='New Code'\nWHERE id='556'");

        let delete = base().delete().where_eq("id", &Value::from(556));
        assert_eq!(delete.render(), "DELETE FROM test\nWHERE id='556'");
    }

    #[test]
    fn test_literal_quoting() {
        assert_eq!(quote(&Value::from("O'Neil")), "'O''Neil'");
        assert_eq!(quote(&Value::Null), "NULL");
        assert_eq!(quote(&Value::raw("now()")), "now()");
        assert_eq!(quote(&Value::Boolean(false)), "'0'");
    }

    #[test]
    fn test_filters() {
        let sql = base()
            .filter_by(&value_map! { "code" => "x", "flag" => Value::Null })
            .unwrap()
            .order_by("t.id DESC")
            .limit(10)
            .offset(20);
        assert_eq!(
            sql.to_string(),
            "SELECT *\nFROM test AS t\nWHERE t.code='x' AND t.flag IS NULL\nORDER BY t.id DESC\nLIMIT 10\nOFFSET 20"
        );

        let restricted = base().allow_filters(&["code"]);
        assert!(matches!(
            restricted.filter_by(&value_map! { "name" => "x" }),
            Err(DbError::InvalidArgument(_))
        ));

        let count = sql.count();
        assert_eq!(count.render(), "SELECT count(*)\nFROM test AS t\nWHERE t.code='x' AND t.flag IS NULL");
    }
}
