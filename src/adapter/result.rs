use std::fmt;

use crate::core::{Value, ValueMap};

pub type Row = Vec<Value>;

/// Rows returned by a statement, column-major names plus positional values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Builds a result from records; columns are the union of their keys in
    /// first-seen order and missing cells are `NULL`.
    pub fn from_records(records: Vec<ValueMap>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_records(self) -> Vec<ValueMap> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }

    pub fn first_column(&self) -> Vec<Value> {
        self.rows.iter().filter_map(|row| row.first().cloned()).collect()
    }

    pub fn first_value(&self) -> Value {
        self.rows
            .first()
            .and_then(|row| row.first().cloned())
            .unwrap_or(Value::Null)
    }
}

/// Plain-text table, handy in debug logs.
impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "Empty result set");
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(value.to_string().len());
                }
            }
        }

        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", col, width = widths[i]))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", separator.join("-+-"))?;

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, val)| format!("{:width$}", val.to_string(), width = widths.get(i).copied().unwrap_or(0)))
                .collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }

        writeln!(f, "\n{} row(s)", self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_map;

    #[test]
    fn test_records_round_trip_with_missing_cells() {
        let result = QueryResult::from_records(vec![
            value_map! { "id" => 1, "name" => "a" },
            value_map! { "id" => 2, "code" => "x" },
        ]);
        assert_eq!(result.columns, vec!["id", "name", "code"]);
        assert_eq!(result.rows[1], vec![Value::from(2), Value::Null, Value::from("x")]);

        let records = result.into_records();
        assert_eq!(records[0], value_map! { "id" => 1, "name" => "a", "code" => Value::Null });
    }

    #[test]
    fn test_first_value() {
        assert_eq!(QueryResult::empty().first_value(), Value::Null);
        let result = QueryResult::from_records(vec![value_map! { "count" => 3 }]);
        assert_eq!(result.first_value(), Value::Integer(3));
        assert!(result.to_string().contains("count"));
    }
}
