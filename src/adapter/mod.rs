//! The database seam: everything the table layer needs from a connection.

pub mod recording;
pub mod result;

pub use recording::RecordingAdapter;
pub use result::{QueryResult, Row};

use crate::core::{Result, Value, ValueMap};

/// A synchronous connection that runs rendered SQL.
///
/// Implementors provide `execute` and `query`; the row helpers are derived
/// from `query`.
pub trait DbAdapter: Send + Sync {
    /// Runs a statement and returns the number of affected rows.
    fn execute(&self, sql: &str) -> Result<u64>;

    fn query(&self, sql: &str) -> Result<QueryResult>;

    fn select_list(&self, sql: &str) -> Result<Vec<ValueMap>> {
        Ok(self.query(sql)?.into_records())
    }

    fn select_row(&self, sql: &str) -> Result<Option<ValueMap>> {
        Ok(self.query(sql)?.into_records().into_iter().next())
    }

    fn select_column(&self, sql: &str) -> Result<Vec<Value>> {
        Ok(self.query(sql)?.first_column())
    }

    fn select_value(&self, sql: &str) -> Result<Value> {
        Ok(self.query(sql)?.first_value())
    }
}
