use std::collections::VecDeque;
use std::sync::Mutex;

use super::{DbAdapter, QueryResult};
use crate::core::{DbError, Result, ValueMap};

enum Reply {
    Rows(QueryResult),
    Failure(String),
}

/// In-memory adapter that records every statement and replays queued
/// replies in order. An empty queue answers with no rows.
#[derive(Default)]
pub struct RecordingAdapter {
    log: Mutex<Vec<String>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the rows returned by the next statement.
    pub fn push_records(&self, records: Vec<ValueMap>) -> Result<()> {
        self.push_result(QueryResult::from_records(records))
    }

    pub fn push_result(&self, result: QueryResult) -> Result<()> {
        self.replies.lock()?.push_back(Reply::Rows(result));
        Ok(())
    }

    /// Makes the next statement fail with `ExecutionError`.
    pub fn push_failure(&self, message: impl Into<String>) -> Result<()> {
        self.replies.lock()?.push_back(Reply::Failure(message.into()));
        Ok(())
    }

    /// Every statement seen so far.
    pub fn statements(&self) -> Result<Vec<String>> {
        Ok(self.log.lock()?.clone())
    }

    pub fn last_statement(&self) -> Result<Option<String>> {
        Ok(self.log.lock()?.last().cloned())
    }

    pub fn statement_count(&self) -> Result<usize> {
        Ok(self.log.lock()?.len())
    }

    pub fn clear(&self) -> Result<()> {
        self.log.lock()?.clear();
        self.replies.lock()?.clear();
        Ok(())
    }

    fn record(&self, sql: &str) -> Result<QueryResult> {
        self.log.lock()?.push(sql.to_string());
        match self.replies.lock()?.pop_front() {
            Some(Reply::Rows(result)) => Ok(result),
            Some(Reply::Failure(message)) => Err(DbError::ExecutionError(message)),
            None => Ok(QueryResult::empty()),
        }
    }
}

impl DbAdapter for RecordingAdapter {
    fn execute(&self, sql: &str) -> Result<u64> {
        let result = self.record(sql)?;
        Ok(if result.is_empty() { 1 } else { result.row_count() as u64 })
    }

    fn query(&self, sql: &str) -> Result<QueryResult> {
        self.record(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::value_map;

    #[test]
    fn test_replays_in_order_and_logs() {
        let adapter = RecordingAdapter::new();
        adapter.push_records(vec![value_map! { "id" => 1 }]).unwrap();
        adapter.push_failure("boom").unwrap();

        assert_eq!(adapter.select_value("SELECT 1").unwrap(), Value::Integer(1));
        assert!(matches!(adapter.execute("DELETE"), Err(DbError::ExecutionError(m)) if m == "boom"));
        assert_eq!(adapter.select_row("SELECT 2").unwrap(), None);
        assert_eq!(adapter.statements().unwrap(), vec!["SELECT 1", "DELETE", "SELECT 2"]);
    }
}
