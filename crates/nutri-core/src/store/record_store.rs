//! Record store trait.
//!
//! Defines the tabular remote storage the profile synchronizer writes to.

use super::failure::StoreFailure;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

/// A single row as returned by the store: column name to JSON value.
pub type Record = Map<String, Value>;

/// Equality predicate selecting one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub column: String,
    pub value: String,
}

impl RecordKey {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether `record` satisfies this predicate.
    pub fn matches(&self, record: &Record) -> bool {
        match record.get(&self.column) {
            Some(Value::String(s)) => s == &self.value,
            Some(Value::Number(n)) => n.to_string() == self.value,
            _ => false,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.column, self.value)
    }
}

/// An abstract remote tabular store.
///
/// This trait decouples the synchronizer from the concrete backend
/// (REST gateway, in-memory emulation, ...).
///
/// # Implementation Notes
///
/// Implementations must report references to columns missing from the
/// remote schema with one of [`super::UNKNOWN_COLUMN_CODES`] and a message
/// naming the column in quotes next to the word "column".
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches the record matching `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Record))`: Record found
    /// - `Ok(None)`: No record matches
    /// - `Err(_)`: The store could not be queried
    async fn fetch_one(&self, table: &str, key: &RecordKey) -> Result<Option<Record>, StoreFailure>;

    /// Updates the record matching `key` with `fields` and returns the
    /// resulting record.
    async fn update_one(
        &self,
        table: &str,
        key: &RecordKey,
        fields: Record,
    ) -> Result<Record, StoreFailure>;

    /// Inserts a new record built from `fields` and returns it.
    async fn insert_one(&self, table: &str, fields: Record) -> Result<Record, StoreFailure>;
}
