//! Local record store with an emulated column schema.

use async_trait::async_trait;
use chrono::Utc;
use nutri_core::store::{Record, RecordKey, RecordStore, StoreFailure};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

const UPDATED_AT: &str = "updated_at";
const CREATED_AT: &str = "created_at";

/// Call counters, for asserting on the write protocol.
#[derive(Debug, Default)]
pub struct StoreCalls {
    pub fetch: AtomicUsize,
    pub update: AtomicUsize,
    pub insert: AtomicUsize,
}

impl StoreCalls {
    pub fn fetches(&self) -> usize {
        self.fetch.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.update.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.insert.load(Ordering::SeqCst)
    }
}

/// In-memory [`RecordStore`].
///
/// When built with a column list, writes naming any other column fail the
/// way the REST gateway reports a schema-cache miss.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    columns: Option<BTreeSet<String>>,
    calls: StoreCalls,
}

impl InMemoryRecordStore {
    /// A store that accepts any column.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose tables only have `columns`.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Record>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calls(&self) -> &StoreCalls {
        &self.calls
    }

    /// Inserts `record` directly, bypassing the schema check.
    pub fn seed(&self, table: &str, record: Record) {
        self.lock().entry(table.to_string()).or_default().push(record);
    }

    /// All records of `table`.
    pub fn records(&self, table: &str) -> Vec<Record> {
        self.lock().get(table).cloned().unwrap_or_default()
    }

    fn check_columns(&self, table: &str, fields: &Record) -> Result<(), StoreFailure> {
        let Some(columns) = &self.columns else {
            return Ok(());
        };
        match fields.keys().find(|name| !columns.contains(name.as_str())) {
            Some(unknown) => Err(StoreFailure::new(
                "PGRST204",
                format!(
                    "Could not find the '{}' column of '{}' in the schema cache",
                    unknown, table
                ),
            )),
            None => Ok(()),
        }
    }

    fn stamp(&self, record: &mut Record, key: &str) {
        let known = self
            .columns
            .as_ref()
            .is_none_or(|columns| columns.contains(key));
        if known {
            record.insert(key.to_string(), Value::from(Utc::now().to_rfc3339()));
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_one(&self, table: &str, key: &RecordKey) -> Result<Option<Record>, StoreFailure> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .lock()
            .get(table)
            .and_then(|rows| rows.iter().find(|row| key.matches(row)))
            .cloned())
    }

    async fn update_one(
        &self,
        table: &str,
        key: &RecordKey,
        fields: Record,
    ) -> Result<Record, StoreFailure> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.check_columns(table, &fields)?;

        let mut tables = self.lock();
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| key.matches(row)))
            .ok_or_else(|| {
                StoreFailure::new("PGRST116", format!("No row in '{}' matches {}", table, key))
            })?;
        row.extend(fields);
        self.stamp(row, UPDATED_AT);
        Ok(row.clone())
    }

    async fn insert_one(&self, table: &str, fields: Record) -> Result<Record, StoreFailure> {
        self.calls.insert.fetch_add(1, Ordering::SeqCst);
        self.check_columns(table, &fields)?;

        let mut record = fields;
        self.stamp(&mut record, CREATED_AT);
        self.stamp(&mut record, UPDATED_AT);
        self.lock()
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }
}
