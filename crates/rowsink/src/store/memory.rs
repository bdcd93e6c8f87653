//! In-memory store for tests and local development
//!
//! Keeps tables in a process-local map keyed by primary key, with the same
//! upsert and constraint semantics the SQL path has. Failures can be
//! injected per commit to exercise the retry path.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::schema::Binding;
use crate::store::Store;
use crate::types::{Record, TableMetadata, Value};

#[derive(Debug)]
struct TableState {
    metadata: TableMetadata,
    // rows keyed by the encoded primary key
    rows: HashMap<String, Record>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, TableState>,
    injected_failures: Vec<Error>,
    commit_sizes: Vec<usize>,
}

/// In-memory [`Store`] with per-commit failure injection
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table the store should serve metadata for
    pub fn create_table(&self, metadata: TableMetadata) {
        let mut inner = self.inner.lock();
        inner.tables.insert(
            metadata.qualified_name().to_ascii_lowercase(),
            TableState {
                metadata,
                rows: HashMap::new(),
            },
        );
    }

    /// Queue an error to be returned by the next commit.
    ///
    /// Queued errors are consumed in order, one per `upsert_rows` call,
    /// before any rows are applied. Once the queue is empty commits succeed
    /// again.
    pub fn fail_next_commit(&self, error: Error) {
        self.inner.lock().injected_failures.push(error);
    }

    /// Number of rows currently stored in a table
    pub fn row_count(&self, table: &str) -> usize {
        self.inner
            .lock()
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// Snapshot all rows of a table, in unspecified order
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.inner
            .lock()
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up one row by its primary key values, in key order
    pub fn get(&self, table: &str, key: &[Value]) -> Option<Record> {
        let encoded = encode_key(key);
        self.inner
            .lock()
            .tables
            .get(&table.to_ascii_lowercase())
            .and_then(|t| t.rows.get(&encoded).cloned())
    }

    /// Sizes of the batches committed so far, in commit order
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.inner.lock().commit_sizes.clone()
    }
}

fn encode_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(Value::key_fragment).collect();
    parts.join("\u{1}")
}

#[async_trait]
impl Store for MemoryStore {
    async fn table_metadata(&self, schema: Option<&str>, table: &str) -> Result<TableMetadata> {
        let qualified = match schema {
            Some(s) => format!("{s}.{table}"),
            None => table.to_string(),
        };
        self.inner
            .lock()
            .tables
            .get(&qualified.to_ascii_lowercase())
            .map(|t| t.metadata.clone())
            .ok_or(Error::TableNotFound { table: qualified })
    }

    async fn upsert_rows(&self, binding: &Binding, records: &[Record]) -> Result<u64> {
        let mut inner = self.inner.lock();

        if !inner.injected_failures.is_empty() {
            return Err(inner.injected_failures.remove(0));
        }

        let qualified = binding.table().qualified_name().to_ascii_lowercase();

        // validate the whole batch before touching the table, commits are
        // all-or-nothing
        let mut staged = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            for field in binding.fields() {
                let value = record.get(field.index).unwrap_or(&Value::Null);
                if value.is_null() && !field.nullable {
                    return Err(Error::constraint_at(
                        format!("NULL value for NOT NULL column '{}'", field.column),
                        index,
                    ));
                }
            }
            staged.push((encode_key(&binding.key_of(record)), record.clone()));
        }

        let table = inner
            .tables
            .get_mut(&qualified)
            .ok_or_else(|| Error::TableNotFound {
                table: binding.table().qualified_name(),
            })?;

        let affected = staged.len() as u64;
        for (key, record) in staged {
            table.rows.insert(key, record);
        }
        inner.commit_sizes.push(records.len());
        Ok(affected)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DeclaredSchema;
    use crate::types::ColumnMetadata;

    fn store_with_table() -> (MemoryStore, Binding) {
        let metadata = TableMetadata::new("table1")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key(1))
            .with_column(ColumnMetadata::new("name", "VARCHAR"));
        let store = MemoryStore::new();
        store.create_table(metadata.clone());
        let declared = DeclaredSchema::parse("id: int, name: varchar").unwrap();
        let binding = Binding::bind(&declared, &metadata).unwrap();
        (store, binding)
    }

    fn record(id: i32) -> Record {
        Record::new(vec![Value::Int32(id), Value::Text(format!("a{id}"))])
    }

    #[tokio::test]
    async fn test_metadata_lookup() {
        let (store, _) = store_with_table();
        let table = store.table_metadata(None, "table1").await.unwrap();
        assert_eq!(table.columns.len(), 2);

        let err = store.table_metadata(None, "missing").await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound { .. }));
    }

    #[tokio::test]
    async fn test_upsert_inserts_and_replaces_by_key() {
        let (store, binding) = store_with_table();

        store.upsert_rows(&binding, &[record(1), record(2)]).await.unwrap();
        assert_eq!(store.row_count("table1"), 2);

        // same key replaces the row instead of duplicating it
        let updated = Record::new(vec![Value::Int32(1), Value::Text("renamed".into())]);
        store.upsert_rows(&binding, &[updated]).await.unwrap();
        assert_eq!(store.row_count("table1"), 2);

        let row = store.get("table1", &[Value::Int32(1)]).unwrap();
        assert_eq!(row.get(1), Some(&Value::Text("renamed".into())));
    }

    #[tokio::test]
    async fn test_injected_failure_applies_nothing() {
        let (store, binding) = store_with_table();
        store.fail_next_commit(Error::connection("connection reset"));

        let err = store
            .upsert_rows(&binding, &[record(1), record(2)])
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(store.row_count("table1"), 0);

        // queue consumed, the retry succeeds
        store.upsert_rows(&binding, &[record(1), record(2)]).await.unwrap();
        assert_eq!(store.row_count("table1"), 2);
    }

    #[tokio::test]
    async fn test_constraint_violation_is_atomic_and_attributed() {
        let (store, binding) = store_with_table();

        let bad = Record::new(vec![Value::Null, Value::Text("x".into())]);
        let err = store
            .upsert_rows(&binding, &[record(1), bad])
            .await
            .unwrap_err();

        match err {
            Error::Constraint { record_index, .. } => assert_eq!(record_index, Some(1)),
            other => panic!("unexpected error: {other}"),
        }
        // the valid first record was not applied either
        assert_eq!(store.row_count("table1"), 0);
    }

    #[tokio::test]
    async fn test_commit_sizes_are_tracked() {
        let (store, binding) = store_with_table();
        store.upsert_rows(&binding, &[record(1), record(2)]).await.unwrap();
        store.upsert_rows(&binding, &[record(3)]).await.unwrap();
        assert_eq!(store.commit_sizes(), vec![2, 1]);
    }
}
