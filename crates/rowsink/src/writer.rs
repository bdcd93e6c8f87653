//! Sink writer
//!
//! Ties the pieces together for one write job: bind the declared schema at
//! open, validate and batch records as they arrive, commit each closed batch
//! synchronously, and drain the remainder at the end of input.
//!
//! Terminal operations fold failures into the [`JobSummary`] rather than
//! losing the counters with an early return; `rows_written + rows_failed`
//! always equals `rows_submitted` once the job is finished or aborted.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::batch::{Accumulator, Batch};
use crate::committer::Committer;
use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::schema::{Binding, DeclaredSchema};
use crate::store::Store;
use crate::types::Record;

/// Counters for one completed write job
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobSummary {
    /// Records handed to the writer
    pub rows_submitted: u64,
    /// Records durably committed
    pub rows_written: u64,
    /// Records that failed validation or whose batch failed permanently
    pub rows_failed: u64,
    /// Batches committed
    pub batches_committed: u64,
    /// First error encountered, if any
    pub first_error: Option<String>,
}

/// Writes a record stream to a store in batched, transactional upserts
#[derive(Debug)]
pub struct SinkWriter<S: Store> {
    store: Arc<S>,
    binding: Binding,
    accumulator: Accumulator,
    committer: Committer<S>,
    summary: JobSummary,
}

impl<S: Store> SinkWriter<S> {
    /// Open a write job.
    ///
    /// Validates the config, resolves the target table's metadata and binds
    /// the declared schema against it. Any mismatch fails here, before a
    /// single record is accepted.
    pub async fn open(store: Arc<S>, config: &SinkConfig) -> Result<Self> {
        config.check()?;

        let declared = DeclaredSchema::parse(&config.schema)?;
        let table = store
            .table_metadata(config.namespace.as_deref(), &config.table)
            .await?;
        let binding = Binding::bind(&declared, &table)?;

        info!(
            table = %binding.table().qualified_name(),
            endpoint = %config.redacted_endpoint(),
            batch_size = config.batch_size,
            retry_limit = config.retry_limit,
            "sink writer opened"
        );

        Ok(Self {
            committer: Committer::new(store.clone(), config.retry_policy()),
            store,
            binding,
            accumulator: Accumulator::new(config.batch_size, config.max_batch_bytes),
            summary: JobSummary::default(),
        })
    }

    /// The binding resolved at open
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Accept one record.
    ///
    /// Commits synchronously when the record closes a batch. The error is
    /// also recorded in the job summary, so a caller that stops on the first
    /// failure still gets consistent counters from [`SinkWriter::abort`].
    pub async fn write(&mut self, record: Record) -> Result<()> {
        self.summary.rows_submitted += 1;

        if let Err(e) = self.binding.check_record(&record) {
            self.summary.rows_failed += 1;
            self.note_error(&e);
            return Err(e);
        }

        if let Some(batch) = self.accumulator.add(record) {
            self.commit_batch(batch).await?;
        }
        Ok(())
    }

    /// Flush the remainder and close the job, returning the final counters
    pub async fn finish(mut self) -> JobSummary {
        if let Some(batch) = self.accumulator.drain() {
            let _ = self.commit_batch(batch).await;
        }
        self.close().await;
        info!(
            rows_written = self.summary.rows_written,
            rows_failed = self.summary.rows_failed,
            batches = self.summary.batches_committed,
            "sink writer finished"
        );
        self.summary
    }

    /// Abandon the job; records still buffered are counted as failed
    pub async fn abort(mut self) -> JobSummary {
        let buffered = self.accumulator.buffered() as u64;
        if buffered > 0 {
            self.summary.rows_failed += buffered;
            // drop the batch without committing it
            let _ = self.accumulator.drain();
        }
        self.close().await;
        warn!(
            rows_written = self.summary.rows_written,
            rows_failed = self.summary.rows_failed,
            "sink writer aborted"
        );
        self.summary
    }

    /// Drain a record stream into the store.
    ///
    /// Stops at the first failure; buffered records are then counted as
    /// failed. The summary always satisfies
    /// `rows_written + rows_failed == rows_submitted`.
    pub async fn run(mut self, mut records: BoxStream<'_, Record>) -> JobSummary {
        while let Some(record) = records.next().await {
            if self.write(record).await.is_err() {
                return self.abort().await;
            }
        }
        self.finish().await
    }

    async fn commit_batch(&mut self, batch: Batch) -> Result<()> {
        let len = batch.len() as u64;
        match self.committer.commit(&self.binding, &batch).await {
            Ok(_) => {
                self.summary.rows_written += len;
                self.summary.batches_committed += 1;
                Ok(())
            }
            Err(e) => {
                self.summary.rows_failed += len;
                self.note_error(&e);
                Err(e)
            }
        }
    }

    async fn close(&self) {
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "failed to close store");
        }
    }

    fn note_error(&mut self, error: &Error) {
        if self.summary.first_error.is_none() {
            self.summary.first_error = Some(error.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{ColumnMetadata, TableMetadata, Value};

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.create_table(
            TableMetadata::new("table1")
                .with_column(ColumnMetadata::new("id", "INTEGER").primary_key(1))
                .with_column(ColumnMetadata::new("name", "VARCHAR")),
        );
        store
    }

    fn config() -> SinkConfig {
        SinkConfig::new("mem://local", "table1", "id: int, name: varchar")
    }

    fn record(id: i32) -> Record {
        Record::new(vec![Value::Int32(id), Value::Text(format!("a{id}"))])
    }

    #[tokio::test]
    async fn test_open_fails_on_schema_mismatch() {
        let store = store();
        let mut cfg = config();
        cfg.schema = "id: varchar, name: varchar".into();

        let err = SinkWriter::open(store.clone(), &cfg).await.unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
        assert_eq!(store.row_count("table1"), 0);
    }

    #[tokio::test]
    async fn test_open_fails_on_missing_table() {
        let store = store();
        let mut cfg = config();
        cfg.table = "nope".into();

        let err = SinkWriter::open(store, &cfg).await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound { .. }));
    }

    #[tokio::test]
    async fn test_write_and_finish() {
        let store = store();
        let mut cfg = config();
        cfg.batch_size = 10;
        let mut writer = SinkWriter::open(store.clone(), &cfg).await.unwrap();

        for i in 0..25 {
            writer.write(record(i)).await.unwrap();
        }
        let summary = writer.finish().await;

        assert_eq!(summary.rows_submitted, 25);
        assert_eq!(summary.rows_written, 25);
        assert_eq!(summary.rows_failed, 0);
        assert_eq!(summary.batches_committed, 3);
        assert_eq!(store.commit_sizes(), vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_abort_counts_buffered_as_failed() {
        let store = store();
        let mut writer = SinkWriter::open(store.clone(), &config()).await.unwrap();

        for i in 0..7 {
            writer.write(record(i)).await.unwrap();
        }
        let summary = writer.abort().await;

        assert_eq!(summary.rows_submitted, 7);
        assert_eq!(summary.rows_written, 0);
        assert_eq!(summary.rows_failed, 7);
        assert_eq!(store.row_count("table1"), 0);
    }

    #[tokio::test]
    async fn test_invalid_record_is_rejected_and_counted() {
        let store = store();
        let mut writer = SinkWriter::open(store.clone(), &config()).await.unwrap();

        writer.write(record(1)).await.unwrap();
        let bad = Record::new(vec![Value::Text("oops".into()), Value::Null]);
        assert!(writer.write(bad).await.is_err());

        let summary = writer.abort().await;
        assert_eq!(summary.rows_submitted, 2);
        assert_eq!(summary.rows_failed, 2);
        assert!(summary.first_error.is_some());
    }
}
