//! Batch commit with retry
//!
//! Commits closed batches to the store. Transient failures are retried with
//! backoff up to the configured budget; because the store applies batches
//! atomically and upserts are keyed, a whole-batch retry never duplicates
//! rows. Permanent failures propagate immediately with their record
//! attribution intact.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::schema::Binding;
use crate::store::Store;

/// Outcome of one committed batch
#[derive(Debug, Clone, Copy)]
pub struct CommitResult {
    /// Rows the store reported as affected
    pub rows_committed: u64,
    /// Sequence number of the committed batch
    pub batch_sequence: u64,
    /// Attempts made, including the initial one
    pub attempts: u32,
}

/// Commits batches against a store with a retry policy
#[derive(Debug)]
pub struct Committer<S: Store> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S: Store> Committer<S> {
    /// Create a committer over a store
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Commit one batch, retrying transient failures.
    ///
    /// Returns [`Error::Commit`] when the retry budget is exhausted; any
    /// non-retriable store error is returned as-is on the first attempt.
    pub async fn commit(&self, binding: &Binding, batch: &Batch) -> Result<CommitResult> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.store.upsert_rows(binding, &batch.records).await {
                Ok(rows) => {
                    debug!(
                        batch = batch.sequence,
                        rows,
                        attempts,
                        "batch committed"
                    );
                    return Ok(CommitResult {
                        rows_committed: rows,
                        batch_sequence: batch.sequence,
                        attempts,
                    });
                }
                Err(e) if e.is_retriable() && attempts <= self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempts);
                    warn!(
                        batch = batch.sequence,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "batch commit failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retriable() => {
                    return Err(Error::Commit {
                        batch: batch.sequence,
                        attempts,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}
