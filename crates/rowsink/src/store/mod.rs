//! Store abstraction for rowsink
//!
//! The committer talks to a [`Store`], not to a connection. A store applies
//! one batch of upserts atomically: either every record lands or none do, so
//! a failed batch can be retried wholesale without partial effects.

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::Binding;
use crate::types::{Record, TableMetadata};

mod memory;
mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

/// A keyed relational store the sink can commit batches to
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch column metadata for a table.
    ///
    /// Returns [`crate::Error::TableNotFound`] when the table does not exist.
    async fn table_metadata(&self, schema: Option<&str>, table: &str) -> Result<TableMetadata>;

    /// Upsert a batch of records atomically, returning the affected count.
    ///
    /// Rows are keyed by the binding's primary key columns; a record whose
    /// key already exists replaces the stored row. On error no record of the
    /// batch is applied.
    async fn upsert_rows(&self, binding: &Binding, records: &[Record]) -> Result<u64>;

    /// Release the store's resources
    async fn close(&self) -> Result<()>;
}
