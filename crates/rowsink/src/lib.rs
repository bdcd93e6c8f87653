//! # rowsink
//!
//! Batched, fault-tolerant record writer for keyed relational stores.
//!
//! rowsink adapts a stream of positional, typed records into transactional
//! upserts against a table with a primary key. It is the write side of a
//! dataflow job: records arrive one at a time, are validated against the
//! target table once at job open, accumulated into size-bounded batches and
//! committed atomically with retry on transient failures.
//!
//! ## Components
//!
//! - **Schema binding** ([`schema`]): maps declared record fields to store
//!   columns, failing fast on any mismatch before a single write happens
//! - **Batch accumulation** ([`batch`]): order-preserving batching with
//!   record-count and byte budgets
//! - **Commit with retry** ([`committer`]): atomic per-batch commits; keyed
//!   upserts make whole-batch retries idempotent
//! - **Stores** ([`store`]): SQL-backed via [`connection`] and [`dialect`],
//!   plus an in-memory store with failure injection for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowsink::prelude::*;
//!
//! let config = SinkConfig::new(
//!     "phoenix://zk-host:2181/hbase",
//!     "table1",
//!     "id: int, name: varchar",
//! );
//!
//! let mut writer = SinkWriter::open(store, &config).await?;
//! for record in records {
//!     writer.write(record).await?;
//! }
//! let summary = writer.finish().await;
//! assert_eq!(summary.rows_failed, 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod batch;
pub mod committer;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod retry;
pub mod schema;
pub mod store;
pub mod types;
pub mod writer;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Value and type system
    pub use crate::types::{ColumnMetadata, Record, Row, TableMetadata, Value};

    // Schema binding
    pub use crate::schema::{Binding, BoundField, DeclaredSchema, FieldType};

    // Batching
    pub use crate::batch::{Accumulator, Batch};

    // Commit path
    pub use crate::committer::{CommitResult, Committer};
    pub use crate::retry::RetryPolicy;

    // Stores and connectivity
    pub use crate::connection::{Connection, Transaction};
    pub use crate::dialect::{dialect_for, PhoenixDialect, PostgresDialect, SqlDialect};
    pub use crate::store::{MemoryStore, SqlStore, Store};

    // Writer
    pub use crate::config::SinkConfig;
    pub use crate::writer::{JobSummary, SinkWriter};
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use types::{Record, Value};

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        // Ensure common types are accessible
        let _value = Value::Int32(42);
        let _config = SinkConfig::new("phoenix://localhost:2181/hbase", "t", "id: int");
        let _retry = RetryPolicy::default();
    }

    #[test]
    fn test_error_types() {
        let err = Error::connection("test error");
        assert!(err.is_retriable());
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[test]
    fn test_value_types() {
        let v = Value::from(42_i32);
        assert!(!v.is_null());
        assert_eq!(v.as_i64(), Some(42));

        let v = Value::from("hello");
        assert_eq!(v.as_str(), Some("hello"));
    }

    #[test]
    fn test_table_metadata() {
        let table = TableMetadata::new("table1").with_schema("app");
        assert_eq!(table.qualified_name(), "app.table1");
        assert!(table.columns.is_empty());
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(dialect_for("phoenix").name(), "Phoenix");
        assert_eq!(dialect_for("postgres").name(), "PostgreSQL");
    }
}
