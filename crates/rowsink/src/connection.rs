//! Connection traits for rowsink
//!
//! The seam between [`crate::store::SqlStore`] and a concrete driver. A
//! sink job owns one open connection for its lifetime: metadata queries run
//! directly on the connection, each batch commits through a transaction.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Row, Value};

/// A connection to a relational store
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement that modifies data, returns affected row count
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Begin a transaction
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Check if connection is valid/alive
    async fn is_valid(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// A store transaction
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Execute a statement that modifies data within the transaction
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
