//! SQL-backed store implementation
//!
//! Bridges the [`Store`] trait onto a [`Connection`] using a [`SqlDialect`]
//! for statement rendering. Each batch runs inside one transaction.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::dialect::{validate_sql_identifier, SqlDialect};
use crate::error::{Error, Result};
use crate::schema::Binding;
use crate::store::Store;
use crate::types::{ColumnMetadata, Record, Row, TableMetadata};

/// Store backed by a SQL connection and a vendor dialect
pub struct SqlStore<C: Connection> {
    conn: C,
    dialect: Box<dyn SqlDialect>,
}

impl<C: Connection> SqlStore<C> {
    /// Create a store over an open connection
    pub fn new(conn: C, dialect: Box<dyn SqlDialect>) -> Self {
        Self { conn, dialect }
    }

    /// The dialect this store renders SQL with
    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    fn parse_column(row: &Row, ordinal_fallback: u32) -> Result<ColumnMetadata> {
        // metadata queries select the same shape across dialects:
        // name, type, nullable, ordinal, key ordinal
        let values = row.values();

        let name = values
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::internal("column metadata row is missing the column name"))?;
        let type_name = values
            .get(1)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::internal("column metadata row is missing the data type"))?;

        // nullability arrives as a bool or a JDBC-style 0/1 flag
        let nullable = match values.get(2) {
            Some(crate::types::Value::Bool(b)) => *b,
            Some(v) => v.as_i64().map(|n| n != 0).unwrap_or(true),
            None => true,
        };

        let ordinal = values
            .get(3)
            .and_then(|v| v.as_i64())
            .map(|n| n as u32)
            .unwrap_or(ordinal_fallback);

        let primary_key_ordinal = values
            .get(4)
            .and_then(|v| v.as_i64())
            .map(|n| n as u32)
            .filter(|&n| n > 0);

        let mut column = ColumnMetadata::new(name, type_name);
        column.nullable = nullable && primary_key_ordinal.is_none();
        column.ordinal = ordinal;
        column.primary_key_ordinal = primary_key_ordinal;
        Ok(column)
    }
}

#[async_trait]
impl<C: Connection> Store for SqlStore<C> {
    async fn table_metadata(&self, schema: Option<&str>, table: &str) -> Result<TableMetadata> {
        if let Some(s) = schema {
            validate_sql_identifier(s)?;
        }
        validate_sql_identifier(table)?;

        let sql = self.dialect.list_columns_sql(schema, table);
        let rows = self.conn.query(&sql, &[]).await?;
        if rows.is_empty() {
            let qualified = match schema {
                Some(s) => format!("{s}.{table}"),
                None => table.to_string(),
            };
            return Err(Error::TableNotFound { table: qualified });
        }

        let mut metadata = TableMetadata::new(table);
        metadata.schema = schema.map(str::to_string);
        for (i, row) in rows.iter().enumerate() {
            metadata = metadata.with_column(Self::parse_column(row, i as u32 + 1)?);
        }

        debug!(
            table = %metadata.qualified_name(),
            columns = metadata.columns.len(),
            "resolved table metadata"
        );
        Ok(metadata)
    }

    async fn upsert_rows(&self, binding: &Binding, records: &[Record]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let columns = binding.columns();
        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        let pk_columns = binding.primary_key_columns();
        let pk_refs: Vec<&str> = pk_columns.iter().map(String::as_str).collect();
        let sql = self
            .dialect
            .upsert_sql(binding.table(), &pk_refs, &column_refs);

        let tx = self.conn.begin().await?;
        let mut affected = 0;
        for record in records {
            match tx.execute(&sql, record.values()).await {
                Ok(n) => affected += n,
                Err(e) => {
                    // the execute error is what the caller must see, a
                    // rollback failure on top of it is only logged
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "rollback failed after upsert error");
                    }
                    return Err(e);
                }
            }
        }
        tx.commit().await?;

        debug!(
            table = %binding.table().qualified_name(),
            rows = records.len(),
            "committed upsert batch"
        );
        Ok(affected)
    }

    async fn close(&self) -> Result<()> {
        self.conn.close().await
    }
}
