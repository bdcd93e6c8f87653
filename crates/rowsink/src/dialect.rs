//! SQL dialect abstraction for rowsink
//!
//! Vendor-specific SQL generation for the stores the sink can commit to:
//!
//! - SqlDialect: trait for database-specific SQL generation
//! - PhoenixDialect: HBase-backed stores with native `UPSERT INTO`
//! - PostgresDialect: `INSERT ... ON CONFLICT ... DO UPDATE`
//!
//! All statements are parameterized; identifiers are validated before they
//! reach a dialect and string literals in metadata queries are escaped.

use crate::error::{Error, Result};
use crate::types::TableMetadata;

/// Check a table or schema name before it is interpolated into SQL.
///
/// Accepts an ASCII letter or underscore followed by letters, digits or
/// underscores, up to 255 characters. Everything else is rejected, which
/// shuts the door on injection through configuration values.
pub fn validate_sql_identifier(name: &str) -> Result<()> {
    if name.len() > 255 {
        return Err(Error::config(format!(
            "SQL identifier of {} chars exceeds the 255 char limit",
            name.len()
        )));
    }
    let mut chars = name.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::config(format!(
            "'{name}' is not a valid SQL identifier"
        )));
    }
    Ok(())
}

/// Escape a value for a single-quoted SQL string literal.
///
/// Metadata queries interpolate schema and table names as literals because
/// they are returned as pre-built SQL strings; everything else is
/// parameterized.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// SQL dialect for vendor-specific SQL generation
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column name)
    fn quote_identifier(&self, name: &str) -> String;

    /// Get the placeholder for a parameter (e.g., $1, ?)
    fn placeholder(&self, index: usize) -> String;

    /// Get the SQL for listing columns with nullability and key ordinals
    fn list_columns_sql(&self, schema: Option<&str>, table: &str) -> String;

    /// Generate a parameterized upsert statement for one row
    fn upsert_sql(&self, table: &TableMetadata, pk_columns: &[&str], columns: &[&str]) -> String;

    /// Qualified, quoted table name
    fn qualify(&self, table: &TableMetadata) -> String {
        match &table.schema {
            Some(s) => format!(
                "{}.{}",
                self.quote_identifier(s),
                self.quote_identifier(&table.name)
            ),
            None => self.quote_identifier(&table.name),
        }
    }
}

// ===========================================================================
// Phoenix: UPSERT INTO is native, the row key drives insert-or-update
// ===========================================================================

/// Dialect for Phoenix-style stores over HBase
#[derive(Debug, Clone, Default)]
pub struct PhoenixDialect;

impl SqlDialect for PhoenixDialect {
    fn name(&self) -> &'static str {
        "Phoenix"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn list_columns_sql(&self, schema: Option<&str>, table: &str) -> String {
        let schema_filter = match schema {
            Some(s) => format!("TABLE_SCHEM = '{}'", escape_literal(s)),
            None => "TABLE_SCHEM IS NULL".to_string(),
        };
        format!(
            r#"SELECT
                COLUMN_NAME,
                DATA_TYPE,
                NULLABLE,
                ORDINAL_POSITION,
                KEY_SEQ
            FROM SYSTEM.CATALOG
            WHERE {} AND TABLE_NAME = '{}' AND COLUMN_NAME IS NOT NULL
            ORDER BY ORDINAL_POSITION"#,
            schema_filter,
            escape_literal(table)
        )
    }

    fn upsert_sql(&self, table: &TableMetadata, _pk_columns: &[&str], columns: &[&str]) -> String {
        // the row key is part of the table definition, UPSERT never names it
        let cols: Vec<_> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let params: Vec<_> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();

        format!(
            "UPSERT INTO {} ({}) VALUES ({})",
            self.qualify(table),
            cols.join(", "),
            params.join(", ")
        )
    }
}

// ===========================================================================
// PostgreSQL: INSERT with ON CONFLICT keyed on the primary key columns
// ===========================================================================

/// PostgreSQL dialect
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn list_columns_sql(&self, schema: Option<&str>, table: &str) -> String {
        let schema = escape_literal(schema.unwrap_or("public"));
        let table = escape_literal(table);
        format!(
            r#"SELECT
                c.column_name,
                c.data_type,
                c.is_nullable = 'YES' as nullable,
                c.ordinal_position,
                pk.ordinal_position as pk_ordinal
            FROM information_schema.columns c
            LEFT JOIN (
                SELECT ku.column_name, ku.ordinal_position
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage ku
                    ON tc.constraint_name = ku.constraint_name
                    AND tc.table_schema = ku.table_schema
                    AND tc.table_name = ku.table_name
                WHERE tc.constraint_type = 'PRIMARY KEY'
                    AND tc.table_schema = '{}'
                    AND tc.table_name = '{}'
            ) pk ON c.column_name = pk.column_name
            WHERE c.table_schema = '{}' AND c.table_name = '{}'
            ORDER BY c.ordinal_position"#,
            schema, table, schema, table
        )
    }

    fn upsert_sql(&self, table: &TableMetadata, pk_columns: &[&str], columns: &[&str]) -> String {
        let cols: Vec<_> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let params: Vec<_> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();
        let conflict_cols: Vec<_> = pk_columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect();

        let update_cols: Vec<_> = columns
            .iter()
            .filter(|c| !pk_columns.contains(c))
            .map(|c| {
                let quoted = self.quote_identifier(c);
                format!("{quoted} = EXCLUDED.{quoted}")
            })
            .collect();

        let conflict_action = if update_cols.is_empty() {
            // key-only tables have nothing to update
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", update_cols.join(", "))
        };

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            self.qualify(table),
            cols.join(", "),
            params.join(", "),
            conflict_cols.join(", "),
            conflict_action
        )
    }
}

/// Get a dialect instance by store type name
pub fn dialect_for(name: &str) -> Box<dyn SqlDialect> {
    match name.to_lowercase().as_str() {
        "postgres" | "postgresql" => Box::new(PostgresDialect),
        // HBase-backed stores speak the Phoenix grammar
        _ => Box::new(PhoenixDialect),
    }
}
