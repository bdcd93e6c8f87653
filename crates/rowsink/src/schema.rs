//! Schema binding for rowsink
//!
//! Maps an external record's positional, typed fields to target column names
//! and types. Validation happens exactly once, at job open, so the per-row
//! path only checks variant tags:
//! - `DeclaredSchema`: the `name: type` pairs the dataflow engine declares
//! - `Binding`: the validated, immutable field-to-column mapping

use crate::error::{Error, Result};
use crate::types::{Record, TableMetadata, Value};
use serde::{Deserialize, Serialize};

/// Field type declared by the source engine for one record position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Boolean
    Bool,
    /// 16-bit integer
    Int16,
    /// 32-bit integer
    Int32,
    /// 64-bit integer
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Arbitrary precision decimal
    Decimal,
    /// Text string
    Text,
    /// Binary data
    Bytes,
    /// Date without time
    Date,
    /// Timestamp without timezone
    Timestamp,
}

impl FieldType {
    /// Parse a declared type name, accepting the usual SQL-ish aliases
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "smallint" | "int16" | "short" => Ok(Self::Int16),
            "int" | "integer" | "int32" => Ok(Self::Int32),
            "long" | "bigint" | "int64" => Ok(Self::Int64),
            "float" | "real" | "float32" => Ok(Self::Float32),
            "double" | "float64" => Ok(Self::Float64),
            "decimal" | "numeric" => Ok(Self::Decimal),
            "text" | "string" | "varchar" | "char" => Ok(Self::Text),
            "bytes" | "binary" | "varbinary" => Ok(Self::Bytes),
            "date" => Ok(Self::Date),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            other => Err(Error::schema(format!("unknown field type '{other}'"))),
        }
    }

    /// Whether a value of this field type can be stored in a column of the
    /// given SQL type. Widening numeric conversions are allowed, narrowing
    /// conversions are not.
    pub fn compatible_with(self, sql_type: &str) -> bool {
        let target = normalize_sql_type(sql_type);
        match self {
            Self::Bool => target == "boolean",
            Self::Int16 => matches!(target.as_str(), "smallint" | "integer" | "bigint" | "decimal"),
            Self::Int32 => matches!(target.as_str(), "integer" | "bigint" | "decimal"),
            Self::Int64 => matches!(target.as_str(), "bigint" | "decimal"),
            Self::Float32 => matches!(target.as_str(), "float" | "double"),
            Self::Float64 => target == "double",
            Self::Decimal => target == "decimal",
            Self::Text => target == "varchar",
            Self::Bytes => target == "varbinary",
            Self::Date => matches!(target.as_str(), "date" | "timestamp"),
            Self::Timestamp => target == "timestamp",
        }
    }

    /// Whether a concrete record value carries this declared type.
    ///
    /// `Null` always matches; nullability is enforced per bound column.
    /// Narrower integer variants are accepted where the declared type is
    /// wider, mirroring `compatible_with`.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Int16, Value::Int16(_)) => true,
            (Self::Int32, Value::Int16(_) | Value::Int32(_)) => true,
            (Self::Int64, Value::Int16(_) | Value::Int32(_) | Value::Int64(_)) => true,
            (Self::Float32, Value::Float32(_)) => true,
            (Self::Float64, Value::Float32(_) | Value::Float64(_)) => true,
            (Self::Decimal, Value::Decimal(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Bytes, Value::Bytes(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            _ => false,
        }
    }
}

/// Normalize a vendor SQL type name for compatibility checks.
///
/// Stores report the same logical type under several spellings (e.g.
/// "character varying" vs "VARCHAR", "int4" vs "INTEGER"); both sides are
/// normalized before comparison. Length/precision suffixes are ignored.
fn normalize_sql_type(name: &str) -> String {
    let base = name
        .split('(')
        .next()
        .unwrap_or(name)
        .trim()
        .to_ascii_lowercase();
    match base.as_str() {
        "bool" | "boolean" => "boolean",
        "int2" | "smallint" | "tinyint" => "smallint",
        "int" | "int4" | "integer" => "integer",
        "int8" | "bigint" | "long" => "bigint",
        "float4" | "real" | "float" => "float",
        "float8" | "double" | "double precision" => "double",
        "decimal" | "numeric" => "decimal",
        "varchar" | "char" | "text" | "character varying" | "character" => "varchar",
        "varbinary" | "binary" | "bytea" | "blob" => "varbinary",
        "date" => "date",
        "timestamp" | "datetime" | "timestamp without time zone" => "timestamp",
        other => return other.to_string(),
    }
    .to_string()
}

/// Declared schema for one job: ordered `(field name, field type)` pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredSchema {
    fields: Vec<(String, FieldType)>,
}

impl DeclaredSchema {
    /// Create a declared schema from field pairs
    pub fn new(fields: Vec<(String, FieldType)>) -> Self {
        Self { fields }
    }

    /// Parse a schema string of the form `"id: int, name: varchar"`
    pub fn parse(decl: &str) -> Result<Self> {
        let mut fields = Vec::new();
        for part in decl.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, ty) = part.split_once(':').ok_or_else(|| {
                Error::schema(format!("malformed field declaration '{part}', expected name:type"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::schema(format!(
                    "missing field name in declaration '{part}'"
                )));
            }
            fields.push((name.to_string(), FieldType::parse(ty)?));
        }
        if fields.is_empty() {
            return Err(Error::schema("declared schema has no fields"));
        }
        Ok(Self { fields })
    }

    /// Number of declared fields
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the schema has no fields
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, type)` pairs in field order
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), *t))
    }
}

/// One validated field-to-column mapping within a [`Binding`]
#[derive(Debug, Clone)]
pub struct BoundField {
    /// Record field index
    pub index: usize,
    /// Declared field name
    pub field_name: String,
    /// Declared field type
    pub field_type: FieldType,
    /// Target column name (as reported by the store)
    pub column: String,
    /// Target column SQL type
    pub sql_type: String,
    /// Whether the target column accepts NULL
    pub nullable: bool,
    /// Primary key ordinal of the target column, if any
    pub primary_key_ordinal: Option<u32>,
}

/// Validated mapping from record fields to store columns.
///
/// Created once at job open and immutable thereafter. All schema validation
/// lives here; the per-row check in [`Binding::check_record`] only compares
/// variant tags and nullability.
#[derive(Debug, Clone)]
pub struct Binding {
    table: TableMetadata,
    fields: Vec<BoundField>,
    pk_indices: Vec<usize>,
}

impl Binding {
    /// Validate a declared schema against target table metadata.
    ///
    /// Fails fast, before any writes, on the first incompatible field.
    pub fn bind(declared: &DeclaredSchema, table: &TableMetadata) -> Result<Self> {
        if declared.is_empty() {
            return Err(Error::schema("declared schema has no fields"));
        }

        let mut fields = Vec::with_capacity(declared.len());
        for (index, (name, field_type)) in declared.fields().enumerate() {
            if fields
                .iter()
                .any(|f: &BoundField| f.field_name.eq_ignore_ascii_case(name))
            {
                return Err(Error::schema(format!(
                    "duplicate field '{name}' in declared schema"
                )));
            }

            let column = table.column(name).ok_or_else(|| {
                Error::schema(format!(
                    "field '{name}' does not match any column of table {}",
                    table.qualified_name()
                ))
            })?;

            if !field_type.compatible_with(&column.type_name) {
                return Err(Error::schema(format!(
                    "field '{name}': declared type {field_type:?} is not compatible with column type {}",
                    column.type_name
                )));
            }

            fields.push(BoundField {
                index,
                field_name: name.to_string(),
                field_type,
                column: column.name.clone(),
                sql_type: column.type_name.clone(),
                nullable: column.nullable,
                primary_key_ordinal: column.primary_key_ordinal,
            });
        }

        // The whole primary key must be covered, otherwise upserts cannot be
        // keyed.
        for pk in table.primary_key_columns() {
            if !fields.iter().any(|f| f.column.eq_ignore_ascii_case(&pk.name)) {
                return Err(Error::schema(format!(
                    "primary key column '{}' of table {} is not covered by the declared schema",
                    pk.name,
                    table.qualified_name()
                )));
            }
        }

        // Unbound NOT NULL columns would fail every row at the store; reject
        // them up front.
        for column in &table.columns {
            let bound = fields.iter().any(|f| f.column.eq_ignore_ascii_case(&column.name));
            if !bound && !column.nullable {
                return Err(Error::schema(format!(
                    "NOT NULL column '{}' of table {} is not covered by the declared schema",
                    column.name,
                    table.qualified_name()
                )));
            }
        }

        let mut pk_fields: Vec<&BoundField> = fields
            .iter()
            .filter(|f| f.primary_key_ordinal.is_some())
            .collect();
        pk_fields.sort_by_key(|f| f.primary_key_ordinal);
        let pk_indices: Vec<usize> = pk_fields.into_iter().map(|f| f.index).collect();

        Ok(Self {
            table: table.clone(),
            fields,
            pk_indices,
        })
    }

    /// Target table metadata
    #[inline]
    pub fn table(&self) -> &TableMetadata {
        &self.table
    }

    /// Bound fields in record order
    #[inline]
    pub fn fields(&self) -> &[BoundField] {
        &self.fields
    }

    /// Bound column names in record field order
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column.clone()).collect()
    }

    /// Primary key column names, in key order
    pub fn primary_key_columns(&self) -> Vec<String> {
        self.pk_indices
            .iter()
            .map(|&i| self.fields[i].column.clone())
            .collect()
    }

    /// Cheap per-row validation against the binding.
    ///
    /// Checks arity, value variant tags, and nullability; full type
    /// compatibility was already settled at bind time.
    pub fn check_record(&self, record: &Record) -> Result<()> {
        if record.len() != self.fields.len() {
            return Err(Error::type_conversion(format!(
                "record has {} fields, bound schema expects {}",
                record.len(),
                self.fields.len()
            )));
        }

        for (field, value) in self.fields.iter().zip(record.values()) {
            if value.is_null() {
                if !field.nullable {
                    return Err(Error::constraint(format!(
                        "NULL value for NOT NULL column '{}'",
                        field.column
                    )));
                }
                continue;
            }
            if !field.field_type.accepts(value) {
                return Err(Error::type_conversion(format!(
                    "field '{}': value of type {} does not match declared type {:?}",
                    field.field_name,
                    value.sql_type(),
                    field.field_type
                )));
            }
        }

        Ok(())
    }

    /// Extract the primary key values of a record, in key order
    pub fn key_of(&self, record: &Record) -> Vec<Value> {
        self.pk_indices
            .iter()
            .filter_map(|&i| record.get(i).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnMetadata;

    fn users_table() -> TableMetadata {
        TableMetadata::new("table1")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key(1))
            .with_column(ColumnMetadata::new("name", "VARCHAR"))
    }

    #[test]
    fn test_parse_declared_schema() {
        let schema = DeclaredSchema::parse("id: int, name: varchar").unwrap();
        assert_eq!(schema.len(), 2);
        let fields: Vec<_> = schema.fields().collect();
        assert_eq!(fields[0], ("id", FieldType::Int32));
        assert_eq!(fields[1], ("name", FieldType::Text));
    }

    #[test]
    fn test_parse_rejects_malformed_schema() {
        assert!(DeclaredSchema::parse("").is_err());
        assert!(DeclaredSchema::parse("id").is_err());
        assert!(DeclaredSchema::parse("id: wibble").is_err());
        assert!(DeclaredSchema::parse(": int").is_err());
    }

    #[test]
    fn test_type_compatibility_widening() {
        assert!(FieldType::Int32.compatible_with("INTEGER"));
        assert!(FieldType::Int32.compatible_with("BIGINT"));
        assert!(FieldType::Int16.compatible_with("int4"));
        assert!(FieldType::Float32.compatible_with("DOUBLE PRECISION"));
        assert!(FieldType::Text.compatible_with("VARCHAR(255)"));

        // narrowing is rejected
        assert!(!FieldType::Int64.compatible_with("INTEGER"));
        assert!(!FieldType::Float64.compatible_with("REAL"));
        assert!(!FieldType::Text.compatible_with("INTEGER"));
    }

    #[test]
    fn test_bind_success() {
        let declared = DeclaredSchema::parse("id: int, name: varchar").unwrap();
        let binding = Binding::bind(&declared, &users_table()).unwrap();

        assert_eq!(binding.columns(), vec!["id", "name"]);
        assert_eq!(binding.primary_key_columns(), vec!["id"]);
    }

    #[test]
    fn test_bind_unknown_column() {
        let declared = DeclaredSchema::parse("id: int, email: varchar").unwrap();
        let err = Binding::bind(&declared, &users_table()).unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_bind_incompatible_type_names_first_offender() {
        let declared = DeclaredSchema::parse("id: varchar, name: int").unwrap();
        let err = Binding::bind(&declared, &users_table()).unwrap_err();
        // 'id' comes first in field order
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_bind_requires_primary_key_coverage() {
        let declared = DeclaredSchema::parse("name: varchar").unwrap();
        let table = TableMetadata::new("table1")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key(1))
            .with_column(ColumnMetadata::new("name", "VARCHAR").not_null());
        let err = Binding::bind(&declared, &table).unwrap_err();
        assert!(err.to_string().contains("primary key"));
    }

    #[test]
    fn test_bind_rejects_uncovered_not_null_column() {
        let declared = DeclaredSchema::parse("id: int").unwrap();
        let table = TableMetadata::new("table1")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key(1))
            .with_column(ColumnMetadata::new("name", "VARCHAR").not_null());
        let err = Binding::bind(&declared, &table).unwrap_err();
        assert!(err.to_string().contains("NOT NULL"));
    }

    #[test]
    fn test_bind_rejects_duplicate_fields() {
        let declared = DeclaredSchema::parse("id: int, id: int").unwrap();
        let err = Binding::bind(&declared, &users_table()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_check_record() {
        let declared = DeclaredSchema::parse("id: int, name: varchar").unwrap();
        let binding = Binding::bind(&declared, &users_table()).unwrap();

        let ok = Record::new(vec![Value::Int32(1), Value::Text("a1".into())]);
        assert!(binding.check_record(&ok).is_ok());

        // wrong arity
        let short = Record::new(vec![Value::Int32(1)]);
        assert!(binding.check_record(&short).is_err());

        // wrong variant tag
        let wrong = Record::new(vec![Value::Text("x".into()), Value::Text("a1".into())]);
        assert!(binding.check_record(&wrong).is_err());

        // NULL into the NOT NULL pk column
        let null_pk = Record::new(vec![Value::Null, Value::Text("a1".into())]);
        assert!(matches!(
            binding.check_record(&null_pk),
            Err(Error::Constraint { .. })
        ));

        // NULL into a nullable column is fine
        let null_name = Record::new(vec![Value::Int32(1), Value::Null]);
        assert!(binding.check_record(&null_name).is_ok());
    }

    #[test]
    fn test_key_extraction() {
        let declared = DeclaredSchema::parse("id: int, name: varchar").unwrap();
        let binding = Binding::bind(&declared, &users_table()).unwrap();

        let record = Record::new(vec![Value::Int32(9), Value::Text("a9".into())]);
        assert_eq!(binding.key_of(&record), vec![Value::Int32(9)]);
    }

    #[test]
    fn test_composite_key_order_follows_key_ordinals() {
        let declared = DeclaredSchema::parse("ts: timestamp, id: long, v: double").unwrap();
        let table = TableMetadata::new("events")
            .with_column(ColumnMetadata::new("ts", "TIMESTAMP").primary_key(2))
            .with_column(ColumnMetadata::new("id", "BIGINT").primary_key(1))
            .with_column(ColumnMetadata::new("v", "DOUBLE"));
        let binding = Binding::bind(&declared, &table).unwrap();

        assert_eq!(binding.primary_key_columns(), vec!["id", "ts"]);
    }
}
