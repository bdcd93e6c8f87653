//! Error types for rowsink
//!
//! Provides granular error classification for proper retry handling:
//! - Retriable errors (connection, timeout)
//! - Non-retriable errors (schema mismatch, constraint violations, type errors)

use std::fmt;
use thiserror::Error;

/// Result type for rowsink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection-related errors (retriable)
    Connection,
    /// Timeout errors (retriable)
    Timeout,
    /// Schema mismatch detected before any writes (not retriable)
    Schema,
    /// Constraint violation (not retriable)
    Constraint,
    /// Type conversion errors (not retriable)
    TypeConversion,
    /// Configuration error
    Configuration,
    /// Batch commit failure after retries were exhausted
    Commit,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }
}

/// Main error type for rowsink
#[derive(Error, Debug)]
pub enum Error {
    /// Connection to the store failed
    #[error("connection error: {message}")]
    Connection {
        /// Human-readable failure description
        message: String,
        /// Underlying driver error, when available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out
    #[error("timeout: {message}")]
    Timeout {
        /// Human-readable failure description
        message: String,
    },

    /// Declared schema is incompatible with the target table.
    ///
    /// Raised before any writes occur; names the first offending field.
    #[error("schema mismatch: {message}")]
    Schema {
        /// Human-readable failure description
        message: String,
    },

    /// Constraint violation (PK, NOT NULL, check)
    #[error("constraint violation: {message}")]
    Constraint {
        /// Human-readable failure description
        message: String,
        /// Index of the offending record within its batch, when the store
        /// reports it
        record_index: Option<usize>,
    },

    /// Value could not be converted to the bound column type
    #[error("type conversion error: {message}")]
    TypeConversion {
        /// Human-readable failure description
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable failure description
        message: String,
    },

    /// A batch failed permanently after exhausting its retry budget
    #[error("batch {batch} failed after {attempts} attempts: {message}")]
    Commit {
        /// Sequence number of the failed batch
        batch: u64,
        /// Attempts made, including the initial one
        attempts: u32,
        /// Description of the last failure
        message: String,
    },

    /// Table not found in the target store
    #[error("table not found: {table}")]
    TableNotFound {
        /// Qualified table name
        table: String,
    },

    /// Configuration (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable failure description
        message: String,
    },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Schema { .. } | Self::TableNotFound { .. } => ErrorCategory::Schema,
            Self::Constraint { .. } => ErrorCategory::Constraint,
            Self::TypeConversion { .. } => ErrorCategory::TypeConversion,
            Self::Configuration { .. } | Self::Serialization(_) => ErrorCategory::Configuration,
            Self::Commit { .. } => ErrorCategory::Commit,
            Self::Internal { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
            record_index: None,
        }
    }

    /// Create a constraint violation attributed to a specific record
    pub fn constraint_at(message: impl Into<String>, record_index: usize) -> Self {
        Self::Constraint {
            message: message.into(),
            record_index: Some(record_index),
        }
    }

    /// Create a type conversion error
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Timeout => write!(f, "timeout"),
            Self::Schema => write!(f, "schema"),
            Self::Constraint => write!(f, "constraint"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Configuration => write!(f, "configuration"),
            Self::Commit => write!(f, "commit"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retriable() {
        assert!(ErrorCategory::Connection.is_retriable());
        assert!(ErrorCategory::Timeout.is_retriable());

        assert!(!ErrorCategory::Schema.is_retriable());
        assert!(!ErrorCategory::Constraint.is_retriable());
        assert!(!ErrorCategory::TypeConversion.is_retriable());
        assert!(!ErrorCategory::Commit.is_retriable());
    }

    #[test]
    fn test_error_is_retriable() {
        assert!(Error::connection("refused").is_retriable());
        assert!(Error::timeout("deadline exceeded").is_retriable());

        assert!(!Error::schema("arity mismatch").is_retriable());
        assert!(!Error::constraint("duplicate key").is_retriable());
        assert!(!Error::Commit {
            batch: 3,
            attempts: 4,
            message: "connection reset".into()
        }
        .is_retriable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::schema("field 'name': Text is not compatible with INTEGER");
        assert!(err.to_string().contains("field 'name'"));

        let err = Error::Commit {
            batch: 7,
            attempts: 4,
            message: "connection reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "batch 7 failed after 4 attempts: connection reset"
        );
    }

    #[test]
    fn test_constraint_attribution() {
        let err = Error::constraint_at("NOT NULL violated", 12);
        match err {
            Error::Constraint { record_index, .. } => assert_eq!(record_index, Some(12)),
            other => panic!("unexpected error: {other}"),
        }
    }
}
