//! Sink configuration
//!
//! Deserialized from JSON, validated with `validator`, schema-documented
//! with `schemars` so orchestrators can introspect the config surface. The
//! endpoint may carry credentials, so `Debug` masks the URL password.

use std::fmt;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Sink configuration
#[derive(Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct SinkConfig {
    /// Store endpoint URL (e.g., phoenix://zk-host:2181/hbase)
    #[validate(length(min = 1))]
    pub endpoint: String,

    /// Target table name
    #[validate(length(min = 1))]
    pub table: String,

    /// Optional schema/namespace qualifying the table
    #[serde(default)]
    pub namespace: Option<String>,

    /// Declared record schema, e.g. "id: int, name: varchar"
    #[validate(length(min = 1))]
    pub schema: String,

    /// Records per batch
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 1000000))]
    pub batch_size: usize,

    /// Soft byte budget per batch
    #[serde(default = "default_max_batch_bytes")]
    #[validate(range(min = 1024))]
    pub max_batch_bytes: usize,

    /// Retries per batch after the initial attempt
    #[serde(default = "default_retry_limit")]
    #[validate(range(max = 100))]
    pub retry_limit: u32,

    /// Initial delay between retries, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    #[validate(range(min = 1, max = 300000))]
    pub retry_backoff_ms: u64,
}

fn default_batch_size() -> usize {
    1000
}

fn default_max_batch_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_retry_limit() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl SinkConfig {
    /// Create a config for a table with defaults for everything else
    pub fn new(
        endpoint: impl Into<String>,
        table: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            table: table.into(),
            namespace: None,
            schema: schema.into(),
            batch_size: default_batch_size(),
            max_batch_bytes: default_max_batch_bytes(),
            retry_limit: default_retry_limit(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }

    /// Parse and validate a config from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Validate the config, mapping validation failures to a config error
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("invalid sink configuration: {e}")))
    }

    /// Retry policy derived from the config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_limit,
            initial_delay: Duration::from_millis(self.retry_backoff_ms),
            ..Default::default()
        }
    }

    /// Endpoint with any URL password masked, safe for logs
    pub fn redacted_endpoint(&self) -> String {
        match url::Url::parse(&self.endpoint) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                parsed.to_string()
            }
            Err(_) => "***".to_string(),
        }
    }
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("endpoint", &self.redacted_endpoint())
            .field("table", &self.table)
            .field("namespace", &self.namespace)
            .field("schema", &self.schema)
            .field("batch_size", &self.batch_size)
            .field("max_batch_bytes", &self.max_batch_bytes)
            .field("retry_limit", &self.retry_limit)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SinkConfig::new("phoenix://zk:2181/hbase", "table1", "id: int, name: varchar");
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.retry_backoff_ms, 100);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = SinkConfig::from_json(
            r#"{
                "endpoint": "phoenix://zk:2181/hbase",
                "table": "table1",
                "schema": "id: int, name: varchar"
            }"#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_batch_bytes, 16 * 1024 * 1024);
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let result = SinkConfig::from_json(
            r#"{
                "endpoint": "phoenix://zk:2181/hbase",
                "table": "table1",
                "schema": "id: int",
                "batch_size": 0
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty_endpoint() {
        let mut config = SinkConfig::new("", "table1", "id: int");
        assert!(config.check().is_err());
        config.endpoint = "phoenix://zk:2181/hbase".into();
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_retry_policy_mapping() {
        let mut config = SinkConfig::new("phoenix://zk:2181/hbase", "table1", "id: int");
        config.retry_limit = 5;
        config.retry_backoff_ms = 250;

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_debug_redacts_endpoint_password() {
        let config = SinkConfig::new(
            "phoenix://writer:hunter2@zk:2181/hbase",
            "table1",
            "id: int",
        );
        let out = format!("{config:?}");
        assert!(!out.contains("hunter2"));
        assert!(out.contains("***"));
        assert_eq!(
            config.redacted_endpoint(),
            "phoenix://writer:***@zk:2181/hbase"
        );
    }
}
