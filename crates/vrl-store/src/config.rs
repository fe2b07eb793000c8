use serde::{Deserialize, Serialize};
use vrl_index::IndexConfig;
use vrl_types::Identity;
use vrl_writer::{RetryConfig, WriterConfig};

use crate::error::{StoreError, StoreResult};

/// Store-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Default submitting identity: a `0x` address, or a label the address
    /// is derived from.
    pub identity: String,
    /// Ledger entries fetched per scan page.
    pub page_size: usize,
    pub retry: RetryConfig,
    /// Writes allowed to wait in each identity's queue.
    pub queue_depth: usize,
}

impl StoreConfig {
    pub fn resolve_identity(&self) -> StoreResult<Identity> {
        resolve_identity(&self.identity)
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            page_size: self.page_size,
        }
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            retry: self.retry.clone(),
            queue_depth: self.queue_depth,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let writer = WriterConfig::default();
        Self {
            identity: "vrl-writer".into(),
            page_size: IndexConfig::default().page_size,
            retry: writer.retry,
            queue_depth: writer.queue_depth,
        }
    }
}

/// Parse `0x…` addresses; derive anything else from the label.
pub fn resolve_identity(value: &str) -> StoreResult<Identity> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::Config("identity must not be empty".into()));
    }
    if value.starts_with("0x") {
        Identity::from_hex(value).map_err(|e| StoreError::Config(format!("identity: {e}")))
    } else {
        Ok(Identity::derive(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_writer_and_index() {
        let config = StoreConfig::default();
        assert_eq!(config.page_size, 256);
        assert_eq!(config.writer_config(), WriterConfig::default());
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn identity_forms() {
        let derived = resolve_identity("fleet").unwrap();
        assert_eq!(derived, Identity::derive("fleet"));
        assert_eq!(resolve_identity(&derived.to_hex()).unwrap(), derived);
        assert!(matches!(resolve_identity("0xnothex"), Err(StoreError::Config(_))));
        assert!(resolve_identity("  ").is_err());
    }
}
