use crate::dialect::MAX_STATEMENT_LENGTH;
use crate::memory_store::MAX_TRANSACT_ITEMS;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// What an autocommit UPDATE/DELETE reports when the key does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Report `rows_affected = 0`
    #[default]
    ZeroRows,
    /// Surface the store's `CONDITIONAL_CHECK_FAILED` error
    Fail,
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Longest accepted statement text, in characters
    pub max_statement_length: usize,

    /// Most writes a transaction may queue (the store caps a batch at 100)
    pub max_transaction_items: usize,

    /// Items requested per page when a row set reads a query or scan
    pub scan_page_size: usize,

    pub missing_key_policy: MissingKeyPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_statement_length: MAX_STATEMENT_LENGTH,
            max_transaction_items: MAX_TRANSACT_ITEMS,
            scan_page_size: 100,
            missing_key_policy: MissingKeyPolicy::ZeroRows,
        }
    }
}

impl DriverConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; absent fields take their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        let config: DriverConfig = serde_json::from_str(text)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_statement_length(mut self, len: usize) -> Self {
        self.max_statement_length = len;
        self
    }

    pub fn with_max_transaction_items(mut self, items: usize) -> Self {
        self.max_transaction_items = items;
        self
    }

    pub fn with_scan_page_size(mut self, size: usize) -> Self {
        self.scan_page_size = size;
        self
    }

    pub fn with_missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key_policy = policy;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.max_statement_length == 0 {
            return Err(Error::InvalidConfig(
                "max_statement_length must be greater than 0".to_string(),
            ));
        }

        if self.max_transaction_items == 0 || self.max_transaction_items > MAX_TRANSACT_ITEMS {
            return Err(Error::InvalidConfig(format!(
                "max_transaction_items must be between 1 and {}",
                MAX_TRANSACT_ITEMS
            )));
        }

        if self.scan_page_size == 0 {
            return Err(Error::InvalidConfig(
                "scan_page_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
