//! Configuration for the chain
//!
//! Balances are written as decimal strings:
//!
//! ```toml
//! [batching]
//! batch_limit = 10
//!
//! [genesis]
//! timestamp_ms = 0
//!
//! [genesis.balances]
//! alice = "100"
//! bob = "200.50"
//! ```

use crate::crypto::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Default transactions per block
pub const DEFAULT_BATCH_LIMIT: usize = 10;

/// Chain configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Batching configuration
    pub batching: BatchingConfig,

    /// Genesis state
    pub genesis: GenesisConfig,

    /// Actor configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "chain-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            batching: BatchingConfig::default(),
            genesis: GenesisConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// Batching configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Pending transactions that trigger a seal
    pub batch_limit: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// Genesis configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Genesis block timestamp (ms)
    pub timestamp_ms: u64,

    /// Initial balances; `None` builds an unconfigured ledger
    pub balances: Option<BTreeMap<String, Decimal>>,
}

impl GenesisConfig {
    /// Initial balances keyed by address
    pub fn balance_map(&self) -> Option<HashMap<Address, Decimal>> {
        self.balances.as_ref().map(|balances| {
            balances
                .iter()
                .map(|(address, amount)| (Address::new(address.clone()), *amount))
                .collect()
        })
    }
}

/// Actor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox capacity (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    ///
    /// `CHAIN_CONFIG` names a TOML file to start from; `CHAIN_BATCH_LIMIT`
    /// and `CHAIN_GENESIS_TIMESTAMP_MS` override single fields.
    pub fn from_env() -> crate::Result<Self> {
        let mut config = match std::env::var("CHAIN_CONFIG") {
            Ok(path) => Config::from_file(path)?,
            Err(_) => Config::default(),
        };

        if let Ok(limit) = std::env::var("CHAIN_BATCH_LIMIT") {
            config.batching.batch_limit = limit
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid CHAIN_BATCH_LIMIT: {}", e)))?;
        }

        if let Ok(ts) = std::env::var("CHAIN_GENESIS_TIMESTAMP_MS") {
            config.genesis.timestamp_ms = ts.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid CHAIN_GENESIS_TIMESTAMP_MS: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check field constraints
    pub fn validate(&self) -> crate::Result<()> {
        if self.batching.batch_limit == 0 {
            return Err(crate::Error::Config("batch_limit must be at least 1".to_string()));
        }

        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox_capacity must be at least 1".to_string()));
        }

        if let Some(balances) = &self.genesis.balances {
            if let Some((address, amount)) = balances.iter().find(|(_, amount)| **amount < Decimal::ZERO) {
                return Err(crate::Error::Config(format!(
                    "Genesis balance for {} is negative: {}",
                    address, amount
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "chain-core");
        assert_eq!(config.batching.batch_limit, 10);
        assert!(config.genesis.balances.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml(
            r#"
            [batching]
            batch_limit = 3

            [genesis]
            timestamp_ms = 1000

            [genesis.balances]
            A = "100"
            B = "200.50"
            "#,
        )
        .unwrap();

        assert_eq!(config.batching.batch_limit, 3);
        assert_eq!(config.genesis.timestamp_ms, 1000);
        assert_eq!(config.actor.mailbox_capacity, 1000);

        let balances = config.genesis.balance_map().unwrap();
        assert_eq!(balances[&Address::new("A")], Decimal::from(100));
        assert_eq!(balances[&Address::new("B")], Decimal::new(20050, 2));
    }

    #[test]
    fn test_zero_batch_limit_rejected() {
        let err = Config::from_toml("[batching]\nbatch_limit = 0\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_negative_genesis_balance_rejected() {
        let err = Config::from_toml("[genesis.balances]\nA = \"-1\"\n").unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(Config::from_toml("batching = [").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.toml");
        std::fs::write(&path, "service_name = \"node-a\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.service_name, "node-a");
        assert_eq!(config.batching.batch_limit, DEFAULT_BATCH_LIMIT);
    }
}
