//! The typed configuration tree documented in the spec's external-interfaces
//! section. YAML parsing and `${NAME}` environment expansion are the CLI's
//! job (outside this crate); this module owns the shape and the structural
//! validation every loader must run before constructing core components.

use serde::{Deserialize, Serialize};

use crate::error::ChaintapError;

/// Chains the indexer recognizes, mapped to an explorer endpoint and an EVM
/// chain id in `chaintap-abi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    Bsc,
}

impl Chain {
    /// The numeric EVM chain id used by the ABI registry's explorer table.
    pub fn chain_id(self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Optimism => 10,
            Chain::Bsc => 56,
            Chain::Polygon => 137,
            Chain::Base => 8453,
            Chain::Arbitrum => 42161,
        }
    }
}

fn default_batch_size() -> u64 {
    2000
}

fn default_confirmations() -> u64 {
    12
}

fn default_poll_interval_ms() -> u64 {
    15_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_priority() -> i64 {
    1
}

fn default_status() -> String {
    "active".into()
}

/// Tunables under the `options` config key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            confirmations: default_confirmations(),
            poll_interval_ms: default_poll_interval_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// One entry under `contracts[]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    pub events: Vec<String>,
    #[serde(default)]
    pub from_block: Option<u64>,
    /// Manual ABI file path. Bypasses the explorer/cache lookup.
    #[serde(default)]
    pub abi: Option<String>,
}

impl ContractConfig {
    /// Display label: the configured `name`, or the address if unset.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// One entry under `providers[]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

/// The `database` config block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// The full, validated configuration tree consumed by the CLI to construct
/// every core component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub chain: Chain,
    pub database: DatabaseConfig,
    pub contracts: Vec<ContractConfig>,
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub options: Options,
}

const MIN_CONTRACTS: usize = 1;
const MAX_CONTRACTS: usize = 100;

fn is_valid_address(addr: &str) -> bool {
    let Some(hex) = addr.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

impl Config {
    /// Structural validation beyond what serde's `Deserialize` already
    /// enforces: address format, contract/provider count bounds. Returns the
    /// first violation found as a `Config` error.
    pub fn validate(&self) -> Result<(), ChaintapError> {
        if self.contracts.len() < MIN_CONTRACTS || self.contracts.len() > MAX_CONTRACTS {
            return Err(ChaintapError::config(format!(
                "contracts: expected between {MIN_CONTRACTS} and {MAX_CONTRACTS} entries, got {}",
                self.contracts.len()
            )));
        }
        if self.providers.is_empty() {
            return Err(ChaintapError::config("providers: at least one entry is required"));
        }
        for c in &self.contracts {
            if !is_valid_address(&c.address) {
                return Err(ChaintapError::config(format!(
                    "contracts: invalid address {:?} (expected ^0x[0-9a-fA-F]{{40}}$)",
                    c.address
                )));
            }
            if c.events.is_empty() {
                return Err(ChaintapError::config(format!(
                    "contracts: {} must declare at least one event",
                    c.label()
                )));
            }
        }
        Ok(())
    }

    /// Lowercases every contract address, per the spec's normalization rule.
    /// Called once after validation succeeds.
    pub fn normalize(&mut self) {
        for c in &mut self.contracts {
            c.address = c.address.to_lowercase();
        }
    }
}

/// Mirrors `sync_state.status`'s default, re-exported here so storage and
/// status-reporting code share one constant.
pub fn default_sync_status() -> String {
    default_status()
}
