//! Etherscan-family explorer client: the only remote ABI source this
//! registry consults. Six chains, one GET shape, bounded retry.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AbiError;

/// Exponential backoff envelope for the explorer GET: 5 retries, 1s
/// initial delay, factor 2, capped at 30s. A 30s per-request deadline
/// applies independent of the retry envelope.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.factor.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    result: String,
}

/// `{chain_id → base URL}` per §4.1. Unknown chain ids fail fast with an
/// `ABI` error before any HTTP call is attempted.
fn explorer_base_url(chain_id: u64) -> Result<&'static str, AbiError> {
    match chain_id {
        1 => Ok("https://api.etherscan.io/v2/api"),
        10 => Ok("https://api-optimistic.etherscan.io/api"),
        56 => Ok("https://api.bscscan.com/api"),
        137 => Ok("https://api.polygonscan.com/api"),
        8453 => Ok("https://api.basescan.org/api"),
        42161 => Ok("https://api.arbiscan.io/api"),
        other => Err(AbiError::UnsupportedChain(other)),
    }
}

pub struct ExplorerClient {
    http: reqwest::Client,
    retry: RetryConfig,
    api_key: Option<String>,
}

impl ExplorerClient {
    pub fn new(api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            retry: RetryConfig::default(),
            api_key,
        }
    }

    /// Fetch the raw ABI JSON array (as text) for `address` on `chain_id`.
    pub async fn fetch_abi(&self, chain_id: u64, address: &str) -> Result<String, AbiError> {
        let base = explorer_base_url(chain_id)?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.fetch_once(base, chain_id, address).await {
                Ok(abi) => return Ok(abi),
                Err(e) if e.is_retryable() && attempt <= self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis(), error = %e, "retrying explorer fetch");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(
        &self,
        base: &str,
        chain_id: u64,
        address: &str,
    ) -> Result<String, AbiError> {
        let mut query = vec![
            ("module", "contract".to_string()),
            ("action", "getabi".to_string()),
            ("address", address.to_string()),
            ("chainid", chain_id.to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.clone()));
        }

        let resp = self
            .http
            .get(base)
            .query(&query)
            .send()
            .await
            .map_err(|e| AbiError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            // Non-2xx aborts retry immediately per the retry envelope.
            return Err(AbiError::Explorer(format!(
                "explorer returned HTTP {}",
                resp.status()
            )));
        }

        let body: EtherscanResponse = resp
            .json()
            .await
            .map_err(|e| AbiError::Explorer(format!("invalid explorer response: {e}")))?;

        if body.status != "1" {
            let lowered = body.result.to_lowercase();
            if lowered.contains("not verified") || lowered.contains("source code not verified") {
                return Err(AbiError::NotVerified);
            }
            return Err(AbiError::Explorer(body.message));
        }

        debug!(chain_id, address, "ABI fetched from explorer");
        Ok(body.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_chain_ids_resolve() {
        assert_eq!(explorer_base_url(1).unwrap(), "https://api.etherscan.io/v2/api");
        assert_eq!(
            explorer_base_url(10).unwrap(),
            "https://api-optimistic.etherscan.io/api"
        );
        assert_eq!(explorer_base_url(56).unwrap(), "https://api.bscscan.com/api");
        assert_eq!(explorer_base_url(137).unwrap(), "https://api.polygonscan.com/api");
        assert_eq!(explorer_base_url(8453).unwrap(), "https://api.basescan.org/api");
        assert_eq!(explorer_base_url(42161).unwrap(), "https://api.arbiscan.io/api");
    }

    #[test]
    fn unknown_chain_id_errors() {
        let err = explorer_base_url(999).unwrap_err();
        assert!(matches!(err, AbiError::UnsupportedChain(999)));
    }

    #[test]
    fn retry_delay_caps_at_max() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.delay_for(1), Duration::from_secs(1));
        assert_eq!(cfg.delay_for(2), Duration::from_secs(2));
        assert_eq!(cfg.delay_for(3), Duration::from_secs(4));
        assert_eq!(cfg.delay_for(6), Duration::from_secs(30));
    }
}
