//! `AbiRegistry` — the public entry point for the ABI Registry component.
//! Combines the manual-path override, on-disk cache, and explorer fetch into
//! one `resolve` operation, and exposes `decode` via the resulting decoder.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::cache::AbiCache;
use crate::decoder::EventDecoder;
use crate::error::AbiError;
use crate::explorer::ExplorerClient;

/// Acquires and caches ABIs, and hands back a decoder bound to the parsed
/// result. One registry instance is shared across every contract poller.
pub struct AbiRegistry {
    cache: AbiCache,
    explorer: ExplorerClient,
    /// Memoized decoders keyed by `(chain_id, lowercase address)` so a
    /// contract's ABI is parsed at most once per process lifetime.
    decoders: Mutex<HashMap<(u64, String), Arc<EventDecoder>>>,
}

impl AbiRegistry {
    pub fn new(cache_root: impl Into<std::path::PathBuf>, etherscan_api_key: Option<String>) -> Self {
        Self {
            cache: AbiCache::new(cache_root),
            explorer: ExplorerClient::new(etherscan_api_key),
            decoders: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a decoder for `(chain_id, address)`.
    ///
    /// Resolution order: manual path (if supplied) → on-disk cache → explorer
    /// API. A successful explorer fetch is written through to the cache
    /// before the decoder is returned.
    pub async fn resolve(
        &self,
        chain_id: u64,
        address: &str,
        manual_path: Option<&str>,
    ) -> Result<Arc<EventDecoder>, AbiError> {
        let key = (chain_id, address.to_lowercase());

        {
            let decoders = self.decoders.lock().await;
            if let Some(decoder) = decoders.get(&key) {
                return Ok(decoder.clone());
            }
        }

        let abi_json = if let Some(path) = manual_path {
            let path = path.to_string();
            let cache = self.cache.clone();
            let address = address.to_string();
            let contents = tokio::task::spawn_blocking(move || -> Result<String, AbiError> {
                let contents =
                    std::fs::read_to_string(&path).map_err(|source| AbiError::ManualFileRead {
                        path: path.clone(),
                        source,
                    })?;
                serde_json::from_str::<serde_json::Value>(&contents)
                    .map_err(|e| AbiError::MalformedAbi(format!("manual ABI at {path:?}: {e}")))?;
                cache.put(chain_id, &address, &contents)?;
                Ok(contents)
            })
            .await
            .expect("blocking ABI file read task panicked")?;
            contents
        } else if let Some(cached) = self.read_cache(chain_id, address).await? {
            cached
        } else {
            let fetched = self.explorer.fetch_abi(chain_id, address).await?;
            self.write_cache(chain_id, address, fetched.clone()).await?;
            info!(chain_id, address, "ABI fetched and cached");
            fetched
        };

        let decoder = Arc::new(EventDecoder::parse(&abi_json)?);

        let mut decoders = self.decoders.lock().await;
        decoders.insert(key, decoder.clone());
        Ok(decoder)
    }

    /// Runs `AbiCache::get` on a blocking thread pool so a slow or
    /// contended filesystem never stalls the Tokio worker a poller runs on.
    async fn read_cache(&self, chain_id: u64, address: &str) -> Result<Option<String>, AbiError> {
        let cache = self.cache.clone();
        let address = address.to_string();
        tokio::task::spawn_blocking(move || cache.get(chain_id, &address))
            .await
            .expect("blocking ABI cache read task panicked")
    }

    /// Runs `AbiCache::put` on a blocking thread pool; see [`Self::read_cache`].
    async fn write_cache(&self, chain_id: u64, address: &str, abi_json: String) -> Result<(), AbiError> {
        let cache = self.cache.clone();
        let address = address.to_string();
        tokio::task::spawn_blocking(move || cache.put(chain_id, &address, &abi_json))
            .await
            .expect("blocking ABI cache write task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERC20_ABI: &str = r#"[
        {
            "type": "event",
            "name": "Transfer",
            "anonymous": false,
            "inputs": [
                {"name": "from", "type": "address", "indexed": true},
                {"name": "to", "type": "address", "indexed": true},
                {"name": "value", "type": "uint256", "indexed": false}
            ]
        }
    ]"#;

    #[tokio::test]
    async fn manual_path_resolves_and_seeds_cache() {
        let tmp_dir = std::env::temp_dir().join(format!("chaintap-registry-test-{}", std::process::id()));
        std::fs::create_dir_all(&tmp_dir).unwrap();
        let abi_path = tmp_dir.join("manual.json");
        std::fs::write(&abi_path, ERC20_ABI).unwrap();

        let cache_root = tmp_dir.join("cache");
        let registry = AbiRegistry::new(&cache_root, None);

        let decoder = registry
            .resolve(1, "0xAbCdEf0000000000000000000000000000000000", Some(abi_path.to_str().unwrap()))
            .await
            .unwrap();
        assert!(decoder.topic0_for("Transfer").is_ok());

        // Cache was seeded by the manual-path resolution.
        let cache = AbiCache::new(&cache_root);
        assert!(cache
            .get(1, "0xabcdef0000000000000000000000000000000000")
            .unwrap()
            .is_some());

        std::fs::remove_dir_all(&tmp_dir).ok();
    }

    #[tokio::test]
    async fn malformed_manual_abi_errors() {
        let tmp_dir = std::env::temp_dir().join(format!("chaintap-registry-bad-{}", std::process::id()));
        std::fs::create_dir_all(&tmp_dir).unwrap();
        let abi_path = tmp_dir.join("bad.json");
        std::fs::write(&abi_path, "not json").unwrap();

        let registry = AbiRegistry::new(tmp_dir.join("cache"), None);
        let result = registry
            .resolve(1, "0xabc0000000000000000000000000000000000000", Some(abi_path.to_str().unwrap()))
            .await;
        assert!(result.is_err());

        std::fs::remove_dir_all(&tmp_dir).ok();
    }

    #[tokio::test]
    async fn cache_hit_skips_explorer() {
        let tmp_dir = std::env::temp_dir().join(format!("chaintap-registry-hit-{}", std::process::id()));
        let cache_root = tmp_dir.join("cache");
        let cache = AbiCache::new(&cache_root);
        cache.put(1, "0xdeadbeef00000000000000000000000000000000", ERC20_ABI).unwrap();

        let registry = AbiRegistry::new(&cache_root, None);
        let decoder = registry
            .resolve(1, "0xdeadbeef00000000000000000000000000000000", None)
            .await
            .unwrap();
        assert!(decoder.topic0_for("Transfer").is_ok());

        std::fs::remove_dir_all(&tmp_dir).ok();
    }
}
