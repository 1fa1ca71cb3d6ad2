//! In-memory block-number → timestamp cache, scoped to a single fetch call.

use std::collections::HashMap;
use std::time::Duration;

use chaintap_rpc::transport::RpcEndpoint;
use tracing::warn;

use crate::error::FetchError;
use crate::rpc_calls::eth_get_block_timestamp;

const RETRY_ATTEMPTS: u32 = 3;
const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Default)]
pub struct BlockTimestampCache {
    entries: HashMap<u64, i64>,
}

impl BlockTimestampCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached timestamp for `block`, fetching and populating it
    /// on a miss. Bounded retry: 3 attempts, 1s initial delay doubling up to
    /// a 10s cap. Returns `None` if the node never resolves the block.
    pub async fn get_or_fetch(
        &mut self,
        endpoint: &dyn RpcEndpoint,
        block: u64,
    ) -> Result<Option<i64>, FetchError> {
        if let Some(ts) = self.entries.get(&block) {
            return Ok(Some(*ts));
        }

        let mut delay = INITIAL_DELAY;
        let mut last_err = None;
        for attempt in 0..RETRY_ATTEMPTS {
            match eth_get_block_timestamp(endpoint, block).await {
                Ok(Some(ts)) => {
                    self.entries.insert(block, ts);
                    return Ok(Some(ts));
                }
                Ok(None) => {
                    last_err = None;
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
            if attempt + 1 < RETRY_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }

        if let Some(e) = last_err {
            return Err(e);
        }
        warn!(block, "timestamp unresolved after bounded retry");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chaintap_rpc::transport::{JsonRpcRequest, JsonRpcResponse};
    use chaintap_rpc::RpcError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingEndpoint {
        calls: AtomicU32,
    }

    #[async_trait]
    impl RpcEndpoint for CountingEndpoint {
        async fn send(&self, _req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(JsonRpcResponse {
                result: Some(json!({"timestamp": "0x5f5e100"})),
                error: None,
            })
        }
        fn url(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn caches_after_first_fetch() {
        let endpoint = CountingEndpoint {
            calls: AtomicU32::new(0),
        };
        let mut cache = BlockTimestampCache::new();

        let ts1 = cache.get_or_fetch(&endpoint, 100).await.unwrap();
        let ts2 = cache.get_or_fetch(&endpoint, 100).await.unwrap();

        assert_eq!(ts1, ts2);
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
    }
}
