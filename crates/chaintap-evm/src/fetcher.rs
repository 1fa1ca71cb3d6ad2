//! Log Fetcher: chunked `eth_getLogs` retrieval with adaptive range sizing.

use std::sync::Arc;

use chaintap_abi::RawLog;
use chaintap_rpc::transport::RpcEndpoint;
use chaintap_rpc::pool::ProviderPool;
use chaintap_rpc::RpcError;
use tracing::debug;

use crate::error::FetchError;
use crate::rpc_calls::eth_get_logs;

/// Absolute floor a provider's chunk size is never shrunk below.
pub const RANGE_FLOOR: u64 = 100;
/// Consecutive range-error failures at the floor before giving up on a call.
const MAX_FLOOR_STALLS: u32 = 3;

pub struct LogFetcher {
    pool: Arc<ProviderPool>,
    default_chunk_size: u64,
}

impl LogFetcher {
    pub fn new(pool: Arc<ProviderPool>, default_chunk_size: u64) -> Self {
        Self {
            pool,
            default_chunk_size,
        }
    }

    /// Fetch all logs in `[from, to]` on `address` matching any of
    /// `topic0s`, against `endpoint`. Shrinks the provider's learned chunk
    /// size on range errors and persists the new size back to the pool;
    /// never advances past a window that still errors.
    pub async fn fetch_logs(
        &self,
        endpoint: &Arc<dyn RpcEndpoint>,
        address: &str,
        topic0s: &[String],
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, FetchError> {
        if to < from {
            return Ok(Vec::new());
        }

        let url = endpoint.url().to_string();
        let mut chunk_size = self
            .pool
            .range_limit(&url)
            .await
            .unwrap_or(self.default_chunk_size);

        let mut logs = Vec::new();
        let mut start = from;
        let mut floor_stalls: u32 = 0;

        while start <= to {
            let end = (start + chunk_size - 1).min(to);

            match eth_get_logs(endpoint.as_ref(), address, topic0s, start, end).await {
                Ok(chunk) => {
                    logs.extend(chunk);
                    start = end + 1;
                    floor_stalls = 0;
                }
                Err(FetchError::Rpc(RpcError::JsonRpc { message, .. })) if is_range_error(&message) => {
                    if chunk_size > RANGE_FLOOR {
                        let old_size = chunk_size;
                        chunk_size = (chunk_size / 2).max(RANGE_FLOOR);
                        self.pool.set_range_limit(&url, chunk_size).await;
                        debug!(provider = %url, old_size, new_size = chunk_size, "shrinking getLogs chunk size");
                    } else {
                        floor_stalls += 1;
                        if floor_stalls >= MAX_FLOOR_STALLS {
                            return Err(FetchError::RangeFloorExceeded(floor_stalls));
                        }
                    }
                    // Retry the same window; cursor does not advance.
                }
                Err(e) => return Err(e),
            }
        }

        Ok(logs)
    }
}

fn is_range_error(message: &str) -> bool {
    chaintap_rpc::error::message_is_range_error(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chaintap_rpc::pool::ProviderPoolConfig;
    use chaintap_rpc::transport::{JsonRpcRequest, JsonRpcResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedEndpoint {
        url: String,
        calls: AtomicU32,
        /// Windows (as `(from, to)`) that should fail with a range error.
        fails_on: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl RpcEndpoint for ScriptedEndpoint {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let params = &req.params[0];
            let from = u64::from_str_radix(
                params["fromBlock"].as_str().unwrap().trim_start_matches("0x"),
                16,
            )
            .unwrap();
            let to = u64::from_str_radix(
                params["toBlock"].as_str().unwrap().trim_start_matches("0x"),
                16,
            )
            .unwrap();

            let should_fail = self.fails_on.lock().unwrap().contains(&(from, to));
            if should_fail {
                return Err(RpcError::JsonRpc {
                    code: -32005,
                    message: "query returned more than 10000 results. block range too large"
                        .into(),
                });
            }
            Ok(JsonRpcResponse {
                result: Some(json!([])),
                error: None,
            })
        }

        fn url(&self) -> &str {
            &self.url
        }
    }

    /// Scenario: initial chunk 2000 over `[17_000_000, 17_002_000]`, the
    /// first full-window call fails with a range error, and the fetcher
    /// emits exactly four `getLogs` calls afterward at chunk size 1000.
    #[tokio::test]
    async fn dynamic_range_shrink_matches_scenario() {
        let concrete = Arc::new(ScriptedEndpoint {
            url: "p1".into(),
            calls: AtomicU32::new(0),
            fails_on: Mutex::new(vec![(17_000_000, 17_001_999)]),
        });
        let endpoint: Arc<dyn RpcEndpoint> = concrete.clone();

        let pool = Arc::new(
            ProviderPool::new(
                vec![(Arc::clone(&endpoint), 1)],
                ProviderPoolConfig::default(),
            )
            .unwrap(),
        );
        let fetcher = LogFetcher::new(Arc::clone(&pool), 2000);

        let result = fetcher
            .fetch_logs(&endpoint, "0xabc", &["0xtopic".into()], 17_000_000, 17_002_000)
            .await
            .unwrap();
        assert!(result.is_empty());

        assert_eq!(pool.range_limit("p1").await, Some(1000));
        assert_eq!(concrete.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn floor_stall_escalates_after_three_failures() {
        let endpoint: Arc<dyn RpcEndpoint> = Arc::new(ScriptedEndpoint {
            url: "p1".into(),
            calls: AtomicU32::new(0),
            fails_on: Mutex::new(vec![(1, 100)]),
        });
        let pool = Arc::new(
            ProviderPool::new(
                vec![(Arc::clone(&endpoint), 1)],
                ProviderPoolConfig::default(),
            )
            .unwrap(),
        );
        // Pre-seed the chunk size at the floor so the first range error
        // increments the stall counter instead of shrinking further.
        pool.set_range_limit("p1", 100).await;
        let fetcher = LogFetcher::new(Arc::clone(&pool), 2000);

        let result = fetcher
            .fetch_logs(&endpoint, "0xabc", &["0xtopic".into()], 1, 100)
            .await;
        assert!(matches!(result, Err(FetchError::RangeFloorExceeded(3))));
    }

    #[tokio::test]
    async fn empty_window_returns_immediately() {
        let endpoint: Arc<dyn RpcEndpoint> = Arc::new(ScriptedEndpoint {
            url: "p1".into(),
            calls: AtomicU32::new(0),
            fails_on: Mutex::new(vec![]),
        });
        let pool = Arc::new(
            ProviderPool::new(
                vec![(Arc::clone(&endpoint), 1)],
                ProviderPoolConfig::default(),
            )
            .unwrap(),
        );
        let fetcher = LogFetcher::new(pool, 2000);
        let result = fetcher
            .fetch_logs(&endpoint, "0xabc", &[], 100, 50)
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
