//! One long-lived polling task per contract: checkout a provider, observe
//! head, fetch and decode a confirmations-adjusted window, commit, sleep.

use std::sync::Arc;
use std::time::Duration;

use chaintap_abi::AbiRegistry;
use chaintap_core::config::{ContractConfig, Options};
use chaintap_core::ChaintapError;
use chaintap_evm::rpc_calls::eth_block_number;
use chaintap_evm::LogFetcher;
use chaintap_rpc::pool::ProviderPool;
use chaintap_rpc::transport::RpcEndpoint;
use chaintap_storage::SqliteStorage;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::decode::fetch_and_decode;

pub struct Coordinator {
    chain_id: u64,
    contract: ContractConfig,
    options: Options,
    pool: Arc<ProviderPool>,
    registry: Arc<AbiRegistry>,
    storage: Arc<SqliteStorage>,
    fetcher: Arc<LogFetcher>,
    stop: watch::Receiver<bool>,
}

impl Coordinator {
    pub fn new(
        chain_id: u64,
        contract: ContractConfig,
        options: Options,
        pool: Arc<ProviderPool>,
        registry: Arc<AbiRegistry>,
        storage: Arc<SqliteStorage>,
        fetcher: Arc<LogFetcher>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            chain_id,
            contract,
            options,
            pool,
            registry,
            storage,
            fetcher,
            stop,
        }
    }

    /// Resolve the block to start indexing from, per §4.5's selection rule.
    async fn determine_start_block(&self) -> Result<u64, ChaintapError> {
        match self.contract.from_block {
            None => {
                let (idx, endpoint) = self.pool.checkout().await?;
                match eth_block_number(endpoint.as_ref()).await {
                    Ok(head) => {
                        self.pool.report_success(idx).await;
                        Ok(head)
                    }
                    Err(e) => {
                        self.pool.report_failure(idx).await;
                        Err(e.into())
                    }
                }
            }
            Some(from_block) => {
                let last = self.storage.get_last_synced_block(&self.contract.address).await?;
                Ok(match last {
                    Some(last_block) if last_block >= from_block => last_block + 1,
                    _ => from_block,
                })
            }
        }
    }

    /// Runs the poll loop until the shared stop flag flips. Never returns
    /// an error for per-iteration failures; only construction-level
    /// problems (surfaced before this is called) are fatal.
    pub async fn run(&mut self) -> Result<(), ChaintapError> {
        let mut current = self.determine_start_block().await?;
        let label = self.contract.label().to_string();
        info!(contract = %label, start_block = current, "coordinator starting");

        loop {
            if *self.stop.borrow() {
                break;
            }

            if let Err(e) = self.tick(&mut current).await {
                warn!(contract = %label, error = %e, "poll iteration failed, retrying next tick");
            }

            if self.sleep_or_stop().await {
                break;
            }
        }

        info!(contract = %label, "coordinator stopped");
        Ok(())
    }

    async fn tick(&self, current: &mut u64) -> Result<(), ChaintapError> {
        let (idx, endpoint) = self.pool.checkout().await?;

        let head = match eth_block_number(endpoint.as_ref()).await {
            Ok(head) => {
                self.pool.report_success(idx).await;
                head
            }
            Err(e) => {
                self.pool.report_failure(idx).await;
                return Err(e.into());
            }
        };

        let target = head.saturating_sub(self.options.confirmations);
        if target < *current {
            return Ok(());
        }

        let events = match fetch_and_decode(
            &self.fetcher,
            &endpoint,
            &self.registry,
            self.chain_id,
            &self.contract.address,
            self.contract.abi.as_deref(),
            &self.contract.events,
            *current,
            target,
        )
        .await
        {
            Ok(events) => {
                self.pool.report_success(idx).await;
                events
            }
            Err(e) => {
                self.pool.report_failure(idx).await;
                return Err(e);
            }
        };

        let inserted = self
            .storage
            .commit(&self.contract.address, self.chain_id, target, &events)
            .await?;

        info!(
            contract = %self.contract.label(),
            from = *current,
            to = target,
            inserted,
            "committed"
        );
        *current = target + 1;
        Ok(())
    }

    /// Sleeps for `poll_interval_ms`, waking early if the stop flag flips.
    /// Returns `true` if the loop should exit.
    async fn sleep_or_stop(&mut self) -> bool {
        let sleep = tokio::time::sleep(Duration::from_millis(self.options.poll_interval_ms));
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => *self.stop.borrow(),
            _ = self.stop.changed() => *self.stop.borrow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chaintap_rpc::pool::ProviderPoolConfig;
    use chaintap_rpc::transport::{JsonRpcRequest, JsonRpcResponse};
    use chaintap_rpc::RpcError;
    use serde_json::json;

    struct FakeEndpoint {
        head: u64,
    }

    #[async_trait]
    impl RpcEndpoint for FakeEndpoint {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
            let result = match req.method.as_str() {
                "eth_blockNumber" => json!(format!("0x{:x}", self.head)),
                "eth_getLogs" => json!([]),
                "eth_getBlockByNumber" => json!({"timestamp": "0x5f5e100"}),
                other => panic!("unexpected method {other}"),
            };
            Ok(JsonRpcResponse {
                result: Some(result),
                error: None,
            })
        }
        fn url(&self) -> &str {
            "fake"
        }
    }

    fn sample_contract(from_block: Option<u64>) -> ContractConfig {
        ContractConfig {
            address: "0xabcdef0000000000000000000000000000000000".into(),
            name: Some("token".into()),
            events: vec!["Transfer".into()],
            from_block,
            abi: None,
        }
    }

    async fn build(from_block: Option<u64>) -> (Coordinator, Arc<SqliteStorage>) {
        let endpoint: Arc<dyn RpcEndpoint> = Arc::new(FakeEndpoint { head: 1_000 });
        let pool = Arc::new(
            ProviderPool::new(vec![(endpoint, 1)], ProviderPoolConfig::default()).unwrap(),
        );
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let registry = Arc::new(AbiRegistry::new(
            std::env::temp_dir().join(format!("chaintap-coordinator-test-{}", std::process::id())),
            None,
        ));
        let fetcher = Arc::new(LogFetcher::new(Arc::clone(&pool), 2000));
        let (_tx, rx) = watch::channel(false);

        let coordinator = Coordinator::new(
            1,
            sample_contract(from_block),
            Options::default(),
            pool,
            registry,
            Arc::clone(&storage),
            fetcher,
            rx,
        );
        (coordinator, storage)
    }

    #[tokio::test]
    async fn start_block_defaults_to_head_when_unset() {
        let (coordinator, _storage) = build(None).await;
        let start = coordinator.determine_start_block().await.unwrap();
        assert_eq!(start, 1_000);
    }

    #[tokio::test]
    async fn start_block_resumes_past_last_synced() {
        let (coordinator, storage) = build(Some(500)).await;
        storage.commit("0xabcdef0000000000000000000000000000000000", 1, 900, &[]).await.unwrap();
        let start = coordinator.determine_start_block().await.unwrap();
        assert_eq!(start, 901);
    }

    #[tokio::test]
    async fn start_block_uses_from_block_when_no_prior_sync() {
        let (coordinator, _storage) = build(Some(500)).await;
        let start = coordinator.determine_start_block().await.unwrap();
        assert_eq!(start, 500);
    }
}
