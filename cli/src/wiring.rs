//! Constructs the shared, long-lived components (provider pool, ABI
//! registry, storage handle, log fetcher) once per process from a
//! validated `Config`.

use std::sync::Arc;
use std::time::Duration;

use chaintap_abi::cache::AbiCache;
use chaintap_abi::AbiRegistry;
use chaintap_core::config::Config;
use chaintap_core::ChaintapError;
use chaintap_evm::LogFetcher;
use chaintap_rpc::pool::{ProviderPool, ProviderPoolConfig};
use chaintap_rpc::transport::{HttpTransport, RpcEndpoint};
use chaintap_storage::SqliteStorage;

const ABI_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Components {
    pub pool: Arc<ProviderPool>,
    pub registry: Arc<AbiRegistry>,
    pub storage: Arc<SqliteStorage>,
    pub fetcher: Arc<LogFetcher>,
}

pub async fn build(config: &Config) -> Result<Components, ChaintapError> {
    let endpoints: Vec<(Arc<dyn RpcEndpoint>, u32)> = config
        .providers
        .iter()
        .map(|p| {
            let transport: Arc<dyn RpcEndpoint> =
                Arc::new(HttpTransport::new(p.url.clone(), ABI_FETCH_TIMEOUT));
            (transport, p.priority.max(1) as u32)
        })
        .collect();

    let pool = Arc::new(
        ProviderPool::new(endpoints, ProviderPoolConfig::default())
            .map_err(|e| ChaintapError::rpc(e.to_string()))?,
    );

    let etherscan_api_key = std::env::var("ETHERSCAN_API_KEY").ok();
    let registry = Arc::new(AbiRegistry::new(AbiCache::default_root(), etherscan_api_key));

    let storage = Arc::new(SqliteStorage::open(&config.database.path).await?);

    let fetcher = Arc::new(LogFetcher::new(Arc::clone(&pool), config.options.batch_size));

    Ok(Components {
        pool,
        registry,
        storage,
        fetcher,
    })
}
