//! Backfill: index a fixed `[from, to]` range once per contract, in
//! sequence, reporting progress every 5 seconds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chaintap_abi::AbiRegistry;
use chaintap_core::config::{ContractConfig, Options};
use chaintap_core::ChaintapError;
use chaintap_evm::LogFetcher;
use chaintap_rpc::pool::ProviderPool;
use chaintap_storage::SqliteStorage;
use tracing::info;

use crate::decode::fetch_and_decode;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

#[allow(clippy::too_many_arguments)]
pub async fn run_backfill(
    contracts: &[ContractConfig],
    chain_id: u64,
    options: &Options,
    pool: Arc<ProviderPool>,
    registry: Arc<AbiRegistry>,
    storage: Arc<SqliteStorage>,
    fetcher: Arc<LogFetcher>,
    from: u64,
    to: u64,
) -> Result<(), ChaintapError> {
    for contract in contracts {
        backfill_one(contract, chain_id, options, &pool, &registry, &storage, &fetcher, from, to)
            .await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn backfill_one(
    contract: &ContractConfig,
    chain_id: u64,
    options: &Options,
    pool: &Arc<ProviderPool>,
    registry: &Arc<AbiRegistry>,
    storage: &Arc<SqliteStorage>,
    fetcher: &Arc<LogFetcher>,
    from: u64,
    to: u64,
) -> Result<(), ChaintapError> {
    let label = contract.label().to_string();
    info!(contract = %label, from, to, "backfill starting");

    let mut current = from;
    let mut total_inserted = 0u64;
    let mut last_report = Instant::now();

    while current <= to {
        let end = (current + options.batch_size - 1).min(to);
        let (idx, endpoint) = pool.checkout().await?;

        let events = match fetch_and_decode(
            fetcher,
            &endpoint,
            registry,
            chain_id,
            &contract.address,
            contract.abi.as_deref(),
            &contract.events,
            current,
            end,
        )
        .await
        {
            Ok(events) => {
                pool.report_success(idx).await;
                events
            }
            Err(e) => {
                pool.report_failure(idx).await;
                return Err(e);
            }
        };

        let inserted = storage.commit(&contract.address, chain_id, end, &events).await?;
        total_inserted += inserted;
        current = end + 1;

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            info!(
                contract = %label,
                current,
                to,
                total_inserted,
                "backfill progress"
            );
            last_report = Instant::now();
        }
    }

    info!(contract = %label, total_inserted, "backfill complete");
    Ok(())
}
