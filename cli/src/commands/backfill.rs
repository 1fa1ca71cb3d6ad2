//! `chaintap backfill --from-block <N> --to-block <N|latest>` — indexes a
//! fixed range once per contract, in sequence, then exits.

use chaintap_core::config::Config;
use chaintap_core::ChaintapError;
use chaintap_evm::rpc_calls::eth_block_number;
use chaintap_indexer::run_backfill;

use crate::wiring::Components;

pub async fn run(
    config: Config,
    components: Components,
    from_block: u64,
    to_block: ToBlock,
) -> Result<(), ChaintapError> {
    let chain_id = config.chain.chain_id();

    let to = match to_block {
        ToBlock::Latest => {
            let (idx, endpoint) = components.pool.checkout().await?;
            match eth_block_number(endpoint.as_ref()).await {
                Ok(head) => {
                    components.pool.report_success(idx).await;
                    head
                }
                Err(e) => {
                    components.pool.report_failure(idx).await;
                    return Err(e.into());
                }
            }
        }
        ToBlock::Number(n) => n,
    };

    run_backfill(
        &config.contracts,
        chain_id,
        &config.options,
        components.pool,
        components.registry,
        components.storage,
        components.fetcher,
        from_block,
        to,
    )
    .await
}

/// The `--to-block` argument: either a literal block number or `latest`.
#[derive(Debug, Clone, Copy)]
pub enum ToBlock {
    Number(u64),
    Latest,
}

impl std::str::FromStr for ToBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            Ok(ToBlock::Latest)
        } else {
            s.parse::<u64>()
                .map(ToBlock::Number)
                .map_err(|_| format!("invalid --to-block value {s:?}: expected a block number or \"latest\""))
        }
    }
}
