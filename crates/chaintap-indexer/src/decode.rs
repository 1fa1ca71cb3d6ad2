//! Combines the Log Fetcher, ABI Registry, and block timestamp cache into
//! one "give me decoded events for this window" call.

use std::sync::Arc;

use chaintap_abi::{AbiRegistry, DecodeOutcome};
use chaintap_core::{ChaintapError, DecodedEvent};
use chaintap_evm::{BlockTimestampCache, LogFetcher};
use chaintap_rpc::transport::RpcEndpoint;
use tracing::warn;

#[allow(clippy::too_many_arguments)]
pub async fn fetch_and_decode(
    fetcher: &LogFetcher,
    endpoint: &Arc<dyn RpcEndpoint>,
    registry: &AbiRegistry,
    chain_id: u64,
    address: &str,
    manual_abi_path: Option<&str>,
    event_names: &[String],
    from: u64,
    to: u64,
) -> Result<Vec<DecodedEvent>, ChaintapError> {
    let decoder = registry.resolve(chain_id, address, manual_abi_path).await?;

    let mut topic0s = Vec::with_capacity(event_names.len());
    for name in event_names {
        topic0s.push(decoder.topic0_for(name)?);
    }

    let raw_logs = fetcher.fetch_logs(endpoint, address, &topic0s, from, to).await?;

    let mut timestamps = BlockTimestampCache::new();
    let mut events = Vec::with_capacity(raw_logs.len());
    for raw in raw_logs {
        let block_number = raw.block_number;
        let outcome = decoder.decode(&raw)?;
        let DecodeOutcome::Decoded(mut event) = outcome else {
            continue;
        };
        match timestamps.get_or_fetch(endpoint.as_ref(), block_number).await? {
            Some(ts) => {
                event.block_timestamp = ts;
                events.push(event);
            }
            None => warn!(block_number, "dropping event with unresolved timestamp"),
        }
    }

    Ok(events)
}
