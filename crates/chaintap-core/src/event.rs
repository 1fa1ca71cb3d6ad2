//! The canonical decoded-event shape persisted by the storage engine and
//! returned by the ABI registry's decode operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded smart-contract event log.
///
/// `(transaction_hash, log_index)` is globally unique — this is enforced at
/// the storage layer, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Lowercase hex contract address, e.g. `"0xabc...def"`.
    pub contract_address: String,
    pub block_number: u64,
    /// Unix seconds. `0` is the sentinel used before the fetcher fills it in.
    pub block_timestamp: i64,
    /// Hex transaction hash.
    pub transaction_hash: String,
    pub log_index: u32,
    /// Event name as declared in the ABI, e.g. `"Transfer"`.
    pub event_name: String,
    /// Ordered mapping from parameter name to a JSON-representable value.
    /// `serde_json`'s `preserve_order` feature keeps object keys in the
    /// order they were inserted, so this mirrors ABI parameter order.
    pub event_data: Value,
}

impl DecodedEvent {
    /// `true` once the fetcher has filled in a real timestamp.
    pub fn has_timestamp(&self) -> bool {
        self.block_timestamp != 0
    }
}
