//! Builds and parses the three JSON-RPC methods the fetcher needs:
//! `eth_blockNumber`, `eth_getBlockByNumber`, `eth_getLogs`.

use chaintap_abi::RawLog;
use chaintap_rpc::transport::{JsonRpcRequest, RpcEndpoint};
use chaintap_rpc::RpcError;
use serde_json::{json, Value};

use crate::error::FetchError;

pub fn hex_to_u64(s: &str) -> Result<u64, FetchError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(stripped, 16).map_err(|_| FetchError::InvalidHex(s.to_string()))
}

pub fn u64_to_hex(n: u64) -> String {
    format!("0x{n:x}")
}

pub async fn eth_block_number(endpoint: &dyn RpcEndpoint) -> Result<u64, FetchError> {
    let req = JsonRpcRequest::new(1, "eth_blockNumber", vec![]);
    let resp = endpoint.send(req).await?;
    let value = resp.into_result()?;
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::Deserialize("eth_blockNumber result not a string".into()))?;
    hex_to_u64(s)
}

/// Returns `(block_number, unix_timestamp)` for `block`, or `None` if the
/// node doesn't know about it yet.
pub async fn eth_get_block_timestamp(
    endpoint: &dyn RpcEndpoint,
    block: u64,
) -> Result<Option<i64>, FetchError> {
    let req = JsonRpcRequest::new(
        1,
        "eth_getBlockByNumber",
        vec![json!(u64_to_hex(block)), json!(false)],
    );
    let resp = endpoint.send(req).await?;
    let value = resp.into_result()?;
    if value.is_null() {
        return Ok(None);
    }
    let ts_hex = value
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::Deserialize("block response missing timestamp".into()))?;
    Ok(Some(hex_to_u64(ts_hex)? as i64))
}

pub async fn eth_get_logs(
    endpoint: &dyn RpcEndpoint,
    address: &str,
    topic0s: &[String],
    from: u64,
    to: u64,
) -> Result<Vec<RawLog>, FetchError> {
    let filter = json!({
        "address": address,
        "topics": [topic0s],
        "fromBlock": u64_to_hex(from),
        "toBlock": u64_to_hex(to),
    });
    let req = JsonRpcRequest::new(1, "eth_getLogs", vec![filter]);
    let resp = endpoint.send(req).await?;
    let value = resp.into_result()?;
    let array = value.as_array().ok_or(FetchError::MalformedResponse)?;

    let mut logs = Vec::with_capacity(array.len());
    for entry in array {
        logs.push(parse_raw_log(entry)?);
    }
    Ok(logs)
}

fn parse_raw_log(v: &Value) -> Result<RawLog, FetchError> {
    let get_str = |field: &str| -> Result<String, FetchError> {
        v.get(field)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or(FetchError::MalformedResponse)
    };

    let topics = v
        .get("topics")
        .and_then(Value::as_array)
        .ok_or(FetchError::MalformedResponse)?
        .iter()
        .map(|t| t.as_str().map(String::from).ok_or(FetchError::MalformedResponse))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawLog {
        address: get_str("address")?,
        topics,
        data: get_str("data")?,
        block_number: hex_to_u64(&get_str("blockNumber")?)?,
        transaction_hash: get_str("transactionHash")?,
        log_index: hex_to_u64(&get_str("logIndex")?)? as u32,
    })
}
