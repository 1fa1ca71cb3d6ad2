//! Turns a parsed JSON ABI into a topic-0-keyed decoder, and a raw log into
//! a [`chaintap_core::DecodedEvent`].
//!
//! EVM indexed-parameter encoding rules: value types (uint, int, bool,
//! address, bytesN) are ABI-encoded directly into their topic slot and can
//! be recovered; reference types (string, bytes, arrays, tuples) are stored
//! as the keccak256 of their ABI-encoded form in the topic slot and are
//! **not** recoverable — we surface the raw 32-byte topic as hex instead of
//! attempting a decode that cannot succeed.

use std::collections::HashMap;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::{Event, EventParam, JsonAbi, Param};
use alloy_primitives::{I256, U256};
use serde_json::{Map, Value};
use tiny_keccak::{Hasher, Keccak};

use crate::error::AbiError;

/// A raw, still-encoded log as delivered by `eth_getLogs`.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: String,
    /// Hex-encoded topics, `topics[0]` is the event signature hash for
    /// non-anonymous events.
    pub topics: Vec<String>,
    /// Hex-encoded (with `0x` prefix) non-indexed parameter data.
    pub data: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u32,
}

/// The outcome of attempting to decode one raw log.
pub enum DecodeOutcome {
    /// `topics[0]` did not match any event in the ABI.
    Unknown,
    Decoded(chaintap_core::DecodedEvent),
}

/// Decoder bound to one contract's parsed ABI.
pub struct EventDecoder {
    by_topic0: HashMap<String, Event>,
}

fn canonical_param_type(ty: &str, components: &[Param]) -> Result<String, AbiError> {
    // Arrays: recurse on the element type, keeping the trailing `[]`/`[N]`.
    if let Some(idx) = ty.rfind('[') {
        let (elem, suffix) = ty.split_at(idx);
        let elem_canonical = canonical_param_type(elem, components)?;
        return Ok(format!("{elem_canonical}{suffix}"));
    }
    if ty == "tuple" {
        let inner: Result<Vec<String>, AbiError> = components
            .iter()
            .map(|c| canonical_param_type(&c.ty, &c.components))
            .collect();
        return Ok(format!("({})", inner?.join(",")));
    }
    Ok(ty.to_string())
}

fn event_signature(event: &Event) -> Result<String, AbiError> {
    let params: Result<Vec<String>, AbiError> = event
        .inputs
        .iter()
        .map(|p| canonical_param_type(&p.ty, &p.components))
        .collect();
    Ok(format!("{}({})", event.name, params?.join(",")))
}

fn keccak256_hex(input: &str) -> String {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(input.as_bytes());
    hasher.finalize(&mut output);
    format!("0x{}", hex::encode(output))
}

/// Parse a Solidity ABI type string (resolving nested tuple components) into
/// an `alloy_dyn_abi::DynSolType`.
fn resolve_dyn_type(ty: &str, components: &[Param]) -> Result<DynSolType, AbiError> {
    if let Some(idx) = ty.rfind('[') {
        let (elem, suffix) = ty.split_at(idx);
        let elem_ty = resolve_dyn_type(elem, components)?;
        if suffix == "[]" {
            return Ok(DynSolType::Array(Box::new(elem_ty)));
        }
        let len: usize = suffix
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| AbiError::MalformedAbi(format!("bad array suffix {suffix:?}")))?;
        return Ok(DynSolType::FixedArray(Box::new(elem_ty), len));
    }

    if ty == "tuple" {
        let inner: Result<Vec<DynSolType>, AbiError> = components
            .iter()
            .map(|c| resolve_dyn_type(&c.ty, &c.components))
            .collect();
        return Ok(DynSolType::Tuple(inner?));
    }

    match ty {
        "address" => Ok(DynSolType::Address),
        "bool" => Ok(DynSolType::Bool),
        "string" => Ok(DynSolType::String),
        "bytes" => Ok(DynSolType::Bytes),
        "uint" => Ok(DynSolType::Uint(256)),
        "int" => Ok(DynSolType::Int(256)),
        other => {
            if let Some(bits) = other.strip_prefix("uint") {
                let bits: usize = bits
                    .parse()
                    .map_err(|_| AbiError::MalformedAbi(format!("bad uint width {other:?}")))?;
                Ok(DynSolType::Uint(bits))
            } else if let Some(bits) = other.strip_prefix("int") {
                let bits: usize = bits
                    .parse()
                    .map_err(|_| AbiError::MalformedAbi(format!("bad int width {other:?}")))?;
                Ok(DynSolType::Int(bits))
            } else if let Some(n) = other.strip_prefix("bytes") {
                let n: usize = n
                    .parse()
                    .map_err(|_| AbiError::MalformedAbi(format!("bad fixed-bytes width {other:?}")))?;
                Ok(DynSolType::FixedBytes(n))
            } else {
                Err(AbiError::MalformedAbi(format!("unsupported ABI type {other:?}")))
            }
        }
    }
}

/// Does this type's value survive ABI encoding into an indexed topic slot?
/// Reference types are hashed instead, per the EVM ABI spec.
fn is_value_type(ty: &DynSolType) -> bool {
    !matches!(
        ty,
        DynSolType::String
            | DynSolType::Bytes
            | DynSolType::Array(_)
            | DynSolType::FixedArray(_, _)
            | DynSolType::Tuple(_)
    )
}

/// Apply §3's serialization rules to a decoded value. `components` carries
/// the ABI component metadata for the Solidity type this value was decoded
/// from, when that type is (or contains, via array nesting) a tuple/struct —
/// it keys a `Tuple`'s map by parameter name instead of positional index.
fn to_json(value: &DynSolValue, components: Option<&[Param]>) -> Value {
    const MAX_SAFE_INT: i64 = 9_007_199_254_740_991;

    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(u, _) => uint_to_json(*u),
        DynSolValue::Int(i, _) => int_to_json(*i, MAX_SAFE_INT),
        DynSolValue::Address(a) => Value::String(format!("{a:#x}").to_lowercase()),
        DynSolValue::FixedBytes(b, size) => Value::String(format!("0x{}", hex::encode(&b[..*size]))),
        DynSolValue::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            Value::Array(vals.iter().map(|v| to_json(v, components)).collect())
        }
        DynSolValue::Tuple(vals) => {
            let mut map = Map::new();
            for (i, v) in vals.iter().enumerate() {
                let component = components.and_then(|c| c.get(i));
                let key = component.map(|c| c.name.clone()).unwrap_or_else(|| i.to_string());
                let sub_components = component.map(|c| c.components.as_slice());
                map.insert(key, to_json(v, sub_components));
            }
            Value::Object(map)
        }
        DynSolValue::Function(f) => Value::String(format!("0x{}", hex::encode(f))),
    }
}

fn uint_to_json(u: U256) -> Value {
    const MAX_SAFE: u64 = 9_007_199_254_740_991;
    if u <= U256::from(MAX_SAFE) {
        Value::Number(u.to::<u64>().into())
    } else {
        Value::String(u.to_string())
    }
}

fn int_to_json(i: I256, max_safe: i64) -> Value {
    let s = i.to_string();
    match s.parse::<i64>() {
        Ok(n) if n.unsigned_abs() <= max_safe as u64 => Value::Number(n.into()),
        _ => Value::String(s),
    }
}

impl EventDecoder {
    /// Parse the ABI JSON text and index every non-anonymous event by its
    /// topic-0 hash.
    pub fn parse(abi_json: &str) -> Result<Self, AbiError> {
        let abi = JsonAbi::from_json_str(abi_json)
            .map_err(|e| AbiError::MalformedAbi(e.to_string()))?;

        let mut by_topic0 = HashMap::new();
        for event in abi.events.values().flatten() {
            if event.anonymous {
                continue;
            }
            let sig = event_signature(event)?;
            let topic0 = keccak256_hex(&sig);
            by_topic0.insert(topic0, event.clone());
        }
        Ok(Self { by_topic0 })
    }

    /// Resolve the topic-0 hash for a configured event name. Errors if the
    /// name isn't declared in the ABI — callers use this before the first
    /// network call to build the `eth_getLogs` topic filter.
    pub fn topic0_for(&self, event_name: &str) -> Result<String, AbiError> {
        self.by_topic0
            .iter()
            .find(|(_, ev)| ev.name == event_name)
            .map(|(topic0, _)| topic0.clone())
            .ok_or_else(|| AbiError::EventNotFound(event_name.to_string()))
    }

    /// Decode a raw log. Returns `Unknown` (not an error) when `topics[0]`
    /// matches nothing in the ABI — the caller skips such logs.
    pub fn decode(&self, log: &RawLog) -> Result<DecodeOutcome, AbiError> {
        let Some(topic0) = log.topics.first() else {
            return Ok(DecodeOutcome::Unknown);
        };
        let Some(event) = self.by_topic0.get(topic0) else {
            return Ok(DecodeOutcome::Unknown);
        };

        let mut fields = Map::new();
        let indexed: Vec<&EventParam> = event.inputs.iter().filter(|p| p.indexed).collect();
        let non_indexed: Vec<&EventParam> = event.inputs.iter().filter(|p| !p.indexed).collect();

        for (i, param) in indexed.iter().enumerate() {
            let Some(topic_hex) = log.topics.get(i + 1) else {
                break;
            };
            let ty = resolve_dyn_type(&param.ty, &param.components)?;
            let value = decode_topic(topic_hex, &ty)?;
            fields.insert(param.name.clone(), value);
        }

        if !non_indexed.is_empty() {
            let tuple_ty = DynSolType::Tuple(
                non_indexed
                    .iter()
                    .map(|p| resolve_dyn_type(&p.ty, &p.components))
                    .collect::<Result<Vec<_>, _>>()?,
            );
            let data_bytes = hex::decode(log.data.trim_start_matches("0x"))
                .map_err(|e| AbiError::DecodeFailed(format!("invalid log data hex: {e}")))?;
            let decoded = tuple_ty
                .abi_decode(&data_bytes)
                .map_err(|e| AbiError::DecodeFailed(e.to_string()))?;
            let values = match decoded {
                DynSolValue::Tuple(vals) => vals,
                other => vec![other],
            };
            for (param, value) in non_indexed.iter().zip(values.iter()) {
                fields.insert(param.name.clone(), to_json(value, Some(&param.components)));
            }
        }

        Ok(DecodeOutcome::Decoded(chaintap_core::DecodedEvent {
            contract_address: log.address.to_lowercase(),
            block_number: log.block_number,
            block_timestamp: 0,
            transaction_hash: log.transaction_hash.clone(),
            log_index: log.log_index,
            event_name: event.name.clone(),
            event_data: Value::Object(fields),
        }))
    }
}

fn decode_topic(topic_hex: &str, ty: &DynSolType) -> Result<Value, AbiError> {
    let hex_str = topic_hex.trim_start_matches("0x");
    let bytes = hex::decode(hex_str)
        .map_err(|e| AbiError::DecodeFailed(format!("invalid topic hex: {e}")))?;

    if !is_value_type(ty) {
        // Unrecoverable: the topic holds keccak256(value), not the value.
        return Ok(Value::String(format!("0x{}", hex::encode(&bytes))));
    }

    let decoded = ty
        .abi_decode(&bytes)
        .map_err(|e| AbiError::DecodeFailed(e.to_string()))?;
    // Indexed value types are never tuples (see `is_value_type` above), so
    // there is no component metadata to thread through here.
    Ok(to_json(&decoded, None))
}
