//! Crate-local error type, converted into `ChaintapError::Rpc` at the
//! point it crosses into the rest of the workspace.

use chaintap_core::ChaintapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    #[error("response deserialization failed: {0}")]
    Deserialize(String),

    #[error("no healthy providers available")]
    NoHealthyProviders,

    #[error("provider pool is empty")]
    EmptyPool,
}

impl RpcError {
    /// Rate-limit classification per §4.3: message contains (case
    /// insensitive) any of `"429"`, `"rate limit"`, `"too many requests"`,
    /// `"quota exceeded"`.
    pub fn is_rate_limit(&self) -> bool {
        contains_any(
            &self.to_string(),
            &["429", "rate limit", "too many requests", "quota exceeded"],
        )
    }

    /// Timeout classification per §4.3.
    pub fn is_timeout(&self) -> bool {
        contains_any(
            &self.to_string(),
            &["timeout", "etimedout", "econnreset", "socket"],
        )
    }

    /// Range-limit classification per §4.4's chunking algorithm.
    pub fn is_range_error(&self) -> bool {
        contains_any(
            &self.to_string(),
            &["block range", "query returned more than", "exceeds max"],
        )
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lowered = haystack.to_lowercase();
    needles.iter().any(|n| lowered.contains(n))
}

/// Standalone predicates over an arbitrary message string, used where the
/// caller has a raw JSON-RPC error message rather than an `RpcError` value
/// (e.g. classifying a `serde_json::Value` error object straight off the
/// wire). Null/undefined/empty inputs match neither predicate.
pub fn message_is_rate_limit(message: &str) -> bool {
    contains_any(
        message,
        &["429", "rate limit", "too many requests", "quota exceeded"],
    )
}

pub fn message_is_timeout(message: &str) -> bool {
    contains_any(message, &["timeout", "etimedout", "econnreset", "socket"])
}

pub fn message_is_range_error(message: &str) -> bool {
    contains_any(message, &["block range", "query returned more than", "exceeds max"])
}

impl From<RpcError> for ChaintapError {
    fn from(e: RpcError) -> Self {
        ChaintapError::rpc(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_predicate_matches_known_phrases() {
        assert!(message_is_rate_limit("HTTP 429"));
        assert!(message_is_rate_limit("Rate Limit Exceeded"));
        assert!(message_is_rate_limit("Too Many Requests"));
        assert!(message_is_rate_limit("quota exceeded for this key"));
        assert!(!message_is_rate_limit("internal server error"));
    }

    #[test]
    fn timeout_predicate_matches_known_phrases() {
        assert!(message_is_timeout("connect ETIMEDOUT"));
        assert!(message_is_timeout("socket hang up"));
        assert!(message_is_timeout("Request Timeout"));
        assert!(!message_is_timeout("nonce too low"));
    }

    #[test]
    fn range_error_predicate_matches_known_phrases() {
        assert!(message_is_range_error("block range too large"));
        assert!(message_is_range_error("query returned more than 10000 results"));
        assert!(message_is_range_error("eth_getLogs exceeds max results"));
        assert!(!message_is_range_error("execution reverted"));
    }

    #[test]
    fn empty_message_matches_neither() {
        assert!(!message_is_rate_limit(""));
        assert!(!message_is_timeout(""));
    }
}
