use chaintap_core::ChaintapError;
use chaintap_rpc::RpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("getLogs response was not a JSON array")]
    MalformedResponse,

    #[error("expected a hex-encoded integer, got {0:?}")]
    InvalidHex(String),

    #[error(
        "block range shrink hit the 100-block floor and failed {0} consecutive times; giving up"
    )]
    RangeFloorExceeded(u32),

    #[error("could not resolve timestamp for block {0}")]
    TimestampUnresolved(u64),
}

impl From<FetchError> for ChaintapError {
    fn from(e: FetchError) -> Self {
        match &e {
            FetchError::Rpc(inner) => ChaintapError::rpc(inner.to_string()),
            other => ChaintapError::rpc(other.to_string()),
        }
    }
}
