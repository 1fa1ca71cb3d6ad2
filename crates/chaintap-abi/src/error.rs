//! Crate-local error type, converted into `ChaintapError::Abi` /
//! `ChaintapError::FileSystem` at the point it crosses into the rest of the
//! workspace.

use chaintap_core::ChaintapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("unsupported chain ID: {0}")]
    UnsupportedChain(u64),

    #[error("Contract ABI not verified on Etherscan. Provide manual ABI path in config.")]
    NotVerified,

    #[error("explorer error: {0}")]
    Explorer(String),

    #[error("malformed ABI JSON: {0}")]
    MalformedAbi(String),

    #[error("event {0:?} not found in ABI")]
    EventNotFound(String),

    #[error("failed to decode log: {0}")]
    DecodeFailed(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("manual ABI file {path:?} could not be read: {source}")]
    ManualFileRead {
        path: String,
        source: std::io::Error,
    },

    #[error("cache I/O error at {path:?}: {source}")]
    CacheIo {
        path: String,
        source: std::io::Error,
    },
}

impl AbiError {
    /// `true` for conditions that must never be retried, per the ABI
    /// registry's retry envelope.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AbiError::Transport(_))
    }
}

impl From<AbiError> for ChaintapError {
    fn from(e: AbiError) -> Self {
        match e {
            AbiError::ManualFileRead { .. } | AbiError::CacheIo { .. } => {
                ChaintapError::file_system(e.to_string())
            }
            _ => ChaintapError::abi(e.to_string()),
        }
    }
}
