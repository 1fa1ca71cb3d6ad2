//! The five-kind error taxonomy shared by every `chaintap-*` crate.

use thiserror::Error;

/// Unified error type. Every crate-local error (`AbiError`, `StorageError`,
/// `RpcError`, `FetchError`, ...) converts into one of these five kinds via
/// `#[from]` at the point it crosses a crate boundary.
#[derive(Debug, Error)]
pub enum ChaintapError {
    /// Invalid or missing configuration, an unresolved `${NAME}` reference,
    /// or malformed YAML.
    #[error("configuration error: {0}")]
    Config(String),

    /// A failure attributable to an RPC endpoint: network, HTTP, JSON-RPC,
    /// rate limit, timeout, or block-range limit.
    #[error("RPC error{}: {message}", provider.as_ref().map(|p| format!(" [{p}]")).unwrap_or_default())]
    Rpc {
        message: String,
        provider: Option<String>,
    },

    /// A database open, transaction, or query failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Explorer lookup failure, unverified contract, malformed ABI, missing
    /// manual ABI file, or unsupported chain id.
    #[error("ABI error: {0}")]
    Abi(String),

    /// Cache directory or manual ABI file read failure not already covered
    /// by `Abi`.
    #[error("filesystem error: {0}")]
    FileSystem(String),
}

impl ChaintapError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc {
            message: msg.into(),
            provider: None,
        }
    }

    pub fn rpc_from(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Rpc {
            message: msg.into(),
            provider: Some(provider.into()),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn abi(msg: impl Into<String>) -> Self {
        Self::Abi(msg.into())
    }

    pub fn file_system(msg: impl Into<String>) -> Self {
        Self::FileSystem(msg.into())
    }

    /// The process exit code this error maps to at the CLI boundary.
    /// `Abi` and `FileSystem` fold into the configuration code (1): both
    /// trace back to a misconfigured contract entry (bad manual path,
    /// unsupported chain) in every case except mid-run, where callers
    /// already intercept them before they reach `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Abi(_) | Self::FileSystem(_) => 1,
            Self::Rpc { .. } => 2,
            Self::Storage(_) => 3,
        }
    }
}
