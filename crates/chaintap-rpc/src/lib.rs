//! # chaintap-rpc
//!
//! Maintains a set of RPC endpoints with per-endpoint health state, selects
//! one per request under a priority-weighted load-balance policy, and owns
//! the JSON-RPC wire format and HTTP transport beneath it.

pub mod error;
pub mod pool;
pub mod transport;

pub use error::RpcError;
pub use pool::{ProviderHealth, ProviderPool, ProviderPoolConfig};
pub use transport::{HttpTransport, JsonRpcRequest, JsonRpcResponse};
