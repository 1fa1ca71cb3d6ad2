//! # chaintap-evm
//!
//! Chunked `eth_getLogs` retrieval with adaptive range sizing, and block
//! timestamp enrichment, sitting between the Provider Pool and the ABI
//! Registry in the data flow for one poll.

pub mod error;
pub mod fetcher;
pub mod rpc_calls;
pub mod timestamp;

pub use error::FetchError;
pub use fetcher::{LogFetcher, RANGE_FLOOR};
pub use timestamp::BlockTimestampCache;
