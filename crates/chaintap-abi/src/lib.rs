//! # chaintap-abi
//!
//! Acquire a contract's event ABI (manual file, on-disk cache, or explorer
//! API), cache it durably, and decode raw logs against it.

pub mod cache;
pub mod decoder;
pub mod error;
pub mod explorer;
pub mod registry;

pub use decoder::{DecodeOutcome, EventDecoder, RawLog};
pub use error::AbiError;
pub use registry::AbiRegistry;
