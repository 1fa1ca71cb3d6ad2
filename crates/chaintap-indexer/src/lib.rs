//! # chaintap-indexer
//!
//! Drives the per-contract poll loop and the one-shot backfill entry point,
//! wiring the Provider Pool, Log Fetcher, ABI Registry, and Storage Engine
//! together for one poll: checkout → fetch → decode → commit → sleep.

pub mod backfill;
pub mod coordinator;
pub mod decode;

pub use backfill::run_backfill;
pub use coordinator::Coordinator;
