//! # chaintap-storage
//!
//! A unified `events` table plus per-contract `sync_state`, coupled
//! atomically by `commit`, so a crash between the two leaves progress
//! consistent with what was actually persisted.

pub mod error;
pub mod query;
pub mod sqlite;

pub use error::StorageError;
pub use query::QueryFilter;
pub use sqlite::{SqliteStorage, SyncStateRow};
