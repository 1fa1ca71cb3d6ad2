//! # chaintap-core
//!
//! Shared data model, configuration schema, and error taxonomy consumed by
//! every other `chaintap-*` crate.
//!
//! ```text
//!   ┌─────────────┐     ┌────────────────┐     ┌────────────────┐
//!   │ chaintap-abi │    │ chaintap-storage│    │  chaintap-rpc  │
//!   └──────┬──────┘     └────────┬───────┘     └────────┬───────┘
//!          │                     │                      │
//!          └──────────┬──────────┴──────────┬───────────┘
//!                     │                     │
//!              ┌──────▼─────────────────────▼──────┐
//!              │           chaintap-core            │
//!              │  DecodedEvent · SyncState · Config  │
//!              │         ChaintapError               │
//!              └─────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate talks to the network or a database; it exists so
//! the other crates share one vocabulary instead of converting between
//! private structs at every boundary.

pub mod config;
pub mod error;
pub mod event;

pub use config::Config;
pub use error::ChaintapError;
pub use event::DecodedEvent;
