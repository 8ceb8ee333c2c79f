//! Commonly used types shared by the chain-sync crates.
//!
//! Mirrors the role `reth-primitives` plays for the rest of the workspace: a small,
//! dependency-light crate that the network, downloader and storage crates all build on top of
//! instead of depending on each other directly.

#![warn(missing_docs, unreachable_pub, rust_2018_idioms)]

mod block;
mod config;
mod error;
mod node;
mod state;

pub use block::BlockWrapper;
pub use config::SyncConfig;
pub use error::{ChainSyncError, ChainSyncResult};
pub use node::{NodeId, Status};
pub use state::SyncState;

/// Re-exported so downstream crates never need to depend on `alloy-primitives` directly for the
/// two value types this crate's public API is built on.
pub use alloy_primitives::{B256, U256};
