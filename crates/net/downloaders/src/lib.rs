//! The chain-sync core's download scheduler: [`SyncManager`], [`BlockQueue`] and [`HashStore`].
//!
//! Plays the role `reth-downloaders` plays for the rest of the workspace, narrowed to exactly
//! the hash/block retrieval scheduling and persistent block queue this sync core needs. Header
//! and body download pipelines, and the validation that runs over their output, are out of
//! scope; this crate only gets blocks to the point where an external importer can drain them
//! from [`BlockQueue`].

#![warn(missing_docs, unreachable_pub, rust_2018_idioms)]

mod block_queue;
mod hash_store;
mod sync_manager;

pub use block_queue::BlockQueue;
pub use hash_store::HashStore;
pub use sync_manager::SyncManager;
