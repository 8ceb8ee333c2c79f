//! A small task-spawning abstraction.
//!
//! `SyncManager`, `ChannelManager` and `BlockQueue` never call `tokio::spawn` directly; they
//! hold a `Box<dyn TaskSpawner>` instead, so the composition root (`bin/chainsync-node`) decides
//! how periodic workers and background init tasks are actually scheduled, and tests can swap in
//! a spawner that tracks what was scheduled.

#![warn(missing_docs, unreachable_pub, rust_2018_idioms)]

use std::{future::Future, pin::Pin};
use tokio::task::JoinHandle;

/// A future boxed for spawning, the same shape `reth_tasks::TaskSpawner` uses.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Abstraction over spawning tasks, so that components depend on a trait object instead of a
/// concrete executor.
pub trait TaskSpawner: Send + Sync + std::fmt::Debug {
    /// Spawns a future on the executor's default (non-blocking) task set.
    fn spawn(&self, fut: BoxFuture) -> JoinHandle<()>;

    /// Spawns a future allowed to block, on a dedicated blocking-capable task set.
    fn spawn_blocking(&self, fut: BoxFuture) -> JoinHandle<()>;
}

/// The default [`TaskSpawner`], backed directly by the ambient tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct TokioTaskExecutor;

impl TaskSpawner for TokioTaskExecutor {
    fn spawn(&self, fut: BoxFuture) -> JoinHandle<()> {
        tokio::task::spawn(fut)
    }

    fn spawn_blocking(&self, fut: BoxFuture) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || {
            tokio::runtime::Handle::current().block_on(fut);
        })
    }
}
