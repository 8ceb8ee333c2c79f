use chainsync_db::Database;
use chainsync_primitives::{BlockWrapper, ChainSyncError, ChainSyncResult, SyncConfig, B256};
use chainsync_tasks::TaskSpawner;
use std::{
    collections::{BTreeSet, HashSet},
    path::PathBuf,
    sync::Arc,
};
use tokio::sync::{Mutex, Notify, OnceCell};

#[derive(Default)]
struct QueueState {
    db: Option<Database>,
    index: BTreeSet<u64>,
    hashes: HashSet<B256>,
}

/// A durable, ordered, deduplicated queue of pending blocks keyed by block number: the hand-off
/// point between network download and chain import.
///
/// Every public operation awaits background initialization before acting; construction
/// ([`BlockQueue::open`]) returns immediately while the backing store opens on a task spawned
/// through a [`TaskSpawner`].
pub struct BlockQueue {
    path: PathBuf,
    database_reset: bool,
    state: Mutex<QueueState>,
    init: OnceCell<()>,
    not_empty: Notify,
}

impl std::fmt::Debug for BlockQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockQueue").field("path", &self.path).finish_non_exhaustive()
    }
}

impl BlockQueue {
    /// Starts opening the backing store at `path` on a task spawned through `spawner`, returning
    /// immediately. Every other method awaits this initialization before acting.
    pub fn open(path: impl Into<PathBuf>, config: &SyncConfig, spawner: &dyn TaskSpawner) -> Arc<Self> {
        let queue = Arc::new(Self {
            path: path.into(),
            database_reset: config.database_reset,
            state: Mutex::new(QueueState::default()),
            init: OnceCell::new(),
            not_empty: Notify::new(),
        });

        let background = Arc::clone(&queue);
        spawner.spawn_blocking(Box::pin(async move {
            if let Err(error) = background.ensure_ready().await {
                tracing::error!(target: "sync::queue", %error, "block queue initialization failed");
            }
        }));

        queue
    }

    fn closed_error() -> ChainSyncError {
        ChainSyncError::InitFailed("block queue is closed".to_string())
    }

    async fn ensure_ready(&self) -> ChainSyncResult<()> {
        self.init
            .get_or_try_init(|| async {
                let path = self.path.clone();
                let reset = self.database_reset;
                let opened = tokio::task::spawn_blocking(move || {
                    Database::open(&path, reset).and_then(|db| {
                        let index = db.load_index()?;
                        let hashes = db.load_hashes()?;
                        Ok((db, index, hashes))
                    })
                })
                .await
                .map_err(|_| ChainSyncError::InitFailed("block queue init task panicked".to_string()))??;

                let (db, index, hashes) = opened;
                let mut state = self.state.lock().await;
                state.db = Some(db);
                state.index = index;
                state.hashes = hashes.into_iter().collect();
                Ok::<(), ChainSyncError>(())
            })
            .await
            .map(|_| ())
    }

    /// Inserts `block` unless its number is already present.
    pub async fn add(&self, block: BlockWrapper) -> ChainSyncResult<()> {
        self.add_all(vec![block]).await
    }

    /// Inserts `blocks` in a single commit; numbers already present (in the queue, or repeated
    /// within `blocks` itself) are silently ignored.
    pub async fn add_all(&self, blocks: Vec<BlockWrapper>) -> ChainSyncResult<()> {
        if blocks.is_empty() {
            return Ok(());
        }
        self.ensure_ready().await?;
        let mut guard = self.state.lock().await;
        let QueueState { db, index, hashes } = &mut *guard;
        let db = db.as_ref().ok_or_else(Self::closed_error)?;

        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for block in blocks {
            if index.contains(&block.number) || !seen.insert(block.number) {
                continue;
            }
            fresh.push(block);
        }
        if fresh.is_empty() {
            return Ok(());
        }

        db.put_blocks(&fresh)?;
        for block in &fresh {
            index.insert(block.number);
            hashes.insert(block.hash);
        }
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes and returns the lowest-numbered pending block, or `None` if empty.
    pub async fn poll(&self) -> ChainSyncResult<Option<BlockWrapper>> {
        self.ensure_ready().await?;
        let mut guard = self.state.lock().await;
        let QueueState { db, index, hashes } = &mut *guard;
        let db = db.as_ref().ok_or_else(Self::closed_error)?;

        let Some(number) = index.iter().next().copied() else {
            return Ok(None);
        };
        let removed = db.remove_block(number)?;
        index.remove(&number);
        if let Some(block) = &removed {
            hashes.remove(&block.hash);
        }
        Ok(removed)
    }

    /// Returns the lowest-numbered pending block without removing it, or `None` if empty.
    pub async fn peek(&self) -> ChainSyncResult<Option<BlockWrapper>> {
        self.ensure_ready().await?;
        let guard = self.state.lock().await;
        let db = guard.db.as_ref().ok_or_else(Self::closed_error)?;
        match guard.index.iter().next().copied() {
            Some(number) => db.get_block(number),
            None => Ok(None),
        }
    }

    /// Waits until at least one block is pending, then polls it.
    pub async fn take(&self) -> ChainSyncResult<BlockWrapper> {
        loop {
            if let Some(block) = self.poll().await? {
                return Ok(block);
            }
            self.not_empty.notified().await;
        }
    }

    /// The number of pending blocks.
    pub async fn size(&self) -> ChainSyncResult<usize> {
        self.ensure_ready().await?;
        Ok(self.state.lock().await.index.len())
    }

    /// `true` if no blocks are pending.
    pub async fn is_empty(&self) -> ChainSyncResult<bool> {
        Ok(self.size().await? == 0)
    }

    /// Drops every pending block and hash.
    pub async fn clear(&self) -> ChainSyncResult<()> {
        self.ensure_ready().await?;
        let mut guard = self.state.lock().await;
        let QueueState { db, index, hashes } = &mut *guard;
        let db = db.as_ref().ok_or_else(Self::closed_error)?;
        db.clear()?;
        index.clear();
        hashes.clear();
        Ok(())
    }

    /// Returns the subset of `candidates` not already present in the hash set, for filtering
    /// discovered hashes down to the ones worth requesting.
    pub async fn filter_existing(&self, candidates: Vec<B256>) -> ChainSyncResult<Vec<B256>> {
        self.ensure_ready().await?;
        let guard = self.state.lock().await;
        Ok(candidates.into_iter().filter(|hash| !guard.hashes.contains(hash)).collect())
    }

    /// All hashes currently pending.
    pub async fn get_hashes(&self) -> ChainSyncResult<Vec<B256>> {
        self.ensure_ready().await?;
        Ok(self.state.lock().await.hashes.iter().copied().collect())
    }

    /// `true` if the queue held pending blocks at the time it was (re)opened, i.e. a previous
    /// process exited mid-sync. `SyncManager` uses this to resume straight into block retrieval
    /// instead of restarting hash retrieval from scratch.
    pub async fn sync_was_interrupted(&self) -> ChainSyncResult<bool> {
        Ok(!self.is_empty().await?)
    }

    /// Awaits initialization, then closes the backing store. A closed queue's operations return
    /// [`ChainSyncError::InitFailed`] until a new `BlockQueue` is opened.
    pub async fn close(&self) -> ChainSyncResult<()> {
        self.ensure_ready().await?;
        let mut guard = self.state.lock().await;
        guard.db = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_tasks::TokioTaskExecutor;

    fn wrapper(number: u64) -> BlockWrapper {
        BlockWrapper::new(number, B256::repeat_byte(number as u8 + 1), B256::ZERO, false)
    }

    #[tokio::test]
    async fn ordered_drain_by_number_not_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = BlockQueue::open(dir.path(), &SyncConfig::default(), &TokioTaskExecutor);
        queue.add_all(vec![wrapper(5), wrapper(3), wrapper(7), wrapper(3)]).await.unwrap();

        assert_eq!(queue.size().await.unwrap(), 3);
        assert_eq!(queue.poll().await.unwrap().map(|b| b.number), Some(3));
        assert_eq!(queue.poll().await.unwrap().map(|b| b.number), Some(5));
        assert_eq!(queue.poll().await.unwrap().map(|b| b.number), Some(7));
        assert_eq!(queue.poll().await.unwrap(), None);
        assert!(queue.get_hashes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::default();
        {
            let queue = BlockQueue::open(dir.path(), &config, &TokioTaskExecutor);
            queue.add(wrapper(1)).await.unwrap();
            queue.close().await.unwrap();
        }
        let queue = BlockQueue::open(dir.path(), &config, &TokioTaskExecutor);
        assert_eq!(queue.size().await.unwrap(), 1);
        assert!(queue.sync_was_interrupted().await.unwrap());
    }

    #[tokio::test]
    async fn add_is_idempotent_by_number() {
        let dir = tempfile::tempdir().unwrap();
        let queue = BlockQueue::open(dir.path(), &SyncConfig::default(), &TokioTaskExecutor);
        queue.add(wrapper(1)).await.unwrap();
        queue.add(wrapper(1)).await.unwrap();
        assert_eq!(queue.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn take_waits_for_a_block_to_be_added() {
        let dir = tempfile::tempdir().unwrap();
        let queue = BlockQueue::open(dir.path(), &SyncConfig::default(), &TokioTaskExecutor);

        let waiter = Arc::clone(&queue);
        let handle = tokio::spawn(async move { waiter.take().await.unwrap() });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        queue.add(wrapper(9)).await.unwrap();

        let block = handle.await.unwrap();
        assert_eq!(block.number, 9);
    }

    #[tokio::test]
    async fn reset_on_open_clears_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let queue = BlockQueue::open(dir.path(), &SyncConfig::default(), &TokioTaskExecutor);
            queue.add(wrapper(1)).await.unwrap();
        }
        let mut reset_config = SyncConfig::default();
        reset_config.database_reset = true;
        let queue = BlockQueue::open(dir.path(), &reset_config, &TokioTaskExecutor);
        assert_eq!(queue.size().await.unwrap(), 0);
    }
}
