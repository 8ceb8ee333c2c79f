use crate::{
    codec::{decode_block, decode_number_key, encode_block, encode_number_key},
    StorageError, StorageResult,
};
use alloy_primitives::B256;
use chainsync_primitives::BlockWrapper;
use reth_libmdbx::{DatabaseFlags, Environment, WriteFlags};
use std::{collections::BTreeSet, path::Path};
use tracing::debug;

const BLOCKS_TABLE: &str = "BlockQueueBlocks";
const HASHES_TABLE: &str = "BlockQueueHashes";

/// The `BlockQueue`'s backing transactional store: two tables over one `reth_libmdbx`
/// environment, opened exactly once per process.
#[derive(Debug)]
pub struct Database {
    env: Environment,
}

impl Database {
    /// Opens (creating if necessary) the store at `path`. If `reset` is set, both tables are
    /// cleared and the clear is committed before this call returns.
    pub fn open(path: &Path, reset: bool) -> StorageResult<Self> {
        std::fs::create_dir_all(path)
            .map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;

        let env = Environment::new()
            .set_max_dbs(2)
            .open(path)
            .map_err(|source| StorageError::Open { path: path.to_path_buf(), source })?;

        let db = Self { env };
        {
            let tx = db.env.begin_rw_txn().map_err(StorageError::Transaction)?;
            tx.create_db(Some(BLOCKS_TABLE), DatabaseFlags::default()).map_err(StorageError::Transaction)?;
            tx.create_db(Some(HASHES_TABLE), DatabaseFlags::default()).map_err(StorageError::Transaction)?;
            tx.commit().map_err(StorageError::Commit)?;
        }

        if reset {
            debug!(target: "sync::db", "databaseReset set, clearing block queue store");
            db.clear()?;
        }

        Ok(db)
    }

    /// Rebuilds the in-memory `index` from the key set of the `blocks` table, as done on every
    /// restart.
    pub fn load_index(&self) -> StorageResult<BTreeSet<u64>> {
        let tx = self.env.begin_ro_txn().map_err(StorageError::Transaction)?;
        let db = tx.open_db(Some(BLOCKS_TABLE)).map_err(StorageError::Transaction)?;
        let mut cursor = tx.cursor(&db).map_err(StorageError::Transaction)?;
        let mut index = BTreeSet::new();
        for entry in cursor.iter::<Vec<u8>, Vec<u8>>() {
            let (key, _) = entry.map_err(StorageError::Transaction)?;
            index.insert(decode_number_key(&key)?);
        }
        Ok(index)
    }

    /// Loads all persisted block hashes, for rebuilding the in-memory `hashes` set.
    pub fn load_hashes(&self) -> StorageResult<Vec<B256>> {
        let tx = self.env.begin_ro_txn().map_err(StorageError::Transaction)?;
        let db = tx.open_db(Some(HASHES_TABLE)).map_err(StorageError::Transaction)?;
        let mut cursor = tx.cursor(&db).map_err(StorageError::Transaction)?;
        let mut hashes = Vec::new();
        for entry in cursor.iter::<Vec<u8>, Vec<u8>>() {
            let (key, _) = entry.map_err(StorageError::Transaction)?;
            hashes.push(B256::from_slice(&key));
        }
        Ok(hashes)
    }

    /// Looks up a single block by number, without removing it.
    pub fn get_block(&self, number: u64) -> StorageResult<Option<BlockWrapper>> {
        let tx = self.env.begin_ro_txn().map_err(StorageError::Transaction)?;
        let db = tx.open_db(Some(BLOCKS_TABLE)).map_err(StorageError::Transaction)?;
        let key = encode_number_key(number);
        match tx.get::<Vec<u8>>(&db, &key).map_err(StorageError::Transaction)? {
            Some(value) => Ok(Some(decode_block(number, &key, &value)?)),
            None => Ok(None),
        }
    }

    /// Inserts a batch of blocks into both the `blocks` and `hashes` tables in a single commit.
    /// Callers are responsible for having already filtered out numbers already present in
    /// `index`; this method does not re-check for duplicates.
    pub fn put_blocks(&self, blocks: &[BlockWrapper]) -> StorageResult<()> {
        if blocks.is_empty() {
            return Ok(());
        }
        let tx = self.env.begin_rw_txn().map_err(StorageError::Transaction)?;
        let blocks_db = tx.open_db(Some(BLOCKS_TABLE)).map_err(StorageError::Transaction)?;
        let hashes_db = tx.open_db(Some(HASHES_TABLE)).map_err(StorageError::Transaction)?;
        for block in blocks {
            let key = encode_number_key(block.number);
            tx.put(&blocks_db, key, encode_block(block), WriteFlags::UPSERT).map_err(StorageError::Transaction)?;
            tx.put(&hashes_db, block.hash.as_slice(), [], WriteFlags::UPSERT).map_err(StorageError::Transaction)?;
        }
        tx.commit().map_err(StorageError::Commit)?;
        Ok(())
    }

    /// Removes a single block by number from both tables, returning it if it was present.
    pub fn remove_block(&self, number: u64) -> StorageResult<Option<BlockWrapper>> {
        let tx = self.env.begin_rw_txn().map_err(StorageError::Transaction)?;
        let blocks_db = tx.open_db(Some(BLOCKS_TABLE)).map_err(StorageError::Transaction)?;
        let hashes_db = tx.open_db(Some(HASHES_TABLE)).map_err(StorageError::Transaction)?;
        let key = encode_number_key(number);
        let removed = match tx.get::<Vec<u8>>(&blocks_db, &key).map_err(StorageError::Transaction)? {
            Some(value) => Some(decode_block(number, &key, &value)?),
            None => None,
        };
        if let Some(block) = &removed {
            tx.del(&blocks_db, key, None).map_err(StorageError::Transaction)?;
            tx.del(&hashes_db, block.hash.as_slice(), None).map_err(StorageError::Transaction)?;
        }
        tx.commit().map_err(StorageError::Commit)?;
        Ok(removed)
    }

    /// Clears both tables in a single commit.
    pub fn clear(&self) -> StorageResult<()> {
        let tx = self.env.begin_rw_txn().map_err(StorageError::Transaction)?;
        let blocks_db = tx.open_db(Some(BLOCKS_TABLE)).map_err(StorageError::Transaction)?;
        let hashes_db = tx.open_db(Some(HASHES_TABLE)).map_err(StorageError::Transaction)?;
        tx.clear_db(&blocks_db).map_err(StorageError::Transaction)?;
        tx.clear_db(&hashes_db).map_err(StorageError::Transaction)?;
        tx.commit().map_err(StorageError::Commit)?;
        Ok(())
    }
}
