//! Transactional key-value storage backing the chain-sync core's `BlockQueue`.
//!
//! Plays the role `reth-db`/`reth-libmdbx` play for the rest of the workspace: a small,
//! table-oriented wrapper over an mdbx environment, with a commit-per-mutation contract so the
//! `BlockQueue`'s durability holds without the queue itself knowing anything about the storage
//! engine.

#![warn(missing_docs, unreachable_pub, rust_2018_idioms)]

mod codec;
mod env;
mod error;

pub use env::Database;
pub use error::{StorageError, StorageResult};

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use chainsync_primitives::BlockWrapper;

    fn wrapper(number: u64) -> BlockWrapper {
        BlockWrapper::new(number, B256::repeat_byte(number as u8 + 1), B256::ZERO, false)
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open(dir.path(), false).unwrap();
            db.put_blocks(&[wrapper(1), wrapper(2)]).unwrap();
        }
        let db = Database::open(dir.path(), false).unwrap();
        let index = db.load_index().unwrap();
        assert_eq!(index.len(), 2);
        assert!(db.get_block(1).unwrap().is_some());
    }

    #[test]
    fn reset_clears_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open(dir.path(), false).unwrap();
            db.put_blocks(&[wrapper(1)]).unwrap();
        }
        let db = Database::open(dir.path(), true).unwrap();
        assert!(db.load_index().unwrap().is_empty());
        assert!(db.load_hashes().unwrap().is_empty());
    }

    #[test]
    fn remove_block_drops_from_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path(), false).unwrap();
        let block = wrapper(7);
        let hash = block.hash;
        db.put_blocks(&[block]).unwrap();
        let removed = db.remove_block(7).unwrap();
        assert_eq!(removed.map(|b| b.number), Some(7));
        assert!(db.get_block(7).unwrap().is_none());
        assert!(!db.load_hashes().unwrap().contains(&hash));
    }
}
