use std::path::PathBuf;

/// Failures from the persistent store backing the `BlockQueue`.
///
/// Storage failures are not recovered locally; they are mapped to this single error type and
/// surfaced to the caller.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// The backing store's directory could not be created.
    #[error("failed to create block queue store directory at {path}: {source}")]
    Io {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The backing store could not be opened at the given path.
    #[error("failed to open block queue store at {path}: {source}")]
    Open {
        /// The path the store was opened at.
        path: PathBuf,
        /// The underlying mdbx error.
        #[source]
        source: reth_libmdbx::Error,
    },
    /// A read or write transaction failed.
    #[error("block queue store transaction failed: {0}")]
    Transaction(#[source] reth_libmdbx::Error),
    /// A transaction failed to commit.
    #[error("block queue store commit failed: {0}")]
    Commit(#[source] reth_libmdbx::Error),
    /// A value read back from the store did not decode to the expected shape.
    #[error("corrupt block queue entry for key {key:?}: {reason}")]
    Corrupt {
        /// The raw key whose value failed to decode.
        key: Vec<u8>,
        /// Why decoding failed.
        reason: &'static str,
    },
}

/// Convenience alias used throughout this crate.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for chainsync_primitives::ChainSyncError {
    fn from(err: StorageError) -> Self {
        chainsync_primitives::ChainSyncError::Storage(Box::new(err))
    }
}
