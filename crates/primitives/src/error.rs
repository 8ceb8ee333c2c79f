/// The error type returned by every fallible public operation in the chain-sync core.
///
/// Mirrors `RethResult`/`RethError` in spirit: a single, small aggregate error enum that each
/// crate's own error type (e.g. the storage crate's `StorageError`) converts into via `#[from]`,
/// so callers at the composition root only ever need to match on one type.
#[derive(thiserror::Error, Debug)]
pub enum ChainSyncError {
    /// The persistent store backing the `BlockQueue` failed.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Background initialization of a component never completed.
    #[error("initialization failed: {0}")]
    InitFailed(String),
}

/// Convenience alias used throughout the chain-sync crates.
pub type ChainSyncResult<T> = Result<T, ChainSyncError>;
