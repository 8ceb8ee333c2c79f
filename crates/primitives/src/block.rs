use alloy_primitives::B256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A block pending import, as it sits in the `BlockQueue`.
///
/// Carries enough context (`is_new_block`, `received_at`) for `SyncManager::recover_gap` and
/// `SyncManager::notify_new_block_imported` to make their decisions without re-deriving it from
/// the block body itself. `received_at` is wall-clock (not monotonic) so that a `BlockWrapper`
/// restored from the persistent store after a restart still reports a sensible
/// `time_since_receiving`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockWrapper {
    /// Block height.
    pub number: u64,
    /// This block's hash.
    pub hash: B256,
    /// The hash of this block's parent.
    pub parent_hash: B256,
    /// `true` if this block arrived via a `NewBlock` announcement rather than being fetched as
    /// part of an ongoing sync.
    pub is_new_block: bool,
    received_at_ms: u64,
}

impl BlockWrapper {
    /// Builds a wrapper for a block received just now.
    pub fn new(number: u64, hash: B256, parent_hash: B256, is_new_block: bool) -> Self {
        Self::with_received_at_ms(number, hash, parent_hash, is_new_block, now_ms())
    }

    /// Builds a wrapper with an explicit receipt instant (milliseconds since the Unix epoch),
    /// for deterministic tests and for restoring a wrapper decoded from persistent storage.
    pub fn with_received_at_ms(
        number: u64,
        hash: B256,
        parent_hash: B256,
        is_new_block: bool,
        received_at_ms: u64,
    ) -> Self {
        Self { number, hash, parent_hash, is_new_block, received_at_ms }
    }

    /// Milliseconds since the Unix epoch at which this block was received.
    pub fn received_at_ms(&self) -> u64 {
        self.received_at_ms
    }

    /// Elapsed time since this block was received.
    pub fn time_since_receiving(&self) -> Duration {
        Duration::from_millis(now_ms().saturating_sub(self.received_at_ms))
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_since_receiving_reflects_elapsed_wall_clock() {
        let past = now_ms() - 1_000;
        let wrapper = BlockWrapper::with_received_at_ms(1, B256::ZERO, B256::ZERO, false, past);
        assert!(wrapper.time_since_receiving() >= Duration::from_millis(1_000));
    }
}
