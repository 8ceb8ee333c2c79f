/// Global and per-peer synchronization state.
///
/// The same enum models both: the `SyncManager`'s single global state, and the sub-state each
/// `PeerHandle` is put into as it is pulled along by the global transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Freshly started; no peers have been admitted yet.
    Init,
    /// Requesting block hashes from the master peer.
    HashRetrieving,
    /// Requesting block bodies, fanned out across the active pool.
    BlockRetrieving,
    /// Recovering a detected gap between the local tip and an observed block.
    GapRecovery,
    /// Gap recovery finished without resuming a prior block-retrieving pass.
    DoneGapRecovery,
    /// Sync has caught up with the network; terminal unless a gap reopens it.
    DoneSync,
    /// Peer-local only: the peer is not currently assigned any sync responsibility.
    Idle,
}

impl SyncState {
    /// Whether this state is the terminal, fully-synced state.
    pub const fn is_done_sync(self) -> bool {
        matches!(self, Self::DoneSync)
    }

    /// Whether this state is actively recovering a chain gap.
    pub const fn is_gap_recovery(self) -> bool {
        matches!(self, Self::GapRecovery)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::Init
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_state_is_init() {
        assert_matches!(SyncState::default(), SyncState::Init);
    }

    #[test]
    fn is_done_sync_and_is_gap_recovery_are_mutually_exclusive() {
        assert!(SyncState::DoneSync.is_done_sync());
        assert!(!SyncState::DoneSync.is_gap_recovery());
        assert!(SyncState::GapRecovery.is_gap_recovery());
        assert!(!SyncState::GapRecovery.is_done_sync());
    }
}
