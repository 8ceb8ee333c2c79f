use bytes::Bytes;
use chainsync_network_api::PeerClient;
use chainsync_primitives::{NodeId, Status, SyncState, B256, U256};
use parking_lot::{Mutex, RwLock};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, info};

/// The outbound side of a peer session: the part of request-hashes/request-blocks/
/// send-transaction that actually needs to put bytes on a connection.
///
/// RLPx framing and message encoding live outside this workspace; a real session object
/// implements this trait and is handed to `PeerHandle` at construction.
pub trait PeerCommandSink: Send + Sync + fmt::Debug {
    /// Sends a `GetBlockHashes`-style request for hashes following `start`, capped at `max`.
    fn request_hashes(&self, start: B256, max: u64);

    /// Sends a `GetBlockBodies`-style request for the given hashes.
    fn request_blocks(&self, hashes: Vec<B256>);

    /// Forwards a transaction to this peer.
    fn send_transaction(&self, tx: Bytes);
}

#[derive(Debug, Default)]
struct PeerFlags {
    hash_retrieving_done: AtomicBool,
    no_more_blocks: AtomicBool,
    useful: AtomicBool,
    init_passed: AtomicBool,
}

/// The concrete per-peer session object: chain state fixed at handshake time, plus the mutable
/// sync bookkeeping `SyncManager`/`ChannelManager` drive through `PeerClient`.
pub struct PeerHandle {
    peer_id: NodeId,
    best_hash: B256,
    total_difficulty: U256,
    sink: Arc<dyn PeerCommandSink>,
    handshake_status: RwLock<Option<Status>>,
    sync_state: Mutex<SyncState>,
    max_hashes_ask: AtomicU64,
    flags: PeerFlags,
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("peer_id", &self.peer_id)
            .field("total_difficulty", &self.total_difficulty)
            .field("sync_state", &*self.sync_state.lock())
            .finish_non_exhaustive()
    }
}

impl PeerHandle {
    /// Builds a handle from the node id and `Status` advertised at handshake, and the sink used
    /// to actually forward commands over the connection.
    pub fn new(peer_id: NodeId, status: Status, sink: Arc<dyn PeerCommandSink>) -> Self {
        Self {
            peer_id,
            best_hash: status.best_hash,
            total_difficulty: status.total_difficulty,
            sink,
            handshake_status: RwLock::new(Some(status)),
            sync_state: Mutex::new(SyncState::default()),
            max_hashes_ask: AtomicU64::new(0),
            flags: PeerFlags::default(),
        }
    }

    /// Marks whether this peer has exhausted the hashes it can offer this round.
    pub fn mark_hash_retrieving_done(&self, done: bool) {
        self.flags.hash_retrieving_done.store(done, Ordering::Relaxed);
    }

    /// Marks whether this peer has exhausted the blocks it can serve this round.
    pub fn mark_no_more_blocks(&self, done: bool) {
        self.flags.no_more_blocks.store(done, Ordering::Relaxed);
    }

    /// Marks whether this peer is worth handing to `SyncManager`.
    pub fn mark_useful(&self, useful: bool) {
        self.flags.useful.store(useful, Ordering::Relaxed);
    }

    /// Marks whether the handshake has fully completed.
    pub fn mark_init_passed(&self, passed: bool) {
        self.flags.init_passed.store(passed, Ordering::Relaxed);
    }
}

impl PeerClient for PeerHandle {
    fn peer_id(&self) -> NodeId {
        self.peer_id
    }

    fn best_hash(&self) -> B256 {
        self.best_hash
    }

    fn total_difficulty(&self) -> U256 {
        self.total_difficulty
    }

    fn handshake_status(&self) -> Option<Status> {
        self.handshake_status.read().clone()
    }

    fn sync_state(&self) -> SyncState {
        *self.sync_state.lock()
    }

    fn change_state(&self, state: SyncState) {
        *self.sync_state.lock() = state;
    }

    fn set_max_hashes_ask(&self, max: u64) {
        self.max_hashes_ask.store(max, Ordering::Relaxed);
    }

    fn is_hash_retrieving_done(&self) -> bool {
        self.flags.hash_retrieving_done.load(Ordering::Relaxed)
    }

    fn has_no_more_blocks(&self) -> bool {
        self.flags.no_more_blocks.load(Ordering::Relaxed)
    }

    fn is_useful(&self) -> bool {
        self.flags.useful.load(Ordering::Relaxed)
    }

    fn has_init_passed(&self) -> bool {
        self.flags.init_passed.load(Ordering::Relaxed)
    }

    fn request_hashes(&self, start: B256) {
        let max = self.max_hashes_ask.load(Ordering::Relaxed);
        self.sink.request_hashes(start, max);
    }

    fn request_blocks(&self, hashes: Vec<B256>) {
        self.sink.request_blocks(hashes);
    }

    fn send_transaction(&self, tx: Bytes) {
        self.sink.send_transaction(tx);
    }

    fn log_sync_stats(&self) {
        debug!(
            target: "sync::peer",
            peer = %self.peer_id,
            state = ?self.sync_state(),
            total_difficulty = %self.total_difficulty,
            "peer sync stats"
        );
    }

    fn on_disconnect(&self) {
        info!(target: "net::peer", peer = %self.peer_id, "peer disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingSink {
        hashes_requested: Mutex<Vec<(B256, u64)>>,
    }

    impl PeerCommandSink for RecordingSink {
        fn request_hashes(&self, start: B256, max: u64) {
            self.hashes_requested.lock().push((start, max));
        }
        fn request_blocks(&self, _hashes: Vec<B256>) {}
        fn send_transaction(&self, _tx: Bytes) {}
    }

    fn status() -> Status {
        Status { total_difficulty: U256::from(100u64), best_hash: B256::repeat_byte(1) }
    }

    #[test]
    fn request_hashes_uses_configured_max() {
        let sink = Arc::new(RecordingSink::default());
        let handle = PeerHandle::new(NodeId::new([0u8; 64]), status(), sink.clone());
        handle.set_max_hashes_ask(192);
        handle.request_hashes(B256::ZERO);
        assert_eq!(sink.hashes_requested.lock().as_slice(), &[(B256::ZERO, 192)]);
    }

    #[test]
    fn flags_default_to_false() {
        let sink = Arc::new(RecordingSink::default());
        let handle = PeerHandle::new(NodeId::new([0u8; 64]), status(), sink);
        assert!(!handle.is_hash_retrieving_done());
        assert!(!handle.has_no_more_blocks());
        assert!(!handle.is_useful());
        assert!(!handle.has_init_passed());
        assert!(handle.is_idle());
        assert!(handle.has_status_succeeded());
    }
}
