use crate::HashStore;
use chainsync_network_api::{
    ChainTipProvider, ConnectionFacade, DiscoveryHandle, DiscoveryListener, NodeHandler, PeerClient, SyncPeerPool,
};
use chainsync_primitives::{BlockWrapper, NodeId, SyncConfig, SyncState, B256, U256};
use chainsync_tasks::TaskSpawner;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::block_queue::BlockQueue;

const PERIODIC_WORKER_INTERVAL: Duration = Duration::from_secs(3);
const LOG_WORKER_INTERVAL: Duration = Duration::from_secs(30);

/// `|a - b| <= 0.2 * max(a, b)`, the "materially better chain" predicate used by `add_peer` and
/// the discovery subscription.
fn within_twenty_percent(a: U256, b: U256) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let diff = hi - lo;
    diff.checked_mul(U256::from(5u64)).is_some_and(|scaled| scaled <= hi)
}

/// First-occurrence-wins max-by-total-difficulty, so master election is deterministic when two
/// peers tie.
fn elect_master(peers: &[Arc<dyn PeerClient>]) -> Option<Arc<dyn PeerClient>> {
    let mut best: Option<&Arc<dyn PeerClient>> = None;
    for peer in peers {
        match best {
            Some(current) if peer.total_difficulty() <= current.total_difficulty() => {}
            _ => best = Some(peer),
        }
    }
    best.cloned()
}

#[derive(Debug, Clone, Copy)]
struct StateSlot {
    current: SyncState,
    /// The state immediately preceding the most recent transition.
    prev: SyncState,
    /// The global state in effect just before the most recent entry into `GAP_RECOVERY`, used
    /// only to pick `GAP_RECOVERY`'s exit transition (`BLOCK_RETRIEVING` vs `DONE_GAP_RECOVERY`).
    pre_gap_recovery: SyncState,
}

impl Default for StateSlot {
    fn default() -> Self {
        Self { current: SyncState::Init, prev: SyncState::Init, pre_gap_recovery: SyncState::Init }
    }
}

/// The global sync state machine: elects a master peer, drives hash and block retrieval across
/// the peer pool, detects and recovers chain gaps, and discovers new candidate peers.
///
/// Implements [`SyncPeerPool`] so `ChannelManager` can hand it freshly-promoted peers without
/// depending on this crate directly.
pub struct SyncManager {
    config: SyncConfig,
    queue: Arc<BlockQueue>,
    hash_store: HashStore,
    discovery: Arc<dyn DiscoveryHandle>,
    facade: Arc<dyn ConnectionFacade>,
    chain: Arc<dyn ChainTipProvider>,

    peers: RwLock<Vec<Arc<dyn PeerClient>>>,
    state: Mutex<StateSlot>,
    master: RwLock<Option<Arc<dyn PeerClient>>>,
    /// `best_hash` recorded by `recover_gap` for the gap currently being recovered; consumed the
    /// next time hash retrieval starts on the gap-recovery master.
    gap_best_hash: Mutex<Option<B256>>,
    max_hashes_ask: AtomicU64,
    connect_timestamps: Mutex<HashMap<NodeId, Instant>>,
    /// The floor below which a discovered candidate isn't worth connecting to. `U256` has no
    /// hardware atomic counterpart, so this is a small mutex-guarded cell rather than a true
    /// atomic; it is still only ever written from the periodic worker, resolving the visibility
    /// concern the spec raises about this field.
    lower_useful_difficulty: Mutex<U256>,
    /// Set once, shortly after construction, from a background check of
    /// [`BlockQueue::sync_was_interrupted`].
    sync_was_interrupted: AtomicBool,
    sync_done_tx: broadcast::Sender<()>,
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("state", &self.state.lock().current)
            .field("peers", &self.peers.read().len())
            .finish_non_exhaustive()
    }
}

impl SyncManager {
    /// Builds a manager over the given collaborators. Callers spawn its periodic workers and
    /// discovery subscription separately via [`SyncManager::spawn_workers`].
    pub fn new(
        config: SyncConfig,
        queue: Arc<BlockQueue>,
        discovery: Arc<dyn DiscoveryHandle>,
        facade: Arc<dyn ConnectionFacade>,
        chain: Arc<dyn ChainTipProvider>,
    ) -> Arc<Self> {
        let (sync_done_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            queue,
            hash_store: HashStore::new(),
            discovery,
            facade,
            chain,
            peers: RwLock::new(Vec::new()),
            state: Mutex::new(StateSlot::default()),
            master: RwLock::new(None),
            gap_best_hash: Mutex::new(None),
            max_hashes_ask: AtomicU64::new(0),
            connect_timestamps: Mutex::new(HashMap::new()),
            lower_useful_difficulty: Mutex::new(U256::ZERO),
            sync_was_interrupted: AtomicBool::new(false),
            sync_done_tx,
        })
    }

    /// Subscribes to sync-done notifications (emitted once, when `change_state(DONE_SYNC)`
    /// first runs).
    pub fn subscribe_sync_done(&self) -> broadcast::Receiver<()> {
        self.sync_done_tx.subscribe()
    }

    /// The current global sync state.
    pub fn state(&self) -> SyncState {
        self.state.lock().current
    }

    /// A snapshot of the current peer pool.
    pub fn peers(&self) -> Vec<Arc<dyn PeerClient>> {
        self.peers.read().clone()
    }

    /// Invoked by the importer when a block's parent is missing locally.
    ///
    /// Small gaps just prepend the parent hash to the hash store so it is fetched next; gaps
    /// larger than [`SyncConfig::large_gap_threshold`] escalate to a dedicated `GAP_RECOVERY`
    /// pass bounded to the gap's size.
    pub fn recover_gap(&self, wrapper: &BlockWrapper) {
        let current = self.state();
        if current == SyncState::GapRecovery {
            debug!(target: "sync", block = wrapper.number, "gap recovery already in progress, postponing");
            return;
        }

        if wrapper.is_new_block {
            let hash_store_empty_during_block_retrieving =
                current == SyncState::BlockRetrieving && self.hash_store.is_empty();
            let allowed = hash_store_empty_during_block_retrieving
                || current == SyncState::DoneSync
                || current == SyncState::DoneGapRecovery;
            if !allowed {
                debug!(
                    target: "sync",
                    block = wrapper.number,
                    ?current,
                    "postponing gap recovery for a newly announced block outside an eligible state"
                );
                return;
            }
        }

        let best_number = self.chain.best_block_number();
        let gap = wrapper.number.saturating_sub(best_number);

        if gap > self.config.large_gap_threshold {
            let max_hashes_ask = gap.min(self.config.max_hashes_ask);
            self.max_hashes_ask.store(max_hashes_ask, Ordering::Relaxed);
            *self.gap_best_hash.lock() = Some(wrapper.hash);
            info!(target: "sync", gap, max_hashes_ask, "large gap detected, entering gap recovery");
            self.change_state(SyncState::GapRecovery);
        } else {
            self.hash_store.push_front(wrapper.parent_hash);
        }
    }

    /// Invoked by the importer once a block has been successfully imported. If the block was
    /// received recently enough, this is taken as evidence that live sync has caught up.
    pub fn notify_new_block_imported(&self, wrapper: &BlockWrapper) {
        let current = self.state();
        if current == SyncState::DoneSync || current == SyncState::GapRecovery {
            return;
        }
        if wrapper.time_since_receiving() <= self.config.time_to_import_threshold {
            self.change_state(SyncState::DoneSync);
        }
    }

    /// The single mutator of the global sync state; applies the entry effects for `new_state`
    /// and records `prev`/`pre_gap_recovery` bookkeeping.
    fn change_state(&self, new_state: SyncState) {
        let prev = {
            let mut slot = self.state.lock();
            if slot.current == SyncState::DoneSync && new_state != SyncState::DoneSync {
                return;
            }
            let prev = slot.current;
            slot.prev = prev;
            if new_state == SyncState::GapRecovery {
                slot.pre_gap_recovery = prev;
            }
            slot.current = new_state;
            prev
        };

        metrics::gauge!("sync_state").set(new_state as u8 as f64);

        match new_state {
            SyncState::HashRetrieving => self.enter_hash_retrieving(prev),
            SyncState::BlockRetrieving => self.put_peers_in(SyncState::BlockRetrieving),
            SyncState::GapRecovery => self.enter_gap_recovery(),
            SyncState::DoneGapRecovery => self.put_peers_in(SyncState::BlockRetrieving),
            SyncState::DoneSync => self.enter_done_sync(),
            SyncState::Init | SyncState::Idle => {}
        }
    }

    fn put_peers_in(&self, state: SyncState) {
        for peer in self.peers.read().iter() {
            peer.change_state(state);
        }
    }

    fn enter_hash_retrieving(&self, prev_state: SyncState) {
        let peers = self.peers.read().clone();
        self.hash_store.clear();
        self.put_peers_in(SyncState::Idle);
        self.max_hashes_ask.store(self.config.max_hashes_ask, Ordering::Relaxed);

        if let Some(master) = elect_master(&peers) {
            self.hash_store.set_highest_td(master.total_difficulty());
            *self.master.write() = Some(Arc::clone(&master));
            self.start_hash_retrieval(&master, master.best_hash());
        }

        // Resolves the open question in the sync spec about recursing into BLOCK_RETRIEVING when
        // a previous sync was interrupted: the recursive transition runs last, so its effects
        // (all peers into BLOCK_RETRIEVING) are the ones that stick, rather than being
        // immediately undone by the HASH_RETRIEVING entry effects above.
        if prev_state == SyncState::Init && self.sync_was_interrupted.load(Ordering::Relaxed) {
            info!(target: "sync", "resuming interrupted sync directly into block retrieval");
            self.change_state(SyncState::BlockRetrieving);
        }
    }

    fn enter_gap_recovery(&self) {
        let peers = self.peers.read().clone();
        let Some(master) = elect_master(&peers) else {
            warn!(target: "sync", "gap recovery requested with no peers available to elect a master");
            return;
        };
        *self.master.write() = Some(Arc::clone(&master));
        let start = (*self.gap_best_hash.lock()).unwrap_or_else(|| master.best_hash());
        self.start_hash_retrieval(&master, start);
    }

    fn start_hash_retrieval(&self, master: &Arc<dyn PeerClient>, start: B256) {
        let max = self.max_hashes_ask.load(Ordering::Relaxed);
        master.set_max_hashes_ask(max);
        master.change_state(SyncState::HashRetrieving);
        master.request_hashes(start);
    }

    fn enter_done_sync(&self) {
        self.put_peers_in(SyncState::DoneSync);
        let _ = self.sync_done_tx.send(());
        info!(target: "sync", "sync done");
    }

    /// Applies the `HASH_RETRIEVING -> BLOCK_RETRIEVING` and `GAP_RECOVERY -> *` transitions once
    /// the current master reports it has no more hashes to offer.
    fn check_master(&self) {
        let current = self.state();
        let Some(master) = self.master.read().clone() else { return };
        if !master.is_hash_retrieving_done() {
            return;
        }

        match current {
            SyncState::HashRetrieving => self.change_state(SyncState::BlockRetrieving),
            SyncState::GapRecovery => {
                let pre_gap = self.state.lock().pre_gap_recovery;
                if pre_gap == SyncState::BlockRetrieving {
                    self.change_state(SyncState::BlockRetrieving);
                } else {
                    self.change_state(SyncState::DoneGapRecovery);
                }
            }
            _ => {}
        }
    }

    /// Evicts peers that have exhausted the blocks they can serve, advances
    /// `lower_useful_difficulty`, and pushes any now-idle peers back to work if there is still
    /// something in the hash store for them to fetch.
    fn check_peers(&self) {
        let mut evicted = Vec::new();
        {
            let mut peers = self.peers.write();
            let mut lower = self.lower_useful_difficulty.lock();
            let mut i = 0;
            while i < peers.len() {
                if peers[i].has_no_more_blocks() {
                    let peer = peers.remove(i);
                    if peer.total_difficulty() > *lower {
                        *lower = peer.total_difficulty();
                    }
                    evicted.push(peer);
                } else {
                    i += 1;
                }
            }
            let local_td = self.chain.total_difficulty();
            if local_td > *lower {
                *lower = local_td;
            }
        }
        for peer in &evicted {
            peer.change_state(SyncState::Idle);
            self.connect_timestamps.lock().remove(&peer.peer_id());
        }

        let current = self.state();
        let keep_peers_busy = matches!(
            current,
            SyncState::BlockRetrieving | SyncState::DoneSync | SyncState::DoneGapRecovery
        );
        if keep_peers_busy && !self.hash_store.is_empty() {
            for peer in self.peers.read().iter() {
                if peer.is_idle() {
                    peer.change_state(SyncState::BlockRetrieving);
                }
            }
        }
    }

    /// Drops connect-timestamp entries older than [`SyncConfig::connection_timeout`].
    fn remove_outdated_connections(&self) {
        let timeout = self.config.connection_timeout;
        self.connect_timestamps.lock().retain(|_, started_at| started_at.elapsed() <= timeout);
    }

    /// Tops the peer pool back up to [`SyncConfig::peers_count`] by asking discovery for
    /// candidates better than `lower_useful_difficulty` that aren't already active or pending.
    fn ask_new_peers(&self) {
        let have = self.peers.read().len();
        if have >= self.config.peers_count {
            return;
        }
        let need = self.config.peers_count - have;

        let active_ids: std::collections::HashSet<NodeId> =
            self.peers.read().iter().map(|p| p.peer_id()).collect();
        let pending_ids: std::collections::HashSet<NodeId> =
            self.connect_timestamps.lock().keys().copied().collect();
        let lower = *self.lower_useful_difficulty.lock();

        let predicate: chainsync_network_api::NodePredicate =
            Arc::new(|node: &NodeHandler| node.last_inbound_status.is_some());
        let comparator: chainsync_network_api::NodeComparator =
            Arc::new(|a: &NodeHandler, b: &NodeHandler| b.total_difficulty().cmp(&a.total_difficulty()));

        let candidates = self.discovery.get_nodes(predicate, comparator, usize::MAX);
        let selected = candidates
            .into_iter()
            .filter(|node| !active_ids.contains(&node.node_id) && !pending_ids.contains(&node.node_id))
            .filter(|node| node.total_difficulty().is_some_and(|td| td > lower))
            .take(need);

        for node in selected {
            self.initiate_connection(&node);
        }
    }

    /// Requests an outbound connection to `node`, guarded by `connect_timestamps` so a node
    /// already being connected to isn't asked twice.
    fn initiate_connection(&self, node: &NodeHandler) {
        let mut timestamps = self.connect_timestamps.lock();
        if timestamps.contains_key(&node.node_id) {
            return;
        }
        timestamps.insert(node.node_id, Instant::now());
        drop(timestamps);
        self.facade.connect(node);
    }

    /// Emits per-peer sync stats and refreshes the sync gauges; no behavioral effect.
    async fn log_and_report(&self) {
        let peers = self.peers.read().clone();
        for peer in &peers {
            peer.log_sync_stats();
        }
        metrics::gauge!("sync_peers_count").set(peers.len() as f64);
        if let Ok(size) = self.queue.size().await {
            metrics::gauge!("block_queue_size").set(size as f64);
        }
        info!(target: "sync", state = ?self.state(), peers = peers.len(), "sync status");
    }

    /// Spawns the 3s periodic worker, the 30s log/metrics worker, and subscribes this manager to
    /// discovery notifications, through `spawner`. `self` must already be held behind an `Arc`.
    pub fn spawn_workers(self: &Arc<Self>, spawner: &dyn TaskSpawner) {
        let init_check = Arc::clone(self);
        spawner.spawn(Box::pin(async move {
            match init_check.queue.sync_was_interrupted().await {
                Ok(interrupted) => init_check.sync_was_interrupted.store(interrupted, Ordering::Relaxed),
                Err(error) => warn!(target: "sync", %error, "failed to determine whether sync was interrupted"),
            }
        }));

        let periodic = Arc::clone(self);
        spawner.spawn(Box::pin(async move {
            let mut ticker = tokio::time::interval(PERIODIC_WORKER_INTERVAL);
            loop {
                ticker.tick().await;
                periodic.check_master();
                periodic.check_peers();
                periodic.remove_outdated_connections();
                periodic.ask_new_peers();
            }
        }));

        let logger = Arc::clone(self);
        spawner.spawn(Box::pin(async move {
            let mut ticker = tokio::time::interval(LOG_WORKER_INTERVAL);
            loop {
                ticker.tick().await;
                logger.log_and_report().await;
            }
        }));

        let listener: Arc<dyn DiscoveryListener> = Arc::clone(self) as Arc<dyn DiscoveryListener>;
        let predicate: chainsync_network_api::NodePredicate = {
            let hash_store_owner = Arc::clone(self);
            Arc::new(move |node: &NodeHandler| match node.total_difficulty() {
                Some(td) => match hash_store_owner.hash_store.highest_td() {
                    Some(highest) => td > highest,
                    None => true,
                },
                None => false,
            })
        };
        self.discovery.add_discover_listener(listener, predicate);
    }
}

impl DiscoveryListener for SyncManager {
    fn node_appeared(&self, node: NodeHandler) {
        self.initiate_connection(&node);
    }
}

impl SyncPeerPool for SyncManager {
    /// Admits `peer`, electing it onto a better chain's hash-retrieval pass if its total
    /// difficulty is materially ahead of what's currently tracked.
    fn add_peer(&self, peer: Arc<dyn PeerClient>) {
        if self.state() == SyncState::DoneSync {
            return;
        }
        self.connect_timestamps.lock().remove(&peer.peer_id());

        let local_td = self.chain.total_difficulty();
        if peer.total_difficulty() <= local_td {
            debug!(target: "sync", peer = ?peer.peer_id(), "skipping peer with insufficient total difficulty");
            return;
        }

        self.peers.write().push(Arc::clone(&peer));

        let highest_known = self.hash_store.highest_td();
        let materially_better = match highest_known {
            Some(highest) => !within_twenty_percent(peer.total_difficulty(), highest),
            None => true,
        };

        if materially_better {
            self.change_state(SyncState::HashRetrieving);
        } else if self.state() == SyncState::BlockRetrieving {
            peer.change_state(SyncState::BlockRetrieving);
        }
    }

    /// Removes `peer` from the pool. A no-op once sync is done.
    fn remove_peer(&self, peer: &Arc<dyn PeerClient>) {
        if self.state() == SyncState::DoneSync {
            return;
        }
        self.connect_timestamps.lock().remove(&peer.peer_id());
        peer.change_state(SyncState::Idle);
        self.peers.write().retain(|p| p.peer_id() != peer.peer_id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bytes::Bytes;
    use chainsync_network_api::NodeComparator as NodeComparatorTy;
    use chainsync_primitives::Status;
    use chainsync_tasks::TokioTaskExecutor;
    use parking_lot::Mutex as PlMutex;
    use std::sync::atomic::{AtomicBool as PlAtomicBool, AtomicU64 as PlAtomicU64};

    #[derive(Debug, Default)]
    struct TestPeer {
        id: [u8; 64],
        total_difficulty: U256,
        best_hash: B256,
        state: PlMutex<SyncState>,
        max_hashes_ask: PlAtomicU64,
        hash_retrieving_done: PlAtomicBool,
        no_more_blocks: PlAtomicBool,
        requested: PlMutex<Vec<B256>>,
    }

    impl TestPeer {
        fn new(id: u8, td: u64) -> Arc<Self> {
            Arc::new(Self {
                id: [id; 64],
                total_difficulty: U256::from(td),
                best_hash: B256::repeat_byte(id),
                ..Default::default()
            })
        }
    }

    impl PeerClient for TestPeer {
        fn peer_id(&self) -> NodeId {
            NodeId::new(self.id)
        }
        fn best_hash(&self) -> B256 {
            self.best_hash
        }
        fn total_difficulty(&self) -> U256 {
            self.total_difficulty
        }
        fn handshake_status(&self) -> Option<Status> {
            Some(Status { total_difficulty: self.total_difficulty, best_hash: self.best_hash })
        }
        fn sync_state(&self) -> SyncState {
            *self.state.lock()
        }
        fn change_state(&self, state: SyncState) {
            *self.state.lock() = state;
        }
        fn set_max_hashes_ask(&self, max: u64) {
            self.max_hashes_ask.store(max, Ordering::Relaxed);
        }
        fn is_hash_retrieving_done(&self) -> bool {
            self.hash_retrieving_done.load(Ordering::Relaxed)
        }
        fn has_no_more_blocks(&self) -> bool {
            self.no_more_blocks.load(Ordering::Relaxed)
        }
        fn is_useful(&self) -> bool {
            true
        }
        fn has_init_passed(&self) -> bool {
            true
        }
        fn request_hashes(&self, start: B256) {
            self.requested.lock().push(start);
        }
        fn request_blocks(&self, _hashes: Vec<B256>) {}
        fn send_transaction(&self, _tx: Bytes) {}
        fn log_sync_stats(&self) {}
        fn on_disconnect(&self) {}
    }

    #[derive(Debug, Default)]
    struct NullDiscovery;
    impl DiscoveryHandle for NullDiscovery {
        fn add_discover_listener(
            &self,
            _listener: Arc<dyn DiscoveryListener>,
            _predicate: chainsync_network_api::NodePredicate,
        ) {
        }
        fn get_nodes(
            &self,
            _predicate: chainsync_network_api::NodePredicate,
            _comparator: NodeComparatorTy,
            _limit: usize,
        ) -> Vec<NodeHandler> {
            Vec::new()
        }
        fn find_by_id(&self, _id: &NodeId) -> Option<NodeHandler> {
            None
        }
    }
    impl ConnectionFacade for NullDiscovery {
        fn connect(&self, _node: &NodeHandler) {}
    }

    struct FixedChain(U256, u64);
    impl ChainTipProvider for FixedChain {
        fn total_difficulty(&self) -> U256 {
            self.0
        }
        fn best_block_number(&self) -> u64 {
            self.1
        }
    }

    async fn manager(local_td: u64, best_number: u64) -> Arc<SyncManager> {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::default();
        let queue = BlockQueue::open(dir.path(), &config, &TokioTaskExecutor);
        let discovery = Arc::new(NullDiscovery);
        let chain = Arc::new(FixedChain(U256::from(local_td), best_number));
        SyncManager::new(config, queue, discovery.clone(), discovery, chain)
    }

    #[tokio::test]
    async fn admits_better_peer_and_elects_it_master() {
        let sync = manager(100, 0).await;
        let peer = TestPeer::new(1, 500);
        sync.add_peer(peer.clone());

        assert_eq!(sync.peers().len(), 1);
        assert_matches!(sync.state(), SyncState::HashRetrieving);
        assert_eq!(peer.requested.lock().as_slice(), &[peer.best_hash]);
    }

    #[tokio::test]
    async fn rejects_peer_with_insufficient_difficulty() {
        let sync = manager(1_000, 0).await;
        let peer = TestPeer::new(1, 100);
        sync.add_peer(peer);
        assert!(sync.peers().is_empty());
        assert_eq!(sync.state(), SyncState::Init);
    }

    #[tokio::test]
    async fn peer_within_twenty_percent_joins_block_retrieving_without_a_state_change() {
        let sync = manager(100, 0).await;
        let first = TestPeer::new(1, 2_000);
        sync.add_peer(first.clone());
        first.hash_retrieving_done.store(true, Ordering::Relaxed);
        sync.check_master();
        assert_eq!(sync.state(), SyncState::BlockRetrieving);

        let second = TestPeer::new(2, 2_100); // within 20% of 2000
        sync.add_peer(second.clone());
        assert_eq!(sync.state(), SyncState::BlockRetrieving);
        assert_eq!(second.sync_state(), SyncState::BlockRetrieving);
    }

    #[tokio::test]
    async fn small_gap_pushes_parent_hash_without_a_state_change() {
        let sync = manager(0, 10).await;
        let wrapper = BlockWrapper::new(13, B256::repeat_byte(9), B256::repeat_byte(8), false);
        sync.recover_gap(&wrapper);
        assert_eq!(sync.state(), SyncState::Init);
        assert_eq!(sync.hash_store.pop_front(), Some(B256::repeat_byte(8)));
    }

    #[tokio::test]
    async fn large_gap_enters_gap_recovery_with_capped_max_hashes_ask() {
        let mut config = SyncConfig::default();
        config.max_hashes_ask = 100;
        let dir = tempfile::tempdir().unwrap();
        let queue = BlockQueue::open(dir.path(), &config, &TokioTaskExecutor);
        let discovery = Arc::new(NullDiscovery);
        let chain = Arc::new(FixedChain(U256::ZERO, 10));
        let sync = SyncManager::new(config, queue, discovery.clone(), discovery, chain);

        let master = TestPeer::new(1, 500);
        sync.add_peer(master.clone());

        let wrapper = BlockWrapper::new(20, B256::repeat_byte(9), B256::repeat_byte(8), false);
        sync.recover_gap(&wrapper);

        assert_matches!(sync.state(), SyncState::GapRecovery);
        assert_eq!(sync.max_hashes_ask.load(Ordering::Relaxed), 10);
    }

    #[tokio::test]
    async fn gap_exactly_at_threshold_does_not_escalate() {
        let sync = manager(0, 10).await;
        let master = TestPeer::new(1, 500);
        sync.add_peer(master);
        let wrapper = BlockWrapper::new(15, B256::repeat_byte(9), B256::repeat_byte(8), false);
        sync.recover_gap(&wrapper);
        assert_eq!(sync.state(), SyncState::HashRetrieving);
    }

    #[tokio::test]
    async fn notify_new_block_imported_within_threshold_marks_done() {
        let sync = manager(0, 0).await;
        let peer = TestPeer::new(1, 500);
        sync.add_peer(peer);
        let wrapper = BlockWrapper::new(1, B256::ZERO, B256::ZERO, false);
        sync.notify_new_block_imported(&wrapper);
        assert_matches!(sync.state(), SyncState::DoneSync);
    }

    #[tokio::test]
    async fn done_sync_locks_out_further_peer_admission() {
        let sync = manager(0, 0).await;
        let wrapper = BlockWrapper::new(1, B256::ZERO, B256::ZERO, false);
        sync.notify_new_block_imported(&wrapper);
        assert_eq!(sync.state(), SyncState::DoneSync);

        let late_peer = TestPeer::new(9, 999);
        sync.add_peer(late_peer);
        assert!(sync.peers().is_empty());
    }

    #[tokio::test]
    async fn remove_peer_clears_it_from_the_pool() {
        let sync = manager(0, 0).await;
        let peer = TestPeer::new(1, 500);
        sync.add_peer(peer.clone());
        assert_eq!(sync.peers().len(), 1);

        let as_trait: Arc<dyn PeerClient> = peer.clone();
        sync.remove_peer(&as_trait);
        assert!(sync.peers().is_empty());
        assert_eq!(peer.sync_state(), SyncState::Idle);
    }
}
