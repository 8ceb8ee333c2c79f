use crate::channel::Channel;
use bytes::Bytes;
use chainsync_network_api::{ConnectionFacade, DiscoveryHandle, SyncPeerPool};
use chainsync_primitives::NodeId;
use chainsync_tasks::TaskSpawner;
use parking_lot::{Mutex, RwLock};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tracing::debug;

const MAIN_WORKER_INTERVAL: Duration = Duration::from_secs(1);
const RECONNECT_WORKER_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct DisconnectState {
    disconnected_ids: HashSet<NodeId>,
    reconnected_ids: HashSet<NodeId>,
}

/// Supervises every peer channel: promotes handshaked peers from `new_peers` into
/// `active_peers`, broadcasts transactions, and runs the disconnect/reconnect bookkeeping.
pub struct ChannelManager {
    new_peers: RwLock<Vec<Channel>>,
    active_peers: RwLock<Vec<Channel>>,
    disconnects: Mutex<DisconnectState>,
    sync: Arc<dyn SyncPeerPool>,
    discovery: Arc<dyn DiscoveryHandle>,
    facade: Arc<dyn ConnectionFacade>,
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("new_peers", &self.new_peers.read().len())
            .field("active_peers", &self.active_peers.read().len())
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Builds a manager over the given collaborators. Callers spawn its periodic workers
    /// separately via [`ChannelManager::spawn_workers`].
    pub fn new(
        sync: Arc<dyn SyncPeerPool>,
        discovery: Arc<dyn DiscoveryHandle>,
        facade: Arc<dyn ConnectionFacade>,
    ) -> Arc<Self> {
        Arc::new(Self {
            new_peers: RwLock::new(Vec::new()),
            active_peers: RwLock::new(Vec::new()),
            disconnects: Mutex::new(DisconnectState::default()),
            sync,
            discovery,
            facade,
        })
    }

    /// Admits a freshly-opened, not-yet-handshaked channel.
    pub fn add_channel(&self, channel: Channel) {
        self.new_peers.write().push(channel);
    }

    /// A snapshot of the currently active (handshaked, handed-to-sync) channels.
    pub fn active_peers(&self) -> Vec<Channel> {
        self.active_peers.read().clone()
    }

    /// Broadcasts `tx` to every active peer.
    pub fn send_transaction(&self, tx: Bytes) {
        for channel in self.active_peers.read().iter() {
            channel.eth_handler().send_transaction(tx.clone());
        }
    }

    /// Reacts to a channel's disconnect. A repeated disconnect notification for the same channel
    /// (e.g. a duplicated I/O callback) is ignored. A channel that never made it into
    /// `active_peers` (its handshake never completed) is also ignored. A peer disconnecting for
    /// the second time after already being reconnected once is dropped for good instead of
    /// queued again.
    pub fn notify_disconnect(&self, channel: &Channel) {
        if !channel.mark_disconnected() {
            debug!(target: "net::channel", peer = %channel.remote_id(), "ignoring duplicate disconnect notification");
            return;
        }

        let removed = {
            let mut active = self.active_peers.write();
            let before = active.len();
            active.retain(|c| c.remote_id() != channel.remote_id());
            before != active.len()
        };
        if !removed {
            return;
        }

        channel.eth_handler().on_disconnect();
        self.sync.remove_peer(channel.eth_handler());

        let remote_id = channel.remote_id();
        let mut state = self.disconnects.lock();
        if state.reconnected_ids.remove(&remote_id) {
            debug!(
                target: "net::channel",
                peer = %remote_id,
                "peer disconnected after its one free reconnect, dropping permanently"
            );
        } else {
            state.disconnected_ids.insert(remote_id);
        }
    }

    /// Spawns the main worker and the reconnect worker through `spawner`. `self` must already be
    /// held behind an `Arc`.
    pub fn spawn_workers(self: &Arc<Self>, spawner: &dyn TaskSpawner) {
        let main = Arc::clone(self);
        spawner.spawn(Box::pin(async move {
            let mut ticker = tokio::time::interval(MAIN_WORKER_INTERVAL);
            loop {
                ticker.tick().await;
                main.run_main_tick();
            }
        }));

        let reconnect = Arc::clone(self);
        spawner.spawn(Box::pin(async move {
            let mut ticker = tokio::time::interval(RECONNECT_WORKER_INTERVAL);
            loop {
                ticker.tick().await;
                reconnect.run_reconnect_tick();
            }
        }));
    }

    /// Promotes every init-passed channel out of `new_peers`: useful, handshake-succeeded
    /// channels are handed to the sync pool and pushed into `active_peers`; the rest are simply
    /// dropped (their handshake resolved negatively or they turned out not to be useful).
    fn run_main_tick(&self) {
        // Held for the whole drain so a `Channel` appended by `add_channel` from another thread
        // between a read and a later write can't be silently dropped.
        let promoted: Vec<Channel> = {
            let mut new_peers = self.new_peers.write();
            let (promoted, remaining): (Vec<Channel>, Vec<Channel>) =
                new_peers.iter().cloned().partition(|c| c.eth_handler().has_init_passed());
            *new_peers = remaining;
            promoted
        };

        for channel in promoted {
            let handler = channel.eth_handler();
            if handler.is_useful() && handler.has_status_succeeded() {
                self.sync.add_peer(Arc::clone(handler));
                self.active_peers.write().push(channel);
            }
        }
    }

    /// Drains `disconnected_ids`, requests a reconnect for each via discovery + the connection
    /// facade, and moves them all into `reconnected_ids` so a second disconnect drops them.
    fn run_reconnect_tick(&self) {
        let pending: Vec<NodeId> = {
            let mut state = self.disconnects.lock();
            let pending: Vec<NodeId> = state.disconnected_ids.drain().collect();
            state.reconnected_ids.extend(pending.iter().copied());
            pending
        };

        for id in pending {
            match self.discovery.find_by_id(&id) {
                Some(node) => {
                    self.facade.connect(&node);
                    metrics::counter!("channel_reconnect_attempts").increment(1);
                }
                None => debug!(target: "net::channel", peer = %id, "reconnect target no longer known to discovery"),
            }
        }
    }
}
