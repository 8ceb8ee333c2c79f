use chainsync_network_api::PeerClient;
use chainsync_primitives::NodeId;
use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

/// One peer connection as seen by `ChannelManager`: the `PeerClient` it hands off to
/// `SyncManager` plus the bookkeeping `ChannelManager` itself needs.
#[derive(Debug, Clone)]
pub struct Channel {
    eth_handler: Arc<dyn PeerClient>,
    disconnected: Arc<AtomicBool>,
}

impl Channel {
    /// Wraps a peer session for supervision by `ChannelManager`.
    pub fn new(eth_handler: Arc<dyn PeerClient>) -> Self {
        Self { eth_handler, disconnected: Arc::new(AtomicBool::new(false)) }
    }

    /// The wrapped peer session, as handed to `SyncManager`.
    pub fn eth_handler(&self) -> &Arc<dyn PeerClient> {
        &self.eth_handler
    }

    /// The peer's node id, used as the reconnect-bookkeeping key.
    pub fn remote_id(&self) -> NodeId {
        self.eth_handler.peer_id()
    }

    /// `true` if `notify_disconnect` has already run for this channel once.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    /// Marks this channel as disconnected. Returns `false` if it was already marked, so callers
    /// can treat a repeated disconnect notification as a no-op.
    pub fn mark_disconnected(&self) -> bool {
        !self.disconnected.swap(true, Ordering::AcqRel)
    }
}
