//! Trait contracts for the collaborators the chain-sync core consumes but does not implement:
//! the per-peer session object, the discovery service, and the facade that opens outbound
//! connections. Concrete implementations live outside this workspace (RLPx framing, discv4/
//! discv5) or in `chainsync-network` for the parts this core does own.

#![warn(missing_docs, unreachable_pub, rust_2018_idioms)]

use bytes::Bytes;
use chainsync_primitives::{NodeId, Status, SyncState, B256, U256};
use std::{fmt, sync::Arc};

/// Capabilities a per-peer session object must provide.
///
/// One object plays this role for both `SyncManager` (chain-state, commands) and
/// `ChannelManager` (lifecycle predicates); `chainsync-network`'s `PeerHandle` is the concrete
/// implementation.
pub trait PeerClient: Send + Sync + fmt::Debug {
    /// The peer's 64-byte node identifier.
    fn peer_id(&self) -> NodeId;

    /// The best block hash this peer advertised at handshake.
    fn best_hash(&self) -> B256;

    /// This peer's claimed cumulative chain difficulty.
    fn total_difficulty(&self) -> U256;

    /// The `Status` message received at handshake, if the handshake has completed.
    fn handshake_status(&self) -> Option<Status>;

    /// This peer's current sync sub-state.
    fn sync_state(&self) -> SyncState;

    /// Transitions this peer into a new sync sub-state.
    fn change_state(&self, state: SyncState);

    /// The ceiling on hashes requested per hash-retrieval round trip.
    fn set_max_hashes_ask(&self, max: u64);

    /// `true` if this peer is not currently assigned any sync responsibility.
    fn is_idle(&self) -> bool {
        self.sync_state() == SyncState::Idle
    }

    /// `true` once this peer has no further hashes to offer during hash retrieval.
    fn is_hash_retrieving_done(&self) -> bool;

    /// `true` once this peer has exhausted the blocks it can serve for the current round.
    fn has_no_more_blocks(&self) -> bool;

    /// `true` once this peer's handshake `Status` has arrived successfully.
    fn has_status_succeeded(&self) -> bool {
        self.handshake_status().is_some()
    }

    /// `true` if this peer is worth handing to `SyncManager` at all (e.g. advertises a chain at
    /// least as good as ours).
    fn is_useful(&self) -> bool;

    /// `true` once the RLPx/eth handshake has completed, independent of usefulness.
    fn has_init_passed(&self) -> bool;

    /// Requests hashes starting from `start`, capped at this peer's configured max.
    fn request_hashes(&self, start: B256);

    /// Requests full block bodies for the given hashes.
    fn request_blocks(&self, hashes: Vec<B256>);

    /// Forwards a transaction to this peer.
    fn send_transaction(&self, tx: Bytes);

    /// Emits this peer's current sync statistics to the logging/metrics backend.
    fn log_sync_stats(&self);

    /// Called once when this peer disconnects, to release any held resources.
    fn on_disconnect(&self);
}

/// A snapshot of the node-statistics store's view of one peer: its last inbound handshake
/// status plus its identifier. `NodeStatistics`/`Node`/`NodeHandler` in the spec are folded into
/// this one struct since the core never needs more than this from them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeHandler {
    /// The node's identifier.
    pub node_id: NodeId,
    /// The last `Status` message received from this node on an inbound connection, if any.
    pub last_inbound_status: Option<Status>,
}

impl NodeHandler {
    /// Builds a handler snapshot.
    pub fn new(node_id: NodeId, last_inbound_status: Option<Status>) -> Self {
        Self { node_id, last_inbound_status }
    }

    /// The node's last-known total difficulty, if it has ever sent an inbound status.
    pub fn total_difficulty(&self) -> Option<U256> {
        self.last_inbound_status.as_ref().map(|s| s.total_difficulty)
    }
}

/// A predicate over a candidate node's statistics, used to filter discovery candidates.
///
/// Boxed rather than a bare function pointer because `SyncManager`'s own discovery-listener
/// predicate closes over its live `HashStore` (the "or that value is unknown" half of the
/// subscription predicate in the sync spec needs the current highest known total difficulty,
/// which is per-instance state, not a constant).
pub type NodePredicate = Arc<dyn Fn(&NodeHandler) -> bool + Send + Sync>;

/// A comparator over two candidate nodes, used to rank discovery candidates.
pub type NodeComparator = Arc<dyn Fn(&NodeHandler, &NodeHandler) -> std::cmp::Ordering + Send + Sync>;

/// Receives discovery notifications matching a subscribed predicate.
pub trait DiscoveryListener: Send + Sync {
    /// Called when a node matching the subscribed predicate is (re)discovered.
    fn node_appeared(&self, node: NodeHandler);
}

/// The discovery service's interface, as consumed by `SyncManager`/`ChannelManager`.
///
/// The discovery protocol itself (discv4/discv5, NAT traversal) is out of scope; this trait is
/// the seam a real discovery implementation plugs into.
pub trait DiscoveryHandle: Send + Sync {
    /// Subscribes `listener` to nodes matching `predicate` as they are (re)discovered.
    fn add_discover_listener(&self, listener: std::sync::Arc<dyn DiscoveryListener>, predicate: NodePredicate);

    /// Returns up to `limit` known nodes matching `predicate`, ordered by `comparator`.
    fn get_nodes(&self, predicate: NodePredicate, comparator: NodeComparator, limit: usize) -> Vec<NodeHandler>;

    /// Looks up a known node by id.
    fn find_by_id(&self, id: &NodeId) -> Option<NodeHandler>;
}

/// The "Ethereum facade" that initiates outbound TCP/RLPx connections, as consumed by
/// `SyncManager`. Fire-and-forget: the connection's outcome surfaces later as a call to
/// `ChannelManager::add_channel` or simply never arrives (handled by the connect-timeout).
pub trait ConnectionFacade: Send + Sync {
    /// Requests an outbound connection to `node`.
    fn connect(&self, node: &NodeHandler);
}

/// `SyncManager`'s pool, as consumed by `ChannelManager`.
///
/// `ChannelManager` hands a freshly-handshaked, useful peer to this pool once it promotes the
/// peer to `active_peers`, and removes it again on disconnect. Modeling this as a trait (rather
/// than `chainsync-network` depending directly on `chainsync-downloaders`) keeps the two crates
/// from depending on each other.
pub trait SyncPeerPool: Send + Sync {
    /// Admits `peer` into the pool.
    fn add_peer(&self, peer: std::sync::Arc<dyn PeerClient>);

    /// Removes `peer` from the pool.
    fn remove_peer(&self, peer: &std::sync::Arc<dyn PeerClient>);
}

/// The local chain's tip, as consumed by `SyncManager` to judge whether a peer's chain is worth
/// syncing against and to size chain gaps. Block-import validation, state-trie logic and the
/// blockchain database itself are out of scope for this core; this trait is the seam a real
/// blockchain component plugs into.
pub trait ChainTipProvider: Send + Sync {
    /// The local chain's cumulative total difficulty.
    fn total_difficulty(&self) -> U256;

    /// The local chain's current best (highest) block number.
    fn best_block_number(&self) -> u64;
}
