//! Composition root for the chain-sync core: wires [`ChannelManager`] and [`SyncManager`] over a
//! [`BlockQueue`], and starts their periodic workers on the ambient tokio runtime.
//!
//! RLPx session I/O, discv4/discv5 discovery and outbound connection dialing live outside this
//! workspace (see `chainsync-network-api`'s trait docs); this binary stands in minimal,
//! always-idle implementations of those seams so the sync core runs standalone. An embedding
//! application replaces [`NullDiscovery`] and [`NullChainTip`] with its real network stack and
//! blockchain provider.

use chainsync_network::ChannelManager;
use chainsync_network_api::{
    ChainTipProvider, ConnectionFacade, DiscoveryHandle, DiscoveryListener, NodeComparator, NodeHandler, NodePredicate,
};
use chainsync_primitives::{NodeId, SyncConfig, U256};
use chainsync_downloaders::{BlockQueue, SyncManager};
use chainsync_tasks::TokioTaskExecutor;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// A discovery service with no peers to offer. Stands in for discv4/discv5 until a real
/// implementation is wired in by the embedding application.
#[derive(Debug, Default)]
struct NullDiscovery;

impl DiscoveryHandle for NullDiscovery {
    fn add_discover_listener(&self, _listener: Arc<dyn DiscoveryListener>, _predicate: NodePredicate) {}

    fn get_nodes(&self, _predicate: NodePredicate, _comparator: NodeComparator, _limit: usize) -> Vec<NodeHandler> {
        Vec::new()
    }

    fn find_by_id(&self, _id: &NodeId) -> Option<NodeHandler> {
        None
    }
}

impl ConnectionFacade for NullDiscovery {
    fn connect(&self, _node: &NodeHandler) {}
}

/// A chain tip pinned at genesis. Stands in for a real blockchain provider.
#[derive(Debug, Default)]
struct NullChainTip;

impl ChainTipProvider for NullChainTip {
    fn total_difficulty(&self) -> U256 {
        U256::ZERO
    }

    fn best_block_number(&self) -> u64 {
        0
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = SyncConfig::default();
    let spawner = TokioTaskExecutor;

    let data_dir = std::env::var("CHAINSYNC_DATA_DIR").unwrap_or_else(|_| "./chainsync-data".to_string());
    let queue = BlockQueue::open(data_dir, &config, &spawner);

    let discovery: Arc<dyn DiscoveryHandle> = Arc::new(NullDiscovery);
    let facade: Arc<dyn ConnectionFacade> = Arc::new(NullDiscovery);
    let chain: Arc<dyn ChainTipProvider> = Arc::new(NullChainTip);

    let sync = SyncManager::new(config, queue, Arc::clone(&discovery), Arc::clone(&facade), chain);
    let network = ChannelManager::new(sync.clone(), discovery, facade);

    sync.spawn_workers(&spawner);
    network.spawn_workers(&spawner);

    tracing::info!(target: "chainsync", "chain-sync core started");

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    tracing::info!(target: "chainsync", "shutting down");
}
