use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the chain-sync core.
///
/// A plain struct with a `Default` impl; this crate does not parse it from a CLI or config file
/// itself — an embedding application sources it however it likes and passes it in at
/// construction time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Ceiling on hashes requested per `GetBlockHashes`-style call to a peer.
    pub max_hashes_ask: u64,
    /// Clears the `BlockQueue`'s backing store on open, discarding any persisted state.
    pub database_reset: bool,
    /// Maximum size of the useful-peer pool.
    pub peers_count: usize,
    /// How long an outbound connect attempt may stay pending before it is forgotten.
    pub connection_timeout: Duration,
    /// Gap size, in blocks, above which `recover_gap` escalates to full `GAP_RECOVERY` instead
    /// of just prepending the parent hash to the hash store.
    pub large_gap_threshold: u64,
    /// A freshly imported block older than this is considered "caught up with during catch-up",
    /// not evidence that live sync has finished.
    pub time_to_import_threshold: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_hashes_ask: 192,
            database_reset: false,
            peers_count: 5,
            connection_timeout: Duration::from_millis(60_000),
            large_gap_threshold: 5,
            time_to_import_threshold: Duration::from_millis(600_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert_eq!(config.peers_count, 5);
        assert_eq!(config.connection_timeout, Duration::from_millis(60_000));
        assert_eq!(config.large_gap_threshold, 5);
        assert_eq!(config.time_to_import_threshold, Duration::from_millis(600_000));
    }
}
