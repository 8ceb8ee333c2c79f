use crate::U256;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node's 64-byte identifier, as exchanged during discovery and the RLPx handshake.
///
/// Kept as opaque bytes here: decoding it into a public key is the discovery subsystem's
/// concern, out of scope for this core.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId([u8; 64]);

impl NodeId {
    /// Wraps a raw 64-byte identifier.
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Returns the identifier as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// The peer's protocol-level `Status` message, carried at handshake time.
///
/// Only the fields the sync core reasons about are modeled; the remaining `Status` fields
/// (protocol version, genesis hash, fork id) are the eth-wire layer's concern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    /// The peer's claimed cumulative chain difficulty.
    pub total_difficulty: U256,
    /// The peer's claimed best block hash.
    pub best_hash: B256,
}
