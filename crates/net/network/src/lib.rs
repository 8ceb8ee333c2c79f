//! Peer channel lifecycle supervision: promotes handshaked peers to "active," forwards
//! transactions, and runs disconnect/reconnect bookkeeping.
//!
//! Plays the role `reth-network` plays for the rest of the workspace, narrowed to exactly the
//! lifecycle surface the sync core needs; RLPx framing and session I/O are someone else's job,
//! reached here only through [`peer::PeerCommandSink`].

#![warn(missing_docs, unreachable_pub, rust_2018_idioms)]

mod channel;
mod channel_manager;
mod peer;

pub use channel::Channel;
pub use channel_manager::ChannelManager;
pub use peer::{PeerCommandSink, PeerHandle};
