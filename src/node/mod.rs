// Node module - THE PEER
// Owns the shared ledger state, the active connection set and the tasks
// that accept, dial and drive connections

mod config;
mod connection;
mod error;
mod handler;
mod listener;
mod peer;

pub use config::NodeConfig;
pub use connection::{ConnectionHandle, PeerSnapshot};
pub use error::NodeError;
pub use peer::{NodeStatistics, PeerNode};
