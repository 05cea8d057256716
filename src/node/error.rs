// Node errors

use crate::identity::IdentityError;
use crate::ledger::ValidationError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by [`PeerNode`](crate::node::PeerNode) operations
#[derive(Error, Debug)]
pub enum NodeError {
    /// The listening port could not be bound. Fatal for the process.
    #[error("Could not start server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Already listening on {0}")]
    AlreadyListening(std::net::SocketAddr),

    #[error("Cannot connect to self ({host}:{port})")]
    SelfConnection { host: String, port: u16 },

    #[error("Already connected or connecting to {0}")]
    AlreadyConnected(String),

    #[error("Node is shutting down")]
    ShuttingDown,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transaction rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid identity: {0}")]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
