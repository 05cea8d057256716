// Transport Types
// Configuration, connection identifiers and states, and transport errors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// TRANSPORT CONFIG
// ============================================================================

/// Outbound messages a connection may have queued before it is dropped
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// Timeouts for the blocking points of a connection, and the outbox bound.
///
/// `None` waits forever. Reads and the handshake are unbounded by default, so
/// an unresponsive peer holds its connection task until it is closed. Writes
/// are bounded by the outbox instead: a peer that stops reading lets at most
/// `outbox_capacity` messages pile up, and the next gossip send closes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Outbound dial timeout in seconds
    pub connect_timeout_secs: Option<u32>,
    /// Identity exchange timeout in seconds
    pub handshake_timeout_secs: Option<u32>,
    /// Per-frame read timeout in seconds while active
    pub read_timeout_secs: Option<u32>,
    /// Messages queued per connection before a send closes it
    pub outbox_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(30),
            handshake_timeout_secs: None,
            read_timeout_secs: None,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, secs: Option<u32>) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_handshake_timeout(mut self, secs: Option<u32>) -> Self {
        self.handshake_timeout_secs = secs;
        self
    }

    pub fn with_read_timeout(mut self, secs: Option<u32>) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(|s| Duration::from_secs(s as u64))
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_secs.map(|s| Duration::from_secs(s as u64))
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(|s| Duration::from_secs(s as u64))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TransportError> {
        let zero = |v: Option<u32>| v == Some(0);
        if zero(self.connect_timeout_secs)
            || zero(self.handshake_timeout_secs)
            || zero(self.read_timeout_secs)
        {
            return Err(TransportError::InvalidConfig(
                "timeouts must be positive; use None for no timeout".to_string(),
            ));
        }
        if self.outbox_capacity == 0 {
            return Err(TransportError::InvalidConfig(
                "outbox capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// CONNECTION ID
// ============================================================================

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId([u8; 16]);

impl ConnectionId {
    /// Generate a new unique connection ID
    pub fn generate() -> Self {
        use rand::Rng;
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

// ============================================================================
// DIRECTION
// ============================================================================

/// Which side opened the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Accepted by our listener; receives the remote identity first
    Inbound,
    /// Dialed by us; sends our identity first and requests a sync
    Outbound,
}

impl Direction {
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::Inbound)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Inbound => "IN",
            Self::Outbound => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// CONNECTION STATE
// ============================================================================

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Handshaking,
    Active,
    Closed,
}

impl ConnectionState {
    /// Initial state for a connection in the given direction
    pub fn initial(direction: Direction) -> Self {
        match direction {
            Direction::Inbound => Self::Handshaking,
            Direction::Outbound => Self::Connecting,
        }
    }

    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        match (self, target) {
            (Self::Connecting, Self::Handshaking) => true,
            (Self::Handshaking, Self::Active) => true,
            (Self::Closed, _) => false,
            (_, Self::Closed) => true,
            _ => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Transport errors. All of them except `InvalidConfig` end the connection.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    #[error("Frame too large: {size} bytes, max {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
