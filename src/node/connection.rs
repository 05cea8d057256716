// Connection Handle - The node's view of one live connection
//
// A cheap clone shared between the Peer Node's active set and the task that
// drives the socket. Sends only enqueue; the socket is written by the
// connection's writer task, so no I/O happens under the node lock.
// The outbox is bounded: a gossip send that finds it full closes the
// connection rather than letting a stalled reader grow the queue.

use crate::identity::{Identity, UNKNOWN_IDENTITY};
use crate::sync::WireMessage;
use crate::transport::{ConnectionId, ConnectionState, Direction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::warn;

struct HandleInner {
    id: ConnectionId,
    direction: Direction,
    remote_addr: SocketAddr,
    /// Learned during the handshake, never renamed afterwards
    identity: OnceLock<Identity>,
    state: Mutex<ConnectionState>,
    outbox: mpsc::Sender<String>,
    closed: watch::Sender<bool>,
}

/// Shared handle to a connection
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end of an outbox holding at most
    /// `capacity` messages. `capacity` must be positive.
    pub(crate) fn new(
        direction: Direction,
        remote_addr: SocketAddr,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (outbox, outbox_rx) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);

        let handle = Self {
            inner: Arc::new(HandleInner {
                id: ConnectionId::generate(),
                direction,
                remote_addr,
                identity: OnceLock::new(),
                state: Mutex::new(ConnectionState::initial(direction)),
                outbox,
                closed,
            }),
        };

        (handle, outbox_rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.remote_addr
    }

    /// The remote identity, once the handshake has completed
    pub fn identity(&self) -> Option<&Identity> {
        self.inner.identity.get()
    }

    /// The remote identity, or the `UNKNOWN` sentinel before the handshake
    pub fn display_name(&self) -> &str {
        self.identity().map(Identity::as_str).unwrap_or(UNKNOWN_IDENTITY)
    }

    /// `name@host:port`, also used for the best-effort duplicate dial check
    pub fn peer_info(&self) -> String {
        format!("{}@{}", self.display_name(), self.inner.remote_addr)
    }

    pub(crate) fn set_identity(&self, identity: Identity) -> bool {
        self.inner.identity.set(identity).is_ok()
    }

    pub fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    /// Move to `target` if the lifecycle allows it
    pub(crate) fn transition(&self, target: ConnectionState) -> bool {
        let mut state = self.lock_state();
        if !state.can_transition_to(&target) {
            return false;
        }
        *state = target;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    // ========================================================================
    // SEND / CLOSE
    // ========================================================================

    /// Queue a protocol message. Returns `false` if the connection is closed.
    pub fn send(&self, message: &WireMessage) -> bool {
        self.send_text(message.encode())
    }

    /// Queue raw frame text. A closed connection drops it silently; a full
    /// outbox closes the connection.
    pub(crate) fn send_text(&self, text: String) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.inner.outbox.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(peer = %self.peer_info(), "Outbox full, closing slow connection");
                self.close();
                false
            }
            Err(TrySendError::Closed(_)) => {
                // Writer task is gone: the socket is unusable
                self.close();
                false
            }
        }
    }

    /// Queue a message, waiting for room in the outbox instead of closing.
    ///
    /// For streams addressed to this connection alone, such as a full-state
    /// sync that may be longer than the outbox.
    pub async fn send_waiting(&self, message: &WireMessage) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.inner.outbox.send(message.encode()).await.is_err() {
            self.close();
            return false;
        }
        true
    }

    /// Mark the connection closed and wake its tasks.
    ///
    /// Idempotent and callable from any task. Only the first call returns
    /// `true`; the connection task deregisters from the node when it exits.
    pub fn close(&self) -> bool {
        {
            let mut state = self.lock_state();
            if state.is_closed() {
                return false;
            }
            *state = ConnectionState::Closed;
        }
        self.inner.closed.send_replace(true);
        true
    }

    pub(crate) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.inner.closed.subscribe()
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            id: self.id(),
            identity: self.display_name().to_string(),
            remote_addr: self.remote_addr(),
            direction: self.direction(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("peer", &self.peer_info())
            .field("direction", &self.inner.direction)
            .field("state", &self.state())
            .finish()
    }
}

/// Snapshot of an active connection for external reporting
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub id: ConnectionId,
    pub identity: String,
    pub remote_addr: SocketAddr,
    pub direction: Direction,
}

impl fmt::Display for PeerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.identity, self.remote_addr, self.direction)
    }
}
