// Peer Node - Owns the shared state and the operation contract
//
// Balances, the ledger journal and the active connection set live behind one
// lock, so every operation that touches them is linearized as a unit.
// Connection tasks reach the state only through the methods below.

use crate::identity::Identity;
use crate::ledger::{AppliedTransfer, LedgerState, TransferRequest};
use crate::node::config::NodeConfig;
use crate::node::connection::{ConnectionHandle, PeerSnapshot};
use crate::node::handler::ConnectionHandler;
use crate::node::listener::accept_loop;
use crate::node::NodeError;
use crate::sync::WireMessage;
use crate::transport::{ensure_frame_fits, with_timeout, ConnectionId, Direction, TransportError};
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, info_span, warn, Instrument};

/// Everything guarded by the node's single critical section
struct NodeState {
    ledger: LedgerState,
    /// Completed-handshake connections, in registration order
    connections: Vec<ConnectionHandle>,
    /// Full-state replacements applied since startup
    syncs_applied: u64,
}

impl NodeState {
    /// Queue `message` on every connection except `exclude`.
    /// A closed connection is skipped without affecting the others.
    fn broadcast(&self, message: &WireMessage, exclude: Option<ConnectionId>) -> usize {
        let text = message.encode();
        self.connections
            .iter()
            .filter(|conn| Some(conn.id()) != exclude)
            .filter(|conn| conn.send_text(text.clone()))
            .count()
    }
}

/// Task bookkeeping, kept outside the state lock
#[derive(Default)]
struct Runtime {
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
    handlers: JoinSet<()>,
}

pub(crate) struct NodeShared {
    config: NodeConfig,
    state: tokio::sync::Mutex<NodeState>,
    runtime: Mutex<Runtime>,
    shutting_down: AtomicBool,
    shutdown_signal: watch::Sender<bool>,
}

/// Point-in-time counters for a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeStatistics {
    pub known_identities: usize,
    pub ledger_entries: usize,
    pub total_supply: u128,
    pub active_connections: usize,
    pub syncs_applied: u64,
}

/// Handle to a peer node. Clones share the same node.
#[derive(Clone)]
pub struct PeerNode {
    shared: Arc<NodeShared>,
}

impl PeerNode {
    /// Create a node holding only its own starting balance
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let ledger = LedgerState::new(config.identity.clone(), config.initial_balance);
        let (shutdown_signal, _) = watch::channel(false);

        info!(
            identity = %config.identity,
            balance = config.initial_balance,
            "Welcome, {}! Your initial balance is {}",
            config.identity,
            config.initial_balance
        );

        Ok(Self {
            shared: Arc::new(NodeShared {
                config,
                state: tokio::sync::Mutex::new(NodeState {
                    ledger,
                    connections: Vec::new(),
                    syncs_applied: 0,
                }),
                runtime: Mutex::new(Runtime::default()),
                shutting_down: AtomicBool::new(false),
                shutdown_signal,
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<NodeShared>) -> Self {
        Self { shared }
    }

    pub fn identity(&self) -> &Identity {
        &self.shared.config.identity
    }

    pub fn config(&self) -> &NodeConfig {
        &self.shared.config
    }

    /// Address the listener is bound to, once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.runtime().local_addr
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::SeqCst)
    }

    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.shared.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // LISTENING / DIALING
    // ========================================================================

    /// Bind the listener and start accepting inbound connections.
    ///
    /// Port 0 binds an ephemeral port; the bound address is returned. A bind
    /// failure is unrecoverable for the node: without a listener it cannot be
    /// discovered.
    pub async fn start_listening(&self, port: u16) -> Result<SocketAddr, NodeError> {
        if self.is_shutting_down() {
            return Err(NodeError::ShuttingDown);
        }
        if let Some(addr) = self.local_addr() {
            return Err(NodeError::AlreadyListening(addr));
        }

        let bind_addr = format!("{}:{}", self.shared.config.bind_address, port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| NodeError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| NodeError::Bind {
            addr: bind_addr,
            source,
        })?;

        let task = tokio::spawn(
            accept_loop(
                listener,
                Arc::downgrade(&self.shared),
                self.shared.shutdown_signal.subscribe(),
            )
            .instrument(info_span!("listener", port = local_addr.port())),
        );

        let mut runtime = self.runtime();
        runtime.local_addr = Some(local_addr);
        runtime.accept_task = Some(task);

        info!(addr = %local_addr, "Server listening on port {}", local_addr.port());
        Ok(local_addr)
    }

    /// Dial a peer and start an outbound connection to it.
    ///
    /// Refuses to dial our own listener and endpoints that already appear
    /// among the active connections (a string check, not a guarantee).
    pub async fn connect(&self, host: &str, port: u16) -> Result<ConnectionId, NodeError> {
        if self.is_shutting_down() {
            return Err(NodeError::ShuttingDown);
        }

        let is_loopback = host == "localhost" || host == "127.0.0.1";
        if is_loopback && self.local_addr().map(|a| a.port()) == Some(port) {
            warn!(host, port, "Cannot connect to self");
            return Err(NodeError::SelfConnection {
                host: host.to_string(),
                port,
            });
        }

        let endpoint = format!("{}:{}", host, port);
        {
            let state = self.shared.state.lock().await;
            if state
                .connections
                .iter()
                .any(|conn| conn.peer_info().contains(&endpoint))
            {
                warn!(%endpoint, "Already connected or connecting");
                return Err(NodeError::AlreadyConnected(endpoint));
            }
        }

        info!(%endpoint, "Attempting to connect");
        let connect_timeout = self.shared.config.transport.connect_timeout();
        let stream = with_timeout(connect_timeout, "connect", async {
            TcpStream::connect((host, port))
                .await
                .map_err(|e| TransportError::ConnectFailed(e.to_string()))
        })
        .await
        .map_err(|e| {
            warn!(%endpoint, error = %e, "Could not connect");
            e
        })?;

        let remote_addr = stream.peer_addr().map_err(TransportError::Io)?;
        info!(%endpoint, "Successfully connected");

        let handle = self
            .spawn_handler(stream, remote_addr, Direction::Outbound)
            .ok_or(NodeError::ShuttingDown)?;
        Ok(handle.id())
    }

    /// Start a connection task for an established socket
    pub(crate) fn spawn_handler(
        &self,
        stream: TcpStream,
        remote_addr: SocketAddr,
        direction: Direction,
    ) -> Option<ConnectionHandle> {
        if self.is_shutting_down() {
            return None;
        }
        let _ = stream.set_nodelay(true);

        let capacity = self.shared.config.transport.outbox_capacity;
        let (handle, outbox) = ConnectionHandle::new(direction, remote_addr, capacity);
        let handler = ConnectionHandler::new(
            Arc::downgrade(&self.shared),
            handle.clone(),
            self.identity().clone(),
            self.shared.config.transport.clone(),
            self.shared.shutdown_signal.subscribe(),
        );
        let span = info_span!("conn", id = %handle.id(), dir = %direction, remote = %remote_addr);

        let mut runtime = self.runtime();
        // Reap finished tasks so churn does not accumulate
        while runtime.handlers.try_join_next().is_some() {}
        runtime.handlers.spawn(handler.run(stream, outbox).instrument(span));

        Some(handle)
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    /// Validate and apply a transfer, then relay it to every connection
    /// except `origin` (`None` for a locally created transfer).
    ///
    /// A rejected transfer changes nothing and is not relayed.
    pub async fn submit_transaction(
        &self,
        request: &TransferRequest,
        origin: Option<ConnectionId>,
    ) -> Result<AppliedTransfer, NodeError> {
        let mut state = self.shared.state.lock().await;
        let source = describe_source(&state, origin);

        let now = Local::now().naive_local();
        let applied = match state.ledger.apply_transfer(request, &now) {
            Ok(applied) => applied,
            Err(e) => {
                warn!(%source, error = %e, "Transaction rejected");
                return Err(e.into());
            }
        };

        info!(
            %source,
            sender = %applied.transfer.sender,
            recipient = %applied.transfer.recipient,
            amount = applied.transfer.amount,
            recorded = applied.recorded,
            "Transaction applied"
        );
        let own = self.identity();
        if applied.transfer.sender == *own || applied.transfer.recipient == *own {
            info!("Your new balance: {}", state.ledger.own_balance());
        }

        state.broadcast(&WireMessage::Transaction(request.clone()), origin);
        Ok(applied)
    }

    /// Send coins from this node to `recipient`
    pub async fn submit_local_transaction(
        &self,
        recipient: &str,
        amount: i64,
    ) -> Result<AppliedTransfer, NodeError> {
        let request = TransferRequest::with_amount(self.identity().as_str(), recipient, amount);
        info!(%request, "Initiating transaction");
        self.submit_transaction(&request, None).await
    }

    // ========================================================================
    // GOSSIP
    // ========================================================================

    /// Record a participant announced by a neighbour and flood the news on.
    ///
    /// First seen wins: an already known identity is neither updated nor
    /// relayed, which is what stops the flood. Returns `true` on a new insert.
    pub async fn learn_peer(
        &self,
        identity: Identity,
        balance: u64,
        source: Option<ConnectionId>,
    ) -> bool {
        if identity == *self.identity() {
            return false;
        }

        let mut state = self.shared.state.lock().await;
        if !state.ledger.learn(identity.clone(), balance) {
            return false;
        }

        info!(
            peer = %identity,
            from = %describe_source(&state, source),
            balance,
            "Learned about new peer"
        );
        state.broadcast(&WireMessage::PeerJoined { identity, balance }, source);
        true
    }

    /// Best-effort fan-out to every active connection except `exclude`.
    /// Returns the number of connections the message was queued on.
    pub async fn broadcast(&self, message: &WireMessage, exclude: Option<ConnectionId>) -> usize {
        self.shared.state.lock().await.broadcast(message, exclude)
    }

    /// Broadcast a chat line to every neighbour.
    ///
    /// A line that would not fit in one frame is refused before anything is
    /// queued, so it cannot fail every writer at once.
    pub async fn send_chat(&self, text: &str) -> Result<usize, NodeError> {
        let message = WireMessage::Chat(text.to_string());
        ensure_frame_fits(&message.encode())?;
        Ok(self.broadcast(&message, None).await)
    }

    // ========================================================================
    // FULL-STATE SYNC
    // ========================================================================

    /// Stream a snapshot of balances and ledger to `requester`
    pub async fn send_full_state(&self, requester: &ConnectionHandle) {
        let snapshot = self.shared.state.lock().await.ledger.snapshot();
        info!(
            peer = %requester.peer_info(),
            balances = snapshot.balances.len(),
            ledger = snapshot.ledger.len(),
            "Sending full state"
        );

        let mut messages = Vec::with_capacity(snapshot.balances.len() + snapshot.ledger.len() + 4);
        messages.push(WireMessage::SyncBalancesStart);
        messages.extend(
            snapshot
                .balances
                .into_iter()
                .map(|(identity, balance)| WireMessage::SyncBalance { identity, balance }),
        );
        messages.push(WireMessage::SyncBalancesEnd);
        messages.push(WireMessage::SyncLedgerStart);
        messages.extend(snapshot.ledger.into_iter().map(WireMessage::SyncLedgerEntry));
        messages.push(WireMessage::SyncLedgerEnd);

        for message in &messages {
            if !requester.send_waiting(message).await {
                warn!(peer = %requester.peer_info(), "Failed to send full state");
                return;
            }
        }
    }

    /// Replace local balances and ledger with a peer's state.
    ///
    /// Our own balance comes from the received mapping, or falls back to the
    /// initial balance. Returns `false` when both collections were empty.
    pub async fn apply_full_state(
        &self,
        balances: BTreeMap<Identity, u64>,
        ledger: Vec<String>,
        source: &str,
    ) -> bool {
        info!(
            %source,
            balances = balances.len(),
            ledger = ledger.len(),
            "Applying received state"
        );

        let mut state = self.shared.state.lock().await;
        if !state.ledger.replace_with(balances, ledger) {
            return false;
        }
        state.syncs_applied += 1;

        info!(
            %source,
            balance = state.ledger.own_balance(),
            ledger = state.ledger.ledger().len(),
            "State synchronized"
        );
        true
    }

    // ========================================================================
    // CONNECTION SET
    // ========================================================================

    /// Register a connection whose handshake has completed.
    ///
    /// Mints a balance for a new identity and announces it to every other
    /// neighbour. Connections without an identity are refused.
    pub async fn add_connection(&self, handle: ConnectionHandle) -> bool {
        let Some(identity) = handle.identity().cloned() else {
            warn!(peer = %handle.peer_info(), "Attempted to add connection before identity exchange completed");
            return false;
        };

        let mut state = self.shared.state.lock().await;
        if self.is_shutting_down() || handle.is_closed() {
            handle.close();
            return false;
        }

        let initial_balance = self.shared.config.initial_balance;
        state.ledger.insert_if_absent(identity.clone(), initial_balance);
        state.connections.push(handle.clone());

        info!(
            peer = %handle.peer_info(),
            known_balances = state.ledger.balances().len(),
            active_connections = state.connections.len(),
            "Peer connected"
        );

        state.broadcast(
            &WireMessage::PeerJoined {
                identity,
                balance: initial_balance,
            },
            Some(handle.id()),
        );
        true
    }

    /// Remove a connection from the active set. Idempotent.
    pub async fn remove_connection(&self, id: ConnectionId) -> bool {
        let mut state = self.shared.state.lock().await;
        let Some(pos) = state.connections.iter().position(|conn| conn.id() == id) else {
            return false;
        };

        let handle = state.connections.remove(pos);
        info!(
            peer = %handle.peer_info(),
            active_connections = state.connections.len(),
            "Peer disconnected"
        );
        true
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn query_balance(&self, identity: &str) -> Option<u64> {
        self.shared.state.lock().await.ledger.balance(identity)
    }

    pub async fn query_own_balance(&self) -> u64 {
        self.shared.state.lock().await.ledger.own_balance()
    }

    /// Ordered copy of the ledger
    pub async fn query_ledger(&self) -> Vec<String> {
        self.shared.state.lock().await.ledger.ledger().to_vec()
    }

    pub async fn query_active_peers(&self) -> Vec<PeerSnapshot> {
        self.shared
            .state
            .lock()
            .await
            .connections
            .iter()
            .map(ConnectionHandle::snapshot)
            .collect()
    }

    /// Every known identity with its balance, sorted by name
    pub async fn query_known_peers(&self) -> Vec<(Identity, u64)> {
        self.shared.state.lock().await.ledger.snapshot().balances
    }

    pub async fn statistics(&self) -> NodeStatistics {
        let state = self.shared.state.lock().await;
        let ledger = state.ledger.statistics();
        NodeStatistics {
            known_identities: ledger.known_identities,
            ledger_entries: ledger.ledger_entries,
            total_supply: ledger.total_supply,
            active_connections: state.connections.len(),
            syncs_applied: state.syncs_applied,
        }
    }

    // ========================================================================
    // SHUTDOWN
    // ========================================================================

    /// Stop accepting, close every connection and wait briefly for their
    /// tasks. Stragglers are aborted after the configured grace period.
    /// A second call returns immediately.
    pub async fn shutdown(&self) {
        if self.shared.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutdown initiated");
        self.shared.shutdown_signal.send_replace(true);

        let (accept_task, mut handlers) = {
            let mut runtime = self.runtime();
            (runtime.accept_task.take(), std::mem::take(&mut runtime.handlers))
        };

        let connections = std::mem::take(&mut self.shared.state.lock().await.connections);
        info!(count = connections.len(), "Closing active connections");
        for conn in &connections {
            conn.close();
        }

        let grace = self.shared.config.shutdown_grace();
        let drained = tokio::time::timeout(grace, async {
            if let Some(task) = accept_task {
                let _ = task.await;
            }
            while handlers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(remaining = handlers.len(), "Forcing shutdown of connection handlers");
            handlers.abort_all();
        }

        info!("Shutdown complete");
    }
}

/// Human-readable origin of an operation, for logs
fn describe_source(state: &NodeState, origin: Option<ConnectionId>) -> String {
    match origin {
        None => "LOCAL".to_string(),
        Some(id) => state
            .connections
            .iter()
            .find(|conn| conn.id() == id)
            .map(ConnectionHandle::peer_info)
            .unwrap_or_else(|| id.to_string()),
    }
}
