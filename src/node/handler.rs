// Connection Handler - Drives one socket
//
// Lifecycle: Connecting -> Handshaking -> Active -> Closed
// - Handshake: one identity frame each way (inbound reads first)
// - Receive loop: decode each frame and dispatch into the Peer Node
// - Writer task: drains the outbox onto the socket, closes on a failed write

use crate::identity::Identity;
use crate::node::connection::ConnectionHandle;
use crate::node::peer::{NodeShared, PeerNode};
use crate::sync::{AssembledState, SyncAssembler, WireMessage};
use crate::transport::{
    read_frame, with_timeout, write_frame, ConnectionState, Direction, TransportConfig,
    TransportError,
};
use std::sync::Weak;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub(crate) struct ConnectionHandler {
    /// Non-owning: the handler never keeps the node alive
    node: Weak<NodeShared>,
    handle: ConnectionHandle,
    own_identity: Identity,
    config: TransportConfig,
    shutdown: watch::Receiver<bool>,
    assembler: SyncAssembler,
}

impl ConnectionHandler {
    pub(crate) fn new(
        node: Weak<NodeShared>,
        handle: ConnectionHandle,
        own_identity: Identity,
        config: TransportConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            node,
            handle,
            own_identity,
            config,
            shutdown,
            assembler: SyncAssembler::new(),
        }
    }

    /// Run the connection to completion. Always ends closed and deregistered.
    pub(crate) async fn run(mut self, stream: TcpStream, outbox: mpsc::Receiver<String>) {
        debug!("Handler started");
        self.handle.transition(ConnectionState::Handshaking);

        let (mut reader, writer) = stream.into_split();
        let writer_task = tokio::spawn(write_loop(writer, outbox, self.handle.clone()));

        let mut closed = self.handle.closed_signal();
        let mut shutdown = self.shutdown.clone();

        let result = tokio::select! {
            result = self.session(&mut reader) => result,
            _ = closed.wait_for(|closed| *closed) => Ok(()),
            _ = shutdown.wait_for(|stop| *stop) => Ok(()),
        };

        let closed_by_us = self.handle.is_closed();
        match result {
            Ok(()) => {}
            Err(_) if closed_by_us => {}
            Err(TransportError::ConnectionClosed) => {
                info!(peer = %self.handle.peer_info(), "Connection closed by peer");
            }
            Err(TransportError::Handshake(reason)) => {
                warn!(peer = %self.handle.peer_info(), %reason, "Identity exchange failed, closing connection");
            }
            Err(e) => {
                warn!(peer = %self.handle.peer_info(), error = %e, "Connection error");
            }
        }

        self.close().await;
        let _ = writer_task.await;
        debug!(peer = %self.handle.peer_info(), "Handler finished");
    }

    /// Close the handle and deregister from the node
    async fn close(&self) {
        if self.handle.close() {
            debug!(peer = %self.handle.peer_info(), "Closing connection handler");
        }
        if let Some(node) = self.node() {
            node.remove_connection(self.handle.id()).await;
        }
    }

    fn node(&self) -> Option<PeerNode> {
        self.node.upgrade().map(PeerNode::from_shared)
    }

    // ========================================================================
    // SESSION
    // ========================================================================

    async fn session<R>(&mut self, reader: &mut R) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
    {
        let remote = with_timeout(
            self.config.handshake_timeout(),
            "identity exchange",
            self.handshake(reader),
        )
        .await?;

        self.handle.set_identity(remote);
        if !self.handle.transition(ConnectionState::Active) {
            return Ok(());
        }

        let Some(node) = self.node() else {
            return Ok(());
        };
        if !node.add_connection(self.handle.clone()).await {
            return Ok(());
        }

        if self.handle.direction() == Direction::Outbound {
            info!(peer = %self.handle.peer_info(), "Requesting state sync");
            self.handle
                .send(&WireMessage::SyncRequest(self.own_identity.to_string()));
        }
        drop(node);

        let read_timeout = self.config.read_timeout();
        loop {
            let text = with_timeout(read_timeout, "read", read_frame(reader)).await?;

            // Only hold the node for the duration of one message
            let Some(node) = self.node() else {
                return Ok(());
            };
            self.dispatch(&node, &text).await;
        }
    }

    /// Exchange identities. Inbound receives first, outbound sends first.
    async fn handshake<R>(&self, reader: &mut R) -> Result<Identity, TransportError>
    where
        R: AsyncRead + Unpin,
    {
        if self.handle.direction().is_inbound() {
            let remote = read_identity(reader).await?;
            debug!(remote = %remote, own = %self.own_identity, "Received identity, sending ours");
            self.send_own_identity()?;
            Ok(remote)
        } else {
            debug!(own = %self.own_identity, "Sending our identity");
            self.send_own_identity()?;
            read_identity(reader).await
        }
    }

    fn send_own_identity(&self) -> Result<(), TransportError> {
        if self.handle.send_text(self.own_identity.to_string()) {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    async fn dispatch(&mut self, node: &PeerNode, text: &str) {
        let peer = self.handle.display_name().to_string();

        let message = match WireMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(%peer, error = %e, "Dropping malformed message");
                return;
            }
        };
        debug!(%peer, kind = %message.kind(), "Received message");

        let origin = Some(self.handle.id());
        match message {
            WireMessage::Chat(text) => {
                info!(%peer, "(Chat) {}", text);
            }
            WireMessage::Transaction(request) => {
                // Rejections are logged by the node; the connection stays up
                let _ = node.submit_transaction(&request, origin).await;
            }
            WireMessage::SyncRequest(_) => {
                node.send_full_state(&self.handle).await;
            }
            WireMessage::PeerJoined { identity, balance } => {
                node.learn_peer(identity, balance, origin).await;
            }
            WireMessage::SyncBalancesStart => {
                info!(%peer, "Receiving balance state");
                self.assembler.open_balances();
            }
            WireMessage::SyncBalance { identity, balance } => {
                if let Err(e) = self.assembler.push_balance(identity, balance) {
                    warn!(%peer, error = %e, "Dropping sync entry");
                }
            }
            WireMessage::SyncBalancesEnd => {
                info!(%peer, entries = self.assembler.buffered_balances(), "Balance state received");
                let released = self.assembler.close_balances();
                self.apply(node, released).await;
            }
            WireMessage::SyncLedgerStart => {
                info!(%peer, "Receiving ledger state");
                self.assembler.open_ledger();
            }
            WireMessage::SyncLedgerEntry(line) => {
                if let Err(e) = self.assembler.push_ledger(line) {
                    warn!(%peer, error = %e, "Dropping sync entry");
                }
            }
            WireMessage::SyncLedgerEnd => {
                info!(%peer, entries = self.assembler.buffered_ledger(), "Ledger state received");
                let released = self.assembler.close_ledger();
                self.apply(node, released).await;
            }
        }
    }

    async fn apply(&self, node: &PeerNode, released: Option<AssembledState>) {
        if let Some(state) = released {
            node.apply_full_state(state.balances, state.ledger, self.handle.display_name())
                .await;
        }
    }
}

async fn read_identity<R>(reader: &mut R) -> Result<Identity, TransportError>
where
    R: AsyncRead + Unpin,
{
    let text = read_frame(reader).await?;
    Identity::parse(&text)
        .map_err(|e| TransportError::Handshake(format!("received invalid identity '{}': {}", text, e)))
}

/// Drain the outbox onto the socket until the connection closes
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbox: mpsc::Receiver<String>,
    handle: ConnectionHandle,
) {
    let mut closed = handle.closed_signal();

    loop {
        tokio::select! {
            biased;
            _ = async { let _ = closed.wait_for(|closed| *closed).await; } => break,
            next = outbox.recv() => {
                let Some(text) = next else { break };
                if let Err(e) = write_frame(&mut writer, &text).await {
                    warn!(peer = %handle.peer_info(), error = %e, "Failed to send message");
                    handle.close();
                    break;
                }
            }
        }
    }

    let _ = writer.shutdown().await;
}
