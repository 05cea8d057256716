// Listener - Accepts inbound sockets and hands them to the Peer Node

use crate::node::peer::{NodeShared, PeerNode};
use crate::transport::Direction;
use std::sync::Weak;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Pause after a failed accept so a persistent error does not spin
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections until shutdown is signalled or the node is dropped
pub(crate) async fn accept_loop(
    listener: TcpListener,
    node: Weak<NodeShared>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    let Some(shared) = node.upgrade() else { break };
                    info!(remote = %remote_addr, "Incoming connection");
                    PeerNode::from_shared(shared).spawn_handler(stream, remote_addr, Direction::Inbound);
                }
                Err(e) => {
                    warn!(error = %e, "Error accepting connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    info!("Server listener stopped");
}
