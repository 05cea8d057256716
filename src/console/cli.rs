// CLI - Process flags for the node binary

use crate::identity::Identity;
use crate::node::NodeConfig;
use crate::transport::TransportConfig;
use clap::Parser;

/// Gossip ledger peer node
#[derive(Parser, Debug, Clone)]
#[command(name = "mesh-node")]
#[command(about = "Peer-to-peer gossip ledger node")]
#[command(version)]
pub struct Cli {
    /// Participant name (no spaces or ':', not "UNKNOWN")
    #[arg(long)]
    pub nickname: Identity,

    /// Port to listen on
    #[arg(long, value_parser = clap::value_parser!(u16).range(1025..))]
    pub port: u16,

    /// Address to bind the listener to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Peer to dial at startup, as host:port. Repeatable.
    #[arg(long = "connect", value_name = "HOST:PORT")]
    pub connect: Vec<String>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Outbound dial timeout in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub connect_timeout_secs: u32,

    /// Identity exchange timeout in seconds (unbounded when omitted)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub handshake_timeout_secs: Option<u32>,

    /// Per-message read timeout in seconds (unbounded when omitted)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub read_timeout_secs: Option<u32>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Build the node configuration described by the flags
    pub fn node_config(&self) -> NodeConfig {
        let transport = TransportConfig::new()
            .with_connect_timeout(Some(self.connect_timeout_secs))
            .with_handshake_timeout(self.handshake_timeout_secs)
            .with_read_timeout(self.read_timeout_secs);

        NodeConfig::new(self.nickname.clone())
            .with_bind_address(&self.bind)
            .with_transport(transport)
    }
}
