// Node Configuration

use crate::identity::Identity;
use crate::ledger::INITIAL_BALANCE;
use crate::node::NodeError;
use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a peer node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's participant name
    pub identity: Identity,
    /// Address to bind the listener to
    pub bind_address: String,
    /// Balance minted for every newly known participant, ourselves included
    pub initial_balance: u64,
    /// How long shutdown waits for connection tasks before aborting them
    pub shutdown_grace_ms: u64,
    /// Connection timeouts
    pub transport: TransportConfig,
}

impl NodeConfig {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            bind_address: "0.0.0.0".to_string(),
            initial_balance: INITIAL_BALANCE,
            shutdown_grace_ms: 2_000,
            transport: TransportConfig::default(),
        }
    }

    pub fn with_bind_address(mut self, addr: &str) -> Self {
        self.bind_address = addr.to_string();
        self
    }

    pub fn with_initial_balance(mut self, balance: u64) -> Self {
        self.initial_balance = balance;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.bind_address.trim().is_empty() {
            return Err(NodeError::InvalidConfig("bind_address cannot be empty".to_string()));
        }
        self.transport.validate()?;
        Ok(())
    }
}
