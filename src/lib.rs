//! Gossip-propagated peer-to-peer ledger.
//!
//! Every node keeps a full copy of the balances and the transaction history,
//! floods transactions and membership news to its neighbours, and pulls the
//! complete state from the first peer it dials.

pub mod console;
pub mod identity;
pub mod ledger;
pub mod node;
pub mod sync;
pub mod transport;
