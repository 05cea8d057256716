// Ledger State - Balances and transaction history held by one node

use crate::identity::Identity;
use crate::ledger::journal::{format_entry, Journal};
use crate::ledger::transfer::{Transfer, TransferRequest, ValidationError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balance every participant starts with when first learned
pub const INITIAL_BALANCE: u64 = 100;

/// Result of applying a validated transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedTransfer {
    pub transfer: Transfer,
    /// The journal line rendered for this transfer
    pub entry: String,
    /// False when an identical line already existed. Balances moved anyway.
    pub recorded: bool,
}

/// Point-in-time copy of the full state, as streamed during a sync
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub balances: Vec<(Identity, u64)>,
    pub ledger: Vec<String>,
}

/// Statistics about the ledger state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerStatistics {
    pub known_identities: usize,
    pub ledger_entries: usize,
    pub total_supply: u128,
}

/// The node's view of the network: who holds how much, and what happened.
///
/// Every mutation caused by a transfer preserves the total supply. Learning a
/// new participant mints `initial_balance` out of nothing.
#[derive(Clone, Debug)]
pub struct LedgerState {
    /// This node's own identity, always present in `balances`
    own: Identity,
    initial_balance: u64,
    balances: BTreeMap<Identity, u64>,
    journal: Journal,
}

impl LedgerState {
    /// Create a state holding only our own starting balance
    pub fn new(own: Identity, initial_balance: u64) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(own.clone(), initial_balance);
        Self {
            own,
            initial_balance,
            balances,
            journal: Journal::new(),
        }
    }

    pub fn own_identity(&self) -> &Identity {
        &self.own
    }

    pub fn initial_balance(&self) -> u64 {
        self.initial_balance
    }

    pub fn balance(&self, identity: &str) -> Option<u64> {
        self.balances.get(identity).copied()
    }

    pub fn own_balance(&self) -> u64 {
        self.balance(self.own.as_str()).unwrap_or(0)
    }

    pub fn is_known(&self, identity: &str) -> bool {
        self.balances.contains_key(identity)
    }

    pub fn balances(&self) -> &BTreeMap<Identity, u64> {
        &self.balances
    }

    pub fn ledger(&self) -> &[String] {
        self.journal.entries()
    }

    // ========================================================================
    // TRANSFERS
    // ========================================================================

    /// Validate and apply a transfer, stamping the journal line with `at`.
    ///
    /// On error nothing changes. On success the debit, the credit and the
    /// journal append happen together.
    pub fn apply_transfer(
        &mut self,
        request: &TransferRequest,
        at: &NaiveDateTime,
    ) -> Result<AppliedTransfer, ValidationError> {
        let transfer = request.validate(&self.balances)?;

        // validate() guarantees both keys exist and the credit cannot overflow
        if let Some(balance) = self.balances.get_mut(&transfer.sender) {
            *balance -= transfer.amount;
        }
        if let Some(balance) = self.balances.get_mut(&transfer.recipient) {
            *balance += transfer.amount;
        }

        let entry = format_entry(&transfer, at);
        let recorded = self.journal.record(entry.clone());

        Ok(AppliedTransfer {
            transfer,
            entry,
            recorded,
        })
    }

    // ========================================================================
    // MEMBERSHIP
    // ========================================================================

    /// Insert `identity` with `balance` if it is not yet known.
    /// Returns `true` if an entry was created.
    pub fn insert_if_absent(&mut self, identity: Identity, balance: u64) -> bool {
        if self.balances.contains_key(&identity) {
            return false;
        }
        self.balances.insert(identity, balance);
        true
    }

    /// Learn about a participant announced by gossip.
    ///
    /// Our own identity is never overwritten; known identities keep their
    /// balance (first seen wins). Returns `true` only for a fresh insert.
    pub fn learn(&mut self, identity: Identity, balance: u64) -> bool {
        if identity == self.own {
            return false;
        }
        self.insert_if_absent(identity, balance)
    }

    // ========================================================================
    // FULL STATE
    // ========================================================================

    /// Copy out the full state for streaming to a peer
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            balances: self
                .balances
                .iter()
                .map(|(id, bal)| (id.clone(), *bal))
                .collect(),
            ledger: self.journal.entries().to_vec(),
        }
    }

    /// Replace balances and history wholesale with a peer's state.
    ///
    /// There is no merge: the received state wins. Our own balance is taken
    /// from the received mapping, or reset to the initial balance if absent.
    /// Returns `false` (and changes nothing) when both collections are empty.
    pub fn replace_with(&mut self, balances: BTreeMap<Identity, u64>, ledger: Vec<String>) -> bool {
        if balances.is_empty() && ledger.is_empty() {
            return false;
        }

        let own_balance = balances
            .get(&self.own)
            .copied()
            .unwrap_or(self.initial_balance);

        self.balances = balances;
        self.balances.insert(self.own.clone(), own_balance);
        self.journal.replace(ledger);
        true
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> u128 {
        self.balances.values().map(|b| *b as u128).sum()
    }

    pub fn statistics(&self) -> LedgerStatistics {
        LedgerStatistics {
            known_identities: self.balances.len(),
            ledger_entries: self.journal.len(),
            total_supply: self.total_supply(),
        }
    }
}
