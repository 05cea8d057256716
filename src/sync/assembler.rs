// Sync Assembler - Collects a bracketed full-state stream
//
// A full-state sync arrives as two brackets on the same channel:
//   SYNC_BAL_START, SYNC_BAL*, SYNC_BAL_END
//   SYNC_LED_START, SYNC_LED*, SYNC_LED_END
// The brackets may come in either order or interleaved. The assembled state
// is released once, after both brackets of an exchange have closed.

use crate::identity::Identity;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Which of the two sync streams a message belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bracket {
    Balances,
    Ledger,
}

impl fmt::Display for Bracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bracket::Balances => f.write_str("balances"),
            Bracket::Ledger => f.write_str("ledger"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Received {0} entry while not syncing {0}")]
    EntryOutsideBracket(Bracket),
}

/// Progress of one bracket within the current exchange
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BracketState {
    /// No bracket seen since the last release
    #[default]
    Idle,
    /// Start marker seen, entries are being buffered
    Open,
    /// End marker seen, waiting for the other bracket
    Complete,
}

/// A fully received peer state, ready to be applied
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssembledState {
    pub balances: BTreeMap<Identity, u64>,
    pub ledger: Vec<String>,
}

impl AssembledState {
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty() && self.ledger.is_empty()
    }
}

/// Per-connection buffers for an in-flight full-state sync
#[derive(Debug, Default)]
pub struct SyncAssembler {
    balances: BTreeMap<Identity, u64>,
    balances_state: BracketState,
    ledger: Vec<String>,
    ledger_state: BracketState,
}

impl SyncAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balances_state(&self) -> BracketState {
        self.balances_state
    }

    pub fn ledger_state(&self) -> BracketState {
        self.ledger_state
    }

    pub fn is_open(&self, bracket: Bracket) -> bool {
        match bracket {
            Bracket::Balances => self.balances_state == BracketState::Open,
            Bracket::Ledger => self.ledger_state == BracketState::Open,
        }
    }

    pub fn buffered_balances(&self) -> usize {
        self.balances.len()
    }

    pub fn buffered_ledger(&self) -> usize {
        self.ledger.len()
    }

    // ========================================================================
    // BALANCES BRACKET
    // ========================================================================

    pub fn open_balances(&mut self) {
        self.balances.clear();
        self.balances_state = BracketState::Open;
    }

    pub fn push_balance(&mut self, identity: Identity, balance: u64) -> Result<(), AssemblyError> {
        if self.balances_state != BracketState::Open {
            return Err(AssemblyError::EntryOutsideBracket(Bracket::Balances));
        }
        self.balances.insert(identity, balance);
        Ok(())
    }

    /// Close the balances bracket and release the state if the exchange is done
    pub fn close_balances(&mut self) -> Option<AssembledState> {
        if self.balances_state == BracketState::Open {
            self.balances_state = BracketState::Complete;
        }
        self.try_release()
    }

    // ========================================================================
    // LEDGER BRACKET
    // ========================================================================

    pub fn open_ledger(&mut self) {
        self.ledger.clear();
        self.ledger_state = BracketState::Open;
    }

    /// Buffer an already unescaped ledger line
    pub fn push_ledger(&mut self, line: String) -> Result<(), AssemblyError> {
        if self.ledger_state != BracketState::Open {
            return Err(AssemblyError::EntryOutsideBracket(Bracket::Ledger));
        }
        self.ledger.push(line);
        Ok(())
    }

    pub fn close_ledger(&mut self) -> Option<AssembledState> {
        if self.ledger_state == BracketState::Open {
            self.ledger_state = BracketState::Complete;
        }
        self.try_release()
    }

    // ========================================================================
    // RELEASE
    // ========================================================================

    /// Hand out the buffers once both brackets are complete.
    ///
    /// The buffers are cleared either way; `None` is returned when the
    /// exchange was empty or a bracket is still missing.
    fn try_release(&mut self) -> Option<AssembledState> {
        if self.balances_state != BracketState::Complete
            || self.ledger_state != BracketState::Complete
        {
            return None;
        }

        self.balances_state = BracketState::Idle;
        self.ledger_state = BracketState::Idle;

        let state = AssembledState {
            balances: std::mem::take(&mut self.balances),
            ledger: std::mem::take(&mut self.ledger),
        };

        if state.is_empty() {
            None
        } else {
            Some(state)
        }
    }
}
