// Ledger module - THE SHARED HISTORY
// Handles balances, the transaction journal and transfer validation

mod journal;
mod state;
mod transfer;

pub use journal::{format_entry, Journal, TIMESTAMP_FORMAT};
pub use state::{AppliedTransfer, LedgerState, LedgerStatistics, StateSnapshot, INITIAL_BALANCE};
pub use transfer::{Transfer, TransferRequest, ValidationError};
