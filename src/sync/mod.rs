// Sync module - HOW NODES TALK
// Wire message codec and the assembly of bracketed full-state streams

mod assembler;
mod protocol;

pub use assembler::{AssembledState, AssemblyError, Bracket, BracketState, SyncAssembler};
pub use protocol::{
    escape_ledger_line, unescape_ledger_line, MessageKind, ProtocolError, WireMessage,
    FIELD_DELIMITER, LEDGER_ESCAPE,
};
