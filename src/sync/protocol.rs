// Protocol - Text messages exchanged between nodes
//
// Every frame carries one message of the form `KIND:payload`:
// - CHAT: free text, display only
// - TXN: sender:recipient:amount
// - REQ_SYNC: requester identity
// - SYNC_BAL_START / SYNC_BAL / SYNC_BAL_END: bracketed balances stream
// - SYNC_LED_START / SYNC_LED / SYNC_LED_END: bracketed ledger stream
// - PEER_JOINED: identity:balance gossip

use crate::identity::{Identity, IdentityError};
use crate::ledger::TransferRequest;
use std::fmt;
use thiserror::Error;

/// Separates the kind token from the payload, and payload fields from each other
pub const FIELD_DELIMITER: char = ':';

/// Stands in for `:` inside ledger lines while on the wire
pub const LEDGER_ESCAPE: char = ';';

/// Protocol errors. Each one drops a single message, never the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown message kind: '{0}'")]
    UnknownKind(String),

    #[error("Invalid {kind} format: '{payload}'")]
    InvalidFormat { kind: MessageKind, payload: String },

    #[error("Invalid number in {kind}: '{value}'")]
    InvalidNumber { kind: MessageKind, value: String },

    #[error("Invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),
}

/// Leading token of a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    Transaction,
    SyncRequest,
    SyncBalancesStart,
    SyncBalance,
    SyncBalancesEnd,
    SyncLedgerStart,
    SyncLedgerEntry,
    SyncLedgerEnd,
    PeerJoined,
}

impl MessageKind {
    pub const ALL: [MessageKind; 10] = [
        MessageKind::Chat,
        MessageKind::Transaction,
        MessageKind::SyncRequest,
        MessageKind::SyncBalancesStart,
        MessageKind::SyncBalance,
        MessageKind::SyncBalancesEnd,
        MessageKind::SyncLedgerStart,
        MessageKind::SyncLedgerEntry,
        MessageKind::SyncLedgerEnd,
        MessageKind::PeerJoined,
    ];

    /// The token written on the wire
    pub fn token(&self) -> &'static str {
        match self {
            MessageKind::Chat => "CHAT",
            MessageKind::Transaction => "TXN",
            MessageKind::SyncRequest => "REQ_SYNC",
            MessageKind::SyncBalancesStart => "SYNC_BAL_START",
            MessageKind::SyncBalance => "SYNC_BAL",
            MessageKind::SyncBalancesEnd => "SYNC_BAL_END",
            MessageKind::SyncLedgerStart => "SYNC_LED_START",
            MessageKind::SyncLedgerEntry => "SYNC_LED",
            MessageKind::SyncLedgerEnd => "SYNC_LED_END",
            MessageKind::PeerJoined => "PEER_JOINED",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A decoded protocol message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireMessage {
    Chat(String),
    Transaction(TransferRequest),
    /// Carries the requester's name; the responder streams regardless of it
    SyncRequest(String),
    SyncBalancesStart,
    SyncBalance { identity: Identity, balance: u64 },
    SyncBalancesEnd,
    SyncLedgerStart,
    /// An already unescaped ledger line
    SyncLedgerEntry(String),
    SyncLedgerEnd,
    PeerJoined { identity: Identity, balance: u64 },
}

impl WireMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            WireMessage::Chat(_) => MessageKind::Chat,
            WireMessage::Transaction(_) => MessageKind::Transaction,
            WireMessage::SyncRequest(_) => MessageKind::SyncRequest,
            WireMessage::SyncBalancesStart => MessageKind::SyncBalancesStart,
            WireMessage::SyncBalance { .. } => MessageKind::SyncBalance,
            WireMessage::SyncBalancesEnd => MessageKind::SyncBalancesEnd,
            WireMessage::SyncLedgerStart => MessageKind::SyncLedgerStart,
            WireMessage::SyncLedgerEntry(_) => MessageKind::SyncLedgerEntry,
            WireMessage::SyncLedgerEnd => MessageKind::SyncLedgerEnd,
            WireMessage::PeerJoined { .. } => MessageKind::PeerJoined,
        }
    }

    /// Encode into the text carried by one frame
    pub fn encode(&self) -> String {
        let kind = self.kind().token();
        match self {
            WireMessage::Chat(text) => format!("{kind}:{text}"),
            WireMessage::Transaction(req) => {
                format!("{kind}:{}:{}:{}", req.sender, req.recipient, req.amount)
            }
            WireMessage::SyncRequest(requester) => format!("{kind}:{requester}"),
            WireMessage::SyncBalance { identity, balance }
            | WireMessage::PeerJoined { identity, balance } => {
                format!("{kind}:{identity}:{balance}")
            }
            WireMessage::SyncLedgerEntry(line) => {
                format!("{kind}:{}", escape_ledger_line(line))
            }
            WireMessage::SyncBalancesStart
            | WireMessage::SyncBalancesEnd
            | WireMessage::SyncLedgerStart
            | WireMessage::SyncLedgerEnd => format!("{kind}:"),
        }
    }

    /// Decode one frame's text
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let (token, payload) = text
            .split_once(FIELD_DELIMITER)
            .ok_or_else(|| ProtocolError::UnknownKind(preview(text)))?;

        let kind = MessageKind::from_token(token)
            .ok_or_else(|| ProtocolError::UnknownKind(preview(token)))?;

        let message = match kind {
            MessageKind::Chat => WireMessage::Chat(payload.to_string()),
            MessageKind::Transaction => {
                let fields: Vec<&str> = payload.split(FIELD_DELIMITER).collect();
                if fields.len() != 3 {
                    return Err(ProtocolError::InvalidFormat {
                        kind,
                        payload: preview(payload),
                    });
                }
                WireMessage::Transaction(TransferRequest::new(fields[0], fields[1], fields[2]))
            }
            MessageKind::SyncRequest => WireMessage::SyncRequest(payload.to_string()),
            MessageKind::SyncBalancesStart => WireMessage::SyncBalancesStart,
            MessageKind::SyncBalance => {
                let (identity, balance) = parse_identity_balance(kind, payload)?;
                WireMessage::SyncBalance { identity, balance }
            }
            MessageKind::SyncBalancesEnd => WireMessage::SyncBalancesEnd,
            MessageKind::SyncLedgerStart => WireMessage::SyncLedgerStart,
            MessageKind::SyncLedgerEntry => {
                WireMessage::SyncLedgerEntry(unescape_ledger_line(payload))
            }
            MessageKind::SyncLedgerEnd => WireMessage::SyncLedgerEnd,
            MessageKind::PeerJoined => {
                let (identity, balance) = parse_identity_balance(kind, payload)?;
                WireMessage::PeerJoined { identity, balance }
            }
        };

        Ok(message)
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Replace every `:` with `;` so a ledger line survives as a single field
pub fn escape_ledger_line(line: &str) -> String {
    line.replace(FIELD_DELIMITER, &LEDGER_ESCAPE.to_string())
}

/// Reverse of [`escape_ledger_line`]. Lossy for lines that contained `;`.
pub fn unescape_ledger_line(line: &str) -> String {
    line.replace(LEDGER_ESCAPE, &FIELD_DELIMITER.to_string())
}

fn parse_identity_balance(kind: MessageKind, payload: &str) -> Result<(Identity, u64), ProtocolError> {
    let (name, balance) = payload
        .split_once(FIELD_DELIMITER)
        .ok_or_else(|| ProtocolError::InvalidFormat {
            kind,
            payload: preview(payload),
        })?;

    let balance = balance
        .trim()
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidNumber {
            kind,
            value: balance.to_string(),
        })?;

    Ok((Identity::parse(name)?, balance))
}

/// Truncate untrusted text before it lands in an error or a log line
fn preview(text: &str) -> String {
    const MAX_PREVIEW: usize = 60;
    match text.char_indices().nth(MAX_PREVIEW) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
