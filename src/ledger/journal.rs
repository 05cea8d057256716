// Journal - The append-only list of formatted transaction lines

use crate::ledger::transfer::Transfer;
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// Rendering of the timestamp at the start of every journal line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a transfer as a journal line.
///
/// Timestamps have one-second precision, so two identical transfers inside the
/// same second render to the same line.
pub fn format_entry(transfer: &Transfer, at: &NaiveDateTime) -> String {
    format!(
        "{} | {} sent {} coins to {}",
        at.format(TIMESTAMP_FORMAT),
        transfer.sender,
        transfer.amount,
        transfer.recipient
    )
}

/// Insertion-ordered transaction history.
///
/// Deduplication is by exact string equality of the rendered line.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entries: Vec<String>,
    /// Index for the duplicate check
    seen: HashSet<String>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line unless an identical line is already present.
    /// Returns `true` if the line was appended.
    pub fn record(&mut self, line: String) -> bool {
        if self.seen.contains(&line) {
            return false;
        }
        self.seen.insert(line.clone());
        self.entries.push(line);
        true
    }

    /// Replace the whole history, preserving the received order verbatim
    pub fn replace(&mut self, lines: Vec<String>) {
        self.seen = lines.iter().cloned().collect();
        self.entries = lines;
    }

    pub fn contains(&self, line: &str) -> bool {
        self.seen.contains(line)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
