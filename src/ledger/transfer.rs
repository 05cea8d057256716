// Transfer - A request to move coins and its validation rules

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Reasons a transfer is rejected. A rejected transfer never touches state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid amount: '{0}' is not an integer")]
    MalformedAmount(String),

    #[error("Transaction amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("Cannot send coins to yourself ('{0}')")]
    SelfTransfer(String),

    #[error("Sender '{0}' not found")]
    UnknownSender(String),

    #[error("Sender '{sender}' has insufficient funds: needs {required}, has {available}")]
    InsufficientFunds {
        sender: String,
        available: u64,
        required: u64,
    },

    #[error("Recipient '{0}' not found")]
    UnknownRecipient(String),

    #[error("Recipient '{0}' balance would overflow")]
    BalanceOverflow(String),
}

/// A transfer exactly as it was requested: raw fields, not yet validated.
///
/// Requests arriving from the network carry the amount as text, so the
/// integer check is the first validation rule rather than a parse step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: String,
}

impl TransferRequest {
    pub fn new(sender: &str, recipient: &str, amount: &str) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount: amount.to_string(),
        }
    }

    /// Build a request from an already-numeric amount
    pub fn with_amount(sender: &str, recipient: &str, amount: i64) -> Self {
        Self::new(sender, recipient, &amount.to_string())
    }

    /// Check the request against a balance table.
    ///
    /// Rules run in a fixed order and the first failure is reported:
    /// integer amount, positive amount, distinct parties, known sender,
    /// sufficient funds, known recipient.
    pub fn validate(&self, balances: &BTreeMap<Identity, u64>) -> Result<Transfer, ValidationError> {
        let amount: i64 = self
            .amount
            .trim()
            .parse()
            .map_err(|_| ValidationError::MalformedAmount(self.amount.clone()))?;

        if amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(amount));
        }
        let amount = amount as u64;

        if self.sender == self.recipient {
            return Err(ValidationError::SelfTransfer(self.sender.clone()));
        }

        let (sender, &available) = balances
            .get_key_value(self.sender.as_str())
            .ok_or_else(|| ValidationError::UnknownSender(self.sender.clone()))?;

        if available < amount {
            return Err(ValidationError::InsufficientFunds {
                sender: self.sender.clone(),
                available,
                required: amount,
            });
        }

        let (recipient, recipient_balance) = balances
            .get_key_value(self.recipient.as_str())
            .ok_or_else(|| ValidationError::UnknownRecipient(self.recipient.clone()))?;

        if recipient_balance.checked_add(amount).is_none() {
            return Err(ValidationError::BalanceOverflow(self.recipient.clone()));
        }

        Ok(Transfer {
            sender: sender.clone(),
            recipient: recipient.clone(),
            amount,
        })
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} -> {}", self.sender, self.amount, self.recipient)
    }
}

/// A transfer that passed validation against the current balances
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub sender: Identity,
    pub recipient: Identity,
    pub amount: u64,
}
