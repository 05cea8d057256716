// Nickname - Validated participant names

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Placeholder identity of a connection whose handshake has not completed.
/// Never accepted as a real participant name.
pub const UNKNOWN_IDENTITY: &str = "UNKNOWN";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Identity cannot be empty")]
    Empty,

    #[error("Identity cannot contain ':' (got '{0}')")]
    ContainsDelimiter(String),

    #[error("Identity cannot contain whitespace (got '{0}')")]
    ContainsWhitespace(String),

    #[error("Identity '{0}' is reserved")]
    Reserved(String),
}

/// A participant name, unique within the observed peer set.
///
/// Valid names are non-empty, contain neither `:` (the wire field delimiter)
/// nor whitespace, and are not the reserved `UNKNOWN` sentinel in any casing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parse and validate a participant name
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        if s.is_empty() {
            return Err(IdentityError::Empty);
        }

        if s.contains(':') {
            return Err(IdentityError::ContainsDelimiter(s.to_string()));
        }

        if s.chars().any(char::is_whitespace) {
            return Err(IdentityError::ContainsWhitespace(s.to_string()));
        }

        if s.eq_ignore_ascii_case(UNKNOWN_IDENTITY) {
            return Err(IdentityError::Reserved(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl std::str::FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
