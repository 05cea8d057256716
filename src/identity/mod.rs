// Identity module - WHO IS WHO
// Participant names: validation and the reserved pre-handshake sentinel

mod nickname;

pub use nickname::{Identity, IdentityError, UNKNOWN_IDENTITY};
