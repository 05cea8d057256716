// Transport module - THE WIRE
// Length-prefixed text framing over TCP, connection identifiers and timeouts

mod framing;
mod types;

pub use framing::{
    encode_frame, ensure_frame_fits, read_frame, with_timeout, write_frame, LENGTH_PREFIX_LEN,
    MAX_FRAME_LEN,
};

pub use types::{
    // Configuration
    TransportConfig, DEFAULT_OUTBOX_CAPACITY,
    // Connection types
    ConnectionId, ConnectionState, Direction,
    // Errors
    TransportError,
};
