// Framing Tests
// Tests for length-prefixed text frames and transport configuration

use meshledger::transport::{
    encode_frame, read_frame, with_timeout, write_frame, ConnectionId, ConnectionState,
    Direction, TransportConfig, TransportError, LENGTH_PREFIX_LEN, MAX_FRAME_LEN,
};
use std::time::Duration;
use tokio::io::{duplex, AsyncWriteExt};

// ============================================================================
// FRAMES
// ============================================================================

#[tokio::test]
async fn test_frames_keep_message_boundaries() {
    let (mut a, mut b) = duplex(1024);

    write_frame(&mut a, "CHAT:one").await.unwrap();
    write_frame(&mut a, "").await.unwrap();
    write_frame(&mut a, "CHAT:three").await.unwrap();

    assert_eq!(read_frame(&mut b).await.unwrap(), "CHAT:one");
    assert_eq!(read_frame(&mut b).await.unwrap(), "");
    assert_eq!(read_frame(&mut b).await.unwrap(), "CHAT:three");
}

#[tokio::test]
async fn test_frame_carries_multibyte_text() {
    let (mut a, mut b) = duplex(1024);
    write_frame(&mut a, "CHAT:привет").await.unwrap();

    assert_eq!(read_frame(&mut b).await.unwrap(), "CHAT:привет");
}

#[test]
fn test_length_prefix_counts_bytes() {
    let frame = encode_frame("é").unwrap();
    assert_eq!(frame.len(), LENGTH_PREFIX_LEN + 2);
    assert_eq!(&frame[..2], &[0, 2]);
}

#[test]
fn test_frame_size_limit() {
    assert!(encode_frame(&"x".repeat(MAX_FRAME_LEN)).is_ok());
    assert!(matches!(
        encode_frame(&"x".repeat(MAX_FRAME_LEN + 1)),
        Err(TransportError::FrameTooLarge { .. })
    ));
}

#[tokio::test]
async fn test_truncated_body_is_closed() {
    let (mut a, mut b) = duplex(64);
    a.write_all(&[0, 10, b'a', b'b']).await.unwrap();
    drop(a);

    assert!(matches!(
        read_frame(&mut b).await,
        Err(TransportError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_invalid_utf8_rejected() {
    let (mut a, mut b) = duplex(64);
    a.write_all(&[0, 2, 0xff, 0xfe]).await.unwrap();

    assert!(matches!(
        read_frame(&mut b).await,
        Err(TransportError::InvalidUtf8)
    ));
}

// ============================================================================
// TIMEOUTS
// ============================================================================

#[tokio::test]
async fn test_with_timeout_expires() {
    let (_a, mut b) = duplex(64);
    let result = with_timeout(Some(Duration::from_millis(20)), "read", read_frame(&mut b)).await;

    assert!(matches!(result, Err(TransportError::Timeout("read"))));
}

#[tokio::test]
async fn test_with_timeout_none_waits() {
    let (mut a, mut b) = duplex(64);
    write_frame(&mut a, "x").await.unwrap();

    assert_eq!(with_timeout(None, "read", read_frame(&mut b)).await.unwrap(), "x");
}

// ============================================================================
// CONFIG AND TYPES
// ============================================================================

#[test]
fn test_transport_config_defaults() {
    let config = TransportConfig::default();
    assert_eq!(config.connect_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.handshake_timeout(), None);
    assert_eq!(config.read_timeout(), None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_transport_config_builder() {
    let config = TransportConfig::new()
        .with_connect_timeout(None)
        .with_handshake_timeout(Some(5))
        .with_read_timeout(Some(60));

    assert_eq!(config.connect_timeout(), None);
    assert_eq!(config.handshake_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.read_timeout(), Some(Duration::from_secs(60)));
}

#[test]
fn test_transport_config_rejects_zero() {
    let config = TransportConfig::new().with_handshake_timeout(Some(0));
    assert!(matches!(config.validate(), Err(TransportError::InvalidConfig(_))));
}

#[test]
fn test_connection_ids_are_unique() {
    let a = ConnectionId::generate();
    let b = ConnectionId::generate();
    assert_ne!(a, b);
    assert_eq!(a.to_string().len(), 16);
}

#[test]
fn test_connection_state_lifecycle() {
    let inbound = ConnectionState::initial(Direction::Inbound);
    assert_eq!(inbound, ConnectionState::Handshaking);
    assert!(inbound.can_transition_to(&ConnectionState::Active));
    assert!(!ConnectionState::Active.can_transition_to(&ConnectionState::Handshaking));
    assert!(ConnectionState::Handshaking.can_transition_to(&ConnectionState::Closed));
    assert!(ConnectionState::Closed.is_closed());
    assert_eq!(Direction::Outbound.to_string(), "OUT");
}
