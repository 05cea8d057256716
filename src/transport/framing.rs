// Framing - Discrete text messages over a byte stream
//
// Each frame is a 2-byte big-endian length followed by that many bytes of
// UTF-8 text. The transport never splits or coalesces messages.

use crate::transport::TransportError;
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame body the 2-byte length prefix can describe
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Size of the length prefix
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Check that `text` fits in one frame
pub fn ensure_frame_fits(text: &str) -> Result<(), TransportError> {
    if text.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            size: text.len(),
            max: MAX_FRAME_LEN,
        });
    }
    Ok(())
}

/// Encode one message into its framed byte form
pub fn encode_frame(text: &str) -> Result<Vec<u8>, TransportError> {
    ensure_frame_fits(text)?;
    let body = text.as_bytes();

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Write one framed message and flush it
pub async fn write_frame<W>(writer: &mut W, text: &str) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(text)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next complete framed message.
///
/// A clean end of stream before the length prefix is `ConnectionClosed`.
pub async fn read_frame<R>(reader: &mut R) -> Result<String, TransportError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u16().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(TransportError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    };

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            TransportError::ConnectionClosed
        } else {
            TransportError::Io(e)
        }
    })?;

    String::from_utf8(body).map_err(|_| TransportError::InvalidUtf8)
}

/// Run `fut`, bounded by `limit` when one is configured
pub async fn with_timeout<F, T>(
    limit: Option<Duration>,
    what: &'static str,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TransportError::Timeout(what))?,
        None => fut.await,
    }
}
