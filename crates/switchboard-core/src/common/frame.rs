//! Length-prefixed frame codec for the relay transport.
//!
//! Every frame on the wire is a 4-byte little-endian `u32` length prefix
//! followed by exactly that many bytes of JSON. The JSON object is
//! internally tagged by a `kind` field so both sides can dispatch without
//! peeking at payload internals.
//!
//! ## Stream semantics
//! - End of stream before a complete frame header is a clean shutdown and
//!   surfaces as `Ok(None)`.
//! - End of stream inside a frame body means the peer died mid-frame and
//!   surfaces as [`Error::Transport`].
//! - A length prefix above [`MAX_FRAME_SIZE`] or a payload that does not
//!   decode as a frame object surfaces as [`Error::Frame`]; once framing is
//!   violated there is no way to find the next frame boundary, so callers
//!   treat it as fatal.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::error::{Error, Result};
use crate::common::types::{HttpRequest, HttpResponse};

/// Size in bytes of the length prefix preceding every frame.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Upper bound on a frame payload, enforced before any allocation.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// One relay frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// Liveness probe, answered in kind without dispatching any work.
    Heartbeat,
    /// One HTTP request to serve (supervisor to worker).
    Request(HttpRequest),
    /// One HTTP response to relay back (worker to supervisor).
    Response(HttpResponse),
    /// A request-level failure the supervisor surfaces to the client as a
    /// 500 (worker to supervisor).
    Error { message: String },
}

/// Reads one frame, or `None` when the stream ended cleanly.
///
/// # Behavior
/// Blocks until a full frame (header and payload) is available. A clean end
/// of stream before a complete header yields `Ok(None)`; the peer closing
/// mid-payload does not.
///
/// # Errors
/// - [`Error::Transport`]: the stream failed or ended inside a frame body.
/// - [`Error::Frame`]: the length prefix exceeds [`MAX_FRAME_SIZE`] or the
///   payload is not a valid frame object.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        // The peer closed the stream between frames: a clean shutdown.
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(Error::frame(format!(
            "length prefix {len} exceeds maximum frame size {MAX_FRAME_SIZE}"
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    let frame = serde_json::from_slice(&payload)
        .map_err(|e| Error::frame(format!("undecodable frame payload: {e}")))?;
    Ok(Some(frame))
}

/// Writes one frame and flushes the stream so the peer sees it immediately.
///
/// # Errors
/// - [`Error::Frame`]: the encoded frame would exceed [`MAX_FRAME_SIZE`].
/// - [`Error::Transport`]: the stream failed.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(frame)
        .map_err(|e| Error::frame(format!("unencodable frame: {e}")))?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(Error::frame(format!(
            "payload of {} bytes exceeds maximum frame size {MAX_FRAME_SIZE}",
            payload.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(&payload);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
