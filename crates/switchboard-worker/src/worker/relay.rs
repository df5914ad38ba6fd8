//! Worker-side endpoint of the relay transport.
//!
//! [`Relay`] wraps the frame codec into the four operations the request
//! loop needs: pull the next inbound event, acknowledge a heartbeat, send a
//! response, and report a request-level failure. It is generic over the
//! byte streams so tests can drive a loop over in-memory pipes exactly as
//! production drives it over stdin/stdout.

use switchboard_core::{Error, Frame, HttpRequest, HttpResponse, Result, read_frame, write_frame};
use tokio::io::{AsyncRead, AsyncWrite};

/// One inbound event from the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// An HTTP request to dispatch.
    Request(HttpRequest),
    /// A liveness probe to acknowledge.
    Heartbeat,
    /// The supervisor closed the stream; the worker should exit cleanly.
    EndOfStream,
}

/// Worker-side endpoint of the relay channel.
pub struct Relay<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> Relay<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Waits for the next inbound event.
    ///
    /// # Errors
    /// - [`Error::Frame`]: the peer sent a malformed frame, or a frame kind
    ///   only the worker may send.
    /// - [`Error::Transport`]: the stream failed mid-frame.
    pub async fn next_event(&mut self) -> Result<RelayEvent> {
        match read_frame(&mut self.reader).await? {
            None => Ok(RelayEvent::EndOfStream),
            Some(Frame::Heartbeat) => Ok(RelayEvent::Heartbeat),
            Some(Frame::Request(request)) => Ok(RelayEvent::Request(request)),
            Some(Frame::Response(_)) | Some(Frame::Error { .. }) => Err(Error::frame(
                "received a worker-to-supervisor frame on the inbound stream",
            )),
        }
    }

    /// Acknowledges a heartbeat probe.
    pub async fn heartbeat(&mut self) -> Result<()> {
        write_frame(&mut self.writer, &Frame::Heartbeat).await
    }

    /// Sends one response back to the supervisor.
    pub async fn respond(&mut self, response: HttpResponse) -> Result<()> {
        write_frame(&mut self.writer, &Frame::Response(response)).await
    }

    /// Reports a request-level failure for the supervisor to surface as a
    /// 500.
    pub async fn report_error(&mut self, message: &str) -> Result<()> {
        write_frame(
            &mut self.writer,
            &Frame::Error {
                message: message.to_string(),
            },
        )
        .await
    }
}
