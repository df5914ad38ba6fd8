//! Error types for the relay worker system.
//!
//! This module defines the central `Error` enum, which captures every failure
//! a worker can observe and classifies each as either recoverable within the
//! request loop or fatal to the process. The loop's continue/terminate
//! decision is [`Error::is_fatal`]; nothing downstream needs to inspect
//! error internals.
//!
//! ## Error Cases
//! - `InvalidRequest`: The client request was malformed or missing required
//!   fields. Recovered locally as a 400 response.
//! - `Database`: A statement failed while serving a request. Reported to the
//!   supervisor as an error frame; the loop continues.
//! - `PoolInit`: The connection pool could not be constructed at startup.
//! - `Frame`: A frame on the relay violated the wire protocol.
//! - `Transport`: The relay byte stream failed or ended mid-frame.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the relay worker system.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The client request was invalid or missing required fields.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A database statement failed while serving a request.
    #[error("Database error: {context}")]
    Database { context: String },

    /// The connection pool could not be brought up at startup.
    #[error("Pool initialization error: {context}")]
    PoolInit { context: String },

    /// A relay frame violated the wire protocol (bad length, bad payload).
    #[error("Frame error: {context}")]
    Frame { context: String },

    /// The relay byte stream failed.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl Error {
    /// Builds an [`Error::InvalidRequest`] with the given reason.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Builds an [`Error::Database`] from any displayable driver error.
    pub fn database(err: impl core::fmt::Display) -> Self {
        Self::Database {
            context: err.to_string(),
        }
    }

    /// Builds an [`Error::PoolInit`] with the given context.
    pub fn pool_init(context: impl Into<String>) -> Self {
        Self::PoolInit {
            context: context.into(),
        }
    }

    /// Builds an [`Error::Frame`] with the given context.
    pub fn frame(context: impl Into<String>) -> Self {
        Self::Frame {
            context: context.into(),
        }
    }

    /// Whether this error must terminate the request loop.
    ///
    /// Recoverable errors (`InvalidRequest`, `Database`) are reported through
    /// the relay and the loop moves on to the next frame. Everything else
    /// means the process can no longer make progress safely.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidRequest { .. } | Self::Database { .. } => false,
            Self::PoolInit { .. } | Self::Frame { .. } | Self::Transport(_) => true,
        }
    }
}
