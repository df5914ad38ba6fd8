//! Request and response value objects carried inside relay frames.
//!
//! These mirror the HTTP exchange the supervisor terminates on behalf of the
//! worker: the supervisor parses the socket-level request, wraps it in an
//! [`HttpRequest`], and unwraps the worker's [`HttpResponse`] back onto the
//! socket. Both are plain serde structs; bodies travel base64-encoded so the
//! JSON envelope stays valid for arbitrary bytes.
//!
//! ## Conventions
//! - `headers` is an ordered list of pairs, not a map, so repeated header
//!   names survive the round trip.
//! - Empty header lists and absent bodies are omitted from the wire entirely.
//! - The request `target` is the raw path plus optional query string;
//!   [`HttpRequest::path`] and [`HttpRequest::query_pairs`] split and decode
//!   it on demand.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::common::error::{Error, Result};

/// One HTTP request as delivered by the supervisor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Request method, uppercase (`GET`, `POST`, ...).
    pub method: String,
    /// Raw request target: a path with an optional query string, e.g.
    /// `/contacts?limit=10`.
    pub target: String,
    /// Header pairs in arrival order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    /// Request body, base64-encoded. Omitted when there is none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_b64: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: Vec::new(),
            body_b64: None,
        }
    }

    /// Attaches a body, encoding it for transport.
    pub fn with_body(mut self, body: impl AsRef<[u8]>) -> Self {
        self.body_b64 = Some(STANDARD.encode(body.as_ref()));
        self
    }

    /// Decodes the body, or returns an empty buffer when none was sent.
    ///
    /// # Errors
    /// Returns [`Error::Frame`] if the body is not valid base64. The
    /// supervisor produces the encoding, so a bad one is a protocol
    /// violation, not a client mistake.
    pub fn body(&self) -> Result<Vec<u8>> {
        match &self.body_b64 {
            Some(b64) => STANDARD
                .decode(b64)
                .map_err(|e| Error::frame(format!("invalid request body encoding: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    /// The path component of the target, without the query string.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The raw query string, if the target has one.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// Decoded query parameters in arrival order.
    ///
    /// Percent-escapes and `+` spaces are resolved per the
    /// `application/x-www-form-urlencoded` rules.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match self.query() {
            Some(query) => form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }
}

/// One HTTP response for the supervisor to relay back to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Header pairs to emit, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    /// Response body, base64-encoded. Omitted when there is none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_b64: Option<String>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body_b64: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches a body, encoding it for transport.
    pub fn with_body(mut self, body: impl AsRef<[u8]>) -> Self {
        self.body_b64 = Some(STANDARD.encode(body.as_ref()));
        self
    }

    /// Builds a JSON response with a matching `content-type` header.
    ///
    /// # Errors
    /// Returns [`Error::Frame`] if the value cannot be serialized, which
    /// would leave the worker unable to answer the request at all.
    pub fn json(status: u16, value: &impl Serialize) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::frame(format!("unencodable response body: {e}")))?;
        Ok(Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    /// Builds a plain-text response with a matching `content-type` header.
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain")
            .with_body(body.as_bytes())
    }

    /// Decodes the body, or returns an empty buffer when none was set.
    ///
    /// # Errors
    /// Returns [`Error::Frame`] if the body is not valid base64.
    pub fn body(&self) -> Result<Vec<u8>> {
        match &self.body_b64 {
            Some(b64) => STANDARD
                .decode(b64)
                .map_err(|e| Error::frame(format!("invalid response body encoding: {e}"))),
            None => Ok(Vec::new()),
        }
    }
}
