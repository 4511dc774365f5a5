//! HTTP beat generator sink
//!
//! Sends the tempo to a single authenticated endpoint:
//!
//! ```text
//! POST {base_url}/api/beat-generator/real-time
//! x-api-key: <key>
//!
//! bpm=<integer>
//! ```
//!
//! The server answers `204 No Content` on success. A `401` can be transient
//! (the first call may refresh the session behind the API key), so it is
//! retried exactly once, synchronously. The request itself goes through the
//! [`HttpTransport`] seam so the retry policy can be exercised without a
//! server.

#[cfg(feature = "http")]
pub mod client;

#[cfg(feature = "http")]
pub use client::ReqwestTransport;

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Success status of the beat generator endpoint
pub const STATUS_NO_CONTENT: u16 = 204;
/// Status that triggers the single retry
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Number of requests a single `send` may issue
const MAX_ATTEMPTS: u32 = 2;

/// How the `bpm` field is encoded in the request body
///
/// The Aurora beat generator reads a form field, so `Form` is the default.
/// `Json` is for servers that expect a `{"bpm": <integer>}` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// `application/x-www-form-urlencoded`: `bpm=128`
    #[default]
    Form,
    /// `application/json`: `{"bpm":128}`
    Json,
}

/// One POST to the beat generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatRequest<'a> {
    pub url: &'a str,
    pub api_key: &'a str,
    pub bpm: i64,
    pub encoding: BodyEncoding,
}

/// Performs the HTTP round-trip and reports the response status.
///
/// Errors are reserved for failures where no status was received.
pub trait HttpTransport: Send {
    fn post(&self, request: &BeatRequest<'_>) -> Result<u16>;
}

/// Sink for one HTTP target
pub struct HttpSink {
    url: String,
    api_key: String,
    encoding: BodyEncoding,
    transport: Box<dyn HttpTransport>,
}

impl HttpSink {
    /// Create a sink posting to `url` (the full endpoint URL)
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        encoding: BodyEncoding,
        transport: Box<dyn HttpTransport>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            encoding,
            transport,
        }
    }

    /// Endpoint this sink posts to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a BPM value. The value is rounded to the nearest integer.
    pub fn send(&self, value: f32) -> Result<()> {
        let request = BeatRequest {
            url: &self.url,
            api_key: &self.api_key,
            bpm: value.round() as i64,
            encoding: self.encoding,
        };

        let mut attempt = 1;
        loop {
            let status = self.transport.post(&request)?;
            trace!("POST {} bpm={} -> {}", self.url, request.bpm, status);

            match status {
                STATUS_NO_CONTENT => return Ok(()),
                STATUS_UNAUTHORIZED if attempt < MAX_ATTEMPTS => {
                    debug!("{} answered 401, retrying once", self.url);
                    attempt += 1;
                }
                STATUS_UNAUTHORIZED => return Err(DispatchError::Unauthorized),
                other => return Err(DispatchError::Rejected(other)),
            }
        }
    }
}

impl std::fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSink")
            .field("url", &self.url)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}
