//! HTTP response wrappers.

use std::collections::HashMap;

use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::StatusCode;

/// Body chunks of a streamed response.
pub type ByteStream = BoxStream<'static, anyhow::Result<Bytes>>;

/// Streamed GET response whose body has not been read yet.
pub struct StreamResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: ByteStream,
}

impl StreamResponse {
    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the Content-Length header.
    ///
    /// A declared length of zero is treated as unknown.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|s| s.trim().parse().ok())
            .filter(|len| *len > 0)
    }
}
