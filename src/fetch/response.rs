//! Minimal HTTP response model.
//!
//! A **fully buffered** response as returned by a [`Transport`]: the final URL
//! (after redirects, if the client follows them), status code and reason,
//! headers, and the raw body bytes. The controller only ever looks at the
//! status and decodes the body as JSON.
//!
//! [`Transport`]: super::transport::Transport

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::error::FetchError;

/// What a transport hands back once the whole body has been read.
#[derive(Debug, Clone)]
pub struct Response {
    /// Where the request ended up, redirects included.
    pub url: Url,

    pub status: u16,

    /// Reason phrase for `status`; [`FetchError::Status`] displays it.
    pub status_text: String,

    pub headers: HeaderMap,

    /// Buffered body, decoded by [`Response::json`].
    pub body: Vec<u8>,
}

impl Response {
    /// Build a response with the canonical reason phrase for `status`.
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url,
            status,
            status_text: status_text(status),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// `true` for statuses 200–299.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-success status into [`FetchError::Status`].
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.ok() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                status_text: self.status_text,
            })
        }
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Canonical reason phrase for a status code, `"Unknown"` when there is none.
pub fn status_text(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
        .to_string()
}
