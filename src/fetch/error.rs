//! Failure kinds of a fetch session.

use std::sync::Arc;

/// Why a fetch session failed.
///
/// `Clone` so the last failure can be stored in the controller's `error`
/// signal. [`FetchError::Cancelled`] is never stored there.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The request could not complete: bad URL, DNS, connect, body read.
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived but its status is outside 200–299. Displays as the
    /// status text alone.
    #[error("{status_text}")]
    Status { status: u16, status_text: String },

    /// The body is not valid JSON for the requested payload type.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    /// The session was superseded, aborted, or its scope was torn down.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// The HTTP status, for [`FetchError::Status`] only.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(Arc::new(err))
    }
}
