//! Controller configuration.

use http::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use url::Url;

use super::error::FetchError;

/// Configuration shared by every session of a controller.
#[derive(Debug, Clone, Default)]
pub struct FetchConfig {
    /// Base that relative request URLs (`"/api/1"`) are resolved against.
    pub base_url: Option<Url>,
    /// Headers sent with every request. Per-request headers win on conflict.
    pub default_headers: HeaderMap,
}

impl FetchConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL (builder).
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Add a default header (builder).
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Set the `User-Agent` default header (builder).
    pub fn with_user_agent(self, user_agent: HeaderValue) -> Self {
        self.with_header(USER_AGENT, user_agent)
    }

    /// Resolve a request URL against [`base_url`](Self::base_url).
    ///
    /// Absolute URLs pass through unchanged. There is no validation beyond
    /// parsing; a failure is reported as a network error like any other
    /// transport failure.
    pub fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        parsed.map_err(|err| FetchError::Network(format!("invalid url `{url}`: {err}")))
    }
}
