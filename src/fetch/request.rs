//! Request options and the resolved request handed to a transport.

use std::collections::HashSet;

use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::Serialize;
use url::Url;

/// Per-call request settings. `Default` is a bodiless `GET`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Raw body bytes.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `Content-Type` unless the
    /// caller already chose one.
    pub fn json<B: Serialize + ?Sized>(mut self, value: &B) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(value)?);
        self.headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

/// A fully resolved request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Build a request from `options`, filling in `defaults` for headers the
    /// options do not set.
    pub fn new(url: Url, options: RequestOptions, defaults: &HeaderMap) -> Self {
        let RequestOptions {
            method,
            mut headers,
            body,
        } = options;
        // Iterating a HeaderMap yields one entry per value; decide per name so
        // repeated default values all survive.
        let overridden: HashSet<HeaderName> = headers.keys().cloned().collect();
        for (name, value) in defaults {
            if !overridden.contains(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        Self {
            url,
            method,
            headers,
            body,
        }
    }
}
