//! The network seam of the controller.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::error::FetchError;
use super::request::Request;
use super::response::{status_text, Response};

/// Performs one request.
///
/// Implementations must stop I/O once `cancel` fires and report
/// [`FetchError::Cancelled`]; the controller relies on that failure to keep
/// superseded sessions from touching its state.
#[async_trait(?Send)]
pub trait Transport {
    async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, TLS, redirect policy...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        let Request {
            url,
            method,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        // Dropping the pending reqwest future aborts the connection.
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            r = builder.send() => r?,
        };

        let final_url = res.url().clone();
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        trace!(url = %final_url, status, "response headers received");

        // Fetch body. We don't do streaming.
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            b = res.bytes() => b?.to_vec(),
        };

        Ok(Response {
            url: final_url,
            status,
            status_text: status_text(status),
            headers,
            body,
        })
    }
}
