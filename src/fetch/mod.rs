//! Reactive, cancellable HTTP fetching.
//!
//! - [`create_fetch`] / [`create_fetch_with`] — build a [`FetchController`].
//! - [`Transport`] — the network seam, with [`ReqwestTransport`] as default.
//! - [`RequestOptions`], [`Request`], [`Response`] — the request/response model.
//! - [`FetchConfig`] — base URL and default headers.
//! - [`FetchError`] — what ends up in the controller's `error` signal.

pub mod config;
pub mod controller;
pub mod error;
pub mod request;
pub mod response;
pub mod transport;

pub use config::FetchConfig;
pub use controller::{create_fetch, create_fetch_with, FetchController};
pub use error::FetchError;
pub use request::{Request, RequestOptions};
pub use response::Response;
pub use transport::{ReqwestTransport, Transport};
