//! # gilt-fetch
//!
//! Reactive, cancellable HTTP fetching for signal-driven terminal UIs.
//!
//! A [`FetchController`](fetch::FetchController) issues one request at a time
//! and publishes its outcome through three signals (`data`, `error`,
//! `loading`). Starting a new request cancels the one in flight, and
//! disposing the owning scope cancels whatever is left, so a stale response
//! never overwrites fresh state.
//!
//! ## Core Systems
//!
//! - **[`reactive`]** — Signals, effects, batching, ownership scopes (Leptos-style tracking)
//! - **[`fetch`]** — Fetch controller, transport seam, request/response model, errors
//! - **[`testing`]** — Scripted in-memory transport for deterministic tests
//!
//! Everything reactive is single-threaded: controllers live on one thread and
//! their sessions run as local tasks on a tokio [`LocalSet`](tokio::task::LocalSet).

// Reactivity
pub mod reactive;

// Networking
pub mod fetch;

// Test support
pub mod testing;

pub use fetch::{
    create_fetch, create_fetch_with, FetchConfig, FetchController, FetchError, RequestOptions,
};
