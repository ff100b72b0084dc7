//! MockTransport: scripted, in-memory [`Transport`] for tests.
//!
//! Replies are keyed by URL path. A route can be *held* behind a [`Gate`] so
//! the test decides when the response arrives, which is how the
//! slow-request/fast-request interleavings are reproduced deterministically.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::fetch::{FetchError, Request, Response, Transport};

// ---------------------------------------------------------------------------
// MockReply
// ---------------------------------------------------------------------------

/// What a route answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A response with this status and body.
    Respond { status: u16, body: Vec<u8> },
    /// A transport-level failure.
    Fail(String),
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        MockReply::Respond {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        MockReply::Respond {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    /// An empty body with this status.
    pub fn status(status: u16) -> Self {
        MockReply::Respond {
            status,
            body: Vec::new(),
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        MockReply::Fail(message.into())
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Holds a route's reply until [`release`](Gate::release) is called.
#[derive(Debug, Clone)]
pub struct Gate {
    notify: Rc<Notify>,
}

impl Gate {
    /// Let one pending (or the next) request on the route complete.
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

struct Route {
    reply: MockReply,
    gate: Option<Rc<Notify>>,
}

/// A headless transport for testing.
///
/// Unknown paths answer `404 Not Found`. Every request is recorded, and so is
/// every request that observed its cancellation token.
///
/// # Examples
///
/// ```ignore
/// let mock = Rc::new(MockTransport::new());
/// mock.route("/api/1", MockReply::json(200, json!({ "id": 1 })));
/// let fetch = create_fetch_with::<Value>(mock.clone(), config);
/// fetch.start("/api/1", RequestOptions::default()).await;
/// assert_eq!(mock.requests().len(), 1);
/// ```
#[derive(Default)]
pub struct MockTransport {
    routes: RefCell<HashMap<String, Route>>,
    requests: RefCell<Vec<Request>>,
    cancelled: RefCell<Vec<String>>,
    ignore_cancellation: Cell<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `path` immediately.
    pub fn route(&self, path: &str, reply: MockReply) {
        self.routes
            .borrow_mut()
            .insert(path.to_owned(), Route { reply, gate: None });
    }

    /// Answer requests for `path` only once the returned gate is released.
    pub fn hold(&self, path: &str, reply: MockReply) -> Gate {
        let notify = Rc::new(Notify::new());
        self.routes.borrow_mut().insert(
            path.to_owned(),
            Route {
                reply,
                gate: Some(notify.clone()),
            },
        );
        Gate { notify }
    }

    /// Simulate a transport that keeps going after cancellation and still
    /// returns its reply.
    pub fn ignore_cancellation(&self, ignore: bool) {
        self.ignore_cancellation.set(ignore);
    }

    /// All requests seen so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    /// Paths of requests that were cancelled before their reply was sent.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.borrow().clone()
    }

    fn lookup(&self, path: &str) -> (MockReply, Option<Rc<Notify>>) {
        match self.routes.borrow().get(path) {
            Some(route) => (route.reply.clone(), route.gate.clone()),
            None => (MockReply::status(404), None),
        }
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        let url = request.url.clone();
        let path = url.path().to_owned();
        self.requests.borrow_mut().push(request);

        let (reply, gate) = self.lookup(&path);

        if self.ignore_cancellation.get() {
            if let Some(gate) = gate {
                gate.notified().await;
            }
        } else {
            let cancelled = match gate {
                Some(gate) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = gate.notified() => false,
                },
                None => cancel.is_cancelled(),
            };
            if cancelled {
                self.cancelled.borrow_mut().push(path);
                return Err(FetchError::Cancelled);
            }
        }

        match reply {
            MockReply::Respond { status, body } => Ok(Response::new(url, status, body)),
            MockReply::Fail(message) => Err(FetchError::Network(message)),
        }
    }
}
