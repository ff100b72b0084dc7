//! The fetch controller: one cancellable request at a time, published
//! through three signals.
//!
//! ```ignore
//! let fetch = create_fetch::<serde_json::Value>();
//! create_effect(move || {
//!     if fetch.loading().get() {
//!         show_spinner();
//!     }
//! });
//! fetch.execute("https://example.com/api/1");
//! ```
//!
//! Each `execute` starts a new *session*. Starting one cancels the previous
//! session's token before anything else happens, and a cancelled session
//! never writes `data` or `error`. That pairing is what keeps a slow, stale
//! response from overwriting a newer one.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::FetchConfig;
use super::error::FetchError;
use super::request::{Request, RequestOptions};
use super::transport::{ReqwestTransport, Transport};
use crate::reactive::{batch, create_signal, on_cleanup, ReadSignal, WriteSignal};

/// Create a controller that talks HTTP through a default
/// [`ReqwestTransport`].
///
/// When called inside a [`create_scope`](crate::reactive::create_scope)
/// closure, the controller is torn down with that scope.
pub fn create_fetch<T>() -> FetchController<T>
where
    T: DeserializeOwned + 'static,
{
    create_fetch_with(Rc::new(ReqwestTransport::new()), FetchConfig::default())
}

/// Create a controller with an explicit transport and configuration.
pub fn create_fetch_with<T>(
    transport: Rc<dyn Transport>,
    config: FetchConfig,
) -> FetchController<T>
where
    T: DeserializeOwned + 'static,
{
    let controller = FetchController::new(transport, config);
    let weak: Weak<Inner<T>> = Rc::downgrade(&controller.inner);
    on_cleanup(move || {
        if let Some(inner) = weak.upgrade() {
            inner.dispose();
        }
    });
    controller
}

/// Handle to a fetch controller. Cheap to clone; clones share state.
pub struct FetchController<T: 'static> {
    data: ReadSignal<Option<T>>,
    error: ReadSignal<Option<FetchError>>,
    loading: ReadSignal<bool>,
    inner: Rc<Inner<T>>,
}

impl<T: 'static> Clone for FetchController<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            error: self.error,
            loading: self.loading,
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> std::fmt::Debug for FetchController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchController")
            .field("session", &self.inner.session.get())
            .field("in_flight", &self.inner.current.borrow().is_some())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

struct Inner<T: 'static> {
    set_data: WriteSignal<Option<T>>,
    set_error: WriteSignal<Option<FetchError>>,
    set_loading: WriteSignal<bool>,
    transport: Rc<dyn Transport>,
    config: FetchConfig,
    /// Token of the current session; at most one exists at a time.
    current: RefCell<Option<CancellationToken>>,
    /// Id of the most recently started session.
    session: Cell<u64>,
    disposed: Cell<bool>,
}

/// What a started session carries into its future.
struct Session {
    id: u64,
    cancel: CancellationToken,
}

impl<T> FetchController<T>
where
    T: DeserializeOwned + 'static,
{
    fn new(transport: Rc<dyn Transport>, config: FetchConfig) -> Self {
        let (data, set_data) = create_signal(None);
        let (error, set_error) = create_signal(None);
        let (loading, set_loading) = create_signal(false);
        Self {
            data,
            error,
            loading,
            inner: Rc::new(Inner {
                set_data,
                set_error,
                set_loading,
                transport,
                config,
                current: RefCell::new(None),
                session: Cell::new(0),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Last successfully decoded body, `None` until the first success.
    pub fn data(&self) -> ReadSignal<Option<T>> {
        self.data
    }

    /// Last non-cancellation failure; cleared when a session starts.
    pub fn error(&self) -> ReadSignal<Option<FetchError>> {
        self.error
    }

    /// `true` while a session is outstanding.
    pub fn loading(&self) -> ReadSignal<bool> {
        self.loading
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// `GET url` in the background. See [`execute_with`](Self::execute_with).
    pub fn execute(&self, url: &str) -> JoinHandle<()> {
        self.execute_with(url, RequestOptions::default())
    }

    /// Start a session and spawn it on the current [`LocalSet`].
    ///
    /// Results are observed through the signals; the returned handle only
    /// tells when the session settled and may be dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a [`LocalSet`].
    ///
    /// [`LocalSet`]: tokio::task::LocalSet
    pub fn execute_with(&self, url: &str, options: RequestOptions) -> JoinHandle<()> {
        tokio::task::spawn_local(self.start(url, options))
    }

    /// Start a session and return it as a future instead of spawning it.
    ///
    /// The previous session is cancelled and `loading`/`error` are updated
    /// before this returns; the network work happens when the future is
    /// polled.
    pub fn start(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> impl Future<Output = ()> + 'static {
        let inner = Rc::clone(&self.inner);
        let session = inner.begin(url);
        let url = url.to_owned();
        async move {
            if let Some(session) = session {
                inner.run(session, &url, options).await;
            }
        }
    }

    /// Cancel the current session, if any. `data` and `error` keep their
    /// values and `loading` drops to `false` once the session settles.
    pub fn abort(&self) {
        if let Some(cancel) = self.inner.current.borrow().as_ref() {
            debug!(session = self.inner.session.get(), "aborting fetch session");
            cancel.cancel();
        }
    }

    /// Tear the controller down: cancel the current session and stop all
    /// further state writes. Runs automatically when the owning scope is
    /// disposed.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl<T> Inner<T>
where
    T: DeserializeOwned + 'static,
{
    /// Synchronous half of `execute`: supersede, then mark loading.
    fn begin(&self, url: &str) -> Option<Session> {
        if self.disposed.get() {
            warn!(url, "execute called on a disposed fetch controller; ignored");
            return None;
        }

        if let Some(prev) = self.current.borrow_mut().take() {
            if !prev.is_cancelled() {
                debug!(session = self.session.get(), "superseding in-flight fetch session");
                prev.cancel();
            }
        }

        let id = self.session.get() + 1;
        self.session.set(id);
        let cancel = CancellationToken::new();
        *self.current.borrow_mut() = Some(cancel.clone());
        debug!(session = id, url, "fetch session started");

        batch(|| {
            self.set_loading.set(true);
            self.set_error.set(None);
        });
        Some(Session { id, cancel })
    }

    async fn run(&self, session: Session, url: &str, options: RequestOptions) {
        // Once the token fired the session is stale, whatever it produced:
        // a late response, a transport error, or an unresolvable URL.
        let outcome = match self.perform(&session, url, options).await {
            _ if session.cancel.is_cancelled() => Err(FetchError::Cancelled),
            outcome => outcome,
        };
        self.release(&session);

        match outcome {
            Ok(value) => batch(|| {
                self.set_data.set(Some(value));
                self.set_loading.set(false);
            }),
            Err(FetchError::Cancelled) => {
                debug!(session = session.id, url, "fetch session cancelled");
                // Superseded sessions leave `loading` to their successor and
                // a disposed controller writes nothing.
                if self.session.get() == session.id && !self.disposed.get() {
                    self.set_loading.set(false);
                }
            }
            Err(err) => {
                warn!(
                    session = session.id,
                    url,
                    status = err.status(),
                    error = %err,
                    "fetch failed"
                );
                batch(|| {
                    self.set_error.set(Some(err));
                    self.set_loading.set(false);
                });
            }
        }
    }

    async fn perform(
        &self,
        session: &Session,
        url: &str,
        options: RequestOptions,
    ) -> Result<T, FetchError> {
        let target = self.config.resolve(url)?;
        let request = Request::new(target, options, &self.config.default_headers);
        let response = self.transport.send(request, &session.cancel).await?;
        response.error_for_status()?.json()
    }

    /// Drop the session's token from the slot if it is still the current one.
    fn release(&self, session: &Session) {
        let mut current = self.current.borrow_mut();
        if self.session.get() == session.id {
            current.take();
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(cancel) = self.current.borrow_mut().take() {
            if !cancel.is_cancelled() {
                debug!(session = self.session.get(), "fetch controller disposed; cancelling");
                cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_effect, create_scope, reset_runtime};
    use crate::testing::{MockReply, MockTransport};
    use http::header::{HeaderName, HeaderValue, ACCEPT};
    use http::Method;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use tokio::task::LocalSet;
    use url::Url;

    fn setup() -> Rc<MockTransport> {
        reset_runtime();
        Rc::new(MockTransport::new())
    }

    fn config() -> FetchConfig {
        FetchConfig::new().with_base_url(Url::parse("http://test.local").unwrap())
    }

    fn controller(mock: &Rc<MockTransport>) -> FetchController<Value> {
        create_fetch_with(mock.clone(), config())
    }

    /// Let spawned local tasks run until they block.
    async fn flush() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn success_sets_data_and_clears_loading() {
        let mock = setup();
        mock.route("/api/1", MockReply::json(200, json!({ "id": 1 })));
        let fetch = controller(&mock);

        fetch.start("/api/1", RequestOptions::default()).await;

        assert_eq!(fetch.data().get(), Some(json!({ "id": 1 })));
        assert!(fetch.error().get().is_none());
        assert!(!fetch.loading().get());
    }

    #[tokio::test]
    async fn start_marks_loading_before_polling() {
        let mock = setup();
        mock.route("/api/1", MockReply::json(200, json!(1)));
        let fetch = controller(&mock);

        let session = fetch.start("/api/1", RequestOptions::default());
        assert!(fetch.loading().get());
        assert!(mock.requests().is_empty());

        session.await;
        assert!(!fetch.loading().get());
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn failure_status_sets_error_and_keeps_data() {
        let mock = setup();
        mock.route("/api/1", MockReply::json(200, json!({ "id": 1 })));
        mock.route("/api/bad", MockReply::status(500));
        let fetch = controller(&mock);

        fetch.start("/api/1", RequestOptions::default()).await;
        fetch.start("/api/bad", RequestOptions::default()).await;

        let err = fetch.error().get().expect("error is set");
        assert_eq!(err.to_string(), "Internal Server Error");
        assert_eq!(err.status(), Some(500));
        assert_eq!(fetch.data().get(), Some(json!({ "id": 1 })));
        assert!(!fetch.loading().get());
    }

    #[tokio::test]
    async fn network_failure_surfaces_as_error() {
        let mock = setup();
        mock.route("/api/down", MockReply::network_error("connection refused"));
        let fetch = controller(&mock);

        fetch.start("/api/down", RequestOptions::default()).await;

        assert!(matches!(
            fetch.error().get(),
            Some(FetchError::Network(msg)) if msg == "connection refused"
        ));
        assert!(!fetch.loading().get());
    }

    #[tokio::test]
    async fn invalid_body_is_decode_error() {
        let mock = setup();
        mock.route("/api/html", MockReply::text(200, "<html>"));
        let fetch = controller(&mock);

        fetch.start("/api/html", RequestOptions::default()).await;

        assert!(matches!(fetch.error().get(), Some(FetchError::Decode(_))));
        assert_eq!(fetch.data().get(), None);
    }

    #[tokio::test]
    async fn typed_payload_decodes() {
        #[derive(Debug, Clone, PartialEq, Deserialize)]
        struct User {
            id: u32,
            name: String,
        }

        let mock = setup();
        mock.route("/users/7", MockReply::json(200, json!({ "id": 7, "name": "Ada" })));
        let fetch: FetchController<User> = create_fetch_with(mock.clone(), config());

        fetch.start("/users/7", RequestOptions::default()).await;

        assert_eq!(
            fetch.data().get(),
            Some(User {
                id: 7,
                name: "Ada".into()
            })
        );
    }

    #[tokio::test]
    async fn relative_url_without_base_is_network_error() {
        let mock = setup();
        let fetch: FetchController<Value> = create_fetch_with(mock.clone(), FetchConfig::new());

        fetch.start("/api/1", RequestOptions::default()).await;

        assert!(matches!(fetch.error().get(), Some(FetchError::Network(_))));
        assert!(mock.requests().is_empty());
        assert!(!fetch.loading().get());
    }

    #[tokio::test]
    async fn new_session_clears_previous_error() {
        let mock = setup();
        mock.route("/api/bad", MockReply::status(404));
        let slow = mock.hold("/api/slow", MockReply::json(200, json!("late")));
        let fetch = controller(&mock);

        fetch.start("/api/bad", RequestOptions::default()).await;
        assert!(fetch.error().get().is_some());

        let session = fetch.start("/api/slow", RequestOptions::default());
        assert!(fetch.error().get().is_none());
        assert!(fetch.loading().get());

        slow.release();
        session.await;
        assert_eq!(fetch.data().get(), Some(json!("late")));
    }

    #[tokio::test]
    async fn options_and_default_headers_reach_transport() {
        let mock = setup();
        mock.route("/api/items", MockReply::json(201, json!({ "created": true })));
        let config = config().with_header(
            HeaderName::from_static("x-client"),
            HeaderValue::from_static("gilt"),
        );
        let fetch: FetchController<Value> = create_fetch_with(mock.clone(), config);

        let options = RequestOptions::new()
            .method(Method::POST)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .json(&json!({ "name": "x" }))
            .unwrap();
        fetch.start("/api/items", options).await;

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), "http://test.local/api/items");
        assert_eq!(request.headers["x-client"], "gilt");
        assert_eq!(request.headers[ACCEPT], "application/json");
        assert_eq!(request.body.as_deref(), Some(&br#"{"name":"x"}"#[..]));
        assert_eq!(fetch.data().get(), Some(json!({ "created": true })));
    }

    #[tokio::test]
    async fn superseded_session_never_writes() {
        let mock = setup();
        let slow = mock.hold("/api/slow", MockReply::json(200, json!({ "slow": true })));
        mock.route("/api/fast", MockReply::json(200, json!({ "ok": true })));
        let fetch = controller(&mock);

        LocalSet::new()
            .run_until(async {
                let first = fetch.execute("/api/slow");
                flush().await;
                assert!(fetch.loading().get());

                let second = fetch.execute("/api/fast");
                second.await.unwrap();
                assert_eq!(fetch.data().get(), Some(json!({ "ok": true })));

                slow.release();
                first.await.unwrap();
            })
            .await;

        assert_eq!(fetch.data().get(), Some(json!({ "ok": true })));
        assert!(fetch.error().get().is_none());
        assert!(!fetch.loading().get());
        assert_eq!(mock.cancelled(), vec!["/api/slow".to_string()]);
    }

    #[tokio::test]
    async fn superseded_session_with_bad_url_never_writes() {
        let mock = setup();
        let fast = mock.hold("/api/fast", MockReply::json(200, json!({ "ok": true })));
        let fetch = controller(&mock);

        LocalSet::new()
            .run_until(async {
                let first = fetch.execute("http://[not a url");
                let second = fetch.execute("/api/fast");

                first.await.unwrap();
                assert!(fetch.loading().get());
                assert!(fetch.error().get().is_none());

                fast.release();
                second.await.unwrap();
            })
            .await;

        assert_eq!(fetch.data().get(), Some(json!({ "ok": true })));
        assert!(fetch.error().get().is_none());
        assert!(!fetch.loading().get());
    }

    #[tokio::test]
    async fn superseded_session_does_not_clear_loading_of_successor() {
        let mock = setup();
        let slow = mock.hold("/api/slow", MockReply::json(200, json!(1)));
        let next = mock.hold("/api/next", MockReply::json(200, json!(2)));
        let fetch = controller(&mock);

        LocalSet::new()
            .run_until(async {
                let first = fetch.execute("/api/slow");
                flush().await;
                let second = fetch.execute("/api/next");

                // The first session settles as cancelled while the second is
                // still in flight.
                first.await.unwrap();
                assert!(fetch.loading().get());

                next.release();
                second.await.unwrap();
                drop(slow);
            })
            .await;

        assert_eq!(fetch.data().get(), Some(json!(2)));
        assert!(!fetch.loading().get());
    }

    #[tokio::test]
    async fn stale_response_ignored_even_if_transport_ignores_cancel() {
        let mock = setup();
        mock.ignore_cancellation(true);
        let slow = mock.hold("/api/slow", MockReply::json(200, json!({ "slow": true })));
        mock.route("/api/fast", MockReply::json(200, json!({ "ok": true })));
        let fetch = controller(&mock);

        LocalSet::new()
            .run_until(async {
                let first = fetch.execute("/api/slow");
                flush().await;
                let second = fetch.execute("/api/fast");
                second.await.unwrap();

                slow.release();
                first.await.unwrap();
            })
            .await;

        assert_eq!(fetch.data().get(), Some(json!({ "ok": true })));
        assert!(fetch.error().get().is_none());
        assert!(!fetch.loading().get());
    }

    #[tokio::test]
    async fn stale_failure_does_not_set_error() {
        let mock = setup();
        mock.ignore_cancellation(true);
        let slow = mock.hold("/api/slow", MockReply::status(503));
        mock.route("/api/fast", MockReply::json(200, json!({ "ok": true })));
        let fetch = controller(&mock);

        LocalSet::new()
            .run_until(async {
                let first = fetch.execute("/api/slow");
                flush().await;
                fetch.execute("/api/fast").await.unwrap();
                slow.release();
                first.await.unwrap();
            })
            .await;

        assert!(fetch.error().get().is_none());
    }

    #[tokio::test]
    async fn abort_keeps_state_and_clears_loading() {
        let mock = setup();
        mock.route("/api/1", MockReply::json(200, json!({ "id": 1 })));
        let _gate = mock.hold("/api/slow", MockReply::json(200, json!("never")));
        let fetch = controller(&mock);

        fetch.start("/api/1", RequestOptions::default()).await;

        LocalSet::new()
            .run_until(async {
                let pending = fetch.execute("/api/slow");
                flush().await;
                assert!(fetch.loading().get());
                fetch.abort();
                pending.await.unwrap();
            })
            .await;

        assert_eq!(fetch.data().get(), Some(json!({ "id": 1 })));
        assert!(fetch.error().get().is_none());
        assert!(!fetch.loading().get());
    }

    #[tokio::test]
    async fn scope_teardown_cancels_without_further_writes() {
        let mock = setup();
        let _gate = mock.hold("/api/slow", MockReply::json(200, json!("late")));
        let (fetch, scope) = create_scope(|| controller(&mock));

        LocalSet::new()
            .run_until(async {
                let pending = fetch.execute("/api/slow");
                flush().await;
                scope.dispose();
                pending.await.unwrap();
            })
            .await;

        assert!(fetch.is_disposed());
        assert_eq!(mock.cancelled(), vec!["/api/slow".to_string()]);
        assert!(fetch.error().get().is_none());
        assert_eq!(fetch.data().get(), None);
        // The controller is gone; nothing resets the last published state.
        assert!(fetch.loading().get());
    }

    #[tokio::test]
    async fn late_reply_after_teardown_changes_nothing() {
        let mock = setup();
        mock.ignore_cancellation(true);
        let slow = mock.hold("/api/slow", MockReply::json(200, json!("late")));
        let (fetch, scope) = create_scope(|| controller(&mock));

        LocalSet::new()
            .run_until(async {
                let pending = fetch.execute("/api/slow");
                flush().await;
                scope.dispose();
                slow.release();
                pending.await.unwrap();
            })
            .await;

        assert!(fetch.is_disposed());
        assert!(mock.cancelled().is_empty());
        assert_eq!(fetch.data().get(), None);
        assert!(fetch.error().get().is_none());
        assert!(fetch.loading().get());
    }

    #[tokio::test]
    async fn execute_after_dispose_is_ignored() {
        let mock = setup();
        mock.route("/api/1", MockReply::json(200, json!(1)));
        let fetch = controller(&mock);

        fetch.dispose();
        fetch.dispose();
        fetch.start("/api/1", RequestOptions::default()).await;

        assert!(mock.requests().is_empty());
        assert!(!fetch.loading().get());
        assert_eq!(fetch.data().get(), None);
    }

    #[tokio::test]
    async fn subscribers_see_loading_transitions() {
        let mock = setup();
        mock.route("/api/1", MockReply::json(200, json!({ "id": 1 })));
        let fetch = controller(&mock);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_c = seen.clone();
        let (data, loading) = (fetch.data(), fetch.loading());
        create_effect(move || {
            seen_c
                .borrow_mut()
                .push((loading.get(), data.get().is_some()));
        });

        fetch.start("/api/1", RequestOptions::default()).await;

        assert_eq!(
            *seen.borrow(),
            vec![(false, false), (true, false), (false, true)]
        );
    }

    #[tokio::test]
    async fn clones_share_state() {
        let mock = setup();
        mock.route("/api/1", MockReply::json(200, json!(1)));
        let fetch = controller(&mock);
        let other = fetch.clone();

        other.start("/api/1", RequestOptions::default()).await;

        assert_eq!(fetch.data().get(), Some(json!(1)));
        assert!(format!("{fetch:?}").contains("session: 1"));
    }
}
