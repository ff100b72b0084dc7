//! Ownership scopes: teardown hooks for reactive consumers.
//!
//! A scope owns the effects created while it is current, its child scopes,
//! and any callbacks registered with [`on_cleanup`]. Disposing the scope
//! tears all of that down exactly once. This is how a UI context tells the
//! things it created (a fetch controller, say) that it is going away.
//!
//! ```ignore
//! let (fetch, scope) = create_scope(|| create_fetch::<Value>());
//! fetch.execute("/api/1");
//! drop(scope); // cancels the in-flight request
//! ```

use tracing::debug;

use super::effect::dispose_effect;
use super::runtime::{with_runtime, ScopeId, ScopeState};

/// Run `f` with a fresh scope as the current owner.
///
/// The new scope is a child of the current one (if any). Returns the result
/// of `f` and an RAII [`Scope`] handle that disposes the scope when dropped.
pub fn create_scope<R>(f: impl FnOnce() -> R) -> (R, Scope) {
    let (id, prev_owner) = with_runtime(|rt| {
        let parent = rt.owner;
        let id = rt.scopes.insert(ScopeState {
            parent,
            ..ScopeState::default()
        });
        if let Some(parent) = parent.and_then(|p| rt.scopes.get_mut(p)) {
            parent.children.push(id);
        }
        (id, rt.owner.replace(id))
    });

    let result = f();

    with_runtime(|rt| rt.owner = prev_owner);
    (result, Scope { id: Some(id) })
}

/// Register `f` to run when the current scope is disposed.
///
/// Returns `false` when no scope is current; `f` is dropped unrun and the
/// caller keeps responsibility for teardown.
pub fn on_cleanup(f: impl FnOnce() + 'static) -> bool {
    let registered = with_runtime(|rt| {
        match rt.owner.and_then(|owner| rt.scopes.get_mut(owner)) {
            Some(scope) => {
                scope.cleanups.push(Box::new(f));
                true
            }
            None => false,
        }
    });
    if !registered {
        debug!("on_cleanup called outside of any scope; callback dropped");
    }
    registered
}

/// The scope that currently owns newly created effects and cleanups.
pub fn current_scope() -> Option<ScopeId> {
    with_runtime(|rt| rt.owner)
}

/// Whether `id` refers to a scope that has not been disposed yet.
pub fn scope_is_alive(id: ScopeId) -> bool {
    with_runtime(|rt| rt.scopes.contains_key(id))
}

/// Dispose a scope: children first, then its effects, then its cleanups in
/// registration order. Disposing an already disposed scope is a no-op.
pub fn dispose_scope(id: ScopeId) {
    let Some(state) = with_runtime(|rt| {
        let state = rt.scopes.remove(id)?;
        if let Some(parent) = state.parent.and_then(|p| rt.scopes.get_mut(p)) {
            parent.children.retain(|child| *child != id);
        }
        Some(state)
    }) else {
        return;
    };

    for child in state.children {
        dispose_scope(child);
    }
    for eid in state.effects {
        dispose_effect(eid);
    }
    for cleanup in state.cleanups {
        cleanup();
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// RAII handle for a scope created by [`create_scope`].
///
/// Dropping the handle disposes the scope, so teardown runs on every exit
/// path of the owning code.
#[derive(Debug)]
#[must_use = "dropping a Scope disposes it immediately"]
pub struct Scope {
    id: Option<ScopeId>,
}

impl Scope {
    /// The runtime id of this scope.
    pub fn id(&self) -> ScopeId {
        self.id.unwrap_or_default()
    }

    /// Dispose the scope now.
    pub fn dispose(mut self) {
        if let Some(id) = self.id.take() {
            dispose_scope(id);
        }
    }

    /// Give up RAII ownership. The scope stays alive until
    /// [`dispose_scope`] is called with the returned id.
    pub fn leak(mut self) -> ScopeId {
        self.id.take().unwrap_or_default()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            dispose_scope(id);
        }
    }
}
