//! Reactive state: signals, effects, scopes.
//!
//! Leptos-style fine-grained reactivity on a single-threaded, thread-local
//! runtime.
//!
//! - [`create_signal`] — create a read/write signal pair.
//! - [`create_effect`] — auto-tracking side effect.
//! - [`batch`] — coalesce multiple writes into one notification pass.
//! - [`create_scope`] / [`on_cleanup`] — ownership and teardown hooks.

mod runtime;

pub mod effect;
pub mod scope;
pub mod signal;

pub use effect::{batch, create_effect, create_effect_with_id, dispose_effect};
pub use runtime::{EffectId, ScopeId};
pub use scope::{
    create_scope, current_scope, dispose_scope, on_cleanup, scope_is_alive, Scope,
};
pub use signal::{create_signal, ReadSignal, WriteSignal};

#[cfg(test)]
pub(crate) use runtime::reset_runtime;
