//! Thread-local reactive runtime shared by signals, effects and scopes.
//!
//! Everything reactive lives in one `RefCell<Runtime>` per thread. Public
//! handles ([`ReadSignal`](super::ReadSignal), [`EffectId`], [`ScopeId`]) are
//! plain ids into it, which keeps them `Copy` and `'static`.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;

use slotmap::{new_key_type, SlotMap};

// ---------------------------------------------------------------------------
// IDs
// ---------------------------------------------------------------------------

/// Identifies a signal slot inside the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(pub(crate) usize);

/// Identifies an effect slot inside the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(pub(crate) usize);

new_key_type! {
    /// Identifies an ownership scope inside the runtime.
    pub struct ScopeId;
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

pub(crate) struct SignalState {
    pub(crate) value: Box<dyn Any>,
    pub(crate) subscribers: HashSet<EffectId>,
}

pub(crate) struct EffectState {
    /// Taken out while the effect runs so no `RefMut` is held across the
    /// user callback.
    pub(crate) callback: Option<Box<dyn FnMut()>>,
    pub(crate) dependencies: HashSet<SignalId>,
    pub(crate) active: bool,
}

#[derive(Default)]
pub(crate) struct ScopeState {
    pub(crate) parent: Option<ScopeId>,
    pub(crate) children: Vec<ScopeId>,
    pub(crate) effects: Vec<EffectId>,
    pub(crate) cleanups: Vec<Box<dyn FnOnce()>>,
}

pub(crate) struct Runtime {
    pub(crate) signals: Vec<SignalState>,
    pub(crate) effects: Vec<EffectState>,
    pub(crate) scopes: SlotMap<ScopeId, ScopeState>,
    /// The effect currently executing (for auto-tracking).
    pub(crate) tracking: Option<EffectId>,
    /// The scope that owns anything created right now.
    pub(crate) owner: Option<ScopeId>,
    /// When > 0 we are inside a `batch()` call and effects are deferred.
    pub(crate) batch_depth: usize,
    pub(crate) pending_effects: Vec<EffectId>,
    /// Set while the notification loop runs; nested writes queue instead of
    /// recursing.
    pub(crate) running_effects: bool,
}

impl Runtime {
    pub(crate) fn new() -> Self {
        Self {
            signals: Vec::new(),
            effects: Vec::new(),
            scopes: SlotMap::with_key(),
            tracking: None,
            owner: None,
            batch_depth: 0,
            pending_effects: Vec::new(),
            running_effects: false,
        }
    }

    pub(crate) fn effect_is_active(&self, eid: EffectId) -> bool {
        eid.0 < self.effects.len() && self.effects[eid.0].active
    }

    /// Drop all dependency edges of an effect.
    pub(crate) fn untrack(&mut self, eid: EffectId) {
        let deps: Vec<SignalId> = self.effects[eid.0].dependencies.drain().collect();
        for sid in deps {
            self.signals[sid.0].subscribers.remove(&eid);
        }
    }
}

thread_local! {
    pub(crate) static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

/// Run `f` with a mutable borrow of this thread's runtime.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

// ---------------------------------------------------------------------------
// Test helper: reset the thread-local runtime between tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) fn reset_runtime() {
    RUNTIME.with(|rt| {
        *rt.borrow_mut() = Runtime::new();
    });
}
