//! Auto-tracking side effects and batching.
//!
//! An effect is a closure that re-runs whenever any signal it reads changes:
//!
//! ```ignore
//! let (loading, set_loading) = create_signal(false);
//! create_effect(move || {
//!     println!("spinner visible = {}", loading.get());
//! });
//! set_loading.set(true); // prints "spinner visible = true"
//! ```
//!
//! Use [`batch`] to group multiple signal writes so that effects run only once:
//!
//! ```ignore
//! batch(|| {
//!     set_data.set(Some(body));
//!     set_loading.set(false);
//! });
//! ```
//!
//! Effects created while a scope is the current owner are disposed together
//! with that scope.

use std::collections::HashSet;

use super::runtime::{with_runtime, EffectId, EffectState};

/// Create a side-effect that auto-tracks signal reads.
///
/// The closure runs immediately once (establishing initial subscriptions),
/// then re-runs whenever any tracked signal changes.
pub fn create_effect(f: impl FnMut() + 'static) {
    create_effect_with_id(f);
}

/// Create an effect and return its [`EffectId`] so it can later be disposed.
pub fn create_effect_with_id(f: impl FnMut() + 'static) -> EffectId {
    let eid = with_runtime(|rt| {
        let eid = EffectId(rt.effects.len());
        rt.effects.push(EffectState {
            callback: Some(Box::new(f)),
            dependencies: HashSet::new(),
            active: true,
        });
        if let Some(scope) = rt.owner.and_then(|owner| rt.scopes.get_mut(owner)) {
            scope.effects.push(eid);
        }
        eid
    });
    run_effect(eid);
    eid
}

/// Deactivate an effect so it no longer re-runs when its dependencies change.
pub fn dispose_effect(eid: EffectId) {
    with_runtime(|rt| {
        if eid.0 < rt.effects.len() {
            rt.effects[eid.0].active = false;
            rt.effects[eid.0].callback = None;
            rt.untrack(eid);
        }
    });
}

/// Batch multiple signal writes so that effects run only once.
///
/// Batches nest; deferred effects run when the outermost batch ends.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    with_runtime(|rt| rt.batch_depth += 1);

    let result = f();

    let pending = with_runtime(|rt| {
        rt.batch_depth -= 1;
        if rt.batch_depth == 0 {
            let mut seen = HashSet::new();
            rt.pending_effects
                .drain(..)
                .filter(|id| seen.insert(*id))
                .collect()
        } else {
            Vec::new()
        }
    });

    for eid in pending {
        run_effect(eid);
    }
    result
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Run a single effect: clear old deps, set tracking, execute callback.
fn run_effect(eid: EffectId) {
    let maybe_cb = with_runtime(|rt| {
        if !rt.effect_is_active(eid) {
            return None;
        }
        rt.untrack(eid);
        rt.effects[eid.0].callback.take()
    });

    let Some(mut cb) = maybe_cb else {
        return;
    };

    let prev_tracking = with_runtime(|rt| rt.tracking.replace(eid));

    cb();

    with_runtime(|rt| {
        rt.tracking = prev_tracking;
        // Disposed while running: drop the callback instead of restoring it.
        if rt.effect_is_active(eid) {
            rt.effects[eid.0].callback = Some(cb);
        }
    });
}

/// Notify a list of subscriber effects that a signal changed.
pub(crate) fn notify_subscribers(subs: Vec<EffectId>) {
    if subs.is_empty() {
        return;
    }

    // Inside a batch or the notification loop itself: queue for later.
    let deferred = with_runtime(|rt| {
        if rt.batch_depth > 0 || rt.running_effects {
            rt.pending_effects.extend(subs.iter().copied());
            true
        } else {
            rt.running_effects = true;
            false
        }
    });
    if deferred {
        return;
    }

    let mut queue = subs;
    while !queue.is_empty() {
        for eid in std::mem::take(&mut queue) {
            run_effect(eid);
        }
        with_runtime(|rt| queue.append(&mut rt.pending_effects));
    }

    with_runtime(|rt| rt.running_effects = false);
}
