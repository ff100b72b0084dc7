//! Signals: observable value cells.
//!
//! A signal stores a value in the thread-local runtime. Reading it inside an
//! effect subscribes that effect; writing it re-runs the subscribers (or
//! defers them while a [`batch`](super::batch) is open).

use std::fmt;
use std::marker::PhantomData;

use super::effect::notify_subscribers;
use super::runtime::{with_runtime, SignalId, SignalState, RUNTIME};

/// Create a reactive signal with the given initial value.
///
/// Returns a `(ReadSignal<T>, WriteSignal<T>)` pair. Reading inside an effect
/// automatically subscribes that effect to changes.
pub fn create_signal<T: 'static>(initial: T) -> (ReadSignal<T>, WriteSignal<T>) {
    let id = with_runtime(|rt| {
        let id = SignalId(rt.signals.len());
        rt.signals.push(SignalState {
            value: Box::new(initial),
            subscribers: Default::default(),
        });
        id
    });

    (
        ReadSignal {
            id,
            _marker: PhantomData,
        },
        WriteSignal {
            id,
            _marker: PhantomData,
        },
    )
}

// ---------------------------------------------------------------------------
// ReadSignal
// ---------------------------------------------------------------------------

/// Read-half of a signal. `Copy`, only stores an id.
pub struct ReadSignal<T: 'static> {
    id: SignalId,
    _marker: PhantomData<T>,
}

// Manual impls so we don't require T: Copy/Clone for the signal itself.
impl<T: 'static> Copy for ReadSignal<T> {}
impl<T: 'static> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal").field("id", &self.id.0).finish()
    }
}

impl<T: 'static> ReadSignal<T> {
    /// Read the current value, subscribing the running effect (if any).
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.get_untracked()
    }

    /// Read by reference without cloning. Still subscribes the running effect.
    ///
    /// The runtime stays borrowed while `f` runs, so `f` must not write
    /// signals.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        RUNTIME.with(|rt| {
            let rt_ref = rt.borrow();
            let any_ref = &rt_ref.signals[self.id.0].value;
            f(any_ref.downcast_ref::<T>().expect("signal type mismatch"))
        })
    }

    /// Read without tracking. Will not subscribe any running effect.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        RUNTIME.with(|rt| {
            let rt_ref = rt.borrow();
            rt_ref.signals[self.id.0]
                .value
                .downcast_ref::<T>()
                .expect("signal type mismatch")
                .clone()
        })
    }

    fn track(&self) {
        with_runtime(|rt| {
            if let Some(eid) = rt.tracking {
                rt.signals[self.id.0].subscribers.insert(eid);
                rt.effects[eid.0].dependencies.insert(self.id);
            }
        });
    }
}

// ---------------------------------------------------------------------------
// WriteSignal
// ---------------------------------------------------------------------------

/// Write-half of a signal. `Copy`, only stores an id.
pub struct WriteSignal<T: 'static> {
    id: SignalId,
    _marker: PhantomData<T>,
}

impl<T: 'static> Copy for WriteSignal<T> {}
impl<T: 'static> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> fmt::Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSignal").field("id", &self.id.0).finish()
    }
}

impl<T: 'static> WriteSignal<T> {
    /// Overwrite the signal value and notify subscribers.
    pub fn set(&self, value: T) {
        let subs = with_runtime(|rt| {
            let slot = &mut rt.signals[self.id.0];
            slot.value = Box::new(value);
            slot.subscribers.iter().copied().collect::<Vec<_>>()
        });
        notify_subscribers(subs);
    }

    /// Mutate the value in-place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let subs = with_runtime(|rt| {
            let slot = &mut rt.signals[self.id.0];
            f(slot.value.downcast_mut::<T>().expect("signal type mismatch"));
            slot.subscribers.iter().copied().collect::<Vec<_>>()
        });
        notify_subscribers(subs);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
