//! Computed Implementation
//!
//! A [`Computed`] is a cached derived value that re-evaluates only when read
//! after one of its dependencies changed.
//!
//! # How Computed Values Work
//!
//! 1. Creating one runs nothing. The derivation is wrapped in a
//!    [`ReactiveEffect`] whose scheduler only marks the value dirty.
//!
//! 2. On read, the reader is subscribed to the computed value's own
//!    `"value"` slot. If dirty, the derivation effect runs (re-collecting its
//!    dependencies), the result is cached and the dirty flag cleared.
//!
//! 3. When a dependency changes, the scheduler flips the flag and triggers
//!    the `"value"` slot, so effects that read the computed value are
//!    notified in turn. Nothing is recomputed until the next read.
//!
//! The derivation therefore runs at most once between two reads that see no
//! intervening dependency change, and never eagerly.

use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::trace;

use super::cell::{ValueCell, VALUE_KEY};
use super::effect::ReactiveEffect;
use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::TargetId;

struct ComputedInner<T: 'static> {
    target: TargetId,
    runtime: WeakRuntime,
    effect: ReactiveEffect<T>,
    cached: std::cell::RefCell<Option<T>>,
    dirty: std::cell::Cell<bool>,
}

impl<T: 'static> ComputedInner<T> {
    /// Scheduler body: mark stale and notify our own readers.
    fn invalidate(&self) {
        if self.dirty.replace(true) {
            return;
        }
        trace!(target = self.target.raw(), "computed invalidated");
        if let Some(rt) = self.runtime.upgrade() {
            rt.trigger(self.target, VALUE_KEY);
        }
    }
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime.upgrade() {
            rt.release_target(self.target);
        }
    }
}

/// A lazily recomputed derived value.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = rt.cell(2);
///
/// let c = count.clone();
/// let doubled = rt.derive(move || c.value() * 2);
///
/// assert_eq!(doubled.value(), 4);
/// count.set_value(5);
/// assert_eq!(doubled.value(), 10);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value. Prefer [`Runtime::derive`].
    pub fn new<F>(runtime: &Runtime, derivation: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let effect = ReactiveEffect::with_scheduler(runtime, derivation, move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });
            ComputedInner {
                target: TargetId::new(),
                runtime: runtime.downgrade(),
                effect,
                cached: std::cell::RefCell::new(None),
                dirty: std::cell::Cell::new(true),
            }
        });
        Self { inner }
    }

    /// Read the value, recomputing it first if stale.
    pub fn value(&self) -> T {
        if let Some(rt) = self.inner.runtime.upgrade() {
            rt.track(self.inner.target, VALUE_KEY);
        }

        if !self.inner.dirty.get() {
            if let Some(value) = self.inner.cached.borrow().clone() {
                return value;
            }
        }

        let value = self.inner.effect.run();
        *self.inner.cached.borrow_mut() = Some(value.clone());
        self.inner.dirty.set(false);
        value
    }
}

impl<T: 'static> Computed<T> {
    /// Identity of the computed value's own `"value"` slot.
    pub fn id(&self) -> TargetId {
        self.inner.target
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Whether a value has ever been computed.
    pub fn has_value(&self) -> bool {
        self.inner.cached.borrow().is_some()
    }

    /// How many times the derivation has run.
    pub fn compute_count(&self) -> usize {
        self.inner.effect.run_count()
    }
}

impl<T: Clone + 'static> ValueCell for Computed<T> {
    type Value = T;

    fn value(&self) -> T {
        Computed::value(self)
    }

    fn is_settable(&self) -> bool {
        false
    }

    fn target_id(&self) -> TargetId {
        self.inner.target
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.target)
            .field("dirty", &self.is_dirty())
            .field("cached", &self.inner.cached.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
