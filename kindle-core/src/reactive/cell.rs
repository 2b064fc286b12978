//! Cell Implementation
//!
//! A [`Cell`] is an observed container with exactly one slot, named
//! `"value"`. It holds any Rust type, not just JSON, which makes it the
//! natural home for non-record reactive state.
//!
//! # How Cells Work
//!
//! 1. Reading the value inside a running effect subscribes that effect to the
//!    cell's `"value"` slot.
//!
//! 2. Writing the value notifies every subscriber.
//!
//! Cells and computed values both implement [`ValueCell`], which is how
//! generic code recognises a reactive single-value handle.

use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::TargetId;

/// Name of the single tracked slot of a cell or computed value.
pub const VALUE_KEY: &str = "value";

/// A reactive handle exposing a single `value` slot.
pub trait ValueCell {
    /// Type of the held value.
    type Value;

    /// Read the value, subscribing the running effect.
    fn value(&self) -> Self::Value;

    /// Whether the handle accepts writes.
    fn is_settable(&self) -> bool;

    /// Identity of the tracked slot.
    fn target_id(&self) -> TargetId;
}

struct CellInner<T> {
    id: TargetId,
    runtime: WeakRuntime,
    value: std::cell::RefCell<T>,
}

impl<T> Drop for CellInner<T> {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime.upgrade() {
            rt.release_target(self.id);
        }
    }
}

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = rt.cell(0);
///
/// count.set_value(5);
/// count.update(|n| *n += 1);
/// assert_eq!(count.value(), 6);
/// ```
pub struct Cell<T: 'static> {
    inner: Rc<CellInner<T>>,
}

impl<T: 'static> Cell<T> {
    /// Create a new cell. Prefer [`Runtime::cell`].
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Rc::new(CellInner {
                id: TargetId::new(),
                runtime: runtime.downgrade(),
                value: std::cell::RefCell::new(value),
            }),
        }
    }

    /// Get the cell's identity.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    fn track(&self) {
        if let Some(rt) = self.inner.runtime.upgrade() {
            rt.track(self.inner.id, VALUE_KEY);
        }
    }

    fn trigger(&self) {
        if let Some(rt) = self.inner.runtime.upgrade() {
            rt.trigger(self.inner.id, VALUE_KEY);
        }
    }

    /// Get a clone of the current value, tracking the read.
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Get the value without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set_value(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.trigger();
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.trigger();
    }
}

impl<T: Clone + 'static> ValueCell for Cell<T> {
    type Value = T;

    fn value(&self) -> T {
        Cell::value(self)
    }

    fn is_settable(&self) -> bool {
        true
    }

    fn target_id(&self) -> TargetId {
        self.inner.id
    }
}

impl<T: 'static> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
