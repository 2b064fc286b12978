//! Observed Container
//!
//! An [`Observed`] wraps a plain record and instruments every property
//! access: reads call [`Runtime::track`] before returning the value, writes
//! store the value and then call [`Runtime::trigger`].
//!
//! Records are dynamic maps from property name to [`serde_json::Value`],
//! which is what component setup returns and render functions read.
//!
//! Adding or removing a key also notifies readers of the key *set* (via
//! [`ITERATE_KEY`]), so an effect that iterated [`Observed::keys`] reruns when
//! the shape of the record changes.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::TargetId;

/// A plain record: property name to JSON value, in insertion order.
pub type Record = IndexMap<String, Value>;

/// Pseudo-key tracked by operations that depend on the set of keys.
pub const ITERATE_KEY: &str = "__iterate__";

struct ObservedInner {
    id: TargetId,
    runtime: WeakRuntime,
    record: std::cell::RefCell<Record>,
}

impl Drop for ObservedInner {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime.upgrade() {
            rt.release_target(self.id);
        }
    }
}

/// A record whose property reads and writes are tracked.
///
/// Clones share the same record and identity.
#[derive(Clone)]
pub struct Observed {
    inner: Rc<ObservedInner>,
}

impl Observed {
    /// Wrap `record`. Prefer [`Runtime::observe`].
    pub fn new(runtime: &Runtime, record: Record) -> Self {
        Self {
            inner: Rc::new(ObservedInner {
                id: TargetId::new(),
                runtime: runtime.downgrade(),
                record: std::cell::RefCell::new(record),
            }),
        }
    }

    /// Identity used as the registry key.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    fn track(&self, key: &str) {
        if let Some(rt) = self.inner.runtime.upgrade() {
            rt.track(self.inner.id, key);
        }
    }

    fn trigger(&self, key: &str) {
        if let Some(rt) = self.inner.runtime.upgrade() {
            rt.trigger(self.inner.id, key);
        }
    }

    /// Read a property, subscribing the running effect to it.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.track(key);
        self.inner.record.borrow().get(key).cloned()
    }

    /// Read a property and deserialize it. `None` if missing or mistyped.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Whether the property exists. Tracked like a read of `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.track(key);
        self.inner.record.borrow().contains_key(key)
    }

    /// Write a property, then notify its subscribers.
    ///
    /// Every write triggers, even when the value is unchanged.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let added = self
            .inner
            .record
            .borrow_mut()
            .insert(key.to_owned(), value.into())
            .is_none();
        self.trigger(key);
        if added {
            self.trigger(ITERATE_KEY);
        }
    }

    /// Replace a property with `f(current)`; a missing property reads as `null`.
    ///
    /// The read is not tracked.
    pub fn update(&self, key: &str, f: impl FnOnce(&Value) -> Value) {
        let next = {
            let record = self.inner.record.borrow();
            f(record.get(key).unwrap_or(&Value::Null))
        };
        self.set(key, next);
    }

    /// Remove a property, notifying readers of it and of the key set.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.record.borrow_mut().shift_remove(key);
        if removed.is_some() {
            self.trigger(key);
            self.trigger(ITERATE_KEY);
        }
        removed
    }

    /// Property names in insertion order. Tracks [`ITERATE_KEY`].
    pub fn keys(&self) -> Vec<String> {
        self.track(ITERATE_KEY);
        self.inner.record.borrow().keys().cloned().collect()
    }

    /// Number of properties. Tracks [`ITERATE_KEY`].
    pub fn len(&self) -> usize {
        self.track(ITERATE_KEY);
        self.inner.record.borrow().len()
    }

    /// Whether the record is empty. Tracks [`ITERATE_KEY`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Untracked copy of the whole record.
    pub fn snapshot(&self) -> Record {
        self.inner.record.borrow().clone()
    }

    /// Whether two handles share one container.
    pub fn ptr_eq(&self, other: &Observed) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("id", &self.inner.id)
            .field("record", &self.inner.record.borrow())
            .finish()
    }
}
