//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: plain
//! effects, computed derivations, watchers and component render effects all
//! implement [`Subscriber`]. The registry only ever stores [`EffectId`]s; the
//! runtime resolves them to live subscribers through weak references.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an effect.
///
/// Each effect gets a unique id when created. Ids are used as bucket members
/// in the dependency registry and as the dedup key of the render queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of an observed container (record, cell or computed).
///
/// Allocated once per container. Clones of a container handle share the id;
/// wrapping the same data twice yields two ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// A (container, property key) pair: the address of one dependency bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DepKey {
    /// The container the key belongs to.
    pub target: TargetId,
    /// The property name.
    pub key: String,
}

impl DepKey {
    /// Build a key for `target.key`.
    pub fn new(target: TargetId, key: impl Into<String>) -> Self {
        Self {
            target,
            key: key.into(),
        }
    }
}

/// A computation that can be notified when one of its dependencies changes.
///
/// Implemented by the effect core. The trait is object safe so the runtime can
/// keep heterogeneous effects (`ReactiveEffect<T>` for any `T`) in one table,
/// one queue and one active stack.
pub(crate) trait Subscriber {
    /// The subscriber's id.
    fn id(&self) -> EffectId;

    /// Remember that this subscriber is now a member of `dep`'s bucket.
    fn record_dependency(&self, dep: DepKey);

    /// A dependency changed: invoke the custom scheduler, or queue a rerun.
    fn notify(self: Rc<Self>);

    /// Rerun from the render queue, discarding the result.
    fn run_job(self: Rc<Self>);

    /// Unsubscribe from every bucket and stop tracking.
    fn stop(&self);

    /// Whether [`stop`](Subscriber::stop) has been called.
    fn is_active(&self) -> bool;
}
