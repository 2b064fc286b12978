//! Effect Implementation
//!
//! A [`ReactiveEffect`] is a reusable unit of re-runnable computation. Every
//! higher level primitive is built from one: computed values, watchers and
//! component render functions.
//!
//! # How Effects Work
//!
//! 1. [`run`](ReactiveEffect::run) first unsubscribes the effect from every
//!    bucket it joined during the previous run.
//!
//! 2. It then pushes itself on the runtime's active stack and calls its
//!    function. Every container read during the call subscribes the effect
//!    afresh, so dependencies never accumulate stale entries.
//!
//! 3. When a dependency is written, the effect is notified. With a custom
//!    scheduler the scheduler is invoked synchronously. Without one, the effect
//!    is queued on the runtime's render queue and rerun at the next flush.
//!
//! Effects are lazy: nothing runs until the first `run()`.
//!
//! # Ownership
//!
//! The handle owns the effect. The runtime keeps only a weak reference, so
//! dropping the last handle unsubscribes the effect from every bucket.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::trace;

use super::context::EffectScope;
use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::{DepKey, EffectId, Subscriber};

type EffectFn<T> = Box<dyn Fn() -> T>;
type SchedulerFn<T> = Box<dyn Fn(&ReactiveEffect<T>)>;

/// Shared state of an effect.
pub(crate) struct EffectInner<T: 'static> {
    id: EffectId,
    runtime: WeakRuntime,
    func: EffectFn<T>,
    scheduler: Option<SchedulerFn<T>>,
    deps: std::cell::RefCell<IndexSet<DepKey>>,
    active: std::cell::Cell<bool>,
    run_count: std::cell::Cell<usize>,
}

impl<T: 'static> EffectInner<T> {
    /// Unsubscribe from every bucket recorded during the last run.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        if deps.is_empty() {
            return;
        }
        if let Some(rt) = self.runtime.upgrade() {
            if let Ok(mut registry) = rt.inner().registry.try_borrow_mut() {
                for dep in &deps {
                    registry.unsubscribe(dep, self.id);
                }
            }
        }
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn record_dependency(&self, dep: DepKey) {
        self.deps.borrow_mut().insert(dep);
    }

    fn notify(self: Rc<Self>) {
        match &self.scheduler {
            Some(scheduler) => {
                let effect = ReactiveEffect {
                    inner: Rc::clone(&self),
                };
                scheduler(&effect);
            }
            None => {
                if let Some(rt) = self.runtime.upgrade() {
                    rt.queue_job(self);
                }
            }
        }
    }

    fn run_job(self: Rc<Self>) {
        ReactiveEffect { inner: self }.run();
    }

    fn stop(&self) {
        if self.active.replace(false) {
            self.cleanup();
            trace!(effect = ?self.id, "effect stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl<T: 'static> Drop for EffectInner<T> {
    fn drop(&mut self) {
        self.cleanup();
        if let Some(rt) = self.runtime.upgrade() {
            rt.unregister_effect(self.id);
        }
    }
}

/// A re-runnable computation with automatically tracked dependencies.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let state = rt.observe(record([("count", 0.into())]));
///
/// let s = state.clone();
/// let effect = ReactiveEffect::new(&rt, move || {
///     println!("count is {}", s.get("count").unwrap());
/// });
/// effect.run();            // prints "count is 0", subscribes to count
///
/// state.set("count", 1);   // queues the effect
/// rt.drain_microtasks()?;  // prints "count is 1"
/// ```
pub struct ReactiveEffect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect that is queued on the render queue when notified.
    pub fn new<F>(runtime: &Runtime, func: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(runtime, Box::new(func), None)
    }

    /// Create an effect whose notifications invoke `scheduler` synchronously
    /// instead of queueing a rerun.
    ///
    /// The scheduler receives the effect itself, so it can decide whether and
    /// when to call [`run`](Self::run).
    pub fn with_scheduler<F, S>(runtime: &Runtime, func: F, scheduler: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(&ReactiveEffect<T>) + 'static,
    {
        Self::build(runtime, Box::new(func), Some(Box::new(scheduler)))
    }

    fn build(runtime: &Runtime, func: EffectFn<T>, scheduler: Option<SchedulerFn<T>>) -> Self {
        let inner = Rc::new(EffectInner {
            id: EffectId::new(),
            runtime: runtime.downgrade(),
            func,
            scheduler,
            deps: std::cell::RefCell::new(IndexSet::new()),
            active: std::cell::Cell::new(true),
            run_count: std::cell::Cell::new(0),
        });
        let subscriber: Rc<dyn Subscriber> = inner.clone();
        runtime.register_effect(&subscriber);
        Self { inner }
    }

    /// Run the effect, re-collecting its dependencies.
    ///
    /// A stopped effect, or one whose runtime is gone, runs its function
    /// without tracking anything. If the function panics, the active stack is
    /// restored before the panic reaches the caller.
    pub fn run(&self) -> T {
        let Some(rt) = self.inner.runtime.upgrade() else {
            return (self.inner.func)();
        };
        if !self.inner.active.get() {
            return (self.inner.func)();
        }

        self.inner.cleanup();
        self.inner.run_count.set(self.inner.run_count.get() + 1);
        trace!(effect = ?self.inner.id, run = self.inner.run_count.get(), "effect run");

        let _scope = EffectScope::enter(&rt, Some(self.as_subscriber()));
        (self.inner.func)()
    }

    /// Unsubscribe from every bucket. Later writes no longer notify this
    /// effect; a rerun that was already queued still happens.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Whether the effect still tracks dependencies.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Get the effect's unique id.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of buckets the effect is currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Whether the effect carries a custom scheduler.
    pub fn has_scheduler(&self) -> bool {
        self.inner.scheduler.is_some()
    }

    pub(crate) fn as_subscriber(&self) -> Rc<dyn Subscriber> {
        self.inner.clone()
    }
}

impl<T: 'static> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
