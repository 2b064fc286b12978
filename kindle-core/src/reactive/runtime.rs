//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects containers, effects
//! and the scheduler. It owns the dependency registry, the active-effect
//! stack, the current component instance and both scheduler queues.
//!
//! # How It Works
//!
//! 1. When a container is read inside a running effect, the runtime records
//!    the effect in the `(container, key)` bucket ([`Runtime::track`]).
//!
//! 2. When a container is written, the runtime looks up the bucket
//!    ([`Runtime::trigger`]) and, for each subscriber:
//!    a. invokes its scheduler synchronously (computed values, watchers), or
//!    b. queues it on the render queue, scheduling a flush microtask.
//!
//! 3. [`Runtime::drain_microtasks`] is the microtask boundary: it runs queued
//!    flushes until none are left.
//!
//! # Single Threaded
//!
//! There is no global state. A `Runtime` is an `Rc` handle; every container
//! and effect created from it holds a weak reference back, so dropping the
//! last `Runtime` handle stops all reactivity without leaking queued effects.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, error, trace, warn};

use super::computed::Computed;
use super::context::{ContextStack, EffectScope};
use super::observed::{Observed, Record};
use super::registry::DepRegistry;
use super::subscriber::{DepKey, EffectId, Subscriber, TargetId};
use super::cell::Cell;
use super::watch::{self, WatchHandle};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::render::{ComponentInstance, HostNodeId, HostTree};
use crate::scheduler::{Microtask, NextTick, Scheduler};

/// Shared state behind a [`Runtime`] handle.
pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) registry: std::cell::RefCell<DepRegistry>,
    pub(crate) effects: std::cell::RefCell<HashMap<EffectId, Weak<dyn Subscriber>>>,
    pub(crate) stack: std::cell::RefCell<ContextStack>,
    pub(crate) scheduler: std::cell::RefCell<Scheduler>,
    pub(crate) instances: std::cell::RefCell<Vec<Rc<ComponentInstance>>>,
}

/// Handle to a reactive runtime.
///
/// Cloning is cheap and yields a handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning handle held by containers and effects.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with a custom configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                registry: std::cell::RefCell::new(DepRegistry::new()),
                effects: std::cell::RefCell::new(HashMap::new()),
                stack: std::cell::RefCell::new(ContextStack::default()),
                scheduler: std::cell::RefCell::new(Scheduler::new()),
                instances: std::cell::RefCell::new(Vec::new()),
            }),
        }
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn inner(&self) -> &RuntimeInner {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Public constructors
    // ------------------------------------------------------------------

    /// Wrap a record in an observed container.
    ///
    /// Every call creates a new identity, even for equal records.
    pub fn observe(&self, record: Record) -> Observed {
        Observed::new(self, record)
    }

    /// Create a single-value reactive cell.
    pub fn cell<T: 'static>(&self, initial: T) -> Cell<T> {
        Cell::new(self, initial)
    }

    /// Create a lazily recomputed derived value.
    pub fn derive<T, F>(&self, derivation: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        Computed::new(self, derivation)
    }

    /// Call `callback(new, old)` whenever a dependency of `selector` changes.
    ///
    /// See [`watch::watch`].
    pub fn watch<T, S, C>(&self, selector: S, callback: C) -> WatchHandle
    where
        T: Clone + 'static,
        S: Fn() -> T + 'static,
        C: FnMut(T, T) + 'static,
    {
        watch::watch(self, selector, callback)
    }

    /// Rerun `f` whenever one of its dependencies changes.
    ///
    /// See [`watch::watch_effect`].
    pub fn watch_effect<F>(&self, f: F) -> WatchHandle
    where
        F: Fn() + 'static,
    {
        watch::watch_effect(self, f)
    }

    /// Resolve after the next next-tick flush.
    pub fn next_tick(&self) -> NextTick {
        self.next_tick_with(|| {})
    }

    /// Run `callback` at the next next-tick flush, and resolve once that
    /// flush has completed.
    pub fn next_tick_with<F>(&self, callback: F) -> NextTick
    where
        F: FnOnce() + 'static,
    {
        let (tick, scheduled) = self
            .inner
            .scheduler
            .borrow_mut()
            .queue_tick(Box::new(callback));
        if scheduled {
            trace!("next-tick flush scheduled");
        }
        tick
    }

    /// Register a hook that runs after the current component first mounts.
    ///
    /// Only valid while a component's setup is executing.
    pub fn on_mounted<F>(&self, hook: F) -> Result<()>
    where
        F: Fn(&HostTree, HostNodeId) + 'static,
    {
        let instance = self.current_instance_for("on_mounted")?;
        instance.add_mounted_hook(Rc::new(hook));
        Ok(())
    }

    /// Register a hook that runs after every re-render of the current component.
    ///
    /// Only valid while a component's setup is executing.
    pub fn on_updated<F>(&self, hook: F) -> Result<()>
    where
        F: Fn(&HostTree, HostNodeId) + 'static,
    {
        let instance = self.current_instance_for("on_updated")?;
        instance.add_updated_hook(Rc::new(hook));
        Ok(())
    }

    fn current_instance_for(&self, hook: &'static str) -> Result<Rc<ComponentInstance>> {
        self.current_instance().ok_or_else(|| {
            error!(hook, "lifecycle hook registered outside of component setup");
            RuntimeError::HookOutsideSetup { hook }
        })
    }

    /// The component whose setup is currently running, if any.
    pub fn current_instance(&self) -> Option<Rc<ComponentInstance>> {
        self.inner.instances.borrow().last().cloned()
    }

    /// Make `instance` current until the guard is dropped.
    pub(crate) fn enter_setup(&self, instance: &Rc<ComponentInstance>) -> SetupGuard {
        self.inner.instances.borrow_mut().push(Rc::clone(instance));
        SetupGuard {
            runtime: self.clone(),
        }
    }

    /// Run `f` without subscribing the current effect to anything it reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _scope = EffectScope::enter(self, None);
        f()
    }

    // ------------------------------------------------------------------
    // Dependency tracking
    // ------------------------------------------------------------------

    /// Subscribe the running effect, if any, to `target.key`.
    pub(crate) fn track(&self, target: TargetId, key: &str) {
        let Some(current) = self.inner.stack.borrow().current() else {
            return;
        };
        let dep = DepKey::new(target, key);
        let added = self
            .inner
            .registry
            .borrow_mut()
            .subscribe(&dep, current.id());
        if added {
            trace!(target = target.raw(), key, effect = ?current.id(), "track");
        }
        current.record_dependency(dep);
    }

    /// Notify every subscriber of `target.key`.
    pub(crate) fn trigger(&self, target: TargetId, key: &str) {
        let dep = DepKey::new(target, key);
        let Some(ids) = self.inner.registry.borrow().subscribers(&dep) else {
            return;
        };

        // Resolve before notifying: schedulers may resubscribe while we iterate.
        let subscribers: Vec<Rc<dyn Subscriber>> = {
            let effects = self.inner.effects.borrow();
            ids.iter()
                .filter_map(|id| effects.get(id).and_then(Weak::upgrade))
                .collect()
        };
        let running = self.current_effect();
        trace!(target = target.raw(), key, subscribers = subscribers.len(), "trigger");

        for subscriber in subscribers {
            if Some(subscriber.id()) == running {
                if self.inner.config.warn_on_self_trigger {
                    warn!(effect = ?subscriber.id(), key, "effect wrote to its own dependency; skipped");
                }
                continue;
            }
            subscriber.notify();
        }
    }

    /// Forget every bucket of a container that is going away.
    pub(crate) fn release_target(&self, target: TargetId) {
        if let Ok(mut registry) = self.inner.registry.try_borrow_mut() {
            let dropped = registry.release(target);
            if dropped > 0 {
                trace!(target = target.raw(), dropped, "released target");
            }
        }
    }

    pub(crate) fn register_effect(&self, subscriber: &Rc<dyn Subscriber>) {
        self.inner
            .effects
            .borrow_mut()
            .insert(subscriber.id(), Rc::downgrade(subscriber));
    }

    pub(crate) fn unregister_effect(&self, id: EffectId) {
        if let Ok(mut effects) = self.inner.effects.try_borrow_mut() {
            effects.remove(&id);
        }
    }

    /// Id of the effect whose reads are currently being tracked.
    pub fn current_effect(&self) -> Option<EffectId> {
        self.inner.stack.borrow().current_id()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking(&self) -> bool {
        self.current_effect().is_some()
    }

    /// Number of effects subscribed to `target.key`.
    pub fn subscriber_count(&self, target: TargetId, key: &str) -> usize {
        self.inner
            .registry
            .borrow()
            .bucket_len(&DepKey::new(target, key))
    }

    /// Number of live effects registered with this runtime.
    pub fn effect_count(&self) -> usize {
        self.inner
            .effects
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of containers that currently have subscribers.
    pub fn tracked_target_count(&self) -> usize {
        self.inner.registry.borrow().target_count()
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    pub(crate) fn queue_job(&self, job: Rc<dyn Subscriber>) {
        let id = job.id();
        if self.inner.scheduler.borrow_mut().queue_job(job) {
            trace!(effect = ?id, "render flush scheduled");
        }
    }

    /// Number of effects waiting for the next render flush.
    pub fn pending_jobs(&self) -> usize {
        self.inner.scheduler.borrow().pending_jobs()
    }

    /// Number of microtasks waiting to run.
    pub fn pending_microtasks(&self) -> usize {
        self.inner.scheduler.borrow().pending_microtasks()
    }

    /// Run microtasks until none are left. Returns how many ran.
    ///
    /// This is the point where control "returns to the scheduler": every
    /// mutation made before the call is flushed by it. Flushes scheduled by
    /// the drain itself (a rerun that writes state, a next-tick callback)
    /// run in the same call, in FIFO order.
    ///
    /// Fails with [`RuntimeError::MicrotaskLimitExceeded`] after
    /// `max_microtask_rounds` microtasks; the remaining work stays queued.
    pub fn drain_microtasks(&self) -> Result<usize> {
        let limit = self.inner.config.max_microtask_rounds;
        let mut processed = 0;

        loop {
            let Some(task) = self.inner.scheduler.borrow_mut().next_microtask() else {
                break;
            };
            if processed == limit {
                self.inner.scheduler.borrow_mut().requeue_front(task);
                error!(limit, "microtask limit exceeded");
                return Err(RuntimeError::MicrotaskLimitExceeded { limit });
            }
            processed += 1;

            match task {
                Microtask::FlushJobs => self.flush_jobs(),
                Microtask::FlushTicks => self.flush_ticks(),
            }
        }

        Ok(processed)
    }

    /// Run one generation of render jobs.
    ///
    /// A panicking job does not cost its siblings their run: the rest of the
    /// generation still executes, then the first panic resumes.
    fn flush_jobs(&self) {
        let jobs = self.inner.scheduler.borrow_mut().begin_job_flush();
        debug!(jobs = jobs.len(), "flushing render queue");

        let mut failure = None;
        for job in jobs {
            let id = job.id();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job.run_job())) {
                error!(effect = ?id, "render job panicked");
                failure.get_or_insert(payload);
            }
        }
        if let Some(payload) = failure {
            panic::resume_unwind(payload);
        }
    }

    fn flush_ticks(&self) {
        let round = self.inner.scheduler.borrow_mut().begin_tick_flush();
        debug!(callbacks = round.len(), "flushing next-tick queue");
        round.run();
    }
}

/// Pops the current component instance when dropped.
pub(crate) struct SetupGuard {
    runtime: Runtime,
}

impl Drop for SetupGuard {
    fn drop(&mut self) {
        self.runtime.inner.instances.borrow_mut().pop();
    }
}

/// Build a [`Record`] from `(key, value)` pairs.
///
/// ```rust,ignore
/// let state = rt.observe(record([("count", 0.into()), ("label", "clicks".into())]));
/// ```
pub fn record<K, I>(entries: I) -> Record
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
