//! Watchers
//!
//! Watchers are eager effects that exist for their side effects.
//!
//! - [`watch`] reruns a *selector* when its dependencies change and hands the
//!   new and previous results to a callback.
//! - [`watch_effect`] simply reruns a function when its dependencies change.
//!
//! Both run once at creation to collect dependencies, and both react
//! synchronously: the rerun happens inside the write that triggered it, not at
//! the next flush.
//!
//! # Disposal
//!
//! Both return a [`WatchHandle`]. Calling [`WatchHandle::stop`], or dropping
//! the handle, unsubscribes the watcher from every bucket. A rerun that was
//! already handed to the scheduler is not retracted.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use super::effect::ReactiveEffect;
use super::runtime::Runtime;
use super::subscriber::{EffectId, Subscriber};

/// Owner of a running watcher. Dropping it stops the watcher.
#[must_use = "dropping a WatchHandle stops the watcher"]
pub struct WatchHandle {
    effect: Rc<dyn Subscriber>,
}

impl WatchHandle {
    fn new<T: 'static>(effect: &ReactiveEffect<T>) -> Self {
        Self {
            effect: effect.as_subscriber(),
        }
    }

    /// Stop the watcher. Later writes no longer reach it.
    pub fn stop(&self) {
        self.effect.stop();
    }

    /// Whether the watcher still reacts to changes.
    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }

    /// Id of the underlying effect.
    pub fn id(&self) -> EffectId {
        self.effect.id()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.effect.stop();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Call `callback(new, old)` after every change to a dependency of `selector`.
///
/// The selector runs once immediately to record the baseline `old` value;
/// the callback is not called for it.
///
/// ```rust,ignore
/// let count = rt.cell(0);
/// let c = count.clone();
/// let handle = watch(&rt, move || c.value(), |new, old| {
///     println!("{old} -> {new}");
/// });
/// count.set_value(1); // prints "0 -> 1"
/// ```
pub fn watch<T, S, C>(runtime: &Runtime, selector: S, callback: C) -> WatchHandle
where
    T: Clone + 'static,
    S: Fn() -> T + 'static,
    C: FnMut(T, T) + 'static,
{
    // `old` rotates on every rerun, including ones whose callback is skipped,
    // so the next callback always sees the value right before its change.
    let old: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let callback = RefCell::new(callback);

    let last = Rc::clone(&old);
    let effect = ReactiveEffect::with_scheduler(runtime, selector, move |effect| {
        let new = effect.run();
        let Some(previous) = last.borrow_mut().replace(new.clone()) else {
            return;
        };
        let Ok(mut callback) = callback.try_borrow_mut() else {
            warn!(effect = ?effect.id(), "watch callback re-entered; change skipped");
            return;
        };
        (*callback)(new, previous);
    });

    let initial = effect.run();
    *old.borrow_mut() = Some(initial);

    WatchHandle::new(&effect)
}

/// Run `f` now, then again synchronously whenever one of its dependencies
/// changes.
pub fn watch_effect<F>(runtime: &Runtime, f: F) -> WatchHandle
where
    F: Fn() + 'static,
{
    let effect = ReactiveEffect::with_scheduler(runtime, f, |effect| {
        effect.run();
    });
    effect.run();
    WatchHandle::new(&effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::record;
    use std::cell::{Cell, RefCell};

    #[test]
    fn watch_reports_new_and_old() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let calls = Rc::new(RefCell::new(Vec::new()));

        let (c, log) = (count.clone(), calls.clone());
        let _handle = rt.watch(move || c.value(), move |new, old| {
            log.borrow_mut().push((new, old));
        });

        assert!(calls.borrow().is_empty());

        count.set_value(1);
        count.set_value(5);
        assert_eq!(*calls.borrow(), vec![(1, 0), (5, 1)]);
    }

    #[test]
    fn watch_selector_runs_once_eagerly() {
        let rt = Runtime::new();
        let state = rt.observe(record([("name", "a".into())]));
        let selector_runs = Rc::new(Cell::new(0));

        let (s, n) = (state.clone(), selector_runs.clone());
        let _handle = rt.watch(
            move || {
                n.set(n.get() + 1);
                s.get_as::<String>("name")
            },
            |_, _| {},
        );
        assert_eq!(selector_runs.get(), 1);
    }

    #[test]
    fn stopped_watch_ignores_later_changes() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let calls = Rc::new(Cell::new(0));

        let (c, n) = (count.clone(), calls.clone());
        let handle = rt.watch(move || c.value(), move |_, _| n.set(n.get() + 1));

        count.set_value(1);
        assert_eq!(calls.get(), 1);

        handle.stop();
        assert!(!handle.is_active());
        count.set_value(2);
        count.set_value(3);
        assert_eq!(calls.get(), 1);
        assert_eq!(rt.subscriber_count(count.id(), "value"), 0);
    }

    #[test]
    fn dropping_handle_stops_watch() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let calls = Rc::new(Cell::new(0));

        let (c, n) = (count.clone(), calls.clone());
        let handle = rt.watch(move || c.value(), move |_, _| n.set(n.get() + 1));
        drop(handle);

        count.set_value(1);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn watch_effect_reruns_synchronously() {
        let rt = Runtime::new();
        let count = rt.cell(1);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (c, s) = (count.clone(), seen.clone());
        let handle = rt.watch_effect(move || s.borrow_mut().push(c.value()));
        assert_eq!(*seen.borrow(), vec![1]);

        count.set_value(2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(rt.pending_jobs(), 0);

        handle.stop();
        count.set_value(3);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn watch_a_computed_value() {
        let rt = Runtime::new();
        let count = rt.cell(1);
        let c = count.clone();
        let doubled = rt.derive(move || c.value() * 2);
        let calls = Rc::new(RefCell::new(Vec::new()));

        let (d, log) = (doubled.clone(), calls.clone());
        let _handle = rt.watch(move || d.value(), move |new, old| {
            log.borrow_mut().push((new, old))
        });

        count.set_value(4);
        assert_eq!(*calls.borrow(), vec![(8, 2)]);
    }

    #[test]
    fn watch_callback_writing_its_source_is_not_reentered() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let calls = Rc::new(Cell::new(0));

        let (c, writer, n) = (count.clone(), count.clone(), calls.clone());
        let _handle = rt.watch(move || c.value(), move |new, _| {
            n.set(n.get() + 1);
            if new < 10 {
                writer.set_value(10);
            }
        });

        count.set_value(1);
        // The nested change is seen by the selector but its callback is skipped.
        assert_eq!(calls.get(), 1);
        assert_eq!(count.value(), 10);
    }

    #[test]
    fn skipped_nested_change_still_becomes_the_next_old_value() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let calls = Rc::new(RefCell::new(Vec::new()));

        let (c, writer, log) = (count.clone(), count.clone(), calls.clone());
        let _handle = rt.watch(move || c.value(), move |new, old| {
            log.borrow_mut().push((new, old));
            if new == 1 {
                writer.set_value(2);
            }
        });

        count.set_value(1);
        assert_eq!(count.value(), 2);
        assert_eq!(*calls.borrow(), vec![(1, 0)]);

        count.set_value(10);
        assert_eq!(*calls.borrow(), vec![(1, 0), (10, 2)]);
    }
}
