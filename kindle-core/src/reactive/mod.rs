//! Reactive Primitives
//!
//! This module implements the core reactive system: observed containers,
//! effects, computed values and watchers. These primitives form the
//! foundation of Kindle's component updates.
//!
//! # Concepts
//!
//! ## Observed containers
//!
//! An [`Observed`] record or a [`Cell`] holds mutable state. When one of its
//! slots is read while an effect is running, the effect is registered as a
//! subscriber of that `(container, key)` pair. Writing the slot notifies
//! every subscriber.
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] is a re-runnable computation. Each run forgets the
//! previous dependencies and re-collects them. By default a notified effect
//! is queued for the next render flush; an effect with a custom scheduler
//! decides for itself what to do.
//!
//! ## Computed values
//!
//! A [`Computed`] caches a derived value and recomputes it lazily, on the
//! first read after a dependency changed.
//!
//! ## Watchers
//!
//! [`watch`] and [`watch_effect`] run side effects synchronously on change.
//!
//! # Implementation Notes
//!
//! All state lives in an explicit [`Runtime`]. There is no thread-local or
//! global registry; two runtimes never observe each other.

mod cell;
mod computed;
mod context;
mod effect;
mod observed;
mod registry;
mod runtime;
mod subscriber;
mod watch;

pub use cell::{Cell, ValueCell, VALUE_KEY};
pub use computed::Computed;
pub use effect::ReactiveEffect;
pub use observed::{Observed, Record, ITERATE_KEY};
pub use runtime::{record, Runtime};
pub use subscriber::{DepKey, EffectId, TargetId};
pub use watch::{watch, watch_effect, WatchHandle};

pub(crate) use runtime::WeakRuntime;
pub(crate) use subscriber::Subscriber;
