//! Kindle Core
//!
//! This crate provides the core runtime for the Kindle reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (observed records, cells, computed values, effects,
//!   watchers) with automatic dependency tracking
//! - A microtask-batched update scheduler with next-tick awaitables
//! - A virtual node renderer with components and lifecycle hooks
//!
//! Everything is single threaded. All state lives in an explicit
//! [`Runtime`]; handles are `Rc` based and `!Send`.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `scheduler`: Render queue, next-tick queue and the microtask FIFO
//! - `render`: Virtual nodes, host tree, renderer and components
//! - `config`: Runtime configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use kindle_core::prelude::*;
//!
//! let rt = Runtime::new();
//! let state = rt.observe(record([("count", 0.into())]));
//!
//! // A derived value
//! let s = state.clone();
//! let doubled = rt.derive(move || s.get_as::<i64>("count").unwrap_or(0) * 2);
//!
//! // A watcher
//! let _watch = rt.watch(move || doubled.value(), |new, old| {
//!     println!("doubled: {old} -> {new}");
//! });
//!
//! state.set("count", 5);   // prints "doubled: 0 -> 10"
//! rt.drain_microtasks()?;  // flushes queued render effects
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use config::RuntimeConfig;
pub use error::{HostError, Result, RuntimeError};
pub use reactive::Runtime;

/// Commonly used items.
pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::error::{HostError, Result, RuntimeError};
    pub use crate::reactive::{
        record, watch, watch_effect, Cell, Computed, Observed, ReactiveEffect, Record, Runtime,
        ValueCell, WatchHandle,
    };
    pub use crate::render::{
        component, create_app, define_component, h, marker, text, App, Children, Component,
        Event, HostNodeId, HostTree, Props, Renderer, SetupContext, VNode,
    };
    pub use crate::scheduler::NextTick;
}
