//! Error types for the Kindle runtime.
//!
//! Two families of failure exist:
//!
//! - [`RuntimeError`]: misuse of the reactive API or a failed scheduling round.
//! - [`HostError`]: a host-tree mutation that could not be applied. The
//!   renderer reports these and keeps going; they only surface to callers from
//!   the [`HostTree`](crate::render::HostTree) methods themselves.

use thiserror::Error;

use crate::render::HostNodeId;

/// Result alias used throughout the crate.
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// Errors raised by the reactive runtime and the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A lifecycle hook was registered while no component setup was running.
    #[error("`{hook}` called outside of a component setup")]
    HookOutsideSetup {
        /// Name of the registration function that was called.
        hook: &'static str,
    },

    /// At least one callback in a next-tick round panicked.
    #[error("next-tick callback panicked: {message}")]
    TickCallbackPanicked {
        /// Panic payload of the first failing callback in the round.
        message: String,
    },

    /// The runtime was dropped before the next-tick round was flushed.
    #[error("runtime dropped before the next tick was flushed")]
    TickDropped,

    /// `drain_microtasks` processed more microtasks than the configured bound.
    #[error("microtask limit of {limit} exceeded; an effect is probably re-triggering itself")]
    MicrotaskLimitExceeded {
        /// The configured `max_microtask_rounds`.
        limit: usize,
    },

    /// `App::mount` could not resolve its selector in the host tree.
    #[error("mount target `{selector}` not found")]
    MountTargetNotFound {
        /// The selector that was passed to `mount`.
        selector: String,
    },

    /// The configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(String),

    /// A host-tree mutation failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors raised by host-tree mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HostError {
    /// The node id does not refer to a live node.
    #[error("host node {0:?} does not exist")]
    NodeNotFound(HostNodeId),

    /// `release` was called on the root or on a node that still has a parent.
    #[error("host node {0:?} is still attached")]
    StillAttached(HostNodeId),

    /// The operation needs an element but the node is text or a comment.
    #[error("host node {0:?} is not an element")]
    NotAnElement(HostNodeId),

    /// `replace_child`/`remove_child` was given a node that is not a child of the parent.
    #[error("host node {child:?} is not a child of {parent:?}")]
    NotAChild {
        /// The would-be parent.
        parent: HostNodeId,
        /// The node that was expected among its children.
        child: HostNodeId,
    },

    /// Attaching the node would make it an ancestor of itself.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// The would-be parent.
        parent: HostNodeId,
        /// The node being attached.
        child: HostNodeId,
    },
}
