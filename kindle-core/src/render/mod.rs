//! Rendering
//!
//! This module turns declarative [`VNode`] trees into nodes of a retained
//! [`HostTree`] and keeps them up to date.
//!
//! # Pipeline
//!
//! 1. [`create_app`] binds a root [`Component`] to a runtime and a host tree.
//! 2. Mounting a component runs its `setup` once, wraps the returned record
//!    in an [`Observed`](crate::reactive::Observed) and starts a render
//!    effect that calls `render` with it.
//! 3. Whenever the render effect reruns, the [`Renderer`] patches the host
//!    tree from the previous subtree to the new one and runs the component's
//!    lifecycle hooks.

mod app;
mod component;
mod host;
mod renderer;
mod vnode;

pub use app::{create_app, App};
pub use component::{define_component, Component, ComponentInstance, FnComponent, Hook, SetupContext};
pub use host::{Event, HostNodeId, HostTree, Listener};
pub use renderer::Renderer;
pub use vnode::{component, h, marker, text, Children, EventHandler, PropValue, Props, VNode, VNodeKind};
