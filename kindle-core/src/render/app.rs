//! Application entry point.

use std::rc::Rc;

use tracing::{debug, error};

use super::component::{Component, ComponentInstance};
use super::host::{HostNodeId, HostTree};
use super::renderer::Renderer;
use super::vnode::{component, Props, VNode};
use crate::error::{Result, RuntimeError};
use crate::reactive::Runtime;

/// A root component bound to a runtime and a host tree, ready to mount.
pub struct App {
    renderer: Renderer,
    root: Rc<dyn Component>,
    props: Props,
    vnode: Option<VNode>,
}

/// Create an app for `root`.
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let host = HostTree::new();
/// let mut app = create_app(&rt, &host, Rc::new(Counter));
/// app.mount("body")?;
/// ```
pub fn create_app(runtime: &Runtime, host: &HostTree, root: Rc<dyn Component>) -> App {
    App {
        renderer: Renderer::new(runtime, host),
        root,
        props: Props::new(),
        vnode: None,
    }
}

impl App {
    /// Props passed to the root component.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Render the root component into the first element matching `selector`.
    ///
    /// Returns the container. Mounting again renders a fresh instance.
    pub fn mount(&mut self, selector: &str) -> Result<HostNodeId> {
        let Some(target) = self.renderer.host().query_selector(selector) else {
            error!(selector, "mount target not found");
            return Err(RuntimeError::MountTargetNotFound {
                selector: selector.to_owned(),
            });
        };

        let vnode = component(Rc::clone(&self.root), self.props.clone());
        self.renderer.render(&vnode, target);
        debug!(selector, component = self.root.name(), "app mounted");
        self.vnode = Some(vnode);
        Ok(target)
    }

    pub fn is_mounted(&self) -> bool {
        self.vnode.is_some()
    }

    /// Instance of the root component once mounted.
    pub fn root_instance(&self) -> Option<Rc<ComponentInstance>> {
        self.vnode.as_ref()?.component_instance()
    }

    pub fn host(&self) -> &HostTree {
        self.renderer.host()
    }
}
