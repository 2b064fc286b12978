//! Renderer
//!
//! Mounts vnode trees into a [`HostTree`] and patches them on change.
//!
//! # Patching
//!
//! There is no per-child reconciliation. When a component re-renders, the
//! new tree is compared with the previous one at the root only:
//!
//! - If both have the same kind (text content, tag, component definition)
//!   and their children are identical (see [`Children::shares`]), nothing is
//!   touched and the new tree takes over the old host node.
//! - Otherwise the whole new tree is rendered and its host node replaces the
//!   old one in place.
//!
//! While rendering a replacement, a component node whose previous tree had a
//! mounted instance of the same definition at the same position reuses that
//! instance and its host node, so component state survives a parent
//! re-render.
//!
//! # Host Errors
//!
//! A host mutation that fails is logged and skipped; the rest of the render
//! pass goes on.

use std::rc::Rc;

use tracing::{debug, error, trace, warn};

use super::component::{ComponentInstance, Hook, SetupContext};
use super::host::{HostNodeId, HostTree};
use super::vnode::{Children, PropValue, Props, VNode, VNodeKind};
use crate::error::HostError;
use crate::reactive::{ReactiveEffect, Runtime, WeakRuntime};
use serde_json::Value;

/// Renders vnodes into one host tree on behalf of one runtime.
#[derive(Clone)]
pub struct Renderer {
    runtime: WeakRuntime,
    host: HostTree,
}

impl Renderer {
    pub fn new(runtime: &Runtime, host: &HostTree) -> Self {
        Self {
            runtime: runtime.downgrade(),
            host: host.clone(),
        }
    }

    pub fn host(&self) -> &HostTree {
        &self.host
    }

    /// Mount `vnode` under `container`.
    ///
    /// Component nodes get a fresh instance. Anything else is mounted
    /// directly and never updated.
    pub fn render(&self, vnode: &VNode, container: HostNodeId) {
        if vnode.is_component() {
            self.mount_component(vnode, container);
        } else {
            self.patch(None, vnode, container);
        }
    }

    /// Create an instance for a component node, run its setup and mount it
    /// through a render effect.
    pub fn mount_component(&self, vnode: &VNode, container: HostNodeId) {
        let VNodeKind::Component { def, props } = vnode.kind() else {
            self.patch(None, vnode, container);
            return;
        };
        let Some(rt) = self.runtime.upgrade() else {
            warn!(component = def.name(), "runtime dropped; component not mounted");
            return;
        };

        let instance = ComponentInstance::new(Rc::clone(def), Rc::clone(props), container);
        vnode.set_component(Rc::clone(&instance));

        let record = {
            let _setup = rt.enter_setup(&instance);
            rt.untracked(|| {
                let ctx = SetupContext::new(&rt, &instance);
                def.setup(props, &ctx)
            })
        };
        instance.set_state(rt.observe(record));

        let weak = Rc::downgrade(&instance);
        let renderer = self.clone();
        let effect = ReactiveEffect::new(&rt, move || {
            if let Some(instance) = weak.upgrade() {
                renderer.render_component(&instance);
            }
        });
        instance.set_render_effect(effect.clone());
        effect.run();

        vnode.set_el(instance.el());
    }

    /// Body of a component's render effect.
    fn render_component(&self, instance: &Rc<ComponentInstance>) {
        let Some(state) = instance.state() else {
            return;
        };
        let tree = instance.definition().render(state, instance.props());
        let container = instance.container();

        if instance.is_mounted() {
            let previous = instance.take_sub_tree();
            self.patch(previous.as_ref(), &tree, container);
            let el = tree.el();
            instance.set_sub_tree(tree);
            trace!(component = instance.name(), "component updated");
            self.run_hooks(instance, instance.updated_hooks(), el);
        } else {
            self.patch(None, &tree, container);
            instance.mark_mounted();
            let el = tree.el();
            instance.set_sub_tree(tree);
            debug!(component = instance.name(), ?el, "component mounted");
            self.run_hooks(instance, instance.mounted_hooks(), el);
        }
    }

    fn run_hooks(
        &self,
        instance: &ComponentInstance,
        hooks: impl IntoIterator<Item = Hook>,
        el: Option<HostNodeId>,
    ) {
        let Some(el) = el else {
            warn!(component = instance.name(), "render produced no host node; hooks skipped");
            return;
        };
        let Some(rt) = self.runtime.upgrade() else {
            return;
        };
        // Reads inside hooks must not subscribe the render effect.
        rt.untracked(|| {
            for hook in hooks {
                hook(&self.host, el);
            }
        });
    }

    /// Bring `container` from showing `old` to showing `new`.
    ///
    /// With no `old`, `new` is mounted. Otherwise the patch is skipped when
    /// both nodes share their children and are the same kind of node; any
    /// other change re-renders `new` and replaces the old host node in place.
    ///
    /// The kind check also compares element tags. Childless nodes always
    /// share their (empty) children, so without it `<p/>` turning into
    /// `<div/>` would never reach the host.
    pub fn patch(&self, old: Option<&VNode>, new: &VNode, container: HostNodeId) {
        let Some(old) = old else {
            if let Some(node) = self.render_vnode(new, container, None) {
                self.attach(container, node, None);
            }
            return;
        };

        if old.same_kind(new) && old.children().shares(new.children()) {
            trace!("children unchanged; patch skipped");
            new.adopt(old);
            return;
        }

        let previous = old.el();
        if let Some(node) = self.render_vnode(new, container, Some(old)) {
            self.attach(container, node, previous);
        }
    }

    /// Produce the host node for `vnode`. `prev` is the node that occupied
    /// the same position in the previous tree.
    fn render_vnode(&self, vnode: &VNode, container: HostNodeId, prev: Option<&VNode>) -> Option<HostNodeId> {
        let el = match vnode.kind() {
            VNodeKind::Text(content) => Some(self.host.create_text(content)),
            VNodeKind::Marker => {
                let payload = match vnode.children() {
                    Children::Text(text) => text.as_str(),
                    _ => "",
                };
                Some(self.host.create_comment(payload))
            }
            VNodeKind::Component { .. } => {
                if let Some(instance) = prev.and_then(|prev| reusable_instance(prev, vnode)) {
                    trace!(component = instance.name(), "component instance reused");
                    instance.set_container(container);
                    vnode.set_component(Rc::clone(&instance));
                    instance.el()
                } else {
                    self.render(vnode, container);
                    vnode.el()
                }
            }
            VNodeKind::Element { tag, props } => {
                let el = self.host.create_element(tag);
                self.apply_props(el, props);
                match vnode.children() {
                    Children::Empty => {}
                    Children::Text(text) => {
                        let node = self.host.create_text(text);
                        self.report(self.host.append_child(el, node), "append text");
                    }
                    Children::Nodes(children) => {
                        let prev_children = prev.map(VNode::children);
                        for (index, child) in children.iter().enumerate() {
                            let prev_child = prev_children.and_then(|c| c.get(index));
                            if let Some(node) = self.render_vnode(child, el, prev_child) {
                                self.report(self.host.append_child(el, node), "append child");
                            }
                        }
                    }
                }
                Some(el)
            }
        };
        vnode.set_el(el);
        el
    }

    /// Put `node` into `container`, replacing `previous` in place when it is
    /// a different node still under `container`.
    fn attach(&self, container: HostNodeId, node: HostNodeId, previous: Option<HostNodeId>) {
        let in_container = |id| self.host.parent(id) == Some(container);
        match previous {
            Some(previous) if previous != node && in_container(previous) => {
                let replaced = self.host.replace_child(container, node, previous);
                if replaced.is_ok() {
                    // Reused child nodes were moved into `node` already.
                    self.report(self.host.release(previous).map(drop), "release");
                }
                self.report(replaced, "replace");
            }
            Some(previous) if previous == node && in_container(node) => {}
            _ => self.report(self.host.append_child(container, node), "append"),
        }
    }

    fn apply_props(&self, el: HostNodeId, props: &Props) {
        for (key, value) in props.iter() {
            let result = match (key.as_str(), value) {
                ("class", PropValue::Value(value)) => {
                    self.host.set_attribute(el, "class", &attribute_text(value))
                }
                ("style", PropValue::Value(Value::String(text))) => self.host.set_style_text(el, text),
                ("style", PropValue::Value(Value::Object(entries))) => self.host.merge_style(
                    el,
                    entries
                        .iter()
                        .map(|(name, value)| (name.clone(), attribute_text(value))),
                ),
                ("style", PropValue::Value(other)) => {
                    warn!(value = %other, "style prop must be a string or an object; ignored");
                    Ok(())
                }
                (key, value) if is_event_prop(key) => match value {
                    PropValue::Handler(handler) => {
                        let event = key[2..].to_lowercase();
                        self.host.add_event_listener(el, &event, Rc::clone(handler))
                    }
                    PropValue::Value(_) => {
                        warn!(prop = key, "event prop is not a handler; ignored");
                        Ok(())
                    }
                },
                (key, PropValue::Value(value)) => self.host.set_attribute(el, key, &attribute_text(value)),
                (key, PropValue::Handler(_)) => {
                    warn!(prop = key, "handler on a non-event prop; ignored");
                    Ok(())
                }
            };
            self.report(result, "set prop");
        }
    }

    fn report(&self, result: Result<(), HostError>, operation: &'static str) {
        if let Err(err) = result {
            error!(%err, operation, "host mutation failed");
        }
    }
}

/// The mounted instance of `prev`, if `vnode` may take it over.
fn reusable_instance(prev: &VNode, vnode: &VNode) -> Option<Rc<ComponentInstance>> {
    let VNodeKind::Component { def, .. } = vnode.kind() else {
        return None;
    };
    let instance = prev.component_instance()?;
    (instance.is_instance_of(def) && instance.is_mounted()).then_some(instance)
}

fn is_event_prop(key: &str) -> bool {
    key.len() > 2 && key.starts_with("on")
}

fn attribute_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
