//! Components
//!
//! A component definition implements [`Component`]: `setup` builds the
//! initial state record once per instance, `render` turns the observed state
//! into a [`VNode`] tree and is re-run by the instance's render effect
//! whenever something it read changes.
//!
//! A [`ComponentInstance`] is created the first time a component node is
//! mounted and lives as long as some vnode refers to it. There is no explicit
//! unmount.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::host::{HostNodeId, HostTree};
use super::vnode::{same_definition, Children, Props, VNode};
use crate::error::Result;
use crate::reactive::{Observed, ReactiveEffect, Record, Runtime, WatchHandle};

/// A lifecycle hook. Receives the host tree and the node just produced.
pub type Hook = Rc<dyn Fn(&HostTree, HostNodeId)>;

/// A component definition.
pub trait Component {
    /// Name used in logs.
    fn name(&self) -> &str {
        "Anonymous"
    }

    /// Build the initial state. Runs once per instance, untracked.
    fn setup(&self, _props: &Props, _ctx: &SetupContext<'_>) -> Record {
        Record::new()
    }

    /// Produce the tree for the current state.
    fn render(&self, state: &Observed, props: &Props) -> VNode;
}

type SetupFn = Box<dyn Fn(&Props, &SetupContext<'_>) -> Record>;
type RenderFn = Box<dyn Fn(&Observed, &Props) -> VNode>;

/// A component defined by a pair of closures. See [`define_component`].
pub struct FnComponent {
    name: String,
    setup: SetupFn,
    render: RenderFn,
}

impl Component for FnComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&self, props: &Props, ctx: &SetupContext<'_>) -> Record {
        (self.setup)(props, ctx)
    }

    fn render(&self, state: &Observed, props: &Props) -> VNode {
        (self.render)(state, props)
    }
}

/// Define a component from a setup and a render closure.
///
/// ```rust,ignore
/// let counter = define_component(
///     "Counter",
///     |_props, _ctx| record([("count", 0.into())]),
///     |state, _props| h("p", Props::new(), format!("{}", state.get("count").unwrap())),
/// );
/// ```
pub fn define_component<S, R>(name: impl Into<String>, setup: S, render: R) -> Rc<dyn Component>
where
    S: Fn(&Props, &SetupContext<'_>) -> Record + 'static,
    R: Fn(&Observed, &Props) -> VNode + 'static,
{
    Rc::new(FnComponent {
        name: name.into(),
        setup: Box::new(setup),
        render: Box::new(render),
    })
}

/// What a component's `setup` can reach.
pub struct SetupContext<'a> {
    runtime: &'a Runtime,
    instance: &'a Rc<ComponentInstance>,
    attrs: Props,
    slots: IndexMap<String, Children>,
}

impl<'a> SetupContext<'a> {
    pub(crate) fn new(runtime: &'a Runtime, instance: &'a Rc<ComponentInstance>) -> Self {
        Self {
            runtime,
            instance,
            attrs: Props::new(),
            slots: IndexMap::new(),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    /// Fallthrough attributes. Always empty.
    pub fn attrs(&self) -> &Props {
        &self.attrs
    }

    /// Named slots. Always empty.
    pub fn slots(&self) -> &IndexMap<String, Children> {
        &self.slots
    }

    /// Publish a record on the instance for outside inspection.
    pub fn expose(&self, record: Record) {
        self.instance.set_exposed(record);
    }

    pub fn on_mounted<F>(&self, hook: F) -> Result<()>
    where
        F: Fn(&HostTree, HostNodeId) + 'static,
    {
        self.runtime.on_mounted(hook)
    }

    pub fn on_updated<F>(&self, hook: F) -> Result<()>
    where
        F: Fn(&HostTree, HostNodeId) + 'static,
    {
        self.runtime.on_updated(hook)
    }

    /// Keep a watcher alive for as long as the instance.
    pub fn retain(&self, handle: WatchHandle) {
        self.instance.retained.borrow_mut().push(handle);
    }
}

/// Per-mount state of a component.
pub struct ComponentInstance {
    def: Rc<dyn Component>,
    props: Rc<Props>,
    state: OnceCell<Observed>,
    container: Cell<HostNodeId>,
    sub_tree: RefCell<Option<VNode>>,
    mounted_hooks: RefCell<SmallVec<[Hook; 2]>>,
    updated_hooks: RefCell<SmallVec<[Hook; 2]>>,
    is_mounted: Cell<bool>,
    render_effect: OnceCell<ReactiveEffect>,
    exposed: RefCell<Option<Record>>,
    retained: RefCell<Vec<WatchHandle>>,
}

impl ComponentInstance {
    pub(crate) fn new(def: Rc<dyn Component>, props: Rc<Props>, container: HostNodeId) -> Rc<Self> {
        Rc::new(Self {
            def,
            props,
            state: OnceCell::new(),
            container: Cell::new(container),
            sub_tree: RefCell::new(None),
            mounted_hooks: RefCell::new(SmallVec::new()),
            updated_hooks: RefCell::new(SmallVec::new()),
            is_mounted: Cell::new(false),
            render_effect: OnceCell::new(),
            exposed: RefCell::new(None),
            retained: RefCell::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn definition(&self) -> &Rc<dyn Component> {
        &self.def
    }

    /// Whether this instance was created from `def`.
    pub fn is_instance_of(&self, def: &Rc<dyn Component>) -> bool {
        same_definition(&self.def, def)
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Reactive state returned by setup.
    pub fn state(&self) -> Option<&Observed> {
        self.state.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.get()
    }

    /// Root host node of the current subtree.
    pub fn el(&self) -> Option<HostNodeId> {
        self.sub_tree.borrow().as_ref().and_then(VNode::el)
    }

    /// Inspect the most recently rendered subtree.
    pub fn with_sub_tree<R>(&self, f: impl FnOnce(&VNode) -> R) -> Option<R> {
        self.sub_tree.borrow().as_ref().map(f)
    }

    /// Host node the subtree is mounted under.
    pub fn container(&self) -> HostNodeId {
        self.container.get()
    }

    /// Record published with [`SetupContext::expose`].
    pub fn exposed(&self) -> Option<Record> {
        self.exposed.borrow().clone()
    }

    /// How many times the render function has run.
    pub fn render_count(&self) -> usize {
        self.render_effect.get().map_or(0, ReactiveEffect::run_count)
    }

    pub fn mounted_hook_count(&self) -> usize {
        self.mounted_hooks.borrow().len()
    }

    pub fn updated_hook_count(&self) -> usize {
        self.updated_hooks.borrow().len()
    }

    pub(crate) fn add_mounted_hook(&self, hook: Hook) {
        self.mounted_hooks.borrow_mut().push(hook);
    }

    pub(crate) fn add_updated_hook(&self, hook: Hook) {
        self.updated_hooks.borrow_mut().push(hook);
    }

    /// Snapshot so hooks can register more hooks without a borrow conflict.
    pub(crate) fn mounted_hooks(&self) -> SmallVec<[Hook; 2]> {
        self.mounted_hooks.borrow().clone()
    }

    pub(crate) fn updated_hooks(&self) -> SmallVec<[Hook; 2]> {
        self.updated_hooks.borrow().clone()
    }

    pub(crate) fn set_state(&self, state: Observed) {
        let _ = self.state.set(state);
    }

    pub(crate) fn set_render_effect(&self, effect: ReactiveEffect) {
        let _ = self.render_effect.set(effect);
    }

    pub(crate) fn set_container(&self, container: HostNodeId) {
        self.container.set(container);
    }

    pub(crate) fn mark_mounted(&self) {
        self.is_mounted.set(true);
    }

    pub(crate) fn take_sub_tree(&self) -> Option<VNode> {
        self.sub_tree.borrow_mut().take()
    }

    pub(crate) fn set_sub_tree(&self, tree: VNode) {
        *self.sub_tree.borrow_mut() = Some(tree);
    }

    fn set_exposed(&self, record: Record) {
        *self.exposed.borrow_mut() = Some(record);
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.name())
            .field("mounted", &self.is_mounted())
            .field("el", &self.el())
            .field("renders", &self.render_count())
            .finish()
    }
}
