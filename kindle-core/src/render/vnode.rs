//! Virtual Nodes
//!
//! A [`VNode`] is one of four kinds: a literal text node, a host element with
//! props and children, a component with props, or an opaque marker. Once
//! mounted it remembers the host node it produced and, for components, the
//! [`ComponentInstance`] behind it.
//!
//! Children are compared by identity when patching: two `Children::Nodes`
//! are the same only if they share one `Rc` allocation. Building a child
//! list once and handing out clones of the `Rc` is how a render function
//! tells the renderer "nothing below here changed".

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::component::{Component, ComponentInstance};
use super::host::{Event, HostNodeId, Listener};

/// Handler stored in an `on*` prop.
pub type EventHandler = Listener;

/// A single prop value.
#[derive(Clone)]
pub enum PropValue {
    /// Plain data, mapped to attributes or styles.
    Value(Value),
    /// An event handler.
    Handler(EventHandler),
}

impl PropValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Handler(_) => None,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Ordered props of an element or component.
#[derive(Clone, Default, Debug)]
pub struct Props {
    entries: IndexMap<String, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data prop.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .insert(key.into(), PropValue::Value(value.into()));
        self
    }

    /// Add an event handler under `key` (e.g. `"onClick"`).
    pub fn on(mut self, key: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Self {
        self.entries
            .insert(key.into(), PropValue::Handler(Rc::new(handler)));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropValue) -> Option<PropValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    /// The data value of `key`, if it is not a handler.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(PropValue::as_value)
    }

    /// Deserialize the data value of `key`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.value(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a node is.
pub enum VNodeKind {
    Text(String),
    Element { tag: String, props: Props },
    Component {
        def: Rc<dyn Component>,
        props: Rc<Props>,
    },
    Marker,
}

/// Children of an element, or the payload of a marker.
#[derive(Clone, Default)]
pub enum Children {
    #[default]
    Empty,
    Text(String),
    Nodes(Rc<[VNode]>),
}

impl Children {
    /// Identity comparison used by the patcher.
    ///
    /// `Nodes` compare by allocation, `Text` by content.
    pub fn shares(&self, other: &Children) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Nodes(a), Self::Nodes(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Child node at `index`, if these are node children.
    pub fn get(&self, index: usize) -> Option<&VNode> {
        match self {
            Self::Nodes(nodes) => nodes.get(index),
            _ => None,
        }
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Self::Nodes(nodes.into())
    }
}

impl From<Rc<[VNode]>> for Children {
    fn from(nodes: Rc<[VNode]>) -> Self {
        Self::Nodes(nodes)
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Nodes(nodes) => f.debug_list().entries(nodes.iter()).finish(),
        }
    }
}

/// A node of the declarative tree.
pub struct VNode {
    kind: VNodeKind,
    children: Children,
    el: Cell<Option<HostNodeId>>,
    component: RefCell<Option<Rc<ComponentInstance>>>,
}

impl VNode {
    fn new(kind: VNodeKind, children: Children) -> Self {
        Self {
            kind,
            children,
            el: Cell::new(None),
            component: RefCell::new(None),
        }
    }

    pub fn kind(&self) -> &VNodeKind {
        &self.kind
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    /// Host node produced by the last mount, if any.
    pub fn el(&self) -> Option<HostNodeId> {
        self.el.get()
    }

    /// Mounted component instance, for component nodes.
    pub fn component_instance(&self) -> Option<Rc<ComponentInstance>> {
        self.component.borrow().clone()
    }

    /// Element tag, for element nodes.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            VNodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, VNodeKind::Component { .. })
    }

    /// Whether `other` would produce the same kind of host node: equal text,
    /// equal tag, the same component definition, or both markers.
    pub fn same_kind(&self, other: &VNode) -> bool {
        match (&self.kind, &other.kind) {
            (VNodeKind::Text(a), VNodeKind::Text(b)) => a == b,
            (VNodeKind::Element { tag: a, .. }, VNodeKind::Element { tag: b, .. }) => a == b,
            (VNodeKind::Component { def: a, .. }, VNodeKind::Component { def: b, .. }) => {
                same_definition(a, b)
            }
            (VNodeKind::Marker, VNodeKind::Marker) => true,
            _ => false,
        }
    }

    pub(crate) fn set_el(&self, el: Option<HostNodeId>) {
        self.el.set(el);
    }

    pub(crate) fn set_component(&self, instance: Rc<ComponentInstance>) {
        *self.component.borrow_mut() = Some(instance);
    }

    /// Take over the mount state of `old`, which this node replaces unchanged.
    pub(crate) fn adopt(&self, old: &VNode) {
        self.el.set(old.el.get());
        if let Some(instance) = old.component.borrow().clone() {
            *self.component.borrow_mut() = Some(instance);
        }
    }
}

/// Whether two component definitions are the same object.
pub(crate) fn same_definition(a: &Rc<dyn Component>, b: &Rc<dyn Component>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        match &self.kind {
            VNodeKind::Text(text) => s.field("text", text),
            VNodeKind::Element { tag, props } => s.field("tag", tag).field("props", props),
            VNodeKind::Component { def, .. } => s.field("component", &def.name()),
            VNodeKind::Marker => s.field("marker", &true),
        };
        s.field("children", &self.children)
            .field("el", &self.el.get())
            .finish()
    }
}

/// Build an element node.
///
/// ```rust,ignore
/// h("button", Props::new().with("class", "primary").on("onClick", |_| ()), "Save")
/// ```
pub fn h(tag: impl Into<String>, props: Props, children: impl Into<Children>) -> VNode {
    VNode::new(
        VNodeKind::Element {
            tag: tag.into(),
            props,
        },
        children.into(),
    )
}

/// Build a text node.
pub fn text(content: impl Into<String>) -> VNode {
    VNode::new(VNodeKind::Text(content.into()), Children::Empty)
}

/// Build a marker node carrying an opaque payload.
pub fn marker(payload: impl Into<Children>) -> VNode {
    VNode::new(VNodeKind::Marker, payload.into())
}

/// Build a component node.
pub fn component(def: Rc<dyn Component>, props: Props) -> VNode {
    VNode::new(
        VNodeKind::Component {
            def,
            props: Rc::new(props),
        },
        Children::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observed;
    use serde_json::json;

    struct Blank;

    impl Component for Blank {
        fn render(&self, _: &Observed, _: &Props) -> VNode {
            text("")
        }
    }

    #[test]
    fn props_keep_insertion_order() {
        let props = Props::new()
            .with("id", "main")
            .with("count", 3)
            .on("onClick", |_| {});

        let keys: Vec<_> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "count", "onClick"]);
        assert_eq!(props.value("id"), Some(&json!("main")));
        assert_eq!(props.get_as::<i32>("count"), Some(3));
        assert!(props.value("onClick").is_none());
    }

    #[test]
    fn children_identity() {
        let shared: Rc<[VNode]> = vec![text("a")].into();
        let a = Children::from(shared.clone());
        let b = Children::from(shared);
        let c = Children::from(vec![text("a")]);

        assert!(a.shares(&b));
        assert!(!a.shares(&c));
        assert!(Children::from("x").shares(&Children::from(String::from("x"))));
        assert!(Children::Empty.shares(&Children::from(())));
        assert!(!Children::Empty.shares(&Children::from("")));
    }

    #[test]
    fn same_kind_rules() {
        let def: Rc<dyn Component> = Rc::new(Blank);
        let other: Rc<dyn Component> = Rc::new(Blank);

        assert!(text("a").same_kind(&text("a")));
        assert!(!text("a").same_kind(&text("b")));
        assert!(h("p", Props::new(), ()).same_kind(&h("p", Props::new().with("id", "x"), ())));
        assert!(!h("p", Props::new(), ()).same_kind(&h("div", Props::new(), ())));
        assert!(component(def.clone(), Props::new()).same_kind(&component(def.clone(), Props::new())));
        assert!(!component(def, Props::new()).same_kind(&component(other, Props::new())));
        assert!(marker(()).same_kind(&marker("x")));
        assert!(!marker(()).same_kind(&text("")));
    }

    #[test]
    fn builders_fill_kind_and_children() {
        let node = h("ul", Props::new(), vec![h("li", Props::new(), "one")]);
        assert_eq!(node.tag(), Some("ul"));
        assert_eq!(node.children().get(0).and_then(VNode::tag), Some("li"));
        assert!(node.el().is_none());
        assert!(!node.is_component());
    }
}
