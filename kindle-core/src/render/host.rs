//! Host Tree
//!
//! An in-memory retained node tree with DOM-like semantics. The renderer
//! mounts into it; applications and tests inspect it, query it and dispatch
//! events on it.
//!
//! Nodes live in an arena and are addressed by [`HostNodeId`]. Detaching a
//! node keeps it alive; [`HostTree::release`] frees a detached subtree. Slots
//! of released nodes are never reused, so a stale id fails with
//! [`HostError::NodeNotFound`] instead of reaching another node.
//!
//! # Semantics
//!
//! - `append_child` and `replace_child` move a node that already has a
//!   parent, like the DOM does.
//! - Attaching a node under itself or one of its descendants fails with
//!   [`HostError::CycleDetected`].
//! - Events do not bubble; only listeners on the target run.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::HostError;

/// Address of a node in a [`HostTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNodeId(usize);

impl HostNodeId {
    /// Get the raw arena index.
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// A host event as seen by listeners.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name, e.g. `"click"`.
    pub name: String,
    /// The node the event was dispatched on.
    pub target: HostNodeId,
    /// Arbitrary payload supplied by the dispatcher.
    pub detail: Value,
}

/// An event listener attached to a host element.
pub type Listener = Rc<dyn Fn(&Event)>;

struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    listeners: IndexMap<String, SmallVec<[Listener; 1]>>,
}

enum NodeData {
    Element(ElementData),
    Text(String),
    Comment(String),
}

struct HostNode {
    data: NodeData,
    parent: Option<HostNodeId>,
    children: Vec<HostNodeId>,
}

struct Arena {
    nodes: Vec<Option<HostNode>>,
    live: usize,
    root: HostNodeId,
}

impl Arena {
    fn node(&self, id: HostNodeId) -> Result<&HostNode, HostError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(HostError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: HostNodeId) -> Result<&mut HostNode, HostError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(HostError::NodeNotFound(id))
    }

    fn element_mut(&mut self, id: HostNodeId) -> Result<&mut ElementData, HostError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(HostError::NotAnElement(id)),
        }
    }

    fn element(&self, id: HostNodeId) -> Result<&ElementData, HostError> {
        match &self.node(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(HostError::NotAnElement(id)),
        }
    }

    fn push(&mut self, data: NodeData) -> HostNodeId {
        let id = HostNodeId(self.nodes.len());
        self.nodes.push(Some(HostNode {
            data,
            parent: None,
            children: Vec::new(),
        }));
        self.live += 1;
        id
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    fn is_inclusive_ancestor(&self, ancestor: HostNodeId, node: HostNodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.node(id).ok().and_then(|n| n.parent);
        }
        false
    }

    /// Check that `child` may be attached under `parent`.
    fn check_insert(&self, parent: HostNodeId, child: HostNodeId) -> Result<(), HostError> {
        self.element(parent)?;
        self.node(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(HostError::CycleDetected { parent, child });
        }
        Ok(())
    }

    fn detach(&mut self, child: HostNodeId) {
        let Some(parent) = self.node_mut(child).ok().and_then(|n| n.parent.take()) else {
            return;
        };
        if let Ok(parent) = self.node_mut(parent) {
            parent.children.retain(|&c| c != child);
        }
    }

    /// Free `node` and its descendants. Returns how many slots were freed.
    fn free_subtree(&mut self, node: HostNodeId) -> usize {
        let mut pending = vec![node];
        let mut freed = 0;
        while let Some(id) = pending.pop() {
            if let Some(slot) = self.nodes.get_mut(id.0).and_then(Option::take) {
                pending.extend(slot.children);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }
}

/// Handle to a shared host tree. Clones refer to the same tree.
///
/// A new tree contains a single `body` element as its root.
#[derive(Clone)]
pub struct HostTree {
    arena: Rc<RefCell<Arena>>,
}

impl Default for HostTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree {
    pub fn new() -> Self {
        let mut arena = Arena {
            nodes: Vec::new(),
            live: 0,
            root: HostNodeId(0),
        };
        arena.root = arena.push(NodeData::Element(ElementData::new("body")));
        Self {
            arena: Rc::new(RefCell::new(arena)),
        }
    }

    /// The root `body` element.
    pub fn root(&self) -> HostNodeId {
        self.arena.borrow().root
    }

    /// Number of live nodes, attached or not. Released nodes are not counted.
    pub fn node_count(&self) -> usize {
        self.arena.borrow().live
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    pub fn create_element(&self, tag: &str) -> HostNodeId {
        self.arena
            .borrow_mut()
            .push(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_text(&self, text: &str) -> HostNodeId {
        self.arena.borrow_mut().push(NodeData::Text(text.to_owned()))
    }

    pub fn create_comment(&self, text: &str) -> HostNodeId {
        self.arena.borrow_mut().push(NodeData::Comment(text.to_owned()))
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&self, parent: HostNodeId, child: HostNodeId) -> Result<(), HostError> {
        let mut arena = self.arena.borrow_mut();
        arena.check_insert(parent, child)?;
        arena.detach(child);
        arena.node_mut(parent)?.children.push(child);
        arena.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Put `new` where `old` is among `parent`'s children. `old` is detached.
    pub fn replace_child(
        &self,
        parent: HostNodeId,
        new: HostNodeId,
        old: HostNodeId,
    ) -> Result<(), HostError> {
        let mut arena = self.arena.borrow_mut();
        arena.check_insert(parent, new)?;
        if arena.node(old)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child: old });
        }
        if new == old {
            return Ok(());
        }

        arena.detach(new);
        let children = &mut arena.node_mut(parent)?.children;
        let Some(slot) = children.iter().position(|&c| c == old) else {
            return Err(HostError::NotAChild { parent, child: old });
        };
        children[slot] = new;
        arena.node_mut(old)?.parent = None;
        arena.node_mut(new)?.parent = Some(parent);
        Ok(())
    }

    pub fn remove_child(&self, parent: HostNodeId, child: HostNodeId) -> Result<(), HostError> {
        let mut arena = self.arena.borrow_mut();
        if arena.node(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        arena.detach(child);
        Ok(())
    }

    /// Free a detached node together with its descendants.
    ///
    /// Fails with [`HostError::StillAttached`] while `node` has a parent or is
    /// the root. Ids of the freed nodes stop resolving.
    pub fn release(&self, node: HostNodeId) -> Result<usize, HostError> {
        let mut arena = self.arena.borrow_mut();
        if node == arena.root || arena.node(node)?.parent.is_some() {
            return Err(HostError::StillAttached(node));
        }
        Ok(arena.free_subtree(node))
    }

    pub fn parent(&self, node: HostNodeId) -> Option<HostNodeId> {
        self.arena.borrow().node(node).ok()?.parent
    }

    pub fn children(&self, node: HostNodeId) -> Vec<HostNodeId> {
        self.arena
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Whether `node` is reachable from the root.
    pub fn is_attached(&self, node: HostNodeId) -> bool {
        let arena = self.arena.borrow();
        arena.is_inclusive_ancestor(arena.root, node)
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Tag of an element, `None` for text and comments.
    pub fn tag(&self, node: HostNodeId) -> Option<String> {
        self.arena.borrow().element(node).ok().map(|e| e.tag.clone())
    }

    pub fn set_attribute(&self, el: HostNodeId, name: &str, value: &str) -> Result<(), HostError> {
        self.arena
            .borrow_mut()
            .element_mut(el)?
            .attributes
            .insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    pub fn attribute(&self, el: HostNodeId, name: &str) -> Option<String> {
        self.arena
            .borrow()
            .element(el)
            .ok()?
            .attributes
            .get(name)
            .cloned()
    }

    /// Replace all style declarations with those parsed from `text`
    /// (`"color: red; margin: 0"`).
    pub fn set_style_text(&self, el: HostNodeId, text: &str) -> Result<(), HostError> {
        let mut arena = self.arena.borrow_mut();
        let style = &mut arena.element_mut(el)?.style;
        style.clear();
        for declaration in text.split(';') {
            if let Some((name, value)) = declaration.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    style.insert(name.to_owned(), value.trim().to_owned());
                }
            }
        }
        Ok(())
    }

    /// Set the given style declarations, keeping the others.
    pub fn merge_style<I>(&self, el: HostNodeId, declarations: I) -> Result<(), HostError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut arena = self.arena.borrow_mut();
        arena.element_mut(el)?.style.extend(declarations);
        Ok(())
    }

    pub fn style(&self, el: HostNodeId, property: &str) -> Option<String> {
        self.arena
            .borrow()
            .element(el)
            .ok()?
            .style
            .get(property)
            .cloned()
    }

    /// The element's style declarations serialised as `a: b; c: d`.
    pub fn style_text(&self, el: HostNodeId) -> Option<String> {
        let arena = self.arena.borrow();
        let element = arena.element(el).ok()?;
        Some(element.style_text())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn add_event_listener(
        &self,
        el: HostNodeId,
        event: &str,
        listener: Listener,
    ) -> Result<(), HostError> {
        self.arena
            .borrow_mut()
            .element_mut(el)?
            .listeners
            .entry(event.to_owned())
            .or_default()
            .push(listener);
        Ok(())
    }

    pub fn listener_count(&self, el: HostNodeId, event: &str) -> usize {
        self.arena
            .borrow()
            .element(el)
            .ok()
            .and_then(|e| e.listeners.get(event))
            .map_or(0, SmallVec::len)
    }

    /// Call every `event` listener of `target` in registration order.
    ///
    /// Returns how many listeners ran. Listeners may mutate the tree.
    pub fn dispatch_event(
        &self,
        target: HostNodeId,
        event: &str,
        detail: Value,
    ) -> Result<usize, HostError> {
        let listeners: SmallVec<[Listener; 1]> = {
            let arena = self.arena.borrow();
            arena
                .element(target)?
                .listeners
                .get(event)
                .cloned()
                .unwrap_or_default()
        };
        let event = Event {
            name: event.to_owned(),
            target,
            detail,
        };
        for listener in &listeners {
            listener(&event);
        }
        Ok(listeners.len())
    }

    // ------------------------------------------------------------------
    // Queries and serialisation
    // ------------------------------------------------------------------

    /// First attached element matching `selector`, in document order.
    ///
    /// Supports `#id`, `.class` and bare tag names.
    pub fn query_selector(&self, selector: &str) -> Option<HostNodeId> {
        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }
        let arena = self.arena.borrow();
        let mut stack = vec![arena.root];
        while let Some(id) = stack.pop() {
            let node = arena.node(id).ok()?;
            if let NodeData::Element(element) = &node.data {
                if element.matches(selector) {
                    return Some(id);
                }
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Concatenated text of `node` and its descendants. Comments are skipped.
    pub fn text_content(&self, node: HostNodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        collect_text(&arena, node, &mut out);
        out
    }

    /// Serialise `node` and its subtree as HTML.
    pub fn to_html(&self, node: HostNodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        write_html(&arena, node, &mut out);
        out
    }
}

impl fmt::Debug for HostTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root();
        f.debug_struct("HostTree")
            .field("nodes", &self.node_count())
            .field("html", &self.to_html(root))
            .finish()
    }
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            attributes: IndexMap::new(),
            style: IndexMap::new(),
            listeners: IndexMap::new(),
        }
    }

    fn matches(&self, selector: &str) -> bool {
        if let Some(id) = selector.strip_prefix('#') {
            self.attributes.get("id").is_some_and(|v| v == id)
        } else if let Some(class) = selector.strip_prefix('.') {
            self.attributes
                .get("class")
                .is_some_and(|v| v.split_whitespace().any(|c| c == class))
        } else {
            self.tag.eq_ignore_ascii_case(selector)
        }
    }

    fn style_text(&self) -> String {
        self.style
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn collect_text(arena: &Arena, id: HostNodeId, out: &mut String) {
    let Ok(node) = arena.node(id) else { return };
    match &node.data {
        NodeData::Text(text) => out.push_str(text),
        NodeData::Comment(_) => {}
        NodeData::Element(_) => {
            for &child in &node.children {
                collect_text(arena, child, out);
            }
        }
    }
}

fn write_html(arena: &Arena, id: HostNodeId, out: &mut String) {
    let Ok(node) = arena.node(id) else { return };
    match &node.data {
        NodeData::Text(text) => out.push_str(&escape(text)),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push_str(&format!(" {name}=\"{}\"", escape(value)));
            }
            if !element.style.is_empty() {
                out.push_str(&format!(" style=\"{}\"", escape(&element.style_text())));
            }
            out.push('>');
            for &child in &node.children {
                write_html(arena, child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
