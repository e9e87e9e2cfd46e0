//! Retained DOM tree - Rc-shared node handles.
//!
//! Hosts and effect closures co-own nodes, so handles are `Rc`-shared with
//! pointer identity. Parents hold strong references to children; children
//! hold weak back-links, so dropping a detached subtree frees it.
//!
//! Fragments splice: inserting a fragment moves its children into the
//! target parent and leaves the fragment empty.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use thiserror::Error;

use super::event::Event;
use crate::builder::SideTables;

/// Structural errors: a corrupted DOM/host correspondence.
///
/// None of these are recoverable; they signal a bookkeeping bug in the
/// caller or in a host implementation.
#[derive(Debug, Error)]
pub enum DomError {
    #[error("start and end node do not share a parent")]
    ParentMismatch,
    #[error("sibling chain broken before reaching the end node")]
    BrokenSiblingChain,
    #[error("anchor node is not attached to a parent")]
    DetachedAnchor,
    #[error("node of kind `{0}` cannot hold children")]
    NotAContainer(&'static str),
    #[error("value of shape `{0}` cannot be rendered")]
    Unrenderable(&'static str),
}

bitflags! {
    /// Per-element bookkeeping flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ElementFlags: u8 {
        /// Void element: serializes without a closing tag.
        const VOID = 1 << 0;
        /// SVG-namespaced element.
        const SVG  = 1 << 1;
    }
}

/// Event listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

/// One-shot event listener.
pub type OnceListener = Box<dyn FnOnce(&Event)>;

pub(crate) struct ElementData {
    pub tag: String,
    pub attributes: RefCell<BTreeMap<String, String>>,
    pub listeners: RefCell<Vec<(String, Listener)>>,
    pub once_listeners: RefCell<Vec<(String, OnceListener)>>,
    pub flags: Cell<ElementFlags>,
    /// Number of forced reflows observed on this element. The DOM is
    /// headless, so reflow is a counter rather than a layout pass.
    pub reflow_count: Cell<u32>,
}

pub(crate) enum NodeKind {
    Element(ElementData),
    Text(RefCell<String>),
    Comment(RefCell<String>),
    Fragment,
}

impl NodeKind {
    fn name(&self) -> &'static str {
        match self {
            NodeKind::Element(_) => "element",
            NodeKind::Text(_) => "text",
            NodeKind::Comment(_) => "comment",
            NodeKind::Fragment => "fragment",
        }
    }
}

pub(crate) struct NodeData {
    pub id: u64,
    pub kind: NodeKind,
    pub parent: RefCell<Weak<NodeData>>,
    pub children: RefCell<Vec<Node>>,
    /// Side tables recorded by the element builder, consumed once by the
    /// Static Host that mounts this subtree.
    pub side_tables: RefCell<SideTables>,
}

thread_local! {
    static NODE_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_node_id() -> u64 {
    NODE_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    })
}

/// A handle to one DOM node. Cheap to clone; equality is pointer identity.
#[derive(Clone)]
pub struct Node {
    data: Rc<NodeData>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data.kind {
            NodeKind::Element(el) => write!(f, "<{}#{}>", el.tag, self.data.id),
            NodeKind::Text(t) => write!(f, "#text#{}({:?})", self.data.id, t.borrow()),
            NodeKind::Comment(c) => write!(f, "#comment#{}({})", self.data.id, c.borrow()),
            NodeKind::Fragment => write!(f, "#fragment#{}", self.data.id),
        }
    }
}

// Tags that serialize without a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "area", "col", "embed", "source", "track", "wbr"];

impl Node {
    fn from_kind(kind: NodeKind) -> Self {
        Node {
            data: Rc::new(NodeData {
                id: next_node_id(),
                kind,
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                side_tables: RefCell::new(SideTables::default()),
            }),
        }
    }

    /// Create an element node.
    pub fn element(tag: &str) -> Self {
        let mut flags = ElementFlags::empty();
        if VOID_TAGS.contains(&tag) {
            flags |= ElementFlags::VOID;
        }
        Node::from_kind(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            attributes: RefCell::new(BTreeMap::new()),
            listeners: RefCell::new(Vec::new()),
            once_listeners: RefCell::new(Vec::new()),
            flags: Cell::new(flags),
            reflow_count: Cell::new(0),
        }))
    }

    /// Create an SVG-namespaced element node.
    pub fn svg_element(tag: &str) -> Self {
        let node = Node::element(tag);
        if let NodeKind::Element(el) = &node.data.kind {
            el.flags.set(el.flags.get() | ElementFlags::SVG);
        }
        node
    }

    /// Create a text node.
    pub fn text(value: &str) -> Self {
        Node::from_kind(NodeKind::Text(RefCell::new(value.to_string())))
    }

    /// Create a comment node. Comments anchor host positions.
    pub fn comment(label: &str) -> Self {
        Node::from_kind(NodeKind::Comment(RefCell::new(label.to_string())))
    }

    /// Create an empty fragment node.
    pub fn fragment() -> Self {
        Node::from_kind(NodeKind::Fragment)
    }

    /// Unique id of this node, stable for its lifetime.
    pub fn id(&self) -> u64 {
        self.data.id
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data.kind, NodeKind::Text(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.data.kind, NodeKind::Comment(_))
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.data.kind, NodeKind::Fragment)
    }

    /// Element tag name, if this is an element.
    pub fn tag(&self) -> Option<String> {
        match &self.data.kind {
            NodeKind::Element(el) => Some(el.tag.clone()),
            _ => None,
        }
    }

    pub fn is_svg(&self) -> bool {
        match &self.data.kind {
            NodeKind::Element(el) => el.flags.get().contains(ElementFlags::SVG),
            _ => false,
        }
    }

    // =========================================================================
    // Tree structure
    // =========================================================================

    pub fn parent(&self) -> Option<Node> {
        self.data.parent.borrow().upgrade().map(|data| Node { data })
    }

    pub fn children(&self) -> Vec<Node> {
        self.data.children.borrow().clone()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.data.children.borrow().first().cloned()
    }

    /// Next sibling under the shared parent, if any.
    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let children = parent.data.children.borrow();
        let index = children.iter().position(|c| c == self)?;
        children.get(index + 1).cloned()
    }

    fn assert_container(&self) -> Result<(), DomError> {
        match self.data.kind {
            NodeKind::Element(_) | NodeKind::Fragment => Ok(()),
            _ => Err(DomError::NotAContainer(self.data.kind.name())),
        }
    }

    fn adopt(&self, child: &Node, index: usize) {
        child.remove();
        *child.data.parent.borrow_mut() = Rc::downgrade(&self.data);
        self.data.children.borrow_mut().insert(index, child.clone());
    }

    /// Append `child` as the last child. Appending a fragment moves the
    /// fragment's children and leaves the fragment empty.
    pub fn append_child(&self, child: &Node) -> Result<(), DomError> {
        self.assert_container()?;
        if child.is_fragment() {
            let moved: Vec<Node> = child.data.children.borrow_mut().drain(..).collect();
            for node in moved {
                *node.data.parent.borrow_mut() = Weak::new();
                let index = self.data.children.borrow().len();
                self.adopt(&node, index);
            }
            return Ok(());
        }
        let index = self.data.children.borrow().len();
        self.adopt(child, index);
        Ok(())
    }

    /// Detach this node from its parent. No-op when already detached.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            let mut children = parent.data.children.borrow_mut();
            if let Some(index) = children.iter().position(|c| c == self) {
                children.remove(index);
            }
            drop(children);
            *self.data.parent.borrow_mut() = Weak::new();
        }
    }

    /// Remove every child of this node.
    pub fn clear_children(&self) {
        let children: Vec<Node> = self.data.children.borrow_mut().drain(..).collect();
        for child in children {
            *child.data.parent.borrow_mut() = Weak::new();
        }
    }

    /// Replace this node with `new` at the same position. This node keeps
    /// existing handles but is detached from the tree.
    pub fn replace_with(&self, new: &Node) -> Result<(), DomError> {
        let parent = self.parent().ok_or(DomError::DetachedAnchor)?;
        let index = {
            let children = parent.data.children.borrow();
            children
                .iter()
                .position(|c| c == self)
                .ok_or(DomError::BrokenSiblingChain)?
        };
        self.remove();
        parent.adopt(new, index);
        Ok(())
    }

    // =========================================================================
    // Element attributes
    // =========================================================================

    fn element_data(&self) -> Option<&ElementData> {
        match &self.data.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn set_attribute(&self, key: &str, value: &str) {
        if let Some(el) = self.element_data() {
            el.attributes.borrow_mut().insert(key.to_string(), value.to_string());
        }
    }

    pub fn get_attribute(&self, key: &str) -> Option<String> {
        self.element_data()?.attributes.borrow().get(key).cloned()
    }

    pub fn remove_attribute(&self, key: &str) {
        if let Some(el) = self.element_data() {
            el.attributes.borrow_mut().remove(key);
        }
    }

    /// Add a class token to the `class` attribute, keeping existing tokens.
    pub fn add_class(&self, class: &str) {
        let Some(el) = self.element_data() else { return };
        let mut attrs = el.attributes.borrow_mut();
        let entry = attrs.entry("class".to_string()).or_default();
        if !entry.split_whitespace().any(|c| c == class) {
            if !entry.is_empty() {
                entry.push(' ');
            }
            entry.push_str(class);
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .map(|v| v.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    // =========================================================================
    // Text / comment value
    // =========================================================================

    pub fn node_value(&self) -> Option<String> {
        match &self.data.kind {
            NodeKind::Text(v) | NodeKind::Comment(v) => Some(v.borrow().clone()),
            _ => None,
        }
    }

    pub fn set_node_value(&self, value: &str) {
        if let NodeKind::Text(v) | NodeKind::Comment(v) = &self.data.kind {
            *v.borrow_mut() = value.to_string();
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a persistent listener for `event_type`.
    pub fn add_listener(&self, event_type: &str, listener: Listener) {
        if let Some(el) = self.element_data() {
            el.listeners.borrow_mut().push((event_type.to_string(), listener));
        }
    }

    /// Register a listener fired at most once.
    pub fn add_once_listener(&self, event_type: &str, listener: OnceListener) {
        if let Some(el) = self.element_data() {
            el.once_listeners.borrow_mut().push((event_type.to_string(), listener));
        }
    }

    /// Dispatch an event on this element. One-shot listeners fire first and
    /// are consumed; dispatch does not propagate to ancestors.
    pub fn dispatch_event(&self, event: &Event) {
        let Some(el) = self.element_data() else { return };
        let event_type = event.type_name();

        let fired: Vec<OnceListener> = {
            let mut once = el.once_listeners.borrow_mut();
            let mut fired = Vec::new();
            let mut index = 0;
            while index < once.len() {
                if once[index].0 == event_type {
                    fired.push(once.remove(index).1);
                } else {
                    index += 1;
                }
            }
            fired
        };
        for listener in fired {
            listener(event);
        }

        let listeners: Vec<Listener> = el
            .listeners
            .borrow()
            .iter()
            .filter(|(t, _)| t == &event_type)
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    // =========================================================================
    // Reflow observability
    // =========================================================================

    /// Force a reflow. Headless stand-in for reading `offsetHeight`: bumps a
    /// counter so tests can observe that the transition was armed.
    pub fn force_reflow(&self) {
        if let Some(el) = self.element_data() {
            el.reflow_count.set(el.reflow_count.get() + 1);
        }
    }

    pub fn reflow_count(&self) -> u32 {
        self.element_data().map(|el| el.reflow_count.get()).unwrap_or(0)
    }

    // =========================================================================
    // Side tables
    // =========================================================================

    pub(crate) fn take_side_tables(&self) -> SideTables {
        self.data.side_tables.take()
    }

    pub(crate) fn with_side_tables<R>(&self, f: impl FnOnce(&mut SideTables) -> R) -> R {
        f(&mut self.data.side_tables.borrow_mut())
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize this node and its subtree to an HTML-ish string.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.serialize_into(&mut out);
        out
    }

    fn serialize_into(&self, out: &mut String) {
        match &self.data.kind {
            NodeKind::Text(v) => out.push_str(&v.borrow()),
            NodeKind::Comment(v) => {
                out.push_str("<!--");
                out.push_str(&v.borrow());
                out.push_str("-->");
            }
            NodeKind::Fragment => {
                for child in self.data.children.borrow().iter() {
                    child.serialize_into(out);
                }
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (key, value) in el.attributes.borrow().iter() {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(value);
                    out.push('"');
                }
                out.push('>');
                if el.flags.get().contains(ElementFlags::VOID) {
                    return;
                }
                for child in self.data.children.borrow().iter() {
                    child.serialize_into(out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }

    /// Concatenated text content of the subtree, skipping comments.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.data.kind {
            NodeKind::Text(v) => out.push_str(&v.borrow()),
            NodeKind::Comment(_) => {}
            _ => {
                for child in self.data.children.borrow().iter() {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Insert `new` into `anchor`'s parent, directly before `anchor`.
/// Fragments splice their children at that position.
pub fn insert_before(new: &Node, anchor: &Node) -> Result<(), DomError> {
    let parent = anchor.parent().ok_or(DomError::DetachedAnchor)?;
    let index = {
        let children = parent.data.children.borrow();
        children
            .iter()
            .position(|c| c == anchor)
            .ok_or(DomError::BrokenSiblingChain)?
    };
    if new.is_fragment() {
        let moved: Vec<Node> = new.data.children.borrow_mut().drain(..).collect();
        for (offset, node) in moved.into_iter().enumerate() {
            *node.data.parent.borrow_mut() = Weak::new();
            parent.adopt(&node, index + offset);
        }
        return Ok(());
    }
    parent.adopt(new, index);
    Ok(())
}

/// Remove every node from `start` to `end` under their shared parent.
///
/// Errors when the two nodes do not share a parent or the sibling chain
/// never reaches `end` - both signal corrupted host bookkeeping.
pub fn remove_nodes_between(start: &Node, end: &Node, include_end: bool) -> Result<(), DomError> {
    if start == end {
        if include_end {
            end.remove();
        }
        return Ok(());
    }
    let start_parent = start.parent().ok_or(DomError::ParentMismatch)?;
    let end_parent = end.parent().ok_or(DomError::ParentMismatch)?;
    if start_parent != end_parent {
        return Err(DomError::ParentMismatch);
    }

    let mut pointer = start.clone();
    while pointer != *end {
        let next = pointer.next_sibling().ok_or(DomError::BrokenSiblingChain)?;
        pointer.remove();
        pointer = next;
    }
    if include_end {
        end.remove();
    }
    Ok(())
}
