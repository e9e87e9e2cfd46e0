//! Element builder - static DOM construction with side tables.
//!
//! Builds a concrete subtree immediately and records everything it could
//! not resolve statically into side tables on the subtree's root node:
//! dynamic child slots (placeholder comment + raw value), reactive or
//! engine-routed attributes, ref handles, and exit-animated style
//! declarations. The Static Host consumes the tables once when it mounts
//! the subtree.
//!
//! Paths are child-index vectors relative to the built root. Nesting a
//! pre-built element merges its tables upward with the child's index
//! prefixed, so positions stay stable across composition.

use tracing::debug;

use crate::dom::Node;
use crate::style::{inline_declarations, StyleValue};
use crate::value::{AttrValue, ElementRefFn, Props, RenderValue};

/// A child slot whose value could not be mounted statically.
pub struct UnhandledChild {
    /// Anchor comment already inserted at the slot's position.
    pub placeholder: Node,
    pub value: RenderValue,
    pub path: Vec<usize>,
}

/// An attribute requiring a reaction or the style engine.
pub struct UnhandledAttr {
    pub el: Node,
    pub key: String,
    pub value: AttrValue,
    pub path: Vec<usize>,
}

/// A declared `ref` handle, fired on attach and detach.
pub struct RefHandle {
    pub el: Node,
    pub callback: ElementRefFn,
}

/// An element whose removal must wait for its exit animation.
pub struct DetachStyled {
    pub el: Node,
    pub value: StyleValue,
    pub path: Vec<usize>,
}

/// Everything the builder defers to the mounting host.
#[derive(Default)]
pub struct SideTables {
    pub unhandled_children: Vec<UnhandledChild>,
    pub unhandled_attrs: Vec<UnhandledAttr>,
    pub ref_handles: Vec<RefHandle>,
    pub detach_styled: Vec<DetachStyled>,
}

impl SideTables {
    pub fn is_empty(&self) -> bool {
        self.unhandled_children.is_empty()
            && self.unhandled_attrs.is_empty()
            && self.ref_handles.is_empty()
            && self.detach_styled.is_empty()
    }

    fn merge_from(&mut self, mut other: SideTables, prefix: usize) {
        for entry in other.unhandled_children.iter_mut() {
            entry.path.insert(0, prefix);
        }
        for entry in other.unhandled_attrs.iter_mut() {
            entry.path.insert(0, prefix);
        }
        for entry in other.detach_styled.iter_mut() {
            entry.path.insert(0, prefix);
        }
        self.unhandled_children.extend(other.unhandled_children);
        self.unhandled_attrs.extend(other.unhandled_attrs);
        self.ref_handles.extend(other.ref_handles);
        self.detach_styled.extend(other.detach_styled);
    }
}

/// Whether a value may be assigned as a plain static attribute.
///
/// Reactive values (including any inside a `Many`) need a reaction; style
/// values with pseudo-class/nested/transition/keyframe structure need the
/// style engine. Both are deferred.
pub fn is_valid_attribute(value: &AttrValue) -> bool {
    match value {
        AttrValue::Reactive(_) => false,
        AttrValue::Style(style) => !style.needs_style_engine(),
        AttrValue::Many(values) => values.iter().all(is_valid_attribute),
        _ => true,
    }
}

pub(crate) fn apply_static_attr(el: &Node, key: &str, value: &AttrValue) {
    match value {
        AttrValue::Absent | AttrValue::Bool(false) => el.remove_attribute(key),
        AttrValue::Style(style) => {
            // Plain single-step style only; engine shapes were deferred.
            let steps = style.steps();
            if let Some(step) = steps.first() {
                el.set_attribute("style", &inline_declarations(step));
            }
        }
        AttrValue::Many(values) => {
            for value in values {
                apply_static_attr(el, key, value);
            }
        }
        other => {
            if let Some(text) = other.as_text() {
                el.set_attribute(key, &text);
            }
        }
    }
}

fn install_handlers(el: &Node, event_type: &str, value: &AttrValue) {
    match value {
        AttrValue::Handler(listener) => el.add_listener(event_type, listener.clone()),
        AttrValue::Many(values) => {
            for value in values {
                install_handlers(el, event_type, value);
            }
        }
        other => debug!(
            attr = %event_type,
            shape = other.shape(),
            "ignoring non-handler value on an event prop"
        ),
    }
}

fn apply_props(el: &Node, props: &Props, tables: &mut SideTables) {
    for (key, value) in props.iter() {
        if key == "ref" {
            if let AttrValue::ElementRef(callback) = value {
                tables.ref_handles.push(RefHandle {
                    el: el.clone(),
                    callback: callback.clone(),
                });
            }
            continue;
        }
        if key == "detachStyle" {
            if let AttrValue::Style(style) = value {
                tables.detach_styled.push(DetachStyled {
                    el: el.clone(),
                    value: style.clone(),
                    path: Vec::new(),
                });
            }
            continue;
        }
        if let Some(event) = key.strip_prefix("on") {
            if !event.is_empty() {
                install_handlers(el, &event.to_ascii_lowercase(), value);
                continue;
            }
        }
        if is_valid_attribute(value) {
            apply_static_attr(el, key, value);
        } else {
            tables.unhandled_attrs.push(UnhandledAttr {
                el: el.clone(),
                key: key.to_string(),
                value: value.clone(),
                path: Vec::new(),
            });
        }
    }
}

fn flatten_children(children: Vec<RenderValue>) -> Vec<RenderValue> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child {
            RenderValue::Many(nested) => flat.extend(flatten_children(nested)),
            other => flat.push(other),
        }
    }
    flat
}

fn append_children(parent: &Node, children: Vec<RenderValue>, tables: &mut SideTables) {
    for (index, child) in flatten_children(children).into_iter().enumerate() {
        match child {
            RenderValue::Empty => {}
            RenderValue::Text(text) => {
                let node = Node::text(&text);
                parent.append_child(&node).expect("parent holds children");
            }
            RenderValue::Element(node) => {
                parent.append_child(&node).expect("parent holds children");
                let nested = node.take_side_tables();
                if !nested.is_empty() {
                    tables.merge_from(nested, index);
                }
            }
            dynamic => {
                let placeholder = Node::comment(&format!("slot {}", dynamic.shape()));
                parent
                    .append_child(&placeholder)
                    .expect("parent holds children");
                tables.unhandled_children.push(UnhandledChild {
                    placeholder,
                    value: dynamic,
                    path: vec![index],
                });
            }
        }
    }
}

/// Build an element subtree, deferring what cannot be resolved statically.
pub fn create_element(tag: &str, props: Props, children: Vec<RenderValue>) -> Node {
    let el = Node::element(tag);
    let mut tables = SideTables::default();
    apply_props(&el, &props, &mut tables);
    append_children(&el, children, &mut tables);
    el.with_side_tables(|t| *t = tables);
    el
}

/// Build an SVG-namespaced element subtree.
pub fn create_svg_element(tag: &str, props: Props, children: Vec<RenderValue>) -> Node {
    let el = Node::svg_element(tag);
    let mut tables = SideTables::default();
    apply_props(&el, &props, &mut tables);
    append_children(&el, children, &mut tables);
    el.with_side_tables(|t| *t = tables);
    el
}

/// Build a fragment subtree; side tables land on the fragment node.
pub fn fragment(children: Vec<RenderValue>) -> Node {
    let frag = Node::fragment();
    let mut tables = SideTables::default();
    append_children(&frag, children, &mut tables);
    frag.with_side_tables(|t| *t = tables);
    frag
}
