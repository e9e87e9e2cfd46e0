//! Static host - mounts a built subtree and wires its dynamic parts.
//!
//! Consumes the builder's side tables exactly once: dynamic child slots
//! get child hosts, reactive attributes get reactions, style values with
//! pseudo/nested/transition/keyframe structure route through the style
//! engine, ref handles fire once the tree reaches a live document, and
//! exit-animated elements defer the removal step until their transition or
//! animation completes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_signals::effect;
use tracing::{debug, error};

use crate::builder::{DetachStyled, RefHandle, SideTables};
use crate::dom::{insert_before, remove_nodes_between, DomError, Event, EventKind, Node};
use crate::host::{
    create_host, Host, HostPathEntry, HostRef, PathContext, Removal, StopHandle, Subscriptions,
};
use crate::style::{self, kebab, StyleEntry, StyleValue};
use crate::value::AttrValue;

pub struct StaticHost {
    node: RefCell<Option<Node>>,
    placeholder: Node,
    ctx: PathContext,
    rendered: Cell<bool>,
    destroyed: Cell<bool>,
    /// First inserted node; with `placeholder` it bounds the removal range.
    start: RefCell<Option<Node>>,
    child_hosts: RefCell<Vec<HostRef>>,
    attr_stops: RefCell<Vec<StopHandle>>,
    ref_handles: RefCell<Vec<RefHandle>>,
    detach_styled: RefCell<Vec<DetachStyled>>,
    attach_stop: RefCell<Option<StopHandle>>,
}

/// Apply a resolved attribute value, routing engine-shaped styles through
/// the style manager.
fn apply_attr(
    el: &Node,
    key: &str,
    value: &AttrValue,
    host_path: &[HostPathEntry],
    element_path: &[usize],
    is_static_style: bool,
) {
    match value {
        AttrValue::Style(style) if style.needs_style_engine() => {
            style::update(host_path, element_path, style, el, is_static_style, Box::new(|| {}));
        }
        AttrValue::Many(values) => {
            for value in values {
                apply_attr(el, key, value, host_path, element_path, is_static_style);
            }
        }
        other => crate::builder::apply_static_attr(el, key, other),
    }
}

/// Property names the final detach step writes, kebab-cased. Pseudo,
/// nested, and at-rule keys are not animatable targets.
fn detach_style_keys(value: &StyleValue) -> Vec<String> {
    value
        .steps()
        .last()
        .map(|step| {
            step.iter()
                .filter(|(key, entry)| {
                    !matches!(entry, StyleEntry::Nested(_)) && !key.starts_with([':', '&', '@'])
                })
                .map(|(key, _)| kebab(key))
                .collect()
        })
        .unwrap_or_default()
}

impl StaticHost {
    pub fn new(node: Node, placeholder: Node, ctx: PathContext) -> Self {
        StaticHost {
            node: RefCell::new(Some(node)),
            placeholder,
            ctx,
            rendered: Cell::new(false),
            destroyed: Cell::new(false),
            start: RefCell::new(None),
            child_hosts: RefCell::new(Vec::new()),
            attr_stops: RefCell::new(Vec::new()),
            ref_handles: RefCell::new(Vec::new()),
            detach_styled: RefCell::new(Vec::new()),
            attach_stop: RefCell::new(None),
        }
    }

    fn wire_attrs(&self, tables: &mut SideTables) {
        for attr in tables.unhandled_attrs.drain(..) {
            let mut element_path = self.ctx.element_path.clone();
            element_path.extend_from_slice(&attr.path);
            let host_path = self.ctx.host_path.clone();

            if attr.value.is_reactive() {
                let el = attr.el.clone();
                let key = attr.key.clone();
                let value = attr.value.clone();
                let stop = effect(move || {
                    let current = value.evaluate();
                    apply_attr(&el, &key, &current, &host_path, &element_path, false);
                });
                self.attr_stops.borrow_mut().push(Box::new(stop));
            } else {
                // Static but engine-shaped style: applied once, shared id.
                apply_attr(&attr.el, &attr.key, &attr.value, &host_path, &element_path, true);
            }
        }
    }

    fn wire_refs(&self, tables: &mut SideTables) {
        let handles: Vec<RefHandle> = tables.ref_handles.drain(..).collect();
        if handles.is_empty() {
            return;
        }
        if self.ctx.root.attached() {
            for handle in &handles {
                (handle.callback)(Some(handle.el.clone()));
            }
        } else {
            let fire: Vec<(Node, crate::value::ElementRefFn)> = handles
                .iter()
                .map(|h| (h.el.clone(), h.callback.clone()))
                .collect();
            let stop = self.ctx.root.once("attach", move || {
                for (el, callback) in &fire {
                    callback(Some(el.clone()));
                }
            });
            *self.attach_stop.borrow_mut() = Some(stop);
        }
        *self.ref_handles.borrow_mut() = handles;
    }

    /// Remove every node from the mounted content through the placeholder.
    fn remove_range(start: &Option<Node>, placeholder: &Node) -> Result<(), DomError> {
        match start {
            Some(start) if start.parent().is_some() => {
                remove_nodes_between(start, placeholder, true)
            }
            _ => {
                placeholder.remove();
                Ok(())
            }
        }
    }

    /// Exit-animation gate: apply final styles, then wait for the paired
    /// run/end events on every element whose transition covers one of the
    /// changed properties or that runs an animation, before removing the
    /// range. Returns `false` when nothing animates and the caller should
    /// remove synchronously.
    fn removal_awaits_exit(&self) -> bool {
        let styled: Vec<DetachStyled> = self.detach_styled.borrow_mut().drain(..).collect();
        if styled.is_empty() {
            return false;
        }

        let mut awaited: Vec<(Node, EventKind, EventKind)> = Vec::new();
        for entry in &styled {
            let mut element_path = self.ctx.element_path.clone();
            element_path.extend_from_slice(&entry.path);
            style::update(
                &self.ctx.host_path,
                &element_path,
                &entry.value,
                &entry.el,
                false,
                Box::new(|| {}),
            );
            // A transition only delays removal when it covers a property
            // the detach style actually changes. Animations are checked
            // independently; an element doing both waits for both pairs.
            let transitions = style::transition_properties(&entry.el);
            let keys = detach_style_keys(&entry.value);
            let transition_applies = transitions.iter().any(|p| p == "all")
                || keys.iter().any(|key| transitions.iter().any(|p| p == key));
            if transition_applies {
                awaited.push((entry.el.clone(), EventKind::TransitionRun, EventKind::TransitionEnd));
            }
            if style::has_animation(&entry.el) {
                awaited.push((entry.el.clone(), EventKind::AnimationRun, EventKind::AnimationEnd));
            }
        }
        if awaited.is_empty() {
            return false;
        }

        let pending = Rc::new(Cell::new(awaited.len() * 2));
        let start = self.start.borrow().clone();
        let placeholder = self.placeholder.clone();
        let finish = Rc::new(move || {
            if let Err(err) = StaticHost::remove_range(&start, &placeholder) {
                error!(%err, "removing exit-animated range failed");
            }
        });
        for (el, run, end) in awaited {
            for kind in [run, end] {
                let pending = pending.clone();
                let finish = finish.clone();
                el.add_once_listener(
                    kind.type_name(),
                    Box::new(move |_: &Event| {
                        pending.set(pending.get() - 1);
                        if pending.get() == 0 {
                            finish();
                        }
                    }),
                );
            }
        }
        true
    }
}

impl Host for StaticHost {
    fn render(&self) -> Result<(), DomError> {
        assert!(!self.rendered.replace(true), "static host rendered twice");

        let node = self.node.borrow_mut().take().expect("unrendered host holds its subtree");
        let mut tables = node.take_side_tables();

        if node.is_fragment() {
            // A fragment splices away; an owned start comment keeps the
            // removal range well formed.
            let start = Node::comment("start");
            insert_before(&start, &self.placeholder)?;
            insert_before(&node, &self.placeholder)?;
            *self.start.borrow_mut() = Some(start);
        } else {
            insert_before(&node, &self.placeholder)?;
            *self.start.borrow_mut() = Some(node);
        }

        for slot in tables.unhandled_children.drain(..) {
            let child_ctx = self.ctx.at(&slot.path);
            let child = create_host(slot.value, slot.placeholder, child_ctx)?;
            child.render()?;
            self.child_hosts.borrow_mut().push(child);
        }

        self.wire_attrs(&mut tables);
        self.wire_refs(&mut tables);
        *self.detach_styled.borrow_mut() = tables.detach_styled.drain(..).collect();
        Ok(())
    }

    fn destroy(&self, removal: Removal, subscriptions: Subscriptions) -> Result<(), DomError> {
        if self.destroyed.replace(true) {
            return Ok(());
        }
        debug!("destroying static host");

        if subscriptions == Subscriptions::Owns {
            for stop in self.attr_stops.borrow_mut().drain(..) {
                stop();
            }
        }
        for child in self.child_hosts.borrow_mut().drain(..) {
            child.destroy(Removal::Delegated, subscriptions)?;
        }
        if let Some(stop) = self.attach_stop.borrow_mut().take() {
            stop();
        }
        for handle in self.ref_handles.borrow_mut().drain(..) {
            (handle.callback)(None);
        }

        if removal == Removal::Owns && !self.removal_awaits_exit() {
            StaticHost::remove_range(&self.start.borrow(), &self.placeholder)?;
        }
        Ok(())
    }

    fn element(&self) -> Node {
        self.start
            .borrow()
            .clone()
            .or_else(|| self.node.borrow().clone())
            .unwrap_or_else(|| self.placeholder.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::create_element;
    use crate::root::Root;
    use crate::style::StyleObject;
    use crate::value::{attr_rx, AttrValue, Props, RenderValue};
    use spark_signals::signal;

    fn mounted(node: Node) -> (Node, Root, StaticHost) {
        let container = Node::element("div");
        let root = Root::new(container.clone());
        let placeholder = Node::comment("slot");
        container.append_child(&placeholder).unwrap();
        let host = StaticHost::new(node, placeholder, PathContext::new(root.clone()));
        (container, root, host)
    }

    #[test]
    fn test_mounts_subtree_before_placeholder() {
        let el = create_element("p", Props::new(), vec!["hi".into()]);
        let (container, _, host) = mounted(el);
        host.render().unwrap();
        assert_eq!(container.serialize(), "<div><p>hi</p><!--slot--></div>");
    }

    #[test]
    #[should_panic(expected = "static host rendered twice")]
    fn test_second_render_panics() {
        let el = create_element("p", Props::new(), vec![]);
        let (_, _, host) = mounted(el);
        host.render().unwrap();
        host.render().unwrap();
    }

    #[test]
    fn test_reactive_attribute_tracks_dependency() {
        let class = signal("a".to_string());
        let class_clone = class.clone();
        let el = create_element(
            "p",
            Props::new().with("class", attr_rx(move || AttrValue::Str(class_clone.get()))),
            vec![],
        );
        let (_, _, host) = mounted(el.clone());
        host.render().unwrap();
        assert_eq!(el.get_attribute("class").as_deref(), Some("a"));

        class.set("b".to_string());
        assert_eq!(el.get_attribute("class").as_deref(), Some("b"));

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        class.set("c".to_string());
        assert_eq!(el.get_attribute("class").as_deref(), Some("b"), "stopped after destroy");
    }

    #[test]
    fn test_dynamic_child_slot_renders() {
        let count = signal(1i64);
        let el = create_element("p", Props::new(), vec![RenderValue::from(count.clone())]);
        let (container, _, host) = mounted(el);
        host.render().unwrap();
        assert_eq!(container.text_content(), "1");

        count.set(2);
        assert_eq!(container.text_content(), "2");
    }

    #[test]
    fn test_fragment_content_removal() {
        let frag = crate::builder::fragment(vec!["a".into(), "b".into()]);
        let (container, _, host) = mounted(frag);
        host.render().unwrap();
        assert_eq!(container.text_content(), "ab");

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div></div>");
    }

    #[test]
    fn test_ref_fires_on_attach_and_detach() {
        use std::cell::RefCell;
        let states: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));
        let states_clone = states.clone();
        let el = create_element(
            "p",
            Props::new().with(
                "ref",
                crate::value::element_ref(move |node| states_clone.borrow_mut().push(node.is_some())),
            ),
            vec![],
        );
        let (_, root, host) = mounted(el);
        host.render().unwrap();
        assert!(states.borrow().is_empty(), "deferred until the root attaches");

        root.attach();
        assert_eq!(*states.borrow(), vec![true]);

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(*states.borrow(), vec![true, false]);
    }

    #[test]
    fn test_exit_animated_removal_waits_for_events() {
        crate::style::reset_style_state();
        let el = create_element(
            "p",
            Props::new().with(
                "detachStyle",
                StyleObject::new().with("opacity", 0.0).with("transition", "opacity 0.3s"),
            ),
            vec!["bye".into()],
        );
        let (container, _, host) = mounted(el.clone());
        host.render().unwrap();
        assert_eq!(container.text_content(), "bye");

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.text_content(), "bye", "removal deferred for the exit animation");

        el.dispatch_event(&Event::new(EventKind::TransitionRun));
        assert_eq!(container.text_content(), "bye");
        el.dispatch_event(&Event::new(EventKind::TransitionEnd));
        assert_eq!(container.serialize(), "<div></div>");

        // A second destroy racing the exit animation already happened above
        // implicitly; an explicit one is a no-op.
        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div></div>");
    }

    #[test]
    fn test_unrelated_transition_does_not_defer_removal() {
        crate::style::reset_style_state();
        let el = create_element(
            "p",
            Props::new()
                .with("style", "transition:width 1s")
                .with("detachStyle", StyleObject::new().with("opacity", 0.0)),
            vec!["x".into()],
        );
        let (container, _, host) = mounted(el);
        host.render().unwrap();

        // The transition covers width only; changing opacity fires no
        // transition events, so waiting would leak the subtree.
        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div></div>");
    }

    #[test]
    fn test_transition_all_defers_removal() {
        crate::style::reset_style_state();
        let el = create_element(
            "p",
            Props::new()
                .with("style", "transition:all 1s")
                .with("detachStyle", StyleObject::new().with("opacity", 0.0)),
            vec!["y".into()],
        );
        let (container, _, host) = mounted(el.clone());
        host.render().unwrap();

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.text_content(), "y");

        el.dispatch_event(&Event::new(EventKind::TransitionRun));
        el.dispatch_event(&Event::new(EventKind::TransitionEnd));
        assert_eq!(container.serialize(), "<div></div>");
    }

    #[test]
    fn test_transitioning_and_animating_element_waits_for_both_pairs() {
        crate::style::reset_style_state();
        let el = create_element(
            "p",
            Props::new()
                .with("style", "animation:spin 1s")
                .with(
                    "detachStyle",
                    StyleObject::new().with("opacity", 0.0).with("transition", "opacity 0.3s"),
                ),
            vec!["z".into()],
        );
        let (container, _, host) = mounted(el.clone());
        host.render().unwrap();

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        el.dispatch_event(&Event::new(EventKind::TransitionRun));
        el.dispatch_event(&Event::new(EventKind::TransitionEnd));
        assert_eq!(container.text_content(), "z", "animation pair still pending");

        el.dispatch_event(&Event::new(EventKind::AnimationRun));
        el.dispatch_event(&Event::new(EventKind::AnimationEnd));
        assert_eq!(container.serialize(), "<div></div>");
    }

    #[test]
    fn test_detach_style_without_animation_removes_synchronously() {
        crate::style::reset_style_state();
        let el = create_element(
            "p",
            Props::new().with("detachStyle", StyleObject::new().with("opacity", 0.0)),
            vec!["x".into()],
        );
        let (container, _, host) = mounted(el);
        host.render().unwrap();
        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div></div>");
    }
}
