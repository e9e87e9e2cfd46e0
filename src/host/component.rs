//! Component host - single invocation, captured lifecycle.
//!
//! Invokes a component function exactly once under a render context that
//! collects everything created during the call: reactive subscriptions
//! (`watch`), post-mount effects, layout effects (deferred until the root
//! attaches), named refs, and provided context data. Destroy drains all of
//! it atomically.
//!
//! Slot configuration: an ancestor passes a `Config` as the component's
//! first child. The context's element/component builders intercept the
//! `as` naming marker, merge or replace the slot's props, install
//! forwarded-event listeners, and record the slot into the ref map.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use spark_signals::effect;
use tracing::debug;

use crate::builder::create_element;
use crate::dom::{DomError, Event, Node};
use crate::host::{
    create_host, Host, HostRef, PathContext, Removal, StopHandle, Subscriptions,
};
use crate::value::{
    AttrValue, ComponentFn, ComponentNode, Config, Props, RenderValue,
};

/// A named reference captured by a component: a plain element or a child
/// component's host.
#[derive(Clone)]
pub enum RefSlot {
    Element(Node),
    Host(HostRef),
}

impl RefSlot {
    /// The underlying element either way.
    pub fn element(&self) -> Node {
        match self {
            RefSlot::Element(el) => el.clone(),
            RefSlot::Host(host) => host.element(),
        }
    }
}

pub type RefMap = Rc<RefCell<HashMap<String, RefSlot>>>;

/// A `ref` prop must be a host/element callback, or an array of them.
fn is_ref_callback(value: &AttrValue) -> bool {
    match value {
        AttrValue::HostRef(_) | AttrValue::ElementRef(_) => true,
        AttrValue::Many(values) => values.iter().all(is_ref_callback),
        _ => false,
    }
}

type EffectFn = Box<dyn FnOnce() -> Option<Box<dyn FnOnce()>>>;

pub struct ComponentHost {
    name: String,
    render_fn: ComponentFn,
    props: RefCell<Props>,
    children: RefCell<Vec<RenderValue>>,
    config: RefCell<Option<Config>>,
    placeholder: Node,
    ctx: PathContext,
    rendered: Cell<bool>,
    destroyed: Cell<bool>,
    inner: RefCell<Option<HostRef>>,
    ref_prop: RefCell<Option<AttrValue>>,
    watch_stops: RefCell<Vec<StopHandle>>,
    cleanups: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
    refs: RefMap,
    attach_stop: RefCell<Option<StopHandle>>,
    self_weak: RefCell<Weak<ComponentHost>>,
}

impl ComponentHost {
    /// Construct from a component descriptor. A `Config` first child is
    /// this host's slot configuration, not a rendered child.
    pub fn create(node: ComponentNode, placeholder: Node, ctx: PathContext) -> Rc<ComponentHost> {
        let mut children = node.children;
        let config = match children.first() {
            Some(RenderValue::Config(_)) => match children.remove(0) {
                RenderValue::Config(config) => Some(config),
                _ => unreachable!(),
            },
            _ => None,
        };
        let mut props = node.props;
        let ref_prop = props.remove("ref");
        if let Some(value) = &ref_prop {
            assert!(is_ref_callback(value), "component ref prop must be a function");
        }

        let host = Rc::new(ComponentHost {
            name: node.name,
            render_fn: node.render,
            props: RefCell::new(props),
            children: RefCell::new(children),
            config: RefCell::new(config),
            placeholder,
            ctx,
            rendered: Cell::new(false),
            destroyed: Cell::new(false),
            inner: RefCell::new(None),
            ref_prop: RefCell::new(ref_prop),
            watch_stops: RefCell::new(Vec::new()),
            cleanups: Rc::new(RefCell::new(Vec::new())),
            refs: Rc::new(RefCell::new(HashMap::new())),
            attach_stop: RefCell::new(None),
            self_weak: RefCell::new(Weak::new()),
        });
        *host.self_weak.borrow_mut() = Rc::downgrade(&host);
        host
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared named-ref map, populated while the component body builds.
    pub fn refs(&self) -> RefMap {
        self.refs.clone()
    }

    fn as_host_ref(&self) -> Option<HostRef> {
        self.self_weak
            .borrow()
            .upgrade()
            .map(|host| host as HostRef)
    }

    fn fire_ref(&self, value: &AttrValue, attached: bool) {
        match value {
            AttrValue::HostRef(callback) => {
                callback(if attached { self.as_host_ref() } else { None })
            }
            AttrValue::ElementRef(callback) => {
                callback(if attached { Some(self.element()) } else { None })
            }
            AttrValue::Many(values) => {
                for value in values {
                    self.fire_ref(value, attached);
                }
            }
            _ => {}
        }
    }
}

impl Host for ComponentHost {
    fn render(&self) -> Result<(), DomError> {
        assert!(
            !self.rendered.replace(true),
            "component host rendered twice"
        );
        debug!(component = %self.name, "rendering component");

        let base_ctx = self.ctx.descend(Some(self.name.clone()));
        let mut render_ctx = RenderContext {
            config: self.config.borrow().clone(),
            provided: HashMap::new(),
            base_data: base_ctx.data.clone(),
            refs: self.refs.clone(),
            watch_stops: Vec::new(),
            effects: Vec::new(),
            layout_effects: Vec::new(),
            children: self.children.borrow_mut().drain(..).collect(),
        };

        let props = self.props.borrow().clone();
        let value = (self.render_fn)(props, &mut render_ctx);

        let mut child_ctx = base_ctx;
        if !render_ctx.provided.is_empty() {
            let mut data: HashMap<String, Rc<dyn Any>> = (*child_ctx.data).clone();
            data.extend(render_ctx.provided.drain());
            child_ctx.data = Rc::new(data);
        }
        *self.watch_stops.borrow_mut() = render_ctx.watch_stops;

        let inner = create_host(value, self.placeholder.clone(), child_ctx)?;
        inner.render()?;
        *self.inner.borrow_mut() = Some(inner);

        // DOM is in place: caller's ref first, then post-mount effects.
        let ref_prop = self.ref_prop.borrow().clone();
        if let Some(ref_prop) = &ref_prop {
            self.fire_ref(ref_prop, true);
        }
        for f in render_ctx.effects {
            if let Some(cleanup) = f() {
                self.cleanups.borrow_mut().push(cleanup);
            }
        }

        if !render_ctx.layout_effects.is_empty() {
            let cleanups = self.cleanups.clone();
            let run = move |effects: Vec<EffectFn>| {
                for f in effects {
                    if let Some(cleanup) = f() {
                        cleanups.borrow_mut().push(cleanup);
                    }
                }
            };
            if self.ctx.root.attached() {
                run(render_ctx.layout_effects);
            } else {
                let effects = RefCell::new(Some(render_ctx.layout_effects));
                let stop = self.ctx.root.once("attach", move || {
                    if let Some(effects) = effects.borrow_mut().take() {
                        run(effects);
                    }
                });
                *self.attach_stop.borrow_mut() = Some(stop);
            }
        }
        Ok(())
    }

    fn destroy(&self, removal: Removal, subscriptions: Subscriptions) -> Result<(), DomError> {
        if self.destroyed.replace(true) {
            return Ok(());
        }
        debug!(component = %self.name, "destroying component");

        if subscriptions == Subscriptions::Owns {
            for stop in self.watch_stops.borrow_mut().drain(..) {
                stop();
            }
        }
        if let Some(inner) = self.inner.borrow_mut().take() {
            inner.destroy(removal, Subscriptions::Owns)?;
        }
        for cleanup in self.cleanups.borrow_mut().drain(..) {
            cleanup();
        }
        if let Some(stop) = self.attach_stop.borrow_mut().take() {
            stop();
        }
        if removal == Removal::Owns {
            self.placeholder.remove();
        }
        if let Some(ref_prop) = self.ref_prop.borrow_mut().take() {
            self.fire_ref(&ref_prop, false);
        }
        self.refs.borrow_mut().clear();
        Ok(())
    }

    fn element(&self) -> Node {
        match self.inner.borrow().as_ref() {
            Some(inner) => inner.element(),
            None => self.placeholder.clone(),
        }
    }
}

/// What a component body sees during its single invocation.
pub struct RenderContext {
    config: Option<Config>,
    provided: HashMap<String, Rc<dyn Any>>,
    base_data: Rc<HashMap<String, Rc<dyn Any>>>,
    refs: RefMap,
    watch_stops: Vec<StopHandle>,
    effects: Vec<EffectFn>,
    layout_effects: Vec<EffectFn>,
    children: Vec<RenderValue>,
}

impl RenderContext {
    /// Build a child element, honoring the `as` naming marker and any slot
    /// configuration targeting that name.
    pub fn element(&mut self, tag: &str, mut props: Props, mut children: Vec<RenderValue>) -> Node {
        let name = match props.remove("as") {
            Some(AttrValue::Str(name)) => Some(name),
            _ => None,
        };
        let item = name
            .as_ref()
            .and_then(|n| self.config.as_ref().and_then(|c| c.get(n)))
            .cloned();
        if let Some(item) = &item {
            if let Some(extra) = &item.props {
                props = props.merged_with(extra);
            }
            if let Some(f) = &item.props_fn {
                props = f(props);
            }
            if let Some(replacement) = &item.children {
                children = replacement.clone();
            }
        }

        let el = create_element(tag, props, children);
        if let Some(name) = name {
            if let Some(item) = &item {
                for (event_type, target) in &item.forward_to {
                    let target = target.clone();
                    el.add_listener(
                        event_type,
                        Rc::new(move |event: &Event| {
                            target.dispatch_event(&event.clone_for_redispatch());
                        }),
                    );
                }
            }
            self.refs.borrow_mut().insert(name, RefSlot::Element(el.clone()));
        }
        el
    }

    /// Describe a child component, honoring the `as` marker. Component
    /// slots only accept function-valued props overrides; a named
    /// component also gets a synthetic ref so the ref map captures its
    /// host.
    pub fn component(&mut self, mut node: ComponentNode) -> RenderValue {
        let name = match node.props.remove("as") {
            Some(AttrValue::Str(name)) => Some(name),
            _ => None,
        };
        let Some(name) = name else {
            return RenderValue::Component(node);
        };

        let item = self
            .config
            .as_ref()
            .and_then(|c| c.get(&name))
            .cloned();
        if let Some(item) = &item {
            assert!(
                item.props.is_none(),
                "config for component slot `{name}` requires a function-valued props override"
            );
            if let Some(f) = &item.props_fn {
                node.props = f(node.props);
            }
            if let Some(replacement) = &item.children {
                node.children = replacement.clone();
            }
        }

        let refs = self.refs.clone();
        let forward = item.map(|i| i.forward_to).unwrap_or_default();
        let slot = name.clone();
        let synthetic = AttrValue::HostRef(Rc::new(move |host: Option<HostRef>| match host {
            Some(host) => {
                for (event_type, target) in &forward {
                    let target = target.clone();
                    host.element().add_listener(
                        event_type,
                        Rc::new(move |event: &Event| {
                            target.dispatch_event(&event.clone_for_redispatch());
                        }),
                    );
                }
                refs.borrow_mut().insert(slot.clone(), RefSlot::Host(host));
            }
            None => {
                refs.borrow_mut().remove(&slot);
            }
        }));
        match node.props.remove("ref") {
            Some(existing) => {
                node.props
                    .insert("ref", AttrValue::Many(vec![existing, synthetic]));
            }
            None => node.props.insert("ref", synthetic),
        }
        RenderValue::Component(node)
    }

    /// Children passed by the caller (minus any `Config`).
    pub fn take_children(&mut self) -> Vec<RenderValue> {
        std::mem::take(&mut self.children)
    }

    /// Run `f` under a reaction owned by this component; stopped at destroy.
    pub fn watch(&mut self, f: impl Fn() + 'static) {
        let stop = effect(f);
        self.watch_stops.push(Box::new(stop));
    }

    /// Register a post-mount effect; a returned closure runs at destroy.
    pub fn use_effect(&mut self, f: impl FnOnce() -> Option<Box<dyn FnOnce()>> + 'static) {
        self.effects.push(Box::new(f));
    }

    /// Register a layout effect, fired when the owning root is attached to
    /// a live document (immediately if it already is).
    pub fn use_layout_effect(&mut self, f: impl FnOnce() -> Option<Box<dyn FnOnce()>> + 'static) {
        self.layout_effects.push(Box::new(f));
    }

    /// Publish data to descendant components.
    pub fn provide(&mut self, key: &str, value: Rc<dyn Any>) {
        self.provided.insert(key.to_string(), value);
    }

    /// Read data published by an ancestor (or by this component).
    pub fn get_context(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.provided
            .get(key)
            .cloned()
            .or_else(|| self.base_data.get(key).cloned())
    }

    /// Shared named-ref map.
    pub fn refs(&self) -> RefMap {
        self.refs.clone()
    }
}
