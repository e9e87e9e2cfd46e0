//! Root - top-level mount point and attach/detach event bus.
//!
//! A root owns a container element and the attach lifecycle the hosts
//! subscribe to: refs and layout effects wait for `attach`, teardown
//! listens for `detach`. Rendering appends a root placeholder comment and
//! drives the dispatcher from there.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::dom::{DomError, Node};
use crate::host::{create_host, HostRef, PathContext, Removal, StopHandle, Subscriptions};
use crate::value::RenderValue;

type BusListener = Rc<dyn Fn()>;

struct RootData {
    container: Node,
    attached: Cell<bool>,
    listeners: RefCell<Vec<(String, u64, BusListener)>>,
    next_listener: Cell<u64>,
    host: RefCell<Option<HostRef>>,
}

/// Handle to one mounted tree. Cheap to clone.
#[derive(Clone)]
pub struct Root {
    data: Rc<RootData>,
}

impl Root {
    pub fn new(container: Node) -> Root {
        Root {
            data: Rc::new(RootData {
                container,
                attached: Cell::new(false),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                host: RefCell::new(None),
            }),
        }
    }

    pub fn container(&self) -> Node {
        self.data.container.clone()
    }

    /// Whether the container has reached a live document.
    pub fn attached(&self) -> bool {
        self.data.attached.get()
    }

    /// Subscribe to a lifecycle event. Returns an unsubscribe handle.
    pub fn on(&self, event: &str, listener: impl Fn() + 'static) -> StopHandle {
        let id = self.data.next_listener.get();
        self.data.next_listener.set(id + 1);
        self.data
            .listeners
            .borrow_mut()
            .push((event.to_string(), id, Rc::new(listener)));

        let data = self.data.clone();
        Box::new(move || {
            data.listeners.borrow_mut().retain(|(_, lid, _)| *lid != id);
        })
    }

    /// Subscribe to the next occurrence of a lifecycle event only.
    pub fn once(&self, event: &str, listener: impl FnOnce() + 'static) -> StopHandle {
        let slot = RefCell::new(Some(listener));
        self.on(event, move || {
            if let Some(listener) = slot.borrow_mut().take() {
                listener();
            }
        })
    }

    /// Fire a lifecycle event to every subscriber.
    pub fn dispatch(&self, event: &str) {
        let fired: Vec<BusListener> = self
            .data
            .listeners
            .borrow()
            .iter()
            .filter(|(e, _, _)| e == event)
            .map(|(_, _, l)| l.clone())
            .collect();
        for listener in fired {
            listener();
        }
    }

    /// Mark the container attached to a live document and notify.
    pub fn attach(&self) {
        if !self.data.attached.replace(true) {
            debug!("root attached");
            self.dispatch("attach");
        }
    }

    /// Mark the container detached and notify.
    pub fn detach(&self) {
        if self.data.attached.replace(false) {
            debug!("root detached");
            self.dispatch("detach");
        }
    }

    /// Mount a render value into the container.
    pub fn render(&self, value: impl Into<RenderValue>) -> Result<HostRef, DomError> {
        let placeholder = Node::comment("root");
        self.data.container.append_child(&placeholder)?;

        let host = create_host(value.into(), placeholder, PathContext::new(self.clone()))?;
        host.render()?;
        *self.data.host.borrow_mut() = Some(host.clone());

        if self.attached() {
            self.dispatch("attach");
        }
        Ok(host)
    }

    /// Tear down: notify `detach`, clear the container, destroy the host
    /// with DOM removal delegated. Safe on a never-attached (or already
    /// destroyed) root.
    pub fn destroy(&self) -> Result<(), DomError> {
        self.detach();
        let host = self.data.host.borrow_mut().take();
        self.data.container.clear_children();
        if let Some(host) = host {
            host.destroy(Removal::Delegated, Subscriptions::Owns)?;
        }
        self.data.listeners.borrow_mut().clear();
        Ok(())
    }
}
