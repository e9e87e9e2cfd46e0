//! Atom host - one reactive scalar bound to a text node.
//!
//! The cheapest dynamic binding: no subtree structure. The first reaction
//! run replaces the placeholder with a text node; every later run mutates
//! that node's text in place.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_signals::effect;
use tracing::error;

use crate::dom::{DomError, Node};
use crate::host::{Host, Removal, StopHandle, Subscriptions};
use crate::value::ScalarValue;

pub struct AtomHost {
    getter: Rc<dyn Fn() -> ScalarValue>,
    placeholder: Node,
    text_node: Rc<RefCell<Option<Node>>>,
    stop: RefCell<Option<StopHandle>>,
    destroyed: Cell<bool>,
}

impl AtomHost {
    pub fn new(getter: Rc<dyn Fn() -> ScalarValue>, placeholder: Node) -> Self {
        AtomHost {
            getter,
            placeholder,
            text_node: Rc::new(RefCell::new(None)),
            stop: RefCell::new(None),
            destroyed: Cell::new(false),
        }
    }
}

impl Host for AtomHost {
    fn render(&self) -> Result<(), DomError> {
        let getter = self.getter.clone();
        let placeholder = self.placeholder.clone();
        let text_node = self.text_node.clone();

        let stop = effect(move || {
            let text = getter().to_text();
            let mut slot = text_node.borrow_mut();
            match slot.as_ref() {
                Some(node) => node.set_node_value(&text),
                None => {
                    let node = Node::text(&text);
                    match placeholder.replace_with(&node) {
                        Ok(()) => *slot = Some(node),
                        Err(err) => error!(%err, "atom binding lost its anchor"),
                    }
                }
            }
        });
        *self.stop.borrow_mut() = Some(Box::new(stop));
        Ok(())
    }

    fn destroy(&self, removal: Removal, subscriptions: Subscriptions) -> Result<(), DomError> {
        if self.destroyed.replace(true) {
            return Ok(());
        }
        if subscriptions == Subscriptions::Owns {
            if let Some(stop) = self.stop.borrow_mut().take() {
                stop();
            }
        }
        if removal == Removal::Owns {
            if let Some(node) = self.text_node.borrow_mut().take() {
                node.remove();
            }
            self.placeholder.remove();
        }
        Ok(())
    }

    fn element(&self) -> Node {
        self.text_node
            .borrow()
            .clone()
            .unwrap_or_else(|| self.placeholder.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark_signals::signal;

    fn mounted_host(getter: Rc<dyn Fn() -> ScalarValue>) -> (Node, AtomHost) {
        let container = Node::element("div");
        let placeholder = Node::comment("slot");
        container.append_child(&placeholder).unwrap();
        (container, AtomHost::new(getter, placeholder))
    }

    #[test]
    fn test_first_write_replaces_placeholder() {
        let (container, host) = mounted_host(Rc::new(|| ScalarValue::Str("hi".to_string())));
        host.render().unwrap();
        assert_eq!(container.serialize(), "<div>hi</div>");
        assert!(host.element().is_text());
    }

    #[test]
    fn test_undefined_and_null_literals() {
        let value = signal(ScalarValue::Undefined);
        let value_clone = value.clone();
        let (container, host) = mounted_host(Rc::new(move || value_clone.get()));
        host.render().unwrap();
        assert_eq!(container.text_content(), "undefined");

        value.set(ScalarValue::Null);
        assert_eq!(container.text_content(), "null");
    }

    #[test]
    fn test_updates_mutate_in_place() {
        let value = signal(1i64);
        let value_clone = value.clone();
        let (container, host) = mounted_host(Rc::new(move || ScalarValue::Int(value_clone.get())));
        host.render().unwrap();
        let first = host.element();
        assert_eq!(container.text_content(), "1");

        value.set(2);
        assert_eq!(container.text_content(), "2");
        assert_eq!(host.element(), first, "text node identity is stable");
    }

    #[test]
    fn test_destroy_stops_reaction_and_removes_nodes() {
        let value = signal(1i64);
        let value_clone = value.clone();
        let (container, host) = mounted_host(Rc::new(move || ScalarValue::Int(value_clone.get())));
        host.render().unwrap();

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div></div>");

        value.set(9);
        assert_eq!(container.serialize(), "<div></div>", "stopped reaction must not write");
    }
}
