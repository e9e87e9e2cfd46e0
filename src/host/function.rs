//! Function host - dynamic structure via wholesale replacement.
//!
//! Re-evaluates a zero-argument producer whenever its reactive
//! dependencies change and replaces the previous subtree entirely; full
//! replacement is the system's only form of diffing.
//!
//! Only reads performed directly by the producer belong to this host's
//! reaction. Tracking is suspended while the produced child renders, so a
//! read in a component body is not attributed here; reactions the child
//! hosts create for themselves still track their own dependencies, and an
//! inner value changing updates in place instead of re-running the
//! producer.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_signals::{effect, untrack};
use tracing::error;

use crate::dom::{insert_before, DomError, Node};
use crate::host::{create_host, Host, HostRef, PathContext, Removal, StopHandle, Subscriptions};
use crate::value::RenderValue;

pub struct FunctionHost {
    producer: Rc<dyn Fn() -> RenderValue>,
    placeholder: Node,
    ctx: PathContext,
    /// Current child host, replaced on recompute.
    inner: Rc<RefCell<Option<HostRef>>>,
    stop: RefCell<Option<StopHandle>>,
    destroyed: Cell<bool>,
}

impl FunctionHost {
    pub fn new(producer: Rc<dyn Fn() -> RenderValue>, placeholder: Node, ctx: PathContext) -> Self {
        FunctionHost {
            producer,
            placeholder,
            ctx,
            inner: Rc::new(RefCell::new(None)),
            stop: RefCell::new(None),
            destroyed: Cell::new(false),
        }
    }
}

impl Host for FunctionHost {
    fn render(&self) -> Result<(), DomError> {
        let producer = self.producer.clone();
        let placeholder = self.placeholder.clone();
        let ctx = self.ctx.clone();
        let inner = self.inner.clone();

        let stop = effect(move || {
            // Destroy-before-recreate: the previous subtree is fully torn
            // down before the replacement begins rendering.
            // The child owns its whole range, its placeholder included;
            // with an exit animation the removal finishes later.
            if let Some(host) = inner.borrow_mut().take() {
                if let Err(err) = host.destroy(Removal::Owns, Subscriptions::Owns) {
                    error!(%err, "tearing down replaced subtree failed");
                }
            }

            let value = producer();

            let child_placeholder = Node::comment("dyn");
            if let Err(err) = insert_before(&child_placeholder, &placeholder) {
                error!(%err, "dynamic slot lost its anchor");
                return;
            }
            // Reads made while the child renders (component bodies, child
            // reactions being set up) must not become dependencies of this
            // replacement reaction.
            let built = untrack(|| {
                let host = create_host(value, child_placeholder, ctx.clone())?;
                host.render()?;
                Ok::<HostRef, DomError>(host)
            });
            match built {
                Ok(host) => *inner.borrow_mut() = Some(host),
                Err(err) => error!(%err, "rendering replacement subtree failed"),
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
        if let Some(host) = self.inner.borrow_mut().take() {
            host.destroy(removal, Subscriptions::Owns)?;
        }
        if removal == Removal::Owns {
            self.placeholder.remove();
        }
        Ok(())
    }

    fn element(&self) -> Node {
        match self.inner.borrow().as_ref() {
            Some(host) => host.element(),
            None => self.placeholder.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::Root;
    use crate::value::rx;
    use spark_signals::signal;

    fn mounted(value: RenderValue) -> (Node, HostRef) {
        let container = Node::element("div");
        let root = Root::new(container.clone());
        let placeholder = Node::comment("slot");
        container.append_child(&placeholder).unwrap();
        let host = create_host(value, placeholder, PathContext::new(root)).unwrap();
        host.render().unwrap();
        (container, host)
    }

    #[test]
    fn test_replaces_subtree_on_dependency_change() {
        let which = signal(0i64);
        let which_clone = which.clone();
        let (container, _host) = mounted(rx(move || {
            if which_clone.get() == 0 {
                RenderValue::from("zero")
            } else {
                RenderValue::from("one")
            }
        }));
        assert_eq!(container.text_content(), "zero");

        which.set(1);
        assert_eq!(container.text_content(), "one");
        which.set(0);
        assert_eq!(container.text_content(), "zero");
    }

    #[test]
    fn test_producer_runs_once_per_dependency_change() {
        use std::cell::Cell;
        let dep = signal(0i64);
        let dep_clone = dep.clone();
        let runs = Rc::new(Cell::new(0u32));
        let runs_clone = runs.clone();
        let (_, _host) = mounted(rx(move || {
            runs_clone.set(runs_clone.get() + 1);
            RenderValue::from(dep_clone.get())
        }));
        assert_eq!(runs.get(), 1);

        dep.set(1);
        dep.set(2);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_inner_atom_updates_do_not_rerun_producer() {
        use std::cell::Cell;
        let inner = signal(0i64);
        let inner_clone = inner.clone();
        let runs = Rc::new(Cell::new(0u32));
        let runs_clone = runs.clone();
        let (container, _host) = mounted(rx(move || {
            runs_clone.set(runs_clone.get() + 1);
            RenderValue::from(inner_clone.clone())
        }));
        assert_eq!(runs.get(), 1);
        assert_eq!(container.text_content(), "0");

        inner.set(5);
        assert_eq!(container.text_content(), "5");
        assert_eq!(runs.get(), 1, "inner reads belong to the atom's reaction");
    }

    #[test]
    fn test_component_body_reads_do_not_rerun_producer() {
        use std::cell::Cell;
        use crate::value::{component, Props};

        let inner = signal(0i64);
        let inner_clone = inner.clone();
        let runs = Rc::new(Cell::new(0u32));
        let runs_clone = runs.clone();
        let (container, _host) = mounted(rx(move || {
            runs_clone.set(runs_clone.get() + 1);
            let inner = inner_clone.clone();
            RenderValue::Component(component("Reader", move |_props, rc| {
                // Direct read, no atom wrapping it.
                let text = inner.get().to_string();
                rc.element("span", Props::new(), vec![text.as_str().into()])
                    .into()
            }))
        }));
        assert_eq!(runs.get(), 1);
        assert_eq!(container.text_content(), "0");

        // Component bodies run once; a bare read neither updates the DOM
        // nor re-runs the producer.
        inner.set(1);
        assert_eq!(runs.get(), 1, "body reads are not producer dependencies");
        assert_eq!(container.text_content(), "0");
    }

    #[test]
    fn test_destroy_stops_replacement() {
        let which = signal(0i64);
        let which_clone = which.clone();
        let (container, host) = mounted(rx(move || RenderValue::from(which_clone.get())));
        assert_eq!(container.text_content(), "0");

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div></div>");
        which.set(1);
        assert_eq!(container.serialize(), "<div></div>");
    }
}
