//! Hosts - the correspondence between one render value and the DOM and
//! subscriptions it produced.
//!
//! The dispatcher classifies a render value into exactly one host variant,
//! constructed against a placeholder comment (a stable anchor marking the
//! slot). Render is a separate explicit step. Destruction mirrors
//! construction: two flags say whether the DOM-removal step and the
//! subscription-cleanup step are already handled by an ancestor, so no
//! side effect runs twice.

pub mod atom;
pub mod component;
pub mod function;
pub mod sequence;
pub mod static_host;

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::dom::{DomError, Node};
use crate::root::Root;
use crate::value::RenderValue;

pub use atom::AtomHost;
pub use component::{ComponentHost, RenderContext};
pub use function::FunctionHost;
pub use sequence::SequenceHost;
pub use static_host::StaticHost;

/// Who performs the DOM-removal step of a destroy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// This host removes its own nodes.
    Owns,
    /// An ancestor removes the whole range; skip node removal.
    Delegated,
}

/// Who performs the subscription-cleanup step of a destroy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subscriptions {
    /// This host stops its own reactions.
    Owns,
    /// An ancestor already stopped them; skip.
    Delegated,
}

/// Stop handle for a reaction or listener registration.
pub type StopHandle = Box<dyn FnOnce()>;

/// The uniform host capability set.
pub trait Host {
    /// Mount this host's content at its placeholder. Single-use.
    fn render(&self) -> Result<(), DomError>;

    /// Tear down, honoring the delegation flags. Idempotent: a second call
    /// (including one racing an in-flight exit animation) is a no-op.
    fn destroy(&self, removal: Removal, subscriptions: Subscriptions) -> Result<(), DomError>;

    /// The currently-live node: resolved content when rendered, else the
    /// placeholder. May change identity over time for dynamic hosts.
    fn element(&self) -> Node;

    /// Parent element of the host's position, if attached.
    fn parent_element(&self) -> Option<Node> {
        self.element().parent()
    }
}

pub type HostRef = Rc<dyn Host>;

/// One ancestry step, snapshotted at host construction. Enough to derive
/// stable stylesheet identifiers without back-references into live hosts.
#[derive(Clone, Debug, PartialEq)]
pub struct HostPathEntry {
    pub element_path: Vec<usize>,
    /// Component name when the step is a component host.
    pub component: Option<String>,
}

/// Context threaded through host construction.
#[derive(Clone)]
pub struct PathContext {
    /// Ordered host ancestry.
    pub host_path: Vec<HostPathEntry>,
    /// Position within the current static template.
    pub element_path: Vec<usize>,
    /// Owning root, for attach-event subscription.
    pub root: Root,
    /// Ancestor-to-descendant data, set before a subtree renders.
    pub data: Rc<HashMap<String, Rc<dyn Any>>>,
}

impl PathContext {
    pub fn new(root: Root) -> Self {
        PathContext {
            host_path: Vec::new(),
            element_path: Vec::new(),
            root,
            data: Rc::new(HashMap::new()),
        }
    }

    /// Context for a child slot at `path` relative to the current template.
    pub fn at(&self, path: &[usize]) -> Self {
        let mut ctx = self.clone();
        ctx.element_path.extend_from_slice(path);
        ctx
    }

    /// Context for a subtree under a new ancestry step.
    pub fn descend(&self, component: Option<String>) -> Self {
        let mut ctx = self.clone();
        ctx.host_path.push(HostPathEntry {
            element_path: ctx.element_path.clone(),
            component,
        });
        ctx.element_path = Vec::new();
        ctx
    }

    pub fn get_data(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.data.get(key).cloned()
    }
}

/// A no-op host for null/undefined/boolean values: keeps its slot, renders
/// nothing.
pub struct EmptyHost {
    placeholder: Node,
    destroyed: Cell<bool>,
}

impl EmptyHost {
    pub fn new(placeholder: Node) -> Self {
        EmptyHost {
            placeholder,
            destroyed: Cell::new(false),
        }
    }
}

impl Host for EmptyHost {
    fn render(&self) -> Result<(), DomError> {
        Ok(())
    }

    fn destroy(&self, removal: Removal, _subscriptions: Subscriptions) -> Result<(), DomError> {
        if self.destroyed.replace(true) {
            return Ok(());
        }
        if removal == Removal::Owns {
            self.placeholder.remove();
        }
        Ok(())
    }

    fn element(&self) -> Node {
        self.placeholder.clone()
    }
}

/// Classify a render value and construct its host. Pure classification;
/// `render()` is the caller's next step.
///
/// A `Config` value is only legal as a component's first child; reaching
/// the dispatcher it is an unrecognized shape.
pub fn create_host(
    value: RenderValue,
    placeholder: Node,
    ctx: PathContext,
) -> Result<HostRef, DomError> {
    debug!(shape = value.shape(), "creating host");
    let host: HostRef = match value {
        RenderValue::Component(node) => ComponentHost::create(node, placeholder, ctx),
        RenderValue::Dyn(producer) => Rc::new(FunctionHost::new(producer, placeholder, ctx)),
        RenderValue::Atom(getter) => Rc::new(AtomHost::new(getter, placeholder)),
        RenderValue::Many(items) => Rc::new(SequenceHost::from_static(items, placeholder, ctx)),
        RenderValue::List(projection) => {
            Rc::new(SequenceHost::from_list(projection, placeholder, ctx))
        }
        RenderValue::Element(node) => Rc::new(StaticHost::new(node, placeholder, ctx)),
        RenderValue::Text(text) => Rc::new(StaticHost::new(Node::text(&text), placeholder, ctx)),
        RenderValue::Empty => Rc::new(EmptyHost::new(placeholder)),
        RenderValue::Config(_) => return Err(DomError::Unrenderable("config")),
    };
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::configure;

    fn test_ctx() -> (Node, PathContext) {
        let container = Node::element("div");
        let root = Root::new(container.clone());
        (container, PathContext::new(root))
    }

    #[test]
    fn test_config_outside_component_is_an_error() {
        let (container, ctx) = test_ctx();
        let placeholder = Node::comment("slot");
        container.append_child(&placeholder).unwrap();

        let result = create_host(RenderValue::Config(configure()), placeholder, ctx);
        assert!(matches!(result, Err(DomError::Unrenderable("config"))));
    }

    #[test]
    fn test_empty_host_keeps_slot_until_owned_removal() {
        let (container, ctx) = test_ctx();
        let placeholder = Node::comment("slot");
        container.append_child(&placeholder).unwrap();

        let host = create_host(RenderValue::Empty, placeholder, ctx).unwrap();
        host.render().unwrap();
        assert_eq!(container.serialize(), "<div><!--slot--></div>");

        host.destroy(Removal::Delegated, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div><!--slot--></div>");
        // Second destroy with ownership is still a no-op.
        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div><!--slot--></div>");
    }

    #[test]
    fn test_path_context_descend_snapshots_position() {
        let (_, ctx) = test_ctx();
        let at = ctx.at(&[2, 1]);
        assert_eq!(at.element_path, vec![2, 1]);

        let descended = at.descend(Some("App".to_string()));
        assert_eq!(descended.element_path, Vec::<usize>::new());
        assert_eq!(descended.host_path.len(), 1);
        assert_eq!(descended.host_path[0].element_path, vec![2, 1]);
        assert_eq!(descended.host_path[0].component.as_deref(), Some("App"));
    }
}
