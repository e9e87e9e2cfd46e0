//! Headless retained DOM - nodes, events, structural mutation.
//!
//! The rendering core mutates this tree directly; there is no virtual-DOM
//! diff pass. Comment nodes serve as stable placeholders marking where a
//! host's content belongs.

pub mod event;
pub mod node;

pub use event::{Event, EventKind};
pub use node::{
    insert_before, remove_nodes_between, DomError, ElementFlags, Listener, Node, OnceListener,
};
