//! # rxdom
//!
//! Reactive DOM rendering core.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for fine-grained reactivity.
//!
//! ## Architecture
//!
//! No virtual DOM: render values are classified into hosts, each host owns
//! the correspondence between one value and the nodes and subscriptions it
//! produced. Static subtrees mount once; dynamic parts update through
//! targeted reactions (an atom mutates one text node, a producer replaces
//! one subtree, a keyed list reconciles its items).
//!
//! ```text
//! Render Value → create_host → Host::render → retained DOM + reactions
//! ```
//!
//! ## Modules
//!
//! - [`dom`] - Retained DOM tree, events, structural mutation
//! - [`value`] - Render values, props, scalars, slot configuration
//! - [`builder`] - Element construction with deferred-work side tables
//! - [`host`] - Host variants and the dispatcher
//! - [`style`] - Style objects, CSS generation, staged transitions
//! - [`schedule`] - Deterministic animation-frame queue
//! - [`root`] - Mount point and attach/detach lifecycle

pub mod builder;
pub mod dom;
pub mod host;
pub mod root;
pub mod schedule;
pub mod style;
pub mod value;

pub use dom::{
    insert_before, remove_nodes_between, DomError, ElementFlags, Event, EventKind, Listener,
    Node, OnceListener,
};

pub use value::{
    atom, attr_rx, component, configure, element_ref, handler, host_ref, rx, rx_list,
    AttrValue, ComponentFn, ComponentNode, Config, ConfigItem, ListProjection, Props,
    PropsOverride, RenderValue, ScalarValue,
};

pub use builder::{
    create_element, create_svg_element, fragment, is_valid_attribute, DetachStyled, RefHandle,
    SideTables, UnhandledAttr, UnhandledChild,
};

pub use host::{
    create_host, AtomHost, ComponentHost, EmptyHost, FunctionHost, Host, HostPathEntry,
    HostRef, PathContext, Removal, RenderContext, SequenceHost, StaticHost, StopHandle,
    Subscriptions,
};

pub use host::component::{RefMap, RefSlot};

pub use style::{
    generate_style_content, reset_style_state, style_sheet_id, transition_properties,
    StyleEntry, StyleObject, StyleSheet, StyleValue,
};

pub use schedule::{
    advance_frame, flush_frames, next_frames, pending_frames, request_frame, reset_frames,
    FrameCallback,
};

pub use root::Root;
