//! Render values - what the dispatcher classifies into hosts.
//!
//! A render value is whatever a component body hands the renderer: built
//! DOM, text-like scalars, reactive scalar containers, zero-argument
//! producers, component invocation descriptors, arrays, keyed list
//! projections, or nothing. The set is closed; `create_host` matches on it
//! exhaustively.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use spark_signals::Signal;

use crate::dom::{Listener, Node};
use crate::host::{HostRef, RenderContext};
use crate::style::{StyleObject, StyleValue};

// =============================================================================
// Scalar values
// =============================================================================

/// A text-like scalar, the payload of an atom binding.
///
/// `Undefined` and `Null` stringify to their literal names, matching what a
/// template author sees when binding an absent value.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    /// Text form written into the bound text node.
    pub fn to_text(&self) -> String {
        match self {
            ScalarValue::Undefined => "undefined".to_string(),
            ScalarValue::Null => "null".to_string(),
            ScalarValue::Bool(v) => v.to_string(),
            ScalarValue::Int(v) => v.to_string(),
            ScalarValue::Float(v) => v.to_string(),
            ScalarValue::Str(v) => v.clone(),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Str(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Str(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int(v as i64)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => ScalarValue::Null,
        }
    }
}

// =============================================================================
// Attribute values
// =============================================================================

/// Ref callback for a plain element: `Some` on attach, `None` on detach.
pub type ElementRefFn = Rc<dyn Fn(Option<Node>)>;

/// Ref callback for a component: receives the component's host.
pub type HostRefFn = Rc<dyn Fn(Option<HostRef>)>;

/// A prop value on an element or component.
#[derive(Clone)]
pub enum AttrValue {
    /// Remove/skip the attribute.
    Absent,
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A style description, possibly multi-step.
    Style(StyleValue),
    /// Re-evaluated under a reaction; re-applied on dependency change.
    Reactive(Rc<dyn Fn() -> AttrValue>),
    /// Event listener (`on*` props).
    Handler(Listener),
    /// `ref` prop on a plain element.
    ElementRef(ElementRefFn),
    /// `ref` prop on a component.
    HostRef(HostRefFn),
    /// Several values for one key; applied in order, handlers all fire.
    Many(Vec<AttrValue>),
}

impl AttrValue {
    pub fn shape(&self) -> &'static str {
        match self {
            AttrValue::Absent => "absent",
            AttrValue::Str(_) => "string",
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Style(_) => "style",
            AttrValue::Reactive(_) => "reactive",
            AttrValue::Handler(_) => "handler",
            AttrValue::ElementRef(_) => "element-ref",
            AttrValue::HostRef(_) => "host-ref",
            AttrValue::Many(_) => "many",
        }
    }

    /// Whether this value (or any member of a `Many`) is reactive.
    pub fn is_reactive(&self) -> bool {
        match self {
            AttrValue::Reactive(_) => true,
            AttrValue::Many(values) => values.iter().any(AttrValue::is_reactive),
            _ => false,
        }
    }

    /// Resolve reactive wrappers to a plain value. Reads performed by the
    /// wrapped getter are tracked by the calling reaction.
    pub fn evaluate(&self) -> AttrValue {
        match self {
            AttrValue::Reactive(getter) => getter().evaluate(),
            AttrValue::Many(values) => {
                AttrValue::Many(values.iter().map(AttrValue::evaluate).collect())
            }
            other => other.clone(),
        }
    }

    /// Plain attribute text, if this resolves to one. `Bool(true)` is the
    /// empty string (attribute presence); `Bool(false)`/`Absent` are `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Str(v) => Some(v.clone()),
            AttrValue::Bool(true) => Some(String::new()),
            AttrValue::Int(v) => Some(v.to_string()),
            AttrValue::Float(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttrValue::{}", self.shape())
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<StyleObject> for AttrValue {
    fn from(v: StyleObject) -> Self {
        AttrValue::Style(StyleValue::Object(v))
    }
}

impl From<StyleValue> for AttrValue {
    fn from(v: StyleValue) -> Self {
        AttrValue::Style(v)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(v: Vec<AttrValue>) -> Self {
        AttrValue::Many(v)
    }
}

impl From<ScalarValue> for AttrValue {
    fn from(v: ScalarValue) -> Self {
        match v {
            ScalarValue::Undefined | ScalarValue::Null => AttrValue::Absent,
            ScalarValue::Bool(b) => AttrValue::Bool(b),
            ScalarValue::Int(i) => AttrValue::Int(i),
            ScalarValue::Float(f) => AttrValue::Float(f),
            ScalarValue::Str(s) => AttrValue::Str(s),
        }
    }
}

impl<T> From<Signal<T>> for AttrValue
where
    T: Into<ScalarValue> + Clone + PartialEq + Send + Sync + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        AttrValue::Reactive(Rc::new(move || {
            let scalar: ScalarValue = signal.get().into();
            scalar.into()
        }))
    }
}

/// Wrap a getter as a reactive attribute value.
pub fn attr_rx(getter: impl Fn() -> AttrValue + 'static) -> AttrValue {
    AttrValue::Reactive(Rc::new(getter))
}

/// Wrap a listener closure as a handler value.
pub fn handler(f: impl Fn(&crate::dom::Event) + 'static) -> AttrValue {
    AttrValue::Handler(Rc::new(f))
}

/// Wrap an element ref callback.
pub fn element_ref(f: impl Fn(Option<Node>) + 'static) -> AttrValue {
    AttrValue::ElementRef(Rc::new(f))
}

/// Wrap a component host ref callback.
pub fn host_ref(f: impl Fn(Option<HostRef>) + 'static) -> AttrValue {
    AttrValue::HostRef(Rc::new(f))
}

// =============================================================================
// Props
// =============================================================================

/// Ordered prop map for an element or component.
#[derive(Clone, Default)]
pub struct Props {
    entries: BTreeMap<String, AttrValue>,
}

impl Props {
    pub fn new() -> Self {
        Props::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `overrides` on top of this map. A key present on both sides
    /// combines into a `Many` list (existing first), so handlers stack
    /// rather than replace.
    pub fn merged_with(&self, overrides: &Props) -> Props {
        let mut out = self.clone();
        for (key, value) in overrides.iter() {
            match out.entries.remove(key) {
                None => {
                    out.entries.insert(key.to_string(), value.clone());
                }
                Some(existing) => {
                    let mut combined = match existing {
                        AttrValue::Many(values) => values,
                        single => vec![single],
                    };
                    match value.clone() {
                        AttrValue::Many(values) => combined.extend(values),
                        single => combined.push(single),
                    }
                    out.entries.insert(key.to_string(), AttrValue::Many(combined));
                }
            }
        }
        out
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v.shape())))
            .finish()
    }
}

// =============================================================================
// Component descriptors
// =============================================================================

/// A component body: invoked exactly once per host, under a render context.
pub type ComponentFn = Rc<dyn Fn(Props, &mut RenderContext) -> RenderValue>;

/// An un-invoked component call: function plus arguments.
#[derive(Clone)]
pub struct ComponentNode {
    pub name: String,
    pub render: ComponentFn,
    pub props: Props,
    pub children: Vec<RenderValue>,
}

impl ComponentNode {
    pub fn new(name: &str, render: impl Fn(Props, &mut RenderContext) -> RenderValue + 'static) -> Self {
        ComponentNode {
            name: name.to_string(),
            render: Rc::new(render),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn prop(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.props.insert(key, value);
        self
    }

    pub fn child(mut self, child: impl Into<RenderValue>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentNode({})", self.name)
    }
}

/// Describe a component invocation.
pub fn component(
    name: &str,
    render: impl Fn(Props, &mut RenderContext) -> RenderValue + 'static,
) -> ComponentNode {
    ComponentNode::new(name, render)
}

// =============================================================================
// Slot configuration
// =============================================================================

/// Function-valued props override: receives the slot's own props, returns
/// the props to use. Required for component targets, whose props cannot be
/// shallow-merged.
pub type PropsOverride = Rc<dyn Fn(Props) -> Props>;

/// Override instructions for one named slot.
#[derive(Clone, Default)]
pub struct ConfigItem {
    /// Merged onto an element slot's props (handlers stack).
    pub props: Option<Props>,
    /// Replaces a slot's props wholesale; the only form component slots accept.
    pub props_fn: Option<PropsOverride>,
    /// Replaces the slot's children entirely.
    pub children: Option<Vec<RenderValue>>,
    /// Events of these types occurring on the slot element are cloned and
    /// redispatched onto the given external target.
    pub forward_to: Vec<(String, Node)>,
}

impl ConfigItem {
    pub fn new() -> Self {
        ConfigItem::default()
    }

    pub fn props(mut self, props: Props) -> Self {
        self.props = Some(props);
        self
    }

    pub fn props_fn(mut self, f: impl Fn(Props) -> Props + 'static) -> Self {
        self.props_fn = Some(Rc::new(f));
        self
    }

    pub fn children(mut self, children: Vec<RenderValue>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn forward(mut self, event_type: &str, target: Node) -> Self {
        self.forward_to.push((event_type.to_string(), target));
        self
    }
}

/// Per-slot overrides an ancestor injects into a component, passed as the
/// component's first child.
#[derive(Clone, Default)]
pub struct Config {
    entries: BTreeMap<String, ConfigItem>,
}

impl Config {
    pub fn slot(mut self, name: &str, item: ConfigItem) -> Self {
        self.entries.insert(name.to_string(), item);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ConfigItem> {
        self.entries.get(name)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// Build a slot configuration.
pub fn configure() -> Config {
    Config::default()
}

// =============================================================================
// List projections
// =============================================================================

/// A keyed reactive list: evaluating `entries` under a reaction yields the
/// current `(key, value)` pairs and tracks the reads the evaluation performs.
#[derive(Clone)]
pub struct ListProjection {
    pub entries: Rc<dyn Fn() -> Vec<(String, RenderValue)>>,
}

impl fmt::Debug for ListProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListProjection")
    }
}

/// Bind a reactive list: `items` is read reactively, `key` derives the
/// reuse key for an item, `render` produces its render value.
pub fn rx_list<T, I, K, R>(items: I, key: K, render: R) -> RenderValue
where
    T: Clone + 'static,
    I: Fn() -> Vec<T> + 'static,
    K: Fn(usize, &T) -> String + 'static,
    R: Fn(&T) -> RenderValue + 'static,
{
    RenderValue::List(ListProjection {
        entries: Rc::new(move || {
            items()
                .into_iter()
                .enumerate()
                .map(|(index, item)| (key(index, &item), render(&item)))
                .collect()
        }),
    })
}

// =============================================================================
// Render values
// =============================================================================

/// The closed set of renderable values.
#[derive(Clone)]
pub enum RenderValue {
    /// null/undefined/boolean: renders nothing, keeps its slot.
    Empty,
    Text(String),
    Element(Node),
    /// Zero-argument producer; re-evaluated on dependency change, previous
    /// subtree replaced wholesale.
    Dyn(Rc<dyn Fn() -> RenderValue>),
    /// Reactive scalar bound to a text node.
    Atom(Rc<dyn Fn() -> ScalarValue>),
    Component(ComponentNode),
    /// Static array of values, one child host each.
    Many(Vec<RenderValue>),
    /// Keyed reactive list.
    List(ListProjection),
    /// Slot configuration; only legal as a component's first child.
    Config(Config),
}

impl RenderValue {
    /// Shape name used in dispatch errors.
    pub fn shape(&self) -> &'static str {
        match self {
            RenderValue::Empty => "empty",
            RenderValue::Text(_) => "text",
            RenderValue::Element(_) => "element",
            RenderValue::Dyn(_) => "function",
            RenderValue::Atom(_) => "atom",
            RenderValue::Component(_) => "component",
            RenderValue::Many(_) => "array",
            RenderValue::List(_) => "list",
            RenderValue::Config(_) => "config",
        }
    }
}

impl fmt::Debug for RenderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderValue::{}", self.shape())
    }
}

impl From<&str> for RenderValue {
    fn from(v: &str) -> Self {
        RenderValue::Text(v.to_string())
    }
}

impl From<String> for RenderValue {
    fn from(v: String) -> Self {
        RenderValue::Text(v)
    }
}

impl From<i64> for RenderValue {
    fn from(v: i64) -> Self {
        RenderValue::Text(v.to_string())
    }
}

impl From<i32> for RenderValue {
    fn from(v: i32) -> Self {
        RenderValue::Text(v.to_string())
    }
}

impl From<f64> for RenderValue {
    fn from(v: f64) -> Self {
        RenderValue::Text(v.to_string())
    }
}

impl From<bool> for RenderValue {
    fn from(_: bool) -> Self {
        RenderValue::Empty
    }
}

impl From<Node> for RenderValue {
    fn from(v: Node) -> Self {
        RenderValue::Element(v)
    }
}

impl From<ComponentNode> for RenderValue {
    fn from(v: ComponentNode) -> Self {
        RenderValue::Component(v)
    }
}

impl From<Config> for RenderValue {
    fn from(v: Config) -> Self {
        RenderValue::Config(v)
    }
}

impl From<Vec<RenderValue>> for RenderValue {
    fn from(v: Vec<RenderValue>) -> Self {
        RenderValue::Many(v)
    }
}

impl<T> From<Signal<T>> for RenderValue
where
    T: Into<ScalarValue> + Clone + PartialEq + Send + Sync + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        RenderValue::Atom(Rc::new(move || signal.get().into()))
    }
}

/// Wrap a producer as a dynamic-structure value.
pub fn rx(producer: impl Fn() -> RenderValue + 'static) -> RenderValue {
    RenderValue::Dyn(Rc::new(producer))
}

/// Wrap a scalar getter as an atom value.
pub fn atom(getter: impl Fn() -> ScalarValue + 'static) -> RenderValue {
    RenderValue::Atom(Rc::new(getter))
}
