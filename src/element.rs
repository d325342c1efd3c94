//! UI descriptions - the immutable input of a render pass.
//!
//! A description is a [`Node`]: an element (host tag or component with key and
//! props), a text leaf, an ordered list of nodes, or nothing. Descriptions are
//! reference counted so cloning them into work nodes never copies a subtree.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::element::{host, Node};
//!
//! let tree: Node = host("div")
//!     .prop("id", "main")
//!     .style("color", "red")
//!     .child(host("span").child("Hello"))
//!     .child(host("span").key("b").child(42))
//!     .into();
//! ```

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::engine::HookContext;
use crate::host::events::{listener_prop_name, EventHandler, HostEvent};
use crate::types::Key;

/// Flat style map (`color` -> `red`).
pub type Style = BTreeMap<String, String>;

/// Name of the prop that carries structural or textual children.
pub const CHILDREN: &str = "children";

/// Name of the prop that carries the style map.
pub const STYLE: &str = "style";

// =============================================================================
// Prop Values
// =============================================================================

/// A single property value.
#[derive(Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Style(Style),
    /// Children description. Only textual children are ever patched directly.
    Children(Node),
    Handler(EventHandler),
}

impl PropValue {
    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render scalar values as text, the way a host attribute would see them.
    ///
    /// Integral numbers print without a fractional part.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Str(s) => Some(s.to_string()),
            Self::Children(Node::Text(s)) => Some(s.to_string()),
            Self::Null | Self::Style(_) | Self::Children(_) | Self::Handler(_) => None,
        }
    }

    /// True when this is a `children` value the host can set as plain text:
    /// a text leaf, a string or a number.
    pub fn is_textual_children(&self) -> bool {
        matches!(
            self,
            Self::Children(Node::Text(_)) | Self::Str(_) | Self::Number(_)
        )
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Style(a), Self::Style(b)) => a == b,
            (Self::Children(a), Self::Children(b)) => a.same(b),
            (Self::Handler(a), Self::Handler(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Str(s) => write!(f, "{:?}", &**s),
            Self::Style(style) => f.debug_map().entries(style.iter()).finish(),
            Self::Children(node) => write!(f, "{node:?}"),
            Self::Handler(_) => f.write_str("<handler>"),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(Rc::from(value))
    }
}

impl From<Style> for PropValue {
    fn from(value: Style) -> Self {
        Self::Style(value)
    }
}

impl From<Node> for PropValue {
    fn from(value: Node) -> Self {
        Self::Children(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        Self::Handler(value)
    }
}

// =============================================================================
// Props
// =============================================================================

/// Immutable, cheaply cloned property map.
///
/// Iteration order is by property name so diffs are deterministic.
#[derive(Clone, Default, PartialEq)]
pub struct Props(Rc<BTreeMap<String, PropValue>>);

impl Props {
    /// Empty props.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a property (copy-on-write).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        Rc::make_mut(&mut self.0).insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `children` description, if any.
    pub fn children(&self) -> Option<&Node> {
        match self.0.get(CHILDREN) {
            Some(PropValue::Children(node)) => Some(node),
            _ => None,
        }
    }

    /// The `children` prop when it is a text leaf.
    pub fn text_children(&self) -> Option<&str> {
        match self.children() {
            Some(Node::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// The `style` map, if any.
    pub fn style(&self) -> Option<&Style> {
        match self.0.get(STYLE) {
            Some(PropValue::Style(style)) => Some(style),
            _ => None,
        }
    }

    /// Same allocation (not merely equal contents).
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

// =============================================================================
// Components
// =============================================================================

type RenderFn = dyn Fn(&mut HookContext<'_>, &Props) -> Node;

/// Plain function pointer form of a render function.
type RenderFnPtr = fn(&mut HookContext<'_>, &Props) -> Node;

/// A function component.
///
/// Two components are the same type when they were built from the same
/// function item or closure definition, so a component value can be rebuilt
/// on every render without losing its state. Function pointers all share one
/// type, so they are told apart by address.
#[derive(Clone)]
pub struct Component {
    id: TypeId,
    address: Option<usize>,
    name: &'static str,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&mut HookContext<'_>, &Props) -> Node + 'static,
    {
        let address = (&render as &dyn Any)
            .downcast_ref::<RenderFnPtr>()
            .map(|ptr| *ptr as usize);
        Self {
            id: TypeId::of::<F>(),
            address,
            name,
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, hooks: &mut HookContext<'_>, props: &Props) -> Node {
        (self.render)(hooks, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.address == other.address
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name)
    }
}

// =============================================================================
// Elements & Nodes
// =============================================================================

/// What an element instantiates.
#[derive(Clone, PartialEq)]
pub enum ElementType {
    Host(Rc<str>),
    Component(Component),
}

impl ElementType {
    /// The host tag, if this is a host element.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Host(tag) => Some(tag),
            Self::Component(_) => None,
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(tag) => f.write_str(tag),
            Self::Component(component) => write!(f, "{component:?}"),
        }
    }
}

/// A tagged description: type, optional key and props.
#[derive(Clone, Debug)]
pub struct Element {
    pub element_type: ElementType,
    pub key: Option<Key>,
    pub props: Props,
}

/// A UI description.
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    Text(Rc<str>),
    Element(Rc<Element>),
    List(Rc<[Node]>),
}

impl Node {
    pub fn text(text: impl AsRef<str>) -> Self {
        Self::Text(Rc::from(text.as_ref()))
    }

    pub fn list(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self::List(nodes.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Identity comparison for shared subtrees, value comparison for text.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => write!(f, "{:?}", &**text),
            Self::Element(element) => write!(f, "{element:?}"),
            Self::List(nodes) => f.debug_list().entries(nodes.iter()).finish(),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::Text(Rc::from(value))
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Self::text(value.to_string())
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::text(value.to_string())
    }
}

impl From<usize> for Node {
    fn from(value: usize) -> Self {
        Self::text(value.to_string())
    }
}

impl From<Element> for Node {
    fn from(value: Element) -> Self {
        Self::Element(Rc::new(value))
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Self::List(value.into())
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Start a host element description.
pub fn host(tag: &str) -> ElementBuilder {
    ElementBuilder::new(ElementType::Host(Rc::from(tag)))
}

/// Start a component element description.
pub fn component(component: &Component) -> ElementBuilder {
    ElementBuilder::new(ElementType::Component(component.clone()))
}

/// Incremental element construction, JSX-style.
///
/// One `child` sets the children prop to that node; more than one (or any
/// call to `children`) makes it a list.
pub struct ElementBuilder {
    element_type: ElementType,
    key: Option<Key>,
    props: Props,
    children: Vec<Node>,
    as_list: bool,
}

impl ElementBuilder {
    fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            key: None,
            props: Props::new(),
            children: Vec::new(),
            as_list: false,
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Set one field of the `style` map.
    pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut style = self.props.style().cloned().unwrap_or_default();
        style.insert(name.into(), value.into());
        self.props.set(STYLE, style);
        self
    }

    /// Attach a bubble-phase listener (`on("click", ..)` sets `onClick`).
    pub fn on(mut self, event: &str, handler: impl Fn(&HostEvent) + 'static) -> Self {
        self.props
            .set(listener_prop_name(event, false), EventHandler::new(handler));
        self
    }

    /// Attach a capture-phase listener (`onClickCapture`).
    pub fn on_capture(mut self, event: &str, handler: impl Fn(&HostEvent) + 'static) -> Self {
        self.props
            .set(listener_prop_name(event, true), EventHandler::new(handler));
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self.as_list = true;
        self
    }

    pub fn build(self) -> Element {
        let Self {
            element_type,
            key,
            mut props,
            mut children,
            as_list,
        } = self;

        if as_list || children.len() > 1 {
            props.set(CHILDREN, Node::from(children));
        } else if let Some(only) = children.pop() {
            props.set(CHILDREN, only);
        }

        Element {
            element_type,
            key,
            props,
        }
    }
}

impl From<ElementBuilder> for Node {
    fn from(value: ElementBuilder) -> Self {
        Self::from(value.build())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(_: &mut HookContext<'_>, _: &Props) -> Node {
        Node::Empty
    }

    fn other_leaf(_: &mut HookContext<'_>, _: &Props) -> Node {
        Node::from("other")
    }

    #[test]
    fn test_single_child_is_not_a_list() {
        let element = host("span").child("hello").build();
        assert_eq!(element.props.text_children(), Some("hello"));
    }

    #[test]
    fn test_multiple_children_become_list() {
        let element = host("div").child("a").child(host("span")).build();
        match element.props.children() {
            Some(Node::List(nodes)) => assert_eq!(nodes.len(), 2),
            other => panic!("expected list children, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_children_always_list() {
        let element = host("ul").children(vec![Node::from("only")]).build();
        assert!(matches!(element.props.children(), Some(Node::List(_))));
    }

    #[test]
    fn test_style_fields_merge() {
        let element = host("div").style("color", "red").style("width", "10").build();
        let style = element.props.style().expect("style prop");
        assert_eq!(style.get("color").map(String::as_str), Some("red"));
        assert_eq!(style.get("width").map(String::as_str), Some("10"));
    }

    #[test]
    fn test_component_identity_by_definition() {
        let a = Component::new("Leaf", leaf);
        let b = Component::new("Leaf", leaf);
        let c = Component::new("Other", other_leaf);
        assert_eq!(a, b, "same function item must compare equal");
        assert_ne!(a, c);
    }

    #[test]
    fn test_function_pointers_compare_by_address() {
        let first: RenderFnPtr = leaf;
        let second: RenderFnPtr = other_leaf;
        let a = Component::new("Leaf", first);
        let b = Component::new("Leaf", first);
        let c = Component::new("Other", second);
        assert_eq!(a, b);
        assert_ne!(a, c, "pointers to different functions are different components");
    }

    #[test]
    fn test_number_text_format() {
        assert_eq!(PropValue::from(3).as_text().as_deref(), Some("3"));
        assert_eq!(PropValue::from(1.5).as_text().as_deref(), Some("1.5"));
    }

    #[test]
    fn test_children_equality_is_identity() {
        let shared = Node::from(host("div"));
        let a = PropValue::Children(shared.clone());
        let b = PropValue::Children(shared);
        let c = PropValue::Children(Node::from(host("div")));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            PropValue::Children(Node::from("x")),
            PropValue::Children(Node::from("x"))
        );
    }
}
