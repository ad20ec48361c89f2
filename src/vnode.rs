use crate::{
	component::{ComponentDef, InstanceId},
	flags::{PatchFlags, StaticHint},
};
use core::{
	any::Any,
	fmt::{self, Debug, Display, Formatter},
};
use slotmap::new_key_type;
use std::{borrow::Cow, rc::Rc};

new_key_type! {
	/// Stable handle of a [`VNode`] record in a [`Renderer`](`crate::Renderer`)'s arena.
	pub struct VNodeId;
}

/// Identity hint of a node among its siblings. Compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	Int(i64),
	Str(Rc<str>),
}

impl Display for Key {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Key::Int(int) => Display::fmt(int, f),
			Key::Str(str) => Debug::fmt(str, f),
		}
	}
}

impl From<i64> for Key {
	fn from(int: i64) -> Self {
		Self::Int(int)
	}
}

impl From<i32> for Key {
	fn from(int: i32) -> Self {
		Self::Int(int.into())
	}
}

/// Indices beyond `i64::MAX` become string keys, which can't collide with any integer key.
impl From<usize> for Key {
	fn from(int: usize) -> Self {
		i64::try_from(int).map_or_else(|_| Self::Str(int.to_string().into()), Self::Int)
	}
}

impl From<&str> for Key {
	fn from(str: &str) -> Self {
		Self::Str(str.into())
	}
}

impl From<char> for Key {
	fn from(char: char) -> Self {
		Self::Str(char.to_string().into())
	}
}

/// A prop value as handed to [`HostOps::patch_prop`](`crate::HostOps::patch_prop`).
///
/// Equality follows the identity rules the update decisions rely on:
/// scalars compare by value, handlers and objects by reference.
#[derive(Clone)]
pub enum PropValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	Handler(Rc<dyn Fn(&dyn Any)>),
	Object(Rc<dyn Any>),
}

impl PartialEq for PropValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Int(a), Self::Int(b)) => a == b,
			#[allow(clippy::float_cmp)]
			(Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
			(Self::Str(a), Self::Str(b)) => a == b,
			(Self::Handler(a), Self::Handler(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
			(Self::Object(a), Self::Object(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
			_ => false,
		}
	}
}

impl Debug for PropValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => f.write_str("Null"),
			Self::Bool(bool) => f.debug_tuple("Bool").field(bool).finish(),
			Self::Int(int) => f.debug_tuple("Int").field(int).finish(),
			Self::Float(float) => f.debug_tuple("Float").field(float).finish(),
			Self::Str(str) => f.debug_tuple("Str").field(str).finish(),
			Self::Handler(handler) => write!(f, "Handler({:p})", Rc::as_ptr(handler).cast::<()>()),
			Self::Object(object) => write!(f, "Object({:p})", Rc::as_ptr(object).cast::<()>()),
		}
	}
}

impl Display for PropValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => Ok(()),
			Self::Bool(bool) => Display::fmt(bool, f),
			Self::Int(int) => Display::fmt(int, f),
			Self::Float(float) => Display::fmt(float, f),
			Self::Str(str) => f.write_str(str),
			Self::Handler(_) | Self::Object(_) => Debug::fmt(self, f),
		}
	}
}

impl PropValue {
	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(str) => Some(str),
			_ => None,
		}
	}

	/// Truthiness as used for boolean-ish props like `disabled`.
	#[must_use]
	pub fn is_truthy(&self) -> bool {
		match self {
			Self::Null => false,
			Self::Bool(bool) => *bool,
			Self::Int(int) => *int != 0,
			Self::Float(float) => *float != 0.0 && !float.is_nan(),
			Self::Str(_) | Self::Handler(_) | Self::Object(_) => true,
		}
	}
}

impl From<bool> for PropValue {
	fn from(bool: bool) -> Self {
		Self::Bool(bool)
	}
}

impl From<i64> for PropValue {
	fn from(int: i64) -> Self {
		Self::Int(int)
	}
}

impl From<i32> for PropValue {
	fn from(int: i32) -> Self {
		Self::Int(int.into())
	}
}

impl From<f64> for PropValue {
	fn from(float: f64) -> Self {
		Self::Float(float)
	}
}

impl From<&str> for PropValue {
	fn from(str: &str) -> Self {
		Self::Str(str.into())
	}
}

impl From<String> for PropValue {
	fn from(string: String) -> Self {
		Self::Str(string.into())
	}
}

/// Ordered prop mapping. Later insertions of an existing name replace the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props(Vec<(Cow<'static, str>, PropValue)>);

impl Props {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) -> Self {
		self.insert(name, value);
		self
	}

	pub fn insert(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) {
		let name = name.into();
		let value = value.into();
		match self.0.iter_mut().find(|(n, _)| *n == name) {
			Some((_, v)) => *v = value,
			None => self.0.push((name, value)),
		}
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&PropValue> {
		self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
		self.0.iter().map(|(n, v)| (n.as_ref(), v))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<N: Into<Cow<'static, str>>, V: Into<PropValue>> FromIterator<(N, V)> for Props {
	fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
		let mut props = Self::new();
		for (name, value) in iter {
			props.insert(name, value);
		}
		props
	}
}

/// Node discriminator.
#[derive(Clone)]
pub enum NodeType {
	Element(Cow<'static, str>),
	Text,
	Comment,
	/// Pre-serialized constant content. The fallback children are mounted per node
	/// if the host can't insert serialized content.
	Static(Rc<str>),
	Fragment,
	Component(Rc<ComponentDef>),
	Teleport,
	Suspense,
}

/// Payload-free copy of [`NodeType`] used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	Element,
	Text,
	Comment,
	Static,
	Fragment,
	Component,
	Teleport,
	Suspense,
}

impl NodeType {
	#[must_use]
	pub fn kind(&self) -> NodeKind {
		match self {
			NodeType::Element(_) => NodeKind::Element,
			NodeType::Text => NodeKind::Text,
			NodeType::Comment => NodeKind::Comment,
			NodeType::Static(_) => NodeKind::Static,
			NodeType::Fragment => NodeKind::Fragment,
			NodeType::Component(_) => NodeKind::Component,
			NodeType::Teleport => NodeKind::Teleport,
			NodeType::Suspense => NodeKind::Suspense,
		}
	}

	/// Discriminator and tag equality. Component definitions compare by identity.
	#[must_use]
	pub fn same_as(&self, other: &Self) -> bool {
		match (self, other) {
			(NodeType::Element(a), NodeType::Element(b)) => a == b,
			(NodeType::Component(a), NodeType::Component(b)) => Rc::ptr_eq(a, b),
			(a, b) => a.kind() == b.kind(),
		}
	}
}

impl Debug for NodeType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			NodeType::Element(tag) => write!(f, "<{}>", tag),
			NodeType::Static(content) => {
				if cfg!(feature = "dangerous-logging") {
					f.debug_tuple("Static").field(content).finish()
				} else {
					write!(f, "Static({} bytes)", content.len())
				}
			}
			NodeType::Component(def) => write!(f, "Component({})", def.name()),
			other => Debug::fmt(&other.kind(), f),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Children {
	None,
	Text(String),
	Nodes(Vec<VNodeId>),
}

impl Default for Children {
	fn default() -> Self {
		Self::None
	}
}

impl Children {
	#[must_use]
	pub fn nodes(&self) -> &[VNodeId] {
		match self {
			Children::Nodes(nodes) => nodes,
			Children::None | Children::Text(_) => &[],
		}
	}

	#[must_use]
	pub fn text(&self) -> Option<&str> {
		match self {
			Children::Text(text) => Some(text),
			Children::None | Children::Nodes(_) => None,
		}
	}
}

/// One arena record describing a UI unit.
///
/// Records are immutable by convention once rendered, except for the bookkeeping the renderer does
/// while patching them. Host back-references are kept outside of the record, see [`Renderer::host_ref`](`crate::Renderer::host_ref`).
#[derive(Debug, Clone)]
pub struct VNode {
	pub(crate) node_type: NodeType,
	pub(crate) key: Option<Key>,
	pub(crate) props: Option<Rc<Props>>,
	pub(crate) children: Children,
	pub(crate) hint: StaticHint,
	pub(crate) dynamic_props: Option<Rc<[Cow<'static, str>]>>,
	pub(crate) dynamic_children: Option<Vec<VNodeId>>,
	pub(crate) is_block: bool,
	/// The block contains content that its dynamic children don't cover (render-once or slot subtrees),
	/// so teardown has to walk all children.
	pub(crate) has_untracked: bool,
	pub(crate) component: Option<InstanceId>,
	/// Survives the disposal of the tree it was rendered into (hoisted and render-once records).
	pub(crate) retained: bool,
	/// Holds one reference into the static template cache.
	pub(crate) holds_template: bool,
}

impl VNode {
	#[must_use]
	pub fn node_type(&self) -> &NodeType {
		&self.node_type
	}

	#[must_use]
	pub fn kind(&self) -> NodeKind {
		self.node_type.kind()
	}

	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		self.key.as_ref()
	}

	#[must_use]
	pub fn props(&self) -> Option<&Rc<Props>> {
		self.props.as_ref()
	}

	#[must_use]
	pub fn children(&self) -> &Children {
		&self.children
	}

	#[must_use]
	pub fn hint(&self) -> StaticHint {
		self.hint
	}

	#[must_use]
	pub fn dynamic_props(&self) -> Option<&[Cow<'static, str>]> {
		self.dynamic_props.as_deref()
	}

	#[must_use]
	pub fn dynamic_children(&self) -> Option<&[VNodeId]> {
		self.dynamic_children.as_deref()
	}

	#[must_use]
	pub fn is_block(&self) -> bool {
		self.is_block
	}

	#[must_use]
	pub fn component(&self) -> Option<InstanceId> {
		self.component
	}

	/// Same discriminator, same tag and same key.
	#[must_use]
	pub fn same_type(&self, other: &Self) -> bool {
		self.node_type.same_as(&other.node_type) && self.key == other.key
	}

	pub(crate) fn prop(&self, name: &str) -> Option<&PropValue> {
		self.props.as_deref().and_then(|props| props.get(name))
	}

	/// A shallow copy that is safe to mount a second time.
	///
	/// The dynamic children still belong to the original, so the copy is diffed in full.
	pub(crate) fn detached_clone(&self) -> Self {
		Self {
			dynamic_children: None,
			is_block: false,
			has_untracked: false,
			component: None,
			retained: false,
			holds_template: false,
			..self.clone()
		}
	}
}

/// Describes a [`VNode`] before it is placed into the arena by a [`RenderContext`](`crate::RenderContext`).
#[derive(Debug, Clone)]
#[must_use]
pub struct VNodeBuilder {
	pub(crate) node_type: NodeType,
	pub(crate) key: Option<Key>,
	pub(crate) props: Option<Rc<Props>>,
	pub(crate) children: Children,
	pub(crate) hint: StaticHint,
	pub(crate) dynamic_props: Option<Rc<[Cow<'static, str>]>>,
}

impl VNodeBuilder {
	pub fn new(node_type: NodeType) -> Self {
		Self {
			node_type,
			key: None,
			props: None,
			children: Children::None,
			hint: StaticHint::default(),
			dynamic_props: None,
		}
	}

	pub fn element(tag: impl Into<Cow<'static, str>>) -> Self {
		Self::new(NodeType::Element(tag.into()))
	}

	pub fn text(text: impl Into<String>) -> Self {
		Self::new(NodeType::Text).text_children(text)
	}

	pub fn comment(text: impl Into<String>) -> Self {
		Self::new(NodeType::Comment).text_children(text)
	}

	pub fn fragment(children: Vec<VNodeId>) -> Self {
		Self::new(NodeType::Fragment).children(children)
	}

	/// `fallback` is mounted per node when the host can't insert `content` directly.
	pub fn static_content(content: impl Into<Rc<str>>, fallback: Vec<VNodeId>) -> Self {
		Self::new(NodeType::Static(content.into())).children(fallback)
	}

	pub fn component(def: &Rc<ComponentDef>) -> Self {
		Self::new(NodeType::Component(Rc::clone(def)))
	}

	/// Children are mounted into the host node resolved from the `to` prop, unless `disabled` is truthy.
	pub fn teleport(to: &str, children: Vec<VNodeId>) -> Self {
		Self::new(NodeType::Teleport).prop("to", to).children(children)
	}

	pub fn suspense(children: Vec<VNodeId>) -> Self {
		Self::new(NodeType::Suspense).children(children)
	}

	pub fn key(mut self, key: impl Into<Key>) -> Self {
		self.key = Some(key.into());
		self
	}

	/// Sets one prop, copying the prop map if it is shared.
	pub fn prop(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) -> Self {
		Rc::make_mut(self.props.get_or_insert_with(Rc::default)).insert(name, value);
		self
	}

	pub fn props(mut self, props: Props) -> Self {
		self.props = Some(Rc::new(props));
		self
	}

	/// Shares an existing prop map. Identical maps let component updates be skipped without comparing values.
	pub fn shared_props(mut self, props: &Rc<Props>) -> Self {
		self.props = Some(Rc::clone(props));
		self
	}

	pub fn children(mut self, children: Vec<VNodeId>) -> Self {
		self.children = Children::Nodes(children);
		self
	}

	pub fn text_children(mut self, text: impl Into<String>) -> Self {
		self.children = Children::Text(text.into());
		self
	}

	pub fn flags(mut self, flags: PatchFlags) -> Self {
		self.hint = StaticHint::Dynamic(flags);
		self
	}

	pub fn hint(mut self, hint: StaticHint) -> Self {
		self.hint = hint;
		self
	}

	/// Names of the props covered by [`PatchFlags::PROPS`].
	pub fn dynamic_props<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Cow<'static, str>>,
	{
		self.dynamic_props = Some(names.into_iter().map(Into::into).collect());
		self
	}

	pub(crate) fn into_vnode(self, dynamic_children: Option<Vec<VNodeId>>) -> VNode {
		VNode {
			node_type: self.node_type,
			key: self.key,
			props: self.props,
			children: self.children,
			hint: self.hint,
			dynamic_props: self.dynamic_props,
			is_block: dynamic_children.is_some(),
			dynamic_children,
			has_untracked: false,
			component: None,
			retained: false,
			holds_template: false,
		}
	}
}
