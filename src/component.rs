use crate::{
	block::RenderContext,
	flags::{PatchFlags, StaticHint},
	scheduler::HookContext,
	vnode::{Children, Props, VNode, VNodeId},
};
use core::fmt::{self, Debug, Formatter};
use slotmap::new_key_type;
use std::{borrow::Cow, error::Error, rc::Rc};

new_key_type! {
	/// Stable handle of a mounted component instance.
	pub struct InstanceId;
}

pub type BoxError = Box<dyn Error>;

/// Produces a component's subtree from its current props.
pub type RenderFn = dyn Fn(&mut RenderContext<'_>, &Props) -> Result<VNodeId, BoxError>;

pub type Hook = Rc<dyn Fn(&mut HookContext)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
	/// Synchronous, before the first render.
	BeforeMount,
	/// Post-flush, after the subtree is in the host tree.
	Mounted,
	/// Synchronous, before a re-render.
	BeforeUpdate,
	/// Post-flush, after a re-render was patched.
	Updated,
	/// Synchronous, before teardown.
	BeforeUnmount,
	/// Post-flush, after teardown.
	Unmounted,
}

impl LifecycleHook {
	const COUNT: usize = 6;

	fn index(self) -> usize {
		self as usize
	}

	pub(crate) fn is_post_flush(self) -> bool {
		matches!(self, Self::Mounted | Self::Updated | Self::Unmounted)
	}
}

/// A component definition. Nodes refer to it by [`Rc`] identity.
pub struct ComponentDef {
	name: Cow<'static, str>,
	render: Rc<RenderFn>,
	hooks: [Vec<Hook>; LifecycleHook::COUNT],
	scope_id: Option<Rc<str>>,
}

impl ComponentDef {
	pub fn new<F>(name: impl Into<Cow<'static, str>>, render: F) -> Self
	where
		F: 'static + Fn(&mut RenderContext<'_>, &Props) -> Result<VNodeId, BoxError>,
	{
		Self {
			name: name.into(),
			render: Rc::new(render),
			hooks: Default::default(),
			scope_id: None,
		}
	}

	#[must_use]
	pub fn on(mut self, hook: LifecycleHook, callback: impl 'static + Fn(&mut HookContext)) -> Self {
		self.hooks[hook.index()].push(Rc::new(callback));
		self
	}

	/// Elements mounted while rendering this component receive `scope_id` through [`HostOps::set_scope_id`](`crate::HostOps::set_scope_id`).
	#[must_use]
	pub fn scope_id(mut self, scope_id: impl Into<Rc<str>>) -> Self {
		self.scope_id = Some(scope_id.into());
		self
	}

	#[must_use]
	pub fn into_rc(self) -> Rc<Self> {
		Rc::new(self)
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn render_fn(&self) -> Rc<RenderFn> {
		Rc::clone(&self.render)
	}

	pub(crate) fn hooks(&self, hook: LifecycleHook) -> &[Hook] {
		&self.hooks[hook.index()]
	}

	pub(crate) fn scope(&self) -> Option<&Rc<str>> {
		self.scope_id.as_ref()
	}
}

impl Debug for ComponentDef {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentDef").field("name", &self.name).field("scope_id", &self.scope_id).finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Mounting,
	Mounted,
	Updating,
	Unmounting,
	Unmounted,
}

/// A live component. Owns its current subtree and one update job.
#[derive(Debug)]
pub struct ComponentInstance {
	/// Job id. Assigned in creation order, so parents sort before their children.
	pub(crate) uid: u64,
	pub(crate) def: Rc<ComponentDef>,
	pub(crate) vnode: VNodeId,
	/// The node a parent re-render supplied, pending this instance's next update.
	pub(crate) next: Option<VNodeId>,
	pub(crate) subtree: Option<VNodeId>,
	pub(crate) parent: Option<InstanceId>,
	pub(crate) children: Vec<InstanceId>,
	pub(crate) state: LifecycleState,
	/// Whether the instance may queue its own update while it is mounting or updating.
	pub(crate) allow_recurse: bool,
	/// Hoisted and render-once records, by slot.
	pub(crate) cache: Vec<Option<VNodeId>>,
	pub(crate) render_count: u64,
}

impl ComponentInstance {
	pub(crate) fn new(uid: u64, def: Rc<ComponentDef>, vnode: VNodeId, parent: Option<InstanceId>) -> Self {
		Self {
			uid,
			def,
			vnode,
			next: None,
			subtree: None,
			parent,
			children: Vec::new(),
			state: LifecycleState::Mounting,
			allow_recurse: true,
			cache: Vec::new(),
			render_count: 0,
		}
	}

	#[must_use]
	pub fn uid(&self) -> u64 {
		self.uid
	}

	#[must_use]
	pub fn def(&self) -> &Rc<ComponentDef> {
		&self.def
	}

	#[must_use]
	pub fn vnode(&self) -> VNodeId {
		self.vnode
	}

	#[must_use]
	pub fn subtree(&self) -> Option<VNodeId> {
		self.subtree
	}

	#[must_use]
	pub fn parent(&self) -> Option<InstanceId> {
		self.parent
	}

	#[must_use]
	pub fn children(&self) -> &[InstanceId] {
		&self.children
	}

	#[must_use]
	pub fn state(&self) -> LifecycleState {
		self.state
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		matches!(self.state, LifecycleState::Mounted | LifecycleState::Updating)
	}

	/// How often the render callback was invoked.
	#[must_use]
	pub fn render_count(&self) -> u64 {
		self.render_count
	}
}

/// Decides whether a parent re-render that produced `next` from `prev` requires the component to re-render.
///
/// In optimized mode the compiler's flags are trusted. Otherwise prop identity is checked first,
/// then the key sets and values are compared shallowly.
pub(crate) fn should_update_component(prev: &VNode, next: &VNode, optimized: bool) -> bool {
	let prev_props = prev.props.as_ref();
	let next_props = next.props.as_ref();

	if optimized && matches!(next.hint, StaticHint::Dynamic(_)) {
		let flags = next.hint.flags();
		if flags.contains(PatchFlags::DYNAMIC_SLOTS) {
			return true;
		}
		if flags.contains(PatchFlags::FULL_PROPS) {
			return match (prev_props, next_props) {
				(None, next) => next.is_some(),
				(Some(_), None) => true,
				(Some(prev), Some(next)) => props_changed(prev, next),
			};
		}
		if flags.contains(PatchFlags::PROPS) {
			let empty = Props::new();
			let prev_props = prev_props.map_or(&empty, |props| &**props);
			let next_props = next_props.map_or(&empty, |props| &**props);
			return next.dynamic_props().unwrap_or_default().iter().any(|name| next_props.get(name) != prev_props.get(name));
		}
		return false;
	}

	if !matches!(prev.children, Children::None) || !matches!(next.children, Children::None) {
		// Children of component nodes are slot content, which can't be proven stable here.
		return true;
	}
	match (prev_props, next_props) {
		(Some(prev), Some(next)) if Rc::ptr_eq(prev, next) => false,
		(None, None) => false,
		(None, Some(_)) | (Some(_), None) => true,
		(Some(prev), Some(next)) => props_changed(prev, next),
	}
}

fn props_changed(prev: &Props, next: &Props) -> bool {
	prev.len() != next.len() || next.iter().any(|(name, value)| prev.get(name) != Some(value))
}
