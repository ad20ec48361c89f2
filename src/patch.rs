//! The patch dispatcher and the per-kind mount and patch routines.

use crate::{
	component::InstanceId,
	error::{RenderError, Warning},
	flags::{PatchFlags, StaticHint},
	host::{HostOps, HostRef},
	renderer::Renderer,
	vnode::{Children, NodeKind, NodeType, PropValue, Props, VNodeId},
};
use std::rc::Rc;
use tracing::{error, trace, trace_span};

/// Per-call context threaded through the recursion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope {
	/// The component instance whose subtree is being patched.
	pub(crate) parent: Option<InstanceId>,
	/// Whether only dynamic children and flagged props need to be looked at.
	pub(crate) optimized: bool,
	/// Remaining patch recursion depth.
	pub(crate) depth: usize,
}

impl Scope {
	pub(crate) fn root(depth_limit: usize) -> Self {
		Self {
			parent: None,
			optimized: false,
			depth: depth_limit,
		}
	}

	pub(crate) fn within(self, parent: InstanceId) -> Self {
		Self {
			parent: Some(parent),
			optimized: false,
			..self
		}
	}

	pub(crate) fn with_optimized(self, optimized: bool) -> Self {
		Self { optimized, ..self }
	}

	fn descend(self) -> Option<Self> {
		self.depth.checked_sub(1).map(|depth| Self { depth, ..self })
	}
}

impl<H: HostOps> Renderer<H> {
	/// Makes the host tree under `container` reflect `n2`, given that it currently reflects `n1`.
	///
	/// `anchor` is only used where `n2` (or a replacement for `n1`) is inserted.
	pub(crate) fn patch(&mut self, n1: Option<VNodeId>, n2: VNodeId, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		if n1 == Some(n2) {
			return Ok(());
		}
		let Some(mut scope) = scope.descend() else {
			error!(limit = self.options.depth_limit, "Patch depth limit reached.");
			return Err(RenderError::DepthLimit(self.options.depth_limit));
		};

		let mut n1 = n1;
		let mut anchor = anchor.cloned();
		if let Some(old) = n1 {
			if !self.vnode(old)?.same_type(self.vnode(n2)?) {
				trace!("Node type changed. Replacing.");
				anchor = self.next_host_node(old)?;
				self.unmount(old, scope, true)?;
				n1 = None;
			}
		}

		let node = self.vnode_mut(n2)?;
		let (kind, hint) = (node.kind(), node.hint);
		match hint {
			StaticHint::Bail => {
				scope.optimized = false;
				node.dynamic_children = None;
			}
			StaticHint::Hoisted if kind != NodeKind::Component => {
				if let Some(old) = n1 {
					trace!("Hoisted node. Adopting host nodes.");
					return self.adopt_host_refs(old, n2);
				}
			}
			_ => (),
		}

		let anchor = anchor.as_ref();
		match kind {
			NodeKind::Text | NodeKind::Comment => self.process_text(n1, n2, container, anchor),
			NodeKind::Static => self.process_static(n1, n2, container, anchor, scope),
			NodeKind::Fragment | NodeKind::Suspense => self.process_fragment(n1, n2, container, anchor, scope),
			NodeKind::Element => match n1 {
				None => self.mount_element(n2, container, anchor, scope),
				Some(n1) => self.patch_element(n1, n2, scope),
			},
			NodeKind::Component => match n1 {
				None => self.mount_component(n2, container, anchor, scope),
				Some(n1) => self.update_component(n1, n2, scope),
			},
			NodeKind::Teleport => self.process_teleport(n1, n2, container, anchor, scope),
		}
	}

	pub(crate) fn host_el(&self, id: VNodeId) -> Result<H::Node, RenderError> {
		self.refs.get(id).map(|host_ref| host_ref.el.clone()).ok_or(RenderError::Unmounted(id))
	}

	/// The last host node of `id` in the main tree.
	pub(crate) fn last_host_node(&self, id: VNodeId) -> Result<H::Node, RenderError> {
		match self.vnode(id)?.kind() {
			NodeKind::Component => self.last_host_node(self.subtree_of(id)?),
			_ => self.refs.get(id).map(|host_ref| host_ref.last().clone()).ok_or(RenderError::Unmounted(id)),
		}
	}

	/// The host node right after everything `id` occupies in the main tree.
	pub(crate) fn next_host_node(&self, id: VNodeId) -> Result<Option<H::Node>, RenderError> {
		let last = self.last_host_node(id)?;
		Ok(self.host.next_sibling(&last))
	}

	pub(crate) fn subtree_of(&self, component: VNodeId) -> Result<VNodeId, RenderError> {
		let instance = self.vnode(component)?.component.ok_or(RenderError::Unmounted(component))?;
		self.instances.get(instance).ok_or(RenderError::DanglingInstance(instance))?.subtree.ok_or(RenderError::Unmounted(component))
	}

	fn process_text(&mut self, n1: Option<VNodeId>, n2: VNodeId, container: &H::Node, anchor: Option<&H::Node>) -> Result<(), RenderError> {
		let node = self.vnode(n2)?;
		let is_comment = node.kind() == NodeKind::Comment;
		let text = node.children.text().unwrap_or_default().to_owned();

		let span = if cfg!(feature = "dangerous-logging") {
			trace_span!("Patching text", is_comment, text = text.as_str())
		} else {
			trace_span!("Patching text", is_comment)
		};
		let _enter = span.enter();

		match n1 {
			None => {
				let el = if is_comment { self.host.create_comment(&text) } else { self.host.create_text(&text) };
				self.host.insert(&el, container, anchor);
				self.refs.insert(n2, HostRef::new(el));
			}
			Some(n1) => {
				let el = self.host_el(n1)?;
				if self.vnode(n1)?.children.text() != Some(text.as_str()) {
					self.host.set_text(&el, &text);
				}
				self.refs.insert(n2, HostRef::new(el));
			}
		}
		Ok(())
	}

	fn process_static(&mut self, n1: Option<VNodeId>, n2: VNodeId, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		let NodeType::Static(content) = &self.vnode(n2)?.node_type else {
			return Err(RenderError::DanglingNode(n2));
		};
		let content = Rc::clone(content);

		match n1 {
			None => self.mount_static(n2, &content, container, anchor, scope),
			Some(n1) => {
				let changed = matches!(&self.vnode(n1)?.node_type, NodeType::Static(old) if *old != content);
				// Static content only changes in development setups, e.g. after a hot reload.
				if changed && self.options.dev_checks {
					trace!("Static content changed. Replacing.");
					let anchor = self.next_host_node(n1)?;
					self.remove_host_range(n1)?;
					self.mount_static(n2, &content, container, anchor.as_ref(), scope)
				} else {
					let host_ref = self.refs.get(n1).cloned().ok_or(RenderError::Unmounted(n1))?;
					self.refs.insert(n2, host_ref);
					self.share_template(n1, n2)
				}
			}
		}
	}

	fn mount_static(&mut self, n2: VNodeId, content: &Rc<str>, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		let span = trace_span!("Mounting static content", len = content.len());
		let _enter = span.enter();

		let mut holds_template = false;
		let mut inserted = None;

		if let Ok(Some(template)) = self.templates.acquire(&**content) {
			let clones: Option<Vec<_>> = template.iter().map(|node| self.host.clone_node(node)).collect();
			match clones {
				Some(clones) => {
					trace!("Cloned cached template.");
					for node in &clones {
						self.host.insert(node, container, anchor);
					}
					holds_template = true;
					inserted = Some(clones);
				}
				None => {
					if self.templates.release(&**content).is_err() {
						error!("Template reference count out of sync.");
					}
				}
			}
		}

		if inserted.is_none() {
			if let Some(nodes) = self.host.insert_static_content(content, container, anchor).filter(|nodes| !nodes.is_empty()) {
				let template: Option<Vec<_>> = nodes.iter().map(|node| self.host.clone_node(node)).collect();
				if let Some(template) = template {
					holds_template = self.templates.insert(Rc::clone(content), template).is_ok();
				}
				inserted = Some(nodes);
			}
		}

		let host_ref = match inserted.as_deref() {
			Some([first, .., last]) => HostRef::range(first.clone(), last.clone()),
			Some([single]) => HostRef::range(single.clone(), single.clone()),
			Some([]) | None => {
				let fallback = self.vnode(n2)?.children.nodes().to_vec();
				if fallback.is_empty() {
					self.warn(Warning::StaticContentUnsupported(n2));
					let placeholder = self.host.create_comment("");
					self.host.insert(&placeholder, container, anchor);
					HostRef::range(placeholder.clone(), placeholder)
				} else {
					trace!("Mounting fallback children.");
					self.mount_children(n2, &fallback, container, anchor, scope)?;
					let fallback = self.vnode(n2)?.children.nodes().to_vec();
					let first = fallback.first().copied().ok_or(RenderError::DanglingNode(n2))?;
					let last = fallback.last().copied().ok_or(RenderError::DanglingNode(n2))?;
					HostRef::range(self.host_el(first)?, self.last_host_node(last)?)
				}
			}
		};

		self.refs.insert(n2, host_ref);
		self.vnode_mut(n2)?.holds_template = holds_template;
		Ok(())
	}

	/// Takes over `n1`'s template reference count for `n2`, so that either can be freed first.
	fn share_template(&mut self, n1: VNodeId, n2: VNodeId) -> Result<(), RenderError> {
		let old = self.vnode(n1)?;
		if !old.holds_template || self.vnode(n2)?.holds_template {
			return Ok(());
		}
		let NodeType::Static(content) = &old.node_type else { return Ok(()) };
		let content = Rc::clone(content);
		let acquired = matches!(self.templates.acquire(&*content), Ok(Some(_)));
		self.vnode_mut(n2)?.holds_template = acquired;
		Ok(())
	}

	/// Points `n2` and its descendants at the host nodes of the structurally identical `n1`.
	fn adopt_host_refs(&mut self, n1: VNodeId, n2: VNodeId) -> Result<(), RenderError> {
		let mut pending = vec![(n1, n2)];
		while let Some((old, new)) = pending.pop() {
			if old == new {
				continue;
			}
			if let Some(host_ref) = self.refs.get(old).cloned() {
				self.refs.insert(new, host_ref);
			}
			self.share_template(old, new)?;

			let (old, new) = (self.vnode(old)?, self.vnode(new)?);
			if new.kind() == NodeKind::Component {
				continue;
			}
			let (old, new) = (old.children.nodes(), new.children.nodes());
			if old.len() == new.len() {
				pending.extend(old.iter().copied().zip(new.iter().copied()));
			}
		}
		Ok(())
	}

	/// After a block patch, gives the static children of `n2` that were skipped the host nodes of their counterparts in `n1`.
	pub(crate) fn inherit_static_children(&mut self, n1: VNodeId, n2: VNodeId) -> Result<(), RenderError> {
		let mut pending = vec![(n1, n2)];
		while let Some((n1, n2)) = pending.pop() {
			let old_children = self.vnode(n1)?.children.nodes().to_vec();
			let new_children = self.vnode(n2)?.children.nodes().to_vec();
			if old_children.len() != new_children.len() {
				continue;
			}
			for (c1, c2) in old_children.into_iter().zip(new_children) {
				if c1 == c2 || self.refs.contains_key(c2) || !self.nodes.contains_key(c1) {
					continue;
				}
				let (old, new) = (self.vnode(c1)?, self.vnode(c2)?);
				if !old.same_type(new) {
					continue;
				}
				let descend = matches!(new.kind(), NodeKind::Element | NodeKind::Fragment) && new.dynamic_children.is_none() && new.hint != StaticHint::Bail;
				match new.kind() {
					NodeKind::Element | NodeKind::Fragment | NodeKind::Text | NodeKind::Comment | NodeKind::Static => {
						if let Some(host_ref) = self.refs.get(c1).cloned() {
							self.refs.insert(c2, host_ref);
						}
						self.share_template(c1, c2)?;
						if descend {
							pending.push((c1, c2));
						}
					}
					NodeKind::Component | NodeKind::Teleport | NodeKind::Suspense => (),
				}
			}
		}
		Ok(())
	}

	fn mount_element(&mut self, n2: VNodeId, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		let node = self.vnode(n2)?;
		let NodeType::Element(tag) = &node.node_type else {
			return Err(RenderError::DanglingNode(n2));
		};
		let (tag, props, children) = (tag.clone(), node.props.clone(), node.children.clone());
		let span = trace_span!("Mounting element", tag = &*tag);
		let _enter = span.enter();

		let el = self.host.create_element(&tag);
		match children {
			Children::None => (),
			Children::Text(text) => self.host.set_element_text(&el, &text),
			Children::Nodes(children) => self.mount_children(n2, &children, &el, None, scope)?,
		}

		let scope_id = scope.parent.and_then(|parent| self.instances.get(parent)).and_then(|instance| instance.def.scope().cloned());
		if let Some(scope_id) = scope_id {
			self.host.set_scope_id(&el, &scope_id);
		}

		if let Some(props) = props {
			// `value` goes last, since it may depend on other props (like `min` and `max`).
			for (name, value) in props.iter().filter(|(name, _)| *name != "value") {
				self.host.patch_prop(&el, name, None, Some(value));
			}
			if let Some(value) = props.get("value") {
				self.host.patch_prop(&el, "value", None, Some(value));
			}
		}

		self.refs.insert(n2, HostRef::new(el.clone()));
		self.host.insert(&el, container, anchor);
		Ok(())
	}

	fn patch_element(&mut self, n1: VNodeId, n2: VNodeId, scope: Scope) -> Result<(), RenderError> {
		let el = self.host_el(n1)?;
		self.refs.insert(n2, HostRef::new(el.clone()));

		let (old, new) = (self.vnode(n1)?, self.vnode(n2)?);
		let span = trace_span!("Patching element", node_type = ?new.node_type, hint = ?new.hint);
		let _enter = span.enter();

		// A full props diff is needed again if the previous render left behind a dynamic key set.
		let mut flags = new.hint.flags() | (old.hint.flags() & PatchFlags::FULL_PROPS);
		let is_block = new.dynamic_children.is_some();
		let old_props = old.props.clone();
		let new_props = new.props.clone();
		let dynamic_props = new.dynamic_props.clone();
		let old_text = old.children.text().map(ToOwned::to_owned);
		let new_text = new.children.text().map(ToOwned::to_owned);

		let full_children_diff = self.patch_contents(n1, n2, &el, None, scope)?;
		if full_children_diff && is_block {
			flags |= PatchFlags::FULL_PROPS;
		}

		if !flags.is_empty() {
			if flags.contains(PatchFlags::FULL_PROPS) {
				self.patch_props(&el, old_props.as_deref(), new_props.as_deref());
			} else {
				let get = |props: &Option<Rc<Props>>, name: &str| props.as_deref().and_then(|props| props.get(name)).cloned();
				if flags.contains(PatchFlags::CLASS) {
					let (previous, next) = (get(&old_props, "class"), get(&new_props, "class"));
					if previous != next {
						self.host.patch_prop(&el, "class", previous.as_ref(), next.as_ref());
					}
				}
				if flags.contains(PatchFlags::STYLE) {
					let (previous, next) = (get(&old_props, "style"), get(&new_props, "style"));
					self.host.patch_prop(&el, "style", previous.as_ref(), next.as_ref());
				}
				if flags.contains(PatchFlags::PROPS) {
					for name in dynamic_props.as_deref().unwrap_or_default() {
						let name: &str = name;
						let (previous, next) = (get(&old_props, name), get(&new_props, name));
						// The host's `value` may have drifted from the previous render.
						if previous != next || name == "value" {
							self.host.patch_prop(&el, name, previous.as_ref(), next.as_ref());
						}
					}
				}
			}
			if flags.contains(PatchFlags::TEXT) && !full_children_diff && old_text != new_text {
				self.host.set_element_text(&el, new_text.as_deref().unwrap_or_default());
			}
		} else if !scope.optimized && !is_block {
			self.patch_props(&el, old_props.as_deref(), new_props.as_deref());
		}
		Ok(())
	}

	/// Patches `n2`'s children from `n1`'s through their dynamic children if both are blocks of the same shape,
	/// otherwise in full unless the scope is optimized.
	///
	/// Returns whether the children were diffed in full.
	pub(crate) fn patch_contents(&mut self, n1: VNodeId, n2: VNodeId, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<bool, RenderError> {
		let old = self.vnode(n1)?.dynamic_children.clone();
		let new = self.vnode(n2)?.dynamic_children.clone();
		match (old, new) {
			(Some(old), Some(new)) if old.len() == new.len() => {
				self.patch_block_children(&old, &new, container, scope)?;
				self.inherit_static_children(n1, n2)?;
				Ok(false)
			}
			(Some(old), Some(new)) => {
				self.warn(Warning::BlockShapeMismatch { old: old.len(), new: new.len() });
				self.patch_children(n1, n2, container, anchor, scope.with_optimized(false))?;
				Ok(true)
			}
			(None, Some(_)) => {
				trace!("Previous render had no dynamic children. Diffing in full.");
				self.patch_children(n1, n2, container, anchor, scope.with_optimized(false))?;
				Ok(true)
			}
			(_, None) if !scope.optimized => {
				self.patch_children(n1, n2, container, anchor, scope)?;
				Ok(true)
			}
			(_, None) => Ok(false),
		}
	}

	/// Patches two dynamic children lists pairwise.
	fn patch_block_children(&mut self, old: &[VNodeId], new: &[VNodeId], fallback_container: &H::Node, scope: Scope) -> Result<(), RenderError> {
		for (&o, &n) in old.iter().zip(new) {
			let (old_node, new_node) = (self.vnode(o)?, self.vnode(n)?);
			// Nodes that may be replaced or that own a range need their actual parent.
			let needs_parent = matches!(old_node.kind(), NodeKind::Fragment | NodeKind::Component | NodeKind::Teleport | NodeKind::Suspense) || !old_node.same_type(new_node);
			let parent = if needs_parent { self.host_el(o).ok().and_then(|el| self.host.parent_node(&el)) } else { None };
			let container = parent.unwrap_or_else(|| fallback_container.clone());
			self.patch(Some(o), n, &container, None, scope.with_optimized(true))?;
		}
		Ok(())
	}

	fn patch_props(&mut self, el: &H::Node, old: Option<&Props>, new: Option<&Props>) {
		if let (Some(old), Some(new)) = (old, new) {
			if std::ptr::eq(old, new) {
				return;
			}
		}
		let empty = Props::new();
		let (old, new) = (old.unwrap_or(&empty), new.unwrap_or(&empty));

		for (name, previous) in old.iter() {
			if new.get(name).is_none() {
				self.host.patch_prop(el, name, Some(previous), None);
			}
		}
		for (name, next) in new.iter().filter(|(name, _)| *name != "value") {
			let previous = old.get(name);
			if previous != Some(next) {
				self.host.patch_prop(el, name, previous, Some(next));
			}
		}
		if let Some(value) = new.get("value") {
			self.host.patch_prop(el, "value", old.get("value"), Some(value));
		}
	}

	fn process_fragment(&mut self, n1: Option<VNodeId>, n2: VNodeId, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		match n1 {
			None => {
				let start = self.host.create_text("");
				let end = self.host.create_text("");
				self.host.insert(&start, container, anchor);
				self.host.insert(&end, container, anchor);
				self.refs.insert(n2, HostRef::range(start, end.clone()));
				let children = self.vnode(n2)?.children.nodes().to_vec();
				self.mount_children(n2, &children, container, Some(&end), scope)
			}
			Some(n1) => {
				let host_ref = self.refs.get(n1).cloned().ok_or(RenderError::Unmounted(n1))?;
				let end = host_ref.anchor.clone().ok_or(RenderError::Unmounted(n1))?;
				self.refs.insert(n2, host_ref);

				let stable = self.vnode(n2)?.hint.contains(PatchFlags::STABLE_FRAGMENT)
					&& self.vnode(n1)?.dynamic_children.is_some()
					&& self.vnode(n2)?.dynamic_children.is_some();
				if stable {
					self.patch_contents(n1, n2, container, Some(&end), scope)?;
				} else {
					self.patch_children(n1, n2, container, Some(&end), scope)?;
				}
				Ok(())
			}
		}
	}

	fn process_teleport(&mut self, n1: Option<VNodeId>, n2: VNodeId, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		let disabled = self.teleport_disabled(n2)?;
		let to = self.teleport_to(n2)?;
		let span = trace_span!("Patching teleport", to = to.as_deref(), disabled);
		let _enter = span.enter();

		let Some(n1) = n1 else {
			let start = self.host.create_comment("teleport start");
			let end = self.host.create_comment("teleport end");
			self.host.insert(&start, container, anchor);
			self.host.insert(&end, container, anchor);

			let target = self.resolve_teleport_target(to.as_deref());
			let target_anchor = target.as_ref().map(|target| {
				let target_anchor = self.host.create_text("");
				self.host.insert(&target_anchor, target, None);
				target_anchor
			});
			let (mount_container, mount_anchor) = match (&target, &target_anchor) {
				(Some(target), Some(target_anchor)) if !disabled => (target.clone(), target_anchor.clone()),
				_ => (container.clone(), end.clone()),
			};
			self.refs.insert(n2, HostRef {
				el: start,
				anchor: Some(end),
				target,
				target_anchor,
			});
			let children = self.vnode(n2)?.children.nodes().to_vec();
			return self.mount_children(n2, &children, &mount_container, Some(&mount_anchor), scope);
		};

		let mut host_ref = self.refs.get(n1).cloned().ok_or(RenderError::Unmounted(n1))?;
		let end = host_ref.anchor.clone().ok_or(RenderError::Unmounted(n1))?;
		let was_in_target = !self.teleport_disabled(n1)? && host_ref.target.is_some();
		let (current_container, current_anchor) = match (&host_ref.target, &host_ref.target_anchor) {
			(Some(target), Some(target_anchor)) if was_in_target => (target.clone(), target_anchor.clone()),
			_ => (container.clone(), end.clone()),
		};
		self.refs.insert(n2, host_ref.clone());
		self.patch_contents(n1, n2, &current_container, Some(&current_anchor), scope)?;

		let retargeted = to != self.teleport_to(n1)?;
		if retargeted {
			if let Some(target) = self.resolve_teleport_target(to.as_deref()) {
				let target_anchor = match host_ref.target_anchor.take() {
					Some(target_anchor) => target_anchor,
					None => self.host.create_text(""),
				};
				self.host.insert(&target_anchor, &target, None);
				host_ref.target = Some(target);
				host_ref.target_anchor = Some(target_anchor);
				self.refs.insert(n2, host_ref.clone());
			}
		}

		let now_in_target = !disabled && host_ref.target.is_some();
		let destination = match (&host_ref.target, &host_ref.target_anchor) {
			(Some(target), Some(target_anchor)) if now_in_target => (target.clone(), target_anchor.clone()),
			_ => (container.clone(), end),
		};
		if was_in_target != now_in_target || (now_in_target && retargeted) {
			trace!(was_in_target, now_in_target, "Moving teleported children.");
			let children = self.vnode(n2)?.children.nodes().to_vec();
			for child in children {
				self.move_node(child, &destination.0, Some(&destination.1))?;
			}
		}
		Ok(())
	}

	pub(crate) fn teleport_disabled(&self, id: VNodeId) -> Result<bool, RenderError> {
		Ok(self.vnode(id)?.prop("disabled").map_or(false, PropValue::is_truthy))
	}

	fn teleport_to(&self, id: VNodeId) -> Result<Option<String>, RenderError> {
		Ok(self.vnode(id)?.prop("to").map(ToString::to_string))
	}

	fn resolve_teleport_target(&mut self, to: Option<&str>) -> Option<H::Node> {
		let target = to.and_then(|to| self.host.resolve_target(to));
		if target.is_none() {
			self.warn(Warning::InvalidTeleportTarget(to.unwrap_or_default().to_owned()));
		}
		target
	}
}
