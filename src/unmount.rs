//! Teardown, relocation and disposal of mounted nodes.

use crate::{
	component::{InstanceId, LifecycleHook, LifecycleState},
	error::{RenderError, Warning},
	flags::{PatchFlags, StaticHint},
	host::HostOps,
	patch::Scope,
	renderer::Renderer,
	vnode::{Children, NodeKind, NodeType, VNodeId},
};
use tracing::{error, trace, trace_span};

impl<H: HostOps> Renderer<H> {
	/// Tears down `id` and everything below it.
	///
	/// Host nodes are only detached where `do_remove` is set. Descendants of a removed host node are unmounted without detaching them,
	/// since removing their ancestor already takes them out of the host tree.
	pub(crate) fn unmount(&mut self, id: VNodeId, scope: Scope, do_remove: bool) -> Result<(), RenderError> {
		let node = self.vnode(id)?;
		let kind = node.kind();
		let span = trace_span!("Unmounting", ?kind, do_remove);
		let _enter = span.enter();

		match kind {
			NodeKind::Component => {
				let instance = node.component.ok_or(RenderError::Unmounted(id))?;
				self.unmount_component(instance, scope, do_remove)?;
			}
			NodeKind::Teleport => self.unmount_teleport(id, scope, do_remove)?,
			NodeKind::Fragment | NodeKind::Suspense => {
				let stable = node.hint.contains(PatchFlags::STABLE_FRAGMENT) && node.hint != StaticHint::Bail;
				let children = match &node.dynamic_children {
					Some(dynamic) if stable && !node.has_untracked => dynamic.clone(),
					_ => node.children.nodes().to_vec(),
				};
				self.unmount_children(&children, scope, false)?;
				if do_remove {
					self.remove_host_range(id)?;
				}
			}
			NodeKind::Static => {
				if do_remove {
					self.remove_host_range(id)?;
				}
			}
			NodeKind::Element => {
				// Hoisted subtrees contain nothing that needs teardown.
				if node.hint != StaticHint::Hoisted {
					let children = match &node.dynamic_children {
						Some(dynamic) if node.hint != StaticHint::Bail && !node.has_untracked => dynamic.clone(),
						_ => node.children.nodes().to_vec(),
					};
					self.unmount_children(&children, scope, false)?;
				}
				if do_remove {
					let el = self.host_el(id)?;
					self.host.remove(&el);
				}
			}
			NodeKind::Text | NodeKind::Comment => {
				if do_remove {
					let el = self.host_el(id)?;
					self.host.remove(&el);
				}
			}
		}

		self.refs.remove(id);
		Ok(())
	}

	fn unmount_teleport(&mut self, id: VNodeId, scope: Scope, do_remove: bool) -> Result<(), RenderError> {
		let host_ref = self.refs.get(id).cloned().ok_or(RenderError::Unmounted(id))?;
		let in_target = !self.teleport_disabled(id)? && host_ref.target.is_some();
		let children = self.vnode(id)?.children.nodes().to_vec();
		// Children in the target aren't below anything the caller removes.
		self.unmount_children(&children, scope, do_remove || in_target)?;
		if let Some(target_anchor) = &host_ref.target_anchor {
			self.host.remove(target_anchor);
		}
		if do_remove {
			self.host.remove(&host_ref.el);
			if let Some(anchor) = &host_ref.anchor {
				self.host.remove(anchor);
			}
		}
		Ok(())
	}

	pub(crate) fn unmount_component(&mut self, id: InstanceId, scope: Scope, do_remove: bool) -> Result<(), RenderError> {
		let instance = self.instance_mut(id)?;
		instance.state = LifecycleState::Unmounting;
		let (uid, subtree, parent) = (instance.uid, instance.subtree, instance.parent);

		let span = trace_span!("Unmounting component", name = instance.def.name(), uid);
		let _enter = span.enter();

		self.call_hooks(id, LifecycleHook::BeforeUnmount);
		self.scheduler.invalidate(uid);

		if let Some(subtree) = subtree {
			self.unmount(subtree, scope.within(id), do_remove)?;
			self.free_tree(subtree);
		}
		let cache = std::mem::take(&mut self.instance_mut(id)?.cache);
		for cached in cache.into_iter().flatten() {
			self.free(cached, true);
		}

		self.instance_mut(id)?.state = LifecycleState::Unmounted;
		self.queue_hooks(id, LifecycleHook::Unmounted);
		if let Some(parent) = parent.and_then(|parent| self.instances.get_mut(parent)) {
			parent.children.retain(|&child| child != id);
		}
		self.instances.remove(id);
		Ok(())
	}

	/// Moves everything `id` occupies in the main tree before `anchor`.
	pub(crate) fn move_node(&mut self, id: VNodeId, container: &H::Node, anchor: Option<&H::Node>) -> Result<(), RenderError> {
		match self.vnode(id)?.kind() {
			NodeKind::Component => {
				let subtree = self.subtree_of(id)?;
				self.move_node(subtree, container, anchor)
			}
			NodeKind::Fragment | NodeKind::Suspense => {
				let host_ref = self.refs.get(id).cloned().ok_or(RenderError::Unmounted(id))?;
				self.host.insert(&host_ref.el, container, anchor);
				let children = self.vnode(id)?.children.nodes().to_vec();
				for child in children {
					self.move_node(child, container, anchor)?;
				}
				if let Some(end) = &host_ref.anchor {
					self.host.insert(end, container, anchor);
				}
				Ok(())
			}
			NodeKind::Teleport => {
				let host_ref = self.refs.get(id).cloned().ok_or(RenderError::Unmounted(id))?;
				self.host.insert(&host_ref.el, container, anchor);
				// Teleported children stay where they are.
				let in_target = !self.teleport_disabled(id)? && host_ref.target.is_some();
				if !in_target {
					let children = self.vnode(id)?.children.nodes().to_vec();
					for child in children {
						self.move_node(child, container, anchor)?;
					}
				}
				if let Some(end) = &host_ref.anchor {
					self.host.insert(end, container, anchor);
				}
				Ok(())
			}
			NodeKind::Static => {
				let host_ref = self.refs.get(id).cloned().ok_or(RenderError::Unmounted(id))?;
				self.walk_range(id, &host_ref.el, host_ref.last(), |host, node| host.insert(node, container, anchor));
				Ok(())
			}
			NodeKind::Element | NodeKind::Text | NodeKind::Comment => {
				let el = self.host_el(id)?;
				self.host.insert(&el, container, anchor);
				Ok(())
			}
		}
	}

	/// Detaches all host nodes from `id`'s first through its last, inclusive.
	pub(crate) fn remove_host_range(&mut self, id: VNodeId) -> Result<(), RenderError> {
		let host_ref = self.refs.get(id).cloned().ok_or(RenderError::Unmounted(id))?;
		self.walk_range(id, &host_ref.el, host_ref.last(), |host, node| host.remove(node));
		Ok(())
	}

	/// Calls `visit` on each sibling from `start` through `end`. The successor is looked up before each visit.
	fn walk_range(&mut self, id: VNodeId, start: &H::Node, end: &H::Node, mut visit: impl FnMut(&mut H, &H::Node)) {
		let mut current = start.clone();
		loop {
			let next = self.host.next_sibling(&current);
			visit(&mut self.host, &current);
			if current == *end {
				break;
			}
			match next {
				Some(next) => current = next,
				None => {
					self.warn(Warning::FragmentAnchorMismatch(id));
					break;
				}
			}
		}
	}

	/// Drops the records of a replaced or unmounted tree. Retained records and their descendants are kept.
	///
	/// Component subtrees are not entered. They are freed when their instance re-renders or unmounts.
	pub(crate) fn free_tree(&mut self, root: VNodeId) {
		self.free(root, false);
	}

	pub(crate) fn free(&mut self, root: VNodeId, include_retained: bool) {
		let mut pending = vec![root];
		let mut freed = 0_usize;
		while let Some(id) = pending.pop() {
			match self.nodes.get(id) {
				Some(vnode) if include_retained || !vnode.retained => (),
				_ => continue,
			}
			let Some(vnode) = self.nodes.remove(id) else { continue };
			self.refs.remove(id);
			freed += 1;

			if vnode.holds_template {
				if let NodeType::Static(content) = &vnode.node_type {
					if self.templates.release(&**content).is_err() {
						error!("Template reference count out of sync.");
					}
				}
			}
			if let Children::Nodes(children) = vnode.children {
				pending.extend(children);
			}
		}
		trace!(freed, "Freed records.");
	}
}
