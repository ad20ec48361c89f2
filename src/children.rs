//! Children list reconciliation.
//!
//! Keyed lists are synced from both ends first. Whatever remains in the middle is matched by key,
//! and only nodes outside a longest increasing subsequence of the matched old positions are moved.

use crate::{
	error::{RenderError, Warning},
	flags::PatchFlags,
	host::HostOps,
	lis::longest_increasing_subsequence,
	patch::Scope,
	renderer::Renderer,
	vnode::{Children, VNodeId},
};
use tracing::{debug, trace, trace_span};

impl<H: HostOps> Renderer<H> {
	/// Mounts `children` of `parent` in order before `anchor`.
	pub(crate) fn mount_children(&mut self, parent: VNodeId, children: &[VNodeId], container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		self.check_duplicate_keys(children)?;
		for (index, &child) in children.iter().enumerate() {
			let child = self.prepare_mount(parent, index, child)?;
			self.patch(None, child, container, anchor, scope)?;
		}
		Ok(())
	}

	/// Reports each key that appears more than once among `children`. Only runs with dev checks on.
	fn check_duplicate_keys(&mut self, children: &[VNodeId]) -> Result<(), RenderError> {
		if !self.options.dev_checks || children.len() < 2 {
			return Ok(());
		}
		let mut seen = self.key_maps.take();
		let mut duplicates = Vec::new();
		for &child in children {
			if let Some(key) = &self.vnode(child)?.key {
				let count = seen.entry(key.clone()).or_insert(0);
				*count += 1;
				if *count == 2 {
					duplicates.push(key.clone());
				}
			}
		}
		self.key_maps.give_back(seen);
		for key in duplicates {
			self.warn(Warning::DuplicateKey(key));
		}
		Ok(())
	}

	/// Returns a node that is safe to mount at `parent`'s child position `index`.
	///
	/// A record can only own one set of host nodes.
	/// If `child` is already mounted elsewhere (a reused hoisted or render-once node), a copy takes its place in `parent`.
	fn prepare_mount(&mut self, parent: VNodeId, index: usize, child: VNodeId) -> Result<VNodeId, RenderError> {
		if !self.refs.contains_key(child) {
			return Ok(child);
		}
		trace!(?child, "Node is already mounted. Mounting a copy.");
		let copy = self.vnode(child)?.detached_clone();
		let copy = self.nodes.insert(copy);
		if let Children::Nodes(children) = &mut self.vnode_mut(parent)?.children {
			if children.get(index) == Some(&child) {
				children[index] = copy;
			}
		}
		Ok(copy)
	}

	/// Like [`Renderer::prepare_mount`], for a child about to be patched from `old`.
	fn claim(&mut self, parent: VNodeId, index: usize, old: VNodeId, new: VNodeId) -> Result<VNodeId, RenderError> {
		if old == new {
			Ok(new)
		} else {
			self.prepare_mount(parent, index, new)
		}
	}

	pub(crate) fn unmount_children(&mut self, children: &[VNodeId], scope: Scope, do_remove: bool) -> Result<(), RenderError> {
		for &child in children {
			self.unmount(child, scope, do_remove)?;
		}
		Ok(())
	}

	/// Full children diff. `container` is the host parent, `anchor` the insertion point for trailing additions.
	pub(crate) fn patch_children(&mut self, n1: VNodeId, n2: VNodeId, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		let flags = self.vnode(n2)?.hint.flags();
		let old = self.vnode(n1)?.children.clone();
		let new = self.vnode(n2)?.children.clone();

		if flags.contains(PatchFlags::KEYED_FRAGMENT) {
			return self.patch_keyed_children(n2, old.nodes(), new.nodes().to_vec(), container, anchor, scope);
		}
		if flags.contains(PatchFlags::UNKEYED_FRAGMENT) {
			return self.patch_unkeyed_children(n2, old.nodes(), new.nodes(), container, anchor, scope);
		}

		match (old, new) {
			(Children::Nodes(old), Children::Text(text)) => {
				self.unmount_children(&old, scope, false)?;
				self.host.set_element_text(container, &text);
			}
			(old, Children::Text(text)) => {
				if old.text() != Some(text.as_str()) {
					self.host.set_element_text(container, &text);
				}
			}
			(Children::Nodes(old), Children::Nodes(new)) => self.patch_keyed_children(n2, &old, new, container, anchor, scope)?,
			(Children::Text(_), Children::Nodes(new)) => {
				self.host.set_element_text(container, "");
				self.mount_children(n2, &new, container, anchor, scope)?;
			}
			(Children::None, Children::Nodes(new)) => self.mount_children(n2, &new, container, anchor, scope)?,
			(Children::Nodes(old), Children::None) => self.unmount_children(&old, scope, true)?,
			(Children::Text(_), Children::None) => self.host.set_element_text(container, ""),
			(Children::None, Children::None) => (),
		}
		Ok(())
	}

	/// Pairs children by index. Surplus old children are unmounted, surplus new ones mounted.
	fn patch_unkeyed_children(&mut self, parent: VNodeId, c1: &[VNodeId], c2: &[VNodeId], container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		let common = c1.len().min(c2.len());
		for (index, (&old, &new)) in c1.iter().zip(c2).enumerate() {
			let new = self.claim(parent, index, old, new)?;
			self.patch(Some(old), new, container, None, scope)?;
		}
		if c1.len() > common {
			self.unmount_children(&c1[common..], scope, true)?;
		} else {
			for (index, &child) in c2.iter().enumerate().skip(common) {
				let child = self.prepare_mount(parent, index, child)?;
				self.patch(None, child, container, anchor, scope)?;
			}
		}
		Ok(())
	}

	/// Keyed diff of `parent`'s children. `c2` must be `parent`'s current children list.
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn patch_keyed_children(
		&mut self,
		parent: VNodeId,
		c1: &[VNodeId],
		mut c2: Vec<VNodeId>,
		container: &H::Node,
		parent_anchor: Option<&H::Node>,
		scope: Scope,
	) -> Result<(), RenderError> {
		let span = trace_span!("Diffing keyed children", old = c1.len(), new = c2.len());
		let _enter = span.enter();
		self.check_duplicate_keys(&c2)?;

		// Ranges are `start..end`.
		let mut start = 0;
		let mut old_end = c1.len();
		let mut new_end = c2.len();

		// Common prefix.
		while start < old_end && start < new_end {
			let (old, new) = (c1[start], c2[start]);
			if !self.vnode(old)?.same_type(self.vnode(new)?) {
				break;
			}
			c2[start] = self.claim(parent, start, old, new)?;
			self.patch(Some(old), c2[start], container, None, scope)?;
			start += 1;
		}

		// Common suffix.
		while start < old_end && start < new_end {
			let (old, new) = (c1[old_end - 1], c2[new_end - 1]);
			if !self.vnode(old)?.same_type(self.vnode(new)?) {
				break;
			}
			c2[new_end - 1] = self.claim(parent, new_end - 1, old, new)?;
			self.patch(Some(old), c2[new_end - 1], container, None, scope)?;
			old_end -= 1;
			new_end -= 1;
		}

		if start >= old_end {
			// Only additions remain.
			if start < new_end {
				let anchor = match c2.get(new_end) {
					Some(&next) => Some(self.host_el(next)?),
					None => parent_anchor.cloned(),
				};
				for index in start..new_end {
					let child = self.prepare_mount(parent, index, c2[index])?;
					c2[index] = child;
					self.patch(None, child, container, anchor.as_ref(), scope)?;
				}
			}
			Ok(())
		} else if start >= new_end {
			// Only removals remain.
			self.unmount_children(&c1[start..old_end], scope, true)
		} else {
			self.patch_unknown_sequence(parent, &c1[start..old_end], &mut c2, start, new_end, container, parent_anchor, scope)
		}
	}

	/// The middle of a keyed diff: `c1_middle` against `c2[start..new_end]`.
	#[allow(clippy::too_many_arguments)]
	fn patch_unknown_sequence(
		&mut self,
		parent: VNodeId,
		c1_middle: &[VNodeId],
		c2: &mut [VNodeId],
		start: usize,
		new_end: usize,
		container: &H::Node,
		parent_anchor: Option<&H::Node>,
		scope: Scope,
	) -> Result<(), RenderError> {
		let mut key_to_new_index = self.key_maps.take();
		for (index, &child) in c2.iter().enumerate().take(new_end).skip(start) {
			if let Some(key) = self.vnode(child)?.key.clone() {
				// The first occurrence wins. Duplicates were already reported.
				if key_to_new_index.contains_key(&key) {
					trace!(?key, "Duplicate key. Mounting a fresh node.");
				} else {
					key_to_new_index.insert(key, index);
				}
			}
		}

		let to_be_patched = new_end - start;
		// Old position + 1 for each new position in the middle, 0 for new nodes.
		let mut new_index_to_old_index = vec![0_usize; to_be_patched];
		let mut patched = 0;
		let mut moved = false;
		let mut max_new_index_so_far = 0;

		for (offset, &old) in c1_middle.iter().enumerate() {
			if patched >= to_be_patched {
				// Every new node is already matched.
				self.unmount(old, scope, true)?;
				continue;
			}

			let new_index = match self.vnode(old)?.key.clone() {
				Some(key) => key_to_new_index.get(&key).copied().filter(|&index| new_index_to_old_index[index - start] == 0),
				None => {
					let mut found = None;
					for index in start..new_end {
						if new_index_to_old_index[index - start] == 0 && self.vnode(old)?.same_type(self.vnode(c2[index])?) {
							found = Some(index);
							break;
						}
					}
					found
				}
			};

			match new_index {
				None => self.unmount(old, scope, true)?,
				Some(new_index) => {
					new_index_to_old_index[new_index - start] = offset + 1;
					if new_index >= max_new_index_so_far {
						max_new_index_so_far = new_index;
					} else {
						moved = true;
					}
					c2[new_index] = self.claim(parent, new_index, old, c2[new_index])?;
					self.patch(Some(old), c2[new_index], container, None, scope)?;
					patched += 1;
				}
			}
		}
		self.key_maps.give_back(key_to_new_index);

		let stable = if moved { longest_increasing_subsequence(&new_index_to_old_index) } else { Vec::new() };
		debug!(to_be_patched, patched, moved, stable = stable.len(), "Matched middle sequence.");

		// Right to left, so that each node's successor is already in place to serve as anchor.
		let mut remaining = stable.len();
		for offset in (0..to_be_patched).rev() {
			let index = start + offset;
			let anchor = match c2.get(index + 1) {
				Some(&next) => Some(self.host_el(next)?),
				None => parent_anchor.cloned(),
			};
			if new_index_to_old_index[offset] == 0 {
				let child = self.prepare_mount(parent, index, c2[index])?;
				c2[index] = child;
				self.patch(None, child, container, anchor.as_ref(), scope)?;
			} else if moved {
				if remaining > 0 && stable[remaining - 1] == offset {
					remaining -= 1;
				} else {
					self.move_node(c2[index], container, anchor.as_ref())?;
				}
			}
		}
		Ok(())
	}
}
