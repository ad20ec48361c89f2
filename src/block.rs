//! Block tracking.
//!
//! While a component renders, every node that may change is appended to the nearest open block.
//! Closing the block attaches that flattened list to the block node as its dynamic children,
//! so that updates can walk them pairwise instead of diffing the static structure around them.

use crate::{
	flags::{PatchFlags, StaticHint},
	vnode::{NodeKind, VNode, VNodeBuilder, VNodeId},
};
use slotmap::SlotMap;
use tracing::trace;

/// The explicit render context of one render pass.
///
/// It borrows the node arena and the cache of the component being rendered.
/// Block collectors and the tracking counter only live as long as the context.
pub struct RenderContext<'a> {
	nodes: &'a mut SlotMap<VNodeId, VNode>,
	cache: &'a mut Vec<Option<VNodeId>>,
	blocks: Vec<Collector>,
	tracking: i32,
}

/// One open block.
#[derive(Debug, Default)]
struct Collector {
	/// `None` if the block was opened with tracking disabled.
	tracked: Option<Vec<VNodeId>>,
	/// Set when content that bypasses tracking was created while this block was innermost.
	has_untracked: bool,
}

impl<'a> RenderContext<'a> {
	pub(crate) fn new(nodes: &'a mut SlotMap<VNodeId, VNode>, cache: &'a mut Vec<Option<VNodeId>>) -> Self {
		Self {
			nodes,
			cache,
			blocks: Vec::new(),
			tracking: 1,
		}
	}

	/// Creates a node and registers it with the nearest open block if it may change.
	pub fn create(&mut self, builder: VNodeBuilder) -> VNodeId {
		let vnode = builder.into_vnode(None);
		let tracked = match vnode.hint {
			StaticHint::Dynamic(flags) => (!flags.is_empty() || vnode.kind() == NodeKind::Component) && flags != PatchFlags::NEED_HYDRATION,
			StaticHint::Hoisted => false,
			StaticHint::Bail => vnode.kind() == NodeKind::Component,
		};
		let id = self.nodes.insert(vnode);
		if tracked {
			self.track(id);
		}
		id
	}

	/// Opens a collector. Pass `disable_tracking` for subtrees whose nodes must not reach the enclosing block
	/// (for example, list items that the list fragment diffs itself).
	///
	/// Prefer [`RenderContext::block`], which can't leave a collector open.
	pub fn open_block(&mut self, disable_tracking: bool) {
		self.blocks.push(Collector {
			tracked: (!disable_tracking).then(Vec::new),
			has_untracked: disable_tracking,
		});
	}

	/// Closes the innermost collector and creates its block node.
	///
	/// The block node itself is registered with the enclosing block, since its structure may change between renders.
	/// Blocks closed while tracking is suspended get no dynamic children and are diffed in full.
	pub fn close_block(&mut self, builder: VNodeBuilder) -> VNodeId {
		let collector = self.blocks.pop().unwrap_or_default();
		let dynamic_children = (self.tracking > 0).then(|| collector.tracked.unwrap_or_default());
		let mut vnode = builder.into_vnode(dynamic_children);
		vnode.has_untracked = vnode.is_block && collector.has_untracked;
		let id = self.nodes.insert(vnode);
		self.track(id);
		id
	}

	/// Runs `content` inside a fresh block and turns its result into the block node.
	///
	/// The collector is popped on every exit path.
	pub fn block<E>(&mut self, content: impl FnOnce(&mut Self) -> Result<VNodeBuilder, E>) -> Result<VNodeId, E> {
		self.open_block(false);
		match content(self) {
			Ok(builder) => Ok(self.close_block(builder)),
			Err(error) => {
				self.blocks.pop();
				Err(error)
			}
		}
	}

	/// Runs `content` with tracking disabled.
	///
	/// Used for render-once subtrees and for slot content, which belongs to the block of the component that renders it.
	pub fn untracked<R>(&mut self, content: impl FnOnce(&mut Self) -> R) -> R {
		self.mark_untracked();
		self.tracking -= 1;
		let result = content(self);
		self.tracking += 1;
		result
	}

	/// Returns the hoisted node cached in `slot`, creating it on first use.
	///
	/// Hoisted nodes are never tracked or diffed, and they survive re-renders of the owning component.
	pub fn hoisted(&mut self, slot: usize, create: impl FnOnce(&mut Self) -> VNodeBuilder) -> VNodeId {
		if let Some(id) = self.cached(slot) {
			return id;
		}
		let builder = create(self).hint(StaticHint::Hoisted);
		let id = self.nodes.insert(builder.into_vnode(None));
		self.retain(slot, id);
		id
	}

	/// Renders `content` exactly once. Later renders return the same subtree, which is then skipped entirely.
	pub fn once(&mut self, slot: usize, content: impl FnOnce(&mut Self) -> VNodeId) -> VNodeId {
		if let Some(id) = self.cached(slot) {
			self.mark_untracked();
			return id;
		}
		let id = self.untracked(content);
		self.retain(slot, id);
		id
	}

	/// Read access to nodes created so far.
	#[must_use]
	pub fn node(&self, id: VNodeId) -> Option<&VNode> {
		self.nodes.get(id)
	}

	fn track(&mut self, id: VNodeId) {
		if self.tracking <= 0 {
			return;
		}
		if let Some(Collector { tracked: Some(block), .. }) = self.blocks.last_mut() {
			block.push(id);
		}
	}

	fn mark_untracked(&mut self) {
		if let Some(collector) = self.blocks.last_mut() {
			collector.has_untracked = true;
		}
	}

	fn cached(&self, slot: usize) -> Option<VNodeId> {
		self.cache.get(slot).copied().flatten().filter(|id| self.nodes.contains_key(*id))
	}

	fn retain(&mut self, slot: usize, id: VNodeId) {
		if let Some(vnode) = self.nodes.get_mut(id) {
			vnode.retained = true;
		}
		if self.cache.len() <= slot {
			self.cache.resize(slot + 1, None);
		}
		self.cache[slot] = Some(id);
		trace!(slot, ?id, "Cached render output.");
	}
}
