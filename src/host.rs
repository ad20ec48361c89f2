use crate::vnode::PropValue;
use core::fmt::Debug;

/// Primitive mutations of the host tree.
///
/// All operations are assumed to succeed. The renderer does not retry or roll back partial host mutations.
///
/// The provided methods are optional optimizations or extension points.
/// Their default implementations report "unsupported", and the renderer falls back to per-node operations.
pub trait HostOps {
	/// A cheap, cloneable reference to a host node.
	type Node: Clone + PartialEq + Debug;

	/// Inserts (or moves) `node` into `parent` just before `anchor`, or at the end if `anchor` is `None`.
	fn insert(&mut self, node: &Self::Node, parent: &Self::Node, anchor: Option<&Self::Node>);
	/// Detaches `node` from its parent.
	fn remove(&mut self, node: &Self::Node);
	fn create_element(&mut self, tag: &str) -> Self::Node;
	fn create_text(&mut self, text: &str) -> Self::Node;
	fn create_comment(&mut self, text: &str) -> Self::Node;
	/// Replaces the content of a text or comment node.
	fn set_text(&mut self, node: &Self::Node, text: &str);
	/// Replaces all children of an element with a single text run.
	fn set_element_text(&mut self, node: &Self::Node, text: &str);
	fn patch_prop(&mut self, node: &Self::Node, name: &str, previous: Option<&PropValue>, next: Option<&PropValue>);
	fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;
	fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

	fn set_scope_id(&mut self, _node: &Self::Node, _scope_id: &str) {}

	/// Returns a deep copy of `node`, or `None` if cloning is unsupported.
	fn clone_node(&mut self, _node: &Self::Node) -> Option<Self::Node> {
		None
	}

	/// Parses and inserts serialized content before `anchor`, returning the inserted top-level nodes in order.
	///
	/// Returns `None` if unsupported.
	fn insert_static_content(&mut self, _content: &str, _parent: &Self::Node, _anchor: Option<&Self::Node>) -> Option<Vec<Self::Node>> {
		None
	}

	/// Resolves a teleport target.
	fn resolve_target(&self, _selector: &str) -> Option<Self::Node> {
		None
	}
}

/// The host nodes a mounted [`VNode`](`crate::VNode`) owns.
///
/// - Elements, text and comments: `el` only.
/// - Fragments and static blobs: `el` and `anchor` delimit the range.
/// - Components: `el` is their subtree's first host node.
/// - Teleports: `el` and `anchor` are placeholders in the main tree, `target` and `target_anchor` live in the target.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRef<N> {
	pub el: N,
	pub anchor: Option<N>,
	pub target: Option<N>,
	pub target_anchor: Option<N>,
}

impl<N> HostRef<N> {
	pub fn new(el: N) -> Self {
		Self {
			el,
			anchor: None,
			target: None,
			target_anchor: None,
		}
	}

	pub fn range(el: N, anchor: N) -> Self {
		Self {
			el,
			anchor: Some(anchor),
			target: None,
			target_anchor: None,
		}
	}

	/// The last host node of this reference's main-tree range.
	pub fn last(&self) -> &N {
		self.anchor.as_ref().unwrap_or(&self.el)
	}
}
