use crate::{
	component::{BoxError, InstanceId},
	vnode::{Key, VNodeId},
};
use std::borrow::Cow;
use thiserror::Error;

/// An unrecoverable failure of a patch pass. The host tree may be partially patched.
#[derive(Debug, Error)]
pub enum RenderError {
	/// A component's render callback failed. The component is left in its previous lifecycle state.
	#[error("component `{component}` failed to render")]
	Component {
		component: Cow<'static, str>,
		#[source]
		source: BoxError,
	},
	#[error("virtual node {0:?} is not alive")]
	DanglingNode(VNodeId),
	#[error("component instance {0:?} is not alive")]
	DanglingInstance(InstanceId),
	#[error("virtual node {0:?} has no host nodes")]
	Unmounted(VNodeId),
	#[error("patch depth limit of {0} reached")]
	DepthLimit(usize),
}

/// A recoverable problem with the input. The patch pass continues, possibly with a suboptimal result.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
	/// A key occurs more than once among the new children of one list.
	DuplicateKey(Key),
	/// The dynamic children of a block differ in length between renders. The block was diffed in full instead.
	BlockShapeMismatch { old: usize, new: usize },
	/// The host sibling chain of a fragment or static range ended before its end anchor.
	FragmentAnchorMismatch(VNodeId),
	/// A job kept re-queueing itself within one flush and was dropped.
	RecursiveUpdates { component: Cow<'static, str>, limit: u32 },
	/// A teleport target could not be resolved. Its children were mounted in place.
	InvalidTeleportTarget(String),
	/// The host supports neither static content insertion nor does the node provide fallback children.
	StaticContentUnsupported(VNodeId),
}
