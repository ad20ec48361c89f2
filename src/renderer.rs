use crate::{
	block::RenderContext,
	component::{should_update_component, ComponentInstance, InstanceId, LifecycleHook, LifecycleState},
	error::{RenderError, Warning},
	host::{HostOps, HostRef},
	key_maps::KeyIndexMaps,
	patch::Scope,
	scheduler::{Callback, HookContext, Job, JobQueue},
	template_cache::TemplateCache,
	vnode::{NodeType, VNode, VNodeId},
};
use slotmap::{SecondaryMap, SlotMap};
use std::{borrow::Cow, rc::Rc};
use tracing::{debug, info, instrument, trace, trace_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererOptions {
	/// Collect [`Warning`]s for [`Renderer::take_warnings`]. They are logged either way.
	pub dev_checks: bool,
	/// How often one job may run within a single flush before it is dropped.
	pub recursion_limit: u32,
	/// How deep patch recursion may go.
	pub depth_limit: usize,
}

impl Default for RendererOptions {
	fn default() -> Self {
		Self {
			dev_checks: cfg!(debug_assertions),
			recursion_limit: 100,
			depth_limit: 512,
		}
	}
}

impl RendererOptions {
	#[must_use]
	pub fn dev_checks(self, dev_checks: bool) -> Self {
		Self { dev_checks, ..self }
	}

	#[must_use]
	pub fn recursion_limit(self, recursion_limit: u32) -> Self {
		Self { recursion_limit, ..self }
	}

	#[must_use]
	pub fn depth_limit(self, depth_limit: usize) -> Self {
		Self { depth_limit, ..self }
	}
}

/// Keeps one or more host containers in sync with virtual trees.
///
/// # Correct Use
///
/// Nodes are created through [`Renderer::build`] (for root trees) or a component's render callback,
/// and each non-retained node may appear in only one rendered tree.
/// Records of a tree are freed once it has been replaced, so ids of replaced trees must not be rendered again.
///
/// Component updates requested through [`Renderer::queue_update`] are batched until [`Renderer::flush`].
pub struct Renderer<H: HostOps> {
	pub(crate) host: H,
	pub(crate) nodes: SlotMap<VNodeId, VNode>,
	pub(crate) refs: SecondaryMap<VNodeId, HostRef<H::Node>>,
	pub(crate) instances: SlotMap<InstanceId, ComponentInstance>,
	pub(crate) scheduler: JobQueue,
	pub(crate) templates: TemplateCache<Rc<str>, Vec<H::Node>>,
	pub(crate) key_maps: KeyIndexMaps,
	pub(crate) options: RendererOptions,
	warnings: Vec<Warning>,
	roots: Vec<(H::Node, VNodeId)>,
	root_cache: Vec<Option<VNodeId>>,
	next_uid: u64,
}

impl<H: HostOps> Renderer<H> {
	pub fn new(host: H) -> Self {
		Self::with_options(host, RendererOptions::default())
	}

	pub fn with_options(host: H, options: RendererOptions) -> Self {
		Self {
			host,
			nodes: SlotMap::with_key(),
			refs: SecondaryMap::new(),
			instances: SlotMap::with_key(),
			scheduler: JobQueue::default(),
			templates: TemplateCache::default(),
			key_maps: KeyIndexMaps::default(),
			options,
			warnings: Vec::new(),
			roots: Vec::new(),
			root_cache: Vec::new(),
			next_uid: 0,
		}
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	pub fn options(&self) -> &RendererOptions {
		&self.options
	}

	/// Creates root-level nodes. Hoisted and render-once slots used here belong to the renderer itself.
	pub fn build<R>(&mut self, content: impl FnOnce(&mut RenderContext<'_>) -> R) -> R {
		let mut ctx = RenderContext::new(&mut self.nodes, &mut self.root_cache);
		content(&mut ctx)
	}

	#[must_use]
	pub fn node(&self, id: VNodeId) -> Option<&VNode> {
		self.nodes.get(id)
	}

	/// The host nodes currently owned by `id`, if it is mounted.
	#[must_use]
	pub fn host_ref(&self, id: VNodeId) -> Option<&HostRef<H::Node>> {
		self.refs.get(id)
	}

	#[must_use]
	pub fn instance(&self, id: InstanceId) -> Option<&ComponentInstance> {
		self.instances.get(id)
	}

	/// The tree last rendered into `container`.
	#[must_use]
	pub fn root(&self, container: &H::Node) -> Option<VNodeId> {
		self.roots.iter().find(|(c, _)| c == container).map(|&(_, root)| root)
	}

	pub fn take_warnings(&mut self) -> Vec<Warning> {
		std::mem::take(&mut self.warnings)
	}

	/// Patches `container` to show `vnode`, or clears it if `vnode` is `None`.
	///
	/// Post-flush callbacks queued by the patch (for example `mounted` hooks) run before this returns.
	/// Queued component updates do not; see [`Renderer::flush`].
	#[instrument(skip_all, fields(?vnode))]
	pub fn render(&mut self, vnode: Option<VNodeId>, container: &H::Node) -> Result<(), RenderError> {
		let index = self.roots.iter().position(|(c, _)| c == container);
		let previous = index.map(|i| self.roots[i].1);
		let scope = Scope::root(self.options.depth_limit);

		match (vnode, index) {
			(None, None) => trace!("Nothing rendered into this container."),
			(None, Some(index)) => {
				let (_, previous) = self.roots.remove(index);
				self.unmount(previous, scope, true)?;
				self.free_tree(previous);
			}
			(Some(vnode), _) => {
				self.patch(previous, vnode, container, None, scope)?;
				match index {
					Some(index) => self.roots[index].1 = vnode,
					None => self.roots.push((container.clone(), vnode)),
				}
				if let Some(previous) = previous.filter(|&previous| previous != vnode) {
					self.free_tree(previous);
				}
			}
		}

		self.flush_pre_flush_callbacks();
		self.flush_post_flush_callbacks();
		self.end_of_pass();
		Ok(())
	}

	/// The reactivity callback: something `instance` rendered from has changed.
	///
	/// Enqueues the instance's update job. Returns `false` if the request was ignored
	/// (already queued, unknown or unmounting instance, or a re-entrant request from a before-hook).
	pub fn queue_update(&mut self, instance: InstanceId) -> bool {
		let Some(target) = self.instances.get(instance) else {
			trace!(?instance, "Ignoring update request for a dead instance.");
			return false;
		};
		match target.state {
			LifecycleState::Unmounting | LifecycleState::Unmounted => {
				trace!(?instance, "Ignoring update request for an unmounting instance.");
				false
			}
			LifecycleState::Mounting | LifecycleState::Updating if !target.allow_recurse => {
				trace!(?instance, "Ignoring re-entrant update request.");
				false
			}
			_ => self.scheduler.queue_job(Job { id: target.uid, instance }),
		}
	}

	/// Whether `instance` has an update pending.
	#[must_use]
	pub fn is_update_queued(&self, instance: InstanceId) -> bool {
		self.instances.get(instance).map_or(false, |target| self.scheduler.is_queued(target.uid))
	}

	pub fn queue_pre_flush(&mut self, callback: impl 'static + FnOnce(&mut HookContext)) {
		self.scheduler.queue_pre_flush(Callback { instance: None, run: Box::new(callback) });
	}

	pub fn queue_post_flush(&mut self, callback: impl 'static + FnOnce(&mut HookContext)) {
		self.scheduler.queue_post_flush(Callback { instance: None, run: Box::new(callback) });
	}

	/// Runs queued work until nothing is left: pre-flush callbacks, update jobs by ascending id, then post-flush callbacks.
	///
	/// A render failure stops the flush and is returned. Jobs that didn't run yet stay queued.
	#[instrument(skip_all)]
	pub fn flush(&mut self) -> Result<(), RenderError> {
		let result = self.flush_jobs();
		self.scheduler.reset_run_counts();
		self.end_of_pass();
		result
	}

	fn flush_jobs(&mut self) -> Result<(), RenderError> {
		while !self.scheduler.is_idle() {
			self.flush_pre_flush_callbacks();
			while let Some((job, runs)) = self.scheduler.start_next() {
				if runs > self.options.recursion_limit {
					let component = self.instances.get(job.instance).map_or(Cow::Borrowed("<unmounted>"), |instance| Cow::Owned(instance.def.name().to_owned()));
					self.warn(Warning::RecursiveUpdates {
						component,
						limit: self.options.recursion_limit,
					});
					continue;
				}
				self.run_job(job)?;
			}
			self.flush_post_flush_callbacks();
		}
		Ok(())
	}

	fn run_job(&mut self, job: Job) -> Result<(), RenderError> {
		let span = trace_span!("Running job", id = job.id);
		let _enter = span.enter();
		match self.instances.get(job.instance) {
			Some(instance) if instance.uid == job.id && instance.state == LifecycleState::Mounted => {
				self.update_instance(job.instance, self.options.depth_limit)
			}
			_ => {
				trace!("Job owner is gone or not mounted. Skipping.");
				Ok(())
			}
		}
	}

	fn flush_pre_flush_callbacks(&mut self) {
		loop {
			let callbacks = self.scheduler.take_pre_flush();
			if callbacks.is_empty() {
				break;
			}
			self.run_callbacks(callbacks);
		}
	}

	fn flush_post_flush_callbacks(&mut self) {
		loop {
			let callbacks = self.scheduler.take_post_flush();
			if callbacks.is_empty() {
				break;
			}
			self.run_callbacks(callbacks);
		}
	}

	fn run_callbacks(&mut self, callbacks: Vec<Callback>) {
		for Callback { instance, run } in callbacks {
			let mut cx = HookContext::new(instance);
			run(&mut cx);
			for requested in cx.into_requested() {
				self.queue_update(requested);
			}
		}
	}

	fn end_of_pass(&mut self) {
		let swept = self.templates.sweep();
		trace!("Freed {} static template(s).", swept);
		info!("Static template count/cached capacity: {}/{}", self.templates.len(), self.templates.capacity());
		info!("Keyed diff heap capacity: {}", self.key_maps.capacity());
	}

	pub(crate) fn warn(&mut self, warning: Warning) {
		warn!(?warning, "Malformed input encountered. Continuing.");
		if self.options.dev_checks {
			self.warnings.push(warning);
		}
	}

	pub(crate) fn vnode(&self, id: VNodeId) -> Result<&VNode, RenderError> {
		self.nodes.get(id).ok_or(RenderError::DanglingNode(id))
	}

	pub(crate) fn vnode_mut(&mut self, id: VNodeId) -> Result<&mut VNode, RenderError> {
		self.nodes.get_mut(id).ok_or(RenderError::DanglingNode(id))
	}

	pub(crate) fn instance_mut(&mut self, id: InstanceId) -> Result<&mut ComponentInstance, RenderError> {
		self.instances.get_mut(id).ok_or(RenderError::DanglingInstance(id))
	}

	/// Runs synchronous lifecycle hooks. The instance can't queue itself while they run.
	pub(crate) fn call_hooks(&mut self, id: InstanceId, hook: LifecycleHook) {
		debug_assert!(!hook.is_post_flush());
		let Some(instance) = self.instances.get_mut(id) else { return };
		let hooks = instance.def.hooks(hook).to_vec();
		if hooks.is_empty() {
			return;
		}
		let allow_recurse = std::mem::replace(&mut instance.allow_recurse, false);

		let span = trace_span!("Calling hooks", ?hook, count = hooks.len());
		let _enter = span.enter();
		let mut cx = HookContext::new(Some(id));
		for hook in &hooks {
			hook(&mut cx);
		}
		for requested in cx.into_requested() {
			self.queue_update(requested);
		}

		if let Some(instance) = self.instances.get_mut(id) {
			instance.allow_recurse = allow_recurse;
		}
	}

	pub(crate) fn queue_hooks(&mut self, id: InstanceId, hook: LifecycleHook) {
		debug_assert!(hook.is_post_flush());
		let Some(instance) = self.instances.get(id) else { return };
		for hook in instance.def.hooks(hook) {
			let hook = Rc::clone(hook);
			self.scheduler.queue_post_flush(Callback {
				instance: Some(id),
				run: Box::new(move |cx| hook(cx)),
			});
		}
	}

	fn render_instance(&mut self, id: InstanceId) -> Result<VNodeId, RenderError> {
		let instance = self.instances.get_mut(id).ok_or(RenderError::DanglingInstance(id))?;
		instance.render_count += 1;
		let def = Rc::clone(&instance.def);
		let props = self.nodes.get(instance.vnode).and_then(|vnode| vnode.props.clone()).unwrap_or_default();

		let span = trace_span!("Rendering component", name = def.name(), uid = instance.uid);
		let _enter = span.enter();
		let render = def.render_fn();
		let mut ctx = RenderContext::new(&mut self.nodes, &mut instance.cache);
		let subtree = render(&mut ctx, &props).map_err(|source| RenderError::Component {
			component: Cow::Owned(def.name().to_owned()),
			source,
		})?;
		if self.nodes.contains_key(subtree) {
			Ok(subtree)
		} else {
			Err(RenderError::DanglingNode(subtree))
		}
	}

	/// Creates an instance for the component node `vnode` and mounts its first render.
	pub(crate) fn mount_component(&mut self, vnode: VNodeId, container: &H::Node, anchor: Option<&H::Node>, scope: Scope) -> Result<(), RenderError> {
		let def = match &self.vnode(vnode)?.node_type {
			NodeType::Component(def) => Rc::clone(def),
			other => {
				debug!(?other, "Tried to mount a non-component as component.");
				return Err(RenderError::DanglingNode(vnode));
			}
		};

		let uid = self.next_uid;
		self.next_uid += 1;
		let id = self.instances.insert(ComponentInstance::new(uid, Rc::clone(&def), vnode, scope.parent));
		if let Some(parent) = scope.parent.and_then(|parent| self.instances.get_mut(parent)) {
			parent.children.push(id);
		}
		self.vnode_mut(vnode)?.component = Some(id);

		let span = trace_span!("Mounting component", name = def.name(), uid);
		let _enter = span.enter();

		self.call_hooks(id, LifecycleHook::BeforeMount);
		let subtree = self.render_instance(id)?;
		self.instance_mut(id)?.subtree = Some(subtree);
		self.patch(None, subtree, container, anchor, scope.within(id))?;

		let el = self.host_el(subtree)?;
		self.refs.insert(vnode, HostRef::new(el));
		self.instance_mut(id)?.state = LifecycleState::Mounted;
		self.queue_hooks(id, LifecycleHook::Mounted);
		Ok(())
	}

	/// A parent re-render supplied `n2` for the component mounted as `n1`.
	pub(crate) fn update_component(&mut self, n1: VNodeId, n2: VNodeId, scope: Scope) -> Result<(), RenderError> {
		let id = self.vnode(n1)?.component.ok_or(RenderError::Unmounted(n1))?;
		self.vnode_mut(n2)?.component = Some(id);

		if should_update_component(self.vnode(n1)?, self.vnode(n2)?, scope.optimized) {
			let instance = self.instance_mut(id)?;
			instance.next = Some(n2);
			let uid = instance.uid;
			// A pending job for the same instance is folded into this update.
			self.scheduler.invalidate(uid);
			self.update_instance(id, scope.depth)
		} else {
			trace!("Component props unchanged. Skipping re-render.");
			if let Some(host_ref) = self.refs.get(n1).cloned() {
				self.refs.insert(n2, host_ref);
			}
			self.instance_mut(id)?.vnode = n2;
			Ok(())
		}
	}

	/// Re-renders a mounted instance and patches its subtree.
	pub(crate) fn update_instance(&mut self, id: InstanceId, depth: usize) -> Result<(), RenderError> {
		let instance = self.instance_mut(id)?;
		if instance.state != LifecycleState::Mounted {
			trace!(state = ?instance.state, "Instance can't update right now.");
			return Ok(());
		}
		let current = instance.vnode;
		let vnode = match instance.next.take() {
			Some(next) => {
				instance.vnode = next;
				if let Some(host_ref) = self.refs.get(current).cloned() {
					self.refs.insert(next, host_ref);
				}
				self.flush_pre_flush_callbacks();
				next
			}
			None => current,
		};

		self.instance_mut(id)?.state = LifecycleState::Updating;
		self.call_hooks(id, LifecycleHook::BeforeUpdate);
		let result = self.rerender(id, vnode, depth);
		if let Some(instance) = self.instances.get_mut(id) {
			if instance.state == LifecycleState::Updating {
				instance.state = LifecycleState::Mounted;
			}
		}
		result?;
		self.queue_hooks(id, LifecycleHook::Updated);
		Ok(())
	}

	fn rerender(&mut self, id: InstanceId, vnode: VNodeId, depth: usize) -> Result<(), RenderError> {
		let span = trace_span!("Updating component", ?id);
		let _enter = span.enter();

		let next_tree = self.render_instance(id)?;
		let instance = self.instance_mut(id)?;
		let previous_tree = instance.subtree.replace(next_tree).ok_or(RenderError::DanglingInstance(id))?;
		if previous_tree == next_tree {
			trace!("Render returned the previous subtree.");
			return Ok(());
		}

		// The subtree may have been moved since it was mounted, so its current host parent is used.
		let container = self.host.parent_node(&self.host_el(previous_tree)?).ok_or(RenderError::Unmounted(previous_tree))?;
		let anchor = self.next_host_node(previous_tree)?;
		let scope = Scope {
			parent: Some(id),
			optimized: false,
			depth,
		};
		self.patch(Some(previous_tree), next_tree, &container, anchor.as_ref(), scope)?;

		let el = self.host_el(next_tree)?;
		self.refs.insert(vnode, HostRef::new(el.clone()));
		self.update_hoc_host_el(id, &el);
		self.free_tree(previous_tree);
		Ok(())
	}

	/// Propagates a changed subtree root to ancestors whose own subtree root is this component.
	fn update_hoc_host_el(&mut self, id: InstanceId, el: &H::Node) {
		let mut current = id;
		while let Some(instance) = self.instances.get(current) {
			let Some(parent) = instance.parent else { break };
			let vnode = instance.vnode;
			let Some(parent_instance) = self.instances.get(parent) else { break };
			if parent_instance.subtree != Some(vnode) {
				break;
			}
			let parent_vnode = parent_instance.vnode;
			self.refs.insert(parent_vnode, HostRef::new(el.clone()));
			current = parent;
		}
	}
}
