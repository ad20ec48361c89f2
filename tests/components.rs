use std::{
	cell::{Cell, RefCell},
	convert::Infallible,
	error::Error,
	rc::Rc,
};
use vnode_patch::{ComponentDef, InstanceId, LifecycleHook, LifecycleState, PatchFlags, Props, RenderError, Renderer, RendererOptions, VNodeBuilder, VNodeId, Warning};

use recording_host_::{init_logging, HostId, RecordingHost};

type Log = Rc<RefCell<Vec<String>>>;

fn setup() -> (Renderer<RecordingHost>, HostId) {
	init_logging();
	let mut host = RecordingHost::new();
	let container = host.container();
	(Renderer::with_options(host, RendererOptions::default().dev_checks(true)), container)
}

fn mount(renderer: &mut Renderer<RecordingHost>, container: HostId, def: &Rc<ComponentDef>) -> (VNodeId, InstanceId) {
	let root = renderer.build(|ctx| ctx.create(VNodeBuilder::component(def)));
	renderer.render(Some(root), &container).unwrap();
	let instance = renderer.node(root).unwrap().component().unwrap();
	(root, instance)
}

fn log_hooks(def: ComponentDef, name: &'static str, log: &Log) -> ComponentDef {
	[
		(LifecycleHook::BeforeMount, "before_mount"),
		(LifecycleHook::Mounted, "mounted"),
		(LifecycleHook::BeforeUpdate, "before_update"),
		(LifecycleHook::Updated, "updated"),
		(LifecycleHook::BeforeUnmount, "before_unmount"),
		(LifecycleHook::Unmounted, "unmounted"),
	]
	.into_iter()
	.fold(def, |def, (hook, label)| {
		let log = Rc::clone(log);
		def.on(hook, move |_| log.borrow_mut().push(format!("{} {}", name, label)))
	})
}

/// A parent passing `state` to a child as `value` prop. Both log their renders.
fn parent_and_child(state: &Rc<Cell<i64>>, log: &Log) -> Rc<ComponentDef> {
	let child = {
		let log_ = Rc::clone(log);
		let def = ComponentDef::new("Child", move |ctx, props| {
			log_.borrow_mut().push("child".to_owned());
			let value = props.get("value").map(ToString::to_string).unwrap_or_default();
			Ok(ctx.create(VNodeBuilder::element("span").text_children(value)))
		});
		log_hooks(def, "child", log).into_rc()
	};

	let state = Rc::clone(state);
	let log_ = Rc::clone(log);
	log_hooks(
		ComponentDef::new("Parent", move |ctx, _| {
			log_.borrow_mut().push("parent".to_owned());
			let child = ctx.create(VNodeBuilder::component(&child).prop("value", state.get()));
			Ok(ctx.create(VNodeBuilder::element("div").children(vec![child])))
		}),
		"parent",
		log,
	)
	.into_rc()
}

fn renders(log: &Log) -> Vec<String> {
	log.borrow().iter().filter(|entry| !entry.contains(' ')).cloned().collect()
}

#[test]
fn queued_parent_and_child_render_once_each() {
	let (mut renderer, container) = setup();
	let state = Rc::new(Cell::new(0));
	let log = Log::default();
	let (_, parent) = mount(&mut renderer, container, &parent_and_child(&state, &log));
	let child = renderer.instance(parent).unwrap().children()[0];
	assert_eq!(renders(&log), ["parent", "child"]);
	log.borrow_mut().clear();

	state.set(1);
	assert!(renderer.queue_update(child));
	assert!(renderer.queue_update(parent));
	assert!(!renderer.queue_update(parent));
	renderer.flush().unwrap();

	assert_eq!(renders(&log), ["parent", "child"]);
	assert!(!renderer.is_update_queued(child));
	assert_eq!(renderer.instance(child).unwrap().render_count(), 2);
	assert_eq!(renderer.host().inner_html(container), "<div><span>1</span></div>");
}

#[test]
fn lifecycle_hooks_run_in_order() {
	let (mut renderer, container) = setup();
	let state = Rc::new(Cell::new(0));
	let log = Log::default();
	let (_, parent) = mount(&mut renderer, container, &parent_and_child(&state, &log));
	assert_eq!(
		*log.borrow(),
		["parent before_mount", "parent", "child before_mount", "child", "child mounted", "parent mounted"]
	);

	log.borrow_mut().clear();
	state.set(1);
	renderer.queue_update(parent);
	renderer.flush().unwrap();
	assert_eq!(
		*log.borrow(),
		["parent before_update", "parent", "child before_update", "child", "child updated", "parent updated"]
	);

	log.borrow_mut().clear();
	renderer.render(None, &container).unwrap();
	assert_eq!(
		*log.borrow(),
		["parent before_unmount", "child before_unmount", "child unmounted", "parent unmounted"]
	);
	assert!(renderer.instance(parent).is_none());
	assert_eq!(renderer.host().inner_html(container), "");
}

#[test]
fn unchanged_props_skip_the_child() {
	let (mut renderer, container) = setup();
	let state = Rc::new(Cell::new(7));
	let log = Log::default();
	let (_, parent) = mount(&mut renderer, container, &parent_and_child(&state, &log));
	let child = renderer.instance(parent).unwrap().children()[0];

	renderer.queue_update(parent);
	renderer.flush().unwrap();
	assert_eq!(renderer.instance(parent).unwrap().render_count(), 2);
	assert_eq!(renderer.instance(child).unwrap().render_count(), 1);
	assert_eq!(renderer.instance(child).unwrap().vnode(), renderer.node(renderer.instance(parent).unwrap().subtree().unwrap()).unwrap().children().nodes()[0]);
}

#[test]
fn jobs_run_in_creation_order() {
	let (mut renderer, container) = setup();
	let log = Log::default();
	let shared = Rc::new(Props::new().with("fixed", true));

	let child = {
		let log = Rc::clone(&log);
		ComponentDef::new("Child", move |ctx, _| {
			log.borrow_mut().push("child".to_owned());
			Ok(ctx.create(VNodeBuilder::element("i")))
		})
		.into_rc()
	};
	let parent = {
		let log = Rc::clone(&log);
		ComponentDef::new("Parent", move |ctx, _| {
			log.borrow_mut().push("parent".to_owned());
			let child = ctx.create(VNodeBuilder::component(&child).shared_props(&shared));
			Ok(ctx.create(VNodeBuilder::element("b").children(vec![child])))
		})
		.into_rc()
	};
	let (_, parent) = mount(&mut renderer, container, &parent);
	let child = renderer.instance(parent).unwrap().children()[0];
	log.borrow_mut().clear();

	renderer.queue_update(child);
	renderer.queue_update(parent);
	renderer.flush().unwrap();
	// Identical props, so the child only renders for its own job.
	assert_eq!(*log.borrow(), ["parent", "child"]);
}

#[test]
fn before_hooks_cannot_requeue_their_instance() {
	let (mut renderer, container) = setup();
	let def = ComponentDef::new("Stubborn", |ctx, _| Ok(ctx.create(VNodeBuilder::text("x"))))
		.on(LifecycleHook::BeforeUpdate, |cx| cx.queue_self_update())
		.into_rc();
	let (_, instance) = mount(&mut renderer, container, &def);

	renderer.queue_update(instance);
	renderer.flush().unwrap();
	assert_eq!(renderer.instance(instance).unwrap().render_count(), 2);
	assert!(!renderer.is_update_queued(instance));
}

#[test]
fn mounted_hooks_can_queue_updates() {
	let (mut renderer, container) = setup();
	let def = ComponentDef::new("Eager", |ctx, _| Ok(ctx.create(VNodeBuilder::text("x"))))
		.on(LifecycleHook::Mounted, |cx| cx.queue_self_update())
		.into_rc();
	let (_, instance) = mount(&mut renderer, container, &def);
	assert!(renderer.is_update_queued(instance));

	renderer.flush().unwrap();
	assert_eq!(renderer.instance(instance).unwrap().render_count(), 2);
	assert_eq!(renderer.instance(instance).unwrap().state(), LifecycleState::Mounted);
}

#[test]
fn self_requeueing_is_cut_off() {
	init_logging();
	let mut host = RecordingHost::new();
	let container = host.container();
	let mut renderer = Renderer::with_options(host, RendererOptions::default().dev_checks(true).recursion_limit(5));

	let def = ComponentDef::new("Looping", |ctx, _| Ok(ctx.create(VNodeBuilder::text("x"))))
		.on(LifecycleHook::Updated, |cx| cx.queue_self_update())
		.into_rc();
	let (_, instance) = mount(&mut renderer, container, &def);

	renderer.queue_update(instance);
	renderer.flush().unwrap();
	assert_eq!(renderer.instance(instance).unwrap().render_count(), 6);
	assert_eq!(
		renderer.take_warnings(),
		[Warning::RecursiveUpdates {
			component: "Looping".into(),
			limit: 5
		}]
	);
	assert!(!renderer.is_update_queued(instance));
}

#[test]
fn render_failures_leave_the_tree_alone() {
	let (mut renderer, container) = setup();
	let failing = Rc::new(Cell::new(false));
	let def = {
		let failing = Rc::clone(&failing);
		ComponentDef::new("Flaky", move |ctx, _| {
			if failing.get() {
				Err("no data".into())
			} else {
				Ok(ctx.create(VNodeBuilder::element("p").text_children("ok")))
			}
		})
		.into_rc()
	};
	let (_, instance) = mount(&mut renderer, container, &def);

	failing.set(true);
	renderer.queue_update(instance);
	let error = renderer.flush().unwrap_err();
	assert!(matches!(&error, RenderError::Component { component, .. } if component == "Flaky"));
	assert_eq!(error.source().map(ToString::to_string).as_deref(), Some("no data"));
	assert_eq!(renderer.host().inner_html(container), "<p>ok</p>");
	assert_eq!(renderer.instance(instance).unwrap().state(), LifecycleState::Mounted);

	failing.set(false);
	renderer.queue_update(instance);
	renderer.flush().unwrap();
	assert_eq!(renderer.instance(instance).unwrap().render_count(), 3);
}

#[test]
fn unmounting_cancels_pending_updates() {
	let (mut renderer, container) = setup();
	let def = ComponentDef::new("Gone", |ctx, _| Ok(ctx.create(VNodeBuilder::text("x")))).into_rc();
	let (_, instance) = mount(&mut renderer, container, &def);

	assert!(renderer.queue_update(instance));
	renderer.render(None, &container).unwrap();
	assert!(!renderer.is_update_queued(instance));
	assert!(!renderer.queue_update(instance));
	renderer.flush().unwrap();
	assert_eq!(renderer.host().inner_html(container), "");
}

#[test]
fn scope_ids_mark_elements() {
	let (mut renderer, container) = setup();
	let def = ComponentDef::new("Scoped", |ctx, _| {
		let inner = ctx.create(VNodeBuilder::element("i"));
		Ok(ctx.create(VNodeBuilder::element("p").children(vec![inner])))
	})
	.scope_id("data-v-1")
	.into_rc();
	mount(&mut renderer, container, &def);
	assert_eq!(renderer.host().inner_html(container), "<p data-v-1><i data-v-1></i></p>");
}

#[test]
fn changed_subtree_roots_propagate_to_wrappers() {
	let (mut renderer, container) = setup();
	let wide = Rc::new(Cell::new(false));
	let inner = {
		let wide = Rc::clone(&wide);
		ComponentDef::new("Inner", move |ctx, _| Ok(ctx.create(VNodeBuilder::element(if wide.get() { "section" } else { "p" })))).into_rc()
	};
	let outer = ComponentDef::new("Outer", move |ctx, _| Ok(ctx.create(VNodeBuilder::component(&inner)))).into_rc();
	let (root, outer) = mount(&mut renderer, container, &outer);
	let inner = renderer.instance(outer).unwrap().children()[0];

	wide.set(true);
	renderer.queue_update(inner);
	renderer.flush().unwrap();

	assert_eq!(renderer.host().inner_html(container), "<section></section>");
	let section = renderer.host().children(container)[0];
	assert_eq!(renderer.host_ref(root).unwrap().el, section);
	assert_eq!(renderer.host_ref(renderer.instance(inner).unwrap().vnode()).unwrap().el, section);
}

#[test]
fn render_once_subtrees_are_reused() {
	let (mut renderer, container) = setup();
	let count = Rc::new(Cell::new(0));
	let def = {
		let count = Rc::clone(&count);
		ComponentDef::new("Once", move |ctx, _| {
			count.set(count.get() + 1);
			let n = count.get();
			let frozen = ctx.once(0, |ctx| ctx.create(VNodeBuilder::element("em").text_children(n.to_string())));
			let live = ctx.create(VNodeBuilder::element("b").text_children(n.to_string()));
			Ok(ctx.create(VNodeBuilder::element("p").children(vec![frozen, live])))
		})
		.into_rc()
	};
	let (_, instance) = mount(&mut renderer, container, &def);
	renderer.queue_update(instance);
	renderer.flush().unwrap();
	assert_eq!(renderer.host().inner_html(container), "<p><em>1</em><b>2</b></p>");

	renderer.render(None, &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), "");
}

#[test]
fn components_in_render_once_content_are_unmounted() {
	let (mut renderer, container) = setup();
	let log = Log::default();
	let child = log_hooks(ComponentDef::new("Child", |ctx, _| Ok(ctx.create(VNodeBuilder::element("i")))), "child", &log).into_rc();
	let count = Rc::new(Cell::new(0));
	let def = {
		let count = Rc::clone(&count);
		ComponentDef::new("Parent", move |ctx, _| {
			count.set(count.get() + 1);
			let label = count.get().to_string();
			Ok(ctx.block(|ctx| -> Result<_, Infallible> {
				let frozen = ctx.once(0, |ctx| ctx.create(VNodeBuilder::component(&child)));
				let text = ctx.create(VNodeBuilder::element("b").text_children(label).flags(PatchFlags::TEXT));
				Ok(VNodeBuilder::element("div").children(vec![frozen, text]))
			})?)
		})
		.into_rc()
	};
	let (_, parent) = mount(&mut renderer, container, &def);
	let child = renderer.instance(parent).unwrap().children()[0];

	// The second render takes the cached subtree.
	renderer.queue_update(parent);
	renderer.flush().unwrap();
	assert_eq!(renderer.host().inner_html(container), "<div><i></i><b>2</b></div>");

	log.borrow_mut().clear();
	renderer.render(None, &container).unwrap();
	assert_eq!(*log.borrow(), ["child before_unmount", "child unmounted"]);
	assert!(renderer.instance(child).is_none());
	assert!(renderer.instance(parent).is_none());
	assert_eq!(renderer.host().inner_html(container), "");
}
