use std::{cell::Cell, rc::Rc};
use vnode_patch::{ComponentDef, Key, PatchFlags, Renderer, RendererOptions, VNodeBuilder, VNodeId, Warning};

use recording_host_::{init_logging, HostId, RecordingHost};

fn setup() -> (Renderer<RecordingHost>, HostId) {
	init_logging();
	let mut host = RecordingHost::new();
	let container = host.container();
	(Renderer::with_options(host, RendererOptions::default().dev_checks(true)), container)
}

fn list(renderer: &mut Renderer<RecordingHost>, keys: &[&str]) -> VNodeId {
	renderer.build(|ctx| {
		let items = keys.iter().map(|&key| ctx.create(VNodeBuilder::element("li").key(key).text_children(key))).collect();
		ctx.create(VNodeBuilder::element("ul").children(items))
	})
}

fn expected_html(keys: &[&str]) -> String {
	let items: String = keys.iter().map(|key| format!("<li>{}</li>", key)).collect();
	format!("<ul>{}</ul>", items)
}

/// Renders `from`, then `to`, and returns the host renderer with only the second pass's ops logged.
fn transition(from: &[&str], to: &[&str]) -> (Renderer<RecordingHost>, HostId) {
	let (mut renderer, container) = setup();
	let old = list(&mut renderer, from);
	renderer.render(Some(old), &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), expected_html(from));

	renderer.host_mut().clear_ops();
	let new = list(&mut renderer, to);
	renderer.render(Some(new), &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), expected_html(to));
	(renderer, container)
}

#[test]
fn swap_in_the_middle_moves_once() {
	let (renderer, _) = transition(&["a", "b", "c", "d"], &["a", "c", "b", "d"]);
	let host = renderer.host();
	assert_eq!(host.moves(), 1);
	assert_eq!(host.created_elements(), 0);
	assert_eq!(host.removals(), 0);
}

#[test]
fn shrinking_reversal_unmounts_and_moves() {
	let (renderer, _) = transition(&["a", "b", "c", "d"], &["d", "c", "b"]);
	let host = renderer.host();
	assert_eq!(host.removals(), 1);
	assert_eq!(host.moves(), 2);
	assert_eq!(host.created_elements(), 0);
}

#[test]
fn insertion_mounts_once() {
	let (renderer, _) = transition(&["a", "b", "c"], &["a", "x", "b", "c"]);
	let host = renderer.host();
	assert_eq!(host.created_elements(), 1);
	assert_eq!(host.moves(), 0);
	assert_eq!(host.removals(), 0);
}

#[test]
fn reversal_moves_twice() {
	let (renderer, _) = transition(&["a", "b", "c"], &["c", "b", "a"]);
	assert_eq!(renderer.host().moves(), 2);
	assert_eq!(renderer.host().created_elements(), 0);
}

#[test]
fn removal_and_replacement() {
	let (renderer, _) = transition(&["a", "b", "c", "d", "e"], &["a", "f", "d", "b"]);
	let host = renderer.host();
	// `c` and `e` go, `f` is new, and only one of `b` and `d` has to move.
	assert_eq!(host.removals(), 2);
	assert_eq!(host.created_elements(), 1);
	assert_eq!(host.moves(), 1);
}

#[test]
fn pure_prefix_and_suffix_changes() {
	let (renderer, _) = transition(&["b", "c"], &["a", "b", "c", "d"]);
	assert_eq!(renderer.host().created_elements(), 2);
	assert_eq!(renderer.host().moves(), 0);

	let (renderer, _) = transition(&["a", "b", "c", "d"], &["b", "c"]);
	assert_eq!(renderer.host().removals(), 2);
	assert_eq!(renderer.host().moves(), 0);
}

fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
	if items.len() <= 1 {
		return vec![items.to_vec()];
	}
	let mut result = Vec::new();
	for (index, &first) in items.iter().enumerate() {
		let mut rest = items.to_vec();
		rest.remove(index);
		for mut tail in permutations(&rest) {
			tail.insert(0, first);
			result.push(tail);
		}
	}
	result
}

fn lis_length(values: &[usize]) -> usize {
	let mut best = vec![1; values.len()];
	for i in 0..values.len() {
		for j in 0..i {
			if values[j] < values[i] {
				best[i] = best[i].max(best[j] + 1);
			}
		}
	}
	best.into_iter().max().unwrap_or(0)
}

#[test]
fn every_permutation_moves_the_minimum() {
	const KEYS: [&str; 5] = ["a", "b", "c", "d", "e"];
	for permutation in permutations(&[0, 1, 2, 3, 4]) {
		let to: Vec<&str> = permutation.iter().map(|&i| KEYS[i]).collect();
		let (renderer, _) = transition(&KEYS, &to);
		assert_eq!(renderer.host().moves(), KEYS.len() - lis_length(&permutation), "{:?}", to);
		assert_eq!(renderer.host().created_elements(), 0, "{:?}", to);
		assert_eq!(renderer.host().removals(), 0, "{:?}", to);
	}
}

#[test]
fn host_nodes_follow_their_keys() {
	let (mut renderer, container) = setup();
	let old = list(&mut renderer, &["a", "b", "c"]);
	renderer.render(Some(old), &container).unwrap();
	let ul = renderer.host().children(container)[0];
	let before = renderer.host().children(ul).to_vec();

	let new = list(&mut renderer, &["c", "a", "b"]);
	renderer.render(Some(new), &container).unwrap();
	let after = renderer.host().children(ul).to_vec();
	assert_eq!(after, [before[2], before[0], before[1]]);

	let items = renderer.node(new).unwrap().children().nodes().to_vec();
	for (item, el) in items.into_iter().zip(after) {
		assert_eq!(renderer.host_ref(item).unwrap().el, el);
	}
}

#[test]
fn round_trip_restores_the_tree() {
	let (mut renderer, container) = setup();
	for keys in [&["a", "b", "c", "d"][..], &["d", "x", "a"], &["a", "b", "c", "d"]] {
		let tree = list(&mut renderer, keys);
		renderer.render(Some(tree), &container).unwrap();
		assert_eq!(renderer.host().inner_html(container), expected_html(keys));
	}
}

#[test]
fn rerendering_the_same_tree_is_a_no_op() {
	let (mut renderer, container) = setup();
	let tree = list(&mut renderer, &["a", "b"]);
	renderer.render(Some(tree), &container).unwrap();
	renderer.host_mut().clear_ops();
	renderer.render(Some(tree), &container).unwrap();
	assert!(renderer.host().ops.is_empty());

	let equal = list(&mut renderer, &["a", "b"]);
	renderer.render(Some(equal), &container).unwrap();
	assert!(renderer.host().ops.is_empty(), "{:?}", renderer.host().ops);
}

#[test]
fn duplicate_keys_are_reported() {
	let (mut renderer, container) = setup();
	let old = list(&mut renderer, &["a", "b", "c"]);
	renderer.render(Some(old), &container).unwrap();
	let new = list(&mut renderer, &["c", "a", "a"]);
	renderer.render(Some(new), &container).unwrap();

	assert_eq!(renderer.take_warnings(), [Warning::DuplicateKey(Key::from("a"))]);
	assert_eq!(renderer.host().inner_html(container), expected_html(&["c", "a", "a"]));
}

#[test]
fn duplicate_keys_are_reported_when_appended() {
	let (mut renderer, container) = setup();
	let old = list(&mut renderer, &["a"]);
	renderer.render(Some(old), &container).unwrap();
	let new = list(&mut renderer, &["a", "b", "b"]);
	renderer.render(Some(new), &container).unwrap();

	assert_eq!(renderer.take_warnings(), [Warning::DuplicateKey(Key::from("b"))]);
	assert_eq!(renderer.host().inner_html(container), expected_html(&["a", "b", "b"]));

	let replaced = list(&mut renderer, &["x", "y"]);
	renderer.render(Some(replaced), &container).unwrap();
	assert!(renderer.take_warnings().is_empty());
	assert_eq!(renderer.host().inner_html(container), expected_html(&["x", "y"]));
}

#[test]
fn duplicate_keys_are_reported_on_first_mount() {
	let (mut renderer, container) = setup();
	let tree = list(&mut renderer, &["q", "q", "q"]);
	renderer.render(Some(tree), &container).unwrap();
	assert_eq!(renderer.take_warnings(), [Warning::DuplicateKey(Key::from("q"))]);
	assert_eq!(renderer.host().inner_html(container), expected_html(&["q", "q", "q"]));
}

#[test]
fn keyed_components_move_with_their_subtrees() {
	let (mut renderer, container) = setup();
	let renders = Rc::new(Cell::new(0));
	let item = {
		let renders = Rc::clone(&renders);
		ComponentDef::new("Item", move |ctx, props| {
			renders.set(renders.get() + 1);
			let name = props.get("name").map(ToString::to_string).unwrap_or_default();
			let first = ctx.create(VNodeBuilder::text(format!("{}1", name)));
			let second = ctx.create(VNodeBuilder::text(format!("{}2", name)));
			Ok(ctx.create(VNodeBuilder::fragment(vec![first, second])))
		})
		.into_rc()
	};
	let tree = |renderer: &mut Renderer<RecordingHost>, names: &[&'static str]| {
		renderer.build(|ctx| {
			let items = names.iter().map(|&name| ctx.create(VNodeBuilder::component(&item).key(name).prop("name", name))).collect();
			ctx.create(VNodeBuilder::element("ul").children(items))
		})
	};

	let old = tree(&mut renderer, &["a", "b", "c"]);
	renderer.render(Some(old), &container).unwrap();
	let new = tree(&mut renderer, &["c", "a", "b"]);
	renderer.render(Some(new), &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), "<ul>c1c2a1a2b1b2</ul>");

	// `d` is inserted before the component `b`.
	let newer = tree(&mut renderer, &["c", "a", "d", "b"]);
	renderer.render(Some(newer), &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), "<ul>c1c2a1a2d1d2b1b2</ul>");
	assert_eq!(renders.get(), 4);

	renderer.render(None, &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), "");
}

#[test]
fn keyed_fragment_diffs_its_children() {
	let (mut renderer, container) = setup();
	let fragment = |renderer: &mut Renderer<RecordingHost>, keys: &[i64]| {
		renderer.build(|ctx| {
			let items = keys.iter().map(|&key| ctx.create(VNodeBuilder::text(key.to_string()).key(key))).collect();
			ctx.create(VNodeBuilder::fragment(items).flags(PatchFlags::KEYED_FRAGMENT))
		})
	};

	let old = fragment(&mut renderer, &[1, 2, 3]);
	renderer.render(Some(old), &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), "123");

	renderer.host_mut().clear_ops();
	let new = fragment(&mut renderer, &[3, 1, 2, 4]);
	renderer.render(Some(new), &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), "3124");
	assert_eq!(renderer.host().moves(), 1);
}

#[test]
fn unkeyed_fragment_pairs_by_index() {
	let (mut renderer, container) = setup();
	let fragment = |renderer: &mut Renderer<RecordingHost>, texts: &[&str]| {
		renderer.build(|ctx| {
			let items = texts.iter().map(|&text| ctx.create(VNodeBuilder::text(text))).collect();
			ctx.create(VNodeBuilder::fragment(items).flags(PatchFlags::UNKEYED_FRAGMENT))
		})
	};

	let old = fragment(&mut renderer, &["a", "b", "c"]);
	renderer.render(Some(old), &container).unwrap();
	renderer.host_mut().clear_ops();

	let new = fragment(&mut renderer, &["a", "x"]);
	renderer.render(Some(new), &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), "ax");
	assert_eq!(renderer.host().moves(), 0);
	assert_eq!(renderer.host().removals(), 1);

	let newer = fragment(&mut renderer, &["a", "x", "y", "z"]);
	renderer.render(Some(newer), &container).unwrap();
	assert_eq!(renderer.host().inner_html(container), "axyz");
}
