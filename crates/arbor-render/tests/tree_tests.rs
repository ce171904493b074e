//! Integration tests for render tree construction and inline splitting.

use std::rc::Rc;

use arbor_render::style::RenderStyle;
use arbor_render::{BlockFlavor, LayoutSize, MAX_SPLIT_DEPTH, RenderId, RenderTree};
use quickcheck_macros::quickcheck;

fn new_tree() -> RenderTree {
    RenderTree::new(LayoutSize::new(800.0, 600.0))
}

fn add_text(tree: &mut RenderTree, parent: RenderId, text: &str) -> RenderId {
    insert_text(tree, parent, text, None)
}

fn insert_text(tree: &mut RenderTree, parent: RenderId, text: &str, before: Option<RenderId>) -> RenderId {
    let id = tree.create_text(text, Rc::new(RenderStyle::default()), None);
    tree.add_child(parent, id, before);
    id
}

fn new_block(tree: &mut RenderTree) -> RenderId {
    tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None)
}

/// Text of every text renderer below the view, in tree order.
fn text_in_order(tree: &RenderTree) -> Vec<String> {
    tree.descendants(tree.view())
        .into_iter()
        .filter_map(|id| tree.get(id).text().map(|data| data.text().to_string()))
        .collect()
}

/// A block holding `depth` nested inlines, the innermost containing "a".
/// Returns the block and the inlines, outermost first.
fn nested_inlines(tree: &mut RenderTree, depth: usize) -> (RenderId, Vec<RenderId>) {
    let view = tree.view();
    let block = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
    tree.add_child(view, block, None);
    let mut parent = block;
    let mut inlines = Vec::with_capacity(depth);
    for _ in 0..depth {
        let inline = tree.create_inline(Rc::new(RenderStyle::default()), None);
        tree.add_child(parent, inline, None);
        inlines.push(inline);
        parent = inline;
    }
    let _ = add_text(tree, parent, "a");
    (block, inlines)
}

/// Put a block holding "b" into the innermost inline, then append "c" to
/// the innermost inline.
fn split_innermost(tree: &mut RenderTree, inlines: &[RenderId]) -> RenderId {
    let innermost = inlines[inlines.len() - 1];
    let inner_block = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
    tree.add_child(innermost, inner_block, None);
    let _ = add_text(tree, inner_block, "b");
    let _ = add_text(tree, innermost, "c");
    inner_block
}

fn inline_count(tree: &RenderTree, root: RenderId) -> usize {
    tree.descendants(root)
        .into_iter()
        .filter(|&id| tree.get(id).is_render_inline())
        .count()
}

// ========== Anonymous blocks ==========

#[test]
fn test_block_among_inlines_gets_anonymous_wrappers() {
    let mut tree = new_tree();
    let view = tree.view();
    let block = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
    tree.add_child(view, block, None);
    let _ = add_text(&mut tree, block, "before");
    let middle = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
    tree.add_child(block, middle, None);
    let _ = add_text(&mut tree, block, "after");

    let children = tree.child_ids(block);
    assert_eq!(children.len(), 3);
    assert!(tree.get(children[0]).is_anonymous_block());
    assert_eq!(children[1], middle);
    assert!(tree.get(children[2]).is_anonymous_block());
    assert!(!tree.get(block).children_inline());
    assert_eq!(text_in_order(&tree), vec!["before", "after"]);
}

#[test]
fn test_block_made_without_a_node_is_not_anonymous() {
    let mut tree = new_tree();
    let view = tree.view();
    let block = new_block(&mut tree);
    tree.add_child(view, block, None);
    let inline = tree.create_inline(Rc::new(RenderStyle::default()), None);
    tree.add_child(block, inline, None);
    let _ = add_text(&mut tree, inline, "a");
    assert!(!tree.get(block).is_anonymous());

    // Splitting the inline wraps its pieces inside the block instead of
    // taking the block over.
    let inner_block = new_block(&mut tree);
    tree.add_child(inline, inner_block, None);
    assert!(tree.contains(block));
    assert_eq!(tree.parent(block), Some(view));
    assert_eq!(tree.child_ids(view), vec![block]);
    assert!(tree.is_descendant_of(inner_block, block));
    assert_eq!(tree.child_ids(block).len(), 3);
}

#[test]
fn test_removing_the_only_block_collapses_wrappers() {
    let mut tree = new_tree();
    let view = tree.view();
    let block = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
    tree.add_child(view, block, None);
    let _ = add_text(&mut tree, block, "before");
    let middle = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
    tree.add_child(block, middle, None);
    let _ = add_text(&mut tree, block, "after");

    tree.remove_child(block, middle);
    tree.destroy(middle);
    assert!(!tree.contains(middle));
    assert!(tree.get(block).children_inline());
    assert!(tree.children(block).all(|child| tree.get(child).is_text()));
    assert_eq!(text_in_order(&tree), vec!["before", "after"]);
}

// ========== Inline splits ==========

#[test]
fn test_split_keeps_content_order() {
    for depth in [1, 2, 3, 10, 50] {
        let mut tree = new_tree();
        let (block, inlines) = nested_inlines(&mut tree, depth);
        let inner_block = split_innermost(&mut tree, &inlines);
        tree.layout();

        assert_eq!(text_in_order(&tree), vec!["a", "b", "c"], "depth {depth}");
        let pieces = tree.child_ids(block);
        assert_eq!(pieces.len(), 3, "depth {depth}");
        assert!(tree.is_descendant_of(inner_block, pieces[1]));
        // Every inline level is cloned once into the trailing block.
        assert_eq!(inline_count(&tree, pieces[2]), depth, "depth {depth}");
        assert_eq!(inline_count(&tree, pieces[0]), depth, "depth {depth}");
    }
}

#[test]
fn test_split_before_a_middle_child_keeps_order() {
    for depth in [1, 2, 5] {
        let mut tree = new_tree();
        let (block, inlines) = nested_inlines(&mut tree, depth);
        let innermost = inlines[depth - 1];
        let b = add_text(&mut tree, innermost, "b");
        let c = add_text(&mut tree, innermost, "c");
        let d = add_text(&mut tree, innermost, "d");

        let inner_block = new_block(&mut tree);
        tree.add_child(innermost, inner_block, Some(c));
        let _ = add_text(&mut tree, inner_block, "B");
        // Later insertions go through the original inline and find the
        // piece of the chain their position belongs to.
        let _ = insert_text(&mut tree, innermost, "x", Some(d));
        let _ = add_text(&mut tree, innermost, "e");
        let _ = insert_text(&mut tree, innermost, "a2", Some(b));
        tree.layout();

        assert_eq!(
            text_in_order(&tree),
            vec!["a", "a2", "b", "B", "c", "x", "d", "e"],
            "depth {depth}"
        );
        let pieces = tree.child_ids(block);
        assert_eq!(pieces.len(), 3, "depth {depth}");
        assert!(tree.is_descendant_of(b, pieces[0]), "depth {depth}");
        assert!(tree.is_descendant_of(inner_block, pieces[1]), "depth {depth}");
        assert!(tree.is_descendant_of(d, pieces[2]), "depth {depth}");
    }
}

#[quickcheck]
fn prop_split_keeps_text_order(depth: u8, runs: u8, at: u8) -> bool {
    let depth = usize::from(depth % 6) + 1;
    let mut tree = new_tree();
    let (_, inlines) = nested_inlines(&mut tree, depth);
    let innermost = inlines[depth - 1];
    let mut texts = vec!["a".to_string()];
    let mut ids = tree.child_ids(innermost);
    for run in 1..=usize::from(runs % 5) + 1 {
        let text = format!("r{run}");
        ids.push(add_text(&mut tree, innermost, &text));
        texts.push(text);
    }

    let split_at = usize::from(at) % (ids.len() + 1);
    let inner_block = new_block(&mut tree);
    let _ = add_text(&mut tree, inner_block, "B");
    tree.add_child(innermost, inner_block, ids.get(split_at).copied());
    let _ = add_text(&mut tree, innermost, "z");
    tree.layout();

    texts.insert(split_at, "B".to_string());
    texts.push("z".to_string());
    text_in_order(&tree) == texts
}

#[test]
fn test_split_links_a_continuation_chain() {
    let mut tree = new_tree();
    let (block, inlines) = nested_inlines(&mut tree, 2);
    let _ = split_innermost(&mut tree, &inlines);

    let pieces = tree.child_ids(block);
    for &inline in &inlines {
        let next = tree.inline_element_continuation(inline);
        assert!(next.is_some_and(|n| tree.is_descendant_of(n, pieces[2])));
        assert_eq!(next.map(|n| tree.get(n).style_rc()), Some(tree.get(inline).style_rc()));
    }
    // The clone of the innermost inline follows the middle block.
    let clone = tree.inline_element_continuation(inlines[1]);
    assert!(clone.is_some_and(|c| tree.continuation_predecessor(c) == Some(pieces[1])));
}

#[test]
fn test_split_at_the_depth_cap() {
    let mut tree = new_tree();
    let (block, inlines) = nested_inlines(&mut tree, MAX_SPLIT_DEPTH);
    let _ = split_innermost(&mut tree, &inlines);

    let pieces = tree.child_ids(block);
    assert_eq!(pieces.len(), 3);
    assert_eq!(inline_count(&tree, pieces[2]), MAX_SPLIT_DEPTH);
    assert_eq!(text_in_order(&tree), vec!["a", "b", "c"]);
}

#[test]
fn test_split_beyond_the_depth_cap_degrades() {
    let depth = MAX_SPLIT_DEPTH + 5;
    let mut tree = new_tree();
    let (block, inlines) = nested_inlines(&mut tree, depth);
    let _ = split_innermost(&mut tree, &inlines);

    let pieces = tree.child_ids(block);
    assert_eq!(pieces.len(), 3);
    // Only the innermost levels up to the cap are cloned.
    assert_eq!(inline_count(&tree, pieces[2]), MAX_SPLIT_DEPTH);
    assert_eq!(inline_count(&tree, pieces[0]), depth);
    assert_eq!(text_in_order(&tree), vec!["a", "b", "c"]);
}

#[test]
fn test_destroying_split_content_keeps_tree_consistent() {
    let mut tree = new_tree();
    let (_, inlines) = nested_inlines(&mut tree, 3);
    let inner_block = split_innermost(&mut tree, &inlines);
    let before = tree.object_count();

    tree.destroy_and_cleanup_anonymous_wrappers(inner_block);
    assert!(tree.object_count() < before);
    assert!(!tree.contains(inner_block));
    tree.layout();
    assert_eq!(text_in_order(&tree), vec!["a", "c"]);
}
