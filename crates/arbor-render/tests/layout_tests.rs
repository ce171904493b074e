//! Integration tests for layout and layout invalidation.

use std::rc::Rc;

use arbor_render::style::{BoxOffsets, Display, EdgeSizes, Float, Length, Overflow, Position, RenderStyle};
use arbor_render::{BlockFlavor, LayoutPoint, LayoutSize, MarkingBehavior, RenderFlags, RenderId, RenderTree};
use quickcheck_macros::quickcheck;

fn new_tree() -> RenderTree {
    RenderTree::new(LayoutSize::new(800.0, 600.0))
}

fn add_block(tree: &mut RenderTree, parent: RenderId, style: RenderStyle) -> RenderId {
    let block = tree.create_block(BlockFlavor::Flow, Rc::new(style), None);
    tree.add_child(parent, block, None);
    block
}

fn add_text(tree: &mut RenderTree, parent: RenderId, text: &str) -> RenderId {
    let style = RenderStyle {
        font_size: 10.0,
        ..RenderStyle::default()
    };
    let id = tree.create_text(text, Rc::new(style), None);
    tree.add_child(parent, id, None);
    id
}

fn sized(width: f32, height: f32) -> RenderStyle {
    RenderStyle {
        width: Length::Fixed(width),
        height: Length::Fixed(height),
        ..RenderStyle::block()
    }
}

fn high(height: f32) -> RenderStyle {
    RenderStyle {
        height: Length::Fixed(height),
        ..RenderStyle::block()
    }
}

fn all_flags(tree: &RenderTree) -> Vec<(RenderId, RenderFlags)> {
    let view = tree.view();
    std::iter::once(view)
        .chain(tree.descendants(view))
        .map(|id| (id, tree.get(id).flags()))
        .collect()
}

// ========== Block flow ==========

#[test]
fn test_blocks_stack_and_fill_the_width() {
    let mut tree = new_tree();
    let view = tree.view();
    let first = add_block(&mut tree, view, high(30.0));
    let second = add_block(&mut tree, view, high(20.0));
    tree.layout();

    assert_eq!(tree.get(first).frame_rect(), arbor_render::geometry::rect(0.0, 0.0, 800.0, 30.0));
    assert_eq!(tree.get(second).frame_rect(), arbor_render::geometry::rect(0.0, 30.0, 800.0, 20.0));
    assert!(!tree.get(view).needs_layout());
}

#[test]
fn test_sibling_margins_collapse() {
    let mut tree = new_tree();
    let view = tree.view();
    let _first = add_block(
        &mut tree,
        view,
        RenderStyle {
            margin: EdgeSizes {
                bottom: 20.0,
                ..EdgeSizes::default()
            },
            ..high(10.0)
        },
    );
    let second = add_block(
        &mut tree,
        view,
        RenderStyle {
            margin: EdgeSizes {
                top: 15.0,
                ..EdgeSizes::default()
            },
            ..high(10.0)
        },
    );
    tree.layout();

    assert_eq!(tree.get(second).location(), LayoutPoint::new(0.0, 30.0));
}

#[test]
fn test_auto_height_wraps_lines_of_text() {
    let mut tree = new_tree();
    let view = tree.view();
    let block = add_block(
        &mut tree,
        view,
        RenderStyle {
            width: Length::Fixed(60.0),
            font_size: 10.0,
            ..RenderStyle::block()
        },
    );
    // Six glyphs of 6px fit on one 60px line; twelve need two lines.
    let text = add_text(&mut tree, block, "abcdef ghijkl");
    tree.layout();

    let boxes = tree.get(text).text().map(|data| data.boxes().len());
    assert_eq!(boxes, Some(2));
    assert_eq!(tree.get(block).size().height, 24.0);
}

#[test]
fn test_floats_sit_side_by_side() {
    let mut tree = new_tree();
    let view = tree.view();
    let container = add_block(&mut tree, view, RenderStyle::block());
    let left = add_block(
        &mut tree,
        container,
        RenderStyle {
            float: Float::Left,
            ..sized(100.0, 40.0)
        },
    );
    let right = add_block(
        &mut tree,
        container,
        RenderStyle {
            float: Float::Right,
            ..sized(100.0, 40.0)
        },
    );
    tree.layout();

    assert_eq!(tree.get(left).location(), LayoutPoint::new(0.0, 0.0));
    assert_eq!(tree.get(right).location(), LayoutPoint::new(700.0, 0.0));
    assert!(tree.get(left).is_floating());
}

#[test]
fn test_absolute_box_anchors_to_positioned_ancestor() {
    let mut tree = new_tree();
    let view = tree.view();
    let _spacer = add_block(&mut tree, view, high(50.0));
    let relative = add_block(
        &mut tree,
        view,
        RenderStyle {
            position: Position::Relative,
            ..sized(200.0, 100.0)
        },
    );
    let absolute = add_block(
        &mut tree,
        relative,
        RenderStyle {
            position: Position::Absolute,
            offsets: BoxOffsets {
                right: Length::Fixed(0.0),
                bottom: Length::Fixed(0.0),
                ..BoxOffsets::default()
            },
            ..sized(20.0, 10.0)
        },
    );
    tree.layout();

    assert_eq!(tree.containing_block(absolute), Some(relative));
    assert_eq!(tree.get(absolute).location(), LayoutPoint::new(180.0, 90.0));
    assert!(tree.positioned_objects_of(relative).contains(&absolute));
    assert_eq!(
        tree.local_to_absolute(absolute, LayoutPoint::zero(), arbor_render::MapCoordinatesFlags::empty()),
        LayoutPoint::new(180.0, 140.0)
    );
}

#[test]
fn test_table_cells_share_the_table_width() {
    let mut tree = new_tree();
    let view = tree.view();
    let table_style = RenderStyle {
        display: Display::Table,
        width: Length::Fixed(200.0),
        ..RenderStyle::default()
    };
    let table = tree.create_block(BlockFlavor::Table, Rc::new(table_style), None);
    tree.add_child(view, table, None);
    let cell_style = |height: f32| RenderStyle {
        display: Display::TableCell,
        width: Length::Fixed(50.0),
        height: Length::Fixed(height),
        ..RenderStyle::default()
    };
    let first = tree.create_block(BlockFlavor::TableCell, Rc::new(cell_style(20.0)), None);
    let second = tree.create_block(BlockFlavor::TableCell, Rc::new(cell_style(40.0)), None);
    tree.add_child(table, first, None);
    tree.add_child(table, second, None);
    tree.layout();

    // Both cells went into one anonymous row.
    assert_eq!(tree.parent(first), tree.parent(second));
    assert_eq!(tree.get(first).location(), LayoutPoint::new(0.0, 0.0));
    assert_eq!(tree.get(second).location(), LayoutPoint::new(100.0, 0.0));
    // The shorter cell is stretched to the row.
    assert_eq!(tree.get(first).size().height, 40.0);
    assert_eq!(tree.get(table).size(), LayoutSize::new(200.0, 40.0));
}

// ========== Dirty bits ==========

#[test]
fn test_marking_twice_changes_nothing() {
    let mut tree = new_tree();
    let view = tree.view();
    let outer = add_block(&mut tree, view, RenderStyle::block());
    let middle = add_block(&mut tree, outer, RenderStyle::block());
    let leaf = add_block(&mut tree, middle, high(10.0));
    tree.layout();

    tree.set_needs_layout(leaf, MarkingBehavior::MarkContainingBlockChain);
    let once = all_flags(&tree);
    tree.set_needs_layout(leaf, MarkingBehavior::MarkContainingBlockChain);
    assert_eq!(all_flags(&tree), once);

    assert!(tree.get(leaf).self_needs_layout());
    assert!(tree.get(middle).normal_child_needs_layout());
    assert!(tree.get(outer).normal_child_needs_layout());
    assert!(tree.get(view).normal_child_needs_layout());
    assert!(!tree.get(outer).self_needs_layout());
}

/// Up to twelve laid out blocks. Each byte picks a parent among the blocks
/// made so far and a plain, absolutely positioned or clipping style.
fn random_blocks(shape: &[u8]) -> (RenderTree, Vec<RenderId>) {
    let mut tree = new_tree();
    let mut nodes = vec![tree.view()];
    for &byte in shape.iter().take(12) {
        let parent = nodes[usize::from(byte) % nodes.len()];
        let style = match byte / 16 % 3 {
            1 => RenderStyle {
                position: Position::Absolute,
                offsets: BoxOffsets {
                    left: Length::Fixed(5.0),
                    top: Length::Fixed(5.0),
                    ..BoxOffsets::default()
                },
                ..sized(40.0, 20.0)
            },
            2 => RenderStyle {
                overflow: Overflow::Hidden,
                ..sized(60.0, 30.0)
            },
            _ => high(10.0),
        };
        nodes.push(add_block(&mut tree, parent, style));
    }
    tree.layout();
    let _ = nodes.remove(0);
    (tree, nodes)
}

#[quickcheck]
fn prop_marking_is_idempotent(shape: Vec<u8>, target: u8, operation: u8) -> bool {
    let (mut tree, blocks) = random_blocks(&shape);
    if blocks.is_empty() {
        return true;
    }
    let id = blocks[usize::from(target) % blocks.len()];
    let mark = |tree: &mut RenderTree| match operation % 4 {
        0 => tree.set_needs_layout(id, MarkingBehavior::MarkContainingBlockChain),
        1 => tree.set_child_needs_layout(id, MarkingBehavior::MarkContainingBlockChain),
        2 => tree.set_needs_simplified_normal_flow_layout(id),
        _ => tree.set_needs_layout_and_pref_widths_recalc(id),
    };

    mark(&mut tree);
    let once = (all_flags(&tree), tree.frame_view().layout_root());
    mark(&mut tree);
    once == (all_flags(&tree), tree.frame_view().layout_root())
}

#[test]
fn test_layout_clears_every_bit() {
    let mut tree = new_tree();
    let view = tree.view();
    let outer = add_block(&mut tree, view, RenderStyle::block());
    let _text = add_text(&mut tree, outer, "hello world");
    tree.layout();

    assert!(tree.descendants(view).into_iter().all(|id| !tree.get(id).needs_layout()));
    let count = tree.frame_view().layout_count();
    tree.layout_if_needed();
    assert_eq!(tree.frame_view().layout_count(), count);
}

#[test]
fn test_relayout_boundary_becomes_the_layout_root() {
    let mut tree = new_tree();
    let view = tree.view();
    let boundary = add_block(
        &mut tree,
        view,
        RenderStyle {
            overflow: Overflow::Hidden,
            ..sized(100.0, 50.0)
        },
    );
    let inner = add_block(&mut tree, boundary, high(10.0));
    tree.layout();

    tree.set_needs_layout(inner, MarkingBehavior::MarkContainingBlockChain);
    assert_eq!(tree.frame_view().layout_root(), Some(boundary));
    assert!(!tree.get(view).needs_layout());

    let count = tree.frame_view().layout_count();
    tree.layout_if_needed();
    assert_eq!(tree.frame_view().layout_count(), count + 1);
    assert!(!tree.get(inner).needs_layout());
    assert!(!tree.get(boundary).needs_layout());
    assert_eq!(tree.frame_view().layout_root(), None);
}

#[test]
fn test_style_change_relayouts_only_when_geometry_changes() {
    let mut tree = new_tree();
    let view = tree.view();
    let block = add_block(&mut tree, view, high(10.0));
    tree.layout();

    tree.set_style(block, Rc::new(high(25.0)));
    assert!(tree.get(block).self_needs_layout());
    tree.layout_if_needed();
    assert_eq!(tree.get(block).size().height, 25.0);

    let mut recolored = high(25.0);
    recolored.color = arbor_render::style::Color::WHITE;
    tree.set_style(block, Rc::new(recolored));
    assert!(!tree.get(block).needs_layout());
}

#[test]
fn test_viewport_resize_relayouts_widths() {
    let mut tree = new_tree();
    let view = tree.view();
    let block = add_block(&mut tree, view, high(10.0));
    tree.layout();

    tree.set_viewport_size(LayoutSize::new(400.0, 300.0));
    assert!(tree.get(view).needs_layout());
    tree.layout_if_needed();
    assert_eq!(tree.get(block).size().width, 400.0);
}

// ========== Printing ==========

#[test]
fn test_page_count_follows_document_height() {
    let mut tree = new_tree();
    let view = tree.view();
    let _tall = add_block(&mut tree, view, high(2500.0));
    tree.set_printing(true);
    tree.set_page_logical_height(1000.0);
    tree.layout();

    assert_eq!(tree.page_count(), 3);
    assert_eq!(tree.get(view).size().height, 1000.0);
}
