//! Integration tests for coordinate mapping and the geometry map.

use std::rc::Rc;

use arbor_render::geometry_map::RenderGeometryMap;
use arbor_render::style::{BoxOffsets, EdgeSizes, Length, Position, RenderStyle, TransformOperation};
use arbor_render::{BlockFlavor, LayoutOffset, LayoutPoint, LayoutSize, MapCoordinatesFlags, RenderId, RenderTree};
use quickcheck_macros::quickcheck;

fn new_tree() -> RenderTree {
    RenderTree::new(LayoutSize::new(800.0, 600.0))
}

fn add_block(tree: &mut RenderTree, parent: RenderId, style: RenderStyle) -> RenderId {
    let block = tree.create_block(BlockFlavor::Flow, Rc::new(style), None);
    tree.add_child(parent, block, None);
    block
}

fn sized(height: f32) -> RenderStyle {
    RenderStyle {
        height: Length::Fixed(height),
        ..RenderStyle::block()
    }
}

fn close(a: LayoutPoint, b: LayoutPoint) -> bool {
    (a.x - b.x).abs() < 0.01 && (a.y - b.y).abs() < 0.01
}

fn mapped_by_geometry_map(tree: &RenderTree, id: RenderId, point: LayoutPoint) -> LayoutPoint {
    let mut map = RenderGeometryMap::new(MapCoordinatesFlags::USE_TRANSFORMS);
    map.push_mappings_to_ancestor(tree, id, None);
    map.absolute_point(tree, point)
}

// ========== Local to absolute ==========

#[test]
fn test_relative_inline_maps_from_containing_block_content_origin() {
    let mut tree = new_tree();
    let view = tree.view();
    let div = add_block(
        &mut tree,
        view,
        RenderStyle {
            margin: EdgeSizes {
                left: 20.0,
                ..EdgeSizes::default()
            },
            ..RenderStyle::block()
        },
    );
    let span_style = RenderStyle {
        position: Position::Relative,
        offsets: BoxOffsets {
            left: Length::Fixed(10.0),
            top: Length::Fixed(5.0),
            ..BoxOffsets::default()
        },
        ..RenderStyle::default()
    };
    let span = tree.create_inline(Rc::new(span_style), None);
    tree.add_child(div, span, None);
    let text = tree.create_text("text", Rc::new(RenderStyle::default()), None);
    tree.add_child(span, text, None);
    tree.layout();

    let content_origin = tree.get(div).content_box_rect().origin;
    let div_content = tree.local_to_absolute(div, content_origin, MapCoordinatesFlags::empty());
    assert_eq!(div_content, LayoutPoint::new(20.0, 0.0));

    let mapped = tree.local_to_absolute(span, LayoutPoint::zero(), MapCoordinatesFlags::empty());
    assert_eq!(mapped, div_content + LayoutOffset::new(10.0, 5.0));
    assert_eq!(mapped_by_geometry_map(&tree, span, LayoutPoint::zero()), mapped);
}

#[test]
fn test_padding_and_margins_accumulate() {
    let mut tree = new_tree();
    let view = tree.view();
    let outer = add_block(
        &mut tree,
        view,
        RenderStyle {
            padding: EdgeSizes::uniform(7.0),
            ..RenderStyle::block()
        },
    );
    let inner = add_block(
        &mut tree,
        outer,
        RenderStyle {
            margin: EdgeSizes {
                left: 3.0,
                ..EdgeSizes::default()
            },
            ..sized(10.0)
        },
    );
    tree.layout();

    let mapped = tree.local_to_absolute(inner, LayoutPoint::new(1.0, 1.0), MapCoordinatesFlags::empty());
    assert_eq!(mapped, LayoutPoint::new(11.0, 8.0));
    let back = tree.absolute_to_local(inner, mapped, MapCoordinatesFlags::empty());
    assert_eq!(back, LayoutPoint::new(1.0, 1.0));
}

#[test]
fn test_transformed_ancestor_translates_descendants() {
    let mut tree = new_tree();
    let view = tree.view();
    let transformed = add_block(
        &mut tree,
        view,
        RenderStyle {
            transform: vec![TransformOperation::Translate(30.0, 40.0)],
            ..sized(100.0)
        },
    );
    let child = add_block(
        &mut tree,
        transformed,
        RenderStyle {
            margin: EdgeSizes {
                top: 5.0,
                ..EdgeSizes::default()
            },
            ..sized(10.0)
        },
    );
    tree.layout();

    let expected = LayoutPoint::new(32.0, 47.0);
    let direct = tree.local_to_absolute(child, LayoutPoint::new(2.0, 2.0), MapCoordinatesFlags::USE_TRANSFORMS);
    assert!(close(direct, expected), "{direct:?}");
    let cached = mapped_by_geometry_map(&tree, child, LayoutPoint::new(2.0, 2.0));
    assert!(close(cached, expected), "{cached:?}");

    // Without transforms only the translation chain counts.
    let flat = tree.local_to_absolute(child, LayoutPoint::new(2.0, 2.0), MapCoordinatesFlags::empty());
    assert_eq!(flat, LayoutPoint::new(2.0, 7.0));
}

#[test]
fn test_fixed_box_follows_the_scroll_offset() {
    let mut tree = new_tree();
    let view = tree.view();
    let _tall = add_block(&mut tree, view, sized(2000.0));
    let fixed = add_block(
        &mut tree,
        view,
        RenderStyle {
            position: Position::Fixed,
            offsets: BoxOffsets {
                left: Length::Fixed(10.0),
                top: Length::Fixed(10.0),
                ..BoxOffsets::default()
            },
            width: Length::Fixed(50.0),
            ..sized(50.0)
        },
    );
    tree.layout();
    tree.frame_view_mut().set_scroll_offset(LayoutOffset::new(0.0, 40.0));

    let direct = tree.local_to_absolute(fixed, LayoutPoint::zero(), MapCoordinatesFlags::USE_TRANSFORMS);
    assert_eq!(direct, LayoutPoint::new(10.0, 50.0));
    assert_eq!(mapped_by_geometry_map(&tree, fixed, LayoutPoint::zero()), direct);
}

#[test]
fn test_fixed_box_inside_transform_ignores_scroll() {
    let mut tree = new_tree();
    let view = tree.view();
    let transformed = add_block(
        &mut tree,
        view,
        RenderStyle {
            transform: vec![TransformOperation::Translate(5.0, 5.0)],
            ..sized(100.0)
        },
    );
    let fixed = add_block(
        &mut tree,
        transformed,
        RenderStyle {
            position: Position::Fixed,
            offsets: BoxOffsets {
                left: Length::Fixed(10.0),
                top: Length::Fixed(10.0),
                ..BoxOffsets::default()
            },
            width: Length::Fixed(20.0),
            ..sized(20.0)
        },
    );
    tree.layout();
    tree.frame_view_mut().set_scroll_offset(LayoutOffset::new(0.0, 40.0));

    assert_eq!(tree.container(fixed), Some(transformed));
    let direct = tree.local_to_absolute(fixed, LayoutPoint::zero(), MapCoordinatesFlags::USE_TRANSFORMS);
    assert!(close(direct, LayoutPoint::new(15.0, 15.0)), "{direct:?}");
    let cached = mapped_by_geometry_map(&tree, fixed, LayoutPoint::zero());
    assert!(close(cached, direct), "{cached:?}");
}

#[test]
fn test_columns_move_later_content_sideways() {
    let mut tree = new_tree();
    let view = tree.view();
    let multicol = add_block(
        &mut tree,
        view,
        RenderStyle {
            column_count: Some(2),
            column_gap: 16.0,
            ..RenderStyle::block()
        },
    );
    let children: Vec<RenderId> = (0..4).map(|_| add_block(&mut tree, multicol, sized(50.0))).collect();
    tree.layout();

    let columns = tree.get(multicol).column_info().map(|c| (c.width, c.height));
    assert_eq!(columns, Some((392.0, 100.0)));
    assert_eq!(tree.get(multicol).size().height, 100.0);

    let first = tree.local_to_absolute(children[0], LayoutPoint::zero(), MapCoordinatesFlags::USE_TRANSFORMS);
    assert_eq!(first, LayoutPoint::new(0.0, 0.0));
    let third = tree.local_to_absolute(children[2], LayoutPoint::zero(), MapCoordinatesFlags::USE_TRANSFORMS);
    assert_eq!(third, LayoutPoint::new(408.0, 0.0));
    assert_eq!(mapped_by_geometry_map(&tree, children[2], LayoutPoint::zero()), third);
}

// ========== Geometry map ==========

#[test]
fn test_push_then_pop_restores_the_map() {
    let mut tree = new_tree();
    let view = tree.view();
    let parent = add_block(
        &mut tree,
        view,
        RenderStyle {
            padding: EdgeSizes::uniform(4.0),
            ..RenderStyle::block()
        },
    );
    let child = add_block(&mut tree, parent, sized(10.0));
    let grandchild = add_block(&mut tree, child, sized(5.0));
    tree.layout();

    let mut map = RenderGeometryMap::new(MapCoordinatesFlags::USE_TRANSFORMS);
    map.push_mappings_to_ancestor(&tree, parent, None);
    let steps = map.steps().to_vec();
    let offset = map.accumulated_offset();
    let counts = map.step_counts();

    map.push_mappings_to_ancestor(&tree, grandchild, Some(parent));
    assert_eq!(map.steps().len(), steps.len() + 2);
    assert_eq!(map.steps().last().map(|s| s.renderer()), Some(grandchild));
    assert_eq!(map.absolute_point(&tree, LayoutPoint::zero()), LayoutPoint::new(4.0, 4.0));

    map.pop_mappings_to_ancestor(Some(parent));
    assert_eq!(map.steps(), &steps[..]);
    assert_eq!(map.accumulated_offset(), offset);
    assert_eq!(map.step_counts(), counts);
}

#[test]
fn test_non_uniform_step_is_counted_and_released() {
    let mut tree = new_tree();
    let view = tree.view();
    let multicol = add_block(
        &mut tree,
        view,
        RenderStyle {
            column_count: Some(2),
            ..RenderStyle::block()
        },
    );
    let child = add_block(&mut tree, multicol, sized(20.0));
    tree.layout();

    let mut map = RenderGeometryMap::new(MapCoordinatesFlags::USE_TRANSFORMS);
    map.push_mappings_to_ancestor(&tree, multicol, None);
    assert!(!map.has_non_uniform_step());
    map.push_mappings_to_ancestor(&tree, child, Some(multicol));
    assert!(map.has_non_uniform_step());
    map.pop_mappings_to_ancestor(Some(multicol));
    assert!(!map.has_non_uniform_step());
}

/// Nested blocks whose padding, margins, relative offsets and translations
/// come from `levels`.
fn build_chain(levels: &[(u8, u8, u8)]) -> (RenderTree, Vec<RenderId>) {
    let mut tree = new_tree();
    let mut parent = tree.view();
    let mut chain = Vec::new();
    for &(padding, margin, kind) in levels.iter().take(6) {
        let padding = f32::from(padding % 20);
        let margin = f32::from(margin % 20);
        let mut style = RenderStyle {
            padding: EdgeSizes::uniform(padding),
            margin: EdgeSizes {
                left: margin,
                top: margin,
                ..EdgeSizes::default()
            },
            ..RenderStyle::block()
        };
        match kind % 3 {
            1 => {
                style.position = Position::Relative;
                style.offsets.left = Length::Fixed(padding);
                style.offsets.top = Length::Fixed(margin);
            }
            2 => style.transform = vec![TransformOperation::Translate(padding, margin)],
            _ => {}
        }
        let block = add_block(&mut tree, parent, style);
        chain.push(block);
        parent = block;
    }
    tree.layout();
    (tree, chain)
}

#[quickcheck]
fn prop_geometry_map_agrees_with_direct_mapping(levels: Vec<(u8, u8, u8)>, x: u8, y: u8) -> bool {
    let (tree, chain) = build_chain(&levels);
    let point = LayoutPoint::new(f32::from(x), f32::from(y));
    chain.iter().all(|&id| {
        let direct = tree.local_to_absolute(id, point, MapCoordinatesFlags::USE_TRANSFORMS);
        close(mapped_by_geometry_map(&tree, id, point), direct)
    })
}

#[quickcheck]
fn prop_incremental_push_pop_is_symmetric(levels: Vec<(u8, u8, u8)>) -> bool {
    let (tree, chain) = build_chain(&levels);
    let Some(&first) = chain.first() else {
        return true;
    };
    let mut map = RenderGeometryMap::new(MapCoordinatesFlags::USE_TRANSFORMS);
    map.push_mappings_to_ancestor(&tree, first, None);

    // Walk down, remembering the map at every level.
    let mut snapshots = vec![(map.steps().to_vec(), map.accumulated_offset())];
    for pair in chain.windows(2) {
        map.push_mappings_to_ancestor(&tree, pair[1], Some(pair[0]));
        let direct = tree.local_to_absolute(pair[1], LayoutPoint::zero(), MapCoordinatesFlags::USE_TRANSFORMS);
        if !close(map.absolute_point(&tree, LayoutPoint::zero()), direct) {
            return false;
        }
        snapshots.push((map.steps().to_vec(), map.accumulated_offset()));
    }

    // Walk back up; every pop must restore the earlier state exactly.
    let _ = snapshots.pop();
    for (pair, (steps, offset)) in chain.windows(2).rev().zip(snapshots.iter().rev()) {
        map.pop_mappings_to_ancestor(Some(pair[0]));
        if map.steps() != &steps[..] || map.accumulated_offset() != *offset {
            return false;
        }
    }
    true
}
