//! Integration tests for repaint rectangles and the repaint log.

use std::rc::Rc;

use arbor_render::geometry::rect;
use arbor_render::style::{Background, Color, Length, RenderStyle};
use arbor_render::{BlockFlavor, LayoutOffset, LayoutRect, LayoutSize, RenderId, RenderTree, RepaintTarget, delta_repaint_rects};
use quickcheck_macros::quickcheck;

fn area(r: &LayoutRect) -> f32 {
    if r.is_empty() { 0.0 } else { r.area() }
}

fn overlap(a: &LayoutRect, b: &LayoutRect) -> f32 {
    let w = (a.max_x().min(b.max_x()) - a.min_x().max(b.min_x())).max(0.0);
    let h = (a.max_y().min(b.max_y()) - a.min_y().max(b.min_y())).max(0.0);
    w * h
}

fn small_rect(x: u8, y: u8, w: u8, h: u8) -> LayoutRect {
    rect(
        f32::from(x % 64),
        f32::from(y % 64),
        f32::from(w % 64) + 1.0,
        f32::from(h % 64) + 1.0,
    )
}

fn tree_with_block(height: f32) -> (RenderTree, RenderId) {
    let mut tree = RenderTree::new(LayoutSize::new(200.0, 200.0));
    let view = tree.view();
    let style = RenderStyle {
        height: Length::Fixed(height),
        ..RenderStyle::block()
    };
    let block = tree.create_block(BlockFlavor::Flow, Rc::new(style), None);
    tree.add_child(view, block, None);
    tree.layout();
    let _ = tree.frame_view_mut().take_repaints();
    (tree, block)
}

// ========== Delta strips ==========

#[test]
fn test_identical_rects_need_no_strips() {
    let r = rect(3.0, 4.0, 10.0, 10.0);
    assert!(delta_repaint_rects(&r, &r).iter().all(LayoutRect::is_empty));
}

#[test]
fn test_disjoint_rects_repaint_both_whole() {
    let old = rect(0.0, 0.0, 10.0, 10.0);
    let new = rect(0.0, 20.0, 10.0, 10.0);
    let mut strips: Vec<LayoutRect> = delta_repaint_rects(&old, &new)
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();
    strips.sort_by(|a, b| a.min_y().total_cmp(&b.min_y()));
    assert_eq!(strips, vec![old, new]);
}

#[test]
fn test_shrinking_from_the_left_repaints_the_uncovered_column() {
    let old = rect(0.0, 0.0, 100.0, 40.0);
    let new = rect(30.0, 0.0, 70.0, 40.0);
    let [left, right, top, bottom] = delta_repaint_rects(&old, &new);
    assert_eq!(left, rect(0.0, 0.0, 30.0, 40.0));
    assert!(right.is_empty());
    assert!(top.is_empty());
    assert!(bottom.is_empty());
}

#[quickcheck]
fn prop_delta_strips_partition_the_symmetric_difference(a: (u8, u8, u8, u8), b: (u8, u8, u8, u8)) -> bool {
    let old = small_rect(a.0, a.1, a.2, a.3);
    let new = small_rect(b.0, b.1, b.2, b.3);
    let strips: Vec<LayoutRect> = delta_repaint_rects(&old, &new)
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();

    // Each strip lies in exactly one of the two rects.
    let inside_one = strips.iter().all(|s| {
        (old.contains_rect(s) || new.contains_rect(s)) && overlap(s, &old) + overlap(s, &new) == area(s)
    });
    // No two strips overlap.
    let disjoint = strips
        .iter()
        .enumerate()
        .all(|(i, s)| strips.iter().skip(i + 1).all(|t| overlap(s, t) == 0.0));
    // Together they cover the whole symmetric difference.
    let total: f32 = strips.iter().map(area).sum();
    let expected = area(&old) + area(&new) - 2.0 * overlap(&old, &new);

    inside_one && disjoint && total == expected
}

// ========== Repaint after layout ==========

#[test]
fn test_growing_box_repaints_only_the_new_strip() {
    let (mut tree, block) = tree_with_block(20.0);
    let old = rect(0.0, 0.0, 200.0, 20.0);
    let new = rect(0.0, 0.0, 200.0, 40.0);

    let full = tree.repaint_after_layout_if_needed(block, None, &old, &old, Some(&new), Some(&new));
    assert!(!full);
    let repaints = tree.frame_view_mut().take_repaints();
    let rects: Vec<LayoutRect> = repaints.iter().map(|r| r.rect).collect();
    assert_eq!(rects, vec![rect(0.0, 20.0, 200.0, 20.0)]);
    assert!(repaints.iter().all(|r| r.target == RepaintTarget::View));
}

#[test]
fn test_moved_box_repaints_old_and_new_bounds() {
    let (mut tree, block) = tree_with_block(20.0);
    let old = rect(0.0, 0.0, 50.0, 20.0);
    let new = rect(0.0, 100.0, 50.0, 20.0);

    let full = tree.repaint_after_layout_if_needed(block, None, &old, &old, Some(&new), Some(&new));
    assert!(full);
    let rects: Vec<LayoutRect> = tree.frame_view_mut().take_repaints().iter().map(|r| r.rect).collect();
    assert_eq!(rects, vec![old, new]);
}

#[test]
fn test_background_image_forces_full_repaint() {
    let (mut tree, block) = tree_with_block(20.0);
    let style = RenderStyle {
        height: Length::Fixed(20.0),
        background: Background {
            image: Some("tile.png".to_string()),
            ..Background::default()
        },
        ..RenderStyle::block()
    };
    tree.set_style(block, Rc::new(style));
    tree.layout();
    let _ = tree.frame_view_mut().take_repaints();

    let old = rect(0.0, 0.0, 200.0, 20.0);
    let new = rect(0.0, 0.0, 200.0, 40.0);
    assert!(tree.repaint_after_layout_if_needed(block, None, &old, &old, Some(&new), Some(&new)));
}

#[test]
fn test_printing_suppresses_repaints() {
    let (mut tree, block) = tree_with_block(20.0);
    tree.set_printing(true);
    let old = rect(0.0, 0.0, 200.0, 20.0);
    let new = rect(0.0, 0.0, 200.0, 40.0);
    assert!(!tree.repaint_after_layout_if_needed(block, None, &old, &old, Some(&new), Some(&new)));
    tree.repaint(block);
    assert!(tree.frame_view().repaints().is_empty());
}

// ========== Repaint log ==========

#[test]
fn test_background_change_repaints_the_box() {
    let (mut tree, block) = tree_with_block(30.0);
    let style = RenderStyle {
        height: Length::Fixed(30.0),
        background: Background {
            color: Color::rgba(255, 0, 0, 255),
            ..Background::default()
        },
        ..RenderStyle::block()
    };
    tree.set_style(block, Rc::new(style));
    tree.layout_if_needed();

    let rects: Vec<LayoutRect> = tree.frame_view_mut().take_repaints().iter().map(|r| r.rect).collect();
    assert!(rects.contains(&rect(0.0, 0.0, 200.0, 30.0)), "{rects:?}");
}

#[test]
fn test_repaints_are_clipped_to_the_visible_area() {
    let (mut tree, _) = tree_with_block(20.0);
    tree.frame_view_mut().set_scroll_offset(LayoutOffset::new(0.0, 50.0));
    tree.repaint_view_rectangle(&rect(0.0, 0.0, 100.0, 100.0));
    tree.repaint_view_rectangle(&rect(0.0, 0.0, 100.0, 10.0));

    let rects: Vec<LayoutRect> = tree.frame_view_mut().take_repaints().iter().map(|r| r.rect).collect();
    assert_eq!(rects, vec![rect(0.0, 50.0, 100.0, 50.0)]);
}
