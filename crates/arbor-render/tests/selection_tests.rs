//! Integration tests for selection state and selection repaints.

use std::rc::Rc;

use arbor_render::style::RenderStyle;
use arbor_render::{
    BlockFlavor, LayoutSize, RenderId, RenderTree, SelectionRange, SelectionRepaintMode, SelectionState,
};
use quickcheck_macros::quickcheck;

/// A laid out block holding two text runs, with the repaint log drained.
fn two_runs() -> (RenderTree, RenderId, RenderId, RenderId) {
    let mut tree = RenderTree::new(LayoutSize::new(400.0, 300.0));
    let view = tree.view();
    let block = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
    tree.add_child(view, block, None);
    let first = tree.create_text("hello ", Rc::new(RenderStyle::default()), None);
    let second = tree.create_text("world", Rc::new(RenderStyle::default()), None);
    tree.add_child(block, first, None);
    tree.add_child(block, second, None);
    tree.layout();
    let _ = tree.frame_view_mut().take_repaints();
    (tree, block, first, second)
}

/// A forward range over the two runs: both ends in "hello ", both in
/// "world", or spanning from the first into the second.
fn range_over(first: RenderId, second: RenderId, spec: (u8, u8, u8)) -> SelectionRange {
    let (kind, a, b) = spec;
    match kind % 3 {
        0 => {
            let (lo, hi) = ordered(usize::from(a) % 7, usize::from(b) % 7);
            SelectionRange::new(first, lo, first, hi)
        }
        1 => {
            let (lo, hi) = ordered(usize::from(a) % 6, usize::from(b) % 6);
            SelectionRange::new(second, lo, second, hi)
        }
        _ => SelectionRange::new(first, usize::from(a) % 7, second, usize::from(b) % 6),
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

// ========== States ==========

#[test]
fn test_selection_marks_endpoints_and_their_block() {
    let (mut tree, block, first, second) = two_runs();
    tree.set_selection(SelectionRange::new(first, 1, second, 3), SelectionRepaintMode::RepaintNewXorOld);

    assert_eq!(tree.get(first).selection_state(), SelectionState::Start);
    assert_eq!(tree.get(second).selection_state(), SelectionState::End);
    assert_eq!(tree.get(block).selection_state(), SelectionState::Both);
    assert!(tree.is_selection_border(first));
    assert!(!tree.selection_bounds(false).is_empty());
}

#[test]
fn test_selection_inside_one_run_is_both() {
    let (mut tree, _, first, second) = two_runs();
    tree.set_selection(SelectionRange::new(first, 0, first, 2), SelectionRepaintMode::RepaintNewXorOld);

    assert_eq!(tree.get(first).selection_state(), SelectionState::Both);
    assert_eq!(tree.get(second).selection_state(), SelectionState::None);
}

#[test]
fn test_half_open_range_is_ignored() {
    let (mut tree, _, first, _) = two_runs();
    let range = SelectionRange {
        start: Some(first),
        ..SelectionRange::default()
    };
    tree.set_selection(range, SelectionRepaintMode::RepaintNewXorOld);

    assert!(tree.selection().is_empty());
    assert_eq!(tree.get(first).selection_state(), SelectionState::None);
}

// ========== Repaints ==========

#[test]
fn test_new_selection_repaints() {
    let (mut tree, _, first, second) = two_runs();
    tree.set_selection(SelectionRange::new(first, 1, second, 3), SelectionRepaintMode::RepaintNewXorOld);
    assert!(!tree.frame_view().repaints().is_empty());
}

#[test]
fn test_repeating_a_selection_repaints_nothing() {
    let (mut tree, _, first, second) = two_runs();
    let range = SelectionRange::new(first, 1, second, 3);
    tree.set_selection(range, SelectionRepaintMode::RepaintNewXorOld);
    let _ = tree.frame_view_mut().take_repaints();

    tree.set_selection(range, SelectionRepaintMode::RepaintNewXorOld);
    assert!(tree.frame_view().repaints().is_empty());
    assert_eq!(*tree.selection(), range);
}

#[test]
fn test_repaint_nothing_mode_still_updates_states() {
    let (mut tree, _, first, second) = two_runs();
    tree.set_selection(SelectionRange::new(first, 0, second, 5), SelectionRepaintMode::RepaintNothing);

    assert!(tree.frame_view().repaints().is_empty());
    assert_eq!(tree.get(second).selection_state(), SelectionState::End);
}

#[test]
fn test_clearing_the_selection_resets_states_and_repaints() {
    let (mut tree, block, first, second) = two_runs();
    tree.set_selection(SelectionRange::new(first, 1, second, 3), SelectionRepaintMode::RepaintNewXorOld);
    let _ = tree.frame_view_mut().take_repaints();

    tree.clear_selection();
    assert!(tree.selection().is_empty());
    for id in [block, first, second] {
        assert_eq!(tree.get(id).selection_state(), SelectionState::None);
    }
    assert!(!tree.frame_view().repaints().is_empty());
}

#[quickcheck]
fn prop_reapplying_a_selection_repaints_nothing(old: (u8, u8, u8), new: (u8, u8, u8)) -> bool {
    let (mut tree, _, first, second) = two_runs();
    tree.set_selection(range_over(first, second, old), SelectionRepaintMode::RepaintNewXorOld);
    let range = range_over(first, second, new);
    tree.set_selection(range, SelectionRepaintMode::RepaintNewXorOld);
    let _ = tree.frame_view_mut().take_repaints();

    tree.set_selection(range, SelectionRepaintMode::RepaintNewXorOld);
    tree.frame_view().repaints().is_empty() && *tree.selection() == range
}

#[quickcheck]
fn prop_new_minus_old_repaints_a_subset_of_xor(old: (u8, u8, u8), new: (u8, u8, u8)) -> bool {
    let repaints = |mode: SelectionRepaintMode| {
        let (mut tree, _, first, second) = two_runs();
        tree.set_selection(range_over(first, second, old), SelectionRepaintMode::RepaintNewXorOld);
        let _ = tree.frame_view_mut().take_repaints();
        tree.set_selection(range_over(first, second, new), mode);
        tree.frame_view_mut().take_repaints()
    };
    let xor = repaints(SelectionRepaintMode::RepaintNewXorOld);
    let minus = repaints(SelectionRepaintMode::RepaintNewMinusOld);
    minus.len() <= xor.len() && minus.iter().all(|record| xor.contains(record))
}
