//! The document selection.
//!
//! The view keeps the two endpoints. Every selectable leaf between them
//! carries a [`SelectionState`], and so do the blocks containing them, since
//! blocks paint the gaps between selected lines. Changing the selection
//! compares the old and new selected sets and repaints only what differs.

use std::collections::HashMap;

use log::trace;

use crate::geometry::{LayoutRect, intersect, rect, unite};
use crate::object::{RenderId, RenderKind, SelectionState};
use crate::tree::RenderTree;

/// Endpoints of the selection. Offsets are byte offsets into text, or child
/// indices for other renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionRange {
    /// Renderer holding the start.
    pub start: Option<RenderId>,
    /// Offset of the start inside `start`.
    pub start_pos: usize,
    /// Renderer holding the end.
    pub end: Option<RenderId>,
    /// Offset of the end inside `end`.
    pub end_pos: usize,
}

impl SelectionRange {
    /// A range from `start`/`start_pos` to `end`/`end_pos`.
    #[must_use]
    pub const fn new(start: RenderId, start_pos: usize, end: RenderId, end_pos: usize) -> Self {
        Self {
            start: Some(start),
            start_pos,
            end: Some(end),
            end_pos,
        }
    }

    /// Whether nothing is selected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start.is_none()
    }
}

/// Which objects a selection change repaints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionRepaintMode {
    /// Objects whose selection changed, old or new.
    #[default]
    RepaintNewXorOld,
    /// Only newly selected objects.
    RepaintNewMinusOld,
    /// Nothing.
    RepaintNothing,
}

/// Repaint information for one selected renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SelectionInfo {
    rect: LayoutRect,
    repaint_container: Option<RenderId>,
    state: SelectionState,
}

impl RenderTree {
    /// The current selection.
    #[must_use]
    pub const fn selection(&self) -> &SelectionRange {
        &self.view_state.selection
    }

    /// Select from `start` to `end`, repainting what changed.
    pub fn set_selection(&mut self, range: SelectionRange, mode: SelectionRepaintMode) {
        // Both endpoints or neither.
        if range.start.is_some() != range.end.is_some() {
            return;
        }
        let endpoints = range.start.zip(range.end);
        if endpoints.is_some_and(|(s, e)| !self.objects.contains(s) || !self.objects.contains(e)) {
            return;
        }
        // Endpoints in different flow threads are not selectable together.
        if endpoints.is_some_and(|(s, e)| self.flow_thread_containing(s) != self.flow_thread_containing(e)) {
            return;
        }
        if range == self.view_state.selection {
            return;
        }

        let old_range = self.view_state.selection;
        let (old_objects, old_blocks) = self.collect_selected(&old_range, true);

        for &id in old_objects.keys().chain(old_blocks.keys()) {
            self.objects[id].selection_state = SelectionState::None;
        }

        self.view_state.selection = range;
        self.mark_selection_states(&range);

        let (mut new_objects, mut new_blocks) = self.collect_selected(&range, true);
        trace!(
            target: "arbor::selection",
            "selection changed: {} objects before, {} after",
            old_objects.len(),
            new_objects.len()
        );
        if mode == SelectionRepaintMode::RepaintNothing {
            return;
        }

        // Objects selected before: repaint the ones whose selection changed.
        for (id, old_info) in &old_objects {
            let new_info = new_objects.remove(id);
            if new_info.is_some_and(|n| n == *old_info) {
                continue;
            }
            if mode == SelectionRepaintMode::RepaintNewXorOld {
                self.repaint_using_container(old_info.repaint_container, &old_info.rect);
            }
            if let Some(new_info) = new_info {
                self.repaint_using_container(new_info.repaint_container, &new_info.rect);
            }
        }
        for info in new_objects.values() {
            self.repaint_using_container(info.repaint_container, &info.rect);
        }

        for (id, old_info) in &old_blocks {
            let new_info = new_blocks.remove(id);
            if new_info.is_some_and(|n| n == *old_info) {
                continue;
            }
            if mode == SelectionRepaintMode::RepaintNewXorOld {
                self.repaint_using_container(old_info.repaint_container, &old_info.rect);
            }
            if let Some(new_info) = new_info {
                self.repaint_using_container(new_info.repaint_container, &new_info.rect);
            }
        }
        for info in new_blocks.values() {
            self.repaint_using_container(info.repaint_container, &info.rect);
        }
    }

    /// Drop the selection, repainting the gaps the selected blocks painted.
    pub fn clear_selection(&mut self) {
        let old_range = self.view_state.selection;
        let (_, old_blocks) = self.collect_selected(&old_range, true);
        for info in old_blocks.values() {
            self.repaint_using_container(info.repaint_container, &info.rect);
        }
        self.set_selection(SelectionRange::default(), SelectionRepaintMode::RepaintNewMinusOld);
    }

    /// Whether `id` carries or is an endpoint of the selection.
    #[must_use]
    pub fn is_selection_border(&self, id: RenderId) -> bool {
        let state = self.objects[id].selection_state;
        let selection = &self.view_state.selection;
        matches!(state, SelectionState::Start | SelectionState::End | SelectionState::Both)
            || selection.start == Some(id)
            || selection.end == Some(id)
    }

    /// Absolute bounds of everything selected, clipped to the visible area
    /// when `clip_to_visible_content` is set.
    #[must_use]
    pub fn selection_bounds(&self, clip_to_visible_content: bool) -> LayoutRect {
        let range = self.view_state.selection;
        let mut bounds = LayoutRect::zero();
        let Some(start) = range.start else {
            return bounds;
        };
        let stop = self.renderer_after_position(range.end, range.end_pos);
        let mut current = Some(start);
        while let Some(c) = current.filter(|&c| Some(c) != stop) {
            if self.can_be_selection_leaf(c) && self.objects[c].selection_state != SelectionState::None {
                let local = self.selection_rect_local(c);
                let absolute = self.compute_rect_for_repaint(c, None, local, false);
                bounds = unite(&bounds, &absolute);
            }
            current = self.next_in_pre_order(c, None);
        }
        if clip_to_visible_content {
            bounds = intersect(&bounds, &self.frame_view.visible_content_rect());
        }
        bounds
    }

    // ========== States ==========

    fn mark_selection_states(&mut self, range: &SelectionRange) {
        let Some((start, end)) = range.start.zip(range.end) else {
            return;
        };
        if start == end {
            self.set_selection_state(start, SelectionState::Both);
        } else {
            self.set_selection_state(start, SelectionState::Start);
            self.set_selection_state(end, SelectionState::End);
        }

        let stop = self.renderer_after_position(range.end, range.end_pos);
        let mut current = Some(start);
        while let Some(c) = current.filter(|&c| Some(c) != stop) {
            if c != start && c != end && self.can_be_selection_leaf(c) {
                self.set_selection_state(c, SelectionState::Inside);
            }
            current = self.next_in_pre_order(c, None);
        }
    }

    /// Set the state of a leaf and fold it into its containing blocks.
    fn set_selection_state(&mut self, id: RenderId, state: SelectionState) {
        let merged = merge_selection_state(self.objects[id].selection_state, state);
        self.objects[id].selection_state = merged;
        let mut block = self.containing_block(id);
        while let Some(b) = block.filter(|&b| !self.objects[b].is_render_view()) {
            let current = self.objects[b].selection_state;
            self.objects[b].selection_state = merge_selection_state(current, state);
            block = self.containing_block(b);
        }
    }

    fn can_be_selection_leaf(&self, id: RenderId) -> bool {
        matches!(self.objects[id].kind, RenderKind::Text(_) | RenderKind::Replaced(_))
    }

    /// The first renderer past offset `pos` of `id` in pre-order.
    fn renderer_after_position(&self, id: Option<RenderId>, pos: usize) -> Option<RenderId> {
        let id = id?;
        self.child_at(id, pos)
            .or_else(|| self.next_in_pre_order_after_children(id, None))
    }

    // ========== Repaint sets ==========

    fn collect_selected(
        &self,
        range: &SelectionRange,
        with_blocks: bool,
    ) -> (HashMap<RenderId, SelectionInfo>, HashMap<RenderId, SelectionInfo>) {
        let mut objects = HashMap::new();
        let mut blocks = HashMap::new();
        let Some(start) = range.start.filter(|&s| self.objects.contains(s)) else {
            return (objects, blocks);
        };
        let stop = self.renderer_after_position(range.end.filter(|&e| self.objects.contains(e)), range.end_pos);

        let mut current = Some(start);
        while let Some(c) = current.filter(|&c| Some(c) != stop) {
            let selectable = self.can_be_selection_leaf(c) || Some(c) == range.start || Some(c) == range.end;
            if selectable && self.objects[c].selection_state != SelectionState::None {
                let _ = objects.insert(c, self.selection_info(c));
                let mut block = self.containing_block(c).filter(|_| with_blocks);
                while let Some(b) = block.filter(|&b| !self.objects[b].is_render_view()) {
                    if blocks.contains_key(&b) {
                        break;
                    }
                    let _ = blocks.insert(b, self.block_selection_info(b));
                    block = self.containing_block(b);
                }
            }
            current = self.next_in_pre_order(c, None);
        }
        (objects, blocks)
    }

    fn selection_info(&self, id: RenderId) -> SelectionInfo {
        let repaint_container = self.container_for_repaint(id);
        let local = self.selection_rect_local(id);
        SelectionInfo {
            rect: self.compute_rect_for_repaint(id, repaint_container, local, false),
            repaint_container,
            state: self.objects[id].selection_state,
        }
    }

    fn block_selection_info(&self, id: RenderId) -> SelectionInfo {
        let repaint_container = self.container_for_repaint(id);
        let obj = &self.objects[id];
        let gaps = if obj.selection_state == SelectionState::None {
            LayoutRect::zero()
        } else {
            obj.content_box_rect()
        };
        SelectionInfo {
            rect: self.compute_rect_for_repaint(id, repaint_container, gaps, false),
            repaint_container,
            state: obj.selection_state,
        }
    }

    /// Selected part of a leaf, in its local space.
    fn selection_rect_local(&self, id: RenderId) -> LayoutRect {
        let obj = &self.objects[id];
        match &obj.kind {
            RenderKind::Text(data) => {
                let range = &self.view_state.selection;
                let len = data.text().len();
                let (from, to) = match obj.selection_state {
                    SelectionState::None => return LayoutRect::zero(),
                    SelectionState::Start => (range.start_pos, len),
                    SelectionState::End => (0, range.end_pos),
                    SelectionState::Both => (range.start_pos, range.end_pos),
                    SelectionState::Inside => (0, len),
                };
                let font_size = obj.style.font_size;
                data.boxes()
                    .iter()
                    .filter(|b| b.start < to && b.end() > from)
                    .map(|b| {
                        let text = data.text();
                        let lead = text.get(b.start..from.max(b.start)).unwrap_or("");
                        let selected = text.get(from.max(b.start)..to.min(b.end())).unwrap_or("");
                        let x = b.rect.min_x() + self.font_metrics.text_width(lead, font_size);
                        let width = self.font_metrics.text_width(selected, font_size).min(b.rect.width());
                        rect(x, b.rect.min_y(), width, b.rect.height())
                    })
                    .fold(LayoutRect::zero(), |acc, r| unite(&acc, &r))
            }
            _ if obj.selection_state == SelectionState::None => LayoutRect::zero(),
            _ => obj.border_box_rect(),
        }
    }
}

/// Combine the state already on an object with one more endpoint.
const fn merge_selection_state(current: SelectionState, incoming: SelectionState) -> SelectionState {
    let opposite_ends = matches!(
        (current, incoming),
        (SelectionState::Start, SelectionState::End) | (SelectionState::End, SelectionState::Start)
    );
    if opposite_ends || matches!(incoming, SelectionState::Both) {
        SelectionState::Both
    } else if matches!(current, SelectionState::None | SelectionState::Inside) {
        incoming
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_selection_state() {
        assert_eq!(merge_selection_state(SelectionState::Start, SelectionState::End), SelectionState::Both);
        assert_eq!(merge_selection_state(SelectionState::None, SelectionState::Inside), SelectionState::Inside);
        assert_eq!(merge_selection_state(SelectionState::Start, SelectionState::Inside), SelectionState::Start);
        assert_eq!(merge_selection_state(SelectionState::Inside, SelectionState::End), SelectionState::End);
    }
}
