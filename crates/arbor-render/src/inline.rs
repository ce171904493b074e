//! Inline boxes: continuations and line-box geometry.
//!
//! An inline cannot contain a block. When a block child arrives, the inline
//! and every inline ancestor up to the containing block are split into a
//! continuation chain: the original pieces keep the content before the
//! block, an anonymous block holds the block, and clones take the rest.
//!
//! Inlines that paint nothing themselves are culled: they have no line
//! boxes of their own and derive their geometry from their children.

use std::rc::Rc;

use arbor_common::warning::warn_once;
use log::debug;

use crate::geometry::{LayoutOffset, LayoutRect, unite};
use crate::layout_bits::MarkingBehavior;
use crate::object::{BlockData, BlockFlavor, Continuation, InlineData, RenderFlags, RenderId, RenderKind};
use crate::style::{Display, RenderStyle, VerticalAlign};
use crate::tree::RenderTree;

/// Deepest inline nesting a split clones. Past it, ancestors keep their
/// trailing children instead of being cloned.
pub const MAX_SPLIT_DEPTH: usize = 200;

impl RenderTree {
    // ========== Continuations ==========

    /// The next inline piece of the chain `id` belongs to.
    #[must_use]
    pub fn inline_element_continuation(&self, id: RenderId) -> Option<RenderId> {
        match self.objects[id].continuation()? {
            Continuation::Inline(next) => Some(next),
            Continuation::Block(next) => self.inline_element_continuation(next),
        }
    }

    fn next_continuation(&self, id: RenderId) -> Option<RenderId> {
        let obj = &self.objects[id];
        if obj.is_render_inline() {
            obj.continuation().map(Continuation::id)
        } else {
            self.inline_element_continuation(id)
        }
    }

    /// The object whose continuation link points at `id`.
    #[must_use]
    pub fn continuation_predecessor(&self, id: RenderId) -> Option<RenderId> {
        self.objects
            .iter()
            .find(|(_, obj)| obj.continuation().map(Continuation::id) == Some(id))
            .map(|(candidate, _)| candidate)
    }

    /// The piece of the chain starting at `inline` that content inserted
    /// before `before` belongs in.
    fn continuation_before(&self, inline: RenderId, before: Option<RenderId>) -> RenderId {
        if before.is_some_and(|b| self.objects[b].parent == Some(inline)) {
            return inline;
        }
        let mut current = self.next_continuation(inline);
        let mut next_to_last = inline;
        let mut last = inline;
        while let Some(c) = current {
            if let Some(b) = before.filter(|&b| self.objects[b].parent == Some(c)) {
                return if self.objects[c].first_child == Some(b) { last } else { c };
            }
            next_to_last = last;
            last = c;
            current = self.next_continuation(c);
        }
        if before.is_none() && self.objects[last].first_child.is_none() {
            return next_to_last;
        }
        last
    }

    /// Insert into an inline, routing through its continuation chain.
    pub(crate) fn inline_add_child(&mut self, inline: RenderId, child: RenderId, before: Option<RenderId>) {
        if self.objects[inline].continuation().is_some() {
            self.add_child_to_continuation(inline, child, before);
        } else {
            self.add_child_ignoring_continuation(inline, child, before);
        }
    }

    fn add_child_ignoring_continuation(&mut self, flow: RenderId, child: RenderId, before: Option<RenderId>) {
        if !self.objects[flow].is_render_inline() {
            // The block pieces of a chain insert like any block.
            self.add_child(flow, child, before);
            return;
        }

        let child_obj = &self.objects[child];
        if !child_obj.is_inline() && !child_obj.is_floating_or_out_of_flow_positioned() {
            let mut style = RenderStyle::create_anonymous_style_with_display(&self.objects[flow].style, Display::Block);
            // Blocks inside a relatively positioned inline move with it.
            if let Some(positioned) = self.in_flow_positioned_inline_ancestor(flow) {
                style.position = self.objects[positioned].style.position;
            }
            let new_box =
                self.create_anonymous_renderer(RenderKind::Block(BlockData::new(BlockFlavor::Flow)), Rc::new(style));
            let old_continuation = self.objects[flow].continuation();
            self.objects[flow].set_continuation(Some(Continuation::Block(new_box)));
            self.split_flow(flow, before, new_box, child, old_continuation);
            return;
        }

        self.add_child_generic(flow, child, before);
        self.set_needs_layout_and_pref_widths_recalc(child);
    }

    fn in_flow_positioned_inline_ancestor(&self, id: RenderId) -> Option<RenderId> {
        let mut current = Some(id);
        while let Some(c) = current.filter(|&c| self.objects[c].is_render_inline()) {
            if self.objects[c].is_in_flow_positioned() {
                return Some(c);
            }
            current = self.objects[c].parent;
        }
        None
    }

    /// Insert into the piece of the chain that keeps the number of
    /// continuations minimal.
    pub fn add_child_to_continuation(&mut self, inline: RenderId, child: RenderId, before: Option<RenderId>) {
        let flow = self.continuation_before(inline, before);
        let before_parent = match before {
            Some(b) => self.objects[b].parent.unwrap_or(flow),
            None => self.next_continuation(flow).unwrap_or(flow),
        };

        if self.objects[child].is_floating_or_out_of_flow_positioned() {
            self.add_child_ignoring_continuation(before_parent, child, before);
            return;
        }

        let child_inline = self.objects[child].is_inline();
        let before_parent_inline = self.objects[before_parent].is_inline();
        let flow_inline = self.objects[flow].is_inline();

        if flow == before_parent || child_inline == before_parent_inline {
            self.add_child_ignoring_continuation(before_parent, child, before);
        } else if flow_inline == child_inline {
            // Treat like an append.
            self.add_child_ignoring_continuation(flow, child, None);
        } else {
            self.add_child_ignoring_continuation(before_parent, child, before);
        }
    }

    fn clone_inline(&mut self, inline: RenderId) -> RenderId {
        let obj = &self.objects[inline];
        let style = obj.style_rc();
        let node = obj.node;
        let is_anonymous = obj.is_anonymous();
        let always_create = obj.inline().is_some_and(InlineData::always_create_line_boxes);
        let clone = self.create_renderer(RenderKind::Inline(InlineData::default()), style, None);
        let clone_obj = &mut self.objects[clone];
        clone_obj.node = node;
        clone_obj.set_flag(RenderFlags::ANONYMOUS, is_anonymous);
        if let Some(data) = clone_obj.inline_mut() {
            data.always_create_line_boxes = always_create;
        }
        clone
    }

    /// Split the inline chain above `inline` around `new_block`, which will
    /// receive `new_child`.
    pub(crate) fn split_flow(
        &mut self,
        inline: RenderId,
        before: Option<RenderId>,
        new_block: RenderId,
        new_child: RenderId,
        old_continuation: Option<Continuation>,
    ) {
        let Some(mut block) = self.containing_block(inline) else {
            warn_once("render", "block added to an inline without a containing block");
            return;
        };
        self.dirty_line_boxes(block);

        let pre;
        let made_new_before_block;
        let reusable = self.objects[block].is_anonymous_block()
            && self.objects[block].continuation().is_none()
            && self.objects[block].parent.is_some();
        match self.containing_block(block).filter(|_| reusable) {
            Some(outer) => {
                // The anonymous block around us becomes the pre block.
                pre = block;
                if let Some(data) = self.objects[pre].block_mut() {
                    data.positioned_objects.clear();
                    data.floating_objects.clear();
                }
                block = outer;
                made_new_before_block = false;
            }
            None => {
                pre = self.create_anonymous_block(block);
                made_new_before_block = true;
            }
        }

        let post = self.create_anonymous_block(block);
        let box_first = if made_new_before_block {
            self.objects[block].first_child
        } else {
            self.objects[pre].next_sibling
        };
        if made_new_before_block {
            self.insert_child_node(block, pre, box_first, true);
        }
        self.insert_child_node(block, new_block, box_first, true);
        self.insert_child_node(block, post, box_first, true);
        self.objects[block].set_flag(RenderFlags::CHILDREN_INLINE, false);

        if made_new_before_block {
            let mut current = box_first;
            while let Some(c) = current {
                current = self.objects[c].next_sibling;
                let _ = self.remove_child_node(block, c, true);
                self.insert_child_node(pre, c, None, true);
                self.set_needs_layout_and_pref_widths_recalc(c);
            }
        }

        self.split_inlines(inline, pre, post, new_block, before, old_continuation);

        self.objects[new_block].set_flag(RenderFlags::CHILDREN_INLINE, false);
        self.add_child(new_block, new_child, None);

        self.set_needs_layout_and_pref_widths_recalc(pre);
        self.set_needs_layout_and_pref_widths_recalc(block);
        self.set_needs_layout_and_pref_widths_recalc(post);
    }

    fn split_inlines(
        &mut self,
        inline: RenderId,
        from_block: RenderId,
        to_block: RenderId,
        middle_block: RenderId,
        before: Option<RenderId>,
        old_continuation: Option<Continuation>,
    ) {
        let mut clone = self.clone_inline(inline);
        self.objects[clone].set_continuation(old_continuation);

        // Everything from the insertion point on moves into the clone.
        let mut current = before;
        while let Some(c) = current {
            current = self.objects[c].next_sibling;
            let moved = self.remove_child_node(inline, c, true);
            self.add_child_ignoring_continuation(clone, moved, None);
            self.set_needs_layout_and_pref_widths_recalc(moved);
        }

        self.objects[middle_block].set_continuation(Some(Continuation::Inline(clone)));

        // Clone each inline ancestor up to the block we split in.
        let mut current_parent = self.objects[inline].parent;
        let mut current_child = inline;
        let mut depth = 1;
        while let Some(ancestor) = current_parent.filter(|&p| p != from_block) {
            debug_assert!(self.objects[ancestor].is_render_inline());
            if depth < MAX_SPLIT_DEPTH {
                let child_clone = clone;
                clone = self.clone_inline(ancestor);
                self.add_child_ignoring_continuation(clone, child_clone, None);

                let previous = self.objects[ancestor].continuation();
                self.objects[ancestor].set_continuation(Some(Continuation::Inline(clone)));
                self.objects[clone].set_continuation(previous);

                let mut sibling = self.objects[current_child].next_sibling;
                while let Some(s) = sibling {
                    sibling = self.objects[s].next_sibling;
                    let moved = self.remove_child_node(ancestor, s, true);
                    self.add_child_ignoring_continuation(clone, moved, None);
                    self.set_needs_layout_and_pref_widths_recalc(moved);
                }
            } else if depth == MAX_SPLIT_DEPTH {
                warn_once("render", "inline split depth cap reached; deeper ancestors are not cloned");
            }
            current_child = ancestor;
            current_parent = self.objects[ancestor].parent;
            depth += 1;
        }
        debug!(target: "arbor::render", "split {inline} across {depth} inline levels");

        self.insert_child_node(to_block, clone, None, true);

        let mut sibling = self.objects[current_child].next_sibling;
        while let Some(s) = sibling {
            sibling = self.objects[s].next_sibling;
            let moved = self.remove_child_node(from_block, s, true);
            self.insert_child_node(to_block, moved, None, true);
        }
    }

    // ========== Line boxes ==========

    /// Whether `id` lays out through its own line boxes instead of its
    /// children's.
    #[must_use]
    pub fn always_create_line_boxes(&self, id: RenderId) -> bool {
        self.objects[id].inline().is_some_and(InlineData::always_create_line_boxes)
    }

    /// Switch `id` to materialised line boxes when its vertical metrics
    /// differ from its parent's. Once set, the flag stays.
    pub fn update_always_create_line_boxes(&mut self, id: RenderId, full_layout: bool) {
        if !self.objects[id].is_render_inline() || self.always_create_line_boxes(id) {
            return;
        }
        let Some(parent) = self.objects[id].parent else {
            return;
        };
        let parent_obj = &self.objects[parent];
        let style = &self.objects[id].style;
        let parent_inline = parent_obj.is_render_inline();
        let always_create = (parent_inline && self.always_create_line_boxes(parent))
            || (parent_inline && parent_obj.style.vertical_align != VerticalAlign::Baseline)
            || style.vertical_align != VerticalAlign::Baseline
            || parent_obj.style.font_size != style.font_size
            || parent_obj.style.line_height != style.line_height;
        if always_create {
            if !full_layout {
                self.dirty_line_boxes(id);
            }
            self.set_always_create_line_boxes(id);
        }
    }

    pub(crate) fn set_always_create_line_boxes(&mut self, id: RenderId) {
        if let Some(data) = self.objects[id].inline_mut() {
            data.always_create_line_boxes = true;
        }
    }

    /// Throw away the line boxes of `id`.
    pub fn dirty_line_boxes(&mut self, id: RenderId) {
        let culled = self.objects[id].is_render_inline() && !self.always_create_line_boxes(id);
        if culled {
            // A culled inline owns nothing; its children hold the boxes.
            for child in self.child_ids(id) {
                if self.objects[child].is_render_inline() || self.objects[child].is_text() {
                    self.dirty_line_boxes(child);
                }
            }
            return;
        }
        match &mut self.objects[id].kind {
            RenderKind::Block(data) => {
                data.line_boxes.clear();
                data.line_boxes_dirty = true;
            }
            RenderKind::Inline(data) => data.line_boxes.clear(),
            RenderKind::Text(data) => data.boxes.clear(),
            RenderKind::View | RenderKind::Replaced(_) => {}
        }
    }

    /// A child of `container` changed: its lines must be rebuilt.
    pub(crate) fn dirty_lines_from_changed_child(&mut self, container: RenderId) {
        let block = if self.objects[container].is_render_inline() {
            self.containing_block(container)
        } else {
            Some(container)
        };
        if let Some(data) = block.and_then(|b| self.objects[b].block_mut()) {
            data.line_boxes_dirty = true;
        }
    }

    /// Line fragments of `id` in its containing block's space, whether
    /// materialised or derived from its children.
    #[must_use]
    pub fn line_box_rects(&self, id: RenderId) -> Vec<LayoutRect> {
        let mut rects = Vec::new();
        match &self.objects[id].kind {
            RenderKind::Inline(data) if data.always_create_line_boxes => {
                rects.extend(data.line_boxes.iter().map(|b| b.rect));
            }
            RenderKind::Inline(_) => self.generate_culled_line_box_rects(id, &mut rects),
            RenderKind::Text(data) => rects.extend(data.boxes.iter().map(|b| b.rect)),
            _ => {}
        }
        rects
    }

    fn generate_culled_line_box_rects(&self, id: RenderId, rects: &mut Vec<LayoutRect>) {
        for child in self.children(id) {
            let obj = &self.objects[child];
            if obj.is_floating_or_out_of_flow_positioned() {
                continue;
            }
            match &obj.kind {
                RenderKind::Inline(_) => rects.extend(self.line_box_rects(child)),
                RenderKind::Text(data) => rects.extend(data.boxes.iter().map(|b| b.rect)),
                RenderKind::Block(_) | RenderKind::Replaced(_) => {
                    let margins = obj.margins;
                    let frame = obj.frame_rect;
                    rects.push(LayoutRect::new(
                        euclid::point2(frame.min_x() - margins.left, frame.min_y()),
                        euclid::size2(frame.width() + margins.horizontal(), frame.height()),
                    ));
                }
                RenderKind::View => {}
            }
        }
    }

    /// First line fragment of `id`.
    #[must_use]
    pub fn first_line_box_rect(&self, id: RenderId) -> Option<LayoutRect> {
        self.line_box_rects(id).first().copied()
    }

    /// Whether `id` produced any line fragment.
    #[must_use]
    pub fn has_inline_fragments(&self, id: RenderId) -> bool {
        !self.line_box_rects(id).is_empty()
    }

    /// Union of the line fragments of `id`.
    #[must_use]
    pub fn lines_bounding_box(&self, id: RenderId) -> LayoutRect {
        self.line_box_rects(id)
            .iter()
            .fold(LayoutRect::zero(), |acc, r| unite(&acc, r))
    }

    /// Everything the line fragments of `id` paint, descendants included.
    #[must_use]
    pub fn lines_visual_overflow_bounding_box(&self, id: RenderId) -> LayoutRect {
        if !self.always_create_line_boxes(id) {
            return self.culled_inline_visual_overflow_bounding_box(id);
        }
        let mut result = self.lines_bounding_box(id);
        for child in self.children(id) {
            if self.objects[child].is_render_inline() || self.objects[child].is_text() {
                result = unite(&result, &self.lines_visual_overflow_bounding_box_of_child(child));
            }
        }
        result
    }

    fn lines_visual_overflow_bounding_box_of_child(&self, child: RenderId) -> LayoutRect {
        if self.objects[child].is_text() {
            return self.lines_bounding_box(child);
        }
        self.lines_visual_overflow_bounding_box(child)
    }

    /// Visual overflow of a culled inline, read off its children.
    #[must_use]
    pub fn culled_inline_visual_overflow_bounding_box(&self, id: RenderId) -> LayoutRect {
        let mut result = LayoutRect::zero();
        for child in self.children(id) {
            let obj = &self.objects[child];
            if obj.is_floating_or_out_of_flow_positioned() {
                continue;
            }
            let r = match &obj.kind {
                RenderKind::Block(_) | RenderKind::Replaced(_) if !obj.has_layer() => {
                    obj.visual_overflow_rect().translate(obj.location().to_vector())
                }
                RenderKind::Inline(_) if !obj.has_layer() => self.lines_visual_overflow_bounding_box(child),
                RenderKind::Text(_) => self.lines_bounding_box(child),
                _ => LayoutRect::zero(),
            };
            result = unite(&result, &r);
        }
        result
    }

    // ========== Style ==========

    /// Push the style of `inline` to the other inline pieces of its chain,
    /// and the position of anonymous block continuations when it changed.
    pub(crate) fn update_continuation_styles(&mut self, inline: RenderId, old_style: Option<&RenderStyle>) {
        let new_style = self.objects[inline].style_rc();
        let first = self.inline_element_continuation(inline);
        let mut current = first;
        while let Some(c) = current {
            let next = self.objects[c].continuation();
            self.objects[c].set_continuation(None);
            self.set_style(c, Rc::clone(&new_style));
            self.objects[c].set_continuation(next);
            current = self.inline_element_continuation(c);
        }

        let Some(old_style) = old_style else {
            return;
        };
        let position_changed = new_style.position != old_style.position
            && (new_style.has_in_flow_position() || old_style.has_in_flow_position());
        if first.is_none() || !position_changed {
            return;
        }
        let mut block = self
            .containing_block(inline)
            .and_then(|cb| self.objects[cb].next_sibling);
        while let Some(b) = block.filter(|&b| self.objects[b].is_anonymous_block()) {
            block = self.objects[b].next_sibling;
            let obj = &self.objects[b];
            if !obj.is_anonymous_block_continuation() || obj.style.position == new_style.position {
                continue;
            }
            // Still inside another positioned inline: keep the position.
            let still_positioned = self
                .inline_element_continuation(b)
                .and_then(|c| self.in_flow_positioned_inline_ancestor(c))
                .is_some();
            if old_style.has_in_flow_position() && still_positioned {
                continue;
            }
            let mut block_style = RenderStyle::create_anonymous_style_with_display(&obj.style, Display::Block);
            block_style.position = new_style.position;
            self.set_style(b, Rc::new(block_style));
        }
    }

    /// Inline chains carry the in-flow offsets of their positioned inline
    /// ancestors into their anonymous block continuations.
    #[must_use]
    pub(crate) fn accumulate_in_flow_position_offsets(&self, id: RenderId) -> LayoutOffset {
        let obj = &self.objects[id];
        let mut offset = LayoutOffset::zero();
        if !obj.is_anonymous_block() || !obj.style.has_in_flow_position() {
            return offset;
        }
        let mut current = self.inline_element_continuation(id);
        while let Some(c) = current.filter(|&c| self.objects[c].is_render_inline()) {
            if self.objects[c].is_in_flow_positioned() {
                offset += self.offset_for_in_flow_position(c);
            }
            current = self.objects[c].parent;
        }
        offset
    }

    pub(crate) fn mark_inline_for_line_rebuild(&mut self, id: RenderId) {
        self.dirty_line_boxes(id);
        self.set_needs_layout(id, MarkingBehavior::MarkContainingBlockChain);
    }
}
