//! Out-of-flow positioned boxes.
//!
//! [§ 10.3.7 Absolutely positioned, non-replaced elements](https://www.w3.org/TR/CSS2/visudet.html#abs-non-replaced-width)
//!
//! "The constraint that determines the used values for these elements is:
//!
//! 'left' + 'margin-left' + 'border-left-width' + 'padding-left' + 'width' +
//! 'padding-right' + 'border-right-width' + 'margin-right' + 'right'
//! = width of containing block"
//!
//! Each containing block keeps the list of out-of-flow boxes it lays out
//! (the view keeps its own in [`ViewState`](crate::view::ViewState)). The
//! boxes are laid out after the block's normal flow, once static positions
//! are known. Geometry is solved in the containing block's local space and
//! then shifted into the space of the box's container.

use log::trace;

use crate::geometry::{LayoutOffset, LayoutPoint, LayoutRect};
use crate::layout_bits::MarkingBehavior;
use crate::object::RenderId;
use crate::style::Position;
use crate::tree::RenderTree;

impl RenderTree {
    // ========== Lists ==========

    /// Out-of-flow boxes laid out by `block`.
    #[must_use]
    pub fn positioned_objects_of(&self, block: RenderId) -> Vec<RenderId> {
        if self.objects[block].is_render_view() {
            return self.view_state.positioned_objects.clone();
        }
        self.objects[block]
            .block()
            .map(|data| data.positioned_objects.clone())
            .unwrap_or_default()
    }

    pub(crate) fn retain_positioned_objects(&mut self, block: RenderId, mut keep: impl FnMut(RenderId) -> bool) {
        if self.objects[block].is_render_view() {
            self.view_state.positioned_objects.retain(|&p| keep(p));
        } else if let Some(data) = self.objects[block].block_mut() {
            data.positioned_objects.retain(|&p| keep(p));
        }
    }

    pub(crate) fn insert_positioned_object(&mut self, block: RenderId, id: RenderId) {
        let list = if self.objects[block].is_render_view() {
            &mut self.view_state.positioned_objects
        } else if let Some(data) = self.objects[block].block_mut() {
            &mut data.positioned_objects
        } else {
            return;
        };
        if !list.contains(&id) {
            list.push(id);
        }
    }

    /// Record where the out-of-flow `id` would sit in normal flow and hand
    /// it to its containing block.
    ///
    /// `static_position` is in the space of the block laying out the
    /// parent's content.
    pub(crate) fn register_out_of_flow_child(&mut self, id: RenderId, static_position: LayoutPoint) {
        let obj = &self.objects[id];
        let moved = obj.static_position != static_position;
        let uses_static =
            obj.style.has_static_inline_position() || obj.style.has_static_block_position();
        self.objects[id].static_position = static_position;
        if moved && uses_static && self.objects[id].ever_had_layout() {
            self.set_needs_layout(id, MarkingBehavior::MarkOnlyThis);
        }
        if let Some(cb) = self.containing_block(id) {
            self.insert_positioned_object(cb, id);
        }
    }

    // ========== Layout ==========

    /// Lay out the out-of-flow boxes of `block`, dropping entries that no
    /// longer belong to it.
    pub(crate) fn layout_positioned_objects(&mut self, block: RenderId, relayout_children: bool) {
        let list = self.positioned_objects_of(block);
        if list.is_empty() {
            return;
        }
        let mut stale = Vec::new();
        for positioned in list {
            if !self.objects.contains(positioned)
                || !self.is_rooted(positioned)
                || self.containing_block(positioned) != Some(block)
            {
                stale.push(positioned);
                continue;
            }
            if relayout_children {
                self.set_needs_layout(positioned, MarkingBehavior::MarkOnlyThis);
            }
            let obj = &self.objects[positioned];
            if obj.needs_positioned_movement_layout_only()
                && self.try_layout_doing_positioned_movement_only(positioned)
            {
                self.clear_needs_layout(positioned);
                continue;
            }
            if self.objects[positioned].needs_layout() {
                self.layout_object(positioned);
            }
        }
        if !stale.is_empty() {
            self.retain_positioned_objects(block, |p| !stale.contains(&p));
        }
    }

    /// Move `id` to its new offsets without laying out its content.
    /// Returns `false` when the move also changes its width, which needs a
    /// full layout.
    pub(crate) fn try_layout_doing_positioned_movement_only(&mut self, id: RenderId) -> bool {
        if !self.objects[id].is_out_of_flow_positioned() {
            // Relative offsets are applied by mapping; the layer repaints
            // the movement.
            return true;
        }
        let old_width = self.objects[id].size().width;
        let width = if self.objects[id].is_render_replaced() {
            old_width
        } else {
            self.positioned_logical_width(id)
        };
        if width != old_width {
            return false;
        }
        let height = self.objects[id].size().height;
        let x = self.positioned_logical_left(id, width);
        let y = self.positioned_logical_top(id, height);
        self.set_positioned_location(id, LayoutPoint::new(x, y));
        trace!(target: "arbor::layout", "positioned movement of {id}");
        true
    }

    // ========== Geometry ==========

    /// The rectangle the offsets of `id` refer to, in the containing
    /// block's local space.
    ///
    /// [§ 10.1 Definition of "containing block"](https://www.w3.org/TR/CSS2/visudet.html#containing-block-details)
    ///
    /// "the containing block is formed by the padding edge of the ancestor"
    pub(crate) fn containing_block_rect_for_positioned(&self, id: RenderId) -> LayoutRect {
        let Some(cb) = self.containing_block(id) else {
            return LayoutRect::new(LayoutPoint::zero(), self.frame_view.viewport());
        };
        let cb_obj = &self.objects[cb];
        if cb_obj.is_render_view() {
            return LayoutRect::new(LayoutPoint::zero(), self.frame_view.viewport());
        }
        cb_obj.padding_box_rect()
    }

    /// Border-box width of the out-of-flow, non-replaced `id`.
    ///
    /// [§ 10.3.7](https://www.w3.org/TR/CSS2/visudet.html#abs-non-replaced-width)
    pub(crate) fn positioned_logical_width(&mut self, id: RenderId) -> f32 {
        let cb_width = self.containing_block_rect_for_positioned(id).width();
        let style = self.objects[id].style_rc();
        let bp = style.border_widths().horizontal() + style.padding.horizontal();
        let margins = style.margin.horizontal();
        let left = style.offsets.left.resolve(cb_width);
        let right = style.offsets.right.resolve(cb_width);

        if let Some(width) = style.width.resolve(cb_width) {
            return width + bp;
        }
        if let (Some(left), Some(right)) = (left, right) {
            // "'width' is 'auto', 'left' and 'right' are not 'auto', then
            // solve for 'width'"
            return (cb_width - left - right - margins).max(bp);
        }
        // "then the width is shrink-to-fit."
        let (min, max) = self.preferred_logical_widths(id);
        let available = cb_width - left.unwrap_or(0.0) - right.unwrap_or(0.0) - margins;
        max.min(available.max(min)).max(bp)
    }

    /// Border-box height of the out-of-flow `id` whose content is
    /// `content_height` tall.
    ///
    /// [§ 10.6.4 Absolutely positioned, non-replaced elements](https://www.w3.org/TR/CSS2/visudet.html#abs-non-replaced-height)
    pub(crate) fn positioned_logical_height(&self, id: RenderId, content_height: f32) -> f32 {
        let cb_height = self.containing_block_rect_for_positioned(id).height();
        let style = &self.objects[id].style;
        let bp = style.border_widths().vertical() + style.padding.vertical();
        if let Some(height) = style.height.resolve(cb_height) {
            return height + bp;
        }
        let top = style.offsets.top.resolve(cb_height);
        let bottom = style.offsets.bottom.resolve(cb_height);
        if let (Some(top), Some(bottom)) = (top, bottom) {
            // "'height' is 'auto', 'top' and 'bottom' are not 'auto', then
            // 'auto' values for 'margin-top' and 'margin-bottom' are set to 0
            // and solve for 'height'"
            return (cb_height - top - bottom - style.margin.vertical()).max(bp);
        }
        content_height + bp
    }

    /// X of the border box of `id` in its containing block's space.
    pub(crate) fn positioned_logical_left(&self, id: RenderId, width: f32) -> f32 {
        let cb_rect = self.containing_block_rect_for_positioned(id);
        let style = &self.objects[id].style;
        let margins = style.margin;
        if let Some(left) = style.offsets.left.resolve(cb_rect.width()) {
            return cb_rect.min_x() + left + margins.left;
        }
        if let Some(right) = style.offsets.right.resolve(cb_rect.width()) {
            return cb_rect.max_x() - right - margins.right - width;
        }
        // "set 'left' to the static position"
        self.static_position_in_containing_block(id).x + margins.left
    }

    /// Y of the border box of `id` in its containing block's space.
    pub(crate) fn positioned_logical_top(&self, id: RenderId, height: f32) -> f32 {
        let cb_rect = self.containing_block_rect_for_positioned(id);
        let style = &self.objects[id].style;
        let margins = style.margin;
        if let Some(top) = style.offsets.top.resolve(cb_rect.height()) {
            return cb_rect.min_y() + top + margins.top;
        }
        if let Some(bottom) = style.offsets.bottom.resolve(cb_rect.height()) {
            return cb_rect.max_y() - bottom - margins.bottom - height;
        }
        self.static_position_in_containing_block(id).y + margins.top
    }

    /// Place `id` so that its border box sits at `point` in its containing
    /// block's space.
    ///
    /// A box inside a relatively positioned inline is stored relative to
    /// the inline; mapping adds the inline's offset back.
    pub(crate) fn set_positioned_location(&mut self, id: RenderId, point: LayoutPoint) {
        let mut location = point;
        let inline_container = self.container(id).filter(|&c| {
            let c = &self.objects[c];
            self.objects[id].style.position == Position::Absolute
                && c.is_render_inline()
                && c.style.has_in_flow_position()
        });
        if let Some(inline) = inline_container {
            location -= self.offset_for_in_flow_positioned_inline(inline, id);
        }
        self.objects[id].frame_rect.origin = location;
    }

    /// The recorded static position of `id`, moved into its containing
    /// block's space.
    fn static_position_in_containing_block(&self, id: RenderId) -> LayoutPoint {
        let obj = &self.objects[id];
        let Some(cb) = self.containing_block(id) else {
            return obj.static_position;
        };
        let owner = obj.parent.map(|parent| {
            if self.objects[parent].is_render_inline() {
                self.containing_block(parent).unwrap_or(parent)
            } else {
                parent
            }
        });
        let Some(owner) = owner else {
            return obj.static_position;
        };
        self.layout_offset_to_ancestor(owner, cb)
            .map_or(obj.static_position, |offset| obj.static_position + offset)
    }

    /// Sum of the layout locations from `id` up to `ancestor`, ignoring
    /// scrolling, columns and relative offsets.
    fn layout_offset_to_ancestor(&self, id: RenderId, ancestor: RenderId) -> Option<LayoutOffset> {
        let mut offset = LayoutOffset::zero();
        let mut current = id;
        while current != ancestor {
            let obj = &self.objects[current];
            if obj.is_box() {
                offset += obj.location().to_vector();
            }
            current = self.container(current)?;
        }
        Some(offset)
    }
}
