//! Block layout.
//!
//! [§ 9.4.1 Block formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#block-formatting)
//!
//! "In a block formatting context, boxes are laid out one after the other,
//! vertically, beginning at the top of a containing block. The vertical
//! distance between two sibling boxes is determined by the 'margin'
//! properties."
//!
//! Layout is incremental. Only objects carrying a dirty bit are visited;
//! a block whose own geometry is unaffected takes the simplified path that
//! lays out its dirty children and recomputes overflow. Each laid out box
//! compares its repaint bounds before and after through a
//! [`LayoutRepainter`] and issues the minimal invalidation.

use log::debug;

use crate::geometry::{LayoutPoint, LayoutRect, LayoutSize, rect, unite};
use crate::layout_bits::MarkingBehavior;
use crate::object::{ColumnInfo, RenderId};
use crate::repaint::LayoutRepainter;
use crate::style::{Float, Length};
use crate::tree::RenderTree;

/// Placement of the floats of one block formatting context.
///
/// Floats are packed in rows: a float goes to the right of the previous
/// left float (or left of the previous right float) while the row has room,
/// and starts a new row below the lowest float otherwise.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FloatState {
    content_left: f32,
    content_right: f32,
    row_top: f32,
    left: f32,
    right: f32,
    /// Lowest margin-box bottom of any float placed so far.
    pub(crate) bottom: f32,
}

impl FloatState {
    pub(crate) const fn new(content_left: f32, content_top: f32, width: f32) -> Self {
        Self {
            content_left,
            content_right: content_left + width,
            row_top: content_top,
            left: content_left,
            right: content_left + width,
            bottom: content_top,
        }
    }

    /// Margin-box origin for a float of `width` whose top may not be above
    /// `y`.
    fn place(&mut self, float: Float, width: f32, y: f32) -> LayoutPoint {
        if y > self.row_top {
            self.start_row(y);
        }
        let fits = self.right - self.left >= width;
        let row_is_empty = self.left == self.content_left && self.right == self.content_right;
        if !fits && !row_is_empty {
            self.start_row(self.bottom.max(y));
        }
        let x = if float == Float::Right {
            self.right -= width;
            self.right
        } else {
            let x = self.left;
            self.left += width;
            x
        };
        LayoutPoint::new(x, self.row_top)
    }

    const fn start_row(&mut self, top: f32) {
        self.row_top = top;
        self.left = self.content_left;
        self.right = self.content_right;
    }
}

impl RenderTree {
    // ========== Entry points ==========

    /// Lay out everything that is dirty, then settle layers, widgets and
    /// compositing.
    ///
    /// A pending subtree root is laid out on its own; otherwise the whole
    /// view is.
    pub fn layout(&mut self) {
        let pending_root = self.frame_view.layout_root.take();
        self.frame_view.layout_scheduled = false;
        let subtree_root =
            pending_root.filter(|&root| self.objects.contains(root) && root != self.view && self.is_rooted(root));
        debug!(
            target: "arbor::layout",
            "layout #{} from {}",
            self.frame_view.layout_count + 1,
            subtree_root.map_or_else(|| "view".to_string(), |root| root.to_string())
        );

        if let Some(root) = subtree_root {
            self.push_layout_state_root(root);
            self.layout_object(root);
            self.pop_layout_state_root();
            if let Some(layer) = self.enclosing_layer(root) {
                self.update_layer_positions_after_layout(layer);
            }
        } else {
            self.layout_view();
            if let Some(layer) = self.objects[self.view].layer {
                self.update_layer_positions_after_layout(layer);
            }
        }

        if self.frame_view.needs_full_repaint {
            let everything = unite(&self.document_rect(), &self.view_rect());
            self.repaint_view_rectangle(&everything);
            self.frame_view.needs_full_repaint = false;
        }
        self.frame_view.first_layout = false;
        self.frame_view.layout_count += 1;
        self.update_widget_positions();
        if self.view_state.compositor.is_some() {
            self.update_compositing_layers();
        }

        // Marks made while laying out were satisfied by this pass.
        if !self.objects[self.view].needs_layout() {
            self.frame_view.layout_root = None;
            self.frame_view.layout_scheduled = false;
        }
    }

    /// Lay out when anything is dirty.
    pub fn layout_if_needed(&mut self) {
        if self.objects[self.view].needs_layout() || self.frame_view.layout_root.is_some() {
            self.layout();
        }
    }

    /// Resize the viewport; the view is laid out again on the next pass.
    pub fn set_viewport_size(&mut self, size: LayoutSize) {
        if self.frame_view.viewport() == size {
            return;
        }
        debug!(target: "arbor::layout", "viewport {}x{}", size.width, size.height);
        self.frame_view.set_viewport(size);
        let view = self.view;
        self.set_needs_layout(view, MarkingBehavior::MarkOnlyThis);
        self.schedule_relayout(view);
    }

    /// Lay out `id` according to its kind.
    pub(crate) fn layout_object(&mut self, id: RenderId) {
        #[cfg(feature = "layout-trace")]
        log::trace!(target: "arbor::layout", "layout {id} ({:?})", self.objects[id].block_flavor());
        let obj = &self.objects[id];
        if obj.is_render_view() {
            self.layout_view();
        } else if obj.is_render_replaced() {
            self.layout_replaced(id);
        } else if obj.block().is_some() {
            self.layout_block(id, false);
        } else {
            // Inlines and text are placed by their containing block's lines.
            self.clear_needs_layout(id);
        }
    }

    // ========== View ==========

    /// [§ 10.1 Definition of "containing block"](https://www.w3.org/TR/CSS2/visudet.html#containing-block-details)
    ///
    /// "The containing block in which the root element lives is a rectangle
    /// called the initial containing block. For continuous media, it has the
    /// dimensions of the viewport"
    pub(crate) fn layout_view(&mut self) {
        let view = self.view;

        // STEP 1: Size the view to the viewport, or to the page when printing.
        let viewport = self.frame_view.viewport();
        let page_height = self.view_state.page_logical_height;
        let height = if self.view_state.printing && page_height > 0.0 {
            page_height
        } else {
            viewport.height
        };
        let old_frame = self.objects[view].frame_rect;
        let relayout_children = old_frame.width() != viewport.width || self.view_state.page_logical_height_changed;
        if !relayout_children && old_frame.height() != height {
            // Only percentage heights depend on the view's height.
            self.mark_percent_height_descendants(view);
        }
        self.objects[view].frame_rect = rect(0.0, 0.0, viewport.width, height);
        self.view_state.page_logical_height_changed = false;

        // STEP 2: The view is the root of the layout-state stack.
        self.push_layout_state_root(view);

        // STEP 3: Normal flow, then named flows through their regions.
        if self.has_auto_logical_height_regions() {
            let _ = self.layout_content_in_auto_logical_height_regions(relayout_children);
        } else {
            self.layout_block_contents_of_view(relayout_children);
            self.layout_flow_threads();
        }

        // STEP 4: Boxes positioned against the initial containing block.
        self.layout_positioned_objects(view, relayout_children);
        self.compute_overflow(view);
        self.pop_layout_state_root();
        self.clear_needs_layout(view);
    }

    /// Lay out the normal flow of the view.
    pub(crate) fn layout_block_contents_of_view(&mut self, relayout_children: bool) {
        let view = self.view;
        let _ = self.layout_block_children(view, relayout_children);
    }

    fn mark_percent_height_descendants(&mut self, view: RenderId) {
        for id in self.descendants(view) {
            let obj = &self.objects[id];
            if obj.is_box() && obj.style.height.is_percent() {
                self.set_needs_layout(id, MarkingBehavior::MarkContainingBlockChain);
            }
        }
    }

    // ========== Blocks ==========

    /// Lay out the block `id`, forcing its children when
    /// `relayout_children` is set.
    pub(crate) fn layout_block(&mut self, id: RenderId, relayout_children: bool) {
        if !relayout_children && self.simplified_layout(id) {
            return;
        }

        // STEP 1: Width, which decides whether every child must follow.
        let repainter = LayoutRepainter::new(self, id, self.check_for_repaint_during_layout(id));
        let old_width = self.objects[id].size().width;
        self.update_logical_width(id);
        let relayout_children = relayout_children || self.objects[id].size().width != old_width;

        // STEP 2: Content, with this block on the layout-state stack.
        let disable = self.layout_state_disabled_for(id);
        let state = self.push_layout_state(id, disable);
        let content_height = self.layout_block_contents(id, relayout_children);

        // STEP 3: Height from the content, then the out-of-flow boxes this
        // block contains.
        self.update_logical_height(id, content_height);
        self.layout_positioned_objects(id, relayout_children);
        self.pop_layout_state(state);

        // STEP 4: Overflow and invalidation.
        self.compute_overflow(id);
        self.update_layer_transform(id);
        let _ = repainter.repaint_after_layout(self);
        self.clear_needs_layout(id);
    }

    /// Whether the children of `id` must be mapped by walking the container
    /// chain instead of through the layout-state stack.
    fn layout_state_disabled_for(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        if obj.has_transform() || obj.has_columns() || obj.is_flow_thread() || obj.is_inline() {
            return true;
        }
        if obj.is_out_of_flow_positioned() {
            // Bottom-anchored boxes move once their height is known.
            let style = &obj.style;
            return style.offsets.top.is_auto() && !style.offsets.bottom.is_auto();
        }
        self.container(id).is_some_and(|c| self.objects[c].is_render_inline())
    }

    /// Lay out only what changed when the block's own geometry did not.
    ///
    /// Returns `false` when a full layout is needed after all.
    fn simplified_layout(&mut self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        if obj.self_needs_layout() || obj.normal_child_needs_layout() {
            return false;
        }
        let normal_flow = obj.needs_simplified_normal_flow_layout();
        let positioned = obj.pos_child_needs_layout() || normal_flow;
        let movement = obj.needs_positioned_movement_layout();
        if !normal_flow && !positioned && !movement {
            return false;
        }

        let repainter = LayoutRepainter::new(self, id, self.check_for_repaint_during_layout(id));
        if movement && !self.try_layout_doing_positioned_movement_only(id) {
            return false;
        }

        let disable = self.layout_state_disabled_for(id);
        let state = self.push_layout_state(id, disable);
        if normal_flow {
            for child in self.child_ids(id) {
                let obj = &self.objects[child];
                if obj.is_box() && !obj.is_out_of_flow_positioned() && obj.needs_layout() {
                    self.layout_object(child);
                }
            }
        }
        if positioned {
            self.layout_positioned_objects(id, false);
        }
        self.pop_layout_state(state);

        self.compute_overflow(id);
        let _ = repainter.repaint_after_layout(self);
        self.clear_needs_layout(id);
        debug!(target: "arbor::layout", "simplified layout of {id}");
        true
    }

    /// Lay out the content of `id`; returns the content height.
    fn layout_block_contents(&mut self, id: RenderId, relayout_children: bool) -> f32 {
        if self.objects[id].is_table() {
            return self.layout_table_contents(id, relayout_children);
        }

        // [CSS Multi-column § 3 The number and width of columns](https://www.w3.org/TR/css-multicol-1/#the-number-and-width-of-columns)
        //
        // Content is laid out in one column-wide strip and cut into columns
        // of equal height afterwards.
        let content_width = self.objects[id].content_box_rect().width();
        let mut columns = self.objects[id].column_info();
        if let Some(info) = columns.as_mut() {
            let count = info.count.max(1) as f32;
            info.width = ((content_width - info.gap * (count - 1.0)) / count).max(0.0);
            info.height = 0.0;
        }
        self.set_column_info(id, columns);

        let (flow_height, float_bottom) = if self.objects[id].children_inline() {
            self.layout_inline_children(id, relayout_children)
        } else {
            self.layout_block_children(id, relayout_children)
        };
        let mut height = if self.establishes_block_formatting_context(id) {
            flow_height.max(float_bottom)
        } else {
            flow_height
        };

        if let Some(info) = columns.as_mut() {
            info.height = (height / info.count.max(1) as f32).ceil();
            height = info.height;
            self.set_column_info(id, columns);
        }
        height
    }

    fn set_column_info(&mut self, id: RenderId, columns: Option<ColumnInfo>) {
        if let Some(data) = self.objects[id].block_mut() {
            data.columns = columns;
        }
    }

    /// [§ 9.4.1 Block formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#block-formatting)
    ///
    /// "Floats, absolutely positioned elements, block containers (such as
    /// inline-blocks, table-cells, and table-captions) that are not block
    /// boxes, and block boxes with 'overflow' other than 'visible' ...
    /// establish new block formatting contexts for their contents."
    fn establishes_block_formatting_context(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        obj.is_render_view()
            || obj.is_floating()
            || obj.is_out_of_flow_positioned()
            || obj.is_inline()
            || obj.is_table_cell()
            || obj.is_table_caption()
            || obj.has_overflow_clip()
            || obj.is_flow_thread()
            || obj.is_region()
    }

    /// Stack the block-level children of `block`.
    ///
    /// Returns the content height and the bottom of the floats, both
    /// measured from the top of the content box.
    pub(crate) fn layout_block_children(&mut self, block: RenderId, relayout_children: bool) -> (f32, f32) {
        let content = self.objects[block].content_box_rect();
        let available = self.available_logical_width(block);
        let mut floats = FloatState::new(content.min_x(), content.min_y(), available);
        let mut y = content.min_y();
        let mut previous_margin_bottom = 0.0_f32;

        for child in self.child_ids(block) {
            let obj = &self.objects[child];
            if obj.is_flow_thread() {
                // Laid out at the width of its regions.
                continue;
            }
            if obj.is_out_of_flow_positioned() {
                let static_position = LayoutPoint::new(content.min_x(), y + previous_margin_bottom);
                self.register_out_of_flow_child(child, static_position);
                continue;
            }
            if obj.is_floating() {
                self.place_float(block, child, y + previous_margin_bottom, &mut floats, relayout_children);
                continue;
            }

            // [§ 8.3.1 Collapsing margins](https://www.w3.org/TR/CSS2/box.html#collapsing-margins)
            //
            // "the bottom margin of a box and top margin of its next in-flow
            // following sibling" are adjoining.
            let margins = obj.style.margin;
            y += previous_margin_bottom.max(margins.top);
            let old_frame = obj.frame_rect;
            let check_moved =
                !self.objects[block].self_needs_layout() && self.check_for_repaint_during_layout(child);
            self.objects[child].frame_rect.origin = LayoutPoint::new(content.min_x() + margins.left, y);

            if relayout_children {
                self.set_needs_layout(child, MarkingBehavior::MarkOnlyThis);
            }
            if self.objects[child].needs_layout() {
                self.layout_object(child);
            }
            if check_moved && old_frame.origin != self.objects[child].location() {
                self.repaint_during_layout_if_moved(child, &old_frame);
            }

            y += self.objects[child].size().height;
            previous_margin_bottom = margins.bottom;
        }

        let flow_height = y + previous_margin_bottom - content.min_y();
        (flow_height, floats.bottom - content.min_y())
    }

    /// [§ 9.5.1 Positioning the float](https://www.w3.org/TR/CSS2/visuren.html#float-position)
    ///
    /// "The left outer edge of a left-floating box may not be to the left of
    /// the left edge of its containing block."
    ///
    /// Floats are packed in rows; line boxes do not shorten next to them.
    pub(crate) fn place_float(
        &mut self,
        block: RenderId,
        float: RenderId,
        y: f32,
        floats: &mut FloatState,
        relayout_children: bool,
    ) {
        if relayout_children {
            self.set_needs_layout(float, MarkingBehavior::MarkOnlyThis);
        }
        if self.objects[float].is_render_replaced() {
            if self.objects[float].needs_layout() {
                self.layout_replaced(float);
            }
        } else {
            self.update_logical_width(float);
        }

        let obj = &self.objects[float];
        let margins = obj.style.margin;
        let side = obj.style.float;
        let margin_box_width = obj.size().width + margins.horizontal();
        let origin = floats.place(side, margin_box_width, y);
        let old_frame = obj.frame_rect;
        let check_moved = !self.objects[block].self_needs_layout() && self.check_for_repaint_during_layout(float);
        self.objects[float].frame_rect.origin = LayoutPoint::new(origin.x + margins.left, origin.y + margins.top);
        if self.objects[float].needs_layout() {
            self.layout_object(float);
        }
        if check_moved && old_frame.origin != self.objects[float].location() {
            self.repaint_during_layout_if_moved(float, &old_frame);
        }

        let bottom = origin.y + self.objects[float].size().height + margins.vertical();
        floats.bottom = floats.bottom.max(bottom);
        if let Some(data) = self.objects[block].block_mut().filter(|data| !data.floating_objects.contains(&float)) {
            data.floating_objects.push(float);
        }
    }

    // ========== Widths and heights ==========

    /// Width lines and children of `block` are laid out in.
    pub(crate) fn available_logical_width(&self, block: RenderId) -> f32 {
        let obj = &self.objects[block];
        if obj.is_render_view() {
            return self.frame_view.viewport().width;
        }
        match obj.column_info() {
            Some(columns) if columns.width > 0.0 => columns.width,
            _ => obj.content_box_rect().width(),
        }
    }

    fn containing_block_logical_width(&self, id: RenderId) -> f32 {
        self.containing_block(id)
            .map_or(self.frame_view.viewport().width, |cb| self.available_logical_width(cb))
    }

    /// Content height of `block` when it does not depend on its content.
    fn definite_content_height(&self, block: RenderId) -> Option<f32> {
        let obj = &self.objects[block];
        if obj.is_render_view() {
            return Some(obj.size().height);
        }
        let style = &obj.style;
        let bp = style.border_widths().vertical() + style.padding.vertical();
        if let Some(height) = obj.block().and_then(|data| data.override_height) {
            return Some((height - bp).max(0.0));
        }
        if style.height.is_percent() {
            let cb_height = self
                .containing_block(block)
                .and_then(|cb| self.definite_content_height(cb))?;
            return style.height.resolve(cb_height);
        }
        style.height.resolve(0.0)
    }

    /// [§ 10.3.3 Block-level, non-replaced elements in normal flow](https://www.w3.org/TR/CSS2/visudet.html#blockwidth)
    ///
    /// "'margin-left' + 'border-left-width' + 'padding-left' + 'width' +
    /// 'padding-right' + 'border-right-width' + 'margin-right' = width of
    /// containing block"
    pub(crate) fn update_logical_width(&mut self, id: RenderId) {
        let obj = &self.objects[id];
        if obj.is_render_view() {
            return;
        }
        let style = obj.style_rc();
        self.objects[id].margins = style.margin;

        if let Some(width) = self.objects[id].block().and_then(|data| data.override_width) {
            self.objects[id].frame_rect.size.width = width;
            return;
        }
        if self.objects[id].is_out_of_flow_positioned() {
            let width = self.positioned_logical_width(id);
            self.objects[id].frame_rect.size.width = width;
            let height = self.objects[id].size().height;
            let x = self.positioned_logical_left(id, width);
            let y = self.positioned_logical_top(id, height);
            self.set_positioned_location(id, LayoutPoint::new(x, y));
            return;
        }

        let cb_width = self.containing_block_logical_width(id);
        let bp = style.border_widths().horizontal() + style.padding.horizontal();
        let margins = style.margin.horizontal();
        let obj = &self.objects[id];
        let shrink_to_fit = obj.is_floating() || obj.is_inline() || obj.is_table();
        let width = if let Some(width) = style.width.resolve(cb_width) {
            width + bp
        } else if shrink_to_fit {
            // [§ 10.3.5](https://www.w3.org/TR/CSS2/visudet.html#float-width)
            //
            // "shrink-to-fit width is: min(max(preferred minimum width,
            // available width), preferred width)."
            let (min, max) = self.preferred_logical_widths(id);
            max.min((cb_width - margins).max(min))
        } else {
            (cb_width - margins).max(bp)
        };
        self.objects[id].frame_rect.size.width = width;
    }

    /// [§ 10.6.3 Block-level non-replaced elements in normal flow when
    /// 'overflow' computes to 'visible'](https://www.w3.org/TR/CSS2/visudet.html#normal-block)
    ///
    /// "If 'height' is 'auto', the height depends on whether the element has
    /// any block-level children and whether it has padding or borders"
    fn update_logical_height(&mut self, id: RenderId, content_height: f32) {
        let obj = &self.objects[id];
        if obj.is_render_view() {
            return;
        }
        let style = obj.style_rc();
        let bp = style.border_widths().vertical() + style.padding.vertical();
        let out_of_flow = obj.is_out_of_flow_positioned();
        let override_height = obj.block().and_then(|data| data.override_height);

        let height = if let Some(height) = override_height {
            height
        } else if out_of_flow {
            self.positioned_logical_height(id, content_height)
        } else {
            let cb_height = self
                .containing_block(id)
                .and_then(|cb| self.definite_content_height(cb));
            let specified = if style.height.is_percent() {
                cb_height.and_then(|h| style.height.resolve(h))
            } else {
                style.height.resolve(0.0)
            };
            specified.map_or(content_height + bp, |h| h + bp)
        };
        self.objects[id].frame_rect.size.height = height;

        if out_of_flow && override_height.is_none() {
            let width = self.objects[id].size().width;
            let x = self.positioned_logical_left(id, width);
            let y = self.positioned_logical_top(id, height);
            self.set_positioned_location(id, LayoutPoint::new(x, y));
        }
    }

    // ========== Replaced ==========

    /// [§ 10.3.2 Inline, replaced elements](https://www.w3.org/TR/CSS2/visudet.html#inline-replaced-width)
    ///
    /// "if 'height' has a computed value, and the element does have an
    /// intrinsic ratio then the used value of 'width' is: (used height) *
    /// (intrinsic ratio)"
    pub(crate) fn layout_replaced(&mut self, id: RenderId) {
        let repainter = LayoutRepainter::new(self, id, self.check_for_repaint_during_layout(id));
        let obj = &self.objects[id];
        let style = obj.style_rc();
        let intrinsic = obj.replaced().map_or_else(LayoutSize::zero, |data| data.intrinsic_size);
        let out_of_flow = obj.is_out_of_flow_positioned();
        self.objects[id].margins = style.margin;

        let cb_width = self.containing_block_logical_width(id);
        let cb_height = self
            .containing_block(id)
            .and_then(|cb| self.definite_content_height(cb));
        let specified_width = style.width.resolve(cb_width);
        let specified_height = match style.height {
            Length::Percent(_) => cb_height.and_then(|h| style.height.resolve(h)),
            other => other.resolve(0.0),
        };
        let (width, height) = match (specified_width, specified_height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) if intrinsic.width > 0.0 => (w, w * intrinsic.height / intrinsic.width),
            (None, Some(h)) if intrinsic.height > 0.0 => (h * intrinsic.width / intrinsic.height, h),
            (Some(w), None) => (w, intrinsic.height),
            (None, Some(h)) => (intrinsic.width, h),
            (None, None) => (intrinsic.width, intrinsic.height),
        };
        let borders = style.border_widths();
        self.objects[id].frame_rect.size = LayoutSize::new(
            width + borders.horizontal() + style.padding.horizontal(),
            height + borders.vertical() + style.padding.vertical(),
        );

        if out_of_flow {
            let size = self.objects[id].size();
            let x = self.positioned_logical_left(id, size.width);
            let y = self.positioned_logical_top(id, size.height);
            self.set_positioned_location(id, LayoutPoint::new(x, y));
        }

        self.compute_overflow(id);
        self.update_layer_transform(id);
        let _ = repainter.repaint_after_layout(self);
        self.clear_needs_layout(id);
    }

    // ========== Overflow ==========

    /// [CSS Overflow § 2.2 Scrollable overflow](https://www.w3.org/TR/css-overflow-3/#scrollable)
    ///
    /// Layout overflow is the border box plus every in-flow child's layout
    /// overflow; visual overflow adds what paints outside the box (shadows,
    /// children without their own layer, text) unless the box clips.
    pub(crate) fn compute_overflow(&mut self, id: RenderId) {
        let obj = &self.objects[id];
        let border_box = obj.border_box_rect();
        let shadow = obj.style.box_shadow_extent();
        let decorated = rect(
            border_box.min_x() - shadow.left,
            border_box.min_y() - shadow.top,
            border_box.width() + shadow.horizontal(),
            border_box.height() + shadow.vertical(),
        );
        let mut layout_overflow = border_box;
        let mut visual_overflow = decorated;

        if let Some(columns) = obj.column_info() {
            // Children sit in flow space; the columns are what shows.
            let content = obj.content_box_rect();
            let count = columns.count.max(1) as f32;
            let span = rect(
                content.min_x(),
                content.min_y(),
                columns.width * count + columns.gap * (count - 1.0),
                columns.height,
            );
            layout_overflow = unite(&layout_overflow, &span);
            visual_overflow = unite(&visual_overflow, &span);
        } else {
            if let Some(data) = obj.block() {
                for line in &data.line_boxes {
                    layout_overflow = unite(&layout_overflow, &line.rect);
                }
            }
            let clips = obj.has_overflow_clip();
            for child in self.children(id) {
                let (child_layout, child_visual) = self.child_overflow_in_parent(id, child);
                layout_overflow = unite(&layout_overflow, &child_layout);
                if !clips {
                    visual_overflow = unite(&visual_overflow, &child_visual);
                }
            }
            for positioned in self.positioned_objects_of(id) {
                let p = &self.objects[positioned];
                if p.parent != Some(id) && self.container(positioned) == Some(id) {
                    layout_overflow = unite(
                        &layout_overflow,
                        &p.layout_overflow_rect().translate(p.location().to_vector()),
                    );
                }
            }
        }

        let obj = &mut self.objects[id];
        obj.layout_overflow = layout_overflow;
        obj.visual_overflow = visual_overflow;
    }

    /// Layout and visual overflow `child` contributes to `parent`, in the
    /// parent's space.
    fn child_overflow_in_parent(&self, parent: RenderId, child: RenderId) -> (LayoutRect, LayoutRect) {
        let c = &self.objects[child];
        let none = (LayoutRect::zero(), LayoutRect::zero());
        if c.is_flow_thread() {
            return none;
        }
        if c.is_box() {
            if c.is_out_of_flow_positioned() && self.container(child) != Some(parent) {
                return none;
            }
            let offset = c.location().to_vector();
            let layout = if c.has_overflow_clip() {
                c.border_box_rect()
            } else {
                c.layout_overflow_rect()
            };
            let visual = if c.has_layer() {
                LayoutRect::zero()
            } else {
                c.visual_overflow_rect()
            };
            return (layout.translate(offset), visual.translate(offset));
        }
        if c.is_text() {
            return (LayoutRect::zero(), self.lines_bounding_box(child));
        }
        if c.has_layer() {
            return none;
        }
        (LayoutRect::zero(), self.lines_visual_overflow_bounding_box(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floats_pack_left_then_wrap() {
        let mut floats = FloatState::new(0.0, 0.0, 100.0);
        assert_eq!(floats.place(Float::Left, 60.0, 0.0), LayoutPoint::new(0.0, 0.0));
        floats.bottom = 20.0;
        // No room next to the first float: the next row starts below it.
        assert_eq!(floats.place(Float::Left, 60.0, 0.0), LayoutPoint::new(0.0, 20.0));
    }

    #[test]
    fn test_right_float_shares_row_with_left_float() {
        let mut floats = FloatState::new(10.0, 0.0, 100.0);
        assert_eq!(floats.place(Float::Left, 30.0, 0.0), LayoutPoint::new(10.0, 0.0));
        assert_eq!(floats.place(Float::Right, 30.0, 0.0), LayoutPoint::new(80.0, 0.0));
    }

    #[test]
    fn test_oversized_float_in_empty_row_stays() {
        let mut floats = FloatState::new(0.0, 5.0, 50.0);
        assert_eq!(floats.place(Float::Left, 80.0, 5.0), LayoutPoint::new(0.0, 5.0));
    }
}
