//! Repaint invalidation.
//!
//! Repaints are issued against a repaint container: the nearest composited
//! layer, the named flow thread the object lives in, or the view. Rects are
//! computed in the object's local space and mapped up with
//! [`RenderTree::compute_rect_for_repaint`], which unlike point mapping
//! applies the overflow clip of every container on the way.

use log::trace;

use crate::frame_view::{RepaintRecord, RepaintTarget};
use crate::geometry::{LayoutQuad, LayoutRect, TransformExt, intersect, pixel_snapped, rect, unite};
use crate::geometry_map::RenderGeometryMap;
use crate::mapping::MapCoordinatesFlags;
use crate::object::{RenderId, RenderKind, SelectionState};
use crate::style::{EdgeSizes, Position};
use crate::tree::RenderTree;

impl RenderTree {
    // ========== Containers ==========

    /// Where repaints of `id` are issued: a composited layer's renderer or a
    /// flow thread, `None` meaning the view.
    #[must_use]
    pub fn container_for_repaint(&self, id: RenderId) -> Option<RenderId> {
        let mut repaint_container = if self.uses_compositing() {
            self.enclosing_compositing_layer_for_repaint(id)
                .map(|layer| self.layers[layer].renderer())
        } else {
            None
        };

        // Inside a named flow, repaints go through the flow thread unless
        // they already land in a composited layer of the same flow.
        if let Some(flow_thread) = self.flow_thread_containing(id) {
            let container_flow = repaint_container.and_then(|c| self.flow_thread_containing(c));
            if container_flow != Some(flow_thread) {
                repaint_container = Some(flow_thread);
            }
        }
        repaint_container
    }

    /// Invalidate `rect`, given in the space of `repaint_container`.
    pub fn repaint_using_container(&mut self, repaint_container: Option<RenderId>, rect: &LayoutRect) {
        match repaint_container {
            None => self.repaint_view_rectangle(rect),
            Some(c) if self.objects[c].is_render_view() => self.repaint_view_rectangle(rect),
            Some(c) if self.objects[c].is_flow_thread() => self.repaint_rectangle_in_regions(c, rect),
            Some(c) => {
                debug_assert!(
                    self.objects[c].layer.is_some_and(|l| self.layers[l].is_composited()),
                    "repaint container {c} is not composited"
                );
                self.frame_view.record(RepaintRecord {
                    rect: *rect,
                    target: RepaintTarget::Layer(c),
                });
            }
        }
    }

    /// Invalidate everything `id` paints.
    pub fn repaint(&mut self, id: RenderId) {
        if !self.is_rooted(id) || self.view_state.printing {
            return;
        }
        let repaint_container = self.container_for_repaint(id);
        let r = self.clipped_overflow_rect_for_repaint(id, repaint_container);
        self.repaint_using_container(repaint_container, &pixel_snapped(&r));
    }

    /// Invalidate `r`, given in the local space of `id`.
    pub fn repaint_rectangle(&mut self, id: RenderId, r: &LayoutRect) {
        if !self.is_rooted(id) || self.view_state.printing {
            return;
        }
        let repaint_container = self.container_for_repaint(id);
        let dirty = self.compute_rect_for_repaint(id, repaint_container, *r, false);
        self.repaint_using_container(repaint_container, &pixel_snapped(&dirty));
    }

    // ========== Rects ==========

    /// Everything `id` may paint, in the space of `repaint_container`, with
    /// container clips applied.
    #[must_use]
    pub fn clipped_overflow_rect_for_repaint(&self, id: RenderId, repaint_container: Option<RenderId>) -> LayoutRect {
        let obj = &self.objects[id];
        match &obj.kind {
            RenderKind::View | RenderKind::Block(_) => {
                if !obj.style.is_visible() && !self.enclosing_layer_has_visible_content(id) {
                    return LayoutRect::zero();
                }
                // A child's outline can reach past our overflow.
                let r = obj.visual_overflow_rect().inflate(
                    self.view_state.maximal_outline_size,
                    self.view_state.maximal_outline_size,
                );
                self.compute_rect_for_repaint(id, repaint_container, r, false)
            }
            RenderKind::Replaced(_) => {
                if !obj.style.is_visible() && !self.enclosing_layer_has_visible_content(id) {
                    return LayoutRect::zero();
                }
                let selection = if obj.selection_state == SelectionState::None {
                    LayoutRect::zero()
                } else {
                    obj.border_box_rect()
                };
                let outline = obj.style.outline_size();
                let r = unite(&selection, &obj.visual_overflow_rect()).inflate(outline, outline);
                self.compute_rect_for_repaint(id, repaint_container, r, false)
            }
            RenderKind::Text(_) => self.text_clipped_overflow_rect_for_repaint(id, repaint_container),
            RenderKind::Inline(_) => self.inline_clipped_overflow_rect_for_repaint(id, repaint_container),
        }
    }

    fn text_clipped_overflow_rect_for_repaint(&self, id: RenderId, repaint_container: Option<RenderId>) -> LayoutRect {
        let Some(mut renderer_to_repaint) = self.containing_block(id) else {
            return LayoutRect::zero();
        };
        // Do not cross a layer boundary.
        if let Some(layer) = self.enclosing_layer(id) {
            let layer_renderer = self.layers[layer].renderer();
            if !self.is_descendant_of(renderer_to_repaint, layer_renderer) {
                renderer_to_repaint = layer_renderer;
            }
        }
        // The chosen renderer may sit above the repaint container.
        if let Some(rc) = repaint_container.filter(|&rc| !self.is_descendant_of(renderer_to_repaint, rc)) {
            return self.clipped_overflow_rect_for_repaint(rc, Some(rc));
        }
        self.clipped_overflow_rect_for_repaint(renderer_to_repaint, repaint_container)
    }

    fn inline_clipped_overflow_rect_for_repaint(&self, id: RenderId, repaint_container: Option<RenderId>) -> LayoutRect {
        let obj = &self.objects[id];
        if !self.has_inline_fragments(id) && obj.continuation().is_none() {
            return LayoutRect::zero();
        }
        let mut repaint_rect = self.lines_visual_overflow_bounding_box(id);

        // Inline coordinates are those of the containing block, so add the
        // in-flow offsets of every inline up to it.
        let cb = self.containing_block(id);
        let mut hit_repaint_container = false;
        let mut current = Some(id);
        while let Some(c) = current.filter(|&c| self.objects[c].is_render_inline() && Some(c) != cb) {
            if Some(c) == repaint_container {
                hit_repaint_container = true;
                break;
            }
            if self.objects[c].style.has_in_flow_position() && self.objects[c].has_layer() {
                repaint_rect = repaint_rect.translate(self.offset_for_in_flow_position(c));
            }
            current = self.objects[c].parent;
        }

        let outline_size = obj.style.outline_size();
        repaint_rect = repaint_rect.inflate(outline_size, outline_size);
        let Some(cb) = cb.filter(|_| !hit_repaint_container) else {
            return repaint_rect;
        };

        if self.objects[cb].has_columns() {
            repaint_rect = self.adjust_rect_for_columns(cb, repaint_rect);
        }
        if self.objects[cb].has_overflow_clip() {
            repaint_rect = self.apply_cached_clip_and_scroll_offset_for_repaint(cb, repaint_rect);
        }
        repaint_rect = self.compute_rect_for_repaint(cb, repaint_container, repaint_rect, false);

        if outline_size > 0.0 {
            for child in self.children(id) {
                if !self.objects[child].is_text() {
                    repaint_rect = unite(
                        &repaint_rect,
                        &self.rect_with_outline_for_repaint(child, repaint_container, outline_size),
                    );
                }
            }
            if let Some(continuation) = obj
                .continuation()
                .map(|c| c.id())
                .filter(|&c| !self.objects[c].is_inline() && self.objects[c].parent.is_some())
            {
                repaint_rect = unite(
                    &repaint_rect,
                    &self.rect_with_outline_for_repaint(continuation, repaint_container, outline_size),
                );
            }
        }
        repaint_rect
    }

    /// [`Self::clipped_overflow_rect_for_repaint`] grown by `outline_width`.
    #[must_use]
    pub fn rect_with_outline_for_repaint(
        &self,
        id: RenderId,
        repaint_container: Option<RenderId>,
        outline_width: f32,
    ) -> LayoutRect {
        self.clipped_overflow_rect_for_repaint(id, repaint_container)
            .inflate(outline_width, outline_width)
    }

    /// Border box of `id` grown by its outline and shadows, in the space of
    /// `repaint_container`; empty for anything but boxes.
    #[must_use]
    pub fn outline_bounds_for_repaint(
        &self,
        id: RenderId,
        repaint_container: Option<RenderId>,
        geometry_map: Option<&RenderGeometryMap>,
    ) -> LayoutRect {
        let obj = &self.objects[id];
        if !obj.is_box() {
            return LayoutRect::zero();
        }
        let outline = obj.style.outline_size();
        let shadow = obj.style.box_shadow_extent();
        let border_box = obj.border_box_rect();
        let r = rect(
            border_box.min_x() - outline - shadow.left,
            border_box.min_y() - outline - shadow.top,
            border_box.width() + 2.0 * outline + shadow.horizontal(),
            border_box.height() + 2.0 * outline + shadow.vertical(),
        );
        if repaint_container == Some(id) {
            return r;
        }
        match geometry_map {
            Some(map) => map.map_quad_to_container(self, &r, repaint_container).enclosing_bounding_box(),
            None => self
                .local_to_container_quad(
                    id,
                    &LayoutQuad::from_rect(&r),
                    repaint_container,
                    MapCoordinatesFlags::USE_TRANSFORMS,
                )
                .enclosing_bounding_box(),
        }
    }

    /// Map `r` from the local space of `id` into `repaint_container`,
    /// clipping by every overflow-clipping container on the way.
    #[must_use]
    pub fn compute_rect_for_repaint(
        &self,
        id: RenderId,
        repaint_container: Option<RenderId>,
        r: LayoutRect,
        fixed: bool,
    ) -> LayoutRect {
        let mut r = r;
        let mut fixed = fixed;
        let mut current = id;
        loop {
            let obj = &self.objects[current];
            match obj.kind {
                RenderKind::View => {
                    if self.view_state.printing {
                        return r;
                    }
                    if fixed {
                        r = r.translate(self.frame_view.scroll_offset_for_fixed_position());
                    }
                    if let Some(t) = self.layer_transform(current).filter(|_| repaint_container.is_none()) {
                        r = t.map_rect(&r);
                    }
                    return r;
                }
                RenderKind::Text(_) => {
                    if Some(current) == repaint_container {
                        return r;
                    }
                    let Some(parent) = obj.parent else {
                        return r;
                    };
                    let parent_obj = &self.objects[parent];
                    if parent_obj.is_render_block() && parent_obj.has_columns() {
                        r = self.adjust_rect_for_columns(parent, r);
                    }
                    if parent_obj.has_overflow_clip() {
                        r = self.apply_cached_clip_and_scroll_offset_for_repaint(parent, r);
                        if r.is_empty() {
                            return r;
                        }
                    }
                    current = parent;
                }
                RenderKind::Inline(_) => {
                    let layout_state = repaint_container
                        .is_none()
                        .then(|| self.layout_state_for(self.container(current)))
                        .flatten();
                    if let Some(state) = layout_state {
                        if obj.style.has_in_flow_position() && obj.has_layer() {
                            r = r.translate(self.offset_for_in_flow_position(current));
                        }
                        r = r.translate(state.paint_offset);
                        return state.clip.map_or(r, |clip| intersect(&r, &clip));
                    }
                    if Some(current) == repaint_container {
                        return r;
                    }
                    let (o, skipped) = self.container_skipping(current, repaint_container);
                    let Some(o) = o else {
                        return r;
                    };
                    let cont = &self.objects[o];
                    if cont.is_render_block() && !obj.style.has_out_of_flow_position() && cont.has_columns() {
                        r = self.adjust_rect_for_columns(o, r);
                    }
                    if obj.style.has_in_flow_position() && obj.has_layer() {
                        r = r.translate(self.offset_for_in_flow_position(current));
                    }
                    match self.leave_container(current, o, skipped, repaint_container, r) {
                        Ok(next) => r = next,
                        Err(done) => return done,
                    }
                    current = o;
                }
                RenderKind::Block(_) | RenderKind::Replaced(_) => {
                    let position = obj.style.position;
                    let layout_state = (repaint_container.is_none() && position != Position::Fixed)
                        .then(|| self.layout_state_for(self.container(current)))
                        .flatten();
                    if let Some(state) = layout_state {
                        if let Some(t) = self.layer_transform(current) {
                            r = t.map_rect(&pixel_snapped(&r));
                        }
                        if obj.style.has_in_flow_position() && obj.has_layer() {
                            r = r.translate(self.offset_for_in_flow_position(current));
                        }
                        r = r.translate(obj.location().to_vector() + state.paint_offset);
                        return state.clip.map_or(r, |clip| intersect(&r, &clip));
                    }

                    if Some(current) == repaint_container {
                        return r;
                    }
                    let (o, skipped) = self.container_skipping(current, repaint_container);
                    let Some(o) = o else {
                        return r;
                    };

                    // The transform maps our local space into the one the
                    // location is expressed in.
                    if let Some(t) = self.layer_transform(current) {
                        fixed = position == Position::Fixed;
                        r = t.map_rect(&pixel_snapped(&r));
                    } else if position == Position::Fixed {
                        fixed = true;
                    }
                    let mut top_left = r.origin + obj.location().to_vector();

                    let cont = &self.objects[o];
                    if position == Position::Absolute && cont.is_in_flow_positioned() && cont.is_render_inline() {
                        top_left += self.offset_for_in_flow_positioned_inline(o, current);
                    } else if obj.style.has_in_flow_position() && obj.has_layer() {
                        top_left += self.offset_for_in_flow_position(current);
                    }
                    if !obj.style.has_out_of_flow_position() && cont.is_render_block() && cont.has_columns() {
                        let adjusted = self.adjust_rect_for_columns(o, LayoutRect::new(top_left, r.size));
                        top_left = adjusted.origin;
                        r = adjusted;
                    }
                    r.origin = top_left;

                    match self.leave_container(current, o, skipped, repaint_container, r) {
                        Ok(next) => r = next,
                        Err(done) => return done,
                    }
                    current = o;
                }
            }
        }
    }

    /// Apply the clip of container `o` and rebase onto a skipped repaint
    /// container. `Err` carries a final result.
    fn leave_container(
        &self,
        id: RenderId,
        o: RenderId,
        skipped: bool,
        repaint_container: Option<RenderId>,
        r: LayoutRect,
    ) -> Result<LayoutRect, LayoutRect> {
        let mut r = r;
        if self.objects[o].has_overflow_clip() {
            r = self.apply_cached_clip_and_scroll_offset_for_repaint(o, r);
            if r.is_empty() {
                return Err(r);
            }
        }
        if skipped {
            // The repaint container lies below `o` on our ancestor chain.
            let rc = repaint_container.unwrap_or(id);
            let container_offset = self.offset_from_ancestor_container(rc, o);
            return Err(r.translate(-container_offset));
        }
        Ok(r)
    }

    /// Scroll `r` by the scroll offset of the clipping box `id` and clip it
    /// to the box.
    #[must_use]
    pub fn apply_cached_clip_and_scroll_offset_for_repaint(&self, id: RenderId, r: LayoutRect) -> LayoutRect {
        let obj = &self.objects[id];
        let scrolled = r.translate(-obj.scrolled_content_offset());
        intersect(&scrolled, &LayoutRect::from_size(obj.size()))
    }

    /// Where `r`, given in the flow space of the multi-column block `id`,
    /// appears once its content is spread over the columns.
    #[must_use]
    pub fn adjust_rect_for_columns(&self, id: RenderId, r: LayoutRect) -> LayoutRect {
        let obj = &self.objects[id];
        let Some(columns) = obj.column_info() else {
            return r;
        };
        if columns.height <= 0.0 || columns.count == 0 {
            return r;
        }
        let top = obj.content_box_rect().min_y();
        let stride = columns.width + columns.gap;
        let mut result = LayoutRect::zero();
        for index in 0..columns.count {
            let i = index as f32;
            // Content above the first column or below the last stays in it.
            let band_top = if index == 0 { f32::NEG_INFINITY } else { top + i * columns.height };
            let band_bottom = if index + 1 == columns.count {
                f32::INFINITY
            } else {
                top + (i + 1.0) * columns.height
            };
            let y0 = r.min_y().max(band_top);
            let y1 = r.max_y().min(band_bottom);
            if y1 <= y0 {
                continue;
            }
            let piece = rect(r.min_x() + i * stride, y0 - i * columns.height, r.width(), y1 - y0);
            result = unite(&result, &piece);
        }
        if result.is_empty() { r } else { result }
    }

    // ========== After layout ==========

    /// Whether a background or border is sized against the box, so any
    /// change in bounds repaints the whole box.
    #[must_use]
    pub fn must_repaint_background_or_border(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        obj.has_box_decorations() && obj.style.has_background_image()
    }

    /// Repaint what changed between the old and new bounds of `id`.
    ///
    /// Returns whether the whole object was repainted.
    pub fn repaint_after_layout_if_needed(
        &mut self,
        id: RenderId,
        repaint_container: Option<RenderId>,
        old_bounds: &LayoutRect,
        old_outline_box: &LayoutRect,
        new_bounds: Option<&LayoutRect>,
        new_outline_box: Option<&LayoutRect>,
    ) -> bool {
        if self.view_state.printing {
            return false;
        }
        let new_bounds = new_bounds
            .copied()
            .unwrap_or_else(|| self.clipped_overflow_rect_for_repaint(id, repaint_container));

        let mut new_outline = LayoutRect::zero();
        let mut full_repaint = self.objects[id].self_needs_layout();
        if !full_repaint {
            new_outline = new_outline_box
                .copied()
                .unwrap_or_else(|| self.outline_bounds_for_repaint(id, repaint_container, None));
            if new_outline.origin != old_outline_box.origin
                || (self.must_repaint_background_or_border(id)
                    && (new_bounds != *old_bounds || new_outline != *old_outline_box))
            {
                full_repaint = true;
            }
        }

        if full_repaint {
            trace!(target: "arbor::repaint", "full repaint of {id} after layout");
            self.repaint_using_container(repaint_container, &pixel_snapped(old_bounds));
            if new_bounds != *old_bounds {
                self.repaint_using_container(repaint_container, &pixel_snapped(&new_bounds));
            }
            return true;
        }

        if new_bounds == *old_bounds && new_outline == *old_outline_box {
            return false;
        }

        for strip in delta_repaint_rects(old_bounds, &new_bounds) {
            if !strip.is_empty() {
                self.repaint_using_container(repaint_container, &pixel_snapped(&strip));
            }
        }

        if new_outline == *old_outline_box {
            return false;
        }
        // Same origin, new size: the right and bottom decorations move.
        for strip in self.decoration_strips(id, old_bounds, &new_bounds, old_outline_box, &new_outline) {
            self.repaint_using_container(repaint_container, &pixel_snapped(&strip));
        }
        false
    }

    /// Border, outline and shadow strips along the right and bottom edges
    /// that move when the outline box is resized in place.
    fn decoration_strips(
        &self,
        id: RenderId,
        old_bounds: &LayoutRect,
        new_bounds: &LayoutRect,
        old_outline: &LayoutRect,
        new_outline: &LayoutRect,
    ) -> Vec<LayoutRect> {
        let obj = &self.objects[id];
        let style = &obj.style;
        let outline_width = style.outline_size();
        let shadow = style.box_shadow_extent();
        let border = if obj.is_box() { obj.border_widths() } else { EdgeSizes::default() };
        let mut strips = Vec::new();

        let width_delta = (new_outline.width() - old_outline.width()).abs();
        if width_delta > 0.0 {
            let border_width = border.right.max(style.border_radius);
            let decorations = (-style.outline.offset).max(border_width) + outline_width.max(shadow.right);
            let mut right_rect = rect(
                new_outline.min_x() + new_outline.width().min(old_outline.width()) - decorations,
                new_outline.min_y(),
                width_delta + decorations,
                new_outline.height().max(old_outline.height()),
            );
            let right = new_bounds.max_x().min(old_bounds.max_x());
            if right_rect.min_x() < right {
                right_rect.size.width = right_rect.width().min(right - right_rect.min_x());
                strips.push(right_rect);
            }
        }

        let height_delta = (new_outline.height() - old_outline.height()).abs();
        if height_delta > 0.0 {
            let border_height = border.bottom.max(style.border_radius);
            let decorations = (-style.outline.offset).max(border_height) + outline_width.max(shadow.bottom);
            let mut bottom_rect = rect(
                new_outline.min_x(),
                new_outline.min_y() + new_outline.height().min(old_outline.height()) - decorations,
                new_outline.width().max(old_outline.width()),
                height_delta + decorations,
            );
            let bottom = new_bounds.max_y().min(old_bounds.max_y());
            if bottom_rect.min_y() < bottom {
                bottom_rect.size.height = bottom_rect.height().min(bottom - bottom_rect.min_y());
                strips.push(bottom_rect);
            }
        }
        strips
    }

    /// Whether layout of `id` should compare its bounds before and after.
    #[must_use]
    pub fn check_for_repaint_during_layout(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        !self.frame_view.needs_full_repaint && !obj.has_layer() && obj.ever_had_layout()
    }

    /// A child moved during its parent's layout: repaint where it was and
    /// where it is.
    pub fn repaint_during_layout_if_moved(&mut self, id: RenderId, old_rect: &LayoutRect) {
        let new_rect = self.objects[id].frame_rect;
        if *old_rect == new_rect {
            return;
        }
        self.objects[id].frame_rect = *old_rect;
        self.repaint(id);
        self.objects[id].frame_rect = new_rect;
        self.repaint(id);
    }
}

/// The parts of `old ∪ new` outside `old ∩ new`, as four strips: left,
/// right, top and bottom. The strips do not overlap and cover that area
/// exactly; top and bottom are limited to the columns both rects share.
#[must_use]
pub fn delta_repaint_rects(old: &LayoutRect, new: &LayoutRect) -> [LayoutRect; 4] {
    let strip = |x0: f32, y0: f32, x1: f32, y1: f32| {
        if x1 > x0 && y1 > y0 {
            rect(x0, y0, x1 - x0, y1 - y0)
        } else {
            LayoutRect::zero()
        }
    };

    let left = if new.min_x() > old.min_x() {
        strip(old.min_x(), old.min_y(), new.min_x().min(old.max_x()), old.max_y())
    } else {
        strip(new.min_x(), new.min_y(), old.min_x().min(new.max_x()), new.max_y())
    };
    let right = if new.max_x() > old.max_x() {
        strip(old.max_x().max(new.min_x()), new.min_y(), new.max_x(), new.max_y())
    } else {
        strip(new.max_x().max(old.min_x()), old.min_y(), old.max_x(), old.max_y())
    };

    let shared_x0 = old.min_x().max(new.min_x());
    let shared_x1 = old.max_x().min(new.max_x());
    let top = if new.min_y() > old.min_y() {
        strip(shared_x0, old.min_y(), shared_x1, new.min_y().min(old.max_y()))
    } else {
        strip(shared_x0, new.min_y(), shared_x1, old.min_y().min(new.max_y()))
    };
    let bottom = if new.max_y() > old.max_y() {
        strip(shared_x0, old.max_y().max(new.min_y()), shared_x1, new.max_y())
    } else {
        strip(shared_x0, new.max_y().max(old.min_y()), shared_x1, old.max_y())
    };
    [left, right, top, bottom]
}

/// Captures the repaint bounds of an object before its layout so the
/// difference can be repainted afterwards.
#[derive(Debug)]
pub struct LayoutRepainter {
    object: RenderId,
    repaint_container: Option<RenderId>,
    old_bounds: LayoutRect,
    old_outline_box: LayoutRect,
    check_for_repaint: bool,
}

impl LayoutRepainter {
    /// Snapshot the bounds of `object` when `check_for_repaint` is set.
    #[must_use]
    pub fn new(tree: &RenderTree, object: RenderId, check_for_repaint: bool) -> Self {
        let mut repainter = Self {
            object,
            repaint_container: None,
            old_bounds: LayoutRect::zero(),
            old_outline_box: LayoutRect::zero(),
            check_for_repaint,
        };
        if check_for_repaint {
            repainter.repaint_container = tree.container_for_repaint(object);
            repainter.old_bounds = tree.clipped_overflow_rect_for_repaint(object, repainter.repaint_container);
            repainter.old_outline_box = tree.outline_bounds_for_repaint(object, repainter.repaint_container, None);
        }
        repainter
    }

    /// Repaint the difference. Returns whether everything was repainted.
    pub fn repaint_after_layout(&self, tree: &mut RenderTree) -> bool {
        self.check_for_repaint
            && tree.repaint_after_layout_if_needed(
                self.object,
                self.repaint_container,
                &self.old_bounds,
                &self.old_outline_box,
                None,
                None,
            )
    }
}
