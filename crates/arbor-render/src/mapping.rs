//! Coordinate mapping between an object's local space and its ancestors.
//!
//! Every object maps into its container in one step: a box adds its
//! location, an inline adds its in-flow offset, and any container that clips
//! overflow subtracts its scroll offset. Inlines and text use the coordinate
//! space of their containing block. Transforms are applied when the caller
//! asks for them with [`MapCoordinatesFlags::USE_TRANSFORMS`].

use bitflags::bitflags;

use crate::geometry::{LayoutOffset, LayoutPoint, LayoutQuad, LayoutRect, LayoutTransform, unite};
use crate::geometry_map::RenderGeometryMap;
use crate::object::{RenderId, RenderKind};
use crate::style::{Position, TransformStyle};
use crate::transform_state::{TransformAccumulation, TransformDirection, TransformState};
use crate::tree::RenderTree;

bitflags! {
    /// Options for a mapping walk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapCoordinatesFlags: u8 {
        /// The walk is inside a fixed-position subtree.
        const IS_FIXED = 1 << 0;
        /// Apply transforms instead of only translations.
        const USE_TRANSFORMS = 1 << 1;
    }
}

impl RenderTree {
    // ========== Offsets ==========

    /// `position: relative` offset of `id`.
    ///
    /// [§ 9.4.3 Relative positioning](https://www.w3.org/TR/CSS2/visuren.html#relative-positioning)
    #[must_use]
    pub fn offset_for_in_flow_position(&self, id: RenderId) -> LayoutOffset {
        let obj = &self.objects[id];
        if obj.is_text() || !obj.style.has_in_flow_position() {
            return LayoutOffset::zero();
        }
        let (cb_width, cb_height) = self
            .containing_block(id)
            .map_or((0.0, None), |cb| {
                let content = self.objects[cb].content_box_rect();
                let definite = !self.objects[cb].style.height.is_auto();
                (content.width(), definite.then_some(content.height()))
            });
        let offsets = &obj.style.offsets;

        // "If neither 'left' nor 'right' is 'auto', the position is
        // over-constrained, and one of them has to be ignored."
        let x = if offsets.left.is_auto() {
            offsets.right.resolve(cb_width).map_or(0.0, |r| -r)
        } else {
            offsets.left.resolve_or_zero(cb_width)
        };
        let resolve_vertical = |length: crate::style::Length| match cb_height {
            Some(h) => length.resolve(h),
            None if length.is_percent() => Some(0.0),
            None => length.resolve(0.0),
        };
        let y = if offsets.top.is_auto() {
            resolve_vertical(offsets.bottom).map_or(0.0, |b| -b)
        } else {
            resolve_vertical(offsets.top).unwrap_or(0.0)
        };
        LayoutOffset::new(x, y) + self.accumulate_in_flow_position_offsets(id)
    }

    /// Offset from the layout space of an in-flow positioned inline to the
    /// origin its absolutely positioned `child` is placed against.
    #[must_use]
    pub fn offset_for_in_flow_positioned_inline(&self, inline: RenderId, child: RenderId) -> LayoutOffset {
        let obj = &self.objects[inline];
        if !obj.style.has_in_flow_position() {
            return LayoutOffset::zero();
        }
        let (inline_position, block_position) = match self.first_line_box_rect(inline) {
            Some(first) => (first.origin.x.round(), first.origin.y),
            None => (obj.static_position.x, obj.static_position.y),
        };

        let child_style = &self.objects[child].style;
        let mut offset = LayoutOffset::zero();
        if !child_style.has_static_inline_position() {
            offset.x = inline_position;
        } else if !child_style.is_original_display_inline_type() {
            // A block-level child keeps its x locked to the start of the
            // inline rather than the start of the containing block.
            let cb_start = self
                .containing_block(child)
                .map_or(0.0, |cb| self.objects[cb].border_and_padding_left());
            offset.x = inline_position - cb_start;
        }
        if !child_style.has_static_block_position() {
            offset.y = block_position;
        }
        offset
    }

    /// Extra offset for a point laid out in the flow of a multi-column
    /// `container`, where `point` is in the container's flow space.
    #[must_use]
    pub fn column_offset(&self, container: RenderId, point: LayoutPoint) -> LayoutOffset {
        let obj = &self.objects[container];
        let Some(columns) = obj.column_info() else {
            return LayoutOffset::zero();
        };
        if columns.height <= 0.0 {
            return LayoutOffset::zero();
        }
        let content_top = obj.content_box_rect().min_y();
        let index = ((point.y - content_top) / columns.height)
            .floor()
            .clamp(0.0, (columns.count.max(1) - 1) as f32);
        LayoutOffset::new(index * (columns.width + columns.gap), -index * columns.height)
    }

    /// Inverse of [`Self::column_offset`] for a point in the container's
    /// visual space.
    fn column_offset_for_visual_point(&self, container: RenderId, point: LayoutPoint) -> LayoutOffset {
        let obj = &self.objects[container];
        let Some(columns) = obj.column_info() else {
            return LayoutOffset::zero();
        };
        let stride = columns.width + columns.gap;
        if stride <= 0.0 {
            return LayoutOffset::zero();
        }
        let content_left = obj.content_box_rect().min_x();
        let index = ((point.x - content_left) / stride)
            .floor()
            .clamp(0.0, (columns.count.max(1) - 1) as f32);
        LayoutOffset::new(index * stride, -index * columns.height)
    }

    /// Offset from the local space of `id` to that of its `container`, for
    /// a local `point` (column layout makes the result point-dependent).
    #[must_use]
    pub fn offset_from_container(&self, id: RenderId, container: RenderId, point: LayoutPoint) -> LayoutOffset {
        self.container_offset(id, container, Some(point)).0
    }

    /// The offset to `container` and whether it depends on the point.
    pub(crate) fn container_offset(
        &self,
        id: RenderId,
        container: RenderId,
        point: Option<LayoutPoint>,
    ) -> (LayoutOffset, bool) {
        let obj = &self.objects[id];
        let cont = &self.objects[container];
        let mut offset = LayoutOffset::zero();

        match obj.kind {
            RenderKind::View => return (offset, false),
            RenderKind::Text(_) => {
                if let Some(p) = point {
                    offset += self.column_offset(container, p);
                }
            }
            RenderKind::Inline(_) => {
                offset += self.offset_for_in_flow_position(id);
                if let Some(p) = point {
                    offset += self.column_offset(container, p);
                }
            }
            RenderKind::Block(_) | RenderKind::Replaced(_) => {
                offset += self.offset_for_in_flow_position(id);
                offset += obj.location().to_vector();
                if let Some(p) = point.filter(|_| !obj.style.has_out_of_flow_position() && cont.has_columns()) {
                    offset += self.column_offset(container, p + offset);
                }
                if obj.style.position == Position::Absolute
                    && cont.is_render_inline()
                    && cont.style.has_in_flow_position()
                {
                    offset += self.offset_for_in_flow_positioned_inline(container, id);
                }
            }
        }

        if cont.has_overflow_clip() {
            offset -= cont.scrolled_content_offset();
        }
        let depends_on_point = cont.has_columns() || cont.is_flow_thread();
        (offset, depends_on_point)
    }

    /// Sum of container offsets from `id` up to `ancestor`.
    ///
    /// There must be no transform on the way.
    #[must_use]
    pub fn offset_from_ancestor_container(&self, id: RenderId, ancestor: RenderId) -> LayoutOffset {
        let mut offset = LayoutOffset::zero();
        let mut reference = LayoutPoint::zero();
        let mut current = id;
        while current != ancestor {
            let Some(next) = self.container(current) else {
                debug_assert!(false, "{ancestor} is not a container of {id}");
                break;
            };
            let step = self.offset_from_container(current, next, reference);
            offset += step;
            reference += step;
            current = next;
        }
        offset
    }

    // ========== Transforms ==========

    /// Transform of the layer of `id`, if any.
    #[must_use]
    pub fn layer_transform(&self, id: RenderId) -> Option<LayoutTransform> {
        self.objects[id].layer.and_then(|layer| self.layers[layer].transform)
    }

    pub(crate) fn should_use_transform_from_container(&self, id: RenderId) -> bool {
        self.layer_transform(id).is_some()
    }

    /// The layer transform of `id` followed by `container_offset`.
    pub(crate) fn transform_from_container(&self, id: RenderId, container_offset: LayoutOffset) -> LayoutTransform {
        self.layer_transform(id)
            .unwrap_or_else(LayoutTransform::identity)
            .then_translate(euclid::vec3(container_offset.x, container_offset.y, 0.0))
    }

    pub(crate) fn preserves_3d(&self, id: RenderId) -> bool {
        self.objects[id].style.transform_style == TransformStyle::Preserve3d
    }

    // ========== Local to container ==========

    /// Walk from `id` towards `repaint_container` (the view when `None`),
    /// applying every step to `state`.
    ///
    /// Returns whether the walk passed through a fixed-position box.
    pub fn map_local_to_container(
        &self,
        id: RenderId,
        repaint_container: Option<RenderId>,
        state: &mut TransformState,
        mode: MapCoordinatesFlags,
    ) -> bool {
        let mut mode = mode;
        let mut was_fixed = mode.contains(MapCoordinatesFlags::IS_FIXED);
        let mut current = id;
        while let Some(next) = self.map_step(current, repaint_container, state, &mut mode, &mut was_fixed) {
            current = next;
        }
        was_fixed
    }

    fn map_step(
        &self,
        id: RenderId,
        repaint_container: Option<RenderId>,
        state: &mut TransformState,
        mode: &mut MapCoordinatesFlags,
        was_fixed: &mut bool,
    ) -> Option<RenderId> {
        let obj = &self.objects[id];
        // The view applies its fixed-position scroll even when it is the
        // target container.
        if Some(id) == repaint_container && !obj.is_render_view() {
            return None;
        }
        match obj.kind {
            RenderKind::View => {
                let use_transform = repaint_container.is_none() && mode.contains(MapCoordinatesFlags::USE_TRANSFORMS);
                if let Some(t) = self.layer_transform(id).filter(|_| use_transform) {
                    state.apply_transform(&t, TransformAccumulation::Flatten);
                }
                if mode.contains(MapCoordinatesFlags::IS_FIXED) {
                    state.move_by(self.frame_view.scroll_offset_for_fixed_position(), TransformAccumulation::Flatten);
                }
                None
            }
            RenderKind::Text(_) => {
                let parent = obj.parent?;
                let p = state.mapped_point();
                let columns = self.column_offset(parent, p);
                if columns != LayoutOffset::zero() {
                    state.move_by(columns, TransformAccumulation::Flatten);
                }
                if self.objects[parent].has_overflow_clip() {
                    state.move_by(-self.objects[parent].scrolled_content_offset(), TransformAccumulation::Flatten);
                }
                Some(parent)
            }
            RenderKind::Inline(_) | RenderKind::Block(_) | RenderKind::Replaced(_) => {
                let is_box = obj.is_box();
                let layout_state = repaint_container
                    .is_none()
                    .then(|| self.layout_state_for(self.container(id)))
                    .flatten();
                if let Some(layout_state) = layout_state {
                    let mut offset = layout_state.paint_offset;
                    if is_box {
                        offset += obj.location().to_vector();
                    }
                    if obj.style.has_in_flow_position() && obj.has_layer() {
                        offset += self.offset_for_in_flow_position(id);
                    }
                    state.move_by(offset, TransformAccumulation::Flatten);
                    return None;
                }

                let (o, skipped) = self.container_skipping(id, repaint_container);
                let o = o?;

                if is_box {
                    let is_fixed_pos = obj.style.position == Position::Fixed;
                    let has_transform = self.layer_transform(id).is_some();
                    // A transformed box contains fixed descendants, so
                    // 'fixed' only propagates through a fixed box.
                    if has_transform && !is_fixed_pos {
                        mode.remove(MapCoordinatesFlags::IS_FIXED);
                    } else if is_fixed_pos {
                        mode.insert(MapCoordinatesFlags::IS_FIXED);
                    }
                    *was_fixed = mode.contains(MapCoordinatesFlags::IS_FIXED);
                }

                let container_offset = self.offset_from_container(id, o, state.mapped_point());
                let accumulate = self.accumulation(id, o, *mode);
                if mode.contains(MapCoordinatesFlags::USE_TRANSFORMS) && self.should_use_transform_from_container(id) {
                    let t = self.transform_from_container(id, container_offset);
                    state.apply_transform(&t, accumulate);
                } else {
                    state.move_by(container_offset, accumulate);
                }

                if skipped {
                    // No transform can sit between the skipped container and
                    // `o`, since transforms create containers.
                    if let Some(rc) = repaint_container {
                        let delta = self.offset_from_ancestor_container(rc, o);
                        state.move_by(-delta, accumulate);
                    }
                    return None;
                }
                Some(o)
            }
        }
    }

    fn accumulation(&self, id: RenderId, container: RenderId, mode: MapCoordinatesFlags) -> TransformAccumulation {
        if mode.contains(MapCoordinatesFlags::USE_TRANSFORMS) && (self.preserves_3d(container) || self.preserves_3d(id)) {
            TransformAccumulation::Accumulate
        } else {
            TransformAccumulation::Flatten
        }
    }

    /// Map `point` from the local space of `id` into `container` (the view
    /// when `None`).
    #[must_use]
    pub fn local_to_container_point(
        &self,
        id: RenderId,
        point: LayoutPoint,
        container: Option<RenderId>,
        mode: MapCoordinatesFlags,
    ) -> LayoutPoint {
        let mut state = TransformState::for_point(TransformDirection::Apply, point);
        let _ = self.map_local_to_container(id, container, &mut state, mode);
        state.flatten();
        state.last_planar_point()
    }

    /// Map `quad` from the local space of `id` into `container`.
    #[must_use]
    pub fn local_to_container_quad(
        &self,
        id: RenderId,
        quad: &LayoutQuad,
        container: Option<RenderId>,
        mode: MapCoordinatesFlags,
    ) -> LayoutQuad {
        let mut state = TransformState::for_quad(TransformDirection::Apply, quad.p1, *quad);
        let _ = self.map_local_to_container(id, container, &mut state, mode);
        state.flatten();
        state.last_planar_quad()
    }

    /// Map a local point into document coordinates.
    #[must_use]
    pub fn local_to_absolute(&self, id: RenderId, point: LayoutPoint, mode: MapCoordinatesFlags) -> LayoutPoint {
        self.local_to_container_point(id, point, None, mode)
    }

    /// Map a local quad into document coordinates.
    #[must_use]
    pub fn local_to_absolute_quad(&self, id: RenderId, quad: &LayoutQuad, mode: MapCoordinatesFlags) -> LayoutQuad {
        self.local_to_container_quad(id, quad, None, mode)
    }

    // ========== Push to a geometry map ==========

    /// Push the step from `id` to its container onto `map` and return the
    /// object the walk continues from.
    ///
    /// `ancestor_to_stop_at` bounds the walk; when the container skips past
    /// it, the step is rebased onto it and it is returned.
    pub fn push_mapping_to_container(
        &self,
        id: RenderId,
        ancestor_to_stop_at: Option<RenderId>,
        map: &mut RenderGeometryMap,
    ) -> Option<RenderId> {
        debug_assert_ne!(Some(id), ancestor_to_stop_at);
        let obj = &self.objects[id];
        match obj.kind {
            RenderKind::View => {
                let scroll = self.frame_view.scroll_offset_for_fixed_position();
                let transform = if ancestor_to_stop_at.is_none() {
                    self.layer_transform(id)
                } else {
                    None
                };
                map.push_view(id, scroll, transform);
                None
            }
            RenderKind::Text(_) => {
                let parent = obj.parent?;
                let parent_obj = &self.objects[parent];
                let offset = if parent_obj.has_overflow_clip() {
                    -parent_obj.scrolled_content_offset()
                } else {
                    LayoutOffset::zero()
                };
                map.push(id, offset, false, parent_obj.has_columns(), false, false);
                Some(parent)
            }
            RenderKind::Inline(_) | RenderKind::Block(_) | RenderKind::Replaced(_) => {
                let (container, skipped) = self.container_skipping(id, ancestor_to_stop_at);
                let container = container?;
                let adjustment = match (skipped, ancestor_to_stop_at) {
                    (true, Some(ancestor)) => -self.offset_from_ancestor_container(ancestor, container),
                    _ => LayoutOffset::zero(),
                };

                let is_box = obj.is_box();
                let is_fixed_pos = is_box && obj.style.position == Position::Fixed;
                let has_transform = is_box && self.layer_transform(id).is_some();
                let (container_offset, depends_on_point) =
                    self.container_offset(id, container, Some(LayoutPoint::zero()));
                let preserve_3d = self.preserves_3d(container) || self.preserves_3d(id);

                if self.should_use_transform_from_container(id) {
                    let t = self
                        .transform_from_container(id, container_offset)
                        .then_translate(euclid::vec3(adjustment.x, adjustment.y, 0.0));
                    map.push_transform(id, t, preserve_3d, depends_on_point, is_fixed_pos, has_transform);
                } else {
                    map.push(
                        id,
                        container_offset + adjustment,
                        preserve_3d,
                        depends_on_point,
                        is_fixed_pos,
                        has_transform,
                    );
                }
                if skipped { ancestor_to_stop_at } else { Some(container) }
            }
        }
    }

    // ========== Absolute to local ==========

    /// Map a document point into the local space of `id`.
    #[must_use]
    pub fn absolute_to_local(&self, id: RenderId, point: LayoutPoint, mode: MapCoordinatesFlags) -> LayoutPoint {
        let mut state = TransformState::for_point(TransformDirection::UnapplyInverse, point);
        self.map_absolute_to_local_point(id, mode, &mut state);
        state.flatten();
        state.last_planar_point()
    }

    /// Map a document quad into the local space of `id`.
    #[must_use]
    pub fn absolute_to_local_quad(&self, id: RenderId, quad: &LayoutQuad, mode: MapCoordinatesFlags) -> LayoutQuad {
        let mut state = TransformState::for_quad(TransformDirection::UnapplyInverse, quad.p1, *quad);
        self.map_absolute_to_local_point(id, mode, &mut state);
        state.flatten();
        state.last_planar_quad()
    }

    /// Unapply every step from the view down to `id`.
    pub fn map_absolute_to_local_point(&self, id: RenderId, mode: MapCoordinatesFlags, state: &mut TransformState) {
        // The fixed flag is decided bottom-up, the steps are applied
        // top-down, so collect the chain first.
        let mut chain = Vec::new();
        let mut mode = mode;
        let mut current = id;
        loop {
            let obj = &self.objects[current];
            if obj.is_box() && !obj.is_render_view() {
                let is_fixed_pos = obj.style.position == Position::Fixed;
                if self.layer_transform(current).is_some() && !is_fixed_pos {
                    mode.remove(MapCoordinatesFlags::IS_FIXED);
                } else if is_fixed_pos {
                    mode.insert(MapCoordinatesFlags::IS_FIXED);
                }
            }
            chain.push((current, mode));
            let next = if obj.is_text() { obj.parent } else { self.container(current) };
            match next {
                Some(n) if !obj.is_render_view() => current = n,
                _ => break,
            }
        }

        for window in (0..chain.len()).rev() {
            let (current, mode) = chain[window];
            let obj = &self.objects[current];
            if obj.is_render_view() {
                if mode.contains(MapCoordinatesFlags::IS_FIXED) {
                    state.move_by(self.frame_view.scroll_offset_for_fixed_position(), TransformAccumulation::Flatten);
                }
                let use_transform = mode.contains(MapCoordinatesFlags::USE_TRANSFORMS);
                if let Some(t) = self.layer_transform(current).filter(|_| use_transform) {
                    state.apply_transform(&t, TransformAccumulation::Flatten);
                }
                continue;
            }
            let Some(&(container, _)) = chain.get(window + 1) else {
                continue;
            };
            let (mut offset, _) = self.container_offset(current, container, None);
            let cont = &self.objects[container];
            if cont.has_columns() && (obj.is_text() || !obj.style.has_out_of_flow_position()) {
                let mut visual = state.mapped_point();
                if cont.has_overflow_clip() {
                    visual += cont.scrolled_content_offset();
                }
                offset += self.column_offset_for_visual_point(container, visual);
            }
            let accumulate = self.accumulation(current, container, mode);
            if mode.contains(MapCoordinatesFlags::USE_TRANSFORMS) && self.should_use_transform_from_container(current) {
                let t = self.transform_from_container(current, offset);
                state.apply_transform(&t, accumulate);
            } else {
                state.move_by(offset, accumulate);
            }
        }
    }

    // ========== Quads ==========

    /// Border-box quads of `id` in document coordinates. Inlines yield one
    /// quad per line fragment and follow their continuation chain.
    #[must_use]
    pub fn absolute_quads(&self, id: RenderId) -> Vec<LayoutQuad> {
        let mut quads = Vec::new();
        self.collect_absolute_quads(id, &mut quads);
        quads
    }

    fn collect_absolute_quads(&self, id: RenderId, quads: &mut Vec<LayoutQuad>) {
        let obj = &self.objects[id];
        let mode = MapCoordinatesFlags::USE_TRANSFORMS;
        match &obj.kind {
            RenderKind::Inline(_) => {
                for r in self.line_box_rects(id) {
                    quads.push(self.local_to_absolute_quad(id, &LayoutQuad::from_rect(&r), mode));
                }
                if let Some(continuation) = obj.continuation() {
                    self.collect_absolute_quads(continuation.id(), quads);
                }
            }
            RenderKind::Text(text) => {
                for text_box in &text.boxes {
                    quads.push(self.local_to_absolute_quad(id, &LayoutQuad::from_rect(&text_box.rect), mode));
                }
            }
            RenderKind::Block(_) if obj.is_anonymous_block_continuation() => {
                let margins = obj.margins;
                let r = LayoutRect::new(
                    LayoutPoint::new(0.0, -margins.top),
                    euclid::size2(obj.size().width, obj.size().height + margins.vertical()),
                );
                quads.push(self.local_to_absolute_quad(id, &LayoutQuad::from_rect(&r), mode));
                if let Some(continuation) = obj.continuation() {
                    self.collect_absolute_quads(continuation.id(), quads);
                }
            }
            RenderKind::View | RenderKind::Block(_) | RenderKind::Replaced(_) => {
                let r = obj.border_box_rect();
                quads.push(self.local_to_absolute_quad(id, &LayoutQuad::from_rect(&r), mode));
            }
        }
    }

    /// Document-space bounding boxes of [`Self::absolute_quads`].
    #[must_use]
    pub fn absolute_rects(&self, id: RenderId) -> Vec<LayoutRect> {
        self.absolute_quads(id).iter().map(LayoutQuad::enclosing_bounding_box).collect()
    }

    /// Pixel-aligned union of [`Self::absolute_quads`].
    #[must_use]
    pub fn absolute_bounding_box_rect(&self, id: RenderId) -> LayoutRect {
        self.absolute_rects(id)
            .iter()
            .fold(LayoutRect::zero(), |acc, r| unite(&acc, r))
    }
}
