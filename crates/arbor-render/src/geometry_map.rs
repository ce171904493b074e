//! Cached chain of container steps for repeated mapping.
//!
//! A [`RenderGeometryMap`] records, root first, one step per container hop
//! from some renderer up to the view. Walking down a subtree pushes the
//! steps of each new level and pops them again on the way back, so mapping
//! many descendants costs one hop each instead of a full walk per query.
//! When every step is a plain translation the whole chain collapses to one
//! running offset.

use crate::geometry::{LayoutOffset, LayoutPoint, LayoutQuad, LayoutRect, LayoutTransform, TransformExt};
use crate::layer::LayerId;
use crate::mapping::MapCoordinatesFlags;
use crate::object::RenderId;
use crate::transform_state::{TransformAccumulation, TransformDirection, TransformState};
use crate::tree::RenderTree;

/// One container hop.
///
/// When `transform` is set it already includes the translation and
/// `offset` is unused.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RenderGeometryMapStep {
    renderer: RenderId,
    offset: LayoutOffset,
    transform: Option<LayoutTransform>,
    is_view: bool,
    accumulating_transform: bool,
    is_non_uniform: bool,
    is_fixed_position: bool,
    has_transform: bool,
}

impl RenderGeometryMapStep {
    /// The renderer this step maps out of.
    #[must_use]
    pub const fn renderer(&self) -> RenderId {
        self.renderer
    }

    /// Translation to the container.
    #[must_use]
    pub const fn offset(&self) -> LayoutOffset {
        self.offset
    }

    /// Full transform to the container, if not a plain translation.
    #[must_use]
    pub const fn transform(&self) -> Option<&LayoutTransform> {
        self.transform.as_ref()
    }

    /// Whether the step's result depends on the mapped point.
    #[must_use]
    pub const fn is_non_uniform(&self) -> bool {
        self.is_non_uniform
    }

    /// Whether the renderer is fixed-positioned.
    #[must_use]
    pub const fn is_fixed_position(&self) -> bool {
        self.is_fixed_position
    }
}

/// Root-first stack of [`RenderGeometryMapStep`]s with running totals.
#[derive(Debug, Clone)]
pub struct RenderGeometryMap {
    insertion_position: Option<usize>,
    non_uniform_steps: usize,
    transformed_steps: usize,
    fixed_steps: usize,
    accumulated_offset: LayoutOffset,
    mapping: Vec<RenderGeometryMapStep>,
    flags: MapCoordinatesFlags,
}

impl Default for RenderGeometryMap {
    fn default() -> Self {
        Self::new(MapCoordinatesFlags::USE_TRANSFORMS)
    }
}

impl RenderGeometryMap {
    /// An empty map that replays with `flags`.
    #[must_use]
    pub const fn new(flags: MapCoordinatesFlags) -> Self {
        Self {
            insertion_position: None,
            non_uniform_steps: 0,
            transformed_steps: 0,
            fixed_steps: 0,
            accumulated_offset: LayoutOffset::new(0.0, 0.0),
            mapping: Vec::new(),
            flags,
        }
    }

    /// Recorded steps, root first.
    #[must_use]
    pub fn steps(&self) -> &[RenderGeometryMapStep] {
        &self.mapping
    }

    /// Whether no step is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Sum of every non-view step offset.
    #[must_use]
    pub const fn accumulated_offset(&self) -> LayoutOffset {
        self.accumulated_offset
    }

    /// (non-uniform, transformed, fixed) step counts.
    #[must_use]
    pub const fn step_counts(&self) -> (usize, usize, usize) {
        (self.non_uniform_steps, self.transformed_steps, self.fixed_steps)
    }

    /// Whether any step depends on the mapped point.
    #[must_use]
    pub const fn has_non_uniform_step(&self) -> bool {
        self.non_uniform_steps > 0
    }

    /// Whether any step carries a transform.
    #[must_use]
    pub const fn has_transform_step(&self) -> bool {
        self.transformed_steps > 0
    }

    /// Whether any step is fixed-positioned.
    #[must_use]
    pub const fn has_fixed_position_step(&self) -> bool {
        self.fixed_steps > 0
    }

    // ========== Building ==========

    /// Record the steps from `renderer` up to `ancestor` (the view when
    /// `None`), ahead of the steps already present.
    ///
    /// # Panics
    ///
    /// Debug builds panic if the recorded chain does not start at the view.
    pub fn push_mappings_to_ancestor(&mut self, tree: &RenderTree, renderer: RenderId, ancestor: Option<RenderId>) {
        // Mapping to the view records the view step too.
        let ancestor = ancestor.filter(|&a| a != tree.view());
        self.insertion_position = Some(self.mapping.len());
        let mut current = Some(renderer);
        while let Some(c) = current {
            current = tree.push_mapping_to_container(c, ancestor, self);
            if current == ancestor {
                break;
            }
        }
        self.insertion_position = None;
        debug_assert!(
            self.mapping.first().is_none_or(|step| step.is_view),
            "geometry map must start at the view"
        );
    }

    /// Record the steps from `layer` up to `ancestor_layer`, as a single
    /// translation when nothing between them needs a full walk.
    pub fn push_layer_mappings_to_ancestor(&mut self, tree: &RenderTree, layer: LayerId, ancestor_layer: Option<LayerId>) {
        let renderer = tree.layer(layer).renderer();
        let ancestor_renderer = ancestor_layer.map(|a| tree.layer(a).renderer());
        let can_convert = ancestor_renderer.is_some_and(|a| can_map_between_renderers(tree, renderer, a));
        match ancestor_renderer {
            Some(ancestor) if can_convert => {
                let offset = tree.convert_to_layer_coords(renderer, ancestor);
                if self.mapping.is_empty() {
                    debug_assert!(tree.get(ancestor).is_render_view());
                    self.push_mappings_to_ancestor(tree, ancestor, None);
                }
                self.insertion_position = Some(self.mapping.len());
                self.push(renderer, offset, false, false, false, false);
                self.insertion_position = None;
            }
            _ => self.push_mappings_to_ancestor(tree, renderer, ancestor_renderer),
        }
    }

    /// Drop tail steps until the step of `ancestor` is last.
    pub fn pop_mappings_to_ancestor(&mut self, ancestor: Option<RenderId>) {
        while self.mapping.last().is_some_and(|step| Some(step.renderer) != ancestor) {
            if let Some(step) = self.mapping.pop() {
                self.step_removed(&step);
            }
        }
    }

    /// Drop tail steps until the step of `ancestor_layer`'s renderer is last.
    pub fn pop_layer_mappings_to_ancestor(&mut self, tree: &RenderTree, ancestor_layer: Option<LayerId>) {
        self.pop_mappings_to_ancestor(ancestor_layer.map(|a| tree.layer(a).renderer()));
    }

    /// Record a translation step.
    #[allow(clippy::fn_params_excessive_bools)]
    pub fn push(
        &mut self,
        renderer: RenderId,
        offset: LayoutOffset,
        accumulating_transform: bool,
        is_non_uniform: bool,
        is_fixed_position: bool,
        has_transform: bool,
    ) {
        let step = RenderGeometryMapStep {
            renderer,
            offset,
            transform: None,
            is_view: false,
            accumulating_transform,
            is_non_uniform,
            is_fixed_position,
            has_transform,
        };
        self.insert(step);
    }

    /// Record a step with a full transform. Whole-pixel translations are
    /// stored as offsets.
    #[allow(clippy::fn_params_excessive_bools)]
    pub fn push_transform(
        &mut self,
        renderer: RenderId,
        transform: LayoutTransform,
        accumulating_transform: bool,
        is_non_uniform: bool,
        is_fixed_position: bool,
        has_transform: bool,
    ) {
        let (offset, transform) = if transform.is_integer_translation() {
            (transform.translation_part(), None)
        } else {
            (LayoutOffset::zero(), Some(transform))
        };
        let step = RenderGeometryMapStep {
            renderer,
            offset,
            transform,
            is_view: false,
            accumulating_transform,
            is_non_uniform,
            is_fixed_position,
            has_transform,
        };
        self.insert(step);
    }

    /// Record the view step. Its offset is the scroll applied to fixed
    /// content and is left out of the running offset.
    pub fn push_view(&mut self, view: RenderId, scroll_offset: LayoutOffset, transform: Option<LayoutTransform>) {
        debug_assert_eq!(self.insertion_position, Some(0), "the view step must be first");
        let step = RenderGeometryMapStep {
            renderer: view,
            offset: scroll_offset,
            has_transform: transform.is_some(),
            transform,
            is_view: true,
            accumulating_transform: false,
            is_non_uniform: false,
            is_fixed_position: false,
        };
        self.insert(step);
    }

    fn insert(&mut self, step: RenderGeometryMapStep) {
        self.step_inserted(&step);
        let position = self.insertion_position.unwrap_or(self.mapping.len()).min(self.mapping.len());
        self.mapping.insert(position, step);
    }

    fn step_inserted(&mut self, step: &RenderGeometryMapStep) {
        if !step.is_view {
            self.accumulated_offset += step.offset;
        }
        if step.is_non_uniform {
            self.non_uniform_steps += 1;
        }
        if step.transform.is_some() {
            self.transformed_steps += 1;
        }
        if step.is_fixed_position {
            self.fixed_steps += 1;
        }
    }

    fn step_removed(&mut self, step: &RenderGeometryMapStep) {
        if !step.is_view {
            self.accumulated_offset -= step.offset;
        }
        if step.is_non_uniform {
            debug_assert!(self.non_uniform_steps > 0);
            self.non_uniform_steps -= 1;
        }
        if step.transform.is_some() {
            debug_assert!(self.transformed_steps > 0);
            self.transformed_steps -= 1;
        }
        if step.is_fixed_position {
            debug_assert!(self.fixed_steps > 0);
            self.fixed_steps -= 1;
        }
    }

    // ========== Mapping ==========

    fn can_use_accumulated_offset(&self, container: Option<RenderId>) -> bool {
        !self.has_fixed_position_step()
            && !self.has_transform_step()
            && !self.has_non_uniform_step()
            && container.is_none_or(|c| self.mapping.first().is_some_and(|step| step.renderer == c))
    }

    /// Map `point` from the space of the last recorded renderer into
    /// `container` (the view when `None`).
    #[must_use]
    pub fn map_to_container(&self, tree: &RenderTree, point: LayoutPoint, container: Option<RenderId>) -> LayoutPoint {
        let result = if self.can_use_accumulated_offset(container) {
            point + self.accumulated_offset
        } else {
            let mut state = TransformState::for_point(TransformDirection::Apply, point);
            self.replay(tree, &mut state, container);
            state.last_planar_point()
        };

        if cfg!(debug_assertions) {
            self.check_against_direct_mapping(tree, point, container, result);
        }
        result
    }

    fn check_against_direct_mapping(
        &self,
        tree: &RenderTree,
        point: LayoutPoint,
        container: Option<RenderId>,
        result: LayoutPoint,
    ) {
        if let Some(last) = self.mapping.last() {
            let direct = tree.local_to_container_point(last.renderer, point, container, self.flags);
            debug_assert!(
                (direct.x - result.x).abs() < 0.01 && (direct.y - result.y).abs() < 0.01,
                "geometry map {result:?} disagrees with direct mapping {direct:?}"
            );
        }
    }

    /// Map `rect` into `container`, returning the mapped quad.
    #[must_use]
    pub fn map_quad_to_container(&self, tree: &RenderTree, rect: &LayoutRect, container: Option<RenderId>) -> LayoutQuad {
        let quad = LayoutQuad::from_rect(rect);
        if self.can_use_accumulated_offset(container) {
            return quad.translate(self.accumulated_offset);
        }
        let mut state = TransformState::for_quad(TransformDirection::Apply, rect.center(), quad);
        self.replay(tree, &mut state, container);
        state.last_planar_quad()
    }

    /// Bounding box of [`Self::map_quad_to_container`].
    #[must_use]
    pub fn map_rect_to_container(&self, tree: &RenderTree, rect: &LayoutRect, container: Option<RenderId>) -> LayoutRect {
        self.map_quad_to_container(tree, rect, container).bounding_box()
    }

    /// Map into document coordinates.
    #[must_use]
    pub fn absolute_point(&self, tree: &RenderTree, point: LayoutPoint) -> LayoutPoint {
        self.map_to_container(tree, point, None)
    }

    /// Map a rectangle into document coordinates.
    #[must_use]
    pub fn absolute_rect(&self, tree: &RenderTree, rect: &LayoutRect) -> LayoutRect {
        self.map_rect_to_container(tree, rect, None)
    }

    fn replay(&self, tree: &RenderTree, state: &mut TransformState, container: Option<RenderId>) {
        // Point-dependent steps cannot be replayed from a cached offset.
        if self.has_non_uniform_step() {
            let last = self.mapping.last().map(|step| step.renderer);
            if let Some(renderer) = last {
                let _ = tree.map_local_to_container(renderer, container, state, self.flags);
            }
            state.flatten();
            return;
        }

        let mut in_fixed = false;
        for (i, step) in self.mapping.iter().enumerate().rev() {
            // The view applies its fixed offset even as the target.
            if i > 0 && Some(step.renderer) == container {
                break;
            }
            // A transformed box contains fixed descendants.
            if i > 0 && step.has_transform && !step.is_fixed_position {
                in_fixed = false;
            } else if step.is_fixed_position {
                in_fixed = true;
            }

            if i == 0 {
                if let Some(t) = step.transform.as_ref().filter(|_| container.is_none()) {
                    state.apply_transform(t, TransformAccumulation::Flatten);
                }
                if in_fixed {
                    state.move_by(step.offset, TransformAccumulation::Flatten);
                }
            } else {
                let accumulate = if step.accumulating_transform {
                    TransformAccumulation::Accumulate
                } else {
                    TransformAccumulation::Flatten
                };
                match &step.transform {
                    Some(t) => state.apply_transform(t, accumulate),
                    None => state.move_by(step.offset, accumulate),
                }
            }
        }
        state.flatten();
    }
}

/// Whether the path from `renderer` up to `ancestor` is a plain sum of
/// offsets.
fn can_map_between_renderers(tree: &RenderTree, renderer: RenderId, ancestor: RenderId) -> bool {
    let mut current = Some(renderer);
    while let Some(c) = current {
        let obj = tree.get(c);
        if obj.is_fixed_positioned() || obj.has_columns() || obj.has_transform() || obj.is_flow_thread() {
            return false;
        }
        if c == ancestor {
            return true;
        }
        current = obj.parent();
    }
    // `ancestor` was not above `renderer`.
    false
}
