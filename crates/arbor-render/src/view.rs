//! Root-level state owned by the render view.
//!
//! The view is an ordinary block in the object arena; everything that
//! belongs to the document as a whole rather than to one box lives in
//! [`ViewState`]: the layout-state stack, the selection, embedded widgets,
//! printing, and the lazily created compositor and flow-thread controller.

use std::collections::BTreeMap;

use log::debug;

use crate::compositor::RenderLayerCompositor;
use crate::flow_thread::FlowThreadController;
use crate::frame_view::{RepaintRecord, RepaintTarget};
use crate::geometry::{LayoutQuad, LayoutRect, TransformExt, intersect, unite};
use crate::layout_bits::MarkingBehavior;
use crate::layout_state::LayoutState;
use crate::mapping::MapCoordinatesFlags;
use crate::object::RenderId;
use crate::selection::SelectionRange;
use crate::tree::RenderTree;

/// Document-wide state held by the view.
#[derive(Debug, Default)]
pub struct ViewState {
    pub(crate) layout_states: Vec<LayoutState>,
    pub(crate) layout_state_disable_count: usize,
    pub(crate) selection: SelectionRange,
    pub(crate) widgets: Vec<RenderId>,
    pub(crate) widget_frames: BTreeMap<RenderId, LayoutRect>,
    pub(crate) printing: bool,
    pub(crate) page_logical_height: f32,
    pub(crate) page_logical_height_changed: bool,
    pub(crate) compositor: Option<RenderLayerCompositor>,
    pub(crate) flow_thread_controller: Option<FlowThreadController>,
    pub(crate) maximal_outline_size: f32,
    /// Out-of-flow boxes whose containing block is the view.
    pub(crate) positioned_objects: Vec<RenderId>,
}

impl RenderTree {
    /// View-wide state.
    #[must_use]
    pub const fn view_state(&self) -> &ViewState {
        &self.view_state
    }

    // ========== Geometry ==========

    /// The area the view shows: the page when printing, else the visible
    /// part of the document.
    #[must_use]
    pub fn view_rect(&self) -> LayoutRect {
        if self.view_state.printing {
            return self.objects[self.view].border_box_rect();
        }
        self.frame_view.visible_content_rect()
    }

    /// The document's scrollable extent, through the view transform.
    #[must_use]
    pub fn document_rect(&self) -> LayoutRect {
        let view = &self.objects[self.view];
        let overflow = unite(&view.layout_overflow_rect(), &view.border_box_rect());
        match self.layer_transform(self.view) {
            Some(t) => t.map_rect(&overflow),
            None => overflow,
        }
    }

    /// Outline extent that repaint rects of objects without layers must
    /// allow for.
    #[must_use]
    pub const fn maximal_outline_size(&self) -> f32 {
        self.view_state.maximal_outline_size
    }

    pub(crate) fn set_maximal_outline_size(&mut self, size: f32) {
        if size <= self.view_state.maximal_outline_size {
            return;
        }
        self.view_state.maximal_outline_size = size;
        // Outlines that were clipped by the old size need repainting.
        if self.objects[self.view].ever_had_layout() {
            self.repaint(self.view);
        }
    }

    // ========== Repaint ==========

    /// Invalidate `rect`, given in document coordinates.
    pub fn repaint_view_rectangle(&mut self, rect: &LayoutRect) {
        if self.view_state.printing || rect.is_empty() {
            return;
        }
        self.frame_view.repaint_content_rectangle(rect);
    }

    /// Invalidate `rect` in the view and in every composited layer it
    /// touches.
    pub fn repaint_rectangle_in_view_and_composited_layers(&mut self, rect: &LayoutRect) {
        if self.view_state.printing || rect.is_empty() {
            return;
        }
        self.repaint_view_rectangle(rect);
        if !self.uses_compositing() {
            return;
        }
        let composited: Vec<RenderId> = self
            .layers
            .iter()
            .filter(|(_, layer)| layer.is_composited())
            .map(|(_, layer)| layer.renderer())
            .collect();
        for renderer in composited {
            let local = self.absolute_to_local_quad(
                renderer,
                &LayoutQuad::from_rect(rect),
                MapCoordinatesFlags::USE_TRANSFORMS,
            );
            let layer_rect = intersect(
                &local.bounding_box(),
                &self.objects[renderer].visual_overflow_rect(),
            );
            self.frame_view.record(RepaintRecord {
                rect: layer_rect,
                target: RepaintTarget::Layer(renderer),
            });
        }
    }

    // ========== Printing ==========

    /// Whether the document is laid out for print.
    #[must_use]
    pub const fn printing(&self) -> bool {
        self.view_state.printing
    }

    /// Switch print mode. Repaints are suppressed while printing.
    pub fn set_printing(&mut self, printing: bool) {
        if self.view_state.printing == printing {
            return;
        }
        debug!(target: "arbor::view", "printing {printing}");
        self.view_state.printing = printing;
        self.set_needs_layout_and_pref_widths_recalc(self.view);
    }

    /// Page height used when paginating, zero when not paginated.
    #[must_use]
    pub const fn page_logical_height(&self) -> f32 {
        self.view_state.page_logical_height
    }

    /// Change the page height; the document is relaid out when it changes.
    pub fn set_page_logical_height(&mut self, height: f32) {
        if self.view_state.page_logical_height == height {
            return;
        }
        self.view_state.page_logical_height = height;
        self.view_state.page_logical_height_changed = true;
        self.set_needs_layout(self.view, MarkingBehavior::MarkOnlyThis);
    }

    /// Number of pages the laid out document spans.
    #[must_use]
    pub fn page_count(&self) -> usize {
        let height = self.view_state.page_logical_height;
        if height <= 0.0 {
            return 1;
        }
        let document_height = self.document_rect().max_y().max(0.0);
        ((document_height / height).ceil() as usize).max(1)
    }

    // ========== Widgets ==========

    /// Track `id` as an embedded widget.
    pub fn add_widget(&mut self, id: RenderId) {
        if !self.view_state.widgets.contains(&id) {
            self.view_state.widgets.push(id);
        }
    }

    /// Stop tracking `id`.
    pub fn remove_widget(&mut self, id: RenderId) {
        self.view_state.widgets.retain(|&w| w != id);
        let _ = self.view_state.widget_frames.remove(&id);
    }

    /// Registered widgets.
    #[must_use]
    pub fn widgets(&self) -> &[RenderId] {
        &self.view_state.widgets
    }

    /// Last computed frame of widget `id`, in document coordinates.
    #[must_use]
    pub fn widget_frame(&self, id: RenderId) -> Option<LayoutRect> {
        self.view_state.widget_frames.get(&id).copied()
    }

    /// Recompute every widget's frame from its content box.
    pub fn update_widget_positions(&mut self) {
        let widgets = self.view_state.widgets.clone();
        for id in widgets {
            if !self.objects.contains(id) {
                continue;
            }
            let content = self.objects[id].content_box_rect();
            let quad = self.local_to_absolute_quad(
                id,
                &LayoutQuad::from_rect(&content),
                MapCoordinatesFlags::USE_TRANSFORMS,
            );
            let _ = self.view_state.widget_frames.insert(id, quad.enclosing_bounding_box());
        }
    }

    // ========== Lazy controllers ==========

    /// The compositor, created on first use.
    pub fn compositor(&mut self) -> &mut RenderLayerCompositor {
        self.view_state.compositor.get_or_insert_with(RenderLayerCompositor::default)
    }

    /// Whether any layer is composited.
    #[must_use]
    pub fn uses_compositing(&self) -> bool {
        self.view_state
            .compositor
            .as_ref()
            .is_some_and(RenderLayerCompositor::in_compositing_mode)
    }

    /// The flow-thread controller, created on first use.
    pub fn flow_thread_controller(&mut self) -> &mut FlowThreadController {
        self.view_state
            .flow_thread_controller
            .get_or_insert_with(FlowThreadController::default)
    }

    /// Whether any named flow exists.
    #[must_use]
    pub fn has_render_named_flow_threads(&self) -> bool {
        self.view_state
            .flow_thread_controller
            .as_ref()
            .is_some_and(|c| !c.flow_threads().is_empty())
    }
}
