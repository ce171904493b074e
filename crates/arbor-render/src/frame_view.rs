//! The frame view hosting a document: viewport, scroll position, layout
//! scheduling and the log of repainted rectangles.

use std::collections::HashSet;

use log::trace;
use serde::Serialize;

use crate::geometry::{LayoutOffset, LayoutRect, LayoutSize, intersect};
use crate::object::RenderId;

/// Where a repaint was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RepaintTarget {
    /// The frame's own backing, in document coordinates.
    View,
    /// A composited layer, in the coordinates of its renderer.
    Layer(RenderId),
}

/// One invalidated rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepaintRecord {
    /// The invalidated area.
    pub rect: LayoutRect,
    /// The backing it was issued against.
    pub target: RepaintTarget,
}

/// Viewport and scheduling state of the frame a document is shown in.
#[derive(Debug, Clone)]
pub struct FrameView {
    viewport: LayoutSize,
    scroll_offset: LayoutOffset,
    pub(crate) layout_root: Option<RenderId>,
    pub(crate) layout_scheduled: bool,
    pub(crate) layout_scheduling_enabled: bool,
    pub(crate) needs_full_repaint: bool,
    pub(crate) first_layout: bool,
    pub(crate) layout_count: usize,
    repaints: Vec<RepaintRecord>,
    slow_repaint_objects: HashSet<RenderId>,
    viewport_constrained_objects: HashSet<RenderId>,
}

impl FrameView {
    /// A frame showing `viewport` at scroll offset zero.
    #[must_use]
    pub fn new(viewport: LayoutSize) -> Self {
        Self {
            viewport,
            scroll_offset: LayoutOffset::zero(),
            layout_root: None,
            layout_scheduled: false,
            layout_scheduling_enabled: true,
            needs_full_repaint: true,
            first_layout: true,
            layout_count: 0,
            repaints: Vec::new(),
            slow_repaint_objects: HashSet::new(),
            viewport_constrained_objects: HashSet::new(),
        }
    }

    /// Size of the visible area.
    #[must_use]
    pub const fn viewport(&self) -> LayoutSize {
        self.viewport
    }

    pub(crate) const fn set_viewport(&mut self, viewport: LayoutSize) {
        self.viewport = viewport;
    }

    /// Current scroll position.
    #[must_use]
    pub const fn scroll_offset(&self) -> LayoutOffset {
        self.scroll_offset
    }

    /// Scroll to `offset`.
    pub fn set_scroll_offset(&mut self, offset: LayoutOffset) {
        trace!(target: "arbor::frame", "scroll to {offset:?}");
        self.scroll_offset = offset;
    }

    /// Offset that keeps fixed-position content in place while the document
    /// scrolls.
    #[must_use]
    pub const fn scroll_offset_for_fixed_position(&self) -> LayoutOffset {
        self.scroll_offset
    }

    /// The visible part of the document.
    #[must_use]
    pub fn visible_content_rect(&self) -> LayoutRect {
        LayoutRect::new(self.scroll_offset.to_point(), self.viewport)
    }

    /// Pending subtree layout root; `None` means the whole document.
    #[must_use]
    pub const fn layout_root(&self) -> Option<RenderId> {
        self.layout_root
    }

    /// Whether a layout is scheduled.
    #[must_use]
    pub const fn layout_pending(&self) -> bool {
        self.layout_scheduled
    }

    /// Allow or block layout scheduling.
    pub const fn set_layout_scheduling_enabled(&mut self, enabled: bool) {
        self.layout_scheduling_enabled = enabled;
    }

    /// Whether the next layout repaints everything.
    #[must_use]
    pub const fn needs_full_repaint(&self) -> bool {
        self.needs_full_repaint
    }

    /// Number of layouts performed.
    #[must_use]
    pub const fn layout_count(&self) -> usize {
        self.layout_count
    }

    // ========== Repaint log ==========

    /// Record an invalidation of `rect` in document coordinates, clipped to
    /// the visible area.
    pub fn repaint_content_rectangle(&mut self, rect: &LayoutRect) {
        let clipped = intersect(rect, &self.visible_content_rect());
        if clipped.is_empty() {
            return;
        }
        self.record(RepaintRecord {
            rect: clipped,
            target: RepaintTarget::View,
        });
    }

    pub(crate) fn record(&mut self, record: RepaintRecord) {
        if record.rect.is_empty() {
            return;
        }
        trace!(target: "arbor::repaint", "{:?} {:?}", record.target, record.rect);
        self.repaints.push(record);
    }

    /// Invalidations since the last [`Self::take_repaints`].
    #[must_use]
    pub fn repaints(&self) -> &[RepaintRecord] {
        &self.repaints
    }

    /// Drain the invalidation log.
    pub fn take_repaints(&mut self) -> Vec<RepaintRecord> {
        std::mem::take(&mut self.repaints)
    }

    // ========== Object registries ==========

    /// Register a renderer whose painting depends on the scroll position.
    pub fn add_slow_repaint_object(&mut self, id: RenderId) {
        let _ = self.slow_repaint_objects.insert(id);
    }

    /// Unregister a slow-repaint renderer.
    pub fn remove_slow_repaint_object(&mut self, id: RenderId) {
        let _ = self.slow_repaint_objects.remove(&id);
    }

    /// Whether scrolling must repaint instead of blitting.
    #[must_use]
    pub fn has_slow_repaint_objects(&self) -> bool {
        !self.slow_repaint_objects.is_empty()
    }

    /// Whether `id` is registered as a slow-repaint renderer.
    #[must_use]
    pub fn is_slow_repaint_object(&self, id: RenderId) -> bool {
        self.slow_repaint_objects.contains(&id)
    }

    /// Register a fixed-position renderer.
    pub fn add_viewport_constrained_object(&mut self, id: RenderId) {
        let _ = self.viewport_constrained_objects.insert(id);
    }

    /// Unregister a fixed-position renderer.
    pub fn remove_viewport_constrained_object(&mut self, id: RenderId) {
        let _ = self.viewport_constrained_objects.remove(&id);
    }

    /// Fixed-position renderers currently registered.
    #[must_use]
    pub fn viewport_constrained_objects(&self) -> &HashSet<RenderId> {
        &self.viewport_constrained_objects
    }
}
