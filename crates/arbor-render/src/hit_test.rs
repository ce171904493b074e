//! Hit testing.
//!
//! [Appendix E](https://www.w3.org/TR/CSS2/zindex.html) fixes the paint order; a
//! hit test walks it backwards so the topmost painted object wins. Layers are
//! tried from the last painted to the first, and inside a layer children are
//! tried before their parent, last child first.

use arbor_dom::NodeId;

use crate::geometry::{LayoutOffset, LayoutPoint, LayoutQuad, LayoutRect};
use crate::mapping::MapCoordinatesFlags;
use crate::object::{RenderId, RenderKind};
use crate::tree::RenderTree;

/// What a document point hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTestResult {
    /// Innermost renderer under the point.
    pub renderer: RenderId,
    /// DOM node of that renderer, or of its nearest non-anonymous ancestor.
    pub node: Option<NodeId>,
    /// The point in the renderer's local coordinates.
    pub local_point: LayoutPoint,
}

impl RenderTree {
    /// Topmost renderer painted at `point`, in document coordinates.
    #[must_use]
    pub fn hit_test(&self, point: LayoutPoint) -> Option<HitTestResult> {
        for layer in self.layers_in_paint_order().into_iter().rev() {
            let renderer = self.layers[layer].renderer();
            if self.flow_thread_containing(renderer).is_some() {
                continue;
            }
            if self.clipped_out(renderer, point) {
                continue;
            }
            if let Some((hit, hit_point)) = self.node_at_point(renderer, renderer, point, false) {
                return Some(self.hit_test_result(hit, hit_point));
            }
        }
        None
    }

    /// Whether an overflow-clipping container hides `point` from `id`.
    fn clipped_out(&self, id: RenderId, point: LayoutPoint) -> bool {
        let mut current = self.container(id);
        while let Some(c) = current {
            if self.objects[c].has_overflow_clip() && !self.contains_local(c, &self.objects[c].padding_box_rect(), point) {
                return true;
            }
            current = self.container(c);
        }
        false
    }

    fn contains_local(&self, id: RenderId, r: &LayoutRect, point: LayoutPoint) -> bool {
        let local = self.absolute_to_local(id, point, MapCoordinatesFlags::USE_TRANSFORMS);
        r.contains(local)
    }

    fn fragment_contains(&self, id: RenderId, r: &LayoutRect, point: LayoutPoint) -> bool {
        self.local_to_absolute_quad(id, &LayoutQuad::from_rect(r), MapCoordinatesFlags::USE_TRANSFORMS)
            .bounding_box()
            .contains(point)
    }

    /// Innermost object under `point` in the part of the layer tree owned by
    /// `root`, and the point in the space the object maps from.
    fn node_at_point(
        &self,
        id: RenderId,
        root: RenderId,
        point: LayoutPoint,
        in_flow_thread: bool,
    ) -> Option<(RenderId, LayoutPoint)> {
        let obj = &self.objects[id];
        if id != root && ((obj.has_layer() && !in_flow_thread) || obj.is_flow_thread()) {
            return None;
        }

        // STEP 1: Descendants, unless this box clips them away.
        let clips_children = obj.has_overflow_clip() && !self.contains_local(id, &obj.padding_box_rect(), point);
        if !clips_children {
            let region_hit = if obj.is_region() {
                self.node_at_point_in_region(id, point)
            } else {
                None
            };
            if region_hit.is_some() {
                return region_hit;
            }
            let mut child = obj.last_child;
            while let Some(c) = child {
                if let Some(hit) = self.node_at_point(c, root, point, in_flow_thread) {
                    return Some(hit);
                }
                child = self.objects[c].prev_sibling;
            }
        }

        // STEP 2: The object itself.
        if !obj.style().is_visible() {
            return None;
        }
        let hit = match &obj.kind {
            RenderKind::Text(data) => data
                .boxes
                .iter()
                .any(|text_box| self.fragment_contains(id, &text_box.rect, point)),
            RenderKind::Inline(_) => self
                .line_box_rects(id)
                .iter()
                .any(|fragment| self.fragment_contains(id, fragment, point)),
            RenderKind::View => true,
            RenderKind::Block(_) | RenderKind::Replaced(_) => self.contains_local(id, &obj.border_box_rect(), point),
        };
        hit.then_some((id, point))
    }

    /// Hit test the slice of the named flow shown by `region`.
    fn node_at_point_in_region(&self, region: RenderId, point: LayoutPoint) -> Option<(RenderId, LayoutPoint)> {
        let controller = self.view_state.flow_thread_controller.as_ref()?;
        let portion = controller.region_portion(region)?;
        let content = self.objects[region].content_box_rect();
        if !self.contains_local(region, &content, point) {
            return None;
        }
        let thread = controller
            .flow_threads()
            .iter()
            .copied()
            .find(|&thread| self.objects.contains(thread) && self.region_chain(thread).contains(&region))?;
        let origin = self.local_to_absolute(region, content.origin, MapCoordinatesFlags::USE_TRANSFORMS);
        let offset: LayoutOffset = origin - portion.origin;
        let flow_point = point - offset;
        if !portion.contains(flow_point) {
            return None;
        }
        let mut child = self.objects[thread].last_child;
        while let Some(c) = child {
            if let Some(hit) = self.node_at_point(c, thread, flow_point, true) {
                return Some(hit);
            }
            child = self.objects[c].prev_sibling;
        }
        None
    }

    fn hit_test_result(&self, renderer: RenderId, point: LayoutPoint) -> HitTestResult {
        let mut node = None;
        let mut current = Some(renderer);
        while let Some(c) = current {
            if let Some(n) = self.objects[c].node {
                node = Some(n);
                break;
            }
            current = self.objects[c].parent;
        }
        HitTestResult {
            renderer,
            node,
            local_point: self.absolute_to_local(renderer, point, MapCoordinatesFlags::USE_TRANSFORMS),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::geometry::LayoutSize;
    use crate::object::BlockFlavor;
    use crate::style::{Length, Position, RenderStyle};

    fn sized(width: f32, height: f32) -> RenderStyle {
        RenderStyle {
            width: Length::Fixed(width),
            height: Length::Fixed(height),
            ..RenderStyle::block()
        }
    }

    #[test]
    fn test_innermost_block_wins() {
        let mut tree = RenderTree::new(LayoutSize::new(200.0, 200.0));
        let view = tree.view();
        let outer = tree.create_block(BlockFlavor::Flow, Rc::new(sized(100.0, 100.0)), Some(NodeId(1)));
        let inner = tree.create_block(BlockFlavor::Flow, Rc::new(sized(20.0, 20.0)), None);
        tree.add_child(view, outer, None);
        tree.add_child(outer, inner, None);
        tree.layout();

        let hit = tree.hit_test(LayoutPoint::new(5.0, 5.0)).map(|h| (h.renderer, h.node));
        assert_eq!(hit, Some((inner, Some(NodeId(1)))));
        let hit = tree.hit_test(LayoutPoint::new(50.0, 50.0)).map(|h| h.renderer);
        assert_eq!(hit, Some(outer));
        let hit = tree.hit_test(LayoutPoint::new(150.0, 150.0)).map(|h| h.renderer);
        assert_eq!(hit, Some(view));
    }

    #[test]
    fn test_positioned_layer_above_flow_content() {
        let mut tree = RenderTree::new(LayoutSize::new(200.0, 200.0));
        let view = tree.view();
        let first = tree.create_block(BlockFlavor::Flow, Rc::new(sized(100.0, 100.0)), None);
        let mut style = sized(50.0, 50.0);
        style.position = Position::Absolute;
        style.offsets.left = Length::Fixed(10.0);
        style.offsets.top = Length::Fixed(10.0);
        let overlay = tree.create_block(BlockFlavor::Flow, Rc::new(style), None);
        tree.add_child(view, first, None);
        tree.add_child(view, overlay, None);
        tree.layout();

        let hit = tree.hit_test(LayoutPoint::new(20.0, 20.0)).map(|h| (h.renderer, h.local_point));
        assert_eq!(hit, Some((overlay, LayoutPoint::new(10.0, 10.0))));
    }
}
