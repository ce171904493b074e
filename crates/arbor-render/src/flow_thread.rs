//! Named flows and regions.
//!
//! [CSS Regions § 2 Named flows and region chains](https://www.w3.org/TR/css-regions-1/#named-flows-and-regions)
//!
//! "A named flow is the ordered sequence of content associated with a flow
//! with a given identifier. ... A region chain is the sequence of regions
//! that are associated with a named flow."
//!
//! Content with `flow-into: name` is moved into a flow thread, a block
//! hanging off the view that is laid out once at the width of its first
//! region. Each region shows one vertical slice of the flow thread (its
//! portion). Regions with `height: auto` take their height from the flow
//! content, which needs an extra layout pass.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, trace};

use crate::geometry::{LayoutPoint, LayoutRect, LayoutSize, intersect, rect};
use crate::layout_bits::MarkingBehavior;
use crate::object::{BlockData, BlockFlavor, RenderId, RenderKind};
use crate::style::RenderStyle;
use crate::tree::RenderTree;

/// Registry of the document's flow threads and the slice each region shows.
#[derive(Debug, Default)]
pub struct FlowThreadController {
    flow_threads: Vec<RenderId>,
    region_portions: HashMap<RenderId, LayoutRect>,
}

impl FlowThreadController {
    /// Flow threads in creation order.
    #[must_use]
    pub fn flow_threads(&self) -> &[RenderId] {
        &self.flow_threads
    }

    /// Part of its flow thread `region` displays, in flow-thread coordinates.
    #[must_use]
    pub fn region_portion(&self, region: RenderId) -> Option<LayoutRect> {
        self.region_portions.get(&region).copied()
    }
}

/// Whether a layout pass sizes auto-height regions from the flow or keeps
/// their current height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionSizing {
    /// Auto-height regions take whatever flow content is left.
    Measure,
    /// Every region keeps its laid out height.
    Constrained,
}

impl RenderTree {
    /// The flow thread collecting content for `name`, created on first use.
    pub fn ensure_render_flow_thread_with_name(&mut self, name: &str) -> RenderId {
        let existing = self.view_state.flow_thread_controller.as_ref().and_then(|controller| {
            controller.flow_threads.iter().copied().find(|&thread| {
                self.objects.contains(thread)
                    && self.objects[thread].block_flavor() == Some(&BlockFlavor::FlowThread(name.to_string()))
            })
        });
        if let Some(thread) = existing {
            return thread;
        }
        let thread = self.create_anonymous_renderer(
            RenderKind::Block(BlockData::new(BlockFlavor::FlowThread(name.to_string()))),
            Rc::new(RenderStyle::block()),
        );
        let view = self.view;
        self.add_child(view, thread, None);
        self.flow_thread_controller().flow_threads.push(thread);
        debug!(target: "arbor::flow", "named flow '{name}' created");
        thread
    }

    /// Regions showing `flow_thread`, in document order.
    #[must_use]
    pub fn region_chain(&self, flow_thread: RenderId) -> Vec<RenderId> {
        let Some(BlockFlavor::FlowThread(name)) = self.objects[flow_thread].block_flavor() else {
            return Vec::new();
        };
        let mut regions = Vec::new();
        let mut current = self.next_in_pre_order(self.view, Some(self.view));
        while let Some(c) = current {
            let obj = &self.objects[c];
            if obj.is_flow_thread() {
                // Regions inside a flow thread do not display that flow.
                current = self.next_in_pre_order_after_children(c, Some(self.view));
                continue;
            }
            if matches!(obj.block_flavor(), Some(BlockFlavor::Region(region_name)) if region_name == name) {
                regions.push(c);
            }
            current = self.next_in_pre_order(c, Some(self.view));
        }
        regions
    }

    /// Whether some region of a named flow has `height: auto`.
    #[must_use]
    pub fn has_auto_logical_height_regions(&self) -> bool {
        let Some(controller) = self.view_state.flow_thread_controller.as_ref() else {
            return false;
        };
        controller
            .flow_threads
            .iter()
            .filter(|&&thread| self.objects.contains(thread))
            .flat_map(|&thread| self.region_chain(thread))
            .any(|region| self.objects[region].style.height.is_auto())
    }

    /// Invalidate `rect`, given in flow-thread coordinates, in every region
    /// that shows it.
    pub fn repaint_rectangle_in_regions(&mut self, flow_thread: RenderId, rect: &LayoutRect) {
        if rect.is_empty() {
            return;
        }
        for region in self.region_chain(flow_thread) {
            let Some(portion) = self
                .view_state
                .flow_thread_controller
                .as_ref()
                .and_then(|c| c.region_portion(region))
            else {
                continue;
            };
            let clipped = intersect(rect, &portion);
            if clipped.is_empty() {
                continue;
            }
            let origin = self.objects[region].content_box_rect().origin;
            let local = clipped.translate(origin - portion.origin);
            self.repaint_rectangle(region, &local);
        }
    }

    /// Map a point in flow-thread coordinates into the local space of the
    /// region displaying it.
    #[must_use]
    pub fn flow_thread_point_to_region(&self, flow_thread: RenderId, point: LayoutPoint) -> Option<(RenderId, LayoutPoint)> {
        let controller = self.view_state.flow_thread_controller.as_ref()?;
        self.region_chain(flow_thread).into_iter().find_map(|region| {
            let portion = controller.region_portion(region)?;
            let inside = point.y >= portion.min_y() && point.y < portion.max_y();
            inside.then(|| {
                let origin = self.objects[region].content_box_rect().origin;
                (region, point + (origin - portion.origin))
            })
        })
    }

    // ========== Layout ==========

    /// Lay out every flow thread at the width of its first region and slice
    /// it into its regions.
    pub(crate) fn layout_flow_threads(&mut self) {
        self.layout_flow_threads_with(RegionSizing::Constrained);
    }

    fn layout_flow_threads_with(&mut self, sizing: RegionSizing) {
        let Some(controller) = self.view_state.flow_thread_controller.as_mut() else {
            return;
        };
        let objects = &self.objects;
        controller.flow_threads.retain(|&thread| objects.contains(thread));
        controller.region_portions.clear();
        let threads = controller.flow_threads.clone();

        for thread in threads {
            let regions = self.region_chain(thread);
            let width = regions
                .first()
                .map_or(0.0, |&first| self.objects[first].content_box_rect().width());
            let width_changed = self.objects[thread]
                .block()
                .is_some_and(|data| data.override_width != Some(width));
            if let Some(data) = self.objects[thread].block_mut() {
                data.override_width = Some(width);
            }
            self.objects[thread].frame_rect.origin = LayoutPoint::zero();
            if width_changed {
                self.set_needs_layout(thread, MarkingBehavior::MarkOnlyThis);
            }
            if self.objects[thread].needs_layout() {
                self.layout_object(thread);
            }

            let flow_height = self.objects[thread].size().height;
            let mut offset = 0.0;
            for region in regions {
                let auto_height = self.objects[region].style.height.is_auto();
                let height = if sizing == RegionSizing::Measure && auto_height {
                    (flow_height - offset).max(0.0)
                } else {
                    self.objects[region].content_box_rect().height()
                };
                let portion = rect(0.0, offset, width, height);
                trace!(target: "arbor::flow", "region {region} shows {portion:?}");
                let _ = self.flow_thread_controller().region_portions.insert(region, portion);
                offset += height;
            }
        }
    }

    /// Lay out a document whose auto-height regions depend on their flow,
    /// returning the number of passes run.
    ///
    /// Pass one measures the flow with the regions at their natural height,
    /// pass two sizes the auto-height regions from the measured portions and
    /// lays the document out again. A third pass runs only when the second
    /// changed the flow thread's size.
    pub(crate) fn layout_content_in_auto_logical_height_regions(&mut self, relayout_children: bool) -> usize {
        let auto_regions = self.auto_logical_height_regions();

        // Pass 1: measure.
        let measured = self.measure_auto_height_regions(&auto_regions, relayout_children);

        // Pass 2: constrain the auto-height regions to their portions.
        self.constrain_auto_height_regions_and_relayout(&auto_regions);
        if !self.flow_changed_since(&measured) {
            return 2;
        }

        // Pass 3: the flow changed size under the new regions.
        debug!(target: "arbor::flow", "flow size changed, third region pass");
        self.layout_flow_threads_with(RegionSizing::Measure);
        self.constrain_auto_height_regions_and_relayout(&auto_regions);
        3
    }

    fn auto_logical_height_regions(&self) -> Vec<RenderId> {
        self.view_state
            .flow_thread_controller
            .as_ref()
            .map(|c| c.flow_threads.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|&thread| self.objects.contains(thread))
            .flat_map(|thread| self.region_chain(thread))
            .filter(|&region| self.objects[region].style.height.is_auto())
            .collect()
    }

    /// Lay out with `regions` at their natural height and slice the flows
    /// with auto-height regions taking the rest of their flow. Returns the
    /// flow thread sizes seen.
    fn measure_auto_height_regions(&mut self, regions: &[RenderId], relayout_children: bool) -> Vec<LayoutSize> {
        for &region in regions {
            self.set_region_override_height(region, None);
        }
        self.layout_block_contents_of_view(relayout_children);
        self.layout_flow_threads_with(RegionSizing::Measure);
        self.flow_thread_sizes()
    }

    fn constrain_auto_height_regions_and_relayout(&mut self, regions: &[RenderId]) {
        self.constrain_auto_height_regions(regions);
        self.layout_block_contents_of_view(false);
        self.layout_flow_threads_with(RegionSizing::Constrained);
    }

    fn flow_changed_since(&self, measured: &[LayoutSize]) -> bool {
        self.flow_thread_sizes() != measured
    }

    fn constrain_auto_height_regions(&mut self, regions: &[RenderId]) {
        for &region in regions {
            let portion = self
                .view_state
                .flow_thread_controller
                .as_ref()
                .and_then(|c| c.region_portion(region));
            let bp = {
                let style = &self.objects[region].style;
                style.border_widths().vertical() + style.padding.vertical()
            };
            let height = portion.map_or(bp, |p| p.height() + bp);
            self.set_region_override_height(region, Some(height));
        }
    }

    fn set_region_override_height(&mut self, region: RenderId, height: Option<f32>) {
        let changed = self.objects[region]
            .block()
            .is_some_and(|data| data.override_height != height);
        if let Some(data) = self.objects[region].block_mut() {
            data.override_height = height;
        }
        if changed {
            self.set_needs_layout(region, MarkingBehavior::MarkContainingBlockChain);
        }
    }

    fn flow_thread_sizes(&self) -> Vec<LayoutSize> {
        self.view_state
            .flow_thread_controller
            .as_ref()
            .map(|c| {
                c.flow_threads
                    .iter()
                    .map(|&thread| self.objects[thread].size())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Length;

    fn new_tree() -> RenderTree {
        RenderTree::new(LayoutSize::new(800.0, 600.0))
    }

    fn add_region(tree: &mut RenderTree, name: &str, height: Length) -> RenderId {
        let view = tree.view();
        let style = RenderStyle {
            height,
            ..RenderStyle::block()
        };
        let region = tree.create_block(BlockFlavor::Region(name.to_string()), Rc::new(style), None);
        tree.add_child(view, region, None);
        region
    }

    fn add_flow_content(tree: &mut RenderTree, name: &str, height: f32) -> RenderId {
        let thread = tree.ensure_render_flow_thread_with_name(name);
        let style = RenderStyle {
            height: Length::Fixed(height),
            ..RenderStyle::block()
        };
        let block = tree.create_block(BlockFlavor::Flow, Rc::new(style), None);
        tree.add_child(thread, block, None);
        block
    }

    #[test]
    fn test_auto_height_region_takes_the_flow_height() {
        let mut tree = new_tree();
        let region = add_region(&mut tree, "main", Length::Auto);
        let _ = add_flow_content(&mut tree, "main", 40.0);
        let _ = add_flow_content(&mut tree, "main", 60.0);
        assert!(tree.has_auto_logical_height_regions());

        tree.layout();
        assert_eq!(tree.get(region).size().height, 100.0);
        assert_eq!(
            tree.flow_thread_controller().region_portion(region),
            Some(rect(0.0, 0.0, 800.0, 100.0))
        );
    }

    #[test]
    fn test_auto_height_region_takes_what_fixed_regions_leave() {
        let mut tree = new_tree();
        let fixed = add_region(&mut tree, "main", Length::Fixed(30.0));
        let auto = add_region(&mut tree, "main", Length::Auto);
        let _ = add_flow_content(&mut tree, "main", 100.0);
        let thread = tree.ensure_render_flow_thread_with_name("main");
        assert_eq!(tree.region_chain(thread), vec![fixed, auto]);

        tree.layout();
        assert_eq!(tree.get(fixed).size().height, 30.0);
        assert_eq!(tree.get(auto).size().height, 70.0);
        assert_eq!(tree.get(auto).location().y, 30.0);
        let controller = tree.flow_thread_controller();
        assert_eq!(controller.region_portion(fixed), Some(rect(0.0, 0.0, 800.0, 30.0)));
        assert_eq!(controller.region_portion(auto), Some(rect(0.0, 30.0, 800.0, 70.0)));
    }

    #[test]
    fn test_fixed_regions_need_a_single_pass() {
        let mut tree = new_tree();
        let region = add_region(&mut tree, "main", Length::Fixed(50.0));
        let _ = add_flow_content(&mut tree, "main", 120.0);
        assert!(!tree.has_auto_logical_height_regions());

        tree.layout();
        assert_eq!(tree.get(region).size().height, 50.0);
        assert_eq!(
            tree.flow_thread_controller().region_portion(region),
            Some(rect(0.0, 0.0, 800.0, 50.0))
        );
    }

    #[test]
    fn test_steady_flow_settles_in_two_passes() {
        let mut tree = new_tree();
        let region = add_region(&mut tree, "main", Length::Auto);
        let _ = add_flow_content(&mut tree, "main", 80.0);
        tree.layout();

        let view = tree.view();
        tree.push_layout_state_root(view);
        let passes = tree.layout_content_in_auto_logical_height_regions(false);
        tree.pop_layout_state_root();
        assert_eq!(passes, 2);
        assert_eq!(tree.get(region).size().height, 80.0);
    }

    #[test]
    fn test_flow_growing_between_passes_is_measured_again() {
        let mut tree = new_tree();
        let region = add_region(&mut tree, "main", Length::Auto);
        let _ = add_flow_content(&mut tree, "main", 40.0);
        tree.layout();

        let view = tree.view();
        let regions = tree.auto_logical_height_regions();
        assert_eq!(regions, vec![region]);
        tree.push_layout_state_root(view);
        let measured = tree.measure_auto_height_regions(&regions, false);
        assert!(!tree.flow_changed_since(&measured));
        // Content arriving while the regions are being sized.
        let _ = add_flow_content(&mut tree, "main", 20.0);
        tree.constrain_auto_height_regions_and_relayout(&regions);
        assert!(tree.flow_changed_since(&measured));
        // The region still shows the old flow height until a third pass.
        assert_eq!(tree.get(region).size().height, 40.0);

        tree.layout_flow_threads_with(RegionSizing::Measure);
        tree.constrain_auto_height_regions_and_relayout(&regions);
        tree.pop_layout_state_root();
        assert_eq!(tree.get(region).size().height, 60.0);
    }

    #[test]
    fn test_growing_flow_resizes_its_auto_region() {
        let mut tree = new_tree();
        let region = add_region(&mut tree, "main", Length::Auto);
        let _ = add_flow_content(&mut tree, "main", 40.0);
        tree.layout();
        assert_eq!(tree.get(region).size().height, 40.0);

        let _ = add_flow_content(&mut tree, "main", 50.0);
        tree.layout();
        assert_eq!(tree.get(region).size().height, 90.0);
    }
}
