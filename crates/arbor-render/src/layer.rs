//! Render layers: the paint-order tree built over boxes that need their own
//! stacking, transform or clip, and the post-layout repaint it drives.
//!
//! The layer tree mirrors the render tree with every layer-less object
//! collapsed into its nearest layered ancestor. It is kept in step with the
//! render tree by [`RenderTree::add_layers`], [`RenderTree::remove_layers`]
//! and [`RenderTree::move_layers`].

use bitflags::bitflags;
use log::trace;

use crate::arena::Id;
use crate::geometry::{LayoutOffset, LayoutPoint, LayoutRect, LayoutTransform, pixel_snapped};
use crate::geometry_map::RenderGeometryMap;
use crate::mapping::MapCoordinatesFlags;
use crate::object::RenderId;
use crate::tree::RenderTree;

/// Handle to a render layer.
pub type LayerId = Id<RenderLayer>;

bitflags! {
    /// What the next post-layout layer update must repaint. Empty means only
    /// the difference between the old and new bounds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RepaintStatus: u8 {
        /// Repaint the old and new bounds entirely.
        const NEEDS_FULL_REPAINT = 1 << 0;
        /// Full repaint caused by a positioned box moving.
        const NEEDS_FULL_REPAINT_FOR_POSITIONED_MOVEMENT_LAYOUT = (1 << 0) | (1 << 1);
    }
}

/// One node of the layer tree.
#[derive(Debug, Clone)]
pub struct RenderLayer {
    renderer: RenderId,
    pub(crate) parent: Option<LayerId>,
    pub(crate) children: Vec<LayerId>,
    pub(crate) transform: Option<LayoutTransform>,
    pub(crate) repaint_rect: LayoutRect,
    pub(crate) outline_box: LayoutRect,
    pub(crate) repaint_status: RepaintStatus,
    pub(crate) has_visible_content: bool,
    pub(crate) visible_content_status_dirty: bool,
    pub(crate) composited: bool,
}

impl RenderLayer {
    fn new(renderer: RenderId) -> Self {
        Self {
            renderer,
            parent: None,
            children: Vec::new(),
            transform: None,
            repaint_rect: LayoutRect::zero(),
            outline_box: LayoutRect::zero(),
            repaint_status: RepaintStatus::NEEDS_FULL_REPAINT,
            has_visible_content: false,
            visible_content_status_dirty: true,
            composited: false,
        }
    }

    /// The box that owns this layer.
    #[must_use]
    pub const fn renderer(&self) -> RenderId {
        self.renderer
    }

    /// Parent layer.
    #[must_use]
    pub const fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    /// Child layers in tree order.
    #[must_use]
    pub fn children(&self) -> &[LayerId] {
        &self.children
    }

    /// Transform applied to the renderer's content, if any.
    #[must_use]
    pub const fn transform(&self) -> Option<&LayoutTransform> {
        self.transform.as_ref()
    }

    /// Repaint rect computed by the last layer update, relative to the
    /// renderer's repaint container.
    #[must_use]
    pub const fn repaint_rect(&self) -> LayoutRect {
        self.repaint_rect
    }

    /// Outline bounds computed by the last layer update.
    #[must_use]
    pub const fn outline_box(&self) -> LayoutRect {
        self.outline_box
    }

    /// Pending repaint work.
    #[must_use]
    pub const fn repaint_status(&self) -> RepaintStatus {
        self.repaint_status
    }

    /// Whether the layer paints into its own backing.
    #[must_use]
    pub const fn is_composited(&self) -> bool {
        self.composited
    }

    /// Whether the renderer or a layer-less descendant is visible, as of the
    /// last status update.
    #[must_use]
    pub const fn has_visible_content(&self) -> bool {
        self.has_visible_content
    }
}

impl RenderTree {
    // ========== Creation ==========

    /// Whether `id` needs a layer of its own.
    #[must_use]
    pub fn requires_layer(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        if obj.is_render_view() {
            return true;
        }
        if obj.is_text() {
            return false;
        }
        let style = &obj.style;
        if obj.is_render_inline() {
            return style.has_in_flow_position() || style.has_opacity();
        }
        obj.is_positioned()
            || style.has_transform_related_property()
            || style.has_opacity()
            || style.has_filter()
            || obj.has_overflow_clip()
            || obj.has_columns()
            || obj.is_flow_thread()
            || style.will_change_transform
    }

    /// Give `id` a layer and hook it into the layer tree.
    pub fn create_layer(&mut self, id: RenderId) {
        if self.objects[id].has_layer() {
            return;
        }
        let layer = self.layers.insert(RenderLayer::new(id));
        self.objects[id].layer = Some(layer);
        self.update_layer_transform(id);
        self.insert_only_this_layer(layer);
    }

    /// Remove the layer of `id`, handing its children to its parent.
    pub fn destroy_layer(&mut self, id: RenderId) {
        let Some(layer) = self.objects[id].layer else {
            return;
        };
        self.remove_only_this_layer(layer);
        self.objects[id].layer = None;
        let _ = self.layers.remove(layer);
    }

    fn insert_only_this_layer(&mut self, layer: LayerId) {
        let renderer = self.layers[layer].renderer;
        let attach_to = self.objects[renderer]
            .parent
            .filter(|_| self.layers[layer].parent.is_none())
            .and_then(|parent| self.enclosing_layer(parent).map(|parent_layer| (parent, parent_layer)));
        if let Some((parent, parent_layer)) = attach_to {
            let before = self.find_next_layer(parent, parent_layer, Some(renderer), true);
            self.add_child_layer(parent_layer, layer, before);
        }
        let old_parent = self.layers[layer].parent;
        for child in self.child_ids(renderer) {
            self.move_layers(child, old_parent, layer);
        }
    }

    fn remove_only_this_layer(&mut self, layer: LayerId) {
        let Some(parent) = self.layers[layer].parent else {
            return;
        };
        let next_sibling = self.next_sibling_layer(layer);
        let children = std::mem::take(&mut self.layers[layer].children);
        for child in children {
            self.layers[child].parent = None;
            self.add_child_layer(parent, child, next_sibling);
            self.layers[child].repaint_status = RepaintStatus::NEEDS_FULL_REPAINT;
        }
        self.remove_child_layer(parent, layer);
    }

    /// Recompute the layer transform of `id` from its style and size.
    pub(crate) fn update_layer_transform(&mut self, id: RenderId) {
        let obj = &self.objects[id];
        let Some(layer) = obj.layer else {
            return;
        };
        let transform = (obj.is_box() && !obj.is_render_view() && obj.style.has_transform())
            .then(|| obj.style.transform_for_size(obj.size()));
        self.layers[layer].transform = transform;
    }

    // ========== Layer tree ==========

    fn next_sibling_layer(&self, layer: LayerId) -> Option<LayerId> {
        let parent = self.layers[layer].parent?;
        let siblings = &self.layers[parent].children;
        let index = siblings.iter().position(|&l| l == layer)?;
        siblings.get(index + 1).copied()
    }

    fn add_child_layer(&mut self, parent: LayerId, child: LayerId, before: Option<LayerId>) {
        debug_assert!(self.layers[child].parent.is_none());
        let children = &mut self.layers[parent].children;
        let index = before
            .and_then(|b| children.iter().position(|&l| l == b))
            .unwrap_or(children.len());
        children.insert(index, child);
        self.layers[child].parent = Some(parent);
        self.dirty_visible_content_status(child);
    }

    fn remove_child_layer(&mut self, parent: LayerId, child: LayerId) {
        self.layers[parent].children.retain(|&l| l != child);
        self.layers[child].parent = None;
    }

    /// Attach the layers of the subtree at `id` under `parent_layer`.
    pub fn add_layers(&mut self, id: RenderId, parent_layer: Option<LayerId>) {
        let Some(parent_layer) = parent_layer else {
            return;
        };
        let mut new_object = Some(id);
        let mut before = None;
        self.add_layers_recursive(id, parent_layer, &mut new_object, &mut before);
    }

    fn add_layers_recursive(
        &mut self,
        id: RenderId,
        parent_layer: LayerId,
        new_object: &mut Option<RenderId>,
        before: &mut Option<LayerId>,
    ) {
        if let Some(layer) = self.objects[id].layer {
            // The insertion point is found once, for the first layer.
            if let Some(object) = new_object.take() {
                *before = self.objects[object]
                    .parent
                    .and_then(|p| self.find_next_layer(p, parent_layer, Some(object), true));
            }
            self.add_child_layer(parent_layer, layer, *before);
            return;
        }
        for child in self.child_ids(id) {
            self.add_layers_recursive(child, parent_layer, new_object, before);
        }
    }

    /// Detach the layers of the subtree at `id` from `parent_layer`.
    pub fn remove_layers(&mut self, id: RenderId, parent_layer: Option<LayerId>) {
        let Some(parent_layer) = parent_layer else {
            return;
        };
        if let Some(layer) = self.objects[id].layer {
            self.remove_child_layer(parent_layer, layer);
            return;
        }
        for child in self.child_ids(id) {
            self.remove_layers(child, Some(parent_layer));
        }
    }

    /// Reparent the layers of the subtree at `id` from `old_parent` to
    /// `new_parent`.
    pub fn move_layers(&mut self, id: RenderId, old_parent: Option<LayerId>, new_parent: LayerId) {
        if let Some(layer) = self.objects[id].layer {
            debug_assert_eq!(old_parent, self.layers[layer].parent);
            if let Some(old) = self.layers[layer].parent {
                self.remove_child_layer(old, layer);
            }
            self.add_child_layer(new_parent, layer, None);
            return;
        }
        for child in self.child_ids(id) {
            self.move_layers(child, old_parent, new_parent);
        }
    }

    /// The first layer after `start_point` (or among the children of `id`
    /// when `None`) whose parent is `parent_layer`, climbing to later
    /// siblings of ancestors when `check_parent` is set.
    #[must_use]
    pub fn find_next_layer(
        &self,
        id: RenderId,
        parent_layer: LayerId,
        start_point: Option<RenderId>,
        check_parent: bool,
    ) -> Option<LayerId> {
        let our_layer = self.objects[id].layer;
        if let Some(layer) = our_layer.filter(|&l| self.layers[l].parent == Some(parent_layer)) {
            return Some(layer);
        }

        if our_layer.is_none_or(|l| l == parent_layer) {
            let mut current = match start_point {
                Some(start) => self.objects[start].next_sibling,
                None => self.objects[id].first_child,
            };
            while let Some(c) = current {
                if let Some(found) = self.find_next_layer(c, parent_layer, None, false) {
                    return Some(found);
                }
                current = self.objects[c].next_sibling;
            }
        }

        if our_layer == Some(parent_layer) {
            return None;
        }

        if !check_parent {
            return None;
        }
        let parent = self.objects[id].parent?;
        self.find_next_layer(parent, parent_layer, Some(id), true)
    }

    // ========== Coordinates ==========

    /// Offset from the local space of `renderer` to that of `ancestor`,
    /// both layer owners with only translations between them.
    #[must_use]
    pub fn convert_to_layer_coords(&self, renderer: RenderId, ancestor: RenderId) -> LayoutOffset {
        self.local_to_container_point(renderer, LayoutPoint::zero(), Some(ancestor), MapCoordinatesFlags::empty())
            .to_vector()
    }

    // ========== Status ==========

    /// Mark the layer of `id` for a full repaint after the next layout.
    pub(crate) fn set_layer_needs_full_repaint(&mut self, id: RenderId) {
        if let Some(layer) = self.objects[id].layer {
            self.layers[layer].repaint_status = RepaintStatus::NEEDS_FULL_REPAINT;
        }
    }

    /// Mark the layer of `id` as moved by positioned movement layout.
    pub(crate) fn set_layer_needs_full_repaint_for_positioned_movement(&mut self, id: RenderId) {
        if let Some(layer) = self.objects[id].layer {
            self.layers[layer].repaint_status = RepaintStatus::NEEDS_FULL_REPAINT_FOR_POSITIONED_MOVEMENT_LAYOUT;
        }
    }

    /// Invalidate the cached visible-content flag of `layer`.
    pub fn dirty_visible_content_status(&mut self, layer: LayerId) {
        self.layers[layer].visible_content_status_dirty = true;
    }

    fn compute_visible_content(&self, layer: LayerId) -> bool {
        let renderer = self.layers[layer].renderer;
        if self.objects[renderer].style.is_visible() {
            return true;
        }
        // A visible descendant without a layer of its own paints into us.
        let mut current = self.next_in_pre_order(renderer, Some(renderer));
        while let Some(c) = current {
            if self.objects[c].has_layer() {
                current = self.next_in_pre_order_after_children(c, Some(renderer));
                continue;
            }
            if self.objects[c].style.is_visible() {
                return true;
            }
            current = self.next_in_pre_order(c, Some(renderer));
        }
        false
    }

    fn update_visible_content_status(&mut self, layer: LayerId) {
        if !self.layers[layer].visible_content_status_dirty {
            return;
        }
        let visible = self.compute_visible_content(layer);
        let layer_ref = &mut self.layers[layer];
        layer_ref.has_visible_content = visible;
        layer_ref.visible_content_status_dirty = false;
    }

    /// Whether the layer enclosing `id` has visible content.
    pub(crate) fn enclosing_layer_has_visible_content(&self, id: RenderId) -> bool {
        self.enclosing_layer(id).is_some_and(|layer| {
            let layer_ref = &self.layers[layer];
            if layer_ref.visible_content_status_dirty {
                self.compute_visible_content(layer)
            } else {
                layer_ref.has_visible_content
            }
        })
    }

    // ========== Post-layout update ==========

    /// Recompute the repaint rects of `root` and every layer below it and
    /// repaint whatever moved or changed.
    pub fn update_layer_positions_after_layout(&mut self, root: LayerId) {
        let mut geometry_map = RenderGeometryMap::new(MapCoordinatesFlags::USE_TRANSFORMS);
        if let Some(parent) = self.layers[root].parent {
            let parent_renderer = self.layers[parent].renderer;
            geometry_map.push_mappings_to_ancestor(self, parent_renderer, None);
        }
        self.update_layer_positions(root, &mut geometry_map);
    }

    fn update_layer_positions(&mut self, layer: LayerId, geometry_map: &mut RenderGeometryMap) {
        let renderer = self.layers[layer].renderer;
        let parent = self.layers[layer].parent;
        geometry_map.push_layer_mappings_to_ancestor(self, layer, parent);

        self.update_visible_content_status(layer);
        if self.layers[layer].has_visible_content {
            let repaint_container = self.container_for_repaint(renderer);
            let old_repaint_rect = self.layers[layer].repaint_rect;
            let old_outline_box = self.layers[layer].outline_box;
            let repaint_rect = self.clipped_overflow_rect_for_repaint(renderer, repaint_container);
            let outline_box = self.outline_bounds_for_repaint(renderer, repaint_container, Some(geometry_map));
            {
                let layer_ref = &mut self.layers[layer];
                layer_ref.repaint_rect = repaint_rect;
                layer_ref.outline_box = outline_box;
            }

            if !self.view_state.printing {
                let status = self.layers[layer].repaint_status;
                if status.contains(RepaintStatus::NEEDS_FULL_REPAINT) {
                    trace!(target: "arbor::repaint", "full layer repaint of {renderer}");
                    self.repaint_using_container(repaint_container, &pixel_snapped(&old_repaint_rect));
                    if repaint_rect != old_repaint_rect {
                        self.repaint_using_container(repaint_container, &pixel_snapped(&repaint_rect));
                    }
                } else if self.should_repaint_after_layout(layer) {
                    let _ = self.repaint_after_layout_if_needed(
                        renderer,
                        repaint_container,
                        &old_repaint_rect,
                        &old_outline_box,
                        Some(&repaint_rect),
                        Some(&outline_box),
                    );
                }
            }
        } else {
            let layer_ref = &mut self.layers[layer];
            layer_ref.repaint_rect = LayoutRect::zero();
            layer_ref.outline_box = LayoutRect::zero();
        }
        self.layers[layer].repaint_status = RepaintStatus::empty();

        let children = self.layers[layer].children.clone();
        for child in children {
            self.update_layer_positions(child, geometry_map);
        }

        geometry_map.pop_layer_mappings_to_ancestor(self, parent);
    }

    fn should_repaint_after_layout(&self, layer: LayerId) -> bool {
        let layer = &self.layers[layer];
        layer.repaint_status == RepaintStatus::NEEDS_FULL_REPAINT_FOR_POSITIONED_MOVEMENT_LAYOUT || !layer.composited
    }

    /// Repaint the renderer of `layer` and of every layer below it.
    pub fn repaint_including_descendants(&mut self, layer: LayerId) {
        let renderer = self.layers[layer].renderer;
        self.repaint(renderer);
        let children = self.layers[layer].children.clone();
        for child in children {
            self.repaint_including_descendants(child);
        }
    }

    /// Layers of the document in paint order: negative z-index children
    /// first, then the layer itself, then the rest by z-index.
    #[must_use]
    pub fn layers_in_paint_order(&self) -> Vec<LayerId> {
        let mut out = Vec::new();
        if let Some(root) = self.objects[self.view].layer {
            self.collect_paint_order(root, &mut out);
        }
        out
    }

    fn collect_paint_order(&self, layer: LayerId, out: &mut Vec<LayerId>) {
        let z = |l: LayerId| self.objects[self.layers[l].renderer].style.z_index.unwrap_or(0);
        let mut children = self.layers[layer].children.clone();
        // Stable, so tree order breaks ties.
        children.sort_by_key(|&l| z(l));
        for &child in children.iter().filter(|&&l| z(l) < 0) {
            self.collect_paint_order(child, out);
        }
        out.push(layer);
        for &child in children.iter().filter(|&&l| z(l) >= 0) {
            self.collect_paint_order(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::geometry::LayoutSize;
    use crate::object::BlockFlavor;
    use crate::style::{Length, Position, RenderStyle, Visibility};

    fn positioned(visibility: Visibility) -> RenderStyle {
        RenderStyle {
            position: Position::Relative,
            visibility,
            width: Length::Fixed(100.0),
            height: Length::Fixed(50.0),
            ..RenderStyle::block()
        }
    }

    fn laid_out(visibility: Visibility) -> (RenderTree, RenderId, LayerId) {
        let mut tree = RenderTree::new(LayoutSize::new(400.0, 300.0));
        let view = tree.view();
        let id = tree.create_block(BlockFlavor::Flow, Rc::new(positioned(visibility)), None);
        tree.add_child(view, id, None);
        tree.layout();
        let layer = tree.get(id).layer().expect("relative boxes have layers");
        (tree, id, layer)
    }

    #[test]
    fn test_hidden_layer_has_no_visible_content() {
        let (tree, _, layer) = laid_out(Visibility::Hidden);
        assert!(!tree.layer(layer).has_visible_content());
        assert!(tree.layer(layer).repaint_rect().is_empty());

        let (tree, _, layer) = laid_out(Visibility::Visible);
        assert!(tree.layer(layer).has_visible_content());
        assert!(!tree.layer(layer).repaint_rect().is_empty());
    }

    #[test]
    fn test_visible_child_keeps_a_hidden_layer_visible() {
        let mut tree = RenderTree::new(LayoutSize::new(400.0, 300.0));
        let view = tree.view();
        let hidden = tree.create_block(BlockFlavor::Flow, Rc::new(positioned(Visibility::Hidden)), None);
        tree.add_child(view, hidden, None);
        let child = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
        tree.add_child(hidden, child, None);
        tree.layout();

        let layer = tree.get(hidden).layer().expect("relative boxes have layers");
        assert!(tree.layer(layer).has_visible_content());
    }

    #[test]
    fn test_becoming_visible_updates_the_layer_at_once() {
        let (mut tree, id, layer) = laid_out(Visibility::Hidden);
        tree.set_style(id, Rc::new(positioned(Visibility::Visible)));
        // Known without waiting for the next layout.
        assert!(tree.layer(layer).has_visible_content());
    }

    #[test]
    fn test_becoming_hidden_is_recomputed_after_layout() {
        let (mut tree, id, layer) = laid_out(Visibility::Visible);
        tree.set_style(id, Rc::new(positioned(Visibility::Hidden)));
        tree.layout();
        assert!(!tree.layer(layer).has_visible_content());
        assert!(tree.layer(layer).repaint_rect().is_empty());
    }

    #[test]
    fn test_layers_follow_paint_order() {
        let mut tree = RenderTree::new(LayoutSize::new(400.0, 300.0));
        let view = tree.view();
        let mut raised = positioned(Visibility::Visible);
        raised.z_index = Some(2);
        let mut sunk = positioned(Visibility::Visible);
        sunk.z_index = Some(-1);
        let first = tree.create_block(BlockFlavor::Flow, Rc::new(raised), None);
        let second = tree.create_block(BlockFlavor::Flow, Rc::new(sunk), None);
        tree.add_child(view, first, None);
        tree.add_child(view, second, None);
        tree.layout();

        let renderers: Vec<RenderId> = tree
            .layers_in_paint_order()
            .into_iter()
            .map(|layer| tree.layer(layer).renderer())
            .collect();
        assert_eq!(renderers, vec![second, view, first]);
    }
}
