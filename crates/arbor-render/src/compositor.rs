//! Layer compositing decisions.
//!
//! A layer is composited when compositing is enabled and its style asks for
//! a backing of its own (`will-change: transform` or `transform-style:
//! preserve-3d`). Composited layers absorb transform and opacity changes
//! without relayout and receive repaints in their own coordinates. The
//! view's layer always paints into the frame.

use log::debug;

use crate::layer::LayerId;
use crate::object::RenderId;
use crate::style::TransformStyle;
use crate::tree::RenderTree;

/// Compositing state of one document.
#[derive(Debug, Default)]
pub struct RenderLayerCompositor {
    enabled: bool,
    composited_layers: usize,
}

impl RenderLayerCompositor {
    /// Whether compositing may be used at all.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether at least one layer is composited.
    #[must_use]
    pub const fn in_compositing_mode(&self) -> bool {
        self.composited_layers > 0
    }

    /// Number of composited layers after the last update.
    #[must_use]
    pub const fn composited_layer_count(&self) -> usize {
        self.composited_layers
    }
}

impl RenderTree {
    /// Allow or forbid compositing and recompute which layers composite.
    pub fn set_compositing_enabled(&mut self, enabled: bool) {
        self.compositor().enabled = enabled;
        self.update_compositing_layers();
    }

    /// Whether `layer` should paint into its own backing.
    #[must_use]
    pub fn should_composite(&self, layer: LayerId) -> bool {
        let enabled = self
            .view_state
            .compositor
            .as_ref()
            .is_some_and(RenderLayerCompositor::enabled);
        let renderer = self.layers[layer].renderer();
        let obj = &self.objects[renderer];
        enabled
            && !obj.is_render_view()
            && (obj.style.will_change_transform || obj.style.transform_style == TransformStyle::Preserve3d)
    }

    /// Re-evaluate [`Self::should_composite`] for every layer.
    pub fn update_compositing_layers(&mut self) {
        let layers: Vec<LayerId> = self.layers.iter().map(|(id, _)| id).collect();
        let mut count = 0;
        for layer in layers {
            let composite = self.should_composite(layer);
            if composite != self.layers[layer].composited {
                debug!(
                    target: "arbor::compositing",
                    "layer of {} {}",
                    self.layers[layer].renderer(),
                    if composite { "composited" } else { "no longer composited" }
                );
                self.layers[layer].composited = composite;
            }
            if composite {
                count += 1;
            }
        }
        self.compositor().composited_layers = count;
    }

    /// Nearest ancestor-or-self layer of `id` that paints into its own
    /// backing.
    #[must_use]
    pub fn enclosing_compositing_layer_for_repaint(&self, id: RenderId) -> Option<LayerId> {
        let mut current = self.enclosing_layer(id);
        while let Some(layer) = current {
            if self.layers[layer].is_composited() {
                return Some(layer);
            }
            current = self.layers[layer].parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::frame_view::RepaintTarget;
    use crate::geometry::LayoutSize;
    use crate::object::BlockFlavor;
    use crate::style::{Length, Position, RenderStyle};

    fn layered_block(tree: &mut RenderTree, parent: RenderId, will_change_transform: bool) -> RenderId {
        let style = RenderStyle {
            position: Position::Relative,
            will_change_transform,
            width: Length::Fixed(100.0),
            height: Length::Fixed(50.0),
            ..RenderStyle::block()
        };
        let id = tree.create_block(BlockFlavor::Flow, Rc::new(style), None);
        tree.add_child(parent, id, None);
        id
    }

    fn layer_of(tree: &RenderTree, id: RenderId) -> LayerId {
        tree.get(id).layer().expect("positioned boxes have layers")
    }

    #[test]
    fn test_compositing_follows_the_enabled_switch() {
        let mut tree = RenderTree::new(LayoutSize::new(400.0, 300.0));
        let view = tree.view();
        let promoted = layered_block(&mut tree, view, true);
        let plain = layered_block(&mut tree, view, false);
        tree.layout();
        assert!(!tree.layer(layer_of(&tree, promoted)).is_composited());
        assert!(!tree.uses_compositing());

        tree.set_compositing_enabled(true);
        assert!(tree.layer(layer_of(&tree, promoted)).is_composited());
        assert!(!tree.layer(layer_of(&tree, plain)).is_composited());
        assert!(!tree.should_composite(layer_of(&tree, view)));
        assert!(tree.uses_compositing());
        assert_eq!(tree.compositor().composited_layer_count(), 1);

        tree.set_compositing_enabled(false);
        assert!(!tree.layer(layer_of(&tree, promoted)).is_composited());
        assert_eq!(tree.compositor().composited_layer_count(), 0);
        assert!(!tree.uses_compositing());
    }

    #[test]
    fn test_style_change_promotes_a_layer() {
        let mut tree = RenderTree::new(LayoutSize::new(400.0, 300.0));
        let view = tree.view();
        let plain = layered_block(&mut tree, view, false);
        tree.layout();
        tree.set_compositing_enabled(true);
        assert!(!tree.compositor().in_compositing_mode());

        let mut style = tree.get(plain).style().clone();
        style.will_change_transform = true;
        tree.set_style(plain, Rc::new(style));
        assert!(tree.layer(layer_of(&tree, plain)).is_composited());
        assert!(tree.compositor().in_compositing_mode());
    }

    #[test]
    fn test_repaints_inside_a_composited_layer_target_it() {
        let mut tree = RenderTree::new(LayoutSize::new(400.0, 300.0));
        let view = tree.view();
        let promoted = layered_block(&mut tree, view, true);
        let child = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
        tree.add_child(promoted, child, None);
        let outside = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
        tree.add_child(view, outside, None);
        tree.set_compositing_enabled(true);
        tree.layout();
        let _ = tree.frame_view_mut().take_repaints();

        assert_eq!(tree.enclosing_compositing_layer_for_repaint(child), Some(layer_of(&tree, promoted)));
        assert_eq!(tree.enclosing_compositing_layer_for_repaint(outside), None);
        assert_eq!(tree.container_for_repaint(child), Some(promoted));
        assert_eq!(tree.container_for_repaint(outside), None);

        tree.repaint(promoted);
        let repaints = tree.frame_view_mut().take_repaints();
        assert!(!repaints.is_empty());
        assert!(repaints.iter().all(|record| record.target == RepaintTarget::Layer(promoted)));
    }
}
