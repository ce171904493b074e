//! Container and containing-block resolution.
//!
//! [§ 10.1 Definition of "containing block"](https://www.w3.org/TR/CSS2/visudet.html#containing-block-details)

use crate::layer::LayerId;
use crate::object::RenderId;
use crate::style::Position;
use crate::tree::RenderTree;

impl RenderTree {
    /// The object `id` is positioned relative to.
    ///
    /// Unlike [`Self::containing_block`] this works on subtrees that are not
    /// attached yet, returns the parent for normal flow, and returns an
    /// in-flow positioned inline for absolutely positioned descendants.
    #[must_use]
    pub fn container(&self, id: RenderId) -> Option<RenderId> {
        self.container_skipping(id, None).0
    }

    /// [`Self::container`], also reporting whether `repaint_container` was
    /// passed on the way.
    #[must_use]
    pub fn container_skipping(
        &self,
        id: RenderId,
        repaint_container: Option<RenderId>,
    ) -> (Option<RenderId>, bool) {
        let obj = &self.objects[id];
        let mut o = obj.parent;
        if obj.is_text() {
            return (o, false);
        }
        let mut skipped = false;
        match obj.style.position {
            Position::Fixed => {
                while let Some(current) = o {
                    if self.can_contain_fixed_position_objects(current) {
                        break;
                    }
                    if Some(current) == repaint_container {
                        skipped = true;
                    }
                    o = self.objects[current].parent;
                }
            }
            Position::Absolute => {
                // Climb as high as possible even in an uninstalled subtree.
                while let Some(current) = o {
                    if self.can_contain_absolute_position_objects(current) {
                        break;
                    }
                    if Some(current) == repaint_container {
                        skipped = true;
                    }
                    o = self.objects[current].parent;
                }
            }
            Position::Static | Position::Relative => {}
        }
        (o, skipped)
    }

    fn can_contain_fixed_position_objects(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        obj.is_render_view()
            || obj.is_flow_thread()
            || (obj.has_transform() && obj.is_render_block())
    }

    fn can_contain_absolute_position_objects(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        obj.style.position != Position::Static || self.can_contain_fixed_position_objects(id)
    }

    /// The block whose content box `id` is sized and positioned against.
    ///
    /// Returns `None` for an orphaned subtree.
    #[must_use]
    pub fn containing_block(&self, id: RenderId) -> Option<RenderId> {
        let obj = &self.objects[id];
        let mut o = obj.parent;
        let position = if obj.is_text() {
            Position::Static
        } else {
            obj.style.position
        };

        match position {
            Position::Fixed => {
                while let Some(current) = o {
                    if self.can_contain_fixed_position_objects(current) {
                        break;
                    }
                    o = self.objects[current].parent;
                }
            }
            Position::Absolute => {
                while let Some(current) = o {
                    let c = &self.objects[current];
                    if c.style.position != Position::Static && (!c.is_inline() || c.is_replaced()) {
                        break;
                    }
                    if self.can_contain_fixed_position_objects(current) {
                        break;
                    }
                    // A relatively positioned inline lays its positioned
                    // descendants out through its own containing block.
                    if c.style.has_in_flow_position() && c.is_inline() && !c.is_replaced() {
                        o = self.containing_block(current);
                        break;
                    }
                    o = c.parent;
                }
                if let Some(current) = o.filter(|&c| !self.objects[c].is_render_block()) {
                    o = self.containing_block(current);
                }
                while let Some(current) = o {
                    if !self.objects[current].is_anonymous_block() {
                        break;
                    }
                    o = self.containing_block(current);
                }
            }
            Position::Static | Position::Relative => {
                while let Some(current) = o {
                    let c = &self.objects[current];
                    if c.is_render_block() && !(c.is_inline() && !c.is_replaced()) {
                        break;
                    }
                    o = c.parent;
                }
            }
        }

        o.filter(|&cb| self.objects[cb].is_render_block())
    }

    /// Nearest ancestor-or-self that owns a layer.
    #[must_use]
    pub fn enclosing_layer(&self, id: RenderId) -> Option<LayerId> {
        let mut current = Some(id);
        while let Some(c) = current {
            if let Some(layer) = self.objects[c].layer {
                return Some(layer);
            }
            current = self.objects[c].parent;
        }
        None
    }

    /// Nearest ancestor-or-self with a frame of its own.
    #[must_use]
    pub fn enclosing_box(&self, id: RenderId) -> Option<RenderId> {
        let mut current = Some(id);
        while let Some(c) = current {
            if self.objects[c].is_box() {
                return Some(c);
            }
            current = self.objects[c].parent;
        }
        None
    }

    /// Nearest named flow thread holding `id`.
    #[must_use]
    pub fn flow_thread_containing(&self, id: RenderId) -> Option<RenderId> {
        let mut current = Some(id);
        while let Some(c) = current {
            if self.objects[c].is_flow_thread() {
                return Some(c);
            }
            current = self.objects[c].parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::geometry::LayoutSize;
    use crate::object::BlockFlavor;
    use crate::style::{Display, Position, RenderStyle};
    use crate::tree::RenderTree;

    fn styled(position: Position, display: Display) -> Rc<RenderStyle> {
        Rc::new(RenderStyle {
            position,
            display,
            ..RenderStyle::default()
        })
    }

    #[test]
    fn test_absolute_skips_static_ancestors() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let view = tree.view();
        let outer = tree.create_block(BlockFlavor::Flow, styled(Position::Relative, Display::Block), None);
        let inner = tree.create_block(BlockFlavor::Flow, styled(Position::Static, Display::Block), None);
        let abs = tree.create_block(BlockFlavor::Flow, styled(Position::Absolute, Display::Block), None);
        tree.add_child(view, outer, None);
        tree.add_child(outer, inner, None);
        tree.add_child(inner, abs, None);

        assert_eq!(tree.container(abs), Some(outer));
        assert_eq!(tree.containing_block(abs), Some(outer));
        assert_eq!(tree.container(inner), Some(outer));
    }

    #[test]
    fn test_relative_inline_is_container_but_not_containing_block() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let view = tree.view();
        let div = tree.create_block(BlockFlavor::Flow, styled(Position::Static, Display::Block), None);
        let span = tree.create_inline(styled(Position::Relative, Display::Inline), None);
        let abs = tree.create_block(BlockFlavor::Flow, styled(Position::Absolute, Display::Block), None);
        tree.add_child(view, div, None);
        tree.add_child(div, span, None);
        tree.add_child(span, abs, None);

        assert_eq!(tree.container(abs), Some(span));
        assert_eq!(tree.containing_block(abs), Some(div));
    }

    #[test]
    fn test_orphan_has_no_containing_block() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let lonely = tree.create_inline(styled(Position::Static, Display::Inline), None);
        assert_eq!(tree.containing_block(lonely), None);
        assert_eq!(tree.container(lonely), None);
    }
}
