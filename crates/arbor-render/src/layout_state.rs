//! The layout-state stack.
//!
//! While a block lays out its children it pushes a [`LayoutState`] holding
//! its own absolute paint offset and the clip inherited from its ancestors.
//! Mapping and repaint code running during layout can then add a child's
//! location to the top state instead of walking the whole container chain.
//! Blocks whose children cannot be mapped by plain translation (transforms,
//! columns) push a disabled state.

use crate::geometry::{LayoutOffset, LayoutPoint, LayoutRect, intersect};
use crate::mapping::MapCoordinatesFlags;
use crate::object::RenderId;
use crate::tree::RenderTree;

/// Absolute geometry of one block being laid out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutState {
    /// The block whose children are mapped through this state.
    pub renderer: RenderId,
    /// Offset from the block's local space to the document, scroll applied.
    pub paint_offset: LayoutOffset,
    /// Accumulated overflow clip in document coordinates.
    pub clip: Option<LayoutRect>,
}

/// Token returned by [`RenderTree::push_layout_state`]; hand it back to
/// [`RenderTree::pop_layout_state`].
#[derive(Debug)]
#[must_use = "a pushed layout state must be popped"]
pub struct LayoutStateMaintainer {
    disabled: bool,
}

impl RenderTree {
    /// Whether the top layout state may be used for mapping.
    #[must_use]
    pub fn layout_state_enabled(&self) -> bool {
        self.view_state.layout_state_disable_count == 0 && !self.view_state.layout_states.is_empty()
    }

    /// The active layout state, when it describes `container`.
    pub(crate) fn layout_state_for(&self, container: Option<RenderId>) -> Option<&LayoutState> {
        if !self.layout_state_enabled() {
            return None;
        }
        let top = self.view_state.layout_states.last()?;
        (Some(top.renderer) == container).then_some(top)
    }

    /// Suspend layout-state mapping.
    pub fn disable_layout_state(&mut self) {
        self.view_state.layout_state_disable_count += 1;
    }

    /// Resume layout-state mapping.
    pub fn enable_layout_state(&mut self) {
        debug_assert!(self.view_state.layout_state_disable_count > 0);
        self.view_state.layout_state_disable_count = self.view_state.layout_state_disable_count.saturating_sub(1);
    }

    /// Start a layout rooted at `root`, seeding the stack from the absolute
    /// position of its container.
    pub(crate) fn push_layout_state_root(&mut self, root: RenderId) {
        let state = match self.container(root) {
            Some(container) => {
                let origin = self.local_to_absolute(container, LayoutPoint::zero(), MapCoordinatesFlags::empty());
                let mut paint_offset = origin.to_vector();
                let obj = &self.objects[container];
                let mut clip = None;
                if obj.has_overflow_clip() {
                    clip = Some(LayoutRect::new(origin, obj.size()));
                    paint_offset -= obj.scrolled_content_offset();
                }
                LayoutState {
                    renderer: container,
                    paint_offset,
                    clip,
                }
            }
            None => LayoutState {
                renderer: root,
                paint_offset: LayoutOffset::zero(),
                clip: None,
            },
        };
        self.view_state.layout_states.push(state);
    }

    /// Finish the layout started by [`Self::push_layout_state_root`].
    pub(crate) fn pop_layout_state_root(&mut self) {
        let _ = self.view_state.layout_states.pop();
    }

    /// Enter the child layout of `id`.
    ///
    /// With `disable`, the state is pushed but mapping falls back to a full
    /// walk until it is popped.
    pub(crate) fn push_layout_state(&mut self, id: RenderId, disable: bool) -> LayoutStateMaintainer {
        let state = self.compute_layout_state(id);
        self.view_state.layout_states.push(state);
        if disable {
            self.disable_layout_state();
        }
        LayoutStateMaintainer { disabled: disable }
    }

    /// Leave the child layout entered with [`Self::push_layout_state`].
    pub(crate) fn pop_layout_state(&mut self, maintainer: LayoutStateMaintainer) {
        let _ = self.view_state.layout_states.pop();
        if maintainer.disabled {
            self.enable_layout_state();
        }
    }

    fn compute_layout_state(&self, id: RenderId) -> LayoutState {
        let obj = &self.objects[id];
        let next = self.view_state.layout_states.last().copied();
        let fixed = obj.is_fixed_positioned();

        let mut paint_offset;
        let mut clip;
        match next {
            Some(next) if !fixed => {
                paint_offset = next.paint_offset + obj.location().to_vector();
                if obj.is_in_flow_positioned() {
                    paint_offset += self.offset_for_in_flow_position(id);
                }
                // Positioned children of a relative inline sit against the
                // inline, which is laid out by its containing block.
                let inline_container = self
                    .container(id)
                    .filter(|&c| obj.is_out_of_flow_positioned() && self.objects[c].is_render_inline());
                if let Some(inline) = inline_container {
                    paint_offset += self.offset_for_in_flow_positioned_inline(inline, id);
                    let mut current = Some(inline);
                    while let Some(c) = current.filter(|&c| c != next.renderer && self.objects[c].is_render_inline()) {
                        paint_offset += self.offset_for_in_flow_position(c);
                        current = self.container(c);
                    }
                }
                clip = next.clip;
            }
            _ => {
                let fixed_offset = if fixed {
                    self.local_to_absolute(self.view, LayoutPoint::zero(), MapCoordinatesFlags::IS_FIXED)
                        .to_vector()
                } else {
                    LayoutOffset::zero()
                };
                paint_offset = fixed_offset + obj.location().to_vector();
                clip = None;
            }
        }

        if obj.has_overflow_clip() {
            let own = LayoutRect::new(paint_offset.to_point(), obj.size());
            clip = Some(clip.map_or(own, |c| intersect(&c, &own)));
            paint_offset -= obj.scrolled_content_offset();
        }

        LayoutState {
            renderer: id,
            paint_offset,
            clip,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::geometry::{LayoutSize, rect};
    use crate::object::BlockFlavor;
    use crate::style::RenderStyle;

    #[test]
    fn test_state_is_only_used_for_its_own_renderer() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let view = tree.view();
        let block = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
        tree.add_child(view, block, None);
        tree.objects[block].frame_rect = rect(10.0, 20.0, 100.0, 100.0);

        tree.push_layout_state_root(view);
        let outer = tree.push_layout_state(view, false);
        let inner = tree.push_layout_state(block, false);
        assert_eq!(tree.layout_state_for(Some(block)).map(|s| s.paint_offset), Some(LayoutOffset::new(10.0, 20.0)));
        assert!(tree.layout_state_for(Some(view)).is_none());
        tree.pop_layout_state(inner);

        let disabled = tree.push_layout_state(block, true);
        assert!(!tree.layout_state_enabled());
        tree.pop_layout_state(disabled);
        assert!(tree.layout_state_enabled());
        tree.pop_layout_state(outer);
        tree.pop_layout_state_root();
        assert!(!tree.layout_state_enabled());
    }
}
