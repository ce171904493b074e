//! Dirty-bit propagation and relayout scheduling.
//!
//! Marking walks [`RenderTree::container`] links upwards and stops at the
//! first ancestor that already carries the bit, so marking an already dirty
//! chain is O(1). A relayout boundary ends the walk and becomes the root of
//! a subtree relayout instead.

use log::trace;

use crate::object::{RenderFlags, RenderId};
use crate::style::RenderStyle;
use crate::tree::RenderTree;

/// Whether setting a bit also dirties the containing-block chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingBehavior {
    /// Only this object.
    MarkOnlyThis,
    /// This object and its containers up to a relayout boundary.
    MarkContainingBlockChain,
}

impl RenderTree {
    /// Mark `id` as needing layout.
    pub fn set_needs_layout(&mut self, id: RenderId, marking: MarkingBehavior) {
        let already = self.objects[id].self_needs_layout();
        self.objects[id].set_flag(RenderFlags::SELF_NEEDS_LAYOUT, true);
        if !already {
            if marking == MarkingBehavior::MarkContainingBlockChain {
                self.mark_containing_blocks_for_layout(id, true, None);
            }
            if self.objects[id].has_layer() {
                self.set_layer_needs_full_repaint(id);
            }
        }
    }

    /// Clear every layout bit of `id` after it has been laid out.
    pub fn clear_needs_layout(&mut self, id: RenderId) {
        let obj = &mut self.objects[id];
        obj.flags.remove(
            RenderFlags::SELF_NEEDS_LAYOUT
                | RenderFlags::POS_CHILD_NEEDS_LAYOUT
                | RenderFlags::NEEDS_SIMPLIFIED_NORMAL_FLOW_LAYOUT
                | RenderFlags::NORMAL_CHILD_NEEDS_LAYOUT
                | RenderFlags::NEEDS_POSITIONED_MOVEMENT_LAYOUT,
        );
        obj.flags.insert(RenderFlags::EVER_HAD_LAYOUT);
    }

    /// Mark that some in-flow descendant of `id` needs layout.
    pub fn set_child_needs_layout(&mut self, id: RenderId, marking: MarkingBehavior) {
        let already = self.objects[id].normal_child_needs_layout();
        self.objects[id].set_flag(RenderFlags::NORMAL_CHILD_NEEDS_LAYOUT, true);
        if !already && marking == MarkingBehavior::MarkContainingBlockChain {
            self.mark_containing_blocks_for_layout(id, true, None);
        }
    }

    /// Mark a positioned box that moved without resizing.
    ///
    /// The layer repaints fully when `old_style` also differs visually,
    /// otherwise only the movement is repainted.
    pub fn set_needs_positioned_movement_layout(&mut self, id: RenderId, old_style: Option<&RenderStyle>) {
        let already = self.objects[id].needs_positioned_movement_layout();
        self.objects[id].set_flag(RenderFlags::NEEDS_POSITIONED_MOVEMENT_LAYOUT, true);
        if already {
            return;
        }
        self.mark_containing_blocks_for_layout(id, true, None);
        if self.objects[id].has_layer() {
            let full = old_style.is_some_and(|old| self.objects[id].style.diff_requires_repaint(old));
            if full {
                self.set_layer_needs_full_repaint(id);
            } else {
                self.set_layer_needs_full_repaint_for_positioned_movement(id);
            }
        }
    }

    /// Mark that only the overflow of `id` needs recomputing.
    pub fn set_needs_simplified_normal_flow_layout(&mut self, id: RenderId) {
        let already = self.objects[id].needs_simplified_normal_flow_layout();
        self.objects[id].set_flag(RenderFlags::NEEDS_SIMPLIFIED_NORMAL_FLOW_LAYOUT, true);
        if !already {
            self.mark_containing_blocks_for_layout(id, true, None);
            if self.objects[id].has_layer() {
                self.set_layer_needs_full_repaint(id);
            }
        }
    }

    /// Full relayout of `id` including its preferred widths.
    pub fn set_needs_layout_and_pref_widths_recalc(&mut self, id: RenderId) {
        self.set_needs_layout(id, MarkingBehavior::MarkContainingBlockChain);
        self.set_preferred_logical_widths_dirty(id, true, MarkingBehavior::MarkContainingBlockChain);
    }

    // ========== Preferred widths ==========

    /// Mark the cached min/max widths of `id` stale (or fresh).
    pub fn set_preferred_logical_widths_dirty(&mut self, id: RenderId, dirty: bool, marking: MarkingBehavior) {
        let already = self.objects[id].preferred_logical_widths_dirty();
        self.objects[id].set_flag(RenderFlags::PREFERRED_WIDTHS_DIRTY, dirty);
        let obj = &self.objects[id];
        if dirty
            && !already
            && marking == MarkingBehavior::MarkContainingBlockChain
            && (obj.is_text() || !obj.style.has_out_of_flow_position())
        {
            self.invalidate_container_preferred_logical_widths(id);
        }
    }

    /// Dirty the preferred widths of the containers of `id`.
    ///
    /// Inlines are included in the chain. The walk stops at a box that is
    /// already dirty, after an out-of-flow box (it never affects its
    /// container's widths) and before the top of an unrooted subtree.
    pub fn invalidate_container_preferred_logical_widths(&mut self, id: RenderId) {
        let mut o = self.preferred_width_container(id);
        while let Some(current) = o {
            if self.objects[current].preferred_logical_widths_dirty() {
                break;
            }
            let container = self.preferred_width_container(current);
            if container.is_none() && !self.objects[current].is_render_view() {
                break;
            }
            self.objects[current].set_flag(RenderFlags::PREFERRED_WIDTHS_DIRTY, true);
            if self.objects[current].style.has_out_of_flow_position() {
                break;
            }
            o = container;
        }
    }

    fn preferred_width_container(&self, id: RenderId) -> Option<RenderId> {
        if self.objects[id].is_table_cell() {
            self.containing_block(id)
        } else {
            self.container(id)
        }
    }

    // ========== Containing-block marking ==========

    /// Propagate a layout bit from `id` to its containers.
    ///
    /// Out-of-flow boxes mark their containing block's positioned-child
    /// bit, skipping inline and anonymous containers. The walk stops at an
    /// ancestor already marked, at `new_root`, at the top of an unrooted
    /// subtree, or (when `schedule_relayout`) at a relayout boundary, which
    /// is then scheduled for relayout.
    pub fn mark_containing_blocks_for_layout(
        &mut self,
        id: RenderId,
        schedule_relayout: bool,
        new_root: Option<RenderId>,
    ) {
        debug_assert!(!schedule_relayout || new_root.is_none());

        let mut object = self.container(id);
        let mut last = id;
        let mut simplified = {
            let o = &self.objects[id];
            o.needs_simplified_normal_flow_layout() && !o.self_needs_layout() && !o.normal_child_needs_layout()
        };

        while let Some(mut current) = object {
            // The top of an unrooted subtree is marked when it is inserted.
            let mut container = self.container(current);
            if container.is_none() && !self.objects[current].is_render_view() {
                return;
            }

            let last_obj = &self.objects[last];
            if !last_obj.is_text() && last_obj.style.has_out_of_flow_position() {
                let will_skip = !self.is_block_for_positioned(current);
                // Skip relatively positioned inlines and anonymous blocks to
                // reach the enclosing block.
                let mut target = Some(current);
                while let Some(t) = target {
                    if self.is_block_for_positioned(t) {
                        break;
                    }
                    target = self.container(t);
                }
                let Some(t) = target else {
                    return;
                };
                if self.objects[t].pos_child_needs_layout() {
                    return;
                }
                current = t;
                if will_skip {
                    container = self.container(current);
                }
                self.objects[current].set_flag(RenderFlags::POS_CHILD_NEEDS_LAYOUT, true);
                simplified = true;
            } else if simplified {
                if self.objects[current].needs_simplified_normal_flow_layout() {
                    return;
                }
                self.objects[current].set_flag(RenderFlags::NEEDS_SIMPLIFIED_NORMAL_FLOW_LAYOUT, true);
            } else {
                if self.objects[current].normal_child_needs_layout() {
                    return;
                }
                self.objects[current].set_flag(RenderFlags::NORMAL_CHILD_NEEDS_LAYOUT, true);
            }

            if Some(current) == new_root {
                return;
            }
            last = current;
            if schedule_relayout && self.object_is_relayout_boundary(last) {
                break;
            }
            object = container;
        }

        if schedule_relayout {
            self.schedule_relayout(last);
        }
    }

    fn is_block_for_positioned(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        obj.is_render_block() && !obj.is_anonymous_block()
    }

    /// Whether `id` can be laid out without its ancestors: it clips its
    /// overflow and has a fixed, non-percentage size.
    #[must_use]
    pub fn object_is_relayout_boundary(&self, id: RenderId) -> bool {
        let obj = &self.objects[id];
        if !obj.has_overflow_clip() {
            return false;
        }
        let style = &obj.style;
        if style.width.is_auto() || style.height.is_auto() || style.height.is_percent() || style.width.is_percent() {
            return false;
        }
        // The table lays out all of its parts.
        !obj.is_table_part()
    }

    // ========== Scheduling ==========

    /// Ask the frame view to lay out from `id` (the whole document for the
    /// view).
    pub fn schedule_relayout(&mut self, id: RenderId) {
        if self.objects[id].is_render_view() {
            self.schedule_full_relayout();
        } else if self.is_rooted(id) {
            self.schedule_relayout_of_subtree(id);
        }
    }

    fn schedule_full_relayout(&mut self) {
        if let Some(root) = self.frame_view.layout_root.take() {
            self.mark_containing_blocks_for_layout(root, false, None);
        }
        if !self.frame_view.layout_scheduling_enabled || !self.objects[self.view].needs_layout() {
            return;
        }
        trace!(target: "arbor::layout", "full relayout scheduled");
        self.frame_view.layout_scheduled = true;
    }

    /// Record `relayout_root` as the root of the next layout, merging with
    /// an already pending root.
    ///
    /// A pending root that contains the new one is kept; a new root that
    /// contains the pending one replaces it; unrelated roots fall back to a
    /// full relayout.
    pub fn schedule_relayout_of_subtree(&mut self, relayout_root: RenderId) {
        if self.objects[self.view].needs_layout() {
            self.mark_containing_blocks_for_layout(relayout_root, false, None);
            return;
        }

        if self.frame_view.layout_scheduled || !self.frame_view.layout_scheduling_enabled {
            let current = self.frame_view.layout_root;
            if current == Some(relayout_root) {
                return;
            }
            match current {
                Some(root) if self.is_object_ancestor_container_of(root, relayout_root) => {
                    // Keep the current root.
                    self.mark_containing_blocks_for_layout(relayout_root, false, Some(root));
                }
                Some(root) if self.is_object_ancestor_container_of(relayout_root, root) => {
                    // Re-root at the new boundary.
                    self.mark_containing_blocks_for_layout(root, false, Some(relayout_root));
                    self.frame_view.layout_root = Some(relayout_root);
                }
                _ => {
                    // Full relayout.
                    if let Some(root) = current {
                        self.mark_containing_blocks_for_layout(root, false, None);
                    }
                    self.frame_view.layout_root = None;
                    self.mark_containing_blocks_for_layout(relayout_root, false, None);
                }
            }
        } else {
            trace!(target: "arbor::layout", "subtree relayout scheduled at {relayout_root}");
            self.frame_view.layout_root = Some(relayout_root);
            self.frame_view.layout_scheduled = true;
        }
    }

    fn is_object_ancestor_container_of(&self, ancestor: RenderId, descendant: RenderId) -> bool {
        let mut current = Some(descendant);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.container(c);
        }
        false
    }
}
