//! The style-change protocol.
//!
//! [`RenderTree::set_style`] classifies the change, lets the object react
//! to the old style ([`RenderTree::style_will_change`]), swaps the style in
//! and then applies the consequences ([`RenderTree::style_did_change`]):
//! dirty bits, layer creation or removal, anonymous wrapper fix-ups and the
//! repaint of the new bounds. What the first phase learns about the old
//! style travels to the second in a [`StyleChangeContext`].

use std::rc::Rc;

use log::trace;

use crate::geometry::LayoutOffset;
use crate::layout_bits::MarkingBehavior;
use crate::object::{ColumnInfo, Continuation, RenderFlags, RenderId, RenderKind};
use crate::style::{ContextSensitiveProperties, Position, RenderStyle, StyleDifference};
use crate::tree::RenderTree;

/// What [`RenderTree::style_will_change`] observed before the style was
/// replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct StyleChangeContext {
    /// The classified difference.
    pub diff: StyleDifference,
    /// The object was floating or out-of-flow and now takes part in its
    /// parent's flow.
    pub affects_parent_block: bool,
    /// The object was in flow and now floats or is out-of-flow.
    pub no_longer_affects_parent_block: bool,
    /// The object was floating before the change.
    pub was_floating: bool,
    /// The object had a layer before the change.
    pub had_layer: bool,
    /// The object carried a transform before the change.
    pub had_transform: bool,
}

impl RenderTree {
    // ========== Entry points ==========

    /// Replace the style of `id`, invalidating whatever the change requires.
    pub fn set_style(&mut self, id: RenderId, style: Rc<RenderStyle>) {
        let old = self.objects[id].style_rc();
        if Rc::ptr_eq(&old, &style) {
            return;
        }

        let (diff, changed) = old.diff(&style);
        let diff = self.adjust_style_difference(id, diff, changed);
        trace!(target: "arbor::style", "style of {id} changed: {diff}");

        let context = self.style_will_change(id, diff, Some(&old), &style);
        self.objects[id].style = style;

        let does_not_need_layout = self.objects[id].parent.is_none() || self.objects[id].is_text();
        self.style_did_change(id, context, Some(&old));
        if does_not_need_layout {
            return;
        }

        // The layer may have appeared or disappeared: classify again.
        let updated = self.adjust_style_difference(id, diff, changed);
        if diff <= StyleDifference::LayoutPositionedMovementOnly {
            match updated {
                StyleDifference::Layout => self.set_needs_layout_and_pref_widths_recalc(id),
                StyleDifference::LayoutPositionedMovementOnly => {
                    self.set_needs_positioned_movement_layout(id, Some(&old));
                }
                StyleDifference::SimplifiedLayoutAndPositionedMovement => {
                    self.set_needs_positioned_movement_layout(id, Some(&old));
                    self.set_needs_simplified_normal_flow_layout(id);
                }
                StyleDifference::SimplifiedLayout => self.set_needs_simplified_normal_flow_layout(id),
                _ => {}
            }
        }
        if updated == StyleDifference::RepaintLayer || self.should_repaint_for_style_difference(id, updated) {
            self.repaint(id);
        }
    }

    /// Run the style protocol for the style `id` was created with.
    pub(crate) fn initialize_style(&mut self, id: RenderId) {
        let style = self.objects[id].style_rc();
        let context = self.style_will_change(id, StyleDifference::Equal, None, &style);
        self.style_did_change(id, context, None);
    }

    /// Escalate `diff` for properties a composited layer would have
    /// absorbed, and for layer requirements that changed.
    #[must_use]
    pub fn adjust_style_difference(
        &self,
        id: RenderId,
        diff: StyleDifference,
        changed: ContextSensitiveProperties,
    ) -> StyleDifference {
        let obj = &self.objects[id];
        let composited = obj.layer.is_some_and(|layer| self.layers[layer].is_composited());
        let mut diff = diff;

        if changed.contains(ContextSensitiveProperties::TRANSFORM) {
            if !obj.is_text() && !composited {
                if !obj.has_layer() {
                    diff = StyleDifference::Layout;
                } else if diff == StyleDifference::LayoutPositionedMovementOnly {
                    diff = StyleDifference::SimplifiedLayoutAndPositionedMovement;
                } else if diff < StyleDifference::SimplifiedLayout {
                    diff = StyleDifference::SimplifiedLayout;
                }
            } else if diff < StyleDifference::RecompositeLayer {
                diff = StyleDifference::RecompositeLayer;
            }
        }

        let paint_only = ContextSensitiveProperties::OPACITY | ContextSensitiveProperties::FILTER;
        if changed.intersects(paint_only) {
            if !obj.is_text() && !composited {
                diff = diff.max(StyleDifference::RepaintLayer);
            } else if diff < StyleDifference::RecompositeLayer {
                diff = StyleDifference::RecompositeLayer;
            }
        }

        if diff == StyleDifference::Equal && obj.is_box_model_object() && obj.has_layer() != self.requires_layer(id) {
            diff = StyleDifference::Layout;
        }

        if diff == StyleDifference::RepaintLayer && !obj.has_layer() {
            diff = StyleDifference::Repaint;
        }
        diff
    }

    fn should_repaint_for_style_difference(&self, id: RenderId, diff: StyleDifference) -> bool {
        diff == StyleDifference::Repaint
            || (diff == StyleDifference::RepaintIfText && self.has_immediate_non_whitespace_text_child(id))
    }

    fn has_immediate_non_whitespace_text_child(&self, id: RenderId) -> bool {
        self.children(id).any(|child| {
            self.objects[child]
                .text()
                .is_some_and(|t| t.text().chars().any(|c| !c.is_whitespace()))
        })
    }

    // ========== Before ==========

    /// React to the style of `id` being replaced by `new`. `old` is `None`
    /// for the initial style.
    pub fn style_will_change(
        &mut self,
        id: RenderId,
        diff: StyleDifference,
        old: Option<&Rc<RenderStyle>>,
        new: &RenderStyle,
    ) -> StyleChangeContext {
        let mut context = StyleChangeContext {
            diff,
            was_floating: self.objects[id].is_floating(),
            had_layer: self.objects[id].has_layer(),
            had_transform: self.objects[id].has_transform(),
            ..StyleChangeContext::default()
        };

        if let Some(old) = old {
            if self.objects[id].is_render_block() {
                self.block_style_will_change(id, diff, old, new);
            }
            if self.objects[id].is_box() {
                self.box_style_will_change(id, diff, old, new);
            }
            if self.objects[id].is_box_model_object() {
                self.box_model_style_will_change(id, diff, old, new);
            }
            self.object_style_will_change(id, diff, old, new, &mut context);
        }

        // Fixed backgrounds repaint on every scroll.
        let is_text = self.objects[id].is_text();
        let old_slow = !is_text && old.is_some_and(|o| o.has_fixed_background_image());
        let new_slow = !is_text && new.has_fixed_background_image();
        if old_slow != new_slow {
            if old_slow {
                self.frame_view.remove_slow_repaint_object(id);
            }
            if new_slow {
                self.frame_view.add_slow_repaint_object(id);
            }
        }
        context
    }

    fn object_style_will_change(
        &mut self,
        id: RenderId,
        diff: StyleDifference,
        old: &RenderStyle,
        new: &RenderStyle,
        context: &mut StyleChangeContext,
    ) {
        // Keep the visible-content bit of the enclosing layer up to date.
        let visibility_layer = self.enclosing_layer(id).filter(|_| old.visibility != new.visibility);
        if let Some(layer) = visibility_layer {
            if new.is_visible() {
                let layer_ref = &mut self.layers[layer];
                layer_ref.has_visible_content = true;
                layer_ref.visible_content_status_dirty = false;
            } else {
                let owner = self.layers[layer].renderer();
                let owner_invisible = owner == id || !self.objects[owner].style.is_visible();
                if self.enclosing_layer_has_visible_content(id) && owner_invisible {
                    self.dirty_visible_content_status(layer);
                    if diff > StyleDifference::RepaintLayer {
                        self.repaint(id);
                    }
                }
            }
        }

        let has_parent = self.objects[id].parent.is_some();
        if has_parent && (diff == StyleDifference::Repaint || new.outline_size() < old.outline_size()) {
            self.repaint(id);
        }

        let obj = &self.objects[id];
        let leaves_float_list = obj.is_floating() && old.float != new.float;
        let leaves_positioned_list = obj.is_out_of_flow_positioned() && old.position != new.position;
        if leaves_float_list || leaves_positioned_list {
            self.remove_floating_or_positioned_child_from_block_lists(id);
        }

        let obj = &self.objects[id];
        let parent_is_flow = obj.parent.is_some_and(|p| {
            let parent = &self.objects[p];
            parent.is_render_block() || parent.is_render_inline()
        });
        let parent_is_block = obj.parent.is_some_and(|p| self.objects[p].is_render_block());
        context.affects_parent_block = obj.is_floating_or_out_of_flow_positioned()
            && !new.is_floating()
            && !new.has_out_of_flow_position()
            && parent_is_flow;
        context.no_longer_affects_parent_block = ((!obj.is_floating() && new.is_floating())
            || (!obj.is_out_of_flow_positioned() && new.has_out_of_flow_position()))
            && parent_is_block;

        // Reset the style-derived bits; the did-change phase sets them again.
        let obj = &mut self.objects[id];
        if matches!(diff, StyleDifference::Layout | StyleDifference::LayoutPositionedMovementOnly) {
            obj.flags.remove(RenderFlags::FLOATING);
        }
        obj.flags
            .remove(RenderFlags::HAS_BOX_DECORATIONS | RenderFlags::HAS_OVERFLOW_CLIP | RenderFlags::HAS_TRANSFORM);
    }

    fn box_model_style_will_change(&mut self, id: RenderId, diff: StyleDifference, old: &RenderStyle, new: &RenderStyle) {
        if self.objects[id].parent.is_some() {
            // Repaint with the old style first, e.g. when losing an outline.
            match (diff, self.objects[id].layer) {
                (StyleDifference::RepaintLayer, Some(layer)) => self.repaint_including_descendants(layer),
                _ if diff == StyleDifference::Repaint || new.outline_size() < old.outline_size() => {
                    self.repaint(id);
                }
                _ => {}
            }
        }

        if matches!(diff, StyleDifference::Layout | StyleDifference::SimplifiedLayout) {
            match self.objects[id].layer {
                Some(layer) => {
                    // The layer may be destroyed by the change.
                    if old.position != new.position
                        || old.z_index != new.z_index
                        || old.visibility != new.visibility
                    {
                        self.repaint_including_descendants(layer);
                    }
                }
                None if new.has_transform() || new.has_opacity() || new.has_filter() => {
                    // Gaining a layer: repaint the old position now.
                    self.repaint(id);
                }
                None => {}
            }
        }
    }

    fn box_style_will_change(&mut self, id: RenderId, diff: StyleDifference, old: &RenderStyle, new: &RenderStyle) {
        let Some(parent) = self.objects[id].parent else {
            return;
        };
        if diff != StyleDifference::Layout || old.position == new.position {
            return;
        }
        // Dirty the chain under the old position scheme while it still applies.
        self.mark_containing_blocks_for_layout(id, true, None);
        if old.position == Position::Static {
            self.repaint(id);
        } else if new.has_out_of_flow_position() {
            self.set_child_needs_layout(parent, MarkingBehavior::MarkContainingBlockChain);
        }
        let obj = &self.objects[id];
        if obj.is_floating() && !obj.is_out_of_flow_positioned() && new.has_out_of_flow_position() {
            self.remove_floating_or_positioned_child_from_block_lists(id);
        }
    }

    fn block_style_will_change(&mut self, id: RenderId, diff: StyleDifference, old: &RenderStyle, new: &RenderStyle) {
        let Some(parent) = self.objects[id].parent else {
            return;
        };
        if diff != StyleDifference::Layout || old.position == new.position {
            return;
        }
        if new.position == Position::Static {
            // Our positioned descendants move to an ancestor's list during
            // the next layout.
            self.remove_positioned_objects(id, None);
        } else if old.position == Position::Static {
            // They now belong to us: take them from their current block.
            let mut current = Some(parent);
            let mut holder = None;
            while let Some(c) = current {
                let obj = &self.objects[c];
                if obj.is_render_view() {
                    holder = Some(c);
                    break;
                }
                let inline_flow = obj.is_inline() && !obj.is_replaced();
                if obj.style.position != Position::Static && !inline_flow {
                    holder = Some(c);
                    break;
                }
                if obj.style.position == Position::Relative && inline_flow {
                    holder = self.containing_block(c);
                    break;
                }
                current = obj.parent;
            }
            if let Some(holder) = holder.filter(|&h| self.objects[h].is_render_block()) {
                self.remove_positioned_objects(holder, Some(id));
            }
        }
    }

    /// Drop the positioned objects of `block` that lie inside `within`
    /// (all of them when `None`), marking them for layout.
    pub(crate) fn remove_positioned_objects(&mut self, block: RenderId, within: Option<RenderId>) {
        let list = self.positioned_objects_of(block);
        let mut removed = Vec::new();
        for positioned in list {
            if within.is_none_or(|w| self.is_descendant_of(positioned, w)) {
                self.set_needs_layout(positioned, MarkingBehavior::MarkOnlyThis);
                removed.push(positioned);
            }
        }
        self.retain_positioned_objects(block, |p| !removed.contains(&p));
    }

    // ========== After ==========

    /// Apply the consequences of the style change described by `context`.
    pub fn style_did_change(&mut self, id: RenderId, context: StyleChangeContext, old: Option<&Rc<RenderStyle>>) {
        self.object_style_did_change(id, &context, old.map(AsRef::as_ref));
        if self.objects[id].is_text() {
            self.update_from_style(id);
            return;
        }

        self.layer_model_style_did_change(id, &context);
        let outline_size = self.objects[id].style.outline_size();
        self.set_maximal_outline_size(outline_size);

        match self.objects[id].kind {
            RenderKind::Inline(_) => self.inline_style_did_change(id, old.map(AsRef::as_ref)),
            RenderKind::Block(_) | RenderKind::View => {
                self.propagate_style_to_anonymous_children(id, true);
            }
            RenderKind::Text(_) | RenderKind::Replaced(_) => {}
        }
    }

    fn object_style_did_change(&mut self, id: RenderId, context: &StyleChangeContext, old: Option<&RenderStyle>) {
        if context.affects_parent_block {
            self.handle_dynamic_float_position_change(id);
        }
        if context.no_longer_affects_parent_block {
            self.remove_anonymous_wrappers_for_inlines_if_necessary(id);
        }
        if self.objects[id].parent.is_none() {
            return;
        }

        match context.diff {
            StyleDifference::Layout | StyleDifference::SimplifiedLayout => {
                // Already dirty objects would not mark the chain under the
                // new relayout boundaries.
                let position_changed = old.is_some_and(|o| o.position != self.objects[id].style.position);
                if self.objects[id].needs_layout() && position_changed {
                    self.mark_containing_blocks_for_layout(id, true, None);
                }
                if context.diff == StyleDifference::Layout {
                    self.set_needs_layout_and_pref_widths_recalc(id);
                } else {
                    self.set_needs_simplified_normal_flow_layout(id);
                }
            }
            StyleDifference::SimplifiedLayoutAndPositionedMovement => {
                self.set_needs_positioned_movement_layout(id, old);
                self.set_needs_simplified_normal_flow_layout(id);
            }
            StyleDifference::LayoutPositionedMovementOnly => self.set_needs_positioned_movement_layout(id, old),
            _ => {}
        }
    }

    fn layer_model_style_did_change(&mut self, id: RenderId, context: &StyleChangeContext) {
        self.update_from_style(id);

        if self.requires_layer(id) {
            if !self.objects[id].has_layer() {
                if context.was_floating && self.objects[id].is_floating() {
                    self.set_child_needs_layout(id, MarkingBehavior::MarkContainingBlockChain);
                }
                self.create_layer(id);
                let obj = &self.objects[id];
                if obj.parent.is_some() && !obj.needs_layout() && self.containing_block(id).is_some() {
                    self.set_layer_needs_full_repaint(id);
                }
            }
        } else if let Some(layer) = self.objects[id].layer.filter(|&l| self.layers[l].parent.is_some()) {
            trace!(target: "arbor::style", "{id} no longer needs layer {layer}");
            self.objects[id].set_flag(RenderFlags::HAS_TRANSFORM, false);
            self.destroy_layer(id);
            if context.was_floating && self.objects[id].is_floating() {
                self.set_child_needs_layout(id, MarkingBehavior::MarkContainingBlockChain);
            }
            if context.had_transform {
                self.set_needs_layout_and_pref_widths_recalc(id);
            }
        }

        if self.objects[id].has_layer() {
            self.update_layer_transform(id);
            if let Some(layer) = self.objects[id].layer {
                self.dirty_visible_content_status(layer);
            }
            if self.view_state.compositor.is_some() {
                self.update_compositing_layers();
            }
        }
    }

    fn inline_style_did_change(&mut self, id: RenderId, old: Option<&RenderStyle>) {
        self.update_continuation_styles(id, old);

        if self.always_create_line_boxes(id) {
            return;
        }
        let obj = &self.objects[id];
        let style = &obj.style;
        let always_create = obj.has_layer()
            || obj.has_box_decorations()
            || style.has_padding()
            || style.has_margin()
            || style.has_outline();
        if always_create {
            if old.is_some() {
                self.mark_inline_for_line_rebuild(id);
            }
            self.set_always_create_line_boxes(id);
        }
    }

    /// Re-derive the style-dependent state bits of `id`.
    pub fn update_from_style(&mut self, id: RenderId) {
        let obj = &mut self.objects[id];
        let style = Rc::clone(&obj.style);

        match obj.kind {
            RenderKind::Text(_) => {
                obj.flags.insert(RenderFlags::INLINE);
                return;
            }
            RenderKind::Inline(_) => {
                let decorations = style.has_background() || style.has_border() || !style.box_shadow.is_empty();
                obj.set_flag(RenderFlags::HAS_BOX_DECORATIONS, decorations);
                // Transforms do not apply to inline flows.
                obj.flags.insert(RenderFlags::INLINE);
                obj.flags.remove(RenderFlags::HAS_TRANSFORM | RenderFlags::FLOATING);
                return;
            }
            RenderKind::View => {
                obj.flags.insert(RenderFlags::HAS_BOX_DECORATIONS);
                obj.flags.remove(RenderFlags::INLINE | RenderFlags::FLOATING);
                return;
            }
            RenderKind::Block(_) | RenderKind::Replaced(_) => {}
        }

        let decorations = style.has_background() || style.has_border() || !style.box_shadow.is_empty();
        obj.set_flag(RenderFlags::HAS_BOX_DECORATIONS, decorations);
        obj.set_flag(RenderFlags::INLINE, style.is_display_inline_type());
        obj.set_flag(RenderFlags::FLOATING, !style.has_out_of_flow_position() && style.is_floating());
        obj.set_flag(RenderFlags::HAS_TRANSFORM, style.has_transform_related_property());
        let replaced = obj.is_render_replaced() || style.is_display_inline_type();
        obj.set_flag(RenderFlags::REPLACED, replaced);

        let is_block = obj.is_render_block();
        obj.set_flag(RenderFlags::HAS_OVERFLOW_CLIP, is_block && style.has_overflow_clip());
        if let Some(data) = obj.block_mut() {
            data.columns = style.specifies_columns().then(|| ColumnInfo {
                count: style.column_count.unwrap_or(1),
                width: 0.0,
                gap: style.column_gap,
                height: 0.0,
            });
            if !style.has_overflow_clip() {
                data.scroll_offset = LayoutOffset::zero();
            }
        }
    }

    // ========== Flow fix-ups ==========

    /// `id` stopped floating or being out-of-flow: make its parent's
    /// children consistently inline or block-level again.
    pub fn handle_dynamic_float_position_change(&mut self, id: RenderId) {
        let Some(parent) = self.objects[id].parent else {
            return;
        };
        let inline = self.objects[id].style.is_display_inline_type() || self.objects[id].is_text();
        self.objects[id].set_flag(RenderFlags::INLINE, inline);
        if inline == self.objects[parent].children_inline() {
            return;
        }
        if !inline {
            self.child_became_non_inline(parent, id);
            return;
        }
        // Only blocks can disagree with an inline child: wrap it.
        let wrapper = self.create_anonymous_block(parent);
        self.insert_child_node(parent, wrapper, Some(id), true);
        let child = self.remove_child_node(parent, id, true);
        self.insert_child_node(wrapper, child, None, true);
    }

    fn child_became_non_inline(&mut self, parent: RenderId, child: RenderId) {
        if self.objects[parent].is_render_inline() {
            // The block splits the inline.
            let Some(cb) = self.containing_block(parent) else {
                return;
            };
            let new_box = self.create_anonymous_block(cb);
            let old_continuation = self.objects[parent].continuation();
            self.objects[parent].set_continuation(Some(Continuation::Block(new_box)));
            let before = self.objects[child].next_sibling;
            let child = self.remove_child_node(parent, child, true);
            self.split_flow(parent, before, new_box, child, old_continuation);
            return;
        }
        self.make_children_non_inline(parent, None);
        let grandparent = self.objects[parent].parent;
        if let Some(grandparent) = grandparent.filter(|&g| self.objects[parent].is_anonymous_block() && self.objects[g].is_render_block()) {
            self.remove_leftover_anonymous_block(grandparent, parent);
        }
    }

    /// `id` started floating or became out-of-flow: the anonymous blocks
    /// around its inline siblings may no longer be needed.
    pub fn remove_anonymous_wrappers_for_inlines_if_necessary(&mut self, id: RenderId) {
        let Some(parent) = self.objects[id].parent else {
            return;
        };
        let parent_obj = &self.objects[parent];
        if !parent_obj.is_render_block() || parent_obj.is_table_part() || parent_obj.is_table() {
            return;
        }

        // Any real block child left means the wrappers stay.
        let blocks_remain = self.children(parent).any(|c| {
            let obj = &self.objects[c];
            let wrapper = obj.is_anonymous_block() && !obj.is_anonymous_block_continuation();
            !(wrapper || obj.style.is_floating() || obj.style.has_out_of_flow_position())
        });
        if blocks_remain {
            return;
        }

        for child in self.child_ids(parent) {
            if self.objects[child].is_anonymous_block() {
                self.collapse_anonymous_box_child(parent, child);
            }
        }
    }

    fn collapse_anonymous_box_child(&mut self, parent: RenderId, child: RenderId) {
        self.set_needs_layout_and_pref_widths_recalc(parent);
        let inline = self.objects[child].children_inline();
        self.objects[parent].set_flag(RenderFlags::CHILDREN_INLINE, inline);
        let next = self.objects[child].next_sibling;
        self.move_children_to(child, parent, None, None, next, false);
        let child = self.remove_child_node(parent, child, false);
        self.destroy(child);
    }

    /// Give the anonymous children of `id` fresh styles inherited from it.
    pub fn propagate_style_to_anonymous_children(&mut self, id: RenderId, block_children_only: bool) {
        let parent_style = self.objects[id].style_rc();
        for child in self.child_ids(id) {
            let obj = &self.objects[child];
            if !obj.is_anonymous() || (block_children_only && !obj.is_render_block()) {
                continue;
            }
            let mut style = RenderStyle::create_anonymous_style_with_display(&parent_style, obj.style.display);
            if parent_style.specifies_columns() && obj.style.specifies_columns() {
                style.column_count = parent_style.column_count;
                style.column_gap = parent_style.column_gap;
            }
            // Anonymous block continuations keep their in-flow position.
            if obj.is_in_flow_positioned() && obj.is_anonymous_block_continuation() {
                style.position = obj.style.position;
            }
            if *obj.style != style {
                self.set_style(child, Rc::new(style));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_view::RepaintTarget;
    use crate::geometry::LayoutSize;
    use crate::object::BlockFlavor;
    use crate::style::{Length, TransformOperation};

    fn sized(position: Position) -> RenderStyle {
        RenderStyle {
            position,
            width: Length::Fixed(100.0),
            height: Length::Fixed(50.0),
            ..RenderStyle::block()
        }
    }

    fn laid_out(style: RenderStyle) -> (RenderTree, RenderId) {
        let mut tree = RenderTree::new(LayoutSize::new(400.0, 300.0));
        let view = tree.view();
        let id = tree.create_block(BlockFlavor::Flow, Rc::new(style), None);
        tree.add_child(view, id, None);
        tree.layout();
        let _ = tree.frame_view_mut().take_repaints();
        (tree, id)
    }

    fn composited() -> (RenderTree, RenderId) {
        let style = RenderStyle {
            will_change_transform: true,
            ..sized(Position::Static)
        };
        let (mut tree, id) = laid_out(style);
        tree.set_compositing_enabled(true);
        let _ = tree.frame_view_mut().take_repaints();
        (tree, id)
    }

    // ========== adjust_style_difference ==========

    #[test]
    fn test_transform_without_a_layer_needs_layout() {
        let (tree, id) = laid_out(sized(Position::Static));
        assert!(!tree.get(id).has_layer());
        let diff = tree.adjust_style_difference(id, StyleDifference::RecompositeLayer, ContextSensitiveProperties::TRANSFORM);
        assert_eq!(diff, StyleDifference::Layout);
    }

    #[test]
    fn test_transform_on_a_plain_layer_needs_simplified_layout() {
        let (tree, id) = laid_out(sized(Position::Relative));
        assert!(tree.get(id).has_layer());
        let transform = ContextSensitiveProperties::TRANSFORM;
        assert_eq!(
            tree.adjust_style_difference(id, StyleDifference::RecompositeLayer, transform),
            StyleDifference::SimplifiedLayout
        );
        assert_eq!(
            tree.adjust_style_difference(id, StyleDifference::LayoutPositionedMovementOnly, transform),
            StyleDifference::SimplifiedLayoutAndPositionedMovement
        );
        assert_eq!(
            tree.adjust_style_difference(id, StyleDifference::Layout, transform),
            StyleDifference::Layout
        );
    }

    #[test]
    fn test_opacity_repaints_the_layer_or_the_box() {
        let (tree, id) = laid_out(sized(Position::Relative));
        assert_eq!(
            tree.adjust_style_difference(id, StyleDifference::RecompositeLayer, ContextSensitiveProperties::OPACITY),
            StyleDifference::RepaintLayer
        );

        // Without a layer there is no layer to repaint.
        let (tree, id) = laid_out(sized(Position::Static));
        assert_eq!(
            tree.adjust_style_difference(id, StyleDifference::RecompositeLayer, ContextSensitiveProperties::FILTER),
            StyleDifference::Repaint
        );
    }

    #[test]
    fn test_composited_layer_absorbs_transform_and_opacity() {
        let (tree, id) = composited();
        let layer = tree.get(id).layer().expect("will-change gives a layer");
        assert!(tree.layer(layer).is_composited());

        let both = ContextSensitiveProperties::TRANSFORM | ContextSensitiveProperties::OPACITY;
        assert_eq!(
            tree.adjust_style_difference(id, StyleDifference::Equal, both),
            StyleDifference::RecompositeLayer
        );
        // Stronger differences are left alone.
        assert_eq!(
            tree.adjust_style_difference(id, StyleDifference::Repaint, ContextSensitiveProperties::OPACITY),
            StyleDifference::Repaint
        );
    }

    #[test]
    fn test_changed_layer_requirement_escalates_to_layout() {
        let (mut tree, id) = laid_out(sized(Position::Static));
        // The style now asks for a layer the box does not have yet.
        tree.objects[id].style = Rc::new(sized(Position::Relative));
        assert_eq!(
            tree.adjust_style_difference(id, StyleDifference::Equal, ContextSensitiveProperties::empty()),
            StyleDifference::Layout
        );
    }

    // ========== set_style ==========

    #[test]
    fn test_opacity_change_repaints_without_layout() {
        let (mut tree, id) = laid_out(sized(Position::Relative));
        let faded = RenderStyle {
            opacity: 0.5,
            ..sized(Position::Relative)
        };
        tree.set_style(id, Rc::new(faded));

        assert!(!tree.get(id).needs_layout());
        let repaints = tree.frame_view_mut().take_repaints();
        assert!(!repaints.is_empty());
        assert!(repaints.iter().all(|record| record.target == RepaintTarget::View));
    }

    #[test]
    fn test_opacity_change_on_composited_layer_only_recomposites() {
        let (mut tree, id) = composited();
        let faded = RenderStyle {
            opacity: 0.5,
            will_change_transform: true,
            ..sized(Position::Static)
        };
        tree.set_style(id, Rc::new(faded));

        assert!(!tree.get(id).needs_layout());
        assert!(tree.frame_view().repaints().is_empty());
    }

    #[test]
    fn test_transform_on_static_box_adds_a_layer_and_relayouts() {
        let (mut tree, id) = laid_out(sized(Position::Static));
        let turned = RenderStyle {
            transform: vec![TransformOperation::Rotate(45.0)],
            ..sized(Position::Static)
        };
        tree.set_style(id, Rc::new(turned));

        assert!(tree.get(id).has_layer());
        assert!(tree.get(id).needs_layout());
        tree.layout();
        assert!(!tree.get(id).needs_layout());
    }
}
