//! Child-list management.
//!
//! Insertion is polymorphic: tables wrap misplaced parts in anonymous
//! sections, rows and cells; blocks keep their children either all inline
//! or all block-level by introducing anonymous blocks; inlines split around
//! block children (see [`crate::inline`]). Whatever the entry point, the
//! object finally lands through [`RenderTree::insert_child_node`], which
//! keeps layers, line boxes and dirty bits in step.

use arbor_common::warning::warn_once;
use log::trace;

use crate::layout_bits::MarkingBehavior;
use crate::object::{BlockFlavor, RenderFlags, RenderId, RenderKind, RenderObject};
use crate::style::Display;
use crate::tree::RenderTree;

impl RenderTree {
    // ========== Insertion ==========

    /// Insert `child` into `parent` before `before` (appending when `None`),
    /// creating whatever anonymous wrappers the box model requires.
    pub fn add_child(&mut self, parent: RenderId, child: RenderId, before: Option<RenderId>) {
        let parent_obj = &self.objects[parent];
        match parent_obj.kind {
            RenderKind::Inline(_) => self.inline_add_child(parent, child, before),
            RenderKind::Text(_) | RenderKind::Replaced(_) => {
                warn_once("render", "children added to a leaf renderer are ignored");
            }
            RenderKind::View | RenderKind::Block(_) => {
                if parent_obj.is_table() {
                    self.table_add_child(parent, child, before);
                } else if parent_obj.is_table_section() {
                    self.section_add_child(parent, child, before);
                } else if parent_obj.is_table_row() {
                    self.row_add_child(parent, child, before);
                } else {
                    self.block_add_child(parent, child, before);
                }
            }
        }
    }

    /// Insertion shared by every kind: wrap table parts that arrive without
    /// their required ancestor in an anonymous table.
    pub(crate) fn add_child_generic(&mut self, parent: RenderId, child: RenderId, before: Option<RenderId>) {
        let child_obj = &self.objects[child];
        let parent_obj = &self.objects[parent];
        let needs_table = if child_obj.is_table_col() {
            let column_in_group = parent_obj.is_table_col();
            !parent_obj.is_table() && !column_in_group
        } else if child_obj.is_table_caption() || child_obj.is_table_section() {
            !parent_obj.is_table()
        } else if child_obj.is_table_row() {
            !parent_obj.is_table_section()
        } else if child_obj.is_table_cell() {
            !parent_obj.is_table_row()
        } else {
            false
        };

        if !needs_table {
            self.insert_child_node(parent, child, before, true);
            return;
        }

        let after = match before {
            Some(b) => self.objects[b].prev_sibling,
            None => self.objects[parent].last_child,
        };
        let table = match after.filter(|&a| self.objects[a].is_anonymous() && self.objects[a].is_table()) {
            Some(table) => table,
            None => {
                let display = if self.objects[parent].is_render_inline() {
                    Display::InlineTable
                } else {
                    Display::Table
                };
                let table = self.create_anonymous_with_display(parent, display, BlockFlavor::Table);
                self.add_child(parent, table, before);
                table
            }
        };
        self.add_child(table, child, None);
    }

    // ========== Blocks ==========

    fn block_add_child(&mut self, block: RenderId, child: RenderId, before: Option<RenderId>) {
        let mut before = before;

        // The insertion point may sit inside one of our anonymous wrappers.
        if let Some(b) = before.filter(|&b| self.objects[b].parent != Some(block)) {
            let mut container = b;
            while let Some(p) = self.objects[container].parent.filter(|&p| p != block) {
                container = p;
            }
            if self.objects[container].is_anonymous_block() {
                let b_parent = self.objects[b].parent.unwrap_or(container);
                let child_obj = &self.objects[child];
                if child_obj.is_inline() || child_obj.is_floating_or_out_of_flow_positioned() {
                    self.add_child(b_parent, child, Some(b));
                    return;
                }
                if self.objects[b_parent].first_child == Some(b) {
                    before = Some(container);
                } else {
                    before = Some(self.split_anonymous_block_before(block, container, b));
                }
            } else if self.objects[container].is_anonymous() && self.objects[container].is_table() {
                if self.objects[child].is_table_part() {
                    self.add_child(container, child, Some(b));
                    return;
                }
                before = Some(container);
            } else {
                before = Some(container);
            }
        }

        let child_obj = &self.objects[child];
        let child_is_inline = child_obj.is_inline();
        let child_is_out_of_flow = child_obj.is_floating_or_out_of_flow_positioned();
        let mut made_boxes_non_inline = false;

        if self.objects[block].children_inline() && !child_is_inline && !child_is_out_of_flow {
            self.make_children_non_inline(block, before);
            made_boxes_non_inline = true;
            // The insertion point may have been wrapped.
            if let Some(b) = before {
                before = self.objects[b].parent.filter(|&p| p != block).or(Some(b));
            }
        } else if !self.objects[block].children_inline() && (child_is_inline || child_is_out_of_flow) {
            let after = match before {
                Some(b) => self.objects[b].prev_sibling,
                None => self.objects[block].last_child,
            };
            if let Some(anonymous) = after.filter(|&a| {
                self.objects[a].is_anonymous_block() && self.objects[a].continuation().is_none()
            }) {
                self.add_child(anonymous, child, None);
                return;
            }
            if child_is_inline {
                let anonymous = self.create_anonymous_block(block);
                self.add_child_generic(block, anonymous, before);
                self.add_child(anonymous, child, None);
                return;
            }
        }

        self.add_child_generic(block, child, before);

        if made_boxes_non_inline {
            let parent = self.objects[block].parent;
            if let Some(parent) = parent.filter(|_| self.objects[block].is_anonymous_block()) {
                self.remove_leftover_anonymous_block(parent, block);
            }
        }
    }

    /// Move `from` and its following siblings out of the anonymous block
    /// `anonymous` into a new anonymous block placed right after it.
    fn split_anonymous_block_before(&mut self, block: RenderId, anonymous: RenderId, from: RenderId) -> RenderId {
        let post = self.create_anonymous_block(block);
        let next = self.objects[anonymous].next_sibling;
        self.insert_child_node(block, post, next, false);
        self.move_children_to(anonymous, post, Some(from), None, None, false);
        let children_inline = self.objects[anonymous].children_inline();
        self.objects[post].set_flag(RenderFlags::CHILDREN_INLINE, children_inline);
        post
    }

    /// Wrap every run of inline children of `block` in an anonymous block,
    /// never letting a run cross `insertion_point`.
    pub(crate) fn make_children_non_inline(&mut self, block: RenderId, insertion_point: Option<RenderId>) {
        self.objects[block].set_flag(RenderFlags::CHILDREN_INLINE, false);

        let mut current = self.objects[block].first_child;
        while let Some((run_start, run_end)) = current.and_then(|c| self.inline_run(c, insertion_point)) {
            current = self.objects[run_end].next_sibling;
            let anonymous = self.create_anonymous_block(block);
            self.insert_child_node(block, anonymous, Some(run_start), false);
            let stop = self.objects[run_end].next_sibling;
            self.move_children_to(block, anonymous, Some(run_start), stop, None, false);
        }
        self.dirty_line_boxes(block);
        self.set_needs_layout_and_pref_widths_recalc(block);
    }

    /// The longest run of inline-level (or floating/positioned) siblings
    /// starting at or after `start` that contains at least one inline and
    /// does not include `boundary`.
    fn inline_run(&self, start: RenderId, boundary: Option<RenderId>) -> Option<(RenderId, RenderId)> {
        let is_run_member = |id: RenderId| {
            let obj = &self.objects[id];
            obj.is_inline() || obj.is_floating_or_out_of_flow_positioned()
        };
        let mut current = Some(start);
        loop {
            while let Some(c) = current.filter(|&c| !is_run_member(c)) {
                current = self.objects[c].next_sibling;
            }
            let run_start = current?;
            let mut run_end = run_start;
            let mut saw_inline = self.objects[run_start].is_inline();
            current = self.objects[run_start].next_sibling;
            while let Some(c) = current.filter(|&c| is_run_member(c) && Some(c) != boundary) {
                run_end = c;
                saw_inline |= self.objects[c].is_inline();
                current = self.objects[c].next_sibling;
            }
            if saw_inline {
                return Some((run_start, run_end));
            }
        }
    }

    /// An anonymous block that just became block-level inside `parent` may
    /// be redundant: hoist its children into `parent`.
    pub(crate) fn remove_leftover_anonymous_block(&mut self, parent: RenderId, anonymous: RenderId) {
        if !self.objects[parent].is_render_block() || self.objects[anonymous].children_inline() {
            return;
        }
        if self.objects[anonymous].continuation().is_some() || self.objects[parent].children_inline() {
            return;
        }
        let next = self.objects[anonymous].next_sibling;
        self.move_children_to(anonymous, parent, None, None, next, false);
        let _ = self.remove_child_node(parent, anonymous, false);
        self.destroy(anonymous);
    }

    // ========== Tables ==========

    fn table_add_child(&mut self, table: RenderId, child: RenderId, before: Option<RenderId>) {
        let child_obj = &self.objects[child];
        if child_obj.is_table_caption() || child_obj.is_table_col() || child_obj.is_table_section() {
            self.add_child_generic(table, child, before);
            return;
        }
        let section = self.anonymous_wrapper_before(table, before, |obj| obj.is_table_section());
        let section = match section {
            Some(section) => section,
            None => {
                let section =
                    self.create_anonymous_with_display(table, Display::TableRowGroup, BlockFlavor::TableSection);
                self.add_child_generic(table, section, before);
                section
            }
        };
        self.add_child(section, child, None);
    }

    fn section_add_child(&mut self, section: RenderId, child: RenderId, before: Option<RenderId>) {
        if self.objects[child].is_table_row() {
            self.add_child_generic(section, child, before);
            return;
        }
        let row = match self.anonymous_wrapper_before(section, before, |obj| obj.is_table_row()) {
            Some(row) => row,
            None => {
                let row = self.create_anonymous_with_display(section, Display::TableRow, BlockFlavor::TableRow);
                self.add_child_generic(section, row, before);
                row
            }
        };
        self.add_child(row, child, None);
    }

    fn row_add_child(&mut self, row: RenderId, child: RenderId, before: Option<RenderId>) {
        if self.objects[child].is_table_cell() {
            self.add_child_generic(row, child, before);
            return;
        }
        let cell = match self.anonymous_wrapper_before(row, before, |obj| obj.is_table_cell()) {
            Some(cell) => cell,
            None => {
                let cell = self.create_anonymous_with_display(row, Display::TableCell, BlockFlavor::TableCell);
                self.add_child_generic(row, cell, before);
                cell
            }
        };
        self.add_child(cell, child, None);
    }

    /// The anonymous sibling just before the insertion point, when `accept`
    /// allows reusing it as a wrapper.
    fn anonymous_wrapper_before(
        &self,
        parent: RenderId,
        before: Option<RenderId>,
        accept: impl Fn(&RenderObject) -> bool,
    ) -> Option<RenderId> {
        let after = match before {
            Some(b) => self.objects[b].prev_sibling,
            None => self.objects[parent].last_child,
        };
        after.filter(|&a| self.objects[a].is_anonymous() && accept(&self.objects[a]))
    }

    // ========== Moving ==========

    /// Move `child` from `from` to `to`, before `before`.
    pub(crate) fn move_child_to(
        &mut self,
        from: RenderId,
        to: RenderId,
        child: RenderId,
        before: Option<RenderId>,
        notify: bool,
    ) {
        debug_assert_eq!(self.objects[child].parent, Some(from));
        let _ = self.remove_child_node(from, child, notify);
        self.insert_child_node(to, child, before, notify);
    }

    /// Move the children of `from` in `[start, end)` to `to`, before
    /// `before`. `start` defaults to the first child, `end` to the end of
    /// the list.
    pub(crate) fn move_children_to(
        &mut self,
        from: RenderId,
        to: RenderId,
        start: Option<RenderId>,
        end: Option<RenderId>,
        before: Option<RenderId>,
        notify: bool,
    ) {
        let mut current = start.or(self.objects[from].first_child);
        while let Some(c) = current.filter(|&c| Some(c) != end) {
            current = self.objects[c].next_sibling;
            self.move_child_to(from, to, c, before, notify);
        }
    }

    // ========== Removal ==========

    /// Remove `child` from `parent`, merging the anonymous blocks its
    /// removal leaves adjacent.
    pub fn remove_child(&mut self, parent: RenderId, child: RenderId) {
        if self.objects[child].parent != Some(parent) {
            warn_once("render", "removal of a renderer that is not a child");
            return;
        }
        let prev = self.objects[child].prev_sibling;
        let next = self.objects[child].next_sibling;
        let _ = self.remove_child_node(parent, child, true);

        if self.document_being_destroyed || !self.objects[parent].is_render_block() {
            return;
        }
        if self.objects[parent].children_inline() {
            return;
        }

        let mergeable = |tree: &Self, id: RenderId| {
            let obj = &tree.objects[id];
            obj.is_anonymous_block()
                && obj.continuation().is_none()
                && !obj.being_destroyed()
                && !tree.is_continuation_target(id)
        };
        if let Some((prev, next)) = prev.zip(next).filter(|&(p, n)| mergeable(self, p) && mergeable(self, n)) {
            trace!(target: "arbor::render", "merging anonymous blocks {prev} and {next}");
            let next_inline = self.objects[next].children_inline();
            if self.objects[prev].children_inline() != next_inline {
                if self.objects[prev].children_inline() {
                    self.make_children_non_inline(prev, None);
                }
                if next_inline {
                    self.make_children_non_inline(next, None);
                }
            }
            self.move_children_to(next, prev, None, None, None, false);
            let _ = self.remove_child_node(parent, next, false);
            self.destroy(next);
            self.set_needs_layout_and_pref_widths_recalc(prev);
        }

        // A single anonymous block left behind collapses into its parent.
        let only = self.objects[parent].first_child.filter(|&f| Some(f) == self.objects[parent].last_child);
        if let Some(only) = only.filter(|&o| mergeable(self, o)) {
            let inline = self.objects[only].children_inline();
            self.move_children_to(only, parent, None, None, Some(only), false);
            let _ = self.remove_child_node(parent, only, false);
            self.destroy(only);
            self.objects[parent].set_flag(RenderFlags::CHILDREN_INLINE, inline);
            self.dirty_line_boxes(parent);
            self.set_needs_layout_and_pref_widths_recalc(parent);
        }
    }

    /// Whether some continuation chain points at `id`.
    fn is_continuation_target(&self, id: RenderId) -> bool {
        self.continuation_predecessor(id).is_some()
    }

    /// Drop `id` from the float and positioned lists of the blocks above it.
    pub(crate) fn remove_floating_or_positioned_child_from_block_lists(&mut self, id: RenderId) {
        let floating = self.objects[id].is_floating();
        self.view_state.positioned_objects.retain(|&p| p != id);
        let mut current = self.objects[id].parent;
        while let Some(c) = current {
            let mut had_float = false;
            if let Some(block) = self.objects[c].block_mut() {
                block.positioned_objects.retain(|&p| p != id);
                let before = block.floating_objects.len();
                block.floating_objects.retain(|&f| f != id);
                had_float = block.floating_objects.len() != before;
            }
            if floating && had_float {
                self.set_needs_layout(c, MarkingBehavior::MarkContainingBlockChain);
            }
            current = self.objects[c].parent;
        }
    }

    // ========== Tree notifications ==========

    /// `id` was linked under its parent.
    pub(crate) fn inserted_into_tree(&mut self, id: RenderId) {
        let Some(parent) = self.objects[id].parent else {
            return;
        };

        // Layers of the subtree attach under the parent's layer.
        let mut layer = None;
        if self.objects[id].first_child.is_some() || self.objects[id].has_layer() {
            layer = self.enclosing_layer(parent);
            self.add_layers(id, layer);
        }

        // A visible child of an invisible parent makes the layer paint.
        let became_visible = !self.objects[parent].style.is_visible()
            && self.objects[id].style.is_visible()
            && !self.objects[id].has_layer();
        if let Some(layer) = layer
            .or_else(|| self.enclosing_layer(parent))
            .filter(|_| became_visible)
        {
            self.layers[layer].has_visible_content = true;
            self.layers[layer].visible_content_status_dirty = false;
        }

        if !self.objects[id].is_floating() && self.objects[parent].children_inline() {
            self.dirty_lines_from_changed_child(parent);
        }
    }

    /// `id` is about to be unlinked from its parent.
    pub(crate) fn will_be_removed_from_tree(&mut self, id: RenderId) {
        let Some(parent) = self.objects[id].parent else {
            return;
        };

        if !self.objects[id].is_text() && self.objects[id].style.has_fixed_background_image() {
            self.frame_view.remove_slow_repaint_object(id);
        }

        let mut layer = None;
        if !self.objects[parent].style.is_visible() && self.objects[id].style.is_visible() && !self.objects[id].has_layer() {
            layer = self.enclosing_layer(parent);
            if let Some(layer) = layer {
                self.dirty_visible_content_status(layer);
            }
        }

        if self.objects[id].first_child.is_some() || self.objects[id].has_layer() {
            let layer = layer.or_else(|| self.enclosing_layer(parent));
            self.remove_layers(id, layer);
        }

        if self.objects[id].is_out_of_flow_positioned() && self.objects[parent].children_inline() {
            self.dirty_lines_from_changed_child(parent);
        }
    }

    // ========== Destruction ==========

    /// Destroy `id` and its subtree, unlinking it first.
    pub fn destroy(&mut self, id: RenderId) {
        if !self.objects.contains(id) {
            return;
        }
        self.objects[id].set_flag(RenderFlags::BEING_DESTROYED, true);

        while let Some(child) = self.objects[id].first_child {
            self.destroy(child);
        }

        // Continuations die with the piece that owns them.
        if let Some(continuation) = self.objects[id].continuation() {
            self.objects[id].set_continuation(None);
            self.destroy(continuation.id());
        }
        let in_chain = self.objects[id].is_render_inline() || self.objects[id].is_anonymous_block();
        if let Some(previous) = in_chain.then(|| self.continuation_predecessor(id)).flatten() {
            self.objects[previous].set_continuation(None);
        }

        if let Some(parent) = self.objects[id].parent {
            let _ = self.remove_child_node(parent, id, true);
        }

        self.frame_view.remove_slow_repaint_object(id);
        self.frame_view.remove_viewport_constrained_object(id);
        if self.frame_view.layout_root == Some(id) {
            self.frame_view.layout_root = None;
        }
        if self.objects[id].replaced().is_some_and(|r| r.is_widget()) {
            self.remove_widget(id);
        }
        if self.objects[id].has_layer() {
            self.destroy_layer(id);
        }
        if let Some(node) = self.objects[id].node.filter(|node| self.node_map.get(node) == Some(&id)) {
            let _ = self.node_map.remove(&node);
        }
        let _ = self.objects.remove(id);
    }

    /// Destroy `id`, together with anonymous table wrappers that only
    /// existed to hold it.
    pub fn destroy_and_cleanup_anonymous_wrappers(&mut self, id: RenderId) {
        if self.document_being_destroyed {
            self.destroy(id);
            return;
        }
        let mut destroy_root = id;
        while let Some(parent) = self.objects[destroy_root].parent {
            let parent_obj = &self.objects[parent];
            if !parent_obj.is_anonymous() || !(parent_obj.is_table_cell() || parent_obj.is_table_section()) {
                break;
            }
            if parent_obj.first_child != Some(destroy_root) || parent_obj.last_child != Some(destroy_root) {
                break;
            }
            destroy_root = parent;
        }
        self.destroy(destroy_root);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::geometry::LayoutSize;
    use crate::object::BlockFlavor;
    use crate::style::{Display, RenderStyle};
    use crate::tree::RenderTree;

    fn style(display: Display) -> Rc<RenderStyle> {
        Rc::new(RenderStyle {
            display,
            ..RenderStyle::default()
        })
    }

    #[test]
    fn test_cell_in_block_gets_table_row_and_section() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let view = tree.view();
        let div = tree.create_block(BlockFlavor::Flow, style(Display::Block), None);
        tree.add_child(view, div, None);
        let cell = tree.create_block(BlockFlavor::TableCell, style(Display::TableCell), None);
        tree.add_child(div, cell, None);

        let row = tree.parent(cell).unwrap();
        let section = tree.parent(row).unwrap();
        let table = tree.parent(section).unwrap();
        assert!(tree.get(row).is_table_row() && tree.get(row).is_anonymous());
        assert!(tree.get(section).is_table_section());
        assert!(tree.get(table).is_table());
        assert_eq!(tree.parent(table), Some(div));
    }

    #[test]
    fn test_second_cell_reuses_anonymous_row() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let view = tree.view();
        let table = tree.create_block(BlockFlavor::Table, style(Display::Table), None);
        tree.add_child(view, table, None);
        let a = tree.create_block(BlockFlavor::TableCell, style(Display::TableCell), None);
        let b = tree.create_block(BlockFlavor::TableCell, style(Display::TableCell), None);
        tree.add_child(table, a, None);
        tree.add_child(table, b, None);
        assert_eq!(tree.parent(a), tree.parent(b));
        assert_eq!(tree.child_ids(table).len(), 1);
    }

    #[test]
    fn test_block_child_wraps_inline_runs() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let view = tree.view();
        let div = tree.create_block(BlockFlavor::Flow, style(Display::Block), None);
        tree.add_child(view, div, None);
        let text = tree.create_text("hello", style(Display::Inline), None);
        tree.add_child(div, text, None);
        assert!(tree.get(div).children_inline());

        let p = tree.create_block(BlockFlavor::Flow, style(Display::Block), None);
        tree.add_child(div, p, None);
        assert!(!tree.get(div).children_inline());
        let children = tree.child_ids(div);
        assert_eq!(children.len(), 2);
        assert!(tree.get(children[0]).is_anonymous_block());
        assert_eq!(tree.parent(text), Some(children[0]));
        assert_eq!(children[1], p);

        // Inline content after a block child gets its own anonymous block.
        let more = tree.create_text("again", style(Display::Inline), None);
        tree.add_child(div, more, None);
        let children = tree.child_ids(div);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.parent(more), Some(children[2]));
    }

    #[test]
    fn test_removing_block_merges_and_collapses_anonymous_blocks() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let view = tree.view();
        let div = tree.create_block(BlockFlavor::Flow, style(Display::Block), None);
        tree.add_child(view, div, None);
        let first = tree.create_text("a", style(Display::Inline), None);
        let p = tree.create_block(BlockFlavor::Flow, style(Display::Block), None);
        let last = tree.create_text("b", style(Display::Inline), None);
        tree.add_child(div, first, None);
        tree.add_child(div, p, None);
        tree.add_child(div, last, None);
        assert_eq!(tree.child_ids(div).len(), 3);

        tree.remove_child(div, p);
        tree.destroy(p);
        assert_eq!(tree.child_ids(div), vec![first, last]);
        assert!(tree.get(div).children_inline());
    }

    #[test]
    fn test_destroy_releases_subtree() {
        let mut tree = RenderTree::new(LayoutSize::new(800.0, 600.0));
        let view = tree.view();
        let div = tree.create_block(BlockFlavor::Flow, style(Display::Block), None);
        let text = tree.create_text("x", style(Display::Inline), None);
        tree.add_child(view, div, None);
        tree.add_child(div, text, None);
        let before = tree.object_count();
        tree.destroy(div);
        assert_eq!(tree.object_count(), before - 2);
        assert!(!tree.contains(text));
        assert!(tree.get(view).first_child().is_none());
    }
}
