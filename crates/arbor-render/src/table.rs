//! Table layout.
//!
//! [§ 17 Tables](https://www.w3.org/TR/CSS2/tables.html)
//!
//! A table lays out all of its parts itself: captions stack above the row
//! groups, row groups stack their rows, and rows place their cells in the
//! shared column grid. Cells are ordinary blocks sized through their
//! override width and height.
//!
//! Not implemented: `colspan`/`rowspan`, border collapsing and
//! `table-layout: fixed`.

use crate::geometry::LayoutPoint;
use crate::layout_bits::MarkingBehavior;
use crate::object::RenderId;
use crate::tree::RenderTree;

impl RenderTree {
    /// Cells of each row of `table`, in row order.
    fn table_rows(&self, table: RenderId) -> Vec<(RenderId, Vec<RenderId>)> {
        let mut rows = Vec::new();
        for section in self.children(table) {
            if !self.objects[section].is_table_section() {
                continue;
            }
            for row in self.children(section) {
                if self.objects[row].is_table_row() {
                    let cells = self
                        .children(row)
                        .filter(|&c| self.objects[c].is_table_cell())
                        .collect();
                    rows.push((row, cells));
                }
            }
        }
        rows
    }

    /// Per-column (min, max) widths from the cells of `table`.
    ///
    /// [§ 17.5.2.2 Automatic table layout](https://www.w3.org/TR/CSS2/tables.html#auto-table-layout)
    ///
    /// "For each column, determine a minimum and maximum column width from
    /// the cells that span only that column."
    fn column_preferred_widths(&mut self, table: RenderId) -> Vec<(f32, f32)> {
        let mut columns: Vec<(f32, f32)> = Vec::new();
        for (_, cells) in self.table_rows(table) {
            for (index, cell) in cells.into_iter().enumerate() {
                let (min, max) = self.preferred_logical_widths(cell);
                if index == columns.len() {
                    columns.push((min, max));
                } else {
                    let column = &mut columns[index];
                    column.0 = column.0.max(min);
                    column.1 = column.1.max(max);
                }
            }
        }
        columns
    }

    /// Content-box (min, max) widths of `table`.
    pub(crate) fn table_preferred_widths(&mut self, table: RenderId) -> (f32, f32) {
        let columns = self.column_preferred_widths(table);
        let mut min: f32 = columns.iter().map(|c| c.0).sum();
        let mut max: f32 = columns.iter().map(|c| c.1).sum();
        for caption in self.child_ids(table) {
            if self.objects[caption].is_table_caption() {
                let (caption_min, _) = self.preferred_logical_widths(caption);
                min = min.max(caption_min);
                max = max.max(caption_min);
            }
        }
        (min, max)
    }

    /// Share `available` among the columns.
    ///
    /// "If the table is wider than the columns, the extra width should be
    /// distributed over the columns."
    fn distribute_column_widths(columns: &[(f32, f32)], available: f32) -> Vec<f32> {
        if columns.is_empty() {
            return Vec::new();
        }
        let total_min: f32 = columns.iter().map(|c| c.0).sum();
        let total_max: f32 = columns.iter().map(|c| c.1).sum();
        if available <= total_min {
            return columns.iter().map(|c| c.0).collect();
        }
        if available <= total_max {
            // Between min and max: grow every column from its minimum in
            // proportion to how much more it would like.
            let ratio = (available - total_min) / (total_max - total_min);
            return columns.iter().map(|c| c.0 + (c.1 - c.0) * ratio).collect();
        }
        let excess = available - total_max;
        if total_max <= 0.0 {
            let per_column = available / columns.len() as f32;
            return vec![per_column; columns.len()];
        }
        columns.iter().map(|c| c.1 + excess * c.1 / total_max).collect()
    }

    /// Lay out the parts of `table`; returns the content height.
    pub(crate) fn layout_table_contents(&mut self, table: RenderId, relayout_children: bool) -> f32 {
        // STEP 1: Column widths from the cells' preferred widths.
        let content = self.objects[table].content_box_rect();
        let columns = self.column_preferred_widths(table);
        let widths = Self::distribute_column_widths(&columns, content.width());

        // STEP 2: Captions, above the row groups.
        let mut y = content.min_y();
        for caption in self.child_ids(table) {
            if !self.objects[caption].is_table_caption() {
                continue;
            }
            let margins = self.objects[caption].style.margin;
            let width = (content.width() - margins.horizontal()).max(0.0);
            self.objects[caption].frame_rect.origin =
                LayoutPoint::new(content.min_x() + margins.left, y + margins.top);
            self.layout_table_part_at_width(caption, width, None, relayout_children);
            y += self.objects[caption].size().height + margins.vertical();
        }

        // STEP 3: Row groups, each stacking its rows.
        for section in self.child_ids(table) {
            if !self.objects[section].is_table_section() {
                continue;
            }
            {
                let obj = &mut self.objects[section];
                obj.frame_rect.origin = LayoutPoint::new(content.min_x(), y);
                obj.frame_rect.size.width = content.width();
            }
            let section_state = self.push_layout_state(section, false);
            let mut row_y = 0.0;
            for row in self.child_ids(section) {
                if !self.objects[row].is_table_row() {
                    continue;
                }
                let height = self.layout_table_row(row, row_y, content.width(), &widths, relayout_children);
                row_y += height;
            }
            self.pop_layout_state(section_state);
            self.objects[section].frame_rect.size.height = row_y;
            self.compute_overflow(section);
            self.clear_needs_layout(section);
            y += row_y;
        }

        // Columns take no space of their own.
        for column in self.child_ids(table) {
            if self.objects[column].is_table_col() {
                self.clear_needs_layout(column);
            }
        }
        y - content.min_y()
    }

    /// [§ 17.5.3 Table height algorithms](https://www.w3.org/TR/CSS2/tables.html#height-layout)
    ///
    /// "The height of a 'table-row' element's box is calculated once the
    /// user agent has all the cells in the row available: it is the maximum
    /// of the row's computed 'height', the computed 'height' of each cell in
    /// the row, and the minimum height (MIN) required by the cells."
    fn layout_table_row(
        &mut self,
        row: RenderId,
        y: f32,
        width: f32,
        column_widths: &[f32],
        relayout_children: bool,
    ) -> f32 {
        {
            let obj = &mut self.objects[row];
            obj.frame_rect.origin = LayoutPoint::new(0.0, y);
            obj.frame_rect.size.width = width;
        }
        let row_state = self.push_layout_state(row, false);

        // STEP 1: Cells at their column widths, natural height.
        let cells: Vec<RenderId> = self
            .children(row)
            .filter(|&c| self.objects[c].is_table_cell())
            .collect();
        let mut x = 0.0;
        let mut row_height = self.objects[row]
            .style
            .height
            .resolve(0.0)
            .unwrap_or(0.0);
        for (index, &cell) in cells.iter().enumerate() {
            let cell_width = column_widths.get(index).copied().unwrap_or(0.0);
            self.objects[cell].frame_rect.origin = LayoutPoint::new(x, 0.0);
            self.layout_table_part_at_width(cell, cell_width, None, relayout_children);
            x += cell_width;
            row_height = row_height.max(self.objects[cell].size().height);
        }

        // STEP 2: Stretch every cell to the row height.
        for &cell in &cells {
            if self.objects[cell].size().height < row_height {
                let cell_width = self.objects[cell].size().width;
                self.layout_table_part_at_width(cell, cell_width, Some(row_height), true);
            }
        }

        self.pop_layout_state(row_state);
        self.objects[row].frame_rect.size.height = row_height;
        self.compute_overflow(row);
        self.clear_needs_layout(row);
        row_height
    }

    /// Lay out a cell or caption at a width chosen by the table.
    fn layout_table_part_at_width(&mut self, id: RenderId, width: f32, height: Option<f32>, force: bool) {
        let changed = self.objects[id]
            .block()
            .is_some_and(|data| data.override_width != Some(width) || data.override_height != height);
        if let Some(data) = self.objects[id].block_mut() {
            data.override_width = Some(width);
            data.override_height = height;
        }
        if changed || force {
            self.set_needs_layout(id, MarkingBehavior::MarkOnlyThis);
        }
        if self.objects[id].needs_layout() {
            self.layout_object(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_grow_between_min_and_max() {
        let widths = RenderTree::distribute_column_widths(&[(10.0, 30.0), (10.0, 10.0)], 30.0);
        assert_eq!(widths, vec![20.0, 10.0]);
    }

    #[test]
    fn test_columns_share_excess_by_max() {
        let widths = RenderTree::distribute_column_widths(&[(10.0, 30.0), (10.0, 10.0)], 80.0);
        assert_eq!(widths, vec![60.0, 20.0]);
    }

    #[test]
    fn test_columns_never_shrink_below_min() {
        let widths = RenderTree::distribute_column_widths(&[(10.0, 30.0), (20.0, 40.0)], 5.0);
        assert_eq!(widths, vec![10.0, 20.0]);
    }
}
