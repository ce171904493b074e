//! Intrinsic widths.
//!
//! [§ 10.3.5 Floating, non-replaced elements](https://www.w3.org/TR/CSS2/visudet.html#float-width)
//!
//! "Calculation of the shrink-to-fit width is similar to calculating the
//! width of a table cell using the automatic table layout algorithm.
//! Roughly: calculate the preferred width by formatting the content without
//! breaking lines other than where explicit line breaks occur, and also
//! calculate the preferred minimum width, e.g., by trying all possible line
//! breaks."
//!
//! Widths are border-box widths and are cached on the object until
//! [`RenderTree::set_preferred_logical_widths_dirty`] marks them stale.

use crate::layout_bits::MarkingBehavior;
use crate::object::RenderId;
use crate::style::{Length, WhiteSpace};
use crate::tree::RenderTree;

/// Running min/max of an inline formatting context.
#[derive(Debug, Clone, Copy, Default)]
struct InlineWidths {
    min: f32,
    max: f32,
    /// Width of the current unbreakable line, for `pre` content.
    line: f32,
}

impl InlineWidths {
    fn add_max(&mut self, width: f32) {
        self.line += width;
        self.max = self.max.max(self.line);
    }

    fn force_break(&mut self) {
        self.line = 0.0;
    }
}

impl RenderTree {
    /// Min and max preferred border-box widths of `id`, recomputed when stale.
    pub fn preferred_logical_widths(&mut self, id: RenderId) -> (f32, f32) {
        if !self.objects[id].preferred_logical_widths_dirty() {
            return self.objects[id].preferred_widths();
        }
        let (min, max) = self.compute_preferred_logical_widths(id);
        let max = max.max(min);
        let obj = &mut self.objects[id];
        obj.min_preferred_width = min;
        obj.max_preferred_width = max;
        self.set_preferred_logical_widths_dirty(id, false, MarkingBehavior::MarkOnlyThis);
        (min, max)
    }

    fn compute_preferred_logical_widths(&mut self, id: RenderId) -> (f32, f32) {
        let obj = &self.objects[id];
        let style = obj.style_rc();
        let bp = style.border_widths().horizontal() + style.padding.horizontal();

        if let Some(data) = obj.text() {
            let text = data.text.clone();
            return self.text_preferred_widths(&text, style.white_space, style.font_size);
        }
        if let Some(data) = obj.replaced() {
            let width = match style.width {
                Length::Fixed(w) => w,
                _ => data.intrinsic_size.width,
            };
            return (width + bp, width + bp);
        }
        if obj.is_render_inline() {
            let mut widths = InlineWidths::default();
            self.accumulate_inline_widths(id, &mut widths);
            return (widths.min, widths.max + bp + style.margin.horizontal());
        }

        if let Length::Fixed(width) = style.width {
            return (width + bp, width + bp);
        }
        let (min, max) = if obj.is_table() {
            self.table_preferred_widths(id)
        } else if obj.children_inline() {
            let mut widths = InlineWidths::default();
            self.accumulate_inline_widths(id, &mut widths);
            (widths.min, widths.max)
        } else {
            self.block_children_preferred_widths(id)
        };
        (min + bp, max + bp)
    }

    fn block_children_preferred_widths(&mut self, id: RenderId) -> (f32, f32) {
        let mut min = 0.0_f32;
        let mut max = 0.0_f32;
        let mut float_run = 0.0_f32;
        for child in self.child_ids(id) {
            let obj = &self.objects[child];
            if obj.is_out_of_flow_positioned() || obj.is_flow_thread() {
                continue;
            }
            let floating = obj.is_floating();
            let margins = obj.style.margin.horizontal();
            let (child_min, child_max) = self.preferred_logical_widths(child);
            min = min.max(child_min + margins);
            if floating {
                // Adjacent floats sit side by side.
                float_run += child_max + margins;
                max = max.max(float_run);
            } else {
                float_run = 0.0;
                max = max.max(child_max + margins);
            }
        }
        (min, max)
    }

    fn accumulate_inline_widths(&mut self, parent: RenderId, widths: &mut InlineWidths) {
        for child in self.child_ids(parent) {
            let obj = &self.objects[child];
            if obj.is_out_of_flow_positioned() {
                continue;
            }
            let style = obj.style_rc();
            if obj.is_text() {
                let text = obj.text().map(|t| t.text.clone()).unwrap_or_default();
                let (min, max) = self.preferred_logical_widths(child);
                widths.min = widths.min.max(min);
                if style.white_space.preserves_newlines() {
                    let mut lines = text.split('\n').peekable();
                    while let Some(line) = lines.next() {
                        widths.add_max(self.font_metrics.text_width(line, style.font_size));
                        if lines.peek().is_some() {
                            widths.force_break();
                        }
                    }
                } else {
                    widths.add_max(max);
                }
            } else if obj.is_render_inline() {
                let borders = style.border_widths();
                let start = style.margin.left + borders.left + style.padding.left;
                let end = style.margin.right + borders.right + style.padding.right;
                widths.add_max(start);
                self.accumulate_inline_widths(child, widths);
                widths.add_max(end);
                widths.min = widths.min.max(start.max(end));
            } else {
                let (min, max) = self.preferred_logical_widths(child);
                let margins = style.margin.horizontal();
                widths.min = widths.min.max(min + margins);
                widths.add_max(max + margins);
            }
        }
    }

    /// Widest unbreakable piece and full single-line width of `text`.
    fn text_preferred_widths(&self, text: &str, white_space: WhiteSpace, font_size: f32) -> (f32, f32) {
        let metrics = self.font_metrics.as_ref();
        match white_space {
            WhiteSpace::Pre | WhiteSpace::Nowrap => {
                let widest = if white_space == WhiteSpace::Pre {
                    text.split('\n')
                        .map(|line| metrics.text_width(line, font_size))
                        .fold(0.0, f32::max)
                } else {
                    metrics.text_width(&collapse_white_space(text), font_size)
                };
                (widest, widest)
            }
            WhiteSpace::PreWrap => {
                let min = text
                    .split([' ', '\t', '\n'])
                    .map(|word| metrics.text_width(word, font_size))
                    .fold(0.0, f32::max);
                let max = text
                    .split('\n')
                    .map(|line| metrics.text_width(line, font_size))
                    .fold(0.0, f32::max);
                (min, max)
            }
            WhiteSpace::Normal | WhiteSpace::PreLine => {
                let min = text
                    .split_whitespace()
                    .map(|word| metrics.text_width(word, font_size))
                    .fold(0.0, f32::max);
                let max = if white_space == WhiteSpace::PreLine {
                    text.split('\n')
                        .map(|line| metrics.text_width(&collapse_white_space(line), font_size))
                        .fold(0.0, f32::max)
                } else {
                    metrics.text_width(&collapse_white_space(text), font_size)
                };
                (min, max)
            }
        }
    }
}

/// [§ 16.6.1 The 'white-space' processing model](https://www.w3.org/TR/CSS2/text.html#white-space-model)
///
/// "every tab is converted to a space ... any space immediately following
/// another collapsible space ... is collapsed"
pub(crate) fn collapse_white_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
