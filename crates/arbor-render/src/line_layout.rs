//! Line layout.
//!
//! [§ 9.4.2 Inline formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#inline-formatting)
//!
//! "In an inline formatting context, boxes are laid out horizontally, one
//! after the other, beginning at the top of a containing block. Horizontal
//! margins, borders, and padding are respected between these boxes."
//!
//! A block with inline children breaks them into lines greedily: words are
//! appended while they fit and a new line starts at the first one that does
//! not. Text and inline boxes are stored as fragments in the block's space
//! (see [`crate::line_box`]); atomic inlines get a location in that same
//! space.

use std::collections::HashMap;

use crate::geometry::{LayoutPoint, LayoutSize, rect};
use crate::layout::FloatState;
use crate::layout_bits::MarkingBehavior;
use crate::line_box::{InlineFlowBox, RootLineBox, TextBox};
use crate::object::{RenderId, RenderKind};
use crate::style::{RenderStyle, WhiteSpace};
use crate::tree::RenderTree;

/// Height above and below the baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct VerticalMetrics {
    ascent: f32,
    descent: f32,
}

impl VerticalMetrics {
    fn height(self) -> f32 {
        self.ascent + self.descent
    }

    fn max(self, other: Self) -> Self {
        Self {
            ascent: self.ascent.max(other.ascent),
            descent: self.descent.max(other.descent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ItemKind {
    /// Bytes `start..end` of a text run.
    Text { text: RenderId, start: usize, end: usize },
    /// An inline-block or replaced element, sized by its margin box.
    Atomic {
        id: RenderId,
        margin_left: f32,
        margin_top: f32,
    },
    /// Margin, border or padding of an inline box.
    Edge,
}

#[derive(Debug, Clone, Copy)]
struct LineItem {
    kind: ItemKind,
    x: f32,
    width: f32,
    metrics: VerticalMetrics,
}

/// An inline with its own line boxes, open at the current position.
#[derive(Debug, Clone, Copy)]
struct OpenInline {
    id: RenderId,
    metrics: VerticalMetrics,
    top_edge: f32,
    bottom_edge: f32,
}

/// Horizontal extent of an open inline on the current line.
#[derive(Debug, Clone, Copy)]
struct Extent {
    inline: OpenInline,
    min_x: f32,
    max_x: f32,
    left_edge: bool,
    right_edge: bool,
}

/// Pieces of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Word(usize, usize),
    Space(usize, usize),
    Newline,
}

/// Split `text` into words, white-space runs and (when preserved) newlines.
fn segments(text: &str, preserve_newlines: bool) -> Vec<Segment> {
    let is_space = |c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{c}');
    let is_forced_break = |c: char| c == '\n' && preserve_newlines;
    let mut out = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if is_forced_break(c) {
            out.push(Segment::Newline);
            continue;
        }
        let space = is_space(c);
        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            if is_forced_break(next) || is_space(next) != space {
                break;
            }
            end = i + next.len_utf8();
            let _ = chars.next();
        }
        out.push(if space {
            Segment::Space(start, end)
        } else {
            Segment::Word(start, end)
        });
    }
    out
}

/// Accumulates the items of the current line and the finished lines.
#[derive(Debug)]
struct LineBuilder {
    left: f32,
    top: f32,
    available: f32,
    strut: VerticalMetrics,
    x: f32,
    items: Vec<LineItem>,
    has_content: bool,
    /// A collapsible space that is only placed if more content follows.
    pending_space: Option<LineItem>,
    open: Vec<OpenInline>,
    extents: Vec<(RenderId, Extent)>,
    lines: Vec<RootLineBox>,
    text_boxes: HashMap<RenderId, Vec<TextBox>>,
    flow_boxes: HashMap<RenderId, Vec<InlineFlowBox>>,
    atomics: Vec<(RenderId, LayoutPoint)>,
}

impl LineBuilder {
    fn new(left: f32, top: f32, available: f32, strut: VerticalMetrics) -> Self {
        Self {
            left,
            top,
            available,
            strut,
            x: 0.0,
            items: Vec::new(),
            has_content: false,
            pending_space: None,
            open: Vec::new(),
            extents: Vec::new(),
            lines: Vec::new(),
            text_boxes: HashMap::new(),
            flow_boxes: HashMap::new(),
            atomics: Vec::new(),
        }
    }

    /// Where an out-of-flow box would start at the current position.
    fn static_position(&self) -> LayoutPoint {
        let pending = self.pending_space.map_or(0.0, |space| space.width);
        LayoutPoint::new(self.left + self.x + pending, self.top)
    }

    fn fits(&self, width: f32) -> bool {
        let pending = self.pending_space.map_or(0.0, |space| space.width);
        self.x + pending + width <= self.available + 0.01
    }

    fn push(&mut self, kind: ItemKind, width: f32, metrics: VerticalMetrics) {
        let x = self.x;
        for open in &self.open {
            match self.extents.iter_mut().find(|(id, _)| *id == open.id) {
                Some((_, extent)) => {
                    extent.min_x = extent.min_x.min(x);
                    extent.max_x = extent.max_x.max(x + width);
                }
                None => self.extents.push((
                    open.id,
                    Extent {
                        inline: *open,
                        min_x: x,
                        max_x: x + width,
                        left_edge: false,
                        right_edge: false,
                    },
                )),
            }
        }
        self.items.push(LineItem {
            kind,
            x,
            width,
            metrics,
        });
        self.x += width;
    }

    fn flush_pending_space(&mut self) {
        if let Some(space) = self.pending_space.take() {
            self.push(space.kind, space.width, space.metrics);
        }
    }

    /// An unbreakable piece of content: a word or an atomic inline.
    fn add_unbreakable(&mut self, kind: ItemKind, width: f32, metrics: VerticalMetrics, wrap: bool) {
        if wrap && self.has_content && !self.fits(width) {
            self.finish_line(false);
        }
        self.flush_pending_space();
        self.push(kind, width, metrics);
        self.has_content = true;
    }

    /// [§ 16.6.1 The 'white-space' processing model](https://www.w3.org/TR/CSS2/text.html#white-space-model)
    ///
    /// "A sequence of collapsible spaces at the beginning of a line is
    /// removed." Inner runs collapse to one space; a run at the end of a
    /// line is dropped.
    fn add_collapsible_space(&mut self, kind: ItemKind, width: f32, metrics: VerticalMetrics) {
        if self.has_content && self.pending_space.is_none() {
            self.pending_space = Some(LineItem {
                kind,
                x: 0.0,
                width,
                metrics,
            });
        }
    }

    /// Spaces kept as they are (`pre`, `pre-wrap`).
    fn add_preserved_space(&mut self, kind: ItemKind, width: f32, metrics: VerticalMetrics) {
        self.flush_pending_space();
        self.push(kind, width, metrics);
        self.has_content = true;
    }

    /// Horizontal space outside any inline being opened or closed.
    fn add_gap(&mut self, width: f32) {
        if width != 0.0 {
            self.flush_pending_space();
            self.push(ItemKind::Edge, width, VerticalMetrics::default());
        }
    }

    /// Border and padding on the start (`start == true`) or end side of
    /// `inline`.
    fn add_edge(&mut self, inline: RenderId, width: f32, start: bool) {
        if width != 0.0 {
            self.flush_pending_space();
        }
        self.push(ItemKind::Edge, width, VerticalMetrics::default());
        if let Some((_, extent)) = self.extents.iter_mut().find(|(id, _)| *id == inline) {
            if start {
                extent.left_edge = true;
            } else {
                extent.right_edge = true;
            }
        }
    }

    fn open_inline(&mut self, inline: OpenInline) {
        self.open.push(inline);
    }

    fn close_inline(&mut self, inline: RenderId) {
        self.open.retain(|open| open.id != inline);
    }

    /// [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
    ///
    /// "The line box height is the distance between the uppermost box top
    /// and the lowermost box bottom."
    ///
    /// With `forced`, an empty line still takes the strut's height.
    fn finish_line(&mut self, forced: bool) {
        self.pending_space = None;
        if self.items.is_empty() && !forced {
            self.extents.clear();
            return;
        }

        // STEP 1: Line height and baseline.
        let metrics = self
            .items
            .iter()
            .map(|item| item.metrics)
            .chain(self.extents.iter().map(|(_, extent)| extent.inline.metrics))
            .fold(self.strut, VerticalMetrics::max);
        let baseline = self.top + metrics.ascent;
        let line = self.lines.len();

        // STEP 2: Text boxes, merging adjacent pieces of the same run.
        let mut index = 0;
        while index < self.items.len() {
            let item = self.items[index];
            index += 1;
            match item.kind {
                ItemKind::Text { text, start, end } => {
                    let mut run_end = end;
                    let mut right = item.x + item.width;
                    while let Some(next) = self.items.get(index) {
                        let ItemKind::Text {
                            text: next_text,
                            start: next_start,
                            end: next_end,
                        } = next.kind
                        else {
                            break;
                        };
                        if next_text != text || next_start != run_end {
                            break;
                        }
                        run_end = next_end;
                        right = next.x + next.width;
                        index += 1;
                    }
                    let text_box = TextBox {
                        line,
                        rect: rect(
                            self.left + item.x,
                            baseline - item.metrics.ascent,
                            right - item.x,
                            item.metrics.height(),
                        ),
                        start,
                        len: run_end - start,
                    };
                    self.text_boxes.entry(text).or_default().push(text_box);
                }
                ItemKind::Atomic {
                    id,
                    margin_left,
                    margin_top,
                } => {
                    // Atomic inlines sit on the baseline with their margin
                    // box bottom.
                    let origin = LayoutPoint::new(
                        self.left + item.x + margin_left,
                        baseline - item.metrics.ascent + margin_top,
                    );
                    self.atomics.push((id, origin));
                }
                ItemKind::Edge => {}
            }
        }

        // STEP 3: Fragments of the inlines with their own line boxes.
        for (id, extent) in self.extents.drain(..) {
            let inline = extent.inline;
            let flow_box = InlineFlowBox {
                line,
                rect: rect(
                    self.left + extent.min_x,
                    baseline - inline.metrics.ascent - inline.top_edge,
                    extent.max_x - extent.min_x,
                    inline.metrics.height() + inline.top_edge + inline.bottom_edge,
                ),
                includes_left_edge: extent.left_edge,
                includes_right_edge: extent.right_edge,
            };
            self.flow_boxes.entry(id).or_default().push(flow_box);
        }

        // STEP 4: The line itself.
        let height = metrics.height();
        self.lines.push(RootLineBox {
            rect: rect(self.left, self.top, self.available, height),
            baseline,
        });
        self.top += height;
        self.x = 0.0;
        self.items.clear();
        self.has_content = false;
    }
}

/// State of one inline formatting context while its content is walked.
#[derive(Debug)]
struct InlineWalk {
    block: RenderId,
    relayout_children: bool,
    lines: LineBuilder,
    floats: FloatState,
    /// Inlines and text whose fragments this layout replaces.
    visited: Vec<RenderId>,
}

impl RenderTree {
    /// Lay out the inline content of `block`.
    ///
    /// Returns the content height and the bottom of the floats, both
    /// measured from the top of the content box.
    pub(crate) fn layout_inline_children(&mut self, block: RenderId, relayout_children: bool) -> (f32, f32) {
        // STEP 1: Line geometry from the block.
        let content = self.objects[block].content_box_rect();
        let available = self.available_logical_width(block);
        let strut = self.strut_metrics(&self.objects[block].style);
        let mut walk = InlineWalk {
            block,
            relayout_children,
            lines: LineBuilder::new(content.min_x(), content.min_y(), available, strut),
            floats: FloatState::new(content.min_x(), content.min_y(), available),
            visited: Vec::new(),
        };

        // STEP 2: Break the content into lines.
        self.place_inline_children(block, &mut walk);
        walk.lines.finish_line(false);

        // STEP 3: Hand the fragments to their owners.
        let InlineWalk {
            lines, floats, visited, ..
        } = walk;
        let LineBuilder {
            top,
            lines,
            mut text_boxes,
            mut flow_boxes,
            atomics,
            ..
        } = lines;
        if let Some(data) = self.objects[block].block_mut() {
            data.line_boxes = lines;
            data.line_boxes_dirty = false;
        }
        for id in visited {
            match &mut self.objects[id].kind {
                RenderKind::Text(data) => data.boxes = text_boxes.remove(&id).unwrap_or_default(),
                RenderKind::Inline(data) => data.line_boxes = flow_boxes.remove(&id).unwrap_or_default(),
                _ => {}
            }
            self.clear_needs_layout(id);
        }

        // STEP 4: Move atomic inlines onto their lines.
        let block_needs_layout = self.objects[block].self_needs_layout();
        for (id, origin) in atomics {
            let old_frame = self.objects[id].frame_rect;
            let check_moved = !block_needs_layout && self.check_for_repaint_during_layout(id);
            self.objects[id].frame_rect.origin = origin;
            if check_moved && old_frame.origin != origin {
                self.repaint_during_layout_if_moved(id, &old_frame);
            }
        }

        (top - content.min_y(), floats.bottom - content.min_y())
    }

    fn strut_metrics(&self, style: &RenderStyle) -> VerticalMetrics {
        let metrics = self.font_metrics.as_ref();
        let line_height = style
            .line_height
            .unwrap_or_else(|| metrics.line_height(style.font_size));
        let ascent = metrics.ascent(style.font_size, line_height);
        VerticalMetrics {
            ascent,
            descent: line_height - ascent,
        }
    }

    fn place_inline_children(&mut self, parent: RenderId, walk: &mut InlineWalk) {
        for child in self.child_ids(parent) {
            let obj = &self.objects[child];
            if obj.is_out_of_flow_positioned() {
                let position = walk.lines.static_position();
                self.register_out_of_flow_child(child, position);
            } else if obj.is_floating() {
                let y = walk.lines.top;
                self.place_float(walk.block, child, y, &mut walk.floats, walk.relayout_children);
            } else if obj.is_text() {
                self.place_text(child, &mut walk.lines);
                walk.visited.push(child);
            } else if obj.is_render_inline() {
                self.place_inline_box(child, walk);
            } else if obj.is_box() {
                self.place_atomic_inline(child, walk);
            }
        }
    }

    fn place_text(&self, id: RenderId, lines: &mut LineBuilder) {
        let obj = &self.objects[id];
        let Some(data) = obj.text() else {
            return;
        };
        let style = &obj.style;
        let metrics = self.strut_metrics(style);
        let font = self.font_metrics.as_ref();
        let white_space = style.white_space;
        let wrap = white_space.auto_wrap();
        let collapse = !matches!(white_space, WhiteSpace::Pre | WhiteSpace::PreWrap);
        let text = data.text.as_str();
        let piece = |start: usize, end: usize| ItemKind::Text { text: id, start, end };

        for segment in segments(text, white_space.preserves_newlines()) {
            match segment {
                Segment::Newline => lines.finish_line(true),
                Segment::Space(start, end) if collapse => {
                    lines.add_collapsible_space(piece(start, end), font.text_width(" ", style.font_size), metrics);
                }
                Segment::Space(start, end) => {
                    let width = font.text_width(&text[start..end], style.font_size);
                    lines.add_preserved_space(piece(start, end), width, metrics);
                }
                Segment::Word(start, end) => {
                    let width = font.text_width(&text[start..end], style.font_size);
                    lines.add_unbreakable(piece(start, end), width, metrics, wrap);
                }
            }
        }
    }

    /// [§ 8.1 Box dimensions](https://www.w3.org/TR/CSS2/box.html#box-dimensions)
    ///
    /// The start side of a split inline belongs to its first piece and the
    /// end side to its last.
    fn place_inline_box(&mut self, inline: RenderId, walk: &mut InlineWalk) {
        self.update_always_create_line_boxes(inline, true);
        let materialized = self.always_create_line_boxes(inline);
        let first = self.continuation_predecessor(inline).is_none();
        let obj = &self.objects[inline];
        let last = obj.continuation().is_none();
        let style = obj.style_rc();
        let borders = style.border_widths();

        if first {
            walk.lines.add_gap(style.margin.left);
        }
        if materialized {
            walk.lines.open_inline(OpenInline {
                id: inline,
                metrics: self.strut_metrics(&style),
                top_edge: borders.top + style.padding.top,
                bottom_edge: borders.bottom + style.padding.bottom,
            });
        }
        let start = if first { borders.left + style.padding.left } else { 0.0 };
        walk.lines.add_edge(inline, start, true);
        walk.visited.push(inline);

        self.place_inline_children(inline, walk);

        let end = if last { borders.right + style.padding.right } else { 0.0 };
        walk.lines.add_edge(inline, end, false);
        if materialized {
            walk.lines.close_inline(inline);
        }
        if last {
            walk.lines.add_gap(style.margin.right);
        }
    }

    /// [§ 10.8.1](https://www.w3.org/TR/CSS2/visudet.html#leading)
    ///
    /// "The height of the inline box encloses all glyphs and their
    /// half-leading ... For replaced elements, inline-block elements, and
    /// inline-table elements, the height of the inline box is the margin
    /// box."
    fn place_atomic_inline(&mut self, atomic: RenderId, walk: &mut InlineWalk) {
        if walk.relayout_children {
            self.set_needs_layout(atomic, MarkingBehavior::MarkOnlyThis);
        }
        if self.objects[atomic].needs_layout() {
            self.layout_object(atomic);
        }
        let obj = &self.objects[atomic];
        let margins = obj.style.margin;
        let size = obj.size();
        let margin_box = LayoutSize::new(size.width + margins.horizontal(), size.height + margins.vertical());
        let wrap = obj
            .parent
            .is_none_or(|parent| self.objects[parent].style.white_space.auto_wrap());
        let kind = ItemKind::Atomic {
            id: atomic,
            margin_left: margins.left,
            margin_top: margins.top,
        };
        let metrics = VerticalMetrics {
            ascent: margin_box.height,
            descent: 0.0,
        };
        walk.lines.add_unbreakable(kind, margin_box.width, metrics, wrap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> VerticalMetrics {
        VerticalMetrics {
            ascent: 8.0,
            descent: 2.0,
        }
    }

    #[test]
    fn test_segments_split_words_and_spaces() {
        assert_eq!(
            segments("ab  c", false),
            vec![Segment::Word(0, 2), Segment::Space(2, 4), Segment::Word(4, 5)]
        );
    }

    #[test]
    fn test_segments_keep_newlines_when_preserved() {
        assert_eq!(
            segments("a\nb", true),
            vec![Segment::Word(0, 1), Segment::Newline, Segment::Word(2, 3)]
        );
        assert_eq!(
            segments("a\nb", false),
            vec![Segment::Word(0, 1), Segment::Space(1, 2), Segment::Word(2, 3)]
        );
    }

    #[test]
    fn test_words_wrap_and_trailing_space_is_dropped() {
        // Any live id will do as the owner of the pieces.
        let text = RenderTree::new(LayoutSize::new(100.0, 100.0)).view();
        let mut lines = LineBuilder::new(0.0, 0.0, 25.0, metrics());
        let piece = |start, end| ItemKind::Text { text, start, end };
        lines.add_unbreakable(piece(0, 2), 10.0, metrics(), true);
        lines.add_collapsible_space(piece(2, 3), 5.0, metrics());
        lines.add_unbreakable(piece(3, 5), 10.0, metrics(), true);
        lines.add_collapsible_space(piece(5, 6), 5.0, metrics());
        lines.add_unbreakable(piece(6, 8), 10.0, metrics(), true);
        lines.finish_line(false);

        assert_eq!(lines.lines.len(), 2);
        assert_eq!(lines.lines[1].rect.min_y(), 10.0);
        let boxes = &lines.text_boxes[&text];
        // "ab cd" on the first line as one merged box, "ef" on the second.
        assert_eq!(boxes[0].start, 0);
        assert_eq!(boxes[0].len, 5);
        assert_eq!(boxes[0].rect.width(), 25.0);
        assert_eq!(boxes[1].line, 1);
        assert_eq!(boxes[1].rect.min_x(), 0.0);
    }

    #[test]
    fn test_forced_break_makes_empty_line() {
        let mut lines = LineBuilder::new(0.0, 0.0, 100.0, metrics());
        lines.finish_line(true);
        lines.finish_line(false);
        assert_eq!(lines.lines.len(), 1);
        assert_eq!(lines.top, 10.0);
    }
}
