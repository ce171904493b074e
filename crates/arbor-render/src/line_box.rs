//! Line boxes produced by inline layout.
//!
//! All line-box rectangles are stored in the coordinate space of the block
//! that owns the lines. Inlines and text have no location of their own; their
//! geometry is read off these boxes.

use serde::Serialize;

use crate::geometry::LayoutRect;

/// Font measurements used by line layout.
///
/// [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
pub trait FontMetrics {
    /// Advance width of `text` at `font_size`.
    fn text_width(&self, text: &str, font_size: f32) -> f32;

    /// Used value of `line-height: normal`.
    ///
    /// [§ 10.8.1 Leading and half-leading](https://www.w3.org/TR/CSS2/visudet.html#leading)
    ///
    /// "We recommend a used value for 'normal' between 1.0 and 1.2."
    fn line_height(&self, font_size: f32) -> f32;

    /// Distance from the top of a line-height box to its baseline.
    fn ascent(&self, font_size: f32, line_height: f32) -> f32 {
        let _ = font_size;
        line_height * 0.8
    }
}

/// Fixed-ratio metrics: glyphs are 0.6em wide, lines 1.2em tall.
///
/// Without font data every glyph gets the same advance, which keeps layout
/// deterministic for tests and scenes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateFontMetrics;

impl FontMetrics for ApproximateFontMetrics {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        const CHAR_WIDTH_RATIO: f32 = 0.6;
        text.chars().count() as f32 * font_size * CHAR_WIDTH_RATIO
    }

    fn line_height(&self, font_size: f32) -> f32 {
        const LINE_HEIGHT_RATIO: f32 = 1.2;
        font_size * LINE_HEIGHT_RATIO
    }
}

/// One line of a block's inline content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RootLineBox {
    /// Full line rectangle: the block's content width by the line height.
    pub rect: LayoutRect,
    /// Baseline position, in the same space as `rect`.
    pub baseline: f32,
}

/// The part of an inline box that falls on one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InlineFlowBox {
    /// Index of the line in the containing block.
    pub line: usize,
    /// Border-box extent on that line.
    pub rect: LayoutRect,
    /// Whether this fragment carries the inline's start edge.
    pub includes_left_edge: bool,
    /// Whether this fragment carries the inline's end edge.
    pub includes_right_edge: bool,
}

/// A run of text placed on one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextBox {
    /// Index of the line in the containing block.
    pub line: usize,
    /// Extent of the run.
    pub rect: LayoutRect,
    /// Byte offset of the run in the text.
    pub start: usize,
    /// Byte length of the run.
    pub len: usize,
}

impl TextBox {
    /// Byte offset one past the run.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_metrics() {
        let metrics = ApproximateFontMetrics;
        assert_eq!(metrics.text_width("abcd", 10.0), 24.0);
        assert_eq!(metrics.line_height(10.0), 12.0);
        assert!((metrics.ascent(10.0, 12.0) - 9.6).abs() < 1e-5);
    }
}
