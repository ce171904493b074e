//! Computed style as seen by the render tree.
//!
//! Style resolution happens elsewhere; a [`RenderStyle`] arrives fully
//! computed. The render tree only reads named properties, compares two styles
//! to classify a change ([`RenderStyle::diff`]), and derives anonymous
//! wrapper styles.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;

use crate::geometry::{LayoutOffset, LayoutSize, LayoutTransform};

// ========== Values ==========

/// A length that may depend on its container.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "LengthRepr", into = "LengthRepr")]
pub enum Length {
    /// Determined by layout.
    #[default]
    Auto,
    /// Absolute pixels.
    Fixed(f32),
    /// Percentage of a reference length.
    Percent(f32),
}

impl Length {
    /// Resolve against `reference`, returning `None` for `auto`.
    #[must_use]
    pub fn resolve(self, reference: f32) -> Option<f32> {
        match self {
            Self::Auto => None,
            Self::Fixed(v) => Some(v),
            Self::Percent(p) => Some(reference * p / 100.0),
        }
    }

    /// Resolve with `auto` as zero.
    #[must_use]
    pub fn resolve_or_zero(self, reference: f32) -> f32 {
        self.resolve(reference).unwrap_or(0.0)
    }

    /// Whether the value is `auto`.
    #[must_use]
    pub const fn is_auto(self) -> bool {
        matches!(self, Self::Auto)
    }

    /// Whether the value is a percentage.
    #[must_use]
    pub const fn is_percent(self) -> bool {
        matches!(self, Self::Percent(_))
    }

    /// Whether two lengths use the same unit, regardless of value.
    #[must_use]
    pub const fn same_type(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Auto, Self::Auto) | (Self::Fixed(_), Self::Fixed(_)) | (Self::Percent(_), Self::Percent(_))
        )
    }
}

/// Wire form of [`Length`]: a number of pixels, `"auto"`, `"12px"` or `"50%"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LengthRepr {
    Number(f32),
    Text(String),
}

impl TryFrom<LengthRepr> for Length {
    type Error = String;

    fn try_from(repr: LengthRepr) -> Result<Self, Self::Error> {
        match repr {
            LengthRepr::Number(v) => Ok(Self::Fixed(v)),
            LengthRepr::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("auto") {
                    return Ok(Self::Auto);
                }
                if let Some(p) = s.strip_suffix('%') {
                    return p.trim().parse().map(Self::Percent).map_err(|_| format!("bad percentage '{s}'"));
                }
                let number = s.strip_suffix("px").unwrap_or(s);
                number.trim().parse().map(Self::Fixed).map_err(|_| format!("bad length '{s}'"))
            }
        }
    }
}

impl From<Length> for LengthRepr {
    fn from(length: Length) -> Self {
        match length {
            Length::Auto => Self::Text("auto".to_string()),
            Length::Fixed(v) => Self::Number(v),
            Length::Percent(p) => Self::Text(format!("{p}%")),
        }
    }
}

/// Four edges of a box, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSizes {
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
    /// Left edge.
    pub left: f32,
}

impl EdgeSizes {
    /// The same value on every edge.
    #[must_use]
    pub const fn uniform(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    /// Left plus right.
    #[must_use]
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    /// Top plus bottom.
    #[must_use]
    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    /// Whether any edge is non-zero.
    #[must_use]
    pub fn is_nonzero(&self) -> bool {
        self.top != 0.0 || self.right != 0.0 || self.bottom != 0.0 || self.left != 0.0
    }
}

/// Offsets of a positioned box (`top`/`right`/`bottom`/`left`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxOffsets {
    /// `top`
    pub top: Length,
    /// `right`
    pub right: Length,
    /// `bottom`
    pub bottom: Length,
    /// `left`
    pub left: Length,
}

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha; zero is fully transparent.
    pub a: u8,
}

impl Color {
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    /// Build from components.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Whether anything would be drawn.
    #[must_use]
    pub const fn is_visible(self) -> bool {
        self.a != 0
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "transparent" => return Ok(Self::TRANSPARENT),
            "black" => return Ok(Self::BLACK),
            "white" => return Ok(Self::WHITE),
            "red" => return Ok(Self::rgba(255, 0, 0, 255)),
            "green" => return Ok(Self::rgba(0, 128, 0, 255)),
            "blue" => return Ok(Self::rgba(0, 0, 255, 255)),
            _ => {}
        }
        let hex = s
            .strip_prefix('#')
            .filter(|h| h.is_ascii())
            .ok_or_else(|| format!("unsupported color '{s}'"))?;
        let digit = |i: usize| {
            u8::from_str_radix(&hex[i..=i], 16).map_err(|_| format!("bad hex color '{s}'"))
        };
        let pair = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("bad hex color '{s}'"))
        };
        match hex.len() {
            3 => Ok(Self::rgba(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17, 255)),
            6 => Ok(Self::rgba(pair(0)?, pair(2)?, pair(4)?, 255)),
            8 => Ok(Self::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => Err(format!("bad hex color '{s}'")),
        }
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

// ========== Keywords ==========

/// `display`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, StrumDisplay, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Display {
    /// `inline`
    #[default]
    Inline,
    /// `block`
    Block,
    /// `inline-block`
    InlineBlock,
    /// `list-item`
    ListItem,
    /// `table`
    Table,
    /// `inline-table`
    InlineTable,
    /// `table-row-group`
    TableRowGroup,
    /// `table-header-group`
    TableHeaderGroup,
    /// `table-footer-group`
    TableFooterGroup,
    /// `table-row`
    TableRow,
    /// `table-column-group`
    TableColumnGroup,
    /// `table-column`
    TableColumn,
    /// `table-cell`
    TableCell,
    /// `table-caption`
    TableCaption,
    /// `none`
    None,
}

impl Display {
    /// Inline-level display types.
    #[must_use]
    pub const fn is_inline_type(self) -> bool {
        matches!(self, Self::Inline | Self::InlineBlock | Self::InlineTable)
    }
}

/// `position`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, StrumDisplay, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Position {
    /// `static`
    #[default]
    Static,
    /// `relative`
    Relative,
    /// `absolute`
    Absolute,
    /// `fixed`
    Fixed,
}

/// `float`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Float {
    /// `none`
    #[default]
    None,
    /// `left`
    Left,
    /// `right`
    Right,
}

/// `overflow`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Overflow {
    /// `visible`
    #[default]
    Visible,
    /// `hidden`
    Hidden,
    /// `scroll`
    Scroll,
    /// `auto`
    Auto,
}

/// `visibility`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    /// `visible`
    #[default]
    Visible,
    /// `hidden`
    Hidden,
    /// `collapse`
    Collapse,
}

/// `white-space`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhiteSpace {
    /// `normal`
    #[default]
    Normal,
    /// `pre`
    Pre,
    /// `nowrap`
    Nowrap,
    /// `pre-wrap`
    PreWrap,
    /// `pre-line`
    PreLine,
}

impl WhiteSpace {
    /// Whether lines may wrap at spaces.
    #[must_use]
    pub const fn auto_wrap(self) -> bool {
        !matches!(self, Self::Pre | Self::Nowrap)
    }

    /// Whether newlines in the text force a break.
    #[must_use]
    pub const fn preserves_newlines(self) -> bool {
        matches!(self, Self::Pre | Self::PreWrap | Self::PreLine)
    }
}

/// `vertical-align`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerticalAlign {
    /// `baseline`
    #[default]
    Baseline,
    /// `top`
    Top,
    /// `middle`
    Middle,
    /// `bottom`
    Bottom,
    /// `sub`
    Sub,
    /// `super`
    Super,
}

/// `background-attachment`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundAttachment {
    /// `scroll`
    #[default]
    Scroll,
    /// `fixed`
    Fixed,
    /// `local`
    Local,
}

/// `transform-style`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformStyle {
    /// `flat`
    #[default]
    Flat,
    /// `preserve-3d`
    Preserve3d,
}

/// Border or outline line style; `none` gives the edge no width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BorderStyle {
    /// `none`
    #[default]
    None,
    /// `solid`
    Solid,
    /// `dashed`
    Dashed,
    /// `dotted`
    Dotted,
}

// ========== Compound properties ==========

/// Background layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Background {
    /// `background-color`
    pub color: Color,
    /// `background-image`, as an opaque reference.
    pub image: Option<String>,
    /// `background-attachment`
    pub attachment: BackgroundAttachment,
}

/// `outline-*`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Outline {
    /// `outline-width`
    pub width: f32,
    /// `outline-offset`
    pub offset: f32,
    /// `outline-style`
    pub style: BorderStyle,
    /// `outline-color`
    pub color: Color,
}

/// One `box-shadow` entry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxShadow {
    /// Horizontal offset.
    pub x: f32,
    /// Vertical offset.
    pub y: f32,
    /// Blur radius.
    pub blur: f32,
    /// Spread distance.
    pub spread: f32,
    /// Drawn inside the border box.
    pub inset: bool,
    /// Shadow color.
    pub color: Color,
}

/// One `transform` function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOperation {
    /// `translate(x, y)`
    Translate(f32, f32),
    /// `scale(x, y)`
    Scale(f32, f32),
    /// `rotate(deg)`
    Rotate(f32),
    /// `matrix(a, b, c, d, e, f)`
    Matrix([f32; 6]),
}

/// One `filter` function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperation {
    /// `blur(px)`
    Blur(f32),
    /// `grayscale(amount)`
    Grayscale(f32),
    /// `brightness(amount)`
    Brightness(f32),
    /// `opacity(amount)`
    Opacity(f32),
}

// ========== RenderStyle ==========

/// Computed style of one render object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// `display`
    pub display: Display,
    /// Display before blockification of floats and out-of-flow boxes.
    pub original_display: Option<Display>,
    /// `position`
    pub position: Position,
    /// `float`
    pub float: Float,
    /// Inset properties.
    pub offsets: BoxOffsets,
    /// `width`
    pub width: Length,
    /// `height`
    pub height: Length,
    /// `margin-*`
    pub margin: EdgeSizes,
    /// `padding-*`
    pub padding: EdgeSizes,
    /// `border-*-width`
    pub border: EdgeSizes,
    /// `border-style`
    pub border_style: BorderStyle,
    /// `border-color`
    pub border_color: Color,
    /// `border-radius`, one value for every corner.
    pub border_radius: f32,
    /// `overflow`
    pub overflow: Overflow,
    /// `visibility`
    pub visibility: Visibility,
    /// `z-index`; `None` is `auto`.
    pub z_index: Option<i32>,
    /// `opacity`
    pub opacity: f32,
    /// `transform`
    pub transform: Vec<TransformOperation>,
    /// `transform-origin` as percentages of the border box.
    pub transform_origin: (Length, Length),
    /// `transform-style`
    pub transform_style: TransformStyle,
    /// `filter`
    pub filter: Vec<FilterOperation>,
    /// `will-change: transform`, a hint that the box should composite.
    pub will_change_transform: bool,
    /// Background.
    pub background: Background,
    /// Outline.
    pub outline: Outline,
    /// `box-shadow`
    pub box_shadow: Vec<BoxShadow>,
    /// `color`
    pub color: Color,
    /// `font-size` in pixels.
    pub font_size: f32,
    /// `line-height` in pixels; `None` is `normal`.
    pub line_height: Option<f32>,
    /// `white-space`
    pub white_space: WhiteSpace,
    /// `vertical-align`
    pub vertical_align: VerticalAlign,
    /// `column-count`
    pub column_count: Option<u32>,
    /// `column-gap`
    pub column_gap: f32,
    /// `flow-into`
    pub flow_into: Option<String>,
    /// `flow-from`
    pub flow_from: Option<String>,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            display: Display::Inline,
            original_display: None,
            position: Position::Static,
            float: Float::None,
            offsets: BoxOffsets::default(),
            width: Length::Auto,
            height: Length::Auto,
            margin: EdgeSizes::default(),
            padding: EdgeSizes::default(),
            border: EdgeSizes::default(),
            border_style: BorderStyle::None,
            border_color: Color::BLACK,
            border_radius: 0.0,
            overflow: Overflow::Visible,
            visibility: Visibility::Visible,
            z_index: None,
            opacity: 1.0,
            transform: Vec::new(),
            transform_origin: (Length::Percent(50.0), Length::Percent(50.0)),
            transform_style: TransformStyle::Flat,
            filter: Vec::new(),
            will_change_transform: false,
            background: Background::default(),
            outline: Outline::default(),
            box_shadow: Vec::new(),
            color: Color::BLACK,
            font_size: 16.0,
            line_height: None,
            white_space: WhiteSpace::Normal,
            vertical_align: VerticalAlign::Baseline,
            column_count: None,
            column_gap: 16.0,
            flow_into: None,
            flow_from: None,
        }
    }
}

impl RenderStyle {
    /// Default style with `display: block`.
    #[must_use]
    pub fn block() -> Self {
        Self {
            display: Display::Block,
            ..Self::default()
        }
    }

    /// Style for an anonymous wrapper: inherited properties from `parent`,
    /// everything else initial, and the given `display`.
    #[must_use]
    pub fn create_anonymous_style_with_display(parent: &Self, display: Display) -> Self {
        Self {
            display,
            visibility: parent.visibility,
            color: parent.color,
            font_size: parent.font_size,
            line_height: parent.line_height,
            white_space: parent.white_space,
            ..Self::default()
        }
    }

    /// Display type before blockification.
    #[must_use]
    pub fn original_display(&self) -> Display {
        self.original_display.unwrap_or(self.display)
    }

    /// Whether the box participates in an inline formatting context.
    #[must_use]
    pub const fn is_display_inline_type(&self) -> bool {
        self.display.is_inline_type()
    }

    /// Whether the box was inline-level before blockification.
    #[must_use]
    pub fn is_original_display_inline_type(&self) -> bool {
        self.original_display().is_inline_type()
    }

    /// `float` is not `none`.
    #[must_use]
    pub fn is_floating(&self) -> bool {
        self.float != Float::None
    }

    /// `position` is `absolute` or `fixed`.
    #[must_use]
    pub const fn has_out_of_flow_position(&self) -> bool {
        matches!(self.position, Position::Absolute | Position::Fixed)
    }

    /// `position` is `relative`.
    #[must_use]
    pub const fn has_in_flow_position(&self) -> bool {
        matches!(self.position, Position::Relative)
    }

    /// `position: fixed`, the only viewport-constrained scheme here.
    #[must_use]
    pub const fn has_viewport_constrained_position(&self) -> bool {
        matches!(self.position, Position::Fixed)
    }

    /// Whether `left` and `right` are both `auto`.
    #[must_use]
    pub const fn has_static_inline_position(&self) -> bool {
        self.offsets.left.is_auto() && self.offsets.right.is_auto()
    }

    /// Whether `top` and `bottom` are both `auto`.
    #[must_use]
    pub const fn has_static_block_position(&self) -> bool {
        self.offsets.top.is_auto() && self.offsets.bottom.is_auto()
    }

    /// Whether `z-index` is `auto`.
    #[must_use]
    pub const fn has_auto_z_index(&self) -> bool {
        self.z_index.is_none()
    }

    /// `transform` is not `none`.
    #[must_use]
    pub fn has_transform(&self) -> bool {
        !self.transform.is_empty()
    }

    /// Any property that makes the box a transform container.
    #[must_use]
    pub fn has_transform_related_property(&self) -> bool {
        self.has_transform() || self.transform_style == TransformStyle::Preserve3d
    }

    /// `filter` is not `none`.
    #[must_use]
    pub fn has_filter(&self) -> bool {
        !self.filter.is_empty()
    }

    /// `opacity` below one.
    #[must_use]
    pub fn has_opacity(&self) -> bool {
        self.opacity < 1.0
    }

    /// Whether `overflow` clips.
    #[must_use]
    pub fn has_overflow_clip(&self) -> bool {
        self.overflow != Overflow::Visible
    }

    /// `visibility: visible`
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    /// Whether more than one column is requested.
    #[must_use]
    pub fn specifies_columns(&self) -> bool {
        self.column_count.is_some_and(|c| c > 1)
    }

    /// Used border widths; `border-style: none` means zero.
    #[must_use]
    pub fn border_widths(&self) -> EdgeSizes {
        if self.border_style == BorderStyle::None {
            EdgeSizes::default()
        } else {
            self.border
        }
    }

    /// Whether any border edge is drawn.
    #[must_use]
    pub fn has_border(&self) -> bool {
        self.border_widths().is_nonzero()
    }

    /// Background color or image present.
    #[must_use]
    pub fn has_background(&self) -> bool {
        self.background.color.is_visible() || self.background.image.is_some()
    }

    /// Background image present.
    #[must_use]
    pub const fn has_background_image(&self) -> bool {
        self.background.image.is_some()
    }

    /// Background image attached to the viewport, which forces slow scrolling.
    #[must_use]
    pub fn has_fixed_background_image(&self) -> bool {
        self.background.image.is_some() && self.background.attachment == BackgroundAttachment::Fixed
    }

    /// Non-zero padding on any edge.
    #[must_use]
    pub fn has_padding(&self) -> bool {
        self.padding.is_nonzero()
    }

    /// Non-zero margin on any edge.
    #[must_use]
    pub fn has_margin(&self) -> bool {
        self.margin.is_nonzero()
    }

    /// Used outline width; zero when the style is `none`.
    #[must_use]
    pub fn outline_width(&self) -> f32 {
        if self.outline.style == BorderStyle::None {
            0.0
        } else {
            self.outline.width
        }
    }

    /// How far the outline extends beyond the border box.
    #[must_use]
    pub fn outline_size(&self) -> f32 {
        (self.outline_width() + self.outline.offset).max(0.0)
    }

    /// Whether an outline is painted.
    #[must_use]
    pub fn has_outline(&self) -> bool {
        self.outline_width() > 0.0
    }

    /// Resolved `line-height`.
    #[must_use]
    pub fn computed_line_height(&self) -> f32 {
        self.line_height.unwrap_or(self.font_size * 1.2)
    }

    /// Extent of outset shadows beyond the border box on each side.
    #[must_use]
    pub fn box_shadow_extent(&self) -> EdgeSizes {
        let mut extent = EdgeSizes::default();
        for shadow in self.box_shadow.iter().filter(|s| !s.inset) {
            let reach = shadow.blur + shadow.spread;
            extent.top = extent.top.max(reach - shadow.y);
            extent.bottom = extent.bottom.max(reach + shadow.y);
            extent.left = extent.left.max(reach - shadow.x);
            extent.right = extent.right.max(reach + shadow.x);
        }
        extent
    }

    /// The composed transform for a border box of `size`, around the
    /// transform origin.
    #[must_use]
    pub fn transform_for_size(&self, size: LayoutSize) -> LayoutTransform {
        let origin = LayoutOffset::new(
            self.transform_origin.0.resolve_or_zero(size.width),
            self.transform_origin.1.resolve_or_zero(size.height),
        );
        // Row-vector composition: the operation listed last applies first.
        let mut composed = LayoutTransform::identity();
        for operation in self.transform.iter().rev() {
            let step = match *operation {
                TransformOperation::Translate(x, y) => LayoutTransform::translation(x, y, 0.0),
                TransformOperation::Scale(x, y) => LayoutTransform::scale(x, y, 1.0),
                TransformOperation::Rotate(degrees) => {
                    LayoutTransform::rotation(0.0, 0.0, 1.0, euclid::Angle::degrees(degrees))
                }
                TransformOperation::Matrix([a, b, c, d, e, f]) => {
                    LayoutTransform::new(
                        a, b, 0.0, 0.0, //
                        c, d, 0.0, 0.0, //
                        0.0, 0.0, 1.0, 0.0, //
                        e, f, 0.0, 1.0,
                    )
                }
            };
            composed = composed.then(&step);
        }
        LayoutTransform::translation(-origin.x, -origin.y, 0.0)
            .then(&composed)
            .then_translate(euclid::vec3(origin.x, origin.y, 0.0))
    }

    /// Classify the change from `self` to `other`.
    ///
    /// Properties that a composited layer can absorb (transform, opacity,
    /// filter) are reported in the returned flags instead of forcing a
    /// stronger difference; the renderer escalates them if it is not
    /// composited.
    #[must_use]
    pub fn diff(&self, other: &Self) -> (StyleDifference, ContextSensitiveProperties) {
        let mut changed = ContextSensitiveProperties::empty();

        if self.transform != other.transform || self.transform_origin != other.transform_origin {
            changed |= ContextSensitiveProperties::TRANSFORM;
        }
        if self.opacity != other.opacity {
            changed |= ContextSensitiveProperties::OPACITY;
        }
        if self.filter != other.filter {
            changed |= ContextSensitiveProperties::FILTER;
        }

        if self.change_requires_layout(other) {
            return (StyleDifference::Layout, changed);
        }
        if self.change_requires_positioned_layout_only(other) {
            return (StyleDifference::LayoutPositionedMovementOnly, changed);
        }
        if self.change_requires_layer_repaint(other) {
            return (StyleDifference::RepaintLayer, changed);
        }
        if self.change_requires_repaint(other) {
            return (StyleDifference::Repaint, changed);
        }
        if self.transform_style != other.transform_style
            || self.will_change_transform != other.will_change_transform
            || !changed.is_empty()
        {
            return (StyleDifference::RecompositeLayer, changed);
        }
        if self.color != other.color {
            return (StyleDifference::RepaintIfText, changed);
        }
        (StyleDifference::Equal, changed)
    }

    fn change_requires_layout(&self, other: &Self) -> bool {
        if self.width != other.width
            || self.height != other.height
            || self.margin != other.margin
            || self.padding != other.padding
            || self.border_widths() != other.border_widths()
        {
            return true;
        }
        if self.display != other.display
            || self.original_display != other.original_display
            || self.float != other.float
            || self.overflow != other.overflow
            || self.position != other.position
        {
            return true;
        }
        if self.font_size != other.font_size
            || self.line_height != other.line_height
            || self.white_space != other.white_space
            || self.vertical_align != other.vertical_align
        {
            return true;
        }
        if self.column_count != other.column_count || self.column_gap != other.column_gap {
            return true;
        }
        if self.flow_into != other.flow_into || self.flow_from != other.flow_from {
            return true;
        }
        // Shadows change overflow.
        if self.box_shadow != other.box_shadow {
            return true;
        }
        if self.position != Position::Static && self.offsets != other.offsets {
            // A positioned box that only moves is handled by the positioned
            // movement check; relative offsets and resizing moves need layout.
            let movement_only = self.has_out_of_flow_position()
                && positioned_object_moved_only(&self.offsets, &other.offsets, self.width);
            if !movement_only {
                return true;
            }
        }
        false
    }

    /// Whether the change from `other` needs a repaint beyond any layout.
    #[must_use]
    pub fn diff_requires_repaint(&self, other: &Self) -> bool {
        self.change_requires_layer_repaint(other) || self.change_requires_repaint(other)
    }

    fn change_requires_positioned_layout_only(&self, other: &Self) -> bool {
        self.position != Position::Static && self.offsets != other.offsets
    }

    fn change_requires_layer_repaint(&self, other: &Self) -> bool {
        self.z_index != other.z_index || self.visibility != other.visibility
    }

    fn change_requires_repaint(&self, other: &Self) -> bool {
        self.background != other.background
            || self.border_color != other.border_color
            || self.border_style != other.border_style
            || self.border_radius != other.border_radius
            || self.outline != other.outline
    }
}

/// Whether changing the insets from `a` to `b` only moves a box of the given
/// `width` without resizing it.
fn positioned_object_moved_only(a: &BoxOffsets, b: &BoxOffsets, width: Length) -> bool {
    // Unit changes may resize.
    if !a.left.same_type(b.left)
        || !a.right.same_type(b.right)
        || !a.top.same_type(b.top)
        || !a.bottom.same_type(b.bottom)
    {
        return false;
    }
    // With both insets set on an axis the box stretches between them.
    if !a.left.is_auto() && !a.right.is_auto() {
        return false;
    }
    if !a.top.is_auto() && !a.bottom.is_auto() {
        return false;
    }
    // An auto width shrinks to fit against the inset.
    if (!a.left.is_auto() || !a.right.is_auto()) && width.is_auto() {
        return false;
    }
    true
}

/// Severity of a style change, ordered from least to most work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, StrumDisplay, Serialize)]
pub enum StyleDifference {
    /// Nothing visible changed.
    #[default]
    Equal,
    /// Only the composited layer needs updating.
    RecompositeLayer,
    /// Repaint if the object is text.
    RepaintIfText,
    /// Repaint the object.
    Repaint,
    /// Repaint the object's layer and its descendants.
    RepaintLayer,
    /// A positioned box moved without resizing.
    LayoutPositionedMovementOnly,
    /// Overflow must be recomputed without laying out children.
    SimplifiedLayout,
    /// Both of the above.
    SimplifiedLayoutAndPositionedMovement,
    /// Full layout.
    Layout,
}

bitflags! {
    /// Properties whose cost depends on whether the layer is composited.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContextSensitiveProperties: u8 {
        /// `transform` or `transform-origin`
        const TRANSFORM = 1 << 0;
        /// `opacity`
        const OPACITY = 1 << 1;
        /// `filter`
        const FILTER = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LayoutPoint, TransformExt};

    #[test]
    fn test_length_from_json() {
        let lengths: Vec<Length> = serde_json::from_str(r#"[12, "auto", "50%", "7px"]"#).unwrap();
        assert_eq!(
            lengths,
            vec![Length::Fixed(12.0), Length::Auto, Length::Percent(50.0), Length::Fixed(7.0)]
        );
    }

    #[test]
    fn test_color_from_hex() {
        let c: Color = serde_json::from_str(r##""#f80""##).unwrap();
        assert_eq!(c, Color::rgba(255, 136, 0, 255));
    }

    #[test]
    fn test_outline_size_ignores_style_none() {
        let mut style = RenderStyle::block();
        style.outline.width = 3.0;
        assert_eq!(style.outline_size(), 0.0);
        style.outline.style = BorderStyle::Solid;
        style.outline.offset = 2.0;
        assert_eq!(style.outline_size(), 5.0);
    }

    fn positioned(width: Length) -> RenderStyle {
        RenderStyle {
            position: Position::Absolute,
            width,
            offsets: BoxOffsets {
                left: Length::Fixed(10.0),
                top: Length::Fixed(10.0),
                ..BoxOffsets::default()
            },
            ..RenderStyle::block()
        }
    }

    #[test]
    fn test_style_difference_is_ordered_by_cost() {
        let lattice = [
            StyleDifference::Equal,
            StyleDifference::RecompositeLayer,
            StyleDifference::RepaintIfText,
            StyleDifference::Repaint,
            StyleDifference::RepaintLayer,
            StyleDifference::LayoutPositionedMovementOnly,
            StyleDifference::SimplifiedLayout,
            StyleDifference::SimplifiedLayoutAndPositionedMovement,
            StyleDifference::Layout,
        ];
        assert!(lattice.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_diff_classifies_each_severity() {
        let base = RenderStyle::block();
        assert_eq!(base.diff(&base.clone()), (StyleDifference::Equal, ContextSensitiveProperties::empty()));

        let recolored = RenderStyle {
            color: Color::WHITE,
            ..base.clone()
        };
        assert_eq!(base.diff(&recolored).0, StyleDifference::RepaintIfText);

        let mut background = base.clone();
        background.background.color = Color::WHITE;
        assert_eq!(base.diff(&background).0, StyleDifference::Repaint);

        let hidden = RenderStyle {
            visibility: Visibility::Hidden,
            ..base.clone()
        };
        assert_eq!(base.diff(&hidden).0, StyleDifference::RepaintLayer);

        let wider = RenderStyle {
            width: Length::Fixed(10.0),
            ..base.clone()
        };
        assert_eq!(base.diff(&wider).0, StyleDifference::Layout);

        let will_change = RenderStyle {
            will_change_transform: true,
            ..base
        };
        assert_eq!(RenderStyle::block().diff(&will_change).0, StyleDifference::RecompositeLayer);
    }

    #[test]
    fn test_diff_reports_context_sensitive_properties() {
        let base = RenderStyle::block();
        let faded = RenderStyle {
            opacity: 0.5,
            ..base.clone()
        };
        assert_eq!(
            base.diff(&faded),
            (StyleDifference::RecompositeLayer, ContextSensitiveProperties::OPACITY)
        );

        // A stronger change still reports the transform.
        let mut moved = RenderStyle {
            transform: vec![TransformOperation::Translate(5.0, 0.0)],
            ..base.clone()
        };
        moved.background.color = Color::WHITE;
        assert_eq!(base.diff(&moved), (StyleDifference::Repaint, ContextSensitiveProperties::TRANSFORM));
    }

    #[test]
    fn test_moving_a_sized_positioned_box_is_movement_only() {
        let before = positioned(Length::Fixed(50.0));
        let mut after = before.clone();
        after.offsets.left = Length::Fixed(30.0);
        assert_eq!(before.diff(&after).0, StyleDifference::LayoutPositionedMovementOnly);

        // A shrink-to-fit width depends on the inset.
        let before = positioned(Length::Auto);
        let mut after = before.clone();
        after.offsets.left = Length::Fixed(30.0);
        assert_eq!(before.diff(&after).0, StyleDifference::Layout);

        // So does switching units.
        let before = positioned(Length::Fixed(50.0));
        let mut after = before.clone();
        after.offsets.left = Length::Percent(10.0);
        assert_eq!(before.diff(&after).0, StyleDifference::Layout);
    }

    #[test]
    fn test_transform_origin_is_centre() {
        let mut style = RenderStyle::block();
        style.transform = vec![TransformOperation::Scale(2.0, 2.0)];
        let t = style.transform_for_size(LayoutSize::new(100.0, 50.0));
        assert_eq!(t.map_point(LayoutPoint::new(50.0, 25.0)), LayoutPoint::new(50.0, 25.0));
        assert_eq!(t.map_point(LayoutPoint::new(0.0, 0.0)), LayoutPoint::new(-50.0, -25.0));
    }
}
