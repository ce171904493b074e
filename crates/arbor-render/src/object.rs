//! Render objects: one node of the render tree.
//!
//! The node kinds form a closed set ([`RenderKind`]). Behaviour that differs
//! per kind dispatches on the kind inside the [`RenderTree`](crate::RenderTree)
//! operations; this module only holds the data and the queries that need no
//! tree access.

use std::rc::Rc;

use arbor_dom::NodeId;
use bitflags::bitflags;
use serde::Serialize;
use strum_macros::Display;

use crate::arena::Id;
use crate::geometry::{LayoutOffset, LayoutPoint, LayoutRect, LayoutSize, rect};
use crate::layer::LayerId;
use crate::line_box::{InlineFlowBox, RootLineBox, TextBox};
use crate::style::{EdgeSizes, Position, RenderStyle};

/// Handle to a render object.
pub type RenderId = Id<RenderObject>;

bitflags! {
    /// Per-object state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFlags: u32 {
        /// The object itself must be laid out.
        const SELF_NEEDS_LAYOUT = 1 << 0;
        /// Some in-flow descendant must be laid out.
        const NORMAL_CHILD_NEEDS_LAYOUT = 1 << 1;
        /// Some positioned descendant must be laid out.
        const POS_CHILD_NEEDS_LAYOUT = 1 << 2;
        /// Only overflow needs recomputing.
        const NEEDS_SIMPLIFIED_NORMAL_FLOW_LAYOUT = 1 << 3;
        /// A positioned box moved without resizing.
        const NEEDS_POSITIONED_MOVEMENT_LAYOUT = 1 << 4;
        /// Cached min/max preferred widths are stale.
        const PREFERRED_WIDTHS_DIRTY = 1 << 5;
        /// `float` applies to this box.
        const FLOATING = 1 << 6;
        /// Generated by the tree, not by an element.
        const ANONYMOUS = 1 << 7;
        /// Inline-level.
        const INLINE = 1 << 8;
        /// Atomic: laid out as one unit inside a line.
        const REPLACED = 1 << 9;
        /// Clips its content to the padding box.
        const HAS_OVERFLOW_CLIP = 1 << 10;
        /// Carries a transform.
        const HAS_TRANSFORM = 1 << 11;
        /// Has completed at least one layout.
        const EVER_HAD_LAYOUT = 1 << 12;
        /// Block whose children are all inline-level.
        const CHILDREN_INLINE = 1 << 13;
        /// Paints background, border or shadow.
        const HAS_BOX_DECORATIONS = 1 << 14;
        /// Teardown in progress.
        const BEING_DESTROYED = 1 << 15;
    }
}

/// Selection participation of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize)]
pub enum SelectionState {
    /// Not selected.
    #[default]
    None,
    /// Contains the selection start.
    Start,
    /// Fully inside the selection.
    Inside,
    /// Contains the selection end.
    End,
    /// Contains both ends.
    Both,
}

/// Link from one piece of a split inline to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Continuation {
    /// The next piece is an inline clone.
    Inline(RenderId),
    /// The next piece is an anonymous block holding the block-level content.
    Block(RenderId),
}

impl Continuation {
    /// The object the link points at.
    #[must_use]
    pub const fn id(self) -> RenderId {
        match self {
            Self::Inline(id) | Self::Block(id) => id,
        }
    }
}

/// Layout of a multi-column block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnInfo {
    /// Number of columns.
    pub count: u32,
    /// Width of one column.
    pub width: f32,
    /// Gap between columns.
    pub gap: f32,
    /// Height of one column; content past it flows into the next column.
    pub height: f32,
}

/// Specialisations of a block container.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize)]
pub enum BlockFlavor {
    /// Ordinary block flow.
    Flow,
    /// `display: table`
    Table,
    /// Row group.
    TableSection,
    /// `display: table-row`
    TableRow,
    /// `display: table-cell`
    TableCell,
    /// `display: table-caption`
    TableCaption,
    /// Column or column group.
    TableColumn,
    /// Content of a named flow, laid out once and shown through regions.
    FlowThread(String),
    /// A box displaying part of a named flow.
    Region(String),
}

/// Block container state.
#[derive(Debug, Clone)]
pub struct BlockData {
    pub(crate) flavor: BlockFlavor,
    pub(crate) continuation: Option<Continuation>,
    pub(crate) line_boxes: Vec<RootLineBox>,
    pub(crate) line_boxes_dirty: bool,
    pub(crate) positioned_objects: Vec<RenderId>,
    pub(crate) floating_objects: Vec<RenderId>,
    pub(crate) columns: Option<ColumnInfo>,
    pub(crate) scroll_offset: LayoutOffset,
    pub(crate) override_width: Option<f32>,
    pub(crate) override_height: Option<f32>,
}

impl BlockData {
    pub(crate) const fn new(flavor: BlockFlavor) -> Self {
        Self {
            flavor,
            continuation: None,
            line_boxes: Vec::new(),
            line_boxes_dirty: false,
            positioned_objects: Vec::new(),
            floating_objects: Vec::new(),
            columns: None,
            scroll_offset: LayoutOffset::new(0.0, 0.0),
            override_width: None,
            override_height: None,
        }
    }

    /// Block specialisation.
    #[must_use]
    pub const fn flavor(&self) -> &BlockFlavor {
        &self.flavor
    }

    /// Lines from the last layout.
    #[must_use]
    pub fn line_boxes(&self) -> &[RootLineBox] {
        &self.line_boxes
    }

    /// Column geometry when the block is multi-column.
    #[must_use]
    pub const fn columns(&self) -> Option<ColumnInfo> {
        self.columns
    }

    /// Out-of-flow descendants this block lays out.
    #[must_use]
    pub fn positioned_objects(&self) -> &[RenderId] {
        &self.positioned_objects
    }
}

/// Inline box state.
#[derive(Debug, Clone, Default)]
pub struct InlineData {
    pub(crate) continuation: Option<Continuation>,
    pub(crate) line_boxes: Vec<InlineFlowBox>,
    pub(crate) always_create_line_boxes: bool,
}

impl InlineData {
    /// Materialised line boxes; empty while the inline is culled.
    #[must_use]
    pub fn line_boxes(&self) -> &[InlineFlowBox] {
        &self.line_boxes
    }

    /// Whether line boxes are materialised instead of derived from children.
    #[must_use]
    pub const fn always_create_line_boxes(&self) -> bool {
        self.always_create_line_boxes
    }
}

/// Text run state.
#[derive(Debug, Clone, Default)]
pub struct TextData {
    pub(crate) text: String,
    pub(crate) boxes: Vec<TextBox>,
}

impl TextData {
    /// Character data.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placed runs from the last layout.
    #[must_use]
    pub fn boxes(&self) -> &[TextBox] {
        &self.boxes
    }
}

/// Replaced element state.
#[derive(Debug, Clone, Copy)]
pub struct ReplacedData {
    pub(crate) intrinsic_size: LayoutSize,
    pub(crate) widget: bool,
}

impl ReplacedData {
    /// Natural size of the content.
    #[must_use]
    pub const fn intrinsic_size(&self) -> LayoutSize {
        self.intrinsic_size
    }

    /// Whether the content is an embedded widget (frame, plugin).
    #[must_use]
    pub const fn is_widget(&self) -> bool {
        self.widget
    }
}

/// The closed set of render object kinds.
#[derive(Debug, Clone)]
pub enum RenderKind {
    /// Root of the tree, sized to the viewport.
    View,
    /// Block container.
    Block(BlockData),
    /// Inline box.
    Inline(InlineData),
    /// Text run.
    Text(TextData),
    /// Replaced content (image, widget).
    Replaced(ReplacedData),
}

/// One node of the render tree.
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub(crate) kind: RenderKind,
    pub(crate) style: Rc<RenderStyle>,
    pub(crate) node: Option<NodeId>,
    pub(crate) parent: Option<RenderId>,
    pub(crate) first_child: Option<RenderId>,
    pub(crate) last_child: Option<RenderId>,
    pub(crate) prev_sibling: Option<RenderId>,
    pub(crate) next_sibling: Option<RenderId>,
    pub(crate) flags: RenderFlags,
    pub(crate) selection_state: SelectionState,
    pub(crate) layer: Option<LayerId>,
    /// Location relative to the container, and border-box size.
    pub(crate) frame_rect: LayoutRect,
    pub(crate) margins: EdgeSizes,
    pub(crate) layout_overflow: LayoutRect,
    pub(crate) visual_overflow: LayoutRect,
    pub(crate) min_preferred_width: f32,
    pub(crate) max_preferred_width: f32,
    /// Where an out-of-flow box would sit in normal flow, in its parent's
    /// layout space.
    pub(crate) static_position: LayoutPoint,
}

impl RenderObject {
    pub(crate) fn new(kind: RenderKind, style: Rc<RenderStyle>, node: Option<NodeId>) -> Self {
        let mut flags = RenderFlags::PREFERRED_WIDTHS_DIRTY;
        if matches!(kind, RenderKind::Block(_)) {
            flags |= RenderFlags::CHILDREN_INLINE;
        }
        Self {
            kind,
            style,
            node,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            flags,
            selection_state: SelectionState::None,
            layer: None,
            frame_rect: LayoutRect::zero(),
            margins: EdgeSizes::default(),
            layout_overflow: LayoutRect::zero(),
            visual_overflow: LayoutRect::zero(),
            min_preferred_width: 0.0,
            max_preferred_width: 0.0,
            static_position: LayoutPoint::zero(),
        }
    }

    /// Kind-specific data.
    #[must_use]
    pub const fn kind(&self) -> &RenderKind {
        &self.kind
    }

    /// Current style.
    #[must_use]
    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Shared handle to the current style.
    #[must_use]
    pub fn style_rc(&self) -> Rc<RenderStyle> {
        Rc::clone(&self.style)
    }

    /// Generating DOM node, `None` for anonymous objects and the view.
    #[must_use]
    pub const fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Parent in the render tree.
    #[must_use]
    pub const fn parent(&self) -> Option<RenderId> {
        self.parent
    }

    /// First child.
    #[must_use]
    pub const fn first_child(&self) -> Option<RenderId> {
        self.first_child
    }

    /// Last child.
    #[must_use]
    pub const fn last_child(&self) -> Option<RenderId> {
        self.last_child
    }

    /// Previous sibling.
    #[must_use]
    pub const fn prev_sibling(&self) -> Option<RenderId> {
        self.prev_sibling
    }

    /// Next sibling.
    #[must_use]
    pub const fn next_sibling(&self) -> Option<RenderId> {
        self.next_sibling
    }

    /// State bits.
    #[must_use]
    pub const fn flags(&self) -> RenderFlags {
        self.flags
    }

    /// Selection participation.
    #[must_use]
    pub const fn selection_state(&self) -> SelectionState {
        self.selection_state
    }

    /// Own layer, if the object needs one.
    #[must_use]
    pub const fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    /// Whether the object owns a layer.
    #[must_use]
    pub const fn has_layer(&self) -> bool {
        self.layer.is_some()
    }

    /// Location within the container and border-box size. Zero for inlines
    /// and text.
    #[must_use]
    pub const fn frame_rect(&self) -> LayoutRect {
        self.frame_rect
    }

    /// Location within the container.
    #[must_use]
    pub const fn location(&self) -> LayoutPoint {
        self.frame_rect.origin
    }

    /// Border-box size.
    #[must_use]
    pub const fn size(&self) -> LayoutSize {
        self.frame_rect.size
    }

    /// Border box in local coordinates.
    #[must_use]
    pub fn border_box_rect(&self) -> LayoutRect {
        LayoutRect::new(LayoutPoint::zero(), self.frame_rect.size)
    }

    /// Padding box in local coordinates.
    #[must_use]
    pub fn padding_box_rect(&self) -> LayoutRect {
        let b = self.border_widths();
        rect(
            b.left,
            b.top,
            (self.frame_rect.width() - b.horizontal()).max(0.0),
            (self.frame_rect.height() - b.vertical()).max(0.0),
        )
    }

    /// Content box in local coordinates.
    #[must_use]
    pub fn content_box_rect(&self) -> LayoutRect {
        let b = self.border_widths();
        let p = self.style.padding;
        rect(
            b.left + p.left,
            b.top + p.top,
            (self.frame_rect.width() - b.horizontal() - p.horizontal()).max(0.0),
            (self.frame_rect.height() - b.vertical() - p.vertical()).max(0.0),
        )
    }

    /// Used border widths.
    #[must_use]
    pub fn border_widths(&self) -> EdgeSizes {
        self.style.border_widths()
    }

    /// Border plus padding on the start edge.
    #[must_use]
    pub fn border_and_padding_left(&self) -> f32 {
        self.border_widths().left + self.style.padding.left
    }

    /// Computed margins.
    #[must_use]
    pub const fn margins(&self) -> EdgeSizes {
        self.margins
    }

    /// Layout overflow in local coordinates.
    #[must_use]
    pub const fn layout_overflow_rect(&self) -> LayoutRect {
        self.layout_overflow
    }

    /// Visual overflow in local coordinates.
    #[must_use]
    pub const fn visual_overflow_rect(&self) -> LayoutRect {
        self.visual_overflow
    }

    /// Cached (min, max) preferred widths.
    #[must_use]
    pub const fn preferred_widths(&self) -> (f32, f32) {
        (self.min_preferred_width, self.max_preferred_width)
    }

    /// Static position recorded by the last layout of the parent.
    #[must_use]
    pub const fn static_position(&self) -> LayoutPoint {
        self.static_position
    }

    // ========== Kind queries ==========

    /// The root view.
    #[must_use]
    pub const fn is_render_view(&self) -> bool {
        matches!(self.kind, RenderKind::View)
    }

    /// A block container (including the view).
    #[must_use]
    pub const fn is_render_block(&self) -> bool {
        matches!(self.kind, RenderKind::Block(_) | RenderKind::View)
    }

    /// An inline box.
    #[must_use]
    pub const fn is_render_inline(&self) -> bool {
        matches!(self.kind, RenderKind::Inline(_))
    }

    /// A text run.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, RenderKind::Text(_))
    }

    /// A replaced element.
    #[must_use]
    pub const fn is_render_replaced(&self) -> bool {
        matches!(self.kind, RenderKind::Replaced(_))
    }

    /// Has a rectangular frame of its own.
    #[must_use]
    pub const fn is_box(&self) -> bool {
        matches!(
            self.kind,
            RenderKind::View | RenderKind::Block(_) | RenderKind::Replaced(_)
        )
    }

    /// Anything but text.
    #[must_use]
    pub const fn is_box_model_object(&self) -> bool {
        !self.is_text()
    }

    /// Block data, if a block.
    #[must_use]
    pub const fn block(&self) -> Option<&BlockData> {
        match &self.kind {
            RenderKind::Block(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) const fn block_mut(&mut self) -> Option<&mut BlockData> {
        match &mut self.kind {
            RenderKind::Block(data) => Some(data),
            _ => None,
        }
    }

    /// Inline data, if an inline.
    #[must_use]
    pub const fn inline(&self) -> Option<&InlineData> {
        match &self.kind {
            RenderKind::Inline(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) const fn inline_mut(&mut self) -> Option<&mut InlineData> {
        match &mut self.kind {
            RenderKind::Inline(data) => Some(data),
            _ => None,
        }
    }

    /// Text data, if text.
    #[must_use]
    pub const fn text(&self) -> Option<&TextData> {
        match &self.kind {
            RenderKind::Text(data) => Some(data),
            _ => None,
        }
    }

    /// Replaced data, if replaced.
    #[must_use]
    pub const fn replaced(&self) -> Option<&ReplacedData> {
        match &self.kind {
            RenderKind::Replaced(data) => Some(data),
            _ => None,
        }
    }

    /// Block flavor, if a block.
    #[must_use]
    pub fn block_flavor(&self) -> Option<&BlockFlavor> {
        self.block().map(BlockData::flavor)
    }

    /// `display: table`
    #[must_use]
    pub fn is_table(&self) -> bool {
        self.block_flavor() == Some(&BlockFlavor::Table)
    }

    /// Row group.
    #[must_use]
    pub fn is_table_section(&self) -> bool {
        self.block_flavor() == Some(&BlockFlavor::TableSection)
    }

    /// Table row.
    #[must_use]
    pub fn is_table_row(&self) -> bool {
        self.block_flavor() == Some(&BlockFlavor::TableRow)
    }

    /// Table cell.
    #[must_use]
    pub fn is_table_cell(&self) -> bool {
        self.block_flavor() == Some(&BlockFlavor::TableCell)
    }

    /// Table caption.
    #[must_use]
    pub fn is_table_caption(&self) -> bool {
        self.block_flavor() == Some(&BlockFlavor::TableCaption)
    }

    /// Table column or column group.
    #[must_use]
    pub fn is_table_col(&self) -> bool {
        self.block_flavor() == Some(&BlockFlavor::TableColumn)
    }

    /// Any table part laid out by its table.
    #[must_use]
    pub fn is_table_part(&self) -> bool {
        self.is_table_cell()
            || self.is_table_col()
            || self.is_table_caption()
            || self.is_table_row()
            || self.is_table_section()
    }

    /// A named flow's content container.
    #[must_use]
    pub fn is_flow_thread(&self) -> bool {
        matches!(self.block_flavor(), Some(BlockFlavor::FlowThread(_)))
    }

    /// A region displaying a named flow.
    #[must_use]
    pub fn is_region(&self) -> bool {
        matches!(self.block_flavor(), Some(BlockFlavor::Region(_)))
    }

    /// Generated by the tree rather than an element.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.flags.contains(RenderFlags::ANONYMOUS)
    }

    /// An anonymous block-flow wrapper.
    #[must_use]
    pub fn is_anonymous_block(&self) -> bool {
        self.is_anonymous()
            && self.block_flavor() == Some(&BlockFlavor::Flow)
            && !self.is_inline()
    }

    /// An anonymous block that is part of an inline's continuation chain.
    #[must_use]
    pub fn is_anonymous_block_continuation(&self) -> bool {
        self.is_anonymous_block() && self.continuation().is_some()
    }

    /// Inline-level.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        self.flags.contains(RenderFlags::INLINE)
    }

    /// Atomic inline-level or replaced content.
    #[must_use]
    pub const fn is_replaced(&self) -> bool {
        self.flags.contains(RenderFlags::REPLACED)
    }

    /// `float` applies.
    #[must_use]
    pub const fn is_floating(&self) -> bool {
        self.flags.contains(RenderFlags::FLOATING)
    }

    /// Any `position` other than `static`.
    #[must_use]
    pub fn is_positioned(&self) -> bool {
        !self.is_text() && self.style.position != Position::Static
    }

    /// `absolute` or `fixed`.
    #[must_use]
    pub fn is_out_of_flow_positioned(&self) -> bool {
        !self.is_text() && self.style.has_out_of_flow_position()
    }

    /// `relative`.
    #[must_use]
    pub fn is_in_flow_positioned(&self) -> bool {
        !self.is_text() && self.style.has_in_flow_position()
    }

    /// `float` or out-of-flow.
    #[must_use]
    pub fn is_floating_or_out_of_flow_positioned(&self) -> bool {
        self.is_floating() || self.is_out_of_flow_positioned()
    }

    /// `position: fixed`
    #[must_use]
    pub fn is_fixed_positioned(&self) -> bool {
        !self.is_text() && self.style.position == Position::Fixed
    }

    /// Clips overflow.
    #[must_use]
    pub const fn has_overflow_clip(&self) -> bool {
        self.flags.contains(RenderFlags::HAS_OVERFLOW_CLIP)
    }

    /// Carries a transform.
    #[must_use]
    pub const fn has_transform(&self) -> bool {
        self.flags.contains(RenderFlags::HAS_TRANSFORM)
    }

    /// Multi-column block.
    #[must_use]
    pub fn has_columns(&self) -> bool {
        self.block().is_some_and(|b| b.columns.is_some())
    }

    /// Column geometry.
    #[must_use]
    pub fn column_info(&self) -> Option<ColumnInfo> {
        self.block().and_then(|b| b.columns)
    }

    /// Block with only inline-level children.
    #[must_use]
    pub const fn children_inline(&self) -> bool {
        self.flags.contains(RenderFlags::CHILDREN_INLINE)
    }

    /// Has completed a layout before.
    #[must_use]
    pub const fn ever_had_layout(&self) -> bool {
        self.flags.contains(RenderFlags::EVER_HAD_LAYOUT)
    }

    /// Paints background, border or shadow.
    #[must_use]
    pub const fn has_box_decorations(&self) -> bool {
        self.flags.contains(RenderFlags::HAS_BOX_DECORATIONS)
    }

    /// Teardown in progress.
    #[must_use]
    pub const fn being_destroyed(&self) -> bool {
        self.flags.contains(RenderFlags::BEING_DESTROYED)
    }

    /// Scroll offset of an overflow-clipping box.
    #[must_use]
    pub fn scrolled_content_offset(&self) -> LayoutOffset {
        self.block().map_or_else(LayoutOffset::zero, |b| b.scroll_offset)
    }

    /// Next piece of a split inline, for inlines and anonymous blocks.
    #[must_use]
    pub const fn continuation(&self) -> Option<Continuation> {
        match &self.kind {
            RenderKind::Inline(data) => data.continuation,
            RenderKind::Block(data) => data.continuation,
            _ => None,
        }
    }

    pub(crate) const fn set_continuation(&mut self, continuation: Option<Continuation>) {
        match &mut self.kind {
            RenderKind::Inline(data) => data.continuation = continuation,
            RenderKind::Block(data) => data.continuation = continuation,
            _ => {}
        }
    }

    // ========== Layout bits ==========

    /// Any layout work pending on this object or below.
    #[must_use]
    pub const fn needs_layout(&self) -> bool {
        self.flags.intersects(
            RenderFlags::SELF_NEEDS_LAYOUT
                .union(RenderFlags::NORMAL_CHILD_NEEDS_LAYOUT)
                .union(RenderFlags::POS_CHILD_NEEDS_LAYOUT)
                .union(RenderFlags::NEEDS_SIMPLIFIED_NORMAL_FLOW_LAYOUT)
                .union(RenderFlags::NEEDS_POSITIONED_MOVEMENT_LAYOUT),
        )
    }

    /// The object itself is dirty.
    #[must_use]
    pub const fn self_needs_layout(&self) -> bool {
        self.flags.contains(RenderFlags::SELF_NEEDS_LAYOUT)
    }

    /// An in-flow descendant is dirty.
    #[must_use]
    pub const fn normal_child_needs_layout(&self) -> bool {
        self.flags.contains(RenderFlags::NORMAL_CHILD_NEEDS_LAYOUT)
    }

    /// A positioned descendant is dirty.
    #[must_use]
    pub const fn pos_child_needs_layout(&self) -> bool {
        self.flags.contains(RenderFlags::POS_CHILD_NEEDS_LAYOUT)
    }

    /// Only overflow needs recomputing.
    #[must_use]
    pub const fn needs_simplified_normal_flow_layout(&self) -> bool {
        self.flags.contains(RenderFlags::NEEDS_SIMPLIFIED_NORMAL_FLOW_LAYOUT)
    }

    /// A positioned move is pending.
    #[must_use]
    pub const fn needs_positioned_movement_layout(&self) -> bool {
        self.flags.contains(RenderFlags::NEEDS_POSITIONED_MOVEMENT_LAYOUT)
    }

    /// The only pending work is a positioned move.
    #[must_use]
    pub const fn needs_positioned_movement_layout_only(&self) -> bool {
        self.needs_positioned_movement_layout()
            && !self.self_needs_layout()
            && !self.normal_child_needs_layout()
            && !self.pos_child_needs_layout()
            && !self.needs_simplified_normal_flow_layout()
    }

    /// Cached preferred widths are stale.
    #[must_use]
    pub const fn preferred_logical_widths_dirty(&self) -> bool {
        self.flags.contains(RenderFlags::PREFERRED_WIDTHS_DIRTY)
    }

    pub(crate) fn set_flag(&mut self, flag: RenderFlags, value: bool) {
        self.flags.set(flag, value);
    }
}
