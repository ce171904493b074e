//! Incremental render tree for arbor documents.
//!
//! # Scope
//!
//! This crate implements:
//! - **Render objects** ([§ 9 Visual formatting model](https://www.w3.org/TR/CSS2/visuren.html))
//!   - View, block, inline, text and replaced renderers in an arena
//!   - Anonymous block wrapping and inline continuations
//!   - Style change classification and invalidation
//!
//! - **Layout** ([§ 10 Visual formatting model details](https://www.w3.org/TR/CSS2/visudet.html))
//!   - Dirty-bit propagation and subtree layout roots
//!   - Block flow, floats, line breaking, positioned boxes and tables
//!   - Multi-column blocks and named flows with regions
//!   - A layout-state stack that caches container offsets
//!
//! - **Geometry**
//!   - Local to absolute mapping through translations, transforms and columns
//!   - A flattened geometry map for repeated mapping
//!   - Repaint rectangles with delta strips for boxes that only resized
//!
//! - **Layers** ([Appendix E Elaborate description of Stacking Contexts](https://www.w3.org/TR/CSS2/zindex.html))
//!   - Layer tree, paint order and compositing decisions
//!
//! - **Output**
//!   - Display lists, hit testing, selection repaint and tree dumps
//!   - Building a render tree from a DOM and from JSON scenes
//!
//! # Not Yet Implemented
//!
//! - Vertical writing modes and bidirectional text
//! - Line boxes shortened beside floats
//! - Parent/child margin collapsing

mod arena;
/// DOM to render tree construction and style resolution.
pub mod builder;
mod children;
/// Layer compositing decisions.
pub mod compositor;
mod containers;
/// Tree dumps for tests and tooling.
pub mod dump;
mod error;
/// Named flows and regions per [CSS Regions](https://www.w3.org/TR/css-regions-1/).
pub mod flow_thread;
/// Frame view: viewport, scrolling and the repaint log.
pub mod frame_view;
/// Pixel geometry types.
pub mod geometry;
/// Flattened container mapping.
pub mod geometry_map;
/// Hit testing in reverse paint order.
pub mod hit_test;
mod inline;
/// Self-painting layers.
pub mod layer;
mod layout;
/// Needs-layout bits and their propagation.
pub mod layout_bits;
/// Cached container offsets during layout.
pub mod layout_state;
/// Line boxes and font metrics.
pub mod line_box;
mod line_layout;
/// Local and absolute coordinate mapping.
pub mod mapping;
/// Render objects and their per-kind data.
pub mod object;
/// Display lists per [Appendix E](https://www.w3.org/TR/CSS2/zindex.html).
pub mod paint;
mod positioned;
mod preferred_width;
/// Repaint rectangles and layout repainters.
pub mod repaint;
/// JSON scene descriptions.
pub mod scene;
/// Selection state and selection repaint.
pub mod selection;
/// Computed style consumed by the render tree.
pub mod style;
/// Reactions to style changes.
pub mod style_change;
mod table;
/// Point and quad accumulation through transforms.
pub mod transform_state;
/// The render tree itself.
pub mod tree;
/// View-wide state.
pub mod view;

pub use arena::{Arena, Id};
pub use builder::{ElementStyleMap, StyleResolver, blockify, default_style_for_tag};
pub use dump::RenderTreeDump;
pub use error::RenderError;
pub use frame_view::{FrameView, RepaintRecord, RepaintTarget};
pub use geometry::{LayoutOffset, LayoutPoint, LayoutQuad, LayoutRect, LayoutSize, LayoutTransform};
pub use hit_test::HitTestResult;
pub use inline::MAX_SPLIT_DEPTH;
pub use layer::{LayerId, RenderLayer};
pub use layout_bits::MarkingBehavior;
pub use line_box::{ApproximateFontMetrics, FontMetrics};
pub use mapping::MapCoordinatesFlags;
pub use object::{BlockFlavor, RenderFlags, RenderId, RenderKind, RenderObject, SelectionState};
pub use paint::{DisplayItem, PaintPhase};
pub use repaint::delta_repaint_rects;
pub use scene::{Scene, SceneDocument, SceneNode, SceneStep, SceneViewport};
pub use selection::{SelectionRange, SelectionRepaintMode};
pub use style::{Display, Length, Position, RenderStyle, StyleDifference};
pub use tree::RenderTree;
