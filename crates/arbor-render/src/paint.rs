//! Display lists.
//!
//! [Appendix E. Elaborate description of Stacking Contexts](https://www.w3.org/TR/CSS2/zindex.html)
//!
//! "Within each stacking context, the following layers are painted in
//! back-to-front order: the background and borders of the element forming
//! the stacking context ... the in-flow, non-inline-level, non-positioned
//! descendants ... the non-positioned floats ... the in-flow, inline-level,
//! non-positioned descendants ... the child stacking contexts with positive
//! stack levels."
//!
//! Layers are painted in [`RenderTree::layers_in_paint_order`]. Inside a
//! layer every phase walks the objects the layer owns: descendants with a
//! layer of their own paint with that layer. Floats paint all of their
//! phases at once in the float phase. Content of a named flow is painted
//! through each region showing it.

use serde::Serialize;
use strum_macros::Display;

use crate::geometry::{LayoutOffset, LayoutQuad, LayoutRect, intersect, rect};
use crate::mapping::MapCoordinatesFlags;
use crate::object::{RenderId, RenderKind};
use crate::style::{BorderStyle, Color, EdgeSizes};
use crate::tree::RenderTree;

/// One drawing command, in document coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DisplayItem {
    /// Solid fill of a box's background.
    FillRect {
        /// Renderer painting it.
        renderer: RenderId,
        /// Filled area.
        rect: LayoutRect,
        /// Fill color.
        color: Color,
    },
    /// Border edges drawn inside `rect`.
    Border {
        /// Renderer painting it.
        renderer: RenderId,
        /// Border box.
        rect: LayoutRect,
        /// Edge widths.
        widths: EdgeSizes,
        /// Line style.
        style: BorderStyle,
        /// Edge color.
        color: Color,
    },
    /// An outer box shadow.
    BoxShadow {
        /// Renderer painting it.
        renderer: RenderId,
        /// Shadow rectangle.
        rect: LayoutRect,
        /// Shadow color.
        color: Color,
    },
    /// A run of text from one text box.
    Text {
        /// Renderer painting it.
        renderer: RenderId,
        /// Text box.
        rect: LayoutRect,
        /// Characters of the box.
        text: String,
        /// `font-size` in pixels.
        font_size: f32,
        /// Text color.
        color: Color,
    },
    /// Content of a replaced element.
    Replaced {
        /// Renderer painting it.
        renderer: RenderId,
        /// Content box.
        rect: LayoutRect,
    },
    /// Outline drawn outside `rect`.
    Outline {
        /// Renderer painting it.
        renderer: RenderId,
        /// Outlined box.
        rect: LayoutRect,
        /// Outline width.
        width: f32,
        /// Outline color.
        color: Color,
    },
}

impl DisplayItem {
    /// Renderer that produced the item.
    #[must_use]
    pub const fn renderer(&self) -> RenderId {
        match self {
            Self::FillRect { renderer, .. }
            | Self::Border { renderer, .. }
            | Self::BoxShadow { renderer, .. }
            | Self::Text { renderer, .. }
            | Self::Replaced { renderer, .. }
            | Self::Outline { renderer, .. } => *renderer,
        }
    }

    /// Area the item covers.
    #[must_use]
    pub const fn rect(&self) -> LayoutRect {
        match self {
            Self::FillRect { rect, .. }
            | Self::Border { rect, .. }
            | Self::BoxShadow { rect, .. }
            | Self::Text { rect, .. }
            | Self::Replaced { rect, .. }
            | Self::Outline { rect, .. } => *rect,
        }
    }

    const fn rect_mut(&mut self) -> &mut LayoutRect {
        match self {
            Self::FillRect { rect, .. }
            | Self::Border { rect, .. }
            | Self::BoxShadow { rect, .. }
            | Self::Text { rect, .. }
            | Self::Replaced { rect, .. }
            | Self::Outline { rect, .. } => rect,
        }
    }
}

/// Painting phases of one layer, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
pub enum PaintPhase {
    /// Backgrounds and borders of block-level boxes.
    BlockBackground,
    /// Floats, each painted as a unit.
    Float,
    /// Inline content: text, replaced elements and inline decorations.
    Foreground,
    /// Outlines.
    Outline,
}

impl PaintPhase {
    /// Every phase, in paint order.
    pub const ALL: [Self; 4] = [Self::BlockBackground, Self::Float, Self::Foreground, Self::Outline];
}

/// Where painted items end up.
struct PaintContext {
    dirty: LayoutRect,
    /// Clip of the enclosing overflow-clipping boxes, in document space.
    clip: Option<LayoutRect>,
    /// Set while painting a flow thread into a region: the part of the flow
    /// shown and the offset from flow to document coordinates.
    region: Option<(LayoutRect, LayoutOffset)>,
    items: Vec<DisplayItem>,
}

impl PaintContext {
    fn push(&mut self, mut item: DisplayItem) {
        let r = item.rect_mut();
        if let Some((portion, offset)) = self.region {
            let shown = intersect(r, &portion);
            if shown.is_empty() {
                return;
            }
            *r = shown.translate(offset);
        }
        if let Some(clip) = self.clip {
            *r = intersect(r, &clip);
        }
        if r.is_empty() || intersect(r, &self.dirty).is_empty() {
            return;
        }
        self.items.push(item);
    }
}

impl RenderTree {
    /// Display list for everything intersecting `dirty`, in paint order.
    #[must_use]
    pub fn paint(&self, dirty: &LayoutRect) -> Vec<DisplayItem> {
        let mut ctx = PaintContext {
            dirty: *dirty,
            clip: None,
            region: None,
            items: Vec::new(),
        };
        for layer in self.layers_in_paint_order() {
            let renderer = self.layers[layer].renderer();
            // Flow content paints through its regions.
            if self.flow_thread_containing(renderer).is_some() {
                continue;
            }
            ctx.clip = self.ancestor_clip(renderer);
            for phase in PaintPhase::ALL {
                self.paint_object(renderer, renderer, phase, &mut ctx);
            }
        }
        ctx.items
    }

    /// Display list for the whole document.
    #[must_use]
    pub fn paint_document(&self) -> Vec<DisplayItem> {
        self.paint(&self.document_rect())
    }

    fn absolute_rect(&self, id: RenderId, r: &LayoutRect) -> LayoutRect {
        self.local_to_absolute_quad(id, &LayoutQuad::from_rect(r), MapCoordinatesFlags::USE_TRANSFORMS)
            .enclosing_bounding_box()
    }

    /// Clip from overflow-clipping ancestors of a layer's renderer.
    fn ancestor_clip(&self, id: RenderId) -> Option<LayoutRect> {
        let mut clip: Option<LayoutRect> = None;
        let mut current = self.container(id);
        while let Some(c) = current {
            if self.objects[c].has_overflow_clip() {
                let padding = self.absolute_rect(c, &self.objects[c].padding_box_rect());
                clip = Some(clip.map_or(padding, |existing| intersect(&existing, &padding)));
            }
            current = self.container(c);
        }
        clip
    }

    fn paint_object(&self, id: RenderId, root: RenderId, phase: PaintPhase, ctx: &mut PaintContext) {
        let obj = &self.objects[id];
        if id != root {
            if obj.has_layer() && ctx.region.is_none() {
                return;
            }
            if obj.is_flow_thread() {
                return;
            }
            if obj.is_floating() {
                if phase == PaintPhase::Float {
                    for float_phase in PaintPhase::ALL {
                        self.paint_object(id, id, float_phase, ctx);
                    }
                }
                return;
            }
        }

        self.paint_self(id, phase, ctx);

        let saved_clip = ctx.clip;
        if obj.has_overflow_clip() {
            let padding = self.absolute_rect(id, &obj.padding_box_rect());
            ctx.clip = Some(ctx.clip.map_or(padding, |existing| intersect(&existing, &padding)));
        }
        for child in self.children(id) {
            self.paint_object(child, root, phase, ctx);
        }
        if obj.is_region() {
            self.paint_region_contents(id, phase, ctx);
        }
        ctx.clip = saved_clip;
    }

    /// Paint the slice of the named flow `region` shows.
    fn paint_region_contents(&self, region: RenderId, phase: PaintPhase, ctx: &mut PaintContext) {
        let Some(controller) = self.view_state.flow_thread_controller.as_ref() else {
            return;
        };
        let Some(portion) = controller.region_portion(region) else {
            return;
        };
        let Some(thread) = controller
            .flow_threads()
            .iter()
            .copied()
            .find(|&thread| self.objects.contains(thread) && self.region_chain(thread).contains(&region))
        else {
            return;
        };
        let content = self.objects[region].content_box_rect();
        let origin = self.absolute_rect(region, &content).origin;
        let saved = ctx.region.replace((portion, origin - portion.origin));
        for child in self.children(thread) {
            self.paint_object(child, thread, phase, ctx);
        }
        ctx.region = saved;
    }

    fn paint_self(&self, id: RenderId, phase: PaintPhase, ctx: &mut PaintContext) {
        let obj = &self.objects[id];
        let style = obj.style();
        if !style.is_visible() {
            return;
        }
        match (&obj.kind, phase) {
            (RenderKind::Text(data), PaintPhase::Foreground) => {
                for text_box in &data.boxes {
                    let text = data.text.get(text_box.start..text_box.end()).unwrap_or_default();
                    ctx.push(DisplayItem::Text {
                        renderer: id,
                        rect: self.absolute_rect(id, &text_box.rect),
                        text: text.to_string(),
                        font_size: style.font_size,
                        color: style.color,
                    });
                }
            }
            (RenderKind::Inline(_), PaintPhase::Foreground) => {
                for fragment in self.line_box_rects(id) {
                    self.paint_box_decorations(id, &self.absolute_rect(id, &fragment), ctx);
                }
            }
            (RenderKind::Inline(_), PaintPhase::Outline) => {
                if style.has_outline() {
                    for fragment in self.line_box_rects(id) {
                        let r = self.absolute_rect(id, &fragment);
                        self.push_outline(id, r, ctx);
                    }
                }
            }
            (RenderKind::Text(_) | RenderKind::Inline(_), _) => {}
            (_, PaintPhase::BlockBackground) if !obj.is_inline() => {
                let border_box = self.absolute_rect(id, &obj.border_box_rect());
                self.paint_box_decorations(id, &border_box, ctx);
            }
            (_, PaintPhase::Foreground) if obj.is_inline() || obj.is_replaced() => {
                if obj.is_inline() {
                    let border_box = self.absolute_rect(id, &obj.border_box_rect());
                    self.paint_box_decorations(id, &border_box, ctx);
                }
                if obj.is_replaced() {
                    let content = self.absolute_rect(id, &obj.content_box_rect());
                    ctx.push(DisplayItem::Replaced {
                        renderer: id,
                        rect: content,
                    });
                }
            }
            (_, PaintPhase::Outline) => {
                if style.has_outline() {
                    let border_box = self.absolute_rect(id, &obj.border_box_rect());
                    self.push_outline(id, border_box, ctx);
                }
            }
            _ => {}
        }
    }

    /// Shadows, background and border of one box or line fragment.
    fn paint_box_decorations(&self, id: RenderId, border_box: &LayoutRect, ctx: &mut PaintContext) {
        let style = self.objects[id].style();
        for shadow in style.box_shadow.iter().filter(|s| !s.inset && s.color.is_visible()) {
            let grow = shadow.spread + shadow.blur;
            let r = rect(
                border_box.min_x() + shadow.x - grow,
                border_box.min_y() + shadow.y - grow,
                border_box.width() + 2.0 * grow,
                border_box.height() + 2.0 * grow,
            );
            ctx.push(DisplayItem::BoxShadow {
                renderer: id,
                rect: r,
                color: shadow.color,
            });
        }
        if style.background.color.is_visible() {
            ctx.push(DisplayItem::FillRect {
                renderer: id,
                rect: *border_box,
                color: style.background.color,
            });
        }
        if style.has_border() {
            ctx.push(DisplayItem::Border {
                renderer: id,
                rect: *border_box,
                widths: style.border_widths(),
                style: style.border_style,
                color: style.border_color,
            });
        }
    }

    fn push_outline(&self, id: RenderId, border_box: LayoutRect, ctx: &mut PaintContext) {
        let style = self.objects[id].style();
        let size = style.outline_size();
        let r = border_box.inflate(size, size);
        ctx.push(DisplayItem::Outline {
            renderer: id,
            rect: r,
            width: style.outline_width(),
            color: style.outline.color,
        });
    }
}
