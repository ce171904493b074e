//! Render tree dumps.
//!
//! [`RenderTree::dump`] produces a serializable snapshot for tooling.
//! [`RenderTree::dump_text`] prints the indented layout-test format, one
//! renderer per line:
//!
//! ```text
//! RenderView at (0,0) size 800x600
//!   RenderBlock {DIV} at (0,0) size 800x18
//!     RenderText {#text} at (0,0) size 30x18
//!       text run at (0,0) width 30: "text"
//! ```

use std::fmt::Write;

use arbor_dom::DomTree;
use serde::Serialize;

use crate::geometry::LayoutRect;
use crate::object::{BlockFlavor, RenderId, RenderKind, SelectionState};
use crate::tree::RenderTree;

/// Snapshot of one renderer and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderTreeDump {
    /// Arena id.
    pub id: RenderId,
    /// Renderer class name, e.g. `RenderBlock`.
    pub name: &'static str,
    /// DOM node index, absent for anonymous renderers.
    pub node: Option<usize>,
    /// Frame rectangle in the container's coordinates.
    pub frame: LayoutRect,
    /// Pixel-aligned bounding box in document coordinates.
    pub absolute: LayoutRect,
    /// Line fragments, in the containing block's coordinates.
    pub fragments: Vec<LayoutRect>,
    /// Characters, for text renderers.
    pub text: Option<String>,
    /// Whether the renderer owns a layer.
    pub has_layer: bool,
    /// Whether any layout bit is set.
    pub needs_layout: bool,
    /// Selection state.
    pub selection: SelectionState,
    /// Children in order.
    pub children: Vec<RenderTreeDump>,
}

impl RenderTree {
    /// Class name of a renderer as layout dumps print it.
    #[must_use]
    pub fn render_name(&self, id: RenderId) -> &'static str {
        let obj = &self.objects[id];
        match &obj.kind {
            RenderKind::View => "RenderView",
            RenderKind::Inline(_) => "RenderInline",
            RenderKind::Text(_) => "RenderText",
            RenderKind::Replaced(data) if data.is_widget() => "RenderWidget",
            RenderKind::Replaced(_) => "RenderReplaced",
            RenderKind::Block(data) => match data.flavor() {
                BlockFlavor::Flow => "RenderBlock",
                BlockFlavor::Table => "RenderTable",
                BlockFlavor::TableSection => "RenderTableSection",
                BlockFlavor::TableRow => "RenderTableRow",
                BlockFlavor::TableCell => "RenderTableCell",
                BlockFlavor::TableCaption => "RenderTableCaption",
                BlockFlavor::TableColumn => "RenderTableCol",
                BlockFlavor::FlowThread(_) => "RenderNamedFlowThread",
                BlockFlavor::Region(_) => "RenderRegion",
            },
        }
    }

    /// Serializable snapshot of the whole tree.
    #[must_use]
    pub fn dump(&self) -> RenderTreeDump {
        self.dump_subtree(self.view)
    }

    /// Serializable snapshot of `id` and its descendants.
    #[must_use]
    pub fn dump_subtree(&self, id: RenderId) -> RenderTreeDump {
        let obj = &self.objects[id];
        let fragments = match &obj.kind {
            RenderKind::Inline(_) | RenderKind::Text(_) => self.line_box_rects(id),
            _ => Vec::new(),
        };
        RenderTreeDump {
            id,
            name: self.render_name(id),
            node: obj.node.map(|n| n.0),
            frame: obj.frame_rect,
            absolute: self.absolute_bounding_box_rect(id),
            fragments,
            text: obj.text().map(|data| data.text().to_string()),
            has_layer: obj.has_layer(),
            needs_layout: obj.needs_layout(),
            selection: obj.selection_state,
            children: self.children(id).map(|child| self.dump_subtree(child)).collect(),
        }
    }

    /// The indented text dump. Node names come from `dom` when given.
    #[must_use]
    pub fn dump_text(&self, dom: Option<&DomTree>) -> String {
        let mut out = String::new();
        self.dump_text_into(self.view, 0, dom, &mut out);
        out
    }

    fn dump_text_into(&self, id: RenderId, depth: usize, dom: Option<&DomTree>, out: &mut String) {
        let obj = &self.objects[id];
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}{}", self.render_name(id));

        let mut notes = Vec::new();
        if obj.is_anonymous() {
            notes.push("anonymous");
        }
        if obj.is_floating() {
            notes.push("floating");
        }
        if obj.is_out_of_flow_positioned() {
            notes.push("positioned");
        } else if obj.is_in_flow_positioned() {
            notes.push("relative positioned");
        }
        if !notes.is_empty() {
            let _ = write!(out, " ({})", notes.join(") ("));
        }

        if let (Some(node), Some(dom)) = (obj.node, dom) {
            let name = dom.node_name(node);
            let label = if dom.as_element(node).is_some() {
                name.to_ascii_uppercase()
            } else {
                name
            };
            let _ = write!(out, " {{{label}}}");
        }

        let frame = match &obj.kind {
            RenderKind::Inline(_) | RenderKind::Text(_) => self.lines_bounding_box(id),
            _ => obj.frame_rect,
        };
        let _ = writeln!(
            out,
            " at ({},{}) size {}x{}",
            frame.min_x(),
            frame.min_y(),
            frame.width(),
            frame.height()
        );

        if let Some(data) = obj.text() {
            for text_box in data.boxes() {
                let run = data.text().get(text_box.start..text_box.end()).unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{indent}  text run at ({},{}) width {}: {run:?}",
                    text_box.rect.min_x(),
                    text_box.rect.min_y(),
                    text_box.rect.width()
                );
            }
        }

        for child in self.children(id) {
            self.dump_text_into(child, depth + 1, dom, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::geometry::LayoutSize;
    use crate::style::{Length, RenderStyle};

    #[test]
    fn test_text_dump_lists_blocks_and_runs() {
        let mut dom = DomTree::new();
        let div = dom.create_element("div");
        let mut tree = RenderTree::new(LayoutSize::new(100.0, 100.0));
        let view = tree.view();
        let style = RenderStyle {
            height: Length::Fixed(20.0),
            ..RenderStyle::block()
        };
        let block = tree.create_block(BlockFlavor::Flow, Rc::new(style), Some(div));
        tree.add_child(view, block, None);
        let text = tree.create_text("hi", Rc::new(RenderStyle::default()), None);
        tree.add_child(block, text, None);
        tree.layout();

        let dump = tree.dump_text(Some(&dom));
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "RenderView at (0,0) size 100x100");
        assert_eq!(lines[1], "  RenderBlock {DIV} at (0,0) size 100x20");
        assert!(lines[2].starts_with("    RenderText at (0,0)"));
        assert!(lines[3].ends_with(": \"hi\""));
    }

    #[test]
    fn test_serialized_dump_nests_children() {
        let mut tree = RenderTree::new(LayoutSize::new(100.0, 100.0));
        let view = tree.view();
        let block = tree.create_block(BlockFlavor::Flow, Rc::new(RenderStyle::block()), None);
        tree.add_child(view, block, None);
        tree.layout();

        let dump = tree.dump();
        assert_eq!(dump.name, "RenderView");
        assert_eq!(dump.children.len(), 1);
        assert_eq!(dump.children[0].name, "RenderBlock");
        assert!(!dump.children[0].needs_layout);
    }
}
