//! Render tree construction from a DOM tree.
//!
//! [§ 9.2 Controlling box generation](https://www.w3.org/TR/CSS2/visuren.html#box-gen)
//!
//! "The following sections describe the types of boxes that may be generated
//! in CSS 2.1. A box's type affects, in part, its behavior in the visual
//! formatting model. The 'display' property, described below, specifies a
//! box's type."
//!
//! Style resolution is a black box behind [`StyleResolver`]. The builder maps
//! each element's computed `display` to a renderer kind, hands the renderer
//! to [`RenderTree::add_child`] (which creates the anonymous wrappers) and
//! routes `flow-into` content into its named flow.

use std::collections::HashMap;
use std::rc::Rc;

use arbor_common::warning::warn_once;
use arbor_dom::{DomTree, NodeId, NodeType};
use log::debug;

use crate::error::RenderError;
use crate::geometry::LayoutSize;
use crate::object::{BlockFlavor, RenderId};
use crate::style::{Display, RenderStyle, WhiteSpace};
use crate::tree::RenderTree;

/// Natural size of replaced content without `width`/`height` attributes.
const DEFAULT_REPLACED_SIZE: (f32, f32) = (300.0, 150.0);

/// Computed styles for elements.
pub trait StyleResolver {
    /// Computed style of `element`, or `None` when the resolver has none.
    fn resolve(&self, dom: &DomTree, element: NodeId) -> Option<RenderStyle>;
}

/// A [`StyleResolver`] backed by explicit tables.
///
/// Lookup order is node, then `id` attribute, then tag name, then the
/// built-in defaults of [`default_style_for_tag`] unless the map is strict.
#[derive(Debug, Clone, Default)]
pub struct ElementStyleMap {
    by_node: HashMap<NodeId, RenderStyle>,
    by_id: HashMap<String, RenderStyle>,
    by_tag: HashMap<String, RenderStyle>,
    strict: bool,
}

impl ElementStyleMap {
    /// An empty map falling back to the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty map that resolves nothing it was not told about.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Style for one node.
    pub fn insert_node(&mut self, node: NodeId, style: RenderStyle) {
        let _ = self.by_node.insert(node, style);
    }

    /// Style for the element whose `id` attribute is `id`.
    pub fn insert_id(&mut self, id: &str, style: RenderStyle) {
        let _ = self.by_id.insert(id.to_string(), style);
    }

    /// Style for every element named `tag`.
    pub fn insert_tag(&mut self, tag: &str, style: RenderStyle) {
        let _ = self.by_tag.insert(tag.to_ascii_lowercase(), style);
    }
}

impl StyleResolver for ElementStyleMap {
    fn resolve(&self, dom: &DomTree, element: NodeId) -> Option<RenderStyle> {
        if let Some(style) = self.by_node.get(&element) {
            return Some(style.clone());
        }
        let data = dom.as_element(element)?;
        if let Some(style) = data.id().and_then(|id| self.by_id.get(id)) {
            return Some(style.clone());
        }
        let tag = data.tag_name.to_ascii_lowercase();
        if let Some(style) = self.by_tag.get(&tag) {
            return Some(style.clone());
        }
        (!self.strict).then(|| default_style_for_tag(&tag))
    }
}

/// Built-in style of an element with no other style information.
#[must_use]
pub fn default_style_for_tag(tag: &str) -> RenderStyle {
    let display = match tag {
        "html" | "body" | "div" | "p" | "section" | "article" | "header" | "footer" | "nav" | "main"
        | "aside" | "figure" | "ul" | "ol" | "dl" | "dd" | "dt" | "blockquote" | "pre" | "h1" | "h2"
        | "h3" | "h4" | "h5" | "h6" | "form" | "fieldset" | "hr" | "parsererror" => Display::Block,
        "li" => Display::ListItem,
        "table" => Display::Table,
        "thead" => Display::TableHeaderGroup,
        "tbody" => Display::TableRowGroup,
        "tfoot" => Display::TableFooterGroup,
        "tr" => Display::TableRow,
        "td" | "th" => Display::TableCell,
        "caption" => Display::TableCaption,
        "col" => Display::TableColumn,
        "colgroup" => Display::TableColumnGroup,
        "head" | "script" | "style" | "title" | "meta" | "link" | "template" => Display::None,
        _ => Display::Inline,
    };
    let white_space = if tag == "pre" {
        WhiteSpace::Pre
    } else {
        WhiteSpace::Normal
    };
    RenderStyle {
        display,
        white_space,
        ..RenderStyle::default()
    }
}

/// [§ 9.7 Relationships between 'display', 'position', and 'float'](https://www.w3.org/TR/CSS2/visuren.html#dis-pos-flo)
///
/// "Otherwise, if 'float' has a value other than 'none', the box is floated
/// and 'display' is set according to the table below." Inline-level values
/// become their block-level counterparts; the original value is kept.
#[must_use]
pub fn blockify(mut style: RenderStyle) -> RenderStyle {
    if !style.is_floating() && !style.has_out_of_flow_position() {
        return style;
    }
    let blockified = match style.display {
        Display::Inline | Display::InlineBlock => Display::Block,
        Display::InlineTable => Display::Table,
        other => other,
    };
    if blockified != style.display {
        style.original_display = Some(style.display);
        style.display = blockified;
    }
    style
}

/// Renderer kind an element's style asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BoxKind {
    Block(BlockFlavor),
    Inline,
    Replaced { widget: bool },
    Nothing,
}

fn box_kind(tag: &str, style: &RenderStyle) -> BoxKind {
    if style.display == Display::None {
        return BoxKind::Nothing;
    }
    match tag {
        "img" | "canvas" | "video" | "svg" => return BoxKind::Replaced { widget: false },
        "iframe" | "object" | "embed" => return BoxKind::Replaced { widget: true },
        _ => {}
    }
    if let Some(name) = &style.flow_from {
        return BoxKind::Block(BlockFlavor::Region(name.clone()));
    }
    match style.display {
        Display::Inline => BoxKind::Inline,
        Display::Block | Display::InlineBlock | Display::ListItem => BoxKind::Block(BlockFlavor::Flow),
        Display::Table | Display::InlineTable => BoxKind::Block(BlockFlavor::Table),
        Display::TableRowGroup | Display::TableHeaderGroup | Display::TableFooterGroup => {
            BoxKind::Block(BlockFlavor::TableSection)
        }
        Display::TableRow => BoxKind::Block(BlockFlavor::TableRow),
        Display::TableCell => BoxKind::Block(BlockFlavor::TableCell),
        Display::TableCaption => BoxKind::Block(BlockFlavor::TableCaption),
        Display::TableColumn | Display::TableColumnGroup => BoxKind::Block(BlockFlavor::TableColumn),
        Display::None => BoxKind::Nothing,
    }
}

fn is_entity_reference(dom: &DomTree, node: NodeId) -> bool {
    dom.get(node)
        .is_some_and(|n| matches!(n.node_type, NodeType::EntityReference(_)))
}

impl RenderTree {
    /// Build renderers for the whole document under the view.
    ///
    /// # Errors
    ///
    /// Fails when the resolver has no style for an element.
    pub fn build_from_dom(&mut self, dom: &DomTree, resolver: &dyn StyleResolver) -> Result<(), RenderError> {
        for &child in dom.children(NodeId::ROOT) {
            let _ = self.attach_node(dom, resolver, child)?;
        }
        debug!(target: "arbor::builder", "render tree built: {} objects", self.object_count());
        Ok(())
    }

    /// Create renderers for `node` and its subtree and insert them.
    ///
    /// Returns the renderer made for `node` itself, which is `None` for nodes
    /// that generate no box.
    ///
    /// # Errors
    ///
    /// [`RenderError::UnknownNode`] when `node` is not in `dom`,
    /// [`RenderError::DetachedParent`] when its parent should have a renderer
    /// but has none yet, [`RenderError::MissingStyle`] when an element has no
    /// style.
    pub fn attach_node(
        &mut self,
        dom: &DomTree,
        resolver: &dyn StyleResolver,
        node: NodeId,
    ) -> Result<Option<RenderId>, RenderError> {
        let Some(dom_node) = dom.get(node) else {
            return Err(RenderError::UnknownNode(node));
        };
        if self.renderer_for_node(node).is_some() {
            return Ok(self.renderer_for_node(node));
        }

        // STEP 1: Find the renderer the new one goes under.
        let Some(parent) = self.render_parent_of(dom, resolver, node)? else {
            return Ok(None);
        };

        // STEP 2: Create the renderer.
        let created = match &dom_node.node_type {
            NodeType::Element(data) => {
                let style = resolver.resolve(dom, node).ok_or(RenderError::MissingStyle(node))?;
                let style = blockify(style);
                let tag = data.tag_name.to_ascii_lowercase();
                self.create_element_renderer(dom, node, &tag, style)
            }
            NodeType::Text(_) | NodeType::CDataSection(_) => {
                let text = dom.as_text(node).unwrap_or_default();
                if self.text_renderer_is_needed(parent, text) {
                    let style = self.objects[parent].style_rc();
                    Some(self.create_text(text, style, Some(node)))
                } else {
                    None
                }
            }
            NodeType::EntityReference(_) => {
                // Entity references are transparent: their children render in
                // the reference's place.
                for &child in dom.children(node) {
                    let _ = self.attach_node(dom, resolver, child)?;
                }
                return Ok(None);
            }
            _ => None,
        };
        let Some(renderer) = created else {
            return Ok(None);
        };

        // STEP 3: Insert it, in DOM order.
        let flow = self.objects[renderer].style.flow_into.clone();
        match flow {
            Some(name) => {
                let thread = self.ensure_render_flow_thread_with_name(&name);
                self.add_child(thread, renderer, None);
            }
            None => {
                let before = self.next_rendered_sibling(dom, node, parent);
                self.add_child(parent, renderer, before);
            }
        }
        if self.objects[renderer].replaced().is_some_and(|r| r.is_widget()) {
            self.add_widget(renderer);
        }

        // STEP 4: Children. Regions show their flow instead.
        if !self.objects[renderer].is_region() && !self.objects[renderer].is_replaced() {
            for &child in dom.children(node) {
                let _ = self.attach_node(dom, resolver, child)?;
            }
        }
        Ok(Some(renderer))
    }

    /// Destroy the renderers of `node` and its subtree.
    ///
    /// # Errors
    ///
    /// [`RenderError::StaleRenderer`] when the node maps to a renderer that
    /// no longer exists.
    pub fn detach_node(&mut self, dom: &DomTree, node: NodeId) -> Result<(), RenderError> {
        let mut nodes = vec![node];
        nodes.extend(dom.descendants(node));
        for n in nodes {
            // Destroying an ancestor takes descendants with it, except those
            // moved into a named flow.
            let Some(renderer) = self.renderer_for_node(n) else {
                continue;
            };
            if !self.objects.contains(renderer) {
                let _ = self.node_map.remove(&n);
                return Err(RenderError::StaleRenderer(renderer));
            }
            self.destroy_and_cleanup_anonymous_wrappers(renderer);
        }
        Ok(())
    }

    /// Apply a new computed style to `node`, rebuilding its renderer when
    /// the style asks for a different kind of box.
    ///
    /// # Errors
    ///
    /// As [`Self::attach_node`].
    pub fn restyle_node(
        &mut self,
        dom: &DomTree,
        resolver: &dyn StyleResolver,
        node: NodeId,
    ) -> Result<(), RenderError> {
        let Some(data) = dom.as_element(node) else {
            return Err(RenderError::UnknownNode(node));
        };
        let tag = data.tag_name.to_ascii_lowercase();
        let style = blockify(resolver.resolve(dom, node).ok_or(RenderError::MissingStyle(node))?);

        let Some(renderer) = self.renderer_for_node(node) else {
            // Possibly display: none before.
            if box_kind(&tag, &style) != BoxKind::Nothing {
                let _ = self.attach_node(dom, resolver, node)?;
            }
            return Ok(());
        };
        if !self.objects.contains(renderer) {
            return Err(RenderError::StaleRenderer(renderer));
        }

        let old = self.objects[renderer].style_rc();
        let reattach = box_kind(&tag, &old) != box_kind(&tag, &style)
            || old.flow_into != style.flow_into
            || old.is_display_inline_type() != style.is_display_inline_type();
        if reattach {
            debug!(target: "arbor::builder", "node {node:?} changes box kind, reattaching");
            self.detach_node(dom, node)?;
            let _ = self.attach_node(dom, resolver, node)?;
            return Ok(());
        }

        let style = Rc::new(style);
        self.set_style(renderer, Rc::clone(&style));
        // Text shares its parent's style.
        for child in self.child_ids(renderer) {
            if self.objects[child].is_text() {
                self.set_style(child, Rc::clone(&style));
            }
        }
        Ok(())
    }

    fn create_element_renderer(
        &mut self,
        dom: &DomTree,
        node: NodeId,
        tag: &str,
        style: RenderStyle,
    ) -> Option<RenderId> {
        let kind = box_kind(tag, &style);
        let style = Rc::new(style);
        match kind {
            BoxKind::Nothing => None,
            BoxKind::Inline => Some(self.create_inline(style, Some(node))),
            BoxKind::Block(flavor) => Some(self.create_block(flavor, style, Some(node))),
            BoxKind::Replaced { widget } => {
                let dimension = |name: &str, default: f32| {
                    dom.attribute(node, name)
                        .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
                        .unwrap_or(default)
                };
                let size = LayoutSize::new(
                    dimension("width", DEFAULT_REPLACED_SIZE.0),
                    dimension("height", DEFAULT_REPLACED_SIZE.1),
                );
                Some(self.create_replaced(size, widget, style, Some(node)))
            }
        }
    }

    /// Renderer that will hold `node`'s renderer, `None` when the node
    /// generates no box because an ancestor does not.
    fn render_parent_of(
        &self,
        dom: &DomTree,
        resolver: &dyn StyleResolver,
        node: NodeId,
    ) -> Result<Option<RenderId>, RenderError> {
        let mut parent = dom.parent(node);
        // Entity references generate no box of their own.
        while let Some(p) = parent.filter(|&p| is_entity_reference(dom, p)) {
            parent = dom.parent(p);
        }
        let Some(parent) = parent else {
            return Err(RenderError::DetachedParent(node));
        };
        if parent == NodeId::ROOT {
            return Ok(Some(self.view));
        }
        if let Some(renderer) = self.renderer_for_node(parent) {
            let obj = &self.objects[renderer];
            if obj.is_region() || obj.is_replaced() {
                return Ok(None);
            }
            return Ok(Some(renderer));
        }
        // No renderer: fine when an ancestor asked for none.
        let mut current = Some(parent);
        while let Some(c) = current.filter(|&c| c != NodeId::ROOT) {
            if let Some(data) = dom.as_element(c) {
                let tag = data.tag_name.to_ascii_lowercase();
                let hidden = resolver.resolve(dom, c).is_some_and(|style| {
                    let kind = box_kind(&tag, &style);
                    matches!(kind, BoxKind::Nothing | BoxKind::Replaced { .. }) || style.flow_from.is_some()
                });
                if hidden {
                    return Ok(None);
                }
            }
            current = dom.parent(c);
        }
        Err(RenderError::DetachedParent(node))
    }

    /// Renderer of the first following DOM sibling rendered under `parent`.
    fn next_rendered_sibling(&self, dom: &DomTree, node: NodeId, parent: RenderId) -> Option<RenderId> {
        let mut sibling = dom.next_sibling(node);
        while let Some(s) = sibling {
            let rendered = self
                .renderer_for_node(s)
                .filter(|&r| self.objects.contains(r) && self.is_descendant_of(r, parent));
            if rendered.is_some() {
                return rendered;
            }
            sibling = dom.next_sibling(s);
        }
        None
    }

    /// Whitespace-only text between blocks generates no box.
    fn text_renderer_is_needed(&self, parent: RenderId, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        if !text.chars().all(char::is_whitespace) {
            return true;
        }
        let parent_obj = &self.objects[parent];
        if parent_obj.style.white_space.preserves_newlines() {
            return true;
        }
        if parent_obj.is_render_inline() {
            return true;
        }
        if parent_obj.is_table_part() || parent_obj.is_table() {
            warn_once("builder", "whitespace text inside table structure dropped");
            return false;
        }
        // Keep it only after inline content it could separate.
        self.objects[parent]
            .last_child
            .is_some_and(|last| self.objects[last].is_inline() && !self.objects[last].is_floating_or_out_of_flow_positioned())
    }
}
