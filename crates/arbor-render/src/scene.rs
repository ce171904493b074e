//! JSON scene descriptions.
//!
//! A scene states a viewport, an element tree with computed styles and an
//! optional list of mutation steps:
//!
//! ```json
//! {
//!   "viewport": { "width": 800, "height": 600 },
//!   "root": {
//!     "tag": "div",
//!     "style": { "display": "block" },
//!     "children": [
//!       { "tag": "span", "id": "s", "style": { "position": "relative", "offsets": { "left": 10, "top": 5 } },
//!         "children": [ { "text": "text" } ] }
//!     ]
//!   },
//!   "steps": [ { "op": "restyle", "target": "s", "style": { "display": "block" } } ]
//! }
//! ```
//!
//! Elements without a `style` get the built-in defaults unless the scene is
//! strict.

use std::collections::HashMap;

use arbor_dom::{DomTree, NodeId};
use log::debug;
use serde::Deserialize;

use crate::builder::ElementStyleMap;
use crate::error::RenderError;
use crate::frame_view::RepaintRecord;
use crate::geometry::{LayoutOffset, LayoutSize};
use crate::style::RenderStyle;
use crate::tree::RenderTree;

/// Viewport size of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SceneViewport {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Default for SceneViewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// One node of a scene's element tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SceneNode {
    /// A text node.
    Text {
        /// Character data.
        text: String,
    },
    /// An element.
    Element {
        /// Tag name.
        tag: String,
        /// `id` attribute, also the name steps refer to.
        #[serde(default)]
        id: Option<String>,
        /// Other attributes.
        #[serde(default)]
        attributes: HashMap<String, String>,
        /// Computed style.
        #[serde(default)]
        style: Option<RenderStyle>,
        /// Children in order.
        #[serde(default)]
        children: Vec<SceneNode>,
    },
}

/// A mutation applied after the first layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SceneStep {
    /// Replace the computed style of an element.
    Restyle {
        /// `id` of the element.
        target: String,
        /// The new style.
        style: RenderStyle,
    },
    /// Remove an element and its subtree.
    Remove {
        /// `id` of the element.
        target: String,
    },
    /// Resize the viewport.
    Resize {
        /// New width.
        width: f32,
        /// New height.
        height: f32,
    },
    /// Scroll the view.
    Scroll {
        /// Horizontal offset.
        x: f32,
        /// Vertical offset.
        y: f32,
    },
}

/// A complete scene.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scene {
    /// Viewport size.
    #[serde(default)]
    pub viewport: SceneViewport,
    /// Initial scroll offset.
    #[serde(default)]
    pub scroll: Option<(f32, f32)>,
    /// Lay out for print with this page height.
    #[serde(default)]
    pub print_page_height: Option<f32>,
    /// Elements without a `style` are an error instead of getting defaults.
    #[serde(default)]
    pub strict: bool,
    /// The document element.
    pub root: SceneNode,
    /// Mutations to replay after the first layout.
    #[serde(default)]
    pub steps: Vec<SceneStep>,
}

/// A scene turned into a DOM and a laid out render tree.
#[derive(Debug)]
pub struct SceneDocument {
    /// The element tree.
    pub dom: DomTree,
    /// The render tree built from it.
    pub tree: RenderTree,
    /// Styles the scene assigned.
    pub styles: ElementStyleMap,
    ids: HashMap<String, NodeId>,
}

impl SceneDocument {
    /// Node of the element with `id`.
    #[must_use]
    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    fn target(&self, id: &str) -> Result<NodeId, RenderError> {
        self.node_by_id(id).ok_or_else(|| RenderError::UnknownTarget(id.to_string()))
    }

    /// Apply one step and lay out again. Returns the repaints it caused.
    ///
    /// # Errors
    ///
    /// Fails when the step names an unknown element or the element can no
    /// longer be rendered.
    pub fn apply(&mut self, step: &SceneStep) -> Result<Vec<RepaintRecord>, RenderError> {
        let _ = self.tree.frame_view_mut().take_repaints();
        match step {
            SceneStep::Restyle { target, style } => {
                let node = self.target(target)?;
                self.styles.insert_node(node, style.clone());
                self.tree.restyle_node(&self.dom, &self.styles, node)?;
            }
            SceneStep::Remove { target } => {
                let node = self.target(target)?;
                self.tree.detach_node(&self.dom, node)?;
                if let Some(parent) = self.dom.parent(node) {
                    self.dom.remove_child(parent, node);
                }
                self.ids.retain(|_, n| *n != node);
            }
            SceneStep::Resize { width, height } => {
                self.tree.set_viewport_size(LayoutSize::new(*width, *height));
            }
            SceneStep::Scroll { x, y } => {
                self.tree.frame_view_mut().set_scroll_offset(LayoutOffset::new(*x, *y));
            }
        }
        self.tree.layout_if_needed();
        debug!(target: "arbor::scene", "applied {step:?}");
        Ok(self.tree.frame_view_mut().take_repaints())
    }
}

impl Scene {
    /// Build the DOM, render tree and first layout of the scene.
    ///
    /// # Errors
    ///
    /// Fails when a strict scene leaves an element without a style.
    pub fn instantiate(&self) -> Result<SceneDocument, RenderError> {
        let mut dom = DomTree::new();
        let mut styles = if self.strict {
            ElementStyleMap::strict()
        } else {
            ElementStyleMap::new()
        };
        let mut ids = HashMap::new();
        add_scene_node(&mut dom, &mut styles, &mut ids, NodeId::ROOT, &self.root);

        let viewport = LayoutSize::new(self.viewport.width, self.viewport.height);
        let mut tree = RenderTree::new(viewport);
        if let Some(height) = self.print_page_height {
            tree.set_printing(true);
            tree.set_page_logical_height(height);
        }
        tree.build_from_dom(&dom, &styles)?;
        tree.layout();
        if let Some((x, y)) = self.scroll {
            tree.frame_view_mut().set_scroll_offset(LayoutOffset::new(x, y));
        }
        Ok(SceneDocument { dom, tree, styles, ids })
    }
}

fn add_scene_node(
    dom: &mut DomTree,
    styles: &mut ElementStyleMap,
    ids: &mut HashMap<String, NodeId>,
    parent: NodeId,
    node: &SceneNode,
) {
    match node {
        SceneNode::Text { text } => {
            let id = dom.create_text(text);
            dom.append_child(parent, id);
        }
        SceneNode::Element {
            tag,
            id,
            attributes,
            style,
            children,
        } => {
            let element = dom.create_element(tag);
            dom.append_child(parent, element);
            for (name, value) in attributes {
                dom.set_attribute(element, name, value);
            }
            if let Some(id) = id {
                dom.set_attribute(element, "id", id);
                let _ = ids.insert(id.clone(), element);
            }
            if let Some(style) = style {
                styles.insert_node(element, style.clone());
            }
            for child in children {
                add_scene_node(dom, styles, ids, element, child);
            }
        }
    }
}
