//! The render tree: arena storage, child-list primitives and traversal.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use arbor_common::warning::warn_once;
use arbor_dom::NodeId;

use crate::arena::Arena;
use crate::frame_view::FrameView;
use crate::geometry::{LayoutSize, rect};
use crate::layer::{LayerId, RenderLayer};
use crate::line_box::{ApproximateFontMetrics, FontMetrics};
use crate::object::{
    BlockData, BlockFlavor, InlineData, RenderFlags, RenderId, RenderKind, RenderObject,
    ReplacedData, TextData,
};
use crate::style::{Display, RenderStyle};
use crate::view::ViewState;

/// Owner of every render object and layer of one document.
///
/// Objects refer to each other by [`RenderId`]; an id stops resolving once
/// its object is destroyed.
pub struct RenderTree {
    pub(crate) objects: Arena<RenderObject>,
    pub(crate) layers: Arena<RenderLayer>,
    pub(crate) view: RenderId,
    pub(crate) view_state: ViewState,
    pub(crate) frame_view: FrameView,
    pub(crate) font_metrics: Box<dyn FontMetrics>,
    pub(crate) node_map: HashMap<NodeId, RenderId>,
    pub(crate) document_being_destroyed: bool,
}

impl fmt::Debug for RenderTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTree")
            .field("objects", &self.objects.len())
            .field("layers", &self.layers.len())
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl RenderTree {
    /// A tree holding only the view, sized to `viewport`.
    #[must_use]
    pub fn new(viewport: LayoutSize) -> Self {
        Self::with_font_metrics(viewport, Box::new(ApproximateFontMetrics))
    }

    /// Like [`Self::new`], measuring text with `font_metrics`.
    #[must_use]
    pub fn with_font_metrics(viewport: LayoutSize, font_metrics: Box<dyn FontMetrics>) -> Self {
        let mut objects = Arena::new();
        let mut view_object = RenderObject::new(RenderKind::View, Rc::new(RenderStyle::block()), None);
        view_object.flags |= RenderFlags::CHILDREN_INLINE | RenderFlags::HAS_BOX_DECORATIONS;
        view_object.frame_rect = rect(0.0, 0.0, viewport.width, viewport.height);
        let view = objects.insert(view_object);

        let mut tree = Self {
            objects,
            layers: Arena::new(),
            view,
            view_state: ViewState::default(),
            frame_view: FrameView::new(viewport),
            font_metrics,
            node_map: HashMap::new(),
            document_being_destroyed: false,
        };
        tree.create_layer(view);
        tree.set_needs_layout(view, crate::layout_bits::MarkingBehavior::MarkOnlyThis);
        tree
    }

    // ========== Access ==========

    /// The root view.
    #[must_use]
    pub const fn view(&self) -> RenderId {
        self.view
    }

    /// The object behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was destroyed.
    #[must_use]
    pub fn get(&self, id: RenderId) -> &RenderObject {
        &self.objects[id]
    }

    /// The object behind `id`, if it is still alive.
    #[must_use]
    pub fn try_get(&self, id: RenderId) -> Option<&RenderObject> {
        self.objects.get(id)
    }

    /// Whether `id` refers to a live object.
    #[must_use]
    pub fn contains(&self, id: RenderId) -> bool {
        self.objects.contains(id)
    }

    /// Number of live objects, the view included.
    #[must_use]
    pub const fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Style of `id`.
    #[must_use]
    pub fn style(&self, id: RenderId) -> &RenderStyle {
        &self.objects[id].style
    }

    /// The layer behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if the layer was destroyed.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> &RenderLayer {
        &self.layers[id]
    }

    /// Renderer generated for `node`, if any.
    #[must_use]
    pub fn renderer_for_node(&self, node: NodeId) -> Option<RenderId> {
        self.node_map.get(&node).copied()
    }

    /// The frame view hosting the document.
    #[must_use]
    pub const fn frame_view(&self) -> &FrameView {
        &self.frame_view
    }

    /// Mutable access to the frame view.
    pub const fn frame_view_mut(&mut self) -> &mut FrameView {
        &mut self.frame_view
    }

    /// Text measurement in use.
    #[must_use]
    pub fn font_metrics(&self) -> &dyn FontMetrics {
        self.font_metrics.as_ref()
    }

    /// Whether the whole document is being torn down.
    #[must_use]
    pub const fn document_being_destroyed(&self) -> bool {
        self.document_being_destroyed
    }

    // ========== Creation ==========

    /// Allocate a detached renderer and apply its initial style.
    pub fn create_renderer(
        &mut self,
        kind: RenderKind,
        style: Rc<RenderStyle>,
        node: Option<NodeId>,
    ) -> RenderId {
        let id = self.objects.insert(RenderObject::new(kind, style, node));
        if let Some(node) = node {
            let _ = self.node_map.insert(node, id);
        }
        self.initialize_style(id);
        id
    }

    /// Allocate a renderer the tree generated for itself. Only these are
    /// anonymous; a node-less renderer made through [`Self::create_renderer`]
    /// is a real box.
    pub(crate) fn create_anonymous_renderer(&mut self, kind: RenderKind, style: Rc<RenderStyle>) -> RenderId {
        let mut object = RenderObject::new(kind, style, None);
        object.flags |= RenderFlags::ANONYMOUS;
        let id = self.objects.insert(object);
        self.initialize_style(id);
        id
    }

    /// A block container with the given flavor.
    pub fn create_block(
        &mut self,
        flavor: BlockFlavor,
        style: Rc<RenderStyle>,
        node: Option<NodeId>,
    ) -> RenderId {
        self.create_renderer(RenderKind::Block(BlockData::new(flavor)), style, node)
    }

    /// An inline box.
    pub fn create_inline(&mut self, style: Rc<RenderStyle>, node: Option<NodeId>) -> RenderId {
        self.create_renderer(RenderKind::Inline(InlineData::default()), style, node)
    }

    /// A text run sharing `style` with its parent.
    pub fn create_text(&mut self, text: &str, style: Rc<RenderStyle>, node: Option<NodeId>) -> RenderId {
        let data = TextData {
            text: text.to_string(),
            boxes: Vec::new(),
        };
        self.create_renderer(RenderKind::Text(data), style, node)
    }

    /// Replaced content with a natural size.
    pub fn create_replaced(
        &mut self,
        intrinsic_size: LayoutSize,
        widget: bool,
        style: Rc<RenderStyle>,
        node: Option<NodeId>,
    ) -> RenderId {
        let data = ReplacedData {
            intrinsic_size,
            widget,
        };
        self.create_renderer(RenderKind::Replaced(data), style, node)
    }

    /// An anonymous block inheriting from `parent`.
    pub fn create_anonymous_block(&mut self, parent: RenderId) -> RenderId {
        self.create_anonymous_with_display(parent, Display::Block, BlockFlavor::Flow)
    }

    pub(crate) fn create_anonymous_with_display(
        &mut self,
        parent: RenderId,
        display: Display,
        flavor: BlockFlavor,
    ) -> RenderId {
        let style = RenderStyle::create_anonymous_style_with_display(self.style(parent), display);
        self.create_anonymous_renderer(RenderKind::Block(BlockData::new(flavor)), Rc::new(style))
    }

    // ========== Child list primitives ==========

    /// Link `child` into `owner` before `before_child` (appending when
    /// `None`). With `notify`, layer and flow-thread bookkeeping runs.
    pub(crate) fn insert_child_node(
        &mut self,
        owner: RenderId,
        child: RenderId,
        before_child: Option<RenderId>,
        notify: bool,
    ) {
        debug_assert!(self.objects[child].parent.is_none(), "child {child} already has a parent");

        let mut before_child = before_child;
        while let Some(before) = before_child {
            match self.objects[before].parent {
                Some(p) if p != owner => before_child = Some(p),
                _ => break,
            }
        }
        if before_child.is_some_and(|before| self.objects[before].parent != Some(owner)) {
            warn_once("render", "insertion point is not a child of the new parent");
            return;
        }

        match before_child {
            None => {
                let last = self.objects[owner].last_child;
                if let Some(last) = last {
                    self.objects[last].next_sibling = Some(child);
                } else {
                    self.objects[owner].first_child = Some(child);
                }
                self.objects[child].prev_sibling = last;
                self.objects[child].next_sibling = None;
                self.objects[owner].last_child = Some(child);
            }
            Some(before) => {
                let prev = self.objects[before].prev_sibling;
                self.objects[before].prev_sibling = Some(child);
                self.objects[child].next_sibling = Some(before);
                self.objects[child].prev_sibling = prev;
                match prev {
                    Some(prev) => self.objects[prev].next_sibling = Some(child),
                    None => self.objects[owner].first_child = Some(child),
                }
            }
        }
        self.objects[child].parent = Some(owner);

        if !self.document_being_destroyed && notify {
            self.inserted_into_tree(child);
        }

        self.set_needs_layout_and_pref_widths_recalc(child);
        if !self.objects[owner].normal_child_needs_layout() {
            // The parent may supply the static position of a positioned child.
            self.set_child_needs_layout(owner, crate::layout_bits::MarkingBehavior::MarkContainingBlockChain);
        }
    }

    /// Unlink `child` from `owner`.
    pub(crate) fn remove_child_node(&mut self, owner: RenderId, child: RenderId, notify: bool) -> RenderId {
        debug_assert_eq!(self.objects[child].parent, Some(owner));

        if self.objects[child].is_floating_or_out_of_flow_positioned() {
            self.remove_floating_or_positioned_child_from_block_lists(child);
        }

        if !self.document_being_destroyed && notify && self.objects[child].ever_had_layout() {
            self.set_needs_layout_and_pref_widths_recalc(child);
            self.repaint(child);
        }

        if !self.document_being_destroyed && self.is_selection_border(child) {
            self.clear_selection();
        }

        if !self.document_being_destroyed && notify {
            self.will_be_removed_from_tree(child);
        }

        let (prev, next) = {
            let obj = &self.objects[child];
            (obj.prev_sibling, obj.next_sibling)
        };
        match prev {
            Some(prev) => self.objects[prev].next_sibling = next,
            None => self.objects[owner].first_child = next,
        }
        match next {
            Some(next) => self.objects[next].prev_sibling = prev,
            None => self.objects[owner].last_child = prev,
        }
        let obj = &mut self.objects[child];
        obj.parent = None;
        obj.prev_sibling = None;
        obj.next_sibling = None;
        child
    }

    // ========== Traversal ==========

    /// Parent of `id`.
    #[must_use]
    pub fn parent(&self, id: RenderId) -> Option<RenderId> {
        self.objects[id].parent
    }

    /// Children of `id` in order.
    #[must_use]
    pub fn children(&self, id: RenderId) -> Children<'_> {
        Children {
            tree: self,
            next: self.objects[id].first_child,
        }
    }

    /// Children of `id`, collected so the tree can be mutated while walking.
    #[must_use]
    pub fn child_ids(&self, id: RenderId) -> Vec<RenderId> {
        self.children(id).collect()
    }

    /// The `index`th child of `id`.
    #[must_use]
    pub fn child_at(&self, id: RenderId, index: usize) -> Option<RenderId> {
        self.children(id).nth(index)
    }

    /// Next object in pre-order, not leaving `stay_within`.
    #[must_use]
    pub fn next_in_pre_order(&self, id: RenderId, stay_within: Option<RenderId>) -> Option<RenderId> {
        if let Some(first) = self.objects[id].first_child {
            return Some(first);
        }
        self.next_in_pre_order_after_children(id, stay_within)
    }

    /// Next object in pre-order after the subtree of `id`.
    #[must_use]
    pub fn next_in_pre_order_after_children(
        &self,
        id: RenderId,
        stay_within: Option<RenderId>,
    ) -> Option<RenderId> {
        if Some(id) == stay_within {
            return None;
        }
        let mut current = id;
        loop {
            if let Some(next) = self.objects[current].next_sibling {
                return Some(next);
            }
            current = self.objects[current].parent?;
            if Some(current) == stay_within {
                return None;
            }
        }
    }

    /// Previous object in pre-order.
    #[must_use]
    pub fn previous_in_pre_order(&self, id: RenderId) -> Option<RenderId> {
        match self.objects[id].prev_sibling {
            Some(prev) => Some(self.last_leaf_child(prev).unwrap_or(prev)),
            None => self.objects[id].parent,
        }
    }

    /// Deepest first descendant.
    #[must_use]
    pub fn first_leaf_child(&self, id: RenderId) -> Option<RenderId> {
        let mut leaf = self.objects[id].first_child?;
        while let Some(first) = self.objects[leaf].first_child {
            leaf = first;
        }
        Some(leaf)
    }

    /// Deepest last descendant.
    #[must_use]
    pub fn last_leaf_child(&self, id: RenderId) -> Option<RenderId> {
        let mut leaf = self.objects[id].last_child?;
        while let Some(last) = self.objects[leaf].last_child {
            leaf = last;
        }
        Some(leaf)
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_descendant_of(&self, id: RenderId, ancestor: RenderId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.objects[c].parent;
        }
        false
    }

    /// Whether `id` hangs below the view.
    #[must_use]
    pub fn is_rooted(&self, id: RenderId) -> bool {
        let mut current = id;
        while let Some(parent) = self.objects[current].parent {
            current = parent;
        }
        current == self.view
    }

    /// Every object below `id` in pre-order, `id` excluded.
    #[must_use]
    pub fn descendants(&self, id: RenderId) -> Vec<RenderId> {
        let mut out = Vec::new();
        let mut current = self.next_in_pre_order(id, Some(id));
        while let Some(c) = current {
            out.push(c);
            current = self.next_in_pre_order(c, Some(id));
        }
        out
    }
}

/// Iterator over the children of one object.
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a RenderTree,
    next: Option<RenderId>,
}

impl Iterator for Children<'_> {
    type Item = RenderId;

    fn next(&mut self) -> Option<RenderId> {
        let current = self.next?;
        self.next = self.tree.objects[current].next_sibling;
        Some(current)
    }
}
