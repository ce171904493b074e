//! DOM tree for XML documents rendered by arbor.
//!
//! This crate provides an arena-based DOM tree structure following the
//! [DOM Living Standard](https://dom.spec.whatwg.org/), extended with the
//! XML-only node kinds (CDATA sections, entity references, processing
//! instructions, document types) and the `<script>` preparation state machine.
//!
//! # Design
//!
//! The tree uses arena allocation with [`NodeId`] indices for all relationships,
//! providing O(1) access and traversal without borrow checker issues.
//!
//! Script execution can tear the document down while a caller is still in the
//! middle of building it. Callers take a [`LivenessToken`] before handing
//! control to script and check it with [`DomTree::is_alive`] afterwards.

pub mod processing_instruction;
pub mod script;

use std::collections::{HashMap, HashSet};

use strum_macros::Display;
use thiserror::Error;

pub use processing_instruction::{ProcessingInstructionData, StyleSheetKind, StyleSheetRequest};

/// Map of attribute names to values for an element.
pub type AttributesMap = HashMap<String, String>;

/// The XHTML namespace.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// The SVG namespace.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// A type-safe index into the DOM tree.
///
/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
/// "Each node has an associated node document..."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root document node is always at index 0.
    pub const ROOT: Self = Self(0);
}

/// Errors raised by checked tree mutations.
///
/// [§ 4.2.3 Mutation algorithms](https://dom.spec.whatwg.org/#mutation-algorithms)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    /// "HierarchyRequestError": the child kind may not live under the parent.
    #[error("{child} node may not be inserted into {parent} node")]
    HierarchyRequest {
        /// Node name of the prospective parent.
        parent: String,
        /// Node name of the rejected child.
        child: String,
    },
    /// "NotFoundError": the reference node is not a child of the parent.
    #[error("node {0:?} is not a child of the given parent")]
    NotFound(NodeId),
    /// "IndexSizeError": an offset past the end of character data.
    #[error("offset {offset} is larger than the data length {length}")]
    IndexSize {
        /// The requested offset.
        offset: usize,
        /// The length of the node's data.
        length: usize,
    },
    /// The operation is only defined for a different node kind.
    #[error("operation is not supported on {0} nodes")]
    InvalidNodeType(String),
}

/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
///
/// "Node is an abstract interface that is used by all nodes in a tree."
#[derive(Debug, Clone)]
pub struct Node {
    /// "Each node has an associated node type"
    pub node_type: NodeType,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-parent)
    /// "An object that participates in a tree has a parent, which is either
    /// null or an object."
    pub parent: Option<NodeId>,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-child)
    /// "A node has an associated list of children"
    pub children: Vec<NodeId>,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-next-sibling)
    pub next_sibling: Option<NodeId>,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-previous-sibling)
    pub prev_sibling: Option<NodeId>,
}

impl Node {
    const fn detached(node_type: NodeType) -> Self {
        Self {
            node_type,
            parent: None,
            children: Vec::new(),
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
///
/// "Each node has an associated node type"
#[derive(Debug, Clone)]
pub enum NodeType {
    /// [§ 4.5 Interface Document](https://dom.spec.whatwg.org/#interface-document)
    Document,
    /// [§ 4.6 Interface DocumentType](https://dom.spec.whatwg.org/#interface-documenttype)
    DocumentType(DocumentTypeData),
    /// [§ 4.9 Interface Element](https://dom.spec.whatwg.org/#interface-element)
    Element(ElementData),
    /// [§ 4.10 Interface Text](https://dom.spec.whatwg.org/#interface-text)
    Text(String),
    /// [§ 4.11 Interface CDATASection](https://dom.spec.whatwg.org/#interface-cdatasection)
    ///
    /// "CDATASection nodes are known as CDATA sections." They behave as text
    /// whose serialization is not escaped.
    CDataSection(String),
    /// [§ 4.14 Interface Comment](https://dom.spec.whatwg.org/#interface-comment)
    Comment(String),
    /// [§ 4.13 Interface ProcessingInstruction](https://dom.spec.whatwg.org/#interface-processinginstruction)
    ProcessingInstruction(ProcessingInstructionData),
    /// An unexpanded entity reference, named by the entity.
    ///
    /// Its children are the entity's replacement content.
    EntityReference(String),
}

/// The coarse kind of a node, used for child-type validation and names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum NodeKind {
    /// A document node.
    Document,
    /// A doctype node.
    DocumentType,
    /// An element.
    Element,
    /// A text node.
    Text,
    /// A CDATA section.
    CDataSection,
    /// A comment.
    Comment,
    /// A processing instruction.
    ProcessingInstruction,
    /// An entity reference.
    EntityReference,
}

impl NodeType {
    /// The coarse kind of this node.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Document => NodeKind::Document,
            Self::DocumentType(_) => NodeKind::DocumentType,
            Self::Element(_) => NodeKind::Element,
            Self::Text(_) => NodeKind::Text,
            Self::CDataSection(_) => NodeKind::CDataSection,
            Self::Comment(_) => NodeKind::Comment,
            Self::ProcessingInstruction(_) => NodeKind::ProcessingInstruction,
            Self::EntityReference(_) => NodeKind::EntityReference,
        }
    }
}

/// [§ 4.6 Interface DocumentType](https://dom.spec.whatwg.org/#interface-documenttype)
///
/// "Doctypes have an associated name, public ID, and system ID."
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTypeData {
    /// The doctype name (`html`, `svg`, ...).
    pub name: String,
    /// The public identifier, empty if absent.
    pub public_id: String,
    /// The system identifier, empty if absent.
    pub system_id: String,
}

impl DocumentTypeData {
    /// Whether the public identifier names one of the XHTML DTDs.
    ///
    /// Documents declaring these get the XHTML entity set and are treated as
    /// XHTML even when served as generic XML.
    #[must_use]
    pub fn is_xhtml(&self) -> bool {
        const XHTML_PUBLIC_IDS: &[&str] = &[
            "-//W3C//DTD XHTML 1.0 Transitional//EN",
            "-//W3C//DTD XHTML 1.1//EN",
            "-//W3C//DTD XHTML 1.0 Strict//EN",
            "-//W3C//DTD XHTML 1.0 Frameset//EN",
            "-//W3C//DTD XHTML Basic 1.0//EN",
            "-//W3C//DTD XHTML 1.1 plus MathML 2.0//EN",
            "-//W3C//DTD XHTML 1.1 plus MathML 2.0 plus SVG 1.1//EN",
            "-//WAPFORUM//DTD XHTML Mobile 1.0//EN",
            "-//WAPFORUM//DTD XHTML Mobile 1.1//EN",
            "-//WAPFORUM//DTD XHTML Mobile 1.2//EN",
        ];
        XHTML_PUBLIC_IDS.contains(&self.public_id.as_str())
    }
}

/// Element-specific data.
///
/// Per [§ 4.9 Interface Element](https://dom.spec.whatwg.org/#interface-element):
/// "Elements have an associated namespace, namespace prefix, local name..."
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// "An element's local name"
    pub tag_name: String,
    /// "An element's namespace", `None` for the null namespace.
    pub namespace: Option<String>,
    /// "An element's namespace prefix"
    pub prefix: Option<String>,
    /// "An element has an associated attribute list"
    pub attrs: AttributesMap,
}

impl ElementData {
    /// An element in the null namespace with no attributes.
    #[must_use]
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            ..Self::default()
        }
    }

    /// An element in `namespace` with no attributes.
    #[must_use]
    pub fn with_namespace(tag_name: &str, namespace: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            namespace: Some(namespace.to_string()),
            ..Self::default()
        }
    }

    /// Returns the element's id attribute value if present.
    #[must_use]
    pub fn id(&self) -> Option<&String> {
        self.attrs.get("id")
    }

    /// Returns the set of class names from the class attribute.
    #[must_use]
    pub fn classes(&self) -> HashSet<&str> {
        self.attrs
            .get("class")
            .map(|list| list.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    /// The qualified name: `prefix:local` or just the local name.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.tag_name),
            None => self.tag_name.clone(),
        }
    }

    /// Whether this element is in `namespace`.
    #[must_use]
    pub fn is_in_namespace(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }

    /// Whether this element is an HTML or SVG `<script>`.
    #[must_use]
    pub fn is_script(&self) -> bool {
        self.tag_name == "script"
            && (self.is_in_namespace(XHTML_NAMESPACE) || self.is_in_namespace(SVG_NAMESPACE))
    }
}

/// Events queued against DOM nodes.
///
/// Loads and script fetches report their outcome as events on the element
/// that started them; the host drains them with [`DomTree::take_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DomEventKind {
    /// The resource loaded and, for scripts, executed.
    #[strum(serialize = "load")]
    Load,
    /// The resource failed to load.
    #[strum(serialize = "error")]
    Error,
    /// A resource is about to be requested.
    #[strum(serialize = "beforeload")]
    BeforeLoad,
}

/// One queued DOM event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// The node the event fires on.
    pub target: NodeId,
    /// What happened.
    pub kind: DomEventKind,
}

/// A snapshot of the document's lifetime.
///
/// Anything that can run script hands control away; when it gets control
/// back the document may have been detached (and possibly rebuilt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessToken {
    generation: u64,
}

/// Arena-based DOM tree with O(1) node access and traversal.
///
/// [§ 4 Nodes](https://dom.spec.whatwg.org/#nodes)
///
/// "The DOM represents a document as a tree."
#[derive(Debug, Clone)]
pub struct DomTree {
    /// All nodes in the tree, indexed by `NodeId`.
    /// The Document node is always at index 0 (`NodeId::ROOT`).
    nodes: Vec<Node>,
    events: Vec<DomEvent>,
    generation: u64,
    detached: bool,
    pending_style_sheets: usize,
    xhtml: bool,
    url: Option<String>,
}

impl DomTree {
    /// Create a new DOM tree with just the Document node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::detached(NodeType::Document)],
            events: Vec::new(),
            generation: 0,
            detached: false,
            pending_style_sheets: 0,
            xhtml: false,
            url: None,
        }
    }

    /// Get the root document node ID.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by its ID.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Get a mutable reference to a node by its ID.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Get the number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty (should always have at least the Document).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a new node and return its ID.
    /// The node is not yet attached to the tree.
    pub fn alloc(&mut self, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::detached(node_type));
        id
    }

    /// Allocate an element in the null namespace.
    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.alloc(NodeType::Element(ElementData::new(tag_name)))
    }

    /// Allocate a text node.
    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.alloc(NodeType::Text(data.to_string()))
    }

    /// The document URL, used as the script URL for inline scripts.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Set the document URL.
    pub fn set_url(&mut self, url: &str) {
        self.url = Some(url.to_string());
    }

    /// Whether the document was recognised as XHTML.
    #[must_use]
    pub const fn is_xhtml(&self) -> bool {
        self.xhtml
    }

    /// Mark the document as XHTML.
    pub const fn set_xhtml(&mut self, xhtml: bool) {
        self.xhtml = xhtml;
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// [§ 4.2.2 Append](https://dom.spec.whatwg.org/#concept-node-append)
    ///
    /// "To append a node to a parent, pre-insert node into parent before null."
    ///
    /// Appends `child` as the last child of `parent`, updating all relationships.
    /// If `child` already has a parent it is removed from it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach_from_parent(child);

        let prev_last_child = self.nodes[parent.0].children.last().copied();
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);

        if let Some(prev_id) = prev_last_child {
            self.nodes[prev_id.0].next_sibling = Some(child);
            self.nodes[child.0].prev_sibling = Some(prev_id);
        }
    }

    /// [§ 4.2.3 Pre-insert](https://dom.spec.whatwg.org/#concept-node-pre-insert)
    ///
    /// Inserts `new_child` into `parent` immediately before `reference`.
    /// Does nothing if `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, new_child: NodeId, reference: NodeId) {
        if self.parent(reference) != Some(parent) {
            return;
        }
        self.detach_from_parent(new_child);

        let Some(index) = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == reference)
        else {
            return;
        };
        self.nodes[parent.0].children.insert(index, new_child);
        self.nodes[new_child.0].parent = Some(parent);

        let prev = self.nodes[reference.0].prev_sibling;
        self.nodes[new_child.0].prev_sibling = prev;
        self.nodes[new_child.0].next_sibling = Some(reference);
        self.nodes[reference.0].prev_sibling = Some(new_child);
        if let Some(prev) = prev {
            self.nodes[prev.0].next_sibling = Some(new_child);
        }
    }

    /// [§ 4.2.3 Remove](https://dom.spec.whatwg.org/#concept-node-remove)
    ///
    /// Removes `child` from `parent`. The node stays allocated and can be
    /// re-inserted elsewhere.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if self.parent(child) == Some(parent) {
            self.detach_from_parent(child);
        }
    }

    /// Moves every child of `from` to the end of `to`, preserving order.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = self.nodes[from.0].children.clone();
        for child in children {
            self.append_child(to, child);
        }
    }

    /// Appends `child` after checking the parent accepts its kind.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::HierarchyRequest`] if `parent` may not contain a
    /// node of `child`'s kind.
    pub fn checked_append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.ensure_child_allowed(parent, child)?;
        self.append_child(parent, child);
        Ok(())
    }

    /// Inserts `new_child` before `reference` after validating both the
    /// child kind and that `reference` really is a child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::HierarchyRequest`] for a disallowed child kind and
    /// [`DomError::NotFound`] when `reference` is not a child of `parent`.
    pub fn checked_insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.ensure_child_allowed(parent, new_child)?;
        match reference {
            Some(reference) if self.parent(reference) != Some(parent) => {
                Err(DomError::NotFound(reference))
            }
            Some(reference) => {
                self.insert_before(parent, new_child, reference);
                Ok(())
            }
            None => {
                self.append_child(parent, new_child);
                Ok(())
            }
        }
    }

    fn ensure_child_allowed(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let child_kind = self.nodes[child.0].node_type.kind();
        let allowed = self.child_type_allowed(parent, child_kind)
            && child != parent
            && !self.is_descendant_of(parent, child);
        if allowed {
            Ok(())
        } else {
            Err(DomError::HierarchyRequest {
                parent: self.node_name(parent),
                child: self.node_name(child),
            })
        }
    }

    /// Whether `parent` may contain a child of kind `child`.
    ///
    /// [§ 4.2.3 Ensure pre-insertion validity](https://dom.spec.whatwg.org/#concept-node-ensure-pre-insertion-validity)
    ///
    /// Entity references accept the same content as elements. A document
    /// accepts at most one element and one doctype.
    #[must_use]
    pub fn child_type_allowed(&self, parent: NodeId, child: NodeKind) -> bool {
        let Some(node) = self.get(parent) else {
            return false;
        };
        match node.node_type.kind() {
            NodeKind::Document => match child {
                NodeKind::Element => self.document_element().is_none(),
                NodeKind::DocumentType => self.doctype().is_none(),
                NodeKind::Comment | NodeKind::ProcessingInstruction => true,
                _ => false,
            },
            NodeKind::Element | NodeKind::EntityReference => matches!(
                child,
                NodeKind::Element
                    | NodeKind::Text
                    | NodeKind::CDataSection
                    | NodeKind::Comment
                    | NodeKind::ProcessingInstruction
                    | NodeKind::EntityReference
            ),
            NodeKind::DocumentType
            | NodeKind::Text
            | NodeKind::CDataSection
            | NodeKind::Comment
            | NodeKind::ProcessingInstruction => false,
        }
    }

    fn detach_from_parent(&mut self, child: NodeId) {
        let Some(parent) = self.nodes[child.0].parent else {
            return;
        };
        let prev = self.nodes[child.0].prev_sibling;
        let next = self.nodes[child.0].next_sibling;
        if let Some(prev) = prev {
            self.nodes[prev.0].next_sibling = next;
        }
        if let Some(next) = next {
            self.nodes[next.0].prev_sibling = prev;
        }
        self.nodes[parent.0].children.retain(|&c| c != child);
        let node = &mut self.nodes[child.0];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// [§ 4.11 splitText()](https://dom.spec.whatwg.org/#dom-text-splittext)
    ///
    /// "Splits data at the given offset and returns the remainder as a Text
    /// node." A CDATA section splits into another CDATA section.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::IndexSize`] when `offset` is past the end of the
    /// data and [`DomError::InvalidNodeType`] for non-text nodes.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let make: fn(String) -> NodeType = match self.nodes[id.0].node_type.kind() {
            NodeKind::Text => NodeType::Text,
            NodeKind::CDataSection => NodeType::CDataSection,
            other => return Err(DomError::InvalidNodeType(other.to_string())),
        };
        let tail = match &mut self.nodes[id.0].node_type {
            NodeType::Text(data) | NodeType::CDataSection(data) => {
                let length = data.chars().count();
                if offset > length {
                    return Err(DomError::IndexSize { offset, length });
                }
                let byte_offset = data
                    .char_indices()
                    .nth(offset)
                    .map_or(data.len(), |(i, _)| i);
                data.split_off(byte_offset)
            }
            _ => String::new(),
        };

        let new_node = self.alloc(make(tail));
        if let Some(parent) = self.parent(id) {
            match self.next_sibling(id) {
                Some(next) => self.insert_before(parent, new_node, next),
                None => self.append_child(parent, new_node),
            }
        }
        Ok(new_node)
    }

    /// Sets an attribute on an element. Ignored for non-elements.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.as_element_mut(id) {
            let _ = element.attrs.insert(name.to_string(), value.to_string());
        }
    }

    /// Reads an attribute from an element.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.as_element(id)
            .and_then(|e| e.attrs.get(name))
            .map(String::as_str)
    }

    /// Appends `data` to a text-like node's data.
    pub fn append_data(&mut self, id: NodeId, data: &str) {
        if let Some(node) = self.get_mut(id) {
            match &mut node.node_type {
                NodeType::Text(existing)
                | NodeType::CDataSection(existing)
                | NodeType::Comment(existing) => existing.push_str(data),
                _ => {}
            }
        }
    }

    // ---------------------------------------------------------------------
    // Traversal
    // ---------------------------------------------------------------------

    /// Get the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Get all children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Get the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.children.first().copied())
    }

    /// Get the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.children.last().copied())
    }

    /// Get the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling)
    }

    /// Get the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling)
    }

    /// [§ 4.2.6 Descendant](https://dom.spec.whatwg.org/#concept-tree-descendant)
    ///
    /// Check if `descendant` is a descendant of `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, descendant: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(descendant).any(|id| id == ancestor)
    }

    /// [§ 4.2.6 Connected](https://dom.spec.whatwg.org/#connected)
    ///
    /// "A node is connected if its shadow-including root is a document."
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        id == NodeId::ROOT || self.is_descendant_of(id, NodeId::ROOT)
    }

    /// Iterate over all ancestors of a node, from parent to root.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> AncestorIterator<'_> {
        AncestorIterator {
            tree: self,
            current: self.parent(id),
        }
    }

    /// Iterate over preceding siblings (from immediately before to first child).
    #[must_use]
    pub fn preceding_siblings(&self, id: NodeId) -> PrecedingSiblingIterator<'_> {
        PrecedingSiblingIterator {
            tree: self,
            current: self.prev_sibling(id),
        }
    }

    /// Iterate over the subtree rooted at `id` in document order.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Get element data if this node is an element.
    #[must_use]
    pub fn as_element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(|n| match &n.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        })
    }

    /// Get mutable element data if this node is an element.
    pub fn as_element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(|n| match &mut n.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        })
    }

    /// Get text content if this node is a text or CDATA node.
    #[must_use]
    pub fn as_text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.node_type {
            NodeType::Text(s) | NodeType::CDataSection(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// [§ 4.4 nodeName](https://dom.spec.whatwg.org/#dom-node-nodename)
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return String::new();
        };
        match &node.node_type {
            NodeType::Document => "#document".to_string(),
            NodeType::DocumentType(doctype) => doctype.name.clone(),
            NodeType::Element(data) => data.qualified_name(),
            NodeType::Text(_) => "#text".to_string(),
            NodeType::CDataSection(_) => "#cdata-section".to_string(),
            NodeType::Comment(_) => "#comment".to_string(),
            NodeType::ProcessingInstruction(pi) => pi.target.clone(),
            NodeType::EntityReference(name) => name.clone(),
        }
    }

    /// [§ 4.4 textContent](https://dom.spec.whatwg.org/#dom-node-textcontent)
    ///
    /// Concatenation of the text and CDATA descendants in tree order.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.as_text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.as_text(d))
            .collect()
    }

    /// [§ 3.1.1 The document element](https://html.spec.whatwg.org/multipage/dom.html#the-html-element-2)
    ///
    /// "The document element of a document is the element whose parent is that
    /// document, if it exists; otherwise null."
    #[must_use]
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(NodeId::ROOT)
            .iter()
            .find(|&&id| self.as_element(id).is_some())
            .copied()
    }

    /// The document's doctype node, if any.
    #[must_use]
    pub fn doctype(&self) -> Option<NodeId> {
        self.children(NodeId::ROOT)
            .iter()
            .find(|&&id| {
                matches!(
                    self.get(id).map(|n| &n.node_type),
                    Some(NodeType::DocumentType(_))
                )
            })
            .copied()
    }

    /// [§ 3.1.3 The body element](https://html.spec.whatwg.org/multipage/dom.html#the-body-element-2)
    ///
    /// "The body element of a document is the first of the html element's children
    /// that is either a body element or a frameset element, or null if there is
    /// no such element."
    #[must_use]
    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;

        self.children(html)
            .iter()
            .find(|&&id| {
                self.as_element(id).is_some_and(|e| {
                    let tag = e.tag_name.to_ascii_lowercase();
                    tag == "body" || tag == "frameset"
                })
            })
            .copied()
    }

    // ---------------------------------------------------------------------
    // Document state
    // ---------------------------------------------------------------------

    /// Queue an event for the host.
    pub fn dispatch_event(&mut self, target: NodeId, kind: DomEventKind) {
        self.events.push(DomEvent { target, kind });
    }

    /// Drain all queued events.
    pub fn take_events(&mut self) -> Vec<DomEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queued events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[DomEvent] {
        &self.events
    }

    /// Take a token describing the document as it is right now.
    #[must_use]
    pub const fn liveness_token(&self) -> LivenessToken {
        LivenessToken {
            generation: self.generation,
        }
    }

    /// Whether the document is still the one `token` was taken from.
    #[must_use]
    pub const fn is_alive(&self, token: LivenessToken) -> bool {
        !self.detached && self.generation == token.generation
    }

    /// Whether the document has been torn down.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.detached
    }

    /// Tear the document down. Idempotent.
    ///
    /// Every token taken before this call stops being alive.
    pub const fn detach(&mut self) {
        if !self.detached {
            self.detached = true;
            self.generation += 1;
        }
    }

    /// A style sheet started loading.
    pub const fn add_pending_style_sheet(&mut self) {
        self.pending_style_sheets += 1;
    }

    /// A style sheet finished loading.
    pub const fn remove_pending_style_sheet(&mut self) {
        self.pending_style_sheets = self.pending_style_sheets.saturating_sub(1);
    }

    /// Whether every requested style sheet has loaded.
    #[must_use]
    pub const fn have_style_sheets_loaded(&self) -> bool {
        self.pending_style_sheets == 0
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over ancestors of a node.
pub struct AncestorIterator<'a> {
    tree: &'a DomTree,
    current: Option<NodeId>,
}

impl Iterator for AncestorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.tree.parent(id);
        Some(id)
    }
}

/// Iterator over preceding siblings of a node.
pub struct PrecedingSiblingIterator<'a> {
    tree: &'a DomTree,
    current: Option<NodeId>,
}

impl Iterator for PrecedingSiblingIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.tree.prev_sibling(id);
        Some(id)
    }
}

/// Print a DOM tree for debugging, one node per line.
pub fn print_tree(tree: &DomTree, id: NodeId, indent: usize) {
    for line in dump_tree(tree, id, indent) {
        println!("{line}");
    }
}

/// Render a DOM subtree as indented lines.
#[must_use]
pub fn dump_tree(tree: &DomTree, id: NodeId, indent: usize) -> Vec<String> {
    let mut lines = Vec::new();
    dump_into(tree, id, indent, &mut lines);
    lines
}

fn dump_into(tree: &DomTree, id: NodeId, indent: usize, lines: &mut Vec<String>) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let prefix = "  ".repeat(indent);
    let line = match &node.node_type {
        NodeType::Document => "#document".to_string(),
        NodeType::DocumentType(doctype) => format!("<!DOCTYPE {}>", doctype.name),
        NodeType::Element(data) => {
            let mut attrs: Vec<_> = data.attrs.iter().collect();
            attrs.sort();
            let attrs: String = attrs
                .into_iter()
                .map(|(k, v)| format!(" {k}=\"{v}\""))
                .collect();
            format!("<{}{attrs}>", data.qualified_name())
        }
        NodeType::Text(text) => format!("\"{}\"", text.escape_debug()),
        NodeType::CDataSection(text) => format!("<![CDATA[{text}]]>"),
        NodeType::Comment(text) => format!("<!--{text}-->"),
        NodeType::ProcessingInstruction(pi) => format!("<?{} {}?>", pi.target, pi.data),
        NodeType::EntityReference(name) => format!("&{name};"),
    };
    lines.push(format!("{prefix}{line}"));
    for &child in tree.children(id) {
        dump_into(tree, child, indent + 1, lines);
    }
}
