//! Tests for DOM tree mutation methods: remove_child, insert_before, move_children,
//! checked insertion and split_text.

use arbor_dom::{DomError, DomTree, NodeId, NodeKind, NodeType, ProcessingInstructionData};

/// Helper to create an element node and return its NodeId.
fn alloc_element(tree: &mut DomTree, tag: &str) -> NodeId {
    tree.create_element(tag)
}

// ========== remove_child ==========

#[test]
fn test_remove_child_middle_of_three() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    tree.append_child(NodeId::ROOT, parent);

    let a = alloc_element(&mut tree, "a");
    let b = alloc_element(&mut tree, "b");
    let c = alloc_element(&mut tree, "c");
    tree.append_child(parent, a);
    tree.append_child(parent, b);
    tree.append_child(parent, c);

    tree.remove_child(parent, b);

    assert_eq!(tree.children(parent), &[a, c]);
    assert_eq!(tree.next_sibling(a), Some(c));
    assert_eq!(tree.prev_sibling(c), Some(a));
    assert_eq!(tree.parent(b), None);
}

#[test]
fn test_remove_child_wrong_parent_is_ignored() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    let other = alloc_element(&mut tree, "p");
    let child = alloc_element(&mut tree, "span");
    tree.append_child(parent, child);

    tree.remove_child(other, child);

    assert_eq!(tree.parent(child), Some(parent));
}

// ========== insert_before ==========

#[test]
fn test_insert_before_first_child() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    tree.append_child(NodeId::ROOT, parent);

    let existing = alloc_element(&mut tree, "b");
    tree.append_child(parent, existing);

    let new_child = alloc_element(&mut tree, "a");
    tree.insert_before(parent, new_child, existing);

    assert_eq!(tree.children(parent), &[new_child, existing]);
    assert_eq!(tree.prev_sibling(new_child), None);
    assert_eq!(tree.prev_sibling(existing), Some(new_child));
}

#[test]
fn test_append_moves_node_from_old_parent() {
    let mut tree = DomTree::new();
    let first = alloc_element(&mut tree, "first");
    let second = alloc_element(&mut tree, "second");
    let child = alloc_element(&mut tree, "child");
    tree.append_child(first, child);

    tree.append_child(second, child);

    assert!(tree.children(first).is_empty());
    assert_eq!(tree.children(second), &[child]);
}

// ========== move_children ==========

#[test]
fn test_move_children_appends_to_existing() {
    let mut tree = DomTree::new();
    let from = alloc_element(&mut tree, "div");
    let to = alloc_element(&mut tree, "span");

    let existing = alloc_element(&mut tree, "x");
    tree.append_child(to, existing);
    let moved = alloc_element(&mut tree, "y");
    tree.append_child(from, moved);

    tree.move_children(from, to);

    assert_eq!(tree.children(to), &[existing, moved]);
    assert_eq!(tree.next_sibling(existing), Some(moved));
    assert!(tree.children(from).is_empty());
}

// ========== checked insertion ==========

#[test]
fn test_document_accepts_single_element() {
    let mut tree = DomTree::new();
    let html = alloc_element(&mut tree, "html");
    tree.checked_append_child(NodeId::ROOT, html).unwrap();

    let second = alloc_element(&mut tree, "svg");
    let err = tree.checked_append_child(NodeId::ROOT, second).unwrap_err();
    assert!(matches!(err, DomError::HierarchyRequest { .. }));
}

#[test]
fn test_entity_reference_children() {
    let mut tree = DomTree::new();
    let entity = tree.alloc(NodeType::EntityReference("nbsp".to_string()));
    let text = tree.create_text("\u{a0}");
    tree.checked_append_child(entity, text).unwrap();

    assert!(tree.child_type_allowed(entity, NodeKind::Element));
    assert!(!tree.child_type_allowed(entity, NodeKind::DocumentType));
    assert_eq!(tree.node_name(entity), "nbsp");
}

#[test]
fn test_text_cannot_have_children() {
    let mut tree = DomTree::new();
    let text = tree.create_text("a");
    let pi = tree.alloc(NodeType::ProcessingInstruction(ProcessingInstructionData::new(
        "target", "data",
    )));
    assert!(tree.checked_append_child(text, pi).is_err());
}

#[test]
fn test_cycle_is_rejected() {
    let mut tree = DomTree::new();
    let outer = alloc_element(&mut tree, "outer");
    let inner = alloc_element(&mut tree, "inner");
    tree.append_child(outer, inner);
    assert!(tree.checked_append_child(inner, outer).is_err());
}

#[test]
fn test_checked_insert_before_unknown_reference() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "div");
    let stranger = alloc_element(&mut tree, "p");
    let child = alloc_element(&mut tree, "span");
    assert_eq!(
        tree.checked_insert_before(parent, child, Some(stranger)),
        Err(DomError::NotFound(stranger))
    );
}

// ========== split_text ==========

#[test]
fn test_split_text_inserts_after() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "p");
    let text = tree.create_text("hello world");
    let tail = alloc_element(&mut tree, "b");
    tree.append_child(parent, text);
    tree.append_child(parent, tail);

    let rest = tree.split_text(text, 5).unwrap();

    assert_eq!(tree.as_text(text), Some("hello"));
    assert_eq!(tree.as_text(rest), Some(" world"));
    assert_eq!(tree.children(parent), &[text, rest, tail]);
}

#[test]
fn test_split_cdata_keeps_kind() {
    let mut tree = DomTree::new();
    let cdata = tree.alloc(NodeType::CDataSection("a<b".to_string()));
    let rest = tree.split_text(cdata, 1).unwrap();
    assert_eq!(tree.node_name(rest), "#cdata-section");
    assert_eq!(tree.as_text(rest), Some("<b"));
}

#[test]
fn test_split_text_out_of_range() {
    let mut tree = DomTree::new();
    let text = tree.create_text("abc");
    assert_eq!(
        tree.split_text(text, 4),
        Err(DomError::IndexSize {
            offset: 4,
            length: 3
        })
    );
}

// ========== liveness ==========

#[test]
fn test_detach_invalidates_tokens() {
    let mut tree = DomTree::new();
    let token = tree.liveness_token();
    assert!(tree.is_alive(token));

    tree.detach();
    tree.detach();

    assert!(!tree.is_alive(token));
    assert!(tree.is_detached());
}
