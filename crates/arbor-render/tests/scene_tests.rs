//! Integration tests for JSON scenes, step replay and dumps.

use arbor_render::{LayoutOffset, LayoutPoint, MapCoordinatesFlags, RenderError, Scene, SceneStep};

fn parse(json: &str) -> Scene {
    serde_json::from_str(json).expect("scene should parse")
}

const SPAN_SCENE: &str = r#"{
    "viewport": { "width": 400, "height": 300 },
    "root": {
        "tag": "div",
        "id": "d",
        "style": { "display": "block" },
        "children": [
            {
                "tag": "span",
                "id": "s",
                "style": { "position": "relative", "offsets": { "left": 10, "top": 5 } },
                "children": [ { "text": "text" } ]
            }
        ]
    },
    "steps": [
        { "op": "restyle", "target": "s", "style": { "display": "block" } },
        { "op": "scroll", "x": 0, "y": 20 }
    ]
}"#;

// ========== Parsing ==========

#[test]
fn test_scene_parses_steps_and_defaults() {
    let scene = parse(SPAN_SCENE);
    assert_eq!(scene.viewport.width, 400.0);
    assert!(!scene.strict);
    assert_eq!(scene.print_page_height, None);
    assert_eq!(scene.steps.len(), 2);
    assert!(matches!(&scene.steps[0], SceneStep::Restyle { target, .. } if target == "s"));
    assert_eq!(scene.steps[1], SceneStep::Scroll { x: 0.0, y: 20.0 });
}

#[test]
fn test_unknown_step_is_rejected() {
    let json = r#"{ "root": { "tag": "div" }, "steps": [ { "op": "explode" } ] }"#;
    assert!(serde_json::from_str::<Scene>(json).is_err());
}

// ========== Instantiation ==========

#[test]
fn test_relative_span_maps_to_its_offset() {
    let scene = parse(SPAN_SCENE);
    let doc = scene.instantiate().expect("scene should build");

    let span_node = doc.node_by_id("s").expect("span has an id");
    let span = doc.tree.renderer_for_node(span_node).expect("span has a renderer");
    assert!(doc.tree.get(span).is_render_inline());

    let mapped = doc.tree.local_to_absolute(span, LayoutPoint::zero(), MapCoordinatesFlags::empty());
    assert_eq!(mapped, LayoutPoint::new(10.0, 5.0));
}

#[test]
fn test_elements_without_style_use_tag_defaults() {
    let json = r#"{ "root": { "tag": "div", "children": [ { "tag": "p", "children": [ { "text": "hi" } ] } ] } }"#;
    let doc = parse(json).instantiate().expect("scene should build");
    let dump = doc.tree.dump_text(Some(&doc.dom));
    assert!(dump.contains("RenderBlock {DIV}"), "{dump}");
    assert!(dump.contains("RenderBlock {P}"), "{dump}");
    assert!(dump.contains("RenderText"), "{dump}");
}

#[test]
fn test_strict_scene_requires_styles() {
    let json = r#"{ "strict": true, "root": { "tag": "div" } }"#;
    let result = parse(json).instantiate();
    assert!(matches!(result, Err(RenderError::MissingStyle(_))));
}

#[test]
fn test_print_scene_counts_pages() {
    let json = r#"{
        "print_page_height": 100,
        "root": { "tag": "div", "style": { "display": "block", "height": 250 } }
    }"#;
    let doc = parse(json).instantiate().expect("scene should build");
    assert_eq!(doc.tree.page_count(), 3);
}

// ========== Steps ==========

#[test]
fn test_restyle_to_block_rebuilds_the_renderer() {
    let scene = parse(SPAN_SCENE);
    let mut doc = scene.instantiate().expect("scene should build");

    let _ = doc.apply(&scene.steps[0]).expect("restyle applies");
    let span_node = doc.node_by_id("s").expect("span has an id");
    let span = doc.tree.renderer_for_node(span_node).expect("span has a renderer");
    assert!(!doc.tree.get(span).is_render_inline());
    assert!(!doc.tree.get(doc.tree.view()).needs_layout());
    assert!(doc.tree.dump_text(Some(&doc.dom)).contains("text"));
}

#[test]
fn test_scroll_step_moves_the_view() {
    let scene = parse(SPAN_SCENE);
    let mut doc = scene.instantiate().expect("scene should build");

    let _ = doc.apply(&scene.steps[1]).expect("scroll applies");
    assert_eq!(doc.tree.frame_view().scroll_offset(), LayoutOffset::new(0.0, 20.0));
}

#[test]
fn test_resize_step_relayouts_block_widths() {
    let mut doc = parse(SPAN_SCENE).instantiate().expect("scene should build");
    let div_node = doc.node_by_id("d").expect("div has an id");

    let _ = doc
        .apply(&SceneStep::Resize {
            width: 250.0,
            height: 300.0,
        })
        .expect("resize applies");
    let div = doc.tree.renderer_for_node(div_node).expect("div has a renderer");
    assert_eq!(doc.tree.get(div).size().width, 250.0);
}

#[test]
fn test_removed_element_cannot_be_targeted_again() {
    let mut doc = parse(SPAN_SCENE).instantiate().expect("scene should build");
    let span_node = doc.node_by_id("s").expect("span has an id");
    let remove = SceneStep::Remove {
        target: "s".to_string(),
    };

    let _ = doc.apply(&remove).expect("remove applies");
    assert_eq!(doc.node_by_id("s"), None);
    assert_eq!(doc.tree.renderer_for_node(span_node), None);
    assert!(!doc.tree.dump_text(None).contains("RenderInline"));

    let again = doc.apply(&remove);
    assert!(matches!(again, Err(RenderError::UnknownTarget(id)) if id == "s"));
}

// ========== Dumps ==========

#[test]
fn test_dump_text_labels_positioned_inlines() {
    let doc = parse(SPAN_SCENE).instantiate().expect("scene should build");
    let dump = doc.tree.dump_text(Some(&doc.dom));
    assert!(dump.starts_with("RenderView"), "{dump}");
    assert!(dump.contains("RenderInline (relative positioned) {SPAN}"), "{dump}");
    assert!(dump.contains("text run at"), "{dump}");
}

#[test]
fn test_json_dump_nests_children() {
    let doc = parse(SPAN_SCENE).instantiate().expect("scene should build");
    let value = serde_json::to_value(doc.tree.dump()).expect("dump serializes");
    assert_eq!(value["name"], "RenderView");
    assert_eq!(value["children"][0]["name"], "RenderBlock");
    assert_eq!(value["children"][0]["children"][0]["name"], "RenderInline");
}
