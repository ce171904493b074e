//! Tests for building documents from SAX callbacks.

use std::cell::RefCell;
use std::rc::Rc;

use arbor_dom::script::{ScriptFetch, ScriptHost, ScriptSourceCode, TextPosition};
use arbor_dom::{DomEventKind, DomTree, NodeId, NodeType, XHTML_NAMESPACE};
use arbor_xml::{
    NamespaceDecl, PositionedEvent, SaxAttribute, SaxEvent, XmlDocumentParser, XmlErrorType,
    XmlParseError,
};

/// What the test host saw, shared with the test body.
#[derive(Default)]
struct HostLog {
    executed: Vec<ScriptSourceCode>,
    fetched: Vec<String>,
}

/// A script host that records executions and treats `detach()` in a script
/// body as "tear the document down".
struct TestHost {
    log: Rc<RefCell<HostLog>>,
    cached: Option<String>,
}

impl ScriptHost for TestHost {
    fn fetch_script(&mut self, _element: NodeId, url: &str, _charset: &str) -> ScriptFetch {
        self.log.borrow_mut().fetched.push(url.to_string());
        self.cached
            .clone()
            .map_or(ScriptFetch::Pending, ScriptFetch::Ready)
    }

    fn execute_script(&mut self, dom: &mut DomTree, source: &ScriptSourceCode) {
        if source.source.contains("detach()") {
            dom.detach();
        }
        self.log.borrow_mut().executed.push(source.clone());
    }
}

fn parser_with_host(cached: Option<&str>) -> (XmlDocumentParser, Rc<RefCell<HostLog>>) {
    let log = Rc::new(RefCell::new(HostLog::default()));
    let host = TestHost {
        log: Rc::clone(&log),
        cached: cached.map(str::to_string),
    };
    let mut document = DomTree::new();
    document.set_url("file:///test.xhtml");
    (XmlDocumentParser::new(document, Box::new(host)), log)
}

fn start(parser: &mut XmlDocumentParser, name: &str) {
    parser.start_element_ns(name, None, Some(XHTML_NAMESPACE), &[], &[]);
}

fn start_with(parser: &mut XmlDocumentParser, name: &str, attrs: &[(&str, &str)]) {
    let attributes: Vec<SaxAttribute> = attrs
        .iter()
        .map(|(k, v)| SaxAttribute {
            local_name: (*k).to_string(),
            prefix: None,
            value: (*v).to_string(),
        })
        .collect();
    parser.start_element_ns(name, None, Some(XHTML_NAMESPACE), &[], &attributes);
}

fn element_named(dom: &DomTree, name: &str) -> Option<NodeId> {
    dom.descendants(NodeId::ROOT)
        .into_iter()
        .find(|&id| dom.as_element(id).is_some_and(|e| e.tag_name == name))
}

// ========== tree building ==========

#[test]
fn test_adjacent_characters_share_one_text_node() {
    let (mut parser, _) = parser_with_host(None);
    start(&mut parser, "root");
    parser.characters("Hello, ");
    parser.characters("world");
    parser.end_element_ns();
    parser.finish();

    let dom = parser.document();
    let root = dom.document_element().unwrap();
    assert_eq!(dom.children(root).len(), 1);
    assert_eq!(dom.text_content(root), "Hello, world");
}

#[test]
fn test_namespace_resolved_from_scope() {
    let (mut parser, _) = parser_with_host(None);
    parser.start_element_ns(
        "svg",
        Some("s"),
        None,
        &[NamespaceDecl {
            prefix: Some("s".to_string()),
            uri: "http://www.w3.org/2000/svg".to_string(),
        }],
        &[],
    );
    parser.start_element_ns("rect", Some("s"), None, &[], &[]);
    parser.end_element_ns();
    parser.end_element_ns();
    parser.finish();

    let dom = parser.document();
    let rect = element_named(dom, "rect").unwrap();
    let data = dom.as_element(rect).unwrap();
    assert_eq!(data.namespace.as_deref(), Some("http://www.w3.org/2000/svg"));
    assert_eq!(data.qualified_name(), "s:rect");
    let root = dom.document_element().unwrap();
    assert_eq!(
        dom.attribute(root, "xmlns:s"),
        Some("http://www.w3.org/2000/svg")
    );
}

#[test]
fn test_comment_cdata_and_pi_nodes() {
    let (mut parser, _) = parser_with_host(None);
    parser.processing_instruction("app", "x=1");
    start(&mut parser, "root");
    parser.comment(" note ");
    parser.cdata_block("a < b");
    parser.end_element_ns();
    parser.finish();

    let dom = parser.document();
    let names: Vec<String> = dom
        .descendants(NodeId::ROOT)
        .into_iter()
        .map(|id| dom.node_name(id))
        .collect();
    assert_eq!(names, ["app", "root", "#comment", "#cdata-section"]);
}

#[test]
fn test_internal_subset_detects_xhtml() {
    let (mut parser, _) = parser_with_host(None);
    parser.internal_subset(
        "html",
        "-//W3C//DTD XHTML 1.0 Strict//EN",
        "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd",
    );
    start(&mut parser, "html");
    parser.end_element_ns();
    parser.finish();

    let dom = parser.document();
    assert!(dom.is_xhtml());
    assert!(dom.doctype().is_some());
}

// ========== style sheets ==========

#[test]
fn test_css_stylesheet_is_pending_until_loaded() {
    let (mut parser, _) = parser_with_host(None);
    parser.processing_instruction("xml-stylesheet", r#"href="a.css" type="text/css""#);
    assert!(parser.saw_css());
    assert!(!parser.document().have_style_sheets_loaded());

    let (pi, _) = parser.style_sheet_requests()[0].clone();
    parser.style_sheet_loaded(pi);
    assert!(parser.document().have_style_sheets_loaded());
}

#[test]
fn test_xsl_before_first_element_stops() {
    let (mut parser, _) = parser_with_host(None);
    parser.processing_instruction("xml-stylesheet", r#"href="t.xsl" type="text/xsl""#);
    assert!(parser.saw_xsl_transform());
    assert!(parser.is_stopped());

    start(&mut parser, "root");
    assert!(parser.document().document_element().is_none());
}

#[test]
fn test_xsl_after_first_element_is_ignored() {
    let (mut parser, _) = parser_with_host(None);
    start(&mut parser, "root");
    parser.processing_instruction("xml-stylesheet", r#"href="t.xsl" type="text/xsl""#);
    assert!(!parser.saw_xsl_transform());
    assert!(!parser.is_stopped());
}

// ========== errors ==========

#[test]
fn test_fatal_error_stops_and_reports() {
    let (mut parser, _) = parser_with_host(None);
    start(&mut parser, "root");
    parser.characters("before");
    parser.set_position(TextPosition::new(3, 14));
    parser.error(XmlErrorType::Fatal, "Opening and ending tag mismatch");
    start(&mut parser, "ignored");
    parser.finish();

    assert!(parser.is_stopped());
    assert!(parser.saw_error());
    let dom = parser.document();
    assert!(element_named(dom, "ignored").is_none());

    let root = dom.document_element().unwrap();
    let report = dom.first_child(root).unwrap();
    assert_eq!(dom.node_name(report), "parsererror");
    assert!(dom.attribute(report, "style").unwrap().starts_with("display: block"));
    assert!(
        dom.text_content(report)
            .contains("error on line 3 at column 14: Opening and ending tag mismatch")
    );
    assert!(
        dom.text_content(report)
            .starts_with("This page contains the following errors:")
    );
}

#[test]
fn test_error_without_document_element_creates_html_body() {
    let (mut parser, _) = parser_with_host(None);
    parser.error(XmlErrorType::Fatal, "Document is empty");
    parser.finish();

    let dom = parser.document();
    let html = dom.document_element().unwrap();
    assert_eq!(dom.node_name(html), "html");
    let body = dom.first_child(html).unwrap();
    assert_eq!(dom.node_name(body), "body");
    assert_eq!(dom.node_name(dom.first_child(body).unwrap()), "parsererror");
}

#[test]
fn test_warning_does_not_mark_document() {
    let (mut parser, _) = parser_with_host(None);
    start(&mut parser, "root");
    parser.error(XmlErrorType::Warning, "unusual");
    parser.end_element_ns();
    parser.finish();

    assert!(!parser.saw_error());
    assert_eq!(parser.errors().error_count(), 1);
    assert!(element_named(parser.document(), "parsererror").is_none());
}

// ========== scripts ==========

#[test]
fn test_inline_script_executes_at_end_tag() {
    let (mut parser, log) = parser_with_host(None);
    start(&mut parser, "html");
    parser.set_position(TextPosition::new(4, 3));
    start(&mut parser, "script");
    parser.set_position(TextPosition::new(4, 11));
    parser.characters("run()");
    parser.end_element_ns();
    parser.end_element_ns();
    parser.finish();

    let log = log.borrow();
    assert_eq!(log.executed.len(), 1);
    assert_eq!(log.executed[0].source, "run()");
    assert_eq!(log.executed[0].start, TextPosition::new(4, 3));
    assert_eq!(log.executed[0].url.as_deref(), Some("file:///test.xhtml"));
}

#[test]
fn test_external_script_pauses_and_resumes() {
    let (mut parser, log) = parser_with_host(None);
    start(&mut parser, "html");
    start_with(&mut parser, "script", &[("src", "app.js")]);
    parser.end_element_ns();
    assert!(parser.is_paused());
    let script = parser.pending_script_element().unwrap();

    start(&mut parser, "p");
    parser.characters("after");
    parser.end_element_ns();
    parser.end_element_ns();
    parser.finish();
    assert_eq!(parser.pending_callback_count(), 4);
    assert!(element_named(parser.document(), "p").is_none());
    assert!(!parser.is_finished());

    parser
        .notify_script_finished(script, Ok("loaded()".to_string()))
        .unwrap();

    assert!(!parser.is_paused());
    assert!(parser.is_finished());
    let dom = parser.document();
    let p = element_named(dom, "p").unwrap();
    assert_eq!(dom.text_content(p), "after");
    assert_eq!(dom.parent(p), dom.document_element());
    assert!(
        dom.events()
            .iter()
            .any(|e| e.target == script && e.kind == DomEventKind::Load)
    );
    assert_eq!(log.borrow().fetched, ["app.js"]);
    assert_eq!(log.borrow().executed[0].url.as_deref(), Some("app.js"));
}

#[test]
fn test_cached_external_script_does_not_pause() {
    let (mut parser, log) = parser_with_host(Some("cached()"));
    start(&mut parser, "html");
    start_with(&mut parser, "script", &[("src", "app.js")]);
    parser.end_element_ns();
    assert!(!parser.is_paused());
    assert_eq!(log.borrow().executed.len(), 1);
}

#[test]
fn test_failed_script_fires_error_and_resumes() {
    let (mut parser, log) = parser_with_host(None);
    start(&mut parser, "html");
    start_with(&mut parser, "script", &[("src", "missing.js")]);
    parser.end_element_ns();
    let script = parser.pending_script_element().unwrap();

    parser
        .notify_script_finished(
            script,
            Err(arbor_dom::script::ScriptLoadError::Network("404".to_string())),
        )
        .unwrap();

    assert!(!parser.is_paused());
    assert!(log.borrow().executed.is_empty());
    assert!(
        parser
            .document()
            .events()
            .iter()
            .any(|e| e.target == script && e.kind == DomEventKind::Error)
    );
}

#[test]
fn test_script_detaching_document_stops_parser() {
    let (mut parser, _) = parser_with_host(None);
    start(&mut parser, "html");
    start(&mut parser, "script");
    parser.characters("detach()");
    parser.end_element_ns();

    assert!(parser.is_detached());
    parser.pause_parsing();
    assert_eq!(parser.resume_parsing(), Err(XmlParseError::Detached));
}

#[test]
fn test_unsupported_script_type_is_skipped() {
    let (mut parser, log) = parser_with_host(None);
    start(&mut parser, "html");
    start_with(&mut parser, "script", &[("type", "text/x-template")]);
    parser.characters("<b>{{x}}</b>");
    parser.end_element_ns();
    parser.end_element_ns();
    parser.finish();

    assert!(log.borrow().executed.is_empty());
    assert!(parser.is_finished());
}

// ========== control ==========

#[test]
fn test_stop_and_detach_are_idempotent() {
    let (mut parser, _) = parser_with_host(None);
    parser.stop_parsing();
    parser.stop_parsing();
    parser.detach();
    parser.detach();
    assert!(parser.is_stopped());
    assert!(parser.is_detached());
}

#[test]
fn test_resume_without_pause_is_an_error() {
    let (mut parser, _) = parser_with_host(None);
    assert_eq!(parser.resume_parsing(), Err(XmlParseError::NotPaused));
}

#[test]
fn test_events_from_json() {
    let json = r#"[
        {"type": "start_element", "local_name": "root", "uri": "urn:x"},
        {"type": "characters", "text": "hi", "line": 1, "column": 7},
        {"type": "end_element"}
    ]"#;
    let events: Vec<PositionedEvent> = serde_json::from_str(json).unwrap();
    assert_eq!(events[1].position(), TextPosition::new(1, 7));
    assert!(matches!(events[0].event, SaxEvent::StartElement { .. }));

    let (mut parser, _) = parser_with_host(None);
    for event in events {
        parser.feed(event);
    }
    parser.finish();
    let dom = parser.document();
    let root = dom.document_element().unwrap();
    assert!(matches!(
        dom.get(root).map(|n| &n.node_type),
        Some(NodeType::Element(e)) if e.namespace.as_deref() == Some("urn:x")
    ));
}
