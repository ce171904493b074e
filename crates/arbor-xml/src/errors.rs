//! Rate-limited parse error collection and the in-document error report.

use arbor_dom::script::TextPosition;
use arbor_dom::{DomTree, ElementData, NodeId, NodeType, SVG_NAMESPACE, XHTML_NAMESPACE};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Non-fatal diagnostics stop being recorded after this many.
pub const MAX_RECORDED_ERRORS: usize = 25;

const REPORT_STYLE: &str = "display: block; white-space: pre; border: 2px solid #c77; \
                            padding: 0 1em 0 1em; margin: 1em; background-color: #fdd; color: black";
const MESSAGES_STYLE: &str = "font-family:monospace;font-size:12px";

/// Severity reported by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XmlErrorType {
    /// Recorded, does not affect the document.
    #[strum(serialize = "warning")]
    Warning,
    /// Recorded and marks the document as erroneous.
    #[strum(serialize = "error")]
    NonFatal,
    /// Recorded, marks the document erroneous and stops parsing.
    #[strum(serialize = "error")]
    Fatal,
}

/// Collected diagnostics for one document.
#[derive(Debug, Clone, Default)]
pub struct XmlErrors {
    error_count: usize,
    last_error_position: Option<TextPosition>,
    messages: String,
}

impl XmlErrors {
    /// No errors recorded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    ///
    /// Fatal errors are always kept. Others are kept while fewer than
    /// [`MAX_RECORDED_ERRORS`] have been recorded and both the line and the
    /// column differ from the previously recorded one.
    pub fn handle_error(&mut self, kind: XmlErrorType, message: &str, position: TextPosition) {
        let differs = self
            .last_error_position
            .is_none_or(|last| last.line != position.line && last.column != position.column);
        if kind == XmlErrorType::Fatal || (self.error_count < MAX_RECORDED_ERRORS && differs) {
            self.append_error_message(&kind.to_string(), position, message);
            self.last_error_position = Some(position);
            self.error_count += 1;
        }
    }

    fn append_error_message(&mut self, type_string: &str, position: TextPosition, message: &str) {
        // <typeString> on line <lineNumber> at column <columnNumber>: <message>
        self.messages.push_str(&format!(
            "{type_string} on line {} at column {}: {message}",
            position.line, position.column
        ));
        if !message.ends_with('\n') {
            self.messages.push('\n');
        }
    }

    /// Number of recorded diagnostics.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.error_count
    }

    /// The formatted report text.
    #[must_use]
    pub fn messages(&self) -> &str {
        &self.messages
    }

    /// Insert a `<parsererror>` block as the first child of the document
    /// element, creating an `html`/`body` wrapper when there is no document
    /// element or it is an SVG root.
    ///
    /// Returns the report element.
    pub fn insert_error_message_block(&self, dom: &mut DomTree) -> NodeId {
        let container = match dom.document_element() {
            None => {
                let (html, body) = create_html_body(dom);
                dom.append_child(NodeId::ROOT, html);
                body
            }
            Some(root)
                if dom
                    .as_element(root)
                    .is_some_and(|e| e.is_in_namespace(SVG_NAMESPACE)) =>
            {
                let (html, body) = create_html_body(dom);
                dom.remove_child(NodeId::ROOT, root);
                dom.append_child(body, root);
                dom.append_child(NodeId::ROOT, html);
                body
            }
            Some(root) => root,
        };

        let report = create_parser_error_header(dom, &self.messages);
        match dom.first_child(container) {
            Some(first) => dom.insert_before(container, report, first),
            None => dom.append_child(container, report),
        }
        report
    }
}

fn xhtml_element(dom: &mut DomTree, name: &str) -> NodeId {
    dom.alloc(NodeType::Element(ElementData::with_namespace(
        name,
        XHTML_NAMESPACE,
    )))
}

fn create_html_body(dom: &mut DomTree) -> (NodeId, NodeId) {
    let html = xhtml_element(dom, "html");
    let body = xhtml_element(dom, "body");
    dom.append_child(html, body);
    (html, body)
}

fn create_parser_error_header(dom: &mut DomTree, messages: &str) -> NodeId {
    let report = xhtml_element(dom, "parsererror");
    dom.set_attribute(report, "style", REPORT_STYLE);

    let heading = xhtml_element(dom, "h3");
    let heading_text = dom.create_text("This page contains the following errors:");
    dom.append_child(heading, heading_text);
    dom.append_child(report, heading);

    let fixed = xhtml_element(dom, "div");
    dom.set_attribute(fixed, "style", MESSAGES_STYLE);
    let message_text = dom.create_text(messages);
    dom.append_child(fixed, message_text);
    dom.append_child(report, fixed);

    let footer = xhtml_element(dom, "h3");
    let footer_text = dom.create_text("Below is a rendering of the page up to the first error.");
    dom.append_child(footer, footer_text);
    dom.append_child(report, footer);

    report
}
