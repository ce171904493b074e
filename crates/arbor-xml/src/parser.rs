//! The SAX sink that builds the document.
//!
//! [Extensible Markup Language (XML) 1.0](https://www.w3.org/TR/xml/)
//! [Namespaces in XML 1.0](https://www.w3.org/TR/xml-names/)

use std::collections::VecDeque;

use arbor_common::warning::warn_once;
use arbor_dom::script::{
    LegacyTypeSupport, ScriptElement, ScriptHost, ScriptLoadError, ScriptRunner, ScriptSourceCode,
    TextPosition, is_script_element,
};
use arbor_dom::{
    DocumentTypeData, DomTree, ElementData, NodeId, NodeType, ProcessingInstructionData,
    StyleSheetKind, StyleSheetRequest,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{XmlErrorType, XmlErrors};

const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Misuse of the parser's control surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XmlParseError {
    /// The parser was detached from its document.
    #[error("parser is detached")]
    Detached,
    /// `resume_parsing` was called on a parser that is not paused.
    #[error("parser is not paused")]
    NotPaused,
    /// A script load finished for an element nobody is waiting on.
    #[error("no script is waiting for element {0}")]
    UnknownScript(usize),
}

/// An `xmlns` / `xmlns:prefix` declaration on an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDecl {
    /// `None` for the default namespace.
    #[serde(default)]
    pub prefix: Option<String>,
    /// The namespace URI.
    pub uri: String,
}

/// One attribute of a start tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaxAttribute {
    /// Local name.
    pub local_name: String,
    /// Namespace prefix, if any.
    #[serde(default)]
    pub prefix: Option<String>,
    /// The value with entities already expanded.
    pub value: String,
}

/// A tokenizer callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaxEvent {
    /// The XML declaration.
    StartDocument {
        /// `version` pseudo-attribute.
        #[serde(default)]
        version: Option<String>,
        /// `encoding` pseudo-attribute.
        #[serde(default)]
        encoding: Option<String>,
        /// `standalone` pseudo-attribute.
        #[serde(default)]
        standalone: Option<bool>,
    },
    /// End of input.
    EndDocument,
    /// A start tag.
    StartElement {
        /// Local name.
        local_name: String,
        /// Prefix as written.
        #[serde(default)]
        prefix: Option<String>,
        /// Resolved namespace URI; resolved from in-scope declarations when absent.
        #[serde(default)]
        uri: Option<String>,
        /// Declarations made on this tag.
        #[serde(default)]
        namespaces: Vec<NamespaceDecl>,
        /// Attributes.
        #[serde(default)]
        attributes: Vec<SaxAttribute>,
    },
    /// An end tag.
    EndElement,
    /// Character data.
    Characters {
        /// The text.
        text: String,
    },
    /// `<?target data?>`
    ProcessingInstruction {
        /// PI target.
        target: String,
        /// PI data.
        #[serde(default)]
        data: String,
    },
    /// `<![CDATA[...]]>`
    Cdata {
        /// Section content.
        text: String,
    },
    /// `<!--...-->`
    Comment {
        /// Comment text.
        text: String,
    },
    /// The DOCTYPE internal subset.
    InternalSubset {
        /// Doctype name.
        name: String,
        /// Public identifier.
        #[serde(default)]
        external_id: String,
        /// System identifier.
        #[serde(default)]
        system_id: String,
    },
    /// A diagnostic.
    Error {
        /// Severity.
        kind: XmlErrorType,
        /// Tokenizer message.
        message: String,
    },
}

const fn default_position_component() -> u32 {
    1
}

/// A callback together with the tokenizer position it was reported at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionedEvent {
    /// 1-based line.
    #[serde(default = "default_position_component")]
    pub line: u32,
    /// 1-based column.
    #[serde(default = "default_position_component")]
    pub column: u32,
    /// The callback.
    #[serde(flatten)]
    pub event: SaxEvent,
}

impl PositionedEvent {
    /// Wrap `event` at `position`.
    #[must_use]
    pub const fn new(event: SaxEvent, position: TextPosition) -> Self {
        Self {
            line: position.line,
            column: position.column,
            event,
        }
    }

    /// Where the event happened.
    #[must_use]
    pub const fn position(&self) -> TextPosition {
        TextPosition::new(self.line, self.column)
    }
}

/// The XML declaration as reported by `start_document`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlDeclaration {
    /// `version`, if given.
    pub version: Option<String>,
    /// `encoding`, if given.
    pub encoding: Option<String>,
    /// `standalone`, if given.
    pub standalone: Option<bool>,
}

/// Builds a [`DomTree`] from SAX callbacks.
///
/// Callbacks are ignored once the parser is stopped and queued while it is
/// paused. A fatal error stops the parser; the error report is still
/// inserted when [`finish`](Self::finish) runs.
pub struct XmlDocumentParser {
    document: DomTree,
    host: Box<dyn ScriptHost>,

    current_node: NodeId,
    node_stack: Vec<NodeId>,
    namespace_scopes: Vec<Vec<NamespaceDecl>>,
    leaf_text_node: Option<NodeId>,
    buffered_text: String,

    position: TextPosition,
    script_start_position: TextPosition,
    pending_callbacks: VecDeque<PositionedEvent>,
    pending_script: Option<ScriptElement>,
    script_runner: ScriptRunner,

    errors: XmlErrors,
    style_sheets: Vec<(NodeId, StyleSheetRequest)>,
    declaration: Option<XmlDeclaration>,

    saw_error: bool,
    saw_css: bool,
    saw_xsl_transform: bool,
    saw_first_element: bool,
    parser_paused: bool,
    requesting_script: bool,
    finish_called: bool,
    stopped: bool,
    detached: bool,
    finished: bool,
}

impl std::fmt::Debug for XmlDocumentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlDocumentParser")
            .field("current_node", &self.current_node)
            .field("paused", &self.parser_paused)
            .field("stopped", &self.stopped)
            .field("detached", &self.detached)
            .field("pending_callbacks", &self.pending_callbacks.len())
            .finish_non_exhaustive()
    }
}

impl XmlDocumentParser {
    /// A parser building into `document` with `host` as the script boundary.
    #[must_use]
    pub fn new(document: DomTree, host: Box<dyn ScriptHost>) -> Self {
        Self {
            document,
            host,
            current_node: NodeId::ROOT,
            node_stack: Vec::new(),
            namespace_scopes: Vec::new(),
            leaf_text_node: None,
            buffered_text: String::new(),
            position: TextPosition::default(),
            script_start_position: TextPosition::default(),
            pending_callbacks: VecDeque::new(),
            pending_script: None,
            script_runner: ScriptRunner::new(),
            errors: XmlErrors::new(),
            style_sheets: Vec::new(),
            declaration: None,
            saw_error: false,
            saw_css: false,
            saw_xsl_transform: false,
            saw_first_element: false,
            parser_paused: false,
            requesting_script: false,
            finish_called: false,
            stopped: false,
            detached: false,
            finished: false,
        }
    }

    /// The document being built.
    #[must_use]
    pub const fn document(&self) -> &DomTree {
        &self.document
    }

    /// Mutable access to the document, for hosts reacting to events.
    pub const fn document_mut(&mut self) -> &mut DomTree {
        &mut self.document
    }

    /// Give up the parser and keep the document.
    #[must_use]
    pub fn into_document(self) -> DomTree {
        self.document
    }

    /// Recorded diagnostics.
    #[must_use]
    pub const fn errors(&self) -> &XmlErrors {
        &self.errors
    }

    /// Style sheets linked by processing instructions, in document order.
    #[must_use]
    pub fn style_sheet_requests(&self) -> &[(NodeId, StyleSheetRequest)] {
        &self.style_sheets
    }

    /// The XML declaration, if the document had one.
    #[must_use]
    pub const fn declaration(&self) -> Option<&XmlDeclaration> {
        self.declaration.as_ref()
    }

    /// Whether a non-warning error was reported.
    #[must_use]
    pub const fn saw_error(&self) -> bool {
        self.saw_error
    }

    /// Whether a CSS style sheet was linked.
    #[must_use]
    pub const fn saw_css(&self) -> bool {
        self.saw_css
    }

    /// Whether an XSL transform was requested before the first element.
    #[must_use]
    pub const fn saw_xsl_transform(&self) -> bool {
        self.saw_xsl_transform
    }

    /// Whether the parser stopped (fatal error, XSL, or explicit stop).
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether callbacks are currently being queued.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.parser_paused
    }

    /// Whether the parser or its document has been torn down.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.detached || self.document.is_detached()
    }

    /// Whether `end` ran to completion.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of callbacks waiting for the parser to resume.
    #[must_use]
    pub fn pending_callback_count(&self) -> usize {
        self.pending_callbacks.len()
    }

    /// The element whose external script the parser is waiting on.
    #[must_use]
    pub fn pending_script_element(&self) -> Option<NodeId> {
        self.pending_script.as_ref().map(ScriptElement::element)
    }

    /// The node new children are appended to.
    #[must_use]
    pub const fn current_node(&self) -> NodeId {
        self.current_node
    }

    /// The tokenizer position for subsequent callbacks.
    pub const fn set_position(&mut self, position: TextPosition) {
        self.position = position;
    }

    /// Dispatch one positioned callback.
    pub fn feed(&mut self, record: PositionedEvent) {
        self.position = record.position();
        match record.event {
            SaxEvent::StartDocument {
                version,
                encoding,
                standalone,
            } => self.start_document(XmlDeclaration {
                version,
                encoding,
                standalone,
            }),
            SaxEvent::EndDocument => self.end_document(),
            SaxEvent::StartElement {
                local_name,
                prefix,
                uri,
                namespaces,
                attributes,
            } => self.start_element_ns(
                &local_name,
                prefix.as_deref(),
                uri.as_deref(),
                &namespaces,
                &attributes,
            ),
            SaxEvent::EndElement => self.end_element_ns(),
            SaxEvent::Characters { text } => self.characters(&text),
            SaxEvent::ProcessingInstruction { target, data } => {
                self.processing_instruction(&target, &data);
            }
            SaxEvent::Cdata { text } => self.cdata_block(&text),
            SaxEvent::Comment { text } => self.comment(&text),
            SaxEvent::InternalSubset {
                name,
                external_id,
                system_id,
            } => self.internal_subset(&name, &external_id, &system_id),
            SaxEvent::Error { kind, message } => self.error(kind, &message),
        }
    }

    fn queue(&mut self, event: SaxEvent) {
        self.pending_callbacks
            .push_back(PositionedEvent::new(event, self.position));
    }

    // ---------------------------------------------------------------------
    // SAX callbacks
    // ---------------------------------------------------------------------

    /// The XML declaration was read.
    pub fn start_document(&mut self, declaration: XmlDeclaration) {
        self.declaration = Some(declaration);
    }

    /// End of input.
    pub fn end_document(&mut self) {
        self.exit_text();
    }

    /// A start tag.
    pub fn start_element_ns(
        &mut self,
        local_name: &str,
        prefix: Option<&str>,
        uri: Option<&str>,
        namespaces: &[NamespaceDecl],
        attributes: &[SaxAttribute],
    ) {
        if self.stopped {
            return;
        }
        if self.parser_paused {
            self.queue(SaxEvent::StartElement {
                local_name: local_name.to_string(),
                prefix: prefix.map(str::to_string),
                uri: uri.map(str::to_string),
                namespaces: namespaces.to_vec(),
                attributes: attributes.to_vec(),
            });
            return;
        }

        self.exit_text();
        self.namespace_scopes.push(namespaces.to_vec());
        let namespace = uri
            .map(str::to_string)
            .or_else(|| self.lookup_namespace(prefix));

        self.saw_first_element = true;
        let mut data = ElementData::new(local_name);
        data.namespace = namespace;
        data.prefix = prefix.map(str::to_string);

        for decl in namespaces {
            let name = decl
                .prefix
                .as_ref()
                .map_or_else(|| "xmlns".to_string(), |p| format!("xmlns:{p}"));
            let _ = data.attrs.insert(name, decl.uri.clone());
        }
        for attr in attributes {
            let name = attr
                .prefix
                .as_ref()
                .map_or_else(|| attr.local_name.clone(), |p| format!("{p}:{}", attr.local_name));
            if attr.prefix.as_deref() == Some("xmlns") && attr.value.is_empty() {
                warn_once("XML", "empty namespace declaration ignored");
                continue;
            }
            let _ = data.attrs.insert(name, attr.value.clone());
        }

        let is_script = data.is_script();
        let element = self.document.alloc(NodeType::Element(data));
        if is_script {
            self.script_start_position = self.position;
        }
        self.append_to_current(element);
        self.push_current_node(element);
    }

    fn lookup_namespace(&self, prefix: Option<&str>) -> Option<String> {
        if prefix == Some("xmlns") {
            return Some(XMLNS_NAMESPACE.to_string());
        }
        self.namespace_scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter())
            .find(|decl| decl.prefix.as_deref() == prefix)
            .map(|decl| decl.uri.clone())
            .filter(|uri| !uri.is_empty())
    }

    /// An end tag.
    pub fn end_element_ns(&mut self) {
        if self.stopped {
            return;
        }
        if self.parser_paused {
            self.queue(SaxEvent::EndElement);
            return;
        }

        self.exit_text();
        let _ = self.namespace_scopes.pop();
        let node = self.current_node;

        if self.document.as_element(node).is_none() || !is_script_element(&self.document, node) {
            self.pop_current_node();
            return;
        }

        // The element's parent may have been removed from the document by
        // script. Parsing continues but the script does not run.
        if !self.document.is_connected(node) {
            self.pop_current_node();
            return;
        }

        debug_assert!(self.pending_script.is_none());
        self.requesting_script = true;
        let token = self.document.liveness_token();
        let mut script = ScriptElement::new(node, true, false);
        let started = script.prepare_script(
            &mut self.document,
            self.host.as_mut(),
            self.script_start_position,
            LegacyTypeSupport::AllowInTypeAttribute,
        );
        if started {
            if script.ready_to_be_parser_executed() {
                let source = ScriptSourceCode::new(
                    script.script_content(&self.document),
                    self.document.url().map(str::to_string),
                    self.script_start_position,
                );
                script.execute_script(&mut self.document, self.host.as_mut(), &source);
            } else if script.will_be_parser_executed() {
                if script.is_loaded() {
                    script.execute_loaded(&mut self.document, self.host.as_mut());
                } else {
                    log::debug!("pausing parser for external script on {node:?}");
                    self.pending_script = Some(script);
                    self.pause_parsing();
                }
            } else if script.is_external() {
                self.script_runner.queue(script);
            }

            // Script may have detached the parser.
            if self.is_detached() || !self.document.is_alive(token) {
                self.requesting_script = false;
                return;
            }
        }
        self.requesting_script = false;
        self.pop_current_node();
    }

    /// Character data; buffered until the next non-text callback.
    pub fn characters(&mut self, text: &str) {
        if self.stopped {
            return;
        }
        if self.parser_paused {
            self.queue(SaxEvent::Characters {
                text: text.to_string(),
            });
            return;
        }
        if self.leaf_text_node.is_none() {
            self.enter_text();
        }
        self.buffered_text.push_str(text);
    }

    /// A processing instruction.
    pub fn processing_instruction(&mut self, target: &str, data: &str) {
        if self.stopped {
            return;
        }
        if self.parser_paused {
            self.queue(SaxEvent::ProcessingInstruction {
                target: target.to_string(),
                data: data.to_string(),
            });
            return;
        }

        self.exit_text();
        let pi = ProcessingInstructionData::new(target, data);
        let request = pi.style_sheet_request();
        let node = self.document.alloc(NodeType::ProcessingInstruction(pi));
        self.append_to_current(node);

        let Some(request) = request else {
            return;
        };
        match request.kind {
            StyleSheetKind::Css => {
                self.saw_css = true;
                if !request.is_local() {
                    self.document.add_pending_style_sheet();
                }
            }
            StyleSheetKind::Xsl => {
                self.saw_xsl_transform = !self.saw_first_element;
                if self.saw_xsl_transform {
                    log::debug!("XSL transform requested; stopping the untransformed parse");
                    self.stop_parsing();
                }
            }
        }
        self.style_sheets.push((node, request));
    }

    /// A linked CSS sheet finished loading.
    pub fn style_sheet_loaded(&mut self, node: NodeId) {
        let linked = self
            .style_sheets
            .iter()
            .any(|(pi, r)| *pi == node && r.kind == StyleSheetKind::Css && !r.is_local());
        if linked {
            self.document.remove_pending_style_sheet();
        }
    }

    /// A CDATA section.
    pub fn cdata_block(&mut self, text: &str) {
        if self.stopped {
            return;
        }
        if self.parser_paused {
            self.queue(SaxEvent::Cdata {
                text: text.to_string(),
            });
            return;
        }
        self.exit_text();
        let node = self.document.alloc(NodeType::CDataSection(text.to_string()));
        self.append_to_current(node);
    }

    /// A comment.
    pub fn comment(&mut self, text: &str) {
        if self.stopped {
            return;
        }
        if self.parser_paused {
            self.queue(SaxEvent::Comment {
                text: text.to_string(),
            });
            return;
        }
        self.exit_text();
        let node = self.document.alloc(NodeType::Comment(text.to_string()));
        self.append_to_current(node);
    }

    /// The DOCTYPE internal subset; adds a doctype node.
    pub fn internal_subset(&mut self, name: &str, external_id: &str, system_id: &str) {
        if self.stopped {
            return;
        }
        if self.parser_paused {
            self.queue(SaxEvent::InternalSubset {
                name: name.to_string(),
                external_id: external_id.to_string(),
                system_id: system_id.to_string(),
            });
            return;
        }
        let doctype = DocumentTypeData {
            name: name.to_string(),
            public_id: external_id.to_string(),
            system_id: system_id.to_string(),
        };
        if doctype.is_xhtml() {
            self.document.set_xhtml(true);
        }
        let node = self.document.alloc(NodeType::DocumentType(doctype));
        if self
            .document
            .checked_append_child(NodeId::ROOT, node)
            .is_err()
        {
            warn_once("XML", "ignoring a second DOCTYPE");
        }
    }

    /// A diagnostic from the tokenizer.
    pub fn error(&mut self, kind: XmlErrorType, message: &str) {
        if self.stopped {
            return;
        }
        if self.parser_paused {
            self.queue(SaxEvent::Error {
                kind,
                message: message.to_string(),
            });
            return;
        }
        self.handle_error(kind, message, self.position);
    }

    fn handle_error(&mut self, kind: XmlErrorType, message: &str, position: TextPosition) {
        self.errors.handle_error(kind, message, position);
        if kind != XmlErrorType::Warning {
            self.saw_error = true;
        }
        if kind == XmlErrorType::Fatal {
            log::debug!("fatal XML error at {}:{}: {message}", position.line, position.column);
            self.stop_parsing();
        }
    }

    // ---------------------------------------------------------------------
    // Tree building helpers
    // ---------------------------------------------------------------------

    fn append_to_current(&mut self, node: NodeId) {
        if self
            .document
            .checked_append_child(self.current_node, node)
            .is_err()
        {
            // Misplaced content at document level (text after the root, a
            // second root element) is dropped; the tokenizer reports it.
            log::trace!("dropping misplaced node under {:?}", self.current_node);
        }
    }

    fn push_current_node(&mut self, node: NodeId) {
        self.node_stack.push(self.current_node);
        self.current_node = node;
    }

    fn pop_current_node(&mut self) {
        if let Some(previous) = self.node_stack.pop() {
            self.current_node = previous;
        }
    }

    fn clear_current_node_stack(&mut self) {
        self.node_stack.clear();
        self.current_node = NodeId::ROOT;
        self.leaf_text_node = None;
    }

    fn enter_text(&mut self) {
        debug_assert!(self.buffered_text.is_empty());
        debug_assert!(self.leaf_text_node.is_none());
        let text = self.document.create_text("");
        self.append_to_current(text);
        self.leaf_text_node = Some(text);
    }

    fn exit_text(&mut self) {
        if self.stopped {
            return;
        }
        let Some(text) = self.leaf_text_node.take() else {
            return;
        };
        let buffered = std::mem::take(&mut self.buffered_text);
        self.document.append_data(text, &buffered);
    }

    // ---------------------------------------------------------------------
    // Control
    // ---------------------------------------------------------------------

    /// Start queueing callbacks.
    pub const fn pause_parsing(&mut self) {
        self.parser_paused = true;
    }

    /// Replay queued callbacks until the queue drains or one pauses again;
    /// then, if `finish` was called meanwhile, end the document.
    ///
    /// # Errors
    ///
    /// Returns [`XmlParseError::Detached`] on a detached parser and
    /// [`XmlParseError::NotPaused`] if there is nothing to resume.
    pub fn resume_parsing(&mut self) -> Result<(), XmlParseError> {
        if self.is_detached() {
            return Err(XmlParseError::Detached);
        }
        if !self.parser_paused {
            return Err(XmlParseError::NotPaused);
        }
        self.parser_paused = false;

        while let Some(callback) = self.pending_callbacks.pop_front() {
            self.feed(callback);
            if self.parser_paused || self.is_detached() {
                return Ok(());
            }
        }

        if self.finish_called && self.pending_callbacks.is_empty() {
            self.end();
        }
        Ok(())
    }

    /// The pending external script finished loading (or failed).
    ///
    /// Runs it, fires `load` or `error`, and resumes the parser. Results for
    /// async or in-order scripts are routed to the script runner.
    ///
    /// # Errors
    ///
    /// Returns [`XmlParseError::UnknownScript`] if no script is waiting on
    /// `element`.
    pub fn notify_script_finished(
        &mut self,
        element: NodeId,
        result: Result<String, ScriptLoadError>,
    ) -> Result<(), XmlParseError> {
        let Some(mut script) = self
            .pending_script
            .take_if(|script| script.element() == element)
        else {
            if !self.script_runner.has_pending_scripts() {
                return Err(XmlParseError::UnknownScript(element.0));
            }
            self.script_runner.notify_finished(element, result);
            self.script_runner
                .execute_ready(&mut self.document, self.host.as_mut());
            return Ok(());
        };

        script.notify_finished(result);
        script.execute_loaded(&mut self.document, self.host.as_mut());

        if !self.is_detached() && !self.requesting_script && self.parser_paused {
            self.resume_parsing()?;
        }
        Ok(())
    }

    /// The tokenizer has no more input.
    pub fn finish(&mut self) {
        if self.parser_paused {
            self.finish_called = true;
        } else {
            self.end();
        }
    }

    fn end(&mut self) {
        if self.is_detached() || self.parser_paused {
            return;
        }
        if self.saw_error {
            let _ = self.errors.insert_error_message_block(&mut self.document);
        } else {
            self.exit_text();
        }
        self.clear_current_node_stack();
        self.script_runner
            .execute_deferred(&mut self.document, self.host.as_mut());
        self.finished = true;
    }

    /// Stop reacting to callbacks. Idempotent.
    pub fn stop_parsing(&mut self) {
        self.stopped = true;
    }

    /// Stop and drop all parser state. Idempotent.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.clear_current_node_stack();
        self.pending_callbacks.clear();
        self.pending_script = None;
        self.stopped = true;
        self.detached = true;
    }
}
