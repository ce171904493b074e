//! `<script>` preparation and execution.
//!
//! [§ 4.12.1.1 Processing model](https://html.spec.whatwg.org/multipage/scripting.html#script-processing-model)
//!
//! The script engine is a black box behind [`ScriptHost`]. This module owns
//! the bookkeeping around it: whether an element has already started, which
//! of the parser-blocking, deferred, in-order or async paths it takes, and
//! the `load` / `error` events that report the outcome.
//!
//! Every call into the host may run arbitrary script. Callers that keep
//! working on the document afterwards must check a
//! [`LivenessToken`](crate::LivenessToken) first.

use std::collections::VecDeque;

use arbor_common::warning::warn_once;
use thiserror::Error;

use crate::{DomEventKind, DomTree, NodeId, NodeType};

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextPosition {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl TextPosition {
    /// A position at `line`, `column` (both 1-based).
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Default for TextPosition {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Source text handed to the script engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSourceCode {
    /// The program text.
    pub source: String,
    /// Document URL for inline scripts, resource URL for external ones.
    pub url: Option<String>,
    /// Where the program starts in `url`.
    pub start: TextPosition,
}

impl ScriptSourceCode {
    /// Build a source record.
    #[must_use]
    pub fn new(source: String, url: Option<String>, start: TextPosition) -> Self {
        Self { source, url, start }
    }

    /// Whether there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

/// Why a script could not be obtained.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptLoadError {
    /// The fetch failed.
    #[error("network error: {0}")]
    Network(String),
    /// A content security policy refused the request.
    #[error("blocked by content security policy")]
    Blocked,
    /// The response was served with a type that may not execute.
    #[error("refused to execute script with MIME type '{0}'")]
    MimeType(String),
    /// The load was canceled before it finished.
    #[error("load canceled")]
    Canceled,
}

/// Result of asking the host for an external script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptFetch {
    /// The source is available now (for example from a cache).
    Ready(String),
    /// The host will call back with the outcome later.
    Pending,
    /// The request was refused outright.
    Failed(ScriptLoadError),
}

/// The boundary to the embedding: script engine, loader and policy.
pub trait ScriptHost {
    /// Whether the frame may run scripts at all.
    fn can_execute_scripts(&self) -> bool {
        true
    }

    /// Whether an inline script on `element` passes content security policy.
    fn allow_inline_script(&self, _dom: &DomTree, _element: NodeId) -> bool {
        true
    }

    /// Fire `beforeload` for `url`; returning false cancels the request.
    ///
    /// Listeners may mutate or detach the document.
    fn before_load(&mut self, _dom: &mut DomTree, _element: NodeId, _url: &str) -> bool {
        true
    }

    /// Start fetching an external script.
    fn fetch_script(&mut self, element: NodeId, url: &str, charset: &str) -> ScriptFetch;

    /// Run a program. May re-enter and mutate the DOM.
    fn execute_script(&mut self, dom: &mut DomTree, source: &ScriptSourceCode);
}

/// A host for documents loaded with scripting disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScriptHost;

impl ScriptHost for NoScriptHost {
    fn can_execute_scripts(&self) -> bool {
        false
    }

    fn fetch_script(&mut self, _element: NodeId, _url: &str, _charset: &str) -> ScriptFetch {
        ScriptFetch::Failed(ScriptLoadError::Blocked)
    }

    fn execute_script(&mut self, _dom: &mut DomTree, _source: &ScriptSourceCode) {}
}

/// Whether legacy language names are accepted in the `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyTypeSupport {
    /// Only `language` may use legacy names.
    Disallow,
    /// `type="javascript1.2"` and friends are accepted too.
    AllowInTypeAttribute,
}

const JAVASCRIPT_MIME_TYPES: &[&str] = &[
    "text/javascript",
    "text/ecmascript",
    "application/javascript",
    "application/ecmascript",
    "application/x-javascript",
    "text/javascript1.1",
    "text/javascript1.2",
    "text/javascript1.3",
    "text/jscript",
    "text/javascript1.0",
    "text/javascript1.4",
    "text/javascript1.5",
    "text/livescript",
    "text/x-javascript",
    "text/x-ecmascript",
];

const LEGACY_LANGUAGES: &[&str] = &[
    "javascript",
    "javascript1.0",
    "javascript1.1",
    "javascript1.2",
    "javascript1.3",
    "javascript1.4",
    "javascript1.5",
    "javascript1.6",
    "javascript1.7",
    "livescript",
    "ecmascript",
    "jscript",
];

fn is_supported_javascript_mime_type(ty: &str) -> bool {
    JAVASCRIPT_MIME_TYPES.contains(&ty)
}

fn is_legacy_supported_language(language: &str) -> bool {
    LEGACY_LANGUAGES.contains(&language.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchState {
    Loading,
    Loaded(String),
    Failed(ScriptLoadError),
}

/// How a prepared script will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    /// Inline script that already ran during preparation.
    Immediate,
    /// The parser must run it before continuing; it may still be loading.
    ParserBlocking,
    /// Inline, parser-inserted, but style sheets are still loading.
    ParserBlockingReady,
    /// Runs once the document has finished parsing.
    Deferred,
    /// Runs as soon as it loads, in insertion order with other in-order scripts.
    InOrder,
    /// Runs as soon as it loads.
    Async,
}

/// Per-element script state.
///
/// [§ 4.12.1.1](https://html.spec.whatwg.org/multipage/scripting.html#script-processing-model)
/// "A script element has several associated pieces of state."
#[derive(Debug, Clone)]
pub struct ScriptElement {
    element: NodeId,
    /// "parser document" is non-null
    parser_inserted: bool,
    is_external: bool,
    /// "already started"
    already_started: bool,
    have_fired_load: bool,
    will_be_parser_executed: bool,
    /// "ready to be parser-executed"
    ready_to_be_parser_executed: bool,
    will_execute_when_document_finished_parsing: bool,
    /// "non-blocking"
    force_async: bool,
    will_execute_in_order: bool,
    character_encoding: String,
    source_url: Option<String>,
    fetch: Option<FetchState>,
}

impl ScriptElement {
    /// State for `element`; parser-created scripts pass `parser_inserted`.
    #[must_use]
    pub fn new(element: NodeId, parser_inserted: bool, already_started: bool) -> Self {
        Self {
            element,
            parser_inserted,
            is_external: false,
            already_started,
            have_fired_load: false,
            will_be_parser_executed: false,
            ready_to_be_parser_executed: false,
            will_execute_when_document_finished_parsing: false,
            force_async: !parser_inserted,
            will_execute_in_order: false,
            character_encoding: String::new(),
            source_url: None,
            fetch: None,
        }
    }

    /// The script element node.
    #[must_use]
    pub const fn element(&self) -> NodeId {
        self.element
    }

    /// Whether the parser created this element.
    #[must_use]
    pub const fn is_parser_inserted(&self) -> bool {
        self.parser_inserted
    }

    /// Whether the element has already started.
    #[must_use]
    pub const fn already_started(&self) -> bool {
        self.already_started
    }

    /// Whether the script comes from a `src` URL.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.is_external
    }

    /// Whether the parser has to run this script itself.
    #[must_use]
    pub const fn will_be_parser_executed(&self) -> bool {
        self.will_be_parser_executed
    }

    /// Whether the parser can run it now without waiting for a load.
    #[must_use]
    pub const fn ready_to_be_parser_executed(&self) -> bool {
        self.ready_to_be_parser_executed
    }

    /// Whether the load event has fired.
    #[must_use]
    pub const fn have_fired_load_event(&self) -> bool {
        self.have_fired_load
    }

    /// The encoding used to decode an external script.
    #[must_use]
    pub fn character_encoding(&self) -> &str {
        &self.character_encoding
    }

    /// Whether an external fetch has completed, successfully or not.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self.fetch, Some(FetchState::Loaded(_) | FetchState::Failed(_)))
    }

    /// Which execution path preparation selected.
    #[must_use]
    pub const fn execution_path(&self) -> ExecutionPath {
        if self.will_execute_when_document_finished_parsing {
            ExecutionPath::Deferred
        } else if self.ready_to_be_parser_executed {
            ExecutionPath::ParserBlockingReady
        } else if self.will_be_parser_executed {
            ExecutionPath::ParserBlocking
        } else if self.will_execute_in_order {
            ExecutionPath::InOrder
        } else if self.is_external {
            ExecutionPath::Async
        } else {
            ExecutionPath::Immediate
        }
    }

    fn attr<'a>(dom: &'a DomTree, element: NodeId, name: &str) -> Option<&'a str> {
        dom.attribute(element, name)
    }

    fn has_source_attribute(&self, dom: &DomTree) -> bool {
        Self::attr(dom, self.element, "src").is_some()
    }

    fn async_attribute(&self, dom: &DomTree) -> bool {
        Self::attr(dom, self.element, "async").is_some()
    }

    fn defer_attribute(&self, dom: &DomTree) -> bool {
        Self::attr(dom, self.element, "defer").is_some()
    }

    /// Concatenated data of the element's text children.
    #[must_use]
    pub fn script_content(&self, dom: &DomTree) -> String {
        dom.children(self.element)
            .iter()
            .filter_map(|&child| dom.as_text(child))
            .collect()
    }

    /// Whether the `type` / `language` attributes name a script we run.
    #[must_use]
    pub fn is_script_type_supported(&self, dom: &DomTree, legacy: LegacyTypeSupport) -> bool {
        let ty = Self::attr(dom, self.element, "type").unwrap_or("");
        let language = Self::attr(dom, self.element, "language").unwrap_or("");

        if ty.is_empty() && language.is_empty() {
            // Assume text/javascript.
            return true;
        }
        if ty.is_empty() {
            let implied = format!("text/{}", language.to_ascii_lowercase());
            return is_supported_javascript_mime_type(&implied)
                || is_legacy_supported_language(language);
        }
        let normalized = ty.trim().to_ascii_lowercase();
        is_supported_javascript_mime_type(&normalized)
            || (legacy == LegacyTypeSupport::AllowInTypeAttribute
                && is_legacy_supported_language(ty))
    }

    fn is_script_for_event_supported(&self, dom: &DomTree) -> bool {
        let event = Self::attr(dom, self.element, "event");
        let for_attr = Self::attr(dom, self.element, "for");
        match (event, for_attr) {
            (Some(event), Some(for_attr)) => {
                let for_attr = for_attr.trim();
                if !for_attr.eq_ignore_ascii_case("window") {
                    return false;
                }
                let event = event.trim();
                event.eq_ignore_ascii_case("onload") || event.eq_ignore_ascii_case("onload()")
            }
            _ => true,
        }
    }

    /// [§ 4.12.1.1 Prepare the script element](https://html.spec.whatwg.org/multipage/scripting.html#prepare-the-script-element)
    ///
    /// Returns true if the element started (and was queued or executed).
    pub fn prepare_script(
        &mut self,
        dom: &mut DomTree,
        host: &mut dyn ScriptHost,
        start: TextPosition,
        legacy: LegacyTypeSupport,
    ) -> bool {
        // STEP 1: "If el's already started is true, then return."
        if self.already_started {
            return false;
        }

        // STEP 2-3: remember and clear "parser document"; a parser-inserted
        // script without async becomes non-blocking while we check.
        let was_parser_inserted = self.parser_inserted;
        if was_parser_inserted {
            self.parser_inserted = false;
            if !self.async_attribute(dom) {
                self.force_async = true;
            }
        }

        // STEP 5: nothing to run.
        if !self.has_source_attribute(dom) && dom.first_child(self.element).is_none() {
            return false;
        }

        // STEP 6: "If el is not connected, then return."
        if !dom.is_connected(self.element) {
            return false;
        }

        // STEP 7-8: unsupported type.
        if !self.is_script_type_supported(dom, legacy) {
            return false;
        }

        // STEP 9-10: restore parser-inserted state.
        if was_parser_inserted {
            self.parser_inserted = true;
            self.force_async = false;
        }

        // STEP 11: "Set el's already started to true."
        self.already_started = true;

        if dom.is_detached() || !host.can_execute_scripts() {
            return false;
        }
        if !self.is_script_for_event_supported(dom) {
            return false;
        }

        self.character_encoding = Self::attr(dom, self.element, "charset")
            .filter(|c| !c.is_empty())
            .unwrap_or("UTF-8")
            .to_string();

        let src = Self::attr(dom, self.element, "src").map(str::to_string);
        if let Some(src) = &src {
            if !self.request_script(dom, host, src) {
                return false;
            }
        }

        let is_async = self.async_attribute(dom);
        if src.is_some() && self.defer_attribute(dom) && self.parser_inserted && !is_async {
            self.will_execute_when_document_finished_parsing = true;
            self.will_be_parser_executed = true;
        } else if src.is_some() && self.parser_inserted && !is_async {
            self.will_be_parser_executed = true;
        } else if src.is_none() && self.parser_inserted && !dom.have_style_sheets_loaded() {
            self.will_be_parser_executed = true;
            self.ready_to_be_parser_executed = true;
        } else if src.is_some() && !is_async && !self.force_async {
            self.will_execute_in_order = true;
        } else if src.is_some() {
            // Async; the owner queues it with a ScriptRunner.
        } else {
            let url = if self.parser_inserted {
                dom.url().map(str::to_string)
            } else {
                None
            };
            let source = ScriptSourceCode::new(self.script_content(dom), url, start);
            self.execute_script(dom, host, &source);
        }

        true
    }

    fn request_script(&mut self, dom: &mut DomTree, host: &mut dyn ScriptHost, url: &str) -> bool {
        let token = dom.liveness_token();
        dom.dispatch_event(self.element, DomEventKind::BeforeLoad);
        if !host.before_load(dom, self.element, url) {
            return false;
        }
        // beforeload listeners may have removed the element or torn the
        // document down.
        if !dom.is_alive(token) || !dom.is_connected(self.element) {
            return false;
        }

        self.is_external = true;
        self.source_url = Some(url.to_string());
        match host.fetch_script(self.element, url, &self.character_encoding) {
            ScriptFetch::Ready(source) => self.fetch = Some(FetchState::Loaded(source)),
            ScriptFetch::Pending => self.fetch = Some(FetchState::Loading),
            ScriptFetch::Failed(error) => {
                log::debug!("script request for {url} failed: {error}");
                self.fetch = None;
                self.dispatch_error_event(dom);
                return false;
            }
        }
        true
    }

    /// Run `source` through the host unless policy forbids it.
    pub fn execute_script(
        &self,
        dom: &mut DomTree,
        host: &mut dyn ScriptHost,
        source: &ScriptSourceCode,
    ) {
        debug_assert!(self.already_started, "executing a script that never started");
        if source.is_empty() {
            return;
        }
        if !self.is_external && !host.allow_inline_script(dom, self.element) {
            warn_once("Script", "inline script blocked by content security policy");
            return;
        }
        if dom.is_detached() {
            return;
        }
        host.execute_script(dom, source);
    }

    /// Record the outcome of a pending fetch.
    pub fn notify_finished(&mut self, result: Result<String, ScriptLoadError>) {
        self.fetch = Some(match result {
            Ok(source) => FetchState::Loaded(source),
            Err(error) => FetchState::Failed(error),
        });
    }

    /// Run a loaded external script and fire `load`, or fire `error`.
    ///
    /// Does nothing while the fetch is still in flight.
    pub fn execute_loaded(&mut self, dom: &mut DomTree, host: &mut dyn ScriptHost) {
        match self.fetch.take() {
            Some(FetchState::Loaded(text)) => {
                let source = ScriptSourceCode::new(
                    text,
                    self.source_url.clone(),
                    TextPosition::default(),
                );
                let token = dom.liveness_token();
                self.execute_script(dom, host, &source);
                if dom.is_alive(token) {
                    self.dispatch_load_event(dom);
                }
            }
            Some(FetchState::Failed(ScriptLoadError::Canceled)) => {}
            Some(FetchState::Failed(_)) => self.dispatch_error_event(dom),
            Some(FetchState::Loading) => self.fetch = Some(FetchState::Loading),
            None => {}
        }
    }

    /// Queue a `load` event on the element.
    pub fn dispatch_load_event(&mut self, dom: &mut DomTree) {
        debug_assert!(!self.have_fired_load);
        self.have_fired_load = true;
        dom.dispatch_event(self.element, DomEventKind::Load);
    }

    /// Queue an `error` event on the element.
    pub fn dispatch_error_event(&self, dom: &mut DomTree) {
        dom.dispatch_event(self.element, DomEventKind::Error);
    }

    /// Script touched the `async` attribute; the element stops being
    /// implicitly async.
    pub const fn handle_async_attribute(&mut self) {
        self.force_async = false;
    }

    /// The element was inserted by script; non-parser scripts prepare now.
    pub fn inserted_into_document(&mut self, dom: &mut DomTree, host: &mut dyn ScriptHost) -> bool {
        if self.parser_inserted || !dom.is_connected(self.element) {
            return false;
        }
        self.prepare_script(dom, host, TextPosition::default(), LegacyTypeSupport::Disallow)
    }

    /// Children changed; a connected non-parser script that gained content prepares.
    pub fn children_changed(&mut self, dom: &mut DomTree, host: &mut dyn ScriptHost) -> bool {
        if self.parser_inserted
            || !dom.is_connected(self.element)
            || dom.first_child(self.element).is_none()
        {
            return false;
        }
        self.prepare_script(dom, host, TextPosition::default(), LegacyTypeSupport::Disallow)
    }

    /// The `src` attribute was set on a connected non-parser script.
    pub fn source_attribute_changed(
        &mut self,
        dom: &mut DomTree,
        host: &mut dyn ScriptHost,
    ) -> bool {
        if self.parser_inserted || !dom.is_connected(self.element) {
            return false;
        }
        self.prepare_script(dom, host, TextPosition::default(), LegacyTypeSupport::Disallow)
    }
}

/// Whether `node` is an element the script machinery handles.
#[must_use]
pub fn is_script_element(dom: &DomTree, node: NodeId) -> bool {
    matches!(
        dom.get(node).map(|n| &n.node_type),
        Some(NodeType::Element(data)) if data.is_script()
    )
}

/// Scripts that run outside the parser: in-order and async.
///
/// [§ 4.12.1.1](https://html.spec.whatwg.org/multipage/scripting.html#list-of-scripts-that-will-execute-in-order-as-soon-as-possible)
#[derive(Debug, Default)]
pub struct ScriptRunner {
    in_order: VecDeque<ScriptElement>,
    async_scripts: Vec<ScriptElement>,
    deferred: VecDeque<ScriptElement>,
}

impl ScriptRunner {
    /// An empty runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a prepared script that did not run immediately.
    pub fn queue(&mut self, script: ScriptElement) {
        match script.execution_path() {
            ExecutionPath::InOrder => self.in_order.push_back(script),
            ExecutionPath::Deferred => self.deferred.push_back(script),
            ExecutionPath::Async => self.async_scripts.push(script),
            ExecutionPath::Immediate
            | ExecutionPath::ParserBlocking
            | ExecutionPath::ParserBlockingReady => {
                debug_assert!(false, "parser scripts are not queued with the runner");
            }
        }
    }

    /// Deliver a fetch result to whichever queued script requested it.
    pub fn notify_finished(&mut self, element: NodeId, result: Result<String, ScriptLoadError>) {
        let script = self
            .in_order
            .iter_mut()
            .chain(self.async_scripts.iter_mut())
            .chain(self.deferred.iter_mut())
            .find(|s| s.element == element);
        if let Some(script) = script {
            script.notify_finished(result);
        }
    }

    /// Run every async script that has loaded and the longest loaded prefix
    /// of the in-order list.
    pub fn execute_ready(&mut self, dom: &mut DomTree, host: &mut dyn ScriptHost) {
        let mut index = 0;
        while index < self.async_scripts.len() {
            if self.async_scripts[index].is_loaded() {
                let mut script = self.async_scripts.remove(index);
                script.execute_loaded(dom, host);
            } else {
                index += 1;
            }
        }
        while self.in_order.front().is_some_and(ScriptElement::is_loaded) {
            if let Some(mut script) = self.in_order.pop_front() {
                script.execute_loaded(dom, host);
            }
        }
    }

    /// Run deferred scripts once parsing has finished, stopping at the first
    /// one still loading.
    pub fn execute_deferred(&mut self, dom: &mut DomTree, host: &mut dyn ScriptHost) {
        while self.deferred.front().is_some_and(ScriptElement::is_loaded) {
            if let Some(mut script) = self.deferred.pop_front() {
                script.execute_loaded(dom, host);
            }
        }
    }

    /// Whether any script is still waiting.
    #[must_use]
    pub fn has_pending_scripts(&self) -> bool {
        !self.in_order.is_empty() || !self.async_scripts.is_empty() || !self.deferred.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementData, XHTML_NAMESPACE};

    #[derive(Default)]
    struct RecordingHost {
        executed: Vec<ScriptSourceCode>,
    }

    impl ScriptHost for RecordingHost {
        fn fetch_script(&mut self, _element: NodeId, _url: &str, _charset: &str) -> ScriptFetch {
            ScriptFetch::Pending
        }

        fn execute_script(&mut self, _dom: &mut DomTree, source: &ScriptSourceCode) {
            self.executed.push(source.clone());
        }
    }

    fn script_with(dom: &mut DomTree, attrs: &[(&str, &str)], body: &str) -> NodeId {
        let mut data = ElementData::with_namespace("script", XHTML_NAMESPACE);
        for (k, v) in attrs {
            let _ = data.attrs.insert((*k).to_string(), (*v).to_string());
        }
        let script = dom.alloc(NodeType::Element(data));
        dom.append_child(NodeId::ROOT, script);
        if !body.is_empty() {
            let text = dom.create_text(body);
            dom.append_child(script, text);
        }
        script
    }

    #[test]
    fn test_type_support() {
        let mut dom = DomTree::new();
        let cases = [
            (vec![], true),
            (vec![("type", "text/javascript")], true),
            (vec![("type", " TEXT/JavaScript ")], true),
            (vec![("type", "text/plain")], false),
            (vec![("language", "JavaScript1.5")], true),
            (vec![("language", "vbscript")], false),
        ];
        for (attrs, expected) in cases {
            let id = script_with(&mut dom, &attrs, "");
            let element = ScriptElement::new(id, true, false);
            assert_eq!(
                element.is_script_type_supported(&dom, LegacyTypeSupport::Disallow),
                expected,
                "{attrs:?}"
            );
        }
    }

    #[test]
    fn test_legacy_type_attribute() {
        let mut dom = DomTree::new();
        let id = script_with(&mut dom, &[("type", "javascript1.2")], "");
        let element = ScriptElement::new(id, true, false);
        assert!(!element.is_script_type_supported(&dom, LegacyTypeSupport::Disallow));
        assert!(element.is_script_type_supported(&dom, LegacyTypeSupport::AllowInTypeAttribute));
    }

    #[test]
    fn test_inline_script_runs_with_position() {
        let mut dom = DomTree::new();
        dom.set_url("file:///doc.xml");
        let id = script_with(&mut dom, &[], "go()");
        let mut host = RecordingHost::default();
        let mut element = ScriptElement::new(id, true, false);

        let started = element.prepare_script(
            &mut dom,
            &mut host,
            TextPosition::new(3, 9),
            LegacyTypeSupport::Disallow,
        );

        assert!(started);
        assert_eq!(element.execution_path(), ExecutionPath::Immediate);
        assert_eq!(host.executed.len(), 1);
        assert_eq!(host.executed[0].source, "go()");
        assert_eq!(host.executed[0].url.as_deref(), Some("file:///doc.xml"));
        assert_eq!(host.executed[0].start, TextPosition::new(3, 9));
    }

    #[test]
    fn test_already_started_is_noop() {
        let mut dom = DomTree::new();
        let id = script_with(&mut dom, &[], "go()");
        let mut host = RecordingHost::default();
        let mut element = ScriptElement::new(id, false, true);
        assert!(!element.prepare_script(
            &mut dom,
            &mut host,
            TextPosition::default(),
            LegacyTypeSupport::Disallow
        ));
        assert!(host.executed.is_empty());
    }

    #[test]
    fn test_parser_inserted_external_blocks_parser() {
        let mut dom = DomTree::new();
        let id = script_with(&mut dom, &[("src", "a.js")], "");
        let mut host = RecordingHost::default();
        let mut element = ScriptElement::new(id, true, false);
        assert!(element.prepare_script(
            &mut dom,
            &mut host,
            TextPosition::default(),
            LegacyTypeSupport::Disallow
        ));
        assert_eq!(element.execution_path(), ExecutionPath::ParserBlocking);
        assert!(!element.is_loaded());

        element.notify_finished(Ok("loaded()".to_string()));
        element.execute_loaded(&mut dom, &mut host);
        assert_eq!(host.executed[0].url.as_deref(), Some("a.js"));
        assert!(element.have_fired_load_event());
        assert!(dom.events().contains(&crate::DomEvent {
            target: id,
            kind: DomEventKind::Load
        }));
    }

    #[test]
    fn test_failed_load_fires_error() {
        let mut dom = DomTree::new();
        let id = script_with(&mut dom, &[("src", "a.js")], "");
        let mut host = RecordingHost::default();
        let mut element = ScriptElement::new(id, true, false);
        let _ = element.prepare_script(
            &mut dom,
            &mut host,
            TextPosition::default(),
            LegacyTypeSupport::Disallow,
        );
        element.notify_finished(Err(ScriptLoadError::Network("404".to_string())));
        element.execute_loaded(&mut dom, &mut host);
        assert!(host.executed.is_empty());
        assert_eq!(dom.events().last().map(|e| e.kind), Some(DomEventKind::Error));
    }

    #[test]
    fn test_inline_parser_script_waits_for_style_sheets() {
        let mut dom = DomTree::new();
        dom.add_pending_style_sheet();
        let id = script_with(&mut dom, &[], "go()");
        let mut host = RecordingHost::default();
        let mut element = ScriptElement::new(id, true, false);
        let _ = element.prepare_script(
            &mut dom,
            &mut host,
            TextPosition::default(),
            LegacyTypeSupport::Disallow,
        );
        assert_eq!(element.execution_path(), ExecutionPath::ParserBlockingReady);
        assert!(host.executed.is_empty());
    }

    #[test]
    fn test_runner_in_order_waits_for_head() {
        let mut dom = DomTree::new();
        let first = script_with(&mut dom, &[("src", "1.js")], "");
        let second = script_with(&mut dom, &[("src", "2.js")], "");
        let mut host = RecordingHost::default();
        let mut runner = ScriptRunner::new();
        for id in [first, second] {
            let mut element = ScriptElement::new(id, false, false);
            element.handle_async_attribute();
            assert!(element.inserted_into_document(&mut dom, &mut host));
            assert_eq!(element.execution_path(), ExecutionPath::InOrder);
            runner.queue(element);
        }

        runner.notify_finished(second, Ok("two".to_string()));
        runner.execute_ready(&mut dom, &mut host);
        assert!(host.executed.is_empty());

        runner.notify_finished(first, Ok("one".to_string()));
        runner.execute_ready(&mut dom, &mut host);
        let order: Vec<_> = host.executed.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(order, ["one", "two"]);
        assert!(!runner.has_pending_scripts());
    }

    #[test]
    fn test_runner_async_runs_when_loaded() {
        let mut dom = DomTree::new();
        let first = script_with(&mut dom, &[("src", "1.js")], "");
        let second = script_with(&mut dom, &[("src", "2.js")], "");
        let mut host = RecordingHost::default();
        let mut runner = ScriptRunner::new();
        for id in [first, second] {
            let mut element = ScriptElement::new(id, false, false);
            assert!(element.inserted_into_document(&mut dom, &mut host));
            assert_eq!(element.execution_path(), ExecutionPath::Async);
            runner.queue(element);
        }

        runner.notify_finished(second, Ok("two".to_string()));
        runner.execute_ready(&mut dom, &mut host);
        assert_eq!(host.executed.len(), 1);
        assert!(runner.has_pending_scripts());
    }
}
