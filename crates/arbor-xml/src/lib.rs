//! XML document building for arbor.
//!
//! The tokenizer is an external collaborator: it reports SAX callbacks
//! (start/end element, characters, comments, processing instructions, CDATA,
//! the internal subset and errors) and this crate turns them into a
//! [`DomTree`](arbor_dom::DomTree). Parser-inserted scripts run as their end
//! tags are seen, which may pause the parser until an external script loads;
//! callbacks that arrive while paused are queued and replayed on resume.
//!
//! Parse errors never surface as `Err`. They accumulate in [`XmlErrors`] and
//! are rendered into the document as a `<parsererror>` block when parsing ends.

mod errors;
mod parser;

pub use errors::{MAX_RECORDED_ERRORS, XmlErrorType, XmlErrors};
pub use parser::{
    NamespaceDecl, PositionedEvent, SaxAttribute, SaxEvent, XmlDeclaration, XmlDocumentParser,
    XmlParseError,
};
