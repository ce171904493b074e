//! Processing instructions and `xml-stylesheet` handling.
//!
//! [Associating Style Sheets with XML documents](https://www.w3.org/TR/xml-stylesheet/)
//!
//! A `<?xml-stylesheet ...?>` instruction carries pseudo-attributes in its
//! data. A CSS sheet is loaded and applied; an XSL sheet means the document
//! is going to be transformed, which the parser treats as a reason to stop
//! building the untransformed tree.

use std::collections::HashMap;

use strum_macros::Display;

/// Data held by a processing-instruction node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingInstructionData {
    /// The PI target, e.g. `xml-stylesheet`.
    pub target: String,
    /// Everything after the target.
    pub data: String,
}

impl ProcessingInstructionData {
    /// Create a processing instruction.
    #[must_use]
    pub fn new(target: &str, data: &str) -> Self {
        Self {
            target: target.to_string(),
            data: data.to_string(),
        }
    }

    /// Inspect this instruction as a style sheet link.
    #[must_use]
    pub fn style_sheet_request(&self) -> Option<StyleSheetRequest> {
        check_style_sheet(&self.target, &self.data)
    }
}

/// The language of a linked style sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StyleSheetKind {
    /// `text/css` (or no type at all).
    #[strum(serialize = "css")]
    Css,
    /// One of the XML/XSL types that request a transformation.
    #[strum(serialize = "xsl")]
    Xsl,
}

/// A style sheet the document asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSheetRequest {
    /// CSS or XSL.
    pub kind: StyleSheetKind,
    /// The `href` pseudo-attribute as written.
    pub href: String,
    /// The fragment of a same-document reference (`href="#id"`).
    pub local_href: Option<String>,
    /// The `title` pseudo-attribute.
    pub title: Option<String>,
    /// The `media` pseudo-attribute.
    pub media: Option<String>,
    /// The `charset` pseudo-attribute.
    pub charset: Option<String>,
    /// Whether `alternate="yes"` was given.
    pub alternate: bool,
}

impl StyleSheetRequest {
    /// Whether the sheet lives inside this document.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.local_href.is_some()
    }
}

const XSL_TYPES: &[&str] = &[
    "text/xml",
    "text/xsl",
    "application/xml",
    "application/xhtml+xml",
    "application/rss+xml",
    "application/atom+xml",
];

/// Classify an `xml-stylesheet` processing instruction.
///
/// Returns `None` for other targets, unparseable pseudo-attributes, types
/// that are neither CSS nor XSL, and alternate sheets without a title.
#[must_use]
pub fn check_style_sheet(target: &str, data: &str) -> Option<StyleSheetRequest> {
    if target != "xml-stylesheet" {
        return None;
    }
    let attrs = parse_pseudo_attributes(data)?;

    let ty = attrs.get("type").map_or("", String::as_str);
    let kind = if ty.is_empty() || ty == "text/css" {
        StyleSheetKind::Css
    } else if XSL_TYPES.contains(&ty) {
        StyleSheetKind::Xsl
    } else {
        return None;
    };

    let href = attrs.get("href").cloned().unwrap_or_default();
    let title = attrs.get("title").filter(|t| !t.is_empty()).cloned();
    let alternate = attrs.get("alternate").is_some_and(|a| a == "yes");
    if alternate && title.is_none() {
        return None;
    }

    let local_href = href
        .strip_prefix('#')
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string);

    Some(StyleSheetRequest {
        kind,
        href,
        local_href,
        title,
        media: attrs.get("media").cloned(),
        charset: attrs.get("charset").cloned(),
        alternate,
    })
}

/// Parse `name="value"` / `name='value'` pairs.
///
/// Returns `None` if the data is not a well-formed pseudo-attribute list.
#[must_use]
pub fn parse_pseudo_attributes(data: &str) -> Option<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    let mut rest = data.trim_start();

    while !rest.is_empty() {
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return None;
        }
        let after = rest[eq + 1..].trim_start();
        let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let close = after[1..].find(quote)?;
        let value = &after[1..=close];
        let _ = attrs.insert(name.to_string(), decode_entities(value));
        rest = after[close + 2..].trim_start();
    }

    Some(attrs)
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_sheet_without_type() {
        let request = check_style_sheet("xml-stylesheet", r#"href="style.css""#).unwrap();
        assert_eq!(request.kind, StyleSheetKind::Css);
        assert_eq!(request.href, "style.css");
        assert!(!request.is_local());
    }

    #[test]
    fn test_xsl_sheet_by_type() {
        let request =
            check_style_sheet("xml-stylesheet", r#"type="text/xsl" href='t.xsl'"#).unwrap();
        assert_eq!(request.kind, StyleSheetKind::Xsl);
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        assert!(check_style_sheet("xml-stylesheet", r#"type="text/plain" href="a""#).is_none());
    }

    #[test]
    fn test_alternate_without_title_is_ignored() {
        assert!(check_style_sheet("xml-stylesheet", r#"href="a.css" alternate="yes""#).is_none());
        let titled =
            check_style_sheet("xml-stylesheet", r#"href="a.css" alternate="yes" title="Big""#);
        assert!(titled.is_some_and(|r| r.alternate));
    }

    #[test]
    fn test_local_reference() {
        let request =
            check_style_sheet("xml-stylesheet", r##"type="text/xsl" href="#embedded""##).unwrap();
        assert_eq!(request.local_href.as_deref(), Some("embedded"));
    }

    #[test]
    fn test_other_target() {
        assert!(check_style_sheet("php", r#"href="a.css""#).is_none());
    }

    #[test]
    fn test_malformed_pseudo_attributes() {
        assert!(parse_pseudo_attributes(r#"href="unterminated"#).is_none());
        assert!(parse_pseudo_attributes("href=bare").is_none());
        let attrs = parse_pseudo_attributes(r#"media="a &amp; b""#).unwrap();
        assert_eq!(attrs["media"], "a & b");
    }
}
