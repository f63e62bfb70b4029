//! Content type detection for mock bodies.
//!
//! Used only when no `Content-Type` header was configured. The text is
//! classified by attempting a parse, never by inspecting declared metadata.

use serde_json::Value;

/// Classification of a text blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Xml,
    Plain,
}

impl ContentKind {
    /// Media type reported for this classification.
    pub fn media_type(self) -> &'static str {
        match self {
            ContentKind::Json => "application/json",
            ContentKind::Xml => "text/xml",
            ContentKind::Plain => "text/plain",
        }
    }
}

/// Classify `text` as JSON, XML or plain text.
pub fn classify(text: &str) -> ContentKind {
    if is_json(text) {
        ContentKind::Json
    } else if is_xml(text) {
        ContentKind::Xml
    } else {
        ContentKind::Plain
    }
}

/// True when `text` parses as a JSON object or a JSON array.
pub fn is_json(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(text),
        Ok(Value::Object(_) | Value::Array(_))
    )
}

/// True when `text` parses as an XML document (non-validating, namespace aware).
pub fn is_xml(text: &str) -> bool {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    roxmltree::Document::parse_with_options(text, options).is_ok()
}
