//! Structured error types for the layout engine.
//!
//! A failed pass never leaves a half-written forest behind: the engine lays
//! out a replacement tree and only commits it when every step succeeded.

use thiserror::Error;

/// The unified error type returned by the public layout API.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// JSON input failed to parse as a forest or a settings object.
    #[error("Failed to parse input: {source}{}", format_hint(hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },
    /// The settings name a per-root strategy that is not registered.
    #[error("Unknown layout strategy `{0}`")]
    UnknownStrategy(String),
    /// The forest violates a structural invariant (duplicate ids, non-finite
    /// coordinates) and cannot be laid out.
    #[error("Corrupt tree: {0}")]
    CorruptTree(String),
    /// A font could not be decoded or parsed.
    #[error("Font error: {0}")]
    Font(String),
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for LayoutError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the node/settings schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        LayoutError::Parse { source: e, hint }
    }
}
