//! Structured error types for the rendering pipeline.
//!
//! A render either returns a complete artifact or one of these. Missing data
//! is never an error: unresolved placeholders become empty strings and
//! non-array loop values expand to nothing.

use thiserror::Error;

/// The unified error type returned by all public functions of the crate.
#[derive(Debug, Error)]
pub enum MinutaError {
    /// JSON input (user data, configuration, form schema) failed to parse.
    #[error("failed to parse JSON input: {source}{}", format_hint(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// The template's loop markup is malformed.
    #[error("template structure error at byte {offset}: {message}")]
    TemplateStructure { offset: usize, message: String },

    /// A unit that cannot be split is taller than an empty page.
    #[error(
        "layout overflow on page {page}: {needed:.1}mm needed, only {available:.1}mm available on an empty page"
    )]
    LayoutOverflow {
        page: usize,
        needed: f64,
        available: f64,
    },

    /// Text measurement or PDF serialization failed.
    #[error("render failure: {0}")]
    Render(String),

    /// The preview DOM reader could not make sense of the markup.
    #[error("markup error: {0}")]
    Markup(String),

    /// A preview edit points at a row or field that does not exist.
    #[error("invalid edit: {0}")]
    Edit(String),

    /// Configuration values are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MinutaError>;

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl From<serde_json::Error> for MinutaError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but has the wrong shape. Check field names and types."
                    .to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input, is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        MinutaError::Parse { source: e, hint }
    }
}

impl MinutaError {
    pub(crate) fn structure(offset: usize, message: impl Into<String>) -> Self {
        MinutaError::TemplateStructure {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_syntax_hint() {
        let err: MinutaError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.contains("failed to parse JSON input"));
        assert!(msg.contains("trailing commas"));
    }

    #[test]
    fn structure_error_names_offset() {
        let err = MinutaError::structure(12, "loop 'a' closed by 'b'");
        assert_eq!(
            err.to_string(),
            "template structure error at byte 12: loop 'a' closed by 'b'"
        );
    }
}
