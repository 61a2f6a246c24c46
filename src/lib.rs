//! # Minuta
//!
//! Turns rich-text legal templates and form data into paginated A4 PDFs, and
//! into an editable on-screen preview of the same document.
//!
//! Templates come from a rich-text editor: paragraphs, bold/italic/underline,
//! `ql-align-*` classes, and a small placeholder grammar (`{{key}}`,
//! `{{#rows}}...{{/rows}}`). The engine merges the data, decides whether the
//! author already wrote a formal header and signature block, adds the ones
//! missing, and flows the text onto pages.
//!
//! ## Architecture
//!
//! ```text
//! template + UserData
//!       ↓
//!   [template]  — placeholder grammar, loop expansion, merge
//!       ↓
//!   [markup]    — blocks, alignment, inline styles
//!       ↓
//!   [shape]     — layout type, header/footer detection and synthesis
//!       ↓
//!   [text]      — line breaking
//!       ↓
//!   [layout]    — page canvas, page breaks
//!       ↓
//!   [pdf]       — serialize to PDF bytes
//!
//!   [preview]   — editable tree of the same template (parallel output)
//! ```

pub mod config;
pub mod error;
pub mod font;
pub mod layout;
pub mod markup;
pub mod model;
pub mod pdf;
pub mod preview;
pub mod render;
pub mod shape;
pub mod template;
pub mod text;

pub use config::RenderConfig;
pub use error::{MinutaError, Result};
pub use model::{DocumentRequest, FormSchema, LayoutType, UserData};
pub use preview::{render_editable, PreviewOptions, PreviewSession, PreviewTree};
pub use render::{BufferSink, DocumentRenderer, FileSink, OutputSink, RenderedDocument};
pub use template::merge;

/// Render a request to PDF bytes with the default configuration.
///
/// This is the primary entry point. Use [`DocumentRenderer`] to render
/// several documents with one configuration, or to pick an output sink.
pub fn render(request: &DocumentRequest) -> Result<Vec<u8>> {
    Ok(DocumentRenderer::default().render(request)?.pdf)
}

/// Render a request described as JSON to PDF bytes.
pub fn render_json(json: &str) -> Result<Vec<u8>> {
    let request: DocumentRequest = serde_json::from_str(json)?;
    render(&request)
}
