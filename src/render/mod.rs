//! # Document Renderer
//!
//! One pipeline from template and data to PDF bytes:
//!
//! ```text
//! parse → merge → classify → header → body → footer → serialize
//! ```
//!
//! The header and signature block are keep-together sections; the body flows
//! across pages. Where the bytes end up (a response buffer, a download
//! folder) is an [`OutputSink`], so every caller runs the same code.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::config::RenderConfig;
use crate::error::Result;
use crate::font::metrics::fold_accent;
use crate::font::FontContext;
use crate::layout::{LayoutPage, PageCanvas};
use crate::markup;
use crate::model::{DocumentRequest, LayoutType};
use crate::pdf::PdfWriter;
use crate::shape::{self, ShapeDecision, ShapeInput};
use crate::template::{render_markup, Template};

/// Used when neither the title nor the name yields a usable file name.
const FALLBACK_FILENAME: &str = "documento";

/// Positioned pages, before serialization.
#[derive(Debug, Clone)]
pub struct LaidOutDocument {
    pub pages: Vec<LayoutPage>,
    pub shape: ShapeDecision,
}

/// A finished PDF and what was decided while producing it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub page_count: usize,
    pub layout_type: LayoutType,
    pub shape: ShapeDecision,
    pub filename: String,
}

/// Renders documents with a fixed configuration. Holds no per-render state.
pub struct DocumentRenderer {
    config: RenderConfig,
    fonts: FontContext,
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self {
            fonts: FontContext::new(&RenderConfig::default().typography.font_family),
            config: RenderConfig::default(),
        }
    }
}

impl DocumentRenderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let fonts = FontContext::new(&config.typography.font_family);
        Ok(Self { config, fonts })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Merge the template, decide the document shape and lay everything out.
    pub fn layout(&self, request: &DocumentRequest) -> Result<LaidOutDocument> {
        let config = &self.config;
        let template = Template::parse(&request.template, config.template.strict_structure)?;
        let merged = render_markup(&template, &request.data, config.template.loop_scope);
        let plain = markup::plain_text(&merged);

        let shape = shape::classify(
            &ShapeInput {
                template: &template,
                plain_text: &plain,
                title: &request.title,
                data: &request.data,
                explicit: request.layout,
            },
            &config.shape,
        );

        let mut canvas = PageCanvas::new(&config.page, &config.typography, config.markup, &self.fonts);
        let x = canvas.content_x();
        let width = canvas.content_width();

        let header = shape::header_section(&shape, &request.title, &request.data, &config.shape);
        if !header.is_empty() {
            canvas.place_together(&header, x, width)?;
        }

        let y = canvas.y();
        canvas.layout_html(&merged, x, y, width)?;

        let footer = shape::footer_section(&shape, &request.data, request.issued_on, &config.shape);
        if !footer.is_empty() {
            canvas.place_together(&footer, x, width)?;
        }

        let pages = canvas.finish();
        debug!("laid out {} page(s)", pages.len());
        Ok(LaidOutDocument { pages, shape })
    }

    /// Render a request to PDF bytes.
    pub fn render(&self, request: &DocumentRequest) -> Result<RenderedDocument> {
        let laid_out = self.layout(request)?;
        let writer = PdfWriter::new(&self.config.pdf);
        let pdf = writer.write(&laid_out.pages, &request.title, &self.fonts)?;

        let name = request.data.non_empty(&self.config.shape.name_field);
        let stem = match name {
            Some(name) => format!("{} {}", request.title, name),
            None => request.title.clone(),
        };
        let filename = format!("{}.pdf", sanitize_filename(&stem, FALLBACK_FILENAME));

        info!(
            "rendered '{}' as {} ({} page(s), {} bytes)",
            request.title,
            laid_out.shape.layout_type,
            laid_out.pages.len(),
            pdf.len()
        );
        Ok(RenderedDocument {
            page_count: laid_out.pages.len(),
            layout_type: laid_out.shape.layout_type,
            shape: laid_out.shape,
            filename,
            pdf,
        })
    }

    /// Render and hand the bytes to `sink`.
    pub fn render_to(
        &self,
        request: &DocumentRequest,
        sink: &mut dyn OutputSink,
    ) -> Result<RenderedDocument> {
        let rendered = self.render(request)?;
        sink.deliver(&rendered.filename, &rendered.pdf)?;
        Ok(rendered)
    }
}

/// Destination for a finished PDF.
pub trait OutputSink {
    fn deliver(&mut self, filename: &str, pdf: &[u8]) -> Result<()>;
}

/// Keeps the bytes in memory, for a response body.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl OutputSink for BufferSink {
    fn deliver(&mut self, filename: &str, pdf: &[u8]) -> Result<()> {
        self.filename = Some(filename.to_string());
        self.bytes.clear();
        self.bytes.extend_from_slice(pdf);
        Ok(())
    }
}

/// Writes the file into a directory, like a browser download.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl FileSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            written: Vec::new(),
        }
    }

    /// Every path written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl OutputSink for FileSink {
    fn deliver(&mut self, filename: &str, pdf: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        fs::write(&path, pdf)?;
        debug!("wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Lowercase ASCII slug with single dashes; accents are folded first.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let mut result = String::new();
    let mut last_dash = false;

    for ch in name.trim().chars() {
        let ch = fold_accent(ch).unwrap_or(ch);
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !last_dash && !result.is_empty() {
            result.push('-');
            last_dash = true;
        }
    }

    let result = result.trim_matches('-');
    if result.is_empty() {
        return fallback.to_string();
    }
    result.to_string()
}
