//! # PDF Serializer
//!
//! Takes the laid-out pages and writes a PDF 1.7 file. The documents only
//! need text in the standard Type1 faces and filled rules, so the writer
//! emits raw objects itself.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (catalog, pages, fonts, content streams)
//! 2 0 obj ... endobj
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! Layout coordinates are millimetres from the top-left corner; PDF user
//! space is points from the bottom-left. Conversion happens only here.

use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;

use log::debug;
use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::config::PdfOptions;
use crate::error::{MinutaError, Result};
use crate::font::{encode_winansi, FontContext, FontKey, PT_TO_MM};
use crate::layout::{DrawCommand, LayoutElement, LayoutPage, TextLine};

/// Millimetres to points.
pub const MM_TO_PT: f64 = 1.0 / PT_TO_MM;

pub struct PdfWriter {
    compress: bool,
    producer: String,
}

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<Vec<u8>>,
    /// Resource index is the position in this list.
    font_objects: Vec<(FontKey, usize)>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new(&PdfOptions::default())
    }
}

impl PdfWriter {
    pub fn new(options: &PdfOptions) -> Self {
        Self {
            compress: options.compress,
            producer: options.producer.clone(),
        }
    }

    /// Write laid-out pages to a PDF byte vector.
    pub fn write(&self, pages: &[LayoutPage], title: &str, fonts: &FontContext) -> Result<Vec<u8>> {
        let mut builder = PdfBuilder {
            objects: Vec::new(),
            font_objects: Vec::new(),
        };

        // 0 = placeholder (PDF objects are 1-indexed), 1 = Catalog, 2 = Pages
        builder.objects.push(Vec::new());
        builder.objects.push(Vec::new());
        builder.objects.push(Vec::new());

        self.register_fonts(&mut builder, pages, fonts);

        let mut page_obj_ids: Vec<usize> = Vec::with_capacity(pages.len());
        for page in pages {
            let content = self.build_content_stream(page, &builder.font_objects)?;
            let content_obj_id = builder.objects.len();
            builder.objects.push(self.stream_object(content.as_bytes()));

            let page_obj_id = builder.objects.len();
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << /Font << {} >> >> >>",
                page.width * MM_TO_PT,
                page.height * MM_TO_PT,
                content_obj_id,
                Self::build_font_resource_dict(&builder.font_objects)
            );
            builder.objects.push(page_dict.into_bytes());
            page_obj_ids.push(page_obj_id);
        }

        builder.objects[1] = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();

        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let info_obj_id = builder.objects.len();
        let mut info = String::from("<< ");
        if !title.trim().is_empty() {
            let _ = write!(info, "/Title ({}) ", Self::pdf_string(title.trim())?);
        }
        let _ = write!(info, "/Producer ({}) >>", Self::pdf_string(&self.producer)?);
        builder.objects.push(info.into_bytes());

        debug!(
            "serialized {} page(s) with {} font(s)",
            page_obj_ids.len(),
            builder.font_objects.len()
        );
        Ok(Self::serialize(&builder, info_obj_id))
    }

    fn stream_object(&self, content: &[u8]) -> Vec<u8> {
        let mut data: Vec<u8> = Vec::new();
        if self.compress {
            let compressed = compress_to_vec_zlib(content, 6);
            let _ = write!(
                data,
                "<< /Length {} /Filter /FlateDecode >>\nstream\n",
                compressed.len()
            );
            data.extend_from_slice(&compressed);
        } else {
            let _ = write!(data, "<< /Length {} >>\nstream\n", content.len());
            data.extend_from_slice(content);
        }
        data.extend_from_slice(b"\nendstream");
        data
    }

    /// Build the PDF content stream for a single page.
    fn build_content_stream(
        &self,
        page: &LayoutPage,
        font_objects: &[(FontKey, usize)],
    ) -> Result<String> {
        let mut stream = String::new();
        for element in &page.elements {
            self.write_element(&mut stream, element, page.height, font_objects)?;
        }
        Ok(stream)
    }

    fn write_element(
        &self,
        stream: &mut String,
        element: &LayoutElement,
        page_height: f64,
        font_objects: &[(FontKey, usize)],
    ) -> Result<()> {
        match &element.draw {
            DrawCommand::Rule { thickness } => {
                let y = page_height - element.y - thickness;
                let _ = write!(
                    stream,
                    "q\n0 0 0 rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                    element.x * MM_TO_PT,
                    y * MM_TO_PT,
                    element.width * MM_TO_PT,
                    thickness * MM_TO_PT
                );
            }
            DrawCommand::Text { line } => {
                self.write_text_line(stream, line, page_height, font_objects)?;
            }
        }
        Ok(())
    }

    fn write_text_line(
        &self,
        stream: &mut String,
        line: &TextLine,
        page_height: f64,
        font_objects: &[(FontKey, usize)],
    ) -> Result<()> {
        if line.runs.is_empty() {
            return Ok(());
        }
        let pdf_y = (page_height - line.baseline) * MM_TO_PT;
        let word_spacing = line.word_spacing * MM_TO_PT;

        let _ = write!(stream, "BT\n0 0 0 rg\n{:.3} Tw\n", word_spacing);
        for run in &line.runs {
            let idx = Self::font_index(&run.font, font_objects);
            // Absolute text matrix per run.
            let _ = write!(
                stream,
                "/F{} {:.1} Tf\n1 0 0 1 {:.2} {:.2} Tm\n({}) Tj\n",
                idx,
                run.font_size,
                run.x * MM_TO_PT,
                pdf_y,
                Self::pdf_string(&run.text)?
            );
        }
        let _ = write!(stream, "ET\n");
        Ok(())
    }

    /// Register fonts used across all pages. Each unique (family, weight,
    /// italic) combination gets its own PDF font object.
    fn register_fonts(&self, builder: &mut PdfBuilder, pages: &[LayoutPage], fonts: &FontContext) {
        let mut keys: Vec<FontKey> = pages
            .iter()
            .flat_map(|page| page.elements.iter())
            .filter_map(|element| match &element.draw {
                DrawCommand::Text { line } => Some(line.runs.iter().map(|run| run.font.clone())),
                DrawCommand::Rule { .. } => None,
            })
            .flatten()
            .collect();

        // Sort for deterministic ordering, then dedup
        keys.sort();
        keys.dedup();

        // An empty document still needs one font resource.
        if keys.is_empty() {
            keys.push(fonts.key(false, false));
        }

        for key in keys {
            let obj_id = builder.objects.len();
            let font_dict = format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} \
                 /Encoding /WinAnsiEncoding >>",
                fonts.resolve(&key).pdf_name()
            );
            builder.objects.push(font_dict.into_bytes());
            builder.font_objects.push((key, obj_id));
        }
    }

    fn build_font_resource_dict(font_objects: &[(FontKey, usize)]) -> String {
        font_objects
            .iter()
            .enumerate()
            .map(|(i, (_, obj_id))| format!("/F{} {} 0 R", i, obj_id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Look up the font index (/F0, /F1, etc.) for a key.
    fn font_index(key: &FontKey, font_objects: &[(FontKey, usize)]) -> usize {
        font_objects
            .iter()
            .position(|(k, _)| {
                k.family == key.family && k.is_bold() == key.is_bold() && k.italic == key.italic
            })
            .unwrap_or(0)
    }

    /// Encode text as the body of a PDF literal string: WinAnsi bytes,
    /// delimiters escaped, anything outside printable ASCII as octal.
    fn pdf_string(s: &str) -> Result<String> {
        let bytes = encode_winansi(s).map_err(|e| match e {
            MinutaError::Render(msg) => MinutaError::Render(format!("PDF text: {msg}")),
            other => other,
        })?;
        let mut out = String::with_capacity(bytes.len());
        for b in bytes {
            match b {
                b'\\' => out.push_str("\\\\"),
                b'(' => out.push_str("\\("),
                b')' => out.push_str("\\)"),
                0x20..=0x7E => out.push(b as char),
                _ => {
                    let _ = write!(out, "\\{:03o}", b);
                }
            }
        }
        Ok(out)
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(builder: &PdfBuilder, info_obj_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(obj);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_obj_id,
            xref_offset
        );

        output
    }
}
