//! # Render Configuration
//!
//! Page geometry, typography, template/markup semantics and the document
//! shape rule set. Every field has a default, so `{}` is a valid config file
//! and yields the A4 / Times 12pt / 30-30-20-20mm house style.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MinutaError, Result};
use crate::model::LayoutType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub page: PageConfig,
    pub typography: Typography,
    pub template: TemplateOptions,
    pub markup: MarkupOptions,
    pub shape: ShapeRules,
    pub pdf: PdfOptions,
}

impl RenderConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject geometry that would make layout impossible.
    pub fn validate(&self) -> Result<()> {
        let (w, h) = self.page.size.dimensions();
        if !(positive(w) && positive(h)) {
            return Err(MinutaError::Config(format!(
                "page size must be positive, got {w}x{h}mm"
            )));
        }
        let m = &self.page.margin;
        if ![m.top, m.right, m.bottom, m.left].into_iter().all(non_negative) {
            return Err(MinutaError::Config("margins must not be negative".into()));
        }
        if m.left + m.right >= w || m.top + m.bottom >= h {
            return Err(MinutaError::Config(format!(
                "margins leave no content area on a {w}x{h}mm page"
            )));
        }
        let t = &self.typography;
        if !(positive(t.font_size) && positive(t.line_height)) {
            return Err(MinutaError::Config(
                "font size and line height must be positive".into(),
            ));
        }
        if !(non_negative(t.paragraph_gap) && non_negative(t.empty_paragraph_gap)) {
            return Err(MinutaError::Config("gaps must not be negative".into()));
        }
        if !non_negative(self.shape.signature_rule_width) {
            return Err(MinutaError::Config(
                "signature rule width must not be negative".into(),
            ));
        }
        Ok(())
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Page size and margins, in millimetres.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageConfig {
    pub size: PageSize,
    pub margin: Margins,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            margin: Margins::default(),
        }
    }
}

impl PageConfig {
    pub fn content_width(&self) -> f64 {
        self.size.dimensions().0 - self.margin.left - self.margin.right
    }

    pub fn content_height(&self) -> f64 {
        self.size.dimensions().1 - self.margin.top - self.margin.bottom
    }

    /// Lowest y (from the top edge) that content may reach.
    pub fn bottom_limit(&self) -> f64 {
        self.size.dimensions().1 - self.margin.bottom
    }
}

/// Portrait page sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// (width, height) in millimetres.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Missing sides fall back to the house margins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 30.0,
            right: 20.0,
            bottom: 20.0,
            left: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Typography {
    /// One family for the whole document.
    pub font_family: String,
    /// In points.
    pub font_size: f64,
    /// Distance between consecutive lines, in mm.
    pub line_height: f64,
    /// Space after each non-empty block, in mm.
    pub paragraph_gap: f64,
    /// Space an empty `<p></p>` block occupies, in mm.
    pub empty_paragraph_gap: f64,
    pub min_orphan_lines: u32,
    pub min_widow_lines: u32,
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            font_family: "Times".to_string(),
            font_size: 12.0,
            line_height: 7.0,
            paragraph_gap: 2.0,
            empty_paragraph_gap: 5.0,
            min_orphan_lines: 2,
            min_widow_lines: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateOptions {
    /// Raise on malformed loop markup instead of dropping the markers.
    pub strict_structure: bool,
    pub loop_scope: LoopScope,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            strict_structure: true,
            loop_scope: LoopScope::RowFirst,
        }
    }
}

/// Which keys a placeholder inside a loop body can see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopScope {
    /// Row keys shadow top-level keys; everything else falls through.
    #[default]
    RowFirst,
    /// Only the row's own keys.
    RowOnly,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkupOptions {
    pub emphasis: EmphasisMode,
}

/// How nested emphasis tags combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmphasisMode {
    /// Depth counting: a style stays on until every opening tag is closed.
    #[default]
    Nested,
    /// Any opening tag sets the flag, any closing tag clears it.
    Toggle,
}

/// Keyword lists, data fields and boilerplate of the document shape heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeRules {
    /// Checked in order; the first rule with a keyword found in the title wins.
    pub layout_keywords: Vec<LayoutRule>,
    pub default_layout: LayoutType,

    pub header_placeholders: Vec<String>,
    pub header_keywords: Vec<String>,
    pub header_scan_chars: usize,
    pub title_scan_chars: usize,

    pub footer_phrases: Vec<String>,
    pub footer_placeholders: Vec<String>,
    pub footer_scan_chars: usize,

    pub addressee_fields: Vec<String>,
    pub institution_field: String,
    pub subject_field: String,
    pub subject_prefix: String,
    pub location_fields: Vec<String>,

    pub city_field: String,
    pub date_field: String,
    pub name_field: String,

    pub closing_phrase: String,
    pub declarant_label: String,
    pub applicant_label: String,
    /// Signature rule width, in mm.
    pub signature_rule_width: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRule {
    pub layout: LayoutType,
    pub keywords: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ShapeRules {
    fn default() -> Self {
        Self {
            layout_keywords: vec![
                LayoutRule {
                    layout: LayoutType::Official,
                    keywords: strings(&["requerimento"]),
                },
                LayoutRule {
                    layout: LayoutType::Declaration,
                    keywords: strings(&["declaração", "compromisso", "contrato"]),
                },
                LayoutRule {
                    layout: LayoutType::Letter,
                    keywords: strings(&["carta", "manifestação"]),
                },
            ],
            default_layout: LayoutType::Official,
            header_placeholders: strings(&[
                "target_authority",
                "destinatary_role",
                "institution_name",
                "subject",
            ]),
            header_keywords: strings(&[
                "EXMO",
                "EXCELENTÍSSIMO",
                "ILUSTRÍSSIMO",
                "DIRECTOR",
                "SENHOR",
            ]),
            header_scan_chars: 500,
            title_scan_chars: 300,
            footer_phrases: strings(&["pede deferimento", "assinatura"]),
            footer_placeholders: strings(&["current_city", "current_date"]),
            footer_scan_chars: 300,
            addressee_fields: strings(&["target_authority", "destinatary_role"]),
            institution_field: "institution_name".to_string(),
            subject_field: "subject".to_string(),
            subject_prefix: "Assunto: ".to_string(),
            location_fields: strings(&["target_location", "current_city"]),
            city_field: "current_city".to_string(),
            date_field: "current_date".to_string(),
            name_field: "full_name".to_string(),
            closing_phrase: "Pede deferimento.".to_string(),
            declarant_label: "(Assinatura do Declarante)".to_string(),
            applicant_label: "(Assinatura do Requerente)".to_string(),
            signature_rule_width: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfOptions {
    /// Flate-compress page content streams.
    pub compress: bool,
    pub producer: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            compress: true,
            producer: concat!("minuta ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
