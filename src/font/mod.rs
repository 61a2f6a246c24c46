//! # Font Management
//!
//! Documents use one family throughout, drawn from the standard PDF Type1
//! faces, so nothing is embedded: the writer references the font by name and
//! encodes text in WinAnsi. Measurement uses the built-in width tables.

pub mod metrics;

use std::collections::HashMap;

use log::warn;

use crate::error::{MinutaError, Result};
pub use metrics::StandardFontMetrics;

/// Points to millimetres.
pub const PT_TO_MM: f64 = 25.4 / 72.0;

/// Regular and bold weights; anything at or above 600 resolves to bold.
pub const WEIGHT_REGULAR: u32 = 400;
pub const WEIGHT_BOLD: u32 = 700;

#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: impl Into<String>, bold: bool, italic: bool) -> Self {
        Self {
            family: family.into(),
            weight: if bold { WEIGHT_BOLD } else { WEIGHT_REGULAR },
            italic,
        }
    }

    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }
}

/// The standard faces this engine draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    pub fn metrics(&self) -> &'static StandardFontMetrics {
        match self {
            Self::TimesRoman => &metrics::TIMES_ROMAN,
            Self::TimesBold => &metrics::TIMES_BOLD,
            Self::TimesItalic => &metrics::TIMES_ITALIC,
            Self::TimesBoldItalic => &metrics::TIMES_BOLD_ITALIC,
            Self::Courier | Self::CourierBold | Self::CourierOblique | Self::CourierBoldOblique => {
                &metrics::COURIER
            }
        }
    }
}

/// Maps (family, weight, italic) to a standard face.
pub struct FontRegistry {
    fonts: HashMap<FontKey, StandardFont>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let standard_mappings = [
            (("Times", false, false), StandardFont::TimesRoman),
            (("Times", true, false), StandardFont::TimesBold),
            (("Times", false, true), StandardFont::TimesItalic),
            (("Times", true, true), StandardFont::TimesBoldItalic),
            (("Courier", false, false), StandardFont::Courier),
            (("Courier", true, false), StandardFont::CourierBold),
            (("Courier", false, true), StandardFont::CourierOblique),
            (("Courier", true, true), StandardFont::CourierBoldOblique),
        ];
        let fonts = standard_mappings
            .into_iter()
            .map(|((family, bold, italic), font)| (FontKey::new(family, bold, italic), font))
            .collect();
        Self { fonts }
    }

    /// Look up a face, snapping the weight and falling back to Times.
    pub fn resolve(&self, key: &FontKey) -> StandardFont {
        let snapped = FontKey::new(key.family.clone(), key.is_bold(), key.italic);
        if let Some(font) = self.fonts.get(&snapped) {
            return *font;
        }
        match (key.is_bold(), key.italic) {
            (false, false) => StandardFont::TimesRoman,
            (true, false) => StandardFont::TimesBold,
            (false, true) => StandardFont::TimesItalic,
            (true, true) => StandardFont::TimesBoldItalic,
        }
    }
}

/// Font context shared by layout and PDF serialization.
///
/// Holds the document's single family, already resolved to one the registry
/// knows.
pub struct FontContext {
    registry: FontRegistry,
    family: String,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new("Times")
    }
}

impl FontContext {
    pub fn new(family: &str) -> Self {
        let family = match family.trim().to_ascii_lowercase().as_str() {
            "times" | "times-roman" | "times new roman" | "serif" => "Times",
            "courier" | "courier new" | "monospace" => "Courier",
            other => {
                warn!("unknown font family '{other}', falling back to Times");
                "Times"
            }
        };
        Self {
            registry: FontRegistry::new(),
            family: family.to_string(),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Key for a style of the document family.
    pub fn key(&self, bold: bool, italic: bool) -> FontKey {
        FontKey::new(self.family.clone(), bold, italic)
    }

    pub fn resolve(&self, key: &FontKey) -> StandardFont {
        self.registry.resolve(key)
    }

    /// Width of a single character, in points.
    pub fn char_width(&self, ch: char, key: &FontKey, font_size: f64) -> f64 {
        self.resolve(key).metrics().char_width(ch, font_size)
    }

    /// Width of a string in points. Fails on characters the standard
    /// encoding cannot represent.
    pub fn measure(&self, text: &str, key: &FontKey, font_size: f64) -> Result<f64> {
        ensure_encodable(text)?;
        Ok(self.resolve(key).metrics().measure_string(text, font_size))
    }

    /// Width of a string in millimetres.
    pub fn measure_mm(&self, text: &str, key: &FontKey, font_size: f64) -> Result<f64> {
        Ok(self.measure(text, key, font_size)? * PT_TO_MM)
    }
}

/// Reject text containing characters outside WinAnsiEncoding.
pub fn ensure_encodable(text: &str) -> Result<()> {
    match text.chars().find(|ch| unicode_to_winansi(*ch).is_none()) {
        Some(ch) => Err(MinutaError::Render(format!(
            "character '{ch}' (U+{:04X}) cannot be drawn with the standard fonts",
            ch as u32
        ))),
        None => Ok(()),
    }
}

/// Encode text as WinAnsi bytes.
pub fn encode_winansi(text: &str) -> Result<Vec<u8>> {
    ensure_encodable(text)?;
    Ok(text.chars().filter_map(unicode_to_winansi).collect())
}

/// Map a Unicode codepoint to a WinAnsiEncoding byte value.
///
/// WinAnsiEncoding is based on Windows-1252. Most codepoints in
/// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
/// contains special mappings for smart quotes, bullets, dashes, etc.
pub fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    match cp {
        0x20AC => Some(0x80), // Euro sign
        0x201A => Some(0x82), // Single low-9 quotation mark
        0x0192 => Some(0x83), // Latin small letter f with hook
        0x201E => Some(0x84), // Double low-9 quotation mark
        0x2026 => Some(0x85), // Horizontal ellipsis
        0x2020 => Some(0x86), // Dagger
        0x2021 => Some(0x87), // Double dagger
        0x02C6 => Some(0x88), // Modifier letter circumflex accent
        0x2030 => Some(0x89), // Per mille sign
        0x0160 => Some(0x8A), // Latin capital letter S with caron
        0x2039 => Some(0x8B), // Single left-pointing angle quotation
        0x0152 => Some(0x8C), // Latin capital ligature OE
        0x017D => Some(0x8E), // Latin capital letter Z with caron
        0x2018 => Some(0x91), // Left single quotation mark
        0x2019 => Some(0x92), // Right single quotation mark
        0x201C => Some(0x93), // Left double quotation mark
        0x201D => Some(0x94), // Right double quotation mark
        0x2022 => Some(0x95), // Bullet
        0x2013 => Some(0x96), // En dash
        0x2014 => Some(0x97), // Em dash
        0x02DC => Some(0x98), // Small tilde
        0x2122 => Some(0x99), // Trade mark sign
        0x0161 => Some(0x9A), // Latin small letter s with caron
        0x203A => Some(0x9B), // Single right-pointing angle quotation
        0x0153 => Some(0x9C), // Latin small ligature oe
        0x017E => Some(0x9E), // Latin small letter z with caron
        0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
        _ => None,
    }
}
