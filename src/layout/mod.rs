//! # Page Layout
//!
//! Lays merged markup onto fixed-size pages. Units are millimetres with the
//! origin at the top-left corner of the page; the PDF writer flips and scales.
//!
//! The [`PageCanvas`] is the one piece of mutable state in a render: it holds
//! the cursor, the page being filled and the finished pages. Each render
//! builds its own.
//!
//! Flow per block:
//!
//! 1. Split the markup into blocks (`</p>`, `<br>`).
//! 2. Empty paragraphs advance the cursor by the empty-paragraph gap.
//! 3. Segment the block. One style: UAX#14 breaking with justification.
//!    Several: greedy run composition, never justified.
//! 4. Ask [`page_break::decide_break`] where the lines go, with widow/orphan
//!    control, then emit them, checking every line against the bottom margin.

pub mod page_break;

use log::{debug, trace};

use crate::config::{MarkupOptions, PageConfig, Typography};
use crate::error::{MinutaError, Result};
use crate::font::{FontContext, FontKey, PT_TO_MM};
use crate::markup::{self, Align, Block};
use crate::text::{is_single_style, ComposedLine, RunStyle, TextLayout};
use page_break::{decide_break, BreakDecision};

/// Baseline position below the line top, as a fraction of the font size.
const BASELINE_RATIO: f64 = 0.8;
/// Distance from baseline to underline, in mm.
const UNDERLINE_OFFSET: f64 = 0.4;
const UNDERLINE_THICKNESS: f64 = 0.25;
const RULE_THICKNESS: f64 = 0.3;
/// Vertical space a standalone rule occupies, in mm.
const RULE_ADVANCE: f64 = 3.0;
/// Slack for accumulated floating-point error when comparing heights.
const TOLERANCE: f64 = 1e-6;

/// A finished page.
#[derive(Debug, Clone)]
pub struct LayoutPage {
    pub width: f64,
    pub height: f64,
    pub elements: Vec<LayoutElement>,
}

/// A positioned element on a page.
#[derive(Debug, Clone)]
pub struct LayoutElement {
    /// Top-left corner.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub draw: DrawCommand,
}

#[derive(Debug, Clone)]
pub enum DrawCommand {
    /// One line of text.
    Text { line: TextLine },
    /// A horizontal rule along the element's vertical centre.
    Rule { thickness: f64 },
}

#[derive(Debug, Clone)]
pub struct TextLine {
    /// Absolute baseline y.
    pub baseline: f64,
    pub runs: Vec<GlyphRun>,
    /// Extra space added to every space character, in mm.
    pub word_spacing: f64,
    pub width: f64,
}

impl TextLine {
    /// The line's text, with a space wherever two runs are visibly apart.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut end: Option<f64> = None;
        for run in &self.runs {
            if end.is_some_and(|e| run.x > e + 1e-6) {
                out.push(' ');
            }
            out.push_str(&run.text);
            end = Some(run.x + run.width);
        }
        out
    }
}

/// A same-font stretch of text at an absolute x.
#[derive(Debug, Clone)]
pub struct GlyphRun {
    pub x: f64,
    /// Natural width, before word spacing.
    pub width: f64,
    pub text: String,
    pub font: FontKey,
    /// In points.
    pub font_size: f64,
}

/// Content that [`PageCanvas::place_together`] keeps on one page.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowItem {
    Markup(String),
    /// A rule centred within the available width.
    Rule { width: f64 },
    Gap(f64),
}

/// A block after line composition, ready to be placed.
enum Prepared {
    Lines {
        lines: Vec<ComposedLine>,
        align: Align,
        justify: bool,
    },
    Gap(f64),
}

/// One piece of a keep-together section.
enum Piece {
    Text(Prepared),
    Rule { width: f64 },
}

impl Piece {
    fn is_gap(&self) -> bool {
        matches!(self, Piece::Text(Prepared::Gap(_)))
    }
}

pub struct PageCanvas<'a> {
    page: &'a PageConfig,
    typography: &'a Typography,
    markup: MarkupOptions,
    fonts: &'a FontContext,
    pages: Vec<LayoutPage>,
    elements: Vec<LayoutElement>,
    y: f64,
}

impl<'a> PageCanvas<'a> {
    pub fn new(
        page: &'a PageConfig,
        typography: &'a Typography,
        markup: MarkupOptions,
        fonts: &'a FontContext,
    ) -> Self {
        Self {
            page,
            typography,
            markup,
            fonts,
            pages: Vec::new(),
            elements: Vec::new(),
            y: page.margin.top,
        }
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// 1-based number of the page being filled.
    pub fn page_number(&self) -> usize {
        self.pages.len() + 1
    }

    pub fn content_x(&self) -> f64 {
        self.page.margin.left
    }

    pub fn content_width(&self) -> f64 {
        self.page.content_width()
    }

    pub fn remaining_height(&self) -> f64 {
        self.page.bottom_limit() - self.y
    }

    pub fn at_page_top(&self) -> bool {
        (self.y - self.page.margin.top).abs() < TOLERANCE
    }

    pub fn new_page(&mut self) {
        let (width, height) = self.page.size.dimensions();
        debug!("page break after page {}", self.page_number());
        self.pages.push(LayoutPage {
            width,
            height,
            elements: std::mem::take(&mut self.elements),
        });
        self.y = self.page.margin.top;
    }

    /// Break the page unless `height` fits below the cursor.
    pub fn ensure_space(&mut self, height: f64) -> Result<()> {
        if height <= self.remaining_height() + TOLERANCE {
            return Ok(());
        }
        let available = self.page.content_height();
        if height > available + TOLERANCE {
            return Err(MinutaError::LayoutOverflow {
                page: self.page_number(),
                needed: height,
                available,
            });
        }
        self.new_page();
        Ok(())
    }

    /// Lay out merged markup starting at `y`, splitting paragraphs across
    /// pages as needed. Returns the final cursor position.
    pub fn layout_html(&mut self, html: &str, x: f64, y: f64, width: f64) -> Result<f64> {
        self.y = y;
        for prepared in self.prepare(html, width)? {
            match prepared {
                Prepared::Gap(h) => self.y += h,
                Prepared::Lines {
                    lines,
                    align,
                    justify,
                } => self.place_paragraph(&lines, align, justify, x, width)?,
            }
        }
        Ok(self.y)
    }

    /// Place items as one unbreakable unit: on this page if they fit,
    /// otherwise at the top of the next.
    pub fn place_together(&mut self, items: &[FlowItem], x: f64, width: f64) -> Result<f64> {
        let mut pieces = Vec::new();
        for item in items {
            match item {
                FlowItem::Markup(html) => {
                    pieces.extend(self.prepare(html, width)?.into_iter().map(Piece::Text))
                }
                FlowItem::Rule { width } => pieces.push(Piece::Rule { width: *width }),
                FlowItem::Gap(h) => pieces.push(Piece::Text(Prepared::Gap(*h))),
            }
        }

        // Trailing gaps do not need to fit; leading gaps are dropped at the
        // top of a page.
        let body_end = pieces.iter().rposition(|p| !p.is_gap()).map_or(0, |i| i + 1);
        let body_start = pieces[..body_end].iter().take_while(|p| p.is_gap()).count();
        let lead: f64 = pieces[..body_start].iter().map(|p| self.piece_height(p)).sum();
        let body: f64 = pieces[body_start..body_end]
            .iter()
            .map(|p| self.piece_height(p))
            .sum();

        let at_top = self.at_page_top();
        let fits =
            decide_break(self.remaining_height(), &[lead + body], false, 0, 0) == BreakDecision::Place;
        if !fits && !at_top {
            self.new_page();
        }
        if body > self.remaining_height() + TOLERANCE {
            return Err(MinutaError::LayoutOverflow {
                page: self.page_number(),
                needed: body,
                available: self.page.content_height(),
            });
        }
        let skip = if fits && !at_top { 0 } else { body_start };

        for piece in pieces.into_iter().skip(skip) {
            match piece {
                Piece::Rule { width: w } => self.draw_rule(x, width, w),
                Piece::Text(Prepared::Gap(h)) => self.y += h,
                Piece::Text(Prepared::Lines {
                    lines,
                    align,
                    justify,
                }) => {
                    let count = lines.len();
                    for (i, line) in lines.iter().enumerate() {
                        self.emit_line(line, align, justify && i + 1 < count, x, width);
                    }
                }
            }
        }
        Ok(self.y)
    }

    /// Finish the last page and hand back every page.
    pub fn finish(mut self) -> Vec<LayoutPage> {
        if !self.elements.is_empty() || self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }

    fn piece_height(&self, piece: &Piece) -> f64 {
        match piece {
            Piece::Text(Prepared::Lines { lines, .. }) => {
                lines.len() as f64 * self.typography.line_height
            }
            Piece::Text(Prepared::Gap(h)) => *h,
            Piece::Rule { .. } => RULE_ADVANCE,
        }
    }

    fn prepare(&self, html: &str, width: f64) -> Result<Vec<Prepared>> {
        let text = TextLayout::new(self.fonts, self.typography.font_size);
        let mut out = Vec::new();

        for block in markup::split_blocks(html) {
            if block.is_empty() {
                if block.is_paragraph {
                    out.push(Prepared::Gap(self.typography.empty_paragraph_gap));
                }
                continue;
            }
            trace!("block ({:?}): {}", block.align, block.plain);
            let (lines, justify) = self.compose_block(&text, &block, width)?;
            out.push(Prepared::Lines {
                lines,
                align: block.align,
                justify,
            });
            out.push(Prepared::Gap(self.typography.paragraph_gap));
        }
        Ok(out)
    }

    fn compose_block(
        &self,
        text: &TextLayout<'_>,
        block: &Block,
        width: f64,
    ) -> Result<(Vec<ComposedLine>, bool)> {
        let segments = markup::segment(&block.html, self.markup.emphasis);

        if is_single_style(&segments) {
            let style = segments.first().map(RunStyle::from).unwrap_or_default();
            let joined: String = segments.iter().map(|s| s.text.as_str()).collect();
            let lines = text.break_into_lines(&joined, style, width)?;
            Ok((lines, block.align == Align::Justify))
        } else {
            Ok((text.compose_runs(&segments, width)?, false))
        }
    }

    fn place_paragraph(
        &mut self,
        lines: &[ComposedLine],
        align: Align,
        justify: bool,
        x: f64,
        width: f64,
    ) -> Result<()> {
        let line_height = self.typography.line_height;
        let orphans = self.typography.min_orphan_lines as usize;
        let widows = self.typography.min_widow_lines as usize;
        let total = lines.len();
        let mut next = 0;

        while next < total {
            let heights = vec![line_height; total - next];
            let take = match decide_break(self.remaining_height(), &heights, true, orphans, widows) {
                BreakDecision::Place => total - next,
                BreakDecision::Split {
                    items_on_current_page,
                } => items_on_current_page,
                BreakDecision::MoveToNextPage if !self.at_page_top() => {
                    self.new_page();
                    continue;
                }
                // Already at the top: emit line by line and let the
                // per-line check break or fail.
                BreakDecision::MoveToNextPage => total - next,
            };

            for i in next..next + take {
                self.ensure_space(line_height)?;
                self.emit_line(&lines[i], align, justify && i + 1 < total, x, width);
            }
            next += take;
            if next < total {
                self.new_page();
            }
        }
        Ok(())
    }

    fn emit_line(&mut self, line: &ComposedLine, align: Align, justify: bool, x: f64, width: f64) {
        let slack = (width - line.width).max(0.0);
        let offset = match align {
            Align::Left | Align::Justify => 0.0,
            Align::Center => slack / 2.0,
            Align::Right => slack,
        };
        let word_spacing = if justify && line.spaces > 0 {
            slack / line.spaces as f64
        } else {
            0.0
        };

        let font_size = self.typography.font_size;
        let line_height = self.typography.line_height;
        let top = self.y;
        let baseline = top + font_size * PT_TO_MM * BASELINE_RATIO;
        let left = x + offset;

        let mut spaces_before = 0usize;
        let mut runs = Vec::with_capacity(line.runs.len());
        let mut underlines = Vec::new();
        for run in &line.runs {
            let run_spaces = run.text.matches(' ').count();
            let run_x = left + run.x + spaces_before as f64 * word_spacing;
            if run.style.underline {
                underlines.push((run_x, run.width + run_spaces as f64 * word_spacing));
            }
            runs.push(GlyphRun {
                x: run_x,
                width: run.width,
                text: run.text.clone(),
                font: self.fonts.key(run.style.bold, run.style.italic),
                font_size,
            });
            spaces_before += run_spaces;
        }

        self.elements.push(LayoutElement {
            x: left,
            y: top,
            width: if word_spacing > 0.0 { width } else { line.width },
            height: line_height,
            draw: DrawCommand::Text {
                line: TextLine {
                    baseline,
                    runs,
                    word_spacing,
                    width: line.width,
                },
            },
        });
        for (ux, uw) in underlines {
            self.elements.push(LayoutElement {
                x: ux,
                y: baseline + UNDERLINE_OFFSET - UNDERLINE_THICKNESS / 2.0,
                width: uw,
                height: UNDERLINE_THICKNESS,
                draw: DrawCommand::Rule {
                    thickness: UNDERLINE_THICKNESS,
                },
            });
        }
        self.y += line_height;
    }

    fn draw_rule(&mut self, x: f64, available: f64, width: f64) {
        let width = width.min(available);
        self.elements.push(LayoutElement {
            x: x + (available - width) / 2.0,
            y: self.y + 1.0,
            width,
            height: RULE_THICKNESS,
            draw: DrawCommand::Rule {
                thickness: RULE_THICKNESS,
            },
        });
        self.y += RULE_ADVANCE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    fn texts(page: &LayoutPage) -> Vec<String> {
        page.elements
            .iter()
            .filter_map(|e| match &e.draw {
                DrawCommand::Text { line } => Some(line.text()),
                _ => None,
            })
            .collect()
    }

    fn with_canvas<T>(config: &RenderConfig, f: impl FnOnce(&mut PageCanvas<'_>) -> T) -> (T, Vec<LayoutPage>) {
        let fonts = FontContext::new(&config.typography.font_family);
        let mut canvas = PageCanvas::new(&config.page, &config.typography, config.markup, &fonts);
        let out = f(&mut canvas);
        (out, canvas.finish())
    }

    #[test]
    fn test_simple_paragraphs() {
        let config = RenderConfig::default();
        let (y, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html("<p>Primeira linha.</p><p>Segunda linha.</p>", x, 30.0, w)
                .unwrap()
        });
        assert_eq!(pages.len(), 1);
        assert_eq!(texts(&pages[0]), vec!["Primeira linha.", "Segunda linha."]);
        // Two lines of 7mm plus two 2mm paragraph gaps.
        assert!((y - (30.0 + 18.0)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_paragraph_advances_gap() {
        let config = RenderConfig::default();
        let (y, _) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html("<p></p>", x, 30.0, w).unwrap()
        });
        assert!((y - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_center_alignment_offsets_line() {
        let config = RenderConfig::default();
        let (_, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html("<p class=\"ql-align-center\">Título</p>", x, 30.0, w).unwrap()
        });
        let e = &pages[0].elements[0];
        let center = e.x + e.width / 2.0;
        assert!((center - (30.0 + 80.0)).abs() < 1e-6);
    }

    #[test]
    fn test_justified_lines_get_word_spacing_except_last() {
        let config = RenderConfig::default();
        let body = "palavra ".repeat(60);
        let (_, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html(&format!("<p>{body}</p>"), x, 30.0, w).unwrap()
        });
        let lines: Vec<&TextLine> = pages[0]
            .elements
            .iter()
            .filter_map(|e| match &e.draw {
                DrawCommand::Text { line } => Some(line),
                _ => None,
            })
            .collect();
        assert!(lines.len() > 2);
        assert!(lines[0].word_spacing > 0.0);
        assert_eq!(lines.last().unwrap().word_spacing, 0.0);
    }

    #[test]
    fn test_mixed_styles_never_justify() {
        let config = RenderConfig::default();
        let body = "texto <b>negrito</b> ".repeat(30);
        let (_, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html(&format!("<p>{body}</p>"), x, 30.0, w).unwrap()
        });
        for e in &pages[0].elements {
            if let DrawCommand::Text { line } = &e.draw {
                assert_eq!(line.word_spacing, 0.0);
                assert!((e.x - 30.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_long_body_breaks_pages_without_crossing_bottom() {
        let config = RenderConfig::default();
        let body = "<p>Linha de texto.</p>".repeat(60);
        let (_, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html(&body, x, 30.0, w).unwrap()
        });
        assert!(pages.len() >= 2);
        for page in &pages {
            for e in &page.elements {
                assert!(e.y + e.height <= 277.0 + 1e-6, "element crosses bottom margin");
                assert!(e.y >= 30.0 - 1e-6);
            }
        }
        let count: usize = pages.iter().map(|p| texts(p).len()).sum();
        assert_eq!(count, 60);
    }

    fn numbered_paragraph(words: usize) -> (String, String) {
        let text = (1..=words).map(|i| format!("termo{i:03}")).collect::<Vec<_>>().join(" ");
        (format!("<p>{text}</p>"), text)
    }

    fn line_count_at_top(config: &RenderConfig, html: &str) -> usize {
        let (_, pages) = with_canvas(config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html(html, x, 30.0, w).unwrap()
        });
        texts(&pages[0]).len()
    }

    #[test]
    fn test_paragraph_splits_across_pages_in_order() {
        let config = RenderConfig::default();
        let (html, text) = numbered_paragraph(80);
        let total = line_count_at_top(&config, &html);
        assert!(total >= 6, "got {total} lines");

        // Room for exactly four lines above the bottom margin.
        let (_, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html(&html, x, 277.0 - 4.0 * 7.0, w).unwrap()
        });
        assert_eq!(pages.len(), 2);
        assert_eq!(texts(&pages[0]).len(), 4);
        assert_eq!(texts(&pages[1]).len(), total - 4);
        assert!((pages[1].elements[0].y - 30.0).abs() < 1e-9);

        let joined: Vec<String> = pages.iter().flat_map(texts).collect();
        assert_eq!(joined.join(" "), text);
    }

    #[test]
    fn test_split_paragraph_leaves_no_widow() {
        let config = RenderConfig::default();
        let (html, text) = numbered_paragraph(80);
        let total = line_count_at_top(&config, &html);

        // Every line but one would fit; two carry over instead.
        let (_, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html(&html, x, 277.0 - (total - 1) as f64 * 7.0, w).unwrap()
        });
        assert_eq!(texts(&pages[0]).len(), total - 2);
        assert_eq!(texts(&pages[1]).len(), 2);
        let joined: Vec<String> = pages.iter().flat_map(texts).collect();
        assert_eq!(joined.join(" "), text);
    }

    #[test]
    fn test_keep_together_taller_than_page_is_overflow() {
        let config = RenderConfig::default();
        let section = vec![FlowItem::Markup("<p>linha</p>".repeat(40))];
        let (result, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html("<p>corpo</p>", x, 30.0, w).unwrap();
            c.place_together(&section, x, w)
        });
        match result {
            Err(MinutaError::LayoutOverflow {
                page,
                needed,
                available,
            }) => {
                assert_eq!(page, 2);
                assert!(needed > available);
                assert!((available - 247.0).abs() < 1e-9);
            }
            other => panic!("expected overflow, got {other:?}"),
        }
        assert_eq!(texts(&pages[0]), vec!["corpo"]);
    }

    #[test]
    fn test_underline_draws_rule() {
        let config = RenderConfig::default();
        let (_, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html("<p><u>Assunto</u></p>", x, 30.0, w).unwrap()
        });
        assert!(pages[0]
            .elements
            .iter()
            .any(|e| matches!(e.draw, DrawCommand::Rule { .. })));
    }

    #[test]
    fn test_keep_together_moves_to_next_page() {
        let config = RenderConfig::default();
        let (_, pages) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html("<p>corpo</p>", x, 260.0, w).unwrap();
            c.place_together(
                &[
                    FlowItem::Gap(8.0),
                    FlowItem::Markup("<p>Maputo, aos 1 de janeiro de 2026.</p>".into()),
                    FlowItem::Gap(10.0),
                    FlowItem::Markup("<p><b>ANA</b></p>".into()),
                    FlowItem::Rule { width: 70.0 },
                ],
                x,
                w,
            )
            .unwrap()
        });
        assert_eq!(pages.len(), 2);
        let first = pages[1].elements.first().unwrap();
        assert!((first.y - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_unit_is_overflow() {
        let mut config = RenderConfig::default();
        config.typography.line_height = 300.0;
        let (result, _) = with_canvas(&config, |c| {
            let (x, w) = (c.content_x(), c.content_width());
            c.layout_html("<p>x</p>", x, 30.0, w)
        });
        assert!(matches!(result, Err(MinutaError::LayoutOverflow { .. })));
    }
}
