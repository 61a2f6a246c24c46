//! # Text Layout
//!
//! Line breaking and run composition. All widths are in millimetres.
//!
//! Two paths, chosen per block by the layout engine:
//!
//! - **Single style**: UAX#14 break opportunities, greedy filling. Lines
//!   record their inter-word space count so the caller can justify them.
//! - **Mixed styles**: greedy word-by-word composition over styled
//!   fragments. A word is a maximal run of non-whitespace and may span
//!   several fragments, so `<b>Ana</b>,` stays glued to its comma.
//!
//! Both produce [`ComposedLine`]s. Words wider than the line are broken by
//! characters.

use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::error::Result;
use crate::font::{ensure_encodable, FontContext, PT_TO_MM};
use crate::markup::TextSegment;

/// The inline style of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl From<&TextSegment> for RunStyle {
    fn from(seg: &TextSegment) -> Self {
        Self {
            bold: seg.bold,
            italic: seg.italic,
            underline: seg.underline,
        }
    }
}

/// A same-style stretch of a line, positioned relative to the line start.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRun {
    pub x: f64,
    pub text: String,
    pub style: RunStyle,
    pub width: f64,
}

/// One output line.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedLine {
    pub runs: Vec<LineRun>,
    /// Natural width, trailing whitespace excluded.
    pub width: f64,
    /// Number of inter-word spaces, for justification.
    pub spaces: usize,
}

impl ComposedLine {
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut end = 0.0;
        for run in &self.runs {
            if !out.is_empty() && run.x > end + 1e-9 {
                out.push(' ');
            }
            out.push_str(&run.text);
            end = run.x + run.width;
        }
        out
    }
}

/// True when every segment shares one style.
pub fn is_single_style(segments: &[TextSegment]) -> bool {
    segments.windows(2).all(|w| w[0].same_style(&w[1]))
}

/// Compute UAX#14 break opportunities indexed by char position.
///
/// Entry `i` is the opportunity to break *before* `chars[i]`.
fn compute_break_opportunities(text: &str) -> Vec<Option<BreakOpportunity>> {
    let char_count = text.chars().count();
    let mut result = vec![None; char_count];

    let byte_to_char: Vec<usize> = {
        let mut map = vec![0usize; text.len() + 1];
        for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
            map[byte_idx] = char_idx;
        }
        map[text.len()] = char_count;
        map
    };

    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx < char_count {
            result[char_idx] = Some(opp);
        }
    }

    result
}

struct Piece {
    text: String,
    style: RunStyle,
    width: f64,
}

#[derive(Default)]
struct Word {
    pieces: Vec<Piece>,
    width: f64,
}

impl Word {
    fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    fn last_style(&self) -> RunStyle {
        self.pieces.last().map(|p| p.style).unwrap_or_default()
    }
}

pub struct TextLayout<'a> {
    fonts: &'a FontContext,
    font_size: f64,
}

impl<'a> TextLayout<'a> {
    pub fn new(fonts: &'a FontContext, font_size: f64) -> Self {
        Self { fonts, font_size }
    }

    fn char_width(&self, ch: char, style: RunStyle) -> f64 {
        let key = self.fonts.key(style.bold, style.italic);
        self.fonts.char_width(ch, &key, self.font_size) * PT_TO_MM
    }

    /// Width of `text` in one style, in mm.
    pub fn measure(&self, text: &str, style: RunStyle) -> Result<f64> {
        let key = self.fonts.key(style.bold, style.italic);
        self.fonts.measure_mm(text, &key, self.font_size)
    }

    /// Break single-style text into lines no wider than `max_width`.
    pub fn break_into_lines(
        &self,
        text: &str,
        style: RunStyle,
        max_width: f64,
    ) -> Result<Vec<ComposedLine>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        ensure_encodable(text)?;

        let chars: Vec<char> = text.chars().collect();
        let widths: Vec<f64> = chars.iter().map(|&ch| self.char_width(ch, style)).collect();
        let break_opps = compute_break_opportunities(text);

        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut line_width = 0.0;
        // Char index the next line would start at.
        let mut last_break: Option<usize> = None;

        for (i, &ch) in chars.iter().enumerate() {
            if i > 0 {
                match break_opps[i] {
                    Some(BreakOpportunity::Mandatory) => {
                        lines.push(self.make_line(&chars[line_start..i], &widths[line_start..i], style));
                        line_start = i;
                        line_width = 0.0;
                        last_break = None;
                    }
                    Some(BreakOpportunity::Allowed) => last_break = Some(i),
                    None => {}
                }
            }

            let char_width = widths[i];
            let overflows = |width: f64| width + char_width > max_width && !ch.is_whitespace();

            if overflows(line_width) && line_start < i {
                if let Some(bp) = last_break.filter(|bp| *bp > line_start) {
                    lines.push(self.make_line(&chars[line_start..bp], &widths[line_start..bp], style));
                    line_start = bp;
                    line_width = widths[bp..i].iter().sum();
                    last_break = None;
                }
            }
            if overflows(line_width) && line_start < i {
                lines.push(self.make_line(&chars[line_start..i], &widths[line_start..i], style));
                line_start = i;
                line_width = 0.0;
                last_break = None;
            }

            line_width += char_width;
        }

        if line_start < chars.len() {
            lines.push(self.make_line(&chars[line_start..], &widths[line_start..], style));
        }
        Ok(lines)
    }

    fn make_line(&self, chars: &[char], widths: &[f64], style: RunStyle) -> ComposedLine {
        let mut end = chars.len();
        while end > 0 && chars[end - 1].is_whitespace() {
            end -= 1;
        }
        let text: String = chars[..end].iter().collect();
        let width = widths[..end].iter().sum();
        let spaces = chars[..end].iter().filter(|c| **c == ' ').count();
        ComposedLine {
            runs: vec![LineRun {
                x: 0.0,
                text,
                style,
                width,
            }],
            width,
            spaces,
        }
    }

    /// Compose mixed-style segments into lines no wider than `max_width`.
    pub fn compose_runs(&self, segments: &[TextSegment], max_width: f64) -> Result<Vec<ComposedLine>> {
        let words = self.split_words(segments)?;

        let mut lines = Vec::new();
        let mut line: Vec<Word> = Vec::new();
        let mut line_width = 0.0;

        for word in words {
            let space = match line.last() {
                Some(prev) => self.char_width(' ', prev.last_style()),
                None => 0.0,
            };
            if !line.is_empty() && line_width + space + word.width > max_width {
                lines.push(self.build_line(std::mem::take(&mut line)));
                line_width = 0.0;
            }

            let mut chunks = if word.width > max_width {
                self.force_break(word, max_width)
            } else {
                vec![word]
            };
            let Some(last) = chunks.pop() else { continue };
            for chunk in chunks {
                lines.push(self.build_line(vec![chunk]));
            }

            let space = match line.last() {
                Some(prev) => self.char_width(' ', prev.last_style()),
                None => 0.0,
            };
            line_width += space + last.width;
            line.push(last);
        }
        if !line.is_empty() {
            lines.push(self.build_line(line));
        }
        Ok(lines)
    }

    fn split_words(&self, segments: &[TextSegment]) -> Result<Vec<Word>> {
        let mut words = Vec::new();
        let mut current = Word::default();

        for seg in segments {
            ensure_encodable(&seg.text)?;
            let style = RunStyle::from(seg);
            let mut buf = String::new();
            for ch in seg.text.chars() {
                if ch.is_whitespace() && ch != '\u{00A0}' {
                    self.push_piece(&mut current, &mut buf, style)?;
                    if !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                } else {
                    buf.push(ch);
                }
            }
            self.push_piece(&mut current, &mut buf, style)?;
        }
        if !current.is_empty() {
            words.push(current);
        }
        Ok(words)
    }

    fn push_piece(&self, word: &mut Word, buf: &mut String, style: RunStyle) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(buf);
        let width = self.measure(&text, style)?;
        word.width += width;
        word.pieces.push(Piece { text, style, width });
        Ok(())
    }

    /// Split an over-long word into chunks that each fit `max_width`.
    fn force_break(&self, word: Word, max_width: f64) -> Vec<Word> {
        let mut chunks = Vec::new();
        let mut current = Word::default();
        for piece in word.pieces {
            let mut buf = String::new();
            let mut buf_width = 0.0;
            for ch in piece.text.chars() {
                let w = self.char_width(ch, piece.style);
                if current.width + buf_width + w > max_width && (!buf.is_empty() || !current.is_empty()) {
                    if !buf.is_empty() {
                        current.pieces.push(Piece {
                            text: std::mem::take(&mut buf),
                            style: piece.style,
                            width: buf_width,
                        });
                        current.width += buf_width;
                        buf_width = 0.0;
                    }
                    chunks.push(std::mem::take(&mut current));
                }
                buf.push(ch);
                buf_width += w;
            }
            if !buf.is_empty() {
                current.pieces.push(Piece {
                    text: buf,
                    style: piece.style,
                    width: buf_width,
                });
                current.width += buf_width;
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    fn build_line(&self, words: Vec<Word>) -> ComposedLine {
        let mut runs: Vec<LineRun> = Vec::new();
        let mut x = 0.0;
        let spaces = words.len().saturating_sub(1);

        for (wi, word) in words.into_iter().enumerate() {
            let mut pending_space = false;
            if wi > 0 {
                if let Some(prev) = runs.last() {
                    x += self.char_width(' ', prev.style);
                }
                pending_space = true;
            }
            for piece in word.pieces {
                match runs.last_mut() {
                    Some(last) if last.style == piece.style => {
                        if pending_space {
                            last.text.push(' ');
                        }
                        last.text.push_str(&piece.text);
                        last.width = x + piece.width - last.x;
                    }
                    _ => runs.push(LineRun {
                        x,
                        text: piece.text,
                        style: piece.style,
                        width: piece.width,
                    }),
                }
                pending_space = false;
                x += piece.width;
            }
        }

        ComposedLine {
            runs,
            width: x,
            spaces,
        }
    }
}
