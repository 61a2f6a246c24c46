//! # Markup
//!
//! The merged template is a small HTML subset produced by a rich-text editor:
//! `<p>` paragraphs with `ql-align-*` classes, `<br>` breaks, and the inline
//! emphasis tags `<strong>`/`<b>`, `<em>`/`<i>` and `<u>`. This module splits
//! it into blocks and each block into style-tagged text segments. It is a
//! tag-vocabulary state machine, not an HTML parser; the preview uses a real
//! DOM reader instead.
//!
//! Input is markup: literal `<`, `>` and `&` in text arrive as entities and
//! are decoded only once a segment's text is final.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::EmphasisMode;
use crate::template::decode_entities;

/// A tag starts with a name (or `!` for comments) right after `<` or `</`,
/// so a stray `5 < 6` in hand-written markup stays text.
static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z!][^<>]*>").expect("valid tag regex"));

static TAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<\s*(/?)\s*([A-Za-z][A-Za-z0-9]*)").expect("valid tag-name regex"));

static BLOCK_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</p\s*>|<br\s*/?\s*>").expect("valid block-break regex"));

static PARAGRAPH_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p(\s[^>]*)?>").expect("valid paragraph regex"));

static ALIGN_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ql-align-(left|center|right|justify)").expect("valid align regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// A run of text sharing one inline style.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextSegment {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl TextSegment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn same_style(&self, other: &TextSegment) -> bool {
        self.bold == other.bold && self.italic == other.italic && self.underline == other.underline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    Left,
    Center,
    Right,
    #[default]
    Justify,
}

impl Align {
    fn from_class(name: &str) -> Self {
        match name {
            "left" => Align::Left,
            "center" => Align::Center,
            "right" => Align::Right,
            _ => Align::Justify,
        }
    }
}

/// A paragraph-level unit of merged markup.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Inner markup, still carrying inline tags.
    pub html: String,
    pub align: Align,
    /// The block opened a `<p>` tag (as opposed to following a `<br>`).
    pub is_paragraph: bool,
    /// Tag-stripped text with collapsed whitespace.
    pub plain: String,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty()
    }
}

/// Split markup into blocks on `</p>` and `<br>` boundaries.
///
/// Whitespace-only fragments that carry no `<p>` are dropped; they are just
/// the newlines between paragraphs. A line following a `<br>` keeps the
/// alignment of the paragraph it belongs to, and any emphasis still open at
/// the break is reopened at the start of its markup.
pub fn split_blocks(html: &str) -> Vec<Block> {
    let mut pieces: Vec<(&str, bool)> = Vec::new();
    let mut last = 0;
    for brk in BLOCK_BREAK.find_iter(html) {
        let is_break = brk.as_str()[1..].to_ascii_lowercase().starts_with("br");
        pieces.push((&html[last..brk.start()], is_break));
        last = brk.end();
    }
    pieces.push((&html[last..], false));

    let mut blocks = Vec::new();
    let mut open_align: Option<Align> = None;
    let mut open_style: Option<StyleState> = None;
    for (piece, ends_in_break) in pieces {
        let is_paragraph = PARAGRAPH_OPEN.is_match(piece);

        let mut style = match open_style.take() {
            Some(style) if !is_paragraph => style,
            _ => StyleState::new(EmphasisMode::Nested),
        };
        let reopened = style.opening_tags();
        for tag in TAG.find_iter(piece) {
            style.apply(tag.as_str());
        }
        if ends_in_break {
            open_style = Some(style);
        }

        let explicit = ALIGN_CLASS
            .captures(piece)
            .map(|c| Align::from_class(&c[1]));
        let align = match (explicit, is_paragraph) {
            (Some(a), _) => a,
            (None, true) => Align::default(),
            (None, false) => open_align.unwrap_or_default(),
        };
        open_align = ends_in_break.then_some(align);

        let plain = collapse(&decode_entities(&strip_tags(piece)));
        if plain.is_empty() && !is_paragraph {
            continue;
        }
        blocks.push(Block {
            html: format!("{reopened}{piece}"),
            align,
            is_paragraph,
            plain,
        });
    }
    blocks
}

/// Split a block into style-tagged segments.
///
/// Unknown tags are ignored. Entities are decoded, whitespace runs collapse
/// to one space, and adjacent segments with the same style are coalesced.
pub fn segment(html: &str, mode: EmphasisMode) -> Vec<TextSegment> {
    let mut state = StyleState::new(mode);
    let mut segments: Vec<TextSegment> = Vec::new();
    let mut last = 0;

    for tag in TAG.find_iter(html) {
        push_segment(&html[last..tag.start()], &state, &mut segments);
        state.apply(tag.as_str());
        last = tag.end();
    }
    push_segment(&html[last..], &state, &mut segments);
    segments
}

fn push_segment(text: &str, state: &StyleState, segments: &mut Vec<TextSegment>) {
    let decoded = decode_entities(text);
    let text = WHITESPACE.replace_all(&decoded, " ");
    if text.is_empty() {
        return;
    }
    let seg = TextSegment {
        text: text.into_owned(),
        bold: state.bold(),
        italic: state.italic(),
        underline: state.underline(),
    };
    match segments.last_mut() {
        Some(prev) if prev.same_style(&seg) => prev.text.push_str(&seg.text),
        _ => segments.push(seg),
    }
}

/// Split with the default nested-emphasis semantics.
pub fn segment_default(html: &str) -> Vec<TextSegment> {
    segment(html, EmphasisMode::Nested)
}

struct StyleState {
    mode: EmphasisMode,
    bold: u32,
    italic: u32,
    underline: u32,
}

impl StyleState {
    fn new(mode: EmphasisMode) -> Self {
        Self {
            mode,
            bold: 0,
            italic: 0,
            underline: 0,
        }
    }

    fn bold(&self) -> bool {
        self.bold > 0
    }

    fn italic(&self) -> bool {
        self.italic > 0
    }

    fn underline(&self) -> bool {
        self.underline > 0
    }

    /// Tags that reopen the emphasis currently in effect.
    fn opening_tags(&self) -> String {
        let mut out = String::new();
        if self.bold() {
            out.push_str("<strong>");
        }
        if self.italic() {
            out.push_str("<em>");
        }
        if self.underline() {
            out.push_str("<u>");
        }
        out
    }

    fn apply(&mut self, tag: &str) {
        let Some(caps) = TAG_NAME.captures(tag) else {
            return;
        };
        let closing = !caps[1].is_empty();
        let counter = match caps[2].to_ascii_lowercase().as_str() {
            "strong" | "b" => &mut self.bold,
            "em" | "i" => &mut self.italic,
            "u" => &mut self.underline,
            _ => return,
        };
        *counter = match (self.mode, closing) {
            (EmphasisMode::Nested, false) => *counter + 1,
            (EmphasisMode::Nested, true) => counter.saturating_sub(1),
            (EmphasisMode::Toggle, false) => 1,
            (EmphasisMode::Toggle, true) => 0,
        };
    }
}

/// Remove every tag.
pub fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, "").into_owned()
}

/// Plain text of merged markup, one line per block, entities decoded.
pub fn plain_text(html: &str) -> String {
    split_blocks(html)
        .into_iter()
        .filter(|b| !b.is_empty())
        .map(|b| b.plain)
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Escape a user value for inclusion in synthesized markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_html`] for text about to be laid out.
pub fn unescape_html(text: &str) -> String {
    crate::template::decode_entities(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, bold: bool, italic: bool) -> TextSegment {
        TextSegment {
            text: text.into(),
            bold,
            italic,
            underline: false,
        }
    }

    #[test]
    fn strong_then_plain() {
        assert_eq!(
            segment_default("<strong>A</strong>B"),
            vec![seg("A", true, false), seg("B", false, false)]
        );
    }

    #[test]
    fn b_and_i_aliases() {
        assert_eq!(
            segment_default("<b>x</b><i>y</i><em><B>z</B></em>"),
            vec![seg("x", true, false), seg("y", false, true), seg("z", true, true)]
        );
    }

    #[test]
    fn nested_counts_depth() {
        let out = segment("<b><strong>x</strong>y</b>z", EmphasisMode::Nested);
        assert_eq!(out, vec![seg("xy", true, false), seg("z", false, false)]);
    }

    #[test]
    fn toggle_flips_on_any_close() {
        let out = segment("<b><strong>x</strong>y</b>z", EmphasisMode::Toggle);
        assert_eq!(out, vec![seg("x", true, false), seg("yz", false, false)]);
    }

    #[test]
    fn underline_tracked() {
        let out = segment_default("<u>Assunto</u>");
        assert!(out[0].underline);
    }

    #[test]
    fn whitespace_collapses_and_unknown_tags_ignored() {
        let out = segment_default("<span class=\"x\">a \n\t b</span>");
        assert_eq!(out, vec![seg("a b", false, false)]);
    }

    #[test]
    fn blocks_split_on_paragraph_and_break() {
        let blocks = split_blocks(
            "<p class=\"ql-align-center\">Título</p><p>Linha 1<br>Linha 2<BR/></p><p></p>",
        );
        let plains: Vec<_> = blocks.iter().map(|b| b.plain.as_str()).collect();
        assert_eq!(plains, vec!["Título", "Linha 1", "Linha 2", ""]);
        assert_eq!(blocks[0].align, Align::Center);
        assert_eq!(blocks[1].align, Align::Justify);
        assert!(blocks[3].is_paragraph);
        assert!(blocks[3].is_empty());
    }

    #[test]
    fn break_lines_keep_paragraph_alignment() {
        let b = split_blocks("<p class=\"ql-align-center\">Maputo<br>2026</p><p>x</p>");
        assert_eq!(b[1].plain, "2026");
        assert_eq!(b[1].align, Align::Center);
        assert_eq!(b[2].align, Align::Justify);
    }

    #[test]
    fn break_lines_keep_open_emphasis() {
        let b = split_blocks("<p><strong>EXMO. SENHOR<br>DIRECTOR</strong></p><p>fim</p>");
        assert_eq!(b[1].plain, "DIRECTOR");
        assert_eq!(segment_default(&b[1].html), vec![seg("DIRECTOR", true, false)]);
        assert_eq!(segment_default(&b[2].html), vec![seg("fim", false, false)]);
    }

    #[test]
    fn emphasis_closed_before_break_is_not_reopened() {
        let b = split_blocks("<p><em>a</em><br>b<br><u>c<br>d</u></p>");
        let styles: Vec<_> = b.iter().map(|b| segment_default(&b.html)).collect();
        assert_eq!(styles[1], vec![seg("b", false, false)]);
        assert!(styles[3][0].underline);
    }

    #[test]
    fn escaped_text_is_not_markup() {
        assert_eq!(
            segment_default("Se 5 &lt; 6 e 7 &gt; 3, <b>&lt;b&gt;</b> fica."),
            vec![
                seg("Se 5 < 6 e 7 > 3, ", false, false),
                seg("<b>", true, false),
                seg(" fica.", false, false),
            ]
        );
        assert_eq!(plain_text("<p>Rua &lt;Bairro A&gt; 5</p>"), "Rua <Bairro A> 5");
    }

    #[test]
    fn stray_angle_brackets_stay_text() {
        assert_eq!(segment_default("5 < 6 e 7 > 3"), vec![seg("5 < 6 e 7 > 3", false, false)]);
        assert_eq!(strip_tags("a <!-- nota --> b"), "a  b");
    }

    #[test]
    fn alignment_classes() {
        let b = split_blocks("<p class=\"ql-align-right\">x</p><p class=\"ql-align-left\">y</p>");
        assert_eq!(b[0].align, Align::Right);
        assert_eq!(b[1].align, Align::Left);
    }

    #[test]
    fn plain_text_joins_blocks() {
        assert_eq!(plain_text("<p>a <b>b</b></p><p></p><p>c</p>"), "a b\nc");
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_html("A & <B> \"c\""), "A &amp; &lt;B&gt; &quot;c&quot;");
        assert_eq!(unescape_html(&escape_html("x<y & 'z'")), "x<y & 'z'");
    }
}
