//! Lenient HTML fragment reader for the preview.
//!
//! Template markup comes from a rich-text editor and is cut into sections at
//! loop markers, so a fragment may open a `<p>` it never closes or close one
//! it never opened. The reader keeps going: unmatched closing tags are
//! ignored and whatever is still open at the end is closed implicitly.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::error::{MinutaError, Result};
use crate::markup::unescape_html;

/// Elements that never have content, whether or not they are written `<br/>`.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<DomNode>,
    },
    Text { text: String },
}

impl DomNode {
    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        match self {
            DomNode::Text { text } => text.clone(),
            DomNode::Element { children, .. } => children.iter().map(DomNode::text_content).collect(),
        }
    }
}

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<DomNode>,
}

/// Parse an HTML fragment into a list of top-level nodes.
pub fn parse_fragment(html: &str) -> Result<Vec<DomNode>> {
    let mut reader = Reader::from_str(html);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.trim_text(false);
    }

    let mut roots: Vec<DomNode> = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let (tag, attrs) = read_start(&e);
                if is_void(&tag) {
                    append(&mut stack, &mut roots, element(tag, attrs, Vec::new()));
                } else {
                    stack.push(OpenElement {
                        tag,
                        attrs,
                        children: Vec::new(),
                    });
                }
            }
            Ok(Event::Empty(e)) => {
                let (tag, attrs) = read_start(&e);
                append(&mut stack, &mut roots, element(tag, attrs, Vec::new()));
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if let Some(depth) = stack.iter().rposition(|open| open.tag == tag) {
                    while stack.len() > depth {
                        close_top(&mut stack, &mut roots);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e);
                append_text(&mut stack, &mut roots, unescape_html(&raw));
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(&e).into_owned();
                append_text(&mut stack, &mut roots, raw);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(MinutaError::Markup(format!(
                    "cannot read template markup near byte {position}: {e}"
                )))
            }
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }
    Ok(roots)
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn element(tag: String, attrs: Vec<(String, String)>, children: Vec<DomNode>) -> DomNode {
    DomNode::Element {
        tag,
        attrs,
        children,
    }
}

fn read_start(e: &BytesStart<'_>) -> (String, Vec<(String, String)>) {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let attrs = e
        .html_attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            let value = unescape_html(&String::from_utf8_lossy(&attr.value));
            (key, value)
        })
        .collect();
    (tag, attrs)
}

fn append(stack: &mut [OpenElement], roots: &mut Vec<DomNode>, node: DomNode) {
    match stack.last_mut() {
        Some(open) => open.children.push(node),
        None => roots.push(node),
    }
}

fn append_text(stack: &mut [OpenElement], roots: &mut Vec<DomNode>, text: String) {
    if text.is_empty() {
        return;
    }
    let siblings = match stack.last_mut() {
        Some(open) => &mut open.children,
        None => roots,
    };
    if let Some(DomNode::Text { text: prev }) = siblings.last_mut() {
        prev.push_str(&text);
    } else {
        siblings.push(DomNode::Text { text });
    }
}

fn close_top(stack: &mut Vec<OpenElement>, roots: &mut Vec<DomNode>) {
    if let Some(open) = stack.pop() {
        let node = element(open.tag, open.attrs, open.children);
        append(stack, roots, node);
    }
}
