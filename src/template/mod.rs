//! # Placeholder Grammar
//!
//! Templates are HTML strings interleaved with three kinds of token:
//!
//! ```text
//! {{ key }}      scalar placeholder
//! {{#key}}       opens a repeating block, rendered once per row of data[key]
//! {{/key}}       closes it
//! ```
//!
//! Whitespace inside the braces is ignored. Repeating blocks do not nest.
//! A `{{` that never reaches a `}}` is plain text.
//!
//! The source is parsed once into a flat node list; loop nodes own their body
//! nodes. Nodes remember their byte span so the live preview can slice the
//! raw markup back out.

pub mod merge;

use std::collections::BTreeSet;
use std::ops::Range;

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MinutaError, Result};

pub use merge::{decode_entities, merge, merge_with, render_markup, render_parsed, strip_unresolved};

/// Any placeholder-grammar token. Group 1 is the sigil (`#`, `/` or empty),
/// group 2 the key.
pub(crate) static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([#/]?)\s*([^{}]*?)\s*\}\}").expect("valid token regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Byte range of the whole node in the template source.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Text(String),
    Placeholder(String),
    Loop {
        key: String,
        body: Vec<Node>,
        /// Byte range of the body, between the two markers.
        body_span: Range<usize>,
    },
}

/// A top-level slice of the template: either plain markup (which may still
/// contain scalar placeholders) or one repeating block.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Static(String),
    Loop { key: String, body: String },
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

struct OpenLoop {
    key: String,
    start: usize,
    body_start: usize,
    body: Vec<Node>,
}

impl Template {
    /// Parse `source`. With `strict`, malformed loop markup is an error;
    /// otherwise offending markers are dropped and logged.
    pub fn parse(source: &str, strict: bool) -> Result<Self> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut open: Option<OpenLoop> = None;
        let mut last = 0;

        let malformed = |offset: usize, message: String| -> Result<()> {
            if strict {
                Err(MinutaError::structure(offset, message))
            } else {
                warn!("dropping malformed loop marker at byte {offset}: {message}");
                Ok(())
            }
        };

        for caps in TOKEN.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            let sigil = caps.get(1).map_or("", |m| m.as_str());
            let key = caps.get(2).map_or("", |m| m.as_str()).to_string();

            if whole.start() > last {
                let text = Node {
                    kind: NodeKind::Text(source[last..whole.start()].to_string()),
                    span: last..whole.start(),
                };
                push_node(&mut nodes, &mut open, text);
            }
            last = whole.end();

            match sigil {
                "#" => {
                    if key.is_empty() {
                        malformed(whole.start(), "loop marker without a key".into())?;
                    } else if let Some(outer) = &open {
                        malformed(
                            whole.start(),
                            format!(
                                "loop '{key}' opened inside loop '{}'; nested loops are not supported",
                                outer.key
                            ),
                        )?;
                    } else {
                        open = Some(OpenLoop {
                            key,
                            start: whole.start(),
                            body_start: whole.end(),
                            body: Vec::new(),
                        });
                    }
                }
                "/" => match open.take() {
                    Some(l) if l.key == key => nodes.push(Node {
                        kind: NodeKind::Loop {
                            key: l.key,
                            body: l.body,
                            body_span: l.body_start..whole.start(),
                        },
                        span: l.start..whole.end(),
                    }),
                    Some(l) => {
                        let message = format!("loop '{}' closed by '{{{{/{key}}}}}'", l.key);
                        open = Some(l);
                        malformed(whole.start(), message)?;
                    }
                    None => {
                        malformed(
                            whole.start(),
                            format!("'{{{{/{key}}}}}' closes a loop that was never opened"),
                        )?;
                    }
                },
                _ => push_node(
                    &mut nodes,
                    &mut open,
                    Node {
                        kind: NodeKind::Placeholder(key),
                        span: whole.range(),
                    },
                ),
            }
        }

        if last < source.len() {
            let tail = Node {
                kind: NodeKind::Text(source[last..].to_string()),
                span: last..source.len(),
            };
            push_node(&mut nodes, &mut open, tail);
        }

        if let Some(l) = open {
            malformed(l.start, format!("loop '{}' is never closed", l.key))?;
            nodes.extend(l.body);
        }

        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Every scalar key referenced anywhere, loop bodies included.
    pub fn placeholder_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        collect_keys(&self.nodes, &mut keys);
        keys
    }

    pub fn loop_keys(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Loop { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn references(&self, key: &str) -> bool {
        self.placeholder_keys().contains(key)
    }

    /// True when the template contains at least one placeholder or loop.
    pub fn has_placeholders(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| !matches!(n.kind, NodeKind::Text(_)))
    }

    /// Split into top-level static runs and loop blocks, preserving raw markup.
    pub fn sections(&self) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut static_start: Option<usize> = None;
        let mut static_end = 0;

        for node in &self.nodes {
            match &node.kind {
                NodeKind::Loop { key, body_span, .. } => {
                    if let Some(start) = static_start.take() {
                        sections.push(Section::Static(self.source[start..static_end].to_string()));
                    }
                    sections.push(Section::Loop {
                        key: key.clone(),
                        body: self.source[body_span.clone()].to_string(),
                    });
                }
                _ => {
                    static_start.get_or_insert(node.span.start);
                    static_end = node.span.end;
                }
            }
        }
        if let Some(start) = static_start {
            sections.push(Section::Static(self.source[start..static_end].to_string()));
        }
        sections
    }
}

fn push_node(nodes: &mut Vec<Node>, open: &mut Option<OpenLoop>, node: Node) {
    match open {
        Some(l) => l.body.push(node),
        None => nodes.push(node),
    }
}

fn collect_keys(nodes: &[Node], keys: &mut BTreeSet<String>) {
    for node in nodes {
        match &node.kind {
            NodeKind::Placeholder(key) if !key.is_empty() => {
                keys.insert(key.clone());
            }
            NodeKind::Loop { body, .. } => collect_keys(body, keys),
            _ => {}
        }
    }
}

/// Parse `source` and split it into [`Section`]s.
pub fn split_sections(source: &str, strict: bool) -> Result<Vec<Section>> {
    Ok(Template::parse(source, strict)?.sections())
}
