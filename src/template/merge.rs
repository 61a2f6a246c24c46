//! Data merging: expand loops, substitute placeholders, then clean up.
//!
//! Substitution is a single pass over the parsed template, so a value that
//! itself looks like `{{key}}` is never re-expanded. Whatever token survives
//! (or is introduced by the data) is stripped afterwards.
//!
//! Two outputs exist. [`render_parsed`] yields text: entities in the
//! template are decoded and values are copied verbatim. [`render_markup`]
//! yields markup for the layout engine: values are escaped and entities are
//! kept, so a value such as `<b>` or a template `&lt;` is never read as a tag.

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::{Node, NodeKind, Template};
use crate::config::{LoopScope, TemplateOptions};
use crate::error::Result;
use crate::markup::escape_html;
use crate::model::{scalar_to_string, UserData};

static UNRESOLVED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("valid unresolved-token regex"));

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(nbsp|amp|lt|gt|quot|#39);").expect("valid entity regex"));

/// Merge `data` into `template` with the default options.
pub fn merge(template: &str, data: &UserData) -> Result<String> {
    merge_with(template, data, &TemplateOptions::default())
}

/// Merge `data` into `template`.
///
/// Loop blocks render once per element of `data[key]` when that is an array
/// and vanish otherwise. Missing scalars become empty strings. Only malformed
/// loop markup in strict mode can fail.
pub fn merge_with(template: &str, data: &UserData, options: &TemplateOptions) -> Result<String> {
    let parsed = Template::parse(template, options.strict_structure)?;
    Ok(render_parsed(&parsed, data, options.loop_scope))
}

/// Merge an already-parsed template into text.
pub fn render_parsed(template: &Template, data: &UserData, scope: LoopScope) -> String {
    expand(template, data, scope, Output::Text)
}

/// Merge an already-parsed template into markup. Values are HTML-escaped and
/// entities stay encoded until the markup is segmented.
pub fn render_markup(template: &Template, data: &UserData, scope: LoopScope) -> String {
    expand(template, data, scope, Output::Markup)
}

#[derive(Clone, Copy)]
enum Output {
    Text,
    Markup,
}

impl Output {
    fn push_text(self, out: &mut String, text: &str) {
        match self {
            Output::Text => out.push_str(&decode_entities(text)),
            Output::Markup => out.push_str(text),
        }
    }

    fn push_value(self, out: &mut String, value: &str) {
        match self {
            Output::Text => out.push_str(value),
            Output::Markup => out.push_str(&escape_html(value)),
        }
    }
}

fn expand(template: &Template, data: &UserData, scope: LoopScope, output: Output) -> String {
    let mut out = String::with_capacity(template.source().len());

    for node in template.nodes() {
        match &node.kind {
            NodeKind::Text(text) => output.push_text(&mut out, text),
            NodeKind::Placeholder(key) => {
                if let Some(value) = data.scalar(key) {
                    output.push_value(&mut out, &value);
                }
            }
            NodeKind::Loop { key, body, .. } => match data.rows(key) {
                Some(rows) => {
                    for row in rows {
                        expand_row(body, row, data, scope, output, &mut out);
                    }
                }
                None => debug!("loop '{key}' has no rows; omitting block"),
            },
        }
    }

    strip_unresolved(&out)
}

fn expand_row(
    body: &[Node],
    row: &Value,
    data: &UserData,
    scope: LoopScope,
    output: Output,
    out: &mut String,
) {
    for node in body {
        match &node.kind {
            NodeKind::Text(text) => output.push_text(out, text),
            NodeKind::Placeholder(key) => {
                let own = row
                    .as_object()
                    .and_then(|fields| fields.get(key))
                    .and_then(scalar_to_string);
                let value = match (own, scope) {
                    (Some(v), _) => Some(v),
                    (None, LoopScope::RowFirst) => data.scalar(key),
                    (None, LoopScope::RowOnly) => None,
                };
                if let Some(value) = value {
                    output.push_value(out, &value);
                }
            }
            // The parser never nests loops.
            NodeKind::Loop { .. } => {}
        }
    }
}

/// Remove every `{{...}}` token, repeating until none remains.
///
/// Removing one token can splice two halves into a new one
/// (`{{a{{x}}}}` becomes `{{a}}`), hence the loop.
pub fn strip_unresolved(text: &str) -> String {
    let mut current = text.to_string();
    while UNRESOLVED.is_match(&current) {
        current = UNRESOLVED.replace_all(&current, "").into_owned();
    }
    current
}

/// Decode the handful of entities rich-text editors emit. Single pass, so
/// `&amp;lt;` becomes `&lt;` and not `<`.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| match &caps[1] {
            "nbsp" => " ",
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            _ => "'",
        })
        .into_owned()
}
