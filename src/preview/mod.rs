//! # Live Preview
//!
//! The on-screen counterpart of the PDF path. Instead of laying text out, it
//! turns the template into a tree the form UI can draw: every placeholder
//! becomes an input control bound to a [`FieldPath`] in the user data, every
//! repeating block becomes a group with one entry per row.
//!
//! Loop blocks are found by the template parser first; only the markup
//! between and inside them goes through the [DOM reader](dom). Static text is
//! editable on screen but those edits stay in the view (see
//! [`session::Edit::StaticText`]).

pub mod dom;
pub mod session;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{LoopScope, ShapeRules, TemplateOptions};
use crate::error::Result;
use crate::markup;
use crate::model::{scalar_to_string, FieldSpec, FieldType, FormSchema, LayoutType, UserData};
use crate::shape::{self, ShapeDecision, ShapeInput};
use crate::template::{render_markup, Section, Template, TOKEN};

pub use dom::{parse_fragment, DomNode};
pub use session::{Edit, PreviewSession};

/// Where a control reads and writes its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum FieldPath {
    /// `data[key]`
    #[serde(rename_all = "camelCase")]
    Global { key: String },
    /// `data[loop_key][index][field]`
    #[serde(rename_all = "camelCase")]
    Row {
        loop_key: String,
        index: usize,
        field: String,
    },
}

impl FieldPath {
    pub fn global(key: impl Into<String>) -> Self {
        FieldPath::Global { key: key.into() }
    }

    pub fn row(loop_key: impl Into<String>, index: usize, field: impl Into<String>) -> Self {
        FieldPath::Row {
            loop_key: loop_key.into(),
            index,
            field: field.into(),
        }
    }

    /// Current model value, empty when unset.
    pub fn read(&self, data: &UserData) -> String {
        let value = match self {
            FieldPath::Global { key } => data.scalar(key),
            FieldPath::Row {
                loop_key,
                index,
                field,
            } => data
                .rows(loop_key)
                .and_then(|rows| rows.get(*index))
                .and_then(|row| row.as_object())
                .and_then(|fields| fields.get(field))
                .and_then(scalar_to_string),
        };
        value.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    DatePicker,
    /// Inline content-editable text.
    EditableSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldControl {
    pub path: FieldPath,
    pub control: ControlKind,
    /// The model value, or the draft while the field has focus.
    pub value: String,
    pub placeholder: String,
    pub focused: bool,
    pub editable: bool,
}

/// Position of a static text node: top-level section, loop row, and order
/// within that section or row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticTextId {
    pub section: usize,
    pub row: Option<usize>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PreviewNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<PreviewNode>,
    },
    #[serde(rename_all = "camelCase")]
    StaticText {
        id: StaticTextId,
        text: String,
        /// Shows a view-only edit rather than the template text.
        edited: bool,
    },
    Field(FieldControl),
    LoopGroup(LoopGroup),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopGroup {
    pub key: String,
    pub label: String,
    pub rows: Vec<LoopRow>,
    pub can_add: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopRow {
    pub index: usize,
    pub removable: bool,
    pub children: Vec<PreviewNode>,
}

/// The preview of one template against one data set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTree {
    pub nodes: Vec<PreviewNode>,
    /// What the PDF renderer will decide for the same input, so the view can
    /// hint at the header and signature block it is going to add.
    pub shape: ShapeDecision,
}

impl PreviewTree {
    /// Every field control, in document order.
    pub fn fields(&self) -> Vec<&FieldControl> {
        fn walk<'a>(nodes: &'a [PreviewNode], out: &mut Vec<&'a FieldControl>) {
            for node in nodes {
                match node {
                    PreviewNode::Field(control) => out.push(control),
                    PreviewNode::Element { children, .. } => walk(children, out),
                    PreviewNode::LoopGroup(group) => {
                        for row in &group.rows {
                            walk(&row.children, out);
                        }
                    }
                    PreviewNode::StaticText { .. } => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    pub fn field(&self, path: &FieldPath) -> Option<&FieldControl> {
        self.fields().into_iter().find(|c| &c.path == path)
    }

    pub fn loop_group(&self, key: &str) -> Option<&LoopGroup> {
        self.nodes.iter().find_map(|n| match n {
            PreviewNode::LoopGroup(group) if group.key == key => Some(group),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreviewOptions {
    /// Document title, for the shape decision.
    pub title: String,
    pub layout: Option<LayoutType>,
    pub template: TemplateOptions,
    pub shape: ShapeRules,
    /// Render every control and group as not editable.
    pub read_only: bool,
    /// The focused field and the text being typed into it.
    pub focus: Option<(FieldPath, String)>,
    /// View-only replacements for static text.
    pub static_edits: BTreeMap<StaticTextId, String>,
}

/// Build the editable preview of `template` filled with `data`.
pub fn render_editable(
    template: &str,
    data: &UserData,
    schema: &FormSchema,
    options: &PreviewOptions,
) -> Result<PreviewTree> {
    let parsed = Template::parse(template, options.template.strict_structure)?;

    let merged = render_markup(&parsed, data, options.template.loop_scope);
    let plain = markup::plain_text(&merged);
    let shape = shape::classify(
        &ShapeInput {
            template: &parsed,
            plain_text: &plain,
            title: &options.title,
            data,
            explicit: options.layout,
        },
        &options.shape,
    );

    let builder = TreeBuilder {
        data,
        schema,
        options,
    };
    let mut nodes = Vec::new();
    for (section_index, section) in parsed.sections().into_iter().enumerate() {
        match section {
            Section::Static(html) => {
                let dom = parse_fragment(&html)?;
                let mut scope = Scope::new(section_index, None);
                nodes.extend(builder.convert(&dom, &mut scope));
            }
            Section::Loop { key, body } => {
                let dom = parse_fragment(&body)?;
                let row_count = data.rows(&key).map_or(0, Vec::len);
                let rows = (0..row_count)
                    .map(|index| {
                        let mut scope = Scope::new(section_index, Some((key.as_str(), index)));
                        LoopRow {
                            index,
                            removable: !options.read_only,
                            children: builder.convert(&dom, &mut scope),
                        }
                    })
                    .collect();
                nodes.push(PreviewNode::LoopGroup(LoopGroup {
                    label: label_for(schema.field(&key), &key),
                    key,
                    rows,
                    can_add: !options.read_only,
                }));
            }
        }
    }

    Ok(PreviewTree { nodes, shape })
}

/// Where in the template a conversion is happening.
struct Scope<'k> {
    section: usize,
    row: Option<(&'k str, usize)>,
    next_static: usize,
}

impl<'k> Scope<'k> {
    fn new(section: usize, row: Option<(&'k str, usize)>) -> Self {
        Self {
            section,
            row,
            next_static: 0,
        }
    }

    fn static_id(&mut self) -> StaticTextId {
        let id = StaticTextId {
            section: self.section,
            row: self.row.map(|(_, index)| index),
            index: self.next_static,
        };
        self.next_static += 1;
        id
    }
}

struct TreeBuilder<'a> {
    data: &'a UserData,
    schema: &'a FormSchema,
    options: &'a PreviewOptions,
}

impl TreeBuilder<'_> {
    fn convert(&self, dom: &[DomNode], scope: &mut Scope<'_>) -> Vec<PreviewNode> {
        let mut out = Vec::new();
        for node in dom {
            match node {
                DomNode::Element {
                    tag,
                    attrs,
                    children,
                } => out.push(PreviewNode::Element {
                    tag: tag.clone(),
                    attrs: attrs.clone(),
                    children: self.convert(children, scope),
                }),
                DomNode::Text { text } => self.split_text(text, scope, &mut out),
            }
        }
        out
    }

    /// Split a text node around its placeholders.
    fn split_text(&self, text: &str, scope: &mut Scope<'_>, out: &mut Vec<PreviewNode>) {
        let mut last = 0;
        for caps in TOKEN.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            self.push_static(&text[last..whole.start()], scope, out);
            last = whole.end();

            let sigil = caps.get(1).map_or("", |m| m.as_str());
            let key = caps.get(2).map_or("", |m| m.as_str());
            // Stray loop markers left by lenient parsing, and empty keys.
            if !sigil.is_empty() || key.is_empty() {
                continue;
            }
            out.push(PreviewNode::Field(self.control(key, scope)));
        }
        self.push_static(&text[last..], scope, out);
    }

    fn push_static(&self, text: &str, scope: &mut Scope<'_>, out: &mut Vec<PreviewNode>) {
        if text.is_empty() {
            return;
        }
        let id = scope.static_id();
        let (text, edited) = match self.options.static_edits.get(&id) {
            Some(edit) => (edit.clone(), true),
            None => (text.to_string(), false),
        };
        out.push(PreviewNode::StaticText { id, text, edited });
    }

    fn control(&self, key: &str, scope: &Scope<'_>) -> FieldControl {
        let (path, spec) = match scope.row {
            Some((loop_key, index)) => {
                let row_spec = self.schema.loop_field(loop_key, key);
                if row_spec.is_none() && self.falls_through(loop_key, index, key) {
                    (FieldPath::global(key), self.schema.field(key))
                } else {
                    (FieldPath::row(loop_key, index, key), row_spec)
                }
            }
            None => (FieldPath::global(key), self.schema.field(key)),
        };

        let (value, focused) = match &self.options.focus {
            Some((focused_path, draft)) if *focused_path == path => (draft.clone(), true),
            _ => (path.read(self.data), false),
        };
        let control = match spec.map(|s| s.field_type) {
            Some(FieldType::Date) => ControlKind::DatePicker,
            _ => ControlKind::EditableSpan,
        };

        FieldControl {
            placeholder: label_for(spec, key),
            path,
            control,
            value,
            focused,
            editable: !self.options.read_only,
        }
    }

    /// Whether a key inside a loop row resolves to the top-level value, the
    /// same way the merge does.
    fn falls_through(&self, loop_key: &str, index: usize, key: &str) -> bool {
        if self.options.template.loop_scope == LoopScope::RowOnly {
            return false;
        }
        let row_has_key = self
            .data
            .rows(loop_key)
            .and_then(|rows| rows.get(index))
            .and_then(|row| row.as_object())
            .is_some_and(|fields| fields.contains_key(key));
        !row_has_key && self.data.contains_key(key)
    }
}

/// The field's label, or the key made readable: `birth_date` → "Birth date".
fn label_for(spec: Option<&FieldSpec>, key: &str) -> String {
    if let Some(label) = spec.and_then(|s| s.label.as_deref()).filter(|l| !l.trim().is_empty()) {
        return label.trim().to_string();
    }
    let words = key.replace(['_', '-'], " ");
    let mut chars = words.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_data(value: serde_json::Value) -> UserData {
        UserData::try_from(value).unwrap()
    }

    fn make_schema() -> FormSchema {
        FormSchema {
            fields: vec![
                FieldSpec::new("full_name", FieldType::Text).label("Nome completo"),
                FieldSpec::new("birth_date", FieldType::Date),
                FieldSpec {
                    fields: vec![FieldSpec::new("name", FieldType::Text).label("Nome do filho")],
                    ..FieldSpec::new("children", FieldType::Loop).label("Filhos")
                },
            ],
        }
    }

    const TEMPLATE: &str = "<p>Eu, <strong>{{full_name}}</strong>, nascido em {{birth_date}}.</p>\
        {{#children}}<p>Nome: {{name}} ({{current_city}})</p>{{/children}}<p>Fim.</p>";

    #[test]
    fn placeholders_become_controls() {
        let data = make_data(json!({"full_name": "Ana Paulo"}));
        let tree = render_editable(TEMPLATE, &data, &make_schema(), &PreviewOptions::default()).unwrap();

        let name = tree.field(&FieldPath::global("full_name")).unwrap();
        assert_eq!(name.value, "Ana Paulo");
        assert_eq!(name.placeholder, "Nome completo");
        assert_eq!(name.control, ControlKind::EditableSpan);

        let birth = tree.field(&FieldPath::global("birth_date")).unwrap();
        assert_eq!(birth.control, ControlKind::DatePicker);
        assert_eq!(birth.value, "");
        assert_eq!(birth.placeholder, "Birth date");
    }

    #[test]
    fn loop_rows_address_their_own_entries() {
        let data = make_data(json!({
            "current_city": "Beira",
            "children": [{"name": "Rui"}, {"name": "Sara", "current_city": "Tete"}]
        }));
        let tree = render_editable(TEMPLATE, &data, &make_schema(), &PreviewOptions::default()).unwrap();

        let group = tree.loop_group("children").unwrap();
        assert_eq!(group.label, "Filhos");
        assert_eq!(group.rows.len(), 2);
        assert!(group.can_add);

        let rui = tree.field(&FieldPath::row("children", 0, "name")).unwrap();
        assert_eq!(rui.value, "Rui");
        assert_eq!(rui.placeholder, "Nome do filho");

        // Row 0 has no city of its own, so the control edits the global one.
        let paths: Vec<_> = tree.fields().iter().map(|c| c.path.clone()).collect();
        assert!(paths.contains(&FieldPath::global("current_city")));
        assert!(paths.contains(&FieldPath::row("children", 1, "current_city")));
    }

    #[test]
    fn absent_loop_data_renders_an_empty_group() {
        let tree = render_editable(TEMPLATE, &UserData::new(), &make_schema(), &PreviewOptions::default())
            .unwrap();
        let group = tree.loop_group("children").unwrap();
        assert!(group.rows.is_empty());
        assert_eq!(tree.nodes.len(), 3);
    }

    #[test]
    fn focused_field_shows_the_draft() {
        let data = make_data(json!({"full_name": "Ana"}));
        let options = PreviewOptions {
            focus: Some((FieldPath::global("full_name"), "Ana Pau".to_string())),
            ..PreviewOptions::default()
        };
        let tree = render_editable(TEMPLATE, &data, &make_schema(), &options).unwrap();
        let name = tree.field(&FieldPath::global("full_name")).unwrap();
        assert!(name.focused);
        assert_eq!(name.value, "Ana Pau");
    }

    #[test]
    fn static_text_edits_replace_only_the_view() {
        let id = StaticTextId {
            section: 2,
            row: None,
            index: 0,
        };
        let options = PreviewOptions {
            static_edits: BTreeMap::from([(id.clone(), "Fim do documento.".to_string())]),
            ..PreviewOptions::default()
        };
        let tree = render_editable(TEMPLATE, &UserData::new(), &make_schema(), &options).unwrap();
        match &tree.nodes[2] {
            PreviewNode::Element { children, .. } => match &children[0] {
                PreviewNode::StaticText {
                    id: got,
                    text,
                    edited,
                } => {
                    assert_eq!(got, &id);
                    assert_eq!(text, "Fim do documento.");
                    assert!(edited);
                }
                other => panic!("expected static text, got {other:?}"),
            },
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn read_only_disables_editing() {
        let data = make_data(json!({"children": [{"name": "Rui"}]}));
        let options = PreviewOptions {
            read_only: true,
            ..PreviewOptions::default()
        };
        let tree = render_editable(TEMPLATE, &data, &make_schema(), &options).unwrap();
        let group = tree.loop_group("children").unwrap();
        assert!(!group.can_add);
        assert!(!group.rows[0].removable);
        assert!(tree.fields().iter().all(|c| !c.editable));
    }

    #[test]
    fn tree_carries_the_shape_decision() {
        let options = PreviewOptions {
            title: "Declaração de Residência".to_string(),
            ..PreviewOptions::default()
        };
        let tree = render_editable(TEMPLATE, &UserData::new(), &make_schema(), &options).unwrap();
        assert_eq!(tree.shape.layout_type, LayoutType::Declaration);
        assert!(tree.shape.should_auto_add_header);
        // A city placeholder counts as an authored date line.
        assert!(!tree.shape.should_auto_add_footer);
    }

    #[test]
    fn tree_serializes_to_json() {
        let tree = render_editable(TEMPLATE, &UserData::new(), &make_schema(), &PreviewOptions::default())
            .unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["nodes"][1]["type"], "loopGroup");
        assert_eq!(json["shape"]["layoutType"], "OFFICIAL");
    }

    #[test]
    fn labels_humanize_keys() {
        assert_eq!(label_for(None, "target_authority"), "Target authority");
        assert_eq!(label_for(None, ""), "");
    }
}
