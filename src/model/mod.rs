//! # Document Model
//!
//! The input side of the pipeline: the user's form data, the layout archetype,
//! the render request and the form schema the live preview uses to pick
//! controls. Everything here is plain serde data so it can arrive as JSON from
//! whatever form-filling UI sits in front of the engine.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MinutaError, Result};

/// Mapping from placeholder key to a scalar, or for loop keys to an ordered
/// list of row objects.
///
/// The rendering core only ever reads it; the preview session is the one
/// place that edits it, on behalf of the form-state owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserData(Map<String, Value>);

impl UserData {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse user data from a JSON object string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::try_from(value)
    }

    /// The value of `key` coerced to a string, if it is a scalar.
    ///
    /// Strings pass through, numbers use their JSON rendering, booleans become
    /// `true`/`false`. Null, arrays and objects have no scalar form.
    pub fn scalar(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(scalar_to_string)
    }

    /// Like [`UserData::scalar`] but trimmed, with empty strings mapped to `None`.
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.scalar(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// The rows of a loop key. Anything other than an array yields `None`.
    pub fn rows(&self, key: &str) -> Option<&Vec<Value>> {
        self.0.get(key).and_then(Value::as_array)
    }

    pub fn rows_mut(&mut self, key: &str) -> Option<&mut Vec<Value>> {
        self.0.get_mut(key).and_then(Value::as_array_mut)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Append a row to the loop at `key`, replacing any non-array value.
    pub fn push_row(&mut self, key: &str, row: Value) {
        let slot = self.0.entry(key.to_string()).or_insert(Value::Null);
        match slot {
            Value::Array(rows) => rows.push(row),
            other => *other = Value::Array(vec![row]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for UserData {
    type Error = MinutaError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(MinutaError::Config(format!(
                "user data must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl From<Map<String, Value>> for UserData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Coerce a JSON scalar to the string substituted into a template.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The three document archetypes. Decides which boilerplate gets synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutType {
    /// Petition (requerimento): addressee header, "Pede deferimento" closing.
    #[default]
    Official,
    /// Centered title, no addressee header, no closing phrase.
    Declaration,
    /// Letter: addressee header like `Official`.
    Letter,
}

impl LayoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutType::Official => "OFFICIAL",
            LayoutType::Declaration => "DECLARATION",
            LayoutType::Letter => "LETTER",
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutType {
    type Err = MinutaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "official" => Ok(LayoutType::Official),
            "declaration" => Ok(LayoutType::Declaration),
            "letter" => Ok(LayoutType::Letter),
            other => Err(MinutaError::Config(format!(
                "unknown layout type '{other}' (expected official, declaration or letter)"
            ))),
        }
    }
}

/// Everything one document generation needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequest {
    /// HTML-flavored template with placeholder and loop markers.
    pub template: String,
    #[serde(default)]
    pub data: UserData,
    /// Display title; also drives layout-type inference.
    #[serde(default)]
    pub title: String,
    /// Explicit layout override. Inferred from the title when absent.
    #[serde(default)]
    pub layout: Option<LayoutType>,
    /// Date written into a synthesized date line when the data has no
    /// `current_date`. The core never reads the clock itself.
    #[serde(default)]
    pub issued_on: Option<NaiveDate>,
}

impl DocumentRequest {
    pub fn new(template: impl Into<String>, data: UserData, title: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            data,
            title: title.into(),
            layout: None,
            issued_on: None,
        }
    }

    pub fn with_layout(mut self, layout: LayoutType) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn issued_on(mut self, date: NaiveDate) -> Self {
        self.issued_on = Some(date);
        self
    }
}

/// Declared form fields, as authored alongside the template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a sub-field of a loop field.
    pub fn loop_field(&self, loop_key: &str, name: &str) -> Option<&FieldSpec> {
        self.field(loop_key)
            .and_then(|l| l.fields.iter().find(|f| f.name == name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Sub-fields of a `loop` field.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: None,
            field_type,
            fields: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Loop,
}
