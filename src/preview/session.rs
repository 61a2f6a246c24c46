//! Editing session behind a live preview.
//!
//! The session owns the user data while the form is open. Edits come in from
//! the view, update the data and report the full data set to the form-state
//! owner through the `on_change` callback.
//!
//! A focused field is not refreshed from the model: the view keeps showing
//! what the user is typing until the field is blurred. Every other field is
//! redrawn from the model on each [`PreviewSession::tree`] call.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{render_editable, FieldPath, PreviewOptions, PreviewTree, StaticTextId};
use crate::error::{MinutaError, Result};
use crate::model::{FormSchema, UserData};
use crate::template::Template;

/// A change made in the preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "camelCase")]
pub enum Edit {
    #[serde(rename_all = "camelCase")]
    SetField { path: FieldPath, value: String },
    #[serde(rename_all = "camelCase")]
    AddRow { loop_key: String },
    #[serde(rename_all = "camelCase")]
    RemoveRow { loop_key: String, index: usize },
    /// Changes the displayed static text only. Neither the data nor the
    /// template is touched, and `on_change` is not called.
    #[serde(rename_all = "camelCase")]
    StaticText { id: StaticTextId, text: String },
}

type ChangeCallback = Box<dyn FnMut(&UserData)>;

pub struct PreviewSession {
    template: String,
    schema: FormSchema,
    data: UserData,
    options: PreviewOptions,
    on_change: Option<ChangeCallback>,
}

impl PreviewSession {
    /// Start a session. The template is checked up front so structure errors
    /// surface before the first edit.
    pub fn new(
        template: impl Into<String>,
        data: UserData,
        schema: FormSchema,
        options: PreviewOptions,
    ) -> Result<Self> {
        let template = template.into();
        Template::parse(&template, options.template.strict_structure)?;
        Ok(Self {
            template,
            schema,
            data,
            options,
            on_change: None,
        })
    }

    /// Called with the full data after every data edit.
    pub fn on_change(mut self, callback: impl FnMut(&UserData) + 'static) -> Self {
        self.on_change = Some(Box::new(callback));
        self
    }

    pub fn data(&self) -> &UserData {
        &self.data
    }

    pub fn into_data(self) -> UserData {
        self.data
    }

    pub fn focused(&self) -> Option<&FieldPath> {
        self.options.focus.as_ref().map(|(path, _)| path)
    }

    /// Current tree. Unfocused fields show the model value.
    pub fn tree(&self) -> Result<PreviewTree> {
        render_editable(&self.template, &self.data, &self.schema, &self.options)
    }

    /// Give `path` input focus. Its draft starts from the model value.
    pub fn focus(&mut self, path: FieldPath) {
        let draft = path.read(&self.data);
        self.options.focus = Some((path, draft));
    }

    /// Drop focus; the field shows the model value again.
    pub fn blur(&mut self) {
        self.options.focus = None;
    }

    /// Replace the data from outside, e.g. after the form owner normalized
    /// it. The focused field keeps its draft; `on_change` is not called.
    pub fn replace_data(&mut self, data: UserData) {
        self.data = data;
    }

    pub fn apply(&mut self, edit: Edit) -> Result<()> {
        debug!("preview edit: {edit:?}");
        match edit {
            Edit::SetField { path, value } => {
                self.write_field(&path, &value)?;
                if let Some((focused, draft)) = &mut self.options.focus {
                    if *focused == path {
                        *draft = value;
                    }
                }
            }
            Edit::AddRow { loop_key } => {
                let row = self.blank_row(&loop_key);
                self.data.push_row(&loop_key, Value::Object(row));
            }
            Edit::RemoveRow { loop_key, index } => {
                let rows = self
                    .data
                    .rows_mut(&loop_key)
                    .filter(|rows| index < rows.len())
                    .ok_or_else(|| {
                        MinutaError::Edit(format!("loop '{loop_key}' has no row {index}"))
                    })?;
                rows.remove(index);
                self.shift_focus_after_removal(&loop_key, index);
            }
            Edit::StaticText { id, text } => {
                self.options.static_edits.insert(id, text);
                return Ok(());
            }
        }

        if let Some(callback) = self.on_change.as_mut() {
            callback(&self.data);
        }
        Ok(())
    }

    fn write_field(&mut self, path: &FieldPath, value: &str) -> Result<()> {
        match path {
            FieldPath::Global { key } => {
                self.data.insert(key.clone(), value);
            }
            FieldPath::Row {
                loop_key,
                index,
                field,
            } => {
                let row = self
                    .data
                    .rows_mut(loop_key)
                    .and_then(|rows| rows.get_mut(*index))
                    .ok_or_else(|| {
                        MinutaError::Edit(format!("loop '{loop_key}' has no row {index}"))
                    })?;
                if !row.is_object() {
                    warn!("row {index} of '{loop_key}' was not an object; replacing it");
                    *row = Value::Object(Map::new());
                }
                if let Value::Object(fields) = row {
                    fields.insert(field.clone(), Value::String(value.to_string()));
                }
            }
        }
        Ok(())
    }

    /// A new row with every declared sub-field present and empty.
    fn blank_row(&self, loop_key: &str) -> Map<String, Value> {
        self.schema
            .field(loop_key)
            .map(|spec| {
                spec.fields
                    .iter()
                    .map(|f| (f.name.clone(), Value::String(String::new())))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn shift_focus_after_removal(&mut self, loop_key: &str, removed: usize) {
        let Some((FieldPath::Row {
            loop_key: focused_key,
            index,
            ..
        }, _)) = &mut self.options.focus
        else {
            return;
        };
        if focused_key.as_str() != loop_key {
            return;
        }
        if *index == removed {
            self.options.focus = None;
        } else if *index > removed {
            *index -= 1;
        }
    }
}
