use crate::model::{DataType, FieldDef, FieldKind};
use serde::Serialize;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum FormFieldKind {
    Text,
    Number,
    Checkbox,
    /// Key of a row of the `to` entity
    Select { to: String },
}

/// Form-level view of an entity field: how raw submitted text is cleaned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub help_text: String,
    pub required: bool,
    pub kind: FormFieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<serde_json::Value>,
}

impl FormField {
    /// Default mapping from a schema field. Many-to-many and non-editable
    /// fields have no form field.
    pub fn from_def(def: &FieldDef) -> Option<Self> {
        if !def.editable {
            return None;
        }
        let kind = match &def.kind {
            FieldKind::Scalar { data_type: DataType::String } => FormFieldKind::Text,
            FieldKind::Scalar { data_type: DataType::Number } => FormFieldKind::Number,
            FieldKind::Scalar { data_type: DataType::Boolean } => FormFieldKind::Checkbox,
            FieldKind::OneToOne { to } | FieldKind::ForeignKey { to } => {
                FormFieldKind::Select { to: to.clone() }
            }
            FieldKind::ManyToMany { .. } => return None,
        };
        let mut label = def.verbose_name.clone();
        if let Some(first) = label.get(..1) {
            label = format!("{}{}", first.to_uppercase(), &label[1..]);
        }

        Some(Self {
            name: def.name.clone(),
            label,
            help_text: def.help_text.clone(),
            // A checkbox left unticked is a legitimate "false"
            required: def.required && kind != FormFieldKind::Checkbox,
            kind,
            max_length: def.max_length,
            initial: def.default.clone(),
        })
    }

    /// Turn submitted text into a stored value
    pub fn clean(&self, raw: Option<&str>) -> Result<serde_json::Value, String> {
        let raw = raw.map(str::trim).unwrap_or("");

        if self.kind == FormFieldKind::Checkbox {
            return Ok(serde_json::Value::Bool(is_truthy(raw)));
        }

        if raw.is_empty() {
            if self.required {
                return Err(REQUIRED_MESSAGE.to_string());
            }
            return Ok(match self.kind {
                FormFieldKind::Text => serde_json::Value::String(String::new()),
                _ => serde_json::Value::Null,
            });
        }

        match &self.kind {
            FormFieldKind::Text => {
                let length = raw.chars().count();
                if let Some(max) = self.max_length {
                    if length > max {
                        return Err(format!(
                            "Ensure this value has at most {} characters (it has {}).",
                            max, length
                        ));
                    }
                }
                Ok(serde_json::Value::String(raw.to_string()))
            }
            FormFieldKind::Number => parse_number(raw).ok_or_else(|| "Enter a number.".to_string()),
            FormFieldKind::Select { .. } => Ok(serde_json::Value::String(raw.to_string())),
            FormFieldKind::Checkbox => Ok(serde_json::Value::Bool(is_truthy(raw))),
        }
    }

    /// Canonical text used to compare submitted data with initial data
    pub fn normalize(&self, raw: Option<&str>) -> String {
        let raw = raw.map(str::trim).unwrap_or("");
        match self.kind {
            FormFieldKind::Checkbox => is_truthy(raw).to_string(),
            _ => raw.to_string(),
        }
    }

    pub fn has_changed(&self, initial: Option<&str>, data: Option<&str>) -> bool {
        self.normalize(initial) != self.normalize(data)
    }
}

/// Text form of a stored value as it is rendered into a form
pub fn value_to_raw(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes")
}

fn parse_number(raw: &str) -> Option<serde_json::Value> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(serde_json::Value::from(n));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
}
