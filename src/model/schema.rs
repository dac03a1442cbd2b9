use crate::model::{title_case, DataType, Record, PK_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// Storage kind of a field declared on an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Scalar { data_type: DataType },
    OneToOne { to: String },
    ForeignKey { to: String },
    ManyToMany { to: String },
}

impl FieldKind {
    /// Entity referenced by this field, if any
    pub fn related_entity(&self) -> Option<&str> {
        match self {
            FieldKind::Scalar { .. } => None,
            FieldKind::OneToOne { to } | FieldKind::ForeignKey { to } | FieldKind::ManyToMany { to } => {
                Some(to.as_str())
            }
        }
    }

    /// True for references that store exactly one key on the owning row
    pub fn is_single_reference(&self) -> bool {
        matches!(self, FieldKind::OneToOne { .. } | FieldKind::ForeignKey { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub verbose_name: String,
    #[serde(default)]
    pub help_text: String,
    pub kind: FieldKind,
    /// Blank values are rejected by forms when set
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl FieldDef {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            verbose_name: name.replace('_', " "),
            help_text: String::new(),
            kind,
            required: false,
            unique: false,
            editable: true,
            max_length: None,
            default: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldKind::Scalar { data_type: DataType::String })
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, FieldKind::Scalar { data_type: DataType::Number })
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldKind::Scalar { data_type: DataType::Boolean })
    }

    pub fn one_to_one(name: &str, to: &str) -> Self {
        Self::new(name, FieldKind::OneToOne { to: to.to_string() })
    }

    pub fn foreign_key(name: &str, to: &str) -> Self {
        Self::new(name, FieldKind::ForeignKey { to: to.to_string() })
    }

    pub fn many_to_many(name: &str, to: &str) -> Self {
        Self::new(name, FieldKind::ManyToMany { to: to.to_string() })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn verbose_name(mut self, verbose_name: &str) -> Self {
        self.verbose_name = verbose_name.to_string();
        self
    }

    pub fn help_text(mut self, help_text: &str) -> Self {
        self.help_text = help_text.to_string();
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// Description of one entity type, the schema-description capability the
/// admin resolves reverse fields against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub verbose_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose_name_plural: Option<String>,
    pub fields: Vec<FieldDef>,
    /// Field used for the human readable representation of a record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_field: Option<String>,
}

impl EntitySchema {
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.to_string(),
            verbose_name: name.to_lowercase(),
            verbose_name_plural: None,
            fields,
            display_field: None,
        }
    }

    pub fn with_display_field(mut self, field: &str) -> Self {
        self.display_field = Some(field.to_string());
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn verbose_name_plural(&self) -> String {
        self.verbose_name_plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.verbose_name))
    }

    /// Whether `field` may be used as a lookup column (`_to_field`)
    pub fn is_lookup_field(&self, field: &str) -> bool {
        field == PK_FIELD || self.get_field(field).is_some_and(|f| f.unique)
    }

    /// Human readable representation of a record of this entity
    pub fn display(&self, record: &Record) -> String {
        let label = self
            .display_field
            .as_deref()
            .and_then(|field| record.get(field))
            .and_then(|value| match value {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Null | serde_json::Value::String(_) => None,
                other => Some(other.to_string()),
            });

        match (label, &record.id) {
            (Some(label), _) => label,
            (None, Some(id)) => format!("{} object ({})", self.name, id),
            (None, None) => format!("{} object (None)", self.name),
        }
    }

    pub fn heading(&self) -> String {
        title_case(&self.verbose_name)
    }
}

/// All entity types known to one admin site
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: EntitySchema) {
        self.entities.insert(schema.name.clone(), schema);
    }

    pub fn with(mut self, schema: EntitySchema) -> Self {
        self.register(schema);
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

/// Metadata describing a reverse field: a single-valued reference on the
/// parent whose target gets edited inline on the parent's screen
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReverseFieldSpec {
    pub parent_entity: String,
    pub field_name: String,
    pub child_entity: String,
    /// Attribute on the parent record holding the child's key
    pub back_reference_field: String,
    pub display_label: String,
    pub display_label_plural: String,
    pub help_text: String,
}
