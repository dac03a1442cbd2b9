use crate::admin::error::AdminError;
use crate::admin::media::Media;
use crate::admin::request::AdminRequest;
use crate::forms::{FormSet, FormSetView, FormSpec, InlineFormSet, InlineFormSetOptions};
use crate::model::{title_case, EntitySchema, QueryDict, Record, SchemaRegistry};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Presentation of an inline group on the edit screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineType {
    #[default]
    Stacked,
    Tabular,
}

impl InlineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InlineType::Stacked => "stacked",
            InlineType::Tabular => "tabular",
        }
    }

    pub fn template(&self) -> String {
        format!("admin/edit_inline/{}.html", self.as_str())
    }
}

impl std::str::FromStr for InlineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stacked" => Ok(InlineType::Stacked),
            "tabular" => Ok(InlineType::Tabular),
            _ => Err(format!("Invalid inline type: {}", s)),
        }
    }
}

/// Controller for an ordinary inline: rows of a child entity whose foreign
/// key points at the owning record
pub trait InlineController: Send + Sync {
    fn child_entity(&self) -> &str;
    /// Field on the child holding the owner's key
    fn fk_name(&self) -> &str;
    fn display_label(&self) -> &str;
    fn display_label_plural(&self) -> &str;
    fn options(&self) -> &InlineFormSetOptions;
    fn form_spec(&self, request: &AdminRequest) -> FormSpec;

    fn inline_type(&self) -> InlineType {
        InlineType::Stacked
    }

    fn template(&self) -> String {
        self.inline_type().template()
    }

    fn media(&self) -> Media {
        Media::default()
    }

    fn default_prefix(&self) -> String {
        format!("{}_set", self.child_entity().to_lowercase())
    }
}

/// Schema-driven inline for a child entity
#[derive(Debug, Clone)]
pub struct StackedInline {
    child: EntitySchema,
    fk_name: String,
    display_label: String,
    display_label_plural: String,
    inline_type: InlineType,
    options: InlineFormSetOptions,
    fields: Option<Vec<String>>,
    exclude: Vec<String>,
    media: Media,
}

impl StackedInline {
    /// Checks that `fk_name` on `child_entity` references `parent_entity`
    pub fn new(
        registry: &SchemaRegistry,
        parent_entity: &str,
        child_entity: &str,
        fk_name: &str,
    ) -> Result<Self, AdminError> {
        let child = registry
            .get(child_entity)
            .ok_or_else(|| AdminError::UnknownEntity(child_entity.to_string()))?;
        let fk = child.get_field(fk_name).ok_or_else(|| AdminError::UnknownField {
            entity: child_entity.to_string(),
            field: fk_name.to_string(),
        })?;
        if !fk.kind.is_single_reference() || fk.kind.related_entity() != Some(parent_entity) {
            return Err(AdminError::NotAReference {
                entity: child_entity.to_string(),
                field: fk_name.to_string(),
            });
        }

        Ok(Self {
            display_label: child.heading(),
            display_label_plural: title_case(&child.verbose_name_plural()),
            child: child.clone(),
            fk_name: fk_name.to_string(),
            inline_type: InlineType::Stacked,
            options: InlineFormSetOptions::default(),
            fields: None,
            exclude: Vec::new(),
            media: Media::default(),
        })
    }

    pub fn tabular(mut self) -> Self {
        self.inline_type = InlineType::Tabular;
        self
    }

    pub fn with_options(mut self, options: InlineFormSetOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_exclude(mut self, exclude: &[&str]) -> Self {
        self.exclude = exclude.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = media;
        self
    }
}

impl InlineController for StackedInline {
    fn child_entity(&self) -> &str {
        &self.child.name
    }

    fn fk_name(&self) -> &str {
        &self.fk_name
    }

    fn display_label(&self) -> &str {
        &self.display_label
    }

    fn display_label_plural(&self) -> &str {
        &self.display_label_plural
    }

    fn options(&self) -> &InlineFormSetOptions {
        &self.options
    }

    fn form_spec(&self, _request: &AdminRequest) -> FormSpec {
        let mut exclude = self.exclude.clone();
        exclude.push(self.fk_name.clone());
        FormSpec::for_entity(&self.child, self.fields.as_deref(), &exclude, None)
    }

    fn inline_type(&self) -> InlineType {
        self.inline_type
    }

    fn media(&self) -> Media {
        self.media.clone()
    }
}

/// Bind the form set of an ordinary inline against `parent`
pub async fn bind_inline(
    store: &dyn RecordStore,
    controller: &dyn InlineController,
    request: &AdminRequest,
    parent: &Record,
    prefix: &str,
    data: Option<&QueryDict>,
) -> anyhow::Result<InlineFormSet> {
    InlineFormSet::build(
        store,
        Arc::new(controller.form_spec(request)),
        controller.fk_name(),
        parent,
        prefix,
        controller.options(),
        data,
        request.is_save_as_new(),
    )
    .await
}

/// Hands out form set prefixes, suffixing repeats with `-2`, `-3`, ...
#[derive(Debug, Default)]
pub struct PrefixAllocator {
    seen: HashMap<String, usize>,
}

impl PrefixAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, base: &str) -> String {
        let count = self.seen.entry(base.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base.to_string()
        } else {
            format!("{}-{}", base, count)
        }
    }
}

/// What the renderer receives for one inline group
#[derive(Debug, Clone, Serialize)]
pub struct InlineFormSetView {
    pub display_label: String,
    pub display_label_plural: String,
    pub template: String,
    pub media: Media,
    pub formset: FormSetView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<NestedGroupView>,
}

impl InlineFormSetView {
    pub fn new(
        display_label: &str,
        display_label_plural: &str,
        template: String,
        media: Media,
        formset: &dyn FormSet,
    ) -> Self {
        Self {
            display_label: display_label.to_string(),
            display_label_plural: display_label_plural.to_string(),
            template,
            media,
            formset: formset.view(),
            nested: Vec::new(),
        }
    }

    pub fn with_nested(mut self, nested: Vec<NestedGroupView>) -> Self {
        self.nested = nested;
        self
    }
}

/// Nested inline groups rendered beneath one form of an owning form set
#[derive(Debug, Clone, Serialize)]
pub struct NestedGroupView {
    pub form_index: usize,
    pub formsets: Vec<InlineFormSetView>,
}
