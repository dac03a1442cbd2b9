use crate::admin::inline::InlineType;
use crate::admin::media::Media;
use crate::admin::request::AdminRequest;
use crate::forms::{FormField, FormFieldHook, FormSpec, FormValidator, SingleChildFormSet};
use crate::model::{EntitySchema, FieldDef, QueryDict, Record, ReverseFieldSpec};
use crate::store::RecordStore;
use std::sync::Arc;

/// Per-request rewrite of one form field; `None` drops the field
pub type RequestFieldHook = Arc<dyn Fn(&AdminRequest, &FieldDef) -> Option<FormField> + Send + Sync>;

/// Custom form layout for the child of a reverse field
#[derive(Clone, Default)]
pub struct FormOptions {
    pub fields: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub validators: Vec<Arc<dyn FormValidator>>,
}

impl std::fmt::Debug for FormOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormOptions")
            .field("fields", &self.fields)
            .field("exclude", &self.exclude)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl FormOptions {
    pub fn fields(fields: &[&str]) -> Self {
        Self {
            fields: Some(fields.iter().map(|f| f.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_exclude(mut self, exclude: &[&str]) -> Self {
        self.exclude = exclude.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn FormValidator>) -> Self {
        self.validators.push(validator);
        self
    }
}

/// One entry of a parent's reverse field declarations
#[derive(Debug, Clone)]
pub struct ReverseField {
    pub name: String,
    pub form: Option<FormOptions>,
}

impl ReverseField {
    pub fn with_form(name: &str, form: FormOptions) -> Self {
        Self {
            name: name.to_string(),
            form: Some(form),
        }
    }
}

impl From<&str> for ReverseField {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            form: None,
        }
    }
}

/// Field inclusion/exclusion supplied by the caller of `build`
#[derive(Debug, Clone, Default)]
pub struct FormOverrides {
    pub fields: Option<Vec<String>>,
    pub exclude: Vec<String>,
}

/// Builds the single-child form set of one reverse field and describes it
/// to the renderer
#[derive(Clone)]
pub struct ReverseFieldController {
    spec: Arc<ReverseFieldSpec>,
    child: EntitySchema,
    inline_type: InlineType,
    form: FormOptions,
    exclude: Vec<String>,
    field_hook: Option<RequestFieldHook>,
    media: Media,
}

impl std::fmt::Debug for ReverseFieldController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseFieldController")
            .field("spec", &self.spec)
            .field("inline_type", &self.inline_type)
            .field("form", &self.form)
            .field("exclude", &self.exclude)
            .finish()
    }
}

impl ReverseFieldController {
    pub fn new(spec: Arc<ReverseFieldSpec>, child: EntitySchema, inline_type: InlineType) -> Self {
        Self {
            spec,
            child,
            inline_type,
            form: FormOptions::default(),
            exclude: Vec::new(),
            field_hook: None,
            media: Media::default(),
        }
    }

    pub fn with_form(mut self, form: FormOptions) -> Self {
        self.form = form;
        self
    }

    pub fn with_exclude(mut self, exclude: &[&str]) -> Self {
        self.exclude = exclude.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_field_hook(mut self, hook: RequestFieldHook) -> Self {
        self.field_hook = Some(hook);
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = media;
        self
    }

    pub fn spec(&self) -> &ReverseFieldSpec {
        &self.spec
    }

    pub fn field_name(&self) -> &str {
        &self.spec.field_name
    }

    pub fn child_entity(&self) -> &str {
        &self.spec.child_entity
    }

    pub fn back_reference_field(&self) -> &str {
        &self.spec.back_reference_field
    }

    pub fn display_label(&self) -> &str {
        &self.spec.display_label
    }

    pub fn display_label_plural(&self) -> &str {
        &self.spec.display_label_plural
    }

    pub fn inline_type(&self) -> InlineType {
        self.inline_type
    }

    pub fn template(&self) -> String {
        self.inline_type.template()
    }

    pub fn media(&self) -> Media {
        self.media.clone()
    }

    /// Child form layout for one request. The controller's own exclusions
    /// are merged with the caller's; caller `fields` win over the form's.
    pub fn form_spec(&self, request: &AdminRequest, overrides: &FormOverrides) -> FormSpec {
        let fields = overrides.fields.as_ref().or(self.form.fields.as_ref());
        let exclude: Vec<String> = self
            .exclude
            .iter()
            .chain(self.form.exclude.iter())
            .chain(overrides.exclude.iter())
            .cloned()
            .collect();

        let hook: Option<FormFieldHook> = self.field_hook.as_ref().map(|hook| {
            let hook = Arc::clone(hook);
            let request = request.clone();
            Arc::new(move |def: &FieldDef| hook(&request, def)) as FormFieldHook
        });

        FormSpec::for_entity(&self.child, fields.map(Vec::as_slice), &exclude, hook.as_ref())
            .with_validators(self.form.validators.clone())
    }

    pub async fn build(
        &self,
        store: &dyn RecordStore,
        request: &AdminRequest,
        parent: Option<&Record>,
        prefix: &str,
        data: Option<&QueryDict>,
        overrides: &FormOverrides,
    ) -> anyhow::Result<SingleChildFormSet> {
        let spec = Arc::new(self.form_spec(request, overrides));
        SingleChildFormSet::build(store, spec, self.back_reference_field(), parent, prefix, data).await
    }
}
