use crate::forms::field::{value_to_raw, FormField, FormFieldKind};
use crate::model::{EntitySchema, FieldDef, QueryDict, Record};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key under which errors that belong to no single field are collected
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Form-wide check run after every field cleaned successfully
pub trait FormValidator: Send + Sync {
    fn clean(&self, cleaned: &BTreeMap<String, serde_json::Value>) -> Result<(), FormError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormError {
    pub field: Option<String>,
    pub message: String,
}

impl FormError {
    pub fn new(message: &str) -> Self {
        Self {
            field: None,
            message: message.to_string(),
        }
    }

    pub fn on_field(field: &str, message: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            message: message.to_string(),
        }
    }
}

impl<F> FormValidator for F
where
    F: Fn(&BTreeMap<String, serde_json::Value>) -> Result<(), FormError> + Send + Sync,
{
    fn clean(&self, cleaned: &BTreeMap<String, serde_json::Value>) -> Result<(), FormError> {
        self(cleaned)
    }
}

/// Maps one schema field to its form field, or drops it
pub type FormFieldHook = Arc<dyn Fn(&FieldDef) -> Option<FormField> + Send + Sync>;

/// The field layout shared by every form of one kind; built once per request
#[derive(Clone)]
pub struct FormSpec {
    pub entity: String,
    pub fields: Vec<FormField>,
    pub validators: Vec<Arc<dyn FormValidator>>,
}

impl std::fmt::Debug for FormSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSpec")
            .field("entity", &self.entity)
            .field("fields", &self.fields)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl FormSpec {
    /// Build the layout for `schema`. `fields` restricts and orders the
    /// result; `exclude` removes names afterwards.
    pub fn for_entity(
        schema: &EntitySchema,
        fields: Option<&[String]>,
        exclude: &[String],
        hook: Option<&FormFieldHook>,
    ) -> Self {
        let defs: Vec<&FieldDef> = match fields {
            Some(names) => names.iter().filter_map(|name| schema.get_field(name)).collect(),
            None => schema.fields.iter().collect(),
        };

        let fields = defs
            .into_iter()
            .filter(|def| !exclude.contains(&def.name))
            .filter_map(|def| match hook {
                Some(hook) => hook(def),
                None => FormField::from_def(def),
            })
            .collect();

        Self {
            entity: schema.name.clone(),
            fields,
            validators: Vec::new(),
        }
    }

    pub fn with_validators(mut self, validators: Vec<Arc<dyn FormValidator>>) -> Self {
        self.validators.extend(validators);
        self
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// A form editing one record. Bound forms are cleaned on construction.
#[derive(Debug, Clone)]
pub struct ModelForm {
    spec: Arc<FormSpec>,
    prefix: Option<String>,
    instance: Record,
    initial: BTreeMap<String, String>,
    data: Option<QueryDict>,
    empty_permitted: bool,
    cleaned: BTreeMap<String, serde_json::Value>,
    errors: BTreeMap<String, Vec<String>>,
}

impl ModelForm {
    pub fn unbound(spec: Arc<FormSpec>, instance: Record, prefix: Option<String>, initial: &QueryDict) -> Self {
        let initial = initial_values(&spec, &instance, initial);
        Self {
            spec,
            prefix,
            instance,
            initial,
            data: None,
            empty_permitted: false,
            cleaned: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn bound(
        spec: Arc<FormSpec>,
        instance: Record,
        prefix: Option<String>,
        data: &QueryDict,
        empty_permitted: bool,
    ) -> Self {
        let mut form = Self::unbound(spec, instance, prefix, &QueryDict::new());
        form.data = Some(data.clone());
        form.empty_permitted = empty_permitted;
        form.full_clean();
        form
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    pub fn empty_permitted(&self) -> bool {
        self.empty_permitted
    }

    /// Name of a field inside the submitted data
    pub fn html_name(&self, field: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}-{}", prefix, field),
            None => field.to_string(),
        }
    }

    pub fn raw_value(&self, field: &str) -> Option<&str> {
        self.data.as_ref().and_then(|data| data.get(&self.html_name(field)))
    }

    pub fn instance(&self) -> &Record {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut Record {
        &mut self.instance
    }

    pub fn into_instance(self) -> Record {
        self.instance
    }

    pub fn cleaned_data(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.cleaned
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn non_field_errors(&self) -> &[String] {
        self.errors
            .get(NON_FIELD_ERRORS)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn is_valid(&self) -> bool {
        self.is_bound() && self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: Option<&str>, message: &str) {
        let key = field.unwrap_or(NON_FIELD_ERRORS).to_string();
        self.errors.entry(key).or_default().push(message.to_string());
    }

    /// Field names whose submitted value differs from the initial value
    pub fn changed_data(&self) -> Vec<String> {
        if !self.is_bound() {
            return Vec::new();
        }
        self.spec
            .fields
            .iter()
            .filter(|field| {
                field.has_changed(
                    self.initial.get(&field.name).map(String::as_str),
                    self.raw_value(&field.name),
                )
            })
            .map(|field| field.name.clone())
            .collect()
    }

    pub fn has_changed(&self) -> bool {
        !self.changed_data().is_empty()
    }

    /// Whether a field other than a checkbox changed
    pub fn value_fields_changed(&self) -> bool {
        let changed = self.changed_data();
        self.spec
            .fields
            .iter()
            .any(|field| field.kind != FormFieldKind::Checkbox && changed.contains(&field.name))
    }

    /// True when every field of a bound form was submitted blank
    pub fn is_blank(&self) -> bool {
        self.spec
            .fields
            .iter()
            .all(|field| field.normalize(self.raw_value(&field.name)) == field.normalize(None))
    }

    fn full_clean(&mut self) {
        self.errors.clear();
        self.cleaned.clear();

        // An untouched empty-permitted form is valid and carries no data
        if self.empty_permitted && !self.has_changed() {
            return;
        }

        let mut cleaned = BTreeMap::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        for field in &self.spec.fields {
            match field.clean(self.raw_value(&field.name)) {
                Ok(value) => {
                    cleaned.insert(field.name.clone(), value);
                }
                Err(message) => errors.push((field.name.clone(), message)),
            }
        }

        if errors.is_empty() {
            for validator in &self.spec.validators {
                if let Err(error) = validator.clean(&cleaned) {
                    let key = error.field.unwrap_or_else(|| NON_FIELD_ERRORS.to_string());
                    errors.push((key, error.message));
                }
            }
        }

        for (key, message) in errors {
            self.errors.entry(key).or_default().push(message);
        }

        for (name, value) in &cleaned {
            self.instance.set(name, value.clone());
        }
        self.cleaned = cleaned;
    }

    pub fn view(&self) -> FormView {
        let fields = self
            .spec
            .fields
            .iter()
            .map(|field| {
                let value = match &self.data {
                    Some(_) => self.raw_value(&field.name).unwrap_or("").to_string(),
                    None => self.initial.get(&field.name).cloned().unwrap_or_default(),
                };
                BoundFieldView {
                    name: field.name.clone(),
                    html_name: self.html_name(&field.name),
                    label: field.label.clone(),
                    help_text: field.help_text.clone(),
                    required: field.required,
                    kind: field.kind.clone(),
                    value,
                    errors: self.errors.get(&field.name).cloned().unwrap_or_default(),
                }
            })
            .collect();

        FormView {
            prefix: self.prefix.clone(),
            instance_id: self.instance.id.clone(),
            fields,
            non_field_errors: self.non_field_errors().to_vec(),
        }
    }
}

/// Initial raw values: stored values of the instance, then field defaults,
/// then explicit overrides
fn initial_values(spec: &FormSpec, instance: &Record, overrides: &QueryDict) -> BTreeMap<String, String> {
    spec.fields
        .iter()
        .filter_map(|field| {
            let value = overrides
                .get(&field.name)
                .map(str::to_string)
                .or_else(|| instance.get(&field.name).map(value_to_raw))
                .or_else(|| {
                    instance
                        .is_new()
                        .then(|| field.initial.as_ref().map(value_to_raw))
                        .flatten()
                })?;
            Some((field.name.clone(), value))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundFieldView {
    pub name: String,
    pub html_name: String,
    pub label: String,
    pub help_text: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: crate::forms::field::FormFieldKind,
    pub value: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub instance_id: Option<String>,
    pub fields: Vec<BoundFieldView>,
    pub non_field_errors: Vec<String>,
}
