use crate::forms::form::{FormSpec, ModelForm};
use crate::forms::formset::{form_prefix, FormSet, ManagementForm, SavedRow};
use crate::model::{QueryDict, Record};
use crate::store::traits::{QueryScope, RecordQuery, RecordStore, StoreTransaction};
use anyhow::Result;
use log::{debug, warn};
use std::sync::Arc;

pub const MAX_NUM: usize = 1;
pub const TOO_FEW_FORMS: &str = "Please submit at least 1 form.";
pub const TOO_MANY_FORMS: &str = "Please submit at most 1 form.";
pub const EMPTY_CHILD_FORM: &str = "This form cannot be empty.";

/// Outcome of saving a single-child form set
#[derive(Debug, Clone, PartialEq)]
pub enum ChildSave {
    Saved(SavedRow),
    /// Nothing was submitted for the slot; the parent keeps its current key
    NoChildToSave,
}

impl ChildSave {
    pub fn record(&self) -> Option<&Record> {
        match self {
            ChildSave::Saved(row) => Some(row.record()),
            ChildSave::NoChildToSave => None,
        }
    }
}

/// Form set holding exactly one form for the row a parent's single-valued
/// reference points at, or one blank slot when it points nowhere. The form
/// is never empty-permitted.
#[derive(Debug, Clone)]
pub struct SingleChildFormSet {
    prefix: String,
    child_entity: String,
    back_reference_field: String,
    query: RecordQuery,
    extra: usize,
    initial_count: usize,
    forms: Vec<ModelForm>,
    bound: bool,
    non_form_errors: Vec<String>,
}

impl SingleChildFormSet {
    pub async fn build(
        store: &dyn RecordStore,
        spec: Arc<FormSpec>,
        back_reference_field: &str,
        parent: Option<&Record>,
        prefix: &str,
        data: Option<&QueryDict>,
    ) -> Result<Self> {
        let child_entity = spec.entity.clone();

        let mut query = match parent.and_then(|p| p.reference(back_reference_field)) {
            Some(child_id) => RecordQuery::by_pk(&child_entity, &child_id),
            None => RecordQuery::none(&child_entity),
        };
        let mut existing = store.filter_records(&query).await?;
        if existing.is_empty() && query.scope != QueryScope::Nothing {
            warn!(
                "{}.{} points at a missing {} row, offering a blank form",
                parent.map(|p| p.entity.as_str()).unwrap_or("?"),
                back_reference_field,
                child_entity
            );
            query = RecordQuery::none(&child_entity);
        }
        existing.truncate(MAX_NUM);

        let initial_count = existing.len();
        let extra = if initial_count == 0 { 1 } else { 0 };
        let instance = existing
            .pop()
            .unwrap_or_else(|| Record::new(&child_entity));
        debug!(
            "Single child form set '{}' for {}: initial={}, extra={}",
            prefix, child_entity, initial_count, extra
        );

        let mut formset = Self {
            prefix: prefix.to_string(),
            child_entity,
            back_reference_field: back_reference_field.to_string(),
            query,
            extra,
            initial_count,
            forms: Vec::new(),
            bound: data.is_some(),
            non_form_errors: Vec::new(),
        };

        let child_prefix = Some(form_prefix(prefix, 0));
        let Some(data) = data else {
            formset
                .forms
                .push(ModelForm::unbound(spec, instance, child_prefix, &QueryDict::new()));
            return Ok(formset);
        };

        match ManagementForm::read(prefix, data) {
            Ok(management) if management.total_forms < 1 => formset.non_form_errors.push(TOO_FEW_FORMS.to_string()),
            Ok(management) if management.total_forms > MAX_NUM => {
                formset.non_form_errors.push(TOO_MANY_FORMS.to_string())
            }
            Ok(_) => {}
            Err(message) => formset.non_form_errors.push(message),
        }

        let has_fields = !spec.fields.is_empty();
        let mut form = ModelForm::bound(spec, instance, child_prefix, data, false);
        // Blanking an existing child must never read as "delete it".
        // Unticking a checkbox alone is an edit, not a blanking.
        if initial_count > 0 && has_fields && form.is_blank() && form.value_fields_changed() {
            form.add_error(None, EMPTY_CHILD_FORM);
        }
        formset.forms.push(form);

        Ok(formset)
    }

    pub fn child_entity(&self) -> &str {
        &self.child_entity
    }

    pub fn back_reference_field(&self) -> &str {
        &self.back_reference_field
    }

    /// Scope used to look up the bound row
    pub fn query(&self) -> &RecordQuery {
        &self.query
    }

    /// Number of blank slots offered
    pub fn extra(&self) -> usize {
        self.extra
    }

    pub fn initial_form_count(&self) -> usize {
        self.initial_count
    }

    /// Persist the form if it is new or changed and return the saved row
    pub async fn save(&mut self, tx: &mut dyn StoreTransaction, user_id: &str) -> Result<ChildSave> {
        let initial_count = self.initial_count;
        let Some(form) = self.forms.first_mut() else {
            return Ok(ChildSave::NoChildToSave);
        };
        if !form.is_valid() {
            return Ok(ChildSave::NoChildToSave);
        }
        let changed = form.changed_data();
        if changed.is_empty() {
            return Ok(ChildSave::NoChildToSave);
        }

        let mut record = form.instance().clone();
        record.touch(user_id);
        tx.save_record(&mut record).await?;
        *form.instance_mut() = record.clone();

        Ok(ChildSave::Saved(if initial_count > 0 {
            SavedRow::Changed {
                index: 0,
                record,
                fields: changed,
            }
        } else {
            SavedRow::Added { index: 0, record }
        }))
    }
}

impl FormSet for SingleChildFormSet {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn forms(&self) -> &[ModelForm] {
        &self.forms
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    fn non_form_errors(&self) -> &[String] {
        &self.non_form_errors
    }

    fn management_form(&self) -> ManagementForm {
        ManagementForm {
            total_forms: self.forms.len(),
            initial_forms: self.initial_count,
        }
    }
}
