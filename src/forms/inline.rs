use crate::forms::form::{FormSpec, ModelForm};
use crate::forms::formset::{form_prefix, FormSet, ManagementForm, SavedRow, DELETION_FIELD_NAME};
use crate::model::{QueryDict, Record};
use crate::store::traits::{RecordQuery, RecordStore, StoreTransaction};
use anyhow::Result;
use std::sync::Arc;

/// Upper bound on forms accepted from one submission when `max_num` is unset
pub const DEFAULT_MAX_NUM: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFormSetOptions {
    pub extra: usize,
    pub max_num: Option<usize>,
    pub can_delete: bool,
}

impl Default for InlineFormSetOptions {
    fn default() -> Self {
        Self {
            extra: 3,
            max_num: None,
            can_delete: true,
        }
    }
}

/// Forms for the rows of a child entity whose foreign key points at the
/// parent. Saved after the parent so the key can be filled in.
#[derive(Debug, Clone)]
pub struct InlineFormSet {
    prefix: String,
    child_entity: String,
    fk_name: String,
    forms: Vec<ModelForm>,
    initial_count: usize,
    deleted: Vec<bool>,
    bound: bool,
    non_form_errors: Vec<String>,
}

impl InlineFormSet {
    #[allow(clippy::too_many_arguments)]
    pub async fn build(
        store: &dyn RecordStore,
        spec: Arc<FormSpec>,
        fk_name: &str,
        parent: &Record,
        prefix: &str,
        options: &InlineFormSetOptions,
        data: Option<&QueryDict>,
        save_as_new: bool,
    ) -> Result<Self> {
        let child_entity = spec.entity.clone();
        let query = match (&parent.id, save_as_new) {
            (Some(parent_id), false) => {
                RecordQuery::by_field(&child_entity, fk_name, serde_json::Value::String(parent_id.clone()))
            }
            _ => RecordQuery::none(&child_entity),
        };
        let existing = store.filter_records(&query).await?;
        let initial_count = existing.len();

        let mut formset = Self {
            prefix: prefix.to_string(),
            child_entity,
            fk_name: fk_name.to_string(),
            forms: Vec::new(),
            initial_count,
            deleted: Vec::new(),
            bound: data.is_some(),
            non_form_errors: Vec::new(),
        };

        let Some(data) = data else {
            let mut total = initial_count + options.extra;
            if let Some(max_num) = options.max_num {
                total = total.min(max_num.max(initial_count));
            }
            for index in 0..total {
                let instance = existing
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| Record::new(&formset.child_entity));
                formset.forms.push(ModelForm::unbound(
                    Arc::clone(&spec),
                    instance,
                    Some(form_prefix(prefix, index)),
                    &QueryDict::new(),
                ));
            }
            formset.deleted = vec![false; formset.forms.len()];
            return Ok(formset);
        };

        let management = match ManagementForm::read(prefix, data) {
            Ok(management) => management,
            Err(message) => {
                formset.non_form_errors.push(message);
                return Ok(formset);
            }
        };

        let cap = options.max_num.unwrap_or(DEFAULT_MAX_NUM).max(initial_count);
        let total = management.total_forms.min(cap);
        for index in 0..total {
            let (instance, empty_permitted) = match existing.get(index) {
                Some(row) => (row.clone(), false),
                None => (Record::new(&formset.child_entity), true),
            };
            let form = ModelForm::bound(
                Arc::clone(&spec),
                instance,
                Some(form_prefix(prefix, index)),
                data,
                empty_permitted,
            );
            let deleted = options.can_delete
                && form
                    .raw_value(DELETION_FIELD_NAME)
                    .is_some_and(|raw| matches!(raw, "on" | "true" | "1"));
            formset.forms.push(form);
            formset.deleted.push(deleted);
        }

        Ok(formset)
    }

    pub fn child_entity(&self) -> &str {
        &self.child_entity
    }

    pub fn fk_name(&self) -> &str {
        &self.fk_name
    }

    pub fn initial_form_count(&self) -> usize {
        self.initial_count
    }

    /// Persist changed rows, new rows and deletions. New rows get the
    /// parent's key in `fk_name`.
    pub async fn save(
        &mut self,
        tx: &mut dyn StoreTransaction,
        parent: &Record,
        user_id: &str,
    ) -> Result<Vec<SavedRow>> {
        let mut saved = Vec::new();

        for index in 0..self.forms.len() {
            let deleted = self.is_deleted(index);
            let form = &mut self.forms[index];
            let changed = form.changed_data();

            if index < self.initial_count {
                let Some(id) = form.instance().id.clone() else {
                    continue;
                };
                if deleted {
                    tx.delete_record(&self.child_entity, &id).await?;
                    saved.push(SavedRow::Deleted {
                        index,
                        record: form.instance().clone(),
                    });
                } else if !changed.is_empty() {
                    let mut record = form.instance().clone();
                    record.touch(user_id);
                    tx.save_record(&mut record).await?;
                    *form.instance_mut() = record.clone();
                    saved.push(SavedRow::Changed {
                        index,
                        record,
                        fields: changed,
                    });
                }
            } else if !changed.is_empty() && !deleted {
                let mut record = form.instance().clone();
                if let Some(parent_id) = &parent.id {
                    record.set_reference(&self.fk_name, parent_id);
                }
                record.touch(user_id);
                tx.save_record(&mut record).await?;
                *form.instance_mut() = record.clone();
                saved.push(SavedRow::Added { index, record });
            }
        }

        Ok(saved)
    }
}

impl FormSet for InlineFormSet {
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

    fn is_deleted(&self, index: usize) -> bool {
        self.deleted.get(index).copied().unwrap_or(false)
    }
}
