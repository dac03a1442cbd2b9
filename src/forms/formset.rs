use crate::forms::form::{FormView, ModelForm};
use crate::model::{QueryDict, Record};
use serde::Serialize;

pub const TOTAL_FORM_COUNT: &str = "TOTAL_FORMS";
pub const INITIAL_FORM_COUNT: &str = "INITIAL_FORMS";
pub const DELETION_FIELD_NAME: &str = "DELETE";
pub const MANAGEMENT_FORM_MISSING: &str = "ManagementForm data is missing or has been tampered with.";

/// Bookkeeping fields every bound form set submits next to its forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagementForm {
    pub total_forms: usize,
    pub initial_forms: usize,
}

impl ManagementForm {
    pub fn read(prefix: &str, data: &QueryDict) -> Result<Self, String> {
        let read_count = |name: &str| {
            data.get(&format!("{}-{}", prefix, name))
                .and_then(|raw| raw.trim().parse::<usize>().ok())
        };
        match (read_count(TOTAL_FORM_COUNT), read_count(INITIAL_FORM_COUNT)) {
            (Some(total_forms), Some(initial_forms)) => Ok(Self {
                total_forms,
                initial_forms,
            }),
            _ => Err(MANAGEMENT_FORM_MISSING.to_string()),
        }
    }

    /// The submitted key/value pairs for this management form
    pub fn to_data(&self, prefix: &str) -> QueryDict {
        QueryDict::new()
            .with(format!("{}-{}", prefix, TOTAL_FORM_COUNT), self.total_forms.to_string())
            .with(format!("{}-{}", prefix, INITIAL_FORM_COUNT), self.initial_forms.to_string())
    }
}

/// Prefix of the form at `index` inside a form set
pub fn form_prefix(prefix: &str, index: usize) -> String {
    format!("{}-{}", prefix, index)
}

/// How one form of a form set ended up after a save
#[derive(Debug, Clone, PartialEq)]
pub enum SavedRow {
    Added { index: usize, record: Record },
    Changed { index: usize, record: Record, fields: Vec<String> },
    Deleted { index: usize, record: Record },
}

impl SavedRow {
    pub fn index(&self) -> usize {
        match self {
            SavedRow::Added { index, .. } | SavedRow::Changed { index, .. } | SavedRow::Deleted { index, .. } => {
                *index
            }
        }
    }

    pub fn record(&self) -> &Record {
        match self {
            SavedRow::Added { record, .. } | SavedRow::Changed { record, .. } | SavedRow::Deleted { record, .. } => {
                record
            }
        }
    }
}

/// A collection of forms editing rows of one child entity
pub trait FormSet: Send + Sync {
    fn prefix(&self) -> &str;
    fn forms(&self) -> &[ModelForm];
    fn is_bound(&self) -> bool;
    fn non_form_errors(&self) -> &[String];
    fn management_form(&self) -> ManagementForm;

    /// Whether the form at `index` was marked for deletion
    fn is_deleted(&self, _index: usize) -> bool {
        false
    }

    fn is_valid(&self) -> bool {
        if !self.is_bound() || !self.non_form_errors().is_empty() {
            return false;
        }
        self.forms()
            .iter()
            .enumerate()
            .all(|(index, form)| self.is_deleted(index) || form.is_valid())
    }

    fn total_error_count(&self) -> usize {
        self.non_form_errors().len()
            + self
                .forms()
                .iter()
                .enumerate()
                .filter(|(index, _)| !self.is_deleted(*index))
                .map(|(_, form)| form.error_count())
                .sum::<usize>()
    }

    fn view(&self) -> FormSetView {
        FormSetView {
            prefix: self.prefix().to_string(),
            management_form: self.management_form(),
            forms: self.forms().iter().map(ModelForm::view).collect(),
            non_form_errors: self.non_form_errors().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSetView {
    pub prefix: String,
    pub management_form: ManagementForm,
    pub forms: Vec<FormView>,
    pub non_form_errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_management_form_round_trip_through_data() {
        let form = ManagementForm {
            total_forms: 2,
            initial_forms: 1,
        };
        let data = form.to_data("phone_set");
        assert_eq!(data.get("phone_set-TOTAL_FORMS"), Some("2"));
        assert_eq!(ManagementForm::read("phone_set", &data), Ok(form));
    }

    #[test]
    fn test_missing_management_form() {
        let data = QueryDict::new().with("phone_set-TOTAL_FORMS", "1");
        assert_eq!(
            ManagementForm::read("phone_set", &data),
            Err(MANAGEMENT_FORM_MISSING.to_string())
        );
    }
}
