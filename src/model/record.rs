use crate::model::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default user for rows written before audit fields existed
fn default_user() -> String {
    "legacy-user".to_string()
}

/// Default timestamp for rows written before audit fields existed
fn default_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}

/// A row of some entity type. `id` stays `None` until the store saves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: Option<Id>,
    pub entity: String,
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,

    #[serde(default = "default_user")]
    pub created_by: String,
    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_user")]
    pub updated_by: String,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(entity: &str) -> Self {
        Self {
            id: None,
            entity: entity.to_string(),
            values: BTreeMap::new(),
            created_by: default_user(),
            created_at: default_timestamp(),
            updated_by: default_user(),
            updated_at: default_timestamp(),
        }
    }

    pub fn with_id(entity: &str, id: &str) -> Self {
        let mut record = Self::new(entity);
        record.id = Some(id.to_string());
        record
    }

    pub fn with_value(mut self, field: &str, value: serde_json::Value) -> Self {
        self.set(field, value);
        self
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: &str, value: serde_json::Value) {
        self.values.insert(field.to_string(), value);
    }

    /// Key stored in a single-valued reference field, if one is set
    pub fn reference(&self, field: &str) -> Option<Id> {
        match self.values.get(field) {
            Some(serde_json::Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn set_reference(&mut self, field: &str, id: &Id) {
        self.set(field, serde_json::Value::String(id.clone()));
    }

    /// Stamp audit fields before a write
    pub fn touch(&mut self, user_id: &str) {
        let now = Utc::now();
        if self.is_new() {
            self.created_by = user_id.to_string();
            self.created_at = now;
        }
        self.updated_by = user_id.to_string();
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_reads_string_and_number_keys() {
        let record = Record::new("Person")
            .with_value("home", json!("a-1"))
            .with_value("work", json!(7))
            .with_value("blank", json!(""))
            .with_value("none", json!(null));

        assert_eq!(record.reference("home"), Some("a-1".to_string()));
        assert_eq!(record.reference("work"), Some("7".to_string()));
        assert_eq!(record.reference("blank"), None);
        assert_eq!(record.reference("none"), None);
        assert_eq!(record.reference("missing"), None);
    }

    #[test]
    fn test_touch_only_sets_created_on_new_rows() {
        let mut record = Record::with_id("Person", "p1");
        record.touch("editor");
        assert_eq!(record.created_by, "legacy-user");
        assert_eq!(record.updated_by, "editor");

        let mut fresh = Record::new("Person");
        fresh.touch("editor");
        assert_eq!(fresh.created_by, "editor");
    }
}
