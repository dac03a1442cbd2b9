use serde::{Deserialize, Serialize};

/// One entry of a structured change message stored with an audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeEntry {
    Added {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        object: Option<String>,
    },
    Changed {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        object: Option<String>,
        fields: Vec<String>,
    },
    Deleted {
        name: String,
        object: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeMessage(pub Vec<ChangeEntry>);

impl ChangeMessage {
    pub fn push(&mut self, entry: ChangeEntry) {
        self.0.push(entry);
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}
