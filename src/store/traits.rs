use crate::model::{Id, Record};
use anyhow::Result;

/// Which rows of an entity a query selects
#[derive(Debug, Clone, PartialEq)]
pub enum QueryScope {
    All,
    ByPk(Id),
    ByField { field: String, value: serde_json::Value },
    /// Matches no row at all
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub entity: String,
    pub scope: QueryScope,
}

impl RecordQuery {
    pub fn by_pk(entity: &str, id: &Id) -> Self {
        Self {
            entity: entity.to_string(),
            scope: QueryScope::ByPk(id.clone()),
        }
    }

    pub fn by_field(entity: &str, field: &str, value: serde_json::Value) -> Self {
        Self {
            entity: entity.to_string(),
            scope: QueryScope::ByField {
                field: field.to_string(),
                value,
            },
        }
    }

    pub fn none(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            scope: QueryScope::Nothing,
        }
    }

    pub fn all(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            scope: QueryScope::All,
        }
    }
}

/// Read side of the persistence layer plus the entry point to a write scope
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a record by primary key
    async fn get_record(&self, entity: &str, id: &Id) -> Result<Option<Record>>;
    /// List records matching a query, ordered by primary key
    async fn filter_records(&self, query: &RecordQuery) -> Result<Vec<Record>>;
    /// Open a write scope; nothing written through it is visible until commit
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// A scoped write transaction. Dropping it without `commit` discards every
/// write made through it.
#[async_trait::async_trait]
pub trait StoreTransaction: Send {
    /// Insert or update a record, assigning a fresh id to new rows
    async fn save_record(&mut self, record: &mut Record) -> Result<()>;
    async fn delete_record(&mut self, entity: &str, id: &Id) -> Result<bool>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}
