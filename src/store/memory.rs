use crate::model::{generate_id, Id, Record};
use crate::store::traits::{QueryScope, RecordQuery, RecordStore, StoreTransaction};
use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A write call observed by the store, in call order
#[derive(Debug, Clone, PartialEq)]
pub enum WriteEvent {
    /// Snapshot of the record as passed to `save_record`, id already assigned
    Saved(Record),
    Deleted { entity: String, id: Id },
    Committed,
    RolledBack,
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<(String, Id), Record>,
    journal: Vec<WriteEvent>,
    failing_entities: Vec<String>,
}

/// In-process store. Writes are staged per transaction and applied on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a committed row directly, bypassing transactions
    pub fn insert(&self, mut record: Record) -> Record {
        let id = record.id.get_or_insert_with(generate_id).clone();
        self.state
            .write()
            .rows
            .insert((record.entity.clone(), id), record.clone());
        record
    }

    /// Make every later `save_record` for `entity` fail
    pub fn fail_saves_for(&self, entity: &str) {
        self.state.write().failing_entities.push(entity.to_string());
    }

    pub fn count(&self, entity: &str) -> usize {
        self.state
            .read()
            .rows
            .keys()
            .filter(|(e, _)| e == entity)
            .count()
    }

    pub fn total_rows(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn get(&self, entity: &str, id: &Id) -> Option<Record> {
        self.state
            .read()
            .rows
            .get(&(entity.to_string(), id.clone()))
            .cloned()
    }

    pub fn journal(&self) -> Vec<WriteEvent> {
        self.state.read().journal.clone()
    }

    /// Records passed to `save_record`, in call order
    pub fn save_calls(&self) -> Vec<Record> {
        self.state
            .read()
            .journal
            .iter()
            .filter_map(|event| match event {
                WriteEvent::Saved(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }
}

fn matches_scope(record: &Record, scope: &QueryScope) -> bool {
    match scope {
        QueryScope::All => true,
        QueryScope::ByPk(id) => record.id.as_ref() == Some(id),
        QueryScope::ByField { field, value } => match (record.get(field), value) {
            (Some(stored), expected) if stored == expected => true,
            // Keys are compared by their text form so "7" finds 7
            (Some(serde_json::Value::Number(n)), serde_json::Value::String(s)) => n.to_string() == *s,
            (Some(serde_json::Value::String(s)), serde_json::Value::Number(n)) => n.to_string() == *s,
            _ => false,
        },
        QueryScope::Nothing => false,
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn get_record(&self, entity: &str, id: &Id) -> Result<Option<Record>> {
        Ok(self.get(entity, id))
    }

    async fn filter_records(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        if query.scope == QueryScope::Nothing {
            return Ok(Vec::new());
        }
        let state = self.state.read();
        Ok(state
            .rows
            .iter()
            .filter(|((entity, _), record)| *entity == query.entity && matches_scope(record, &query.scope))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
        }))
    }
}

#[derive(Debug)]
enum Staged {
    Save(Record),
    Delete { entity: String, id: Id },
}

#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<RwLock<MemoryState>>,
    staged: Vec<Staged>,
}

#[async_trait::async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn save_record(&mut self, record: &mut Record) -> Result<()> {
        let mut state = self.state.write();
        if state.failing_entities.contains(&record.entity) {
            return Err(anyhow!("Failed to save {} record", record.entity));
        }
        if record.id.is_none() {
            record.id = Some(generate_id());
        }
        state.journal.push(WriteEvent::Saved(record.clone()));
        self.staged.push(Staged::Save(record.clone()));
        Ok(())
    }

    async fn delete_record(&mut self, entity: &str, id: &Id) -> Result<bool> {
        let mut state = self.state.write();
        let exists = state.rows.contains_key(&(entity.to_string(), id.clone()));
        state.journal.push(WriteEvent::Deleted {
            entity: entity.to_string(),
            id: id.clone(),
        });
        self.staged.push(Staged::Delete {
            entity: entity.to_string(),
            id: id.clone(),
        });
        Ok(exists)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { state, staged } = *self;
        let mut state = state.write();
        for staged in staged {
            match staged {
                Staged::Save(record) => {
                    let id = record.id.clone().ok_or_else(|| anyhow!("Staged record has no id"))?;
                    state.rows.insert((record.entity.clone(), id), record);
                }
                Staged::Delete { entity, id } => {
                    state.rows.remove(&(entity, id));
                }
            }
        }
        state.journal.push(WriteEvent::Committed);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.state.write().journal.push(WriteEvent::RolledBack);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let mut record = Record::new("Address").with_value("street", json!("Main St"));
        tx.save_record(&mut record).await.unwrap();
        assert!(record.id.is_some());
        assert_eq!(store.count("Address"), 0);

        tx.commit().await.unwrap();
        assert_eq!(store.count("Address"), 1);
        let stored = store.get("Address", record.id.as_ref().unwrap()).unwrap();
        assert_eq!(stored.get("street"), Some(&json!("Main St")));
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let store = MemoryStore::new();
        let existing = store.insert(Record::new("Address"));

        let mut tx = store.begin().await.unwrap();
        let mut record = Record::new("Address");
        tx.save_record(&mut record).await.unwrap();
        tx.delete_record("Address", existing.id.as_ref().unwrap()).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.count("Address"), 1);
        assert_eq!(store.journal().last(), Some(&WriteEvent::RolledBack));
    }

    #[tokio::test]
    async fn test_filter_scopes() {
        let store = MemoryStore::new();
        let a = store.insert(Record::with_id("Phone", "1").with_value("person", json!("p1")));
        store.insert(Record::with_id("Phone", "2").with_value("person", json!("p2")));

        let by_pk = store
            .filter_records(&RecordQuery::by_pk("Phone", &"1".to_string()))
            .await
            .unwrap();
        assert_eq!(by_pk, vec![a.clone()]);

        let by_field = store
            .filter_records(&RecordQuery::by_field("Phone", "person", json!("p1")))
            .await
            .unwrap();
        assert_eq!(by_field, vec![a]);

        let nothing = store.filter_records(&RecordQuery::none("Phone")).await.unwrap();
        assert!(nothing.is_empty());

        let all = store.filter_records(&RecordQuery::all("Phone")).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_entity_rejects_saves() {
        let store = MemoryStore::new();
        store.fail_saves_for("Person");
        let mut tx = store.begin().await.unwrap();
        let mut record = Record::new("Person");
        assert!(tx.save_record(&mut record).await.is_err());
        assert!(record.id.is_none());
    }
}
