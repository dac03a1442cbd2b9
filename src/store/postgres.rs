use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, Row, Transaction};
use std::collections::BTreeMap;

use crate::model::{generate_id, Id, Record};
use crate::store::traits::{QueryScope, RecordQuery, RecordStore, StoreTransaction};

const SELECT_COLUMNS: &str =
    "SELECT entity, id, data, created_by, created_at, updated_by, updated_at FROM admin_records";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the record table if it does not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admin_records (
                entity TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_by TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_by TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (entity, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create admin_records table")?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Record {
    let Json(values): Json<BTreeMap<String, serde_json::Value>> = row.get("data");
    let id: String = row.get("id");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Record {
        id: Some(id),
        entity: row.get("entity"),
        values,
        created_by: row.get("created_by"),
        created_at,
        updated_by: row.get("updated_by"),
        updated_at,
    }
}

/// Text form of a JSON value as `data->>'field'` would yield it
fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl RecordStore for PostgresStore {
    async fn get_record(&self, entity: &str, id: &Id) -> Result<Option<Record>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE entity = $1 AND id = $2"))
            .bind(entity)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch record")?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn filter_records(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        let rows = match &query.scope {
            QueryScope::Nothing => return Ok(Vec::new()),
            QueryScope::All => {
                sqlx::query(&format!("{SELECT_COLUMNS} WHERE entity = $1 ORDER BY id"))
                    .bind(&query.entity)
                    .fetch_all(&self.pool)
                    .await
            }
            QueryScope::ByPk(id) => {
                sqlx::query(&format!("{SELECT_COLUMNS} WHERE entity = $1 AND id = $2"))
                    .bind(&query.entity)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await
            }
            QueryScope::ByField { field, value } => {
                sqlx::query(&format!(
                    "{SELECT_COLUMNS} WHERE entity = $1 AND data->>$2 = $3 ORDER BY id"
                ))
                .bind(&query.entity)
                .bind(field)
                .bind(json_text(value))
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to filter records")?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// Wraps a pooled sqlx transaction; sqlx rolls back on drop
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn save_record(&mut self, record: &mut Record) -> Result<()> {
        let id = record.id.get_or_insert_with(generate_id).clone();

        sqlx::query(
            r#"
            INSERT INTO admin_records (entity, id, data, created_by, created_at, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (entity, id) DO UPDATE SET
                data = EXCLUDED.data,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.entity)
        .bind(&id)
        .bind(Json(&record.values))
        .bind(&record.created_by)
        .bind(record.created_at)
        .bind(&record.updated_by)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to save {} record {}", record.entity, id))?;

        Ok(())
    }

    async fn delete_record(&mut self, entity: &str, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM admin_records WHERE entity = $1 AND id = $2")
            .bind(entity)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete record")?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("Failed to roll back transaction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_text_matches_postgres_text_operator() {
        assert_eq!(json_text(&json!("abc")), "abc");
        assert_eq!(json_text(&json!(42)), "42");
        assert_eq!(json_text(&json!(true)), "true");
    }
}
