//! Correction mark repository

use crate::config::DatabaseDriver;
use crate::db::{mysql, sqlite, DynDatabasePool};
use crate::models::Correction;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CorrectionRepository: Send + Sync {
    async fn create(&self, correction: &Correction) -> Result<Correction>;
    async fn list_for_record(&self, search_config: &str, record_id: &str) -> Result<Vec<Correction>>;
    async fn list(&self, limit: i64) -> Result<Vec<Correction>>;
}

pub struct SqlxCorrectionRepository {
    pool: DynDatabasePool,
}

impl SqlxCorrectionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CorrectionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CorrectionRepository for SqlxCorrectionRepository {
    async fn create(&self, correction: &Correction) -> Result<Correction> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT)
                .bind(&correction.search_config)
                .bind(&correction.record_id)
                .bind(&correction.note)
                .bind(correction.created_at)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to create correction")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT)
                .bind(&correction.search_config)
                .bind(&correction.record_id)
                .bind(&correction.note)
                .bind(correction.created_at)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to create correction")?
                .last_insert_id() as i64,
        };
        Ok(Correction {
            id,
            ..correction.clone()
        })
    }

    async fn list_for_record(&self, search_config: &str, record_id: &str) -> Result<Vec<Correction>> {
        let sql = format!(
            "{} WHERE search_config = ? AND record_id = ? ORDER BY created_at DESC, id DESC",
            SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(search_config)
                    .bind(record_id)
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to list corrections")?;
                Ok(rows.iter().map(row_to_correction_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(search_config)
                    .bind(record_id)
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to list corrections")?;
                Ok(rows.iter().map(row_to_correction_mysql).collect())
            }
        }
    }

    async fn list(&self, limit: i64) -> Result<Vec<Correction>> {
        let sql = format!("{} ORDER BY created_at DESC, id DESC LIMIT ?", SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(sqlite(&self.pool)?, &sql, limit).await,
            DatabaseDriver::Mysql => list_mysql(mysql(&self.pool)?, &sql, limit).await,
        }
    }
}

const INSERT: &str =
    "INSERT INTO corrections (search_config, record_id, note, created_at) VALUES (?, ?, ?, ?)";
const SELECT: &str = "SELECT id, search_config, record_id, note, created_at FROM corrections";

async fn list_sqlite(pool: &SqlitePool, sql: &str, limit: i64) -> Result<Vec<Correction>> {
    let rows = sqlx::query(sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list corrections")?;
    Ok(rows.iter().map(row_to_correction_sqlite).collect())
}

fn row_to_correction_sqlite(row: &sqlx::sqlite::SqliteRow) -> Correction {
    Correction {
        id: row.get("id"),
        search_config: row.get("search_config"),
        record_id: row.get("record_id"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    }
}

async fn list_mysql(pool: &MySqlPool, sql: &str, limit: i64) -> Result<Vec<Correction>> {
    let rows = sqlx::query(sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list corrections")?;
    Ok(rows.iter().map(row_to_correction_mysql).collect())
}

fn row_to_correction_mysql(row: &sqlx::mysql::MySqlRow) -> Correction {
    Correction {
        id: row.get("id"),
        search_config: row.get("search_config"),
        record_id: row.get("record_id"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn repo() -> SqlxCorrectionRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxCorrectionRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_list_for_record() {
        let repo = repo().await;
        let created = repo
            .create(&Correction::new("letters", "42", Some("wrong date".to_string())))
            .await
            .unwrap();
        assert!(created.id > 0);
        repo.create(&Correction::new("letters", "7", None)).await.unwrap();
        repo.create(&Correction::new("maps", "42", None)).await.unwrap();

        let marks = repo.list_for_record("letters", "42").await.unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].note.as_deref(), Some("wrong date"));

        assert_eq!(repo.list(10).await.unwrap().len(), 3);
        assert_eq!(repo.list(2).await.unwrap().len(), 2);
    }
}
