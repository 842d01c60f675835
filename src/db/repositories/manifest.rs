//! Manifest repository

use crate::config::DatabaseDriver;
use crate::db::{mysql, sqlite, DynDatabasePool};
use crate::models::Manifest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ManifestRepository: Send + Sync {
    /// Insert a manifest, or update the one with the same identifier
    async fn upsert(&self, manifest: &Manifest) -> Result<Manifest>;
    async fn find(&self, identifier: &str) -> Result<Option<Manifest>>;
    /// All manifests by order values, then identifier
    async fn list(&self) -> Result<Vec<Manifest>>;
}

pub struct SqlxManifestRepository {
    pool: DynDatabasePool,
}

impl SqlxManifestRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ManifestRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ManifestRepository for SqlxManifestRepository {
    async fn upsert(&self, manifest: &Manifest) -> Result<Manifest> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPSERT_SQLITE)
                    .bind(&manifest.identifier)
                    .bind(&manifest.title)
                    .bind(&manifest.file_name)
                    .bind(&manifest.manifest_uri)
                    .bind(&manifest.order_value_1)
                    .bind(&manifest.order_value_2)
                    .bind(manifest.created_at)
                    .execute(sqlite(&self.pool)?)
                    .await
                    .context("Failed to save manifest")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPSERT_MYSQL)
                    .bind(&manifest.identifier)
                    .bind(&manifest.title)
                    .bind(&manifest.file_name)
                    .bind(&manifest.manifest_uri)
                    .bind(&manifest.order_value_1)
                    .bind(&manifest.order_value_2)
                    .bind(manifest.created_at)
                    .execute(mysql(&self.pool)?)
                    .await
                    .context("Failed to save manifest")?;
            }
        }
        self.find(&manifest.identifier)
            .await?
            .with_context(|| format!("Manifest {} missing after save", manifest.identifier))
    }

    async fn find(&self, identifier: &str) -> Result<Option<Manifest>> {
        let sql = format!("{} WHERE identifier = ?", SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(identifier)
                    .fetch_optional(sqlite(&self.pool)?)
                    .await
                    .context("Failed to find manifest")?;
                Ok(row.as_ref().map(row_to_manifest_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(identifier)
                    .fetch_optional(mysql(&self.pool)?)
                    .await
                    .context("Failed to find manifest")?;
                Ok(row.as_ref().map(row_to_manifest_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Manifest>> {
        let sql = format!("{} ORDER BY order_value_1, order_value_2, identifier", SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to list manifests")?;
                Ok(rows.iter().map(row_to_manifest_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to list manifests")?;
                Ok(rows.iter().map(row_to_manifest_mysql).collect())
            }
        }
    }
}

const UPSERT_SQLITE: &str = r#"
    INSERT INTO manifests (identifier, title, file_name, manifest_uri, order_value_1, order_value_2, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(identifier) DO UPDATE SET
        title = excluded.title,
        file_name = excluded.file_name,
        manifest_uri = excluded.manifest_uri,
        order_value_1 = excluded.order_value_1,
        order_value_2 = excluded.order_value_2
"#;

const UPSERT_MYSQL: &str = r#"
    INSERT INTO manifests (identifier, title, file_name, manifest_uri, order_value_1, order_value_2, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON DUPLICATE KEY UPDATE
        title = VALUES(title),
        file_name = VALUES(file_name),
        manifest_uri = VALUES(manifest_uri),
        order_value_1 = VALUES(order_value_1),
        order_value_2 = VALUES(order_value_2)
"#;

const SELECT: &str = "SELECT id, identifier, title, file_name, manifest_uri, order_value_1, order_value_2, created_at FROM manifests";

fn row_to_manifest_sqlite(row: &sqlx::sqlite::SqliteRow) -> Manifest {
    Manifest {
        id: row.get("id"),
        identifier: row.get("identifier"),
        title: row.get("title"),
        file_name: row.get("file_name"),
        manifest_uri: row.get("manifest_uri"),
        order_value_1: row.get("order_value_1"),
        order_value_2: row.get("order_value_2"),
        created_at: row.get("created_at"),
    }
}

fn row_to_manifest_mysql(row: &sqlx::mysql::MySqlRow) -> Manifest {
    Manifest {
        id: row.get("id"),
        identifier: row.get("identifier"),
        title: row.get("title"),
        file_name: row.get("file_name"),
        manifest_uri: row.get("manifest_uri"),
        order_value_1: row.get("order_value_1"),
        order_value_2: row.get("order_value_2"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn repo() -> SqlxManifestRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxManifestRepository::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_updates_by_identifier() {
        let repo = repo().await;
        let first = repo
            .upsert(&Manifest::new("1900-02", "Issue 2", "news_1900_02.json", "https://iiif.example.org/2").with_order("1900", "02"))
            .await
            .unwrap();
        assert!(first.id > 0);
        repo.upsert(&Manifest::new("1900-01", "Issue 1", "news_1900_01.json", "https://iiif.example.org/1").with_order("1900", "01"))
            .await
            .unwrap();

        let renamed = repo
            .upsert(&Manifest::new("1900-02", "Issue 2 (revised)", "news_1900_02.json", "https://iiif.example.org/2").with_order("1900", "02"))
            .await
            .unwrap();
        assert_eq!(renamed.id, first.id);
        assert_eq!(renamed.title, "Issue 2 (revised)");

        let all = repo.list().await.unwrap();
        let identifiers: Vec<&str> = all.iter().map(|m| m.identifier.as_str()).collect();
        assert_eq!(identifiers, ["1900-01", "1900-02"]);
        assert!(repo.find("1901-01").await.unwrap().is_none());
    }
}
