//! Search statistics repository

use crate::config::DatabaseDriver;
use crate::db::{mysql, sqlite, DynDatabasePool};
use crate::models::SearchStatisticEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Number of searches run against one search configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchCount {
    pub search_config: String,
    pub searches: i64,
    /// Searches that returned no results
    pub empty_searches: i64,
}

#[async_trait]
pub trait StatisticsRepository: Send + Sync {
    async fn create(&self, entry: &SearchStatisticEntry) -> Result<SearchStatisticEntry>;
    /// Latest entries first
    async fn list_recent(&self, limit: i64) -> Result<Vec<SearchStatisticEntry>>;
    async fn count_by_config(&self) -> Result<Vec<SearchCount>>;
}

pub struct SqlxStatisticsRepository {
    pool: DynDatabasePool,
}

impl SqlxStatisticsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StatisticsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl StatisticsRepository for SqlxStatisticsRepository {
    async fn create(&self, entry: &SearchStatisticEntry) -> Result<SearchStatisticEntry> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite(&self.pool)?, entry).await,
            DatabaseDriver::Mysql => create_mysql(mysql(&self.pool)?, entry).await,
        }
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<SearchStatisticEntry>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_recent_sqlite(sqlite(&self.pool)?, limit).await,
            DatabaseDriver::Mysql => list_recent_mysql(mysql(&self.pool)?, limit).await,
        }
    }

    async fn count_by_config(&self) -> Result<Vec<SearchCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_by_config_sqlite(sqlite(&self.pool)?).await,
            DatabaseDriver::Mysql => count_by_config_mysql(mysql(&self.pool)?).await,
        }
    }
}

const INSERT: &str = "INSERT INTO search_statistics (search_config, search_term, search_query, search_no_results, created_at) VALUES (?, ?, ?, ?, ?)";
const SELECT_RECENT: &str = "SELECT id, search_config, search_term, search_query, search_no_results, created_at FROM search_statistics ORDER BY created_at DESC, id DESC LIMIT ?";
const COUNT_BY_CONFIG: &str = "SELECT search_config, COUNT(*) AS searches, SUM(CASE WHEN search_no_results = 0 THEN 1 ELSE 0 END) AS empty_searches FROM search_statistics GROUP BY search_config ORDER BY searches DESC, search_config";

// SQLite implementations
async fn create_sqlite(pool: &SqlitePool, entry: &SearchStatisticEntry) -> Result<SearchStatisticEntry> {
    let result = sqlx::query(INSERT)
        .bind(&entry.search_config)
        .bind(&entry.search_term)
        .bind(&entry.search_query)
        .bind(entry.search_no_results)
        .bind(entry.created_at)
        .execute(pool)
        .await
        .context("Failed to record search statistic")?;

    Ok(SearchStatisticEntry {
        id: result.last_insert_rowid(),
        ..entry.clone()
    })
}

async fn list_recent_sqlite(pool: &SqlitePool, limit: i64) -> Result<Vec<SearchStatisticEntry>> {
    let rows = sqlx::query(SELECT_RECENT)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list search statistics")?;
    Ok(rows
        .iter()
        .map(|row| SearchStatisticEntry {
            id: row.get("id"),
            search_config: row.get("search_config"),
            search_term: row.get("search_term"),
            search_query: row.get("search_query"),
            search_no_results: row.get("search_no_results"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn count_by_config_sqlite(pool: &SqlitePool) -> Result<Vec<SearchCount>> {
    let rows = sqlx::query(COUNT_BY_CONFIG)
        .fetch_all(pool)
        .await
        .context("Failed to count searches")?;
    Ok(rows
        .iter()
        .map(|row| SearchCount {
            search_config: row.get("search_config"),
            searches: row.get("searches"),
            empty_searches: row.get("empty_searches"),
        })
        .collect())
}

// MySQL implementations
async fn create_mysql(pool: &MySqlPool, entry: &SearchStatisticEntry) -> Result<SearchStatisticEntry> {
    let result = sqlx::query(INSERT)
        .bind(&entry.search_config)
        .bind(&entry.search_term)
        .bind(&entry.search_query)
        .bind(entry.search_no_results)
        .bind(entry.created_at)
        .execute(pool)
        .await
        .context("Failed to record search statistic")?;

    Ok(SearchStatisticEntry {
        id: result.last_insert_id() as i64,
        ..entry.clone()
    })
}

async fn list_recent_mysql(pool: &MySqlPool, limit: i64) -> Result<Vec<SearchStatisticEntry>> {
    let rows = sqlx::query(SELECT_RECENT)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list search statistics")?;
    Ok(rows
        .iter()
        .map(|row| SearchStatisticEntry {
            id: row.get("id"),
            search_config: row.get("search_config"),
            search_term: row.get("search_term"),
            search_query: row.get("search_query"),
            search_no_results: row.get("search_no_results"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn count_by_config_mysql(pool: &MySqlPool) -> Result<Vec<SearchCount>> {
    // SUM over an integer expression is DECIMAL in MySQL
    let rows = sqlx::query(
        "SELECT search_config, COUNT(*) AS searches, CAST(SUM(CASE WHEN search_no_results = 0 THEN 1 ELSE 0 END) AS SIGNED) AS empty_searches FROM search_statistics GROUP BY search_config ORDER BY searches DESC, search_config",
    )
    .fetch_all(pool)
    .await
    .context("Failed to count searches")?;
    Ok(rows
        .iter()
        .map(|row| SearchCount {
            search_config: row.get("search_config"),
            searches: row.get("searches"),
            empty_searches: row.get("empty_searches"),
        })
        .collect())
}
