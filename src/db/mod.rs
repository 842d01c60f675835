//! Database layer
//!
//! Search statistics and correction marks are stored in SQLite (default) or
//! MySQL, selected by configuration.
//!
//! ```ignore
//! use ndr_core::config::DatabaseConfig;
//! use ndr_core::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

use anyhow::{Context, Result};
use sqlx::{MySqlPool, SqlitePool};

pub use pool::{
    create_pool, create_test_pool, sqlite_connection_url, sqlite_file_path, DatabasePool, DynDatabasePool,
    MysqlDatabase, SqliteDatabase,
};

/// The SQLite pool behind `pool`
pub(crate) fn sqlite(pool: &DynDatabasePool) -> Result<&SqlitePool> {
    pool.as_sqlite().context("Database pool is not SQLite")
}

/// The MySQL pool behind `pool`
pub(crate) fn mysql(pool: &DynDatabasePool) -> Result<&MySqlPool> {
    pool.as_mysql().context("Database pool is not MySQL")
}
