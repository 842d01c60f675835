//! Database migrations
//!
//! Migrations are embedded in the binary as SQL for both drivers and applied
//! in version order. Applied versions are tracked in `_migrations`.

use anyhow::{Context, Result};
use sqlx::Row;

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A schema change with SQL for SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique, ascending version
    pub version: i32,
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_mysql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_search_statistics",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS search_statistics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_config VARCHAR(100) NOT NULL,
                search_term VARCHAR(255) NOT NULL DEFAULT '',
                search_query TEXT NOT NULL,
                search_no_results INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_search_statistics_config ON search_statistics(search_config);
            CREATE INDEX IF NOT EXISTS idx_search_statistics_created_at ON search_statistics(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS search_statistics (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                search_config VARCHAR(100) NOT NULL,
                search_term VARCHAR(255) NOT NULL DEFAULT '',
                search_query TEXT NOT NULL,
                search_no_results BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_search_statistics_config ON search_statistics(search_config);
            CREATE INDEX idx_search_statistics_created_at ON search_statistics(created_at);
        "#,
    },
    Migration {
        version: 2,
        name: "create_corrections",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS corrections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_config VARCHAR(100) NOT NULL,
                record_id VARCHAR(255) NOT NULL,
                note TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_corrections_record ON corrections(search_config, record_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS corrections (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                search_config VARCHAR(100) NOT NULL,
                record_id VARCHAR(255) NOT NULL,
                note TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_corrections_record ON corrections(search_config, record_id);
        "#,
    },
    Migration {
        version: 3,
        name: "create_manifests",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS manifests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier VARCHAR(100) NOT NULL UNIQUE,
                title TEXT NOT NULL,
                file_name VARCHAR(255) NOT NULL,
                manifest_uri TEXT NOT NULL,
                order_value_1 VARCHAR(100) NOT NULL DEFAULT '',
                order_value_2 VARCHAR(100) NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS manifests (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                identifier VARCHAR(100) NOT NULL UNIQUE,
                title TEXT NOT NULL,
                file_name VARCHAR(255) NOT NULL,
                manifest_uri TEXT NOT NULL,
                order_value_1 VARCHAR(100) NOT NULL DEFAULT '',
                order_value_2 VARCHAR(100) NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
];

/// Apply all pending migrations; returns how many ran
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;

    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }
    Ok(count)
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;
    Ok(MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)).count())
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let version_type = match pool.driver() {
        DatabaseDriver::Sqlite => "INTEGER",
        DatabaseDriver::Mysql => "INT",
    };
    pool.execute(&format!(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version {} PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        version_type
    ))
    .await?;
    Ok(())
}

async fn applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    const SQL: &str = "SELECT version FROM _migrations ORDER BY version";
    let versions = match pool.driver() {
        DatabaseDriver::Sqlite => sqlx::query(SQL)
            .fetch_all(super::sqlite(pool)?)
            .await?
            .iter()
            .map(|row| row.get::<i64, _>("version") as i32)
            .collect(),
        DatabaseDriver::Mysql => sqlx::query(SQL)
            .fetch_all(super::mysql(pool)?)
            .await?
            .iter()
            .map(|row| row.get::<i32, _>("version"))
            .collect(),
    };
    Ok(versions)
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };
    for statement in split_sql_statements(sql) {
        pool.execute(statement)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    pool.execute(&format!(
        "INSERT INTO _migrations (version, name) VALUES ({}, '{}')",
        migration.version, migration.name
    ))
    .await?;
    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((end, _)) => format!("{}...", &sql[..end]),
        None => sql.to_string(),
    }
}

/// Statements of a migration, skipping empty and comment-only parts
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_comment_only(s))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations_once() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());

        let applied = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(pending_count(&pool).await.unwrap(), 0);

        assert_eq!(run_migrations(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let affected = pool
            .execute("INSERT INTO search_statistics (search_config, search_query) VALUES ('letters', 'q')")
            .await
            .unwrap();
        assert_eq!(affected, 1);
        let affected = pool
            .execute("INSERT INTO corrections (search_config, record_id) VALUES ('letters', '42')")
            .await
            .unwrap();
        assert_eq!(affected, 1);
        let affected = pool
            .execute(
                "INSERT INTO manifests (identifier, title, file_name, manifest_uri) \
                 VALUES ('1900-01', 'Issue 1', 'issue_1900_01.json', 'https://iiif.example.org/1')",
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }

    #[test]
    fn test_versions_ascend() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn test_split_sql_statements() {
        let statements = split_sql_statements("CREATE TABLE a (id INT); CREATE TABLE b (id INT);");
        assert_eq!(statements, vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]);

        let statements = split_sql_statements("-- Comment\nCREATE TABLE a (id INT);\n-- trailing");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- a\n-- b"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
