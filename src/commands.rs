//! Command line lifecycle commands
//!
//! - `init`: write a default configuration and create the database directory
//! - `clean`: delete the SQLite database after confirmation
//! - `import-manifests <dir>`: record IIIF manifest files for the source viewer

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::{Component, Path, PathBuf};

use crate::config::{default_config_yaml, Config, DatabaseConfig, DatabaseDriver};
use crate::db::{self, repositories::SqlxManifestRepository, sqlite_file_path};
use crate::services::{ImportReport, ManifestService};

/// Text `clean` asks for before deleting anything
pub const CONFIRMATION: &str = "YES_DELETE";

/// Write the default configuration to `config_path` unless it exists.
///
/// Returns whether a file was written.
pub fn write_default_config(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        tracing::info!("{} already exists, keeping it", config_path.display());
        return Ok(false);
    }
    std::fs::write(config_path, default_config_yaml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    tracing::info!("Wrote default configuration to {}", config_path.display());
    Ok(true)
}

/// Create the directory the SQLite database lives in
pub fn prepare_data_dir(database: &DatabaseConfig) -> Result<Option<PathBuf>> {
    let Some(dir) = database_path(database).and_then(|path| path.parent().map(Path::to_path_buf)) else {
        return Ok(None);
    };
    if dir.as_os_str().is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    tracing::info!("Data directory ready: {}", dir.display());
    Ok(Some(dir))
}

/// Path of the SQLite database file, if the database is a SQLite file
pub fn database_path(database: &DatabaseConfig) -> Option<PathBuf> {
    if database.driver != DatabaseDriver::Sqlite {
        return None;
    }
    sqlite_file_path(&database.url).map(PathBuf::from)
}

/// Files and directory `clean` may delete
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanPlan {
    /// The database and its journal files that exist
    pub files: Vec<PathBuf>,
    /// Relative database directory, removed only when left empty
    pub data_dir: Option<PathBuf>,
}

impl CleanPlan {
    pub fn for_database(database: &DatabaseConfig) -> Self {
        let Some(path) = database_path(database) else {
            return Self::default();
        };
        let files = ["", "-wal", "-shm", "-journal"]
            .iter()
            .map(|suffix| {
                let mut name = path.clone().into_os_string();
                name.push(suffix);
                PathBuf::from(name)
            })
            .filter(|file| file.is_file())
            .collect();
        Self {
            files,
            data_dir: created_data_dir(&path),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Delete the planned files; returns everything removed
    pub fn execute(&self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for file in &self.files {
            std::fs::remove_file(file).with_context(|| format!("Failed to remove {}", file.display()))?;
            tracing::info!("Removed {}", file.display());
            removed.push(file.clone());
        }
        if let Some(dir) = &self.data_dir {
            let is_empty = std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(false);
            if is_empty {
                std::fs::remove_dir(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
                tracing::info!("Removed {}", dir.display());
                removed.push(dir.clone());
            }
        }
        Ok(removed)
    }
}

/// Directory `init` created for a relative database path such as
/// `data/ndr_core.db`. Absolute paths and paths leaving the working
/// directory have none.
fn created_data_dir(database: &Path) -> Option<PathBuf> {
    let parent = database.parent().filter(|p| !p.as_os_str().is_empty())?;
    parent
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| parent.to_path_buf())
}

/// Outcome of `clean`
#[derive(Debug, PartialEq, Eq)]
pub enum CleanOutcome {
    Aborted,
    Removed(Vec<PathBuf>),
}

/// Delete the SQLite database of `database`.
///
/// Without `confirmed`, the files are listed on `output` and nothing is
/// deleted unless the next line of `input` is [`CONFIRMATION`].
pub fn clean(
    database: &DatabaseConfig,
    confirmed: bool,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<CleanOutcome> {
    let plan = CleanPlan::for_database(database);
    if plan.is_empty() {
        writeln!(output, "Nothing to clean")?;
        return Ok(CleanOutcome::Removed(Vec::new()));
    }

    if !confirmed {
        writeln!(output, "This deletes the NDR Core database:")?;
        for file in &plan.files {
            writeln!(output, "  {}", file.display())?;
        }
        write!(output, "Please confirm by typing {}: ", CONFIRMATION)?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if answer.trim() != CONFIRMATION {
            writeln!(output, "Aborted. No changes were made")?;
            return Ok(CleanOutcome::Aborted);
        }
    }

    let removed = plan.execute()?;
    writeln!(output, "NDR Core database deleted")?;
    Ok(CleanOutcome::Removed(removed))
}

/// Import the manifests in `dir` into the configured database
pub async fn import_manifests(config: &Config, dir: &Path) -> Result<ImportReport> {
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let service = ManifestService::new(SqlxManifestRepository::boxed(pool.clone()));
    let report = service.import_dir(dir).await;
    pool.close().await;

    let report = report?;
    tracing::info!(
        "Imported {} manifests, skipped {}",
        report.imported.len(),
        report.skipped.len()
    );
    Ok(report)
}
