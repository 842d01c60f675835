//! Manifest service
//!
//! Imports IIIF manifest files so that search results can link to their
//! source in a manifest viewer. A file named `<name>_<year>_<issue>.json`
//! gets the identifier `<year>-<issue>`; other files use their stem.

use crate::db::repositories::ManifestRepository;
use crate::models::Manifest;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ManifestServiceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {file}: {message}")]
    Invalid { file: String, message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Outcome of importing a directory
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<Manifest>,
    /// File name and reason of every file that was not imported
    pub skipped: Vec<(String, String)>,
}

pub struct ManifestService {
    repo: Arc<dyn ManifestRepository>,
}

impl ManifestService {
    pub fn new(repo: Arc<dyn ManifestRepository>) -> Self {
        Self { repo }
    }

    /// Import every `*.json` file directly inside `dir`, in file name order.
    ///
    /// Files that cannot be read as a manifest are skipped with a warning.
    pub async fn import_dir(&self, dir: &Path) -> Result<ImportReport, ManifestServiceError> {
        let io_error = |source| ManifestServiceError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut entries = fs::read_dir(dir).await.map_err(io_error)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut report = ImportReport::default();
        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.import_file(&path, &file_name).await {
                Ok(manifest) => {
                    info!("Imported {}: {}", manifest.identifier, manifest.title);
                    report.imported.push(manifest);
                }
                Err(ManifestServiceError::Internal(e)) => return Err(ManifestServiceError::Internal(e)),
                Err(e) => {
                    warn!("Skipped {}: {}", file_name, e);
                    report.skipped.push((file_name, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    async fn import_file(&self, path: &Path, file_name: &str) -> Result<Manifest, ManifestServiceError> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|source| ManifestServiceError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let json: Value = serde_json::from_str(&text).map_err(|e| ManifestServiceError::Invalid {
            file: file_name.to_string(),
            message: e.to_string(),
        })?;
        let manifest = parse_manifest(file_name, &json)?;
        Ok(self.repo.upsert(&manifest).await?)
    }

    pub async fn list(&self) -> Result<Vec<Manifest>, ManifestServiceError> {
        Ok(self.repo.list().await?)
    }
}

/// Build a manifest from the JSON of `file_name`.
///
/// The URI comes from `@id` (or `id`); the title from `label`, which may be
/// a string, a list or a language map.
pub fn parse_manifest(file_name: &str, json: &Value) -> Result<Manifest, ManifestServiceError> {
    let invalid = |message: &str| ManifestServiceError::Invalid {
        file: file_name.to_string(),
        message: message.to_string(),
    };
    let uri = json
        .get("@id")
        .or_else(|| json.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing @id"))?;
    let title = json
        .get("label")
        .and_then(first_text)
        .ok_or_else(|| invalid("missing label"))?;

    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    let parts: Vec<&str> = stem.split('_').collect();
    let manifest = match parts.as_slice() {
        [_, year, issue, ..] if !year.is_empty() && !issue.is_empty() => {
            Manifest::new(format!("{}-{}", year, issue), title, file_name, uri).with_order(*year, *issue)
        }
        _ => Manifest::new(stem, title, file_name, uri),
    };
    Ok(manifest)
}

fn first_text(label: &Value) -> Option<String> {
    match label {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        Value::Object(map) => match map.get("@value") {
            Some(value) => first_text(value),
            None => map.values().find_map(first_text),
        },
        _ => None,
    }
}
