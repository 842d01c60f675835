//! Correction service
//!
//! Visitors can mark a record as containing an error; the marks are stored
//! for the editors of the catalog.

use crate::db::repositories::CorrectionRepository;
use crate::models::{Catalog, Correction};
use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Longest accepted note
pub const MAX_NOTE_LENGTH: usize = 2000;

#[derive(Debug, Error)]
pub enum CorrectionServiceError {
    #[error("The correction feature is disabled")]
    Disabled,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct CorrectionService {
    repo: Arc<dyn CorrectionRepository>,
    catalog: Arc<Catalog>,
    enabled: bool,
}

impl CorrectionService {
    pub fn new(repo: Arc<dyn CorrectionRepository>, catalog: Arc<Catalog>, enabled: bool) -> Self {
        Self { repo, catalog, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Mark `record_id` of search `conf_name` for correction
    pub async fn mark(
        &self,
        conf_name: &str,
        record_id: &str,
        note: Option<String>,
    ) -> Result<Correction, CorrectionServiceError> {
        if !self.enabled {
            return Err(CorrectionServiceError::Disabled);
        }
        if self.catalog.search(conf_name).is_none() {
            return Err(CorrectionServiceError::NotFound(format!(
                "Search not found: {}",
                conf_name
            )));
        }
        let record_id = record_id.trim();
        if record_id.is_empty() {
            return Err(CorrectionServiceError::Validation("Record id is required".to_string()));
        }

        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LENGTH) {
            return Err(CorrectionServiceError::Validation(format!(
                "Note must be at most {} characters",
                MAX_NOTE_LENGTH
            )));
        }

        let correction = self
            .repo
            .create(&Correction::new(conf_name, record_id, note))
            .await
            .context("Failed to store correction")?;
        info!("Record {}/{} marked for correction", conf_name, record_id);
        Ok(correction)
    }

    pub async fn list_for_record(
        &self,
        conf_name: &str,
        record_id: &str,
    ) -> Result<Vec<Correction>, CorrectionServiceError> {
        Ok(self.repo.list_for_record(conf_name, record_id).await?)
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<Correction>, CorrectionServiceError> {
        Ok(self.repo.list(limit).await?)
    }
}
