//! Persisted log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One executed search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStatisticEntry {
    pub id: i64,
    pub search_config: String,
    pub search_term: String,
    pub search_query: String,
    pub search_no_results: i64,
    pub created_at: DateTime<Utc>,
}

impl SearchStatisticEntry {
    pub fn new(
        search_config: impl Into<String>,
        search_term: impl Into<String>,
        search_query: impl Into<String>,
        search_no_results: i64,
    ) -> Self {
        Self {
            id: 0,
            search_config: search_config.into(),
            search_term: search_term.into(),
            search_query: search_query.into(),
            search_no_results,
            created_at: Utc::now(),
        }
    }
}

/// A record a visitor reported as incorrect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub id: i64,
    pub search_config: String,
    pub record_id: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Correction {
    pub fn new(search_config: impl Into<String>, record_id: impl Into<String>, note: Option<String>) -> Self {
        Self {
            id: 0,
            search_config: search_config.into(),
            record_id: record_id.into(),
            note,
            created_at: Utc::now(),
        }
    }
}
