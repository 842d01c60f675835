//! Imported IIIF manifests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A manifest file known to the portal's source viewer.
///
/// `identifier` is what a search's manifest relation expression renders to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: i64,
    pub identifier: String,
    pub title: String,
    pub file_name: String,
    /// The manifest's own `@id`
    pub manifest_uri: String,
    pub order_value_1: String,
    pub order_value_2: String,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        file_name: impl Into<String>,
        manifest_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            identifier: identifier.into(),
            title: title.into(),
            file_name: file_name.into(),
            manifest_uri: manifest_uri.into(),
            order_value_1: String::new(),
            order_value_2: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_order(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.order_value_1 = first.into();
        self.order_value_2 = second.into();
        self
    }
}
