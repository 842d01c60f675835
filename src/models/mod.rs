//! Data models
//!
//! This module contains the data structures of the portal definition and the
//! shapes search results are exposed as:
//! - API connections, search fields and search configurations
//! - The catalog tying them together
//! - Result view types (errors, pagination, result cards)
//! - Persisted log entries (search statistics, correction marks)
//! - Imported manifests

mod api_config;
mod catalog;
mod log_entry;
mod manifest;
mod result;
mod search_config;
mod search_field;

pub use api_config::{ApiConfiguration, ApiType, Protocol};
pub use catalog::{Catalog, CatalogError};
pub use log_entry::{Correction, SearchStatisticEntry};
pub use manifest::Manifest;
pub use result::{
    ErrorCode, FormLinks, PageItem, PageLink, Pagination, RenderedField, ResultError, ResultMeta,
    ResultOption, TransformedResult,
};
pub use search_config::{CsvField, ResultField, SearchConfiguration, SearchFormField};
pub use search_field::{DataFieldType, FieldType, ListChoice, ListChoices, ListCondition, SearchField};
