//! Services layer
//!
//! Services combine the catalog, the search backends and the repositories:
//! - `search`: runs searches, serves records and bulk downloads
//! - `correction`: records visitor correction marks
//! - `manifest`: imports IIIF manifests for the source viewer
//! - `export`: CSV export of raw hits

pub mod correction;
pub mod export;
pub mod manifest;
pub mod search;

pub use correction::{CorrectionService, CorrectionServiceError};
pub use export::{csv_columns, csv_export, nested_value};
pub use manifest::{parse_manifest, ImportReport, ManifestService, ManifestServiceError};
pub use search::{SearchRequest, SearchService, SearchServiceError, EXPORT_PAGE_SIZE};
