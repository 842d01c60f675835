//! Database repositories
//!
//! Each repository is a trait with an sqlx implementation dispatching on the
//! pool's driver.

pub mod correction;
pub mod manifest;
pub mod statistics;

pub use correction::{CorrectionRepository, SqlxCorrectionRepository};
pub use manifest::{ManifestRepository, SqlxManifestRepository};
pub use statistics::{SearchCount, SqlxStatisticsRepository, StatisticsRepository};
