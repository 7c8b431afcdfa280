//! Storage module for persisting check reports
//!
//! This module handles report persistence, including:
//! - One JSON file per checked page plus a results index (default backend)
//! - A SQLite database keeping reports across runs
//! - Reading stored reports back for `--stats`

mod json;
mod schema;
mod sqlite;
mod traits;

pub use json::{read_index, read_reports, JsonReportStore, INDEX_FILE, RESULTS_DIR};
pub use schema::get_schema_version;
pub use sqlite::{SqliteReportStore, DATABASE_FILE};
pub use traits::{IndexEntry, ReportStore, StorageError, StorageResult};

use crate::config::{OutputConfig, StoreBackend};
use std::path::Path;
use std::sync::Arc;

/// Opens the report store selected by the output configuration
///
/// # Arguments
///
/// * `config` - Output section of the configuration
/// * `config_hash` - Recorded with each run by backends that track runs
pub fn open_store(config: &OutputConfig, config_hash: &str) -> StorageResult<Arc<dyn ReportStore>> {
    let reports_dir = Path::new(&config.reports_dir);

    match config.backend {
        StoreBackend::Json => Ok(Arc::new(JsonReportStore::new(
            reports_dir,
            config.keep_existing,
        ))),
        StoreBackend::Sqlite => {
            std::fs::create_dir_all(reports_dir)?;
            let store = SqliteReportStore::new(
                &reports_dir.join(DATABASE_FILE),
                config.keep_existing,
                config_hash,
            )?;
            Ok(Arc::new(store))
        }
    }
}
