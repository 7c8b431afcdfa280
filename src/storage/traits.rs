//! Report store trait and error types

use crate::check::CheckReport;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One row of the results index: which record holds a URL's report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    #[serde(rename = "page_title")]
    pub title: Option<String>,
}

/// Durable persistence of check reports
///
/// Called at three points of a run: once before crawling starts, once per
/// checked page, and once after the last page. Implementations must be safe
/// to call from concurrent page pipelines.
pub trait ReportStore: Send + Sync {
    /// Prepares the destination (creating it, or wiping previous runs)
    fn pre_process(&self) -> StorageResult<()>;

    /// Persists one report under its content-derived key
    fn add_result(&self, report: &CheckReport) -> StorageResult<()>;

    /// Writes the URL -> record index
    fn post_process(&self) -> StorageResult<()>;
}
