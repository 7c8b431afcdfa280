//! Run summary types
//!
//! A [`RunSummary`] is assembled by the coordinator once the frontier is
//! drained (or the run is cancelled) and rendered by the markdown writer.

use crate::check::{CounterSnapshot, Finding};
use crate::scope::ScopeStats;
use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// Summary statistics for a sweep
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub config_hash: String,

    pub counters: CounterSnapshot,
    pub scope: ScopeStats,

    /// Completed logins, initial login included
    pub logins: u64,

    /// Pages whose checker attempts were exhausted
    pub dropped_urls: Vec<String>,

    /// Finding codes by frequency, most frequent first
    pub top_codes: Vec<(String, u64)>,
}

impl RunSummary {
    pub fn new(base_url: impl Into<String>, config_hash: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Completed,
            config_hash: config_hash.into(),
            counters: CounterSnapshot::default(),
            scope: ScopeStats::default(),
            logins: 0,
            dropped_urls: Vec::new(),
            top_codes: Vec::new(),
        }
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    /// Returns the configured categories that have a nonzero count
    ///
    /// A nonempty result means the run fails.
    pub fn failing_categories(&self, categories: &[String]) -> Vec<String> {
        categories
            .iter()
            .filter(|name| self.counters.category(name).unwrap_or(0) > 0)
            .cloned()
            .collect()
    }
}

/// Tallies finding codes across pages
#[derive(Debug, Default)]
pub struct CodeTally {
    counts: HashMap<String, u64>,
}

impl CodeTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, findings: &[Finding]) {
        self.add_codes(findings.iter().map(|finding| finding.code.clone()));
    }

    pub fn add_codes(&mut self, codes: impl IntoIterator<Item = String>) {
        for code in codes {
            *self.counts.entry(code).or_insert(0) += 1;
        }
    }

    /// The `limit` most frequent codes; ties ordered by code
    pub fn top(&self, limit: usize) -> Vec<(String, u64)> {
        let mut codes: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|(code, count)| (code.clone(), *count))
            .collect();
        codes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        codes.truncate(limit);
        codes
    }
}
