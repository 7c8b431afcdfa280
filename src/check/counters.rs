use crate::check::findings::{count_by_type, Finding};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Run-level finding totals
///
/// Shared by every page pipeline; only ever incremented.
#[derive(Debug, Default)]
pub struct RunCounters {
    error: AtomicU64,
    warning: AtomicU64,
    notice: AtomicU64,
    pages: AtomicU64,
    dropped: AtomicU64,
    title_mismatches: AtomicU64,
}

/// Point-in-time copy of [`RunCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub error: u64,
    pub warning: u64,
    pub notice: u64,
    pub pages: u64,
    pub dropped: u64,
    pub title_mismatches: u64,
}

impl CounterSnapshot {
    /// Count for a failure category name (`error`, `warning`, `notice`, `dropped`)
    pub fn category(&self, name: &str) -> Option<u64> {
        match name {
            "error" => Some(self.error),
            "warning" => Some(self.warning),
            "notice" => Some(self.notice),
            "dropped" => Some(self.dropped),
            _ => None,
        }
    }
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one checked page and its findings
    pub fn record(&self, findings: &[Finding]) {
        let (error, warning, notice) = count_by_type(findings);
        self.error.fetch_add(error, Ordering::Relaxed);
        self.warning.fetch_add(warning, Ordering::Relaxed);
        self.notice.fetch_add(notice, Ordering::Relaxed);
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_title_mismatches(&self, count: usize) {
        self.title_mismatches
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            error: self.error.load(Ordering::Relaxed),
            warning: self.warning.load(Ordering::Relaxed),
            notice: self.notice.load(Ordering::Relaxed),
            pages: self.pages.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            title_mismatches: self.title_mismatches.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::findings::FindingType;

    fn finding(kind: FindingType) -> Finding {
        Finding {
            kind,
            ..Finding::default()
        }
    }

    #[test]
    fn test_record_counts_by_type() {
        let counters = RunCounters::new();
        counters.record(&[
            finding(FindingType::Error),
            finding(FindingType::Error),
            finding(FindingType::Notice),
        ]);
        counters.record(&[finding(FindingType::Warning)]);
        counters.record_drop();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.error, 2);
        assert_eq!(snapshot.warning, 1);
        assert_eq!(snapshot.notice, 1);
        assert_eq!(snapshot.pages, 2);
        assert_eq!(snapshot.dropped, 1);
    }

    #[test]
    fn test_category_lookup() {
        let snapshot = CounterSnapshot {
            error: 3,
            dropped: 1,
            ..CounterSnapshot::default()
        };
        assert_eq!(snapshot.category("error"), Some(3));
        assert_eq!(snapshot.category("dropped"), Some(1));
        assert_eq!(snapshot.category("fatal"), None);
    }
}
