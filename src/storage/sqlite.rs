//! SQLite report store
//!
//! Keeps every report of every run in one database file, so repeated sweeps
//! of the same site can be compared. Wiping on `pre_process` deletes rows,
//! not the file.

use crate::check::{CheckReport, Finding, PageRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{IndexEntry, ReportStore, StorageError, StorageResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// File name of the database inside the reports directory
pub const DATABASE_FILE: &str = "reports.db";

/// SQLite storage backend
pub struct SqliteReportStore {
    conn: Mutex<Connection>,
    keep_existing: bool,
    config_hash: String,
    run_id: Mutex<Option<i64>>,
}

impl SqliteReportStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `keep_existing` - Keep reports of earlier runs
    /// * `config_hash` - Hash of the configuration, recorded with the run
    pub fn new(path: &Path, keep_existing: bool, config_hash: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self::with_connection(conn, keep_existing, config_hash))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory(keep_existing: bool) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::with_connection(conn, keep_existing, "test"))
    }

    fn with_connection(conn: Connection, keep_existing: bool, config_hash: &str) -> Self {
        Self {
            conn: Mutex::new(conn),
            keep_existing,
            config_hash: config_hash.to_string(),
            run_id: Mutex::new(None),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_run(&self) -> Option<i64> {
        *self.run_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the results index as written by the last `post_process`
    pub fn index(&self) -> StorageResult<BTreeMap<String, IndexEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT url, key, page_title FROM results_index")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    IndexEntry {
                        key: row.get(1)?,
                        title: row.get(2)?,
                    },
                ))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Loads one stored report by key
    pub fn get_report(&self, key: &str) -> StorageResult<CheckReport> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT url, page_title, accessed_at, request_headers, findings
                 FROM reports WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StorageError::ReportNotFound(key.to_string()))?;

        let (url, title, accessed_at, headers, findings) = row;
        let accessed_at = DateTime::parse_from_rfc3339(&accessed_at)
            .map_err(|e| StorageError::Database(format!("Bad timestamp for {}: {}", key, e)))?
            .with_timezone(&Utc);

        Ok(CheckReport {
            page: PageRecord {
                url,
                request_headers: serde_json::from_str(&headers)?,
                title,
                accessed_at,
            },
            findings: serde_json::from_str::<Vec<Finding>>(&findings)?,
        })
    }

    /// Counts stored reports across all kept runs
    pub fn count_reports(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl ReportStore for SqliteReportStore {
    fn pre_process(&self) -> StorageResult<()> {
        let conn = self.conn();
        if !self.keep_existing {
            conn.execute_batch(
                "DELETE FROM results_index;
                 DELETE FROM reports;
                 DELETE FROM runs;",
            )?;
        }

        conn.execute(
            "INSERT INTO runs (started_at, config_hash) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), self.config_hash],
        )?;
        let run_id = conn.last_insert_rowid();
        *self.run_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(run_id);
        tracing::debug!("Started report run {}", run_id);
        Ok(())
    }

    fn add_result(&self, report: &CheckReport) -> StorageResult<()> {
        let run_id = self
            .current_run()
            .ok_or_else(|| StorageError::Database("add_result before pre_process".to_string()))?;
        let (errors, warnings, notices) = report.counts();

        self.conn().execute(
            "INSERT OR REPLACE INTO reports
             (key, run_id, url, page_title, accessed_at, request_headers, findings,
              error_count, warning_count, notice_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                report.key(),
                run_id,
                report.page.url,
                report.page.title,
                report.page.accessed_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                serde_json::to_string(&report.page.request_headers)?,
                serde_json::to_string(&report.findings)?,
                errors as i64,
                warnings as i64,
                notices as i64,
            ],
        )?;
        Ok(())
    }

    fn post_process(&self) -> StorageResult<()> {
        let run_id = self.current_run();
        let conn = self.conn();

        // Latest report per URL wins
        conn.execute_batch(
            "INSERT OR REPLACE INTO results_index (url, key, page_title)
             SELECT r.url, r.key, r.page_title FROM reports r
             WHERE r.accessed_at = (
                 SELECT MAX(accessed_at) FROM reports WHERE url = r.url
             );",
        )?;

        if let Some(run_id) = run_id {
            conn.execute(
                "UPDATE runs SET finished_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), run_id],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::FindingType;
    use chrono::Duration;

    fn report(url: &str, offset_secs: i64) -> CheckReport {
        let mut headers = BTreeMap::new();
        headers.insert("Cookie".to_string(), "sessionid=abc".to_string());
        let mut page = PageRecord::new(url, headers, Some("Page".to_string()));
        page.accessed_at = Utc::now() + Duration::seconds(offset_secs);
        CheckReport {
            page,
            findings: vec![
                Finding {
                    kind: FindingType::Error,
                    code: "WCAG2AA.H37".to_string(),
                    ..Finding::default()
                },
                Finding {
                    kind: FindingType::Notice,
                    code: "WCAG2AA.G18".to_string(),
                    ..Finding::default()
                },
            ],
        }
    }

    #[test]
    fn test_add_before_pre_process_fails() {
        let store = SqliteReportStore::new_in_memory(false).unwrap();
        assert!(store.add_result(&report("http://localhost/a", 0)).is_err());
    }

    #[test]
    fn test_report_roundtrip_by_key() {
        let store = SqliteReportStore::new_in_memory(false).unwrap();
        store.pre_process().unwrap();

        let original = report("http://localhost/a", 0);
        store.add_result(&original).unwrap();

        let loaded = store.get_report(&original.key()).unwrap();
        assert_eq!(loaded.page.url, "http://localhost/a");
        assert_eq!(
            loaded.page.request_headers.get("Cookie").map(String::as_str),
            Some("sessionid=abc")
        );
        assert_eq!(loaded.counts(), (1, 0, 1));
    }

    #[test]
    fn test_missing_report() {
        let store = SqliteReportStore::new_in_memory(false).unwrap();
        assert!(matches!(
            store.get_report("nope"),
            Err(StorageError::ReportNotFound(_))
        ));
    }

    #[test]
    fn test_index_points_at_latest_report() {
        let store = SqliteReportStore::new_in_memory(false).unwrap();
        store.pre_process().unwrap();

        let older = report("http://localhost/a", 0);
        let newer = report("http://localhost/a", 10);
        store.add_result(&older).unwrap();
        store.add_result(&newer).unwrap();
        store.add_result(&report("http://localhost/b", 0)).unwrap();
        store.post_process().unwrap();

        assert_eq!(store.count_reports().unwrap(), 3);
        let index = store.index().unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index["http://localhost/a"].key, newer.key());
    }

    #[test]
    fn test_pre_process_wipes_unless_keeping() {
        let store = SqliteReportStore::new_in_memory(false).unwrap();
        store.pre_process().unwrap();
        store.add_result(&report("http://localhost/a", 0)).unwrap();
        store.post_process().unwrap();

        store.pre_process().unwrap();
        assert_eq!(store.count_reports().unwrap(), 0);
        assert!(store.index().unwrap().is_empty());
    }

    #[test]
    fn test_keep_existing_preserves_rows() {
        let store = SqliteReportStore::new_in_memory(true).unwrap();
        store.pre_process().unwrap();
        store.add_result(&report("http://localhost/a", 0)).unwrap();
        store.post_process().unwrap();

        store.pre_process().unwrap();
        store.add_result(&report("http://localhost/b", 1)).unwrap();
        store.post_process().unwrap();

        assert_eq!(store.count_reports().unwrap(), 2);
        assert_eq!(store.index().unwrap().len(), 2);
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store =
            SqliteReportStore::new(&dir.path().join(DATABASE_FILE), false, "abc123").unwrap();
        store.pre_process().unwrap();
        store.add_result(&report("http://localhost/a", 0)).unwrap();
        store.post_process().unwrap();
        assert_eq!(store.count_reports().unwrap(), 1);
    }
}
