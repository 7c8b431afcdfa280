use crate::check::CheckReport;
use crate::storage::traits::{IndexEntry, ReportStore, StorageResult};
use std::collections::BTreeMap;
use std::fs::{self, File};
use serde::Serialize;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Subdirectory of the reports dir holding one JSON file per report
pub const RESULTS_DIR: &str = "results";

/// File name of the URL -> record index, inside [`RESULTS_DIR`]
pub const INDEX_FILE: &str = "results-index.json";

/// Stores each report as `<reports-dir>/results/<key>.json`
pub struct JsonReportStore {
    reports_dir: PathBuf,
    keep_existing: bool,
    index: Mutex<BTreeMap<String, IndexEntry>>,
}

impl JsonReportStore {
    pub fn new(reports_dir: impl Into<PathBuf>, keep_existing: bool) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            keep_existing,
            index: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn results_dir(&self) -> PathBuf {
        self.reports_dir.join(RESULTS_DIR)
    }

    pub fn index_path(&self) -> PathBuf {
        self.results_dir().join(INDEX_FILE)
    }

    fn index(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, IndexEntry>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReportStore for JsonReportStore {
    fn pre_process(&self) -> StorageResult<()> {
        if self.reports_dir.exists() && !self.keep_existing {
            tracing::info!("Removing previous reports in {}", self.reports_dir.display());
            fs::remove_dir_all(&self.reports_dir)?;
        }
        fs::create_dir_all(self.results_dir())?;

        if self.keep_existing {
            let existing = read_index(&self.reports_dir)?;
            if !existing.is_empty() {
                tracing::info!("Keeping {} indexed reports from earlier runs", existing.len());
            }
            self.index().extend(existing);
        }
        Ok(())
    }

    fn add_result(&self, report: &CheckReport) -> StorageResult<()> {
        let key = report.key();
        let results_dir = self.results_dir();
        fs::create_dir_all(&results_dir)?;

        let file = File::create(results_dir.join(format!("{}.json", key)))?;
        write_json(file, report, false)?;

        self.index().insert(
            report.page.url.clone(),
            IndexEntry {
                key,
                title: report.page.title.clone(),
            },
        );
        Ok(())
    }

    fn post_process(&self) -> StorageResult<()> {
        fs::create_dir_all(self.results_dir())?;
        let file = File::create(self.index_path())?;
        write_json(file, &*self.index(), true)?;
        tracing::info!("Wrote results index to {}", self.index_path().display());
        Ok(())
    }
}

/// Serializes `value` through a buffer and flushes it, so write errors surface
fn write_json<W: Write, T: Serialize + ?Sized>(
    writer: W,
    value: &T,
    pretty: bool,
) -> StorageResult<()> {
    let mut writer = BufWriter::new(writer);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads the results index of a reports directory; missing means empty
pub fn read_index(reports_dir: &Path) -> StorageResult<BTreeMap<String, IndexEntry>> {
    let path = reports_dir.join(RESULTS_DIR).join(INDEX_FILE);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Reads every stored report of a reports directory, oldest first
pub fn read_reports(reports_dir: &Path) -> StorageResult<Vec<CheckReport>> {
    let results_dir = reports_dir.join(RESULTS_DIR);
    if !results_dir.exists() {
        return Ok(Vec::new());
    }

    let mut reports = Vec::new();
    for entry in fs::read_dir(&results_dir)? {
        let path = entry?.path();
        let is_report = path.extension().map(|ext| ext == "json").unwrap_or(false)
            && path.file_name().map(|name| name != INDEX_FILE).unwrap_or(false);
        if !is_report {
            continue;
        }

        let file = File::open(&path)?;
        match serde_json::from_reader::<_, CheckReport>(BufReader::new(file)) {
            Ok(report) => reports.push(report),
            Err(e) => tracing::warn!("Skipping unreadable report {}: {}", path.display(), e),
        }
    }

    reports.sort_by(|a, b| a.page.accessed_at.cmp(&b.page.accessed_at));
    Ok(reports)
}
