use crate::check::checker::{Checker, CheckerOutput};
use crate::check::counters::RunCounters;
use crate::check::findings::{parse_findings, CheckReport, Finding, PageRecord};
use crate::check::ignore::IgnoreRules;
use crate::check::title::check_title_consistency;
use crate::config::CheckerConfig;
use crate::storage::ReportStore;
use crate::url::{canonicalize, PositionPolicy};
use crate::{Result, SweepError};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::{watch, Semaphore};

/// Runs the external checker against admitted pages
///
/// One call to [`check`](Self::check) per page: materialize the header
/// config, run the checker with bounded immediate retries, filter findings
/// through the ignore rules, compare titles, update the counters and persist
/// the report.
pub struct AccessibilityCheckStage {
    checker: Arc<dyn Checker>,
    store: Arc<dyn ReportStore>,
    counters: Arc<RunCounters>,
    policy: PositionPolicy,
    max_attempts: u32,
    transient_signatures: Vec<String>,
    workers: Arc<Semaphore>,
    cancel: Option<watch::Receiver<bool>>,
}

impl AccessibilityCheckStage {
    pub fn new(
        checker: Arc<dyn Checker>,
        store: Arc<dyn ReportStore>,
        counters: Arc<RunCounters>,
    ) -> Self {
        let defaults = CheckerConfig::default();
        Self {
            checker,
            store,
            counters,
            policy: PositionPolicy::default(),
            max_attempts: defaults.max_attempts,
            transient_signatures: defaults.transient_signatures,
            workers: Arc::new(Semaphore::new(defaults.workers as usize)),
            cancel: None,
        }
    }

    /// Applies attempt limit, transient signatures and worker count
    pub fn with_config(mut self, config: &CheckerConfig) -> Self {
        self.max_attempts = config.max_attempts.max(1);
        self.transient_signatures = config.transient_signatures.clone();
        self.workers = Arc::new(Semaphore::new(config.workers.max(1) as usize));
        self
    }

    /// Canonicalization used to match ignore-rule URL globs
    pub fn with_policy(mut self, policy: PositionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stops new checker runs and kills the running one once `true` is sent
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn counters(&self) -> &Arc<RunCounters> {
        &self.counters
    }

    /// Checks one page
    ///
    /// Returns [`SweepError::Drop`] when every attempt failed; the run goes
    /// on without this page and the finding counters are left untouched.
    pub async fn check(&self, page: PageRecord, rules: &IgnoreRules) -> Result<CheckReport> {
        let _permit = self
            .cancellable(Arc::clone(&self.workers).acquire_owned())
            .await?
            .map_err(|_| SweepError::Cancelled)?;

        let artifact = write_config_artifact(&page.request_headers)?;
        let outcome = self.run_with_retries(&page.url, artifact.path()).await;
        if let Err(e) = artifact.close() {
            tracing::warn!("Failed to remove checker config: {}", e);
        }

        let findings = match outcome {
            Ok(findings) => findings,
            Err(e @ SweepError::Drop { .. }) => {
                self.counters.record_drop();
                tracing::warn!("{}", e);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let rule_url = canonicalize(&page.url, &self.policy)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| page.url.clone());
        let findings = rules.filter(&rule_url, findings);

        let mismatches = check_title_consistency(page.title.as_deref(), &findings);
        self.counters.record_title_mismatches(mismatches.len());
        self.counters.record(&findings);

        let report = CheckReport { page, findings };
        self.store.add_result(&report)?;

        tracing::debug!(
            "Checked {} ({} findings, key {})",
            report.page.url,
            report.findings.len(),
            report.key()
        );
        Ok(report)
    }

    async fn run_with_retries(&self, url: &str, config_path: &Path) -> Result<Vec<Finding>> {
        let mut last_error = String::new();

        for attempt in 0..self.max_attempts {
            let mut line = self.checker.describe(url, config_path);
            if attempt > 0 {
                line.push_str(&format!("  # (retry {})", attempt));
            }
            tracing::info!("{}", line);

            match self.cancellable(self.checker.run(url, config_path)).await? {
                Err(e) => {
                    last_error = format!("failed to start checker: {}", e);
                }
                Ok(output) if self.succeeded(&output) => match parse_findings(&output.stdout) {
                    Ok(findings) => return Ok(findings),
                    Err(e) => {
                        last_error = format!("unreadable checker output: {}\n{}", e, output.stderr);
                    }
                },
                Ok(output) => {
                    last_error = output.stderr;
                }
            }
        }

        Err(SweepError::Drop {
            url: url.to_string(),
            stderr: last_error,
        })
    }

    fn succeeded(&self, output: &CheckerOutput) -> bool {
        output.exited_cleanly()
            && !self
                .transient_signatures
                .iter()
                .any(|signature| output.stderr.contains(signature.as_str()))
    }

    async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output> {
        let Some(mut cancel) = self.cancel.clone() else {
            return Ok(future.await);
        };

        if *cancel.borrow() {
            return Err(SweepError::Cancelled);
        }

        tokio::select! {
            output = future => Ok(output),
            _ = cancelled(&mut cancel) => Err(SweepError::Cancelled),
        }
    }
}

/// Resolves once `true` is sent; never resolves if the sender goes away
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Writes the per-check config file: `{"headers": {...}}`
///
/// The file is deleted when the returned guard is dropped or closed.
pub fn write_config_artifact(headers: &BTreeMap<String, String>) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("checker-config-")
        .suffix(".json")
        .tempfile()?;
    serde_json::to_writer(&mut file, &serde_json::json!({ "headers": headers }))?;
    file.flush()?;
    Ok(file)
}
