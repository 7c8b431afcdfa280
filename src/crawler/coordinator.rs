//! Crawler coordinator - main sweep orchestration logic
//!
//! This module contains the main crawl loop that coordinates:
//! - Establishing the session before any page is requested
//! - Managing the frontier and the pool of page pipelines
//! - The per-page pipeline: session, scope filter, check stage
//! - Following links and course-block units
//! - Run timeout and cancellation
//! - Generating final output

use crate::auth::{AuthController, AuthSession, Credentials, EffectivePage, PageStep};
use crate::check::{cancelled, AccessibilityCheckStage, Checker, IgnoreRules, PageRecord};
use crate::check::{ProcessChecker, RunCounters};
use crate::config::Config;
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::parser::{course_block_urls, parse_html};
use crate::crawler::request::Request;
use crate::crawler::scheduler::Scheduler;
use crate::output::{generate_markdown_summary, CodeTally, RunStatus, RunSummary};
use crate::scope::{Admission, ScopeFilter};
use crate::storage::{open_store, ReportStore};
use crate::url::{classify_link, LinkRules, PositionPolicy};
use crate::{Result, SweepError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::task::JoinSet;
use url::Url;

/// Number of finding codes listed in the run summary
const TOP_CODES: usize = 20;

/// Stops a running sweep from outside the crawl loop
#[derive(Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // No receivers left means the run already finished
        let _ = self.sender.send(true);
    }
}

/// Everything a page pipeline needs, shared across tasks
struct PageContext {
    session: Arc<AuthSession>,
    scope: Arc<ScopeFilter>,
    stage: Arc<AccessibilityCheckStage>,
    rules: Arc<IgnoreRules>,
    links: LinkRules,
    follow_links: bool,
}

/// What one page pipeline produced
#[derive(Debug, Default)]
struct PageResult {
    /// Newly discovered requests, subject to dedup
    follow: Vec<Request>,
    /// Requests to repeat after a re-login, bypassing dedup
    again: Vec<Request>,
    /// Finding codes of the stored report
    codes: Vec<String>,
    /// Set when the checker gave up on the page
    dropped: Option<String>,
}

/// Main sweep coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    scheduler: Scheduler,
    context: Arc<PageContext>,
    store: Arc<dyn ReportStore>,
    counters: Arc<RunCounters>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl Coordinator {
    /// Creates a coordinator over a live HTTP client and checker process
    ///
    /// Verifies the checker (unless disabled), loads ignore rules and opens
    /// the report store.
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration file, for the summary
    pub async fn new(config: Config, config_hash: String) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);

        let checker = ProcessChecker::from_config(&config.checker);
        if config.checker.verify_on_start {
            let version = checker.verify().await?;
            tracing::info!("Using checker {} ({})", config.checker.binary, version);
        }

        let rules = IgnoreRules::load(config.ignore.source.as_deref(), fetcher.client()).await?;
        if !rules.is_empty() {
            tracing::info!("Loaded ignore rules for {} URL patterns", rules.len());
        }

        let store = open_store(&config.output, &config_hash)?;

        Self::with_parts(config, config_hash, fetcher, Arc::new(checker), store, rules)
    }

    /// Creates a coordinator from explicit collaborators
    pub fn with_parts(
        config: Config,
        config_hash: String,
        fetcher: Arc<dyn PageFetcher>,
        checker: Arc<dyn Checker>,
        store: Arc<dyn ReportStore>,
        rules: IgnoreRules,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.site.base_url)?;
        let policy = PositionPolicy::from_config(&config.scope)?;
        let links = LinkRules::from_site(&config.site)?;

        let (start_requests, follow_links) = match &config.crawler.single_url {
            Some(single) => (vec![Request::get(base_url.join(single)?)], false),
            None => (start_requests(&config, &base_url)?, true),
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let counters = Arc::new(RunCounters::new());

        let stage = AccessibilityCheckStage::new(checker, Arc::clone(&store), Arc::clone(&counters))
            .with_config(&config.checker)
            .with_policy(policy.clone())
            .with_cancellation(cancel_rx.clone());

        let controller = AuthController::new(config.auth.clone(), base_url, start_requests);
        let context = PageContext {
            session: Arc::new(AuthSession::new(controller, fetcher)),
            scope: Arc::new(ScopeFilter::new(policy)),
            stage: Arc::new(stage),
            rules: Arc::new(rules),
            links,
            follow_links,
        };

        let scheduler = Scheduler::new(
            config.crawler.max_concurrent_pages as usize,
            config.crawler.max_depth,
        )
        .with_max_repeats(config.crawler.max_resumes);

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            scheduler,
            context: Arc::new(context),
            store,
            counters,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: Arc::clone(&self.cancel_tx),
        }
    }

    /// Runs the sweep to completion, cancellation or a fatal error
    ///
    /// The store is post-processed and the summary written in every case.
    /// Cancellation is not an error: the summary comes back with status
    /// `cancelled`. Session-level failures are returned after the summary
    /// has been written.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::new(&self.config.site.base_url, &self.config_hash);
        tracing::info!("Starting sweep of {}", self.config.site.base_url);

        self.store.pre_process()?;

        if let Some(secs) = self.config.crawler.run_timeout_secs {
            let handle = self.cancel_handle();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                tracing::warn!("Run timeout of {}s reached; cancelling", secs);
                handle.cancel();
            });
        }

        let mut tally = CodeTally::new();
        let outcome = self.crawl(&mut summary, &mut tally).await;

        if let Err(e) = self.store.post_process() {
            tracing::error!("Failed to finalize reports: {}", e);
        }

        summary.finished_at = Some(chrono::Utc::now());
        summary.status = match &outcome {
            Ok(()) => RunStatus::Completed,
            Err(SweepError::Cancelled) => RunStatus::Cancelled,
            Err(_) => RunStatus::Failed,
        };
        summary.counters = self.counters.snapshot();
        summary.scope = self.context.scope.stats();
        summary.logins = self.context.session.epoch();
        summary.top_codes = tally.top(TOP_CODES);

        if let Some(path) = &self.config.output.summary_path {
            generate_markdown_summary(&summary, Path::new(path))?;
            tracing::info!("Summary written to {}", path);
        }

        tracing::info!(
            "Sweep {}: {} pages checked, {} dropped ({} errors, {} warnings, {} notices)",
            summary.status.as_str(),
            summary.counters.pages,
            summary.counters.dropped,
            summary.counters.error,
            summary.counters.warning,
            summary.counters.notice
        );

        match outcome {
            Ok(()) | Err(SweepError::Cancelled) => Ok(summary),
            Err(e) => Err(e),
        }
    }

    async fn crawl(&mut self, summary: &mut RunSummary, tally: &mut CodeTally) -> Result<()> {
        let mut cancel = self.cancel_rx.clone();

        let credentials = Credentials {
            email: self.config.auth.email.clone(),
            password: self.config.auth.password.clone(),
        };
        let session = Arc::clone(&self.context.session);
        let start = tokio::select! {
            start = session.establish(credentials) => start?,
            _ = cancelled(&mut cancel) => return Err(SweepError::Cancelled),
        };
        tracing::info!("Session established; {} start requests", start.len());

        for request in start {
            let _ = self.scheduler.enqueue(request);
        }

        let mut tasks: JoinSet<Result<PageResult>> = JoinSet::new();
        let mut pages_done: u64 = 0;

        loop {
            while let Some(fetch) = self.scheduler.try_next() {
                let context = Arc::clone(&self.context);
                tasks.spawn(process_page(context, fetch.request, fetch.permit));
            }

            if tasks.is_empty() {
                tracing::info!("Frontier is empty, sweep complete");
                return Ok(());
            }

            let joined = tokio::select! {
                joined = tasks.join_next() => joined,
                _ = cancelled(&mut cancel) => {
                    tasks.abort_all();
                    let pending = self.scheduler.clear();
                    tracing::warn!("Sweep cancelled; {} queued requests abandoned", pending);
                    return Err(SweepError::Cancelled);
                }
            };

            let result = match joined {
                Some(Ok(result)) => result,
                Some(Err(e)) => {
                    tracing::error!("Page task failed: {}", e);
                    continue;
                }
                None => continue,
            };

            match result {
                Ok(page) => self.absorb(page, summary, tally),
                Err(e) if e.is_fatal() => {
                    tasks.abort_all();
                    tracing::error!("Aborting sweep: {}", e);
                    return Err(e);
                }
                Err(e) => tracing::warn!("{}", e),
            }

            pages_done += 1;
            if pages_done % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages processed, {} in frontier, {} in flight",
                    pages_done,
                    self.scheduler.frontier_size(),
                    tasks.len()
                );
            }
        }
    }

    fn absorb(&mut self, page: PageResult, summary: &mut RunSummary, tally: &mut CodeTally) {
        for request in page.again {
            if !self.scheduler.enqueue_again(request.clone()) {
                summary.dropped_urls.push(request.url.to_string());
            }
        }
        for request in page.follow {
            let _ = self.scheduler.enqueue(request);
        }
        if let Some(url) = page.dropped {
            summary.dropped_urls.push(url);
        }
        tally.add_codes(page.codes);
    }
}

/// Runs one request through the page pipeline
async fn process_page(
    context: Arc<PageContext>,
    request: Request,
    _permit: OwnedSemaphorePermit,
) -> Result<PageResult> {
    let page = match context.session.fetch_page(request).await? {
        PageStep::Resume(again) => {
            return Ok(PageResult {
                again,
                ..PageResult::default()
            })
        }
        PageStep::Page(page) => page,
    };

    let mut result = PageResult {
        follow: follow_ups(&context, &page),
        ..PageResult::default()
    };

    if page.status >= 400 {
        tracing::debug!("Not checking {} (HTTP {})", page.url, page.status);
        return Ok(result);
    }

    match context.scope.admission(page.url.as_str()) {
        Admission::Admitted(_) => {}
        _ => return Ok(result),
    }

    if !is_html(&page) {
        tracing::debug!("Not checking {} ({})", page.url, page.content_type);
        return Ok(result);
    }

    let record = PageRecord::new(page.url.to_string(), page.request_headers, page.title);
    match context.stage.check(record, &context.rules).await {
        Ok(report) => {
            result.codes = report.findings.into_iter().map(|f| f.code).collect();
        }
        Err(SweepError::Drop { url, .. }) => result.dropped = Some(url),
        Err(e) => return Err(e),
    }

    Ok(result)
}

/// Links of an HTML page, or units of a course-blocks payload, that may be
/// requested next
fn follow_ups(context: &PageContext, page: &EffectivePage) -> Vec<Request> {
    if !context.follow_links {
        return Vec::new();
    }

    let candidates = if page.content_type.contains("json") {
        course_block_urls(&page.body, &page.url)
    } else if is_html(page) {
        parse_html(&page.body, &page.url).links
    } else {
        Vec::new()
    };

    candidates
        .iter()
        .filter_map(|link| Url::parse(link).ok())
        .filter(|url| {
            let classification = classify_link(url, &context.links);
            if !classification.should_follow() {
                tracing::trace!("Not following {} ({:?})", url, classification);
            }
            classification.should_follow()
        })
        .map(|url| Request::get(url).with_depth(page.depth + 1))
        .collect()
}

fn is_html(page: &EffectivePage) -> bool {
    page.content_type.is_empty() || page.content_type.contains("text/html")
}

/// Start URLs resolved against the base URL; the base URL itself when none
fn start_requests(config: &Config, base_url: &Url) -> Result<Vec<Request>> {
    if config.site.start_urls.is_empty() {
        return Ok(vec![Request::get(base_url.clone())]);
    }

    config
        .site
        .start_urls
        .iter()
        .map(|start| Ok(Request::get(base_url.join(start)?)))
        .collect()
}

/// Runs a complete sweep with the live HTTP client and checker
///
/// Ctrl-C cancels the run: running checkers are killed and the summary is
/// still written.
///
/// # Example
///
/// ```no_run
/// use a11y_sweep::config::load_config_with_hash;
/// use a11y_sweep::crawler::run_sweep;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("sweep.toml"))?;
/// let summary = run_sweep(config, hash).await?;
/// println!("{} pages checked", summary.counters.pages);
/// # Ok(())
/// # }
/// ```
pub async fn run_sweep(config: Config, config_hash: String) -> Result<RunSummary> {
    let mut coordinator = Coordinator::new(config, config_hash).await?;

    let handle = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling sweep");
            handle.cancel();
        }
    });

    coordinator.run().await
}
