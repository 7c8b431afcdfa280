use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for a11y-sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub checker: CheckerConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The application under test
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Root of the application, e.g. `http://localhost:8000`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Where the crawl begins once a session is established.
    /// Defaults to the base URL.
    #[serde(rename = "start-urls", default)]
    pub start_urls: Vec<String>,

    /// Hosts the crawler may follow links into. Defaults to the base URL's host.
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    /// Regular expressions; matching URLs are never requested
    #[serde(rename = "deny-patterns", default = "default_deny_patterns")]
    pub deny_patterns: Vec<String>,
}

/// Login flow endpoints and optional fixed credentials
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub email: Option<String>,
    pub password: Option<String>,

    #[serde(rename = "login-path", default = "default_login_path")]
    pub login_path: String,

    #[serde(rename = "login-session-path", default = "default_login_session_path")]
    pub login_session_path: String,

    #[serde(rename = "auto-auth-path", default = "default_auto_auth_path")]
    pub auto_auth_path: String,

    /// Extra query parameters sent to the auto-provisioning endpoint
    #[serde(rename = "auto-auth-params", default = "default_auto_auth_params")]
    pub auto_auth_params: BTreeMap<String, String>,

    #[serde(rename = "csrf-cookie", default = "default_csrf_cookie")]
    pub csrf_cookie: String,

    #[serde(rename = "csrf-header", default = "default_csrf_header")]
    pub csrf_header: String,

    /// Text the login endpoint returns when credentials are rejected
    #[serde(rename = "failure-marker", default = "default_failure_marker")]
    pub failure_marker: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum link depth from the start URLs
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of page pipelines in flight
    #[serde(rename = "max-concurrent-pages", default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: u32,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Whole-run deadline; unset means no deadline
    #[serde(rename = "run-timeout-secs", default)]
    pub run_timeout_secs: Option<u64>,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Check only this URL, following no links
    #[serde(rename = "single-url", default)]
    pub single_url: Option<String>,

    /// Times one page may be resumed after re-logins; unset means no limit
    #[serde(rename = "max-resumes", default)]
    pub max_resumes: Option<u32>,
}

/// Which trailing position segments collapse onto their container shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionCollapse {
    /// Every position collapses (`.../baz/1`, `.../baz/2` and `.../baz/` are one page)
    All,
    /// Only the first position collapses onto the shell (`.../baz/1` == `.../baz/`)
    First,
}

/// Canonicalization policy for the scope filter
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Regex over the URL path with a `shell` group and an optional `position` group
    #[serde(rename = "position-pattern", default = "default_position_pattern")]
    pub position_pattern: String,

    #[serde(rename = "position-collapse", default = "default_position_collapse")]
    pub position_collapse: PositionCollapse,
}

/// External accessibility checker invocation
#[derive(Debug, Clone, Deserialize)]
pub struct CheckerConfig {
    #[serde(default = "default_checker_binary")]
    pub binary: String,

    /// Flags appended after `<url> --config=<file>`
    #[serde(default = "default_checker_flags")]
    pub flags: Vec<String>,

    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum checker subprocesses running at once
    #[serde(default = "default_checker_workers")]
    pub workers: u32,

    /// Stderr fragments that mark an otherwise successful exit as transient failure
    #[serde(rename = "transient-signatures", default = "default_transient_signatures")]
    pub transient_signatures: Vec<String>,

    #[serde(rename = "verify-on-start", default = "default_true")]
    pub verify_on_start: bool,
}

/// Where ignore rules come from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgnoreConfig {
    /// A file path or an http(s) URL; unset means no filtering
    pub source: Option<String>,
}

/// Report store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Json,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    #[serde(rename = "reports-dir", default = "default_reports_dir")]
    pub reports_dir: String,

    /// Keep reports from previous runs instead of wiping the directory
    #[serde(rename = "keep-existing", default)]
    pub keep_existing: bool,

    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,

    /// Categories (`error`, `warning`, `notice`, `dropped`) that fail the run when nonzero
    #[serde(rename = "failure-categories", default)]
    pub failure_categories: Vec<String>,
}

fn default_deny_patterns() -> Vec<String> {
    vec![
        r"/logout".to_string(),
        r"://[^/]+/xblock/".to_string(),
        r"\?_accept=application/x-tgz".to_string(),
    ]
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_login_session_path() -> String {
    "/user_api/v1/account/login_session/".to_string()
}

fn default_auto_auth_path() -> String {
    "/auto_auth".to_string()
}

fn default_auto_auth_params() -> BTreeMap<String, String> {
    BTreeMap::from([("staff".to_string(), "true".to_string())])
}

fn default_csrf_cookie() -> String {
    "csrftoken".to_string()
}

fn default_csrf_header() -> String {
    "X-CSRFToken".to_string()
}

fn default_failure_marker() -> String {
    "Email or password is incorrect".to_string()
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_concurrent_pages() -> u32 {
    16
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("a11y-sweep/{}", env!("CARGO_PKG_VERSION"))
}

fn default_position_pattern() -> String {
    r"^(?P<shell>.*/courseware/[^/]+/[^/]+/)(?P<position>\d+)?/?$".to_string()
}

fn default_position_collapse() -> PositionCollapse {
    PositionCollapse::All
}

fn default_checker_binary() -> String {
    "node_modules/.bin/pa11y".to_string()
}

fn default_checker_flags() -> Vec<String> {
    vec![
        "--include-notices".to_string(),
        "--include-warnings".to_string(),
        "--reporter=json".to_string(),
    ]
}

fn default_max_attempts() -> u32 {
    3
}

fn default_checker_workers() -> u32 {
    4
}

fn default_transient_signatures() -> Vec<String> {
    vec!["timed out".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_backend() -> StoreBackend {
    StoreBackend::Json
}

fn default_reports_dir() -> String {
    "a11y_reports".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            login_path: default_login_path(),
            login_session_path: default_login_session_path(),
            auto_auth_path: default_auto_auth_path(),
            auto_auth_params: default_auto_auth_params(),
            csrf_cookie: default_csrf_cookie(),
            csrf_header: default_csrf_header(),
            failure_marker: default_failure_marker(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_concurrent_pages: default_max_concurrent_pages(),
            request_timeout_secs: default_request_timeout(),
            run_timeout_secs: None,
            user_agent: default_user_agent(),
            single_url: None,
            max_resumes: None,
        }
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            position_pattern: default_position_pattern(),
            position_collapse: default_position_collapse(),
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            binary: default_checker_binary(),
            flags: default_checker_flags(),
            max_attempts: default_max_attempts(),
            workers: default_checker_workers(),
            transient_signatures: default_transient_signatures(),
            verify_on_start: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            reports_dir: default_reports_dir(),
            keep_existing: false,
            summary_path: None,
            failure_categories: Vec::new(),
        }
    }
}

impl SiteConfig {
    /// Creates a site config with default deny patterns
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            start_urls: Vec::new(),
            allowed_domains: Vec::new(),
            deny_patterns: default_deny_patterns(),
        }
    }
}

impl Config {
    /// Creates a configuration for `base_url` with every other section defaulted
    pub fn for_site(base_url: impl Into<String>) -> Self {
        Self {
            site: SiteConfig::new(base_url),
            auth: AuthConfig::default(),
            crawler: CrawlerConfig::default(),
            scope: ScopeConfig::default(),
            checker: CheckerConfig::default(),
            ignore: IgnoreConfig::default(),
            output: OutputConfig::default(),
        }
    }
}
