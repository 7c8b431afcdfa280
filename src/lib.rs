//! a11y-sweep: an authenticated accessibility crawler
//!
//! This crate crawls a web application under test, keeps a logged-in session
//! alive across silent session expiry, visits every canonical page once and
//! runs an external accessibility checker against it, persisting one JSON
//! report per checked page.

pub mod auth;
pub mod check;
pub mod config;
pub mod crawler;
pub mod output;
pub mod scope;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for a11y-sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session could not be established (missing CSRF token, malformed
    /// auto-auth payload). Fatal for the run.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Explicit credentials were rejected. Fatal for the run; never carries
    /// the email or password.
    #[error("Login failed: {0}")]
    AuthFailure(String),

    /// The checker exhausted its attempts for a page. Page-scoped.
    #[error("Couldn't get checker results for {url}. Error:\n{stderr}")]
    Drop { url: String, stderr: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    /// Returns true if this error invalidates the whole run rather than a
    /// single page.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Protocol(_) | Self::AuthFailure(_) | Self::Cancelled
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Checker not available: {0}")]
    CheckerMissing(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for a11y-sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use auth::{AuthController, AuthState, Credentials};
pub use check::{AccessibilityCheckStage, CheckReport, Finding, PageRecord, RunCounters};
pub use config::Config;
pub use scope::{Admission, ScopeFilter};
pub use crate::url::{canonicalize, PositionPolicy};
