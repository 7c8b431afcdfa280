use crate::config::types::{
    AuthConfig, CheckerConfig, Config, CrawlerConfig, OutputConfig, ScopeConfig, SiteConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Categories accepted in `output.failure-categories`
pub const FAILURE_CATEGORIES: &[&str] = &["error", "warning", "notice", "dropped"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_auth_config(&config.auth)?;
    validate_crawler_config(&config.crawler)?;
    validate_scope_config(&config.scope)?;
    validate_checker_config(&config.checker)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    for start in &config.start_urls {
        validate_http_url("start-urls", start)?;
    }

    for pattern in &config.deny_patterns {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid deny pattern '{}': {}", pattern, e))
        })?;
    }

    Ok(())
}

/// Validates auth configuration
///
/// Credentials are all-or-nothing: one without the other cannot log in and
/// cannot fall back to auto-auth either.
fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    match (&config.email, &config.password) {
        (Some(_), None) | (None, Some(_)) => {
            return Err(ConfigError::Validation(
                "auth.email and auth.password must be set together, or both omitted to use auto-auth"
                    .to_string(),
            ));
        }
        _ => {}
    }

    for (name, path) in [
        ("login-path", &config.login_path),
        ("login-session-path", &config.login_session_path),
        ("auto-auth-path", &config.auto_auth_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "auth.{} must be an absolute path, got '{}'",
                name, path
            )));
        }
    }

    if config.csrf_cookie.is_empty() || config.csrf_header.is_empty() {
        return Err(ConfigError::Validation(
            "csrf-cookie and csrf-header cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_pages < 1 || config.max_concurrent_pages > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-pages must be between 1 and 100, got {}",
            config.max_concurrent_pages
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(single) = &config.single_url {
        validate_http_url("single-url", single)?;
    }

    if config.max_resumes == Some(0) {
        return Err(ConfigError::Validation(
            "max-resumes must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// The position pattern must name a `shell` group; `position` is optional
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    let regex = Regex::new(&config.position_pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!("Invalid position-pattern: {}", e))
    })?;

    if !regex.capture_names().any(|name| name == Some("shell")) {
        return Err(ConfigError::InvalidPattern(
            "position-pattern must contain a named group 'shell'".to_string(),
        ));
    }

    Ok(())
}

fn validate_checker_config(config: &CheckerConfig) -> Result<(), ConfigError> {
    if config.binary.is_empty() {
        return Err(ConfigError::Validation(
            "checker.binary cannot be empty".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "checker.max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.workers < 1 {
        return Err(ConfigError::Validation(format!(
            "checker.workers must be >= 1, got {}",
            config.workers
        )));
    }

    if config.flags.iter().any(|flag| flag.starts_with("--config")) {
        return Err(ConfigError::Validation(
            "checker.flags cannot override --config; it is generated per page".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.reports_dir.is_empty() {
        return Err(ConfigError::Validation(
            "reports-dir cannot be empty".to_string(),
        ));
    }

    for category in &config.failure_categories {
        if !FAILURE_CATEGORIES.contains(&category.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown failure category '{}', expected one of {:?}",
                category, FAILURE_CATEGORIES
            )));
        }
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, value
        )));
    }

    Ok(())
}
