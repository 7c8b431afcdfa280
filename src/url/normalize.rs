use crate::config::{PositionCollapse, ScopeConfig};
use crate::{ConfigError, UrlError};
use regex::Regex;
use url::Url;

/// Query parameter carrying a post-login redirect target rather than page identity
pub const NEXT_PARAM: &str = "next";

/// Path-shape policy for "sequence of positions within a container" pages
///
/// The pattern runs against the URL path. Its `shell` group is the container
/// view every position renders inside; the optional `position` group is the
/// trailing segment that gets stripped.
#[derive(Debug, Clone)]
pub struct PositionPolicy {
    pattern: Option<Regex>,
    collapse: PositionCollapse,
}

impl PositionPolicy {
    pub fn new(pattern: &str, collapse: PositionCollapse) -> Result<Self, ConfigError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("position-pattern: {}", e)))?;
        Ok(Self {
            pattern: Some(pattern),
            collapse,
        })
    }

    pub fn from_config(config: &ScopeConfig) -> Result<Self, ConfigError> {
        Self::new(&config.position_pattern, config.position_collapse)
    }

    /// A policy that never collapses anything
    pub fn disabled() -> Self {
        Self {
            pattern: None,
            collapse: PositionCollapse::All,
        }
    }

    /// Returns the path with its trailing position stripped, or `None` when
    /// the path is not a positional view (or its position does not collapse).
    pub fn collapse(&self, path: &str) -> Option<String> {
        let captures = self.pattern.as_ref()?.captures(path)?;
        let shell = captures.name("shell")?.as_str();

        match captures.name("position").map(|m| m.as_str()) {
            None => Some(shell.to_string()),
            Some(_) if self.collapse == PositionCollapse::All => Some(shell.to_string()),
            Some("1") => Some(shell.to_string()),
            Some(_) => None,
        }
    }
}

impl Default for PositionPolicy {
    fn default() -> Self {
        Self::from_config(&ScopeConfig::default()).unwrap_or_else(|_| Self::disabled())
    }
}

/// Derives the canonical dedup key of a raw URL
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed or not http(s)
/// 2. Drop every `next` query parameter, keeping the others in order
/// 3. Drop the fragment
/// 4. Strip the trailing position segment of positional container paths
///
/// No other query parameter is touched: two URLs differing by any other
/// parameter are distinct pages.
///
/// # Examples
///
/// ```
/// use a11y_sweep::url::{canonicalize, PositionPolicy};
///
/// let policy = PositionPolicy::default();
/// let key = canonicalize("https://lms.test/register?next=/dashboard", &policy).unwrap();
/// assert_eq!(key.as_str(), "https://lms.test/register");
/// ```
pub fn canonicalize(raw: &str, policy: &PositionPolicy) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    remove_query_param(&mut url, NEXT_PARAM);
    url.set_fragment(None);

    if let Some(shell) = policy.collapse(url.path()) {
        url.set_path(&shell);
    }

    Ok(url)
}

/// Removes every occurrence of `name` from the query string
pub fn remove_query_param(url: &mut Url, name: &str) {
    if url.query().is_none() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// Returns the first value of query parameter `name`, if present
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> String {
        canonicalize(raw, &PositionPolicy::default())
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_next_param_removed() {
        assert_eq!(
            key("https://courses.test/register?next=foo"),
            "https://courses.test/register"
        );
        assert_eq!(
            key("https://courses.test/register?next=foo"),
            key("https://courses.test/register?next=bar")
        );
    }

    #[test]
    fn test_other_params_kept_in_order() {
        assert_eq!(
            key("https://courses.test/search?q=a11y&next=/x&page=2"),
            "https://courses.test/search?q=a11y&page=2"
        );
    }

    #[test]
    fn test_other_params_distinguish_pages() {
        assert_ne!(
            key("https://courses.test/register?foo=bar"),
            key("https://courses.test/register")
        );
    }

    #[test]
    fn test_fragment_removed() {
        assert_eq!(
            key("https://courses.test/page#main"),
            "https://courses.test/page"
        );
    }

    #[test]
    fn test_positions_collapse_onto_shell() {
        let shell = key("https://courses.test/courses/foo/courseware/bar/baz/");
        assert_eq!(key("https://courses.test/courses/foo/courseware/bar/baz/1"), shell);
        assert_eq!(key("https://courses.test/courses/foo/courseware/bar/baz/2"), shell);
        assert_eq!(key("https://courses.test/courses/foo/courseware/bar/baz/7/"), shell);
    }

    #[test]
    fn test_distinct_containers_stay_distinct() {
        assert_ne!(
            key("https://courses.test/courses/foo/courseware/bar/baz/1"),
            key("https://courses.test/courses/quux/courseware/bar/baz/1")
        );
    }

    #[test]
    fn test_non_numeric_trailing_segment_untouched() {
        assert_eq!(
            key("https://courses.test/courses/foo/courseware/bar/baz/progress"),
            "https://courses.test/courses/foo/courseware/bar/baz/progress"
        );
    }

    #[test]
    fn test_first_only_policy() {
        let policy = PositionPolicy::new(
            &ScopeConfig::default().position_pattern,
            PositionCollapse::First,
        )
        .unwrap();
        let shell = canonicalize("https://c.test/courses/foo/courseware/bar/baz/", &policy).unwrap();
        let first = canonicalize("https://c.test/courses/foo/courseware/bar/baz/1", &policy).unwrap();
        let second =
            canonicalize("https://c.test/courses/foo/courseware/bar/baz/2", &policy).unwrap();

        assert_eq!(shell, first);
        assert_ne!(shell, second);
    }

    #[test]
    fn test_custom_pattern() {
        let policy = PositionPolicy::new(
            r"^(?P<shell>/units/[^/]+/)(?P<position>\d+)$",
            PositionCollapse::All,
        )
        .unwrap();
        assert_eq!(policy.collapse("/units/abc/4").as_deref(), Some("/units/abc/"));
        assert_eq!(policy.collapse("/other/abc/4"), None);
    }

    #[test]
    fn test_invalid_scheme() {
        let result = canonicalize("ftp://example.com/page", &PositionPolicy::default());
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(canonicalize("not a url", &PositionPolicy::default()).is_err());
    }

    #[test]
    fn test_query_param_lookup() {
        let url = Url::parse("http://localhost:8000/login?next=%2Ffoo%2Fbar").unwrap();
        assert_eq!(query_param(&url, "next").as_deref(), Some("/foo/bar"));
        assert_eq!(query_param(&url, "missing"), None);
    }
}
