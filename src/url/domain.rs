use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use a11y_sweep::url::extract_domain;
///
/// let url = Url::parse("https://LMS.example.com:8000/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("lms.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks a host against a domain pattern
///
/// `example.com` matches only itself; `*.example.com` matches the bare
/// domain and any subdomain of it.
pub fn domain_matches(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_lowercase();
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Returns true if the URL's host matches any allowed domain pattern
///
/// An empty allow-list admits nothing.
pub fn is_allowed_domain(url: &Url, allowed: &[String]) -> bool {
    match extract_domain(url) {
        Some(domain) => allowed.iter().any(|p| domain_matches(p, &domain)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://localhost:8000/login").unwrap();
        assert_eq!(extract_domain(&url), Some("localhost".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_exact_domain_match() {
        assert!(domain_matches("lms.test", "lms.test"));
        assert!(!domain_matches("lms.test", "studio.lms.test"));
    }

    #[test]
    fn test_wildcard_domain_match() {
        assert!(domain_matches("*.lms.test", "lms.test"));
        assert!(domain_matches("*.lms.test", "preview.lms.test"));
        assert!(!domain_matches("*.lms.test", "mylms.test"));
    }

    #[test]
    fn test_pattern_case_insensitive() {
        assert!(domain_matches("LMS.test", "lms.test"));
    }

    #[test]
    fn test_is_allowed_domain() {
        let allowed = vec!["localhost".to_string(), "*.edx.test".to_string()];
        let inside = Url::parse("http://localhost:8000/dashboard").unwrap();
        let sub = Url::parse("https://courses.edx.test/").unwrap();
        let outside = Url::parse("https://www.w3.org/WAI/").unwrap();

        assert!(is_allowed_domain(&inside, &allowed));
        assert!(is_allowed_domain(&sub, &allowed));
        assert!(!is_allowed_domain(&outside, &allowed));
        assert!(!is_allowed_domain(&inside, &[]));
    }
}
