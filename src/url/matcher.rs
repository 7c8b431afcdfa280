use globset::{Glob, GlobMatcher};

/// Checks a shell-style glob against an arbitrary string
///
/// Follows `fnmatch` semantics: `*` matches any run of characters including
/// `/`, `?` matches one character and `[seq]` matches a character class. A
/// pattern that is not a valid glob only matches itself literally.
///
/// # Arguments
///
/// * `pattern` - The glob pattern
/// * `candidate` - The text to test
///
/// # Examples
///
/// ```
/// use a11y_sweep::url::glob_matches;
///
/// assert!(glob_matches("*/courses/*", "https://lms.test/courses/x/info"));
/// assert!(glob_matches("WCAG2AA.*.H30", "WCAG2AA.Principle1.Guideline1_1.H30"));
/// assert!(!glob_matches("*/courses/*", "https://lms.test/dashboard"));
/// ```
pub fn glob_matches(pattern: &str, candidate: &str) -> bool {
    match compile_glob(pattern) {
        Some(matcher) => matcher.is_match(candidate),
        None => pattern == candidate,
    }
}

/// Compiles a glob once for repeated matching
///
/// Returns `None` when the pattern is not valid glob syntax.
pub fn compile_glob(pattern: &str) -> Option<GlobMatcher> {
    Glob::new(pattern).ok().map(|glob| glob.compile_matcher())
}

/// A glob that falls back to literal comparison when it fails to compile
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    matcher: Option<GlobMatcher>,
}

impl GlobPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let matcher = compile_glob(&raw);
        Self { raw, matcher }
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(candidate),
            None => self.raw == candidate,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(glob_matches("WCAG2AA.H30", "WCAG2AA.H30"));
        assert!(!glob_matches("WCAG2AA.H30", "WCAG2AA.H31"));
    }

    #[test]
    fn test_star_crosses_slashes() {
        assert!(glob_matches(
            "*courseware*",
            "https://lms.test/courses/foo/courseware/bar/baz/"
        ));
        assert!(glob_matches("https://lms.test/*", "https://lms.test/a/b/c"));
    }

    #[test]
    fn test_star_matches_empty() {
        assert!(glob_matches("*", ""));
        assert!(glob_matches("abc*", "abc"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_matches("H3?", "H30"));
        assert!(!glob_matches("H3?", "H3"));
    }

    #[test]
    fn test_character_class() {
        assert!(glob_matches("H3[0-9]", "H37"));
        assert!(!glob_matches("H3[0-9]", "H3x"));
    }

    #[test]
    fn test_whole_string_anchored() {
        assert!(!glob_matches("courses", "https://lms.test/courses"));
    }

    #[test]
    fn test_invalid_glob_falls_back_to_literal() {
        assert!(glob_matches("[unclosed", "[unclosed"));
        assert!(!glob_matches("[unclosed", "unclosed"));
    }

    #[test]
    fn test_glob_pattern_reuse() {
        let pattern = GlobPattern::new("*/dashboard");
        assert!(pattern.is_match("https://lms.test/dashboard"));
        assert!(!pattern.is_match("https://lms.test/dashboard/extra"));
        assert_eq!(pattern.as_str(), "*/dashboard");
    }
}
