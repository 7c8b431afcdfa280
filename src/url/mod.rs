//! URL handling for a11y-sweep
//!
//! Canonicalization (the dedup key of a page), glob and domain matching, and
//! the link classification applied before a discovered link is requested.

mod domain;
mod matcher;
mod normalize;

use crate::config::SiteConfig;
use crate::ConfigError;
use regex::Regex;
use url::Url;

pub use domain::{domain_matches, extract_domain, is_allowed_domain};
pub use matcher::{compile_glob, glob_matches, GlobPattern};
pub use normalize::{
    canonicalize, query_param, remove_query_param, PositionPolicy, NEXT_PARAM,
};

/// What the crawler does with a discovered link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkClassification {
    /// In an allowed domain and not denied; may be requested
    Follow,
    /// Host is outside the allowed domains
    OffSite,
    /// Matches a deny pattern (logout, raw xblock views, downloads)
    Denied,
}

impl LinkClassification {
    pub fn should_follow(&self) -> bool {
        matches!(self, Self::Follow)
    }
}

/// Compiled link rules derived from the site configuration
#[derive(Debug, Clone)]
pub struct LinkRules {
    allowed_domains: Vec<String>,
    deny: Vec<Regex>,
}

impl LinkRules {
    /// Builds rules from the site section
    ///
    /// An empty `allowed-domains` list defaults to the host of `base-url`.
    pub fn from_site(site: &SiteConfig) -> Result<Self, ConfigError> {
        let mut allowed_domains = site.allowed_domains.clone();
        if allowed_domains.is_empty() {
            let base = Url::parse(&site.base_url)
                .map_err(|e| ConfigError::InvalidUrl(format!("base-url: {}", e)))?;
            let host = extract_domain(&base)
                .ok_or_else(|| ConfigError::InvalidUrl("base-url has no host".to_string()))?;
            allowed_domains.push(host);
        }

        let deny = site
            .deny_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    ConfigError::InvalidPattern(format!("Invalid deny pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allowed_domains,
            deny,
        })
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }
}

/// Classifies a link against the rules
///
/// Deny patterns are checked first so a denied URL is reported as denied
/// even when it is also off-site.
pub fn classify_link(url: &Url, rules: &LinkRules) -> LinkClassification {
    let text = url.as_str();
    if rules.deny.iter().any(|re| re.is_match(text)) {
        return LinkClassification::Denied;
    }

    if !is_allowed_domain(url, &rules.allowed_domains) {
        return LinkClassification::OffSite;
    }

    LinkClassification::Follow
}
