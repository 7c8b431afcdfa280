//! Admission control for crawled pages
//!
//! The [`ScopeFilter`] decides whether a page whose response has been fetched
//! should be checked. It keys pages by canonical URL so alias URLs (a stray
//! `next` parameter, a different position inside the same container view)
//! are checked once per run.

use crate::config::ScopeConfig;
use crate::url::{canonicalize, PositionPolicy};
use crate::ConfigError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Path prefix of non-HTML API endpoints
pub const API_PREFIX: &str = "/api/";

/// Outcome of an admission decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// First sighting of this canonical URL; carries the key
    Admitted(String),
    /// The canonical URL was admitted before
    Duplicate(String),
    /// API-namespaced path; rejected regardless of history
    ApiRejected,
    /// Not an absolute http(s) URL
    Malformed,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }

    /// Short reason used in drop log lines and the run summary
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Admitted(_) => "admitted",
            Self::Duplicate(_) => "duplicate",
            Self::ApiRejected => "api",
            Self::Malformed => "malformed",
        }
    }
}

/// Counts of rejected pages, by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeStats {
    pub admitted: u64,
    pub duplicates: u64,
    pub api_rejected: u64,
    pub malformed: u64,
}

/// Run-scoped seen-set over canonical URLs
///
/// Admission is linearized by a mutex around the seen-set: of two concurrent
/// first sightings of one canonical URL exactly one is admitted. Admitted
/// keys are never evicted.
#[derive(Debug)]
pub struct ScopeFilter {
    policy: PositionPolicy,
    seen: Mutex<HashSet<String>>,
    duplicates: AtomicU64,
    api_rejected: AtomicU64,
    malformed: AtomicU64,
}

impl ScopeFilter {
    pub fn new(policy: PositionPolicy) -> Self {
        Self {
            policy,
            seen: Mutex::new(HashSet::new()),
            duplicates: AtomicU64::new(0),
            api_rejected: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(PositionPolicy::from_config(config)?))
    }

    /// Returns true the first time a canonical URL is seen, false otherwise
    pub fn admit(&self, raw_url: &str) -> bool {
        self.admission(raw_url).is_admitted()
    }

    /// Decides admission and reports why a URL was rejected
    pub fn admission(&self, raw_url: &str) -> Admission {
        let canonical = match canonicalize(raw_url, &self.policy) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Scope drop (malformed): {} ({})", raw_url, e);
                self.malformed.fetch_add(1, Ordering::Relaxed);
                return Admission::Malformed;
            }
        };

        if canonical.path().starts_with(API_PREFIX) {
            tracing::debug!("Scope drop (api): {}", raw_url);
            self.api_rejected.fetch_add(1, Ordering::Relaxed);
            return Admission::ApiRejected;
        }

        let key = canonical.to_string();
        let inserted = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());

        if inserted {
            Admission::Admitted(key)
        } else {
            tracing::debug!("Scope drop (duplicate): {} -> {}", raw_url, key);
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            Admission::Duplicate(key)
        }
    }

    /// Canonical key of a URL without recording it
    pub fn canonical_key(&self, raw_url: &str) -> Option<String> {
        canonicalize(raw_url, &self.policy)
            .ok()
            .map(|url| url.to_string())
    }

    pub fn stats(&self) -> ScopeStats {
        ScopeStats {
            admitted: self.seen.lock().unwrap_or_else(PoisonError::into_inner).len() as u64,
            duplicates: self.duplicates.load(Ordering::Relaxed),
            api_rejected: self.api_rejected.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

impl Default for ScopeFilter {
    fn default() -> Self {
        Self::new(PositionPolicy::default())
    }
}
