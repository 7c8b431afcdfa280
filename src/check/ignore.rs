use crate::check::findings::Finding;
use crate::url::GlobPattern;
use crate::{ConfigError, Result, SweepError};
use serde_yaml::Value;
use std::path::Path;

/// One suppression rule: every field glob must match for a finding to go
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    matchers: Vec<(String, GlobPattern)>,
}

impl IgnoreRule {
    pub fn new<'a>(matchers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            matchers: matchers
                .into_iter()
                .map(|(field, pattern)| (field.to_string(), GlobPattern::new(pattern)))
                .collect(),
        }
    }

    /// True if all field patterns match; a field the finding lacks never matches
    pub fn matches(&self, finding: &Finding) -> bool {
        self.matchers.iter().all(|(field, pattern)| {
            finding
                .field(field)
                .map(|value| pattern.is_match(&value))
                .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone)]
struct RuleGroup {
    url_glob: GlobPattern,
    rules: Vec<IgnoreRule>,
}

/// Ignore rules grouped by URL glob, in declaration order
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    groups: Vec<RuleGroup>,
}

impl IgnoreRules {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.rules.len()).sum()
    }

    /// Adds a group of rules for URLs matching `url_glob`
    pub fn push(&mut self, url_glob: &str, rules: Vec<IgnoreRule>) {
        self.groups.push(RuleGroup {
            url_glob: GlobPattern::new(url_glob),
            rules,
        });
    }

    /// Parses a YAML (or JSON) mapping of URL glob to a list of `{field: glob}` rules
    ///
    /// An empty document yields no rules.
    pub fn parse(text: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(text)?;

        let mapping = match document {
            Value::Null => return Ok(Self::empty()),
            Value::Mapping(mapping) => mapping,
            _ => return Err(invalid("top level must be a mapping of URL globs")),
        };

        let mut rules = Self::empty();
        for (url_glob, entries) in mapping {
            let url_glob = scalar(&url_glob)
                .ok_or_else(|| invalid("URL glob keys must be strings"))?;

            let entries = match entries {
                Value::Sequence(entries) => entries,
                Value::Null => Vec::new(),
                _ => return Err(invalid(&format!("rules for '{}' must be a list", url_glob))),
            };

            let mut group = Vec::with_capacity(entries.len());
            for entry in entries {
                let Value::Mapping(fields) = entry else {
                    return Err(invalid(&format!(
                        "each rule for '{}' must be a mapping of field to glob",
                        url_glob
                    )));
                };

                let mut matchers = Vec::with_capacity(fields.len());
                for (field, pattern) in fields {
                    match (scalar(&field), scalar(&pattern)) {
                        (Some(field), Some(pattern)) => matchers.push((field, pattern)),
                        _ => {
                            return Err(invalid(&format!(
                                "rule fields for '{}' must be scalars",
                                url_glob
                            )))
                        }
                    }
                }

                group.push(IgnoreRule::new(
                    matchers.iter().map(|(f, p)| (f.as_str(), p.as_str())),
                ));
            }

            rules.push(&url_glob, group);
        }

        Ok(rules)
    }

    /// Loads rules from a file path or an http(s) URL
    ///
    /// No source means no filtering.
    pub async fn load(source: Option<&str>, client: &reqwest::Client) -> Result<Self> {
        let Some(source) = source else {
            return Ok(Self::empty());
        };

        let text = if source.starts_with("http://") || source.starts_with("https://") {
            client
                .get(source)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| SweepError::Http {
                    url: source.to_string(),
                    source: e,
                })?
                .text()
                .await?
        } else {
            tokio::fs::read_to_string(Path::new(source)).await?
        };

        let rules = Self::parse(&text)?;
        tracing::info!("Loaded {} ignore rules from {}", rules.len(), source);
        Ok(rules)
    }

    /// Removes findings suppressed by any rule whose URL glob matches `url`
    ///
    /// Rules only ever remove findings.
    pub fn filter(&self, url: &str, findings: Vec<Finding>) -> Vec<Finding> {
        let applicable: Vec<&IgnoreRule> = self
            .groups
            .iter()
            .filter(|group| group.url_glob.is_match(url))
            .flat_map(|group| group.rules.iter())
            .collect();

        if applicable.is_empty() {
            return findings;
        }

        findings
            .into_iter()
            .filter(|finding| !applicable.iter().any(|rule| rule.matches(finding)))
            .collect()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn invalid(message: &str) -> SweepError {
    SweepError::Config(ConfigError::Validation(format!(
        "Invalid ignore rules: {}",
        message
    )))
}
