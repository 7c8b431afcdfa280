use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Severity of a checker finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingType {
    Error,
    Warning,
    Notice,
    #[serde(other)]
    Unknown,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Unknown => "unknown",
        }
    }
}

impl Default for FindingType {
    fn default() -> Self {
        Self::Unknown
    }
}

/// One accessibility issue reported by the checker
///
/// Unknown keys the checker emits are kept in `extra` so they survive into
/// the persisted report and can be matched by ignore rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type", default)]
    pub kind: FindingType,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub selector: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Finding {
    /// Text of a field by its JSON name, for ignore-rule matching
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "type" => Some(self.kind.as_str().to_string()),
            "code" => Some(self.code.clone()),
            "message" => Some(self.message.clone()),
            "context" => Some(self.context.clone()),
            "selector" => Some(self.selector.clone()),
            other => match self.extra.get(other)? {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                value => Some(value.to_string()),
            },
        }
    }
}

/// Parses the checker's JSON output
///
/// Empty output means no findings.
pub fn parse_findings(stdout: &str) -> serde_json::Result<Vec<Finding>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(stdout)
}

/// A page as it was fetched, handed to the check stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub request_headers: BTreeMap<String, String>,
    #[serde(rename = "page_title")]
    pub title: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

impl PageRecord {
    pub fn new(
        url: impl Into<String>,
        request_headers: BTreeMap<String, String>,
        title: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            request_headers,
            title,
            accessed_at: Utc::now(),
        }
    }

    /// Content-derived record key: hex SHA-256 of URL and access time
    ///
    /// The same URL visited twice gets two keys.
    pub fn report_key(&self) -> String {
        report_key(&self.url, &self.accessed_at)
    }
}

pub fn report_key(url: &str, accessed_at: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(accessed_at.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

/// The unit of persistence: a page and its retained findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    #[serde(flatten)]
    pub page: PageRecord,
    pub findings: Vec<Finding>,
}

impl CheckReport {
    pub fn key(&self) -> String {
        self.page.report_key()
    }

    /// Counts of (error, warning, notice) findings
    pub fn counts(&self) -> (u64, u64, u64) {
        count_by_type(&self.findings)
    }
}

pub fn count_by_type(findings: &[Finding]) -> (u64, u64, u64) {
    findings
        .iter()
        .fold((0, 0, 0), |(e, w, n), finding| match finding.kind {
            FindingType::Error => (e + 1, w, n),
            FindingType::Warning => (e, w + 1, n),
            FindingType::Notice => (e, w, n + 1),
            FindingType::Unknown => (e, w, n),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_findings() {
        let stdout = r#"[
            {"type": "error", "code": "WCAG2AA.H37", "message": "Img missing alt", "context": "<img src=\"x\">", "selector": "body > img", "typeCode": 1},
            {"type": "notice", "message": "spawn more overlords"}
        ]"#;
        let findings = parse_findings(stdout).unwrap();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind, FindingType::Error);
        assert_eq!(findings[0].field("typeCode").as_deref(), Some("1"));
        assert_eq!(findings[1].code, "");
        assert_eq!(findings[1].field("type").as_deref(), Some("notice"));
    }

    #[test]
    fn test_empty_output_has_no_findings() {
        assert!(parse_findings("").unwrap().is_empty());
        assert!(parse_findings("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_type() {
        let findings = parse_findings(r#"[{"type": "fatal"}]"#).unwrap();
        assert_eq!(findings[0].kind, FindingType::Unknown);
    }

    #[test]
    fn test_report_key_depends_on_time() {
        let first = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 1).unwrap();
        let url = "http://localhost:8000/dashboard";

        assert_eq!(report_key(url, &first), report_key(url, &first));
        assert_ne!(report_key(url, &first), report_key(url, &second));
        assert_eq!(report_key(url, &first).len(), 64);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = CheckReport {
            page: PageRecord {
                url: "http://localhost:8000/".to_string(),
                request_headers: BTreeMap::new(),
                title: Some("Home".to_string()),
                accessed_at: Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
            },
            findings: vec![Finding {
                kind: FindingType::Warning,
                ..Finding::default()
            }],
        };
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["url"], "http://localhost:8000/");
        assert_eq!(value["page_title"], "Home");
        assert_eq!(value["findings"][0]["type"], "warning");
        assert_eq!(report.counts(), (0, 1, 0));
    }
}
