use regex::Regex;
use std::collections::BTreeMap;

/// Where technique documentation lives
pub const TECHNIQUES_BASE_URL: &str = "https://www.w3.org/TR/WCAG20-TECHS/";

/// Guideline prefix and technique documentation links of a finding code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeInfo {
    /// e.g. `WCAG2AA.Principle3.Guideline3_2.3_2_1`
    pub base_code: String,
    /// Technique id -> documentation URL
    pub doc_links: BTreeMap<String, String>,
}

/// Splits a finding code into its guideline and technique links
///
/// Codes outside the WCAG2AA sniff naming scheme yield an empty [`CodeInfo`].
pub fn code_info(code: &str) -> CodeInfo {
    parse_code(code).unwrap_or_else(|| {
        tracing::debug!(
            "Code {} doesn't match expected pattern; no documentation links",
            code
        );
        CodeInfo::default()
    })
}

fn parse_code(code: &str) -> Option<CodeInfo> {
    let guideline_pattern = Regex::new(r"^WCAG2AA\.Principle\d\.Guideline[0-9_.]*").ok()?;
    let technique_pattern = Regex::new(r"[A-Z]+\d{1,3}").ok()?;

    let guideline = guideline_pattern.find(code)?;
    let doc_links = technique_pattern
        .find_iter(&code[guideline.end()..])
        .map(|tech| {
            (
                tech.as_str().to_string(),
                format!("{}{}", TECHNIQUES_BASE_URL, tech.as_str()),
            )
        })
        .collect();

    Some(CodeInfo {
        base_code: guideline.as_str().trim_end_matches('.').to_string(),
        doc_links,
    })
}
