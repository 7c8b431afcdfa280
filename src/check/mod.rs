//! The accessibility-check stage
//!
//! Everything between "this page was admitted" and "its report is stored":
//! running the external checker, filtering its findings through ignore
//! rules, checking that checker and crawler saw the same document, and
//! keeping the run's finding totals.

mod checker;
mod counters;
mod findings;
mod ignore;
mod stage;
mod title;

pub use checker::{Checker, CheckerOutput, ProcessChecker};
pub use counters::{CounterSnapshot, RunCounters};
pub use findings::{
    count_by_type, parse_findings, report_key, CheckReport, Finding, FindingType, PageRecord,
};
pub use ignore::{IgnoreRule, IgnoreRules};
pub use stage::{cancelled, write_config_artifact, AccessibilityCheckStage};
pub use title::{check_title_consistency, TitleMismatch};
