//! Output module for run summaries and report statistics
//!
//! This module handles:
//! - Generating the markdown summary of a sweep
//! - Linking finding codes to their technique documentation
//! - Printing statistics of an existing report directory

mod codes;
mod markdown;
pub mod stats;
mod summary;

pub use codes::{code_info, CodeInfo, TECHNIQUES_BASE_URL};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, ReportStatistics};
pub use summary::{CodeTally, OutputError, OutputResult, RunStatus, RunSummary};
