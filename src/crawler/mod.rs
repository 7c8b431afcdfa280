//! Crawler module for fetching pages and driving the sweep
//!
//! This module contains the core crawling logic, including:
//! - Request and response types shared with the auth layer
//! - HTTP fetching with manual redirect handling
//! - HTML parsing, link extraction and course-block discovery
//! - Request scheduling and concurrency limits
//! - Overall sweep coordination

mod coordinator;
mod fetcher;
mod parser;
mod request;
mod scheduler;

pub use coordinator::{run_sweep, CancelHandle, Coordinator};
pub use fetcher::{build_http_client, HttpFetcher, PageFetcher, MAX_REDIRECTS};
pub use parser::{course_block_urls, extract_title, parse_html, ParsedPage};
pub use request::{Method, Request, Response};
pub use scheduler::{Rejection, ScheduledFetch, Scheduler};
