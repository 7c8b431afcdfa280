//! Scheduler for managing the crawl frontier and page concurrency
//!
//! This module handles:
//! - Priority queue of pending requests (shallowest first)
//! - Request-level dedup by fingerprint
//! - The depth limit
//! - Global concurrency limiting via a semaphore

use crate::crawler::request::Request;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A request queued for fetching
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request: Request,

    /// Insertion order; breaks ties so equal depths are fetched FIFO
    seq: u64,
}

// Lower depth (then earlier insertion) is popped first from the BinaryHeap
impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .request
            .depth
            .cmp(&self.request.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedRequest {}

/// A scheduled fetch with a semaphore permit
pub struct ScheduledFetch {
    pub request: Request,

    /// Released when the page pipeline finishes
    pub permit: OwnedSemaphorePermit,
}

/// Why a request was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Seen,
    TooDeep,
}

/// Scheduler manages the frontier queue and page concurrency
pub struct Scheduler {
    /// Global semaphore for limiting concurrent page pipelines
    semaphore: Arc<Semaphore>,

    /// Frontier priority queue of requests to fetch
    frontier: BinaryHeap<QueuedRequest>,

    /// Fingerprints of every request ever queued
    seen: HashSet<String>,

    /// How often each fingerprint was queued again after a re-login
    repeats: HashMap<String, u32>,

    /// Re-queues allowed per request; `None` resumes without limit
    max_repeats: Option<u32>,

    max_depth: u32,
    next_seq: u64,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_concurrent` - Maximum page pipelines in flight
    /// * `max_depth` - Deepest link depth that is still fetched
    pub fn new(max_concurrent: usize, max_depth: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            frontier: BinaryHeap::new(),
            seen: HashSet::new(),
            repeats: HashMap::new(),
            max_repeats: None,
            max_depth,
            next_seq: 0,
        }
    }

    /// Gives up on a request once it was queued again `limit` times
    pub fn with_max_repeats(mut self, limit: Option<u32>) -> Self {
        self.max_repeats = limit;
        self
    }

    /// Queues a request unless an identical one was already queued or it is
    /// beyond the depth limit
    pub fn enqueue(&mut self, request: Request) -> Result<(), Rejection> {
        if request.depth > self.max_depth {
            tracing::trace!("Depth limit: {}", request.url);
            return Err(Rejection::TooDeep);
        }
        if !self.seen.insert(request.fingerprint()) {
            tracing::trace!("Already queued: {}", request.url);
            return Err(Rejection::Seen);
        }
        self.push(request);
        Ok(())
    }

    /// Queues a request bypassing dedup
    ///
    /// Used to re-fetch a page after the session was re-established; its
    /// fingerprint was already recorded on the first attempt. Unlimited
    /// unless a repeat limit was set; returns false once it is exhausted.
    pub fn enqueue_again(&mut self, request: Request) -> bool {
        let fingerprint = request.fingerprint();
        let repeats = self.repeats.entry(fingerprint.clone()).or_insert(0);
        if let Some(limit) = self.max_repeats {
            if *repeats >= limit {
                tracing::warn!(
                    "Giving up on {}: still logged out after {} re-logins",
                    request.url,
                    limit
                );
                return false;
            }
        }
        *repeats += 1;

        self.seen.insert(fingerprint);
        self.push(request);
        true
    }

    fn push(&mut self, request: Request) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frontier.push(QueuedRequest { request, seq });
    }

    /// Pops the next request if a concurrency slot is free
    ///
    /// # Returns
    ///
    /// * `Some(ScheduledFetch)` - A request with its permit
    /// * `None` - The frontier is empty or every slot is taken
    pub fn try_next(&mut self) -> Option<ScheduledFetch> {
        if self.frontier.is_empty() {
            return None;
        }
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        let queued = self.frontier.pop()?;
        Some(ScheduledFetch {
            request: queued.request,
            permit,
        })
    }

    /// Returns the number of requests in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Drops every pending request
    pub fn clear(&mut self) -> usize {
        let dropped = self.frontier.len();
        self.frontier.clear();
        dropped
    }
}
