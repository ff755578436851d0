//! # Statistics Module
//!
//! Atomic counters covering every stage of a crawl run.
//!
//! ## Overview
//!
//! The `StatCollector` tracks per-stage counters throughout the crawling
//! process: fetch, parse and save attempts with their outcomes, link
//! discovery and admission, proxy pool activity, and capability failures.
//! This data is essential for monitoring crawl progress and diagnosing
//! misbehaving capabilities or filters.
//!
//! ## Key Metrics Tracked
//!
//! - **Stage Metrics**: Attempted, succeeded, retried, and dropped tasks per stage
//! - **Link Metrics**: Links discovered by parsers and links admitted by the filter
//! - **Proxy Metrics**: Proxies served, retired, and pool refreshes
//! - **Failure Metrics**: Capability errors and panics absorbed by the engine
//!
//! ## Features
//!
//! - **Thread-Safe**: Plain atomic counters, updated from any worker without locks
//! - **Real-Time Monitoring**: Counters can be read while the crawl is still running
//! - **JSON Export**: Serializes the current counters for reporting
//!
//! ## Example
//!
//! ```rust,ignore
//! use webspider::StatCollector;
//!
//! let stats = spider.get_stats();
//!
//! // During crawling, metrics are automatically updated.
//! println!("{}", stats);
//! println!("{}", stats.to_json_string_pretty().unwrap());
//! ```

use crate::error::SpiderError;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

// Point-in-time copy of the counters. Display and the derived
// rates both read from here instead of racing the live atomics.
struct StatsSnapshot {
    fetch_attempted: usize,
    fetch_succeeded: usize,
    fetch_retried: usize,
    fetch_dropped: usize,
    parse_attempted: usize,
    parse_succeeded: usize,
    parse_retried: usize,
    parse_dropped: usize,
    save_attempted: usize,
    save_succeeded: usize,
    save_retried: usize,
    save_dropped: usize,
    links_discovered: usize,
    links_admitted: usize,
    capability_failures: usize,
    proxies_served: usize,
    proxies_retired: usize,
    proxy_refreshes: usize,
    elapsed_duration: Duration,
}

impl StatsSnapshot {
    fn formatted_duration(&self) -> String {
        format!("{:?}", self.elapsed_duration)
    }

    fn fetches_per_second(&self) -> f64 {
        let total_seconds = self.elapsed_duration.as_secs();
        if total_seconds > 0 {
            self.fetch_succeeded as f64 / total_seconds as f64
        } else {
            0.0
        }
    }

    fn saves_per_second(&self) -> f64 {
        let total_seconds = self.elapsed_duration.as_secs();
        if total_seconds > 0 {
            self.save_succeeded as f64 / total_seconds as f64
        } else {
            0.0
        }
    }
}

/// Per-stage counters for a crawl run, shared by all worker pools.
#[derive(Debug, serde::Serialize)]
pub struct StatCollector {
    #[serde(skip)]
    pub start_time: Instant,

    // Fetch-stage metrics
    pub fetch_attempted: AtomicUsize,
    pub fetch_succeeded: AtomicUsize,
    pub fetch_retried: AtomicUsize,
    pub fetch_dropped: AtomicUsize,

    // Parse-stage metrics
    pub parse_attempted: AtomicUsize,
    pub parse_succeeded: AtomicUsize,
    pub parse_retried: AtomicUsize,
    pub parse_dropped: AtomicUsize,

    // Save-stage metrics
    pub save_attempted: AtomicUsize,
    pub save_succeeded: AtomicUsize,
    pub save_retried: AtomicUsize,
    pub save_dropped: AtomicUsize,

    // Link-discovery metrics
    pub links_discovered: AtomicUsize,
    pub links_admitted: AtomicUsize,

    // Errors and panics absorbed from capability calls
    pub capability_failures: AtomicUsize,

    // Proxy-pool metrics
    pub proxies_served: AtomicUsize,
    pub proxies_retired: AtomicUsize,
    pub proxy_refreshes: AtomicUsize,
}

impl StatCollector {
    /// Creates a collector with every counter at zero and the clock started.
    pub(crate) fn new() -> Self {
        StatCollector {
            start_time: Instant::now(),
            fetch_attempted: AtomicUsize::new(0),
            fetch_succeeded: AtomicUsize::new(0),
            fetch_retried: AtomicUsize::new(0),
            fetch_dropped: AtomicUsize::new(0),
            parse_attempted: AtomicUsize::new(0),
            parse_succeeded: AtomicUsize::new(0),
            parse_retried: AtomicUsize::new(0),
            parse_dropped: AtomicUsize::new(0),
            save_attempted: AtomicUsize::new(0),
            save_succeeded: AtomicUsize::new(0),
            save_retried: AtomicUsize::new(0),
            save_dropped: AtomicUsize::new(0),
            links_discovered: AtomicUsize::new(0),
            links_admitted: AtomicUsize::new(0),
            capability_failures: AtomicUsize::new(0),
            proxies_served: AtomicUsize::new(0),
            proxies_retired: AtomicUsize::new(0),
            proxy_refreshes: AtomicUsize::new(0),
        }
    }

    /// Loads every counter once so presentation works from one coherent view.
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetch_attempted: self.fetch_attempted.load(Ordering::SeqCst),
            fetch_succeeded: self.fetch_succeeded.load(Ordering::SeqCst),
            fetch_retried: self.fetch_retried.load(Ordering::SeqCst),
            fetch_dropped: self.fetch_dropped.load(Ordering::SeqCst),
            parse_attempted: self.parse_attempted.load(Ordering::SeqCst),
            parse_succeeded: self.parse_succeeded.load(Ordering::SeqCst),
            parse_retried: self.parse_retried.load(Ordering::SeqCst),
            parse_dropped: self.parse_dropped.load(Ordering::SeqCst),
            save_attempted: self.save_attempted.load(Ordering::SeqCst),
            save_succeeded: self.save_succeeded.load(Ordering::SeqCst),
            save_retried: self.save_retried.load(Ordering::SeqCst),
            save_dropped: self.save_dropped.load(Ordering::SeqCst),
            links_discovered: self.links_discovered.load(Ordering::SeqCst),
            links_admitted: self.links_admitted.load(Ordering::SeqCst),
            capability_failures: self.capability_failures.load(Ordering::SeqCst),
            proxies_served: self.proxies_served.load(Ordering::SeqCst),
            proxies_retired: self.proxies_retired.load(Ordering::SeqCst),
            proxy_refreshes: self.proxy_refreshes.load(Ordering::SeqCst),
            elapsed_duration: self.start_time.elapsed(),
        }
    }

    /// Increments the count of fetch attempts.
    pub(crate) fn increment_fetch_attempted(&self) {
        self.fetch_attempted.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of successful fetches.
    pub(crate) fn increment_fetch_succeeded(&self) {
        self.fetch_succeeded.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of re-enqueued fetch tasks.
    pub(crate) fn increment_fetch_retried(&self) {
        self.fetch_retried.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of dropped fetch tasks.
    pub(crate) fn increment_fetch_dropped(&self) {
        self.fetch_dropped.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of parse attempts.
    pub(crate) fn increment_parse_attempted(&self) {
        self.parse_attempted.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of successful parses.
    pub(crate) fn increment_parse_succeeded(&self) {
        self.parse_succeeded.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of re-enqueued parse tasks.
    pub(crate) fn increment_parse_retried(&self) {
        self.parse_retried.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of dropped parse tasks.
    pub(crate) fn increment_parse_dropped(&self) {
        self.parse_dropped.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of save attempts.
    pub(crate) fn increment_save_attempted(&self) {
        self.save_attempted.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of successful saves.
    pub(crate) fn increment_save_succeeded(&self) {
        self.save_succeeded.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of re-enqueued save tasks.
    pub(crate) fn increment_save_retried(&self) {
        self.save_retried.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of dropped save tasks.
    pub(crate) fn increment_save_dropped(&self) {
        self.save_dropped.fetch_add(1, Ordering::SeqCst);
    }

    /// Adds to the count of links reported by parsers.
    pub(crate) fn add_links_discovered(&self, count: usize) {
        self.links_discovered.fetch_add(count, Ordering::SeqCst);
    }

    /// Increments the count of links the filter admitted.
    pub(crate) fn increment_links_admitted(&self) {
        self.links_admitted.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of capability errors and panics.
    pub(crate) fn increment_capability_failures(&self) {
        self.capability_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of proxies handed to fetch workers.
    pub(crate) fn increment_proxies_served(&self) {
        self.proxies_served.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of proxies retired by health reports.
    pub(crate) fn increment_proxies_retired(&self) {
        self.proxies_retired.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of proxy pool refreshes.
    pub(crate) fn increment_proxy_refreshes(&self) {
        self.proxy_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    /// Converts the current counters into a JSON string.
    pub fn to_json_string(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Converts the current counters into a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for StatCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StatCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();

        writeln!(f, "\nCrawl Statistics")?;
        writeln!(f, "----------------")?;
        writeln!(f, "  duration : {}", snapshot.formatted_duration())?;
        writeln!(
            f,
            "  speed    : fetch/s: {:.2}, save/s: {:.2}",
            snapshot.fetches_per_second(),
            snapshot.saves_per_second()
        )?;
        writeln!(
            f,
            "  fetch    : attempted: {}, ok: {}, retry: {}, drop: {}",
            snapshot.fetch_attempted,
            snapshot.fetch_succeeded,
            snapshot.fetch_retried,
            snapshot.fetch_dropped
        )?;
        writeln!(
            f,
            "  parse    : attempted: {}, ok: {}, retry: {}, drop: {}",
            snapshot.parse_attempted,
            snapshot.parse_succeeded,
            snapshot.parse_retried,
            snapshot.parse_dropped
        )?;
        writeln!(
            f,
            "  save     : attempted: {}, ok: {}, retry: {}, drop: {}",
            snapshot.save_attempted,
            snapshot.save_succeeded,
            snapshot.save_retried,
            snapshot.save_dropped
        )?;
        writeln!(
            f,
            "  links    : discovered: {}, admitted: {}",
            snapshot.links_discovered, snapshot.links_admitted
        )?;
        writeln!(
            f,
            "  proxies  : served: {}, retired: {}, refreshes: {}",
            snapshot.proxies_served, snapshot.proxies_retired, snapshot.proxy_refreshes
        )?;
        writeln!(
            f,
            "  failures : capability: {}\n",
            snapshot.capability_failures
        )
    }
}
