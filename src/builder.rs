//! # Builder Module
//!
//! Provides the `WebSpiderBuilder`, a fluent API for constructing and
//! configuring `WebSpider` instances with customizable settings and
//! capabilities.
//!
//! ## Overview
//!
//! The `WebSpiderBuilder` assembles the engine from its four capabilities
//! and the knobs that shape a run: retry policy, depth ceiling, queue
//! capacities, and per-stage worker counts. Validation happens once in
//! `build`, so a constructed spider is always runnable.
//!
//! ## Key Features
//!
//! - **Capability Wiring**: Attach the fetcher, parser, saver, and an
//!   optional proxy provider
//! - **Retry Policy**: Configure the retry budget and backoff between
//!   attempts
//! - **Flow Control**: Bound any stage queue to apply backpressure
//! - **Worker Pools**: Control the number of parse and save workers
//!
//! ## Example
//!
//! ```rust,ignore
//! use webspider::{TaskFetch, UrlFilter, WebSpiderBuilder};
//! use std::time::Duration;
//!
//! let spider = WebSpiderBuilder::new(MyFetcher::new(), MyParser, MySaver::new())
//!     .sleep_time(Duration::from_secs(1))
//!     .max_repeat(3)
//!     .max_deep(2)
//!     .queue_parse_size(200)
//!     .url_filter(UrlFilter::new())
//!     .build()?;
//!
//! spider.set_start_task(TaskFetch::new("https://example.com/"))?;
//! spider.start_working(5)?;
//! ```

use crate::capability::{Fetcher, Parser, ProxyProvider, Saver};
use crate::error::SpiderError;
use crate::filter::UrlFilter;
use crate::proxy::ProxyPool;
use crate::spider::WebSpider;
use crate::stats::StatCollector;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a crawl run's policies and worker pools.
#[derive(Debug, Clone)]
pub struct SpiderConfig {
    /// The backoff slept before a retryable task is re-enqueued.
    pub sleep_time: Duration,
    /// Retries allowed per task before it is dropped.
    pub max_repeat: usize,
    /// The crawl depth ceiling; -1 crawls unbounded.
    pub max_deep: i64,
    /// The number of workers dedicated to parsing.
    pub parsers_num: usize,
    /// The number of workers dedicated to saving.
    pub savers_num: usize,
    /// The fetch queue capacity; `None` is unbounded.
    pub queue_fetch_size: Option<usize>,
    /// The parse queue capacity; `None` is unbounded.
    pub queue_parse_size: Option<usize>,
    /// The save queue capacity; `None` is unbounded.
    pub queue_save_size: Option<usize>,
    /// The interval between scheduled proxy pool refreshes.
    pub proxy_refresh_interval: Duration,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        SpiderConfig {
            sleep_time: Duration::ZERO,
            max_repeat: 3,
            max_deep: -1,
            parsers_num: 1,
            savers_num: 1,
            queue_fetch_size: None,
            queue_parse_size: None,
            queue_save_size: None,
            proxy_refresh_interval: Duration::from_secs(60),
        }
    }
}

/// Fluent builder wiring capabilities and configuration into a `WebSpider`.
pub struct WebSpiderBuilder<F, P, S>
where
    F: Fetcher,
    P: Parser<Content = F::Content>,
    S: Saver<Item = P::Item>,
{
    sleep_time: Duration,
    max_repeat: usize,
    max_deep: i64,
    parsers_num: usize,
    savers_num: usize,
    queue_fetch_size: i64,
    queue_parse_size: i64,
    queue_save_size: i64,
    proxy_refresh_interval: Duration,
    fetcher: F,
    parser: P,
    saver: S,
    url_filter: UrlFilter,
    proxy_provider: Option<Arc<dyn ProxyProvider>>,
}

impl<F, P, S> WebSpiderBuilder<F, P, S>
where
    F: Fetcher,
    P: Parser<Content = F::Content>,
    S: Saver<Item = P::Item>,
{
    /// Creates a builder around the three mandatory capabilities.
    pub fn new(fetcher: F, parser: P, saver: S) -> Self {
        WebSpiderBuilder {
            sleep_time: Duration::ZERO,
            max_repeat: 3,
            max_deep: -1,
            parsers_num: 1,
            savers_num: 1,
            queue_fetch_size: -1,
            queue_parse_size: -1,
            queue_save_size: -1,
            proxy_refresh_interval: Duration::from_secs(60),
            fetcher,
            parser,
            saver,
            url_filter: UrlFilter::new(),
            proxy_provider: None,
        }
    }

    /// Sets the backoff slept before a retryable task is re-enqueued.
    pub fn sleep_time(mut self, sleep_time: Duration) -> Self {
        self.sleep_time = sleep_time;
        self
    }

    /// Sets the number of retries allowed per task before it is dropped.
    pub fn max_repeat(mut self, max_repeat: usize) -> Self {
        self.max_repeat = max_repeat;
        self
    }

    /// Sets the crawl depth ceiling. Pass -1 to crawl unbounded.
    pub fn max_deep(mut self, max_deep: i64) -> Self {
        self.max_deep = max_deep;
        self
    }

    /// Sets the number of parse workers.
    pub fn parsers_num(mut self, parsers_num: usize) -> Self {
        self.parsers_num = parsers_num;
        self
    }

    /// Sets the number of save workers.
    pub fn savers_num(mut self, savers_num: usize) -> Self {
        self.savers_num = savers_num;
        self
    }

    /// Caps the fetch queue. Pass -1 to leave it unbounded.
    pub fn queue_fetch_size(mut self, size: i64) -> Self {
        self.queue_fetch_size = size;
        self
    }

    /// Caps the parse queue. Pass -1 to leave it unbounded.
    pub fn queue_parse_size(mut self, size: i64) -> Self {
        self.queue_parse_size = size;
        self
    }

    /// Caps the save queue. Pass -1 to leave it unbounded.
    pub fn queue_save_size(mut self, size: i64) -> Self {
        self.queue_save_size = size;
        self
    }

    /// Installs the URL admission filter.
    pub fn url_filter(mut self, url_filter: UrlFilter) -> Self {
        self.url_filter = url_filter;
        self
    }

    /// Installs a proxy provider; without one every fetch goes direct.
    pub fn proxy_provider<X>(mut self, provider: X) -> Self
    where
        X: ProxyProvider,
    {
        self.proxy_provider = Some(Arc::new(provider));
        self
    }

    /// Sets the interval between scheduled proxy pool refreshes.
    pub fn proxy_refresh_interval(mut self, interval: Duration) -> Self {
        self.proxy_refresh_interval = interval;
        self
    }

    /// Validates the configuration and assembles the `WebSpider`.
    pub fn build(self) -> Result<WebSpider<F, P, S>, SpiderError> {
        if self.parsers_num == 0 {
            return Err(SpiderError::Configuration(
                "parsers_num must be greater than 0.".to_string(),
            ));
        }
        if self.savers_num == 0 {
            return Err(SpiderError::Configuration(
                "savers_num must be greater than 0.".to_string(),
            ));
        }
        if self.max_deep < -1 {
            return Err(SpiderError::Configuration(
                "max_deep must be -1 (unbounded) or non-negative.".to_string(),
            ));
        }

        let config = Arc::new(SpiderConfig {
            sleep_time: self.sleep_time,
            max_repeat: self.max_repeat,
            max_deep: self.max_deep,
            parsers_num: self.parsers_num,
            savers_num: self.savers_num,
            queue_fetch_size: queue_capacity("queue_fetch_size", self.queue_fetch_size)?,
            queue_parse_size: queue_capacity("queue_parse_size", self.queue_parse_size)?,
            queue_save_size: queue_capacity("queue_save_size", self.queue_save_size)?,
            proxy_refresh_interval: self.proxy_refresh_interval,
        });

        let stats = Arc::new(StatCollector::new());
        let proxies = match self.proxy_provider {
            Some(provider) => ProxyPool::with_provider(provider, Arc::clone(&stats)),
            None => ProxyPool::direct(Arc::clone(&stats)),
        };

        Ok(WebSpider::new(
            Arc::new(self.fetcher),
            Arc::new(self.parser),
            Arc::new(self.saver),
            Arc::new(self.url_filter),
            Arc::new(proxies),
            config,
            stats,
        ))
    }
}

fn queue_capacity(option_name: &str, size: i64) -> Result<Option<usize>, SpiderError> {
    match size {
        -1 => Ok(None),
        n if n > 0 => Ok(Some(n as usize)),
        n => Err(SpiderError::Configuration(format!(
            "{option_name} must be -1 (unbounded) or positive, got {n}."
        ))),
    }
}
