//! The core WebSpider implementation.
//!
//! This module defines the `WebSpider` struct, which acts as the central
//! orchestrator for the crawling process. It ties together the capabilities,
//! the stage queues, the URL filter, and the proxy pool to execute a crawl.
//! The spider manages the lifecycle of tasks across the fetch, parse, and
//! save stages, detects quiescence for self-termination, and collects
//! statistics for monitoring.
//!
//! It utilizes a task-based asynchronous model: one worker pool per stage
//! plus a supervisor task that watches the outstanding-work counter and
//! tears the run down once the pipeline is verifiably empty.

use crate::builder::SpiderConfig;
use crate::capability::{Fetcher, Parser, Saver};
use crate::error::SpiderError;
use crate::filter::UrlFilter;
use crate::proxy::{ProxyPool, spawn_refresher};
use crate::queue::TaskQueue;
use crate::state::{Phase, RunState};
use crate::stats::StatCollector;
use crate::task::{TaskFetch, TaskParse, TaskSave};
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Grace period between observing quiescence and re-verifying it before
/// shutdown begins.
const QUIESCENCE_GRACE: Duration = Duration::from_millis(50);

/// How long teardown waits for worker tasks before aborting them.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// The central orchestrator for the crawling process, routing tasks between the fetch, parse, and save stages and managing lifecycle, termination, and statistics collection.
pub struct WebSpider<F, P, S>
where
    F: Fetcher,
    P: Parser<Content = F::Content>,
    S: Saver<Item = P::Item>,
{
    fetcher: Arc<F>,
    parser: Arc<P>,
    saver: Arc<S>,
    filter: Arc<UrlFilter>,
    proxies: Arc<ProxyPool>,
    config: Arc<SpiderConfig>,
    stats: Arc<StatCollector>,
    state: Arc<RunState>,
    fetch_queue: Arc<TaskQueue<TaskFetch>>,
    parse_queue: Arc<TaskQueue<TaskParse<F::Content>>>,
    save_queue: Arc<TaskQueue<TaskSave<P::Item>>>,
    seeded: AtomicBool,
}

impl<F, P, S> WebSpider<F, P, S>
where
    F: Fetcher,
    P: Parser<Content = F::Content>,
    S: Saver<Item = P::Item>,
{
    /// Creates a new `WebSpider` instance with the given capabilities and configuration.
    pub(crate) fn new(
        fetcher: Arc<F>,
        parser: Arc<P>,
        saver: Arc<S>,
        filter: Arc<UrlFilter>,
        proxies: Arc<ProxyPool>,
        config: Arc<SpiderConfig>,
        stats: Arc<StatCollector>,
    ) -> Self {
        let fetch_queue = Arc::new(make_queue(config.queue_fetch_size));
        let parse_queue = Arc::new(make_queue(config.queue_parse_size));
        let save_queue = Arc::new(make_queue(config.queue_save_size));
        WebSpider {
            fetcher,
            parser,
            saver,
            filter,
            proxies,
            config,
            stats,
            state: RunState::new(),
            fetch_queue,
            parse_queue,
            save_queue,
            seeded: AtomicBool::new(false),
        }
    }

    /// Enqueues a seed fetch task. Only valid while the spider is `Idle`;
    /// call repeatedly to seed several starting points.
    ///
    /// The seed URL is recorded with the filter so a later rediscovery
    /// dedups against it, but the seed itself is enqueued regardless of the
    /// filter's verdict.
    pub fn set_start_task(&self, task: TaskFetch) -> Result<(), SpiderError> {
        let phase = self.state.phase();
        if phase != Phase::Idle {
            return Err(SpiderError::Phase {
                operation: "set_start_task",
                expected: Phase::Idle,
                actual: phase,
            });
        }

        if !self.filter.admit(task.url()) {
            debug!(
                "Seed not recorded by filter (pattern or duplicate), enqueueing anyway: {}",
                task.url()
            );
        }

        self.state.task_spawned();
        match self.fetch_queue.try_push(task) {
            Ok(()) => {
                self.seeded.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(task) => {
                self.state.task_settled();
                Err(SpiderError::QueueFull(task.url().to_string()))
            }
        }
    }

    /// Moves the spider Idle → Running and spins up the worker pools:
    /// `fetchers_num` fetch workers plus the configured parse and save
    /// pools, the proxy refresher when a provider is present, and the
    /// supervisor that shuts everything down once the crawl is done.
    ///
    /// Returns synchronously; observe completion with `wait_for_finished`.
    /// Must be called from within a Tokio runtime.
    pub fn start_working(&self, fetchers_num: usize) -> Result<(), SpiderError> {
        if fetchers_num == 0 {
            return Err(SpiderError::Configuration(
                "fetchers_num must be greater than 0.".to_string(),
            ));
        }
        if !self.seeded.load(Ordering::SeqCst) {
            return Err(SpiderError::Configuration(
                "no start task set; call set_start_task before start_working.".to_string(),
            ));
        }
        self.state.try_start().map_err(|actual| SpiderError::Phase {
            operation: "start_working",
            expected: Phase::Idle,
            actual,
        })?;

        info!(
            "Spider starting with configuration: fetchers_num={}, parsers_num={}, savers_num={}, max_repeat={}, max_deep={}",
            fetchers_num, self.config.parsers_num, self.config.savers_num,
            self.config.max_repeat, self.config.max_deep
        );

        trace!("Spawning fetch stage");
        let mut workers = super::spawn_fetch_stage(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.fetch_queue),
            Arc::clone(&self.parse_queue),
            Arc::clone(&self.proxies),
            Arc::clone(&self.state),
            Arc::clone(&self.stats),
            Arc::clone(&self.config),
            fetchers_num,
        );

        trace!("Spawning parse stage");
        workers.extend(super::spawn_parse_stage(
            Arc::clone(&self.parser),
            Arc::clone(&self.parse_queue),
            Arc::clone(&self.fetch_queue),
            Arc::clone(&self.save_queue),
            Arc::clone(&self.filter),
            Arc::clone(&self.state),
            Arc::clone(&self.stats),
            Arc::clone(&self.config),
            self.config.parsers_num,
        ));

        trace!("Spawning save stage");
        workers.extend(super::spawn_save_stage(
            Arc::clone(&self.saver),
            Arc::clone(&self.save_queue),
            Arc::clone(&self.state),
            Arc::clone(&self.stats),
            Arc::clone(&self.config),
            self.config.savers_num,
        ));

        if self.proxies.has_provider() {
            trace!("Spawning proxy refresher");
            workers.push(spawn_refresher(
                Arc::clone(&self.proxies),
                Arc::clone(&self.state),
                self.config.proxy_refresh_interval,
            ));
        }

        tokio::spawn(supervise(
            Arc::clone(&self.state),
            Arc::clone(&self.fetch_queue),
            Arc::clone(&self.parse_queue),
            Arc::clone(&self.save_queue),
            Arc::clone(&self.stats),
            workers,
        ));
        Ok(())
    }

    /// Requests shutdown: wakes blocked workers and sleeping retries, and
    /// marks in-flight results for discard. The run still proceeds through
    /// the normal teardown and reaches `Finished`.
    ///
    /// Idempotent, and callable from any task at any time.
    pub fn stop(&self) {
        info!("Stop requested, draining worker pools");
        self.state.request_stop();
        self.fetch_queue.close();
        self.parse_queue.close();
        self.save_queue.close();
    }

    /// Suspends until the run reaches `Phase::Finished`.
    pub async fn wait_for_finished(&self) {
        self.state.wait_finished().await;
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Returns a cloned Arc to the `StatCollector` instance used by this spider.
    ///
    /// This allows programmatic access to the collected statistics at any time during or after the crawl.
    pub fn get_stats(&self) -> Arc<StatCollector> {
        Arc::clone(&self.stats)
    }
}

fn make_queue<T: crate::queue::Prioritized>(capacity: Option<usize>) -> TaskQueue<T> {
    match capacity {
        Some(capacity) => TaskQueue::bounded(capacity),
        None => TaskQueue::unbounded(),
    }
}

/// Watches the run until it quiesces or a stop is requested, then tears the
/// worker pools down and marks the run finished.
async fn supervise<C, I>(
    state: Arc<RunState>,
    fetch_queue: Arc<TaskQueue<TaskFetch>>,
    parse_queue: Arc<TaskQueue<TaskParse<C>>>,
    save_queue: Arc<TaskQueue<TaskSave<I>>>,
    stats: Arc<StatCollector>,
    workers: Vec<JoinHandle<()>>,
) where
    C: Send + 'static,
    I: Send + 'static,
{
    loop {
        tokio::select! {
            _ = state.stopping() => {
                info!("Stop requested, initiating shutdown");
                break;
            }
            _ = state.quiescent() => {
                state.set_phase(Phase::Draining);
                trace!("Pipeline looks idle, re-verifying after grace period");
                tokio::time::sleep(QUIESCENCE_GRACE).await;
                if state.is_idle()
                    && fetch_queue.is_empty()
                    && parse_queue.is_empty()
                    && save_queue.is_empty()
                {
                    info!("Crawl has become idle, initiating shutdown");
                    break;
                }
                trace!("Work reappeared during grace period, resuming");
                state.set_phase(Phase::Running);
            }
        }
    }

    // Closing the queues wakes every blocked worker; the stop flag covers
    // backoff sleepers and marks late results for discard.
    state.request_stop();
    fetch_queue.close();
    parse_queue.close();
    save_queue.close();

    let abort_handles: Vec<_> = workers.iter().map(|worker| worker.abort_handle()).collect();
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all(workers)).await {
        Ok(results) => {
            for result in results {
                if let Err(e) = result {
                    error!("Worker task failed during shutdown: {}", e);
                }
            }
            trace!("All worker tasks completed during shutdown");
        }
        Err(_) => {
            warn!(
                "Worker tasks did not complete within timeout ({}s), aborting remaining tasks and continuing with shutdown...",
                SHUTDOWN_TIMEOUT.as_secs()
            );
            for handle in abort_handles {
                handle.abort();
            }
        }
    }

    state.set_phase(Phase::Finished);
    info!(
        "Crawl finished. Stats: fetch_succeeded={}, parse_succeeded={}, save_succeeded={}, links_admitted={}",
        stats.fetch_succeeded.load(Ordering::SeqCst),
        stats.parse_succeeded.load(Ordering::SeqCst),
        stats.save_succeeded.load(Ordering::SeqCst),
        stats.links_admitted.load(Ordering::SeqCst)
    );
    debug!("Final statistics:{}", stats);
}
