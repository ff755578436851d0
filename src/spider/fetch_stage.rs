//! Contains the fetch worker pool of the crawling engine.
//!
//! This module implements the first pipeline stage, which turns queued
//! `TaskFetch` records into parse work. It handles:
//!
//! - Draining the fetch queue with a pool of concurrent workers
//! - Acquiring a proxy for each attempt and reporting its health back
//! - Isolating capability errors and panics so one bad fetch cannot end the run
//! - Routing outcomes: success feeds the parse queue, retry re-enqueues with
//!   backoff at the original priority, drop discards
//! - Discarding results that complete after a stop was requested
//!
//! The main entry point is the `spawn_fetch_stage` function which creates one
//! worker task per requested fetcher slot.

use crate::builder::SpiderConfig;
use crate::capability::Fetcher;
use crate::outcome::{FetchOutcome, ProxyHealth, Verdict};
use crate::proxy::ProxyPool;
use crate::queue::TaskQueue;
use crate::state::RunState;
use crate::stats::StatCollector;
use crate::task::{TaskFetch, TaskParse};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_fetch_stage<F>(
    fetcher: Arc<F>,
    fetch_queue: Arc<TaskQueue<TaskFetch>>,
    parse_queue: Arc<TaskQueue<TaskParse<F::Content>>>,
    proxies: Arc<ProxyPool>,
    state: Arc<RunState>,
    stats: Arc<StatCollector>,
    config: Arc<SpiderConfig>,
    workers: usize,
) -> Vec<JoinHandle<()>>
where
    F: Fetcher,
{
    (0..workers)
        .map(|worker_id| {
            let fetcher = Arc::clone(&fetcher);
            let fetch_queue = Arc::clone(&fetch_queue);
            let parse_queue = Arc::clone(&parse_queue);
            let proxies = Arc::clone(&proxies);
            let state = Arc::clone(&state);
            let stats = Arc::clone(&stats);
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                trace!("Fetch worker {} started", worker_id);
                while let Some(task) = fetch_queue.pop().await {
                    state.fetching.fetch_add(1, Ordering::SeqCst);
                    fetch_one(
                        task,
                        &*fetcher,
                        &fetch_queue,
                        &parse_queue,
                        &proxies,
                        &state,
                        &stats,
                        &config,
                    )
                    .await;
                    state.fetching.fetch_sub(1, Ordering::SeqCst);
                    // Settled only after routing, so derived work is already
                    // counted and quiescence cannot be observed early.
                    state.task_settled();
                }
                trace!("Fetch worker {} exiting", worker_id);
            })
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn fetch_one<F>(
    task: TaskFetch,
    fetcher: &F,
    fetch_queue: &TaskQueue<TaskFetch>,
    parse_queue: &TaskQueue<TaskParse<F::Content>>,
    proxies: &ProxyPool,
    state: &RunState,
    stats: &StatCollector,
    config: &SpiderConfig,
) where
    F: Fetcher,
{
    debug!(
        "Fetching URL: {} (deep: {}, retry: {})",
        task.url(),
        task.deep(),
        task.retry_count()
    );
    stats.increment_fetch_attempted();
    let proxy = proxies.acquire().await;

    let invocation = AssertUnwindSafe(fetcher.fetch(&task, proxy.as_ref()))
        .catch_unwind()
        .await;

    let outcome = match invocation {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            warn!(
                "Fetch capability failed for URL {}: {}; treating as retry",
                task.url(),
                err
            );
            stats.increment_capability_failures();
            FetchOutcome::retry().with_proxy_health(ProxyHealth::Failed)
        }
        Err(payload) => {
            error!(
                "Fetch capability panicked for URL {}: {}; treating as retry",
                task.url(),
                super::panic_message(payload)
            );
            stats.increment_capability_failures();
            FetchOutcome::retry().with_proxy_health(ProxyHealth::Failed)
        }
    };

    if let Some(proxy) = &proxy {
        proxies.report(proxy, outcome.proxy_health.is_healthy());
    }

    if state.is_stopped() {
        debug!("Stop in effect, discarding fetch result for URL: {}", task.url());
        stats.increment_fetch_dropped();
        return;
    }

    match outcome.verdict {
        Verdict::Success => {
            if let Some(parse_task) = outcome.parse_task {
                state.task_spawned();
                if parse_queue.push(parse_task).await.is_err() {
                    state.task_settled();
                    debug!("Parse queue closed, discarding content for URL: {}", task.url());
                }
            } else {
                warn!(
                    "Fetch succeeded without parse content for URL: {}",
                    task.url()
                );
            }
            stats.increment_fetch_succeeded();
        }
        Verdict::Retry => {
            if task.retry_count() < config.max_repeat {
                debug!(
                    "Re-enqueueing fetch for URL: {} (attempt {} of {})",
                    task.url(),
                    task.retry_count() + 1,
                    config.max_repeat
                );
                let next = task.into_retry();
                tokio::select! {
                    _ = tokio::time::sleep(config.sleep_time) => {
                        state.task_spawned();
                        match fetch_queue.push(next).await {
                            Ok(()) => stats.increment_fetch_retried(),
                            Err(returned) => {
                                state.task_settled();
                                stats.increment_fetch_dropped();
                                debug!("Fetch queue closed during retry, dropping URL: {}", returned.url());
                            }
                        }
                    }
                    _ = state.stopping() => {
                        debug!("Stop requested during retry backoff, dropping fetch task");
                        stats.increment_fetch_dropped();
                    }
                }
            } else {
                warn!(
                    "Retry budget exhausted for URL: {} after {} retries, dropping",
                    task.url(),
                    task.retry_count()
                );
                stats.increment_fetch_dropped();
            }
        }
        Verdict::Drop => {
            debug!("Fetch verdict is drop for URL: {}", task.url());
            stats.increment_fetch_dropped();
        }
    }
}
