//! Contains the parse worker pool of the crawling engine.
//!
//! This module implements the middle pipeline stage, which turns fetched
//! content into follow-up fetches and save work. It handles:
//!
//! - Draining the parse queue with a pool of concurrent workers
//! - Isolating capability errors and panics from the rest of the run
//! - Gating discovered links through the depth ceiling and the URL filter
//!   before they become fetch tasks
//! - Routing outcomes: success fans out into the fetch and save queues,
//!   retry re-enqueues with backoff, drop discards
//! - Discarding results that complete after a stop was requested
//!
//! The main entry point is the `spawn_parse_stage` function which creates one
//! worker task per configured parser slot.

use crate::builder::SpiderConfig;
use crate::capability::Parser;
use crate::filter::UrlFilter;
use crate::outcome::{ParseOutcome, Verdict};
use crate::queue::TaskQueue;
use crate::state::RunState;
use crate::stats::StatCollector;
use crate::task::{TaskFetch, TaskParse, TaskSave};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_parse_stage<P>(
    parser: Arc<P>,
    parse_queue: Arc<TaskQueue<TaskParse<P::Content>>>,
    fetch_queue: Arc<TaskQueue<TaskFetch>>,
    save_queue: Arc<TaskQueue<TaskSave<P::Item>>>,
    filter: Arc<UrlFilter>,
    state: Arc<RunState>,
    stats: Arc<StatCollector>,
    config: Arc<SpiderConfig>,
    workers: usize,
) -> Vec<JoinHandle<()>>
where
    P: Parser,
{
    (0..workers)
        .map(|worker_id| {
            let parser = Arc::clone(&parser);
            let parse_queue = Arc::clone(&parse_queue);
            let fetch_queue = Arc::clone(&fetch_queue);
            let save_queue = Arc::clone(&save_queue);
            let filter = Arc::clone(&filter);
            let state = Arc::clone(&state);
            let stats = Arc::clone(&stats);
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                trace!("Parse worker {} started", worker_id);
                while let Some(task) = parse_queue.pop().await {
                    state.parsing.fetch_add(1, Ordering::SeqCst);
                    parse_one(
                        task,
                        &*parser,
                        &parse_queue,
                        &fetch_queue,
                        &save_queue,
                        &filter,
                        &state,
                        &stats,
                        &config,
                    )
                    .await;
                    state.parsing.fetch_sub(1, Ordering::SeqCst);
                    state.task_settled();
                }
                trace!("Parse worker {} exiting", worker_id);
            })
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn parse_one<P>(
    task: TaskParse<P::Content>,
    parser: &P,
    parse_queue: &TaskQueue<TaskParse<P::Content>>,
    fetch_queue: &TaskQueue<TaskFetch>,
    save_queue: &TaskQueue<TaskSave<P::Item>>,
    filter: &UrlFilter,
    state: &RunState,
    stats: &StatCollector,
    config: &SpiderConfig,
) where
    P: Parser,
{
    debug!("Parsing URL: {} (deep: {})", task.url(), task.deep());
    stats.increment_parse_attempted();

    let invocation = AssertUnwindSafe(parser.parse(&task)).catch_unwind().await;

    let outcome = match invocation {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            warn!(
                "Parse capability failed for URL {}: {}; treating as retry",
                task.url(),
                err
            );
            stats.increment_capability_failures();
            ParseOutcome::retry()
        }
        Err(payload) => {
            error!(
                "Parse capability panicked for URL {}: {}; treating as retry",
                task.url(),
                super::panic_message(payload)
            );
            stats.increment_capability_failures();
            ParseOutcome::retry()
        }
    };

    if state.is_stopped() {
        debug!("Stop in effect, discarding parse result for URL: {}", task.url());
        stats.increment_parse_dropped();
        return;
    }

    match outcome.verdict {
        Verdict::Success => {
            let ParseOutcome {
                links, save_task, ..
            } = outcome;
            stats.add_links_discovered(links.len());
            for link in links {
                let within_depth =
                    config.max_deep < 0 || i64::from(link.deep()) <= config.max_deep;
                if !within_depth {
                    trace!(
                        "Link beyond depth ceiling ({} > {}): {}",
                        link.deep(),
                        config.max_deep,
                        link.url()
                    );
                    continue;
                }
                if !filter.admit(link.url()) {
                    trace!("Link not admitted by filter: {}", link.url());
                    continue;
                }
                stats.increment_links_admitted();
                state.task_spawned();
                if fetch_queue.push(link).await.is_err() {
                    state.task_settled();
                    debug!("Fetch queue closed, discarding admitted links");
                    break;
                }
            }
            if let Some(save_task) = save_task {
                state.task_spawned();
                if save_queue.push(save_task).await.is_err() {
                    state.task_settled();
                    debug!("Save queue closed, discarding item for URL: {}", task.url());
                }
            }
            stats.increment_parse_succeeded();
        }
        Verdict::Retry => {
            if task.retry_count() < config.max_repeat {
                debug!(
                    "Re-enqueueing parse for URL: {} (attempt {} of {})",
                    task.url(),
                    task.retry_count() + 1,
                    config.max_repeat
                );
                let next = task.into_retry();
                tokio::select! {
                    _ = tokio::time::sleep(config.sleep_time) => {
                        state.task_spawned();
                        match parse_queue.push(next).await {
                            Ok(()) => stats.increment_parse_retried(),
                            Err(returned) => {
                                state.task_settled();
                                stats.increment_parse_dropped();
                                debug!("Parse queue closed during retry, dropping URL: {}", returned.url());
                            }
                        }
                    }
                    _ = state.stopping() => {
                        debug!("Stop requested during retry backoff, dropping parse task");
                        stats.increment_parse_dropped();
                    }
                }
            } else {
                warn!(
                    "Retry budget exhausted for URL: {} after {} retries, dropping",
                    task.url(),
                    task.retry_count()
                );
                stats.increment_parse_dropped();
            }
        }
        Verdict::Drop => {
            debug!("Parse verdict is drop for URL: {}", task.url());
            stats.increment_parse_dropped();
        }
    }
}
