//! Contains the save worker pool of the crawling engine.
//!
//! The final pipeline stage: drains the save queue and hands each extracted
//! item to the saver capability. Success is terminal; retry re-enqueues with
//! backoff; drop and post-stop completions discard the item.
//!
//! The main entry point is the `spawn_save_stage` function which creates one
//! worker task per configured saver slot.

use crate::builder::SpiderConfig;
use crate::capability::Saver;
use crate::outcome::{SaveOutcome, Verdict};
use crate::queue::TaskQueue;
use crate::state::RunState;
use crate::stats::StatCollector;
use crate::task::TaskSave;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

pub(crate) fn spawn_save_stage<S>(
    saver: Arc<S>,
    save_queue: Arc<TaskQueue<TaskSave<S::Item>>>,
    state: Arc<RunState>,
    stats: Arc<StatCollector>,
    config: Arc<SpiderConfig>,
    workers: usize,
) -> Vec<JoinHandle<()>>
where
    S: Saver,
{
    (0..workers)
        .map(|worker_id| {
            let saver = Arc::clone(&saver);
            let save_queue = Arc::clone(&save_queue);
            let state = Arc::clone(&state);
            let stats = Arc::clone(&stats);
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                trace!("Save worker {} started", worker_id);
                while let Some(task) = save_queue.pop().await {
                    state.saving.fetch_add(1, Ordering::SeqCst);
                    save_one(task, &*saver, &save_queue, &state, &stats, &config).await;
                    state.saving.fetch_sub(1, Ordering::SeqCst);
                    state.task_settled();
                }
                trace!("Save worker {} exiting", worker_id);
            })
        })
        .collect()
}

async fn save_one<S>(
    task: TaskSave<S::Item>,
    saver: &S,
    save_queue: &TaskQueue<TaskSave<S::Item>>,
    state: &RunState,
    stats: &StatCollector,
    config: &SpiderConfig,
) where
    S: Saver,
{
    debug!("Saving item for URL: {}", task.url());
    stats.increment_save_attempted();

    let invocation = AssertUnwindSafe(saver.save(&task)).catch_unwind().await;

    let outcome = match invocation {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            warn!(
                "Save capability failed for URL {}: {}; treating as retry",
                task.url(),
                err
            );
            stats.increment_capability_failures();
            SaveOutcome::retry()
        }
        Err(payload) => {
            error!(
                "Save capability panicked for URL {}: {}; treating as retry",
                task.url(),
                super::panic_message(payload)
            );
            stats.increment_capability_failures();
            SaveOutcome::retry()
        }
    };

    if state.is_stopped() {
        debug!("Stop in effect, discarding save result for URL: {}", task.url());
        stats.increment_save_dropped();
        return;
    }

    match outcome.verdict {
        Verdict::Success => {
            stats.increment_save_succeeded();
        }
        Verdict::Retry => {
            if task.retry_count() < config.max_repeat {
                debug!(
                    "Re-enqueueing save for URL: {} (attempt {} of {})",
                    task.url(),
                    task.retry_count() + 1,
                    config.max_repeat
                );
                let next = task.into_retry();
                tokio::select! {
                    _ = tokio::time::sleep(config.sleep_time) => {
                        state.task_spawned();
                        match save_queue.push(next).await {
                            Ok(()) => stats.increment_save_retried(),
                            Err(returned) => {
                                state.task_settled();
                                stats.increment_save_dropped();
                                debug!("Save queue closed during retry, dropping URL: {}", returned.url());
                            }
                        }
                    }
                    _ = state.stopping() => {
                        debug!("Stop requested during retry backoff, dropping save task");
                        stats.increment_save_dropped();
                    }
                }
            } else {
                warn!(
                    "Retry budget exhausted for URL: {} after {} retries, dropping",
                    task.url(),
                    task.retry_count()
                );
                stats.increment_save_dropped();
            }
        }
        Verdict::Drop => {
            debug!("Save verdict is drop for URL: {}", task.url());
            stats.increment_save_dropped();
        }
    }
}
