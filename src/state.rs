//! Module for tracking the operational state of a crawl run.
//!
//! This module defines the `RunState` struct, shared between the orchestrator
//! and every stage worker. It centralizes three concerns:
//! - The lifecycle phase (Idle → Running → Draining → Finished).
//! - Outstanding-work accounting used for termination detection: a task is
//!   counted from the moment it enters a queue until its routing completes,
//!   so a zero reading means no task is queued anywhere and no worker is
//!   mid-task.
//! - The stop signal that wakes blocked workers and backoff sleepers.
//!
//! Waits are `Notify` based; the `Notified` future is always created before
//! the condition is checked, so a notification landing between the check and
//! the await still completes the wait.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Lifecycle phase of a crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    /// Constructed and accepting seed tasks; no workers running.
    Idle = 0,
    /// Worker pools are processing tasks.
    Running = 1,
    /// Quiescence observed once; awaiting re-verification.
    Draining = 2,
    /// All workers joined; the run is over.
    Finished = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Phase {
        match value {
            0 => Phase::Idle,
            1 => Phase::Running,
            2 => Phase::Draining,
            _ => Phase::Finished,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::Running => "Running",
            Phase::Draining => "Draining",
            Phase::Finished => "Finished",
        };
        f.write_str(name)
    }
}

/// Represents the shared state of a run's orchestrator and workers.
#[derive(Debug, Default)]
pub struct RunState {
    phase: AtomicU8,
    /// Tasks alive anywhere in the pipeline: queued or held by a worker.
    outstanding: AtomicUsize,
    /// The number of tasks currently held by a fetch worker.
    pub fetching: AtomicUsize,
    /// The number of tasks currently held by a parse worker.
    pub parsing: AtomicUsize,
    /// The number of tasks currently held by a save worker.
    pub saving: AtomicUsize,
    stopped: AtomicBool,
    quiet: Notify,
    stop_signal: Notify,
    finish_signal: Notify,
}

impl RunState {
    /// Creates a new, atomically reference-counted `RunState` in `Idle`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Moves to `phase`, waking `wait_finished` callers on `Finished`.
    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        if phase == Phase::Finished {
            self.finish_signal.notify_waiters();
        }
    }

    /// Atomically moves Idle → Running; on failure returns the phase the
    /// run was actually in.
    pub(crate) fn try_start(&self) -> Result<(), Phase> {
        self.phase
            .compare_exchange(
                Phase::Idle as u8,
                Phase::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(Phase::from_u8)
    }

    /// Records a task entering a queue.
    pub(crate) fn task_spawned(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a dequeued task reaching its final disposition. Derived tasks
    /// must be spawned before the parent settles, otherwise quiescence could
    /// be observed while work still exists.
    pub(crate) fn task_settled(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.quiet.notify_waiters();
        }
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Checks whether no task is queued or mid-stage.
    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    /// Resolves once the outstanding count reaches zero.
    pub(crate) async fn quiescent(&self) {
        loop {
            let notified = self.quiet.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Raises the stop flag and wakes backoff sleepers and stop waiters.
    pub(crate) fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop_signal.notify_waiters();
    }

    /// Checks whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested.
    pub(crate) async fn stopping(&self) {
        loop {
            let notified = self.stop_signal.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }

    /// Resolves once the run reaches `Phase::Finished`.
    pub(crate) async fn wait_finished(&self) {
        loop {
            let notified = self.finish_signal.notified();
            if self.phase() == Phase::Finished {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_idle_and_transitions_once() {
        let state = RunState::new();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.try_start().is_ok());
        assert_eq!(state.phase(), Phase::Running);
        assert_eq!(state.try_start(), Err(Phase::Running));
    }

    #[tokio::test]
    async fn quiescent_resolves_when_last_task_settles() {
        let state = RunState::new();
        state.task_spawned();
        state.task_spawned();

        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                state.quiescent().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        state.task_settled();
        state.task_settled();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("quiescent never resolved")
            .expect("waiter panicked");
    }

    #[tokio::test]
    async fn quiescent_resolves_immediately_when_already_idle() {
        let state = RunState::new();
        tokio::time::timeout(Duration::from_millis(100), state.quiescent())
            .await
            .expect("quiescent should not block on an idle state");
    }

    #[tokio::test]
    async fn stopping_wakes_waiters() {
        let state = RunState::new();
        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                state.stopping().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        state.request_stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stop signal never observed")
            .expect("waiter panicked");
    }
}
