//! Outcome envelopes returned by the stage capabilities.
//!
//! Every capability call reports a `Verdict` plus the stage-specific payload
//! the engine routes onward. Constructor helpers cover the common cases so
//! implementations stay down to one line per outcome; the fields are public
//! for anything less common, such as a successful parse with links but no
//! item worth saving.

use crate::proxy::Proxy;
use crate::task::{TaskFetch, TaskParse, TaskSave};
use serde::{Deserialize, Serialize};

/// Tri-state routing signal: proceed, retry with backoff, or discard.
///
/// The numeric encodings follow the conventional state codes: success = 1,
/// retry = 0, drop = -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i8)]
pub enum Verdict {
    Success = 1,
    Retry = 0,
    Drop = -1,
}

impl Verdict {
    /// The numeric state code of this verdict.
    pub fn state_code(self) -> i8 {
        self as i8
    }
}

/// Health report for the proxy used during a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyHealth {
    #[default]
    Healthy,
    /// Retire the proxy; it is not handed out again until the next refresh.
    Failed,
}

impl ProxyHealth {
    pub fn is_healthy(self) -> bool {
        matches!(self, ProxyHealth::Healthy)
    }
}

/// What a fetch attempt produced.
#[derive(Debug)]
pub struct FetchOutcome<C> {
    pub verdict: Verdict,
    pub proxy_health: ProxyHealth,
    pub parse_task: Option<TaskParse<C>>,
}

impl<C> FetchOutcome<C> {
    /// The page was fetched; hand `parse_task` to the parse stage.
    pub fn success(parse_task: TaskParse<C>) -> Self {
        FetchOutcome {
            verdict: Verdict::Success,
            proxy_health: ProxyHealth::Healthy,
            parse_task: Some(parse_task),
        }
    }

    /// The fetch failed transiently; the task is re-attempted with backoff.
    pub fn retry() -> Self {
        FetchOutcome {
            verdict: Verdict::Retry,
            proxy_health: ProxyHealth::Healthy,
            parse_task: None,
        }
    }

    /// The fetch failed permanently; the task is discarded.
    pub fn drop_task() -> Self {
        FetchOutcome {
            verdict: Verdict::Drop,
            proxy_health: ProxyHealth::Healthy,
            parse_task: None,
        }
    }

    /// Overrides the proxy health report, e.g. to retire a dead proxy.
    pub fn with_proxy_health(mut self, health: ProxyHealth) -> Self {
        self.proxy_health = health;
        self
    }
}

/// What a parse attempt produced.
#[derive(Debug)]
pub struct ParseOutcome<I> {
    pub verdict: Verdict,
    /// Links discovered on the page. The engine applies the URL filter and
    /// the depth ceiling before any of these become fetch tasks.
    pub links: Vec<TaskFetch>,
    pub save_task: Option<TaskSave<I>>,
}

impl<I> ParseOutcome<I> {
    /// The page parsed cleanly into `save_task` plus follow-up links.
    pub fn success(links: Vec<TaskFetch>, save_task: TaskSave<I>) -> Self {
        ParseOutcome {
            verdict: Verdict::Success,
            links,
            save_task: Some(save_task),
        }
    }

    pub fn retry() -> Self {
        ParseOutcome {
            verdict: Verdict::Retry,
            links: Vec::new(),
            save_task: None,
        }
    }

    pub fn drop_task() -> Self {
        ParseOutcome {
            verdict: Verdict::Drop,
            links: Vec::new(),
            save_task: None,
        }
    }
}

/// What a save attempt produced.
#[derive(Debug, Clone, Copy)]
pub struct SaveOutcome {
    pub verdict: Verdict,
}

impl SaveOutcome {
    pub fn success() -> Self {
        SaveOutcome {
            verdict: Verdict::Success,
        }
    }

    pub fn retry() -> Self {
        SaveOutcome {
            verdict: Verdict::Retry,
        }
    }

    pub fn drop_task() -> Self {
        SaveOutcome {
            verdict: Verdict::Drop,
        }
    }
}

/// A refreshed set of proxy descriptors from the proxies capability.
#[derive(Debug, Clone)]
pub struct ProxyBatch {
    pub verdict: Verdict,
    pub proxies: Vec<Proxy>,
}

impl ProxyBatch {
    /// A usable batch; the pool replaces its contents with `proxies`.
    pub fn success(proxies: Vec<Proxy>) -> Self {
        ProxyBatch {
            verdict: Verdict::Success,
            proxies,
        }
    }

    /// No usable batch this round; the pool keeps what it has.
    pub fn unavailable() -> Self {
        ProxyBatch {
            verdict: Verdict::Retry,
            proxies: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_state_codes_match_convention() {
        assert_eq!(Verdict::Success.state_code(), 1);
        assert_eq!(Verdict::Retry.state_code(), 0);
        assert_eq!(Verdict::Drop.state_code(), -1);
    }

    #[test]
    fn fetch_outcome_helpers_set_expected_shape() {
        let outcome: FetchOutcome<String> = FetchOutcome::retry();
        assert_eq!(outcome.verdict, Verdict::Retry);
        assert!(outcome.parse_task.is_none());
        assert!(outcome.proxy_health.is_healthy());

        let failed: FetchOutcome<String> =
            FetchOutcome::drop_task().with_proxy_health(ProxyHealth::Failed);
        assert_eq!(failed.verdict, Verdict::Drop);
        assert!(!failed.proxy_health.is_healthy());
    }
}
