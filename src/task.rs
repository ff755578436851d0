//! Task records threaded between the pipeline stages.
//!
//! Tasks are immutable value records: constructors and derivations produce
//! new values, nothing mutates in place. A `TaskFetch` seeds the pipeline
//! and is re-derived whenever a parse discovers a link; `TaskParse` adds
//! the fetched content; `TaskSave` adds the extracted item. The `keys`
//! mapping set on a seed rides along unchanged through every derivation so
//! savers can tell apart work that started from different seeds.

use crate::queue::Prioritized;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque caller bookkeeping carried through the whole pipeline.
pub type Keys = serde_json::Map<String, Value>;

/// A unit of fetch work: one URL plus its scheduling metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFetch {
    url: String,
    priority: i64,
    deep: u32,
    keys: Keys,
    retry_count: usize,
}

impl TaskFetch {
    /// Creates a fetch task at priority 0, depth 0, with empty keys.
    pub fn new(url: impl Into<String>) -> Self {
        TaskFetch {
            url: url.into(),
            priority: 0,
            deep: 0,
            keys: Keys::new(),
            retry_count: 0,
        }
    }

    /// Sets the scheduling priority. Lower values execute first.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the crawl depth. Seeds normally stay at 0.
    pub fn with_deep(mut self, deep: u32) -> Self {
        self.deep = deep;
        self
    }

    /// Replaces the bookkeeping keys wholesale.
    pub fn with_keys(mut self, keys: Keys) -> Self {
        self.keys = keys;
        self
    }

    /// Inserts a single bookkeeping key.
    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }

    /// Derives a follow-up fetch for a link discovered while parsing.
    ///
    /// Depth and priority both increase by one, so deeper pages run at
    /// lower urgency and shallow layers drain first.
    pub fn from_parse<C>(parse: &TaskParse<C>, url: impl Into<String>) -> Self {
        TaskFetch {
            url: url.into(),
            priority: parse.priority + 1,
            deep: parse.deep + 1,
            keys: parse.keys.clone(),
            retry_count: 0,
        }
    }

    /// Derives the next attempt of this task after a retryable failure.
    pub(crate) fn into_retry(mut self) -> Self {
        self.retry_count += 1;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn deep(&self) -> u32 {
        self.deep
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// How many times this task has already been retried.
    pub fn retry_count(&self) -> usize {
        self.retry_count
    }
}

impl Prioritized for TaskFetch {
    fn priority(&self) -> i64 {
        self.priority
    }
}

/// A fetched page awaiting parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskParse<C> {
    url: String,
    priority: i64,
    deep: u32,
    keys: Keys,
    retry_count: usize,
    content: C,
}

impl<C> TaskParse<C> {
    /// Derives a parse task from the fetch that produced `content`.
    pub fn from_fetch(fetch: &TaskFetch, content: C) -> Self {
        TaskParse {
            url: fetch.url.clone(),
            priority: fetch.priority,
            deep: fetch.deep,
            keys: fetch.keys.clone(),
            retry_count: 0,
            content,
        }
    }

    pub(crate) fn into_retry(mut self) -> Self {
        self.retry_count += 1;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn deep(&self) -> u32 {
        self.deep
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    /// The payload produced by the fetch capability.
    pub fn content(&self) -> &C {
        &self.content
    }
}

impl<C> Prioritized for TaskParse<C> {
    fn priority(&self) -> i64 {
        self.priority
    }
}

/// An extracted item awaiting persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSave<I> {
    url: String,
    priority: i64,
    deep: u32,
    keys: Keys,
    retry_count: usize,
    item: I,
}

impl<I> TaskSave<I> {
    /// Derives a save task from the parse that extracted `item`.
    pub fn from_parse<C>(parse: &TaskParse<C>, item: I) -> Self {
        TaskSave {
            url: parse.url.clone(),
            priority: parse.priority,
            deep: parse.deep,
            keys: parse.keys.clone(),
            retry_count: 0,
            item,
        }
    }

    pub(crate) fn into_retry(mut self) -> Self {
        self.retry_count += 1;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn deep(&self) -> u32 {
        self.deep
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    /// The record produced by the parse capability.
    pub fn item(&self) -> &I {
        &self.item
    }
}

impl<I> Prioritized for TaskSave<I> {
    fn priority(&self) -> i64 {
        self.priority
    }
}
