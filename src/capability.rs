//! # Capability Module
//!
//! Defines the pluggable stage traits that carry all crawl-specific logic.
//!
//! ## Overview
//!
//! The engine is generic machinery; everything that touches the network or
//! disk lives behind one of four async traits, one per concern. The
//! orchestrator owns a worker pool per stage and depends only on these
//! traits, so swapping an HTTP client or a storage backend never touches
//! engine code. Implementations are shared across a pool, which is why
//! every method takes `&self`.
//!
//! ## Key Components
//!
//! - **Fetcher**: Retrieves the content a fetch task points at
//! - **Parser**: Extracts links and an item from fetched content
//! - **Saver**: Persists extracted items
//! - **ProxyProvider**: Produces proxy descriptors for the rotating pool
//!
//! ## Example
//!
//! ```rust,ignore
//! use webspider::{async_trait, Fetcher, FetchOutcome, Proxy, SpiderError};
//! use webspider::{TaskFetch, TaskParse};
//!
//! struct HttpFetcher {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl Fetcher for HttpFetcher {
//!     type Content = (u16, String);
//!
//!     async fn fetch(
//!         &self,
//!         task: &TaskFetch,
//!         _proxy: Option<&Proxy>,
//!     ) -> Result<FetchOutcome<Self::Content>, SpiderError> {
//!         let response = match self.client.get(task.url()).send().await {
//!             Ok(response) => response,
//!             Err(_) => return Ok(FetchOutcome::retry()),
//!         };
//!         let status = response.status().as_u16();
//!         let body = response.text().await.map_err(SpiderError::capability)?;
//!         Ok(FetchOutcome::success(TaskParse::from_fetch(task, (status, body))))
//!     }
//! }
//! ```

use crate::error::SpiderError;
use crate::outcome::{FetchOutcome, ParseOutcome, ProxyBatch, SaveOutcome};
use crate::proxy::Proxy;
use crate::task::{TaskFetch, TaskParse, TaskSave};
use async_trait::async_trait;

/// Defines the contract for retrieving the content a fetch task points at.
///
/// Implementations should bound their own I/O with a timeout and report
/// ordinary failures through the outcome verdict rather than `Err`; an
/// `Err` (or a panic) is treated like a retry verdict and counted against
/// the same retry budget.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// The payload handed to the parse stage, e.g. a status/body pair.
    type Content: Send + 'static;

    /// Fetches one task, optionally through `proxy`.
    async fn fetch(
        &self,
        task: &TaskFetch,
        proxy: Option<&Proxy>,
    ) -> Result<FetchOutcome<Self::Content>, SpiderError>;
}

/// Defines the contract for extracting links and an item from fetched
/// content.
///
/// Discovered links are returned unfiltered; the engine applies the URL
/// filter and the depth ceiling before any of them become fetch tasks.
#[async_trait]
pub trait Parser: Send + Sync + 'static {
    /// The fetch payload this parser understands.
    type Content: Send + 'static;
    /// The extracted record handed to the save stage.
    type Item: Send + 'static;

    /// Parses one fetched page.
    async fn parse(
        &self,
        task: &TaskParse<Self::Content>,
    ) -> Result<ParseOutcome<Self::Item>, SpiderError>;
}

/// Defines the contract for persisting an extracted item.
#[async_trait]
pub trait Saver: Send + Sync + 'static {
    /// The record type this saver persists.
    type Item: Send + 'static;

    /// Persists one item.
    async fn save(&self, task: &TaskSave<Self::Item>) -> Result<SaveOutcome, SpiderError>;
}

/// Defines the contract for producing proxy descriptors.
///
/// Called once eagerly when the run starts and again on every refresh,
/// whether scheduled or triggered by pool exhaustion.
#[async_trait]
pub trait ProxyProvider: Send + Sync + 'static {
    /// Produces the next batch of proxies for the pool.
    async fn proxies(&self) -> Result<ProxyBatch, SpiderError>;
}
