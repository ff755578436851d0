//! # Proxy Module
//!
//! Proxy descriptors, the rotating pool, and its background refresher.
//!
//! ## Overview
//!
//! Fetch workers draw proxies from one shared `ProxyPool`. The pool hands
//! out entries round-robin, retires entries reported unhealthy, and refills
//! itself from the configured `ProxyProvider` capability: once eagerly when
//! the run starts, on a fixed interval afterwards, and immediately when a
//! worker finds the pool exhausted. Without a provider the pool is inert
//! and every fetch goes direct.
//!
//! Refreshes never block rotation: the provider call happens outside the
//! pool lock, and proxies already held by in-flight fetches are unaffected
//! by a swap.

use crate::capability::ProxyProvider;
use crate::error::SpiderError;
use crate::outcome::Verdict;
use crate::state::RunState;
use crate::stats::StatCollector;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// A proxy endpoint handed to fetch capabilities, e.g.
/// `http://10.0.0.1:3128`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proxy {
    url: String,
}

impl Proxy {
    pub fn new(url: impl Into<String>) -> Self {
        Proxy { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// A rotating pool of proxies backed by an optional provider capability.
pub struct ProxyPool {
    provider: Option<Arc<dyn ProxyProvider>>,
    available: Mutex<VecDeque<Proxy>>,
    refreshing: AtomicBool,
    stats: Arc<StatCollector>,
}

impl ProxyPool {
    /// Creates a pool with no provider; `acquire` always returns `None` and
    /// fetches go direct.
    pub(crate) fn direct(stats: Arc<StatCollector>) -> Self {
        ProxyPool {
            provider: None,
            available: Mutex::new(VecDeque::new()),
            refreshing: AtomicBool::new(false),
            stats,
        }
    }

    /// Creates a pool that refills itself from `provider`.
    pub(crate) fn with_provider(
        provider: Arc<dyn ProxyProvider>,
        stats: Arc<StatCollector>,
    ) -> Self {
        ProxyPool {
            provider: Some(provider),
            available: Mutex::new(VecDeque::new()),
            refreshing: AtomicBool::new(false),
            stats,
        }
    }

    /// Checks whether a provider capability is configured.
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Takes the next proxy in rotation, refreshing once on exhaustion.
    /// `None` means the fetch should go direct.
    pub async fn acquire(&self) -> Option<Proxy> {
        self.provider.as_ref()?;
        if let Some(proxy) = self.rotate() {
            return Some(proxy);
        }
        // One caller performs the refresh; concurrent losers go direct this
        // round instead of queueing behind the provider call.
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let result = self.refresh().await;
            self.refreshing.store(false, Ordering::SeqCst);
            if let Err(error) = result {
                warn!("proxy refresh on exhaustion failed: {}", error);
            }
        }
        self.rotate()
    }

    fn rotate(&self) -> Option<Proxy> {
        let mut available = self.available.lock();
        let proxy = available.pop_front()?;
        available.push_back(proxy.clone());
        drop(available);
        self.stats.increment_proxies_served();
        Some(proxy)
    }

    /// Applies a health report from a fetch. Unhealthy proxies leave the
    /// rotation until the next refresh puts them back.
    pub fn report(&self, proxy: &Proxy, healthy: bool) {
        if healthy {
            return;
        }
        let mut available = self.available.lock();
        let before = available.len();
        available.retain(|candidate| candidate != proxy);
        let removed = before - available.len();
        let remaining = available.len();
        drop(available);
        if removed > 0 {
            self.stats.increment_proxies_retired();
            debug!("proxy retired: {} ({} remaining)", proxy, remaining);
        }
    }

    /// Replaces the pool contents with a fresh batch from the provider.
    /// A non-success batch keeps the current contents.
    pub async fn refresh(&self) -> Result<usize, SpiderError> {
        let Some(provider) = &self.provider else {
            return Ok(0);
        };
        let batch = provider.proxies().await?;
        if batch.verdict != Verdict::Success {
            warn!("proxy provider returned no usable batch, keeping current pool");
            return Ok(self.available.lock().len());
        }
        let count = batch.proxies.len();
        *self.available.lock() = batch.proxies.into();
        self.stats.increment_proxy_refreshes();
        debug!("proxy pool refreshed with {} proxies", count);
        Ok(count)
    }

    /// The number of proxies currently in rotation.
    pub fn len(&self) -> usize {
        self.available.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawns the background task that keeps the pool fresh: one eager refresh,
/// then one per `interval`, until the run stops.
pub(crate) fn spawn_refresher(
    pool: Arc<ProxyPool>,
    state: Arc<RunState>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        trace!("proxy refresher started, interval {:?}", interval);
        if let Err(error) = pool.refresh().await {
            warn!("initial proxy refresh failed: {}", error);
        }
        loop {
            tokio::select! {
                _ = state.stopping() => break,
                _ = tokio::time::sleep(interval) => {
                    if let Err(error) = pool.refresh().await {
                        warn!("periodic proxy refresh failed: {}", error);
                    }
                }
            }
        }
        trace!("proxy refresher exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ProxyBatch;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct StaticProvider {
        proxies: Vec<Proxy>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn new(urls: &[&str]) -> Self {
            StaticProvider {
                proxies: urls.iter().copied().map(Proxy::new).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProxyProvider for StaticProvider {
        async fn proxies(&self) -> Result<ProxyBatch, SpiderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProxyBatch::success(self.proxies.clone()))
        }
    }

    // Serves one good batch, then nothing.
    struct DryingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProxyProvider for DryingProvider {
        async fn proxies(&self) -> Result<ProxyBatch, SpiderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(ProxyBatch::success(vec![Proxy::new("http://only:1")]))
            } else {
                Ok(ProxyBatch::unavailable())
            }
        }
    }

    fn stats() -> Arc<StatCollector> {
        Arc::new(StatCollector::default())
    }

    #[tokio::test]
    async fn pool_without_provider_always_goes_direct() {
        let pool = ProxyPool::direct(stats());
        assert!(!pool.has_provider());
        assert!(pool.acquire().await.is_none());
    }

    #[tokio::test]
    async fn acquire_rotates_round_robin() {
        let provider = Arc::new(StaticProvider::new(&["http://a:1", "http://b:2"]));
        let pool = ProxyPool::with_provider(provider, stats());
        pool.refresh().await.unwrap();

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        let third = pool.acquire().await.unwrap();
        assert_eq!(first.url(), "http://a:1");
        assert_eq!(second.url(), "http://b:2");
        assert_eq!(third.url(), "http://a:1");
    }

    #[tokio::test]
    async fn exhausted_pool_refreshes_itself_on_acquire() {
        let provider = Arc::new(StaticProvider::new(&["http://a:1"]));
        let calls = Arc::clone(&provider);
        let pool = ProxyPool::with_provider(provider, stats());

        assert!(pool.is_empty());
        let proxy = pool.acquire().await.unwrap();
        assert_eq!(proxy.url(), "http://a:1");
        assert_eq!(calls.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unhealthy_report_retires_proxy_until_refresh() {
        let provider = Arc::new(StaticProvider::new(&["http://a:1", "http://b:2"]));
        let collected = stats();
        let pool = ProxyPool::with_provider(provider, Arc::clone(&collected));
        pool.refresh().await.unwrap();

        let victim = Proxy::new("http://a:1");
        pool.report(&victim, false);
        assert_eq!(pool.len(), 1);
        assert_eq!(collected.proxies_retired.load(Ordering::SeqCst), 1);

        // Healthy reports and repeats are no-ops.
        pool.report(&victim, false);
        pool.report(&Proxy::new("http://b:2"), true);
        assert_eq!(pool.len(), 1);
        assert_eq!(collected.proxies_retired.load(Ordering::SeqCst), 1);

        pool.refresh().await.unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn failed_batch_keeps_current_pool() {
        let provider = Arc::new(DryingProvider {
            calls: AtomicUsize::new(0),
        });
        let pool = ProxyPool::with_provider(provider, stats());

        pool.refresh().await.unwrap();
        assert_eq!(pool.len(), 1);

        pool.refresh().await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.acquire().await.unwrap().url(), "http://only:1");
    }
}
