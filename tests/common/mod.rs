//! Capability doubles and helpers shared by the webspider test suite.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use webspider::prelude::*;

/// Installs a test subscriber once per binary; respects `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Waits for the run to finish, failing the test instead of hanging.
#[allow(dead_code)]
pub async fn await_finish<F, P, S>(spider: &WebSpider<F, P, S>)
where
    F: Fetcher,
    P: Parser<Content = F::Content>,
    S: Saver<Item = P::Item>,
{
    tokio::time::timeout(Duration::from_secs(10), spider.wait_for_finished())
        .await
        .expect("crawl did not finish within 10s");
}

/// Fetcher double that records fetched URLs in order and serves the URL
/// itself back as page content.
#[allow(dead_code)]
pub struct RecordingFetcher {
    pub fetched: Arc<Mutex<Vec<String>>>,
    pub delay: Duration,
}

impl RecordingFetcher {
    #[allow(dead_code)]
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        Self::with_delay(Duration::ZERO)
    }

    #[allow(dead_code)]
    pub fn with_delay(delay: Duration) -> (Self, Arc<Mutex<Vec<String>>>) {
        let fetched = Arc::new(Mutex::new(Vec::new()));
        (
            RecordingFetcher {
                fetched: Arc::clone(&fetched),
                delay,
            },
            fetched,
        )
    }
}

#[async_trait]
impl Fetcher for RecordingFetcher {
    type Content = String;

    async fn fetch(
        &self,
        task: &TaskFetch,
        _proxy: Option<&Proxy>,
    ) -> Result<FetchOutcome<String>, SpiderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.fetched.lock().push(task.url().to_string());
        Ok(FetchOutcome::success(TaskParse::from_fetch(
            task,
            format!("content of {}", task.url()),
        )))
    }
}

/// Fetcher double that always reports a retryable failure.
#[allow(dead_code)]
pub struct RetryFetcher {
    pub attempts: Arc<AtomicUsize>,
}

impl RetryFetcher {
    #[allow(dead_code)]
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            RetryFetcher {
                attempts: Arc::clone(&attempts),
            },
            attempts,
        )
    }
}

#[async_trait]
impl Fetcher for RetryFetcher {
    type Content = String;

    async fn fetch(
        &self,
        _task: &TaskFetch,
        _proxy: Option<&Proxy>,
    ) -> Result<FetchOutcome<String>, SpiderError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(FetchOutcome::retry())
    }
}

/// Fetcher double that panics on every call.
#[allow(dead_code)]
pub struct PanickyFetcher {
    pub attempts: Arc<AtomicUsize>,
}

impl PanickyFetcher {
    #[allow(dead_code)]
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            PanickyFetcher {
                attempts: Arc::clone(&attempts),
            },
            attempts,
        )
    }
}

#[async_trait]
impl Fetcher for PanickyFetcher {
    type Content = String;

    async fn fetch(
        &self,
        _task: &TaskFetch,
        _proxy: Option<&Proxy>,
    ) -> Result<FetchOutcome<String>, SpiderError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        panic!("fetcher exploded");
    }
}

/// Fetcher double that records which proxy each fetch was handed.
#[allow(dead_code)]
pub struct ProxyProbeFetcher {
    pub proxies_seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl ProxyProbeFetcher {
    #[allow(dead_code)]
    pub fn new() -> (Self, Arc<Mutex<Vec<Option<String>>>>) {
        let proxies_seen = Arc::new(Mutex::new(Vec::new()));
        (
            ProxyProbeFetcher {
                proxies_seen: Arc::clone(&proxies_seen),
            },
            proxies_seen,
        )
    }
}

#[async_trait]
impl Fetcher for ProxyProbeFetcher {
    type Content = String;

    async fn fetch(
        &self,
        task: &TaskFetch,
        proxy: Option<&Proxy>,
    ) -> Result<FetchOutcome<String>, SpiderError> {
        self.proxies_seen
            .lock()
            .push(proxy.map(|p| p.url().to_string()));
        Ok(FetchOutcome::success(TaskParse::from_fetch(
            task,
            String::new(),
        )))
    }
}

/// Parser double that proposes the same fixed set of links for every page
/// and emits one item per page.
#[allow(dead_code)]
pub struct LinksParser {
    pub links: Vec<String>,
}

impl LinksParser {
    #[allow(dead_code)]
    pub fn leaf() -> Self {
        LinksParser { links: Vec::new() }
    }

    #[allow(dead_code)]
    pub fn proposing(links: &[&str]) -> Self {
        LinksParser {
            links: links.iter().map(|url| url.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Parser for LinksParser {
    type Content = String;
    type Item = String;

    async fn parse(
        &self,
        task: &TaskParse<String>,
    ) -> Result<ParseOutcome<String>, SpiderError> {
        let links = self
            .links
            .iter()
            .map(|url| TaskFetch::from_parse(task, url.clone()))
            .collect();
        let save = TaskSave::from_parse(task, format!("item from {}", task.url()));
        Ok(ParseOutcome::success(links, save))
    }
}

/// Parser double that invents fresh links forever, for stop() tests.
#[allow(dead_code)]
pub struct EndlessParser {
    pub fanout: usize,
    counter: AtomicUsize,
}

impl EndlessParser {
    #[allow(dead_code)]
    pub fn new(fanout: usize) -> Self {
        EndlessParser {
            fanout,
            counter: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Parser for EndlessParser {
    type Content = String;
    type Item = String;

    async fn parse(
        &self,
        task: &TaskParse<String>,
    ) -> Result<ParseOutcome<String>, SpiderError> {
        let links = (0..self.fanout)
            .map(|_| {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                TaskFetch::from_parse(task, format!("https://endless.test/page-{n}"))
            })
            .collect();
        let save = TaskSave::from_parse(task, task.url().to_string());
        Ok(ParseOutcome::success(links, save))
    }
}

/// One persisted row captured by `RecordingSaver`.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SavedRow {
    pub url: String,
    pub keys: Keys,
    pub item: String,
}

/// Saver double that collects everything it is asked to persist.
#[allow(dead_code)]
pub struct RecordingSaver {
    pub saved: Arc<Mutex<Vec<SavedRow>>>,
}

impl RecordingSaver {
    #[allow(dead_code)]
    pub fn new() -> (Self, Arc<Mutex<Vec<SavedRow>>>) {
        let saved = Arc::new(Mutex::new(Vec::new()));
        (
            RecordingSaver {
                saved: Arc::clone(&saved),
            },
            saved,
        )
    }
}

#[async_trait]
impl Saver for RecordingSaver {
    type Item = String;

    async fn save(&self, task: &TaskSave<String>) -> Result<SaveOutcome, SpiderError> {
        self.saved.lock().push(SavedRow {
            url: task.url().to_string(),
            keys: task.keys().clone(),
            item: task.item().clone(),
        });
        Ok(SaveOutcome::success())
    }
}

/// Provider double serving a fixed proxy list.
#[allow(dead_code)]
pub struct StaticProxyProvider {
    pub urls: Vec<String>,
    pub calls: Arc<AtomicUsize>,
}

impl StaticProxyProvider {
    #[allow(dead_code)]
    pub fn new(urls: &[&str]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            StaticProxyProvider {
                urls: urls.iter().map(|url| url.to_string()).collect(),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl ProxyProvider for StaticProxyProvider {
    async fn proxies(&self) -> Result<ProxyBatch, SpiderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProxyBatch::success(
            self.urls.iter().map(Proxy::new).collect(),
        ))
    }
}
