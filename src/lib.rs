//! # webspider
//!
//! A pluggable, staged web-crawling engine.
//!
//! Provides the main components: `WebSpider`, `WebSpiderBuilder`, the stage
//! capability traits, and infrastructure (priority queues, URL filter,
//! proxy pool, statistics).
//!
//! Work flows seed → fetch → parse → save through priority queues. The
//! engine owns scheduling, dedup, retry with backoff, backpressure, and
//! termination; the configured capabilities own everything that touches the
//! network or disk.
//!
//! ## Example
//!
//! ```rust,ignore
//! use webspider::{
//!     async_trait, FetchOutcome, Fetcher, Proxy, SpiderError, TaskFetch, TaskParse,
//!     UrlFilter, WebSpiderBuilder,
//! };
//!
//! struct MyFetcher {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl Fetcher for MyFetcher {
//!     type Content = String;
//!
//!     async fn fetch(
//!         &self,
//!         task: &TaskFetch,
//!         _proxy: Option<&Proxy>,
//!     ) -> Result<FetchOutcome<String>, SpiderError> {
//!         match self.client.get(task.url()).send().await {
//!             Ok(response) => {
//!                 let body = response.text().await.map_err(SpiderError::capability)?;
//!                 Ok(FetchOutcome::success(TaskParse::from_fetch(task, body)))
//!             }
//!             Err(_) => Ok(FetchOutcome::retry()),
//!         }
//!     }
//! }
//!
//! // ... MyParser extracting links and a title, MySaver appending rows ...
//!
//! async fn run_spider(fetcher: MyFetcher, parser: MyParser, saver: MySaver)
//!     -> Result<(), SpiderError>
//! {
//!     let spider = WebSpiderBuilder::new(fetcher, parser, saver)
//!         .max_repeat(3)
//!         .max_deep(2)
//!         .url_filter(UrlFilter::new())
//!         .build()?;
//!
//!     spider.set_start_task(TaskFetch::new("https://www.appinn.com/").with_key("type", "index"))?;
//!     spider.start_working(5)?;
//!     spider.wait_for_finished().await;
//!
//!     println!("{}", spider.get_stats());
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod capability;
pub mod error;
pub mod filter;
pub mod outcome;
pub mod prelude;
pub mod proxy;
pub mod queue;
pub mod spider;
pub mod state;
pub mod stats;
pub mod task;

pub use builder::{SpiderConfig, WebSpiderBuilder};
pub use capability::{Fetcher, Parser, ProxyProvider, Saver};
pub use error::SpiderError;
pub use filter::{UrlFilter, normalize_url, resolve_url};
pub use outcome::{FetchOutcome, ParseOutcome, ProxyBatch, ProxyHealth, SaveOutcome, Verdict};
pub use proxy::{Proxy, ProxyPool};
pub use queue::{Prioritized, TaskQueue};
pub use spider::WebSpider;
pub use state::Phase;
pub use stats::StatCollector;
pub use task::{Keys, TaskFetch, TaskParse, TaskSave};

pub use async_trait::async_trait;
pub use tokio;
