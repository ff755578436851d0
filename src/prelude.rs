//! A "prelude" for users of the `webspider` crate.
//!
//! This prelude re-exports the most commonly used traits, structs, and
//! macros so that they can be easily imported.
//!
//! # Example
//!
//! ```
//! use webspider::prelude::*;
//! ```

pub use crate::{
    // Core structs
    Proxy,
    TaskFetch,
    TaskParse,
    TaskSave,
    UrlFilter,
    WebSpider,
    WebSpiderBuilder,
    // Outcome envelopes
    FetchOutcome,
    ParseOutcome,
    ProxyBatch,
    ProxyHealth,
    SaveOutcome,
    Verdict,
    // Core traits
    Fetcher,
    Parser,
    ProxyProvider,
    Saver,
    // Lifecycle and support types
    Keys,
    Phase,
    SpiderError,
    StatCollector,
    // Essential re-exports for trait implementation
    async_trait,
};
