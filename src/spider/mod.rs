//! # Spider Module
//!
//! Implements the staged crawling engine that orchestrates fetch, parse, and
//! save work.
//!
//! ## Overview
//!
//! The spider module provides the main `WebSpider` struct and the worker
//! pools it manages. Tasks flow seed → fetch → parse → save through three
//! priority queues; every piece of crawl-specific logic is delegated to the
//! configured capabilities, so the engine itself never touches the network
//! or disk.
//!
//! ## Key Components
//!
//! - **WebSpider**: The central orchestrator that manages the crawl lifecycle
//! - **Fetch Stage**: Retrieves page content, optionally through the proxy pool
//! - **Parse Stage**: Extracts links and items, feeding both back into the pipeline
//! - **Save Stage**: Persists extracted items
//!
//! ## Architecture
//!
//! Each stage is a pool of Tokio tasks draining a shared priority queue.
//! A supervisor task watches the outstanding-work counter and tears the run
//! down once the pipeline is verifiably empty or a stop is requested.
//!
//! ## Internal Components
//!
//! These are implementation details and are not typically used directly:
//! - `spawn_fetch_stage`: Creates the worker pool for fetch tasks
//! - `spawn_parse_stage`: Creates the worker pool for parse tasks
//! - `spawn_save_stage`: Creates the worker pool for save tasks

mod core;
mod fetch_stage;
mod parse_stage;
mod save_stage;

pub use self::core::WebSpider;

pub(crate) use fetch_stage::spawn_fetch_stage;
pub(crate) use parse_stage::spawn_parse_stage;
pub(crate) use save_stage::spawn_save_stage;

/// Renders a panic payload caught from a capability call for logging.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "opaque panic payload".to_string(),
        },
    }
}
