//! Infrastructure layer - I/O adapters used by the crawl engine
//!
//! Configuration and logging, the proxy-routed HTTP transport with its retry
//! policy, HTML field extraction, and every file the engine reads or writes.

pub mod archive;
pub mod checkpoint_store;
pub mod config;
pub mod error_ledger;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod proxy;
pub mod retry_policy;
pub mod shard_store;
pub mod sitemap;
pub mod tabular;

pub use checkpoint_store::CheckpointStore;
pub use config::{AppConfig, ConfigManager};
pub use error_ledger::ErrorLedger;
pub use http_client::{FetchError, HttpTransport, PageFetcher, ProxyTransport};
pub use logging::{init_logging, init_logging_with_config};
pub use parsing::{FieldExtractor, ListingPageParser};
pub use shard_store::ShardWriter;
