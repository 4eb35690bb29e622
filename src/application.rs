//! Application layer - one-shot jobs composed from the engine and its adapters

pub mod consolidate;
pub mod crawl_use_cases;

pub use crawl_use_cases::CrawlUseCases;
