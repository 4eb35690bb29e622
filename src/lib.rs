//! Listing Harvester - resumable batch crawler for directory listing pages
//!
//! Sitemap discovery feeds a canonical URL list into a concurrency-bounded,
//! proxy-routed fetch → extract → validate engine. Accepted records land in
//! fixed-size JSON/CSV shards with a durable checkpoint, failures in an error
//! ledger, and a reconciler computes what is still worth crawling.

pub mod application;
pub mod control;
pub mod crawling;
pub mod domain;
pub mod infrastructure;
