//! Domain module - core value objects of the listing crawler
//!
//! Everything in here is pure data plus the rules that belong to it:
//! - `canonical_url`: the unit of crawl work and its normalization rules
//! - `record`: extracted attribute maps and the declared column schema
//! - `checkpoint`: the durable resume pointer
//! - `error_entry`: per-URL failure ledger entries and their classification

pub mod canonical_url;
pub mod checkpoint;
pub mod error_entry;
pub mod record;

pub use canonical_url::{CanonicalUrl, UrlNormalizer, canonical_key};
pub use checkpoint::{Checkpoint, ResumePoint};
pub use error_entry::{ErrorEntry, FailureClass};
pub use record::{FieldKind, FieldSpec, Record, RecordSchema};
