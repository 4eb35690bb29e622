//! HTML field extraction for listing pages
//!
//! The crawl engine only depends on the `FieldExtractor` trait: a pure function from
//! a page body to a flat `Record`, plus the `RecordSchema` describing its columns.

pub mod listing_page_parser;

pub use listing_page_parser::ListingPageParser;

use thiserror::Error;

use crate::domain::{CanonicalUrl, Record, RecordSchema};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),
}

pub type ParsingResult<T> = Result<T, ParsingError>;

/// Turns a fetched page into a record
pub trait FieldExtractor: Send + Sync {
    /// Declared output columns, stable for the lifetime of the extractor
    fn schema(&self) -> &RecordSchema;

    /// Extract the record for `url` from `body`. The returned record's `url`
    /// field is overwritten by the engine with the canonical URL.
    fn extract(&self, body: &str, url: &CanonicalUrl) -> ParsingResult<Record>;
}
