//! Per-URL failure entries and their retry classification

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::canonical_url::CanonicalUrl;

static NOT_FOUND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(status:?\s*404\b|\b404 not found\b)").expect("static regex")
});

/// `{ "url": ..., "error": ... }` as stored in the error log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub url: CanonicalUrl,
    pub error: String,
}

impl ErrorEntry {
    pub fn new(url: CanonicalUrl, error: impl Into<String>) -> Self {
        Self {
            url,
            error: error.into(),
        }
    }

    pub fn class(&self) -> FailureClass {
        FailureClass::of_message(&self.error)
    }
}

/// Whether a failed URL is worth another crawl attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Page does not exist (404); retrying is futile
    Permanent,
    /// Network, proxy, timeout, 5xx or validation failures
    Transient,
}

impl FailureClass {
    pub fn of_message(message: &str) -> Self {
        if NOT_FOUND_PATTERN.is_match(message) {
            Self::Permanent
        } else {
            Self::Transient
        }
    }
}
