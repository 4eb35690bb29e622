//! Canonical listing URL value object
//!
//! A `CanonicalUrl` identifies one target page. Its position in the URL list is the
//! processing order, so lists are kept as ordered `Vec`s with first-seen deduplication.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Join key shared by the URL list, shard records and the error ledger.
pub fn canonical_key(raw: &str) -> &str {
    raw.trim()
}

/// Normalized page identifier used as the unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(canonical_key(raw.as_ref()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used as the listing identifier by extractors
    pub fn slug(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for CanonicalUrl {
    fn from(raw: String) -> Self {
        if raw.len() == canonical_key(&raw).len() {
            Self(raw)
        } else {
            Self::new(raw)
        }
    }
}

impl From<&str> for CanonicalUrl {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<CanonicalUrl> for String {
    fn from(url: CanonicalUrl) -> Self {
        url.0
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rules that turn raw sitemap `<loc>` values into canonical URLs
///
/// - known page-variant suffixes (`-alternatives`, `-status`) are stripped so every
///   variant collapses onto the listing page
/// - exact excluded URLs and fragment groups (every fragment of a group must be
///   contained for the URL to be dropped) filter navigation and index pages
#[derive(Debug, Clone, Default)]
pub struct UrlNormalizer {
    strip_suffixes: Vec<String>,
    excluded_exact: HashSet<String>,
    excluded_fragments: Vec<Vec<String>>,
}

impl UrlNormalizer {
    pub fn new(
        strip_suffixes: Vec<String>,
        excluded_exact: impl IntoIterator<Item = String>,
        excluded_fragments: Vec<Vec<String>>,
    ) -> Self {
        Self {
            strip_suffixes,
            excluded_exact: excluded_exact.into_iter().collect(),
            excluded_fragments,
        }
    }

    /// Normalize one raw URL; `None` when it is blank or excluded.
    pub fn normalize(&self, raw: &str) -> Option<CanonicalUrl> {
        let mut url = canonical_key(raw);
        if url.is_empty() {
            return None;
        }

        // strip repeatedly: "x-status-alternatives" collapses to "x"
        loop {
            let stripped = self
                .strip_suffixes
                .iter()
                .filter(|suffix| !suffix.is_empty())
                .find_map(|suffix| url.strip_suffix(suffix.as_str()));
            match stripped {
                Some(rest) => url = rest,
                None => break,
            }
        }

        if url.is_empty() || self.is_excluded(url) {
            return None;
        }
        Some(CanonicalUrl::new(url))
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        if self.excluded_exact.contains(url) {
            return true;
        }
        self.excluded_fragments.iter().any(|group| {
            !group.is_empty() && group.iter().all(|fragment| url.contains(fragment.as_str()))
        })
    }

    /// Normalize a whole sequence, keeping first-seen order and dropping duplicates.
    pub fn normalize_all<I, S>(&self, raw: I) -> Vec<CanonicalUrl>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        raw.into_iter()
            .filter_map(|url| self.normalize(url.as_ref()))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}
