//! Resume pointer persisted between runs

use serde::{Deserialize, Serialize};

use super::canonical_url::CanonicalUrl;

/// `{ "lastUrl": string|null, "processedCount": number }`
///
/// `processed_count` counts every attempted URL, accepted or not, so a URL that
/// keeps failing never pins the resume position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Checkpoint {
    pub last_url: Option<CanonicalUrl>,
    pub processed_count: u64,
}

/// Where a run starts relative to the loaded URL list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// No previous progress
    Start,
    /// Continue at this index
    From(usize),
    /// `lastUrl` is not in the list any more
    NotFound,
    /// `lastUrl` is the final entry, nothing left to do
    Completed,
}

impl Checkpoint {
    pub fn new(last_url: CanonicalUrl, processed_count: u64) -> Self {
        Self {
            last_url: Some(last_url),
            processed_count,
        }
    }

    /// Checkpoint after `attempted` more URLs ending at `last_url`
    #[must_use]
    pub fn advanced(&self, last_url: CanonicalUrl, attempted: u64) -> Self {
        Self::new(last_url, self.processed_count + attempted)
    }

    pub fn resume_point(&self, urls: &[CanonicalUrl]) -> ResumePoint {
        let Some(last) = &self.last_url else {
            return ResumePoint::Start;
        };
        match urls.iter().position(|url| url == last) {
            Some(index) if index + 1 == urls.len() => ResumePoint::Completed,
            Some(index) => ResumePoint::From(index + 1),
            None => ResumePoint::NotFound,
        }
    }
}
