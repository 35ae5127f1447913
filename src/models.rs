//! Data models for extracted articles and the assembled feed.
//!
//! - [`ExtractedArticle`]: one article as read from its page
//! - [`Published`]: a publish instant that remembers whether it was observed
//! - [`FeedDocument`]: channel metadata plus ordered [`FeedEntry`] values

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// The publish instant of an article, always in UTC.
///
/// `Defaulted` marks articles whose page carried no parseable date; the
/// instant is then the extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Published {
    Observed(DateTime<Utc>),
    Defaulted(DateTime<Utc>),
}

impl Published {
    pub fn instant(&self) -> DateTime<Utc> {
        match *self {
            Published::Observed(at) | Published::Defaulted(at) => at,
        }
    }

    pub fn is_observed(&self) -> bool {
        matches!(self, Published::Observed(_))
    }
}

/// The lead image chosen for an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadImage {
    /// Absolute URL.
    pub url: String,
    /// Sanitized alt text, if the page provided one.
    pub alt: Option<String>,
}

/// A single article extracted from its page.
///
/// Built once by the orchestrator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedArticle {
    /// Sanitized, never empty.
    pub title: String,
    /// Absolute article URL; the GUID is derived from it.
    pub link: String,
    /// Sanitized plain text, never empty.
    pub body: String,
    pub published: Published,
    pub lead_image: Option<LeadImage>,
}

impl ExtractedArticle {
    pub fn published_at(&self) -> DateTime<Utc> {
        self.published.instant()
    }
}

/// Newest first; equal instants are ordered by link so the result is deterministic.
pub fn newest_first(a: &ExtractedArticle, b: &ExtractedArticle) -> Ordering {
    b.published_at()
        .cmp(&a.published_at())
        .then_with(|| a.link.cmp(&b.link))
}

/// Media attachment of a feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enclosure {
    pub url: String,
    /// Size in bytes; `0` when the server did not say.
    pub length: u64,
    pub mime_type: String,
}

/// Channel-level metadata of the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    pub title: String,
    pub description: String,
    /// The human-readable listing page.
    pub site_link: String,
    /// Where this feed itself is published.
    pub self_link: String,
    pub language: String,
    pub last_build: DateTime<Utc>,
    pub ttl_minutes: u32,
    pub docs: String,
    pub generator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    /// Permalink GUID, identical to `link`.
    pub guid: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: DateTime<Utc>,
    pub enclosure: Option<Enclosure>,
}

/// A complete feed ready to be serialized.
///
/// Entries are in non-increasing `published` order and GUIDs are unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedDocument {
    pub channel: Channel,
    pub entries: Vec<FeedEntry>,
}
