//! Allow/deny URL filtering

use serde::{Deserialize, Serialize};

/// Substring based URL filter.
///
/// A non-empty allow-list is exclusive: only URLs containing one of its patterns
/// are admitted and the deny-list is never consulted. Otherwise URLs containing
/// any deny pattern are rejected. Matching is case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlFilter {
    only_urls: Vec<String>,
    ignored_urls: Vec<String>,
}

impl UrlFilter {
    pub fn new(only_urls: Vec<String>, ignored_urls: Vec<String>) -> Self {
        Self {
            only_urls,
            ignored_urls,
        }
    }

    pub fn only_urls(&self) -> &[String] {
        &self.only_urls
    }

    pub fn ignored_urls(&self) -> &[String] {
        &self.ignored_urls
    }

    pub fn with_only_urls(&self, only_urls: Vec<String>) -> Self {
        Self {
            only_urls,
            ignored_urls: self.ignored_urls.clone(),
        }
    }

    pub fn with_ignored_urls(&self, ignored_urls: Vec<String>) -> Self {
        Self {
            only_urls: self.only_urls.clone(),
            ignored_urls,
        }
    }

    /// Whether `url` should be captured.
    ///
    /// An empty URL is never admitted, even with both lists empty. Otherwise a
    /// non-empty allow-list decides alone; failing that, any deny pattern
    /// rejects. Patterns are case-sensitive substrings.
    pub fn admit(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        if !self.only_urls.is_empty() {
            return self.only_urls.iter().any(|p| url.contains(p.as_str()));
        }
        !self.ignored_urls.iter().any(|p| url.contains(p.as_str()))
    }
}
