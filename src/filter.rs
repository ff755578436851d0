//! # Filter Module
//!
//! URL admission: pattern gates, normalization, and crawl-wide dedup.
//!
//! ## Overview
//!
//! Every link discovered by the parse stage passes through one `UrlFilter`
//! before it can become a fetch task. The filter applies three gates in
//! order: black patterns reject first, then a non-empty white list must
//! match, then the normalized URL must not have been admitted before.
//! The seen-set insert is a single atomic step, so concurrent parse workers
//! racing on the same URL admit it exactly once.
//!
//! Dedup identity is the normalized URL and nothing else; metadata such as
//! keys or priority never participates.
//!
//! ## Key Components
//!
//! - **UrlFilter**: The admission gate, shared by every parse worker
//! - **normalize_url**: The canonical form used for matching and dedup
//! - **resolve_url**: Joins page-relative hrefs into absolute URLs

use crate::error::SpiderError;
use dashmap::DashSet;
use regex::Regex;
use tracing::trace;
use url::Url;

/// Admission gate for discovered URLs.
#[derive(Debug, Default)]
pub struct UrlFilter {
    white: Vec<Regex>,
    black: Vec<Regex>,
    seen: DashSet<String>,
    dedup_disabled: bool,
}

impl UrlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an acceptance pattern. Once any whitelist entry is present,
    /// URLs matching none of them are rejected.
    ///
    /// Patterns are matched against the normalized URL.
    pub fn whitelist(mut self, pattern: Regex) -> Self {
        self.white.push(pattern);
        self
    }

    /// Adds a rejection pattern. Black patterns win over white ones.
    pub fn blacklist(mut self, pattern: Regex) -> Self {
        self.black.push(pattern);
        self
    }

    /// Disables the seen-URL dedup. Pattern gates still apply.
    pub fn without_dedup(mut self) -> Self {
        self.dedup_disabled = true;
        self
    }

    /// Decides whether `url` may become a fetch task, recording it as seen
    /// when admitted.
    pub fn admit(&self, url: &str) -> bool {
        let Ok(normalized) = normalize_url(url) else {
            trace!("url rejected as malformed: {}", url);
            return false;
        };
        if self.black.iter().any(|re| re.is_match(&normalized)) {
            trace!("url rejected by black pattern: {}", normalized);
            return false;
        }
        if !self.white.is_empty() && !self.white.iter().any(|re| re.is_match(&normalized)) {
            trace!("url matched no white pattern: {}", normalized);
            return false;
        }
        if self.dedup_disabled {
            return true;
        }
        // insert returns false when the URL was already present, which makes
        // check-and-record one atomic step.
        self.seen.insert(normalized)
    }

    /// The number of distinct URLs admitted so far.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Normalizes a URL into the canonical form used for pattern matching and
/// dedup identity: fragment stripped, query parameters sorted by key. The
/// parser already lowercases the host and drops default ports.
pub fn normalize_url(url: &str) -> Result<String, SpiderError> {
    let mut parsed = Url::parse(url).map_err(|source| SpiderError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        pairs.sort();
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())));
    }

    Ok(parsed.into())
}

/// Joins a possibly-relative `href` against the page URL it appeared on,
/// returning an absolute http(s) URL. Bare fragments and non-crawlable
/// schemes such as `mailto:` or `javascript:` resolve to `None`.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lowered = href.to_ascii_lowercase();
    for scheme in ["mailto:", "javascript:", "tel:", "data:"] {
        if lowered.starts_with(scheme) {
            return None;
        }
    }
    let base = Url::parse(base).ok()?;
    let joined = base.join(href).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_canonicalizes_equivalent_urls() {
        let normalized = normalize_url("HTTPS://Example.COM:443/path?b=2&a=1#frag").unwrap();
        assert_eq!(normalized, "https://example.com/path?a=1&b=2");

        let same = normalize_url("https://example.com/path?a=1&b=2").unwrap();
        assert_eq!(normalized, same);
    }

    #[test]
    fn normalization_drops_empty_query_and_fragment() {
        let normalized = normalize_url("http://example.com/page?#top").unwrap();
        assert_eq!(normalized, "http://example.com/page");
    }

    #[test]
    fn malformed_urls_are_rejected() {
        assert!(normalize_url("not a url").is_err());
        let filter = UrlFilter::new();
        assert!(!filter.admit("::nope::"));
    }

    #[test]
    fn admits_each_normalized_url_once() {
        let filter = UrlFilter::new();
        assert!(filter.admit("https://example.com/a?x=1&y=2"));
        assert!(!filter.admit("https://example.com/a?y=2&x=1"));
        assert!(!filter.admit("https://EXAMPLE.com/a?x=1&y=2#section"));
        assert_eq!(filter.seen_count(), 1);
    }

    #[test]
    fn whitelist_rejects_other_hosts() {
        let filter = UrlFilter::new().whitelist(Regex::new(r"^https://good\.example").unwrap());
        assert!(filter.admit("https://good.example/page"));
        assert!(!filter.admit("https://evil.example/page"));
    }

    #[test]
    fn blacklist_wins_over_whitelist() {
        let filter = UrlFilter::new()
            .whitelist(Regex::new(r"^https://example\.com").unwrap())
            .blacklist(Regex::new(r"\.pdf$").unwrap());
        assert!(filter.admit("https://example.com/page"));
        assert!(!filter.admit("https://example.com/report.pdf"));
    }

    #[test]
    fn dedup_can_be_disabled() {
        let filter = UrlFilter::new().without_dedup();
        assert!(filter.admit("https://example.com/a"));
        assert!(filter.admit("https://example.com/a"));
    }

    #[test]
    fn concurrent_admits_of_one_url_produce_one_winner() {
        let filter = UrlFilter::new();
        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| filter.admit("https://example.com/raced")))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|admitted| *admitted)
                .count()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn resolve_joins_relative_hrefs() {
        assert_eq!(
            resolve_url("https://example.com/dir/page", "../other").as_deref(),
            Some("https://example.com/other")
        );
        assert_eq!(
            resolve_url("https://example.com/", "https://elsewhere.test/x").as_deref(),
            Some("https://elsewhere.test/x")
        );
    }

    #[test]
    fn resolve_skips_non_crawlable_hrefs() {
        assert_eq!(resolve_url("https://example.com/", "#anchor"), None);
        assert_eq!(resolve_url("https://example.com/", "mailto:a@b.c"), None);
        assert_eq!(resolve_url("https://example.com/", "javascript:void(0)"), None);
        assert_eq!(resolve_url("https://example.com/", "  "), None);
    }
}
