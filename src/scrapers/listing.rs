//! Article discovery from the site's listing pages.
//!
//! The primary listing page and every category page are fetched in turn.
//! Anchors matched by the configured selectors are resolved, filtered down
//! to article-shaped URLs on the site's host, and collected into an ordered
//! set. When nothing qualifies, the static fallback list is returned.

use crate::config::{SiteConfig, compile_patterns, compile_selectors};
use crate::error::ConfigError;
use crate::transport::Transport;
use itertools::Itertools;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Compiled form of [`SiteConfig`].
#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    pub base: Url,
    pub listing: Url,
    pub categories: Vec<Url>,
    pub fallback: Vec<String>,
    pub article_prefix: String,
    pub min_depth: usize,
    pub link_selectors: Vec<Selector>,
    pub exclude: Vec<Regex>,
}

impl DiscoveryRules {
    pub fn compile(site: &SiteConfig) -> Result<Self, ConfigError> {
        let parse = |raw: &str| {
            Url::parse(raw).map_err(|e| ConfigError::Invalid(format!("URL {raw:?}: {e}")))
        };
        Ok(Self {
            base: parse(&site.base_url)?,
            listing: parse(&site.listing_url)?,
            categories: site
                .category_urls
                .iter()
                .map(|raw| parse(raw))
                .collect::<Result<_, _>>()?,
            fallback: site.fallback_urls.iter().cloned().sorted().dedup().collect(),
            article_prefix: site.article_path_prefix.clone(),
            min_depth: site.min_path_depth,
            link_selectors: compile_selectors(&site.link_selectors)?,
            exclude: compile_patterns(&site.exclude_patterns)?,
        })
    }

    /// Listing page first, then categories in configured order.
    pub fn index_pages(&self) -> Vec<&Url> {
        std::iter::once(&self.listing)
            .chain(self.categories.iter())
            .collect()
    }

    fn is_index_page(&self, url: &Url) -> bool {
        let key = without_trailing_slash(url.as_str());
        self.index_pages()
            .iter()
            .any(|page| without_trailing_slash(page.as_str()) == key)
    }
}

fn without_trailing_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Discover candidate article URLs, sorted and unique.
///
/// Index pages that fail to load are skipped. `delay` is waited between
/// consecutive index fetches.
#[instrument(level = "info", skip_all, fields(listing = %rules.listing))]
pub async fn discover<T: Transport>(
    transport: &T,
    rules: &DiscoveryRules,
    delay: Duration,
) -> Vec<String> {
    let mut found = BTreeSet::new();

    for (i, page) in rules.index_pages().into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match transport.fetch(page.as_str()).await {
            Ok(html) => {
                let links = collect_candidates(&html, rules);
                debug!(page = %page, count = links.len(), "Collected links from index page");
                found.extend(links);
            }
            Err(e) => warn!(page = %page, error = %e, "Index page fetch failed; skipping"),
        }
    }

    if found.is_empty() {
        warn!(
            fallback = rules.fallback.len(),
            "No article links discovered; using static fallback list"
        );
        return rules.fallback.clone();
    }

    info!(count = found.len(), "Discovered article URLs");
    found.into_iter().collect()
}

/// Qualifying article URLs linked from one index page.
pub fn collect_candidates(html: &str, rules: &DiscoveryRules) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    rules
        .link_selectors
        .iter()
        .flat_map(|selector| document.select(selector))
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| qualify(href, rules))
        .collect()
}

/// Resolve `href` and return it if it looks like a single article on the site.
pub fn qualify(href: &str, rules: &DiscoveryRules) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = rules.base.join(href).ok()?;
    url.set_fragment(None);
    if !matches!(url.scheme(), "http" | "https") || url.host_str() != rules.base.host_str() {
        return None;
    }
    if rules.exclude.iter().any(|pattern| pattern.is_match(url.as_str())) {
        return None;
    }
    if !url.path().starts_with(&rules.article_prefix) || path_depth(&url) < rules.min_depth {
        return None;
    }
    if rules.is_index_page(&url) {
        return None;
    }
    Some(url.to_string())
}

fn path_depth(url: &Url) -> usize {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}
