//! Run configuration.
//!
//! Every field has a default tuned for the About Amazon Italia newsroom, so
//! a config file is optional. A YAML file may override any subset of
//! fields; the CLI then overrides a few run-level values on top.
//!
//! ```yaml
//! site:
//!   listing_url: https://www.aboutamazon.it/notizie
//!   category_urls:
//!     - https://www.aboutamazon.it/notizie/lavoro
//! feed:
//!   self_url: https://example.org/feed.xml
//!   output_path: docs/feed.xml
//! http:
//!   politeness_delay_ms: 1500
//! ```

use crate::error::ConfigError;
use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Upper bound on concurrent worker lanes.
pub const MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub extraction: ExtractionConfig,
    pub feed: FeedConfig,
    pub http: HttpConfig,
}

/// Where articles are discovered and what an article URL looks like.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub listing_url: String,
    pub category_urls: Vec<String>,
    /// Used verbatim when discovery finds nothing.
    pub fallback_urls: Vec<String>,
    pub article_path_prefix: String,
    /// Minimum number of non-empty path segments for an article URL.
    pub min_path_depth: usize,
    pub link_selectors: Vec<String>,
    /// Regular expressions matched against the absolute URL. The defaults
    /// only match whole path segments.
    pub exclude_patterns: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.aboutamazon.it".to_string(),
            listing_url: "https://www.aboutamazon.it/notizie".to_string(),
            category_urls: Vec::new(),
            fallback_urls: Vec::new(),
            article_path_prefix: "/notizie/".to_string(),
            min_path_depth: 3,
            link_selectors: vec![
                r#"a[href*="/notizie/"]"#.to_string(),
                "article a[href]".to_string(),
                ".card a[href]".to_string(),
                "h2 a[href]".to_string(),
                "h3 a[href]".to_string(),
            ],
            exclude_patterns: vec![
                r"/tags?(/|\?|$)".to_string(),
                r"/search(/|\?|$)".to_string(),
                r"/cerca(/|\?|$)".to_string(),
                r"/categor(ia|y)(/|\?|$)".to_string(),
                r"/page/\d+(/|\?|$)".to_string(),
                r"[?&]page=".to_string(),
            ],
        }
    }
}

/// Selector lists and placeholders used by the attribute extractors.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Checked in order; the first one present in `<title>` splits off the site name.
    pub title_separators: Vec<String>,
    pub title_placeholder: String,
    /// `{url}` is replaced with the article URL.
    pub body_placeholder: String,
    pub body_containers: Vec<String>,
    pub noise_selectors: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            title_separators: vec![
                " — ".to_string(),
                " – ".to_string(),
                " | ".to_string(),
                " - ".to_string(),
            ],
            title_placeholder: "Articolo senza titolo".to_string(),
            body_placeholder: "Contenuto non disponibile. Leggi l'articolo originale: {url}"
                .to_string(),
            body_containers: vec![
                "article".to_string(),
                "main".to_string(),
                "div.article-body".to_string(),
                "div.article-content".to_string(),
                "div.content".to_string(),
            ],
            noise_selectors: vec![
                "nav".to_string(),
                "footer".to_string(),
                "aside".to_string(),
                "header".to_string(),
                "script".to_string(),
                "style".to_string(),
                "noscript".to_string(),
                "form".to_string(),
                ".sidebar".to_string(),
            ],
        }
    }
}

/// Channel metadata and output limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    pub title: String,
    pub description: String,
    pub language: String,
    /// Public URL where the generated feed is served.
    pub self_url: String,
    pub output_path: String,
    pub ttl_minutes: u32,
    pub docs_url: String,
    pub max_items: usize,
    pub description_max_chars: usize,
    pub truncation_marker: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: "About Amazon Italia — Notizie (feed non ufficiale)".to_string(),
            description: "Feed non ufficiale con contenuto completo (testo) degli articoli \
                          da About Amazon Italia (aboutamazon.it)."
                .to_string(),
            language: "it".to_string(),
            self_url: String::new(),
            output_path: "docs/feed.xml".to_string(),
            ttl_minutes: 60,
            docs_url: "https://www.rssboard.org/rss-specification".to_string(),
            max_items: 30,
            description_max_chars: 100_000,
            truncation_marker: " […]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Minimum pause between two fetches of the same worker lane.
    pub politeness_delay_ms: u64,
    /// Random extra pause added on top of the politeness delay.
    pub delay_jitter_ms: u64,
    pub concurrency: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; AboutAmazonIT-RSS/1.0)".to_string(),
            timeout_secs: 20,
            probe_timeout_secs: 10,
            politeness_delay_ms: 1000,
            delay_jitter_ms: 0,
            concurrency: 1,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }
}

impl Config {
    /// Load configuration from an optional YAML file, falling back to defaults.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(Path::new(path)).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(path, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Reject configurations the pipeline can not run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("site.base_url", &self.site.base_url),
            ("site.listing_url", &self.site.listing_url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{name} {value:?}: {e}")))?;
        }
        for value in self.site.category_urls.iter().chain(&self.site.fallback_urls) {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("URL {value:?}: {e}")))?;
        }

        if self.feed.self_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "feed.self_url must be set to the public URL of the feed".to_string(),
            ));
        }
        Url::parse(&self.feed.self_url)
            .map_err(|e| ConfigError::Invalid(format!("feed.self_url: {e}")))?;

        for (name, value) in [
            ("extraction.title_placeholder", &self.extraction.title_placeholder),
            ("extraction.body_placeholder", &self.extraction.body_placeholder),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be blank")));
            }
        }

        if self.http.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "http.concurrency must be at least 1".to_string(),
            ));
        }
        if self.feed.max_items == 0 {
            return Err(ConfigError::Invalid(
                "feed.max_items must be at least 1".to_string(),
            ));
        }
        if self.feed.description_max_chars <= self.feed.truncation_marker.chars().count() {
            return Err(ConfigError::Invalid(
                "feed.description_max_chars must exceed the truncation marker length".to_string(),
            ));
        }

        compile_selectors(&self.site.link_selectors)?;
        compile_selectors(&self.extraction.body_containers)?;
        compile_selectors(&self.extraction.noise_selectors)?;
        compile_patterns(&self.site.exclude_patterns)?;
        Ok(())
    }

    /// Worker lanes actually used: configured value clamped to `1..=MAX_CONCURRENCY`.
    pub fn lanes(&self) -> usize {
        self.http.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

pub fn compile_selectors(raw: &[String]) -> Result<Vec<Selector>, ConfigError> {
    raw.iter()
        .map(|s| {
            Selector::parse(s)
                .map_err(|e| ConfigError::Invalid(format!("selector {s:?}: {e}")))
        })
        .collect()
}

pub fn compile_patterns(raw: &[String]) -> Result<Vec<Regex>, ConfigError> {
    raw.iter()
        .map(|p| Regex::new(p).map_err(|e| ConfigError::Invalid(format!("pattern {p:?}: {e}"))))
        .collect()
}
