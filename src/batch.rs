//! One full run: discover, extract, sort, assemble.
//!
//! Candidates are dealt round-robin into at most [`MAX_CONCURRENCY`] lanes.
//! Each lane fetches its URLs one after another and pauses before every
//! fetch, including the first one after discovery. Lanes are polled together
//! on the current task. Per-URL failures are logged and dropped. Output
//! order comes only from the final sort.
//!
//! [`MAX_CONCURRENCY`]: crate::config::MAX_CONCURRENCY

use crate::config::Config;
use crate::error::{AssemblyError, ConfigError};
use crate::extract::{ContentExtractor, ExtractionRules};
use crate::models::{ExtractedArticle, FeedDocument, newest_first};
use crate::outputs::rss::{assemble, probe_enclosures};
use crate::scrapers::article::ArticleExtractor;
use crate::scrapers::listing::{DiscoveryRules, discover};
use crate::transport::Transport;
use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct Pipeline<'a, T> {
    transport: &'a T,
    readability: &'a dyn ContentExtractor,
    config: &'a Config,
    discovery: DiscoveryRules,
    extraction: ExtractionRules,
}

impl<'a, T: Transport> Pipeline<'a, T> {
    pub fn new(
        transport: &'a T,
        readability: &'a dyn ContentExtractor,
        config: &'a Config,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            transport,
            readability,
            config,
            discovery: DiscoveryRules::compile(&config.site)?,
            extraction: ExtractionRules::compile(&config.extraction)?,
        })
    }

    /// Run the whole pipeline and return the assembled feed.
    ///
    /// Fails with [`AssemblyError::NoArticles`] when no candidate produced a
    /// usable article.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<FeedDocument, AssemblyError> {
        let delay = self.config.http.politeness_delay();
        let mut candidates = discover(self.transport, &self.discovery, delay).await;
        if candidates.len() > self.config.feed.max_items {
            info!(
                discovered = candidates.len(),
                max_items = self.config.feed.max_items,
                "Capping candidate list"
            );
            candidates.truncate(self.config.feed.max_items);
        }

        let mut articles = self.extract_all(&candidates).await;
        info!(
            candidates = candidates.len(),
            extracted = articles.len(),
            failed = candidates.len() - articles.len(),
            "Extraction finished"
        );
        if articles.is_empty() {
            return Err(AssemblyError::NoArticles);
        }

        articles.sort_by(newest_first);
        let enclosures = probe_enclosures(self.transport, &articles, self.config.lanes()).await;
        Ok(assemble(
            articles,
            &enclosures,
            &self.config.feed,
            self.discovery.listing.as_str(),
            Utc::now(),
        ))
    }

    async fn extract_all(&self, candidates: &[String]) -> Vec<ExtractedArticle> {
        let width = self.config.lanes().min(candidates.len()).max(1);
        let lanes = deal(candidates, width);
        info!(lanes = lanes.len(), "Starting extraction lanes");

        join_all(
            lanes
                .iter()
                .enumerate()
                .map(|(lane, urls)| self.run_lane(lane, urls)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    async fn run_lane(&self, lane: usize, urls: &[&str]) -> Vec<ExtractedArticle> {
        let extractor = ArticleExtractor::new(self.transport, self.readability, &self.extraction);
        let mut extracted = Vec::with_capacity(urls.len());

        for url in urls {
            self.pause().await;
            match extractor.extract(url).await {
                Ok(article) => extracted.push(article),
                Err(e) => warn!(lane, %url, error = %e, "Article skipped"),
            }
        }
        extracted
    }

    async fn pause(&self) {
        let http = &self.config.http;
        let jitter = if http.delay_jitter_ms > 0 {
            rand::rng().random_range(0..=http.delay_jitter_ms)
        } else {
            0
        };
        let pause = http.politeness_delay() + Duration::from_millis(jitter);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

/// Split `urls` round-robin into `width` lanes, keeping relative order.
fn deal(urls: &[String], width: usize) -> Vec<Vec<&str>> {
    let mut lanes = vec![Vec::new(); width];
    for (i, url) in urls.iter().enumerate() {
        lanes[i % width].push(url.as_str());
    }
    lanes
}
