//! Per-URL article extraction.
//!
//! One fetch per URL, then the four attribute chains over the same parsed
//! document. An article whose title and body both fell back to placeholders
//! is reported as [`ExtractionError::Insufficient`].

use crate::error::ExtractionError;
use crate::extract::body::extract_body;
use crate::extract::date::extract_date;
use crate::extract::image::extract_image;
use crate::extract::title::extract_title;
use crate::extract::{ContentExtractor, ExtractionRules, Page};
use crate::models::ExtractedArticle;
use crate::transport::Transport;
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::{debug, info, instrument};
use url::Url;

/// Fetches and extracts single articles.
pub struct ArticleExtractor<'a, T> {
    transport: &'a T,
    readability: &'a dyn ContentExtractor,
    rules: &'a ExtractionRules,
}

impl<'a, T: Transport> ArticleExtractor<'a, T> {
    pub fn new(
        transport: &'a T,
        readability: &'a dyn ContentExtractor,
        rules: &'a ExtractionRules,
    ) -> Self {
        Self {
            transport,
            readability,
            rules,
        }
    }

    /// Fetch `url` and extract its article.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn extract(&self, url: &str) -> Result<ExtractedArticle, ExtractionError> {
        let html = self.transport.fetch(url).await?;
        extract_from_html(url, &html, self.rules, self.readability, Utc::now())
    }
}

/// Extract an article from already-fetched HTML.
///
/// `now` is the extraction time used when the page carries no date.
pub fn extract_from_html(
    url: &str,
    html: &str,
    rules: &ExtractionRules,
    readability: &dyn ContentExtractor,
    now: DateTime<Utc>,
) -> Result<ExtractedArticle, ExtractionError> {
    let page_url = Url::parse(url).map_err(|_| ExtractionError::InvalidUrl {
        url: url.to_string(),
    })?;
    let document = Html::parse_document(html);
    let page = Page {
        url: &page_url,
        html,
        document: &document,
        rules,
        readability,
    };

    let title = extract_title(&page);
    let body = extract_body(&page);
    if title.is_placeholder() && body.is_placeholder() {
        return Err(ExtractionError::Insufficient {
            url: url.to_string(),
        });
    }
    let published = extract_date(&page, now);
    let lead_image = extract_image(&page);

    debug!(
        title_strategy = title.strategy(),
        body_strategy = body.strategy(),
        date_observed = published.is_observed(),
        has_image = lead_image.is_some(),
        "Attribute strategies chosen"
    );

    let article = ExtractedArticle {
        title: title.into_value(),
        link: url.to_string(),
        body: body.into_value(),
        published,
        lead_image,
    };
    info!(
        title = %truncate_for_log(&article.title, 80),
        bytes = article.body.len(),
        "Extracted article"
    );
    Ok(article)
}
