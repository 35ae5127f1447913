//! Attribute extractors: title, body, date, and lead image.
//!
//! Each attribute is read by a [`FallbackChain`]: an ordered list of named
//! strategies over one [`Page`]. The first strategy that yields a value
//! wins and later ones are not consulted. Chains never fail; when nothing
//! matches, the caller applies the attribute's terminal fallback
//! (placeholder text, extraction time, or no image).
//!
//! | Attribute | Module | Terminal fallback |
//! |-----------|--------|-------------------|
//! | Title | [`title`] | configured placeholder |
//! | Body | [`body`] | placeholder pointing at the article URL |
//! | Date | [`date`] | [`Published::Defaulted`](crate::models::Published) |
//! | Image | [`image`] | none |

use crate::config::{ExtractionConfig, compile_selectors};
use crate::error::ConfigError;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::io::Cursor;
use tracing::debug;
use url::Url;

pub mod body;
pub mod date;
pub mod image;
pub mod title;

static JSON_LD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid json-ld selector")
});

/// Compiled form of [`ExtractionConfig`].
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    pub title_separators: Vec<String>,
    pub title_placeholder: String,
    pub body_placeholder: String,
    pub body_containers: Vec<Selector>,
    pub noise: Vec<Selector>,
}

impl ExtractionRules {
    pub fn compile(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            title_separators: config.title_separators.clone(),
            title_placeholder: config.title_placeholder.clone(),
            body_placeholder: config.body_placeholder.clone(),
            body_containers: compile_selectors(&config.body_containers)?,
            noise: compile_selectors(&config.noise_selectors)?,
        })
    }
}

/// Boilerplate-removing main-text extraction.
pub trait ContentExtractor {
    /// Best-effort main article text of `html`, or `None`.
    fn extract(&self, html: &str, url: &Url) -> Option<String>;
}

/// [`ContentExtractor`] backed by the `readability` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadabilityExtractor;

impl ContentExtractor for ReadabilityExtractor {
    fn extract(&self, html: &str, url: &Url) -> Option<String> {
        let mut cursor = Cursor::new(html.as_bytes());
        match readability::extractor::extract(&mut cursor, url) {
            Ok(product) if !product.text.trim().is_empty() => Some(product.text),
            Ok(_) => None,
            Err(e) => {
                debug!(%url, error = %e, "Readability extraction failed");
                None
            }
        }
    }
}

/// Everything a strategy may look at for one article.
///
/// The parsed document is shared read-only; strategies that need to edit
/// the tree work on their own clone.
pub struct Page<'a> {
    pub url: &'a Url,
    pub html: &'a str,
    pub document: &'a Html,
    pub rules: &'a ExtractionRules,
    pub readability: &'a dyn ContentExtractor,
}

/// One named way of reading an attribute.
pub struct Strategy<T> {
    name: &'static str,
    run: Box<dyn Fn(&Page<'_>) -> Option<T> + Send + Sync>,
}

impl<T> Strategy<T> {
    pub fn new(
        name: &'static str,
        run: impl Fn(&Page<'_>) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, page: &Page<'_>) -> Option<T> {
        (self.run)(page)
    }
}

/// The value a chain produced and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<T> {
    pub strategy: &'static str,
    pub value: T,
}

/// Strategies tried in priority order; the first `Some` wins.
pub struct FallbackChain<T> {
    strategies: Vec<Strategy<T>>,
}

impl<T> Default for FallbackChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FallbackChain<T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy with lower priority than all previous ones.
    pub fn then(
        mut self,
        name: &'static str,
        run: impl Fn(&Page<'_>) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        self.strategies.push(Strategy::new(name, run));
        self
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(Strategy::name).collect()
    }

    pub fn run(&self, page: &Page<'_>) -> Option<Hit<T>> {
        self.strategies.iter().find_map(|strategy| {
            strategy.apply(page).map(|value| Hit {
                strategy: strategy.name(),
                value,
            })
        })
    }
}

/// Result of an attribute chain with a terminal placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    Found(Hit<T>),
    Placeholder(T),
}

impl<T> Extracted<T> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Extracted::Placeholder(_))
    }

    #[cfg(test)]
    pub fn value(&self) -> &T {
        match self {
            Extracted::Found(hit) => &hit.value,
            Extracted::Placeholder(value) => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Extracted::Found(hit) => hit.value,
            Extracted::Placeholder(value) => value,
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Extracted::Found(hit) => hit.strategy,
            Extracted::Placeholder(_) => "placeholder",
        }
    }
}

pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// All text below `element`, with a space between text nodes.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Value of `attr` on the first element matching any of `selectors` that has it non-blank.
pub(crate) fn first_attr(document: &Html, selectors: &[Selector], attr: &str) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    })
}

pub(crate) fn parse_selectors(raw: &[&str]) -> Vec<Selector> {
    raw.iter()
        .map(|s| Selector::parse(s).expect("valid built-in selector"))
        .collect()
}

/// Top-level JSON-LD nodes, with arrays and `@graph` containers flattened.
pub(crate) fn json_ld_nodes(document: &Html) -> Vec<Value> {
    let mut nodes = Vec::new();
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        flatten_json_ld(value, &mut nodes);
    }
    nodes
}

fn flatten_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_json_ld(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_json_ld(graph, out);
            }
            if !map.is_empty() {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// Resolve `raw` against `base`, keeping only http(s) targets.
pub(crate) fn resolve_http(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }
    let resolved = base.join(raw).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::ExtractionConfig;

    /// A readability stand-in returning a fixed answer.
    pub(crate) struct FixedContent(pub Option<&'static str>);

    impl ContentExtractor for FixedContent {
        fn extract(&self, _html: &str, _url: &Url) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    pub(crate) fn rules() -> ExtractionRules {
        ExtractionRules::compile(&ExtractionConfig::default()).unwrap()
    }

    /// Owns what a [`Page`] borrows.
    pub(crate) struct Fixture {
        pub url: Url,
        pub html: String,
        pub document: Html,
        pub rules: ExtractionRules,
        pub readability: FixedContent,
    }

    impl Fixture {
        pub(crate) fn new(html: &str) -> Self {
            Self {
                url: Url::parse("https://www.aboutamazon.it/notizie/lavoro/nuovo-centro").unwrap(),
                html: html.to_string(),
                document: Html::parse_document(html),
                rules: rules(),
                readability: FixedContent(None),
            }
        }

        pub(crate) fn with_readability(mut self, text: &'static str) -> Self {
            self.readability = FixedContent(Some(text));
            self
        }

        pub(crate) fn page(&self) -> Page<'_> {
            Page {
                url: &self.url,
                html: &self.html,
                document: &self.document,
                rules: &self.rules,
                readability: &self.readability,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;

    #[test]
    fn test_chain_returns_first_success_in_order() {
        let chain = FallbackChain::new()
            .then("never", |_: &Page<'_>| None::<u32>)
            .then("first", |_: &Page<'_>| Some(1))
            .then("second", |_: &Page<'_>| Some(2));
        let fixture = Fixture::new("<html></html>");
        let hit = chain.run(&fixture.page()).unwrap();
        assert_eq!(hit, Hit { strategy: "first", value: 1 });
        assert_eq!(chain.names(), ["never", "first", "second"]);
    }

    #[test]
    fn test_chain_stops_consulting_after_success() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = FallbackChain::new()
            .then("hit", |_: &Page<'_>| Some("x"))
            .then("later", move |_: &Page<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some("y")
            });
        let fixture = Fixture::new("<html></html>");
        assert_eq!(chain.run(&fixture.page()).unwrap().value, "x");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_chain_yields_none() {
        let chain: FallbackChain<String> = FallbackChain::new();
        let fixture = Fixture::new("<html></html>");
        assert!(chain.run(&fixture.page()).is_none());
    }

    #[test]
    fn test_json_ld_flattens_graph_and_arrays() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@context":"https://schema.org","@graph":[{"@type":"WebPage"},{"@type":"NewsArticle","headline":"A"}]}</script>
            <script type="application/ld+json">[{"@type":"Organization"}]</script>
            <script type="application/ld+json">{ not json</script>
        </head></html>"#;
        let document = Html::parse_document(html);
        let nodes = json_ld_nodes(&document);
        assert_eq!(nodes.len(), 4);
        assert!(nodes.iter().any(|n| n["headline"] == "A"));
    }

    #[test]
    fn test_resolve_http_rejects_data_and_other_schemes() {
        let base = Url::parse("https://www.aboutamazon.it/notizie/a/b").unwrap();
        assert_eq!(
            resolve_http(&base, "/img/x.jpg").unwrap().as_str(),
            "https://www.aboutamazon.it/img/x.jpg"
        );
        assert!(resolve_http(&base, "data:image/gif;base64,R0lGOD").is_none());
        assert!(resolve_http(&base, "javascript:void(0)").is_none());
        assert!(resolve_http(&base, "  ").is_none());
    }
}
