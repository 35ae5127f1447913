//! Title extraction: `h1`, then social meta tags, then `<title>`.

use super::{Extracted, FallbackChain, Page, element_text, first_attr, non_empty, parse_selectors};
use crate::sanitize::sanitize;
use once_cell::sync::Lazy;
use scraper::Selector;

static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid h1 selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid title selector"));
static META_TITLE: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"meta[property="og:title"]"#,
        r#"meta[name="og:title"]"#,
        r#"meta[name="twitter:title"]"#,
        r#"meta[property="twitter:title"]"#,
    ])
});

pub fn chain() -> FallbackChain<String> {
    FallbackChain::new()
        .then("h1", from_heading)
        .then("meta", from_meta)
        .then("document-title", from_document_title)
}

/// Run the title chain, falling back to the configured placeholder.
pub fn extract_title(page: &Page<'_>) -> Extracted<String> {
    match chain().run(page) {
        Some(hit) => Extracted::Found(hit),
        None => Extracted::Placeholder(sanitize(&page.rules.title_placeholder)),
    }
}

pub(crate) fn from_heading(page: &Page<'_>) -> Option<String> {
    page.document
        .select(&H1)
        .map(|h1| sanitize(&element_text(h1)))
        .find(|text| !text.is_empty())
}

pub(crate) fn from_meta(page: &Page<'_>) -> Option<String> {
    META_TITLE.iter().find_map(|selector| {
        first_attr(page.document, std::slice::from_ref(selector), "content")
            .map(|raw| sanitize(&raw))
            .and_then(non_empty)
    })
}

pub(crate) fn from_document_title(page: &Page<'_>) -> Option<String> {
    let raw = page.document.select(&TITLE).next().map(element_text)?;
    let title = sanitize(&raw);
    non_empty(strip_site_name(&title, &page.rules.title_separators))
}

/// Drop a trailing site name: everything after the last occurrence of the
/// first separator present in `title`. A title that would become empty is
/// returned whole.
pub fn strip_site_name(title: &str, separators: &[String]) -> String {
    for separator in separators.iter().filter(|s| !s.is_empty()) {
        if let Some((head, _site)) = title.rsplit_once(separator.as_str()) {
            let head = head.trim();
            if !head.is_empty() {
                return head.to_string();
            }
        }
    }
    title.to_string()
}
