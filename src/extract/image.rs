//! Lead image selection.
//!
//! Probes social meta tags, then JSON-LD, then the first images of the body
//! container. Only the first strategy that yields a usable URL is kept.

use super::body::find_container;
use super::{FallbackChain, Page, first_attr, json_ld_nodes, parse_selectors, resolve_http};
use crate::models::LeadImage;
use crate::sanitize::sanitize;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use serde_json::Value;

/// How many `<img>` elements of the body container are considered.
const BODY_IMAGE_LIMIT: usize = 2;

/// Attributes that may carry an image URL, lazy-load variants included.
const IMG_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original"];

static OG_IMAGE: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"meta[property="og:image"]"#,
        r#"meta[name="og:image"]"#,
        r#"meta[itemprop="og:image"]"#,
    ])
});
static OG_IMAGE_URL: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"meta[property="og:image:url"]"#,
        r#"meta[name="og:image:url"]"#,
        r#"meta[property="og:image:secure_url"]"#,
        r#"meta[name="og:image:secure_url"]"#,
    ])
});
static OG_IMAGE_ALT: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[r#"meta[property="og:image:alt"]"#, r#"meta[name="og:image:alt"]"#])
});
static TWITTER_IMAGE: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"meta[name="twitter:image"]"#,
        r#"meta[property="twitter:image"]"#,
        r#"meta[name="twitter:image:src"]"#,
        r#"meta[property="twitter:image:src"]"#,
    ])
});
static TWITTER_IMAGE_ALT: Lazy<Vec<Selector>> = Lazy::new(|| {
    parse_selectors(&[
        r#"meta[name="twitter:image:alt"]"#,
        r#"meta[property="twitter:image:alt"]"#,
    ])
});
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid img selector"));

pub fn chain() -> FallbackChain<LeadImage> {
    FallbackChain::new()
        .then("og:image", |page: &Page<'_>| from_meta(page, &OG_IMAGE, &OG_IMAGE_ALT))
        .then("og:image:url", |page: &Page<'_>| {
            from_meta(page, &OG_IMAGE_URL, &OG_IMAGE_ALT)
        })
        .then("twitter:image", |page: &Page<'_>| {
            from_meta(page, &TWITTER_IMAGE, &TWITTER_IMAGE_ALT)
        })
        .then("json-ld:image", from_json_ld)
        .then("body-img", from_body_images)
}

pub fn extract_image(page: &Page<'_>) -> Option<LeadImage> {
    chain().run(page).map(|hit| hit.value)
}

fn alt_text(raw: Option<&str>) -> Option<String> {
    raw.map(sanitize).filter(|alt| !alt.is_empty())
}

fn from_meta(page: &Page<'_>, urls: &[Selector], alts: &[Selector]) -> Option<LeadImage> {
    let raw = first_attr(page.document, urls, "content")?;
    let url = resolve_http(page.url, &raw)?;
    Some(LeadImage {
        url: url.to_string(),
        alt: alt_text(first_attr(page.document, alts, "content").as_deref()),
    })
}

pub(crate) fn from_json_ld(page: &Page<'_>) -> Option<LeadImage> {
    json_ld_nodes(page.document).iter().find_map(|node| {
        let image = node.get("image")?;
        let (raw, alt) = json_ld_image(image)?;
        let url = resolve_http(page.url, raw)?;
        Some(LeadImage {
            url: url.to_string(),
            alt: alt_text(alt),
        })
    })
}

/// `image` may be a URL string, an `ImageObject`, or an array of either.
fn json_ld_image(image: &Value) -> Option<(&str, Option<&str>)> {
    match image {
        Value::String(url) => Some((url.as_str(), None)),
        Value::Object(map) => {
            let url = map
                .get("url")
                .or_else(|| map.get("contentUrl"))
                .and_then(Value::as_str)?;
            let alt = map
                .get("caption")
                .or_else(|| map.get("name"))
                .and_then(Value::as_str);
            Some((url, alt))
        }
        Value::Array(items) => items.first().and_then(json_ld_image),
        _ => None,
    }
}

pub(crate) fn from_body_images(page: &Page<'_>) -> Option<LeadImage> {
    let container = find_container(page, page.document)?;
    container
        .select(&IMG)
        .take(BODY_IMAGE_LIMIT)
        .find_map(|img| {
            let url = img_source(page, img)?;
            Some(LeadImage {
                url,
                alt: alt_text(img.value().attr("alt")),
            })
        })
}

fn img_source(page: &Page<'_>, img: ElementRef<'_>) -> Option<String> {
    let element = img.value();
    IMG_SOURCE_ATTRS
        .iter()
        .filter_map(|attr| element.attr(attr))
        .chain(element.attr("srcset").and_then(first_srcset_candidate))
        .find_map(|raw| resolve_http(page.url, raw))
        .map(|url| url.to_string())
}

/// URL of the first `srcset` candidate (`"a.jpg 1x, b.jpg 2x"` -> `"a.jpg"`).
fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()?
        .split_whitespace()
        .next()
}
