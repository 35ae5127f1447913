//! Publish date extraction.
//!
//! Metadata locations are probed in priority order. A location wins only if
//! it exists and its value parses; unparseable values are logged and the
//! next location is tried. All instants are normalized to UTC.

use super::{FallbackChain, Page, element_text, json_ld_nodes};
use crate::error::DateParseError;
use crate::models::Published;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use scraper::Selector;
use serde_json::Value;
use tracing::debug;

/// A metadata location: selector plus the attribute holding the value
/// (`None` reads the element text).
struct DateProbe {
    name: &'static str,
    selector: Selector,
    attr: Option<&'static str>,
}

static DATE_PROBES: Lazy<Vec<DateProbe>> = Lazy::new(|| {
    [
        ("article:published_time", r#"meta[property="article:published_time"]"#, Some("content")),
        ("article:published_time (name)", r#"meta[name="article:published_time"]"#, Some("content")),
        ("itemprop:datePublished", r#"meta[itemprop="datePublished"]"#, Some("content")),
        ("pubdate", r#"meta[name="pubdate"]"#, Some("content")),
        ("publishdate", r#"meta[name="publishdate"]"#, Some("content")),
        ("date", r#"meta[name="date"]"#, Some("content")),
        ("og:published_time", r#"meta[property="og:published_time"]"#, Some("content")),
    ]
    .into_iter()
    .map(|(name, selector, attr)| DateProbe {
        name,
        selector: Selector::parse(selector).expect("valid date selector"),
        attr,
    })
    .collect()
});

static TIME_WITH_DATETIME: Lazy<DateProbe> = Lazy::new(|| DateProbe {
    name: "time[datetime]",
    selector: Selector::parse("time[datetime]").expect("valid time selector"),
    attr: Some("datetime"),
});

static TIME_TEXT: Lazy<DateProbe> = Lazy::new(|| DateProbe {
    name: "time",
    selector: Selector::parse("time").expect("valid time selector"),
    attr: None,
});

impl DateProbe {
    fn values(&self, page: &Page<'_>) -> Vec<String> {
        page.document
            .select(&self.selector)
            .filter_map(|el| match self.attr {
                Some(attr) => el.value().attr(attr).map(str::to_string),
                None => Some(element_text(el)),
            })
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .collect()
    }

    fn read(&self, page: &Page<'_>) -> Option<DateTime<Utc>> {
        self.values(page)
            .iter()
            .find_map(|raw| parse_logged(self.name, raw))
    }
}

fn parse_logged(location: &str, raw: &str) -> Option<DateTime<Utc>> {
    match parse_date(raw) {
        Ok(at) => Some(at),
        Err(e) => {
            debug!(location, error = %e, "Skipping unparseable date");
            None
        }
    }
}

pub fn chain() -> FallbackChain<DateTime<Utc>> {
    let mut chain = FallbackChain::new();
    for probe in DATE_PROBES.iter() {
        chain = chain.then(probe.name, move |page: &Page<'_>| probe.read(page));
    }
    chain
        .then("json-ld:datePublished", from_json_ld)
        .then(TIME_WITH_DATETIME.name, |page: &Page<'_>| TIME_WITH_DATETIME.read(page))
        .then(TIME_TEXT.name, |page: &Page<'_>| TIME_TEXT.read(page))
}

/// Run the date chain; `now` is used when no location yields a date.
pub fn extract_date(page: &Page<'_>, now: DateTime<Utc>) -> Published {
    match chain().run(page) {
        Some(hit) => {
            debug!(strategy = hit.strategy, at = %hit.value, "Found publish date");
            Published::Observed(hit.value)
        }
        None => Published::Defaulted(now),
    }
}

pub(crate) fn from_json_ld(page: &Page<'_>) -> Option<DateTime<Utc>> {
    json_ld_nodes(page.document)
        .iter()
        .filter_map(|node| node.get("datePublished").and_then(Value::as_str))
        .find_map(|raw| parse_logged("json-ld:datePublished", raw))
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse a date in any of the common web formats and convert it to UTC.
///
/// Offset-bearing values are converted; naive values are taken as UTC;
/// date-only values are midnight UTC.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let raw = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(at) = DateTime::parse_from_str(raw, format) {
            return Ok(at.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(at.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(raw, format) {
            if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc());
            }
        }
    }

    Err(DateParseError {
        raw: raw.to_string(),
    })
}
