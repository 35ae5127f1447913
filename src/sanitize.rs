//! Text normalization applied to every human-readable string in the feed.
//!
//! [`sanitize`] is total and idempotent: entities are resolved, characters
//! that XML 1.0 forbids are dropped, and whitespace is collapsed.

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static NUMERIC_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)&#(x[0-9a-f]+|[0-9]+);").expect("valid numeric reference pattern")
});

/// Whether `c` is allowed in an XML 1.0 document.
///
/// Allowed: tab, LF, CR, U+0020–U+D7FF, U+E000–U+FFFD. Surrogates can not
/// occur in a Rust `char`, and astral code points are excluded.
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}'
    )
}

/// Normalize `text` for placement in the output document.
///
/// Entity decoding and character filtering repeat until nothing changes, so
/// `&amp;lt;` and entities split by control characters settle in one call.
/// Each decoding step strictly shortens the string, so the loop terminates.
pub fn sanitize(text: &str) -> String {
    let mut current = strip_invalid(text);
    loop {
        let next = strip_invalid(&decode_html_entities(&drop_invalid_refs(&current)));
        if next == current {
            break;
        }
        current = next;
    }
    collapse_whitespace(&current)
}

/// Remove numeric character references whose code point XML 1.0 forbids.
/// The entity decoder leaves those as literal text.
fn drop_invalid_refs(text: &str) -> String {
    NUMERIC_REF
        .replace_all(text, |caps: &Captures<'_>| {
            let digits = &caps[1];
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => digits.parse::<u32>(),
            };
            match code.ok().and_then(char::from_u32) {
                Some(c) if is_xml_char(c) => caps[0].to_string(),
                _ => String::new(),
            }
        })
        .into_owned()
}

fn strip_invalid(text: &str) -> String {
    text.chars().filter(|&c| is_xml_char(c)).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_chars` characters, marker included.
///
/// Returns the input unchanged when it already fits. The cut is on a
/// `char` boundary and trailing whitespace before the marker is trimmed.
pub fn truncate_chars(text: &str, max_chars: usize, marker: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let marker_len = marker.chars().count();
    if marker_len >= max_chars {
        return text.chars().take(max_chars).collect();
    }
    let kept: String = text.chars().take(max_chars - marker_len).collect();
    format!("{}{}", kept.trim_end(), marker)
}
