//! RSS 2.0 feed assembly and serialization.
//!
//! # Entry policy
//!
//! - GUID: the article permalink, `isPermaLink="true"`, for every entry.
//! - Description: the full plain-text body, cut to
//!   `feed.description_max_chars` characters (marker included).
//! - Enclosure: only when a HEAD probe of the lead image succeeds and the
//!   resource is an image.
//!
//! # Output
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
//!   <channel>
//!     <title/> <link/> <description/> <atom:link rel="self"/> ...
//!     <item> <title/> <link/> <guid isPermaLink="true"/> <description/> <pubDate/> <enclosure/> </item>
//!   </channel>
//! </rss>
//! ```

use crate::config::FeedConfig;
use crate::error::AssemblyError;
use crate::models::{Channel, Enclosure, ExtractedArticle, FeedDocument, FeedEntry, newest_first};
use crate::sanitize::{sanitize, truncate_chars};
use crate::transport::{ProbeInfo, Transport};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Probe the lead image of every article, at most `width` at a time.
///
/// Returns enclosures keyed by article link. Failed probes are logged and
/// leave the article without an enclosure.
#[instrument(level = "info", skip_all, fields(items = items.len()))]
pub async fn probe_enclosures<T: Transport>(
    transport: &T,
    items: &[ExtractedArticle],
    width: usize,
) -> HashMap<String, Enclosure> {
    let targets: Vec<(&str, &str)> = items
        .iter()
        .filter_map(|item| {
            item.lead_image
                .as_ref()
                .map(|image| (item.link.as_str(), image.url.as_str()))
        })
        .collect();

    let probed: Vec<(&str, Option<Enclosure>)> = stream::iter(targets)
        .map(|(link, image_url)| async move {
            let enclosure = match transport.probe(image_url).await {
                Ok(info) => enclosure_from_probe(image_url, &info),
                Err(e) => {
                    warn!(%link, %image_url, error = %e, "Enclosure probe failed; omitting");
                    None
                }
            };
            (link, enclosure)
        })
        .buffered(width.max(1))
        .collect()
        .await;

    let enclosures: HashMap<String, Enclosure> = probed
        .into_iter()
        .filter_map(|(link, enclosure)| enclosure.map(|e| (link.to_string(), e)))
        .collect();
    info!(count = enclosures.len(), "Enclosures resolved");
    enclosures
}

/// Build an enclosure from a probe result, or `None` if it is not an image.
pub fn enclosure_from_probe(url: &str, info: &ProbeInfo) -> Option<Enclosure> {
    let mime_type = match info.content_type.as_deref() {
        Some(kind) if kind.starts_with("image/") => kind.to_string(),
        Some(kind) => {
            debug!(%url, content_type = kind, "Probed resource is not an image");
            return None;
        }
        None => mime_from_extension(url)?.to_string(),
    };
    Some(Enclosure {
        url: url.to_string(),
        length: info.content_length.unwrap_or(0),
        mime_type,
    })
}

fn mime_from_extension(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Assemble the feed document.
///
/// Items are sorted newest first (ties by link) and duplicate links are
/// dropped, keeping the first, so GUIDs are unique.
pub fn assemble(
    items: Vec<ExtractedArticle>,
    enclosures: &HashMap<String, Enclosure>,
    feed: &FeedConfig,
    site_link: &str,
    now: DateTime<Utc>,
) -> FeedDocument {
    let channel = Channel {
        title: sanitize(&feed.title),
        description: sanitize(&feed.description),
        site_link: sanitize(site_link),
        self_link: sanitize(&feed.self_url),
        language: sanitize(&feed.language),
        last_build: now,
        ttl_minutes: feed.ttl_minutes,
        docs: sanitize(&feed.docs_url),
        generator: GENERATOR.to_string(),
    };

    let entries = items
        .into_iter()
        .sorted_by(newest_first)
        .unique_by(|item| item.link.clone())
        .map(|item| {
            let text = if item.body.is_empty() { &item.title } else { &item.body };
            FeedEntry {
                guid: item.link.clone(),
                description: truncate_chars(
                    text,
                    feed.description_max_chars,
                    &feed.truncation_marker,
                ),
                published: item.published_at(),
                enclosure: enclosures.get(&item.link).cloned(),
                title: item.title,
                link: item.link,
            }
        })
        .collect();

    FeedDocument { channel, entries }
}

fn xml_error(e: impl Display) -> AssemblyError {
    AssemblyError::Xml(e.to_string())
}

fn write_text<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<(), AssemblyError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

impl FeedDocument {
    /// Serialize as an RSS 2.0 document with an XML 1.0 / UTF-8 declaration.
    pub fn to_xml(&self) -> Result<String, AssemblyError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:atom", ATOM_NS));
        writer.write_event(Event::Start(rss)).map_err(xml_error)?;
        writer
            .write_event(Event::Start(BytesStart::new("channel")))
            .map_err(xml_error)?;

        let channel = &self.channel;
        write_text(&mut writer, "title", &channel.title)?;
        write_text(&mut writer, "link", &channel.site_link)?;
        write_text(&mut writer, "description", &channel.description)?;
        let mut self_link = BytesStart::new("atom:link");
        self_link.push_attribute(("href", channel.self_link.as_str()));
        self_link.push_attribute(("rel", "self"));
        self_link.push_attribute(("type", "application/rss+xml"));
        writer.write_event(Event::Empty(self_link)).map_err(xml_error)?;
        write_text(&mut writer, "language", &channel.language)?;
        write_text(&mut writer, "lastBuildDate", &channel.last_build.to_rfc2822())?;
        write_text(&mut writer, "ttl", &channel.ttl_minutes.to_string())?;
        write_text(&mut writer, "docs", &channel.docs)?;
        write_text(&mut writer, "generator", &channel.generator)?;

        for entry in &self.entries {
            writer
                .write_event(Event::Start(BytesStart::new("item")))
                .map_err(xml_error)?;
            write_text(&mut writer, "title", &entry.title)?;
            write_text(&mut writer, "link", &entry.link)?;

            let mut guid = BytesStart::new("guid");
            guid.push_attribute(("isPermaLink", "true"));
            writer.write_event(Event::Start(guid)).map_err(xml_error)?;
            writer
                .write_event(Event::Text(BytesText::new(&entry.guid)))
                .map_err(xml_error)?;
            writer
                .write_event(Event::End(BytesEnd::new("guid")))
                .map_err(xml_error)?;

            write_text(&mut writer, "description", &entry.description)?;
            write_text(&mut writer, "pubDate", &entry.published.to_rfc2822())?;

            if let Some(enclosure) = &entry.enclosure {
                let length = enclosure.length.to_string();
                let mut element = BytesStart::new("enclosure");
                element.push_attribute(("url", enclosure.url.as_str()));
                element.push_attribute(("length", length.as_str()));
                element.push_attribute(("type", enclosure.mime_type.as_str()));
                writer.write_event(Event::Empty(element)).map_err(xml_error)?;
            }

            writer
                .write_event(Event::End(BytesEnd::new("item")))
                .map_err(xml_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("channel")))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("rss")))
            .map_err(xml_error)?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(xml_error)
    }
}

/// Write `xml` to `path` through a temporary sibling file and a rename, so
/// readers never see a partially written feed.
#[instrument(level = "info", skip(xml), fields(bytes = xml.len()))]
pub async fn write_feed(xml: &str, path: &str) -> Result<(), AssemblyError> {
    let io_error = |source| AssemblyError::Io {
        path: path.to_string(),
        source,
    };
    let target = Path::new(path);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_error)?;
    }

    let tmp_path = format!("{path}.tmp");
    fs::write(&tmp_path, xml).await.map_err(io_error)?;
    if let Err(e) = fs::rename(&tmp_path, target).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(io_error(e));
    }
    info!(path, "Wrote feed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeadImage, Published};
    use crate::transport::fixtures::FixtureTransport;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap()
    }

    fn article(slug: &str, day: u32) -> ExtractedArticle {
        ExtractedArticle {
            title: format!("Articolo {slug}"),
            link: format!("https://www.aboutamazon.it/notizie/test/{slug}"),
            body: format!("Testo di {slug} con <tag> & simboli"),
            published: Published::Observed(at(day)),
            lead_image: None,
        }
    }

    fn feed_config() -> FeedConfig {
        FeedConfig {
            self_url: "https://feeds.example.org/notizie.xml".to_string(),
            ..FeedConfig::default()
        }
    }

    fn build(items: Vec<ExtractedArticle>) -> FeedDocument {
        assemble(
            items,
            &HashMap::new(),
            &feed_config(),
            "https://www.aboutamazon.it/notizie",
            at(20),
        )
    }

    #[test]
    fn test_entries_are_newest_first() {
        let doc = build(vec![article("a", 1), article("c", 3), article("b", 2)]);
        let dates: Vec<_> = doc.entries.iter().map(|e| e.published).collect();
        assert_eq!(dates, [at(3), at(2), at(1)]);
        assert!(doc.entries.windows(2).all(|w| w[0].published >= w[1].published));
    }

    #[test]
    fn test_guids_are_unique_and_stable() {
        let items = vec![article("a", 1), article("b", 2), article("a", 1)];
        let first = build(items.clone());
        let second = build(items);
        let guids: Vec<_> = first.entries.iter().map(|e| e.guid.clone()).collect();
        assert_eq!(guids.len(), 2);
        assert_eq!(guids.iter().unique().count(), guids.len());
        assert_eq!(
            guids,
            second.entries.iter().map(|e| e.guid.clone()).collect::<Vec<_>>()
        );
        assert!(first.entries.iter().all(|e| e.guid == e.link));
    }

    #[test]
    fn test_description_respects_cap() {
        let mut long = article("lungo", 1);
        long.body = "parola ".repeat(1000);
        let mut config = feed_config();
        config.description_max_chars = 120;
        let doc = assemble(vec![long, article("b", 2)], &HashMap::new(), &config, "https://x.example", at(20));
        for entry in &doc.entries {
            assert!(entry.description.chars().count() <= 120);
        }
        assert!(doc.entries[1].description.ends_with(&config.truncation_marker));
    }

    #[test]
    fn test_enclosure_attached_by_link() {
        let mut with_image = article("img", 1);
        with_image.lead_image = Some(LeadImage {
            url: "https://cdn.example.com/a.jpg".to_string(),
            alt: None,
        });
        let enclosure = Enclosure {
            url: "https://cdn.example.com/a.jpg".to_string(),
            length: 1234,
            mime_type: "image/jpeg".to_string(),
        };
        let enclosures = HashMap::from([(with_image.link.clone(), enclosure.clone())]);
        let doc = assemble(
            vec![with_image, article("plain", 2)],
            &enclosures,
            &feed_config(),
            "https://www.aboutamazon.it/notizie",
            at(20),
        );
        assert_eq!(doc.entries[1].enclosure.as_ref(), Some(&enclosure));
        assert!(doc.entries[0].enclosure.is_none());
    }

    #[test]
    fn test_enclosure_from_probe() {
        let typed = ProbeInfo {
            content_type: Some("image/png".to_string()),
            content_length: Some(10),
        };
        assert_eq!(
            enclosure_from_probe("https://cdn.example.com/x", &typed).unwrap().mime_type,
            "image/png"
        );

        let untyped = ProbeInfo::default();
        let guessed = enclosure_from_probe("https://cdn.example.com/x.JPG?w=800", &untyped).unwrap();
        assert_eq!(guessed.mime_type, "image/jpeg");
        assert_eq!(guessed.length, 0);

        let html = ProbeInfo {
            content_type: Some("text/html".to_string()),
            content_length: None,
        };
        assert!(enclosure_from_probe("https://cdn.example.com/x.jpg", &html).is_none());
        assert!(enclosure_from_probe("https://cdn.example.com/x", &untyped).is_none());
    }

    #[tokio::test]
    async fn test_probe_enclosures_skips_failures() {
        let mut ok = article("ok", 1);
        ok.lead_image = Some(LeadImage {
            url: "https://cdn.example.com/ok.webp".to_string(),
            alt: None,
        });
        let mut broken = article("broken", 2);
        broken.lead_image = Some(LeadImage {
            url: "https://cdn.example.com/missing.jpg".to_string(),
            alt: None,
        });
        let transport = FixtureTransport::new().image("https://cdn.example.com/ok.webp", "image/webp", 99);

        let enclosures = probe_enclosures(&transport, &[ok.clone(), broken.clone(), article("none", 3)], 2).await;
        assert_eq!(enclosures.len(), 1);
        assert_eq!(enclosures[&ok.link].length, 99);
        assert!(!enclosures.contains_key(&broken.link));
    }

    #[test]
    fn test_xml_output_is_well_formed_rss() {
        use quick_xml::Reader;

        let mut with_image = article("img", 2);
        with_image.lead_image = Some(LeadImage {
            url: "https://cdn.example.com/a.jpg?w=1&h=2".to_string(),
            alt: None,
        });
        let enclosures = HashMap::from([(
            with_image.link.clone(),
            Enclosure {
                url: "https://cdn.example.com/a.jpg?w=1&h=2".to_string(),
                length: 5,
                mime_type: "image/jpeg".to_string(),
            },
        )]);
        let doc = assemble(
            vec![article("a", 1), with_image],
            &enclosures,
            &feed_config(),
            "https://www.aboutamazon.it/notizie",
            at(20),
        );
        let xml = doc.to_xml().unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">"#));
        assert!(xml.contains(r#"<atom:link href="https://feeds.example.org/notizie.xml" rel="self" type="application/rss+xml"/>"#));
        assert!(xml.contains("<ttl>60</ttl>"));
        assert!(xml.contains("<language>it</language>"));
        assert!(xml.contains(r#"<guid isPermaLink="true">https://www.aboutamazon.it/notizie/test/img</guid>"#));
        assert!(xml.contains("&lt;tag&gt; &amp; simboli"));
        assert!(xml.contains("2 Mar 2024 08:00:00 +0000</pubDate>"));
        assert!(xml.contains(r#"length="5" type="image/jpeg""#));
        assert!(xml.find("/test/img").unwrap() < xml.find("/test/a<").unwrap());

        let mut reader = Reader::from_str(&xml);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed XML: {e}"),
            }
        }
    }

    #[test]
    fn test_channel_config_text_is_sanitized() {
        let mut config = feed_config();
        config.language = "it\u{1}".to_string();
        config.self_url = "https://feeds.example.org/\u{0}notizie.xml".to_string();
        config.docs_url = "https://www.rssboard.org/\u{1B}rss-specification".to_string();
        let doc = assemble(
            vec![article("a", 1)],
            &HashMap::new(),
            &config,
            "https://www.aboutamazon.it/notizie\u{8}",
            at(20),
        );
        let channel = &doc.channel;
        assert_eq!(channel.language, "it");
        assert_eq!(channel.self_link, "https://feeds.example.org/notizie.xml");
        assert_eq!(channel.docs, "https://www.rssboard.org/rss-specification");
        assert_eq!(channel.site_link, "https://www.aboutamazon.it/notizie");

        let xml = doc.to_xml().unwrap();
        assert!(xml.chars().all(crate::sanitize::is_xml_char));
    }

    #[tokio::test]
    async fn test_write_feed_creates_parent_and_replaces() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("docs").join("feed.xml");
        let path = path.to_str().unwrap();

        write_feed("<rss>uno</rss>", path).await.unwrap();
        write_feed("<rss>due</rss>", path).await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "<rss>due</rss>");
        assert!(!Path::new(&format!("{path}.tmp")).exists());
    }
}
