//! # Site News Feed
//!
//! Builds a full-content RSS 2.0 feed for a newsroom site that publishes no
//! feed of its own (About Amazon Italia by default).
//!
//! ## Features
//!
//! - Discovers article URLs from the listing page and optional category pages
//! - Extracts title, body, publish date and lead image with ordered fallback
//!   strategies per attribute
//! - Sanitizes every piece of text so the output is always valid XML 1.0
//! - Probes lead images and attaches them as enclosures
//! - Writes the feed atomically; a run with no usable articles writes nothing
//!
//! ## Usage
//!
//! ```sh
//! site_news_feed --self-url https://example.org/feed.xml -o docs/feed.xml
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Discovery**: collect candidate article URLs
//! 2. **Extraction**: fetch each candidate once and extract its attributes
//! 3. **Assembly**: sort newest first, probe enclosures, build the document
//! 4. **Output**: serialize to XML and replace the feed file

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod batch;
mod cli;
mod config;
mod error;
mod extract;
mod models;
mod outputs;
mod sanitize;
mod scrapers;
mod transport;
mod utils;

use batch::Pipeline;
use cli::Cli;
use config::Config;
use extract::ReadabilityExtractor;
use outputs::rss::write_feed;
use transport::HttpTransport;
use utils::{ensure_writable_dir, output_dir};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("site_news_feed starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.output, dry_run = args.dry_run, "Parsed CLI arguments");

    // --- Configuration ---
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    // Early check: ensure the output dir is writable before any fetch
    if !args.dry_run {
        let dir = output_dir(&config.feed.output_path);
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // ---- Discover, extract, assemble ----
    let transport = HttpTransport::new(&config.http)?;
    let readability = ReadabilityExtractor;
    let pipeline = Pipeline::new(&transport, &readability, &config)?;

    let feed = match pipeline.run().await {
        Ok(feed) => feed,
        Err(e) => {
            error!(error = %e, "Feed not updated");
            return Err(e.into());
        }
    };
    let xml = feed.to_xml()?;
    info!(entries = feed.entries.len(), bytes = xml.len(), "Feed assembled");

    // ---- Output ----
    if args.dry_run {
        println!("{xml}");
        info!("Dry run; feed not written");
    } else {
        write_feed(&xml, &config.feed.output_path).await?;
        info!(path = %Path::new(&config.feed.output_path).display(), "Feed updated");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
