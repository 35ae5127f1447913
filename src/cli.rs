//! Command-line interface definitions.
//!
//! Flags override the matching fields of the loaded [`Config`]. Most of them
//! can also be given through environment variables.

use crate::config::Config;
use clap::Parser;

/// Command-line arguments for the feed generator.
///
/// # Examples
///
/// ```sh
/// # Defaults, with the public feed URL from the environment
/// FEED_SELF_URL=https://example.org/feed.xml site_news_feed
///
/// # Custom config file and output path
/// site_news_feed -c feed.yaml -o public/feed.xml
///
/// # Print the feed instead of writing it
/// site_news_feed --self-url https://example.org/feed.xml --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "FEED_CONFIG")]
    pub config: Option<String>,

    /// Where to write the feed (overrides feed.output_path)
    #[arg(short, long, env = "FEED_OUTPUT")]
    pub output: Option<String>,

    /// Public URL of the feed, used for the atom:link self reference
    #[arg(long, env = "FEED_SELF_URL")]
    pub self_url: Option<String>,

    /// Maximum number of articles to fetch
    #[arg(short = 'n', long)]
    pub max_items: Option<usize>,

    /// Number of concurrent fetch lanes (1 to 4)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Build the feed and print it to stdout instead of writing the file
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Apply command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.feed.output_path = output.clone();
        }
        if let Some(self_url) = &self.self_url {
            config.feed.self_url = self_url.clone();
        }
        if let Some(max_items) = self.max_items {
            config.feed.max_items = max_items;
        }
        if let Some(concurrency) = self.concurrency {
            config.http.concurrency = concurrency;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "site_news_feed",
            "--config",
            "feed.yaml",
            "--output",
            "public/feed.xml",
            "--self-url",
            "https://example.org/feed.xml",
            "--dry-run",
        ]);

        assert_eq!(cli.config.as_deref(), Some("feed.yaml"));
        assert_eq!(cli.output.as_deref(), Some("public/feed.xml"));
        assert_eq!(cli.self_url.as_deref(), Some("https://example.org/feed.xml"));
        assert!(cli.dry_run);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["site_news_feed", "-c", "/tmp/c.yaml", "-o", "/tmp/f.xml", "-n", "5"]);

        assert_eq!(cli.config.as_deref(), Some("/tmp/c.yaml"));
        assert_eq!(cli.output.as_deref(), Some("/tmp/f.xml"));
        assert_eq!(cli.max_items, Some(5));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_apply_overrides_only_given_values() {
        let cli = Cli::parse_from([
            "site_news_feed",
            "-o",
            "out/feed.xml",
            "--concurrency",
            "3",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.feed.output_path, "out/feed.xml");
        assert_eq!(config.http.concurrency, 3);
        assert_eq!(config.feed.max_items, 30);
    }
}
