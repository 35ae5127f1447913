//! Output generation.
//!
//! - [`rss`]: assembles the RSS 2.0 document, probes lead images for
//!   enclosures and writes the feed file atomically
//!
//! # Output Structure
//!
//! ```text
//! docs/
//! └── feed.xml    # replaced on every successful run
//! ```

pub mod rss;
