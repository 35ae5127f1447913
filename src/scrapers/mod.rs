//! Scraping of the newsroom site.
//!
//! Scraping follows a two-phase pattern:
//!
//! 1. **Discovery**: collect candidate article URLs from the listing and
//!    category pages
//! 2. **Extraction**: fetch each candidate once and pull its attributes
//!
//! | Phase | Module | Entry point | Notes |
//! |-------|--------|-------------|-------|
//! | Discovery | [`listing`] | [`listing::discover`] | Falls back to a static URL list |
//! | Extraction | [`article`] | [`article::ArticleExtractor`] | Fails only on fetch errors or placeholder-only pages |
//!
//! Both phases go through the [`Transport`](crate::transport::Transport)
//! trait and log failures instead of propagating them.

pub mod article;
pub mod listing;
