//! Error taxonomy for the feed pipeline.
//!
//! Per-item errors ([`TransportError`], [`DateParseError`],
//! [`ExtractionError`]) are contained inside the batch and only logged.
//! [`AssemblyError`] and [`ConfigError`] abort the run.

use thiserror::Error;

/// Failure to fetch or probe a single URL.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A date string that none of the accepted formats could read.
#[derive(Debug, Error)]
#[error("unrecognized date format: {raw:?}")]
pub struct DateParseError {
    pub raw: String,
}

/// Why a candidate URL produced no article.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("not an absolute URL: {url}")]
    InvalidUrl { url: String },

    #[error("no usable title or body found at {url}")]
    Insufficient { url: String },
}

/// Failure while turning extracted articles into the output document.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("no articles were extracted; refusing to write an empty feed")]
    NoArticles,

    #[error("XML serialization failed: {0}")]
    Xml(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
