//! HTTP transport used for page fetches and enclosure probes.
//!
//! The pipeline talks to the network only through the [`Transport`] trait.
//! [`HttpTransport`] is the `reqwest` implementation; tests substitute an
//! in-memory fixture.

use crate::config::HttpConfig;
use crate::error::TransportError;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// What a HEAD probe learned about a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeInfo {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Network access for the pipeline.
///
/// Both operations fail with [`TransportError`] on connection errors,
/// timeouts, and non-2xx statuses.
pub trait Transport {
    /// GET `url` and return the decoded body text.
    async fn fetch(&self, url: &str) -> Result<String, TransportError>;

    /// HEAD `url` and report its content type and length.
    async fn probe(&self, url: &str) -> Result<ProbeInfo, TransportError>;
}

/// `reqwest`-backed transport with a fixed User-Agent and timeouts.
pub struct HttpTransport {
    client: Client,
    probe_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            client,
            probe_timeout: config.probe_timeout(),
        })
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, TransportError> {
        let request_error = |source| TransportError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        // reqwest decodes using the charset from Content-Type, defaulting to UTF-8.
        let body = response.text().await.map_err(request_error)?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }

    #[instrument(level = "debug", skip(self))]
    async fn probe(&self, url: &str) -> Result<ProbeInfo, TransportError> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty());
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        Ok(ProbeInfo {
            content_type,
            content_length,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_transport() -> HttpTransport {
        let config = HttpConfig {
            user_agent: "site-news-feed-test/0.1".to_string(),
            timeout_secs: 5,
            probe_timeout_secs: 1,
            ..HttpConfig::default()
        };
        HttpTransport::new(&config).expect("failed to build test transport")
    }

    #[tokio::test]
    async fn test_fixture_without_entry_answers_not_found() {
        let transport = fixtures::FixtureTransport::new();
        let fetched = transport.fetch("https://www.aboutamazon.it/notizie/x/y").await;
        let probed = transport.probe("https://cdn.example.com/x.jpg").await;
        assert!(matches!(fetched, Err(TransportError::Status { status: 404, .. })));
        assert!(matches!(probed, Err(TransportError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notizie"))
            .and(header("user-agent", "site-news-feed-test/0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let body = test_transport()
            .fetch(&format!("{}/notizie", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = test_transport()
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_probe_reads_type_and_length() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/img/lead.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg; charset=binary")
                    .insert_header("Content-Length", "48213"),
            )
            .mount(&server)
            .await;

        let info = test_transport()
            .probe(&format!("{}/img/lead.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(info.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(info.content_length, Some(48213));
    }

    #[tokio::test]
    async fn test_probe_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/slow.png"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let err = test_transport()
            .probe(&format!("{}/slow.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Request { .. }));
    }
}
