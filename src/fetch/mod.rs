//! HTTP page fetching with timeout support.
//!
//! This module provides the [`PageClient`] struct which performs single
//! GET requests for page text with a fixed per-request timeout. There is
//! no retry at this layer; retry policy, if any, belongs to the caller
//! (the scrape orchestrator implements single-attempt semantics).

mod error;

pub use error::FetchError;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// HTTP client for fetching page text.
///
/// Designed to be created once and reused for many fetches, taking
/// advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use wiki_harvester::PageClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PageClient::new();
/// let html = client.fetch_page("https://example.com/wiki/Peeper").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PageClient {
    client: Client,
}

impl Default for PageClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PageClient {
    /// Creates a new page client with the default 10-second timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new page client with an explicit per-request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches a page and returns its body text.
    ///
    /// Single attempt, no retries. Any transport error, timeout, or
    /// non-success HTTP status is returned as a [`FetchError`] carrying
    /// the offending URL.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] if `url` is not a valid absolute URL
    /// - [`FetchError::Timeout`] if the request exceeds the client timeout
    /// - [`FetchError::Network`] for any other transport failure
    /// - [`FetchError::HttpStatus`] for non-2xx responses
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        // Validate eagerly so callers get InvalidUrl rather than an opaque
        // builder error out of reqwest.
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        debug!(bytes = body.len(), "fetched page");
        Ok(body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_page_returns_body_on_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/wiki/Peeper"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Peeper</html>"))
            .mount(&mock_server)
            .await;

        let client = PageClient::new();
        let url = format!("{}/wiki/Peeper", mock_server.uri());

        let body = client.fetch_page(&url).await.unwrap();
        assert_eq!(body, "<html>Peeper</html>");
    }

    #[tokio::test]
    async fn test_fetch_page_invalid_url() {
        let client = PageClient::new();
        let result = client.fetch_page("not-a-valid-url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_page_http_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = PageClient::new();
        let url = format!("{}/missing", mock_server.uri());

        let result = client.fetch_page(&url).await;
        match result {
            Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = PageClient::with_timeout(Duration::from_millis(50));
        let url = format!("{}/slow", mock_server.uri());

        let result = client.fetch_page(&url).await;
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_fetch_page_connection_refused_is_network_error() {
        // Port 1 should refuse connections on any sane host
        let client = PageClient::new();
        let result = client.fetch_page("http://127.0.0.1:1/wiki/Item").await;
        assert!(matches!(
            result,
            Err(FetchError::Network { .. } | FetchError::Timeout { .. })
        ));
    }
}
