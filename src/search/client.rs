//! HTTP client for the search endpoint.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};

use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};

/// Source of raw result pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `endpoint` with the given query-string parameters and return the body.
    ///
    /// # Errors
    /// Returns an error if the request fails or the status is not a success.
    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> SearchResult<String>;
}

/// Fetches result pages over HTTP with rotating request headers.
pub struct SearchClient {
    client: reqwest::Client,
    config: SearchConfig,
}

impl SearchClient {
    /// Create a client from the run configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &SearchConfig) -> SearchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| SearchError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Build a fresh header set for one request.
    fn random_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        // Rotate user agents to avoid detection
        let ua = self.config.random_user_agent();
        if let Ok(ua_value) = HeaderValue::from_str(&ua) {
            headers.insert(USER_AGENT, ua_value);
        }

        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        tracing::debug!("headers: {headers:?}");
        headers
    }
}

#[async_trait]
impl PageFetcher for SearchClient {
    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> SearchResult<String> {
        let full_url = build_request_url(endpoint, params);
        tracing::debug!("full url: {full_url}");

        let response = self
            .client
            .get(&full_url)
            .headers(self.random_headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::HttpStatus {
                status: status.as_u16(),
                url: full_url,
            });
        }

        Ok(response.text().await?)
    }
}

/// Append `key=value` pairs to the endpoint, values percent-encoded.
///
/// The `?` is only added when there is at least one parameter.
#[must_use]
pub fn build_request_url(endpoint: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return endpoint.to_string();
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{endpoint}?{query}")
}
