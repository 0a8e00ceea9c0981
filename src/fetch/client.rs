//! HTTP fetcher over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::{FetchOutcome, Fetcher, Payload};

/// Connection establishment timeout.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Whole-request timeout; a slow archive response is a transient failure,
/// not a hung crawl.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Browser-like User-Agent; the archive serves replay pages differently to
/// obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Real HTTP transport with timeouts and connection pooling.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Creates a fetcher with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(connect_timeout_secs: u64, request_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(request_timeout_secs))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(url, error = %error, "request failed");
                return FetchOutcome::Transient(error.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            return classify_status(url, status);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(bytes) => {
                debug!(url, bytes = bytes.len(), "fetched");
                FetchOutcome::Success(Payload {
                    bytes: bytes.to_vec(),
                    content_type,
                })
            }
            Err(error) => {
                warn!(url, error = %error, "body read failed");
                FetchOutcome::Transient(error.to_string())
            }
        }
    }
}

/// Non-success statuses: 5xx and 408/429 may recover, the rest of 4xx means
/// the capture is not there.
fn classify_status(url: &str, status: StatusCode) -> FetchOutcome {
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        debug!(url, status = status.as_u16(), "transient status");
        FetchOutcome::Transient(format!("HTTP {status}"))
    } else {
        debug!(url, status = status.as_u16(), "capture absent");
        FetchOutcome::NotFound
    }
}
