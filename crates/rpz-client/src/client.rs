//! HTTP(S) blocklist fetcher implementation.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use rpz_core::{
    AttemptCounter, BlocklistFetcher, ConfigError, EventEmitter, FetchError, Level, Phase,
    RawPayload, SourceDescriptor,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::RetryConfig;

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("bind-adblock-rpz/", env!("CARGO_PKG_VERSION"));

/// Fetches blocklists over HTTP(S) with a per-attempt timeout and retries
#[derive(Clone)]
pub struct HttpFetcher {
    inner: Arc<FetcherInner>,
}

struct FetcherInner {
    http: HttpClient,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Create a fetcher with default settings
    pub fn new() -> Result<Self, ConfigError> {
        HttpFetcherBuilder::new().build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::new()
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Retry policy
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry
    }

    /// Fetch `source` without reporting attempts or events
    pub async fn fetch(&self, source: &SourceDescriptor) -> Result<RawPayload, FetchError> {
        self.fetch_with(source, &AttemptCounter::new(), &EventEmitter::null())
            .await
    }

    /// Fetch `source`, retrying transient failures with exponential backoff
    pub async fn fetch_with(
        &self,
        source: &SourceDescriptor,
        attempts: &AttemptCounter,
        events: &EventEmitter,
    ) -> Result<RawPayload, FetchError> {
        let retry = &self.inner.retry;
        loop {
            let attempt = attempts.begin();
            events
                .event(Phase::Fetching, Level::Debug, "fetch attempt started")
                .source(&source.id)
                .field("attempt", attempt)
                .field("url", source.url.as_str())
                .emit();

            match self.attempt(&source.url).await {
                Ok((status, bytes)) => {
                    events
                        .event(Phase::Fetching, Level::Info, "fetch succeeded")
                        .source(&source.id)
                        .field("attempt", attempt)
                        .field("status", status)
                        .field("bytes", bytes.len())
                        .emit();
                    return Ok(RawPayload::new(source.id.clone(), bytes, status));
                }
                Err(error) => {
                    let will_retry = error.is_retryable() && attempt < retry.max_attempts();
                    let level = if will_retry { Level::Debug } else { Level::Warn };
                    events
                        .event(Phase::Fetching, level, "fetch attempt failed")
                        .source(&source.id)
                        .field("attempt", attempt)
                        .field("error", error.to_string())
                        .field("will_retry", will_retry)
                        .emit();

                    if !will_retry {
                        return Err(error);
                    }
                    tokio::time::sleep(retry.backoff_for(attempt - 1)).await;
                }
            }
        }
    }

    /// One GET request, classified into a status/body or a fetch error
    async fn attempt(&self, url: &str) -> Result<(u16, Vec<u8>), FetchError> {
        debug!(url = %url, "GET request");

        let response = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(classify)?;
            Ok((status.as_u16(), body.to_vec()))
        } else if status.is_server_error() {
            Err(FetchError::ServerRejected {
                status: status.as_u16(),
            })
        } else if status.is_client_error() {
            Err(FetchError::ClientRejected {
                status: status.as_u16(),
            })
        } else {
            // Informational or a redirect that was not followed
            Err(FetchError::Unreachable(format!("unexpected HTTP status {status}")))
        }
    }
}

#[async_trait]
impl BlocklistFetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        attempts: &AttemptCounter,
        events: &EventEmitter,
    ) -> Result<RawPayload, FetchError> {
        self.fetch_with(source, attempts, events).await
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("timeout", &self.inner.timeout)
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

/// Map a transport error onto the fetch taxonomy
fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unreachable(error.to_string())
    }
}

/// Builder for configuring an [`HttpFetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcherBuilder {
    timeout: Duration,
    user_agent: String,
    retry: RetryConfig,
}

impl Default for HttpFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcherBuilder {
    /// Create a builder with the default timeout, user agent and retries
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set retry configuration
    #[must_use]
    pub const fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Build the fetcher
    pub fn build(self) -> Result<HttpFetcher, ConfigError> {
        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {e}")))?;

        Ok(HttpFetcher {
            inner: Arc::new(FetcherInner {
                http,
                timeout: self.timeout,
                retry: self.retry,
            }),
        })
    }
}
