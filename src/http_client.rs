//! Shared HTTP client
//!
//! Features:
//! - One connection pool reused by every collaborator (CMS, hosting, Graph API)
//! - TLS via rustls, gzip/brotli negotiated automatically
//! - Transparent retry of transient failures (429, 5xx, timeouts, connect
//!   errors) with bounded exponential backoff
//!
//! The retry here is the low-level layer only. Job-level retries for the
//! publish protocol live in [`crate::publish`].

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// HTTP failures after transport-level retries are exhausted
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl HttpError {
    /// Whether the failure is transient and worth another attempt
    #[must_use]
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
        }
    }
}

/// Tuning for [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    /// Default per-request timeout; uploads override it per request
    pub request_timeout: Duration,
    /// Retries after the first attempt for transient failures
    pub max_retries: usize,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            min_backoff: Duration::from_millis(800),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Pooled HTTP client with transient-failure retry
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    settings: HttpSettings,
}

impl HttpClient {
    /// Create a client with default settings
    pub fn new() -> anyhow::Result<Self> {
        Self::with_settings(HttpSettings::default())
    }

    /// Create a client with custom settings
    pub fn with_settings(settings: HttpSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            // Keep connections alive for reuse across cycles
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("reelcast/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, settings })
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.settings.min_backoff)
            .with_max_delay(self.settings.max_backoff)
            .with_max_times(self.settings.max_retries)
            .with_jitter()
    }

    /// Send a request, retrying transient failures
    ///
    /// `build` is called once per attempt so request bodies can be rebuilt.
    /// Non-2xx responses become [`HttpError::Status`] carrying the body text.
    #[instrument(skip_all)]
    pub async fn send<F>(&self, build: F) -> Result<Response, HttpError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        (|| async {
            let response = build(&self.client).send().await?;
            let status = response.status();
            debug!(status = %status, url = %response.url(), "Response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            Err(HttpError::Status { status, body })
        })
        .retry(self.backoff())
        .when(HttpError::should_retry)
        .notify(|err: &HttpError, dur: Duration| {
            warn!(
                "HTTP call failed, retrying after {:.2}s: {}",
                dur.as_secs_f64(),
                err
            );
        })
        .await
    }

    /// GET a URL and return the raw body
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self.send(|client| client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
