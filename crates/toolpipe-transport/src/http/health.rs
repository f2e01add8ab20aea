//! Readiness polling for network-addressable tool servers.

use crate::error::{Result, TransportError};
use crate::traits::Connect;
use async_trait::async_trait;
use ::http::header::{CONNECTION, HeaderMap, HeaderValue};
use reqwest::Client as ReqwestClient;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};
use url::Url;

const HEALTH_PATH: &str = "/health";
const STREAM_SUFFIX: &str = "/sse";

/// Derive a server's health endpoint from its advertised URL.
///
/// A URL already ending in `/health` is kept. Otherwise a trailing slash and
/// a trailing `/sse` streaming suffix are removed before `/health` is
/// appended; query and fragment are dropped.
///
/// ```rust
/// use toolpipe_transport::http::health_url;
///
/// let url = health_url("http://localhost:8931/sse").unwrap();
/// assert_eq!(url.as_str(), "http://localhost:8931/health");
/// ```
pub fn health_url(input: &str) -> Result<Url> {
    let mut url = Url::parse(input)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TransportError::InvalidUrl(format!(
            "unsupported scheme `{}` in {input}",
            url.scheme()
        )));
    }

    let path = url.path().trim_end_matches('/');
    let path = if path.ends_with(HEALTH_PATH) {
        path.to_string()
    } else {
        let base = path.strip_suffix(STREAM_SUFFIX).unwrap_or(path);
        format!("{base}{HEALTH_PATH}")
    };
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Timing knobs for health polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckConfig {
    /// Limit on establishing the TCP connection of one probe
    pub connect_timeout: Duration,
    /// Limit on one whole probe
    pub request_timeout: Duration,
    /// Pause between failed probes
    pub poll_interval: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Outcome of [`HealthWaiter::probe_until_healthy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    /// Whether a probe succeeded before the deadline
    pub healthy: bool,
    /// Probes issued
    pub attempts: u32,
    /// Time spent waiting
    pub elapsed: Duration,
}

/// Polls a server's health endpoint until it answers or time runs out.
///
/// Every probe uses a fresh connection, so a half-dead socket from an
/// earlier attempt cannot make a later one hang.
#[derive(Debug, Clone)]
pub struct HealthWaiter {
    url: Url,
    client: ReqwestClient,
    config: HealthCheckConfig,
}

impl HealthWaiter {
    /// Create a waiter for the server advertised at `url`.
    ///
    /// The URL is the only thing that can be wrong, and it is checked here;
    /// once built, [`wait_until_healthy`](Self::wait_until_healthy) answers
    /// with a plain `bool`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if no health URL can be
    /// derived from `url`.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, HealthCheckConfig::default())
    }

    /// Create a waiter with custom timing.
    pub fn with_config(url: &str, config: HealthCheckConfig) -> Result<Self> {
        let url = health_url(url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        let client = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(0)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            url,
            client,
            config,
        })
    }

    /// The endpoint being polled.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Timing in use.
    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Issue one probe, limited to `budget` (and the configured request
    /// timeout).
    ///
    /// Succeeds on a 2xx response whose body is JSON.
    pub async fn probe(&self, budget: Duration) -> Result<()> {
        let response = self
            .client
            .get(self.url.clone())
            .timeout(budget.min(self.config.request_timeout))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!(
                "health endpoint answered {status}"
            )));
        }
        response.json::<serde_json::Value>().await?;
        Ok(())
    }

    /// Poll until the server is healthy; `false` once `timeout` has passed.
    pub async fn wait_until_healthy(&self, timeout: Duration) -> bool {
        self.probe_until_healthy(timeout).await.healthy
    }

    /// Like [`wait_until_healthy`](Self::wait_until_healthy), with details.
    ///
    /// Neither a probe nor the pause after it may run past the deadline, so
    /// the call returns shortly after `timeout` at the latest.
    pub async fn probe_until_healthy(&self, timeout: Duration) -> HealthReport {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            attempts += 1;
            match self.probe(remaining).await {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    info!(
                        url = %self.url,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "server is healthy"
                    );
                    return HealthReport {
                        healthy: true,
                        attempts,
                        elapsed,
                    };
                }
                Err(e) => debug!(url = %self.url, attempt = attempts, error = %e, "server not ready"),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }

        let elapsed = started.elapsed();
        error!(
            url = %self.url,
            attempts,
            timeout_ms = timeout.as_millis() as u64,
            "server did not become healthy in time"
        );
        HealthReport {
            healthy: false,
            attempts,
            elapsed,
        }
    }
}

/// Poll the server advertised at `url` until it is healthy.
///
/// # Errors
///
/// Fails only if `url` is unusable; an unhealthy server yields `Ok(false)`.
pub async fn wait_until_healthy(url: &str, timeout: Duration) -> Result<bool> {
    Ok(HealthWaiter::new(url)?.wait_until_healthy(timeout).await)
}

/// A tool server reached over HTTP.
///
/// As a [`Connect`] target, one attempt is one health probe.
#[derive(Debug, Clone)]
pub struct HttpServerSpec {
    waiter: HealthWaiter,
}

impl HttpServerSpec {
    /// Describe the server advertised at `url`.
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            waiter: HealthWaiter::new(url)?,
        })
    }

    /// Describe the server with custom probe timing.
    pub fn with_config(url: &str, config: HealthCheckConfig) -> Result<Self> {
        Ok(Self {
            waiter: HealthWaiter::with_config(url, config)?,
        })
    }

    /// The waiter used for probing.
    pub fn waiter(&self) -> &HealthWaiter {
        &self.waiter
    }
}

#[async_trait]
impl Connect for HttpServerSpec {
    async fn connect(&self) -> Result<()> {
        let budget = self.waiter.config().request_timeout;
        self.waiter.probe(budget).await
    }

    fn describe(&self) -> String {
        format!("HTTP server {}", self.waiter.url())
    }
}
