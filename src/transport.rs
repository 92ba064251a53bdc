//! HTTP transport with retry on transient server errors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::request::PageRequest;
use crate::{JixerError, Result};

/// Status codes retried by the transport.
pub const TRANSIENT_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Retry policy for transient failures.
///
/// Covers connection errors, timeouts and the statuses in `status_forcelist`.
/// Malformed bodies are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff factor in milliseconds.
    #[serde(default = "default_backoff_factor_ms")]
    pub backoff_factor_ms: u64,
    /// Upper bound for a single backoff, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Statuses that trigger a retry.
    #[serde(default = "default_status_forcelist")]
    pub status_forcelist: Vec<u16>,
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_factor_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    120_000
}

fn default_status_forcelist() -> Vec<u16> {
    TRANSIENT_STATUSES.to_vec()
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor_ms: default_backoff_factor_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            status_forcelist: default_status_forcelist(),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff factor.
    pub fn with_backoff_factor(mut self, factor: Duration) -> Self {
        self.backoff_factor_ms = u64::try_from(factor.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Whether a response status should be retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    /// Exponential backoff for the second and later retries.
    ///
    /// Starts at `2 * factor`, doubles, never exceeds `max_backoff_ms`. No jitter.
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let initial = self.backoff_factor_ms.saturating_mul(2).min(self.max_backoff_ms);
        ExponentialBackoff {
            current_interval: Duration::from_millis(initial),
            initial_interval: Duration::from_millis(initial),
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_backoff(),
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// The first retry is immediate, then `factor * 2^(retry - 1)`, capped.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let mut backoff = self.create_backoff();
        let mut delay = Duration::ZERO;
        for n in 1..=retry {
            delay = self.next_delay(n, &mut backoff);
        }
        delay
    }

    fn next_delay(&self, retry: u32, backoff: &mut ExponentialBackoff) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        backoff.next_backoff().unwrap_or_else(|| self.max_backoff())
    }

    fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Transport settings shared by every session an engine opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("jixer/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Factory for scoped HTTP sessions.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    config: TransportConfig,
}

impl Transport {
    /// Creates a transport with the given settings.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Returns the transport settings.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Opens a session with its own connection pool.
    ///
    /// The pool is released when the session is dropped.
    pub fn open(&self) -> Result<Session> {
        let client = Client::builder()
            .user_agent(&self.config.user_agent)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;
        Ok(Session {
            client,
            retry: self.config.retry.clone(),
            sent: AtomicUsize::new(0),
        })
    }
}

/// An open HTTP session. Dropping it closes its connections.
pub struct Session {
    client: Client,
    retry: RetryPolicy,
    sent: AtomicUsize,
}

impl Session {
    /// Sends a request and decodes the JSON body.
    pub async fn execute(&self, request: &PageRequest) -> Result<Value> {
        let mut retry = 0;
        let mut backoff = self.retry.create_backoff();
        loop {
            match self.send(request).await {
                Ok(response) => {
                    let status = response.status();
                    if self.retry.is_retryable_status(status.as_u16())
                        && retry < self.retry.max_retries
                    {
                        retry += 1;
                        let scheduled = self.retry.next_delay(retry, &mut backoff);
                        let delay = retry_after(&response)
                            .map(|delay| delay.min(self.retry.max_backoff()))
                            .unwrap_or(scheduled);
                        warn!(
                            "{} returned {}, retry {}/{} in {:?}",
                            request.endpoint(),
                            status,
                            retry,
                            self.retry.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if !status.is_success() {
                        return Err(JixerError::Status {
                            status: status.as_u16(),
                            url: request.endpoint().to_string(),
                        });
                    }
                    let body = response.bytes().await?;
                    return Ok(serde_json::from_slice(&body)?);
                }
                Err(err)
                    if (err.is_connect() || err.is_timeout()) && retry < self.retry.max_retries =>
                {
                    let err = err.without_url();
                    retry += 1;
                    let delay = self.retry.next_delay(retry, &mut backoff);
                    warn!(
                        "{} failed: {}, retry {}/{} in {:?}",
                        request.endpoint(),
                        err,
                        retry,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Number of HTTP requests sent, retries included.
    pub fn requests_sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    async fn send(&self, request: &PageRequest) -> reqwest::Result<Response> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let mut builder = self.client.request(request.method().clone(), request.url());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        builder.send().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!("Closing session after {} requests", self.requests_sent());
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff_factor_ms, 2_000);
        assert_eq!(policy.status_forcelist, vec![500, 502, 503, 504]);
    }

    #[test]
    fn test_retryable_statuses() {
        let policy = RetryPolicy::default();
        for status in [500, 502, 503, 504] {
            assert!(policy.is_retryable_status(status));
        }
        for status in [200, 400, 401, 404, 429, 501] {
            assert!(!policy.is_retryable_status(status));
        }
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5)
            .map(|retry| policy.backoff_for(retry).as_secs())
            .collect();
        assert_eq!(delays, vec![0, 4, 8, 16, 32]);
    }

    #[test]
    fn test_backoff_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(10), Duration::from_secs(120));
        assert_eq!(policy.backoff_for(200), Duration::from_secs(120));
    }

    #[test]
    fn test_backoff_sequence_capped_midway() {
        let policy = RetryPolicy {
            max_backoff_ms: 10_000,
            ..Default::default()
        };
        let delays: Vec<u64> = (1..=5)
            .map(|retry| policy.backoff_for(retry).as_secs())
            .collect();
        assert_eq!(delays, vec![0, 4, 8, 10, 10]);
    }

    #[test]
    fn test_with_backoff_factor_saturates() {
        let policy = RetryPolicy::default().with_backoff_factor(Duration::MAX);
        assert_eq!(policy.backoff_factor_ms, u64::MAX);
        assert_eq!(policy.backoff_for(3), Duration::from_secs(120));
    }

    #[test]
    fn test_backoff_zero_factor() {
        let policy = RetryPolicy::default().with_backoff_factor(Duration::ZERO);
        assert_eq!(policy.backoff_for(4), Duration::ZERO);
    }

    #[test]
    fn test_retry_policy_none() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.user_agent.starts_with("jixer/"));
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_transport_config_deserialization_defaults() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"timeout_secs": 5, "retry": {"max_retries": 2}}"#).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.backoff_factor_ms, 2_000);
        assert_eq!(config.retry.status_forcelist, vec![500, 502, 503, 504]);
    }

    #[test]
    fn test_open_session() {
        let session = Transport::default().open().unwrap();
        assert_eq!(session.requests_sent(), 0);
    }
}
