//! Configuration for the token, mail and vendor clients.
//!
//! Use [`ClientConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use mailbox_otp::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .poll_interval(Duration::from_secs(5))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.extraction.max_concurrency, 10);
//! ```

use crate::error::{Error, Result};
use crate::mail::Folder;
use crate::proxy::Socks5Proxy;
use std::time::Duration;

/// Default identity endpoint for the refresh token grant.
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
/// Default mail resource base URL.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
/// Default scope requested during token exchange.
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";
/// Default vendor inventory base URL.
pub const DEFAULT_VENDOR_BASE_URL: &str = "https://zizhu.shanyouxiang.com";

/// Configuration shared by every client in this crate.
///
/// Create using [`ClientConfig::builder()`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote endpoints.
    pub endpoints: Endpoints,
    /// Retry policy for folder listing.
    pub retry: RetryConfig,
    /// Mailbox polling cadence and budget.
    pub polling: PollingConfig,
    /// Vendor extraction fan-out and bounds.
    pub extraction: ExtractionConfig,
    /// HTTP timeouts.
    pub timeouts: TimeoutConfig,
    /// Optional SOCKS5 proxy for all outbound requests.
    pub proxy: Option<Socks5Proxy>,
}

/// Remote endpoint locations.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Mail resource base URL (no trailing slash).
    pub graph_base_url: String,
    /// Scope sent with the refresh token grant.
    pub scope: String,
    /// Vendor inventory base URL (no trailing slash).
    pub vendor_base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            vendor_base_url: DEFAULT_VENDOR_BASE_URL.to_string(),
        }
    }
}

/// Retry policy applied to "service unavailable" answers from folder listing.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay step; retry `n` waits `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Polling configuration for mailbox scans.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Interval between scans.
    pub interval: Duration,
    /// Folders scanned on every tick, in order.
    pub folders: Vec<Folder>,
    /// Scans allowed before the poller gives up; `None` polls until cancelled.
    pub max_scans: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            folders: vec![Folder::Inbox, Folder::Junk],
            max_scans: Some(90), // 15 minutes at the default interval
        }
    }
}

/// Vendor extraction configuration.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Upper bound on parallel vendor requests per round.
    pub max_concurrency: u32,
    /// Pause between rounds.
    pub round_delay: Duration,
    /// Rounds allowed before returning a partial result.
    pub max_rounds: Option<u32>,
    /// Wall-clock budget before returning a partial result.
    pub max_elapsed: Option<Duration>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            round_delay: Duration::from_millis(100),
            max_rounds: Some(100),
            max_elapsed: Some(Duration::from_secs(300)),
        }
    }
}

/// Timeout configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing a connection.
    pub connect: Duration,
    /// Timeout for a complete request/response exchange.
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            retry: RetryConfig::default(),
            polling: PollingConfig::default(),
            extraction: ExtractionConfig::default(),
            timeouts: TimeoutConfig::default(),
            proxy: None,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    endpoints: Option<Endpoints>,
    retry: Option<RetryConfig>,
    polling: Option<PollingConfig>,
    extraction: Option<ExtractionConfig>,
    timeouts: Option<TimeoutConfig>,
    proxy: Option<Socks5Proxy>,
}

impl ClientConfigBuilder {
    /// Overrides the OAuth2 token endpoint.
    #[must_use]
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints
            .get_or_insert_with(Endpoints::default)
            .token_url = url.into();
        self
    }

    /// Overrides the mail resource base URL.
    #[must_use]
    pub fn graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints
            .get_or_insert_with(Endpoints::default)
            .graph_base_url = url.into();
        self
    }

    /// Overrides the scope requested during token exchange.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.endpoints.get_or_insert_with(Endpoints::default).scope = scope.into();
        self
    }

    /// Overrides the vendor inventory base URL.
    #[must_use]
    pub fn vendor_base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints
            .get_or_insert_with(Endpoints::default)
            .vendor_base_url = url.into();
        self
    }

    /// Sets the retry policy for folder listing.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets polling configuration.
    #[must_use]
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    /// Sets the interval between mailbox scans.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .interval = interval;
        self
    }

    /// Sets the scan budget; `None` polls until cancelled.
    #[must_use]
    pub fn max_scans(mut self, max_scans: Option<u32>) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .max_scans = max_scans;
        self
    }

    /// Sets vendor extraction configuration.
    #[must_use]
    pub fn extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = Some(extraction);
        self
    }

    /// Sets the number of rounds allowed before extraction returns a partial result.
    #[must_use]
    pub fn max_extraction_rounds(mut self, rounds: Option<u32>) -> Self {
        self.extraction
            .get_or_insert_with(ExtractionConfig::default)
            .max_rounds = rounds;
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .request = timeout;
        self
    }

    /// Routes all requests through a SOCKS5 proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if an endpoint is not a valid URL or a
    /// polling/extraction setting is out of range.
    pub fn build(self) -> Result<ClientConfig> {
        let mut endpoints = self.endpoints.unwrap_or_default();
        endpoints.graph_base_url = endpoints.graph_base_url.trim_end_matches('/').to_string();
        endpoints.vendor_base_url = endpoints.vendor_base_url.trim_end_matches('/').to_string();

        for (name, url) in [
            ("token_url", &endpoints.token_url),
            ("graph_base_url", &endpoints.graph_base_url),
            ("vendor_base_url", &endpoints.vendor_base_url),
        ] {
            reqwest::Url::parse(url).map_err(|e| Error::InvalidConfig {
                message: format!("{name} is not a valid URL: {e}"),
            })?;
        }

        let polling = self.polling.unwrap_or_default();
        if polling.interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "poll interval must be greater than zero".into(),
            });
        }
        if polling.folders.is_empty() {
            return Err(Error::InvalidConfig {
                message: "at least one folder must be polled".into(),
            });
        }

        let extraction = self.extraction.unwrap_or_default();
        if extraction.max_concurrency == 0 {
            return Err(Error::InvalidConfig {
                message: "extraction concurrency must be at least 1".into(),
            });
        }

        Ok(ClientConfig {
            endpoints,
            retry: self.retry.unwrap_or_default(),
            polling,
            extraction,
            timeouts: self.timeouts.unwrap_or_default(),
            proxy: self.proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder().build().unwrap();

        assert_eq!(config.endpoints.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.polling.interval, Duration::from_secs(10));
        assert_eq!(config.polling.folders, vec![Folder::Inbox, Folder::Junk]);
        assert_eq!(config.extraction.max_concurrency, 10);
        assert_eq!(config.extraction.round_delay, Duration::from_millis(100));
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_builder_full() {
        let config = ClientConfig::builder()
            .token_url("http://127.0.0.1:9000/token")
            .graph_base_url("http://127.0.0.1:9001/v1.0/")
            .vendor_base_url("http://127.0.0.1:9002")
            .poll_interval(Duration::from_secs(3))
            .max_scans(None)
            .max_extraction_rounds(Some(5))
            .request_timeout(Duration::from_secs(5))
            .proxy(Socks5Proxy::new("proxy.local", 1080))
            .build()
            .unwrap();

        assert_eq!(
            config.endpoints.graph_base_url,
            "http://127.0.0.1:9001/v1.0"
        );
        assert_eq!(config.polling.interval, Duration::from_secs(3));
        assert_eq!(config.polling.max_scans, None);
        assert_eq!(config.extraction.max_rounds, Some(5));
        assert_eq!(config.timeouts.request, Duration::from_secs(5));
        assert!(config.proxy.is_some());
    }

    #[test]
    fn test_builder_rejects_invalid_url() {
        let result = ClientConfig::builder().token_url("not a url").build();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let result = ClientConfig::builder()
            .poll_interval(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        let result = ClientConfig::builder()
            .extraction(ExtractionConfig {
                max_concurrency: 0,
                ..ExtractionConfig::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_retry_delay_is_linear() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for(3), Duration::from_secs(3));
    }
}
