//! Internal module for building the shared HTTP client.
//!
//! Supports both direct connections and SOCKS5 proxy connections.

use crate::config::{ClientConfig, TimeoutConfig};
use crate::error::{Error, Result};
use crate::proxy::Socks5Proxy;
use tracing::{debug, instrument};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client used by the token, mail and vendor clients.
#[instrument(
    name = "connection::build_http_client",
    skip_all,
    fields(proxy_enabled = config.proxy.is_some())
)]
pub(crate) fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client> {
    build_with(&config.timeouts, config.proxy.as_ref())
}

fn build_with(timeouts: &TimeoutConfig, proxy: Option<&Socks5Proxy>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request);

    if let Some(proxy) = proxy {
        debug!(proxy = %proxy, "Routing requests via SOCKS5 proxy");
        builder = builder.proxy(proxy.to_reqwest()?);
    }

    builder
        .build()
        .map_err(|source| Error::BuildHttpClient { source })
}
