//! Refresh token to access token exchange.
//!
//! Every mail resource call starts with a fresh exchange; access tokens are
//! never cached. The exchange is a single attempt: a failure is reported to the
//! caller straight away and the next polling tick simply tries again.

use crate::config::{ClientConfig, Endpoints};
use crate::connection;
use crate::error::{truncate_details, Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Short-lived bearer credential for the mail resource.
#[derive(Clone)]
pub struct AccessToken {
    value: SecretString,
    expires_in_seconds: u64,
}

impl AccessToken {
    /// Wraps a raw token value.
    #[must_use]
    pub fn new(value: impl Into<String>, expires_in_seconds: u64) -> Self {
        Self {
            value: SecretString::from(value.into()),
            expires_in_seconds,
        }
    }

    /// Returns the bearer value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.expose_secret()
    }

    /// Lifetime announced by the identity endpoint.
    #[must_use]
    pub fn expires_in_seconds(&self) -> u64 {
        self.expires_in_seconds
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

/// Anything that can turn a refresh token into an [`AccessToken`].
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Exchanges `refresh_token` issued to `client_id` for an access token.
    async fn exchange(&self, refresh_token: &str, client_id: &str) -> Result<AccessToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: u64,
}

/// OAuth2 refresh-token grant against the identity endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    token_url: String,
    scope: String,
}

impl TokenExchanger {
    /// Creates an exchanger from the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_client(connection::build_http_client(config)?, &config.endpoints))
    }

    pub(crate) fn with_client(http: reqwest::Client, endpoints: &Endpoints) -> Self {
        Self {
            http,
            token_url: endpoints.token_url.clone(),
            scope: endpoints.scope.clone(),
        }
    }
}

#[async_trait]
impl TokenSource for TokenExchanger {
    #[instrument(
        name = "TokenExchanger::exchange",
        skip_all,
        fields(client_id = %client_id)
    )]
    async fn exchange(&self, refresh_token: &str, client_id: &str) -> Result<AccessToken> {
        if refresh_token.is_empty() {
            return Err(Error::MissingParameter {
                name: "refreshToken",
            });
        }
        if client_id.is_empty() {
            return Err(Error::MissingParameter { name: "clientId" });
        }

        let params = [
            ("client_id", client_id),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(Error::network("token exchange"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(Error::network("token exchange"))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Token exchange rejected");
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                details: truncate_details(&body),
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(Error::decode("token exchange"))?;

        debug!(
            token_type = token.token_type.as_deref().unwrap_or("unknown"),
            expires_in = token.expires_in, "Access token obtained"
        );

        Ok(AccessToken::new(token.access_token, token.expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_decoding() {
        let body = r#"{"access_token":"eyJ0","token_type":"Bearer","expires_in":3599,"scope":"x"}"#;
        let token: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(token.access_token, "eyJ0");
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
        assert_eq!(token.expires_in, 3599);
    }

    #[test]
    fn test_access_token_debug_redacted() {
        let token = AccessToken::new("very-secret-bearer", 60);
        assert_eq!(token.value(), "very-secret-bearer");
        assert!(!format!("{token:?}").contains("very-secret-bearer"));
    }

    #[tokio::test]
    async fn test_exchange_rejects_missing_parameters() {
        let exchanger = TokenExchanger::new(&ClientConfig::default()).unwrap();

        let err = exchanger.exchange("", "cid").await.unwrap_err();
        assert!(matches!(
            err,
            Error::MissingParameter {
                name: "refreshToken"
            }
        ));

        let err = exchanger.exchange("token", "").await.unwrap_err();
        assert!(matches!(err, Error::MissingParameter { name: "clientId" }));
    }
}
