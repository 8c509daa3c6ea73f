//! Mail resource access: folder listing and on-demand body retrieval.
//!
//! [`MailResourceClient`] exchanges a [`RefreshGrant`] for a fresh
//! access token on every call, then talks to the mail resource with it.
//!
//! - [`MailResource::list_folder`] returns up to 50 newest messages. A
//!   "service unavailable" answer is retried with a linearly growing delay; if
//!   the resource is still unavailable afterwards the listing is empty rather
//!   than an error, so a polling loop keeps going.
//! - [`MailResource::fetch_body`] is a single attempt.
//!
//! # Example
//!
//! ```no_run
//! use mailbox_otp::mail::{Folder, MailResource, MailResourceClient};
//! use mailbox_otp::{ClientConfig, RefreshGrant};
//!
//! # async fn example() -> mailbox_otp::Result<()> {
//! let client = MailResourceClient::new(&ClientConfig::default())?;
//! let grant = RefreshGrant::new("refresh-token", "client-id")?;
//!
//! for message in client.list_folder(&grant, Folder::Junk).await? {
//!     println!("{} from {}", message.subject, message.from);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{ClientConfig, RetryConfig};
use crate::connection;
use crate::credential::RefreshGrant;
use crate::error::{truncate_details, Error, Result};
use crate::parser;
use crate::token::{TokenExchanger, TokenSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

/// Number of messages requested per listing.
pub const PAGE_SIZE: u32 = 50;

/// Mailbox partition scanned by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    /// The regular inbox.
    #[default]
    Inbox,
    /// The junk / spam folder.
    Junk,
}

impl Folder {
    /// Returns the short name used in requests and responses.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Folder::Inbox => "inbox",
            Folder::Junk => "junk",
        }
    }

    /// Returns the well-known folder name on the mail resource.
    #[must_use]
    pub fn resource_path(self) -> &'static str {
        match self {
            Folder::Inbox => "inbox",
            Folder::Junk => "junkemail",
        }
    }
}

impl std::fmt::Display for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Folder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbox" => Ok(Folder::Inbox),
            "junk" | "junkemail" => Ok(Folder::Junk),
            other => Err(Error::InvalidConfig {
                message: format!("unknown folder '{other}'"),
            }),
        }
    }
}

/// How a message body should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    /// HTML markup.
    Html,
    /// Plain text.
    Text,
}

impl BodyType {
    /// Classifies a declared content type: anything mentioning `html` is HTML.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.to_ascii_lowercase().contains("html") {
            BodyType::Html
        } else {
            BodyType::Text
        }
    }
}

/// A message summary from a folder listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Resource id, unique within a folder.
    pub id: String,
    /// Subject line.
    pub subject: String,
    /// Sender address.
    pub from: String,
    /// Short plain-text preview of the body.
    pub body_preview: String,
    /// Receipt time as reported by the resource.
    pub received_date_time: String,
    /// Parsed receipt time, when the reported value is RFC 3339.
    #[serde(skip)]
    pub received_at: Option<DateTime<Utc>>,
    /// Folder the message was listed from.
    pub folder: Folder,
    /// Full body, once fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Body type, once fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_type: Option<BodyType>,
}

/// A fetched message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    /// Body content.
    pub body: String,
    /// Body type.
    pub body_type: BodyType,
}

/// Read access to a mailbox.
#[async_trait]
pub trait MailResource: Send + Sync {
    /// Lists the newest messages of `folder`.
    ///
    /// Exhausted "service unavailable" retries yield an empty list.
    async fn list_folder(&self, grant: &RefreshGrant, folder: Folder) -> Result<Vec<Message>>;

    /// Fetches the full body of one message.
    async fn fetch_body(&self, grant: &RefreshGrant, message_id: &str) -> Result<MessageBody>;
}

#[async_trait]
impl<M: MailResource + ?Sized> MailResource for std::sync::Arc<M> {
    async fn list_folder(&self, grant: &RefreshGrant, folder: Folder) -> Result<Vec<Message>> {
        (**self).list_folder(grant, folder).await
    }

    async fn fetch_body(&self, grant: &RefreshGrant, message_id: &str) -> Result<MessageBody> {
        (**self).fetch_body(grant, message_id).await
    }
}

/// Outcome of one attempt of a retryable request.
pub(crate) enum Attempt<T> {
    /// The resource answered "service unavailable".
    Unavailable,
    /// The request completed (successfully or not).
    Done(T),
}

/// Runs `attempt` until it completes or the retry budget is spent.
///
/// Retry `n` (1-based) is preceded by a `n * backoff_step` pause. Returns
/// [`Error::ServiceUnavailable`] once every attempt answered "unavailable".
pub(crate) async fn retry_unavailable<T, F, Fut>(
    retry: &RetryConfig,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let mut retries = 0;

    loop {
        match attempt().await? {
            Attempt::Done(value) => return Ok(value),
            Attempt::Unavailable if retries < retry.max_retries => {
                retries += 1;
                let delay = retry.delay_for(retries);
                debug!(
                    operation,
                    retry = retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Resource unavailable, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Attempt::Unavailable => {
                return Err(Error::ServiceUnavailable {
                    operation,
                    attempts: retries + 1,
                });
            }
        }
    }
}

async fn read_text(response: reqwest::Response, operation: &'static str) -> Result<String> {
    response.text().await.map_err(Error::network(operation))
}

/// HTTP client for the mail resource.
#[derive(Debug, Clone)]
pub struct MailResourceClient<T = TokenExchanger> {
    http: reqwest::Client,
    tokens: T,
    base_url: String,
    retry: RetryConfig,
}

impl MailResourceClient<TokenExchanger> {
    /// Creates a client that exchanges tokens against the configured identity endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = connection::build_http_client(config)?;
        let tokens = TokenExchanger::with_client(http.clone(), &config.endpoints);
        Ok(Self::with_parts(http, tokens, config))
    }
}

impl<T: TokenSource> MailResourceClient<T> {
    /// Creates a client with a custom token source.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_token_source(config: &ClientConfig, tokens: T) -> Result<Self> {
        let http = connection::build_http_client(config)?;
        Ok(Self::with_parts(http, tokens, config))
    }

    fn with_parts(http: reqwest::Client, tokens: T, config: &ClientConfig) -> Self {
        Self {
            http,
            tokens,
            base_url: config.endpoints.graph_base_url.clone(),
            retry: config.retry.clone(),
        }
    }

    async fn access_token(&self, grant: &RefreshGrant) -> Result<String> {
        let token = self
            .tokens
            .exchange(grant.refresh_token(), grant.client_id())
            .await?;
        Ok(token.value().to_string())
    }

    async fn list_once(
        &self,
        url: &str,
        bearer: &str,
        folder: Folder,
    ) -> Result<Attempt<Vec<Message>>> {
        let response = self
            .http
            .get(url)
            .query(&[
                ("$top", PAGE_SIZE.to_string()),
                ("$orderby", "receivedDateTime DESC".to_string()),
            ])
            .bearer_auth(bearer)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(Error::network("list folder"))?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(Attempt::Unavailable);
        }

        let body = read_text(response, "list folder").await?;

        if !status.is_success() {
            return Err(Error::ResourceStatus {
                operation: "list folder",
                status: status.as_u16(),
                details: truncate_details(&body),
            });
        }

        parser::parse_message_list(&body, folder).map(Attempt::Done)
    }
}

#[async_trait]
impl<T: TokenSource> MailResource for MailResourceClient<T> {
    #[instrument(
        name = "MailResourceClient::list_folder",
        skip_all,
        fields(client_id = %grant.client_id(), folder = %folder)
    )]
    async fn list_folder(&self, grant: &RefreshGrant, folder: Folder) -> Result<Vec<Message>> {
        let bearer = self.access_token(grant).await?;
        let path = folder.resource_path();
        let url = format!("{}/me/mailFolders/{path}/messages", self.base_url);

        let result = retry_unavailable(&self.retry, "list folder", || {
            self.list_once(&url, &bearer, folder)
        })
        .await;

        match result {
            Ok(messages) => {
                debug!(count = messages.len(), "Folder listed");
                Ok(messages)
            }
            Err(Error::ServiceUnavailable { attempts, .. }) => {
                warn!(attempts, "Folder still unavailable, returning no messages");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(
        name = "MailResourceClient::fetch_body",
        skip_all,
        fields(client_id = %grant.client_id(), message_id = %message_id)
    )]
    async fn fetch_body(&self, grant: &RefreshGrant, message_id: &str) -> Result<MessageBody> {
        if message_id.is_empty() {
            return Err(Error::MissingParameter { name: "messageId" });
        }

        let bearer = self.access_token(grant).await?;
        let url = format!("{}/me/messages/{}", self.base_url, message_id);

        let response = self
            .http
            .get(&url)
            .query(&[("$select", "id,subject,body")])
            .bearer_auth(&bearer)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(Error::network("fetch body"))?;

        let status = response.status();
        let body = read_text(response, "fetch body").await?;

        if !status.is_success() {
            return Err(Error::ResourceStatus {
                operation: "fetch body",
                status: status.as_u16(),
                details: truncate_details(&body),
            });
        }

        let message = parser::parse_message_body(&body)?;
        debug!(body_type = ?message.body_type, length = message.body.len(), "Body fetched");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_folder_names() {
        assert_eq!(Folder::Inbox.resource_path(), "inbox");
        assert_eq!(Folder::Junk.resource_path(), "junkemail");
        assert_eq!("junk".parse::<Folder>().unwrap(), Folder::Junk);
        assert_eq!("INBOX".parse::<Folder>().unwrap(), Folder::Inbox);
        assert!("archive".parse::<Folder>().is_err());
    }

    #[test]
    fn test_body_type_classification() {
        assert_eq!(BodyType::from_content_type("html"), BodyType::Html);
        assert_eq!(BodyType::from_content_type("text/HTML"), BodyType::Html);
        assert_eq!(BodyType::from_content_type("text"), BodyType::Text);
        assert_eq!(BodyType::from_content_type(""), BodyType::Text);
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let message = Message {
            id: "1".into(),
            subject: "s".into(),
            from: "f@example.com".into(),
            body_preview: "p".into(),
            received_date_time: "2024-05-01T10:15:00Z".into(),
            received_at: None,
            folder: Folder::Junk,
            body: None,
            body_type: None,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["bodyPreview"], "p");
        assert_eq!(json["folder"], "junk");
        assert!(json.get("body").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_on_fourth_attempt() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_unavailable(&RetryConfig::default(), "list folder", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 4 {
                    Ok(Attempt::Unavailable)
                } else {
                    Ok(Attempt::Done(vec!["payload"]))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, vec!["payload"]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 3s of backoff
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(6) && waited < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_four_attempts() {
        let calls = AtomicU32::new(0);

        let err = retry_unavailable::<(), _, _>(&RetryConfig::default(), "list folder", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Attempt::Unavailable) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::ServiceUnavailable { attempts: 4, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_does_not_retry_other_errors() {
        let calls = AtomicU32::new(0);

        let err = retry_unavailable::<(), _, _>(&RetryConfig::default(), "list folder", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::ResourceStatus {
                    operation: "list folder",
                    status: 404,
                    details: String::new(),
                })
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::ResourceStatus { status: 404, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
