//! Request/response boundary in front of the mail resource.
//!
//! A [`Gateway`] turns JSON-shaped requests into [`GatewayResponse`]s with an
//! HTTP-style status, so a web front end can be wired to it without knowing the
//! error taxonomy:
//!
//! | status | meaning |
//! |--------|---------|
//! | 200 | `{"messages": [...]}` or `{"body": ..., "bodyType": ...}` |
//! | 400 | a required parameter is missing |
//! | 401 | the token exchange failed |
//! | 500 | the resource call failed |
//!
//! A listing that stays unavailable after retries is a 200 with no messages.

use crate::credential::RefreshGrant;
use crate::error::{Error, ErrorCategory, Result};
use crate::mail::{Folder, MailResource, Message, MessageBody};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{instrument, warn};

/// Folder listing request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesRequest {
    /// OAuth2 refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// OAuth2 client id.
    #[serde(default)]
    pub client_id: String,
    /// Folder to list; defaults to the inbox.
    #[serde(default)]
    pub folder: Folder,
}

impl ListMessagesRequest {
    fn grant(&self) -> Result<RefreshGrant> {
        RefreshGrant::new(self.refresh_token.as_str(), self.client_id.as_str())
    }
}

/// Full body request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBodyRequest {
    /// OAuth2 refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// OAuth2 client id.
    #[serde(default)]
    pub client_id: String,
    /// Id of the message to fetch.
    #[serde(default)]
    pub message_id: String,
}

impl MessageBodyRequest {
    fn grant(&self) -> Result<RefreshGrant> {
        RefreshGrant::new(self.refresh_token.as_str(), self.client_id.as_str())
    }
}

#[derive(Serialize)]
struct MessageList<'a> {
    messages: &'a [Message],
}

/// Status plus JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// JSON payload.
    pub body: Value,
}

impl GatewayResponse {
    fn ok<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(500, "Internal server error", Some(e.to_string())),
        }
    }

    fn error(status: u16, error: &str, details: Option<String>) -> Self {
        let body = match details {
            Some(details) => json!({ "error": error, "details": details }),
            None => json!({ "error": error }),
        };
        Self { status, body }
    }

    /// `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Maps mail resource calls onto the gateway status contract.
#[derive(Debug, Clone)]
pub struct Gateway<M> {
    resource: M,
}

impl<M: MailResource> Gateway<M> {
    /// Wraps a mail resource.
    #[must_use]
    pub fn new(resource: M) -> Self {
        Self { resource }
    }

    /// Lists a folder.
    #[instrument(name = "Gateway::list_messages", skip_all, fields(folder = %request.folder))]
    pub async fn list_messages(&self, request: &ListMessagesRequest) -> GatewayResponse {
        let grant = match request.grant() {
            Ok(grant) => grant,
            Err(_) => return missing_parameters(),
        };

        match self.resource.list_folder(&grant, request.folder).await {
            Ok(messages) => GatewayResponse::ok(&MessageList {
                messages: &messages,
            }),
            Err(e) => failure(&e, "Failed to fetch inbox"),
        }
    }

    /// Fetches one message body.
    #[instrument(name = "Gateway::message_body", skip_all)]
    pub async fn message_body(&self, request: &MessageBodyRequest) -> GatewayResponse {
        let grant = match request.grant() {
            Ok(grant) => grant,
            Err(_) => return missing_parameters(),
        };
        if request.message_id.trim().is_empty() {
            return missing_parameters();
        }

        match self.resource.fetch_body(&grant, &request.message_id).await {
            Ok(body) => GatewayResponse::ok::<MessageBody>(&body),
            Err(e) => failure(&e, "Failed to fetch message"),
        }
    }
}

fn missing_parameters() -> GatewayResponse {
    GatewayResponse::error(400, "Missing required parameters", None)
}

fn failure(error: &Error, resource_message: &str) -> GatewayResponse {
    warn!(category = %error.category(), error = %error, "Gateway request failed");

    match error {
        Error::TokenExchange { details, .. } => {
            GatewayResponse::error(401, "Failed to get access token", Some(details.clone()))
        }
        Error::ResourceStatus { details, .. } => {
            GatewayResponse::error(500, resource_message, Some(details.clone()))
        }
        e if e.category() == ErrorCategory::Validation => missing_parameters(),
        e => GatewayResponse::error(500, "Internal server error", Some(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::BodyType;
    use async_trait::async_trait;

    enum Behaviour {
        Ok,
        Unauthorized,
        Broken,
        Unavailable,
    }

    struct StubResource(Behaviour);

    #[async_trait]
    impl MailResource for StubResource {
        async fn list_folder(&self, _grant: &RefreshGrant, folder: Folder) -> Result<Vec<Message>> {
            match self.0 {
                Behaviour::Ok => Ok(vec![Message {
                    id: "m1".to_string(),
                    subject: "Your code is 123456".to_string(),
                    from: "no-reply@example.com".to_string(),
                    body_preview: String::new(),
                    received_date_time: "2024-05-01T10:15:00Z".to_string(),
                    received_at: None,
                    folder,
                    body: None,
                    body_type: None,
                }]),
                Behaviour::Unauthorized => Err(Error::TokenExchange {
                    status: 400,
                    details: "invalid_grant".to_string(),
                }),
                Behaviour::Broken => Err(Error::ResourceStatus {
                    operation: "list folder",
                    status: 404,
                    details: "ErrorItemNotFound".to_string(),
                }),
                // The client soft-fails exhausted retries to an empty listing.
                Behaviour::Unavailable => Ok(Vec::new()),
            }
        }

        async fn fetch_body(&self, _grant: &RefreshGrant, _id: &str) -> Result<MessageBody> {
            match self.0 {
                Behaviour::Ok => Ok(MessageBody {
                    body: "hello".to_string(),
                    body_type: BodyType::Text,
                }),
                _ => Err(Error::ResourceStatus {
                    operation: "fetch body",
                    status: 500,
                    details: String::new(),
                }),
            }
        }
    }

    fn list_request(json: &str) -> ListMessagesRequest {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let gateway = Gateway::new(StubResource(Behaviour::Ok));

        let response = gateway
            .list_messages(&list_request(r#"{"refreshToken": "rt"}"#))
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Missing required parameters");

        let request: MessageBodyRequest =
            serde_json::from_str(r#"{"refreshToken": "rt", "clientId": "cid"}"#).unwrap();
        assert_eq!(gateway.message_body(&request).await.status, 400);
    }

    #[tokio::test]
    async fn test_list_messages_success() {
        let gateway = Gateway::new(StubResource(Behaviour::Ok));

        let response = gateway
            .list_messages(&list_request(
                r#"{"refreshToken": "rt", "clientId": "cid", "folder": "junk"}"#,
            ))
            .await;

        assert!(response.is_success());
        let messages = response.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["bodyPreview"], "");
        assert_eq!(messages[0]["folder"], "junk");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let request = list_request(r#"{"refreshToken": "rt", "clientId": "cid"}"#);

        let response = Gateway::new(StubResource(Behaviour::Unauthorized))
            .list_messages(&request)
            .await;
        assert_eq!(response.status, 401);
        assert_eq!(response.body["details"], "invalid_grant");

        let response = Gateway::new(StubResource(Behaviour::Broken))
            .list_messages(&request)
            .await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "Failed to fetch inbox");

        let response = Gateway::new(StubResource(Behaviour::Unavailable))
            .list_messages(&request)
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({ "messages": [] }));
    }

    #[tokio::test]
    async fn test_message_body() {
        let request: MessageBodyRequest = serde_json::from_str(
            r#"{"refreshToken": "rt", "clientId": "cid", "messageId": "m1"}"#,
        )
        .unwrap();

        let response = Gateway::new(StubResource(Behaviour::Ok))
            .message_body(&request)
            .await;
        assert_eq!(
            response.body,
            json!({ "body": "hello", "bodyType": "text" })
        );

        let response = Gateway::new(StubResource(Behaviour::Broken))
            .message_body(&request)
            .await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "Failed to fetch message");
    }
}
