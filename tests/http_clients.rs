//! HTTP client tests against a local scripted server.
//!
//! Each server answers connections in order from a fixed list of
//! `(status, body)` pairs and records every raw request it receives.

use mailbox_otp::gateway::{Gateway, ListMessagesRequest};
use mailbox_otp::vendor::VendorClient;
use mailbox_otp::{
    ClientConfig, EmailType, Error, ExtractionQuota, Folder, MailResource, MailResourceClient,
    RefreshGrant, RetryConfig, TokenExchanger, TokenSource, VendorExtractionClient,
    VendorInventory,
};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ─────────────────────────────────────────────────────────────────────────────
// Scripted server
// ─────────────────────────────────────────────────────────────────────────────

struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let responses = Arc::new(Mutex::new(VecDeque::from(responses)));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let responses = Arc::clone(&responses);
                tokio::spawn(async move { serve(stream, &log, &responses).await });
            }
        });

        Self { addr, requests }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::builder()
            .token_url(format!("{}/token", self.url()))
            .graph_base_url(format!("{}/v1.0", self.url()))
            .vendor_base_url(self.url())
            .retry(RetryConfig {
                max_retries: 3,
                backoff_step: Duration::from_millis(10),
            })
            .build()
            .unwrap()
    }
}

async fn serve(
    mut stream: TcpStream,
    log: &Mutex<Vec<String>>,
    responses: &Mutex<VecDeque<(u16, &'static str)>>,
) {
    let request = read_request(&mut stream).await;
    // Record and pick the answer in one step so the order matches.
    let (status, body) = {
        let mut log = log.lock().unwrap();
        log.push(request);
        responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((500, "script exhausted"))
    };

    let response = format!(
        "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

const TOKEN_OK: &str = r#"{"access_token":"bearer-123","token_type":"Bearer","expires_in":3599}"#;

const LISTING: &str = r#"{"value":[
    {"id":"m1","subject":"Your code is 482913","from":{"emailAddress":{"address":"no-reply@example.com"}},
     "bodyPreview":"Use it within 10 minutes","receivedDateTime":"2024-05-01T10:15:00Z"},
    {"id":"m2","subject":null,"from":null,"bodyPreview":null,"receivedDateTime":"2024-05-01T09:00:00Z"}
]}"#;

fn grant() -> RefreshGrant {
    RefreshGrant::new("refresh-abc", "client-xyz").unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Token exchange
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_token_exchange_sends_refresh_grant() {
    let server = MockServer::start(vec![(200, TOKEN_OK)]).await;
    let exchanger = TokenExchanger::new(&server.config()).unwrap();

    let token = exchanger
        .exchange("refresh-abc", "client-xyz")
        .await
        .unwrap();

    assert_eq!(token.value(), "bearer-123");
    assert_eq!(token.expires_in_seconds(), 3599);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("POST /token "));
    assert!(requests[0].contains("grant_type=refresh_token"));
    assert!(requests[0].contains("client_id=client-xyz"));
    assert!(requests[0].contains("refresh_token=refresh-abc"));
}

#[tokio::test]
async fn test_token_exchange_failure_is_not_retried() {
    let server =
        MockServer::start(vec![(400, r#"{"error":"invalid_grant"}"#), (200, TOKEN_OK)]).await;
    let exchanger = TokenExchanger::new(&server.config()).unwrap();

    let err = exchanger
        .exchange("refresh-abc", "client-xyz")
        .await
        .unwrap_err();

    match err {
        Error::TokenExchange { status, details } => {
            assert_eq!(status, 400);
            assert!(details.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(server.requests().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Mail resource
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_folder_normalizes_messages() {
    let server = MockServer::start(vec![(200, TOKEN_OK), (200, LISTING)]).await;
    let client = MailResourceClient::new(&server.config()).unwrap();

    let messages = client.list_folder(&grant(), Folder::Junk).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].from, "no-reply@example.com");
    assert_eq!(messages[0].folder, Folder::Junk);
    assert_eq!(messages[1].subject, "(no subject)");
    assert_eq!(messages[1].from, "unknown sender");
    assert_eq!(messages[1].body_preview, "");

    let listing = server.requests()[1].to_ascii_lowercase();
    assert!(listing.starts_with("get /v1.0/me/mailfolders/junkemail/messages?"));
    assert!(listing.contains("authorization: bearer bearer-123"));
}

#[tokio::test]
async fn test_list_folder_retries_unavailable() {
    let server =
        MockServer::start(vec![(200, TOKEN_OK), (503, ""), (503, ""), (200, LISTING)]).await;
    let client = MailResourceClient::new(&server.config()).unwrap();

    let messages = client.list_folder(&grant(), Folder::Inbox).await.unwrap();

    assert_eq!(messages.len(), 2);
    // One token exchange, three listing attempts.
    assert_eq!(server.requests().len(), 4);
}

#[tokio::test]
async fn test_list_folder_soft_fails_when_still_unavailable() {
    let server = MockServer::start(vec![
        (200, TOKEN_OK),
        (503, ""),
        (503, ""),
        (503, ""),
        (503, ""),
        (200, LISTING),
    ])
    .await;
    let client = MailResourceClient::new(&server.config()).unwrap();

    let messages = client.list_folder(&grant(), Folder::Inbox).await.unwrap();

    assert!(messages.is_empty());
    assert_eq!(server.requests().len(), 5);
}

#[tokio::test]
async fn test_list_folder_other_status_is_fatal() {
    let server = MockServer::start(vec![(200, TOKEN_OK), (404, r#"{"error":"nope"}"#)]).await;
    let client = MailResourceClient::new(&server.config()).unwrap();

    let err = client
        .list_folder(&grant(), Folder::Inbox)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ResourceStatus { status: 404, .. }));
    assert!(!err.is_retryable());
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_fetch_body() {
    let server = MockServer::start(vec![
        (200, TOKEN_OK),
        (
            200,
            r#"{"id":"m1","subject":"s","body":{"contentType":"html","content":"<b>482913</b>"}}"#,
        ),
    ])
    .await;
    let client = MailResourceClient::new(&server.config()).unwrap();

    let body = client.fetch_body(&grant(), "m1").await.unwrap();

    assert_eq!(body.body, "<b>482913</b>");
    assert_eq!(body.body_type, mailbox_otp::mail::BodyType::Html);
    assert!(server.requests()[1].starts_with("GET /v1.0/me/messages/m1?"));
}

#[tokio::test]
async fn test_fetch_body_is_single_attempt() {
    let server = MockServer::start(vec![(200, TOKEN_OK), (503, ""), (200, "{}")]).await;
    let client = MailResourceClient::new(&server.config()).unwrap();

    let err = client.fetch_body(&grant(), "m1").await.unwrap_err();

    assert!(matches!(err, Error::ResourceStatus { status: 503, .. }));
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_gateway_reports_token_failure_as_401() {
    let server = MockServer::start(vec![(401, "unauthorized_client")]).await;
    let gateway = Gateway::new(MailResourceClient::new(&server.config()).unwrap());

    let request: ListMessagesRequest =
        serde_json::from_str(r#"{"refreshToken":"rt","clientId":"cid"}"#).unwrap();
    let response = gateway.list_messages(&request).await;

    assert_eq!(response.status, 401);
    assert_eq!(response.body["details"], "unauthorized_client");
}

// ─────────────────────────────────────────────────────────────────────────────
// Vendor
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_vendor_queries() {
    let server = MockServer::start(vec![
        (200, r#"{"outlook": 120, "hotmail": 3}"#),
        (200, r#"{"num": 57}"#),
        (200, "a@outlook.com----pw----rt----cid\n"),
        (500, "boom"),
    ])
    .await;
    let vendor = VendorClient::new(&server.config()).unwrap();

    let stock = vendor.stock().await.unwrap();
    assert_eq!(stock.for_type(EmailType::Outlook), 120);
    assert_eq!(stock.for_type(EmailType::Hotmail), 3);

    let balance = vendor.balance("key-1").await.unwrap();
    assert!((balance - 57.0).abs() < f64::EPSILON);

    let batch = vendor
        .fetch_batch(1, EmailType::Hotmail, "key-1")
        .await
        .unwrap();
    assert!(batch.starts_with("a@outlook.com----"));

    let err = vendor.stock().await.unwrap_err();
    assert!(matches!(err, Error::VendorStatus { status: 500, .. }));

    let requests = server.requests();
    assert!(requests[0].starts_with("GET /kucun "));
    assert!(requests[1].starts_with("GET /yue?card=key-1 "));
    assert!(requests[2].starts_with("GET /huoqu?shuliang=1&leixing=hotmail&card=key-1 "));
}

#[tokio::test]
async fn test_balance_requires_key() {
    let vendor = VendorClient::new(&ClientConfig::default()).unwrap();
    let err = vendor.balance(" ").await.unwrap_err();
    assert!(matches!(err, Error::MissingParameter { name: "apiKey" }));
}

#[tokio::test]
async fn test_extraction_over_http() {
    let server = MockServer::start(vec![
        (200, "one@outlook.com----pw----rt1----cid\nbroken line"),
        (500, "vendor hiccup"),
        (200, "two@outlook.com----pw----rt2----cid"),
    ])
    .await;
    let extractor = VendorExtractionClient::new(&server.config()).unwrap();
    let quota = ExtractionQuota::new(2, EmailType::Outlook, "key").unwrap();

    let outcome = extractor.extract(&quota).await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.rounds(), 2);
    let mut emails: Vec<&str> = outcome.credentials().iter().map(|c| c.email()).collect();
    emails.sort_unstable();
    assert_eq!(emails, vec!["one@outlook.com", "two@outlook.com"]);
    assert_eq!(server.requests().len(), 3);
}
