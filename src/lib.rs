//! # mailbox-otp
//!
//! Async acquisition and polling engine for disposable OAuth2 mailboxes.
//!
//! This crate provides a high-level, async API for:
//! - Extracting mailbox credentials from a vendor inventory, with bounded concurrency
//! - Exchanging refresh tokens for access tokens and listing mail folders
//! - Polling inbox and junk until a verification code shows up
//! - Extracting the code with a deterministic heuristic cascade
//!
//! ## Features
//!
//! - **`observability`**: Enables OpenTelemetry integration for distributed tracing.
//!   Without this feature, tracing spans are still emitted but require no OTEL dependencies.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailbox_otp::{ClientConfig, EmailType, ExtractionQuota, Session};
//!
//! # async fn example() -> mailbox_otp::Result<()> {
//! let config = ClientConfig::default();
//! let mut session = Session::new(&config)?;
//!
//! // Pull one mailbox and start polling it as soon as it arrives
//! let quota = ExtractionQuota::new(1, EmailType::Outlook, "vendor-api-key")?;
//! session.extract_and_activate(&quota).await;
//!
//! // Inbox and junk are scanned every 10 seconds
//! if let Some(code) = session.wait_for_code().await {
//!     println!("Got code: {code}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Polling a Known Mailbox
//!
//! ```no_run
//! use mailbox_otp::{ClientConfig, Credential, Session};
//!
//! # async fn example() -> mailbox_otp::Result<()> {
//! let mut session = Session::new(&ClientConfig::default())?;
//! let credential = Credential::parse_line("user@outlook.com----pw----M.R3_token----client-id")
//!     .expect("well-formed record");
//!
//! let poller = session.activate(credential);
//! let mut updates = poller.subscribe();
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow_and_update().clone();
//!     println!("{:?} after {} checks", snapshot.state, snapshot.check_count);
//!     if snapshot.state.is_terminal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Using a SOCKS5 Proxy
//!
//! ```no_run
//! use mailbox_otp::{ClientConfig, Session, Socks5Proxy};
//!
//! # fn example() -> mailbox_otp::Result<()> {
//! let config = ClientConfig::builder()
//!     .proxy(Socks5Proxy::with_auth("proxy.example.com", 1080, "user", "pass"))
//!     .build()?;
//!
//! let session = Session::new(&config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Code Extraction
//!
//! ```
//! use mailbox_otp::matcher::Matcher;
//! use mailbox_otp::CodeExtractor;
//!
//! let extractor = CodeExtractor::new();
//! assert_eq!(extractor.find_match("Your code is 482913").as_deref(), Some("482913"));
//! assert_eq!(extractor.find_match("验证码: AB12CD").as_deref(), Some("AB12CD"));
//! ```
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error` and provide context. Use [`Error::is_retryable`]
//! to determine if an operation can be retried:
//!
//! ```
//! use mailbox_otp::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient error, can retry: {}", error);
//!     } else {
//!         println!("Permanent error ({}): {}", error.category(), error);
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. All major operations emit spans with
//! structured fields suitable for distributed tracing.
//!
//! ### Span Naming Convention
//!
//! - `TokenExchanger::exchange` - Refresh token exchange
//! - `MailResourceClient::list_folder` - Folder listing (with retries)
//! - `MailResourceClient::fetch_body` - Full body retrieval
//! - `VendorExtractionClient::extract` - Quota-driven extraction
//! - `MailboxPoller::start` - Polling loop (scans are logged inside it)
//! - `Session::activate` - Credential activation
//! - `connection::build_http_client` - HTTP client construction
//!
//! ### Standard Fields
//!
//! - `email` - Mailbox address
//! - `client_id` - OAuth2 client id
//! - `folder` - Folder being listed
//! - `requested` - Extraction quota
//! - `proxy_enabled` - Whether proxy is used
//!
//! Secrets (passwords, refresh and access tokens, API keys) are never recorded.
//!
//! Enable the `observability` feature for OpenTelemetry integration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod mail;
pub mod matcher;
pub mod poller;
pub mod proxy;
pub mod token;
pub mod vendor;

// Internal modules
mod connection;
mod parser;
mod session;

// Re-exports for ergonomic API
pub use config::{
    ClientConfig, ClientConfigBuilder, Endpoints, ExtractionConfig, PollingConfig, RetryConfig,
    TimeoutConfig,
};
pub use credential::{Credential, EmailType, ExtractionQuota, RefreshGrant};
pub use email_address::EmailAddress;
pub use error::{Error, ErrorCategory, Result};
pub use mail::{Folder, MailResource, MailResourceClient, Message, MessageBody};
pub use matcher::CodeExtractor;
pub use poller::{MailboxPoller, PollSnapshot, PollState};
pub use proxy::{ProxyAuth, Socks5Proxy};
pub use session::Session;
pub use token::{AccessToken, TokenExchanger, TokenSource};
pub use vendor::{ExtractionOutcome, VendorClient, VendorExtractionClient, VendorInventory};
