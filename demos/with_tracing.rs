//! Example: Using tracing for observability.
//!
//! This example demonstrates how to enable structured logging using
//! the `tracing` ecosystem. Token exchange, folder listing, retries and
//! every poll scan emit tracing spans and events.
//!
//! # Usage
//!
//! ```bash
//! export MAILBOX_RECORD="user@outlook.com----password----refresh-token----client-id"
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=mailbox_otp=debug
//!
//! cargo run --example with_tracing
//! ```

use mailbox_otp::{ClientConfig, Credential, PollState, Session};
use std::env;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> mailbox_otp::Result<()> {
    // Use RUST_LOG environment variable to control log levels
    // Example: RUST_LOG=mailbox_otp=debug,info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mailbox_otp=info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let record = env::var("MAILBOX_RECORD").expect("MAILBOX_RECORD environment variable required");
    let credential =
        Credential::parse_line(&record).expect("MAILBOX_RECORD must be a vendor record");

    tracing::info!(email = %credential.email(), "Starting mailbox-otp example");

    // Short cadence and a small budget so the example terminates
    let config = ClientConfig::builder()
        .poll_interval(Duration::from_secs(5))
        .max_scans(Some(6))
        .build()?;

    let mut session = Session::new(&config)?;
    let mut updates = session.activate(credential).subscribe();

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        tracing::info!(
            state = ?snapshot.state,
            checks = snapshot.check_count,
            visible = snapshot.visible_messages().len(),
            "Poll update"
        );

        match snapshot.state {
            PollState::Received => {
                println!("\nFound code: {}", snapshot.code_found.unwrap_or_default());
                break;
            }
            PollState::Failed => {
                println!("\nNo code after {} checks", snapshot.check_count);
                break;
            }
            PollState::Idle | PollState::Receiving => {}
        }
    }

    tracing::info!("Example completed");

    Ok(())
}
