//! Basic example: Poll a known mailbox for a verification code.
//!
//! This example demonstrates the most common use case - taking one vendor
//! record and polling its inbox and junk folders until a code shows up.
//!
//! # Usage
//!
//! ```bash
//! export MAILBOX_RECORD="user@outlook.com----password----refresh-token----client-id"
//! cargo run --example basic_otp
//! ```

use mailbox_otp::{ClientConfig, Credential, Session};
use std::env;

#[tokio::main]
async fn main() -> mailbox_otp::Result<()> {
    // Read the record from environment
    let record = env::var("MAILBOX_RECORD").expect("MAILBOX_RECORD environment variable required");
    let credential = Credential::parse_line(&record)
        .expect("MAILBOX_RECORD must be email----password----refreshToken----clientId");

    println!("Polling {}...", credential.email());

    let mut session = Session::new(&ClientConfig::default())?;
    session.activate(credential);

    println!("(Send yourself an email with a code, or press Ctrl+C to cancel)");

    // Inbox and junk are scanned every 10 seconds until a code is found
    match session.wait_for_code().await {
        Some(code) => println!("Got code: {}", code),
        None => println!("No code after {} checks", session.snapshot().check_count),
    }

    Ok(())
}
