//! Example: Proper error handling with retries.
//!
//! This example demonstrates how to classify errors by category and how to
//! retry only what is retryable.
//!
//! # Usage
//!
//! ```bash
//! export MAILBOX_RECORD="user@outlook.com----password----refresh-token----client-id"
//! cargo run --example error_handling
//! ```

use mailbox_otp::{
    ClientConfig, Credential, Error, ErrorCategory, Folder, MailResource, MailResourceClient,
    Message,
};
use std::env;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// List a folder with automatic retry for transient failures
async fn list_with_retry(
    client: &MailResourceClient,
    credential: &Credential,
    folder: Folder,
) -> Result<Vec<Message>, Error> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        println!("Listing {folder} (attempt {attempt}/{MAX_RETRIES})...");

        match client.list_folder(credential.grant(), folder).await {
            Ok(messages) => return Ok(messages),
            Err(e) => {
                println!("  Error: {}", e);
                println!("  Category: {}", e.category());
                println!("  Retryable: {}", e.is_retryable());

                if !e.is_retryable() || attempt >= MAX_RETRIES {
                    return Err(e);
                }

                println!("  Retrying in {:?}...", backoff);
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
        }
    }
}

fn explain(e: &Error) {
    match e.category() {
        ErrorCategory::Validation => println!("Fix the input: {}", e),
        ErrorCategory::Auth => println!("Refresh token rejected, mailbox unusable: {}", e),
        ErrorCategory::Resource => println!("The mail service refused the request: {}", e),
        ErrorCategory::Network => println!("Network trouble, try again later: {}", e),
        ErrorCategory::Decode => println!("Unexpected response shape: {}", e),
        ErrorCategory::NotFound => println!("Nothing there: {}", e),
    }
}

#[tokio::main]
async fn main() {
    println!("mailbox-otp - Error Handling Example\n");
    println!("====================================\n");

    let record = env::var("MAILBOX_RECORD").unwrap_or_default();
    let credential = match Credential::parse_line(&record) {
        Some(credential) => credential,
        None => {
            eprintln!("MAILBOX_RECORD is missing or malformed");
            eprintln!("Expected email----password----refreshToken----clientId");
            std::process::exit(1);
        }
    };

    let client = match MailResourceClient::new(&ClientConfig::default()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("This error is NOT retryable - fix your configuration");
            std::process::exit(1);
        }
    };

    for folder in [Folder::Inbox, Folder::Junk] {
        match list_with_retry(&client, &credential, folder).await {
            Ok(messages) => println!("{}: {} messages\n", folder, messages.len()),
            Err(e) => explain(&e),
        }
    }

    // Body fetches are never retried by the client
    match client.fetch_body(credential.grant(), "does-not-exist").await {
        Ok(body) => println!("Unexpected body: {} chars", body.body.len()),
        Err(e) => explain(&e),
    }

    println!("Done!");
}
