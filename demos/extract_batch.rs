//! Example: Extract a batch of mailboxes and poll the first one.
//!
//! The first credential starts polling as soon as it arrives; the rest of the
//! batch is kept as history.
//!
//! # Usage
//!
//! ```bash
//! export VENDOR_API_KEY="your-card-key"
//! # Optional: quantity (1-2000) and type (outlook/hotmail)
//! export EXTRACT_COUNT="5"
//! export EXTRACT_TYPE="hotmail"
//! cargo run --example extract_batch
//! ```

use mailbox_otp::vendor::VendorClient;
use mailbox_otp::{ClientConfig, EmailType, ExtractionQuota, Session};
use std::env;

#[tokio::main]
async fn main() -> mailbox_otp::Result<()> {
    let api_key = env::var("VENDOR_API_KEY").expect("VENDOR_API_KEY environment variable required");
    let count: u32 = env::var("EXTRACT_COUNT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(1);
    let email_type: EmailType = env::var("EXTRACT_TYPE")
        .ok()
        .map(|value| value.parse())
        .transpose()?
        .unwrap_or_default();

    let config = ClientConfig::default();

    // Stock and balance first, so an empty inventory is obvious
    let vendor = VendorClient::new(&config)?;
    let stock = vendor.stock().await?;
    println!(
        "In stock: {} outlook, {} hotmail",
        stock.for_type(EmailType::Outlook), stock.for_type(EmailType::Hotmail)
    );
    println!("Balance: {}", vendor.balance(&api_key).await?);

    let quota = ExtractionQuota::new(count, email_type, api_key)?;
    let mut session = Session::new(&config)?;

    let outcome = session.extract_and_activate(&quota).await;
    println!(
        "Extracted {}/{} {} mailboxes in {} rounds ({:?})",
        outcome.credentials().len(),
        outcome.requested(),
        email_type,
        outcome.rounds(),
        outcome.elapsed()
    );
    if !outcome.is_complete() {
        println!("Extraction budget ran out, continuing with a partial batch");
    }

    for credential in session.history() {
        println!("  kept: {}", credential.email());
    }

    let Some(active) = session.active_credential() else {
        println!("Nothing to poll");
        return Ok(());
    };
    println!("Polling {}...", active.email());

    match session.wait_for_code().await {
        Some(code) => println!("Got code: {}", code),
        None => println!("Gave up after {} checks", session.snapshot().check_count),
    }

    Ok(())
}
