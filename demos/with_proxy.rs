//! Example: Route every request through a SOCKS5 proxy.
//!
//! Token exchange, mail listing and vendor calls all share one HTTP client,
//! so the proxy applies to each of them.
//!
//! # Usage
//!
//! ```bash
//! export MAILBOX_RECORD="user@outlook.com----password----refresh-token----client-id"
//! export PROXY_HOST="proxy.example.com"
//! export PROXY_PORT="1080"
//! # Optional: for authenticated proxies
//! export PROXY_USER="username"
//! export PROXY_PASS="password"
//!
//! cargo run --example with_proxy
//! ```

use mailbox_otp::{ClientConfig, Credential, Folder, MailResource, MailResourceClient, Socks5Proxy};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> mailbox_otp::Result<()> {
    let record = env::var("MAILBOX_RECORD").expect("MAILBOX_RECORD environment variable required");
    let credential =
        Credential::parse_line(&record).expect("MAILBOX_RECORD must be a vendor record");

    // Proxy configuration
    let proxy_host = env::var("PROXY_HOST").expect("PROXY_HOST environment variable required");
    let proxy_port: u16 = env::var("PROXY_PORT")
        .expect("PROXY_PORT environment variable required")
        .parse()
        .expect("PROXY_PORT must be a valid port number");

    // Create proxy (with optional authentication)
    let proxy = match (env::var("PROXY_USER").ok(), env::var("PROXY_PASS").ok()) {
        (Some(user), Some(pass)) => Socks5Proxy::with_auth(&proxy_host, proxy_port, user, pass),
        _ => Socks5Proxy::new(&proxy_host, proxy_port),
    };
    println!("Using SOCKS5 proxy {}", proxy);

    // Proxied requests get more headroom
    let config = ClientConfig::builder()
        .proxy(proxy)
        .request_timeout(Duration::from_secs(60))
        .build()?;

    let client = MailResourceClient::new(&config)?;

    for folder in [Folder::Inbox, Folder::Junk] {
        let messages = client.list_folder(credential.grant(), folder).await?;
        println!("\n{} ({} messages)", folder, messages.len());
        for message in messages.iter().take(5) {
            println!(
                "  {} | {} | {}",
                message.received_date_time, message.from, message.subject
            );
        }
    }

    Ok(())
}
