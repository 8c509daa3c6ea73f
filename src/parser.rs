//! Internal module for decoding remote responses.
//!
//! Mail listings and vendor batches are decoded leniently: a missing optional
//! field falls back to a placeholder, and a malformed vendor line is logged and
//! skipped rather than failing the whole batch.

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::mail::{BodyType, Folder, Message, MessageBody};
use crate::vendor::StockReport;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Subject used when the resource omits one.
pub(crate) const NO_SUBJECT: &str = "(no subject)";
/// Sender used when the resource omits one.
pub(crate) const UNKNOWN_SENDER: &str = "unknown sender";

#[derive(Debug, Deserialize)]
struct GraphMessageList {
    #[serde(default)]
    value: Vec<GraphMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: Option<GraphRecipient>,
    #[serde(default)]
    body_preview: Option<String>,
    #[serde(default)]
    received_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    #[serde(default)]
    email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
struct GraphEmailAddress {
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphMessageWithBody {
    body: GraphBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody {
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    num: f64,
}

/// Decodes a folder listing and tags every message with `folder`.
pub(crate) fn parse_message_list(body: &str, folder: Folder) -> Result<Vec<Message>> {
    let list: GraphMessageList =
        serde_json::from_str(body).map_err(Error::decode("folder listing"))?;

    Ok(list
        .value
        .into_iter()
        .map(|message| normalize_message(message, folder))
        .collect())
}

fn normalize_message(message: GraphMessage, folder: Folder) -> Message {
    let subject = message
        .subject
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    let from = message
        .from
        .and_then(|from| from.email_address)
        .and_then(|address| address.address)
        .filter(|address| !address.is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    let received_date_time = message.received_date_time.unwrap_or_default();
    let received_at = parse_received_at(&received_date_time);

    Message {
        id: message.id,
        subject,
        from,
        body_preview: message.body_preview.unwrap_or_default(),
        received_date_time,
        received_at,
        folder,
        body: None,
        body_type: None,
    }
}

fn parse_received_at(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }

    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(e) => {
            debug!(raw, error = %e, "Unparsable receivedDateTime, keeping raw value");
            None
        }
    }
}

/// Decodes a single-message response into its body and body type.
pub(crate) fn parse_message_body(body: &str) -> Result<MessageBody> {
    let message: GraphMessageWithBody =
        serde_json::from_str(body).map_err(Error::decode("message body"))?;

    Ok(MessageBody {
        body_type: BodyType::from_content_type(&message.body.content_type),
        body: message.body.content,
    })
}

/// Parses a newline-delimited vendor batch into credentials, skipping malformed lines.
pub(crate) fn parse_vendor_batch(text: &str) -> Vec<Credential> {
    let mut discarded = 0usize;

    let credentials: Vec<Credential> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = Credential::parse_line(line);
            if parsed.is_none() {
                discarded += 1;
            }
            parsed
        })
        .collect();

    if discarded > 0 {
        warn!(
            discarded,
            kept = credentials.len(), "Skipped malformed vendor records"
        );
    }

    credentials
}

/// Decodes the vendor stock response (`{"outlook": 12, "hotmail": 3}`).
pub(crate) fn parse_stock(body: &str) -> Result<StockReport> {
    let counts: BTreeMap<String, u64> =
        serde_json::from_str(body).map_err(Error::decode("vendor stock"))?;
    Ok(StockReport { counts })
}

/// Decodes the vendor balance response (`{"num": 42}`).
pub(crate) fn parse_balance(body: &str) -> Result<f64> {
    let balance: BalanceResponse =
        serde_json::from_str(body).map_err(Error::decode("vendor balance"))?;
    Ok(balance.num)
}
