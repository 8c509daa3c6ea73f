//! Vendor inventory access and quota-driven credential extraction.
//!
//! [`VendorExtractionClient::extract`] pulls exactly the requested number of
//! credentials from the vendor. Each round fans out up to
//! [`ExtractionConfig::max_concurrency`] parallel requests, merges whatever
//! usable records come back, and never keeps more than what is still missing.
//! Failed requests count as empty answers. Rounds repeat until the quota is met
//! or the round/time budget runs out, in which case the partial result is
//! returned and [`ExtractionOutcome::is_complete`] is `false`.
//!
//! # Example
//!
//! ```no_run
//! use mailbox_otp::vendor::VendorExtractionClient;
//! use mailbox_otp::{ClientConfig, EmailType, ExtractionQuota};
//!
//! # async fn example() -> mailbox_otp::Result<()> {
//! let extractor = VendorExtractionClient::new(&ClientConfig::default())?;
//! let quota = ExtractionQuota::new(5, EmailType::Outlook, "api-key")?;
//!
//! let outcome = extractor.extract(&quota).await;
//! println!("{} of {} credentials", outcome.credentials().len(), outcome.requested());
//! # Ok(())
//! # }
//! ```

use crate::config::{ClientConfig, ExtractionConfig};
use crate::connection;
use crate::credential::{Credential, EmailType, ExtractionQuota};
use crate::error::{Error, Result};
use crate::parser;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Source of raw credential batches.
#[async_trait]
pub trait VendorInventory: Send + Sync {
    /// Requests `quantity` records of `email_type`; returns the raw newline-delimited body.
    async fn fetch_batch(
        &self,
        quantity: u32,
        email_type: EmailType,
        api_key: &str,
    ) -> Result<String>;
}

#[async_trait]
impl<V: VendorInventory + ?Sized> VendorInventory for Arc<V> {
    async fn fetch_batch(
        &self,
        quantity: u32,
        email_type: EmailType,
        api_key: &str,
    ) -> Result<String> {
        (**self).fetch_batch(quantity, email_type, api_key).await
    }
}

/// Available mailbox counts per type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockReport {
    pub(crate) counts: BTreeMap<String, u64>,
}

impl StockReport {
    /// Count for a vendor type name; unknown names report zero.
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Count for a mailbox type.
    #[must_use]
    pub fn for_type(&self, email_type: EmailType) -> u64 {
        self.get(email_type.as_str())
    }

    /// Iterates over every reported type and count.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

/// HTTP client for the vendor inventory endpoints.
#[derive(Debug, Clone)]
pub struct VendorClient {
    http: reqwest::Client,
    base_url: String,
}

impl VendorClient {
    /// Creates a vendor client from the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            http: connection::build_http_client(config)?,
            base_url: config.endpoints.vendor_base_url.clone(),
        })
    }

    /// Queries how many mailboxes of each type are in stock.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status or a malformed body.
    #[instrument(name = "VendorClient::stock", skip(self))]
    pub async fn stock(&self) -> Result<StockReport> {
        let body = self.get_text("stock", "kucun", &[]).await?;
        let report = parser::parse_stock(&body)?;
        debug!(?report, "Stock retrieved");
        Ok(report)
    }

    /// Queries the remaining balance for `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingParameter`] for an empty key, otherwise an error on
    /// transport failure, non-success status or a malformed body.
    #[instrument(name = "VendorClient::balance", skip_all)]
    pub async fn balance(&self, api_key: &str) -> Result<f64> {
        if api_key.trim().is_empty() {
            return Err(Error::MissingParameter { name: "apiKey" });
        }

        let body = self.get_text("balance", "yue", &[("card", api_key)]).await?;
        parser::parse_balance(&body)
    }

    async fn get_text(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(Error::network(operation))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::VendorStatus {
                operation,
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(Error::network(operation))
    }
}

#[async_trait]
impl VendorInventory for VendorClient {
    #[instrument(
        name = "VendorClient::fetch_batch",
        skip(self, api_key),
        fields(email_type = %email_type)
    )]
    async fn fetch_batch(
        &self,
        quantity: u32,
        email_type: EmailType,
        api_key: &str,
    ) -> Result<String> {
        let quantity = quantity.to_string();
        self.get_text(
            "extraction",
            "huoqu",
            &[
                ("shuliang", quantity.as_str()),
                ("leixing", email_type.as_str()),
                ("card", api_key),
            ],
        )
        .await
    }
}

/// Result of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    credentials: Vec<Credential>,
    requested: u32,
    rounds: u32,
    elapsed: Duration,
}

impl ExtractionOutcome {
    /// `true` when exactly the requested number of credentials was collected.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.credentials.len() == self.requested as usize
    }

    /// All collected credentials, in the order they were received.
    #[must_use]
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    /// Consumes the outcome and returns the credentials.
    #[must_use]
    pub fn into_credentials(self) -> Vec<Credential> {
        self.credentials
    }

    /// The credential that drives polling: the first one received.
    #[must_use]
    pub fn active(&self) -> Option<&Credential> {
        self.credentials.first()
    }

    /// Everything after the active credential.
    #[must_use]
    pub fn history(&self) -> &[Credential] {
        self.credentials.get(1..).unwrap_or_default()
    }

    /// The quota that was requested.
    #[must_use]
    pub fn requested(&self) -> u32 {
        self.requested
    }

    /// Rounds issued.
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Wall-clock time spent.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Splits the outstanding count across parallel requests.
///
/// Returns `(concurrency, per_request)` with `concurrency = min(max, remaining)`
/// and `per_request = ceil(remaining / concurrency)`.
pub(crate) fn plan_round(remaining: u32, max_concurrency: u32) -> (u32, u32) {
    let concurrency = max_concurrency.min(remaining).max(1);
    (concurrency, remaining.div_ceil(concurrency))
}

/// Quota-driven, bounded-concurrency credential extraction.
#[derive(Debug, Clone)]
pub struct VendorExtractionClient<V = VendorClient> {
    inventory: V,
    config: ExtractionConfig,
}

impl VendorExtractionClient<VendorClient> {
    /// Creates an extractor backed by the HTTP vendor client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_inventory(
            VendorClient::new(config)?,
            config.extraction.clone(),
        ))
    }
}

impl<V: VendorInventory> VendorExtractionClient<V> {
    /// Creates an extractor over a custom inventory.
    #[must_use]
    pub fn with_inventory(inventory: V, config: ExtractionConfig) -> Self {
        Self { inventory, config }
    }

    /// Returns the underlying inventory.
    #[must_use]
    pub fn inventory(&self) -> &V {
        &self.inventory
    }

    /// Extracts `quota.count()` credentials.
    pub async fn extract(&self, quota: &ExtractionQuota) -> ExtractionOutcome {
        self.run(quota, None).await
    }

    /// Extracts credentials and sends the first one through `activate` as soon as
    /// it arrives, while the rest of the quota is still being collected.
    pub async fn extract_with_activation(
        &self,
        quota: &ExtractionQuota,
        activate: oneshot::Sender<Credential>,
    ) -> ExtractionOutcome {
        self.run(quota, Some(activate)).await
    }

    #[instrument(
        name = "VendorExtractionClient::extract",
        skip_all,
        fields(requested = quota.count(), email_type = %quota.email_type())
    )]
    async fn run(
        &self,
        quota: &ExtractionQuota,
        mut activate: Option<oneshot::Sender<Credential>>,
    ) -> ExtractionOutcome {
        let requested = quota.count();
        let started = Instant::now();
        let mut credentials: Vec<Credential> = Vec::with_capacity(requested as usize);
        let mut rounds = 0u32;

        while credentials.len() < requested as usize {
            if self.budget_spent(rounds, started) {
                warn!(
                    rounds,
                    extracted = credentials.len(),
                    requested,
                    "Extraction budget exhausted, returning partial result"
                );
                break;
            }

            rounds += 1;
            let remaining = requested - u32::try_from(credentials.len()).unwrap_or(requested);
            let (concurrency, per_request) = plan_round(remaining, self.config.max_concurrency);

            debug!(
                round = rounds,
                remaining, concurrency, per_request, "Starting extraction round"
            );

            let requests = (0..concurrency).map(|_| self.request_batch(per_request, quota));
            let mut batch: Vec<Credential> =
                join_all(requests).await.into_iter().flatten().collect();
            batch.truncate(remaining as usize);

            if let Some(first) = batch.first() {
                if let Some(sender) = activate.take() {
                    info!(email = %first.email(), "First credential available");
                    if sender.send(first.clone()).is_err() {
                        debug!("Activation receiver dropped");
                    }
                }
            }

            credentials.extend(batch);
            info!(
                round = rounds,
                extracted = credentials.len(), requested, "Extraction progress"
            );

            if credentials.len() < requested as usize {
                tokio::time::sleep(self.config.round_delay).await;
            }
        }

        ExtractionOutcome {
            credentials,
            requested,
            rounds,
            elapsed: started.elapsed(),
        }
    }

    fn budget_spent(&self, rounds: u32, started: Instant) -> bool {
        let rounds_spent = self.config.max_rounds.is_some_and(|max| rounds >= max);
        let time_spent = self
            .config
            .max_elapsed
            .is_some_and(|max| started.elapsed() >= max);
        rounds_spent || time_spent
    }

    async fn request_batch(&self, quantity: u32, quota: &ExtractionQuota) -> Vec<Credential> {
        match self
            .inventory
            .fetch_batch(quantity, quota.email_type(), quota.api_key())
            .await
        {
            Ok(text) => parser::parse_vendor_batch(&text),
            Err(e) => {
                warn!(error = %e, quantity, "Vendor request failed, counting as empty");
                Vec::new()
            }
        }
    }
}
