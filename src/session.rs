//! Single active polling session per coordinator.
//!
//! [`Session`] owns the active credential and its poller. Replacing the
//! credential is one step: the old loop is stopped before the new one starts,
//! so at most one loop polls on behalf of this session at any time.

use crate::config::{ClientConfig, PollingConfig};
use crate::credential::{Credential, ExtractionQuota};
use crate::error::{Error, Result};
use crate::mail::{Folder, MailResource, MailResourceClient, MessageBody};
use crate::matcher::CodeExtractor;
use crate::poller::{MailboxPoller, PollSnapshot};
use crate::vendor::{ExtractionOutcome, VendorClient, VendorExtractionClient, VendorInventory};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{info, instrument};

/// Coordinates extraction, activation and polling for one user.
///
/// # Example
///
/// ```no_run
/// use mailbox_otp::{ClientConfig, EmailType, ExtractionQuota, Session};
///
/// # async fn example() -> mailbox_otp::Result<()> {
/// let mut session = Session::new(&ClientConfig::default())?;
/// let quota = ExtractionQuota::new(3, EmailType::Outlook, "api-key")?;
///
/// let outcome = session.extract_and_activate(&quota).await;
/// println!("extracted {}/{}", outcome.credentials().len(), outcome.requested());
///
/// if let Some(code) = session.wait_for_code().await {
///     println!("code: {code}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Session<M = MailResourceClient, V = VendorClient> {
    vendor: VendorExtractionClient<V>,
    active: ActiveSlot<M>,
    history: Vec<Credential>,
}

/// The fields activation touches, kept apart from the vendor so a running
/// extraction can activate its first credential.
struct ActiveSlot<M> {
    resource: Arc<M>,
    polling: PollingConfig,
    codes: Arc<CodeExtractor>,
    poller: Option<MailboxPoller>,
}

impl<M: MailResource + 'static> ActiveSlot<M> {
    fn activate(&mut self, credential: Credential) -> &MailboxPoller {
        if let Some(previous) = self.poller.take() {
            info!(previous = %previous.credential().email(), "Replacing active credential");
            previous.stop();
        }

        self.poller.insert(MailboxPoller::start(
            Arc::clone(&self.resource),
            credential,
            self.polling.clone(),
            Arc::clone(&self.codes),
        ))
    }
}

impl Session {
    /// Creates a session backed by the HTTP mail resource and vendor clients.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_parts(
            MailResourceClient::new(config)?,
            VendorExtractionClient::new(config)?,
            config.polling.clone(),
        ))
    }
}

impl<M, V> Session<M, V>
where
    M: MailResource + 'static,
    V: VendorInventory,
{
    /// Creates a session from custom parts.
    #[must_use]
    pub fn with_parts(
        resource: M,
        vendor: VendorExtractionClient<V>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            vendor,
            active: ActiveSlot {
                resource: Arc::new(resource),
                polling,
                codes: Arc::new(CodeExtractor::new()),
                poller: None,
            },
            history: Vec::new(),
        }
    }

    /// Replaces the code extractor used by future activations.
    #[must_use]
    pub fn with_code_extractor(mut self, extractor: CodeExtractor) -> Self {
        self.active.codes = Arc::new(extractor);
        self
    }

    /// Makes `credential` the active one and starts polling it.
    ///
    /// Any previous loop is stopped first; the new loop starts from `receiving`
    /// with a zero check count.
    #[instrument(name = "Session::activate", skip_all, fields(email = %credential.email()))]
    pub fn activate(&mut self, credential: Credential) -> &MailboxPoller {
        self.active.activate(credential)
    }

    /// Extracts credentials and activates the first one as soon as it arrives.
    ///
    /// The remaining credentials are kept as [`history`](Self::history). If the
    /// extraction yields nothing, the current session is left untouched.
    #[instrument(
        name = "Session::extract_and_activate",
        skip_all,
        fields(requested = quota.count())
    )]
    pub async fn extract_and_activate(&mut self, quota: &ExtractionQuota) -> ExtractionOutcome {
        let (tx, mut rx) = oneshot::channel();
        let extraction = self.vendor.extract_with_activation(quota, tx);
        tokio::pin!(extraction);

        let outcome = tokio::select! {
            biased;

            first = &mut rx => {
                if let Ok(credential) = first {
                    self.active.activate(credential);
                }
                extraction.await
            }
            outcome = &mut extraction => {
                if let Ok(credential) = rx.try_recv() {
                    self.active.activate(credential);
                }
                outcome
            }
        };

        self.history.extend(outcome.history().iter().cloned());
        outcome
    }

    /// Stops the active loop, if any, and clears the active credential.
    pub fn deactivate(&mut self) {
        if let Some(poller) = self.active.poller.take() {
            poller.stop();
        }
    }

    /// The credential currently being polled.
    #[must_use]
    pub fn active_credential(&self) -> Option<&Credential> {
        self.active.poller.as_ref().map(MailboxPoller::credential)
    }

    /// Credentials extracted alongside the active ones, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Credential] {
        &self.history
    }

    /// Current poll state; `idle` with no messages when nothing is active.
    #[must_use]
    pub fn snapshot(&self) -> PollSnapshot {
        self.active
            .poller
            .as_ref()
            .map(MailboxPoller::snapshot)
            .unwrap_or_default()
    }

    /// Subscribes to the active loop's updates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveCredential`] when nothing is being polled.
    pub fn subscribe(&self) -> Result<watch::Receiver<PollSnapshot>> {
        self.poller().map(MailboxPoller::subscribe)
    }

    /// Switches the displayed folder of the active loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveCredential`] when nothing is being polled.
    pub fn select_folder(&self, folder: Folder) -> Result<()> {
        self.poller()?.select_folder(folder);
        Ok(())
    }

    /// Waits for the active loop to finish; see [`MailboxPoller::wait_for_code`].
    pub async fn wait_for_code(&self) -> Option<String> {
        match self.active.poller.as_ref() {
            Some(poller) => poller.wait_for_code().await,
            None => None,
        }
    }

    /// Fetches the full body of a listed message and attaches it to the listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveCredential`] when nothing is being polled,
    /// [`Error::MessageNotFound`] if the latest scan does not list `message_id`,
    /// or the resource error from the fetch itself.
    #[instrument(name = "Session::fetch_body", skip(self))]
    pub async fn fetch_body(&self, message_id: &str) -> Result<MessageBody> {
        let poller = self.poller()?;

        let listed = poller
            .snapshot()
            .messages
            .iter()
            .any(|message| message.id == message_id);
        if !listed {
            return Err(Error::MessageNotFound {
                id: message_id.to_string(),
            });
        }

        let body = self
            .active
            .resource
            .fetch_body(poller.credential().grant(), message_id)
            .await?;

        // A scan may have replaced the listing while the body was in flight.
        poller.update_message(message_id, |message| {
            message.body = Some(body.body.clone());
            message.body_type = Some(body.body_type);
        });

        Ok(body)
    }

    fn poller(&self) -> Result<&MailboxPoller> {
        self.active.poller.as_ref().ok_or(Error::NoActiveCredential)
    }
}

impl<M, V> std::fmt::Debug for Session<M, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field(
                "active",
                &self.active.poller.as_ref().map(|p| p.credential().email()),
            )
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}
