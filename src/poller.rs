//! Recurring multi-folder mailbox scans that stop on the first verification code.
//!
//! A [`MailboxPoller`] owns one background task per active credential:
//!
//! ```text
//! idle --start--> receiving --code found--> received
//!                     |--scan budget spent--> failed
//!                     `--stop------------------> idle
//! ```
//!
//! The first scan runs immediately, later scans every
//! [`PollingConfig::interval`]. Each scan lists the configured folders one
//! after another; a folder that fails contributes no messages. The code
//! extractor always sees every freshly fetched message, while observers decide
//! which folder to display with [`MailboxPoller::select_folder`].
//!
//! Stopping is cooperative. A request that is already in flight completes, but
//! its results are discarded.
//!
//! # Example
//!
//! ```no_run
//! use mailbox_otp::mail::MailResourceClient;
//! use mailbox_otp::poller::MailboxPoller;
//! use mailbox_otp::{ClientConfig, CodeExtractor, Credential};
//! use std::sync::Arc;
//!
//! # async fn example() -> mailbox_otp::Result<()> {
//! let config = ClientConfig::default();
//! let resource = MailResourceClient::new(&config)?;
//! let credential = Credential::new("user@outlook.com", "pw", "refresh-token", "client-id")?;
//!
//! let poller = MailboxPoller::start(
//!     resource,
//!     credential,
//!     config.polling.clone(),
//!     Arc::new(CodeExtractor::new()),
//! );
//!
//! if let Some(code) = poller.wait_for_code().await {
//!     println!("code: {code}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::PollingConfig;
use crate::credential::Credential;
use crate::mail::{Folder, MailResource, Message};
use crate::matcher::CodeExtractor;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn, Instrument};

/// Lifecycle of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// No loop is running.
    #[default]
    Idle,
    /// Scans are being scheduled.
    Receiving,
    /// A code was found; terminal.
    Received,
    /// The scan budget ran out without a code; terminal.
    Failed,
}

impl PollState {
    /// `true` for [`PollState::Received`] and [`PollState::Failed`].
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, PollState::Received | PollState::Failed)
    }
}

/// Observable state of a polling session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    /// Current lifecycle state.
    pub state: PollState,
    /// Number of completed scans.
    pub check_count: u32,
    /// The extracted code, once found.
    pub code_found: Option<String>,
    /// Folder currently selected for display.
    pub display_folder: Folder,
    /// Every message returned by the latest scan, tagged with its folder.
    pub messages: Vec<Message>,
}

impl PollSnapshot {
    /// Messages of the latest scan that belong to the displayed folder.
    #[must_use]
    pub fn visible_messages(&self) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|message| message.folder == self.display_folder)
            .collect()
    }
}

/// Handle to a running polling loop.
///
/// Dropping the handle stops the loop.
#[derive(Debug)]
pub struct MailboxPoller {
    credential: Credential,
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    stop: watch::Sender<bool>,
}

impl MailboxPoller {
    /// Starts polling the mailbox behind `credential`.
    ///
    /// The state is `receiving` when this returns; the first scan is already
    /// scheduled. Must be called from within a tokio runtime.
    #[instrument(
        name = "MailboxPoller::start",
        skip_all,
        fields(email = %credential.email(), folders = config.folders.len())
    )]
    pub fn start<M>(
        resource: M,
        credential: Credential,
        config: PollingConfig,
        extractor: Arc<CodeExtractor>,
    ) -> Self
    where
        M: MailResource + 'static,
    {
        let (snapshot, _) = watch::channel(PollSnapshot {
            state: PollState::Receiving,
            ..PollSnapshot::default()
        });
        let snapshot = Arc::new(snapshot);
        let (stop, stop_rx) = watch::channel(false);

        let task = PollTask {
            resource,
            credential: credential.clone(),
            config,
            extractor,
            snapshot: Arc::clone(&snapshot),
            stop: stop_rx,
        };
        tokio::spawn(task.run().in_current_span());

        info!("Polling started");

        Self {
            credential,
            snapshot,
            stop,
        }
    }

    /// The credential this loop polls.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Current state, check count, code and messages.
    #[must_use]
    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribes to snapshot updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot.subscribe()
    }

    /// Switches the displayed folder; the visible list follows immediately.
    pub fn select_folder(&self, folder: Folder) {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.display_folder == folder {
                return false;
            }
            snapshot.display_folder = folder;
            true
        });
    }

    /// Applies `update` to the message with `id` in the latest scan.
    ///
    /// Returns `false` if no such message is listed.
    pub(crate) fn update_message(&self, id: &str, update: impl FnOnce(&mut Message)) -> bool {
        self.snapshot.send_if_modified(|snapshot| {
            let Some(message) = snapshot.messages.iter_mut().find(|m| m.id == id) else {
                return false;
            };
            update(message);
            true
        })
    }

    /// Waits until the loop reaches a terminal state.
    ///
    /// Returns the code on `received`, `None` on `failed` or if the loop was stopped.
    pub async fn wait_for_code(&self) -> Option<String> {
        let mut updates = self.snapshot.subscribe();
        let snapshot = updates
            .wait_for(|snapshot| snapshot.state != PollState::Receiving)
            .await
            .ok()?;
        snapshot.code_found.clone()
    }

    /// Stops scheduling scans. A receiving loop returns to `idle`.
    pub fn stop(&self) {
        if self.stop.send_replace(true) {
            return;
        }

        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.state != PollState::Receiving {
                return false;
            }
            snapshot.state = PollState::Idle;
            true
        });
        debug!(email = %self.credential.email(), "Polling stopped");
    }
}

impl Drop for MailboxPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PollTask<M> {
    resource: M,
    credential: Credential,
    config: PollingConfig,
    extractor: Arc<CodeExtractor>,
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    stop: watch::Receiver<bool>,
}

impl<M: MailResource> PollTask<M> {
    async fn run(mut self) {
        let mut scans = 0u32;

        loop {
            if self.stopped() {
                return;
            }

            let messages = self.scan().await;
            scans += 1;

            // Results of a scan that outlived its loop are dropped.
            if self.stopped() {
                debug!(scan = scans, "Discarding scan after stop");
                return;
            }

            let code = self.extractor.extract(&messages);
            debug!(
                scan = scans,
                messages = messages.len(), code_found = code.is_some(), "Scan complete"
            );

            if !self.commit(scans, messages, code) {
                return;
            }

            if self.config.max_scans.is_some_and(|max| scans >= max) {
                warn!(scans, "Scan budget spent without a code");
                self.finish(PollState::Failed);
                return;
            }

            tokio::select! {
                changed = self.stop.changed() => {
                    if changed.is_err() || *self.stop.borrow() {
                        return;
                    }
                }
                () = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    fn stopped(&self) -> bool {
        *self.stop.borrow()
    }

    async fn scan(&self) -> Vec<Message> {
        let grant = self.credential.grant();
        let mut all = Vec::new();

        for &folder in &self.config.folders {
            match self.resource.list_folder(grant, folder).await {
                Ok(messages) => {
                    for mut message in messages {
                        message.folder = folder;
                        all.push(message);
                    }
                }
                Err(e) => warn!(
                    folder = %folder,
                    category = %e.category(),
                    error = %e,
                    "Folder scan failed, treating as empty"
                ),
            }
        }

        all
    }

    /// Publishes one scan. Returns `false` once the loop must end.
    fn commit(&self, scans: u32, messages: Vec<Message>, code: Option<String>) -> bool {
        let mut keep_going = true;

        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.state != PollState::Receiving {
                keep_going = false;
                return false;
            }

            snapshot.check_count = scans;
            snapshot.messages = messages;

            if let Some(code) = code {
                info!(code = %code, scans, "Verification code received");
                snapshot.code_found = Some(code);
                snapshot.state = PollState::Received;
                keep_going = false;
            }
            true
        });

        keep_going
    }

    fn finish(&self, state: PollState) {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.state != PollState::Receiving {
                return false;
            }
            snapshot.state = state;
            true
        });
    }
}
