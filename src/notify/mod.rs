//! E-mail and push notifications for run summaries.
//!
//! Delivery is best effort: a failed send is logged and never fails the run
//! that produced the summary.

mod pushover;
mod sendgrid;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::secrets::{SecretError, SecretStore};

pub use pushover::Pushover;
pub use sendgrid::SendGrid;

pub const DEFAULT_SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
pub const DEFAULT_PUSHOVER_BASE_URL: &str = "https://api.pushover.net";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Missing setting: {0}")]
    Missing(&'static str),

    #[error("Secret lookup failed: {0}")]
    Secret(#[from] SecretError),
}

/// One notification in the two shapes channels accept.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub subject: String,

    /// Full HTML fragment for e-mail.
    pub html: String,

    /// A few lines for push channels, marked up with `<b>` at most.
    pub summary: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &Message) -> Result<(), NotifyError>;
}

/// Every configured channel.
pub struct Notifications {
    notifiers: Vec<Box<dyn Notifier>>,
    dry_run: bool,
}

impl Notifications {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>, dry_run: bool) -> Self {
        Self { notifiers, dry_run }
    }

    /// Builds the channels enabled in `[notifications]`.
    ///
    /// A channel whose settings or secrets are missing is skipped with a warning.
    pub async fn from_config(config: &Config, store: &dyn SecretStore, dry_run: bool) -> Self {
        let settings = &config.notifications;
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

        if settings.email {
            match SendGrid::from_config(settings, config.request_timeout()) {
                Ok(sendgrid) => notifiers.push(Box::new(sendgrid)),
                Err(e) => tracing::warn!(error = %e, "E-mail notifications disabled"),
            }
        }

        if settings.push {
            match Pushover::resolve(store, &config.secrets.vault, settings, config.request_timeout())
                .await
            {
                Ok(pushover) => notifiers.push(Box::new(pushover)),
                Err(e) => tracing::warn!(error = %e, "Push notifications disabled"),
            }
        }

        Self::new(notifiers, dry_run)
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Sends to every channel in turn. Returns how many sends succeeded.
    pub async fn notify(&self, message: &Message) -> usize {
        let subject = &message.subject;
        let mut sent = 0;
        for notifier in &self.notifiers {
            if self.dry_run {
                tracing::info!(channel = notifier.name(), subject = %subject, "Dry run: skipping notification");
                continue;
            }
            match notifier.send(message).await {
                Ok(()) => {
                    tracing::info!(channel = notifier.name(), "Notification sent");
                    sent += 1;
                }
                Err(e) => {
                    tracing::error!(channel = notifier.name(), subject = %subject, error = %e, "Notification failed");
                }
            }
        }
        sent
    }
}
