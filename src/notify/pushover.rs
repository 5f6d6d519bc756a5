//! Docs: <https://pushover.net/api>

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::{Message, Notifier, NotifyError};
use crate::config::NotificationsConfig;
use crate::secrets::{SecretReference, SecretStore};

const APP_TOKEN_FIELD: &str = "app token";
const USER_KEY_FIELD: &str = "user key";
/// Pushover rejects longer messages.
const MAX_MESSAGE_CHARS: usize = 1024;

pub struct Pushover {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    user: SecretString,
}

impl Pushover {
    /// Reads the app token and user key from `op://<vault>/<pushover_item>/...`.
    pub async fn resolve(
        store: &dyn SecretStore,
        vault: &str,
        config: &NotificationsConfig,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let token = store
            .read(&SecretReference::new(vault, &config.pushover_item, APP_TOKEN_FIELD))
            .await?;
        let user = store
            .read(&SecretReference::new(vault, &config.pushover_item, USER_KEY_FIELD))
            .await?;

        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: config.pushover_base_url.trim_end_matches('/').to_string(),
            token,
            user,
        })
    }
}

#[async_trait]
impl Notifier for Pushover {
    fn name(&self) -> &'static str {
        "pushover"
    }

    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        let body = fit_lines(&message.summary, MAX_MESSAGE_CHARS);
        let form = [
            ("token", self.token.expose_secret()),
            ("user", self.user.expose_secret()),
            ("title", message.subject.as_str()),
            ("message", body.as_str()),
            ("html", "1"),
        ];

        tracing::debug!(title = %message.subject, "Sending push notification");
        let response = self
            .http
            .post(format!("{}/1/messages.json", self.base_url))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Api {
                service: "Pushover",
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Keeps whole lines so no `<b>` tag is cut in half; a dropped tail becomes `…`.
fn fit_lines(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let budget = max_chars.saturating_sub(2); // "\n…"
    let mut out = String::new();
    let mut used = 0;
    for line in text.lines() {
        let cost = line.chars().count() + usize::from(!out.is_empty());
        if used + cost > budget {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
        used += cost;
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push('…');
    out
}
