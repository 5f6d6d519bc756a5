//! Docs: <https://www.twilio.com/docs/sendgrid/api-reference/mail-send/mail-send>

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;

use super::{Message, Notifier, NotifyError};
use crate::config::NotificationsConfig;

const HEADING: &str = "<h1>Script notification:</h1>";

pub struct SendGrid {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    from: String,
    to: String,
}

impl SendGrid {
    /// `SENDGRID_API_KEY`, `SENDGRID_FROM_EMAIL` and `SENDGRID_TO_EMAIL` override the config.
    pub fn from_config(config: &NotificationsConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let pick = |env: &str, configured: &Option<String>| {
            std::env::var(env)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| configured.clone())
        };

        let api_key = pick("SENDGRID_API_KEY", &config.sendgrid_api_key)
            .ok_or(NotifyError::Missing("SENDGRID_API_KEY"))?;
        let from = pick("SENDGRID_FROM_EMAIL", &config.sendgrid_from)
            .ok_or(NotifyError::Missing("SENDGRID_FROM_EMAIL"))?;
        let to = pick("SENDGRID_TO_EMAIL", &config.sendgrid_to)
            .ok_or(NotifyError::Missing("SENDGRID_TO_EMAIL"))?;

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: config.sendgrid_base_url.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
            from,
            to,
        })
    }
}

#[async_trait]
impl Notifier for SendGrid {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": self.to }] }],
            "from": { "email": self.from },
            "subject": message.subject,
            "content": [{ "type": "text/html", "value": format!("{HEADING}{}", message.html) }],
        });

        tracing::debug!(to = %self.to, subject = %message.subject, "Sending e-mail");
        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        // 202 Accepted is the only success answer
        if status != reqwest::StatusCode::ACCEPTED {
            return Err(NotifyError::Api {
                service: "SendGrid",
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sendgrid(base_url: &str) -> SendGrid {
        SendGrid {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key: SecretString::from("SG.key".to_string()),
            from: "bot@example.com".to_string(),
            to: "me@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_prefixes_heading() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer SG.key"))
            .and(body_partial_json(json!({
                "subject": "Sync done",
                "from": { "email": "bot@example.com" },
                "content": [{ "type": "text/html", "value": "<h1>Script notification:</h1><p>ok</p>" }]
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let message = Message {
            subject: "Sync done".to_string(),
            html: "<p>ok</p>".to_string(),
            summary: "<b>ok</b>".to_string(),
        };
        sendgrid(&server.uri()).send(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_accepted_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = sendgrid(&server.uri())
            .send(&Message::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Api { status: 401, .. }));
    }

    #[test]
    fn test_missing_settings() {
        if std::env::var("SENDGRID_API_KEY").is_ok() {
            return;
        }
        let err = SendGrid::from_config(&NotificationsConfig::default(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, NotifyError::Missing("SENDGRID_API_KEY")));
    }
}
