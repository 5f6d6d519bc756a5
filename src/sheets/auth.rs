//! Access tokens for the Sheets API.
//!
//! Docs: <https://developers.google.com/identity/protocols/oauth2/native-app#offline>
//!
//! Resolution order: `GOOGLE_SHEETS_ACCESS_TOKEN`, then a refresh-token
//! exchange with the OAuth client kept in `sheets.oauth_item`, then the
//! ready-made token behind `sheets.access_token_ref`. Only the exchange keeps
//! working unattended once an access token's hour is up.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::SheetError;
use crate::config::SheetsConfig;
use crate::secrets::{SecretReference, SecretStore};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const TOKEN_ENV: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";
const CLIENT_ID_FIELD: &str = "client id";
const CLIENT_SECRET_FIELD: &str = "client secret";
const REFRESH_TOKEN_FIELD: &str = "refresh token";

/// An OAuth client and the long-lived refresh token it was granted.
pub struct RefreshCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
}

impl RefreshCredentials {
    /// Reads the three fields from `op://<vault>/<item>/...`.
    pub async fn resolve(
        store: &dyn SecretStore,
        vault: &str,
        item: &str,
    ) -> Result<Self, SheetError> {
        let client_id = store
            .read(&SecretReference::new(vault, item, CLIENT_ID_FIELD))
            .await?;
        let client_secret = store
            .read(&SecretReference::new(vault, item, CLIENT_SECRET_FIELD))
            .await?;
        let refresh_token = store
            .read(&SecretReference::new(vault, item, REFRESH_TOKEN_FIELD))
            .await?;

        Ok(Self {
            client_id: client_id.expose_secret().to_string(),
            client_secret,
            refresh_token,
        })
    }
}

impl std::fmt::Debug for RefreshCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Trades the refresh token for a fresh access token.
///
/// A revoked or expired grant (`invalid_grant`) is [`SheetError::AuthExpired`];
/// any other rejection is [`SheetError::RefreshFailed`].
pub async fn exchange_refresh_token(
    http: &reqwest::Client,
    token_uri: &str,
    credentials: &RefreshCredentials,
) -> Result<SecretString, SheetError> {
    let form = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.expose_secret()),
        ("refresh_token", credentials.refresh_token.expose_secret()),
        ("grant_type", "refresh_token"),
    ];

    tracing::debug!(token_uri = %token_uri, "Exchanging refresh token");
    let response = http.post(token_uri).form(&form).send().await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(map_refresh_error(status.as_u16(), &body));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| SheetError::RefreshFailed(format!("Unexpected token response: {e}")))?;
    tracing::info!(
        expires_in = token.expires_in.unwrap_or(3600),
        "Got Sheets access token"
    );
    Ok(SecretString::from(token.access_token))
}

fn map_refresh_error(status: u16, body: &str) -> SheetError {
    if (status == 400 || status == 401) && body.to_lowercase().contains("invalid_grant") {
        return SheetError::AuthExpired;
    }
    SheetError::RefreshFailed(format!("HTTP {status}: {body}"))
}

/// Returns a bearer token for the run, exchanging the refresh token when one is configured.
pub async fn access_token(
    store: &dyn SecretStore,
    vault: &str,
    config: &SheetsConfig,
    timeout: Duration,
) -> Result<SecretString, SheetError> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            tracing::debug!("Using Sheets access token from the environment");
            return Ok(SecretString::from(token.trim().to_string()));
        }
    }

    if let Some(item) = config.oauth_item.as_deref() {
        let credentials = RefreshCredentials::resolve(store, vault, item).await?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        return exchange_refresh_token(&http, &config.token_uri, &credentials).await;
    }

    let reference: SecretReference = config
        .access_token_ref
        .as_deref()
        .ok_or(SheetError::MissingToken)?
        .parse()?;
    Ok(store.read(&reference).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Answers every reference with its item and field, spaces turned into dashes.
    struct FieldEcho;

    #[async_trait]
    impl SecretStore for FieldEcho {
        async fn read(&self, reference: &SecretReference) -> Result<SecretString, SecretError> {
            Ok(SecretString::from(
                format!("{}-{}", reference.item, reference.field).replace(' ', "-"),
            ))
        }
    }

    fn config(token_uri: &str) -> SheetsConfig {
        SheetsConfig {
            oauth_item: Some("Sheets".to_string()),
            token_uri: token_uri.to_string(),
            ..SheetsConfig::default()
        }
    }

    fn env_token_set() -> bool {
        std::env::var(TOKEN_ENV).is_ok()
    }

    #[tokio::test]
    async fn test_refresh_token_is_exchanged() {
        if env_token_set() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=Sheets-client-id"))
            .and(body_string_contains("client_secret=Sheets-client-secret"))
            .and(body_string_contains("refresh_token=Sheets-refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = access_token(
            &FieldEcho,
            "Scripts",
            &config(&format!("{}/token", server.uri())),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(token.expose_secret(), "ya29.fresh");
    }

    #[tokio::test]
    async fn test_revoked_grant_is_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let credentials = RefreshCredentials::resolve(&FieldEcho, "Scripts", "Sheets")
            .await
            .unwrap();
        let err = exchange_refresh_token(&reqwest::Client::new(), &server.uri(), &credentials)
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::AuthExpired));
    }

    #[tokio::test]
    async fn test_other_rejections_keep_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_client"}"#))
            .mount(&server)
            .await;

        let credentials = RefreshCredentials::resolve(&FieldEcho, "Scripts", "Sheets")
            .await
            .unwrap();
        let err = exchange_refresh_token(&reqwest::Client::new(), &server.uri(), &credentials)
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::RefreshFailed(ref m) if m.contains("invalid_client")));
    }

    #[tokio::test]
    async fn test_response_without_access_token_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token_type": "Bearer" })))
            .mount(&server)
            .await;

        let credentials = RefreshCredentials::resolve(&FieldEcho, "Scripts", "Sheets")
            .await
            .unwrap();
        let err = exchange_refresh_token(&reqwest::Client::new(), &server.uri(), &credentials)
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_falls_back_to_stored_access_token() {
        if env_token_set() {
            return;
        }
        let config = SheetsConfig {
            access_token_ref: Some("op://Scripts/Google/access token".to_string()),
            ..SheetsConfig::default()
        };
        let token = access_token(&FieldEcho, "Scripts", &config, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(token.expose_secret(), "Google-access-token");

        let err = access_token(&FieldEcho, "Scripts", &SheetsConfig::default(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::MissingToken));
    }

    #[tokio::test]
    async fn test_debug_redacts_secrets() {
        let credentials = RefreshCredentials::resolve(&FieldEcho, "Scripts", "Sheets")
            .await
            .unwrap();
        let output = format!("{credentials:?}");
        assert!(output.contains("Sheets-client-id"));
        assert!(!output.contains("refresh-token"));
        assert!(!output.contains("client-secret"));
    }
}
