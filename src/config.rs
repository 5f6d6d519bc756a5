//! Configuration file parser for ~/.config/feedbin-tools/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown top-level keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feedbin::DEFAULT_API_BASE_URL;
use crate::notify::{DEFAULT_PUSHOVER_BASE_URL, DEFAULT_SENDGRID_BASE_URL};
use crate::secrets::SecretReference;
use crate::sheets::auth::DEFAULT_TOKEN_URI;
use crate::sheets::{SheetLayout, DEFAULT_SHEETS_BASE_URL};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("HOME environment variable not set")]
    NoHome,

    #[error("Invalid {key} in config file: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// Every field has a default, so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feedbin API root, without a trailing slash.
    pub api_base_url: String,

    /// Skip every state-changing call. `DRY_RUN=true` or `--dry-run` also enable this.
    pub dry_run: bool,

    pub request_timeout_secs: u64,

    /// Retries for transient failures (timeouts, 429, 5xx). 0 disables retrying.
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry.
    pub retry_base_delay_ms: u64,

    pub secrets: SecretsConfig,
    pub sheets: SheetsConfig,
    pub notifications: NotificationsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            dry_run: false,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            secrets: SecretsConfig::default(),
            sheets: SheetsConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Path or name of the 1Password CLI binary.
    pub op_binary: String,

    pub vault: String,

    /// Vault item holding the Feedbin `username` and `password` fields.
    pub feedbin_item: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            op_binary: "op".to_string(),
            vault: "Scripts".to_string(),
            feedbin_item: "Feedbin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// The id from the sheet's URL (`/spreadsheets/d/<id>/edit`).
    pub spreadsheet_id: String,

    /// Tab name inside the spreadsheet.
    pub worksheet: String,

    pub api_base_url: String,

    /// Vault item holding an OAuth `client id`, `client secret` and
    /// `refresh token`; exchanged for an access token on every sync.
    pub oauth_item: Option<String>,

    /// OAuth token endpoint used for the refresh-token exchange.
    pub token_uri: String,

    /// `op://` reference to a ready-made access token with the spreadsheets
    /// scope. Used only without `oauth_item`; `GOOGLE_SHEETS_ACCESS_TOKEN`
    /// takes precedence over both.
    pub access_token_ref: Option<String>,

    /// Column letter where the write-back block (Status, Subscription ID, Feed ID,
    /// Details) starts.
    pub status_column: String,

    /// Also write Subscribed / Backlog Unread / Suffix Added checkboxes after Details.
    pub step_checkboxes: bool,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            worksheet: "Sheet1".to_string(),
            api_base_url: DEFAULT_SHEETS_BASE_URL.to_string(),
            oauth_item: None,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            access_token_ref: None,
            status_column: "C".to_string(),
            step_checkboxes: false,
        }
    }
}

/// Masks `sendgrid_api_key` in Debug output to keep it out of logs.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Send the sync report by e-mail (SendGrid).
    pub email: bool,

    /// Send the sync report as a push notification (Pushover).
    pub push: bool,

    /// SendGrid API key (alternative to SENDGRID_API_KEY env var).
    /// Env var takes precedence over config file.
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from: Option<String>,
    pub sendgrid_to: Option<String>,
    pub sendgrid_base_url: String,

    /// Vault item holding the Pushover app token and user key.
    pub pushover_item: String,
    pub pushover_base_url: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            email: false,
            push: false,
            sendgrid_api_key: None,
            sendgrid_from: None,
            sendgrid_to: None,
            sendgrid_base_url: DEFAULT_SENDGRID_BASE_URL.to_string(),
            pushover_item: "Pushover".to_string(),
            pushover_base_url: DEFAULT_PUSHOVER_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for NotificationsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationsConfig")
            .field("email", &self.email)
            .field("push", &self.push)
            .field(
                "sendgrid_api_key",
                &self.sendgrid_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sendgrid_from", &self.sendgrid_from)
            .field("sendgrid_to", &self.sendgrid_to)
            .field("sendgrid_base_url", &self.sendgrid_base_url)
            .field("pushover_item", &self.pushover_item)
            .field("pushover_base_url", &self.pushover_base_url)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "api_base_url",
        "dry_run",
        "request_timeout_secs",
        "max_retries",
        "retry_base_delay_ms",
        "secrets",
        "sheets",
        "notifications",
    ];

    /// `~/.config/feedbin-tools/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("feedbin-tools")
            .join("config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Values that would fail at run time → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), api = %config.api_base_url, "Loaded configuration");
        Ok(config)
    }

    /// Catches values that parse but would only fail halfway through a sync.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("api_base_url", &self.api_base_url),
            ("sheets.api_base_url", &self.sheets.api_base_url),
            ("sheets.token_uri", &self.sheets.token_uri),
            ("notifications.sendgrid_base_url", &self.notifications.sendgrid_base_url),
            ("notifications.pushover_base_url", &self.notifications.pushover_base_url),
        ] {
            check_http_url(key, value)?;
        }

        if self.secrets.vault.trim().is_empty() {
            return Err(invalid("secrets.vault", "must not be empty"));
        }
        if self.secrets.feedbin_item.trim().is_empty() {
            return Err(invalid("secrets.feedbin_item", "must not be empty"));
        }

        let sheets = &self.sheets;
        if sheets.spreadsheet_id.contains('/') {
            return Err(invalid(
                "sheets.spreadsheet_id",
                "expected the id from /spreadsheets/d/<id>/edit, not the whole URL",
            ));
        }
        SheetLayout::new(&sheets.status_column, sheets.step_checkboxes)
            .map_err(|e| invalid("sheets.status_column", e))?;
        if sheets.oauth_item.as_deref().is_some_and(|item| item.trim().is_empty()) {
            return Err(invalid("sheets.oauth_item", "must not be empty"));
        }
        if let Some(reference) = &sheets.access_token_ref {
            reference
                .parse::<SecretReference>()
                .map_err(|e| invalid("sheets.access_token_ref", e))?;
        }

        Ok(())
    }

    /// `DRY_RUN=true` in the environment forces dry-run mode.
    pub fn dry_run_from_env() -> bool {
        std::env::var("DRY_RUN").is_ok_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

fn invalid(key: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

fn check_http_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(value).map_err(|e| invalid(key, format!("{value:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(key, format!("{value:?} is not an http(s) URL")));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("feedbin_tools_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "https://api.feedbin.com/v2");
        assert!(!config.dry_run);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.secrets.vault, "Scripts");
        assert_eq!(config.secrets.feedbin_item, "Feedbin");
        assert_eq!(config.sheets.status_column, "C");
        assert_eq!(config.sheets.token_uri, "https://oauth2.googleapis.com/token");
        assert!(config.sheets.oauth_item.is_none());
        assert!(!config.sheets.step_checkboxes);
        assert!(!config.notifications.email);
        assert!(config.notifications.sendgrid_api_key.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedbin_tools_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_retries, 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_sections_use_defaults_for_missing() {
        let content = r#"
dry_run = true

[sheets]
spreadsheet_id = "abc123"
step_checkboxes = true
"#;
        let (dir, path) = write_config("partial", content);

        let config = Config::load(&path).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.sheets.spreadsheet_id, "abc123");
        assert!(config.sheets.step_checkboxes);
        assert_eq!(config.sheets.worksheet, "Sheet1"); // default
        assert_eq!(config.secrets.op_binary, "op"); // default section

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
api_base_url = "http://127.0.0.1:9999/v2"
request_timeout_secs = 5
max_retries = 0
retry_base_delay_ms = 10

[secrets]
op_binary = "/usr/local/bin/op"
vault = "Personal"
feedbin_item = "Feedbin API"

[sheets]
spreadsheet_id = "sheet-id"
worksheet = "RSS Feed Wish List"
oauth_item = "Google Sheets"
access_token_ref = "op://Personal/Google/token"
status_column = "D"

[notifications]
email = true
push = true
sendgrid_api_key = "SG.secret"
sendgrid_from = "bot@example.com"
sendgrid_to = "me@example.com"
pushover_item = "Pushover App"
"#;
        let (dir, path) = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_base_url, "http://127.0.0.1:9999/v2");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(10));
        assert_eq!(config.secrets.vault, "Personal");
        assert_eq!(config.sheets.worksheet, "RSS Feed Wish List");
        assert_eq!(
            config.sheets.access_token_ref.as_deref(),
            Some("op://Personal/Google/token")
        );
        assert_eq!(config.sheets.oauth_item.as_deref(), Some("Google Sheets"));
        assert_eq!(config.sheets.status_column, "D");
        assert!(config.notifications.email);
        assert_eq!(config.notifications.sendgrid_to.as_deref(), Some("me@example.com"));
        assert_eq!(config.notifications.pushover_item, "Pushover App");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "dry_run = true\ntotally_fake_key = 1\n");
        let config = Config::load(&path).unwrap();
        assert!(config.dry_run);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "max_retries = \"three\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_bad_status_column_rejected_at_load() {
        let (dir, path) = write_config("bad_column", "[sheets]\nstatus_column = \"3\"\n");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "sheets.status_column", .. }));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_checkbox_block_past_read_columns_rejected() {
        let (dir, path) = write_config(
            "block_past_z",
            "[sheets]\nstatus_column = \"W\"\nstep_checkboxes = true\n",
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("sheets.status_column"));
        assert!(err.to_string().contains("past column Z"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_rejects_feedbin_specific_mistakes() {
        let mut config = Config::default();
        config.sheets.spreadsheet_id =
            "https://docs.google.com/spreadsheets/d/abc/edit".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "sheets.spreadsheet_id", .. })
        ));

        let mut config = Config::default();
        config.api_base_url = "api.feedbin.com/v2".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "api_base_url", .. })
        ));

        let mut config = Config::default();
        config.sheets.token_uri = "ftp://oauth2.example/token".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "sheets.token_uri", .. })
        ));

        let mut config = Config::default();
        config.sheets.access_token_ref = Some("Personal/Google/token".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "sheets.access_token_ref", .. })
        ));

        let mut config = Config::default();
        config.sheets.oauth_item = Some(" ".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "sheets.oauth_item", .. })
        ));

        let mut config = Config::default();
        config.secrets.feedbin_item = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "secrets.feedbin_item", .. })
        ));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_debug_masks_sendgrid_key() {
        let mut config = Config::default();
        config.notifications.sendgrid_api_key = Some("SG.super-secret-key".to_string());

        let debug_output = format!("{:?}", config);
        assert!(
            !debug_output.contains("SG.super-secret-key"),
            "Debug output should not contain the API key"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_debug_shows_none_when_no_sendgrid_key() {
        let debug_output = format!("{:?}", Config::default());
        assert!(!debug_output.contains("[REDACTED]"));
    }
}
