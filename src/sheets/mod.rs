//! Spreadsheet boundary for the subscription wish list.
//!
//! - [`row`] - typed rows, header-driven parsing, write-back layout
//! - [`auth`] - access tokens, including the refresh-token exchange
//! - [`google`] - Google Sheets v4 values API
//! - [`memory`] - in-process worksheet for offline runs and tests

pub mod auth;
pub mod google;
pub mod memory;
pub mod row;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::secrets::SecretError;

pub use google::GoogleWorksheet;
pub use memory::MemoryWorksheet;
pub use row::{parse_rows, ParsedRows, Row, RowParseError, SheetLayout, Status, Step};

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets access token expired or revoked")]
    AuthExpired,

    #[error("Sheets API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid Sheets URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Sheets token refresh failed: {0}")]
    RefreshFailed(String),

    #[error(
        "No Sheets credentials: set GOOGLE_SHEETS_ACCESS_TOKEN, sheets.oauth_item or sheets.access_token_ref"
    )]
    MissingToken,

    #[error("Secret lookup failed: {0}")]
    Secret(#[from] SecretError),

    #[error("Header row has no {0:?} column")]
    MissingColumn(String),

    #[error("Invalid column letter {0:?}")]
    InvalidColumn(String),

    #[error("Write-back block starting at column {column} runs past column {last}")]
    BlockPastLastColumn { column: String, last: String },

    #[error("Invalid range {0:?}")]
    InvalidRange(String),
}

/// Cell grid access for one worksheet (tab).
///
/// Ranges are A1 notation relative to the worksheet, e.g. `C5:F5`.
#[async_trait]
pub trait Worksheet: Send + Sync {
    /// Every row of the used range, header first. Trailing empty cells may be omitted.
    async fn read_values(&self) -> Result<Vec<Vec<Value>>, SheetError>;

    async fn write_range(&self, range: &str, values: Vec<Vec<Value>>) -> Result<(), SheetError>;
}
