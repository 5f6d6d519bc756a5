//! Google Sheets v4 values API.
//!
//! Docs: <https://developers.google.com/sheets/api/reference/rest/v4/spreadsheets.values>
//!
//! Authenticates with a bearer access token carrying the `spreadsheets`
//! scope, obtained through [`super::auth::access_token`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{SheetError, Worksheet};
use crate::config::SheetsConfig;

/// Up to [`super::row::LAST_READ_COLUMN`].
const READ_COLUMNS: &str = "A1:Z";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeUpdate<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<Value>>,
}

pub struct GoogleWorksheet {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
    token: SecretString,
}

impl GoogleWorksheet {
    pub fn new(config: &SheetsConfig, token: SecretString, timeout: Duration) -> Result<Self, SheetError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feedbin-tools/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            worksheet: config.worksheet.clone(),
            token,
        })
    }

    /// `'<worksheet>'!<cells>`, quoted so names with spaces or emoji work.
    fn qualified(&self, cells: &str) -> String {
        format!("'{}'!{}", self.worksheet.replace('\'', "''"), cells)
    }

    fn values_url(&self, range: &str) -> Result<url::Url, SheetError> {
        let mut url = url::Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| SheetError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SheetError::AuthExpired);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SheetError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Worksheet for GoogleWorksheet {
    async fn read_values(&self) -> Result<Vec<Vec<Value>>, SheetError> {
        let url = self.values_url(&self.qualified(READ_COLUMNS))?;

        tracing::debug!(worksheet = %self.worksheet, "Reading sheet values");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
            ])
            .send()
            .await?;

        let body: ValueRange = Self::check(response).await?.json().await?;
        tracing::debug!(rows = body.values.len(), "Read sheet values");
        Ok(body.values)
    }

    async fn write_range(&self, range: &str, values: Vec<Vec<Value>>) -> Result<(), SheetError> {
        let range = self.qualified(range);
        let url = self.values_url(&range)?;

        let response = self
            .http
            .put(url)
            .bearer_auth(self.token.expose_secret())
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&ValueRangeUpdate {
                range: &range,
                major_dimension: "ROWS",
                values,
            })
            .send()
            .await?;

        Self::check(response).await?;
        tracing::debug!(range = %range, "Wrote sheet range");
        Ok(())
    }
}

impl std::fmt::Debug for GoogleWorksheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleWorksheet")
            .field("base_url", &self.base_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("worksheet", &self.worksheet)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
