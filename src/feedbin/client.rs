//! Authenticated HTTP access to the Feedbin API.
//!
//! One [`FeedbinClient`] is built per process and handed to every operation.
//! [`FeedbinClient::send`] returns the response whatever its status, for endpoints
//! whose status codes carry meaning; [`FeedbinClient::make_request`] turns non-2xx
//! into [`ApiError::Status`] for the simple call sites.

use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use super::pagination::next_link;
use crate::config::Config;
use crate::secrets::{SecretError, SecretReference, SecretStore};

pub const DEFAULT_API_BASE_URL: &str = "https://api.feedbin.com/v2";

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_PAGES: usize = 1_000;
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, TLS or protocol failure
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response from [`FeedbinClient::make_request`]
    #[error("HTTP error: status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Pagination did not terminate after {0} pages")]
    TooManyPages(usize),
}

impl ApiError {
    /// HTTP status for [`ApiError::Status`].
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the body arrived but could not be understood.
    pub fn is_decode(&self) -> bool {
        matches!(self, ApiError::Decode(_))
    }

    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ApiError::Timeout(_) => true,
            ApiError::Status { status, .. } => is_retryable_status(*status),
            ApiError::ResponseTooLarge(_) | ApiError::Decode(_) | ApiError::TooManyPages(_) => {
                false
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS.as_u16() || status >= 500
}

/// Feedbin account credentials, resolved once at startup.
pub struct Credentials {
    pub username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// `FEEDBIN_USERNAME`/`FEEDBIN_PASSWORD` win; otherwise both fields are read from
    /// `op://<vault>/<item>/{username,password}`.
    pub async fn resolve(
        store: &dyn SecretStore,
        vault: &str,
        item: &str,
    ) -> Result<Self, SecretError> {
        if let (Ok(username), Ok(password)) = (
            std::env::var("FEEDBIN_USERNAME"),
            std::env::var("FEEDBIN_PASSWORD"),
        ) {
            tracing::debug!("Using Feedbin credentials from the environment");
            return Ok(Self::new(username, SecretString::from(password)));
        }

        let username = store
            .read(&SecretReference::new(vault, item, "username"))
            .await?;
        let password = store
            .read(&SecretReference::new(vault, item, "password"))
            .await?;
        Ok(Self::new(username.expose_secret(), password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
        }
    }
}

/// URL, query and JSON body of one request.
#[derive(Debug, Clone, Default)]
pub struct RequestArgs {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
}

impl RequestArgs {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Adds `key=value` only when `value` is set.
    pub fn optional_param(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `next` relation of the `Link` header. Feedbin has also been seen sending it as `Links`.
    pub fn next_link(&self) -> Option<String> {
        ["link", "links"]
            .iter()
            .filter_map(|name| self.headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .find_map(next_link)
    }
}

pub struct FeedbinClient {
    http: reqwest::Client,
    credentials: Credentials,
    options: ClientOptions,
}

impl FeedbinClient {
    pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self, ApiError> {
        // Feedbin answers 302 for existing subscriptions; following it would hide that
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("feedbin-tools/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            credentials,
            options,
        })
    }

    /// Absolute URL for an API path such as `subscriptions.json`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.options.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Sends a request and returns the response regardless of status.
    ///
    /// Transport failures, timeouts, 429 and 5xx are retried with exponential backoff.
    /// Once retries run out, a retryable status is still returned as a response.
    pub async fn send(&self, method: Method, args: &RequestArgs) -> Result<ApiResponse, ApiError> {
        let mut retry_count = 0;

        loop {
            let result = self.send_once(method.clone(), args).await;
            let retryable = match &result {
                Ok(response) => is_retryable_status(response.status.as_u16()),
                Err(e) => e.is_retryable(),
            };

            if !retryable || retry_count >= self.options.max_retries {
                return result;
            }

            let delay = self.options.retry_base_delay * 2u32.saturating_pow(retry_count);
            match &result {
                Ok(response) => tracing::warn!(
                    url = %args.url,
                    status = %response.status,
                    retry = retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Transient HTTP status, retrying"
                ),
                Err(e) => tracing::warn!(
                    url = %args.url,
                    error = %e,
                    retry = retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying"
                ),
            }

            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }

    /// Like [`send`](Self::send) but non-2xx responses become [`ApiError::Status`].
    pub async fn make_request(
        &self,
        method: Method,
        args: &RequestArgs,
    ) -> Result<ApiResponse, ApiError> {
        let response = self.send(method, args).await?;
        if !response.status.is_success() {
            return Err(ApiError::Status {
                status: response.status.as_u16(),
                url: args.url.clone(),
            });
        }
        Ok(response)
    }

    /// GETs every page of a paginated endpoint and returns the items in page order.
    ///
    /// The `next` link already carries the query string, so follow-up requests use it
    /// verbatim.
    pub async fn make_paginated_request<T: DeserializeOwned>(
        &self,
        args: RequestArgs,
    ) -> Result<Vec<T>, ApiError> {
        let mut results = Vec::new();
        let mut next = Some(args);
        let mut pages = 0;

        while let Some(args) = next.take() {
            if pages >= MAX_PAGES {
                return Err(ApiError::TooManyPages(MAX_PAGES));
            }

            let response = self.make_request(Method::GET, &args).await?;
            let page: Vec<T> = response.json()?;
            pages += 1;
            tracing::debug!(url = %args.url, page = pages, items = page.len(), "Fetched page");
            results.extend(page);

            next = response
                .next_link()
                .filter(|url| *url != args.url)
                .map(RequestArgs::new);
        }

        Ok(results)
    }

    async fn send_once(&self, method: Method, args: &RequestArgs) -> Result<ApiResponse, ApiError> {
        let mut request = self
            .http
            .request(method.clone(), &args.url)
            .basic_auth(
                &self.credentials.username,
                Some(self.credentials.password.expose_secret()),
            );

        if !args.params.is_empty() {
            request = request.query(&args.params);
        }

        if let Some(body) = &args.json {
            request = request
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(serde_json::to_vec(body)?);
        }

        tracing::trace!(method = %method, url = %args.url, "Feedbin request");

        let response = tokio::time::timeout(self.options.timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout(self.options.timeout))??;

        let status = response.status();
        let headers = response.headers().clone();
        let body = read_limited_body(response, MAX_RESPONSE_SIZE).await?;

        tracing::debug!(method = %method, url = %args.url, status = %status, "Feedbin response");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for FeedbinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbinClient")
            .field("credentials", &self.credentials)
            .field("options", &self.options)
            .finish()
    }
}

async fn read_limited_body(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
