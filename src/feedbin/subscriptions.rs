//! Subscription endpoints.
//!
//! Docs: <https://github.com/feedbin/feedbin-api/blob/master/content/subscriptions.md>
//!
//! Each operation returns a closed outcome enum instead of an error: an ambiguous
//! URL or a missing subscription is a normal answer the caller has to act on.
//! Statuses without a dedicated variant map to `HttpError` (4xx/5xx) or
//! `UnexpectedStatus` (anything else), transport failures to `HttpError`, and
//! undecodable bodies to `UnexpectedError`.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use std::fmt;

use super::client::{ApiError, ApiResponse, FeedbinClient, RequestArgs};
use super::entities::{
    append_suffix, FeedOption, Subscription, SubscriptionId, SubscriptionTitleWithSuffix,
    TitleSuffix,
};

/// What a failed call turns into when no status-specific variant applies.
pub(crate) enum Failure {
    UnexpectedStatus(u16),
    Http(String),
    Unexpected(String),
}

impl Failure {
    pub(crate) fn from_error(error: ApiError) -> Self {
        if error.is_decode() {
            Failure::Unexpected(error.to_string())
        } else {
            Failure::Http(error.to_string())
        }
    }

    pub(crate) fn from_status(response: &ApiResponse, url: &str) -> Self {
        let status = response.status;
        if status.is_client_error() || status.is_server_error() {
            Failure::Http(
                ApiError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                }
                .to_string(),
            )
        } else {
            Failure::UnexpectedStatus(status.as_u16())
        }
    }
}

macro_rules! impl_failure_conversion {
    ($outcome:ident) => {
        impl From<Failure> for $outcome {
            fn from(failure: Failure) -> Self {
                match failure {
                    Failure::UnexpectedStatus(code) => $outcome::UnexpectedStatus(code),
                    Failure::Http(message) => $outcome::HttpError(message),
                    Failure::Unexpected(message) => $outcome::UnexpectedError(message),
                }
            }
        }
    };
}

// ============================================================================
// Create
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CreateSubscriptionOutcome {
    /// 201
    Created(Subscription),
    /// 200 or 302: the account already follows this feed
    Exists(Subscription),
    /// 300: the URL offers several feeds and one must be picked
    MultipleChoices(Vec<FeedOption>),
    /// 404: no feed could be found at the URL
    NotFound,
    UnexpectedStatus(u16),
    HttpError(String),
    UnexpectedError(String),
}

impl_failure_conversion!(CreateSubscriptionOutcome);

impl CreateSubscriptionOutcome {
    pub fn subscription(&self) -> Option<&Subscription> {
        match self {
            Self::Created(s) | Self::Exists(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CreateSubscriptionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(_) => write!(f, "✅ Subscription created"),
            Self::Exists(_) => write!(f, "✅ Subscription already exists"),
            Self::MultipleChoices(options) => {
                write!(f, "🥞 Multiple RSS feeds found: ")?;
                let listed: Vec<String> = options.iter().map(ToString::to_string).collect();
                write!(f, "{}", listed.join("; "))
            }
            Self::NotFound => write!(f, "⛔️ No RSS feed found at that URL"),
            Self::UnexpectedStatus(code) => {
                write!(f, "🚨 Unexpected status code while creating subscription: {code}")
            }
            Self::HttpError(e) => write!(f, "🚨 HTTP error while creating subscription: {e}"),
            Self::UnexpectedError(e) => {
                write!(f, "🚨 Unexpected error while creating subscription: {e}")
            }
        }
    }
}

/// Subscribes to a website or feed URL (with or without the scheme).
pub async fn create_subscription(client: &FeedbinClient, url: &str) -> CreateSubscriptionOutcome {
    let args = RequestArgs::new(client.url("subscriptions.json")).json(json!({ "feed_url": url }));

    tracing::debug!(url = %url, "Creating subscription");
    let response = match client.send(Method::POST, &args).await {
        Ok(response) => response,
        Err(e) => return Failure::from_error(e).into(),
    };

    let outcome = match response.status.as_u16() {
        200 | 302 => decode(&response, CreateSubscriptionOutcome::Exists),
        201 => decode(&response, CreateSubscriptionOutcome::Created),
        300 => decode(&response, CreateSubscriptionOutcome::MultipleChoices),
        404 => CreateSubscriptionOutcome::NotFound,
        _ => Failure::from_status(&response, &args.url).into(),
    };

    tracing::debug!(url = %url, outcome = %outcome, "Create subscription finished");
    outcome
}

// ============================================================================
// Get / Update (shared shape)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum GetSubscriptionOutcome {
    Ok(Subscription),
    /// 403: the subscription belongs to someone else
    Forbidden(SubscriptionId),
    NotFound(SubscriptionId),
    UnexpectedStatus(u16),
    HttpError(String),
    UnexpectedError(String),
}

impl_failure_conversion!(GetSubscriptionOutcome);

impl fmt::Display for GetSubscriptionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(_) => write!(f, "✅ Subscription found"),
            Self::Forbidden(id) => write!(f, "⛔️ You do not own Feedbin subscription {id}"),
            Self::NotFound(id) => write!(f, "⛔️ No Feedbin subscription found with ID {id}"),
            Self::UnexpectedStatus(code) => {
                write!(f, "🚨 Unexpected status code while getting subscription: {code}")
            }
            Self::HttpError(e) => write!(f, "🚨 HTTP error while getting subscription: {e}"),
            Self::UnexpectedError(e) => {
                write!(f, "🚨 Unexpected error while getting subscription: {e}")
            }
        }
    }
}

pub async fn get_subscription(client: &FeedbinClient, id: SubscriptionId) -> GetSubscriptionOutcome {
    let args = RequestArgs::new(client.url(&format!("subscriptions/{id}.json")));

    let response = match client.send(Method::GET, &args).await {
        Ok(response) => response,
        Err(e) => return Failure::from_error(e).into(),
    };

    match response.status.as_u16() {
        200 => decode(&response, GetSubscriptionOutcome::Ok),
        403 => GetSubscriptionOutcome::Forbidden(id),
        404 => GetSubscriptionOutcome::NotFound(id),
        _ => Failure::from_status(&response, &args.url).into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSubscriptionOutcome {
    Ok(Subscription),
    Forbidden(SubscriptionId),
    NotFound(SubscriptionId),
    UnexpectedStatus(u16),
    HttpError(String),
    UnexpectedError(String),
}

impl_failure_conversion!(UpdateSubscriptionOutcome);

impl fmt::Display for UpdateSubscriptionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(s) => write!(f, "✅ Subscription title updated to '{}'", s.title),
            Self::Forbidden(id) => write!(f, "⛔️ You do not own Feedbin subscription {id}"),
            Self::NotFound(id) => write!(f, "⛔️ No Feedbin subscription found with ID {id}"),
            Self::UnexpectedStatus(code) => {
                write!(f, "🚨 Unexpected status code while updating subscription: {code}")
            }
            Self::HttpError(e) => write!(f, "🚨 HTTP error while updating subscription: {e}"),
            Self::UnexpectedError(e) => {
                write!(f, "🚨 Unexpected error while updating subscription: {e}")
            }
        }
    }
}

/// Renames a subscription. The title type guarantees a content-type suffix.
pub async fn update_subscription(
    client: &FeedbinClient,
    id: SubscriptionId,
    new_title: &SubscriptionTitleWithSuffix,
) -> UpdateSubscriptionOutcome {
    let args = RequestArgs::new(client.url(&format!("subscriptions/{id}.json")))
        .json(json!({ "title": new_title }));

    tracing::debug!(subscription_id = %id, title = %new_title, "Updating subscription title");
    let response = match client.send(Method::PATCH, &args).await {
        Ok(response) => response,
        Err(e) => return Failure::from_error(e).into(),
    };

    match response.status.as_u16() {
        200 => decode(&response, UpdateSubscriptionOutcome::Ok),
        403 => UpdateSubscriptionOutcome::Forbidden(id),
        404 => UpdateSubscriptionOutcome::NotFound(id),
        _ => Failure::from_status(&response, &args.url).into(),
    }
}

// ============================================================================
// Delete
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteSubscriptionOutcome {
    NoContent,
    Forbidden(SubscriptionId),
    NotFound(SubscriptionId),
    UnexpectedStatus(u16),
    HttpError(String),
    UnexpectedError(String),
}

impl_failure_conversion!(DeleteSubscriptionOutcome);

impl fmt::Display for DeleteSubscriptionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoContent => write!(f, "✅ Subscription deleted"),
            Self::Forbidden(id) => write!(f, "⛔️ You do not own subscription {id}"),
            Self::NotFound(id) => write!(f, "⛔️ No subscription found with ID {id}"),
            Self::UnexpectedStatus(code) => {
                write!(f, "🚨 Unexpected status code while deleting subscription: {code}")
            }
            Self::HttpError(e) => write!(f, "🚨 HTTP error while deleting subscription: {e}"),
            Self::UnexpectedError(e) => {
                write!(f, "🚨 Unexpected error while deleting subscription: {e}")
            }
        }
    }
}

pub async fn delete_subscription(
    client: &FeedbinClient,
    id: SubscriptionId,
) -> DeleteSubscriptionOutcome {
    let args = RequestArgs::new(client.url(&format!("subscriptions/{id}.json")));

    tracing::debug!(subscription_id = %id, "Deleting subscription");
    let response = match client.send(Method::DELETE, &args).await {
        Ok(response) => response,
        Err(e) => return Failure::from_error(e).into(),
    };

    match response.status.as_u16() {
        204 => DeleteSubscriptionOutcome::NoContent,
        403 => DeleteSubscriptionOutcome::Forbidden(id),
        404 => DeleteSubscriptionOutcome::NotFound(id),
        _ => Failure::from_status(&response, &args.url).into(),
    }
}

// ============================================================================
// List
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ListSubscriptionsParams {
    /// Only subscriptions created after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Ask for the extended representation (`mode=extended`).
    pub extended: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListSubscriptionsOutcome {
    Ok(Vec<Subscription>),
    /// 403: the credentials were rejected
    Forbidden,
    UnexpectedStatus(u16),
    HttpError(String),
    UnexpectedError(String),
}

impl_failure_conversion!(ListSubscriptionsOutcome);

impl fmt::Display for ListSubscriptionsOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(subs) => write!(f, "✅ {} subscriptions found", subs.len()),
            Self::Forbidden => write!(f, "⛔️ Feedbin rejected the credentials"),
            Self::UnexpectedStatus(code) => {
                write!(f, "🚨 Unexpected status code while listing subscriptions: {code}")
            }
            Self::HttpError(e) => write!(f, "🚨 HTTP error while listing subscriptions: {e}"),
            Self::UnexpectedError(e) => {
                write!(f, "🚨 Unexpected error while listing subscriptions: {e}")
            }
        }
    }
}

pub async fn list_subscriptions(
    client: &FeedbinClient,
    params: &ListSubscriptionsParams,
) -> ListSubscriptionsOutcome {
    let args = RequestArgs::new(client.url("subscriptions.json"))
        .optional_param("since", params.since.map(|s| s.to_rfc3339()))
        .optional_param("mode", params.extended.then_some("extended"));

    let response = match client.send(Method::GET, &args).await {
        Ok(response) => response,
        Err(e) => return Failure::from_error(e).into(),
    };

    match response.status.as_u16() {
        200 => decode(&response, ListSubscriptionsOutcome::Ok),
        401 | 403 => ListSubscriptionsOutcome::Forbidden,
        _ => Failure::from_status(&response, &args.url).into(),
    }
}

// ============================================================================
// Rename with suffix
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RenameOutcome {
    Renamed(Subscription),
    /// The title already ended with a marker; no PATCH was sent
    AlreadySuffixed(Subscription),
    /// Fetching the current title failed
    Get(GetSubscriptionOutcome),
    /// The PATCH itself failed
    Update(UpdateSubscriptionOutcome),
}

impl fmt::Display for RenameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renamed(s) => write!(f, "✅ Renamed to '{}'", s.title),
            Self::AlreadySuffixed(s) => write!(f, "✅ Title already suffixed: '{}'", s.title),
            Self::Get(outcome) => fmt::Display::fmt(outcome, f),
            Self::Update(outcome) => fmt::Display::fmt(outcome, f),
        }
    }
}

/// Fetches a subscription and appends 📖 or 📺 to its title.
pub async fn rename_with_suffix(client: &FeedbinClient, id: SubscriptionId) -> RenameOutcome {
    let subscription = match get_subscription(client, id).await {
        GetSubscriptionOutcome::Ok(subscription) => subscription,
        other => return RenameOutcome::Get(other),
    };

    if TitleSuffix::present_in(&subscription.title).is_some() {
        tracing::debug!(subscription_id = %id, title = %subscription.title, "Title already suffixed");
        return RenameOutcome::AlreadySuffixed(subscription);
    }

    let new_title = append_suffix(&subscription.title, &subscription.site_url);
    match update_subscription(client, id, &new_title).await {
        UpdateSubscriptionOutcome::Ok(updated) => RenameOutcome::Renamed(updated),
        other => RenameOutcome::Update(other),
    }
}

/// Decodes the body into `T` and wraps it, or reports an `UnexpectedError`.
pub(crate) fn decode<T, O>(response: &ApiResponse, wrap: impl FnOnce(T) -> O) -> O
where
    T: serde::de::DeserializeOwned,
    O: From<Failure>,
{
    match response.json::<T>() {
        Ok(value) => wrap(value),
        Err(e) => Failure::from_error(e).into(),
    }
}
