//! Typed access to the Feedbin REST API (v2).
//!
//! - [`client`] - authenticated requests, retries, pagination
//! - [`entities`] - records and the suffixed title type
//! - [`subscriptions`] / [`entries`] - one function per endpoint, each returning
//!   a closed outcome enum

mod client;
mod entities;
mod entries;
mod pagination;
mod subscriptions;

pub use client::{
    ApiError, ApiResponse, ClientOptions, Credentials, FeedbinClient, RequestArgs,
    DEFAULT_API_BASE_URL,
};
pub use entities::{
    append_suffix, Entry, EntryId, FeedId, FeedOption, Subscription, SubscriptionId,
    SubscriptionTitleWithSuffix, TitleError, TitleSuffix,
};
pub use entries::{
    create_unread_entries, get_feed_entries, CreateUnreadEntriesOutcome, GetFeedEntriesOutcome,
    UnreadEntries, MAX_ENTRIES_PER_BATCH,
};
pub use pagination::{next_link, parse_link_header};
pub use subscriptions::{
    create_subscription, delete_subscription, get_subscription, list_subscriptions,
    rename_with_suffix, update_subscription, CreateSubscriptionOutcome,
    DeleteSubscriptionOutcome, GetSubscriptionOutcome, ListSubscriptionsOutcome,
    ListSubscriptionsParams, RenameOutcome, UpdateSubscriptionOutcome,
};
