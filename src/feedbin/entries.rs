//! Entry listing and the unread-entries endpoint.
//!
//! Docs:
//! - <https://github.com/feedbin/feedbin-api/blob/master/content/entries.md>
//! - <https://github.com/feedbin/feedbin-api/blob/master/content/unread-entries.md>

use reqwest::Method;
use serde_json::json;
use std::collections::HashSet;
use std::fmt;

use super::client::{FeedbinClient, RequestArgs};
use super::entities::{Entry, EntryId, FeedId};
use super::subscriptions::Failure;

/// Feedbin rejects unread-entries requests with more ids than this.
pub const MAX_ENTRIES_PER_BATCH: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum GetFeedEntriesOutcome {
    Ok(Vec<Entry>),
    /// 403: the account is not subscribed to the feed
    Forbidden(FeedId),
    NotFound(FeedId),
    HttpError(String),
    UnexpectedError(String),
}

impl fmt::Display for GetFeedEntriesOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(entries) => write!(f, "✅ {} feed entries found", entries.len()),
            Self::Forbidden(id) => write!(f, "⛔️ You are not subscribed to feed {id}"),
            Self::NotFound(id) => write!(f, "⛔️ No feed found with ID {id}"),
            Self::HttpError(e) => write!(f, "🚨 HTTP error while listing feed entries: {e}"),
            Self::UnexpectedError(e) => {
                write!(f, "🚨 Unexpected error while listing feed entries: {e}")
            }
        }
    }
}

/// Lists every entry of a feed, following pagination to the last page.
///
/// `read` and `starred` filter server-side when set.
pub async fn get_feed_entries(
    client: &FeedbinClient,
    feed_id: FeedId,
    read: Option<bool>,
    starred: Option<bool>,
) -> GetFeedEntriesOutcome {
    let args = RequestArgs::new(client.url(&format!("feeds/{feed_id}/entries.json")))
        .optional_param("read", read)
        .optional_param("starred", starred);

    tracing::debug!(feed_id = %feed_id, "Getting feed entries");
    match client.make_paginated_request::<Entry>(args).await {
        Ok(entries) => {
            tracing::debug!(feed_id = %feed_id, count = entries.len(), "Found feed entries");
            GetFeedEntriesOutcome::Ok(entries)
        }
        Err(e) => match e.status() {
            Some(403) => GetFeedEntriesOutcome::Forbidden(feed_id),
            Some(404) => GetFeedEntriesOutcome::NotFound(feed_id),
            _ if e.is_decode() => GetFeedEntriesOutcome::UnexpectedError(e.to_string()),
            _ => GetFeedEntriesOutcome::HttpError(e.to_string()),
        },
    }
}

/// Ids sent to the unread-entries endpoint, split by whether Feedbin accepted them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadEntries {
    pub marked_as_unread: Vec<EntryId>,
    /// Usually entries of feeds the account no longer has access to.
    pub not_marked_as_unread: Vec<EntryId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateUnreadEntriesOutcome {
    Ok(UnreadEntries),
    UnexpectedStatus(u16),
    HttpError(String),
    UnexpectedError(String),
}

impl From<Failure> for CreateUnreadEntriesOutcome {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::UnexpectedStatus(code) => Self::UnexpectedStatus(code),
            Failure::Http(message) => Self::HttpError(message),
            Failure::Unexpected(message) => Self::UnexpectedError(message),
        }
    }
}

impl fmt::Display for CreateUnreadEntriesOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(result) => write!(
                f,
                "✅ {} entries marked as unread ({} not marked)",
                result.marked_as_unread.len(),
                result.not_marked_as_unread.len()
            ),
            Self::UnexpectedStatus(code) => {
                write!(f, "🚨 Unexpected status code while marking entries as unread: {code}")
            }
            Self::HttpError(e) => write!(f, "🚨 HTTP error while marking entries as unread: {e}"),
            Self::UnexpectedError(e) => {
                write!(f, "🚨 Unexpected error while marking entries as unread: {e}")
            }
        }
    }
}

/// Marks entries unread in chunks of [`MAX_ENTRIES_PER_BATCH`].
///
/// For each chunk, ids missing from the response are reported as not marked.
/// The first failing chunk aborts the call: later chunks are not sent and the
/// ids already marked are not reported. Re-running is safe because marking an
/// entry unread twice is a no-op.
pub async fn create_unread_entries(
    client: &FeedbinClient,
    entry_ids: &[EntryId],
) -> CreateUnreadEntriesOutcome {
    let mut result = UnreadEntries::default();
    let url = client.url("unread_entries.json");

    for (index, chunk) in entry_ids.chunks(MAX_ENTRIES_PER_BATCH).enumerate() {
        let args = RequestArgs::new(url.clone()).json(json!({ "unread_entries": chunk }));

        tracing::debug!(chunk = index, size = chunk.len(), "Marking entries as unread");
        let response = match client.send(Method::POST, &args).await {
            Ok(response) => response,
            Err(e) => return Failure::from_error(e).into(),
        };

        if response.status.as_u16() != 200 {
            tracing::warn!(chunk = index, status = %response.status, "Unread entries chunk failed");
            return Failure::from_status(&response, &args.url).into();
        }

        let accepted: Vec<EntryId> = match response.json() {
            Ok(ids) => ids,
            Err(e) => return Failure::from_error(e).into(),
        };

        let (marked, not_marked) = split_chunk(chunk, &accepted);
        if !not_marked.is_empty() {
            tracing::warn!(
                chunk = index,
                count = not_marked.len(),
                "Some entries could not be marked as unread"
            );
        }
        result.marked_as_unread.extend(marked);
        result.not_marked_as_unread.extend(not_marked);
    }

    CreateUnreadEntriesOutcome::Ok(result)
}

/// Splits `chunk` into (accepted, rejected), both in request order.
fn split_chunk(chunk: &[EntryId], accepted: &[EntryId]) -> (Vec<EntryId>, Vec<EntryId>) {
    let accepted: HashSet<EntryId> = accepted.iter().copied().collect();
    chunk.iter().copied().partition(|id| accepted.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ids(raw: &[u64]) -> Vec<EntryId> {
        raw.iter().copied().map(EntryId).collect()
    }

    #[test]
    fn test_split_chunk_keeps_request_order() {
        let (marked, not_marked) = split_chunk(&ids(&[5, 1, 9, 3]), &ids(&[3, 5]));
        assert_eq!(marked, ids(&[5, 3]));
        assert_eq!(not_marked, ids(&[1, 9]));
    }

    #[test]
    fn test_split_chunk_ignores_unrequested_ids() {
        let (marked, not_marked) = split_chunk(&ids(&[1, 2]), &ids(&[2, 77]));
        assert_eq!(marked, ids(&[2]));
        assert_eq!(not_marked, ids(&[1]));
    }

    proptest! {
        #[test]
        fn split_chunk_partitions_the_request(
            requested in proptest::collection::hash_set(0u64..5000, 0..300),
            accepted in proptest::collection::vec(0u64..5000, 0..300),
        ) {
            let requested: Vec<EntryId> = requested.into_iter().map(EntryId).collect();
            let accepted = ids(&accepted);
            let (marked, not_marked) = split_chunk(&requested, &accepted);

            prop_assert_eq!(marked.len() + not_marked.len(), requested.len());
            let union: HashSet<EntryId> = marked.iter().chain(not_marked.iter()).copied().collect();
            let expected: HashSet<EntryId> = requested.iter().copied().collect();
            prop_assert_eq!(union, expected);
        }
    }
}
