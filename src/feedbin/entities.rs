//! Records returned by the Feedbin API and the validated title type sent back to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }
    };
}

id_type!(
    /// Identifier of a subscription (the user's link to a feed).
    SubscriptionId
);
id_type!(
    /// Identifier of the underlying feed, shared by every subscriber.
    FeedId
);
id_type!(EntryId);

/// A feed the user follows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub feed_id: FeedId,
    pub title: String,
    pub site_url: String,
    pub feed_url: String,
}

/// A single article in a feed. Feedbin sends `null` for missing titles and authors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Entry {
    pub id: EntryId,
    pub feed_id: FeedId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub url: String,
}

/// One candidate feed offered when a URL resolves to several feeds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedOption {
    pub feed_url: String,
    pub title: String,
}

impl fmt::Display for FeedOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.feed_url)
    }
}

// ============================================================================
// Title suffixes
// ============================================================================

/// Hosts whose subscriptions get the video marker.
const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// Emoji marker appended to a subscription title to show its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSuffix {
    Reading,
    Video,
}

impl TitleSuffix {
    pub const ALL: [TitleSuffix; 2] = [TitleSuffix::Reading, TitleSuffix::Video];

    pub fn marker(self) -> &'static str {
        match self {
            TitleSuffix::Reading => "📖",
            TitleSuffix::Video => "📺",
        }
    }

    /// Picks the marker for a site: video for known video hosts, reading otherwise.
    pub fn for_site_url(site_url: &str) -> Self {
        let host = url::Url::parse(site_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase));

        let is_video = match host {
            Some(host) => VIDEO_HOSTS
                .iter()
                .any(|video| host == *video || host.ends_with(&format!(".{video}"))),
            // Scheme-less or otherwise unparseable URLs fall back to a substring check
            None => VIDEO_HOSTS.iter().any(|video| site_url.contains(video)),
        };

        if is_video {
            TitleSuffix::Video
        } else {
            TitleSuffix::Reading
        }
    }

    /// Returns the suffix `title` already ends with, if any.
    pub fn present_in(title: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|suffix| title.ends_with(&format!(" {}", suffix.marker())))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TitleError {
    #[error("Title must end with either ' 📖' or ' 📺': {0:?}")]
    MissingSuffix(String),
}

/// A subscription title guaranteed to end with a content-type marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubscriptionTitleWithSuffix(String);

impl SubscriptionTitleWithSuffix {
    pub fn new(title: impl Into<String>) -> Result<Self, TitleError> {
        let title = title.into();
        if TitleSuffix::present_in(&title).is_none() {
            return Err(TitleError::MissingSuffix(title));
        }
        Ok(Self(title))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SubscriptionTitleWithSuffix {
    type Error = TitleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for SubscriptionTitleWithSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Appends the marker chosen from `site_url` to `title`.
///
/// Titles that already carry either marker are returned unchanged, so renaming
/// twice never stacks suffixes.
pub fn append_suffix(title: &str, site_url: &str) -> SubscriptionTitleWithSuffix {
    if TitleSuffix::present_in(title).is_some() {
        return SubscriptionTitleWithSuffix(title.to_string());
    }

    let suffix = TitleSuffix::for_site_url(site_url);
    SubscriptionTitleWithSuffix(format!("{} {}", title.trim_end(), suffix.marker()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_reading_suffix_for_blog() {
        let title = append_suffix("My Blog", "https://example.com");
        assert_eq!(title.as_str(), "My Blog 📖");
    }

    #[test]
    fn test_video_suffix_for_youtube() {
        let title = append_suffix("My Channel", "https://youtube.com/x");
        assert!(title.as_str().ends_with("📺"));

        let title = append_suffix("Short Links", "https://youtu.be/abc");
        assert!(title.as_str().ends_with("📺"));

        let title = append_suffix("Www", "https://www.youtube.com/@someone");
        assert!(title.as_str().ends_with("📺"));
    }

    #[test]
    fn test_lookalike_host_is_not_video() {
        let title = append_suffix("Fan Site", "https://notyoutube.com.example.org");
        assert!(title.as_str().ends_with("📖"));
    }

    #[test]
    fn test_scheme_less_url_falls_back_to_substring() {
        assert_eq!(TitleSuffix::for_site_url("youtube.com/c/thing"), TitleSuffix::Video);
        assert_eq!(TitleSuffix::for_site_url("example.com"), TitleSuffix::Reading);
    }

    #[test]
    fn test_existing_suffix_is_kept() {
        let title = append_suffix("Already 📖", "https://youtube.com/x");
        assert_eq!(title.as_str(), "Already 📖");

        let title = append_suffix("Already 📺", "https://example.com");
        assert_eq!(title.as_str(), "Already 📺");
    }

    #[test]
    fn test_trailing_whitespace_trimmed_before_suffix() {
        let title = append_suffix("Spaced  ", "https://example.com");
        assert_eq!(title.as_str(), "Spaced 📖");
    }

    #[test]
    fn test_validated_title_rejects_plain_title() {
        assert!(matches!(
            SubscriptionTitleWithSuffix::new("Plain"),
            Err(TitleError::MissingSuffix(_))
        ));
        // Marker glued to the last word is not a suffix
        assert!(SubscriptionTitleWithSuffix::new("Glued📖").is_err());
        assert!(SubscriptionTitleWithSuffix::new("Spaced 📺").is_ok());
    }

    #[test]
    fn test_ids_parse_and_display() {
        let id: SubscriptionId = " 42 ".parse().unwrap();
        assert_eq!(id, SubscriptionId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<FeedId>().is_err());
    }

    #[test]
    fn test_entry_accepts_null_title_and_author() {
        let json = r#"{"id": 7, "feed_id": 3, "title": null, "author": null, "url": "https://e.com/7"}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, EntryId(7));
        assert_eq!(entry.title, None);
    }

    proptest! {
        #[test]
        fn append_suffix_always_validates_and_is_idempotent(title in "[a-zA-Z0-9 ]{0,40}") {
            let once = append_suffix(&title, "https://example.com");
            prop_assert!(SubscriptionTitleWithSuffix::new(once.as_str()).is_ok());
            let twice = append_suffix(once.as_str(), "https://youtube.com");
            prop_assert_eq!(once, twice);
        }
    }
}
