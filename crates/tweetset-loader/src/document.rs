//! Tweet to indexable document transformation
//!
//! [`TweetDocument::from_record`] is a pure function: it reads the fields
//! needed for search and aggregation out of a raw tweet, tags the result with
//! its dataset and optionally keeps the whole raw tweet. The document id is
//! the tweet's own id, so loading the same tweet twice overwrites it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tweetset_common::{Result, TweetsetError};

use crate::es::BulkOperation;
use crate::stream::RawRecord;

/// Twitter's `created_at` layout, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const TWITTER_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TweetType {
    Original,
    Retweet,
    Quote,
    Reply,
}

/// A tweet as stored in a dataset index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetDocument {
    #[serde(skip)]
    pub id: String,
    pub tweet_id: String,
    pub dataset_id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub tweet_type: TweetType,
    pub lang: Option<String>,
    pub user_id: Option<String>,
    pub user_screen_name: Option<String>,
    pub user_name: Option<String>,
    pub user_followers_count: Option<u64>,
    pub user_verified: bool,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub urls: Vec<String>,
    pub has_media: bool,
    pub in_reply_to_screen_name: Option<String>,
    pub retweet_quoted_screen_name: Option<String>,
    pub retweet_count: u64,
    pub favorite_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweet: Option<Value>,
}

// Only the parts of the Twitter payload the document needs.

#[derive(Debug, Default, Deserialize)]
struct RawTweet {
    id_str: Option<String>,
    id: Option<u64>,
    created_at: Option<String>,
    timestamp_ms: Option<String>,
    full_text: Option<String>,
    text: Option<String>,
    extended_tweet: Option<ExtendedTweet>,
    lang: Option<String>,
    user: Option<RawUser>,
    #[serde(default)]
    entities: Entities,
    extended_entities: Option<ExtendedEntities>,
    retweeted_status: Option<Box<RawTweet>>,
    quoted_status: Option<Box<RawTweet>>,
    quoted_status_id_str: Option<String>,
    in_reply_to_status_id_str: Option<String>,
    in_reply_to_screen_name: Option<String>,
    retweet_count: Option<u64>,
    favorite_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtendedTweet {
    full_text: Option<String>,
    entities: Option<Entities>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    id_str: Option<String>,
    screen_name: Option<String>,
    name: Option<String>,
    followers_count: Option<u64>,
    verified: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    hashtags: Vec<TextEntity>,
    #[serde(default)]
    user_mentions: Vec<MentionEntity>,
    #[serde(default)]
    urls: Vec<UrlEntity>,
    #[serde(default)]
    media: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtendedEntities {
    #[serde(default)]
    media: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TextEntity {
    text: String,
}

#[derive(Debug, Deserialize)]
struct MentionEntity {
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct UrlEntity {
    expanded_url: Option<String>,
    url: Option<String>,
}

impl RawTweet {
    fn tweet_id(&self) -> Option<String> {
        self.id_str
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.id.map(|id| id.to_string()))
    }

    fn text(&self) -> String {
        self.full_text
            .as_ref()
            .or_else(|| self.extended_tweet.as_ref().and_then(|e| e.full_text.as_ref()))
            .or(self.text.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Entities of the full text when the tweet was truncated
    fn entities(&self) -> &Entities {
        self.extended_tweet
            .as_ref()
            .and_then(|e| e.entities.as_ref())
            .unwrap_or(&self.entities)
    }

    fn tweet_type(&self) -> TweetType {
        if self.retweeted_status.is_some() {
            TweetType::Retweet
        } else if self.quoted_status.is_some() || self.quoted_status_id_str.is_some() {
            TweetType::Quote
        } else if self.in_reply_to_status_id_str.is_some() {
            TweetType::Reply
        } else {
            TweetType::Original
        }
    }

    fn created_at(&self) -> std::result::Result<DateTime<Utc>, String> {
        if let Some(ref created_at) = self.created_at {
            return parse_created_at(created_at);
        }
        if let Some(ref millis) = self.timestamp_ms {
            return millis
                .parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| format!("invalid timestamp_ms: {}", millis));
        }
        Err("missing created_at".to_string())
    }

    fn screen_name(&self) -> Option<String> {
        self.user.as_ref().and_then(|u| u.screen_name.clone())
    }
}

fn parse_created_at(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_str(value, TWITTER_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid created_at {:?}: {}", value, e))
}

impl TweetDocument {
    /// Transform a raw tweet into a document for `dataset_id`.
    ///
    /// A tweet without an id or a readable creation time is a
    /// `MalformedRecord`.
    pub fn from_record(record: RawRecord, dataset_id: &str, store_tweet: bool) -> Result<Self> {
        let malformed = |reason: String| {
            TweetsetError::malformed(record.source.to_path_buf(), record.line, reason)
        };

        let raw = RawTweet::deserialize(&record.value).map_err(|e| malformed(e.to_string()))?;
        let id = raw
            .tweet_id()
            .ok_or_else(|| malformed("missing id_str and id".to_string()))?;
        let created_at = raw.created_at().map_err(malformed)?;

        let entities = raw.entities();
        let hashtags = entities
            .hashtags
            .iter()
            .map(|h| h.text.to_lowercase())
            .collect();
        let mentions = entities
            .user_mentions
            .iter()
            .map(|m| m.screen_name.clone())
            .collect();
        let urls = entities
            .urls
            .iter()
            .filter_map(|u| u.expanded_url.clone().or_else(|| u.url.clone()))
            .collect();
        let has_media = !entities.media.is_empty()
            || raw
                .extended_entities
                .as_ref()
                .is_some_and(|e| !e.media.is_empty());

        let retweet_quoted_screen_name = raw
            .retweeted_status
            .as_deref()
            .or(raw.quoted_status.as_deref())
            .and_then(RawTweet::screen_name);

        let user = raw.user.as_ref();
        let document = Self {
            tweet_id: id.clone(),
            id,
            dataset_id: dataset_id.to_string(),
            created_at,
            text: raw.text(),
            tweet_type: raw.tweet_type(),
            lang: raw.lang.clone(),
            user_id: user.and_then(|u| u.id_str.clone()),
            user_screen_name: user.and_then(|u| u.screen_name.clone()),
            user_name: user.and_then(|u| u.name.clone()),
            user_followers_count: user.and_then(|u| u.followers_count),
            user_verified: user.and_then(|u| u.verified).unwrap_or(false),
            hashtags,
            mentions,
            urls,
            has_media,
            in_reply_to_screen_name: raw.in_reply_to_screen_name.clone(),
            retweet_quoted_screen_name,
            retweet_count: raw.retweet_count.unwrap_or(0),
            favorite_count: raw.favorite_count.unwrap_or(0),
            tweet: None,
        };

        Ok(Self {
            tweet: store_tweet.then_some(record.value),
            ..document
        })
    }

    /// Index action for the bulk API
    pub fn into_bulk_operation(self, index: &str) -> Result<BulkOperation> {
        let id = self.id.clone();
        let source = serde_json::to_value(&self)?;
        Ok(BulkOperation::index(index, id, source))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    pub(crate) fn raw(value: Value) -> RawRecord {
        RawRecord {
            source: Arc::from(Path::new("/data/tweets.json")),
            line: 1,
            value,
        }
    }

    fn sample_tweet() -> Value {
        json!({
            "id": 1050118621198921728u64,
            "id_str": "1050118621198921728",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "text": "To make room for more expression, we will now count all emojis as equal\u{2026}",
            "truncated": true,
            "extended_tweet": {
                "full_text": "To make room for more expression, we will now count all emojis as equal #Emoji",
                "entities": {
                    "hashtags": [{"text": "Emoji"}],
                    "user_mentions": [{"screen_name": "TwitterDev"}],
                    "urls": [{"url": "https://t.co/x", "expanded_url": "https://example.com/x"}]
                }
            },
            "entities": {"hashtags": [], "user_mentions": [], "urls": []},
            "lang": "en",
            "user": {
                "id_str": "6253282",
                "screen_name": "TwitterAPI",
                "name": "Twitter API",
                "followers_count": 6133636,
                "verified": true
            },
            "retweet_count": 161,
            "favorite_count": 296
        })
    }

    #[test]
    fn test_transform_original_tweet() {
        let doc = TweetDocument::from_record(raw(sample_tweet()), "abc123", false).unwrap();

        assert_eq!(doc.id, "1050118621198921728");
        assert_eq!(doc.tweet_id, doc.id);
        assert_eq!(doc.dataset_id, "abc123");
        assert_eq!(doc.created_at.to_rfc3339(), "2018-10-10T20:19:24+00:00");
        assert!(doc.text.ends_with("#Emoji"));
        assert_eq!(doc.tweet_type, TweetType::Original);
        assert_eq!(doc.hashtags, vec!["emoji"]);
        assert_eq!(doc.mentions, vec!["TwitterDev"]);
        assert_eq!(doc.urls, vec!["https://example.com/x"]);
        assert_eq!(doc.user_screen_name.as_deref(), Some("TwitterAPI"));
        assert!(doc.user_verified);
        assert_eq!(doc.retweet_count, 161);
        assert!(doc.tweet.is_none());
    }

    #[test]
    fn test_store_tweet_keeps_payload() {
        let doc = TweetDocument::from_record(raw(sample_tweet()), "abc123", true).unwrap();
        assert_eq!(doc.tweet, Some(sample_tweet()));

        let op = doc.into_bulk_operation("tweets-abc123").unwrap();
        assert_eq!(op.id, "1050118621198921728");
        assert_eq!(op.source["tweet"]["id_str"], "1050118621198921728");
        assert_eq!(op.source["dataset_id"], "abc123");
        assert!(op.source.get("id").is_none());
    }

    #[test]
    fn test_payload_omitted_when_not_stored() {
        let doc = TweetDocument::from_record(raw(sample_tweet()), "abc123", false).unwrap();
        let op = doc.into_bulk_operation("tweets-abc123").unwrap();
        assert!(op.source.get("tweet").is_none());
        assert_eq!(op.source["created_at"], "2018-10-10T20:19:24Z");
    }

    #[test]
    fn test_tweet_types() {
        let retweet = json!({
            "id_str": "2",
            "created_at": "Thu Oct 11 10:00:00 +0000 2018",
            "text": "RT @TwitterAPI: hello",
            "retweeted_status": {
                "id_str": "1",
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "user": {"screen_name": "TwitterAPI"}
            }
        });
        let doc = TweetDocument::from_record(raw(retweet), "d", false).unwrap();
        assert_eq!(doc.tweet_type, TweetType::Retweet);
        assert_eq!(doc.retweet_quoted_screen_name.as_deref(), Some("TwitterAPI"));

        let quote = json!({"id_str": "3", "created_at": "2018-10-11T10:00:00Z", "quoted_status_id_str": "1"});
        let doc = TweetDocument::from_record(raw(quote), "d", false).unwrap();
        assert_eq!(doc.tweet_type, TweetType::Quote);

        let reply = json!({
            "id": 4,
            "timestamp_ms": "1539202764000",
            "in_reply_to_status_id_str": "1",
            "in_reply_to_screen_name": "TwitterAPI"
        });
        let doc = TweetDocument::from_record(raw(reply), "d", false).unwrap();
        assert_eq!(doc.id, "4");
        assert_eq!(doc.tweet_type, TweetType::Reply);
        assert_eq!(doc.created_at.timestamp_millis(), 1539202764000);
    }

    #[test]
    fn test_malformed_records() {
        let no_id = json!({"created_at": "Wed Oct 10 20:19:24 +0000 2018"});
        let err = TweetDocument::from_record(raw(no_id), "d", false).unwrap_err();
        assert!(err.is_malformed());

        let bad_date = json!({"id_str": "1", "created_at": "yesterday"});
        let err = TweetDocument::from_record(raw(bad_date), "d", false).unwrap_err();
        assert!(err.to_string().contains("/data/tweets.json:1"));

        let not_object = json!([1, 2, 3]);
        assert!(TweetDocument::from_record(raw(not_object), "d", false)
            .unwrap_err()
            .is_malformed());
    }
}
