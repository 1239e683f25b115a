//! Loader configuration
//!
//! Everything tunable about a load comes from environment variables, with
//! defaults that match the behaviour operators expect from the loader.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tweetset_common::{Result, TweetsetError};

use crate::shards::ShardSizing;

/// Default indexing service endpoint (the compose service name)
pub const DEFAULT_ES_URL: &str = "http://elasticsearch:9200";

/// Default request timeout for the indexing service in seconds
pub const DEFAULT_ES_TIMEOUT_SECS: u64 = 90;

/// Default number of documents per bulk request
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Total attempts for a chunk that keeps hitting connection errors
pub const CONNECTION_ERROR_TRIES: u32 = 30;

/// Seconds to sleep between connection error attempts
pub const CONNECTION_ERROR_SLEEP_SECS: u64 = 30;

/// Seconds to wait after the last chunk before computing stats
pub const DEFAULT_STATS_SETTLE_SECS: u64 = 5;

/// What to do with a line that cannot be turned into a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRecordPolicy {
    /// Stop the load with the first malformed record
    #[default]
    Abort,
    /// Log a warning, count the record and keep going
    Skip,
}

impl std::str::FromStr for MalformedRecordPolicy {
    type Err = TweetsetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" | "fail" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(TweetsetError::config(format!(
                "Invalid malformed record policy: {}",
                s
            ))),
        }
    }
}

/// Retry budget for bulk submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per chunk, including the first one
    pub max_attempts: u32,
    /// Fixed sleep between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: CONNECTION_ERROR_TRIES,
            backoff: Duration::from_secs(CONNECTION_ERROR_SLEEP_SECS),
        }
    }
}

/// Connection settings for the indexing service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ES_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_ES_TIMEOUT_SECS),
        }
    }
}

/// Main loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub es: EsConfig,
    /// Forces full payload storage regardless of command options
    pub store_tweet: bool,
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub stats_settle: Duration,
    pub shard_sizing: ShardSizing,
    pub malformed_records: MalformedRecordPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            es: EsConfig::default(),
            store_tweet: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            stats_settle: Duration::from_secs(DEFAULT_STATS_SETTLE_SECS),
            shard_sizing: ShardSizing::default(),
            malformed_records: MalformedRecordPolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from environment variables
    ///
    /// - `ES_URL`, `ES_TIMEOUT_SECS`
    /// - `STORE_TWEET` (true/false)
    /// - `LOADER_CHUNK_SIZE`
    /// - `LOADER_CONNECTION_ERROR_TRIES`, `LOADER_CONNECTION_ERROR_SLEEP_SECS`
    /// - `LOADER_STATS_SETTLE_SECS`
    /// - `LOADER_TWEETS_PER_SHARD_STORED`, `LOADER_TWEETS_PER_SHARD_UNSTORED`
    /// - `LOADER_MALFORMED_RECORDS` (abort/skip)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoaderConfig::from_env`] with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("ES_URL") {
            config.es.url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "ES_TIMEOUT_SECS")? {
            config.es.timeout = Duration::from_secs(secs);
        }
        if let Some(value) = lookup("STORE_TWEET") {
            config.store_tweet = value.eq_ignore_ascii_case("true");
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, "LOADER_CHUNK_SIZE")? {
            if size == 0 {
                return Err(TweetsetError::config("LOADER_CHUNK_SIZE must be at least 1"));
            }
            config.chunk_size = size;
        }
        if let Some(tries) = parse_var::<u32, _>(&lookup, "LOADER_CONNECTION_ERROR_TRIES")? {
            if tries == 0 {
                return Err(TweetsetError::config(
                    "LOADER_CONNECTION_ERROR_TRIES must be at least 1",
                ));
            }
            config.retry.max_attempts = tries;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "LOADER_CONNECTION_ERROR_SLEEP_SECS")? {
            config.retry.backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "LOADER_STATS_SETTLE_SECS")? {
            config.stats_settle = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<u64, _>(&lookup, "LOADER_TWEETS_PER_SHARD_STORED")? {
            config.shard_sizing.tweets_per_shard_stored = n;
        }
        if let Some(n) = parse_var::<u64, _>(&lookup, "LOADER_TWEETS_PER_SHARD_UNSTORED")? {
            config.shard_sizing.tweets_per_shard_unstored = n;
        }
        config.shard_sizing.validate()?;
        if let Some(policy) = lookup("LOADER_MALFORMED_RECORDS") {
            config.malformed_records = policy.parse()?;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| TweetsetError::config(format!("Invalid {}={}: {}", key, raw, e))),
        None => Ok(None),
    }
}
