//! Shard sizing for dataset indexes
//!
//! Shard count is fixed when an index is created, so it has to be picked
//! from the record count before any documents are written. The capacities
//! keep a shard near a 40GB ceiling:
//!
//! - 500K tweets with the full payload stored take about 615MB, so
//!   32.5 million tweets fit in one shard.
//! - 500K tweets without the payload take about 145MB, so 138 million
//!   tweets fit in one shard.

use serde::{Deserialize, Serialize};
use tweetset_common::{Result, TweetsetError};

/// Tweets per shard when the full payload is stored
pub const TWEETS_PER_SHARD_STORED: u64 = 32_500_000;

/// Tweets per shard when only derived fields are stored
pub const TWEETS_PER_SHARD_UNSTORED: u64 = 138_000_000;

/// Per-shard capacities used to size a dataset index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSizing {
    pub tweets_per_shard_stored: u64,
    pub tweets_per_shard_unstored: u64,
}

impl Default for ShardSizing {
    fn default() -> Self {
        Self {
            tweets_per_shard_stored: TWEETS_PER_SHARD_STORED,
            tweets_per_shard_unstored: TWEETS_PER_SHARD_UNSTORED,
        }
    }
}

impl ShardSizing {
    /// Reject capacities that would divide by zero or invert the ordering
    pub fn validate(&self) -> Result<()> {
        if self.tweets_per_shard_stored == 0 || self.tweets_per_shard_unstored == 0 {
            return Err(TweetsetError::config("Tweets per shard must be at least 1"));
        }
        if self.tweets_per_shard_stored > self.tweets_per_shard_unstored {
            return Err(TweetsetError::config(
                "Tweets per shard with stored tweets cannot exceed the unstored capacity",
            ));
        }
        Ok(())
    }

    pub fn tweets_per_shard(&self, store_tweet: bool) -> u64 {
        if store_tweet {
            self.tweets_per_shard_stored
        } else {
            self.tweets_per_shard_unstored
        }
    }

    /// Number of shards for a dataset index.
    ///
    /// A non-zero override always wins; zero counts as no override.
    /// Otherwise the count is `max(1, ceil(total_tweets / tweets_per_shard))`;
    /// an unknown total is 0 and yields a single shard.
    pub fn shard_count(&self, requested: Option<u32>, total_tweets: u64, store_tweet: bool) -> u32 {
        if let Some(shards) = requested.filter(|&n| n > 0) {
            return shards;
        }

        let per_shard = self.tweets_per_shard(store_tweet).max(1);
        let shards = total_tweets.div_ceil(per_shard).max(1);
        u32::try_from(shards).unwrap_or(u32::MAX)
    }
}
