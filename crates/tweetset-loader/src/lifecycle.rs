//! Index lifecycle management
//!
//! Create, delete and truncate the per-dataset tweet indexes and the dataset
//! registry index. Every operation is idempotent and reports what it found
//! through [`IndexCreation`] / [`IndexDeletion`] rather than status codes.

use serde_json::{json, Value};
use tracing::{debug, info};
use tweetset_common::Result;

use crate::es::{IndexCreation, IndexDeletion, IndexingService};

/// Index holding one document per dataset
pub const REGISTRY_INDEX: &str = "tweetsets";

/// Prefix of every dataset's tweet index
pub const TWEET_INDEX_PREFIX: &str = "tweets-";

/// Name of the tweet index for `dataset_id`
pub fn dataset_index_name(dataset_id: &str) -> String {
    format!("{}{}", TWEET_INDEX_PREFIX, dataset_id)
}

/// Settings and mappings for a dataset's tweet index
pub fn tweet_index_body(shards: u32, replicas: u32) -> Value {
    json!({
        "settings": {
            "number_of_shards": shards,
            "number_of_replicas": replicas
        },
        "mappings": {
            "properties": {
                "tweet_id": { "type": "keyword" },
                "dataset_id": { "type": "keyword" },
                "created_at": { "type": "date" },
                "text": { "type": "text" },
                "tweet_type": { "type": "keyword" },
                "lang": { "type": "keyword" },
                "user_id": { "type": "keyword" },
                "user_screen_name": { "type": "keyword" },
                "user_name": { "type": "text" },
                "user_followers_count": { "type": "long" },
                "user_verified": { "type": "boolean" },
                "hashtags": { "type": "keyword" },
                "mentions": { "type": "keyword" },
                "urls": { "type": "keyword" },
                "has_media": { "type": "boolean" },
                "in_reply_to_screen_name": { "type": "keyword" },
                "retweet_quoted_screen_name": { "type": "keyword" },
                "retweet_count": { "type": "long" },
                "favorite_count": { "type": "long" },
                "tweet": { "type": "object", "enabled": false }
            }
        }
    })
}

/// Mappings for the registry index. Descriptive metadata is mapped
/// dynamically; only the computed stats are pinned.
pub fn registry_index_body() -> Value {
    json!({
        "mappings": {
            "properties": {
                "first_tweet_created_at": { "type": "date" },
                "last_tweet_created_at": { "type": "date" },
                "tweet_count": { "type": "long" }
            }
        }
    })
}

pub async fn create_dataset_index<S>(
    service: &S,
    dataset_id: &str,
    shards: u32,
    replicas: u32,
) -> Result<IndexCreation>
where
    S: IndexingService + ?Sized,
{
    let index = dataset_index_name(dataset_id);
    let outcome = service
        .create_index(&index, &tweet_index_body(shards, replicas))
        .await?;

    match outcome {
        IndexCreation::Created => info!(index = %index, shards, replicas, "Created tweet index"),
        IndexCreation::AlreadyExists => debug!(index = %index, "Tweet index already exists"),
    }
    Ok(outcome)
}

pub async fn delete_dataset_index<S>(service: &S, dataset_id: &str) -> Result<IndexDeletion>
where
    S: IndexingService + ?Sized,
{
    let index = dataset_index_name(dataset_id);
    let outcome = service.delete_index(&index).await?;

    match outcome {
        IndexDeletion::Deleted => info!(index = %index, "Deleted tweets from {}", dataset_id),
        IndexDeletion::NotFound => debug!(index = %index, "No tweet index to delete"),
    }
    Ok(outcome)
}

/// Remove every tweet of a dataset while keeping its index layout.
///
/// Reads the current shard and replica counts, deletes the index and
/// recreates it empty with the same counts. Returns `NotFound` without
/// creating anything if the dataset has no index.
pub async fn truncate_dataset_index<S>(service: &S, dataset_id: &str) -> Result<IndexDeletion>
where
    S: IndexingService + ?Sized,
{
    let index = dataset_index_name(dataset_id);
    let Some(settings) = service.index_settings(&index).await? else {
        debug!(index = %index, "No tweet index to truncate");
        return Ok(IndexDeletion::NotFound);
    };

    let outcome = delete_dataset_index(service, dataset_id).await?;
    create_dataset_index(service, dataset_id, settings.shards, settings.replicas).await?;

    info!(
        index = %index,
        shards = settings.shards,
        replicas = settings.replicas,
        "Truncated tweet index"
    );
    Ok(outcome)
}

/// Ensure the registry index exists
pub async fn create_registry_index<S>(service: &S) -> Result<IndexCreation>
where
    S: IndexingService + ?Sized,
{
    let outcome = service
        .create_index(REGISTRY_INDEX, &registry_index_body())
        .await?;
    if outcome == IndexCreation::Created {
        info!(index = REGISTRY_INDEX, "Created dataset registry index");
    }
    Ok(outcome)
}

pub async fn delete_registry_index<S>(service: &S) -> Result<IndexDeletion>
where
    S: IndexingService + ?Sized,
{
    service.delete_index(REGISTRY_INDEX).await
}
