//! Dataset statistics
//!
//! After a load the loader asks the tweet index for the dataset's document
//! count and creation time range and writes them back onto the registry
//! entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use tweetset_common::{Result, TweetsetError};

use crate::es::IndexingService;
use crate::lifecycle::dataset_index_name;
use crate::registry::{save_dataset, Dataset};

const CREATED_AT_MIN: &str = "created_at_min";
const CREATED_AT_MAX: &str = "created_at_max";

/// Count and time range of a dataset's indexed tweets.
///
/// An empty (or missing) index has a count of 0 and no timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub tweet_count: u64,
    pub first_tweet_created_at: Option<DateTime<Utc>>,
    pub last_tweet_created_at: Option<DateTime<Utc>>,
}

impl DatasetStats {
    pub fn is_empty(&self) -> bool {
        self.tweet_count == 0
    }

    /// Copy onto a dataset, clearing the timestamps when empty
    pub fn apply_to(&self, dataset: &mut Dataset) {
        dataset.tweet_count = Some(self.tweet_count);
        dataset.first_tweet_created_at = self.first_tweet_created_at;
        dataset.last_tweet_created_at = self.last_tweet_created_at;
    }
}

/// Count plus min/max `created_at`, no hits returned
pub fn stats_query(dataset_id: &str) -> Value {
    json!({
        "query": { "term": { "dataset_id": dataset_id } },
        "size": 0,
        "track_total_hits": true,
        "aggs": {
            (CREATED_AT_MIN): { "min": { "field": "created_at" } },
            (CREATED_AT_MAX): { "max": { "field": "created_at" } }
        }
    })
}

fn total_hits(response: &Value) -> Option<u64> {
    match response.pointer("/hits/total")? {
        Value::Number(n) => n.as_u64(),
        Value::Object(total) => total.get("value")?.as_u64(),
        _ => None,
    }
}

/// Epoch milliseconds of a min/max aggregation, `None` when null
fn aggregation_time(response: &Value, name: &str) -> Option<DateTime<Utc>> {
    let millis = response
        .get("aggregations")?
        .get(name)?
        .get("value")?
        .as_f64()?;
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
}

/// Read stats out of a search response for [`stats_query`]
pub fn parse_stats(response: &Value) -> Result<DatasetStats> {
    let tweet_count = total_hits(response).ok_or_else(|| TweetsetError::Service {
        status: 200,
        body: format!("search response without hits.total: {}", response),
    })?;

    if tweet_count == 0 {
        return Ok(DatasetStats::default());
    }

    Ok(DatasetStats {
        tweet_count,
        first_tweet_created_at: aggregation_time(response, CREATED_AT_MIN),
        last_tweet_created_at: aggregation_time(response, CREATED_AT_MAX),
    })
}

/// Query the dataset's tweet index. A missing index counts as empty.
pub async fn compute_stats<S>(service: &S, dataset_id: &str) -> Result<DatasetStats>
where
    S: IndexingService + ?Sized,
{
    let index = dataset_index_name(dataset_id);
    match service.search(&index, &stats_query(dataset_id)).await {
        Ok(response) => parse_stats(&response),
        Err(TweetsetError::Service { status: 404, .. }) => Ok(DatasetStats::default()),
        Err(e) => Err(e),
    }
}

/// Recompute a dataset's stats and save them to the registry
pub async fn update_dataset_stats<S>(service: &S, dataset: &mut Dataset) -> Result<DatasetStats>
where
    S: IndexingService + ?Sized,
{
    let stats = compute_stats(service, &dataset.id).await?;
    stats.apply_to(dataset);
    save_dataset(service, dataset).await?;

    info!(
        dataset_id = %dataset.id,
        tweet_count = stats.tweet_count,
        first = ?stats.first_tweet_created_at,
        last = ?stats.last_tweet_created_at,
        "Updated dataset stats"
    );
    Ok(stats)
}
