//! Dataset registry
//!
//! One document per dataset in the [`REGISTRY_INDEX`], keyed by the dataset's
//! short identifier. The document holds the descriptive metadata from the
//! dataset's `dataset.json` plus the stats written back after each load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info};
use tweetset_common::{Result, TweetsetError};
use uuid::Uuid;

use crate::es::IndexingService;
use crate::lifecycle::REGISTRY_INDEX;

/// Length of generated dataset identifiers
pub const DATASET_ID_LEN: usize = 6;

/// Generated identifiers tried before giving up
pub const MAX_ID_ATTEMPTS: u32 = 20;

/// Upper bound on datasets returned by [`list_datasets`]
pub const LIST_LIMIT: usize = 10_000;

/// Fields owned by the stats updater; never taken from metadata files
const STATS_FIELDS: [&str; 3] = [
    "first_tweet_created_at",
    "last_tweet_created_at",
    "tweet_count",
];

/// A registered dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub first_tweet_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_tweet_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tweet_count: Option<u64>,
    /// Descriptive metadata, passed through untouched
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Dataset {
    /// New dataset with no stats yet
    pub fn from_metadata(id: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let mut dataset = Self {
            id: id.into(),
            first_tweet_created_at: None,
            last_tweet_created_at: None,
            tweet_count: None,
            metadata: Map::new(),
        };
        dataset.apply_metadata(metadata);
        dataset
    }

    /// Replace the descriptive metadata, keeping the current stats
    pub fn apply_metadata(&mut self, mut metadata: Map<String, Value>) {
        for field in STATS_FIELDS {
            metadata.remove(field);
        }
        self.metadata = metadata;
    }

    fn from_source(id: impl Into<String>, source: Value) -> Result<Self> {
        let mut dataset: Dataset = serde_json::from_value(source)?;
        dataset.id = id.into();
        Ok(dataset)
    }
}

/// Read the metadata object from a dataset description file
pub fn read_dataset_file(path: &Path) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| TweetsetError::filesystem(path, e))?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(metadata) => Ok(metadata),
        other => Err(TweetsetError::config(format!(
            "{} must contain a JSON object, found {}",
            path.display(),
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Random lowercase alphanumeric identifier
pub fn short_uid(len: usize) -> String {
    let mut uid = String::with_capacity(len);
    while uid.len() < len {
        let simple = Uuid::new_v4().simple().to_string();
        uid.extend(simple.chars().take(len - uid.len()));
    }
    uid
}

pub async fn get_dataset<S>(service: &S, dataset_id: &str) -> Result<Option<Dataset>>
where
    S: IndexingService + ?Sized,
{
    match service.get_document(REGISTRY_INDEX, dataset_id).await? {
        Some(source) => Ok(Some(Dataset::from_source(dataset_id, source)?)),
        None => Ok(None),
    }
}

/// Like [`get_dataset`], but a missing dataset is `DatasetNotFound`
pub async fn require_dataset<S>(service: &S, dataset_id: &str) -> Result<Dataset>
where
    S: IndexingService + ?Sized,
{
    get_dataset(service, dataset_id)
        .await?
        .ok_or_else(|| TweetsetError::DatasetNotFound(dataset_id.to_string()))
}

pub async fn save_dataset<S>(service: &S, dataset: &Dataset) -> Result<()>
where
    S: IndexingService + ?Sized,
{
    let source = serde_json::to_value(dataset)?;
    service
        .put_document(REGISTRY_INDEX, &dataset.id, &source)
        .await?;
    debug!(dataset_id = %dataset.id, "Saved dataset");
    Ok(())
}

/// Returns `false` if there was nothing to delete
pub async fn delete_dataset<S>(service: &S, dataset_id: &str) -> Result<bool>
where
    S: IndexingService + ?Sized,
{
    service.delete_document(REGISTRY_INDEX, dataset_id).await
}

/// Every registered dataset. An absent registry index lists nothing.
pub async fn list_datasets<S>(service: &S) -> Result<Vec<Dataset>>
where
    S: IndexingService + ?Sized,
{
    let query = json!({ "query": { "match_all": {} }, "size": LIST_LIMIT });
    let response = match service.search(REGISTRY_INDEX, &query).await {
        Ok(response) => response,
        Err(TweetsetError::Service { status: 404, .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.into_iter()
        .filter_map(|mut hit| {
            let id = hit.get("_id")?.as_str()?.to_string();
            let source = hit.get_mut("_source").map(Value::take)?;
            Some(Dataset::from_source(id, source))
        })
        .collect()
}

/// Register a new dataset under a freshly generated identifier
pub async fn create_dataset<S>(service: &S, metadata: Map<String, Value>) -> Result<Dataset>
where
    S: IndexingService + ?Sized,
{
    let id = unused_dataset_id(service).await?;
    let dataset = Dataset::from_metadata(id, metadata);
    save_dataset(service, &dataset).await?;
    info!(dataset_id = %dataset.id, "Created {}", dataset.id);
    Ok(dataset)
}

async fn unused_dataset_id<S>(service: &S) -> Result<String>
where
    S: IndexingService + ?Sized,
{
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = short_uid(DATASET_ID_LEN);
        if service
            .get_document(REGISTRY_INDEX, &candidate)
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
        debug!(candidate = %candidate, "Dataset id taken, generating another");
    }
    Err(TweetsetError::IdAllocation(MAX_ID_ATTEMPTS))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::MemoryService;
    use std::fs;
    use tempfile::TempDir;

    fn metadata(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_short_uid() {
        for len in [1, 6, 40] {
            let uid = short_uid(len);
            assert_eq!(uid.len(), len);
            assert!(uid
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_metadata_never_overrides_stats() {
        let mut dataset = Dataset::from_metadata(
            "abc123",
            metadata(json!({"title": "Hurricane", "tweet_count": 99})),
        );
        assert_eq!(dataset.tweet_count, None);
        assert!(!dataset.metadata.contains_key("tweet_count"));

        dataset.tweet_count = Some(10);
        dataset.apply_metadata(metadata(json!({"title": "Hurricane Maria"})));
        assert_eq!(dataset.tweet_count, Some(10));
        assert_eq!(dataset.metadata["title"], "Hurricane Maria");
    }

    #[test]
    fn test_serialized_layout() {
        let dataset = Dataset::from_metadata("abc123", metadata(json!({"title": "x"})));
        let source = serde_json::to_value(&dataset).unwrap();

        assert_eq!(source["title"], "x");
        assert!(source["tweet_count"].is_null());
        assert!(source.get("id").is_none());

        let back = Dataset::from_source("abc123", source).unwrap();
        assert_eq!(back, dataset);
    }

    #[test]
    fn test_read_dataset_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.json");

        fs::write(&path, r#"{"title": "Test", "creator": "me"}"#).unwrap();
        let meta = read_dataset_file(&path).unwrap();
        assert_eq!(meta["creator"], "me");

        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            read_dataset_file(&path).unwrap_err(),
            TweetsetError::Config(_)
        ));

        assert!(matches!(
            read_dataset_file(&dir.path().join("missing.json")).unwrap_err(),
            TweetsetError::Filesystem { .. }
        ));
    }

    #[tokio::test]
    async fn test_create_get_list_delete() {
        let service = MemoryService::default();

        let created = create_dataset(&service, metadata(json!({"title": "One"})))
            .await
            .unwrap();
        assert_eq!(created.id.len(), DATASET_ID_LEN);

        let fetched = require_dataset(&service, &created.id).await.unwrap();
        assert_eq!(fetched, created);

        create_dataset(&service, metadata(json!({"title": "Two"})))
            .await
            .unwrap();
        let mut titles: Vec<String> = list_datasets(&service)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.metadata["title"].as_str().unwrap().to_string())
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["One", "Two"]);

        assert!(delete_dataset(&service, &created.id).await.unwrap());
        assert!(!delete_dataset(&service, &created.id).await.unwrap());
        assert!(matches!(
            require_dataset(&service, &created.id).await.unwrap_err(),
            TweetsetError::DatasetNotFound(id) if id == created.id
        ));
    }

    #[tokio::test]
    async fn test_list_without_registry_index() {
        let service = MemoryService::default();
        assert!(list_datasets(&service).await.unwrap().is_empty());
    }
}
