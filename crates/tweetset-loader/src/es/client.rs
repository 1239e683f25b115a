//! HTTP client for the indexing service
//!
//! Speaks the Elasticsearch REST API over `reqwest`. Any failure before a
//! response arrives (refused connection, timeout, reset while reading) is a
//! `Connection` error; the bulk loader retries those.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use tweetset_common::{Result, TweetsetError};

use super::endpoints;
use super::types::{BulkOperation, BulkSummary, IndexCreation, IndexDeletion, IndexSettings};
use super::{Connector, IndexingService};
use crate::config::EsConfig;

/// Rejected bulk items logged per request
const MAX_LOGGED_ITEM_ERRORS: usize = 3;

/// Indexing service client
#[derive(Debug, Clone)]
pub struct EsClient {
    client: Client,
    base_url: String,
}

impl EsClient {
    pub fn new(config: &EsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TweetsetError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn transport_error(err: reqwest::Error) -> TweetsetError {
    TweetsetError::Connection(err.to_string())
}

/// `error.type` from an Elasticsearch error body
fn error_type(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .get("type")?
        .as_str()
        .map(str::to_string)
}

async fn read_body(response: Response) -> Result<String> {
    response.text().await.map_err(transport_error)
}

async fn read_json(response: Response) -> Result<Value> {
    let text = read_body(response).await?;
    Ok(serde_json::from_str(&text)?)
}

async fn service_error(response: Response) -> TweetsetError {
    let status = response.status().as_u16();
    match read_body(response).await {
        Ok(body) => TweetsetError::Service { status, body },
        Err(e) => e,
    }
}

fn setting_as_u32(settings: &Value, key: &str) -> Option<u32> {
    match settings.get(key)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}

#[async_trait]
impl IndexingService for EsClient {
    async fn create_index(&self, index: &str, body: &Value) -> Result<IndexCreation> {
        let response = self
            .client
            .put(endpoints::index_url(&self.base_url, index))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(IndexCreation::Created);
        }

        let text = read_body(response).await?;
        if status == StatusCode::BAD_REQUEST
            && error_type(&text).as_deref() == Some("resource_already_exists_exception")
        {
            debug!(index, "Index already exists");
            return Ok(IndexCreation::AlreadyExists);
        }

        Err(TweetsetError::Service {
            status: status.as_u16(),
            body: text,
        })
    }

    async fn delete_index(&self, index: &str) -> Result<IndexDeletion> {
        let response = self
            .client
            .delete(endpoints::index_url(&self.base_url, index))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            s if s.is_success() => Ok(IndexDeletion::Deleted),
            StatusCode::NOT_FOUND => Ok(IndexDeletion::NotFound),
            _ => Err(service_error(response).await),
        }
    }

    async fn index_settings(&self, index: &str) -> Result<Option<IndexSettings>> {
        let response = self
            .client
            .get(endpoints::settings_url(&self.base_url, index))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            s if !s.is_success() => return Err(service_error(response).await),
            _ => {},
        }

        let body = read_json(response).await?;
        let settings = body
            .get(index)
            .and_then(|i| i.pointer("/settings/index"))
            .ok_or_else(|| TweetsetError::Service {
                status: 200,
                body: format!("settings for {} missing from response", index),
            })?;

        match (
            setting_as_u32(settings, "number_of_shards"),
            setting_as_u32(settings, "number_of_replicas"),
        ) {
            (Some(shards), Some(replicas)) => Ok(Some(IndexSettings { shards, replicas })),
            _ => Err(TweetsetError::Service {
                status: 200,
                body: format!("unreadable shard settings for {}: {}", index, settings),
            }),
        }
    }

    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkSummary> {
        if operations.is_empty() {
            return Ok(BulkSummary::default());
        }

        let mut body = String::new();
        for op in operations {
            op.write_ndjson(&mut body)?;
        }

        let response = self
            .client
            .post(endpoints::bulk_url(&self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let result = read_json(response).await?;
        let mut summary = BulkSummary {
            submitted: operations.len(),
            failed: 0,
        };

        if result.get("errors").and_then(Value::as_bool) == Some(true) {
            let rejected: Vec<&Value> = result
                .get("items")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.get("index").and_then(|i| i.get("error")))
                        .collect()
                })
                .unwrap_or_default();

            summary.failed = rejected.len();
            for error in rejected.iter().take(MAX_LOGGED_ITEM_ERRORS) {
                warn!(error = %error, "Bulk item rejected");
            }
            warn!(
                failed = summary.failed,
                submitted = summary.submitted,
                "Bulk request had rejected items"
            );
        }

        Ok(summary)
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(endpoints::search_url(&self.base_url, index))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        read_json(response).await
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(endpoints::document_url(&self.base_url, index, id))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let mut body = read_json(response).await?;
                Ok(body.get_mut("_source").map(Value::take))
            },
            _ => Err(service_error(response).await),
        }
    }

    async fn put_document(&self, index: &str, id: &str, source: &Value) -> Result<()> {
        let response = self
            .client
            .put(endpoints::document_url(&self.base_url, index, id))
            .query(&[("refresh", "wait_for")])
            .json(source)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool> {
        let response = self
            .client
            .delete(endpoints::document_url(&self.base_url, index, id))
            .query(&[("refresh", "wait_for")])
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(service_error(response).await),
        }
    }
}

/// Builds a fresh [`EsClient`] on every connect
#[derive(Debug, Clone)]
pub struct EsConnector {
    config: EsConfig,
}

impl EsConnector {
    pub fn new(config: EsConfig) -> Self {
        Self { config }
    }
}

impl Connector for EsConnector {
    type Service = EsClient;

    fn connect(&self) -> Result<EsClient> {
        debug!(url = %self.config.url, "Connecting to indexing service");
        EsClient::new(&self.config)
    }
}
