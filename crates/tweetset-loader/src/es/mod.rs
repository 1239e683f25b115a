//! Indexing service access
//!
//! The loader talks to an Elasticsearch-compatible REST API through the
//! [`IndexingService`] trait. [`Connector`] hands out fresh service handles;
//! the bulk loader asks for a new one after a connection failure instead of
//! repairing the old one.

pub mod client;
pub mod endpoints;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use tweetset_common::Result;

pub use client::{EsClient, EsConnector};
pub use types::*;

/// Operations the loader needs from the indexing service.
///
/// Implementations map transport failures to `TweetsetError::Connection` and
/// unexpected statuses to `TweetsetError::Service`.
#[async_trait]
pub trait IndexingService: Send + Sync {
    /// Create `index` with the given settings/mappings body
    async fn create_index(&self, index: &str, body: &Value) -> Result<IndexCreation>;

    async fn delete_index(&self, index: &str) -> Result<IndexDeletion>;

    /// Shard and replica counts, or `None` if the index does not exist
    async fn index_settings(&self, index: &str) -> Result<Option<IndexSettings>>;

    /// Write a batch of documents in one request
    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkSummary>;

    /// Run a search request and return the raw response body
    async fn search(&self, index: &str, body: &Value) -> Result<Value>;

    /// `_source` of a document, or `None` if absent
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>>;

    /// Create or replace a document, visible to search on return
    async fn put_document(&self, index: &str, id: &str, source: &Value) -> Result<()>;

    /// Returns `false` if the document did not exist
    async fn delete_document(&self, index: &str, id: &str) -> Result<bool>;
}

/// Source of service handles
pub trait Connector: Send + Sync {
    type Service: IndexingService;

    /// Establish a new handle
    fn connect(&self) -> Result<Self::Service>;
}
