//! Indexing service request and response types

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One document write in a bulk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperation {
    pub index: String,
    pub id: String,
    pub source: Value,
}

impl BulkOperation {
    /// Create-or-overwrite action for document `id` in `index`
    pub fn index(index: impl Into<String>, id: impl Into<String>, source: Value) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            source,
        }
    }

    /// Append the action and source lines to an NDJSON body
    pub fn write_ndjson(&self, body: &mut String) -> serde_json::Result<()> {
        let action = json!({ "index": { "_index": self.index, "_id": self.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&self.source)?);
        body.push('\n');
        Ok(())
    }
}

/// Outcome of a bulk request that reached the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub submitted: usize,
    /// Items the service rejected individually
    pub failed: usize,
}

/// Result of an idempotent index create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexCreation {
    Created,
    AlreadyExists,
}

/// Result of an idempotent index delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexDeletion {
    Deleted,
    NotFound,
}

/// Shard layout of an existing index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub shards: u32,
    pub replicas: u32,
}
