//! In-memory indexing service for unit tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tweetset_common::{Result, TweetsetError};

use crate::es::{
    BulkOperation, BulkSummary, Connector, IndexCreation, IndexDeletion, IndexSettings,
    IndexingService,
};

#[derive(Debug)]
struct MemoryIndex {
    settings: IndexSettings,
    docs: BTreeMap<String, Value>,
}

impl MemoryIndex {
    fn new(shards: u32, replicas: u32) -> Self {
        Self {
            settings: IndexSettings { shards, replicas },
            docs: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    indexes: HashMap<String, MemoryIndex>,
    failing_bulks: u32,
    bulk_calls: u32,
}

/// Shared-state fake. Clones see the same indexes, the way two connections
/// see the same cluster.
#[derive(Debug, Clone, Default)]
pub struct MemoryService {
    state: Arc<Mutex<State>>,
}

impl MemoryService {
    /// Make the next `n` bulk calls fail with a connection error
    pub fn fail_next_bulks(&self, n: u32) {
        self.state.lock().unwrap().failing_bulks = n;
    }

    pub fn bulk_calls(&self) -> u32 {
        self.state.lock().unwrap().bulk_calls
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.state.lock().unwrap().indexes.contains_key(index)
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .indexes
            .get(index)
            .map_or(0, |i| i.docs.len())
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .indexes
            .get(index)
            .and_then(|i| i.docs.get(id).cloned())
    }

    fn not_found(index: &str) -> TweetsetError {
        TweetsetError::Service {
            status: 404,
            body: format!("no such index [{}]", index),
        }
    }
}

fn term_matches(query: &Value, doc: &Value) -> bool {
    let Some(term) = query.pointer("/query/term").and_then(Value::as_object) else {
        return true;
    };
    term.iter().all(|(field, expected)| {
        let expected = expected.get("value").unwrap_or(expected);
        doc.get(field) == Some(expected)
    })
}

fn created_at_millis(doc: &Value, field: &str) -> Option<f64> {
    let raw = doc.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.timestamp_millis() as f64)
}

fn aggregate(aggs: &Value, docs: &[(&String, &Value)]) -> Value {
    let mut out = serde_json::Map::new();
    for (name, agg) in aggs.as_object().into_iter().flatten() {
        let (kind, params) = agg.as_object().unwrap().iter().next().unwrap();
        let field = params["field"].as_str().unwrap();
        let values = docs.iter().filter_map(|(_, d)| created_at_millis(d, field));
        let value = match kind.as_str() {
            "min" => values.reduce(f64::min),
            "max" => values.reduce(f64::max),
            other => panic!("unsupported aggregation {}", other),
        };
        out.insert(name.clone(), json!({ "value": value }));
    }
    Value::Object(out)
}

#[async_trait]
impl IndexingService for MemoryService {
    async fn create_index(&self, index: &str, body: &Value) -> Result<IndexCreation> {
        let mut state = self.state.lock().unwrap();
        if state.indexes.contains_key(index) {
            return Ok(IndexCreation::AlreadyExists);
        }
        let setting = |key: &str| {
            body.pointer(&format!("/settings/{}", key))
                .and_then(Value::as_u64)
                .map_or(1, |n| n as u32)
        };
        let created = MemoryIndex::new(setting("number_of_shards"), setting("number_of_replicas"));
        state.indexes.insert(index.to_string(), created);
        Ok(IndexCreation::Created)
    }

    async fn delete_index(&self, index: &str) -> Result<IndexDeletion> {
        match self.state.lock().unwrap().indexes.remove(index) {
            Some(_) => Ok(IndexDeletion::Deleted),
            None => Ok(IndexDeletion::NotFound),
        }
    }

    async fn index_settings(&self, index: &str) -> Result<Option<IndexSettings>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .indexes
            .get(index)
            .map(|i| i.settings))
    }

    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkSummary> {
        let mut state = self.state.lock().unwrap();
        state.bulk_calls += 1;
        if state.failing_bulks > 0 {
            state.failing_bulks -= 1;
            return Err(TweetsetError::Connection("connection refused".into()));
        }
        for op in operations {
            state
                .indexes
                .entry(op.index.clone())
                .or_insert_with(|| MemoryIndex::new(1, 1))
                .docs
                .insert(op.id.clone(), op.source.clone());
        }
        Ok(BulkSummary {
            submitted: operations.len(),
            failed: 0,
        })
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let state = self.state.lock().unwrap();
        let target = state.indexes.get(index).ok_or_else(|| Self::not_found(index))?;

        let matching: Vec<(&String, &Value)> = target
            .docs
            .iter()
            .filter(|(_, doc)| term_matches(body, doc))
            .collect();
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let hits: Vec<Value> = matching
            .iter()
            .take(size)
            .map(|(id, doc)| json!({ "_index": index, "_id": id, "_source": doc }))
            .collect();

        let mut response = json!({
            "hits": {
                "total": { "value": matching.len(), "relation": "eq" },
                "hits": hits
            }
        });
        if let Some(aggs) = body.get("aggs") {
            response["aggregations"] = aggregate(aggs, &matching);
        }
        Ok(response)
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>> {
        Ok(self.document(index, id))
    }

    async fn put_document(&self, index: &str, id: &str, source: &Value) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .indexes
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex::new(1, 1))
            .docs
            .insert(id.to_string(), source.clone());
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .indexes
            .get_mut(index)
            .is_some_and(|i| i.docs.remove(id).is_some()))
    }
}

/// Connector over a shared [`MemoryService`] that counts connects
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    pub service: MemoryService,
    connects: Arc<AtomicU32>,
    connect_failures: Arc<Mutex<ConnectFailures>>,
}

#[derive(Debug, Default)]
struct ConnectFailures {
    succeed_first: u32,
    fail_next: u32,
}

impl MemoryConnector {
    /// Connect attempts so far, failed ones included
    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Let `ok` connects through, then fail the following `n` with a
    /// connection error
    pub fn fail_connects_after(&self, ok: u32, n: u32) {
        *self.connect_failures.lock().unwrap() = ConnectFailures {
            succeed_first: ok,
            fail_next: n,
        };
    }
}

impl Connector for MemoryConnector {
    type Service = MemoryService;

    fn connect(&self) -> Result<MemoryService> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let mut failures = self.connect_failures.lock().unwrap();
        if failures.succeed_first > 0 {
            failures.succeed_first -= 1;
        } else if failures.fail_next > 0 {
            failures.fail_next -= 1;
            return Err(TweetsetError::Connection("connection refused".into()));
        }
        Ok(self.service.clone())
    }
}
