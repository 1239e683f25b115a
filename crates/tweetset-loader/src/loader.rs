//! Bulk load orchestration
//!
//! [`Loader::load`] runs the whole ingestion pipeline for one dataset:
//!
//! 1. Look up the dataset in the registry
//! 2. Enumerate (and unless told otherwise, count) the tweet files
//! 3. Size and create the tweet index
//! 4. Stream, transform and chunk the records, bulk writing each chunk
//! 5. Recompute the dataset's stats
//!
//! Chunks are written one at a time. A chunk that fails at the connection
//! level is retried on a fresh connection after a fixed sleep; once the
//! retry budget is spent the load stops and the chunks already written stay
//! indexed. Document ids are the tweet ids, so running the same load again
//! overwrites rather than duplicates.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tweetset_common::Result;

use crate::chunk::ChunkExt;
use crate::config::{LoaderConfig, MalformedRecordPolicy};
use crate::document::TweetDocument;
use crate::es::{BulkOperation, BulkSummary, Connector, IndexingService};
use crate::files::{count_lines, find_files};
use crate::lifecycle::{create_dataset_index, dataset_index_name};
use crate::registry::require_dataset;
use crate::stats::{update_dataset_stats, DatasetStats};
use crate::stream::RecordStream;

/// Replica count used when none is given
pub const DEFAULT_REPLICAS: u32 = 1;

/// Per-load options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Stop after this many documents; skipped records do not count
    pub limit: Option<u64>,
    /// Skip the line count; shard sizing then falls back to one shard
    pub skip_count: bool,
    /// Keep the full tweet payload on each document
    pub store_tweet: bool,
    /// Overrides the shard sizing heuristic
    pub shards: Option<u32>,
    pub replicas: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limit: None,
            skip_count: false,
            store_tweet: false,
            shards: None,
            replicas: DEFAULT_REPLICAS,
        }
    }
}

/// What a completed load did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub dataset_id: String,
    pub path: PathBuf,
    pub files: usize,
    /// Lines counted up front (0 when counting was skipped)
    pub counted: u64,
    /// Documents accepted by the indexing service
    pub loaded: u64,
    /// Malformed records dropped under the skip policy
    pub skipped: u64,
    /// Documents the indexing service rejected individually
    pub rejected: u64,
    pub chunks: u64,
    /// Extra bulk attempts caused by connection errors
    pub retries: u32,
    pub shards: u32,
    pub stats: DatasetStats,
}

/// Bulk loader bound to a source of indexing service connections
#[derive(Debug)]
pub struct Loader<C> {
    connector: C,
    config: LoaderConfig,
}

impl<C: Connector> Loader<C> {
    pub fn new(connector: C, config: LoaderConfig) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Open a new indexing service connection
    pub fn connect(&self) -> Result<C::Service> {
        self.connector.connect()
    }

    /// Load every tweet file under `path` into the dataset's index
    pub async fn load(
        &self,
        dataset_id: &str,
        path: &Path,
        options: &LoadOptions,
    ) -> Result<LoadReport> {
        let mut service = self.connect()?;
        let mut dataset = require_dataset(&service, dataset_id).await?;

        let store_tweet = options.store_tweet || self.config.store_tweet;
        if store_tweet {
            info!("Storing tweet");
        }

        let files = find_files(path)?;
        let file_count = files.file_count();
        let counted = if options.skip_count {
            0
        } else {
            info!("Counting tweets in {} files.", file_count);
            let total = count_lines(&files)?;
            info!("{} total tweets", total);
            total
        };

        let shards = self
            .config
            .shard_sizing
            .shard_count(options.shards, counted, store_tweet);
        info!(
            "Using {} shards and {} replicas for index.",
            shards, options.replicas
        );
        create_dataset_index(&service, dataset_id, shards, options.replicas).await?;

        let index = dataset_index_name(dataset_id);
        let total_hint = options
            .limit
            .or_else(|| (!options.skip_count).then_some(counted));
        let policy = self.config.malformed_records;
        let mut skipped = 0u64;

        // Limit counts documents, not skipped records
        let limit = options
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let operations = RecordStream::new(&files, total_hint, None)
            .map(|record| {
                record
                    .and_then(|r| TweetDocument::from_record(r, dataset_id, store_tweet))
                    .and_then(|doc| doc.into_bulk_operation(&index))
            })
            .filter_map(|op| match op {
                Err(e) if e.is_malformed() && policy == MalformedRecordPolicy::Skip => {
                    warn!(error = %e, "Skipping malformed record");
                    skipped += 1;
                    None
                },
                other => Some(other),
            })
            .take(limit);

        let mut totals = BulkSummary::default();
        let mut chunks = 0u64;
        let mut retries = 0u32;

        for chunk in operations.chunked(self.config.chunk_size) {
            let batch = chunk.into_iter().collect::<Result<Vec<_>>>()?;
            let (summary, chunk_retries) = self.submit_chunk(&mut service, &batch).await?;
            totals.submitted += summary.submitted;
            totals.failed += summary.failed;
            retries += chunk_retries;
            chunks += 1;
        }

        let loaded = (totals.submitted - totals.failed) as u64;
        info!(
            dataset_id,
            loaded,
            skipped,
            rejected = totals.failed,
            chunks,
            retries,
            "Finished loading tweets"
        );

        // Give the index a moment so the stats see the last chunk
        tokio::time::sleep(self.config.stats_settle).await;
        let stats = update_dataset_stats(&service, &mut dataset).await?;

        Ok(LoadReport {
            dataset_id: dataset_id.to_string(),
            path: path.to_path_buf(),
            files: file_count,
            counted,
            loaded,
            skipped,
            rejected: totals.failed as u64,
            chunks,
            retries,
            shards,
            stats,
        })
    }

    /// Bulk write one chunk, reconnecting and retrying on connection errors.
    ///
    /// Returns the summary and the number of retries it took. Other errors
    /// are returned immediately.
    async fn submit_chunk(
        &self,
        service: &mut C::Service,
        batch: &[BulkOperation],
    ) -> Result<(BulkSummary, u32)> {
        let retry = self.config.retry;
        let mut attempt = 1u32;
        let mut reconnect = false;

        loop {
            // A failed reconnect uses up an attempt like a failed bulk call
            let outcome = if reconnect {
                match self.connector.connect() {
                    Ok(fresh) => {
                        *service = fresh;
                        service.bulk(batch).await
                    },
                    Err(e) => Err(e),
                }
            } else {
                service.bulk(batch).await
            };

            match outcome {
                Ok(summary) => return Ok((summary, attempt - 1)),
                Err(e) if e.is_connection() && attempt < retry.max_attempts => {
                    warn!(
                        "Sleeping {:?} after connection error {} of {}: {}",
                        retry.backoff, attempt, retry.max_attempts, e
                    );
                    attempt += 1;
                    tokio::time::sleep(retry.backoff).await;
                    reconnect = true;
                },
                Err(e) => {
                    if e.is_connection() {
                        warn!(
                            attempts = attempt,
                            "Giving up on chunk after repeated connection errors"
                        );
                    }
                    return Err(e);
                },
            }
        }
    }
}
