//! TweetSet Loader Library
//!
//! Loads tweet collections from local files into an Elasticsearch-compatible
//! indexing service and keeps a registry of the loaded datasets.
//!
//! # Overview
//!
//! - **Input**: [`files`] finds and counts tweet files, [`stream`] reads them
//!   lazily line by line (plain or gzip)
//! - **Transformation**: [`document`] turns raw tweets into indexed documents
//! - **Loading**: [`loader`] chunks documents ([`chunk`]) and bulk writes
//!   them, retrying on connection failures
//! - **Indexes**: [`shards`] sizes new indexes, [`lifecycle`] creates,
//!   truncates and deletes them
//! - **Datasets**: [`registry`] stores dataset metadata, [`stats`] writes
//!   back counts and time ranges
//! - **Service access**: [`es`] defines the indexing service interface and
//!   its HTTP client

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod chunk;
pub mod commands;
pub mod config;
pub mod document;
pub mod es;
pub mod files;
pub mod lifecycle;
pub mod loader;
pub mod registry;
pub mod shards;
pub mod stats;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::LoaderConfig;
pub use loader::{LoadOptions, LoadReport, Loader};
pub use registry::Dataset;
pub use tweetset_common::{Result, TweetsetError};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::files::DATASET_FILENAME;
use crate::loader::DEFAULT_REPLICAS;

/// Default directory holding a dataset's files
pub const DEFAULT_DATASET_PATH: &str = "/dataset";

/// TweetSet loader - load tweet datasets into Elasticsearch
#[derive(Parser, Debug)]
#[command(name = "tweetset-loader")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Dataset and index options shared by the loading commands
#[derive(clap::Args, Debug, Clone)]
pub struct LoadArgs {
    /// Limit the number of tweets to load
    #[arg(long)]
    pub limit: Option<u64>,

    /// Skip counting the tweets
    #[arg(long)]
    pub skip_count: bool,

    /// Store the entire tweet
    #[arg(long)]
    pub store_tweet: bool,

    /// Number of replicas to make of this dataset
    #[arg(long, default_value_t = DEFAULT_REPLICAS)]
    pub replicas: u32,
}

impl LoadArgs {
    pub fn options(&self, shards: Option<u32>) -> LoadOptions {
        LoadOptions {
            limit: self.limit,
            skip_count: self.skip_count,
            store_tweet: self.store_tweet,
            shards,
            replicas: self.replicas,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a dataset
    Create {
        /// Path of dataset
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        path: PathBuf,

        /// Filename of dataset file
        #[arg(long, default_value = DATASET_FILENAME)]
        filename: String,

        /// Number of shards for this dataset; creates the index now
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        shards: Option<u32>,
    },

    /// Update dataset metadata
    Update {
        /// Identifier for the dataset
        dataset_identifier: String,

        /// Path of dataset
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        path: PathBuf,

        /// Filename of dataset file
        #[arg(long, default_value = DATASET_FILENAME)]
        filename: String,

        /// Also update dataset statistics
        #[arg(long)]
        stats: bool,

        /// Create if it does not exist
        #[arg(long)]
        create: bool,
    },

    /// Delete dataset and tweets
    Delete {
        /// Identifier for the dataset
        dataset_identifier: String,
    },

    /// Delete tweets for a dataset
    Truncate {
        /// Identifier for the dataset
        dataset_identifier: String,
    },

    /// Add tweets to a dataset
    Tweets {
        /// Identifier for the dataset
        dataset_identifier: String,

        /// Path of the directory containing the tweet files
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        path: PathBuf,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Create a dataset and add tweets
    Dataset {
        /// Path of dataset
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        path: PathBuf,

        /// Filename of dataset file
        #[arg(long, default_value = DATASET_FILENAME)]
        filename: String,

        /// Number of shards for this dataset
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        shards: Option<u32>,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Delete all indexes
    Clear,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tweets_defaults() {
        let cli = Cli::parse_from(["tweetset-loader", "tweets", "abc123"]);
        match cli.command {
            Commands::Tweets {
                dataset_identifier,
                path,
                load,
            } => {
                assert_eq!(dataset_identifier, "abc123");
                assert_eq!(path, PathBuf::from("/dataset"));
                assert_eq!(load.options(None), LoadOptions::default());
            },
            other => panic!("unexpected {:?}", other),
        }
        assert!(!cli.debug);
    }

    #[test]
    fn test_dataset_options() {
        let cli = Cli::parse_from([
            "tweetset-loader",
            "--debug",
            "dataset",
            "--path",
            "/data/x",
            "--limit",
            "100",
            "--skip-count",
            "--store-tweet",
            "--shards",
            "2",
            "--replicas",
            "0",
        ]);
        assert!(cli.debug);
        let Commands::Dataset {
            path,
            filename,
            shards,
            load,
        } = cli.command
        else {
            panic!("expected dataset command");
        };
        assert_eq!(path, PathBuf::from("/data/x"));
        assert_eq!(filename, "dataset.json");
        assert_eq!(
            load.options(shards),
            LoadOptions {
                limit: Some(100),
                skip_count: true,
                store_tweet: true,
                shards: Some(2),
                replicas: 0,
            }
        );
    }

    #[test]
    fn test_update_flags() {
        let cli = Cli::parse_from(["tweetset-loader", "update", "abc123", "--stats", "--create"]);
        assert!(matches!(
            cli.command,
            Commands::Update {
                stats: true,
                create: true,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_shards_rejected() {
        for command in ["create", "dataset"] {
            let err = Cli::try_parse_from(["tweetset-loader", command, "--shards", "0"])
                .unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
        assert!(Cli::try_parse_from(["tweetset-loader", "create", "--shards", "1"]).is_ok());
    }
}
