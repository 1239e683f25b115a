//! Error types for the tweetset loader

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, TweetsetError>;

/// Main error type for the loader
#[derive(Error, Debug)]
pub enum TweetsetError {
    /// The referenced dataset identifier has no registry entry
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Transport-level failure talking to the indexing service
    #[error("Connection error: {0}")]
    Connection(String),

    /// Missing or unreadable input path
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input line could not be turned into a record or document
    #[error("Malformed record at {path}:{line}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// The indexing service answered with an unexpected status
    #[error("Indexing service returned {status}: {body}")]
    Service { status: u16, body: String },

    /// Every generated dataset identifier was already taken
    #[error("No unused dataset id after {0} attempts")]
    IdAllocation(u32),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TweetsetError {
    /// Create a filesystem error for `path`
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed record error
    pub fn malformed(path: impl Into<PathBuf>, line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures that the bulk loader retries
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// True for records that a skip policy may drop
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}
