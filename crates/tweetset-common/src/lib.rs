//! Tweetset Common Library
//!
//! Shared error handling and logging for the tweetset loader workspace.
//!
//! - **Error Handling**: [`TweetsetError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

pub use error::{Result, TweetsetError};
