//! Logging configuration and initialization
//!
//! All loader output goes through `tracing`. This module builds the global
//! subscriber from a [`LogConfig`], which can come from the environment:
//!
//! - `LOG_LEVEL`: trace, debug, info, warn, error
//! - `LOG_FORMAT`: text or json
//! - `LOG_OUTPUT`: console or file
//! - `LOG_DIR`: directory for rotated log files
//! - `LOG_FILTER`: extra directives, e.g. `tweetset_loader=trace`
//!
//! HTTP client internals are held at `warn` unless a directive says otherwise,
//! so a debug run shows loader decisions rather than connection chatter.
//!
//! # Example
//!
//! ```no_run
//! use tweetset_common::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env().unwrap_or_default();
//! let _guard = init_logging(&config).ok().flatten();
//! tracing::info!("loader started");
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives applied before any user-supplied filter
const QUIET_DEPENDENCIES: &[&str] = &["reqwest=warn", "hyper=warn", "hyper_util=warn"];

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard error, so progress lines never mix with command output
    #[default]
    Console,
    /// Daily rotated files under `log_dir`
    File,
}

impl std::str::FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stderr" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            _ => Err(anyhow::anyhow!("Invalid log output: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub log_dir: PathBuf,
    /// File name prefix, e.g. "tweetset-loader" -> "tweetset-loader.2024-01-18"
    pub log_file_prefix: String,
    /// Comma separated filter directives appended after the defaults
    pub filter_directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            output: LogOutput::Console,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "tweetset-loader".to_string(),
            filter_directives: None,
        }
    }
}

impl LogConfig {
    /// Load configuration from `LOG_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            config.output = output.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(filter) = std::env::var("LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        Ok(config)
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Build the filter: level, quiet dependencies, then user directives
    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.to_tracing_level().into())
            .parse_lossy("");

        for directive in QUIET_DEPENDENCIES {
            filter = filter.add_directive(directive.parse().context("Invalid default directive")?);
        }

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                filter = filter.add_directive(
                    directive
                        .trim()
                        .parse()
                        .with_context(|| format!("Failed to parse filter directive: {}", directive))?,
                );
            }
        }

        Ok(filter)
    }
}

/// Install the global subscriber. Call once at startup.
///
/// File output returns the background writer's guard; keep it alive until
/// exit so buffered lines are flushed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.env_filter()?;

    match config.output {
        LogOutput::Console => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            match config.format {
                LogFormat::Text => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init()?,
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.json())
                    .try_init()?,
            }
            Ok(None)
        },
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;
            let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            match config.format {
                LogFormat::Text => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init()?,
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.json())
                    .try_init()?,
            }
            Ok(Some(guard))
        },
    }
}
