//! TweetSet loader - Main entry point

use anyhow::Context;
use clap::Parser;
use std::process;
use tracing::error;
use tweetset_common::logging::{init_logging, LogConfig, LogLevel};
use tweetset_loader::commands;
use tweetset_loader::es::{Connector, EsConnector};
use tweetset_loader::lifecycle::create_registry_index;
use tweetset_loader::{Cli, Commands, Loader, LoaderConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // LOG_* variables configure the subscriber, --debug raises the level
    let log_config = LogConfig::from_env().unwrap_or_default();
    let log_config = if cli.debug {
        log_config.with_level(LogLevel::Debug)
    } else {
        log_config
    };
    let log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {}", e);
            None
        },
    };

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        drop(log_guard);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = LoaderConfig::from_env().context("Invalid loader configuration")?;
    let loader = Loader::new(EsConnector::new(config.es.clone()), config);

    // Every command expects the registry to exist
    let service = loader.connect()?;
    create_registry_index(&service)
        .await
        .context("Failed to create dataset registry index")?;

    execute_command(&loader, cli.command).await
}

async fn execute_command<C: Connector>(loader: &Loader<C>, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Create {
            path,
            filename,
            shards,
        } => {
            commands::create(loader, &path, &filename, shards).await?;
        },

        Commands::Update {
            dataset_identifier,
            path,
            filename,
            stats,
            create,
        } => {
            commands::update(loader, &dataset_identifier, &path, &filename, stats, create).await?;
        },

        Commands::Delete { dataset_identifier } => {
            commands::delete(loader, &dataset_identifier).await?;
        },

        Commands::Truncate { dataset_identifier } => {
            commands::truncate(loader, &dataset_identifier).await?;
        },

        Commands::Tweets {
            dataset_identifier,
            path,
            load,
        } => {
            commands::tweets(loader, &dataset_identifier, &path, &load.options(None))
                .await
                .with_context(|| format!("Loading tweets into {} failed", dataset_identifier))?;
        },

        Commands::Dataset {
            path,
            filename,
            shards,
            load,
        } => {
            commands::dataset(loader, &path, &filename, &load.options(shards)).await?;
        },

        Commands::Clear => {
            commands::clear(loader).await?;
        },
    }
    Ok(())
}
