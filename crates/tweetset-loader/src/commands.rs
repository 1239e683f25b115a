//! Command implementations
//!
//! Each function backs one subcommand of the `tweetset-loader` binary. They
//! take the [`Loader`] so tests can run them against any [`Connector`].

use std::path::Path;
use tracing::info;
use tweetset_common::{Result, TweetsetError};

use crate::es::{Connector, IndexDeletion};
use crate::lifecycle::{
    create_dataset_index, delete_dataset_index, delete_registry_index, truncate_dataset_index,
};
use crate::loader::{LoadOptions, LoadReport, Loader, DEFAULT_REPLICAS};
use crate::registry::{
    create_dataset, delete_dataset, get_dataset, list_datasets, read_dataset_file,
    require_dataset, save_dataset, Dataset,
};
use crate::stats::update_dataset_stats;

/// Register a dataset from `path/filename`, optionally creating its index
pub async fn create<C: Connector>(
    loader: &Loader<C>,
    path: &Path,
    filename: &str,
    shards: Option<u32>,
) -> Result<Dataset> {
    let service = loader.connect()?;
    let metadata = read_dataset_file(&path.join(filename))?;
    let dataset = create_dataset(&service, metadata).await?;
    println!("Dataset id is {}", dataset.id);

    if let Some(shards) = shards.filter(|&n| n > 0) {
        create_dataset_index(&service, &dataset.id, shards, DEFAULT_REPLICAS).await?;
    }
    Ok(dataset)
}

/// Replace a dataset's metadata from `path/filename`.
///
/// With `create`, an unknown id is registered instead of rejected. With
/// `stats`, the dataset's stats are recomputed afterwards.
pub async fn update<C: Connector>(
    loader: &Loader<C>,
    dataset_id: &str,
    path: &Path,
    filename: &str,
    stats: bool,
    create: bool,
) -> Result<Dataset> {
    let service = loader.connect()?;
    let metadata = read_dataset_file(&path.join(filename))?;

    let mut dataset = match get_dataset(&service, dataset_id).await? {
        Some(mut existing) => {
            existing.apply_metadata(metadata);
            existing
        },
        None if create => Dataset::from_metadata(dataset_id, metadata),
        None => return Err(TweetsetError::DatasetNotFound(dataset_id.to_string())),
    };
    save_dataset(&service, &dataset).await?;

    if stats {
        update_dataset_stats(&service, &mut dataset).await?;
    }
    info!("Updated {}", dataset.id);
    Ok(dataset)
}

/// Remove a dataset and its tweets
pub async fn delete<C: Connector>(loader: &Loader<C>, dataset_id: &str) -> Result<()> {
    let service = loader.connect()?;
    require_dataset(&service, dataset_id).await?;

    delete_dataset(&service, dataset_id).await?;
    info!("Deleted {}", dataset_id);
    delete_dataset_index(&service, dataset_id).await?;
    Ok(())
}

/// Remove a dataset's tweets, keeping the dataset and its index layout
pub async fn truncate<C: Connector>(loader: &Loader<C>, dataset_id: &str) -> Result<IndexDeletion> {
    let service = loader.connect()?;
    let outcome = truncate_dataset_index(&service, dataset_id).await?;

    if let Some(mut dataset) = get_dataset(&service, dataset_id).await? {
        update_dataset_stats(&service, &mut dataset).await?;
    }
    Ok(outcome)
}

/// Load tweets into an existing dataset
pub async fn tweets<C: Connector>(
    loader: &Loader<C>,
    dataset_id: &str,
    path: &Path,
    options: &LoadOptions,
) -> Result<LoadReport> {
    let report = loader.load(dataset_id, path, options).await?;
    print_report(&report);
    Ok(report)
}

/// Register a dataset from `path/filename` and load the tweets next to it
pub async fn dataset<C: Connector>(
    loader: &Loader<C>,
    path: &Path,
    filename: &str,
    options: &LoadOptions,
) -> Result<LoadReport> {
    let dataset = create(loader, path, filename, None).await?;
    tweets(loader, &dataset.id, path, options).await
}

/// Delete every dataset's tweet index and the registry itself
pub async fn clear<C: Connector>(loader: &Loader<C>) -> Result<usize> {
    let service = loader.connect()?;
    let datasets = list_datasets(&service).await?;

    for dataset in &datasets {
        delete_dataset_index(&service, &dataset.id).await?;
    }
    delete_registry_index(&service).await?;
    info!(datasets = datasets.len(), "Deleted indexes");
    Ok(datasets.len())
}

fn print_report(report: &LoadReport) {
    println!("Loaded {} tweets into {}", report.loaded, report.dataset_id);
    if report.skipped > 0 {
        println!("  Skipped:  {} malformed records", report.skipped);
    }
    if report.rejected > 0 {
        println!("  Rejected: {} documents", report.rejected);
    }
    println!("  Shards:   {}", report.shards);
    println!("  Count:    {}", report.stats.tweet_count);
    if let (Some(first), Some(last)) = (
        report.stats.first_tweet_created_at,
        report.stats.last_tweet_created_at,
    ) {
        println!("  Range:    {} to {}", first, last);
    }
}
