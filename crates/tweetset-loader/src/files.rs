//! Input file discovery and counting
//!
//! A dataset directory holds line-delimited tweet files (`*.json`,
//! `*.json.gz`), optional `*.txt` id lists and a `dataset.json` metadata
//! file that is never treated as tweets.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;
use tweetset_common::{Result, TweetsetError};
use walkdir::WalkDir;

/// Name of the metadata file inside a dataset directory
pub const DATASET_FILENAME: &str = "dataset.json";

/// Files found in a dataset directory, each list sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetFiles {
    pub json: Vec<PathBuf>,
    pub json_gz: Vec<PathBuf>,
    pub txt: Vec<PathBuf>,
}

impl DatasetFiles {
    pub fn file_count(&self) -> usize {
        self.json.len() + self.json_gz.len() + self.txt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    /// Every file in enumeration order
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.json.iter().chain(&self.json_gz).chain(&self.txt)
    }
}

/// List the tweet files directly inside `dir`.
///
/// Subdirectories are not descended into. `dataset.json` is excluded from the
/// plain list.
pub fn find_files(dir: &Path) -> Result<DatasetFiles> {
    let mut files = DatasetFiles::default();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| TweetsetError::filesystem(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let path = entry.path().to_path_buf();

        if name.ends_with(".json.gz") {
            files.json_gz.push(path);
        } else if name.ends_with(".json") {
            if name != DATASET_FILENAME {
                files.json.push(path);
            }
        } else if name.ends_with(".txt") {
            files.txt.push(path);
        }
    }

    debug!(
        dir = %dir.display(),
        json = files.json.len(),
        json_gz = files.json_gz.len(),
        txt = files.txt.len(),
        "Enumerated dataset files"
    );

    Ok(files)
}

/// Open a file for line reading, decompressing `.gz` transparently
pub fn open_lines(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| TweetsetError::filesystem(path, e))?;

    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Count non-blank lines across all files.
///
/// Reads every byte of every file; callers with very large datasets may skip
/// it and size the index from defaults instead.
pub fn count_lines(files: &DatasetFiles) -> Result<u64> {
    let mut total = 0u64;

    for path in files.all() {
        let count = count_file_lines(path)?;
        debug!(path = %path.display(), lines = count, "Counted lines");
        total += count;
    }

    Ok(total)
}

fn count_file_lines(path: &Path) -> Result<u64> {
    let mut reader = open_lines(path)?;
    let mut buf = Vec::with_capacity(8 * 1024);
    let mut count = 0u64;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| TweetsetError::filesystem(path, e))?;
        if read == 0 {
            break;
        }
        if buf.iter().any(|b| !b.is_ascii_whitespace()) {
            count += 1;
        }
    }

    Ok(count)
}
