//! Lazy record stream over a dataset's tweet files
//!
//! [`RecordStream`] reads `*.json` files and then `*.json.gz` files, one line
//! at a time, and yields each line parsed as JSON. Only the current file is
//! open and only the current line is buffered.
//!
//! The stream keeps its position explicitly (queued files, current reader,
//! line number, records produced), so the limit is a single check against the
//! number of records produced and does not depend on where file boundaries
//! fall.

use serde_json::Value;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tweetset_common::{Result, TweetsetError};

use crate::files::{open_lines, DatasetFiles};

/// Records between progress log lines
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// One parsed input line and where it came from
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub source: Arc<Path>,
    /// 1-based line number within `source`
    pub line: u64,
    pub value: Value,
}

struct OpenFile {
    path: Arc<Path>,
    reader: Box<dyn BufRead + Send>,
    line: u64,
}

/// Ordered, finite, single-pass stream of raw tweet records.
///
/// Yields `Err(MalformedRecord)` for a line that is not valid JSON (including
/// lines that are not valid UTF-8) and then carries on with the next line, so
/// the caller decides whether to skip or stop. A read failure yields
/// `Err(Filesystem)` and ends the stream.
pub struct RecordStream {
    pending: VecDeque<PathBuf>,
    current: Option<OpenFile>,
    produced: u64,
    limit: Option<u64>,
    total_hint: Option<u64>,
    finished: bool,
    buf: Vec<u8>,
}

impl RecordStream {
    /// Build a stream over the tweet files of `files`.
    ///
    /// `total_hint` is the pre-counted number of records, used only for
    /// progress reporting. `limit` caps the number of records yielded.
    pub fn new(files: &DatasetFiles, total_hint: Option<u64>, limit: Option<u64>) -> Self {
        if !files.txt.is_empty() {
            debug!(
                count = files.txt.len(),
                "Skipping txt files; id lists are not streamed"
            );
        }

        let pending = files.json.iter().chain(&files.json_gz).cloned().collect();

        Self {
            pending,
            current: None,
            produced: 0,
            limit,
            total_hint,
            finished: false,
            buf: Vec::with_capacity(8 * 1024),
        }
    }

    /// Number of records yielded so far
    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.produced >= limit)
    }

    /// Denominator for progress lines: the limit, else the counted total, else 0
    fn progress_total(&self) -> u64 {
        self.limit.or(self.total_hint).unwrap_or(0)
    }

    /// Next non-blank line as raw bytes, opening files as needed
    fn next_line(&mut self) -> Option<Result<(Arc<Path>, u64, Vec<u8>)>> {
        loop {
            if self.current.is_none() {
                let path = self.pending.pop_front()?;
                debug!(path = %path.display(), "Reading tweet file");
                match open_lines(&path) {
                    Ok(reader) => {
                        self.current = Some(OpenFile {
                            path: Arc::from(path),
                            reader,
                            line: 0,
                        })
                    },
                    Err(e) => return Some(Err(e)),
                }
            }

            let file = self.current.as_mut()?;
            self.buf.clear();
            match file.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.current = None;
                },
                Ok(_) => {
                    file.line += 1;
                    let line = self.buf.trim_ascii();
                    if !line.is_empty() {
                        return Some(Ok((file.path.clone(), file.line, line.to_vec())));
                    }
                },
                Err(e) => {
                    let path = file.path.to_path_buf();
                    self.current = None;
                    return Some(Err(TweetsetError::filesystem(path, e)));
                },
            }
        }
    }
}

impl Iterator for RecordStream {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.limit_reached() {
            self.finished = true;
            return None;
        }

        match self.next_line() {
            None => {
                self.finished = true;
                None
            },
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            },
            Some(Ok((source, line, bytes))) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => {
                    if at_progress_mark(self.produced) {
                        info!(
                            "{} of {} tweets",
                            self.produced,
                            self.progress_total()
                        );
                    }
                    self.produced += 1;
                    Some(Ok(RawRecord {
                        source,
                        line,
                        value,
                    }))
                },
                Err(e) => Some(Err(TweetsetError::malformed(
                    source.to_path_buf(),
                    line,
                    e.to_string(),
                ))),
            },
        }
    }
}

impl std::iter::FusedIterator for RecordStream {}

fn at_progress_mark(produced: u64) -> bool {
    produced % PROGRESS_INTERVAL == 0
}
