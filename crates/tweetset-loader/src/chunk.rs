//! Fixed-size batching for bulk submission

pub use crate::config::DEFAULT_CHUNK_SIZE;

/// Iterator adapter yielding `Vec`s of up to `size` items.
///
/// Every chunk but the last holds exactly `size` items. Items keep their
/// order and only one chunk is held at a time.
#[derive(Debug)]
pub struct Chunks<I> {
    iter: I,
    size: usize,
}

impl<I: Iterator> Chunks<I> {
    /// A `size` of 0 is treated as 1.
    pub fn new(iter: I, size: usize) -> Self {
        Self {
            iter,
            size: size.max(1),
        }
    }
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<I::Item> = self.iter.by_ref().take(self.size).collect();
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

pub trait ChunkExt: Iterator + Sized {
    fn chunked(self, size: usize) -> Chunks<Self> {
        Chunks::new(self, size)
    }
}

impl<I: Iterator> ChunkExt for I {}
