//! Lazy slicing of decoded segments into transport-sized chunks.

use std::iter::FusedIterator;

use bytes::Bytes;

/// Number of chunks a buffer of `len` bytes produces.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

/// Single-pass iterator over fixed-size chunks of a sequence of buffers.
///
/// Chunks are zero-copy views into the decoded buffers. A chunk never spans two
/// buffers; the last chunk of each buffer may be short.
#[derive(Debug)]
pub struct ChunkSplitter {
    buffers: std::vec::IntoIter<Bytes>,
    current: Bytes,
    chunk_size: usize,
}

impl ChunkSplitter {
    pub fn new(buffers: Vec<Bytes>, chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0, "chunk_size must be positive");
        Self {
            buffers: buffers.into_iter(),
            current: Bytes::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    fn remaining(&self) -> usize {
        chunk_count(self.current.len(), self.chunk_size)
            + self
                .buffers
                .as_slice()
                .iter()
                .map(|b| chunk_count(b.len(), self.chunk_size))
                .sum::<usize>()
    }
}

impl Iterator for ChunkSplitter {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        while self.current.is_empty() {
            self.current = self.buffers.next()?;
        }
        let len = self.current.len().min(self.chunk_size);
        Some(self.current.split_to(len))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkSplitter {}

impl FusedIterator for ChunkSplitter {}

pub fn split(buffers: Vec<Bytes>, chunk_size: usize) -> ChunkSplitter {
    ChunkSplitter::new(buffers, chunk_size)
}
