#![forbid(unsafe_code)]

use weft_storage::StoreHandle;

use crate::{Chunk, DecodeResult, Upstream};

const READ_CHUNK: usize = 4096;

/// [`Upstream`] over a byte store, starting at offset 0.
#[derive(Debug)]
pub struct StoreReader {
    store: StoreHandle,
    /// Store offset of `buf[start]`.
    pos: u64,
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl StoreReader {
    #[must_use]
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            pos: 0,
            buf: vec![0; READ_CHUNK],
            start: 0,
            end: 0,
        }
    }

    /// Offset of the next unconsumed byte.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[must_use]
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }
}

impl Upstream for StoreReader {
    fn peek(&mut self) -> DecodeResult<Chunk<'_>> {
        if self.start == self.end {
            self.start = 0;
            self.end = self.store.read_at(self.pos, &mut self.buf);
        }
        let visible = (self.end - self.start) as u64;
        let more = !self.store.is_finished() || self.pos + visible < self.store.len();
        Ok(Chunk {
            data: &self.buf[self.start..self.end],
            more,
        })
    }

    fn advance(&mut self, n: usize) {
        let n = n.min(self.end - self.start);
        self.start += n;
        self.pos += n as u64;
    }
}

/// [`Upstream`] over an in-memory slice, optionally handing out small
/// chunks to exercise boundary handling.
#[derive(Debug)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
    chunk_len: usize,
    open: bool,
}

impl<'a> SliceReader<'a> {
    /// Complete input, delivered in one chunk.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            chunk_len: usize::MAX,
            open: false,
        }
    }

    /// Deliver at most `chunk_len` bytes per peek.
    #[must_use]
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len.max(1);
        self
    }

    /// Report `more == true` even at the end of the slice.
    #[must_use]
    pub fn still_loading(mut self) -> Self {
        self.open = true;
        self
    }

    /// Bytes not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

impl Upstream for SliceReader<'_> {
    fn peek(&mut self) -> DecodeResult<Chunk<'_>> {
        let end = self.pos.saturating_add(self.chunk_len).min(self.data.len());
        Ok(Chunk {
            data: &self.data[self.pos..end],
            more: self.open || end < self.data.len(),
        })
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }
}
