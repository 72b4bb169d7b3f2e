#![forbid(unsafe_code)]

use crate::{DecodeError, DecodeResult};

/// Decoded bytes waiting to be copied into a caller buffer.
#[derive(Debug, Default)]
pub struct Pending {
    buf: Vec<u8>,
    pos: usize,
}

impl Pending {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes not yet drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve room for `additional` bytes.
    ///
    /// # Errors
    ///
    /// `OutOfMemory` when the allocation fails.
    pub fn reserve(&mut self, additional: usize) -> DecodeResult<()> {
        self.compact();
        self.buf
            .try_reserve(additional)
            .map_err(|_| DecodeError::OutOfMemory {
                requested: additional,
            })
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn push_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
    }

    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Move pending bytes into `out`; returns how many were moved.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
        n
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }
}
