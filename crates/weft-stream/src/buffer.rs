#![forbid(unsafe_code)]

use std::fmt;

use weft_core::BufferLimits;
use zeroize::Zeroize;

use crate::{CursorError, CursorResult};

/// How [`ReadBuffer::grow`] sizes the new allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrowPolicy {
    /// Never shrink, never below `min_size`, rounded up to `increment`.
    Big,
    /// At most `min_size`, never below the bytes in use, no rounding.
    Small,
}

/// Consumer-visible bytes of a cursor.
///
/// `data[..used]` holds decoded bytes the consumer has not consumed yet;
/// `data[used..]` is scratch space the next retrieve writes into.
pub struct ReadBuffer {
    data: Vec<u8>,
    used: usize,
    limits: BufferLimits,
    sensitive: bool,
}

impl ReadBuffer {
    /// Empty buffer. `sensitive` buffers are wiped with `zeroize` on
    /// reallocation and drop.
    #[must_use]
    pub fn new(limits: BufferLimits, sensitive: bool) -> Self {
        Self {
            data: Vec::new(),
            used: 0,
            limits,
            sensitive,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn free(&self) -> usize {
        self.data.len() - self.used
    }

    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Bytes waiting for the consumer.
    #[must_use]
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// Free tail to write new bytes into; follow with [`commit`](Self::commit).
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.used..]
    }

    /// Mark `n` bytes of the spare tail as filled.
    pub fn commit(&mut self, n: usize) {
        self.used += n.min(self.free());
    }

    /// Drop `n` leading bytes and return how many were dropped.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.used);
        if n == self.used {
            self.used = 0;
        } else if n > 0 {
            self.data.copy_within(n..self.used, 0);
            self.used -= n;
        }
        n
    }

    /// Forget every buffered byte. The allocation is kept.
    pub fn clear(&mut self) {
        self.used = 0;
    }

    /// Append `bytes`, growing as needed.
    ///
    /// # Errors
    ///
    /// `OutOfMemory` when the allocation fails.
    pub fn push(&mut self, bytes: &[u8]) -> CursorResult<()> {
        if bytes.len() > self.free() {
            self.grow(self.used + bytes.len(), GrowPolicy::Big)?;
        }
        self.data[self.used..self.used + bytes.len()].copy_from_slice(bytes);
        self.used += bytes.len();
        Ok(())
    }

    /// Resize the buffer and return the new capacity.
    ///
    /// `requested == 0` asks for "more room": nothing happens while more
    /// than `slack` bytes are free, otherwise one `increment` is added
    /// before the policy applies.
    ///
    /// # Errors
    ///
    /// `OutOfMemory` when the new allocation fails; the buffer is unchanged.
    pub fn grow(&mut self, requested: usize, policy: GrowPolicy) -> CursorResult<usize> {
        let current = self.data.len();
        let mut target = requested;
        if requested == 0 {
            if self.free() > self.limits.slack {
                return Ok(current);
            }
            target = current.saturating_add(self.limits.increment);
        }

        let target = match policy {
            GrowPolicy::Big => {
                let target = target.max(current).max(self.limits.min_size);
                if self.limits.increment == 0 {
                    target
                } else {
                    target.next_multiple_of(self.limits.increment)
                }
            }
            GrowPolicy::Small => target.min(self.limits.min_size).max(self.used),
        };

        if target != current {
            self.reallocate(target)?;
        }
        Ok(target)
    }

    fn reallocate(&mut self, target: usize) -> CursorResult<()> {
        let mut next = Vec::new();
        next.try_reserve_exact(target)
            .map_err(|_| CursorError::OutOfMemory { requested: target })?;
        next.extend_from_slice(&self.data[..self.used]);
        next.resize(target, 0);
        let mut old = std::mem::replace(&mut self.data, next);
        if self.sensitive {
            old.zeroize();
        } else {
            old.fill(0);
        }
        Ok(())
    }
}

impl fmt::Debug for ReadBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadBuffer")
            .field("capacity", &self.data.len())
            .field("used", &self.used)
            .field("sensitive", &self.sensitive)
            .finish_non_exhaustive()
    }
}

impl Drop for ReadBuffer {
    fn drop(&mut self) {
        if self.sensitive {
            self.data.zeroize();
        }
    }
}
