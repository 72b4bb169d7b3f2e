#![forbid(unsafe_code)]

//! Coverage tracking for written byte ranges.
//!
//! [`Coverage`] records which byte ranges of a store hold data; stores use it
//! to answer `coverage(offset, len)` queries for partial and resumable
//! content. [`MemCoverage`] is backed by `rangemap::RangeSet`.

use std::ops::Range;

use rangemap::RangeSet;

use crate::Availability;

/// Tracks written byte ranges of a store.
#[cfg_attr(test, unimock::unimock(api = CoverageMock))]
pub trait Coverage: Send + 'static {
    /// Mark a range as written.
    fn mark(&mut self, range: Range<u64>);

    /// Forget everything before `offset` (evicted by a windowed store).
    fn evict_before(&mut self, offset: u64);

    /// Whether all bytes are present (requires known `total_size`).
    fn is_complete(&self) -> bool;

    /// Length of the gap-free prefix starting at offset 0.
    fn contiguous_len(&self) -> u64;

    /// Availability of the bytes at `offset`, looking at most `len` bytes ahead.
    fn availability(&self, offset: u64, len: u64) -> Availability;

    /// All gaps below `total_size`.
    fn gaps(&self) -> Vec<Range<u64>>;

    /// Total size (if known).
    fn total_size(&self) -> Option<u64>;

    /// Set total size (may become known late, e.g. on finish).
    fn set_total_size(&mut self, size: u64);
}

/// In-memory coverage tracker backed by [`RangeSet`].
///
/// `RangeSet` merges adjacent and overlapping ranges automatically.
#[derive(Clone, Debug, Default)]
pub struct MemCoverage {
    ranges: RangeSet<u64>,
    total_size: Option<u64>,
}

impl MemCoverage {
    /// Create a new empty coverage tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coverage tracker with known total size.
    #[must_use]
    pub fn with_total_size(total_size: u64) -> Self {
        Self {
            ranges: RangeSet::new(),
            total_size: Some(total_size),
        }
    }
}

impl Coverage for MemCoverage {
    fn mark(&mut self, range: Range<u64>) {
        if !range.is_empty() {
            self.ranges.insert(range);
        }
    }

    fn evict_before(&mut self, offset: u64) {
        if offset > 0 {
            self.ranges.remove(0..offset);
        }
    }

    fn is_complete(&self) -> bool {
        let Some(total) = self.total_size else {
            return false;
        };
        if total == 0 {
            return true;
        }
        !self.ranges.gaps(&(0..total)).any(|_| true)
    }

    fn contiguous_len(&self) -> u64 {
        self.ranges.get(&0).map_or(0, |r| r.end)
    }

    fn availability(&self, offset: u64, len: u64) -> Availability {
        if let Some(range) = self.ranges.get(&offset) {
            return Availability {
                available: true,
                len: (range.end - offset).min(len),
            };
        }
        // Not covered: report how far to skip to the next covered byte, or 0
        // when nothing further is known.
        let skip = self
            .ranges
            .overlapping(&(offset..u64::MAX))
            .next()
            .map_or(0, |next| next.start - offset);
        Availability {
            available: false,
            len: skip,
        }
    }

    fn gaps(&self) -> Vec<Range<u64>> {
        let Some(total) = self.total_size else {
            return Vec::new();
        };
        if total == 0 {
            return Vec::new();
        }
        self.ranges.gaps(&(0..total)).collect()
    }

    fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    fn set_total_size(&mut self, size: u64) {
        self.total_size = Some(size);
    }
}
