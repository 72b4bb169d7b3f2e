#![forbid(unsafe_code)]

use std::{fmt::Debug, ops::Range, sync::Arc};

use bytes::Bytes;

use crate::StorageResult;

/// How a store can be repositioned by a reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    /// Contiguous bytes; seeking is valid up to the loaded length.
    Memory,
    /// Sparse bytes written at arbitrary offsets (range requests).
    RandomAccess,
    /// Sliding window; seeking outside it needs a protocol restart.
    Stream,
}

/// Lifecycle of a store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreStatus {
    /// Writers may still append.
    #[default]
    Loading,
    /// Finished normally; size is immutable.
    Complete,
    /// Finished by force (cancellation); content may be truncated.
    Aborted,
}

/// Answer to a coverage query.
///
/// - `available == true`: `len` bytes are readable starting at the offset.
/// - `available == false`: `len` bytes must be skipped (or downloaded) before
///   data becomes available; `0` when nothing further is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub len: u64,
}

/// Container for resource bytes, possibly partially filled.
///
/// Stores use interior mutability: one writer (protocol handler or cache
/// decorator) and any number of readers share a [`StoreHandle`]. A store
/// never notifies anyone; telling consumers about new bytes is the cursor's
/// job.
pub trait ByteStore: Send + Sync + Debug {
    /// Repositioning semantics of this store.
    fn kind(&self) -> StoreKind;

    /// Append bytes after the last written byte.
    ///
    /// # Errors
    ///
    /// - `OutOfMemory` if the backing buffer cannot grow
    /// - `OutOfSpace` if a size limit would be exceeded
    /// - `Finished` if the store was finished and not reactivated
    fn append(&self, data: &[u8]) -> StorageResult<()>;

    /// Write bytes at an arbitrary offset.
    ///
    /// # Errors
    ///
    /// Same as [`append`](Self::append), plus `InvalidRange` when the store
    /// cannot accept writes at `offset`.
    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Best-effort read: copies up to `buf.len()` bytes at `offset` and
    /// returns how many were copied. Never blocks.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize;

    /// Best-effort read of `range` into a new buffer; may be shorter than
    /// requested.
    fn read(&self, range: Range<u64>) -> Bytes {
        if range.is_empty() {
            return Bytes::new();
        }
        let avail = self.coverage(range.start, range.end - range.start);
        if !avail.available {
            return Bytes::new();
        }
        let Ok(len) = usize::try_from(avail.len) else {
            return Bytes::new();
        };
        let mut buf = vec![0u8; len];
        let n = self.read_at(range.start, &mut buf);
        buf.truncate(n);
        Bytes::from(buf)
    }

    /// Coverage of `len` bytes at `offset`.
    fn coverage(&self, offset: u64, len: u64) -> Availability;

    /// Mark the store finished. `force` models cancellation: the store is
    /// finished immediately and flagged [`StoreStatus::Aborted`].
    fn finish(&self, force: bool);

    /// Whether the store is finished.
    fn is_finished(&self) -> bool {
        self.status() != StoreStatus::Loading
    }

    /// Current lifecycle state.
    fn status(&self) -> StoreStatus;

    /// Reopen a finished store for writing.
    fn reactivate(&self);

    /// Number of bytes readable from the start of the resource, i.e. the
    /// end of the contiguous (or, for stream stores, most recently written)
    /// data.
    fn len(&self) -> u64;

    /// Whether no bytes have been written.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared handle to a store.
pub type StoreHandle = Arc<dyn ByteStore>;
