#![forbid(unsafe_code)]

//! In-memory byte store.
//!
//! `MemStore` backs a resource with a `Vec<u8>` and tracks written ranges with
//! [`MemCoverage`]. The same type serves contiguous (`Memory`) and sparse
//! (`RandomAccess`) resources; the kind only changes which writes are
//! accepted and how readers may seek.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    Availability, ByteStore, Coverage, MemCoverage, StorageError, StorageResult, StoreKind,
    StoreStatus,
};

#[derive(Debug, Default)]
struct MemState {
    buf: Vec<u8>,
    coverage: MemCoverage,
    /// Furthest end written so far; `append` continues here.
    tail: u64,
    status: StoreStatus,
}

#[derive(Debug)]
struct MemInner {
    state: Mutex<MemState>,
    kind: StoreKind,
    limit: Option<usize>,
}

/// Growable in-memory store.
///
/// Clones share the same bytes.
#[derive(Clone, Debug)]
pub struct MemStore {
    inner: Arc<MemInner>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    fn build(kind: StoreKind, limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(MemInner {
                state: Mutex::new(MemState::default()),
                kind,
                limit,
            }),
        }
    }

    /// Unbounded contiguous store.
    #[must_use]
    pub fn new() -> Self {
        Self::build(StoreKind::Memory, None)
    }

    /// Contiguous store refusing to grow past `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self::build(StoreKind::Memory, Some(limit))
    }

    /// Sparse store accepting writes at any offset.
    #[must_use]
    pub fn random_access() -> Self {
        Self::build(StoreKind::RandomAccess, None)
    }

    /// Finished store holding `data`.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        let store = Self::new();
        {
            let mut state = store.inner.state.lock();
            state.buf = data.to_vec();
            let tail = data.len() as u64;
            state.tail = tail;
            state.coverage.mark(0..tail);
            state.coverage.set_total_size(tail);
            state.status = StoreStatus::Complete;
        }
        store
    }

    /// Size limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.inner.limit
    }

    /// Copy of every byte written so far, gaps zero-filled.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.state.lock().buf.clone()
    }

    fn write_locked(&self, state: &mut MemState, offset: u64, data: &[u8]) -> StorageResult<()> {
        if state.status != StoreStatus::Loading {
            return Err(StorageError::Finished);
        }
        if data.is_empty() {
            return Ok(());
        }
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(StorageError::InvalidRange {
                start: offset,
                end: u64::MAX,
            })?;
        if self.inner.kind == StoreKind::Memory && offset > state.buf.len() as u64 {
            return Err(StorageError::InvalidRange {
                start: offset,
                end,
            });
        }
        let end_usize = usize::try_from(end).map_err(|_| StorageError::OutOfMemory {
            requested: usize::MAX,
        })?;
        if let Some(limit) = self.inner.limit
            && end_usize > limit
        {
            return Err(StorageError::OutOfSpace { limit });
        }

        if state.buf.len() < end_usize {
            let additional = end_usize - state.buf.len();
            state
                .buf
                .try_reserve(additional)
                .map_err(|_| StorageError::OutOfMemory {
                    requested: additional,
                })?;
            state.buf.resize(end_usize, 0);
        }

        let start = end_usize - data.len();
        state.buf[start..end_usize].copy_from_slice(data);
        state.coverage.mark(offset..end);
        state.tail = state.tail.max(end);
        trace!(offset, len = data.len(), "MemStore: wrote");
        Ok(())
    }
}

impl ByteStore for MemStore {
    fn kind(&self) -> StoreKind {
        self.inner.kind
    }

    fn append(&self, data: &[u8]) -> StorageResult<()> {
        let mut state = self.inner.state.lock();
        let offset = state.tail;
        self.write_locked(&mut state, offset, data)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut state = self.inner.state.lock();
        self.write_locked(&mut state, offset, data)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let state = self.inner.state.lock();
        let avail = state.coverage.availability(offset, buf.len() as u64);
        if !avail.available {
            return 0;
        }
        let Ok(start) = usize::try_from(offset) else {
            return 0;
        };
        // `avail.len` never exceeds `buf.len()`.
        let n = avail.len as usize;
        buf[..n].copy_from_slice(&state.buf[start..start + n]);
        n
    }

    fn coverage(&self, offset: u64, len: u64) -> Availability {
        self.inner.state.lock().coverage.availability(offset, len)
    }

    fn finish(&self, force: bool) {
        let mut state = self.inner.state.lock();
        if state.status != StoreStatus::Loading {
            return;
        }
        let total = state.buf.len() as u64;
        state.coverage.set_total_size(total);
        state.status = if force {
            StoreStatus::Aborted
        } else {
            StoreStatus::Complete
        };
        debug!(len = total, force, "MemStore: finished");
    }

    fn status(&self) -> StoreStatus {
        self.inner.state.lock().status
    }

    fn reactivate(&self) {
        let mut state = self.inner.state.lock();
        if state.status != StoreStatus::Loading {
            debug!("MemStore: reactivated");
            state.status = StoreStatus::Loading;
        }
    }

    fn len(&self) -> u64 {
        self.inner.state.lock().coverage.contiguous_len()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn append_then_read_back() {
        let store = MemStore::new();
        store.append(b"hello ").unwrap();
        store.append(b"world").unwrap();

        assert_eq!(store.len(), 11);
        assert_eq!(&store.read(0..11)[..], b"hello world");
        assert_eq!(&store.read(6..100)[..], b"world");
    }

    #[test]
    fn read_past_end_is_empty() {
        let store = MemStore::new();
        store.append(b"abc").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(store.read_at(3, &mut buf), 0);
        assert_eq!(store.read_at(10, &mut buf), 0);
    }

    #[rstest]
    #[case::fits(8, b"12345678".as_slice(), true)]
    #[case::exceeds(8, b"123456789".as_slice(), false)]
    fn limit_is_enforced(#[case] limit: usize, #[case] data: &[u8], #[case] ok: bool) {
        let store = MemStore::with_limit(limit);
        let result = store.append(data);
        assert_eq!(result.is_ok(), ok);
        if !ok {
            assert_eq!(result.unwrap_err(), StorageError::OutOfSpace { limit });
            assert!(store.is_empty());
        }
    }

    #[test]
    fn append_after_finish_fails_until_reactivated() {
        let store = MemStore::new();
        store.append(b"abc").unwrap();
        store.finish(false);

        assert_eq!(store.status(), StoreStatus::Complete);
        assert_eq!(store.append(b"d"), Err(StorageError::Finished));

        store.reactivate();
        assert!(!store.is_finished());
        store.append(b"d").unwrap();
        assert_eq!(&store.read(0..4)[..], b"abcd");
    }

    #[test]
    fn forced_finish_marks_aborted() {
        let store = MemStore::new();
        store.append(b"partial").unwrap();
        store.finish(true);
        assert_eq!(store.status(), StoreStatus::Aborted);
        assert!(store.is_finished());
        // A later normal finish does not overwrite the aborted state.
        store.finish(false);
        assert_eq!(store.status(), StoreStatus::Aborted);
    }

    #[test]
    fn memory_store_rejects_gapped_write() {
        let store = MemStore::new();
        store.append(b"ab").unwrap();
        assert!(matches!(
            store.write_at(5, b"x"),
            Err(StorageError::InvalidRange { start: 5, .. })
        ));
        store.write_at(1, b"XY").unwrap();
        assert_eq!(&store.read(0..3)[..], b"aXY");
    }

    #[test]
    fn random_access_tracks_gaps() {
        let store = MemStore::random_access();
        store.write_at(0, b"0123").unwrap();
        store.write_at(10, b"abcd").unwrap();

        assert_eq!(store.kind(), StoreKind::RandomAccess);
        assert_eq!(store.len(), 4);
        assert_eq!(
            store.coverage(0, 100),
            Availability {
                available: true,
                len: 4
            }
        );
        assert_eq!(
            store.coverage(4, 100),
            Availability {
                available: false,
                len: 6
            }
        );
        let mut buf = [0u8; 8];
        assert_eq!(store.read_at(10, &mut buf), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(store.read_at(5, &mut buf), 0);
    }

    #[test]
    fn append_continues_after_last_write() {
        let store = MemStore::random_access();
        store.write_at(10, b"ab").unwrap();
        store.append(b"cd").unwrap();
        assert_eq!(&store.read(10..14)[..], b"abcd");
    }

    #[test]
    fn patching_earlier_bytes_keeps_append_position() {
        let store = MemStore::new();
        store.append(b"hello").unwrap();
        store.write_at(0, b"H").unwrap();
        store.append(b" world").unwrap();

        assert_eq!(store.len(), 11);
        assert_eq!(&store.read(0..11)[..], b"Hello world");
    }

    #[test]
    fn from_bytes_is_complete() {
        let store = MemStore::from_bytes(b"payload");
        assert_eq!(store.status(), StoreStatus::Complete);
        assert_eq!(store.to_vec(), b"payload");
    }

    #[test]
    fn clones_share_bytes() {
        let writer = MemStore::new();
        let reader = writer.clone();
        writer.append(b"shared").unwrap();
        assert_eq!(reader.len(), 6);
    }

    #[test]
    fn empty_append_is_noop() {
        let store = MemStore::new();
        store.append(b"").unwrap();
        assert!(store.is_empty());
    }
}
