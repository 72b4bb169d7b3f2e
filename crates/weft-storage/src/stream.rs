#![forbid(unsafe_code)]

//! Sliding-window store for stream-typed resources.
//!
//! Only the most recent `window` bytes are retained. Bytes before
//! [`StreamStore::base`] are evicted and can only be served again after the
//! protocol layer restarts the transfer at an earlier offset
//! ([`StreamStore::restart_at`]).

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    Availability, ByteStore, Coverage, MemCoverage, StorageError, StorageResult, StoreKind,
    StoreStatus,
};

#[derive(Debug, Default)]
struct WindowState {
    bytes: VecDeque<u8>,
    /// Absolute offset of `bytes[0]`.
    base: u64,
    coverage: MemCoverage,
    status: StoreStatus,
}

impl WindowState {
    fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }
}

#[derive(Debug)]
struct StreamInner {
    state: Mutex<WindowState>,
    window: usize,
}

/// Store keeping a bounded window of the most recently written bytes.
#[derive(Clone, Debug)]
pub struct StreamStore {
    inner: Arc<StreamInner>,
}

impl StreamStore {
    /// Create a store retaining at most `window` bytes (at least one).
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                state: Mutex::new(WindowState::default()),
                window: window.max(1),
            }),
        }
    }

    /// Absolute offset of the oldest retained byte.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.inner.state.lock().base
    }

    /// Window capacity.
    #[must_use]
    pub fn window(&self) -> usize {
        self.inner.window
    }

    /// Drop the window and continue writing at `offset`.
    ///
    /// Called by the protocol layer when a reader asked to reposition and the
    /// transfer was restarted there. Reopens a finished store.
    pub fn restart_at(&self, offset: u64) {
        let mut state = self.inner.state.lock();
        state.bytes.clear();
        state.base = offset;
        state.coverage = MemCoverage::new();
        state.status = StoreStatus::Loading;
        debug!(offset, "StreamStore: restarted");
    }
}

impl ByteStore for StreamStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Stream
    }

    fn append(&self, data: &[u8]) -> StorageResult<()> {
        let mut state = self.inner.state.lock();
        if state.status != StoreStatus::Loading {
            return Err(StorageError::Finished);
        }
        if data.is_empty() {
            return Ok(());
        }
        let start = state.end();
        state.bytes.extend(data);
        let end = state.end();
        state.coverage.mark(start..end);

        let excess = state.bytes.len().saturating_sub(self.inner.window);
        if excess > 0 {
            state.bytes.drain(..excess);
            state.base += excess as u64;
            let base = state.base;
            state.coverage.evict_before(base);
            trace!(evicted = excess, base, "StreamStore: window moved");
        }
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let end = self.inner.state.lock().end();
        if offset != end {
            return Err(StorageError::InvalidRange {
                start: offset,
                end: offset.saturating_add(data.len() as u64),
            });
        }
        self.append(data)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let state = self.inner.state.lock();
        if offset < state.base || offset >= state.end() {
            return 0;
        }
        // Window fits in memory, so the relative offset fits in usize.
        let rel = (offset - state.base) as usize;
        let n = buf.len().min(state.bytes.len() - rel);
        for (dst, src) in buf[..n].iter_mut().zip(state.bytes.range(rel..rel + n)) {
            *dst = *src;
        }
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
        let end = state.end();
        state.coverage.set_total_size(end);
        state.status = if force {
            StoreStatus::Aborted
        } else {
            StoreStatus::Complete
        };
        debug!(end, force, "StreamStore: finished");
    }

    fn status(&self) -> StoreStatus {
        self.inner.state.lock().status
    }

    fn reactivate(&self) {
        self.inner.state.lock().status = StoreStatus::Loading;
    }

    fn len(&self) -> u64 {
        self.inner.state.lock().end()
    }
}
