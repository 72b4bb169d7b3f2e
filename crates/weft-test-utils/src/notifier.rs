//! Notifier that remembers everything it was told.

use std::sync::Arc;

use parking_lot::Mutex;
use weft_events::{Notice, Notifier};

/// Records notices in delivery order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Drain the record.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }

    #[must_use]
    pub fn data_ready_count(&self) -> usize {
        self.count(|n| matches!(n, Notice::DataReady { .. }))
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&Notice) -> bool) -> usize {
        self.notices.lock().iter().filter(|n| pred(n)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
