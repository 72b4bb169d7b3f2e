#![forbid(unsafe_code)]

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::trace;
use weft_events::{Notice, Notifier};

/// "Data ready" suppression state of one cursor.
///
/// A retrieve cycle that follows an empty cycle while the store has nothing
/// new is *blocked*: data-ready requests made during it are recorded instead
/// of posted and replayed once when data is next consumed or added.
/// Between cycles, a posted notice the consumer has not answered yet absorbs
/// further requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotifyGate {
    blocked: bool,
    was_blocked: bool,
    delay: Option<Duration>,
    last_produced: usize,
    outstanding: bool,
}

impl NotifyGate {
    /// Start of a retrieve cycle.
    pub fn maybe_start_blocking(&mut self, store_has_more: bool) {
        self.blocked = self.last_produced == 0 && !store_has_more;
        self.outstanding = false;
    }

    /// End of a retrieve cycle that produced `produced` bytes.
    pub fn stop_blocking(&mut self, produced: usize) {
        self.blocked = false;
        self.last_produced = produced;
    }

    /// Whether a data-ready notice with `delay` should be posted now.
    ///
    /// While blocked, the longest delay asked for is remembered for the
    /// replay; `None` (post at once) never shortens a recorded delay.
    pub fn request(&mut self, delay: Option<Duration>) -> bool {
        if self.blocked {
            self.was_blocked = true;
            self.delay = self.delay.max(delay);
            return false;
        }
        self.was_blocked = false;
        self.delay = None;
        if self.outstanding {
            return false;
        }
        self.outstanding = true;
        true
    }

    /// Data was consumed or added: unblock and return the recorded delay of
    /// a suppressed notice, if there is one to replay.
    pub fn data_consumed_or_added(&mut self) -> Option<Option<Duration>> {
        self.blocked = false;
        if !self.was_blocked {
            return None;
        }
        self.was_blocked = false;
        self.outstanding = true;
        Some(self.delay.take())
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    #[must_use]
    pub fn was_blocked(&self) -> bool {
        self.was_blocked
    }
}

/// Shared notification endpoint of a cursor.
///
/// The cursor drives the retrieve cycle through it; stores and decorators
/// holding a `Weak` to it report new data.
pub struct CursorLink {
    gate: Mutex<NotifyGate>,
    notifier: Arc<dyn Notifier>,
}

impl CursorLink {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            gate: Mutex::new(NotifyGate::default()),
            notifier,
        }
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Copy of the current gate state.
    #[must_use]
    pub fn gate(&self) -> NotifyGate {
        *self.gate.lock()
    }

    pub(crate) fn begin_cycle(&self, store_has_more: bool) {
        let mut gate = self.gate.lock();
        gate.maybe_start_blocking(store_has_more);
        if gate.is_blocked() {
            trace!("data-ready blocked for this cycle");
        }
    }

    pub(crate) fn end_cycle(&self, produced: usize) {
        let replay = {
            let mut gate = self.gate.lock();
            gate.stop_blocking(produced);
            if produced > 0 {
                gate.data_consumed_or_added()
            } else {
                None
            }
        };
        if let Some(delay) = replay {
            self.post(delay, "replaying suppressed data-ready");
        }
    }

    /// Ask for a data-ready notice, subject to the gate.
    pub fn request(&self, delay: Option<Duration>) {
        let post = self.gate.lock().request(delay);
        if post {
            self.post(delay, "data-ready");
        } else {
            trace!(?delay, "data-ready suppressed");
        }
    }

    /// The store gained bytes.
    pub fn data_added(&self) {
        let replay = self.gate.lock().data_consumed_or_added();
        match replay {
            Some(delay) => self.post(delay, "replaying suppressed data-ready"),
            None => self.request(None),
        }
    }

    /// The consumer consumed bytes.
    pub fn data_consumed(&self) {
        let replay = self.gate.lock().data_consumed_or_added();
        if let Some(delay) = replay {
            self.post(delay, "replaying suppressed data-ready");
        }
    }

    pub(crate) fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    fn post(&self, delay: Option<Duration>, what: &'static str) {
        trace!(?delay, "{what}");
        match delay {
            Some(delay) => self.notifier.data_ready_delayed(delay),
            None => self.notifier.data_ready(),
        }
    }
}

impl fmt::Debug for CursorLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorLink")
            .field("gate", &*self.gate.lock())
            .finish_non_exhaustive()
    }
}
