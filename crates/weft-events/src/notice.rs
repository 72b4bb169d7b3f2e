#![forbid(unsafe_code)]

use std::time::Duration;

use weft_core::ErrorKind;

/// Notification delivered to the consumer of a cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// New data can be retrieved; re-invoke `retrieve()`, after `delay` if given.
    DataReady { delay: Option<Duration> },
    /// Loading stopped for this cursor.
    LoadFailed { kind: ErrorKind },
    /// Charset was redetected: reload the resource from cache.
    ReloadFromCache,
    /// Charset was redetected: replay the header processing stage.
    ReplayHeaders,
    /// Charset was redetected: replay inline replacement processing.
    ReplayInlineReplacements,
}

/// Consumer callback injected into cursors.
///
/// Implementations must not call back into the cursor synchronously; the
/// consumer is expected to react on its next event-loop turn.
pub trait Notifier: Send + Sync {
    /// Deliver a notice to the consumer.
    fn notify(&self, notice: Notice);

    /// `DataReady` without delay.
    fn data_ready(&self) {
        self.notify(Notice::DataReady { delay: None });
    }

    /// `DataReady` after the given delay.
    fn data_ready_delayed(&self, delay: Duration) {
        self.notify(Notice::DataReady { delay: Some(delay) });
    }

    /// `LoadFailed` with the given error kind.
    fn load_failed(&self, kind: ErrorKind) {
        self.notify(Notice::LoadFailed { kind });
    }
}

/// Notifier that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notice: Notice) {}
}
