#![forbid(unsafe_code)]

use tokio::sync::broadcast;

use crate::{Event, Notice, Notifier};

/// Listener handle returned by [`EventBus::subscribe`].
pub type EventReceiver = broadcast::Receiver<Event>;

/// Diagnostics channel for the decorators and multipart decoders of one
/// resource.
///
/// Each component holds a clone and publishes as it goes; a listener sees the
/// events of all of them in publish order. Publishing is synchronous and
/// cheap, and an event published while nobody listens is dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Bus keeping at most `capacity` unread events per listener.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Hand `event` to every current listener.
    ///
    /// Component enums convert on the way in, e.g.
    /// `bus.publish(PartEvent::Finished { index, bytes })`.
    pub fn publish<E: Into<Event>>(&self, event: E) {
        let _ = self.tx.send(event.into());
    }

    /// New listener; it only sees events published after this call.
    ///
    /// A listener that falls more than `capacity` events behind gets
    /// `Lagged(n)` and resumes with the oldest event still kept.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }
}

/// Consumer notices can be observed on the bus as well.
impl Notifier for EventBus {
    fn notify(&self, notice: Notice) {
        self.publish(notice);
    }
}
