#![forbid(unsafe_code)]

//! Consumer notifications and the unified event bus of the weft pipeline.
//!
//! [`Notifier`] is the seam a consumer plugs into a cursor to learn that data
//! is ready or that loading failed. [`EventBus`] is a broadcast fan-out that
//! implements `Notifier` and also carries diagnostics from the cache and
//! multipart stages.

mod bus;
mod cache;
mod event;
mod notice;
mod part;

pub use bus::{EventBus, EventReceiver};
pub use cache::CacheEvent;
pub use event::Event;
pub use notice::{Notice, Notifier, NullNotifier};
pub use part::PartEvent;
