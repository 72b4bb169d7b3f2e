#![forbid(unsafe_code)]

//! One fetched resource: its attributes, cached bytes and decorator.

use std::sync::Arc;

use weft_cache::{CacheDecorator, CacheResult};
use weft_core::{Attributes, ResourceAttrs};
use weft_events::{EventBus, EventReceiver, Notifier};
#[cfg(feature = "multipart")]
use weft_multipart::MultipartDecodeStore;
use weft_storage::MemStore;
use weft_stream::{CursorOptions, StreamCursor};

/// Capacity of the event bus created by [`Resource::new`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A resource cached in memory behind a [`CacheDecorator`].
///
/// The protocol side calls [`write`](Self::write) and
/// [`finish`](Self::finish); consumers open cursors. Pipeline events of the
/// resource, its cursors' decorators and multipart children go to one bus.
///
/// # Example
///
/// ```ignore
/// let resource = Resource::new(ResourceAttrs::new("multipart/mixed; boundary=x"));
/// resource.write(body)?;
/// resource.finish();
///
/// let mut parts = resource.multipart(Arc::new(NullNotifier))?;
/// while parts.retrieve()?.more {}
/// ```
#[derive(Debug)]
pub struct Resource {
    store: MemStore,
    decorator: CacheDecorator,
    options: CursorOptions,
    bus: EventBus,
}

impl Resource {
    #[must_use]
    pub fn new(attrs: ResourceAttrs) -> Self {
        Self::with_options(attrs, CursorOptions::default())
    }

    #[must_use]
    pub fn with_options(attrs: ResourceAttrs, options: CursorOptions) -> Self {
        Self::with_bus(attrs, options, EventBus::new(DEFAULT_EVENT_CAPACITY))
    }

    /// Publish to an existing bus instead of a private one.
    #[must_use]
    pub fn with_bus(attrs: ResourceAttrs, options: CursorOptions, bus: EventBus) -> Self {
        let store = MemStore::new();
        let decorator = CacheDecorator::new(
            Arc::new(store.clone()),
            Attributes::new(attrs),
            options.clone(),
        )
        .with_events(bus.clone());
        Self {
            store,
            decorator,
            options,
            bus,
        }
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        self.decorator.attributes()
    }

    /// Cached (decoded) bytes.
    #[must_use]
    pub fn store(&self) -> &MemStore {
        &self.store
    }

    #[must_use]
    pub fn decorator(&self) -> &CacheDecorator {
        &self.decorator
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    /// Store bytes received from the network.
    ///
    /// # Errors
    ///
    /// See [`CacheDecorator::store`].
    pub fn write(&self, bytes: &[u8]) -> CacheResult<()> {
        self.decorator.store(Some(bytes))
    }

    /// Flush without new bytes.
    ///
    /// # Errors
    ///
    /// See [`CacheDecorator::store`].
    pub fn flush(&self) -> CacheResult<()> {
        self.decorator.store(None)
    }

    /// The last byte arrived.
    pub fn finish(&self) {
        self.decorator.finish(false);
    }

    /// Loading was cancelled; pending decode state is dropped.
    pub fn abort(&self) {
        self.decorator.finish(true);
    }

    /// Open a decoding cursor.
    ///
    /// # Errors
    ///
    /// Propagates cursor initialisation failures.
    pub fn cursor(&self, notifier: Arc<dyn Notifier>) -> CacheResult<StreamCursor> {
        self.decorator.new_cursor(false, notifier)
    }

    /// Open a cursor that delivers the stored bytes untransformed.
    ///
    /// # Errors
    ///
    /// Propagates cursor initialisation failures.
    pub fn raw_cursor(&self, notifier: Arc<dyn Notifier>) -> CacheResult<StreamCursor> {
        self.decorator.new_cursor(true, notifier)
    }

    /// Split a multipart resource into child resources.
    ///
    /// # Errors
    ///
    /// Propagates cursor initialisation failures.
    #[cfg(feature = "multipart")]
    pub fn multipart(&self, notifier: Arc<dyn Notifier>) -> CacheResult<MultipartDecodeStore> {
        let cursor = self.decorator.new_cursor(false, Arc::clone(&notifier))?;
        Ok(
            MultipartDecodeStore::from_cursor(cursor, self.options.clone(), notifier)
                .with_events(self.bus.clone()),
        )
    }
}
