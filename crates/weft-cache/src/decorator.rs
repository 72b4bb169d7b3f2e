#![forbid(unsafe_code)]

use std::{
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use weft_core::{Attributes, FlagAttr, StringAttr};
use weft_decode::{StoreReader, TransformChain, transfer_decoders};
use weft_events::{CacheEvent, Event, EventBus, Notifier};
use weft_sniff::{ContentSniffer, SniffResult};
use weft_storage::{ByteStore, MemStore, StoreHandle};
use weft_stream::{CursorLink, CursorOptions, StreamCursor};

use crate::{CacheError, CacheResult, Decision};

/// Decoded bytes moved into the final store per transform call.
const DRAIN_CHUNK: usize = 4096;

/// Transform reading the temporary store.
#[derive(Debug)]
struct ActiveTransform {
    chain: TransformChain,
    reader: StoreReader,
}

#[derive(Debug, Default)]
struct DecoratorState {
    decision: Option<Decision>,
    temp: Option<MemStore>,
    transform: Option<ActiveTransform>,
    /// `temp` was released and is never created again.
    temp_released: bool,
    abandoned: bool,
    decoded: u64,
    sniffed: bool,
    links: Vec<Weak<CursorLink>>,
}

impl DecoratorState {
    fn decoding(&self) -> bool {
        self.temp.is_some()
            || (!self.temp_released && self.decision.as_ref().is_some_and(|d| d.needs_full_decode))
    }

    fn live_links(&mut self) -> Vec<Arc<CursorLink>> {
        self.links.retain(|link| link.strong_count() > 0);
        self.links.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Optional on-the-fly decoding in front of a final byte store.
pub struct CacheDecorator {
    final_store: StoreHandle,
    attrs: Attributes,
    options: CursorOptions,
    events: Option<EventBus>,
    state: Mutex<DecoratorState>,
}

impl CacheDecorator {
    #[must_use]
    pub fn new(final_store: StoreHandle, attrs: Attributes, options: CursorOptions) -> Self {
        Self {
            final_store,
            attrs,
            options,
            events: None,
            state: Mutex::new(DecoratorState::default()),
        }
    }

    /// Publish [`CacheEvent`]s on `bus`.
    #[must_use]
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    #[must_use]
    pub fn final_store(&self) -> &StoreHandle {
        &self.final_store
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// The decode decision, once taken.
    #[must_use]
    pub fn decision(&self) -> Option<Decision> {
        self.state.lock().decision.clone()
    }

    /// Whether a temporary store currently exists.
    #[must_use]
    pub fn has_temp(&self) -> bool {
        self.state.lock().temp.is_some()
    }

    #[must_use]
    pub fn is_decode_abandoned(&self) -> bool {
        self.state.lock().abandoned
    }

    /// Accept bytes from the protocol layer, or flush with `None`.
    ///
    /// # Errors
    ///
    /// - `Storage` when the final or temporary store refused the bytes
    /// - `StoreWrite` when decoded output could not be written
    /// - `Decode` when the transform rejected the input
    ///
    /// After a failure while decoding, the final store keeps what was already
    /// decoded and later bytes are dropped.
    pub fn store(&self, bytes: Option<&[u8]>) -> CacheResult<()> {
        let mut state = self.state.lock();
        let before = self.final_store.len();
        self.decide(&mut state);

        let result = self.store_locked(&mut state, bytes);

        let grown = self.final_store.len() > before;
        if grown
            && !state.sniffed
            && self.options.config.sniff_on_store
            && self.final_store.len() >= self.options.config.sniff_len as u64
        {
            self.detect_locked(&mut state);
        }
        let links = state.live_links();
        drop(state);

        for link in links {
            if grown {
                link.data_added();
            } else if bytes.is_none() {
                link.request(None);
            }
        }
        result
    }

    fn store_locked(&self, state: &mut DecoratorState, bytes: Option<&[u8]>) -> CacheResult<()> {
        if state.abandoned {
            trace!("decoding abandoned, bytes dropped");
            return Ok(());
        }
        let decoding = state.decoding();
        if let Some(bytes) = bytes.filter(|b| !b.is_empty()) {
            if !decoding {
                self.final_store.append(bytes)?;
                return Ok(());
            }
            let appended = state
                .temp
                .get_or_insert_with(|| self.create_temp())
                .append(bytes);
            if let Err(error) = appended {
                self.abandon(state, &error.to_string());
                return Err(error.into());
            }
        }
        if decoding { self.pump(state) } else { Ok(()) }
    }

    fn decide(&self, state: &mut DecoratorState) {
        if state.decision.is_some() {
            return;
        }
        let decision = Decision::from_attributes(&self.attrs);
        debug!(
            needs_full_decode = decision.needs_full_decode,
            encoding = ?decision.encoding,
            "decode decision made"
        );
        self.publish(CacheEvent::DecisionMade {
            needs_full_decode: decision.needs_full_decode,
            encoding: decision.encoding.clone(),
        });
        state.decision = Some(decision);
    }

    fn create_temp(&self) -> MemStore {
        if self.attrs.content_length().is_some() {
            // Decoded length is unknown until the transform is drained.
            self.attrs.set_content_length(None);
        }
        let temp = match self.options.config.temp_store_limit {
            Some(limit) => MemStore::with_limit(limit),
            None => MemStore::new(),
        };
        debug!(limit = ?temp.limit(), "temporary store created");
        temp
    }

    /// Move decoded bytes from the temporary store into the final one.
    fn pump(&self, state: &mut DecoratorState) -> CacheResult<()> {
        if state.transform.is_none() {
            let (Some(temp), Some(encoding)) = (
                state.temp.as_ref(),
                state.decision.as_ref().and_then(|d| d.encoding.as_deref()),
            ) else {
                return Ok(());
            };
            let decoders = transfer_decoders(encoding)?;
            state.transform = Some(ActiveTransform {
                chain: TransformChain::builder().prepend_all(decoders).build(),
                reader: StoreReader::new(Arc::new(temp.clone())),
            });
        }
        let Some(mut active) = state.transform.take() else {
            return Ok(());
        };

        let mut buf = vec![0u8; DRAIN_CHUNK];
        loop {
            let mut more = true;
            match active.chain.read_into(&mut buf, &mut active.reader, &mut more) {
                Ok(n) => {
                    if n > 0 {
                        if let Err(error) = self.final_store.append(&buf[..n]) {
                            self.abandon(state, &error.to_string());
                            return Err(CacheError::StoreWrite(error));
                        }
                        state.decoded += n as u64;
                    }
                    if !more {
                        self.release_temp(state);
                        return Ok(());
                    }
                    if n == 0 {
                        state.transform = Some(active);
                        return Ok(());
                    }
                }
                Err(error) if error.is_hideable() => {
                    self.abandon(state, &error.to_string());
                    return Ok(());
                }
                Err(error) => {
                    self.abandon(state, &error.to_string());
                    return Err(error.into());
                }
            }
        }
    }

    fn release_temp(&self, state: &mut DecoratorState) {
        state.transform = None;
        state.temp = None;
        state.temp_released = true;
        debug!(decoded_bytes = state.decoded, "temporary store drained and released");
        self.publish(CacheEvent::TempDisposed {
            decoded_bytes: state.decoded,
        });
    }

    fn abandon(&self, state: &mut DecoratorState, error: &str) {
        state.transform = None;
        state.temp = None;
        state.temp_released = true;
        state.abandoned = true;
        warn!(error, decoded_bytes = state.decoded, "decoding abandoned");
        self.publish(CacheEvent::DecodeAbandoned {
            error: error.to_string(),
        });
    }

    /// Drain pending decode state (or drop it when `force`) and finish the
    /// final store.
    pub fn finish(&self, force: bool) {
        let mut state = self.state.lock();
        if force {
            if state.temp.is_some() {
                state.transform = None;
                state.temp = None;
                state.temp_released = true;
                debug!("pending decode discarded");
            }
        } else {
            if let Some(temp) = &state.temp {
                temp.finish(false);
            }
            if state.decoding() && !state.abandoned {
                // Failures were already logged and published.
                let _ = self.pump(&mut state);
            }
            if !state.sniffed && self.options.config.sniff_on_store && !self.final_store.is_empty()
            {
                self.detect_locked(&mut state);
            }
        }
        self.final_store.finish(force);
        debug!(force, len = self.final_store.len(), "decorator finished");
        let links = state.live_links();
        drop(state);

        for link in links {
            link.data_added();
        }
    }

    /// Open a cursor over the final store.
    ///
    /// # Errors
    ///
    /// Propagates cursor initialisation failures.
    pub fn new_cursor(
        &self,
        raw_mode: bool,
        notifier: Arc<dyn Notifier>,
    ) -> CacheResult<StreamCursor> {
        let mut state = self.state.lock();
        self.decide(&mut state);
        let mut cursor = StreamCursor::new(
            Arc::clone(&self.final_store),
            self.attrs.clone(),
            self.options.clone(),
            notifier,
        );
        cursor.init(raw_mode)?;
        state.links.retain(|link| link.strong_count() > 0);
        state.links.push(Arc::downgrade(cursor.link()));
        Ok(cursor)
    }

    /// Sniff the first `sniff_len` bytes of the final store and record the
    /// result on the resource attributes.
    pub fn detect_content_type(&self) -> SniffResult {
        let mut state = self.state.lock();
        self.detect_locked(&mut state)
    }

    fn detect_locked(&self, state: &mut DecoratorState) -> SniffResult {
        let config = &self.options.config;
        let head_len = self.final_store.len().min(config.sniff_len as u64);
        let head = self.final_store.read(0..head_len);

        let declared = self.attrs.get(StringAttr::ContentType).unwrap_or_default();
        let result = ContentSniffer::new()
            .with_scan_len(config.sniff_len)
            .with_extension(self.attrs.get(StringAttr::FileExtension))
            .with_extension_sniffing(config.extension_sniffing)
            .classify(&head, &declared, self.attrs.flag(FlagAttr::Multimedia));
        state.sniffed = true;

        if result.mime != self.attrs.media_type() {
            debug!(declared = %declared, mime = %result.mime, "content type replaced by sniffing");
            self.attrs
                .set(StringAttr::ContentType, Some(result.mime.clone()));
        }
        if result.untrusted {
            self.attrs.set_flag(FlagAttr::Untrusted, true);
        }
        self.publish(CacheEvent::ContentTypeSniffed {
            mime: result.mime.clone(),
            untrusted: result.untrusted,
        });
        result
    }

    fn publish(&self, event: impl Into<Event>) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl fmt::Debug for CacheDecorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CacheDecorator")
            .field("final_store", &self.final_store)
            .field("decision", &state.decision)
            .field("has_temp", &state.temp.is_some())
            .field("abandoned", &state.abandoned)
            .finish_non_exhaustive()
    }
}

impl Drop for CacheDecorator {
    fn drop(&mut self) {
        if self.state.get_mut().temp.is_some() {
            debug!("decorator dropped with pending decode, flushing");
            self.finish(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use weft_core::ResourceAttrs;
    use weft_events::NullNotifier;

    use super::*;

    fn decorator(attrs: ResourceAttrs) -> (MemStore, CacheDecorator) {
        let final_store = MemStore::new();
        let decorator = CacheDecorator::new(
            Arc::new(final_store.clone()),
            attrs.into(),
            CursorOptions::default(),
        );
        (final_store, decorator)
    }

    #[test]
    fn test_plain_bytes_go_straight_to_final() {
        let (final_store, decorator) = decorator(ResourceAttrs::new("image/png"));
        decorator.store(Some(b"abc")).unwrap();
        decorator.store(None).unwrap();
        assert!(!decorator.has_temp());
        assert_eq!(final_store.to_vec(), b"abc");
        assert_eq!(
            decorator.decision(),
            Some(Decision {
                needs_full_decode: false,
                encoding: None
            })
        );
    }

    #[test]
    fn test_cursor_creation_takes_the_decision() {
        let (_, decorator) =
            decorator(ResourceAttrs::new("text/html").with_transfer_encoding("gzip"));
        let cursor = decorator.new_cursor(false, Arc::new(NullNotifier)).unwrap();
        assert!(decorator.decision().is_some());
        assert_eq!(cursor.chain_names(), ["charset"]);
    }

    #[test]
    fn test_force_finish_discards_pending_decode() {
        let (final_store, decorator) =
            decorator(ResourceAttrs::new("text/html").with_transfer_encoding("gzip"));
        decorator.store(Some(&[0x1f, 0x8b])).unwrap();
        assert!(decorator.has_temp());
        decorator.finish(true);
        assert!(!decorator.has_temp());
        assert!(final_store.is_finished());
        assert!(final_store.is_empty());
    }
}
