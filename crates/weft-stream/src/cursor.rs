#![forbid(unsafe_code)]

use std::sync::Arc;

use tracing::{debug, trace, warn};
use weft_core::{Attributes, ErrorKind, FlagAttr, StringAttr};
use weft_decode::{
    Charset, CharsetDecoder, Chunk, DecodeError, DecodeResult, Decoder, TransformChain, Upstream,
    transfer_decoders,
};
use weft_events::{Notice, Notifier};
use weft_storage::{StoreHandle, StoreKind};

use crate::{
    CursorError, CursorLink, CursorOptions, CursorResult, GrowPolicy, ReadBuffer, SeekError,
    is_container_type, is_text_like,
};

/// Outcome of one [`StreamCursor::retrieve`] cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Retrieved {
    /// Bytes added to the consumer buffer by this cycle.
    pub produced: usize,
    /// Whether later cycles may produce more.
    pub more: bool,
}

impl Retrieved {
    const DONE: Self = Self {
        produced: 0,
        more: false,
    };
}

/// One consumer's reader over a byte store.
///
/// Output is pulled with [`retrieve`](Self::retrieve), read from
/// [`buffered`](Self::buffered) and released with [`consume`](Self::consume).
/// A cursor never writes to the store.
#[derive(Debug)]
pub struct StreamCursor {
    /// `None` once the cursor failed.
    store: Option<StoreHandle>,
    attrs: Attributes,
    options: CursorOptions,
    buffer: ReadBuffer,
    /// Output offset of `buffer[0]`.
    position: u64,
    /// Store offset of the next raw byte to read.
    read_pos: u64,
    chain: Option<TransformChain>,
    /// Raw reader the chain pulls from.
    sub: Option<Box<StreamCursor>>,
    raw_mode: bool,
    initialized: bool,
    /// Output offsets differ from store offsets.
    transformed: bool,
    redetected: bool,
    refresh_pending: bool,
    exhausted: bool,
    /// Offset a stream restart was last asked for after eviction.
    evicted_restart: Option<u64>,
    failed: Option<ErrorKind>,
    link: Arc<CursorLink>,
}

impl StreamCursor {
    /// Cursor over `store`. Call [`init`](Self::init) before retrieving.
    ///
    /// The buffer is wiped on drop when the resource is marked no-store.
    #[must_use]
    pub fn new(
        store: StoreHandle,
        attrs: Attributes,
        options: CursorOptions,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let link = Arc::new(CursorLink::new(notifier));
        Self::with_link(store, attrs, options, link)
    }

    fn with_link(
        store: StoreHandle,
        attrs: Attributes,
        options: CursorOptions,
        link: Arc<CursorLink>,
    ) -> Self {
        let buffer = ReadBuffer::new(options.config.buffer, attrs.flag(FlagAttr::NoStore));
        Self {
            store: Some(store),
            attrs,
            options,
            buffer,
            position: 0,
            read_pos: 0,
            chain: None,
            sub: None,
            raw_mode: false,
            initialized: false,
            transformed: false,
            redetected: false,
            refresh_pending: false,
            exhausted: false,
            evicted_restart: None,
            failed: None,
            link,
        }
    }

    fn raw_child(&self, store: StoreHandle) -> Self {
        let mut child = Self::with_link(
            store,
            self.attrs.clone(),
            self.options.clone(),
            Arc::clone(&self.link),
        );
        child.raw_mode = true;
        child.initialized = true;
        child
    }

    /// Build the transform chain.
    ///
    /// In raw mode no chain is built and store bytes pass through as-is.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` on a second call.
    pub fn init(&mut self, raw_mode: bool) -> CursorResult<()> {
        if self.initialized {
            return Err(CursorError::AlreadyInitialized);
        }
        self.initialized = true;
        self.raw_mode = raw_mode;
        if raw_mode {
            trace!("cursor initialized in raw mode");
            return Ok(());
        }
        let chain = self.build_chain();
        if !chain.is_empty() {
            self.transformed = true;
            self.chain = Some(chain);
        }
        Ok(())
    }

    fn build_chain(&self) -> TransformChain {
        let mut builder = TransformChain::builder();

        if !self.attrs.flag(FlagAttr::EncodingHandled)
            && let Some(list) = self.attrs.get(StringAttr::TransferEncoding)
        {
            match transfer_decoders(&list) {
                Ok(decoders) => builder = builder.prepend_all(decoders),
                Err(error) => {
                    warn!(encoding = %list, %error, "cannot decode transfer encoding, delivering raw bytes");
                }
            }
        }

        let media_type = self.attrs.media_type();
        if is_text_like(&media_type) && !is_container_type(&media_type) {
            let charsets = &self.options.charsets;
            let declared = self.attrs.effective_charset().and_then(|label| {
                let charset = charsets.lookup(&label);
                if charset.is_none() {
                    debug!(charset = %label, "unknown charset label ignored");
                }
                charset
            });
            if !declared.is_some_and(Charset::is_canonical) {
                let config = &self.options.config;
                let fallback = charsets
                    .lookup(&config.default_charset)
                    .unwrap_or(Charset::Windows1252);
                let decoder =
                    CharsetDecoder::new(Arc::clone(charsets), fallback, config.charset_prescan_len)
                        .with_declared(declared);
                builder = builder.charset(Decoder::new(decoder).boxed());
            }
        }

        builder.build()
    }

    /// Pull the next batch of bytes into the consumer buffer.
    ///
    /// Decode failures are not returned: the cursor stops, reports
    /// `more == false` and posts `LoadFailed` (or, for a hideable failure,
    /// keeps delivering the remaining raw bytes).
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before [`init`](Self::init)
    /// - `OutOfMemory` when the buffer cannot grow; retrying later is fine
    pub fn retrieve(&mut self) -> CursorResult<Retrieved> {
        if !self.initialized {
            return Err(CursorError::NotInitialized);
        }
        if self.refresh_pending {
            self.refresh_pending = false;
            return Ok(Retrieved {
                produced: 0,
                more: true,
            });
        }
        let Some(store) = self.store.clone() else {
            return Ok(Retrieved::DONE);
        };

        let link = Arc::clone(&self.link);
        link.begin_cycle(self.store_has_more(&store));

        let before = self.buffer.used();
        let pulled = if self.chain.is_some() {
            self.pull_chain()
        } else {
            self.fill_raw()
        };
        let produced = self.buffer.used().saturating_sub(before);
        let mut more = match pulled {
            Ok(more) => more,
            Err(CursorError::Evicted { pos }) => {
                warn!(offset = pos, "read position left the stream window, cursor stopped");
                self.fail(ErrorKind::OutOfRange);
                false
            }
            Err(error) => {
                link.end_cycle(produced);
                return Err(error);
            }
        };

        if !more && self.chain.is_some() && self.redetect_charset() {
            more = true;
        }
        self.exhausted = !more;
        if more {
            link.request(if produced == 0 {
                self.options.retry_delay
            } else {
                None
            });
        }
        link.end_cycle(produced);

        trace!(produced, more, position = self.position, "retrieve");
        Ok(Retrieved { produced, more })
    }

    fn store_has_more(&self, store: &StoreHandle) -> bool {
        let raw = self.sub.as_ref().map_or(self.read_pos, |sub| sub.read_pos);
        store.len() > raw
    }

    fn make_room(&mut self) -> CursorResult<()> {
        if self.buffer.capacity() == 0 {
            self.buffer
                .grow(self.options.config.buffer.min_size, GrowPolicy::Big)?;
        } else {
            self.buffer.grow(0, GrowPolicy::Small)?;
        }
        Ok(())
    }

    /// Copy store bytes into the buffer; returns whether more may follow.
    ///
    /// `Evicted` when a stream store no longer holds the read position and
    /// no restart could be arranged.
    fn fill_raw(&mut self) -> CursorResult<bool> {
        self.make_room()?;
        let Some(store) = self.store.clone() else {
            return Ok(false);
        };
        if is_evicted(&store, self.read_pos) {
            return self.restart_evicted();
        }
        let n = store.read_at(self.read_pos, self.buffer.spare_mut());
        self.buffer.commit(n);
        self.read_pos += n as u64;
        Ok(!(store.is_finished() && self.read_pos >= store.len()))
    }

    /// Ask once per offset for the stream to be fetched again from
    /// `read_pos`.
    fn restart_evicted(&mut self) -> CursorResult<bool> {
        let pos = self.read_pos;
        if self.evicted_restart != Some(pos) {
            self.evicted_restart = Some(pos);
            let restarted = self
                .options
                .restart
                .as_ref()
                .is_some_and(|restart| restart.restart_from(pos));
            if restarted {
                debug!(offset = pos, "stream restarted after eviction");
                return Ok(true);
            }
        }
        Err(CursorError::Evicted { pos })
    }

    fn pull_chain(&mut self) -> CursorResult<bool> {
        self.make_room()?;
        if self.sub.is_none() {
            let Some(store) = self.store.clone() else {
                return Ok(false);
            };
            self.sub = Some(Box::new(self.raw_child(store)));
            trace!("raw sub-cursor created");
        }

        let mut more = true;
        while self.buffer.free() > 0 {
            let (Some(chain), Some(sub)) = (self.chain.as_mut(), self.sub.as_deref_mut()) else {
                return Ok(false);
            };
            match chain.read_into(self.buffer.spare_mut(), sub, &mut more) {
                Ok(n) => {
                    self.buffer.commit(n);
                    if n == 0 || !more {
                        break;
                    }
                }
                Err(error) if error.is_hideable() => {
                    self.fall_back_to_raw(&error)?;
                    return self.fill_raw();
                }
                Err(error) => {
                    warn!(%error, kind = %error.kind(), "decoding failed, cursor stopped");
                    self.fail(error.kind());
                    return Ok(false);
                }
            }
        }
        Ok(more)
    }

    /// Drop the chain and keep delivering undecoded bytes.
    fn fall_back_to_raw(&mut self, error: &DecodeError) -> CursorResult<()> {
        warn!(%error, position = self.position, "decoding stopped, passing remaining bytes through");
        self.chain = None;
        if let Some(sub) = self.sub.take() {
            self.read_pos = sub.read_pos;
            self.buffer.push(sub.buffer.filled())?;
        }
        Ok(())
    }

    fn fail(&mut self, kind: ErrorKind) {
        self.store = None;
        self.chain = None;
        self.sub = None;
        self.failed = Some(kind);
        self.link.notify(Notice::LoadFailed { kind });
    }

    /// Compare used and guessed charsets once the chain is drained.
    ///
    /// Returns whether a refresh was armed.
    fn redetect_charset(&mut self) -> bool {
        if self.redetected {
            return false;
        }
        self.redetected = true;

        let Some(report) = self.chain.as_ref().and_then(TransformChain::charsets) else {
            return false;
        };
        let explicit = self.attrs.get(StringAttr::Charset).is_some()
            || self.attrs.get(StringAttr::ForcedCharset).is_some()
            || self.attrs.content_type_param("charset").is_some();
        if explicit || report.used == report.guessed {
            return false;
        }

        debug!(used = %report.used, guessed = %report.guessed, "charset redetected, requesting reload");
        self.attrs.set(
            StringAttr::ForcedCharset,
            Some(report.guessed.name().to_string()),
        );
        self.refresh_pending = true;
        for notice in [
            Notice::ReloadFromCache,
            Notice::ReplayHeaders,
            Notice::ReplayInlineReplacements,
        ] {
            self.link.notify(notice);
        }
        true
    }

    /// Release `n` buffered bytes.
    pub fn consume(&mut self, n: usize) {
        let n = self.buffer.consume(n);
        self.position += n as u64;
        if n > 0 {
            self.link.data_consumed();
        }
    }

    /// Reposition to output offset `pos`.
    ///
    /// # Errors
    ///
    /// - `NotSeekable` when output is transformed (offsets no longer map to
    ///   the store), the cursor failed, or a stream restart was refused
    /// - `OutOfRange` when the store cannot serve `pos` yet
    pub fn seek(&mut self, pos: u64) -> CursorResult<()> {
        let window_end = self.position + self.buffer.used() as u64;
        if (self.position..=window_end).contains(&pos) {
            self.consume((pos - self.position) as usize);
            return Ok(());
        }
        if self.transformed {
            return Err(SeekError::NotSeekable { pos }.into());
        }
        let Some(store) = self.store.as_ref() else {
            return Err(SeekError::NotSeekable { pos }.into());
        };

        let at_end = store.is_finished() && pos == store.len();
        match store.kind() {
            StoreKind::Memory => {
                if pos > store.len() {
                    return Err(SeekError::OutOfRange { pos }.into());
                }
            }
            StoreKind::RandomAccess => {
                if !at_end && !store.coverage(pos, 1).available {
                    return Err(SeekError::OutOfRange { pos }.into());
                }
            }
            StoreKind::Stream => {
                if !at_end && !store.coverage(pos, 1).available {
                    let restarted = self
                        .options
                        .restart
                        .as_ref()
                        .is_some_and(|restart| restart.restart_from(pos));
                    if !restarted {
                        return Err(SeekError::NotSeekable { pos }.into());
                    }
                    debug!(offset = pos, "stream restarted for seek");
                }
            }
        }

        trace!(from = self.position, to = pos, "seek");
        self.buffer.clear();
        self.position = pos;
        self.read_pos = pos;
        self.exhausted = false;
        Ok(())
    }

    /// Output offset of the first buffered byte.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes retrieved and not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        self.buffer.filled()
    }

    /// Whether the last retrieve reported the end, or the cursor failed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.exhausted || self.failed.is_some()
    }

    /// Charset the character decoder settled on.
    #[must_use]
    pub fn used_charset(&self) -> Option<Charset> {
        self.chain
            .as_ref()
            .and_then(TransformChain::charsets)
            .map(|report| report.used)
    }

    /// Kind of the failure that stopped this cursor.
    #[must_use]
    pub fn failure(&self) -> Option<ErrorKind> {
        self.failed
    }

    /// Transform names in execution order.
    #[must_use]
    pub fn chain_names(&self) -> Vec<&'static str> {
        self.chain
            .as_ref()
            .map(TransformChain::names)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_raw_mode(&self) -> bool {
        self.raw_mode
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Notification endpoint; stores hold a `Weak` to it to report new data.
    #[must_use]
    pub fn link(&self) -> &Arc<CursorLink> {
        &self.link
    }

    /// Replace the store this cursor reads from, keeping offsets.
    pub fn repoint(&mut self, store: StoreHandle) {
        if let Some(sub) = self.sub.as_mut() {
            sub.store = Some(Arc::clone(&store));
        }
        if self.failed.is_none() {
            self.store = Some(store);
        }
    }
}

/// The stream window has already moved past `pos`.
fn is_evicted(store: &StoreHandle, pos: u64) -> bool {
    store.kind() == StoreKind::Stream && pos < store.len() && !store.coverage(pos, 1).available
}

/// A raw cursor feeds transforms straight from its store.
impl Upstream for StreamCursor {
    fn peek(&mut self) -> DecodeResult<Chunk<'_>> {
        let more = self.fill_raw().map_err(|error| match error {
            CursorError::OutOfMemory { requested } => DecodeError::OutOfMemory { requested },
            other => DecodeError::Upstream {
                kind: other.kind().unwrap_or(ErrorKind::DecodeFailure),
            },
        })?;
        Ok(Chunk {
            data: self.buffer.filled(),
            more,
        })
    }

    fn advance(&mut self, n: usize) {
        let n = self.buffer.consume(n);
        self.position += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use weft_core::ResourceAttrs;
    use weft_events::NullNotifier;
    use weft_storage::{ByteStore, MemStore};

    use super::*;

    fn cursor(store: &MemStore, attrs: ResourceAttrs) -> StreamCursor {
        let mut cursor = StreamCursor::new(
            Arc::new(store.clone()),
            attrs.into(),
            CursorOptions::default(),
            Arc::new(NullNotifier),
        );
        cursor.init(false).unwrap();
        cursor
    }

    #[test]
    fn test_double_init_is_rejected() {
        let store = MemStore::new();
        let mut cursor = cursor(&store, ResourceAttrs::new("image/png"));
        assert_eq!(cursor.init(false), Err(CursorError::AlreadyInitialized));
    }

    #[test]
    fn test_retrieve_before_init() {
        let mut cursor = StreamCursor::new(
            Arc::new(MemStore::new()),
            Attributes::default(),
            CursorOptions::default(),
            Arc::new(NullNotifier),
        );
        assert_eq!(cursor.retrieve(), Err(CursorError::NotInitialized));
    }

    #[rstest]
    #[case::binary("image/png", None, &[])]
    #[case::utf8_text("text/html; charset=utf-8", None, &[])]
    #[case::legacy_text("text/html", None, &["charset"])]
    #[case::container("multipart/mixed", None, &[])]
    #[case::form_data("multipart/form-data; boundary=b", None, &[])]
    #[case::gzip_text("text/plain", Some("gzip"), &["gzip", "charset"])]
    #[case::layered("application/octet-stream", Some("gzip, base64"), &["base64", "gzip"])]
    #[case::unknown_encoding("image/png", Some("br"), &[])]
    fn test_chain_layout(
        #[case] content_type: &str,
        #[case] encoding: Option<&str>,
        #[case] expected: &[&str],
    ) {
        let mut attrs = ResourceAttrs::new(content_type);
        if let Some(encoding) = encoding {
            attrs = attrs.with_transfer_encoding(encoding);
        }
        let cursor = cursor(&MemStore::new(), attrs);
        assert_eq!(cursor.chain_names(), expected);
    }

    #[test]
    fn test_handled_encoding_is_not_decoded_twice() {
        let attrs = Attributes::new(ResourceAttrs::new("image/png").with_transfer_encoding("gzip"));
        attrs.set_flag(FlagAttr::EncodingHandled, true);
        let mut cursor = StreamCursor::new(
            Arc::new(MemStore::new()),
            attrs,
            CursorOptions::default(),
            Arc::new(NullNotifier),
        );
        cursor.init(false).unwrap();
        assert!(cursor.chain_names().is_empty());
    }

    #[test]
    fn test_raw_mode_skips_chain() {
        let store = MemStore::from_bytes(b"abc");
        let mut cursor = StreamCursor::new(
            Arc::new(store),
            ResourceAttrs::new("text/html").with_transfer_encoding("gzip").into(),
            CursorOptions::default(),
            Arc::new(NullNotifier),
        );
        cursor.init(true).unwrap();
        assert!(cursor.is_raw_mode());
        let got = cursor.retrieve().unwrap();
        assert_eq!(got, Retrieved { produced: 3, more: false });
        assert_eq!(cursor.buffered(), b"abc");
    }

    #[test]
    fn test_consume_advances_without_redelivery() {
        let store = MemStore::new();
        store.append(b"hello world").unwrap();
        let mut cursor = cursor(&store, ResourceAttrs::new("image/png"));

        cursor.retrieve().unwrap();
        cursor.consume(6);
        assert_eq!(cursor.position(), 6);
        assert_eq!(cursor.buffered(), b"world");

        store.append(b"!").unwrap();
        store.finish(false);
        let got = cursor.retrieve().unwrap();
        assert_eq!(got.produced, 1);
        assert_eq!(cursor.buffered(), b"world!");
        cursor.consume(100);
        assert!(cursor.buffered().is_empty());
        assert_eq!(cursor.position(), 12);
    }

    #[test]
    fn test_sub_cursor_is_raw_and_shares_link() {
        let store = MemStore::new();
        let parent = cursor(&store, ResourceAttrs::new("text/html"));
        let child = parent.raw_child(Arc::new(store));
        assert!(child.is_raw_mode());
        assert!(Arc::ptr_eq(child.link(), parent.link()));
        assert!(child.chain_names().is_empty());
    }
}
