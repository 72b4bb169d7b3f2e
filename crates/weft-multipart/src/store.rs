#![forbid(unsafe_code)]

use std::{fmt, sync::Arc};

use tracing::{debug, trace, warn};
use weft_cache::{CacheDecorator, CacheError, CacheResult};
use weft_core::{Attributes, ErrorKind};
use weft_events::{EventBus, Notifier, PartEvent};
use weft_storage::{ByteStore, MemStore, StoreHandle};
use weft_stream::{CursorOptions, Retrieved, StreamCursor};

use crate::{MultipartError, MultipartParser, MultipartResult, ParseEvent, PartHeaders};

/// Longest incomplete `--` line still kept while the boundary is unknown.
const MAX_DELIMITER_LINE: usize = 256;

/// Consecutive empty drains of a nested decoder before its part is left as is.
const MAX_STALLED_DRAINS: usize = 3;

/// Lifecycle of one body part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartState {
    /// Delimiter seen, headers not complete yet.
    Discovered,
    /// Headers parsed and the child resource allocated.
    HeaderParsed,
    /// Body bytes are being routed to the child.
    BodyStreaming,
    /// The child store was finished.
    Finished,
}

/// One body part stored as its own resource.
#[derive(Debug)]
pub struct ChildPart {
    index: usize,
    headers: PartHeaders,
    store: MemStore,
    decorator: CacheDecorator,
    nested: Option<Box<MultipartDecodeStore>>,
    state: PartState,
}

impl ChildPart {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        self.decorator.attributes()
    }

    /// Final (decoded) bytes of the part.
    #[must_use]
    pub fn store(&self) -> &MemStore {
        &self.store
    }

    #[must_use]
    pub fn decorator(&self) -> &CacheDecorator {
        &self.decorator
    }

    /// Decoder for a `multipart/*` part.
    #[must_use]
    pub fn nested(&self) -> Option<&MultipartDecodeStore> {
        self.nested.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> PartState {
        self.state
    }

    /// Open a cursor over the part's bytes.
    ///
    /// # Errors
    ///
    /// Propagates cursor initialisation failures.
    pub fn new_cursor(
        &self,
        raw_mode: bool,
        notifier: Arc<dyn Notifier>,
    ) -> CacheResult<StreamCursor> {
        self.decorator.new_cursor(raw_mode, notifier)
    }
}

/// Decodes a multipart resource into child resources while it streams in.
///
/// The store is itself a consumer of its upstream: every
/// [`retrieve`](Self::retrieve) pulls what the upstream cursor has, splits
/// it at the boundary delimiters and routes the body bytes to the child of
/// the current part. A child's store is finished exactly once, when its part
/// ends or the upstream runs dry.
pub struct MultipartDecodeStore {
    cursor: StreamCursor,
    options: CursorOptions,
    notifier: Arc<dyn Notifier>,
    events: Option<EventBus>,
    parser: Option<MultipartParser>,
    /// Preamble skipping stopped inside a line.
    mid_line: bool,
    parts: Vec<ChildPart>,
    finished: bool,
    failure: Option<ErrorKind>,
}

impl MultipartDecodeStore {
    /// Read `upstream` through a fresh cursor.
    ///
    /// # Errors
    ///
    /// Propagates cursor initialisation failures.
    pub fn new(
        upstream: StoreHandle,
        attrs: Attributes,
        options: CursorOptions,
        notifier: Arc<dyn Notifier>,
    ) -> MultipartResult<Self> {
        let mut cursor = StreamCursor::new(upstream, attrs, options.clone(), Arc::clone(&notifier));
        cursor.init(false)?;
        Ok(Self::from_cursor(cursor, options, notifier))
    }

    /// Read through an initialised cursor, typically one created by the
    /// upstream's [`CacheDecorator::new_cursor`].
    #[must_use]
    pub fn from_cursor(
        cursor: StreamCursor,
        options: CursorOptions,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cursor,
            options,
            notifier,
            events: None,
            parser: None,
            mid_line: false,
            parts: Vec::new(),
            finished: false,
            failure: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Parts discovered so far, in stream order.
    #[must_use]
    pub fn parts(&self) -> &[ChildPart] {
        &self.parts
    }

    #[must_use]
    pub fn part(&self, index: usize) -> Option<&ChildPart> {
        self.parts.get(index)
    }

    /// Whether the upstream was fully consumed (or decoding failed).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn failure(&self) -> Option<ErrorKind> {
        self.failure
    }

    /// Whether the parser exists, i.e. a boundary is known.
    #[must_use]
    pub fn has_decoder(&self) -> bool {
        self.parser.is_some()
    }

    /// Pull upstream bytes and route them to the children.
    ///
    /// `produced` counts upstream bytes consumed. Without a declared
    /// boundary the decoder is created only once the first delimiter line
    /// arrived; lines before it that cannot be a delimiter are skipped, so
    /// `produced` stays 0 only while a possible delimiter is incomplete.
    ///
    /// Parse failures finish open children, notify the consumer with
    /// `LoadFailed` and end decoding; they are not returned as errors.
    ///
    /// # Errors
    ///
    /// - `Cursor` for caller bugs on the upstream cursor
    /// - `Child` when a child store refused bytes; that part is closed and
    ///   the remaining parts go on
    pub fn retrieve(&mut self) -> MultipartResult<Retrieved> {
        if self.finished {
            return Ok(Retrieved {
                produced: 0,
                more: false,
            });
        }
        let got = self.cursor.retrieve()?;
        if let Some(kind) = self.cursor.failure() {
            // The cursor already told the consumer.
            debug!(?kind, "upstream failed, closing parts");
            self.close_open_parts()?;
            self.finished = true;
            self.failure = Some(kind);
            return Ok(Retrieved {
                produced: 0,
                more: false,
            });
        }

        let mut skipped = 0;
        if self.parser.is_none() {
            skipped = self.skip_preamble();
            match self.create_parser(got.more) {
                Ok(Some(parser)) => self.parser = Some(parser),
                Ok(None) => {
                    trace!(
                        skipped,
                        buffered = self.cursor.buffered().len(),
                        "waiting for boundary"
                    );
                    return Ok(Retrieved {
                        produced: skipped,
                        more: true,
                    });
                }
                Err(e) => return self.abort(e),
            }
        }

        let input = self.cursor.buffered();
        let consumed = input.len();
        let mut events = Vec::new();
        let parsed = match self.parser.as_mut() {
            Some(parser) => parser.feed(input, &mut events),
            None => Ok(()),
        };
        self.cursor.consume(consumed);
        let mut dispatched = self.dispatch(events);
        if let Err(e) = parsed {
            let aborted = self.abort(e)?;
            return dispatched.map(|()| aborted);
        }

        if !got.more {
            let tail = self
                .parser
                .as_mut()
                .map(MultipartParser::finish)
                .unwrap_or_default();
            dispatched = dispatched.and(self.dispatch(tail));
            self.close_open_parts()?;
            self.finished = true;
            debug!(parts = self.parts.len(), "multipart body done");
        }
        self.drive_nested()?;
        dispatched?;

        Ok(Retrieved {
            produced: skipped + consumed,
            more: !self.finished,
        })
    }

    /// Drop buffered lines that cannot be the first delimiter while the
    /// boundary is undeclared. The buffer is left at the start of a line
    /// beginning with `--` (or empty).
    fn skip_preamble(&mut self) -> usize {
        if self.cursor.attributes().content_type_param("boundary").is_some() {
            return 0;
        }
        let buffered = self.cursor.buffered();
        let mut skip = 0;
        loop {
            let rest = &buffered[skip..];
            let eol = rest.iter().position(|&b| b == b'\n');
            if !self.mid_line && may_start_delimiter(rest, eol) {
                break;
            }
            match eol {
                Some(eol) => {
                    skip += eol + 1;
                    self.mid_line = false;
                }
                None => {
                    skip = buffered.len();
                    self.mid_line = true;
                    break;
                }
            }
        }
        if skip > 0 {
            trace!(skip, "preamble skipped");
            self.cursor.consume(skip);
        }
        skip
    }

    fn create_parser(&self, more: bool) -> MultipartResult<Option<MultipartParser>> {
        let boundary = match self.cursor.attributes().content_type_param("boundary") {
            Some(boundary) => boundary,
            None => match MultipartParser::sniff_boundary(self.cursor.buffered()) {
                Some(boundary) => boundary,
                None if more => return Ok(None),
                None => return Err(MultipartError::MissingBoundary),
            },
        };
        debug!(boundary = %boundary, "multipart decoder created");
        Ok(Some(MultipartParser::new(
            &boundary,
            self.options.config.max_part_header_len,
        )))
    }

    /// Apply every event of a batch; the first failure is returned after
    /// the rest were applied.
    fn dispatch(&mut self, events: Vec<ParseEvent>) -> MultipartResult<()> {
        let mut first_error = None;
        for event in events {
            let applied = match event {
                ParseEvent::PartStart(headers) => self.open_part(headers),
                ParseEvent::Data(data) => self.route(&data),
                ParseEvent::PartEnd => match self.open_index() {
                    Some(index) => self.close_part(index),
                    None => Ok(()),
                },
                ParseEvent::Closed => {
                    trace!("close delimiter");
                    Ok(())
                }
            };
            if let Err(error) = applied {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn open_part(&mut self, headers: PartHeaders) -> MultipartResult<()> {
        let index = self.parts.len();
        let attrs = headers.to_attributes();
        let mut config = self.options.config.clone();
        config.sniff_on_store = config.sniff_on_store && !headers.has_content_type();
        let options = self.options.clone().with_config(config);

        let store = MemStore::new();
        let mut decorator =
            CacheDecorator::new(Arc::new(store.clone()), attrs.clone(), options.clone());
        if let Some(bus) = &self.events {
            decorator = decorator.with_events(bus.clone());
        }

        let content_type = attrs.media_type();
        let attachment = headers.is_attachment();
        let mut part = ChildPart {
            index,
            headers,
            store,
            decorator,
            nested: None,
            state: PartState::Discovered,
        };

        if content_type.starts_with("multipart/") {
            let cursor = part
                .decorator
                .new_cursor(false, Arc::clone(&self.notifier))
                .map_err(|source| MultipartError::Child { index, source })?;
            let mut nested =
                Self::from_cursor(cursor, options, Arc::clone(&self.notifier));
            if let Some(bus) = &self.events {
                nested = nested.with_events(bus.clone());
            }
            part.nested = Some(Box::new(nested));
        }
        part.state = PartState::HeaderParsed;

        debug!(index, content_type = %content_type, attachment, "part discovered");
        self.publish(PartEvent::Discovered {
            index,
            content_type,
            attachment,
        });
        self.parts.push(part);
        Ok(())
    }

    fn open_index(&self) -> Option<usize> {
        self.parts
            .last()
            .filter(|p| p.state != PartState::Finished)
            .map(|p| p.index)
    }

    fn route(&mut self, data: &[u8]) -> MultipartResult<()> {
        let Some(index) = self.open_index() else {
            return Ok(());
        };
        let part = &mut self.parts[index];
        part.state = PartState::BodyStreaming;
        match part.decorator.store(Some(data)) {
            Ok(()) => Ok(()),
            Err(source @ CacheError::Decode(_)) => {
                // The child keeps what it decoded; the other parts go on.
                warn!(index, error = %source, "part decoding abandoned");
                Ok(())
            }
            Err(source) => {
                warn!(index, error = %source, "part store failed, part closed");
                part.decorator.finish(true);
                part.state = PartState::Finished;
                let bytes = part.store.len();
                self.publish(PartEvent::Finished { index, bytes });
                Err(MultipartError::Child { index, source })
            }
        }
    }

    fn close_part(&mut self, index: usize) -> MultipartResult<()> {
        let Some(part) = self.parts.get_mut(index) else {
            return Ok(());
        };
        if part.state == PartState::Finished {
            return Ok(());
        }
        part.decorator.finish(false);
        part.state = PartState::Finished;
        let bytes = part.store.len();
        if let Some(nested) = part.nested.as_mut() {
            let mut stalled = 0;
            loop {
                let got = nested.retrieve()?;
                if !got.more {
                    break;
                }
                stalled = if got.produced == 0 { stalled + 1 } else { 0 };
                if stalled >= MAX_STALLED_DRAINS {
                    warn!(index, "nested multipart stopped making progress");
                    break;
                }
            }
        }
        debug!(index, bytes, "part finished");
        self.publish(PartEvent::Finished { index, bytes });
        Ok(())
    }

    fn close_open_parts(&mut self) -> MultipartResult<()> {
        for index in 0..self.parts.len() {
            self.close_part(index)?;
        }
        Ok(())
    }

    /// Let nested decoders catch up with their child's bytes.
    fn drive_nested(&mut self) -> MultipartResult<()> {
        for part in &mut self.parts {
            let Some(nested) = part.nested.as_mut() else {
                continue;
            };
            loop {
                let got = nested.retrieve()?;
                if !got.more || got.produced == 0 {
                    break;
                }
            }
        }
        Ok(())
    }

    fn abort(&mut self, error: MultipartError) -> MultipartResult<Retrieved> {
        let kind = error.kind().unwrap_or(ErrorKind::DecodeFailure);
        warn!(error = %error, "multipart decoding failed");
        self.parser = None;
        self.close_open_parts()?;
        self.finished = true;
        self.failure = Some(kind);
        self.notifier.load_failed(kind);
        self.publish(PartEvent::Failed {
            error: error.to_string(),
        });
        Ok(Retrieved {
            produced: 0,
            more: false,
        })
    }

    fn publish(&self, event: PartEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

/// Whether the line at the start of `rest` (complete up to `eol`) may be a
/// first delimiter line.
fn may_start_delimiter(rest: &[u8], eol: Option<usize>) -> bool {
    match eol {
        Some(eol) => {
            let line = rest[..eol].trim_ascii_end();
            line.len() > 2 && line.starts_with(b"--")
        }
        None => {
            rest.len() <= MAX_DELIMITER_LINE
                && (rest.starts_with(b"--") || b"--".starts_with(rest))
        }
    }
}

impl fmt::Debug for MultipartDecodeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartDecodeStore")
            .field("cursor", &self.cursor)
            .field("has_decoder", &self.parser.is_some())
            .field("parts", &self.parts.len())
            .field("finished", &self.finished)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}
