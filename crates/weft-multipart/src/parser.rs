#![forbid(unsafe_code)]

//! Push parser for RFC 2046 multipart bodies.
//!
//! Input may be split anywhere; bytes that could still turn out to be part
//! of a delimiter are held back until the next [`MultipartParser::feed`].

use std::mem;

use tracing::trace;

use crate::{MultipartError, MultipartResult, PartHeaders};

/// Output of the parser, in stream order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseEvent {
    /// Headers of a new part were parsed.
    PartStart(PartHeaders),
    /// Body bytes of the current part.
    Data(Vec<u8>),
    /// The current part ended.
    PartEnd,
    /// The close delimiter was seen; everything after it is epilogue.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Preamble,
    Headers,
    Body,
    Epilogue,
}

enum Delimiter {
    Incomplete,
    NotDelimiter,
    /// Delimiter line ends at the given offset; a part follows.
    Part(usize),
    /// Close delimiter ends at the given offset.
    Close(usize),
}

#[derive(Debug)]
pub struct MultipartParser {
    /// `\n--boundary`; a CR before the LF belongs to the delimiter too.
    pattern: Vec<u8>,
    state: State,
    buf: Vec<u8>,
    max_header_len: usize,
}

impl MultipartParser {
    #[must_use]
    pub fn new(boundary: &str, max_header_len: usize) -> Self {
        let mut pattern = Vec::with_capacity(boundary.len() + 3);
        pattern.extend_from_slice(b"\n--");
        pattern.extend_from_slice(boundary.as_bytes());
        Self {
            pattern,
            state: State::Preamble,
            // A delimiter on the very first line has no line break before it.
            buf: vec![b'\n'],
            max_header_len,
        }
    }

    /// Infer the boundary from the first delimiter line of `head`.
    ///
    /// Returns `None` until a complete line starting with `--` is available.
    #[must_use]
    pub fn sniff_boundary(head: &[u8]) -> Option<String> {
        let mut rest = head;
        loop {
            let eol = rest.iter().position(|&b| b == b'\n')?;
            let line = String::from_utf8_lossy(&rest[..eol]);
            let line = line.trim_end();
            if let Some(boundary) = line.strip_prefix("--") {
                return (!boundary.is_empty()).then(|| boundary.to_string());
            }
            rest = &rest[eol + 1..];
        }
    }

    /// Whether the close delimiter was seen.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == State::Epilogue
    }

    /// Whether a part is open (its headers were parsed, its end was not).
    #[must_use]
    pub fn in_part(&self) -> bool {
        self.state == State::Body
    }

    /// Feed the next input bytes, appending what they complete to `events`.
    ///
    /// Events produced before a failure are still appended.
    ///
    /// # Errors
    ///
    /// `HeaderTooLarge` when a header block exceeds the configured limit.
    pub fn feed(&mut self, input: &[u8], events: &mut Vec<ParseEvent>) -> MultipartResult<()> {
        if self.state == State::Epilogue {
            return Ok(());
        }
        self.buf.extend_from_slice(input);
        while self.step(events)? {}
        Ok(())
    }

    /// End of input: an open part is ended with whatever was held back.
    pub fn finish(&mut self) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        if self.state == State::Body {
            let data = mem::take(&mut self.buf);
            if !data.is_empty() {
                events.push(ParseEvent::Data(data));
            }
            events.push(ParseEvent::PartEnd);
        }
        self.state = State::Epilogue;
        self.buf.clear();
        events
    }

    fn step(&mut self, events: &mut Vec<ParseEvent>) -> MultipartResult<bool> {
        match self.state {
            State::Preamble => Ok(self.skip_preamble(events)),
            State::Headers => self.parse_headers(events),
            State::Body => Ok(self.scan_body(events)),
            State::Epilogue => {
                self.buf.clear();
                Ok(false)
            }
        }
    }

    fn skip_preamble(&mut self, events: &mut Vec<ParseEvent>) -> bool {
        let Some(at) = find(&self.buf, &self.pattern) else {
            let keep = self.pattern.len() - 1;
            if self.buf.len() > keep {
                self.buf.drain(..self.buf.len() - keep);
            }
            return false;
        };
        match self.classify(at) {
            Delimiter::Incomplete => {
                self.buf.drain(..at);
                false
            }
            Delimiter::NotDelimiter => {
                self.buf.drain(..=at);
                true
            }
            Delimiter::Part(end) => {
                self.buf.drain(..end);
                self.state = State::Headers;
                true
            }
            Delimiter::Close(_) => {
                trace!("multipart body closed without parts");
                self.close(events);
                false
            }
        }
    }

    fn parse_headers(&mut self, events: &mut Vec<ParseEvent>) -> MultipartResult<bool> {
        let Some((block, consumed)) = header_end(&self.buf) else {
            if self.buf.len() > self.max_header_len {
                return Err(MultipartError::HeaderTooLarge {
                    limit: self.max_header_len,
                });
            }
            return Ok(false);
        };
        if block > self.max_header_len {
            return Err(MultipartError::HeaderTooLarge {
                limit: self.max_header_len,
            });
        }
        let headers = PartHeaders::parse(&self.buf[..block]);
        self.buf.drain(..consumed);
        trace!(fields = headers.len(), "part headers parsed");
        events.push(ParseEvent::PartStart(headers));
        self.state = State::Body;
        Ok(true)
    }

    fn scan_body(&mut self, events: &mut Vec<ParseEvent>) -> bool {
        let Some(at) = find(&self.buf, &self.pattern) else {
            // Hold back a possible `\r\n--boundary` prefix.
            let keep = self.pattern.len() + 1;
            if self.buf.len() > keep {
                let data: Vec<u8> = self.buf.drain(..self.buf.len() - keep).collect();
                events.push(ParseEvent::Data(data));
            }
            return false;
        };
        let data_end = if at > 0 && self.buf[at - 1] == b'\r' {
            at - 1
        } else {
            at
        };
        match self.classify(at) {
            Delimiter::Incomplete => {
                if data_end > 0 {
                    let data: Vec<u8> = self.buf.drain(..data_end).collect();
                    events.push(ParseEvent::Data(data));
                }
                false
            }
            Delimiter::NotDelimiter => {
                let data: Vec<u8> = self.buf.drain(..=at).collect();
                events.push(ParseEvent::Data(data));
                true
            }
            Delimiter::Part(end) => {
                self.end_part(data_end, events);
                self.buf.drain(..end - data_end);
                self.state = State::Headers;
                true
            }
            Delimiter::Close(_) => {
                self.end_part(data_end, events);
                self.close(events);
                false
            }
        }
    }

    fn end_part(&mut self, data_end: usize, events: &mut Vec<ParseEvent>) {
        if data_end > 0 {
            let data: Vec<u8> = self.buf.drain(..data_end).collect();
            events.push(ParseEvent::Data(data));
        }
        events.push(ParseEvent::PartEnd);
    }

    fn close(&mut self, events: &mut Vec<ParseEvent>) {
        self.buf.clear();
        self.state = State::Epilogue;
        events.push(ParseEvent::Closed);
    }

    /// Look at what follows the candidate delimiter at `at`.
    fn classify(&self, at: usize) -> Delimiter {
        let start = at + self.pattern.len();
        let rest = &self.buf[start..];
        match rest {
            [] | [b'-'] => return Delimiter::Incomplete,
            [b'-', b'-', ..] => return Delimiter::Close(start + 2),
            [b'-', ..] => return Delimiter::NotDelimiter,
            _ => {}
        }
        // Transport padding.
        let pad = rest
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        match &rest[pad..] {
            [] | [b'\r'] => Delimiter::Incomplete,
            [b'\n', ..] => Delimiter::Part(start + pad + 1),
            [b'\r', b'\n', ..] => Delimiter::Part(start + pad + 2),
            _ => Delimiter::NotDelimiter,
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the header block and of the block plus its blank line.
fn header_end(buf: &[u8]) -> Option<(usize, usize)> {
    if buf.starts_with(b"\r\n") {
        return Some((0, 2));
    }
    if buf.starts_with(b"\n") {
        return Some((0, 1));
    }
    let crlf = find(buf, b"\n\r\n").map(|i| (i + 1, i + 3));
    let lf = find(buf, b"\n\n").map(|i| (i + 1, i + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
