#![forbid(unsafe_code)]

//! `gzip` / `deflate` content decoding on top of `flate2`'s write decoders.

use std::{fmt, io::Write};

use flate2::write::{DeflateDecoder, GzDecoder, ZlibDecoder};

use crate::{BlockDecode, DecodeError, DecodeResult, Pending};

enum State {
    /// `deflate` before the first two bytes: zlib wrapper or raw stream?
    Sniffing(Vec<u8>),
    Gzip(GzDecoder<Vec<u8>>),
    Zlib(ZlibDecoder<Vec<u8>>),
    Raw(DeflateDecoder<Vec<u8>>),
}

/// Inflating decoder for `gzip`, `x-gzip` and `deflate`.
pub struct Inflate {
    label: &'static str,
    state: State,
}

impl fmt::Debug for Inflate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Sniffing(_) => "sniffing",
            State::Gzip(_) => "gzip",
            State::Zlib(_) => "zlib",
            State::Raw(_) => "raw",
        };
        f.debug_struct("Inflate")
            .field("label", &self.label)
            .field("state", &state)
            .finish()
    }
}

/// RFC 1950 header: CM = 8 and the check bits make the pair divisible by 31.
fn is_zlib_header(cmf: u8, flg: u8) -> bool {
    cmf & 0x0F == 8 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

/// Write `input`, ignoring bytes after the end of the compressed stream.
fn write_through<W: Write>(w: &mut W, mut input: &[u8]) -> std::io::Result<()> {
    while !input.is_empty() {
        let n = w.write(input)?;
        if n == 0 {
            break;
        }
        input = &input[n..];
    }
    Ok(())
}

impl Inflate {
    #[must_use]
    pub fn gzip() -> Self {
        Self {
            label: "gzip",
            state: State::Gzip(GzDecoder::new(Vec::new())),
        }
    }

    /// `deflate`, accepting both the zlib-wrapped and the raw form.
    #[must_use]
    pub fn deflate() -> Self {
        Self {
            label: "deflate",
            state: State::Sniffing(Vec::with_capacity(2)),
        }
    }

    fn take_output(&mut self, out: &mut Pending) -> DecodeResult<()> {
        let produced = match &mut self.state {
            State::Sniffing(_) => return Ok(()),
            State::Gzip(d) => std::mem::take(d.get_mut()),
            State::Zlib(d) => std::mem::take(d.get_mut()),
            State::Raw(d) => std::mem::take(d.get_mut()),
        };
        out.reserve(produced.len())?;
        out.extend(&produced);
        Ok(())
    }

    fn pick_deflate_variant(&mut self, head: &[u8]) {
        self.state = if head.len() >= 2 && is_zlib_header(head[0], head[1]) {
            State::Zlib(ZlibDecoder::new(Vec::new()))
        } else {
            State::Raw(DeflateDecoder::new(Vec::new()))
        };
    }
}

impl BlockDecode for Inflate {
    fn name(&self) -> &'static str {
        self.label
    }

    fn feed(&mut self, input: &[u8], out: &mut Pending) -> DecodeResult<()> {
        let label = self.label;
        if let State::Sniffing(head) = &mut self.state {
            head.extend_from_slice(input);
            if head.len() < 2 {
                return Ok(());
            }
            let head = std::mem::take(head);
            self.pick_deflate_variant(&head);
            return self.feed(&head, out);
        }
        let result = match &mut self.state {
            State::Sniffing(_) => Ok(()),
            State::Gzip(d) => write_through(d, input),
            State::Zlib(d) => write_through(d, input),
            State::Raw(d) => write_through(d, input),
        };
        result.map_err(|e| DecodeError::corrupt(label, e))?;
        self.take_output(out)
    }

    fn finish(&mut self, out: &mut Pending) -> DecodeResult<()> {
        let label = self.label;
        if let State::Sniffing(head) = &mut self.state {
            let head = std::mem::take(head);
            if head.is_empty() {
                return Ok(());
            }
            self.pick_deflate_variant(&head);
            self.feed(&head, out)?;
        }
        let result = match &mut self.state {
            State::Sniffing(_) => Ok(()),
            State::Gzip(d) => d.try_finish(),
            State::Zlib(d) => d.try_finish(),
            State::Raw(d) => d.try_finish(),
        };
        // Output produced before a failing trailer is still handed out.
        self.take_output(out)?;
        result.map_err(|e| DecodeError::corrupt(label, e))
    }
}
