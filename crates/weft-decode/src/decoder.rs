#![forbid(unsafe_code)]

use std::fmt::Debug;

use tracing::{debug, warn};

use crate::{ByteTransform, CharsetReport, DecodeError, DecodeResult, Pending, Upstream};

/// Push-style decoder core: receives input blocks, emits into [`Pending`].
///
/// [`Decoder`] adapts it to the pull-style [`ByteTransform`] contract.
pub trait BlockDecode: Send + Debug {
    fn name(&self) -> &'static str;

    /// Decode one block of input. The whole block is consumed.
    ///
    /// # Errors
    ///
    /// `Corrupt` on invalid input, `OutOfMemory` when output cannot grow.
    fn feed(&mut self, input: &[u8], out: &mut Pending) -> DecodeResult<()>;

    /// Input is exhausted: flush buffered state.
    ///
    /// # Errors
    ///
    /// `Corrupt` when the input ended mid-stream.
    fn finish(&mut self, out: &mut Pending) -> DecodeResult<()>;

    fn charsets(&self) -> Option<CharsetReport> {
        None
    }
}

/// [`ByteTransform`] driving a [`BlockDecode`].
#[derive(Debug)]
pub struct Decoder<D> {
    inner: D,
    pending: Pending,
    done: bool,
    delivered: u64,
    failed: Option<DecodeError>,
}

impl<D: BlockDecode> Decoder<D> {
    #[must_use]
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            pending: Pending::new(),
            done: false,
            delivered: 0,
            failed: None,
        }
    }

    /// Bytes handed to callers so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    #[must_use]
    pub fn inner(&self) -> &D {
        &self.inner
    }

    #[must_use]
    pub fn boxed(self) -> Box<dyn ByteTransform>
    where
        D: 'static,
    {
        Box::new(self)
    }
}

impl<D: BlockDecode> ByteTransform for Decoder<D> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn read_into(
        &mut self,
        out: &mut [u8],
        upstream: &mut dyn Upstream,
        more: &mut bool,
    ) -> DecodeResult<usize> {
        if let Some(err) = self.failed.take() {
            return Err(err);
        }
        let mut written = 0;
        loop {
            written += self.pending.drain_into(&mut out[written..]);
            if written == out.len() {
                *more = !(self.done && self.pending.is_empty());
                break;
            }
            if self.done {
                *more = false;
                break;
            }
            let step = match upstream.peek() {
                Ok(chunk) if chunk.data.is_empty() && chunk.more => {
                    *more = true;
                    break;
                }
                Ok(chunk) if chunk.data.is_empty() => {
                    self.done = true;
                    self.inner.finish(&mut self.pending).map(|()| 0)
                }
                Ok(chunk) => self
                    .inner
                    .feed(chunk.data, &mut self.pending)
                    .map(|()| chunk.data.len()),
                Err(err) => Err(err),
            };
            match step {
                Ok(consumed) => upstream.advance(consumed),
                Err(err) => {
                    let err = err.with_hideable(self.delivered + written as u64 > 0);
                    warn!(transform = self.inner.name(), %err, "decode failed");
                    self.done = true;
                    if written > 0 {
                        // Deliver what we have; report the failure next call.
                        self.failed = Some(err);
                        *more = true;
                        break;
                    }
                    return Err(err);
                }
            }
        }
        self.delivered += written as u64;
        if !*more {
            debug!(
                transform = self.inner.name(),
                delivered = self.delivered,
                "decoder drained"
            );
        }
        Ok(written)
    }

    fn charsets(&self) -> Option<CharsetReport> {
        self.inner.charsets()
    }
}
