#![forbid(unsafe_code)]

use std::fmt::Debug;

use crate::{Charset, DecodeResult};

/// Bytes currently readable from an [`Upstream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub data: &'a [u8],
    /// Whether bytes beyond `data` may still arrive.
    pub more: bool,
}

/// Pull-style byte source a transform reads from.
///
/// `peek` never blocks: an empty chunk with `more == true` means "nothing
/// yet, ask again later".
pub trait Upstream {
    /// Bytes available at the current position.
    ///
    /// # Errors
    ///
    /// Fails when the source itself failed (dropped store, upstream decode
    /// failure).
    fn peek(&mut self) -> DecodeResult<Chunk<'_>>;

    /// Mark `n` bytes of the last peeked chunk as consumed.
    fn advance(&mut self, n: usize);
}

/// Charsets reported by a character decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharsetReport {
    /// Charset the bytes were decoded with.
    pub used: Charset,
    /// Charset the content looks like after seeing all of it.
    pub guessed: Charset,
}

/// A single stateful decode stage.
pub trait ByteTransform: Send + Debug {
    /// Short name used in logs (`gzip`, `base64`, `charset`, ...).
    fn name(&self) -> &'static str;

    /// Decode into `out` and return the number of bytes written.
    ///
    /// `more` is set to `false` once the transform has delivered everything
    /// it ever will.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`](crate::DecodeError) when the input is
    /// corrupt or the upstream failed. Bytes written before the failure are
    /// returned first; the error follows on the next call.
    fn read_into(
        &mut self,
        out: &mut [u8],
        upstream: &mut dyn Upstream,
        more: &mut bool,
    ) -> DecodeResult<usize>;

    /// Used and guessed charsets, for character decoders.
    fn charsets(&self) -> Option<CharsetReport> {
        None
    }
}
