#![forbid(unsafe_code)]

//! Ordered transform stages.
//!
//! Stage 0 reads the raw upstream; every later stage reads the output of the
//! stage before it through a [`StageSource`]. Each intermediate stage owns a
//! small output buffer. The order is fixed once the chain is built.

use std::collections::VecDeque;

use tracing::debug;

use crate::{ByteTransform, CharsetReport, Chunk, DecodeResult, Upstream};

const STAGE_BUFFER: usize = 4096;

#[derive(Debug)]
struct Stage {
    transform: Box<dyn ByteTransform>,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    more: bool,
}

impl Stage {
    fn new(transform: Box<dyn ByteTransform>) -> Self {
        Self {
            transform,
            buf: vec![0; STAGE_BUFFER],
            start: 0,
            end: 0,
            more: true,
        }
    }
}

/// Upstream view of "everything before this stage".
struct StageSource<'s, 'u> {
    prior: &'s mut [Stage],
    upstream: &'s mut (dyn Upstream + 'u),
}

impl Upstream for StageSource<'_, '_> {
    fn peek(&mut self) -> DecodeResult<Chunk<'_>> {
        let Some((stage, rest)) = self.prior.split_last_mut() else {
            return self.upstream.peek();
        };
        if stage.start == stage.end && stage.more {
            let mut source = StageSource {
                prior: rest,
                upstream: &mut *self.upstream,
            };
            let mut more = true;
            let n = stage
                .transform
                .read_into(&mut stage.buf, &mut source, &mut more)?;
            stage.start = 0;
            stage.end = n;
            stage.more = more;
        }
        Ok(Chunk {
            data: &stage.buf[stage.start..stage.end],
            more: stage.more,
        })
    }

    fn advance(&mut self, n: usize) {
        match self.prior.last_mut() {
            Some(stage) => stage.start = (stage.start + n).min(stage.end),
            None => self.upstream.advance(n),
        }
    }
}

/// Transforms run in a fixed order, charset decoding last.
#[derive(Debug, Default)]
pub struct TransformChain {
    stages: Vec<Stage>,
}

impl TransformChain {
    #[must_use]
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.transform.name()).collect()
    }

    /// Charsets reported by the last stage.
    #[must_use]
    pub fn charsets(&self) -> Option<CharsetReport> {
        self.stages.last().and_then(|s| s.transform.charsets())
    }

    /// Pull decoded bytes through every stage.
    ///
    /// An empty chain copies upstream bytes unchanged.
    ///
    /// # Errors
    ///
    /// The first error raised by any stage.
    pub fn read_into(
        &mut self,
        out: &mut [u8],
        upstream: &mut dyn Upstream,
        more: &mut bool,
    ) -> DecodeResult<usize> {
        let Some((last, prior)) = self.stages.split_last_mut() else {
            let chunk = upstream.peek()?;
            let n = chunk.data.len().min(out.len());
            out[..n].copy_from_slice(&chunk.data[..n]);
            *more = chunk.more || n < chunk.data.len();
            upstream.advance(n);
            return Ok(n);
        };
        let mut source = StageSource { prior, upstream };
        last.transform.read_into(out, &mut source, more)
    }
}

/// Builds a [`TransformChain`].
///
/// Transfer/content decoders are prepended; the charset decoder, if any, is
/// placed last regardless of call order.
#[derive(Debug, Default)]
pub struct ChainBuilder {
    decoders: VecDeque<Box<dyn ByteTransform>>,
    charset: Option<Box<dyn ByteTransform>>,
}

impl ChainBuilder {
    /// Put `transform` ahead of every stage added so far.
    #[must_use]
    pub fn prepend(mut self, transform: Box<dyn ByteTransform>) -> Self {
        self.decoders.push_front(transform);
        self
    }

    /// Put `transforms` (already in execution order) ahead of every stage
    /// added so far.
    #[must_use]
    pub fn prepend_all(mut self, transforms: Vec<Box<dyn ByteTransform>>) -> Self {
        for t in transforms.into_iter().rev() {
            self.decoders.push_front(t);
        }
        self
    }

    /// Set the character decoder.
    #[must_use]
    pub fn charset(mut self, transform: Box<dyn ByteTransform>) -> Self {
        self.charset = Some(transform);
        self
    }

    #[must_use]
    pub fn build(self) -> TransformChain {
        let stages: Vec<Stage> = self
            .decoders
            .into_iter()
            .chain(self.charset)
            .map(Stage::new)
            .collect();
        let chain = TransformChain { stages };
        if !chain.is_empty() {
            debug!(stages = ?chain.names(), "transform chain built");
        }
        chain
    }
}
