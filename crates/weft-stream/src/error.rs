#![forbid(unsafe_code)]

use thiserror::Error;
use weft_core::ErrorKind;

/// Result type used by `weft-stream`.
pub type CursorResult<T> = Result<T, CursorError>;

/// Reasons a seek was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SeekError {
    /// The store cannot serve `pos` yet; retry later.
    #[error("offset {pos} is not available yet")]
    OutOfRange { pos: u64 },

    /// The cursor cannot reposition to `pos` at all.
    #[error("cannot reposition to offset {pos}")]
    NotSeekable { pos: u64 },
}

impl SeekError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::NotSeekable { .. } => ErrorKind::NotSeekable,
        }
    }
}

/// Errors returned by cursor operations.
///
/// Decode failures are not in here: they end the cursor's output and reach
/// the consumer as `Notice::LoadFailed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// `init` was called twice. This is a caller bug.
    #[error("cursor already initialized")]
    AlreadyInitialized,

    #[error("cursor used before init")]
    NotInitialized,

    #[error("out of memory: could not grow buffer to {requested} bytes")]
    OutOfMemory { requested: usize },

    /// A stream store dropped `pos` from its window before it was read.
    #[error("offset {pos} was evicted from the stream window")]
    Evicted { pos: u64 },

    #[error(transparent)]
    Seek(#[from] SeekError),
}

impl CursorError {
    /// Taxonomy kind; `None` for caller bugs.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::AlreadyInitialized | Self::NotInitialized => None,
            Self::OutOfMemory { .. } => Some(ErrorKind::OutOfMemory),
            Self::Evicted { .. } => Some(ErrorKind::OutOfRange),
            Self::Seek(e) => Some(e.kind()),
        }
    }
}
