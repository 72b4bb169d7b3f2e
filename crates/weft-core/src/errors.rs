#![forbid(unsafe_code)]

use std::fmt;

/// Error taxonomy shared by every pipeline stage.
///
/// Crate-level errors keep their own detail and map onto one of these kinds;
/// the kind is what reaches a consumer through `Notice::LoadFailed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Allocation failed; the caller may retry with a smaller store.
    OutOfMemory,
    /// A bounded store refused more bytes.
    OutOfSpace,
    /// Seek target is beyond what the store can serve yet.
    OutOfRange,
    /// A transform rejected its input.
    DecodeFailure,
    /// Writing decoded output into the final store failed.
    StoreWriteFailure,
    /// The store cannot reposition to the requested offset at all.
    NotSeekable,
    /// Write attempted on a finished store.
    Finished,
}

impl ErrorKind {
    /// Whether a caller can reasonably retry the operation later.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::OutOfMemory | Self::OutOfSpace | Self::OutOfRange)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OutOfMemory => "out of memory",
            Self::OutOfSpace => "out of space",
            Self::OutOfRange => "out of range",
            Self::DecodeFailure => "decode failure",
            Self::StoreWriteFailure => "store write failure",
            Self::NotSeekable => "not seekable",
            Self::Finished => "store finished",
        };
        f.write_str(name)
    }
}
