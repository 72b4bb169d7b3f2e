#![forbid(unsafe_code)]

use thiserror::Error;
use weft_core::ErrorKind;
use weft_decode::DecodeError;
use weft_storage::StorageError;
use weft_stream::CursorError;

/// Result type used by `weft-cache`.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors returned by [`CacheDecorator`](crate::CacheDecorator).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Appending to the final or temporary store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Decoded output could not be written to the final store.
    #[error("writing decoded bytes failed: {0}")]
    StoreWrite(StorageError),

    /// The transform rejected the stored bytes; decoding was abandoned.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

impl CacheError {
    /// Taxonomy kind; `None` for caller bugs.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Storage(e) => Some(e.kind()),
            Self::StoreWrite(_) => Some(ErrorKind::StoreWriteFailure),
            Self::Decode(e) => Some(e.kind()),
            Self::Cursor(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::space(CacheError::Storage(StorageError::OutOfSpace { limit: 8 }), Some(ErrorKind::OutOfSpace))]
    #[case::write(CacheError::StoreWrite(StorageError::Finished), Some(ErrorKind::StoreWriteFailure))]
    #[case::decode(CacheError::Decode(DecodeError::Unsupported("br".into())), Some(ErrorKind::DecodeFailure))]
    #[case::defect(CacheError::Cursor(CursorError::AlreadyInitialized), None)]
    fn test_error_kind(#[case] error: CacheError, #[case] kind: Option<ErrorKind>) {
        assert_eq!(error.kind(), kind);
    }
}
