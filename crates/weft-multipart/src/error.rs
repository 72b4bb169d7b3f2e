#![forbid(unsafe_code)]

use thiserror::Error;
use weft_cache::CacheError;
use weft_core::ErrorKind;
use weft_stream::CursorError;

/// Result type used by `weft-multipart`.
pub type MultipartResult<T> = Result<T, MultipartError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MultipartError {
    /// A part header block grew past the configured limit.
    #[error("part header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    /// No boundary was declared and none could be found in the body.
    #[error("multipart body without boundary")]
    MissingBoundary,

    #[error(transparent)]
    Cursor(#[from] CursorError),

    /// Storing into a child resource failed.
    #[error("child part {index}: {source}")]
    Child {
        index: usize,
        #[source]
        source: CacheError,
    },
}

impl MultipartError {
    /// Taxonomy kind; `None` for caller bugs.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::HeaderTooLarge { .. } | Self::MissingBoundary => Some(ErrorKind::DecodeFailure),
            Self::Cursor(e) => e.kind(),
            Self::Child { source, .. } => source.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use weft_storage::StorageError;

    use super::*;

    #[rstest]
    #[case::header(MultipartError::HeaderTooLarge { limit: 4 }, Some(ErrorKind::DecodeFailure))]
    #[case::boundary(MultipartError::MissingBoundary, Some(ErrorKind::DecodeFailure))]
    #[case::child(
        MultipartError::Child { index: 2, source: CacheError::Storage(StorageError::OutOfMemory { requested: 9 }) },
        Some(ErrorKind::OutOfMemory)
    )]
    #[case::defect(MultipartError::Cursor(CursorError::NotInitialized), None)]
    fn test_error_kind(#[case] error: MultipartError, #[case] kind: Option<ErrorKind>) {
        assert_eq!(error.kind(), kind);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            MultipartError::HeaderTooLarge { limit: 16 }.to_string(),
            "part header block exceeds 16 bytes"
        );
    }
}
