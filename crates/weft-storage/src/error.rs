#![forbid(unsafe_code)]

use thiserror::Error;
use weft_core::ErrorKind;

/// Result type used by `weft-storage`.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by byte stores.
///
/// Callers hitting `OutOfMemory`/`OutOfSpace` are expected to fall back to a
/// less capable store or abort the load.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("out of memory: could not reserve {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("out of space: store limited to {limit} bytes")]
    OutOfSpace { limit: usize },

    #[error("store is finished")]
    Finished,

    #[error("invalid range: start {start} >= end {end}")]
    InvalidRange { start: u64, end: u64 },
}

impl StorageError {
    /// Taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::OutOfSpace { .. } => ErrorKind::OutOfSpace,
            Self::Finished => ErrorKind::Finished,
            Self::InvalidRange { .. } => ErrorKind::OutOfRange,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::oom(StorageError::OutOfMemory { requested: 8 }, "out of memory: could not reserve 8 bytes", ErrorKind::OutOfMemory)]
    #[case::space(StorageError::OutOfSpace { limit: 4 }, "out of space: store limited to 4 bytes", ErrorKind::OutOfSpace)]
    #[case::finished(StorageError::Finished, "store is finished", ErrorKind::Finished)]
    #[case::range(StorageError::InvalidRange { start: 9, end: 3 }, "invalid range: start 9 >= end 3", ErrorKind::OutOfRange)]
    fn test_error_display_and_kind(
        #[case] error: StorageError,
        #[case] expected: &str,
        #[case] kind: ErrorKind,
    ) {
        assert_eq!(error.to_string(), expected);
        assert_eq!(error.kind(), kind);
    }
}
