#![forbid(unsafe_code)]

use thiserror::Error;
use weft_core::ErrorKind;

/// Result type used by `weft-decode`.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors produced by byte transforms.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The transform rejected its input.
    ///
    /// `hideable` is set when output was already delivered: the consumer has
    /// something to show, so the failure can be swallowed.
    #[error("{encoding}: corrupt input: {reason}")]
    Corrupt {
        encoding: &'static str,
        reason: String,
        hideable: bool,
    },

    #[error("unsupported encoding `{0}`")]
    Unsupported(String),

    #[error("out of memory: could not reserve {requested} bytes")]
    OutOfMemory { requested: usize },

    /// The byte source feeding the transform failed.
    #[error("upstream failed: {kind}")]
    Upstream { kind: ErrorKind },
}

impl DecodeError {
    pub(crate) fn corrupt(encoding: &'static str, reason: impl ToString) -> Self {
        Self::Corrupt {
            encoding,
            reason: reason.to_string(),
            hideable: false,
        }
    }

    /// Taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Corrupt { .. } | Self::Unsupported(_) => ErrorKind::DecodeFailure,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::Upstream { kind } => *kind,
        }
    }

    /// Whether the failure may be swallowed because output was delivered.
    #[must_use]
    pub fn is_hideable(&self) -> bool {
        matches!(self, Self::Corrupt { hideable: true, .. })
    }

    /// Set the hideable marker of a `Corrupt` error.
    #[must_use]
    pub fn with_hideable(self, value: bool) -> Self {
        match self {
            Self::Corrupt {
                encoding, reason, ..
            } => Self::Corrupt {
                encoding,
                reason,
                hideable: value,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_corrupt_errors_become_hideable() {
        let e = DecodeError::corrupt("gzip", "bad trailer").with_hideable(true);
        assert!(e.is_hideable());
        assert_eq!(e.kind(), ErrorKind::DecodeFailure);
        assert_eq!(e.to_string(), "gzip: corrupt input: bad trailer");

        let e = DecodeError::Unsupported("br".into()).with_hideable(true);
        assert!(!e.is_hideable());
    }

    #[test]
    fn upstream_kind_is_forwarded() {
        let e = DecodeError::Upstream {
            kind: ErrorKind::OutOfRange,
        };
        assert_eq!(e.kind(), ErrorKind::OutOfRange);
    }
}
