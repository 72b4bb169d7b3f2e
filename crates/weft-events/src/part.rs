#![forbid(unsafe_code)]

/// Diagnostics published by a multipart decode store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartEvent {
    /// A body part's headers were parsed and a child resource allocated.
    Discovered {
        index: usize,
        content_type: String,
        attachment: bool,
    },
    /// A child resource received its last byte.
    Finished { index: usize, bytes: u64 },
    /// Parsing failed; open children were finished early.
    Failed { error: String },
}
