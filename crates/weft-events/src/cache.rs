#![forbid(unsafe_code)]

/// Diagnostics published by a cache decorator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheEvent {
    /// The one-shot decode decision was taken.
    DecisionMade {
        needs_full_decode: bool,
        encoding: Option<String>,
    },
    /// The temporary store was drained into the final store and released.
    TempDisposed { decoded_bytes: u64 },
    /// Decoding was abandoned; the final store keeps what it already had.
    DecodeAbandoned { error: String },
    /// Content type resolved by sniffing.
    ContentTypeSniffed { mime: String, untrusted: bool },
}
