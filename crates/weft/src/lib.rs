#![forbid(unsafe_code)]

//! # Weft
//!
//! Facade crate over the streaming cache/decode pipeline.
//!
//! ## Quick start
//!
//! ```ignore
//! use weft::prelude::*;
//!
//! let resource = Resource::new(
//!     ResourceAttrs::new("text/html").with_transfer_encoding("gzip"),
//! );
//! resource.write(&encoded)?;
//! resource.finish();
//!
//! let mut cursor = resource.cursor(Arc::new(NullNotifier))?;
//! cursor.retrieve()?;
//! let html = cursor.buffered();
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod types {
    pub use weft_core::*;
}

pub mod events {
    pub use weft_events::*;
}

pub mod storage {
    pub use weft_storage::*;
}

pub mod sniff {
    pub use weft_sniff::*;
}

pub mod decode {
    pub use weft_decode::*;
}

pub mod stream {
    pub use weft_stream::*;
}

pub mod cache {
    pub use weft_cache::*;
}

#[cfg(feature = "multipart")]
pub mod multipart {
    pub use weft_multipart::*;
}

// ── Resource ────────────────────────────────────────────────────────────

mod resource;

pub use resource::{DEFAULT_EVENT_CAPACITY, Resource};

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use weft_cache::{CacheDecorator, CacheError, CacheResult};
    pub use weft_core::{
        Attributes, ErrorKind, FlagAttr, PipelineConfig, ResourceAttrs, StringAttr,
    };
    pub use weft_events::{Event, EventBus, Notice, Notifier, NullNotifier};
    #[cfg(feature = "multipart")]
    pub use weft_multipart::{MultipartDecodeStore, MultipartError, MultipartResult};
    pub use weft_sniff::{ContentSniffer, SniffResult};
    pub use weft_storage::{ByteStore, MemStore, StreamStore};
    pub use weft_stream::{CursorError, CursorOptions, CursorResult, Retrieved, StreamCursor};

    pub use crate::Resource;
}
