#![forbid(unsafe_code)]

//! Shared test utilities for the weft workspace.

pub mod fixtures;
pub mod multipart;
pub mod notifier;
pub mod payload;

pub use fixtures::*;
pub use multipart::MultipartBuilder;
pub use notifier::RecordingNotifier;
pub use payload::{deflate_bytes, gzip_bytes, raw_deflate_bytes};
