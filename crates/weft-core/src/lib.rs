#![forbid(unsafe_code)]

//! `weft-core`
//!
//! Types shared by every stage of the cache/decode pipeline:
//! - [`Attributes`]: per-resource key/value attributes (declared content type,
//!   transfer encoding, charset, flags) shared between writer and readers
//! - [`ErrorKind`]: the error taxonomy every crate maps its errors onto
//! - [`PipelineConfig`]: buffer sizes, sniffing and decoding knobs

mod attrs;
mod config;
mod errors;

pub use attrs::{Attributes, FlagAttr, ResourceAttrs, StringAttr, content_type_param, media_type};
pub use config::{BufferLimits, PipelineConfig};
pub use errors::ErrorKind;
