#![forbid(unsafe_code)]

//! `weft-sniff`
//!
//! Content type sniffing over the first bytes of a resource.
//!
//! - [`classify`]: stateless entry point with default settings
//! - [`ContentSniffer`]: scan length, extension hint and strictness knobs
//! - [`PATTERNS`]: the signature table, tried in declared order

mod signature;
mod sniffer;
mod table;

pub use signature::{has_binary_octets, is_binary_octet, is_mp4, utf_bom};
pub use sniffer::{ContentSniffer, ContentType, SniffResult, classify, is_displayable};
pub use table::{PATTERNS, Pattern, PatternFilter, SimpleClass, lookup};
