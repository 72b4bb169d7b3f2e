#![forbid(unsafe_code)]

//! `weft-decode`
//!
//! Byte transforms and the chain that runs them.
//!
//! A [`ByteTransform`] pulls bytes from an [`Upstream`] and writes decoded
//! bytes into a caller buffer. [`TransformChain`] links several transforms so
//! that each stage reads from the previous one; a charset decoder, when
//! present, is always the last stage.
//!
//! Decoders shipped here:
//! - [`Inflate`]: `gzip`, `x-gzip`, `deflate` (zlib or raw)
//! - [`Base64`], [`QuotedPrintable`]: MIME transfer encodings
//! - [`CharsetDecoder`]: UTF-8 / UTF-16 / windows-1252 into UTF-8

mod chain;
mod charset;
mod charset_decoder;
mod decoder;
mod encoding;
mod error;
mod inflate;
mod mime_transfer;
mod pending;
mod reader;
mod transform;

pub use chain::{ChainBuilder, TransformChain};
pub use charset::{BuiltinCharsets, Charset, CharsetTable, prescan_charset};
pub use charset_decoder::{CharsetDecoder, CharsetSource};
pub use decoder::{BlockDecode, Decoder};
pub use encoding::{decoder_for, is_identity_encoding, transfer_decoders};
pub use error::{DecodeError, DecodeResult};
pub use inflate::Inflate;
pub use mime_transfer::{Base64, QuotedPrintable};
pub use pending::Pending;
pub use reader::{SliceReader, StoreReader};
pub use transform::{ByteTransform, CharsetReport, Chunk, Upstream};
