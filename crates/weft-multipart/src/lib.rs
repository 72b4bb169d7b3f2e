#![forbid(unsafe_code)]

//! `weft-multipart`
//!
//! Decodes RFC 2046 multipart bodies while they stream in. A
//! [`MultipartDecodeStore`] reads its upstream store through a
//! [`StreamCursor`](weft_stream::StreamCursor), splits the bytes at the
//! boundary delimiters and stores every body part in its own child resource,
//! each behind a [`CacheDecorator`](weft_cache::CacheDecorator).

mod error;
mod headers;
mod parser;
mod store;

pub use error::{MultipartError, MultipartResult};
pub use headers::PartHeaders;
pub use parser::{MultipartParser, ParseEvent};
pub use store::{ChildPart, MultipartDecodeStore, PartState};
