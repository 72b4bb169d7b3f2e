#![forbid(unsafe_code)]

//! `weft-stream`
//!
//! [`StreamCursor`] is one consumer's view of a byte store: it owns a
//! growable [`ReadBuffer`], runs the resource's transform chain, supports
//! seeking within what the store can serve, and gates "data ready"
//! notifications through a [`NotifyGate`] so consumers are neither flooded
//! nor starved.

mod buffer;
mod cursor;
mod error;
mod gate;
mod options;
mod policy;

pub use buffer::{GrowPolicy, ReadBuffer};
pub use cursor::{Retrieved, StreamCursor};
pub use error::{CursorError, CursorResult, SeekError};
pub use gate::{CursorLink, NotifyGate};
pub use options::{CursorOptions, Restart};
pub use policy::{is_container_type, is_text_like};
