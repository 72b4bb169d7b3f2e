#![forbid(unsafe_code)]

//! `weft-cache`
//!
//! [`CacheDecorator`] sits between the protocol layer and a final byte
//! store. It decides once per resource whether the declared transfer
//! encoding has to be undone before caching; if so, incoming bytes are
//! mirrored into a temporary store and decoded into the final store as they
//! arrive. Consumers read the final store through [`StreamCursor`]s created
//! with [`CacheDecorator::new_cursor`].
//!
//! [`StreamCursor`]: weft_stream::StreamCursor

mod decision;
mod decorator;
mod error;

pub use decision::{Decision, TAR_ALIASES, is_tar_alias};
pub use decorator::CacheDecorator;
pub use error::{CacheError, CacheResult};
