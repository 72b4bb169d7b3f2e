#![forbid(unsafe_code)]

//! `weft-storage`
//!
//! Byte containers for resource payloads. A store only holds bytes: it never
//! decodes and never notifies consumers.
//!
//! - [`ByteStore`]: append / random write / best-effort read / coverage / finish
//! - [`MemStore`]: growable in-memory store, optionally bounded
//! - [`StreamStore`]: sliding-window store for stream-typed resources
//! - [`Coverage`] / [`MemCoverage`]: downloaded-range bookkeeping

mod coverage;
mod error;
mod memory;
mod store;
mod stream;

pub use coverage::{Coverage, MemCoverage};
pub use error::{StorageError, StorageResult};
pub use memory::MemStore;
pub use store::{Availability, ByteStore, StoreHandle, StoreKind, StoreStatus};
pub use stream::StreamStore;
