#![forbid(unsafe_code)]

use crate::{CacheEvent, Notice, PartEvent};

/// Unified event for the whole pipeline.
///
/// Hierarchical: each stage has its own variant with a sub-enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Consumer notification routed through the bus.
    Notice(Notice),
    /// Cache decorator diagnostics.
    Cache(CacheEvent),
    /// Multipart decode diagnostics.
    Part(PartEvent),
}

impl From<Notice> for Event {
    fn from(n: Notice) -> Self {
        Self::Notice(n)
    }
}

impl From<CacheEvent> for Event {
    fn from(e: CacheEvent) -> Self {
        Self::Cache(e)
    }
}

impl From<PartEvent> for Event {
    fn from(e: PartEvent) -> Self {
        Self::Part(e)
    }
}
