#![forbid(unsafe_code)]

use std::{fmt::Debug, sync::Arc, time::Duration};

use weft_core::PipelineConfig;
use weft_decode::{BuiltinCharsets, CharsetTable};

/// Protocol-level "stop and reload from `offset`" for stream-typed stores.
pub trait Restart: Send + Sync + Debug {
    /// Restart the transfer at `offset`. Returns `false` if the protocol
    /// cannot do it (no range support, connection gone).
    fn restart_from(&self, offset: u64) -> bool;
}

/// Collaborators and knobs handed to every cursor of a resource.
#[derive(Clone, Debug)]
pub struct CursorOptions {
    pub config: PipelineConfig,
    pub charsets: Arc<dyn CharsetTable>,
    pub restart: Option<Arc<dyn Restart>>,
    /// Delay of the data-ready notice asked for after a cycle that produced
    /// nothing but expects more. `None` asks for an immediate notice.
    pub retry_delay: Option<Duration>,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
            charsets: Arc::new(BuiltinCharsets),
            restart: None,
            retry_delay: None,
        }
    }
}

impl CursorOptions {
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_charsets(mut self, charsets: Arc<dyn CharsetTable>) -> Self {
        self.charsets = charsets;
        self
    }

    #[must_use]
    pub fn with_restart(mut self, restart: Arc<dyn Restart>) -> Self {
        self.restart = Some(restart);
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }
}
