#![forbid(unsafe_code)]

/// Sizing of a cursor's consumer-visible buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferLimits {
    /// Minimum size of a `Big` buffer and the cap of a `Small` one.
    pub min_size: usize,
    /// Growth step; `Big` buffers are rounded up to a multiple of it.
    pub increment: usize,
    /// Free space that counts as "room left" (one worst-case character).
    pub slack: usize,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            min_size: 4096,
            increment: 4096,
            slack: 8,
        }
    }
}

/// Configuration shared by the decorator, its cursors and multipart stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Cursor buffer sizing.
    pub buffer: BufferLimits,
    /// Number of leading bytes the content sniffer looks at.
    pub sniff_len: usize,
    /// Number of leading bytes scanned for a BOM or in-document charset.
    pub charset_prescan_len: usize,
    /// Charset used for text without a declared or detected one.
    pub default_charset: String,
    /// Cap on the temporary store used while decoding.
    ///
    /// - `Some(n)`: appends beyond `n` bytes fail with `OutOfSpace`
    /// - `None`: bounded only by memory
    pub temp_store_limit: Option<usize>,
    /// Largest accepted header block of a multipart body part.
    pub max_part_header_len: usize,
    /// Whether a file-extension hint may override a non-displayable sniff.
    pub extension_sniffing: bool,
    /// Whether the decorator sniffs the content type once enough bytes arrived.
    pub sniff_on_store: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer: BufferLimits::default(),
            sniff_len: 512,
            charset_prescan_len: 1024,
            default_charset: "windows-1252".to_string(),
            temp_store_limit: None,
            max_part_header_len: 16 * 1024,
            extension_sniffing: true,
            sniff_on_store: true,
        }
    }
}

impl PipelineConfig {
    /// Set cursor buffer sizing.
    #[must_use]
    pub fn with_buffer(mut self, buffer: BufferLimits) -> Self {
        self.buffer = buffer;
        self
    }

    /// Set the number of bytes the sniffer inspects.
    #[must_use]
    pub fn with_sniff_len(mut self, len: usize) -> Self {
        self.sniff_len = len;
        self
    }

    /// Set the charset prescan window.
    #[must_use]
    pub fn with_charset_prescan_len(mut self, len: usize) -> Self {
        self.charset_prescan_len = len;
        self
    }

    /// Set the fallback charset.
    #[must_use]
    pub fn with_default_charset(mut self, charset: impl Into<String>) -> Self {
        self.default_charset = charset.into();
        self
    }

    /// Cap the temporary decode store.
    #[must_use]
    pub fn with_temp_store_limit(mut self, limit: Option<usize>) -> Self {
        self.temp_store_limit = limit;
        self
    }

    /// Set the largest accepted multipart part header block.
    #[must_use]
    pub fn with_max_part_header_len(mut self, len: usize) -> Self {
        self.max_part_header_len = len;
        self
    }

    /// Allow or forbid extension-based type overrides while sniffing.
    #[must_use]
    pub fn with_extension_sniffing(mut self, enabled: bool) -> Self {
        self.extension_sniffing = enabled;
        self
    }

    /// Enable or disable sniffing from `CacheDecorator::store`.
    #[must_use]
    pub fn with_sniff_on_store(mut self, enabled: bool) -> Self {
        self.sniff_on_store = enabled;
        self
    }
}
