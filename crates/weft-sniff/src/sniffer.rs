#![forbid(unsafe_code)]

use tracing::trace;
use weft_core::media_type;

use crate::{
    PatternFilter, SimpleClass,
    signature::{has_binary_octets, is_mp4, utf_bom},
    table::lookup,
};

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";

/// Coarse classification of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    Html,
    Xml,
    Text,
    Image,
    Video,
    Audio,
    Pdf,
    PostScript,
    Archive,
    Binary,
    /// Nothing conclusive and no definite answer was required.
    Unknown,
}

impl ContentType {
    /// Classify a MIME type string.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        let mime = media_type(mime);
        match mime.as_str() {
            "" => Self::Unknown,
            "text/html" | "application/xhtml+xml" => Self::Html,
            "text/xml" | "application/xml" => Self::Xml,
            "application/pdf" => Self::Pdf,
            "application/postscript" => Self::PostScript,
            "application/ogg" => Self::Video,
            "application/zip"
            | "application/x-gzip"
            | "application/gzip"
            | "application/x-rar-compressed"
            | "application/x-tar" => Self::Archive,
            m if m.ends_with("+xml") => Self::Xml,
            m if m.starts_with("text/") => Self::Text,
            m if m.starts_with("image/") => Self::Image,
            m if m.starts_with("video/") => Self::Video,
            m if m.starts_with("audio/") => Self::Audio,
            _ => Self::Binary,
        }
    }
}

/// Outcome of one classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SniffResult {
    pub content_type: ContentType,
    pub mime: String,
    /// The answer cannot change when more bytes arrive.
    pub deterministic: bool,
    /// Nothing matched and binary was assumed.
    pub untrusted: bool,
}

impl SniffResult {
    fn new(mime: &str, deterministic: bool) -> Self {
        Self {
            content_type: ContentType::from_mime(mime),
            mime: mime.to_string(),
            deterministic,
            untrusted: false,
        }
    }
}

/// Whether sniffing may prefer this type over an extension-derived one.
#[must_use]
pub fn is_displayable(mime: &str) -> bool {
    let mime = media_type(mime);
    mime == "text/html" || mime.starts_with("image/") || mime.starts_with("video/")
}

fn is_unknown(declared: &str) -> bool {
    matches!(
        declared,
        "" | "unknown/unknown" | "application/unknown" | "*/*"
    )
}

fn is_xml(declared: &str) -> bool {
    declared.ends_with("+xml") || declared == "text/xml" || declared == "application/xml"
}

/// Content type sniffer.
#[derive(Clone, Debug)]
pub struct ContentSniffer {
    scan_len: usize,
    extension: Option<String>,
    extension_sniffing: bool,
    require_definite: bool,
}

impl Default for ContentSniffer {
    fn default() -> Self {
        Self {
            scan_len: 512,
            extension: None,
            extension_sniffing: true,
            require_definite: true,
        }
    }
}

impl ContentSniffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leading bytes inspected by the binary scan.
    #[must_use]
    pub fn with_scan_len(mut self, scan_len: usize) -> Self {
        self.scan_len = scan_len;
        self
    }

    /// File extension of the resource name (without the dot).
    #[must_use]
    pub fn with_extension(mut self, extension: Option<String>) -> Self {
        self.extension = extension;
        self
    }

    /// Allow the extension to override a non-displayable sniffed type.
    #[must_use]
    pub fn with_extension_sniffing(mut self, enabled: bool) -> Self {
        self.extension_sniffing = enabled;
        self
    }

    /// Fall back to untrusted `application/octet-stream` when undetermined.
    #[must_use]
    pub fn with_require_definite(mut self, required: bool) -> Self {
        self.require_definite = required;
        self
    }

    /// Classify `input` given the declared type.
    #[must_use]
    pub fn classify(&self, input: &[u8], declared: &str, multimedia: bool) -> SniffResult {
        let declared = media_type(declared);
        let result = if multimedia {
            self.multimedia(input)
        } else if declared == TEXT_PLAIN {
            Some(self.plain_text(input))
        } else if is_unknown(&declared) {
            self.unknown(input)
        } else if is_xml(&declared) {
            Some(SniffResult::new(&declared, true))
        } else if declared.starts_with("image/") {
            Some(self.image(input, &declared))
        } else {
            Some(SniffResult::new(&declared, true))
        };

        let result = match result {
            Some(result) => result,
            None if self.require_definite => SniffResult {
                content_type: ContentType::Binary,
                mime: OCTET_STREAM.to_string(),
                deterministic: false,
                untrusted: true,
            },
            None => SniffResult {
                content_type: ContentType::from_mime(&declared),
                mime: declared.clone(),
                deterministic: false,
                untrusted: false,
            },
        };
        trace!(
            declared = %declared,
            mime = %result.mime,
            deterministic = result.deterministic,
            untrusted = result.untrusted,
            "classified"
        );
        result
    }

    /// Heuristic answers are final once the whole scan window was seen.
    fn scanned_enough(&self, input: &[u8]) -> bool {
        input.len() >= self.scan_len
    }

    fn multimedia(&self, input: &[u8]) -> Option<SniffResult> {
        if let Some(p) = lookup(input, PatternFilter::class(SimpleClass::Video)) {
            return Some(SniffResult::new(p.mime, true));
        }
        is_mp4(input).then(|| SniffResult::new("video/mp4", true))
    }

    fn plain_text(&self, input: &[u8]) -> SniffResult {
        if utf_bom(input).is_some() {
            return SniffResult::new(TEXT_PLAIN, true);
        }
        if !has_binary_octets(input, self.scan_len) {
            return SniffResult::new(TEXT_PLAIN, self.scanned_enough(input));
        }
        match lookup(input, PatternFilter::SAFE) {
            Some(p) => SniffResult::new(p.mime, true),
            None => SniffResult::new(OCTET_STREAM, true),
        }
    }

    fn unknown(&self, input: &[u8]) -> Option<SniffResult> {
        if input.is_empty() {
            return None;
        }
        if let Some(p) = lookup(input, PatternFilter::ALL) {
            if !is_displayable(p.mime)
                && let Some(ext) = self.extension_mime()
            {
                return Some(SniffResult::new(ext, true));
            }
            return Some(SniffResult::new(p.mime, true));
        }
        if is_mp4(input) {
            return Some(SniffResult::new("video/mp4", true));
        }
        if has_binary_octets(input, self.scan_len) {
            Some(SniffResult::new(OCTET_STREAM, true))
        } else {
            Some(SniffResult::new(TEXT_PLAIN, self.scanned_enough(input)))
        }
    }

    fn image(&self, input: &[u8], declared: &str) -> SniffResult {
        if declared == "image/svg+xml" {
            return SniffResult::new(declared, true);
        }
        match lookup(input, PatternFilter::class(SimpleClass::Image).safe()) {
            Some(p) => SniffResult::new(p.mime, true),
            None => SniffResult::new(declared, false),
        }
    }

    fn extension_mime(&self) -> Option<&'static str> {
        if !self.extension_sniffing {
            return None;
        }
        let ext = self.extension.as_deref()?;
        mime_guess::from_ext(ext).first_raw()
    }
}

/// Classify with default settings: a 512 byte scan, no extension hint and a
/// definite answer required.
#[must_use]
pub fn classify(input: &[u8], declared: &str, multimedia: bool) -> SniffResult {
    ContentSniffer::default().classify(input, declared, multimedia)
}
