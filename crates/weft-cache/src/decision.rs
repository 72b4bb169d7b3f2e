#![forbid(unsafe_code)]

use tracing::{debug, warn};
use weft_core::{Attributes, FlagAttr, StringAttr};
use weft_decode::{is_identity_encoding, transfer_decoders};

/// Container types whose own decoder un-gzips them. A transport encoding
/// declared on them is left in place.
pub const TAR_ALIASES: &[&str] = &[
    "application/x-tar",
    "application/x-gzip",
    "application/gzip",
    "application/x-tar-gz",
    "application/unix-tar",
    "application/x-gtar",
    "application/x-gunzip",
    "application/x-ustar",
];

/// Whether `media_type` is one of [`TAR_ALIASES`].
#[must_use]
pub fn is_tar_alias(media_type: &str) -> bool {
    TAR_ALIASES.contains(&media_type)
}

/// The decorator's one-shot choice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Bytes go through a temporary store and are decoded into the final one.
    pub needs_full_decode: bool,
    /// Declared non-identity transfer encoding.
    pub encoding: Option<String>,
}

impl Decision {
    /// Decide from the declared attributes.
    ///
    /// Any declared encoding is marked handled, so cursors never decode it
    /// a second time.
    pub(crate) fn from_attributes(attrs: &Attributes) -> Self {
        let encoding = attrs
            .get(StringAttr::TransferEncoding)
            .filter(|e| !is_identity_encoding(e));
        let Some(label) = encoding.as_deref() else {
            return Self {
                needs_full_decode: false,
                encoding: None,
            };
        };
        attrs.set_flag(FlagAttr::EncodingHandled, true);

        let media_type = attrs.media_type();
        let needs_full_decode = if is_tar_alias(&media_type) {
            debug!(encoding = label, media_type = %media_type, "container keeps its transfer encoding");
            false
        } else if let Err(error) = transfer_decoders(label) {
            warn!(encoding = label, %error, "storing undecoded bytes");
            false
        } else {
            true
        };
        Self {
            needs_full_decode,
            encoding,
        }
    }
}
