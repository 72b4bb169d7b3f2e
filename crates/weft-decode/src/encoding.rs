#![forbid(unsafe_code)]

//! Encoding labels to transforms.

use crate::{Base64, ByteTransform, DecodeError, DecodeResult, Decoder, Inflate, QuotedPrintable};

/// Labels that need no decoding.
#[must_use]
pub fn is_identity_encoding(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "" | "identity" | "7bit" | "8bit" | "binary"
    )
}

/// Decoder for a single encoding label, or `None` for identity labels.
///
/// # Errors
///
/// `Unsupported` for labels this crate cannot decode.
pub fn decoder_for(label: &str) -> DecodeResult<Option<Box<dyn ByteTransform>>> {
    if is_identity_encoding(label) {
        return Ok(None);
    }
    let decoder = match label.trim().to_ascii_lowercase().as_str() {
        "gzip" | "x-gzip" => Decoder::new(Inflate::gzip()).boxed(),
        "deflate" => Decoder::new(Inflate::deflate()).boxed(),
        "base64" => Decoder::new(Base64::new()).boxed(),
        "quoted-printable" => Decoder::new(QuotedPrintable::new()).boxed(),
        other => return Err(DecodeError::Unsupported(other.to_string())),
    };
    Ok(Some(decoder))
}

/// Decoders for a comma separated encoding list, in execution order.
///
/// Encodings are listed in the order they were applied, so they are undone
/// last to first.
///
/// # Errors
///
/// `Unsupported` if any label is unknown.
pub fn transfer_decoders(list: &str) -> DecodeResult<Vec<Box<dyn ByteTransform>>> {
    let mut decoders = Vec::new();
    for label in list.split(',').rev() {
        if let Some(d) = decoder_for(label)? {
            decoders.push(d);
        }
    }
    Ok(decoders)
}
