#![forbid(unsafe_code)]

//! Which content gets a character decoder.

/// Non-multipart containers that carry their own charsets per part.
/// Every `multipart/*` type is a container as well.
const CONTAINER_TYPES: &[&str] = &["message/rfc822", "text/mhtml"];

/// Whether `media_type` (lowercase, no parameters) is decoded as text.
#[must_use]
pub fn is_text_like(media_type: &str) -> bool {
    media_type.starts_with("text/")
        || media_type.starts_with("message/")
        || media_type.starts_with("multipart/")
        || media_type.ends_with("+xml")
        || matches!(
            media_type,
            "application/xml"
                | "application/javascript"
                | "application/x-javascript"
                | "application/ecmascript"
                | "application/json"
        )
}

/// Whether `media_type` is a container that must reach its decoder
/// byte-exact.
#[must_use]
pub fn is_container_type(media_type: &str) -> bool {
    media_type.starts_with("multipart/") || CONTAINER_TYPES.contains(&media_type)
}
