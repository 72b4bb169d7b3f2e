#![forbid(unsafe_code)]

//! Resource attributes.
//!
//! The protocol layer declares what it knows about a resource (content type,
//! transfer encoding, charset, length, flags) and the pipeline stages read and
//! occasionally rewrite those values. Access goes through [`Attributes`], a
//! cheap clonable handle, using typed keys rather than free-form strings.

use std::sync::Arc;

use parking_lot::RwLock;

/// String-valued attribute keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StringAttr {
    /// Declared (or sniffed) MIME type, parameters allowed.
    ContentType,
    /// Declared content/transfer encoding (`gzip`, `deflate`, `base64`, ...).
    TransferEncoding,
    /// Charset declared by the protocol layer.
    Charset,
    /// Charset forced after redetection; wins over the declared one.
    ForcedCharset,
    /// File extension of the resource name, without the dot.
    FileExtension,
    /// Filename suggested by `Content-Disposition`.
    SuggestedFilename,
    /// `Content-Location` of a multipart body part.
    ContentLocation,
    /// `Content-ID` of a multipart body part.
    ContentId,
}

/// Boolean attribute keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlagAttr {
    /// Resource is audio/video and sniffed with the multimedia rules.
    Multimedia,
    /// `Cache-Control: no-store`; buffers holding it are wiped on release.
    NoStore,
    /// A decorator owns the transfer encoding (decoded it or chose not to).
    EncodingHandled,
    /// Content type could not be determined; treat as untrusted binary.
    Untrusted,
    /// Multipart body part marked `Content-Disposition: attachment`.
    Attachment,
}

/// Plain attribute values of one resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceAttrs {
    pub content_type: String,
    pub transfer_encoding: Option<String>,
    pub charset: Option<String>,
    pub forced_charset: Option<String>,
    pub content_length: Option<u64>,
    pub file_extension: Option<String>,
    pub suggested_filename: Option<String>,
    pub content_location: Option<String>,
    pub content_id: Option<String>,
    pub multimedia: bool,
    pub no_store: bool,
    pub encoding_handled: bool,
    pub untrusted: bool,
    pub attachment: bool,
}

impl ResourceAttrs {
    /// Create attributes with the declared content type.
    #[must_use]
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    /// Set the declared transfer encoding.
    #[must_use]
    pub fn with_transfer_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.transfer_encoding = Some(encoding.into());
        self
    }

    /// Set the declared charset.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Set the declared content length.
    #[must_use]
    pub fn with_content_length(mut self, len: u64) -> Self {
        self.content_length = Some(len);
        self
    }

    /// Set the file extension hint used by extension-based sniffing.
    #[must_use]
    pub fn with_file_extension(mut self, ext: impl Into<String>) -> Self {
        self.file_extension = Some(ext.into());
        self
    }

    /// Mark the resource as multimedia.
    #[must_use]
    pub fn with_multimedia(mut self, multimedia: bool) -> Self {
        self.multimedia = multimedia;
        self
    }

    /// Mark the resource as `no-store`.
    #[must_use]
    pub fn with_no_store(mut self, no_store: bool) -> Self {
        self.no_store = no_store;
        self
    }

    fn string(&self, key: StringAttr) -> Option<&String> {
        match key {
            StringAttr::ContentType => Some(&self.content_type),
            StringAttr::TransferEncoding => self.transfer_encoding.as_ref(),
            StringAttr::Charset => self.charset.as_ref(),
            StringAttr::ForcedCharset => self.forced_charset.as_ref(),
            StringAttr::FileExtension => self.file_extension.as_ref(),
            StringAttr::SuggestedFilename => self.suggested_filename.as_ref(),
            StringAttr::ContentLocation => self.content_location.as_ref(),
            StringAttr::ContentId => self.content_id.as_ref(),
        }
    }

    fn string_mut(&mut self, key: StringAttr, value: Option<String>) {
        match key {
            StringAttr::ContentType => self.content_type = value.unwrap_or_default(),
            StringAttr::TransferEncoding => self.transfer_encoding = value,
            StringAttr::Charset => self.charset = value,
            StringAttr::ForcedCharset => self.forced_charset = value,
            StringAttr::FileExtension => self.file_extension = value,
            StringAttr::SuggestedFilename => self.suggested_filename = value,
            StringAttr::ContentLocation => self.content_location = value,
            StringAttr::ContentId => self.content_id = value,
        }
    }

    fn flag(&self, key: FlagAttr) -> bool {
        match key {
            FlagAttr::Multimedia => self.multimedia,
            FlagAttr::NoStore => self.no_store,
            FlagAttr::EncodingHandled => self.encoding_handled,
            FlagAttr::Untrusted => self.untrusted,
            FlagAttr::Attachment => self.attachment,
        }
    }

    fn flag_mut(&mut self, key: FlagAttr) -> &mut bool {
        match key {
            FlagAttr::Multimedia => &mut self.multimedia,
            FlagAttr::NoStore => &mut self.no_store,
            FlagAttr::EncodingHandled => &mut self.encoding_handled,
            FlagAttr::Untrusted => &mut self.untrusted,
            FlagAttr::Attachment => &mut self.attachment,
        }
    }
}

/// Shared handle to a resource's attributes.
///
/// The decorator, every cursor and the multipart store of one resource hold
/// clones of the same handle.
#[derive(Clone, Debug, Default)]
pub struct Attributes {
    inner: Arc<RwLock<ResourceAttrs>>,
}

impl From<ResourceAttrs> for Attributes {
    fn from(attrs: ResourceAttrs) -> Self {
        Self::new(attrs)
    }
}

impl Attributes {
    /// Wrap attribute values into a shared handle.
    #[must_use]
    pub fn new(attrs: ResourceAttrs) -> Self {
        Self {
            inner: Arc::new(RwLock::new(attrs)),
        }
    }

    /// Get a string attribute. Empty strings read as `None`.
    #[must_use]
    pub fn get(&self, key: StringAttr) -> Option<String> {
        let attrs = self.inner.read();
        attrs.string(key).filter(|v| !v.is_empty()).cloned()
    }

    /// Set or clear a string attribute.
    pub fn set(&self, key: StringAttr, value: Option<String>) {
        self.inner.write().string_mut(key, value);
    }

    /// Read a flag attribute.
    #[must_use]
    pub fn flag(&self, key: FlagAttr) -> bool {
        self.inner.read().flag(key)
    }

    /// Set a flag attribute.
    pub fn set_flag(&self, key: FlagAttr, value: bool) {
        *self.inner.write().flag_mut(key) = value;
    }

    /// Declared content length, if known.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.inner.read().content_length
    }

    /// Set or clear the declared content length.
    pub fn set_content_length(&self, len: Option<u64>) {
        self.inner.write().content_length = len;
    }

    /// Media type of the content type attribute: lowercase, no parameters.
    #[must_use]
    pub fn media_type(&self) -> String {
        media_type(&self.inner.read().content_type)
    }

    /// Named parameter of the content type attribute.
    #[must_use]
    pub fn content_type_param(&self, name: &str) -> Option<String> {
        content_type_param(&self.inner.read().content_type, name)
    }

    /// Charset in effect: forced, then declared, then the content type's
    /// `charset` parameter.
    #[must_use]
    pub fn effective_charset(&self) -> Option<String> {
        self.get(StringAttr::ForcedCharset)
            .or_else(|| self.get(StringAttr::Charset))
            .or_else(|| self.content_type_param("charset"))
    }

    /// Copy of the current values.
    #[must_use]
    pub fn snapshot(&self) -> ResourceAttrs {
        self.inner.read().clone()
    }
}

/// Lowercase media type without parameters.
#[must_use]
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Named parameter of a `Content-Type`-like header value. Quoted values are
/// unquoted; empty values read as `None`.
#[must_use]
pub fn content_type_param(content_type: &str, name: &str) -> Option<String> {
    split_params(content_type).into_iter().skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case(name) {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .map_or_else(|| value.to_string(), |v| v.replace("\\\"", "\""));
        (!value.is_empty()).then_some(value)
    })
}

/// Split a header value on `;`, keeping quoted strings intact.
fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn string_attributes_round_trip_through_handle() {
        let attrs = Attributes::new(ResourceAttrs::new("text/html"));
        let reader = attrs.clone();

        attrs.set(StringAttr::TransferEncoding, Some("gzip".into()));
        assert_eq!(reader.get(StringAttr::TransferEncoding).as_deref(), Some("gzip"));

        attrs.set(StringAttr::TransferEncoding, None);
        assert_eq!(reader.get(StringAttr::TransferEncoding), None);
    }

    #[test]
    fn empty_content_type_reads_as_none() {
        let attrs = Attributes::default();
        assert_eq!(attrs.get(StringAttr::ContentType), None);
        assert_eq!(attrs.media_type(), "");
    }

    #[test]
    fn flags_default_to_false_and_toggle() {
        let attrs = Attributes::default();
        assert!(!attrs.flag(FlagAttr::NoStore));
        attrs.set_flag(FlagAttr::NoStore, true);
        assert!(attrs.flag(FlagAttr::NoStore));
    }

    #[test]
    fn content_length_can_be_cleared() {
        let attrs = Attributes::new(ResourceAttrs::new("text/plain").with_content_length(42));
        assert_eq!(attrs.content_length(), Some(42));
        attrs.set_content_length(None);
        assert_eq!(attrs.content_length(), None);
    }

    #[rstest]
    #[case("text/html", "text/html")]
    #[case("Text/HTML; charset=utf-8", "text/html")]
    #[case("  application/xhtml+xml  ", "application/xhtml+xml")]
    #[case("", "")]
    fn media_type_strips_parameters(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(media_type(input), expected);
    }

    #[rstest]
    #[case("multipart/mixed; boundary=abc", "boundary", Some("abc"))]
    #[case("multipart/mixed; BOUNDARY=\"a b;c\"", "boundary", Some("a b;c"))]
    #[case("text/html; charset=\"UTF-8\"", "charset", Some("UTF-8"))]
    #[case("text/html", "charset", None)]
    #[case("text/html; charset=", "charset", None)]
    fn content_type_param_extraction(
        #[case] input: &str,
        #[case] name: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(content_type_param(input, name).as_deref(), expected);
    }

    #[test]
    fn forced_charset_wins_over_declared() {
        let attrs = Attributes::new(
            ResourceAttrs::new("text/html; charset=iso-8859-1").with_charset("windows-1252"),
        );
        assert_eq!(attrs.effective_charset().as_deref(), Some("windows-1252"));

        attrs.set(StringAttr::ForcedCharset, Some("utf-8".into()));
        assert_eq!(attrs.effective_charset().as_deref(), Some("utf-8"));
    }
}
