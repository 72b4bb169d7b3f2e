#![forbid(unsafe_code)]

use weft_core::{Attributes, FlagAttr, ResourceAttrs, StringAttr, content_type_param};

/// Content type assumed for parts without a `Content-Type` header.
pub(crate) const DEFAULT_PART_TYPE: &str = "text/plain";

/// Header fields of one body part, in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartHeaders {
    fields: Vec<(String, String)>,
}

impl PartHeaders {
    /// Parse a header block (without the terminating empty line).
    ///
    /// Lines starting with whitespace continue the previous field. Lines
    /// without a colon are ignored.
    #[must_use]
    pub fn parse(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block);
        let mut fields: Vec<(String, String)> = Vec::new();
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = fields.last_mut() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                fields.push((name.trim().to_string(), value.trim().to_string()));
            }
        }
        Self { fields }
    }

    /// First value of `name`, compared case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the part declared its own content type.
    #[must_use]
    pub fn has_content_type(&self) -> bool {
        self.get("content-type").is_some_and(|v| !v.is_empty())
    }

    /// `Content-Disposition: attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.get("content-disposition").is_some_and(|v| {
            v.split(';')
                .next()
                .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("attachment"))
        })
    }

    /// The `filename` parameter of `Content-Disposition`.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.get("content-disposition")
            .and_then(|v| content_type_param(v, "filename"))
    }

    /// Attributes for the child resource holding this part.
    #[must_use]
    pub fn to_attributes(&self) -> Attributes {
        let content_type = self
            .get("content-type")
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_PART_TYPE);
        let mut attrs = ResourceAttrs::new(content_type);
        if let Some(encoding) = self.get("content-transfer-encoding") {
            attrs = attrs.with_transfer_encoding(encoding.to_ascii_lowercase());
        }
        if let Some(charset) = content_type_param(content_type, "charset") {
            attrs = attrs.with_charset(charset);
        }
        let filename = self.filename();
        if let Some(ext) = filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
        {
            attrs = attrs.with_file_extension(ext);
        }

        let attrs = Attributes::new(attrs);
        attrs.set(StringAttr::SuggestedFilename, filename);
        attrs.set(
            StringAttr::ContentLocation,
            self.get("content-location").map(str::to_string),
        );
        attrs.set(
            StringAttr::ContentId,
            self.get("content-id")
                .map(|id| id.trim_start_matches('<').trim_end_matches('>').to_string()),
        );
        attrs.set_flag(FlagAttr::Attachment, self.is_attachment());
        attrs
    }
}
