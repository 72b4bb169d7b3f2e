//! Multipart body builder.

/// Builds `multipart/*` bodies.
///
/// ```ignore
/// let body = MultipartBuilder::new("XYZ")
///     .part(&[("Content-Type", "text/plain")], b"hello")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct MultipartBuilder {
    boundary: String,
    newline: &'static str,
    preamble: Vec<u8>,
    parts: Vec<(Vec<(String, String)>, Vec<u8>)>,
    epilogue: Vec<u8>,
    closed: bool,
}

impl MultipartBuilder {
    #[must_use]
    pub fn new(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            newline: "\r\n",
            preamble: Vec::new(),
            parts: Vec::new(),
            epilogue: Vec::new(),
            closed: true,
        }
    }

    /// Use bare LF line endings.
    #[must_use]
    pub fn lf(mut self) -> Self {
        self.newline = "\n";
        self
    }

    #[must_use]
    pub fn preamble(mut self, text: &[u8]) -> Self {
        self.preamble = text.to_vec();
        self
    }

    #[must_use]
    pub fn epilogue(mut self, text: &[u8]) -> Self {
        self.epilogue = text.to_vec();
        self
    }

    /// Leave out the close delimiter.
    #[must_use]
    pub fn unterminated(mut self) -> Self {
        self.closed = false;
        self
    }

    #[must_use]
    pub fn part(mut self, headers: &[(&str, &str)], body: &[u8]) -> Self {
        let headers = headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.parts.push((headers, body.to_vec()));
        self
    }

    /// `Content-Type` header value for this body.
    #[must_use]
    pub fn content_type(&self, subtype: &str) -> String {
        format!("multipart/{subtype}; boundary=\"{}\"", self.boundary)
    }

    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let nl = self.newline.as_bytes();
        let mut out = self.preamble.clone();
        if !out.is_empty() {
            out.extend_from_slice(nl);
        }
        for (headers, body) in &self.parts {
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.boundary.as_bytes());
            out.extend_from_slice(nl);
            for (name, value) in headers {
                out.extend_from_slice(format!("{name}: {value}").as_bytes());
                out.extend_from_slice(nl);
            }
            out.extend_from_slice(nl);
            out.extend_from_slice(body);
            out.extend_from_slice(nl);
        }
        if self.closed {
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.boundary.as_bytes());
            out.extend_from_slice(b"--");
            out.extend_from_slice(nl);
            out.extend_from_slice(&self.epilogue);
        }
        out
    }
}
