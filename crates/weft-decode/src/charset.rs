#![forbid(unsafe_code)]

//! Charsets, label lookup and in-document charset discovery.

use std::fmt::{self, Debug};

/// Charsets the decoder can convert into UTF-8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Charset {
    Utf8,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

impl Charset {
    /// Canonical label.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Windows1252 => "windows-1252",
        }
    }

    /// Whether bytes in this charset are already in the pipeline's internal
    /// encoding.
    #[must_use]
    pub fn is_canonical(self) -> bool {
        self == Self::Utf8
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Charset name service.
pub trait CharsetTable: Send + Sync + Debug {
    /// Resolve a charset label (case-insensitive, surrounding whitespace
    /// ignored).
    fn lookup(&self, label: &str) -> Option<Charset>;
}

/// Labels for the charsets this crate decodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinCharsets;

impl CharsetTable for BuiltinCharsets {
    fn lookup(&self, label: &str) -> Option<Charset> {
        let label = label.trim().trim_matches(['"', '\'']).to_ascii_lowercase();
        let charset = match label.as_str() {
            "utf-8" | "utf8" | "unicode-1-1-utf-8" | "x-unicode20utf8" => Charset::Utf8,
            "utf-16" | "utf-16le" | "unicode" | "ucs-2" => Charset::Utf16Le,
            "utf-16be" | "unicodefffe" => Charset::Utf16Be,
            "windows-1252" | "cp1252" | "x-cp1252" | "iso-8859-1" | "iso8859-1" | "iso_8859-1"
            | "latin1" | "l1" | "us-ascii" | "ascii" | "ansi_x3.4-1968" => Charset::Windows1252,
            _ => return None,
        };
        Some(charset)
    }
}

/// Byte order mark at the start of `input` and its length.
#[must_use]
pub(crate) fn bom(input: &[u8]) -> Option<(Charset, usize)> {
    match input {
        [0xEF, 0xBB, 0xBF, ..] => Some((Charset::Utf8, 3)),
        [0xFF, 0xFE, ..] => Some((Charset::Utf16Le, 2)),
        [0xFE, 0xFF, ..] => Some((Charset::Utf16Be, 2)),
        _ => None,
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| p + from)
}

/// Value after `name`, optional whitespace and `=`, unquoted.
fn attr_value<'a>(tag: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    let mut from = 0;
    while let Some(at) = find(tag, name, from) {
        from = at + name.len();
        let rest = &tag[from..];
        let rest = rest.trim_ascii_start();
        let Some(rest) = rest.strip_prefix(b"=") else {
            continue;
        };
        let rest = rest.trim_ascii_start();
        let rest = rest.strip_prefix(b"\"").or_else(|| rest.strip_prefix(b"'")).unwrap_or(rest);
        let end = rest
            .iter()
            .position(|b| !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':')))
            .unwrap_or(rest.len());
        if end > 0 {
            return Some(&rest[..end]);
        }
    }
    None
}

/// Charset label declared inside the document: an XML declaration's
/// `encoding`, or a `<meta>` tag with `charset=` (either the attribute or
/// inside `content`).
#[must_use]
pub fn prescan_charset(input: &[u8]) -> Option<String> {
    let trimmed = input.trim_ascii_start();
    if trimmed.starts_with(b"<?xml") {
        let end = find(trimmed, b"?>", 0).unwrap_or(trimmed.len());
        if let Some(v) = attr_value(&trimmed[..end], b"encoding") {
            return Some(String::from_utf8_lossy(v).into_owned());
        }
    }
    let mut from = 0;
    while let Some(at) = find(input, b"<meta", from) {
        let end = input[at..]
            .iter()
            .position(|&b| b == b'>')
            .map_or(input.len(), |p| at + p);
        if let Some(v) = attr_value(&input[at..end], b"charset") {
            return Some(String::from_utf8_lossy(v).into_owned());
        }
        from = end;
    }
    None
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("UTF-8", Some(Charset::Utf8))]
    #[case(" iso-8859-1 ", Some(Charset::Windows1252))]
    #[case("US-ASCII", Some(Charset::Windows1252))]
    #[case("utf-16", Some(Charset::Utf16Le))]
    #[case("\"utf-16be\"", Some(Charset::Utf16Be))]
    #[case("shift_jis", None)]
    fn builtin_labels(#[case] label: &str, #[case] expected: Option<Charset>) {
        assert_eq!(BuiltinCharsets.lookup(label), expected);
    }

    #[rstest]
    #[case::meta_charset(b"<html><head><meta charset=\"utf-8\">".as_slice(), Some("utf-8"))]
    #[case::meta_unquoted(b"<META CHARSET=windows-1252>".as_slice(), Some("windows-1252"))]
    #[case::http_equiv(
        b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\">".as_slice(),
        Some("ISO-8859-1")
    )]
    #[case::xml(b"<?xml version=\"1.0\" encoding='UTF-8'?><r/>".as_slice(), Some("UTF-8"))]
    #[case::meta_without_charset(b"<meta name=viewport><meta charset=utf-8>".as_slice(), Some("utf-8"))]
    #[case::none(b"<p>no declaration</p>".as_slice(), None)]
    fn prescan(#[case] input: &[u8], #[case] expected: Option<&str>) {
        assert_eq!(prescan_charset(input).as_deref(), expected);
    }

    #[test]
    fn bom_lengths() {
        assert_eq!(bom(b"\xEF\xBB\xBFx"), Some((Charset::Utf8, 3)));
        assert_eq!(bom(b"\xFF\xFEx\x00"), Some((Charset::Utf16Le, 2)));
        assert_eq!(bom(b"x"), None);
    }
}
