#![forbid(unsafe_code)]

//! Signature table.
//!
//! Each [`Pattern`] is compared against the start of the input. With a mask,
//! byte `i` matches when `input[i] & mask[i] == pattern[i]`; the HTML rows use
//! `0xDF` on letters to compare case-insensitively against uppercase
//! patterns.

/// Coarse class of a table entry, used to restrict lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimpleClass {
    Text,
    Image,
    Video,
    Audio,
    Binary,
}

/// One signature row.
#[derive(Clone, Copy, Debug)]
pub struct Pattern {
    pub bytes: &'static [u8],
    pub mask: Option<&'static [u8]>,
    /// Skip leading space/tab/CR/LF/FF before comparing.
    pub skip_ws: bool,
    /// Byte after the pattern must be `0x20` or `0x3E`.
    pub tag_end: bool,
    pub mime: &'static str,
    /// Whether content of this type may run script.
    pub scriptable: bool,
    pub class: SimpleClass,
}

impl Pattern {
    /// Whether `input` starts with this signature.
    #[must_use]
    pub fn matches(&self, input: &[u8]) -> bool {
        let start = if self.skip_ws {
            input
                .iter()
                .position(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C))
                .unwrap_or(input.len())
        } else {
            0
        };
        let Some(window) = input.get(start..start + self.bytes.len()) else {
            return false;
        };
        let equal = match self.mask {
            Some(mask) => window
                .iter()
                .zip(mask)
                .zip(self.bytes)
                .all(|((b, m), p)| b & m == *p),
            None => window == self.bytes,
        };
        if !equal {
            return false;
        }
        if self.tag_end {
            return matches!(input.get(start + self.bytes.len()), Some(b' ' | b'>'));
        }
        true
    }
}

/// Restriction applied to the table before lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatternFilter {
    /// Skip scriptable rows.
    pub safe_only: bool,
    /// Only try rows of this class.
    pub class: Option<SimpleClass>,
}

impl PatternFilter {
    /// Every row.
    pub const ALL: Self = Self {
        safe_only: false,
        class: None,
    };

    /// Non-scriptable rows only.
    pub const SAFE: Self = Self {
        safe_only: true,
        class: None,
    };

    /// Rows of one class.
    #[must_use]
    pub const fn class(class: SimpleClass) -> Self {
        Self {
            safe_only: false,
            class: Some(class),
        }
    }

    /// Also skip scriptable rows.
    #[must_use]
    pub const fn safe(self) -> Self {
        Self {
            safe_only: true,
            class: self.class,
        }
    }

    fn admits(&self, pattern: &Pattern) -> bool {
        if self.safe_only && pattern.scriptable {
            return false;
        }
        self.class.is_none_or(|c| c == pattern.class)
    }
}

/// First row admitted by `filter` that matches `input`.
#[must_use]
pub fn lookup(input: &[u8], filter: PatternFilter) -> Option<&'static Pattern> {
    PATTERNS
        .iter()
        .filter(|p| filter.admits(p))
        .find(|p| p.matches(input))
}

const fn html(bytes: &'static [u8], mask: &'static [u8]) -> Pattern {
    Pattern {
        bytes,
        mask: Some(mask),
        skip_ws: true,
        tag_end: true,
        mime: "text/html",
        scriptable: true,
        class: SimpleClass::Text,
    }
}

const fn exact(bytes: &'static [u8], mime: &'static str, class: SimpleClass) -> Pattern {
    Pattern {
        bytes,
        mask: None,
        skip_ws: false,
        tag_end: false,
        mime,
        scriptable: false,
        class,
    }
}

const fn masked(
    bytes: &'static [u8],
    mask: &'static [u8],
    mime: &'static str,
    class: SimpleClass,
) -> Pattern {
    Pattern {
        bytes,
        mask: Some(mask),
        skip_ws: false,
        tag_end: false,
        mime,
        scriptable: false,
        class,
    }
}

const RIFF_MASK: &[u8] = b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF";

/// The signature table, in lookup order.
pub static PATTERNS: &[Pattern] = &[
    // Scriptable markup.
    html(
        b"<!DOCTYPE HTML",
        b"\xFF\xFF\xDF\xDF\xDF\xDF\xDF\xDF\xDF\xFF\xDF\xDF\xDF\xDF",
    ),
    html(b"<HTML", b"\xFF\xDF\xDF\xDF\xDF"),
    html(b"<HEAD", b"\xFF\xDF\xDF\xDF\xDF"),
    html(b"<SCRIPT", b"\xFF\xDF\xDF\xDF\xDF\xDF\xDF"),
    html(b"<IFRAME", b"\xFF\xDF\xDF\xDF\xDF\xDF\xDF"),
    html(b"<H1", b"\xFF\xDF\xFF"),
    html(b"<DIV", b"\xFF\xDF\xDF\xDF"),
    html(b"<FONT", b"\xFF\xDF\xDF\xDF\xDF"),
    html(b"<TABLE", b"\xFF\xDF\xDF\xDF\xDF\xDF"),
    html(b"<A", b"\xFF\xDF"),
    html(b"<STYLE", b"\xFF\xDF\xDF\xDF\xDF\xDF"),
    html(b"<TITLE", b"\xFF\xDF\xDF\xDF\xDF\xDF"),
    html(b"<B", b"\xFF\xDF"),
    html(b"<BODY", b"\xFF\xDF\xDF\xDF\xDF"),
    html(b"<BR", b"\xFF\xDF\xDF"),
    html(b"<P", b"\xFF\xDF"),
    html(b"<!--", b"\xFF\xFF\xFF\xFF"),
    Pattern {
        bytes: b"<?xml",
        mask: None,
        skip_ws: true,
        tag_end: false,
        mime: "text/xml",
        scriptable: true,
        class: SimpleClass::Text,
    },
    Pattern {
        bytes: b"%PDF-",
        mask: None,
        skip_ws: false,
        tag_end: false,
        mime: "application/pdf",
        scriptable: true,
        class: SimpleClass::Binary,
    },
    // Safe documents.
    exact(b"%!PS-Adobe-", "application/postscript", SimpleClass::Binary),
    exact(b"\xFE\xFF", "text/plain", SimpleClass::Text),
    exact(b"\xFF\xFE", "text/plain", SimpleClass::Text),
    exact(b"\xEF\xBB\xBF", "text/plain", SimpleClass::Text),
    // Images.
    exact(b"GIF87a", "image/gif", SimpleClass::Image),
    exact(b"GIF89a", "image/gif", SimpleClass::Image),
    exact(b"\x89PNG\r\n\x1A\n", "image/png", SimpleClass::Image),
    exact(b"\xFF\xD8\xFF", "image/jpeg", SimpleClass::Image),
    exact(b"BM", "image/bmp", SimpleClass::Image),
    masked(
        b"RIFF\x00\x00\x00\x00WEBPVP",
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        "image/webp",
        SimpleClass::Image,
    ),
    exact(b"\x00\x00\x01\x00", "image/x-icon", SimpleClass::Image),
    exact(b"\x00\x00\x02\x00", "image/x-icon", SimpleClass::Image),
    // Audio and video.
    exact(b"OggS\x00", "application/ogg", SimpleClass::Video),
    masked(b"RIFF\x00\x00\x00\x00WAVE", RIFF_MASK, "audio/wave", SimpleClass::Audio),
    masked(b"RIFF\x00\x00\x00\x00AVI ", RIFF_MASK, "video/avi", SimpleClass::Video),
    exact(b"ID3", "audio/mpeg", SimpleClass::Audio),
    exact(b"\x1A\x45\xDF\xA3", "video/webm", SimpleClass::Video),
    masked(b"FORM\x00\x00\x00\x00AIFF", RIFF_MASK, "audio/aiff", SimpleClass::Audio),
    exact(b"MThd\x00\x00\x00\x06", "audio/midi", SimpleClass::Audio),
    // Archives.
    exact(b"\x1F\x8B\x08", "application/x-gzip", SimpleClass::Binary),
    exact(b"PK\x03\x04", "application/zip", SimpleClass::Binary),
    exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed", SimpleClass::Binary),
];

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn masks_match_pattern_lengths() {
        for p in PATTERNS {
            if let Some(mask) = p.mask {
                assert_eq!(mask.len(), p.bytes.len(), "{}", p.mime);
            }
        }
    }

    #[rstest]
    #[case::doctype(b"<!DOCTYPE HTML>".as_slice(), Some("text/html"))]
    #[case::lowercase(b"<!doctype html>".as_slice(), Some("text/html"))]
    #[case::leading_ws(b" \t\r\n<html>".as_slice(), Some("text/html"))]
    #[case::tag_with_space(b"<p class=x>".as_slice(), Some("text/html"))]
    #[case::tag_prefix_only(b"<pre>".as_slice(), None)]
    #[case::truncated_tag(b"<html".as_slice(), None)]
    #[case::comment(b"<!-- x -->".as_slice(), Some("text/html"))]
    #[case::xml(b"  <?xml version=\"1.0\"?>".as_slice(), Some("text/xml"))]
    #[case::png(b"\x89PNG\r\n\x1A\n0000".as_slice(), Some("image/png"))]
    #[case::webp(b"RIFF\x10\x00\x00\x00WEBPVP8 ".as_slice(), Some("image/webp"))]
    #[case::wave(b"RIFF\x10\x00\x00\x00WAVEfmt ".as_slice(), Some("audio/wave"))]
    #[case::gzip(b"\x1F\x8B\x08\x00".as_slice(), Some("application/x-gzip"))]
    #[case::vertical_tab_not_skipped(b"\x0B<html>".as_slice(), None)]
    fn lookup_all(#[case] input: &[u8], #[case] expected: Option<&str>) {
        assert_eq!(lookup(input, PatternFilter::ALL).map(|p| p.mime), expected);
    }

    #[test]
    fn safe_filter_skips_scriptable_rows() {
        assert!(lookup(b"<html>", PatternFilter::SAFE).is_none());
        assert!(lookup(b"%PDF-1.4", PatternFilter::SAFE).is_none());
        assert_eq!(
            lookup(b"GIF89a", PatternFilter::SAFE).map(|p| p.mime),
            Some("image/gif")
        );
    }

    #[test]
    fn class_filter_restricts_rows() {
        let video = PatternFilter::class(SimpleClass::Video);
        assert!(lookup(b"ID3\x03", video).is_none());
        assert_eq!(
            lookup(b"\x1A\x45\xDF\xA3\x01", video).map(|p| p.mime),
            Some("video/webm")
        );
    }

    #[test]
    fn first_match_wins() {
        // `<!DOCTYPE HTML` precedes `<!--`; both need the full pattern.
        let first = lookup(b"<!DOCTYPE HTML>", PatternFilter::ALL).map(|p| p.bytes);
        assert_eq!(first, Some(b"<!DOCTYPE HTML".as_slice()));
    }
}
