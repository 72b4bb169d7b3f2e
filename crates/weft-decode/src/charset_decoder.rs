#![forbid(unsafe_code)]

//! Character decoding into UTF-8.
//!
//! The decoder holds back the first `prescan_len` bytes to pick a charset:
//! byte order mark, then the declared charset, then an in-document
//! declaration, then "valid non-ASCII UTF-8", then the fallback. While
//! decoding it keeps checking whether the whole input is valid UTF-8 so it can
//! report a *guessed* charset that may differ from the one it used.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    BlockDecode, Charset, CharsetReport, CharsetTable, DecodeResult, Pending,
    charset::{bom, prescan_charset},
};

const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// Where the used charset came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharsetSource {
    Bom,
    Declared,
    Document,
    /// Prescan window was valid UTF-8 with non-ASCII bytes.
    Sniffed,
    Fallback,
}

/// Incremental UTF-8 validity check over the raw input.
#[derive(Debug, Default)]
struct Utf8Probe {
    carry: Vec<u8>,
    non_ascii: bool,
    invalid: bool,
}

impl Utf8Probe {
    fn feed(&mut self, input: &[u8]) {
        if self.invalid {
            return;
        }
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(input);
        match std::str::from_utf8(&data) {
            Ok(s) => self.non_ascii |= !s.is_ascii(),
            Err(e) => {
                let valid = e.valid_up_to();
                self.non_ascii |= !data[..valid].is_ascii();
                match e.error_len() {
                    None => self.carry = data[valid..].to_vec(),
                    Some(_) => self.invalid = true,
                }
            }
        }
    }

    fn finish(&mut self) {
        if !self.carry.is_empty() {
            self.invalid = true;
        }
    }
}

#[derive(Debug)]
enum Text {
    Utf8 { carry: Vec<u8> },
    Utf16 { big_endian: bool, odd: Option<u8>, high: Option<u16> },
    Windows1252,
}

impl Text {
    fn new(charset: Charset) -> Self {
        match charset {
            Charset::Utf8 => Self::Utf8 { carry: Vec::new() },
            Charset::Utf16Le => Self::Utf16 {
                big_endian: false,
                odd: None,
                high: None,
            },
            Charset::Utf16Be => Self::Utf16 {
                big_endian: true,
                odd: None,
                high: None,
            },
            Charset::Windows1252 => Self::Windows1252,
        }
    }

    fn decode(&mut self, input: &[u8], out: &mut Pending, last: bool) -> DecodeResult<()> {
        out.reserve(input.len() * 3 + 4)?;
        match self {
            Self::Utf8 { carry } => decode_utf8(carry, input, out, last),
            Self::Utf16 {
                big_endian,
                odd,
                high,
            } => decode_utf16(*big_endian, odd, high, input, out, last),
            Self::Windows1252 => {
                for &b in input {
                    let c = match b {
                        0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
                        _ => char::from(b),
                    };
                    out.push_char(c);
                }
            }
        }
        Ok(())
    }
}

fn decode_utf8(carry: &mut Vec<u8>, input: &[u8], out: &mut Pending, last: bool) {
    let mut data = std::mem::take(carry);
    data.extend_from_slice(input);
    let mut rest = &data[..];
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.push_str(s);
                return;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                // `valid` bytes were just validated.
                out.extend(&rest[..valid]);
                match e.error_len() {
                    Some(n) => {
                        out.push_char(char::REPLACEMENT_CHARACTER);
                        rest = &rest[valid + n..];
                    }
                    None if last => {
                        out.push_char(char::REPLACEMENT_CHARACTER);
                        return;
                    }
                    None => {
                        *carry = rest[valid..].to_vec();
                        return;
                    }
                }
            }
        }
    }
}

fn decode_utf16(
    big_endian: bool,
    odd: &mut Option<u8>,
    high: &mut Option<u16>,
    input: &[u8],
    out: &mut Pending,
    last: bool,
) {
    let mut bytes = odd.take().into_iter().chain(input.iter().copied());
    loop {
        let Some(a) = bytes.next() else { break };
        let Some(b) = bytes.next() else {
            *odd = Some(a);
            break;
        };
        let unit = if big_endian {
            u16::from_be_bytes([a, b])
        } else {
            u16::from_le_bytes([a, b])
        };
        if let Some(h) = high.take() {
            if (0xDC00..0xE000).contains(&unit) {
                let c = 0x10000 + ((u32::from(h) - 0xD800) << 10) + (u32::from(unit) - 0xDC00);
                out.push_char(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
                continue;
            }
            out.push_char(char::REPLACEMENT_CHARACTER);
        }
        match unit {
            0xD800..0xDC00 => *high = Some(unit),
            0xDC00..0xE000 => out.push_char(char::REPLACEMENT_CHARACTER),
            _ => out.push_char(char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER)),
        }
    }
    if last && (odd.take().is_some() | high.take().is_some()) {
        out.push_char(char::REPLACEMENT_CHARACTER);
    }
}

#[derive(Debug)]
enum State {
    Prescan(Vec<u8>),
    Decoding {
        text: Text,
        used: Charset,
        source: CharsetSource,
    },
}

/// Character decoder producing UTF-8.
#[derive(Debug)]
pub struct CharsetDecoder {
    table: Arc<dyn CharsetTable>,
    declared: Option<Charset>,
    fallback: Charset,
    prescan_len: usize,
    state: State,
    probe: Utf8Probe,
    finished: bool,
}

impl CharsetDecoder {
    /// Decoder falling back to `fallback` when nothing else decides.
    #[must_use]
    pub fn new(table: Arc<dyn CharsetTable>, fallback: Charset, prescan_len: usize) -> Self {
        Self {
            table,
            declared: None,
            fallback,
            prescan_len,
            state: State::Prescan(Vec::new()),
            probe: Utf8Probe::default(),
            finished: false,
        }
    }

    /// Charset declared by the protocol layer; only a BOM overrides it.
    #[must_use]
    pub fn with_declared(mut self, declared: Option<Charset>) -> Self {
        self.declared = declared;
        self
    }

    /// Charset in use, once chosen.
    #[must_use]
    pub fn used(&self) -> Option<(Charset, CharsetSource)> {
        match self.state {
            State::Prescan(_) => None,
            State::Decoding { used, source, .. } => Some((used, source)),
        }
    }

    fn choose(&self, head: &[u8]) -> (Charset, CharsetSource, usize) {
        if let Some((charset, len)) = bom(head) {
            return (charset, CharsetSource::Bom, len);
        }
        if let Some(charset) = self.declared {
            return (charset, CharsetSource::Declared, 0);
        }
        let window = &head[..head.len().min(self.prescan_len)];
        if let Some(charset) = prescan_charset(window).and_then(|label| self.table.lookup(&label)) {
            // A document cannot declare itself UTF-16 in an ASCII-compatible tag.
            let charset = match charset {
                Charset::Utf16Le | Charset::Utf16Be => Charset::Utf8,
                other => other,
            };
            return (charset, CharsetSource::Document, 0);
        }
        let mut probe = Utf8Probe::default();
        probe.feed(window);
        if !probe.invalid && probe.non_ascii {
            return (Charset::Utf8, CharsetSource::Sniffed, 0);
        }
        (self.fallback, CharsetSource::Fallback, 0)
    }

    fn start(&mut self, head: Vec<u8>, out: &mut Pending, last: bool) -> DecodeResult<()> {
        let (used, source, skip) = self.choose(&head);
        debug!(charset = %used, ?source, "charset chosen");
        let mut text = Text::new(used);
        text.decode(&head[skip..], out, last)?;
        self.state = State::Decoding { text, used, source };
        Ok(())
    }
}

impl BlockDecode for CharsetDecoder {
    fn name(&self) -> &'static str {
        "charset"
    }

    fn feed(&mut self, input: &[u8], out: &mut Pending) -> DecodeResult<()> {
        self.probe.feed(input);
        match &mut self.state {
            State::Prescan(head) => {
                head.extend_from_slice(input);
                // A BOM needs up to three bytes even with a tiny window.
                if head.len() >= self.prescan_len.max(3) {
                    let head = std::mem::take(head);
                    self.start(head, out, false)?;
                }
                Ok(())
            }
            State::Decoding { text, .. } => text.decode(input, out, false),
        }
    }

    fn finish(&mut self, out: &mut Pending) -> DecodeResult<()> {
        self.probe.finish();
        self.finished = true;
        match &mut self.state {
            State::Prescan(head) => {
                let head = std::mem::take(head);
                self.start(head, out, true)
            }
            State::Decoding { text, .. } => text.decode(&[], out, true),
        }?;
        if let Some(report) = self.charsets() {
            trace!(used = %report.used, guessed = %report.guessed, "charset decoder finished");
        }
        Ok(())
    }

    fn charsets(&self) -> Option<CharsetReport> {
        let (used, source) = self.used()?;
        let guessed = match source {
            CharsetSource::Fallback if self.finished && self.probe.non_ascii && !self.probe.invalid => {
                Charset::Utf8
            }
            CharsetSource::Sniffed if self.probe.invalid => self.fallback,
            _ => used,
        };
        Some(CharsetReport { used, guessed })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{BuiltinCharsets, ByteTransform, Decoder, SliceReader};

    fn decoder(prescan_len: usize) -> CharsetDecoder {
        CharsetDecoder::new(Arc::new(BuiltinCharsets), Charset::Windows1252, prescan_len)
    }

    fn run(d: CharsetDecoder, input: &[u8], chunk: usize) -> (String, Option<CharsetReport>) {
        let mut d = Decoder::new(d);
        let mut src = SliceReader::new(input).with_chunk_len(chunk);
        let mut out = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            let mut more = true;
            let n = d.read_into(&mut buf, &mut src, &mut more).unwrap();
            out.extend_from_slice(&buf[..n]);
            if !more {
                break;
            }
        }
        (String::from_utf8(out).unwrap(), d.charsets())
    }

    #[rstest]
    #[case::chunked(1)]
    #[case::whole(usize::MAX)]
    fn windows_1252_maps_c1_range(#[case] chunk: usize) {
        let (text, report) = run(decoder(16), b"\x80 \x93quoted\x94 caf\xE9", chunk);
        assert_eq!(text, "€ \u{201C}quoted\u{201D} café");
        let report = report.unwrap();
        assert_eq!(report.used, Charset::Windows1252);
        assert_eq!(report.guessed, Charset::Windows1252);
    }

    #[rstest]
    #[case::chunked(1)]
    #[case::whole(usize::MAX)]
    fn utf8_bom_is_stripped(#[case] chunk: usize) {
        let (text, report) = run(decoder(64), "\u{FEFF}héllo".as_bytes(), chunk);
        assert_eq!(text, "héllo");
        assert_eq!(report.unwrap().used, Charset::Utf8);
    }

    #[rstest]
    #[case::le(b"\xFF\xFEh\x00i\x00=\xD8\x00\xDE".as_slice())]
    #[case::be(b"\xFE\xFF\x00h\x00i\xD8=\xDE\x00".as_slice())]
    fn utf16_with_surrogates(#[case] input: &[u8]) {
        for chunk in [1, 3, usize::MAX] {
            let (text, _) = run(decoder(4), input, chunk);
            assert_eq!(text, "hi\u{1F600}");
        }
    }

    #[test]
    fn meta_declaration_is_used() {
        let input = b"<meta charset=utf-8><p>caf\xC3\xA9</p>";
        let (text, report) = run(decoder(64), input, 5);
        assert!(text.ends_with("café</p>"));
        let report = report.unwrap();
        assert_eq!(report.used, Charset::Utf8);
        assert_eq!(report.guessed, Charset::Utf8);
    }

    #[test]
    fn declared_charset_wins_over_document() {
        let d = decoder(64).with_declared(Some(Charset::Windows1252));
        let (text, _) = run(d, b"<meta charset=utf-8>\xC3\xA9", usize::MAX);
        assert!(text.ends_with("Ã©"));
    }

    #[test]
    fn utf8_after_prescan_window_is_guessed() {
        let mut input = vec![b'a'; 32];
        input.extend_from_slice("ü".as_bytes());
        let (text, report) = run(decoder(8), &input, usize::MAX);
        assert!(text.ends_with("Ã¼"));
        let report = report.unwrap();
        assert_eq!(report.used, Charset::Windows1252);
        assert_eq!(report.guessed, Charset::Utf8);
    }

    #[test]
    fn sniffed_utf8_turning_invalid_guesses_fallback() {
        let mut input = "ü".as_bytes().to_vec();
        input.extend_from_slice(b"aaaaaaaa\xFF");
        let (text, report) = run(decoder(2), &input, usize::MAX);
        assert!(text.ends_with('\u{FFFD}'));
        let report = report.unwrap();
        assert_eq!(report.used, Charset::Utf8);
        assert_eq!(report.guessed, Charset::Windows1252);
    }

    #[test]
    fn utf8_split_sequence_is_carried() {
        let d = decoder(0).with_declared(Some(Charset::Utf8));
        let (text, _) = run(d, "a€b".as_bytes(), 1);
        assert_eq!(text, "a€b");
    }

    #[test]
    fn truncated_utf8_at_end_is_replaced() {
        let d = decoder(0).with_declared(Some(Charset::Utf8));
        let (text, _) = run(d, b"ab\xE2\x82", usize::MAX);
        assert_eq!(text, "ab\u{FFFD}");
    }

    #[test]
    fn short_input_decides_on_finish() {
        let (text, report) = run(decoder(1024), b"tiny", usize::MAX);
        assert_eq!(text, "tiny");
        assert_eq!(report.unwrap().used, Charset::Windows1252);
    }
}
