#![forbid(unsafe_code)]

//! MIME `Content-Transfer-Encoding` decoders.

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

use crate::{BlockDecode, DecodeError, DecodeResult, Pending};

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// `base64` transfer decoding. Line breaks and other characters outside the
/// alphabet are skipped.
#[derive(Debug, Default)]
pub struct Base64 {
    quad: [u8; 4],
    filled: usize,
}

impl Base64 {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_quad(&mut self, out: &mut Pending) -> DecodeResult<()> {
        let quad = &self.quad[..self.filled];
        self.filled = 0;
        if quad.iter().all(|&c| c == b'=') {
            return Ok(());
        }
        let mut decoded = [0u8; 3];
        let n = BASE64
            .decode_slice(quad, &mut decoded)
            .map_err(|e| DecodeError::corrupt("base64", e))?;
        out.extend(&decoded[..n]);
        Ok(())
    }
}

impl BlockDecode for Base64 {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn feed(&mut self, input: &[u8], out: &mut Pending) -> DecodeResult<()> {
        out.reserve(input.len() / 4 * 3 + 3)?;
        for &c in input {
            if !(c.is_ascii_alphanumeric() || matches!(c, b'+' | b'/' | b'=')) {
                continue;
            }
            self.quad[self.filled] = c;
            self.filled += 1;
            if self.filled == 4 {
                self.flush_quad(out)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Pending) -> DecodeResult<()> {
        match self.filled {
            0 => Ok(()),
            1 => Err(DecodeError::corrupt("base64", "dangling character")),
            _ => self.flush_quad(out),
        }
    }
}

/// `quoted-printable` transfer decoding.
///
/// `=XX` escapes become bytes, `=` before a line break is a soft break, and
/// malformed escapes are kept literally.
#[derive(Debug, Default)]
pub struct QuotedPrintable {
    /// Unfinished escape carried to the next block (at most `=` plus one byte).
    hold: Vec<u8>,
}

impl QuotedPrintable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn hex(b: u8) -> Option<u8> {
    char::from(b).to_digit(16).and_then(|d| u8::try_from(d).ok())
}

impl BlockDecode for QuotedPrintable {
    fn name(&self) -> &'static str {
        "quoted-printable"
    }

    fn feed(&mut self, input: &[u8], out: &mut Pending) -> DecodeResult<()> {
        let joined;
        let data = if self.hold.is_empty() {
            input
        } else {
            let mut v = std::mem::take(&mut self.hold);
            v.extend_from_slice(input);
            joined = v;
            &joined[..]
        };
        out.reserve(data.len())?;

        let mut i = 0;
        while i < data.len() {
            if data[i] != b'=' {
                out.push(data[i]);
                i += 1;
                continue;
            }
            match (data.get(i + 1), data.get(i + 2)) {
                (None, _) | (Some(b'\r'), None) => {
                    self.hold = data[i..].to_vec();
                    return Ok(());
                }
                (Some(b'\n'), _) => i += 2,
                (Some(b'\r'), Some(b'\n')) => i += 3,
                (Some(&a), None) if hex(a).is_some() => {
                    self.hold = data[i..].to_vec();
                    return Ok(());
                }
                (Some(&a), Some(&b)) => match (hex(a), hex(b)) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'=');
                        i += 1;
                    }
                },
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Pending) -> DecodeResult<()> {
        let hold = std::mem::take(&mut self.hold);
        out.extend(&hold);
        Ok(())
    }
}
