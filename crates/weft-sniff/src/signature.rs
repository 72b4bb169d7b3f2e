#![forbid(unsafe_code)]

//! Signature checks that do not fit the fixed-length table.

/// Octets that never appear in plain text.
#[must_use]
pub fn is_binary_octet(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Whether the first `scan_len` bytes contain a binary octet.
#[must_use]
pub fn has_binary_octets(input: &[u8], scan_len: usize) -> bool {
    input.iter().take(scan_len).copied().any(is_binary_octet)
}

/// Charset label of a leading UTF byte order mark.
#[must_use]
pub fn utf_bom(input: &[u8]) -> Option<&'static str> {
    match input {
        [0xFE, 0xFF, ..] => Some("utf-16be"),
        [0xFF, 0xFE, ..] => Some("utf-16le"),
        [0xEF, 0xBB, 0xBF, ..] => Some("utf-8"),
        _ => None,
    }
}

/// ISO base media file with an `mp4` family brand.
///
/// The first box must be `ftyp`, its size a multiple of four that fits the
/// input, and either the major brand or one of the compatible brands must
/// start with `mp4`.
#[must_use]
pub fn is_mp4(input: &[u8]) -> bool {
    let Some(size) = input.get(..4) else {
        return false;
    };
    let box_size = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) as usize;
    if input.len() < box_size || box_size % 4 != 0 || box_size < 12 {
        return false;
    }
    if &input[4..8] != b"ftyp" {
        return false;
    }
    if &input[8..11] == b"mp4" {
        return true;
    }
    // Compatible brands follow the minor version at offset 12.
    (16..box_size)
        .step_by(4)
        .filter_map(|at| input.get(at..at + 3))
        .any(|brand| brand == b"mp4")
}
