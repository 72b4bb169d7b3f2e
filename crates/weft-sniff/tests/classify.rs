use rstest::rstest;
use weft_sniff::{ContentSniffer, ContentType, classify};

#[rstest]
#[case::html_comment(b"\n\n<!-- generated -->\n<p>hi</p>".as_slice(), ContentType::Html)]
#[case::pdf(b"%PDF-1.7\n".as_slice(), ContentType::Pdf)]
#[case::postscript(b"%!PS-Adobe-3.0".as_slice(), ContentType::PostScript)]
#[case::jpeg(b"\xFF\xD8\xFF\xE0\x00\x10JFIF".as_slice(), ContentType::Image)]
#[case::ogg(b"OggS\x00\x02".as_slice(), ContentType::Video)]
#[case::midi(b"MThd\x00\x00\x00\x06\x00\x01".as_slice(), ContentType::Audio)]
#[case::rar(b"Rar!\x1A\x07\x00\xCF".as_slice(), ContentType::Archive)]
#[case::plain(b"Dear reader,\r\nthis is text.".as_slice(), ContentType::Text)]
fn unlabelled_resources(#[case] input: &[u8], #[case] expected: ContentType) {
    assert_eq!(classify(input, "", false).content_type, expected);
}

#[test]
fn declared_type_parameters_are_ignored() {
    let r = classify(b"plain", "Text/Plain; charset=utf-8", false);
    assert_eq!(r.mime, "text/plain");
}

#[test]
fn declared_html_is_trusted() {
    let r = classify(b"\x00\x01binary", "text/html", false);
    assert_eq!(r.mime, "text/html");
    assert!(r.deterministic);
}

#[test]
fn scan_len_bounds_binary_detection() {
    let mut input = vec![b'a'; 64];
    input.push(0x02);
    let sniffer = ContentSniffer::new().with_scan_len(32);
    assert_eq!(sniffer.classify(&input, "text/plain", false).mime, "text/plain");
}
