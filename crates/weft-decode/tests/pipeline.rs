use std::{io::Write, sync::Arc};

use flate2::{Compression, write::GzEncoder};
use weft_decode::{
    BuiltinCharsets, Charset, CharsetDecoder, Decoder, StoreReader, TransformChain,
    transfer_decoders,
};
use weft_storage::{ByteStore, MemStore};

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut e = GzEncoder::new(Vec::new(), Compression::fast());
    e.write_all(data).unwrap();
    e.finish().unwrap()
}

#[test]
fn gzip_then_charset_over_a_growing_store() {
    let body = b"<html><body>caf\xE9 \x80</body></html>";
    let encoded = gzip(body);

    let store = MemStore::new();
    let mut reader = StoreReader::new(Arc::new(store.clone()));
    let mut chain = TransformChain::builder()
        .charset(
            Decoder::new(CharsetDecoder::new(
                Arc::new(BuiltinCharsets),
                Charset::Windows1252,
                16,
            ))
            .boxed(),
        )
        .prepend_all(transfer_decoders("gzip").unwrap())
        .build();
    assert_eq!(chain.names(), vec!["gzip", "charset"]);

    let mut out = Vec::new();
    let mut buf = [0u8; 8];
    for piece in encoded.chunks(5) {
        store.append(piece).unwrap();
        loop {
            let mut more = true;
            let n = chain.read_into(&mut buf, &mut reader, &mut more).unwrap();
            out.extend_from_slice(&buf[..n]);
            if n == 0 {
                assert!(more);
                break;
            }
        }
    }
    store.finish(false);
    loop {
        let mut more = true;
        let n = chain.read_into(&mut buf, &mut reader, &mut more).unwrap();
        out.extend_from_slice(&buf[..n]);
        if !more {
            break;
        }
    }

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "<html><body>café €</body></html>"
    );
    let report = chain.charsets().unwrap();
    assert_eq!(report.used, Charset::Windows1252);
}
