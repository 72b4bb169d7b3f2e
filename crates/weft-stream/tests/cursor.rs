#![forbid(unsafe_code)]

use std::{sync::Arc, time::Duration};

use rstest::rstest;
use weft_core::{ErrorKind, PipelineConfig, ResourceAttrs, StringAttr};
use weft_events::Notice;
use weft_storage::{ByteStore, MemStore, StoreHandle, StreamStore};
use weft_stream::{CursorError, CursorOptions, Restart, Retrieved, SeekError, StreamCursor};
use weft_test_utils::{RecordingNotifier, gzip_bytes, tracing_setup};

fn open(
    store: StoreHandle,
    attrs: ResourceAttrs,
    options: CursorOptions,
) -> (StreamCursor, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    let mut cursor = StreamCursor::new(store, attrs.into(), options, notifier.clone());
    cursor.init(false).unwrap();
    (cursor, notifier)
}

fn drain(cursor: &mut StreamCursor) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let got = cursor.retrieve().unwrap();
        out.extend_from_slice(cursor.buffered());
        let n = cursor.buffered().len();
        cursor.consume(n);
        if !got.more {
            return out;
        }
        if got.produced == 0 && n == 0 {
            return out;
        }
    }
}

#[rstest]
#[timeout(std::time::Duration::from_secs(5))]
fn consumed_bytes_are_never_delivered_again(_tracing_setup: ()) {
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let store = MemStore::new();
    let (mut cursor, _) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("application/octet-stream"),
        CursorOptions::default(),
    );

    let mut seen = Vec::new();
    let mut steps = [7usize, 300, 1, 4096, 13].into_iter().cycle();
    for chunk in payload.chunks(1500) {
        store.append(chunk).unwrap();
        cursor.retrieve().unwrap();
        let take = steps.next().unwrap().min(cursor.buffered().len());
        seen.extend_from_slice(&cursor.buffered()[..take]);
        cursor.consume(take);
        assert_eq!(cursor.position(), seen.len() as u64);
    }
    store.finish(false);
    seen.extend(drain(&mut cursor));
    assert_eq!(seen, payload);
}

#[rstest]
fn idle_retrieves_do_not_storm(_tracing_setup: ()) {
    let store = MemStore::new();
    let (mut cursor, notifier) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("image/png"),
        CursorOptions::default(),
    );

    for _ in 0..3 {
        assert_eq!(
            cursor.retrieve().unwrap(),
            Retrieved {
                produced: 0,
                more: true
            }
        );
    }
    assert!(notifier.data_ready_count() <= 1);
}

#[rstest]
fn suppressed_notice_is_delivered_once(_tracing_setup: ()) {
    let store = MemStore::new();
    let (mut cursor, notifier) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("image/png"),
        CursorOptions::default(),
    );
    cursor.retrieve().unwrap();
    cursor.retrieve().unwrap();
    notifier.take();

    store.append(b"\x89PNG").unwrap();
    let got = cursor.retrieve().unwrap();
    assert_eq!(got.produced, 4);
    assert_eq!(notifier.data_ready_count(), 1);
}

#[rstest]
fn data_added_replays_suppressed_notice(_tracing_setup: ()) {
    let store = MemStore::new();
    let (mut cursor, notifier) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("image/png"),
        CursorOptions::default(),
    );
    cursor.retrieve().unwrap();
    assert_eq!(notifier.data_ready_count(), 0);

    store.append(b"x").unwrap();
    cursor.link().data_added();
    cursor.link().data_added();
    assert_eq!(notifier.notices(), vec![Notice::DataReady { delay: None }]);
}

#[rstest]
fn suppressed_retry_delay_is_replayed_on_consume(_tracing_setup: ()) {
    let delay = Duration::from_millis(25);
    let store = MemStore::new();
    store.append(b"abc").unwrap();
    let (mut cursor, notifier) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("image/png"),
        CursorOptions::default().with_retry_delay(delay),
    );

    assert_eq!(cursor.retrieve().unwrap().produced, 3);
    assert_eq!(cursor.retrieve().unwrap().produced, 0);
    assert_eq!(
        notifier.take(),
        vec![
            Notice::DataReady { delay: None },
            Notice::DataReady { delay: Some(delay) },
        ]
    );

    // Idle cycles: the delayed request is held back.
    for _ in 0..3 {
        assert!(cursor.retrieve().unwrap().more);
    }
    assert!(notifier.notices().is_empty());
    assert!(cursor.link().gate().was_blocked());

    cursor.consume(3);
    assert_eq!(
        notifier.notices(),
        vec![Notice::DataReady { delay: Some(delay) }]
    );

    store.append(b"d").unwrap();
    cursor.link().data_added();
    assert_eq!(notifier.data_ready_count(), 1);
}

#[rstest]
fn gzip_text_is_decoded(_tracing_setup: ()) {
    let store = MemStore::from_bytes(&gzip_bytes("<p>naïve</p>".as_bytes()));
    let (mut cursor, _) = open(
        Arc::new(store),
        ResourceAttrs::new("text/html; charset=utf-8").with_transfer_encoding("gzip"),
        CursorOptions::default(),
    );
    assert_eq!(cursor.chain_names(), ["gzip"]);
    assert_eq!(drain(&mut cursor), "<p>naïve</p>".as_bytes());
    assert!(cursor.is_finished());
}

#[rstest]
fn charset_redetection_fires_once(_tracing_setup: ()) {
    let mut body = b"<p>plain ascii prologue</p>".to_vec();
    body.extend_from_slice("caf\u{e9}".as_bytes());
    let store = MemStore::from_bytes(&body);
    let options = CursorOptions::default()
        .with_config(PipelineConfig::default().with_charset_prescan_len(16));
    let attrs = ResourceAttrs::new("text/html");
    let notifier = RecordingNotifier::new();
    let shared = weft_core::Attributes::new(attrs);
    let mut cursor = StreamCursor::new(
        Arc::new(store.clone()),
        shared.clone(),
        options.clone(),
        notifier.clone(),
    );
    cursor.init(false).unwrap();

    let first = cursor.retrieve().unwrap();
    assert!(first.more);
    assert!(cursor.buffered().ends_with("caf\u{c3}\u{a9}".as_bytes()));
    assert_eq!(
        shared.get(StringAttr::ForcedCharset).as_deref(),
        Some("utf-8")
    );
    assert_eq!(
        cursor.retrieve().unwrap(),
        Retrieved {
            produced: 0,
            more: true
        }
    );
    assert_eq!(
        cursor.retrieve().unwrap(),
        Retrieved {
            produced: 0,
            more: false
        }
    );
    assert!(!cursor.retrieve().unwrap().more);

    let reloads = notifier.count(|n| *n == Notice::ReloadFromCache);
    let headers = notifier.count(|n| *n == Notice::ReplayHeaders);
    let inline = notifier.count(|n| *n == Notice::ReplayInlineReplacements);
    assert_eq!((reloads, headers, inline), (1, 1, 1));

    // A cursor opened after the reload reads with the forced charset.
    let mut again = StreamCursor::new(Arc::new(store), shared, options, notifier.clone());
    again.init(false).unwrap();
    assert!(again.chain_names().is_empty());
    assert_eq!(drain(&mut again), body);
}

#[rstest]
fn declared_charset_is_never_redetected(_tracing_setup: ()) {
    let mut body = b"<p>plain ascii prologue</p>".to_vec();
    body.extend_from_slice("caf\u{e9}".as_bytes());
    let options = CursorOptions::default()
        .with_config(PipelineConfig::default().with_charset_prescan_len(16));
    let (mut cursor, notifier) = open(
        Arc::new(MemStore::from_bytes(&body)),
        ResourceAttrs::new("text/html; charset=windows-1252"),
        options,
    );
    drain(&mut cursor);
    assert_eq!(notifier.count(|n| *n == Notice::ReloadFromCache), 0);
}

#[rstest]
fn hideable_failure_keeps_delivered_output(_tracing_setup: ()) {
    let (mut cursor, notifier) = open(
        Arc::new(MemStore::from_bytes(b"aGVsbG8=Q")),
        ResourceAttrs::new("image/png").with_transfer_encoding("base64"),
        CursorOptions::default(),
    );
    let got = cursor.retrieve().unwrap();
    assert!(!got.more);
    assert_eq!(cursor.buffered(), b"hello");
    assert_eq!(cursor.failure(), None);
    assert!(cursor.chain_names().is_empty());
    assert_eq!(notifier.count(|n| matches!(n, Notice::LoadFailed { .. })), 0);
}

#[rstest]
fn terminal_failure_notifies_and_stops(_tracing_setup: ()) {
    let (mut cursor, notifier) = open(
        Arc::new(MemStore::from_bytes(b"Q")),
        ResourceAttrs::new("image/png").with_transfer_encoding("base64"),
        CursorOptions::default(),
    );
    assert_eq!(
        cursor.retrieve().unwrap(),
        Retrieved {
            produced: 0,
            more: false
        }
    );
    assert_eq!(cursor.failure(), Some(ErrorKind::DecodeFailure));
    assert!(cursor.is_finished());
    assert_eq!(
        notifier.notices(),
        vec![Notice::LoadFailed {
            kind: ErrorKind::DecodeFailure
        }]
    );
    assert_eq!(cursor.retrieve().unwrap().produced, 0);
    assert_eq!(
        cursor.seek(3),
        Err(CursorError::Seek(SeekError::NotSeekable { pos: 3 }))
    );
}

#[rstest]
fn seek_on_memory_store(_tracing_setup: ()) {
    let store = MemStore::new();
    store.append(b"0123456789").unwrap();
    let (mut cursor, _) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("image/png"),
        CursorOptions::default(),
    );
    cursor.retrieve().unwrap();

    cursor.seek(4).unwrap();
    assert_eq!(cursor.buffered(), b"456789");

    assert_eq!(
        cursor.seek(11),
        Err(CursorError::Seek(SeekError::OutOfRange { pos: 11 }))
    );

    cursor.seek(1).unwrap();
    assert!(cursor.buffered().is_empty());
    cursor.retrieve().unwrap();
    assert_eq!(cursor.buffered(), b"123456789");
}

#[rstest]
fn seek_on_random_access_store(_tracing_setup: ()) {
    let store = MemStore::random_access();
    store.write_at(100, b"tail").unwrap();
    let (mut cursor, _) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("video/mp4"),
        CursorOptions::default(),
    );

    assert_eq!(
        cursor.seek(50),
        Err(CursorError::Seek(SeekError::OutOfRange { pos: 50 }))
    );
    cursor.seek(100).unwrap();
    cursor.retrieve().unwrap();
    assert_eq!(cursor.buffered(), b"tail");
}

#[rstest]
fn seek_on_transformed_output_is_refused(_tracing_setup: ()) {
    let (mut cursor, _) = open(
        Arc::new(MemStore::from_bytes(&gzip_bytes(b"abcdef"))),
        ResourceAttrs::new("image/png").with_transfer_encoding("gzip"),
        CursorOptions::default(),
    );
    cursor.retrieve().unwrap();
    cursor.seek(2).unwrap();
    assert_eq!(cursor.buffered(), b"cdef");
    assert_eq!(
        cursor.seek(0),
        Err(CursorError::Seek(SeekError::NotSeekable { pos: 0 }))
    );
}

#[derive(Debug)]
struct RangeRestart {
    store: StreamStore,
    accept: bool,
}

impl Restart for RangeRestart {
    fn restart_from(&self, offset: u64) -> bool {
        if self.accept {
            self.store.restart_at(offset);
        }
        self.accept
    }
}

#[rstest]
#[case::restarted(true)]
#[case::refused(false)]
fn seek_on_stream_store(_tracing_setup: (), #[case] accept: bool) {
    let store = StreamStore::new(8);
    store.append(b"abcdefghijklmnopqrst").unwrap();
    let restart = Arc::new(RangeRestart {
        store: store.clone(),
        accept,
    });
    let (mut cursor, _) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("audio/mpeg"),
        CursorOptions::default().with_restart(restart),
    );

    // Inside the retained window: no restart needed.
    cursor.seek(14).unwrap();
    cursor.retrieve().unwrap();
    assert_eq!(cursor.buffered(), b"opqrst");

    let result = cursor.seek(2);
    if accept {
        result.unwrap();
        store.append(b"cdef").unwrap();
        cursor.retrieve().unwrap();
        assert_eq!(cursor.buffered(), b"cdef");
        assert_eq!(cursor.position(), 2);
    } else {
        assert_eq!(
            result,
            Err(CursorError::Seek(SeekError::NotSeekable { pos: 2 }))
        );
    }
}

#[rstest]
#[case::raw(ResourceAttrs::new("audio/mpeg"), b"0123456789abcdef".to_vec())]
#[case::through_chain(
    ResourceAttrs::new("image/png").with_transfer_encoding("gzip"),
    gzip_bytes(b"0123456789abcdef0123456789abcdef")
)]
fn evicted_read_position_fails_with_out_of_range(
    _tracing_setup: (),
    #[case] attrs: ResourceAttrs,
    #[case] body: Vec<u8>,
) {
    let store = StreamStore::new(8);
    store.append(&body).unwrap();
    store.finish(false);
    let (mut cursor, notifier) = open(Arc::new(store), attrs, CursorOptions::default());

    assert_eq!(
        cursor.retrieve().unwrap(),
        Retrieved {
            produced: 0,
            more: false
        }
    );
    assert!(cursor.buffered().is_empty());
    assert!(cursor.is_finished());
    assert_eq!(cursor.failure(), Some(ErrorKind::OutOfRange));
    assert_eq!(
        notifier.notices(),
        vec![Notice::LoadFailed {
            kind: ErrorKind::OutOfRange
        }]
    );
    assert!(!cursor.retrieve().unwrap().more);
}

#[rstest]
fn evicted_read_position_restarts_stream_once(_tracing_setup: ()) {
    let store = StreamStore::new(8);
    store.append(b"0123456789abcdef").unwrap();
    let restart = Arc::new(RangeRestart {
        store: store.clone(),
        accept: true,
    });
    let (mut cursor, notifier) = open(
        Arc::new(store.clone()),
        ResourceAttrs::new("audio/mpeg"),
        CursorOptions::default().with_restart(restart),
    );

    let got = cursor.retrieve().unwrap();
    assert_eq!(got.produced, 0);
    assert!(got.more);
    assert_eq!(cursor.failure(), None);

    store.append(b"01234567").unwrap();
    cursor.retrieve().unwrap();
    assert_eq!(cursor.buffered(), b"01234567");
    assert_eq!(cursor.position(), 0);
    assert_eq!(notifier.count(|n| matches!(n, Notice::LoadFailed { .. })), 0);
}

#[rstest]
fn no_store_buffers_still_deliver(_tracing_setup: ()) {
    let (mut cursor, _) = open(
        Arc::new(MemStore::from_bytes(b"secret")),
        ResourceAttrs::new("image/png").with_no_store(true),
        CursorOptions::default(),
    );
    assert_eq!(drain(&mut cursor), b"secret");
}
