#![forbid(unsafe_code)]

use std::{sync::Arc, time::Duration};

use rstest::rstest;
use weft::{
    events::{CacheEvent, PartEvent},
    prelude::*,
};
use weft_test_utils::{MultipartBuilder, RecordingNotifier, gzip_bytes, tracing_setup};

#[rstest]
fn gzip_page_through_facade(_tracing_setup: ()) {
    let page = b"<!DOCTYPE html><p>facade</p>";
    let resource =
        Resource::new(ResourceAttrs::new("text/html").with_transfer_encoding("gzip"));
    let mut rx = resource.subscribe();

    for piece in gzip_bytes(page).chunks(5) {
        resource.write(piece).unwrap();
    }
    resource.flush().unwrap();
    resource.finish();

    let mut cursor = resource.cursor(RecordingNotifier::new()).unwrap();
    assert!(!cursor.retrieve().unwrap().more);
    assert_eq!(cursor.buffered(), page);

    let mut raw = resource.raw_cursor(Arc::new(NullNotifier)).unwrap();
    assert!(raw.is_raw_mode());
    raw.retrieve().unwrap();
    assert_eq!(raw.buffered(), page);

    let mut saw_decision = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, Event::Cache(CacheEvent::DecisionMade { .. })) {
            saw_decision = true;
        }
    }
    assert!(saw_decision);
}

#[rstest]
fn abort_drops_pending_decode(_tracing_setup: ()) {
    let resource =
        Resource::new(ResourceAttrs::new("text/plain").with_transfer_encoding("gzip"));
    resource.write(&gzip_bytes(b"never decoded")).unwrap();
    resource.abort();
    assert!(resource.store().is_finished());
    assert!(!resource.decorator().has_temp());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn multipart_parts_share_the_bus(_tracing_setup: ()) {
    let body = MultipartBuilder::new("sep")
        .part(&[("Content-Type", "text/plain")], b"one")
        .part(&[("Content-Type", "text/plain")], b"two");
    let resource = Resource::new(ResourceAttrs::new(body.content_type("mixed")));
    let mut rx = resource.subscribe();
    resource.write(&body.build()).unwrap();
    resource.finish();

    let mut parts = resource.multipart(RecordingNotifier::new()).unwrap();
    while parts.retrieve().unwrap().more {}

    let bodies: Vec<Vec<u8>> = parts.parts().iter().map(|p| p.store().to_vec()).collect();
    assert_eq!(bodies, vec![b"one".to_vec(), b"two".to_vec()]);

    let finished = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|e| matches!(e, Event::Part(PartEvent::Finished { .. })))
        .count();
    assert_eq!(finished, 2);
}
