use std::{sync::Arc, thread, time::Duration};

use rstest::rstest;
use weft_storage::{ByteStore, MemStore, StoreHandle, StoreKind, StoreStatus, StreamStore};

fn memory() -> StoreHandle {
    Arc::new(MemStore::new())
}

fn random_access() -> StoreHandle {
    Arc::new(MemStore::random_access())
}

fn stream() -> StoreHandle {
    Arc::new(StreamStore::new(1024))
}

#[rstest]
#[case::memory(memory(), StoreKind::Memory)]
#[case::random_access(random_access(), StoreKind::RandomAccess)]
#[case::stream(stream(), StoreKind::Stream)]
fn every_store_appends_reads_and_finishes(#[case] store: StoreHandle, #[case] kind: StoreKind) {
    assert_eq!(store.kind(), kind);
    assert!(store.is_empty());

    store.append(b"first,").unwrap();
    store.append(b"second").unwrap();
    assert_eq!(store.len(), 12);
    assert_eq!(&store.read(0..12)[..], b"first,second");

    store.finish(false);
    assert_eq!(store.status(), StoreStatus::Complete);
    assert!(store.append(b"x").is_err());
}

#[rstest]
#[case::memory(memory())]
#[case::random_access(random_access())]
#[case::stream(stream())]
fn coverage_reports_unknown_tail_as_zero_skip(#[case] store: StoreHandle) {
    store.append(b"abc").unwrap();
    let avail = store.coverage(3, 10);
    assert!(!avail.available);
    assert_eq!(avail.len, 0);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
fn reader_sees_bytes_written_by_another_thread() {
    let store = MemStore::new();
    let writer = store.clone();

    let handle = thread::spawn(move || {
        for chunk in [b"aa".as_slice(), b"bb", b"cc"] {
            writer.append(chunk).unwrap();
        }
        writer.finish(false);
    });
    handle.join().unwrap();

    assert!(store.is_finished());
    assert_eq!(&store.read(0..6)[..], b"aabbcc");
}

#[test]
fn partial_read_on_random_access_stops_at_gap() {
    let store = MemStore::random_access();
    store.write_at(0, b"0123").unwrap();
    store.write_at(8, b"89").unwrap();
    assert_eq!(&store.read(2..10)[..], b"23");
    assert_eq!(&store.read(8..64)[..], b"89");
    assert!(store.read(4..8).is_empty());
}
