//! Persistence Tests
//!
//! Flush/open round trips, idempotent flush, failure handling, and the
//! signature gate.

use crate::common::*;
use std::fs;

fn reopen(path: &std::path::Path) -> Datastore {
    Datastore::open(path, "app.v1", registry()).expect("reopen")
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn flushed_record_is_found_after_reopen() {
    let (_dir, path) = temp_store_path();
    {
        let store = Datastore::create(&path, "app.v1", registry()).unwrap();
        let items = store.collection("items");
        items.upsert(&mut Item::named("a")).unwrap();
        items.upsert(&mut Item::named("b")).unwrap();
        items.delete_by_key(1);
        store.flush().unwrap();
    }

    let store = reopen(&path);
    let items = store.collection("items");
    let b = items.find_by_key(2).expect("record 2");
    assert_eq!(b.id(), 2);
    assert_eq!(b.downcast_ref::<Item>().map(|i| i.name.as_str()), Some("b"));
    assert!(items.find_by_key(1).is_none());
    assert!(!store.is_dirty());
}

#[test]
fn round_trip_preserves_everything() {
    let (_dir, path) = temp_store_path();
    let (expected_items, expected_readings) = {
        let store = Datastore::create(&path, "app.v1", registry()).unwrap();

        let items = store.collection("items");
        for name in ["apple", "banana", "cherry", "date"] {
            items.upsert(&mut Item::named(name)).unwrap();
        }
        items.delete_by_key(2);

        let readings = store.collection("readings");
        let mut m = Measurement {
            id: 0,
            sensor: "thermo".to_string(),
            readings: vec![20.5, 21.0, -3.25],
        };
        readings.upsert(&mut m).unwrap();

        store.init::<Item>("unused").unwrap();
        store.flush().unwrap();

        (
            items.filter(|_: &Item| true),
            readings.filter(|_: &Measurement| true),
        )
    };

    let store = reopen(&path);
    assert_eq!(store.collection_names(), vec!["items", "readings", "unused"]);

    let items = store.collection("items");
    assert_eq!(items.kind().as_deref(), Some("item"));
    assert_eq!(items.keys(), vec![1, 3, 4]);
    assert_eq!(items.next_key(), 4);
    assert_eq!(items.filter(|_: &Item| true), expected_items);

    let readings = store.collection("readings");
    assert_eq!(readings.kind().as_deref(), Some("measurement"));
    assert_eq!(readings.filter(|_: &Measurement| true), expected_readings);

    let unused = store.collection("unused");
    assert!(unused.is_empty());
    assert_eq!(unused.kind().as_deref(), Some("item"));
}

#[test]
fn counter_survives_reopen_after_deleting_tail() {
    let (_dir, path) = temp_store_path();
    {
        let store = Datastore::create(&path, "app.v1", registry()).unwrap();
        let items = store.collection("items");
        for name in ["a", "b", "c"] {
            items.upsert(&mut Item::named(name)).unwrap();
        }
        items.delete_by_key(3);
        store.flush().unwrap();
    }

    let store = reopen(&path);
    let mut d = Item::named("d");
    store.collection("items").upsert(&mut d).unwrap();
    assert_eq!(d.id, 4);
}

#[test]
fn reinserted_record_keeps_sorted_position_after_reopen() {
    let (_dir, path) = temp_store_path();
    {
        let store = Datastore::create(&path, "app.v1", registry()).unwrap();
        let items = store.collection("items");
        let mut records: Vec<Item> = ["a", "b", "c"].iter().map(|n| Item::named(n)).collect();
        for record in records.iter_mut() {
            items.upsert(record).unwrap();
        }

        let mut a = records[0].clone();
        items.delete(&a);
        a.name = "a again".to_string();
        items.upsert(&mut a).unwrap();
        store.flush().unwrap();
    }

    let store = reopen(&path);
    let items = store.collection("items");
    assert_eq!(items.keys(), vec![1, 2, 3]);
    assert_eq!(item_names(&items), vec!["a again", "b", "c"]);
}

// ============================================================================
// Flush semantics
// ============================================================================

#[test]
fn flush_without_changes_does_no_io() {
    let (_dir, path) = temp_store_path();
    let store = Datastore::create(&path, "app.v1", registry()).unwrap();
    store.collection("items").upsert(&mut Item::named("a")).unwrap();

    store.flush().unwrap();
    fs::remove_file(&path).unwrap();

    // Nothing changed, so nothing is written.
    store.flush().unwrap();
    assert!(!path.exists());

    store.collection("items").upsert(&mut Item::named("b")).unwrap();
    store.flush().unwrap();
    assert!(path.exists());
    assert_eq!(reopen(&path).collection("items").len(), 2);
}

#[test]
fn failed_type_check_does_not_dirty_store() {
    let (_dir, path) = temp_store_path();
    let store = Datastore::create(&path, "app.v1", registry()).unwrap();
    store.init::<Item>("items").unwrap();
    store.flush().unwrap();

    let err = store
        .collection("items")
        .upsert(&mut Measurement::default())
        .unwrap_err();
    assert!(err.is_type_mismatch());
    assert!(!store.is_dirty());
}

#[test]
fn failed_flush_keeps_old_file_and_dirty_flag() {
    let (_dir, path) = temp_store_path();
    let store = Datastore::create(&path, "app.v1", registry()).unwrap();
    store.collection("items").upsert(&mut Item::named("a")).unwrap();
    store.flush().unwrap();
    let before = fs::read(&path).unwrap();

    store.collection("items").upsert(&mut Item::named("b")).unwrap();

    // A directory on the temp path cannot be cleared, so the write fails.
    let temp = datastore_durability::temp_path(&path);
    fs::create_dir(&temp).unwrap();
    fs::write(temp.join("blocker"), b"x").unwrap();

    let err = store.flush().unwrap_err();
    assert!(matches!(err, Error::Io(_)), "got {:?}", err);
    assert!(store.is_dirty());
    assert_eq!(fs::read(&path).unwrap(), before);

    // Retry once the obstacle is gone.
    fs::remove_dir_all(&temp).unwrap();
    store.flush().unwrap();
    assert!(!store.is_dirty());
    assert_eq!(reopen(&path).collection("items").len(), 2);
}

#[test]
fn stale_temp_file_is_replaced() {
    let (_dir, path) = temp_store_path();
    let store = Datastore::create(&path, "app.v1", registry()).unwrap();

    let temp = datastore_durability::temp_path(&path);
    fs::write(&temp, b"left behind by a crash").unwrap();

    store.collection("items").upsert(&mut Item::named("a")).unwrap();
    store.flush().unwrap();

    assert!(!temp.exists());
    assert_eq!(reopen(&path).collection("items").len(), 1);
}

// ============================================================================
// Signature gate
// ============================================================================

#[test]
fn wrong_signature_is_rejected_with_found_value() {
    let (_dir, path) = temp_store_path();
    {
        let store = Datastore::create(&path, "app.v1", registry()).unwrap();
        store.collection("items").upsert(&mut Item::named("a")).unwrap();
        store.flush().unwrap();
    }
    let before = fs::read(&path).unwrap();

    let err = Datastore::open(&path, "app.v2", registry()).unwrap_err();
    match err {
        Error::SignatureMismatch { expected, found } => {
            assert_eq!(expected, "datastore:app.v2");
            assert_eq!(found, "datastore:app.v1");
        }
        other => panic!("expected SignatureMismatch, got {:?}", other),
    }

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn read_signature_probes_header_only() {
    let (_dir, path) = temp_store_path();
    Datastore::create(&path, "inventory.v3", registry()).unwrap();

    assert_eq!(read_signature(&path).unwrap(), "datastore:inventory.v3");
    assert_eq!(signature("inventory.v3"), "datastore:inventory.v3");
}

#[test]
fn read_signature_of_missing_file_is_not_found() {
    let (_dir, path) = temp_store_path();
    assert!(read_signature(&path).unwrap_err().is_not_found());
}

// ============================================================================
// Decode failures
// ============================================================================

#[test]
fn unregistered_kind_fails_open() {
    let (_dir, path) = temp_store_path();
    {
        let store = Datastore::create(&path, "app.v1", registry()).unwrap();
        store.collection("items").upsert(&mut Item::named("a")).unwrap();
        store.flush().unwrap();
    }

    let only_measurements = KindRegistry::new().with::<Measurement>();
    let err = Datastore::open(&path, "app.v1", only_measurements).unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "got {:?}", err);
}

#[test]
fn empty_typed_collection_opens_without_registered_kind() {
    let (_dir, path) = temp_store_path();
    {
        let store = Datastore::create(&path, "app.v1", registry()).unwrap();
        store.init::<Item>("items").unwrap();
        store.flush().unwrap();
    }

    let store = Datastore::open(&path, "app.v1", KindRegistry::new()).unwrap();
    assert_eq!(store.collection("items").kind().as_deref(), Some("item"));
}

#[test]
fn corrupted_file_fails_open() {
    let (_dir, path) = temp_store_path();
    {
        let store = Datastore::create(&path, "app.v1", registry()).unwrap();
        let items = store.collection("items");
        for i in 0..50 {
            items.upsert(&mut Item::named(&format!("item-{}", i))).unwrap();
        }
        store.flush().unwrap();
    }

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = Datastore::open(&path, "app.v1", registry()).unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "got {:?}", err);
}

#[test]
fn non_datastore_file_fails_open() {
    let (_dir, path) = temp_store_path();
    fs::write(&path, b"plain text, not a datastore").unwrap();

    let err = Datastore::open(&path, "app.v1", registry()).unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "got {:?}", err);
}
