//! Datastore Lifecycle Tests
//!
//! Creation, opening, collection binding, and the in-memory store.

use crate::common::*;

// ============================================================================
// Create / Open
// ============================================================================

#[test]
fn create_writes_file_immediately() {
    let (_dir, path) = temp_store_path();
    assert!(!path.exists());

    let store = Datastore::create(&path, "app.v1", registry()).expect("create");

    assert!(path.exists());
    assert!(!store.is_dirty());
    assert_eq!(store.signature(), "datastore:app.v1");
    assert_eq!(store.location(), Some(path.as_path()));
}

#[test]
fn create_in_missing_directory_fails_with_io() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("store.datastore");

    let err = Datastore::create(&path, "app.v1", registry()).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "got {:?}", err);
}

#[test]
fn open_missing_file_is_not_found() {
    let (_dir, path) = temp_store_path();

    let err = Datastore::open(&path, "app.v1", registry()).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, Error::NotFound(p) if p == path));
}

#[test]
fn open_freshly_created_store_is_empty() {
    let (_dir, path) = temp_store_path();
    Datastore::create(&path, "app.v1", registry()).unwrap();

    let store = Datastore::open(&path, "app.v1", registry()).unwrap();
    assert!(store.collection_names().is_empty());
    assert!(!store.is_dirty());
}

#[test]
fn open_or_create_creates_then_opens() {
    let (_dir, path) = temp_store_path();

    {
        let store = Datastore::open_or_create(&path, "app.v1", registry()).unwrap();
        store
            .collection("items")
            .upsert(&mut Item::named("a"))
            .unwrap();
        store.flush().unwrap();
    }

    let store = Datastore::open_or_create(&path, "app.v1", registry()).unwrap();
    assert_eq!(item_names(&store.collection("items")), vec!["a"]);
}

#[test]
fn open_or_create_does_not_replace_mismatched_file() {
    let (_dir, path) = temp_store_path();
    Datastore::create(&path, "app.v1", registry()).unwrap();

    let err = Datastore::open_or_create(&path, "app.v2", registry()).unwrap_err();
    assert!(err.is_signature_mismatch());
    assert_eq!(read_signature(&path).unwrap(), "datastore:app.v1");
}

#[test]
fn builder_applies_settings() {
    let (_dir, path) = temp_store_path();

    let store = Datastore::builder()
        .path(&path)
        .signature("app.v1")
        .compression_level(19)
        .registry(registry())
        .create()
        .unwrap();

    assert_eq!(store.config().compression_level, 19);
    assert!(store.registry().contains(Measurement::KIND));

    let reopened = Datastore::builder()
        .path(&path)
        .signature("app.v1")
        .registry(registry())
        .open()
        .unwrap();
    assert_eq!(reopened.signature(), "datastore:app.v1");
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn first_upsert_assigns_identity_one() {
    let (_dir, path) = temp_store_path();
    let store = Datastore::create(&path, "app.v1", registry()).unwrap();
    let items = store.collection("items");

    let mut a = Item::named("a");
    items.upsert(&mut a).unwrap();

    assert_eq!(a.id, 1);
    assert_eq!(items.keys(), vec![1]);
    assert!(store.is_dirty());
}

#[test]
fn deleted_keys_are_not_reused() {
    let store = Datastore::ephemeral();
    let items = store.collection("items");

    let mut a = Item::named("a");
    let mut b = Item::named("b");
    items.upsert(&mut a).unwrap();
    items.upsert(&mut b).unwrap();
    assert_eq!(b.id, 2);

    assert!(items.contains_key(1));
    items.delete_by_key(1);
    assert!(!items.contains_key(1));
    assert!(items.contains_key(2));
    assert_eq!(items.keys(), vec![2]);
    assert_eq!(items.next_key(), 2);

    let mut c = Item::named("c");
    items.upsert(&mut c).unwrap();
    assert_eq!(c.id, 3);
}

// ============================================================================
// Type binding
// ============================================================================

#[test]
fn collection_rejects_second_kind() {
    let store = Datastore::ephemeral();
    let items = store.collection("items");
    items.upsert(&mut Item::named("a")).unwrap();

    let mut m = Measurement::default();
    let err = items.upsert(&mut m).unwrap_err();

    assert!(matches!(
        err,
        Error::TypeMismatch { ref expected, ref actual } if expected == "item" && actual == "measurement"
    ));
    assert_eq!(m.id, 0);
    assert_eq!(items.keys(), vec![1]);
}

#[test]
fn init_binds_empty_collection() {
    let store = Datastore::ephemeral();
    let readings = store.init::<Measurement>("readings").unwrap();

    assert_eq!(readings.kind().as_deref(), Some("measurement"));
    assert!(readings.upsert(&mut Item::named("x")).unwrap_err().is_type_mismatch());
    assert!(store.init::<Item>("readings").unwrap_err().is_type_mismatch());
}

#[test]
fn collection_for_uses_kind_as_name() {
    let store = Datastore::ephemeral();
    store
        .collection_for::<Measurement>()
        .upsert(&mut Measurement::default())
        .unwrap();

    assert_eq!(store.collection_names(), vec!["measurement"]);
    assert_eq!(store.collection_for_type("measurement").len(), 1);
}

// ============================================================================
// Ephemeral store
// ============================================================================

#[test]
fn ephemeral_store_works_but_cannot_flush() {
    let store = Datastore::ephemeral();
    assert!(store.is_ephemeral());

    let items = store.collection("items");
    items.upsert(&mut Item::named("a")).unwrap();
    assert_eq!(items.len(), 1);

    assert!(matches!(store.flush(), Err(Error::NotPersistable)));
}

#[test]
fn ephemeral_stores_are_isolated() {
    {
        let store = Datastore::ephemeral();
        store.collection("items").upsert(&mut Item::named("a")).unwrap();
    }

    let store = Datastore::ephemeral();
    assert!(store.collection("items").is_empty());
}
