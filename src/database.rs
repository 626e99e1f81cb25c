//! Main entry point for the datastore.
//!
//! This module provides the `Datastore` struct, which owns the collections,
//! the dirty flag, and the backing snapshot file.

use datastore_core::{Error, KindRegistry, Record, Result};
use datastore_durability::{
    signature, SnapshotPayload, SnapshotReader, SnapshotWriter, DEFAULT_COMPRESSION_LEVEL,
};
use datastore_storage::{Collection, DirtyFlag};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tunables for a datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreConfig {
    /// zstd level used when writing snapshots
    pub compression_level: i32,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// An embedded store of typed collections, persisted as a single snapshot
/// file.
///
/// All operations except [`Datastore::open`] and [`Datastore::flush`] work in
/// memory. Mutations mark the store dirty; `flush` writes the whole store to
/// `<path>.tmp` and renames it over `<path>`.
///
/// # Example
///
/// ```
/// use datastore::prelude::*;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Pet {
///     id: u64,
///     name: String,
/// }
///
/// impl Document for Pet {
///     fn id(&self) -> u64 {
///         self.id
///     }
///
///     fn set_id(&mut self, id: u64) {
///         self.id = id;
///     }
/// }
///
/// impl Record for Pet {
///     const KIND: &'static str = "pet";
/// }
///
/// # fn main() -> datastore::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join(format!("pets{}", datastore::EXTENSION));
/// let registry = KindRegistry::new().with::<Pet>();
///
/// let store = Datastore::create(&path, "pets.v1", registry.clone())?;
/// let mut pet = Pet { id: 0, name: "Chomper".to_string() };
/// store.collection("pets").upsert(&mut pet)?;
/// assert_eq!(pet.id, 1);
/// store.flush()?;
///
/// let reopened = Datastore::open(&path, "pets.v1", registry)?;
/// let chomper = reopened.collection("pets").get::<Pet>(1).unwrap();
/// assert_eq!(chomper.name, "Chomper");
/// # Ok(())
/// # }
/// ```
pub struct Datastore {
    /// Backing file, `None` for an ephemeral store
    path: Option<PathBuf>,

    /// Header value, always carries the `datastore:` prefix
    signature: String,

    config: DatastoreConfig,

    /// Decoders for the record kinds this store can load
    registry: KindRegistry,

    collections: RwLock<BTreeMap<String, Arc<Collection>>>,

    /// Dirty flag and flush lock, shared with every collection
    dirty: Arc<DirtyFlag>,
}

impl Datastore {
    /// Create a builder for datastore configuration.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use datastore::prelude::*;
    ///
    /// # fn main() -> datastore::Result<()> {
    /// let store = Datastore::builder()
    ///     .path("./pets.datastore")
    ///     .signature("pets.v1")
    ///     .compression_level(9)
    ///     .open_or_create()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> DatastoreBuilder {
        DatastoreBuilder::new()
    }

    /// Create a store at `path`, replacing any existing file.
    ///
    /// The empty store is flushed immediately so an unwritable path fails
    /// here rather than on the first `flush`.
    pub fn create(
        path: impl AsRef<Path>,
        signature: &str,
        registry: KindRegistry,
    ) -> Result<Self> {
        Self::builder()
            .path(path)
            .signature(signature)
            .registry(registry)
            .create()
    }

    /// Open an existing store.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `path` does not exist
    /// - [`Error::SignatureMismatch`] if the file was written with another
    ///   signature; `found` carries the on-disk value
    /// - [`Error::Decode`] if the payload or any record cannot be decoded,
    ///   including records of a kind missing from `registry`
    pub fn open(path: impl AsRef<Path>, signature: &str, registry: KindRegistry) -> Result<Self> {
        Self::builder()
            .path(path)
            .signature(signature)
            .registry(registry)
            .open()
    }

    /// Open the store at `path`, creating it if the file does not exist.
    pub fn open_or_create(
        path: impl AsRef<Path>,
        signature: &str,
        registry: KindRegistry,
    ) -> Result<Self> {
        Self::builder()
            .path(path)
            .signature(signature)
            .registry(registry)
            .open_or_create()
    }

    /// Create an in-memory store with no backing file.
    ///
    /// Collections work normally, but [`Datastore::flush`] always fails with
    /// [`Error::NotPersistable`] and the data is gone when the store is
    /// dropped.
    pub fn ephemeral() -> Self {
        Self::builder().ephemeral()
    }

    fn new(
        path: Option<PathBuf>,
        signature: String,
        registry: KindRegistry,
        config: DatastoreConfig,
    ) -> Self {
        Self {
            path,
            signature,
            config,
            registry,
            collections: RwLock::new(BTreeMap::new()),
            dirty: Arc::new(DirtyFlag::new()),
        }
    }

    fn load(
        path: PathBuf,
        signature: String,
        registry: KindRegistry,
        config: DatastoreConfig,
    ) -> Result<Self> {
        let payload = SnapshotReader::read(&path, &signature)?;
        let record_count = payload.record_count();

        let store = Self::new(Some(path), signature, registry, config);
        {
            let mut collections = store.collections.write();
            for state in payload.collections {
                let collection =
                    Collection::from_state(state, &store.registry, Arc::clone(&store.dirty))?;
                let name = collection.name().to_string();
                if collections.insert(name.clone(), Arc::new(collection)).is_some() {
                    return Err(Error::Decode(format!(
                        "snapshot contains collection {:?} twice",
                        name
                    )));
                }
            }

            info!(
                "Opened datastore {} ({} collections, {} records)",
                store.location_display(),
                collections.len(),
                record_count
            );
        }

        Ok(store)
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Get the collection called `name`, creating an empty untyped one if it
    /// does not exist.
    ///
    /// Creating a collection does not mark the store dirty; it is persisted
    /// with the next flush that something else triggers.
    pub fn collection(&self, name: &str) -> Arc<Collection> {
        if let Some(collection) = self.collections.read().get(name) {
            return Arc::clone(collection);
        }

        let mut collections = self.collections.write();
        let collection = collections.entry(name.to_string()).or_insert_with(|| {
            debug!(collection = name, "Created collection");
            Arc::new(Collection::new(name, Arc::clone(&self.dirty)))
        });
        Arc::clone(collection)
    }

    /// Collection named after `T`'s kind tag.
    pub fn collection_for<T: Record>(&self) -> Arc<Collection> {
        self.collection(T::KIND)
    }

    /// Collection named after `kind`.
    pub fn collection_for_type(&self, kind: &str) -> Arc<Collection> {
        self.collection(kind)
    }

    /// Get the collection called `name` and bind it to `T`'s kind.
    ///
    /// Fails with [`Error::TypeMismatch`] if the collection already holds
    /// another kind.
    pub fn init<T: Record>(&self, name: &str) -> Result<Arc<Collection>> {
        self.init_kind(name, T::KIND)
    }

    /// Untyped form of [`Datastore::init`].
    pub fn init_kind(&self, name: &str, kind: &str) -> Result<Arc<Collection>> {
        let collection = self.collection(name);
        collection.set_type(kind)?;
        Ok(collection)
    }

    /// Names of all collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write all changes to disk.
    ///
    /// No-op if nothing changed since the last successful flush. On failure
    /// the previous file is left intact and the store stays dirty, so the
    /// flush can be retried.
    ///
    /// Mutations that race with a flush either make it into the written
    /// snapshot or leave the store dirty afterwards.
    pub fn flush(&self) -> Result<()> {
        self.flush_snapshot(false)
    }

    fn flush_snapshot(&self, force: bool) -> Result<()> {
        let path = self.path.as_deref().ok_or(Error::NotPersistable)?;

        let mut dirty = self.dirty.lock();
        if !*dirty && !force {
            debug!("Flush of {} skipped: no changes", path.display());
            return Ok(());
        }

        // Cleared before the snapshot is taken: a mutator blocked on the flag
        // sets it again once this flush releases it.
        *dirty = false;

        let writer = SnapshotWriter::new(self.config.compression_level);
        let result = self.snapshot().and_then(|payload| {
            writer
                .write(path, &self.signature, &payload)
                .map(|bytes| (payload, bytes))
        });

        match result {
            Ok((payload, bytes)) => {
                info!(
                    "Flushed datastore {} ({} collections, {} records, {} bytes, zstd level {})",
                    path.display(),
                    payload.collections.len(),
                    payload.record_count(),
                    bytes,
                    writer.compression_level()
                );
                Ok(())
            }
            Err(e) => {
                *dirty = true;
                warn!("Flush of {} failed, store stays dirty: {}", path.display(), e);
                Err(e)
            }
        }
    }

    fn snapshot(&self) -> Result<SnapshotPayload> {
        let collections = self.collections.read();
        let states = collections
            .values()
            .map(|collection| collection.to_state())
            .collect::<Result<Vec<_>>>()?;
        Ok(SnapshotPayload::new(states))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Header signature, including the `datastore:` prefix
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Backing file path, `None` for an ephemeral store.
    ///
    /// The path is returned as given, without canonicalization.
    pub fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if there are unflushed changes
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    /// Check if this store has no backing file
    pub fn is_ephemeral(&self) -> bool {
        self.path.is_none()
    }

    /// Registry used to decode records on open
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    fn location_display(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "<ephemeral>".to_string(),
        }
    }
}

impl fmt::Debug for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datastore")
            .field("location", &self.location_display())
            .field("signature", &self.signature)
            .field("collections", &self.collection_names())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Builder for datastore configuration.
///
/// # Example
///
/// ```no_run
/// use datastore::prelude::*;
///
/// # fn main() -> datastore::Result<()> {
/// // Disk-backed, opened if present
/// let store = Datastore::builder()
///     .path("./app.datastore")
///     .signature("app.v1")
///     .open_or_create()?;
///
/// // Unit testing: nothing on disk
/// let scratch = Datastore::builder().ephemeral();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatastoreBuilder {
    path: Option<PathBuf>,
    signature: String,
    registry: KindRegistry,
    config: DatastoreConfig,
}

impl DatastoreBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing file path.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the caller signature. The `datastore:` prefix is added for you.
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Set the registry used to decode records on open.
    pub fn registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the zstd level used when writing snapshots.
    pub fn compression_level(mut self, level: i32) -> Self {
        self.config.compression_level = level;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DatastoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a new store at the configured path and write it immediately.
    ///
    /// Fails with [`Error::NotPersistable`] if no path was set.
    pub fn create(self) -> Result<Datastore> {
        let path = self.path.ok_or(Error::NotPersistable)?;
        let store = Datastore::new(
            Some(path),
            signature(&self.signature),
            self.registry,
            self.config,
        );
        store.flush_snapshot(true)?;
        info!("Created datastore {}", store.location_display());
        Ok(store)
    }

    /// Open the store at the configured path.
    ///
    /// Fails with [`Error::NotPersistable`] if no path was set.
    pub fn open(self) -> Result<Datastore> {
        let path = self.path.ok_or(Error::NotPersistable)?;
        Datastore::load(path, signature(&self.signature), self.registry, self.config)
    }

    /// Open the store at the configured path, or create it if missing.
    pub fn open_or_create(self) -> Result<Datastore> {
        match self.clone().open() {
            Err(e) if e.is_not_found() => {
                debug!("No datastore found, creating a new one");
                self.create()
            }
            other => other,
        }
    }

    /// Build an in-memory store, ignoring any configured path.
    pub fn ephemeral(self) -> Datastore {
        Datastore::new(
            None,
            signature(&self.signature),
            self.registry,
            self.config,
        )
    }
}
