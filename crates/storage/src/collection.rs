//! Typed collections
//!
//! A collection is one logical table: a map from 64-bit key to record, an
//! [`OrderedIndex`] mirroring the map's keys, an autoincrement counter, and the
//! kind tag of the records it accepts. The tag is unset until the first insert
//! (or an explicit [`Collection::set_type`]) and never changes afterwards.
//!
//! # Thread Safety
//!
//! Each collection has its own `RwLock`. Reads (lookups, scans, `keys`) share
//! it; mutations take it exclusively for the map and index update only.
//! Predicates passed to scans run under the read lock and must not call back
//! into the same collection's mutators.
//!
//! After a successful mutation the collection releases its lock and then marks
//! the owning datastore dirty via the shared [`DirtyFlag`].

use crate::dirty::DirtyFlag;
use crate::index::OrderedIndex;
use datastore_core::{Document, DynRecord, Error, KindRegistry, Record, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Serializable view of a collection, as stored in a snapshot.
///
/// The ordered index is derived from `items` and is not part of the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    /// Collection name
    pub name: String,
    /// Bound record kind, `None` if nothing was ever stored
    pub kind: Option<String>,
    /// Last key issued by the autoincrement counter
    pub next_key: u64,
    /// Encoded record bodies by key
    pub items: Vec<(u64, Vec<u8>)>,
}

struct Inner {
    kind: Option<String>,
    items: HashMap<u64, Arc<dyn DynRecord>>,
    index: OrderedIndex,
    next_key: u64,
}

impl Inner {
    /// Bind `kind` if unbound; reject a different kind.
    ///
    /// Returns `true` if this call bound the kind.
    fn bind(&mut self, kind: &str) -> Result<bool> {
        match &self.kind {
            None => {
                self.kind = Some(kind.to_string());
                Ok(true)
            }
            Some(bound) if bound == kind => Ok(false),
            Some(bound) => Err(Error::type_mismatch(bound.as_str(), kind)),
        }
    }
}

/// A single-kind table of records keyed by autoincrement identity.
pub struct Collection {
    name: String,
    inner: RwLock<Inner>,
    dirty: Arc<DirtyFlag>,
}

impl Collection {
    /// Create an empty, untyped collection reporting to `dirty`
    pub fn new(name: impl Into<String>, dirty: Arc<DirtyFlag>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner {
                kind: None,
                items: HashMap::new(),
                index: OrderedIndex::new(),
                next_key: 0,
            }),
            dirty,
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound record kind, `None` until the first insert
    pub fn kind(&self) -> Option<String> {
        self.inner.read().kind.clone()
    }

    /// Last key issued by the autoincrement counter.
    ///
    /// Keys are never reissued, so this does not go down when records are
    /// deleted.
    pub fn next_key(&self) -> u64 {
        self.inner.read().next_key
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Check if the collection holds no records
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Check if a record is stored under `key`
    pub fn contains_key(&self, key: u64) -> bool {
        self.inner.read().items.contains_key(&key)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Bind the collection to `kind`.
    ///
    /// No-op if already bound to the same kind; [`Error::TypeMismatch`] if
    /// bound to a different one.
    pub fn set_type(&self, kind: &str) -> Result<()> {
        let bound = self.inner.write().bind(kind)?;
        if bound {
            debug!(collection = %self.name, kind, "Bound collection kind");
            self.dirty.mark();
        }
        Ok(())
    }

    /// Insert or update a record.
    ///
    /// A record with identity `0` is assigned the next key, and the key is
    /// written back into `record`. A record with an existing identity
    /// overwrites whatever is stored under that key. Returns the key.
    ///
    /// Fails with [`Error::TypeMismatch`] if the collection is bound to a
    /// different kind, leaving the collection unchanged.
    pub fn upsert<T: Record>(&self, record: &mut T) -> Result<u64> {
        self.store(T::KIND, record.id(), |key| {
            record.set_id(key);
            Arc::new(record.clone()) as Arc<dyn DynRecord>
        })
    }

    /// Insert or update a type-erased record.
    ///
    /// Same contract as [`Collection::upsert`]; the record is consumed and the
    /// assigned key returned.
    pub fn upsert_boxed(&self, mut record: Box<dyn DynRecord>) -> Result<u64> {
        let kind = record.kind();
        let id = record.id();
        self.store(kind, id, move |key| {
            record.set_id(key);
            Arc::from(record)
        })
    }

    fn store<F>(&self, kind: &str, id: u64, make: F) -> Result<u64>
    where
        F: FnOnce(u64) -> Arc<dyn DynRecord>,
    {
        let key = {
            let mut inner = self.inner.write();
            inner.bind(kind)?;

            let key = if id == 0 {
                inner.next_key += 1;
                inner.next_key
            } else {
                // A caller-supplied key above the counter must not be issued again.
                inner.next_key = inner.next_key.max(id);
                id
            };

            let stored = make(key);
            inner.items.insert(key, stored);
            inner.index.insert(key);
            key
        };

        self.dirty.mark();
        Ok(key)
    }

    /// Remove the record stored under `key`.
    ///
    /// Returns `false` (a no-op, not an error) if nothing was stored there.
    pub fn delete_by_key(&self, key: u64) -> bool {
        let removed = {
            let mut inner = self.inner.write();
            let removed = inner.items.remove(&key).is_some();
            if removed {
                inner.index.remove(key);
            }
            removed
        };

        if removed {
            self.dirty.mark();
        }
        removed
    }

    /// Remove `record` from the collection.
    ///
    /// No-op for a record that was never stored (identity `0`). The record
    /// keeps its identity, so upserting it again reinserts it under the same
    /// key.
    pub fn delete<D: Document + ?Sized>(&self, record: &D) -> bool {
        match record.id() {
            0 => false,
            key => self.delete_by_key(key),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Look up a record by key.
    pub fn find_by_key(&self, key: u64) -> Option<Arc<dyn DynRecord>> {
        self.inner.read().items.get(&key).cloned()
    }

    /// Look up a record by key and clone it out as a `T`.
    ///
    /// Returns `None` if the key is absent or the record is not a `T`.
    pub fn get<T: Record>(&self, key: u64) -> Option<T> {
        let inner = self.inner.read();
        inner
            .items
            .get(&key)
            .and_then(|record| record.downcast_ref::<T>())
            .cloned()
    }

    /// Every record matching `predicate`, in ascending key order.
    ///
    /// Full scan, O(n).
    pub fn scan_all<F>(&self, mut predicate: F) -> Vec<Arc<dyn DynRecord>>
    where
        F: FnMut(&dyn DynRecord) -> bool,
    {
        let inner = self.inner.read();
        inner
            .index
            .iter()
            .filter_map(|key| inner.items.get(&key))
            .filter(|record| predicate(&***record))
            .cloned()
            .collect()
    }

    /// First record matching `predicate`, in ascending key order.
    ///
    /// Stops at the first match; O(n) worst case.
    pub fn find_first<F>(&self, mut predicate: F) -> Option<Arc<dyn DynRecord>>
    where
        F: FnMut(&dyn DynRecord) -> bool,
    {
        let inner = self.inner.read();
        let found = inner
            .index
            .iter()
            .filter_map(|key| inner.items.get(&key))
            .find(|record| predicate(&***record))
            .cloned();
        found
    }

    /// Typed [`Collection::scan_all`]: every `T` matching `predicate`.
    pub fn filter<T, F>(&self, mut predicate: F) -> Vec<T>
    where
        T: Record,
        F: FnMut(&T) -> bool,
    {
        let inner = self.inner.read();
        inner
            .index
            .iter()
            .filter_map(|key| inner.items.get(&key))
            .filter_map(|record| record.downcast_ref::<T>())
            .filter(|record| predicate(*record))
            .cloned()
            .collect()
    }

    /// Typed [`Collection::find_first`]: first `T` matching `predicate`.
    pub fn find_one<T, F>(&self, mut predicate: F) -> Option<T>
    where
        T: Record,
        F: FnMut(&T) -> bool,
    {
        let inner = self.inner.read();
        let found = inner
            .index
            .iter()
            .filter_map(|key| inner.items.get(&key))
            .filter_map(|record| record.downcast_ref::<T>())
            .find(|record| predicate(*record))
            .cloned();
        found
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<u64> {
        self.inner.read().index.as_slice().to_vec()
    }

    // ========================================================================
    // Snapshot support
    // ========================================================================

    /// Encode the collection into its snapshot form.
    ///
    /// Holds the read lock while encoding, so the state is consistent for
    /// this collection. Items are emitted in key order.
    pub fn to_state(&self) -> Result<CollectionState> {
        let inner = self.inner.read();
        let mut items = Vec::with_capacity(inner.items.len());
        for key in inner.index.iter() {
            if let Some(record) = inner.items.get(&key) {
                items.push((key, record.encode()?));
            }
        }

        Ok(CollectionState {
            name: self.name.clone(),
            kind: inner.kind.clone(),
            next_key: inner.next_key,
            items,
        })
    }

    /// Restore a collection from its snapshot form.
    ///
    /// Record bodies are decoded through `registry` using the collection's
    /// kind, and the ordered index is rebuilt from the decoded keys. Fails
    /// with [`Error::Decode`] if the kind is unregistered, a body does not
    /// decode, or a record's identity disagrees with the key it was stored
    /// under.
    pub fn from_state(
        state: CollectionState,
        registry: &KindRegistry,
        dirty: Arc<DirtyFlag>,
    ) -> Result<Self> {
        let CollectionState {
            name,
            kind,
            next_key,
            items: encoded,
        } = state;

        let mut items: HashMap<u64, Arc<dyn DynRecord>> = HashMap::with_capacity(encoded.len());
        if let Some(kind) = kind.as_deref() {
            for (key, bytes) in encoded {
                let record = registry.decode(kind, &bytes)?;
                if record.id() != key {
                    return Err(Error::Decode(format!(
                        "collection {:?}: record with identity {} stored under key {}",
                        name,
                        record.id(),
                        key
                    )));
                }
                items.insert(key, Arc::from(record));
            }
        } else if !encoded.is_empty() {
            return Err(Error::Decode(format!(
                "collection {:?} holds {} records but has no kind",
                name,
                encoded.len()
            )));
        }

        let index = OrderedIndex::from_unsorted(items.keys().copied());
        let next_key = next_key.max(index.last().unwrap_or(0));
        debug!(collection = %name, records = index.len(), "Rebuilt ordered index");

        Ok(Self {
            name,
            inner: RwLock::new(Inner {
                kind,
                items,
                index,
                next_key,
            }),
            dirty,
        })
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("kind", &inner.kind)
            .field("len", &inner.items.len())
            .field("next_key", &inner.next_key)
            .finish()
    }
}
