//! # Datastore
//!
//! Embedded, snapshot-persisted document store for typed records.
//!
//! Records live in named collections, one record kind per collection, keyed
//! by an autoincrement `u64` identity. Everything happens in memory; `flush`
//! writes the whole store to a single zstd-compressed file with an atomic
//! rename, and `open` loads it back.
//!
//! ## Quick Start
//!
//! ```ignore
//! use datastore::prelude::*;
//!
//! let registry = KindRegistry::new().with::<Pet>();
//! let store = Datastore::open_or_create("./pets.datastore", "pets.v1", registry)?;
//!
//! let mut pet = Pet { id: 0, name: "Chomper".into() };
//! store.collection("pets").upsert(&mut pet)?;   // pet.id is now 1
//!
//! let chompers: Vec<Pet> = store.collection("pets").filter(|p: &Pet| p.name == "Chomper");
//! store.flush()?;
//! ```
//!
//! ## Layers
//!
//! - [`datastore_core`]: errors, the record contract, the kind registry
//! - [`datastore_storage`]: ordered key index and collections
//! - [`datastore_durability`]: snapshot file format
//!
//! ## Limitations
//!
//! The dataset must fit in memory. One `Datastore` owns its file; sharing a
//! file between processes or instances is not supported and not detected.

#![warn(missing_docs)]

mod database;

pub mod prelude;

// Re-export main entry points
pub use database::{Datastore, DatastoreBuilder, DatastoreConfig};

// Re-export the layers
pub use datastore_core::{Document, DynRecord, Error, KindRegistry, Record, Result};
pub use datastore_durability::{read_signature, signature, EXTENSION, SIGNATURE_PREFIX};
pub use datastore_storage::{Collection, OrderedIndex};
