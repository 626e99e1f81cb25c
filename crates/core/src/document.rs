//! Record capability contract
//!
//! A record is anything that can report and accept a 64-bit identity. Identity
//! `0` means "no key assigned yet"; a collection assigns the next key on the
//! first upsert and writes it back into the record.
//!
//! Three traits split the contract:
//! - [`Document`]: the identity capability itself
//! - [`Record`]: a concrete, serializable record kind with a declared tag
//! - [`DynRecord`]: the object-safe view collections store and hand back
//!
//! Every `Record` is a `DynRecord` through a blanket impl, so callers only ever
//! implement `Document` and `Record`.
//!
//! # Example
//!
//! ```
//! use datastore_core::{Document, Record};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Pet {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl Document for Pet {
//!     fn id(&self) -> u64 {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: u64) {
//!         self.id = id;
//!     }
//! }
//!
//! impl Record for Pet {
//!     const KIND: &'static str = "pet";
//! }
//! ```

use crate::codec::encode_record;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;

/// Identity capability: get and set the 64-bit primary key.
pub trait Document: fmt::Debug + Send + Sync + 'static {
    /// Primary key of this record, `0` if not yet stored
    fn id(&self) -> u64;

    /// Called by the collection when a new key is assigned
    fn set_id(&mut self, id: u64);
}

/// A concrete record kind that can be stored in a collection.
///
/// `KIND` is the type tag: a collection accepts one kind only, and the
/// registry uses the tag to pick a decoder when a snapshot is loaded. Keep it
/// stable across program versions; renaming it orphans stored data.
pub trait Record: Document + Clone + Serialize + DeserializeOwned {
    /// Type tag for this record kind
    const KIND: &'static str;
}

/// Object-safe view of a stored record.
pub trait DynRecord: Document {
    /// Type tag of the concrete record
    fn kind(&self) -> &'static str;

    /// Encode the record body with the record codec
    fn encode(&self) -> Result<Vec<u8>>;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;
}

impl<T: Record> DynRecord for T {
    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn encode(&self) -> Result<Vec<u8>> {
        encode_record(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn DynRecord {
    /// Borrow the concrete record if it is a `T`.
    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Check whether the concrete record is a `T`.
    pub fn is<T: Record>(&self) -> bool {
        self.as_any().is::<T>()
    }
}
