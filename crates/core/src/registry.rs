//! Registry of decodable record kinds
//!
//! A snapshot stores record bodies as opaque bytes tagged by their
//! collection's kind. To turn them back into records, `open` needs a map from
//! kind tag to decoder. The registry is built by the caller and passed in
//! explicitly; there is no process-wide registration.
//!
//! ```ignore
//! let registry = KindRegistry::new().with::<Pet>().with::<Owner>();
//! let ds = Datastore::open("pets.datastore", "pets.v1", registry)?;
//! ```

use crate::codec::decode_record;
use crate::document::{DynRecord, Record};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Decoder for one record kind.
pub type Decoder = fn(&[u8]) -> Result<Box<dyn DynRecord>>;

fn decode_boxed<T: Record>(bytes: &[u8]) -> Result<Box<dyn DynRecord>> {
    let record: T = decode_record(bytes)?;
    Ok(Box::new(record))
}

/// Map from kind tag to decoder.
#[derive(Clone, Default)]
pub struct KindRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl KindRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, builder style
    pub fn with<T: Record>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Register `T`
    ///
    /// Registering the same kind twice replaces the earlier decoder.
    pub fn register<T: Record>(&mut self) {
        self.decoders.insert(T::KIND, decode_boxed::<T>);
    }

    /// Check whether a kind tag is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.decoders.contains_key(kind)
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Check if no kinds are registered
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode a record body of the given kind.
    ///
    /// Fails with [`Error::Decode`] if the kind is not registered or the
    /// bytes do not decode.
    pub fn decode(&self, kind: &str, bytes: &[u8]) -> Result<Box<dyn DynRecord>> {
        let decoder = self
            .decoders
            .get(kind)
            .ok_or_else(|| Error::Decode(format!("unregistered record kind {:?}", kind)))?;
        decoder(bytes)
    }
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.decoders.keys().collect();
        kinds.sort();
        f.debug_struct("KindRegistry").field("kinds", &kinds).finish()
    }
}
