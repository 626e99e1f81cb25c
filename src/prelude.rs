//! Convenient imports for the datastore.
//!
//! ```ignore
//! use datastore::prelude::*;
//!
//! let store = Datastore::ephemeral();
//! store.collection("pets").upsert(&mut pet)?;
//! ```

// Main entry point
pub use crate::database::{Datastore, DatastoreBuilder, DatastoreConfig};

// Error handling
pub use crate::{Error, Result};

// Record contract
pub use crate::{Collection, Document, DynRecord, KindRegistry, Record};
