//! Storage layer for the datastore
//!
//! This crate implements the in-memory side of the store:
//! - OrderedIndex: sorted, duplicate-free key index
//! - Collection: RwLock-guarded map of records plus its index and counter
//! - CollectionState: the serializable form of a collection
//! - DirtyFlag: unflushed-mutation tracking shared with the datastore

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod dirty;
pub mod index;

pub use collection::{Collection, CollectionState};
pub use dirty::DirtyFlag;
pub use index::OrderedIndex;
