//! Durability layer for the datastore
//!
//! This crate owns the on-disk snapshot format:
//! - Header: zstd skippable frame carrying the `datastore:` signature
//! - Payload: bincode-encoded collections in a checksummed zstd frame
//! - Writes go to `<path>.tmp` and are renamed over `<path>`
//! - Reads check the signature before decompressing anything

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod header;
pub mod snapshot;

pub use header::{read_signature, signature, EXTENSION, SIGNATURE_PREFIX};
pub use snapshot::{
    temp_path, SnapshotPayload, SnapshotReader, SnapshotWriter, DEFAULT_COMPRESSION_LEVEL,
    SNAPSHOT_FORMAT_VERSION,
};
