//! Whole-store snapshot files
//!
//! A snapshot is the complete state of a datastore written as one unit:
//! header frame (see [`crate::header`]), then a zstd frame holding the
//! bincode-encoded [`SnapshotPayload`]. The zstd content checksum is enabled,
//! so a corrupted body fails to decode instead of loading garbage.
//!
//! ## Write protocol
//!
//! 1. Remove any stale `<path>.tmp`
//! 2. Create `<path>.tmp` exclusively and write header + compressed payload
//! 3. fsync and close the temp file
//! 4. Rename `<path>.tmp` over `<path>`
//!
//! Readers never see a partial file: until the rename, `<path>` is the old
//! snapshot. Filesystems without atomic rename are not supported.
//!
//! ## Read protocol
//!
//! The header signature is compared before any payload byte is decompressed,
//! so a mismatched file is rejected without decoding anything.

use crate::header::{open_existing, read_header, write_header};
use datastore_core::{Error, Result};
use datastore_storage::CollectionState;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Current snapshot payload format
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Default zstd compression level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Everything persisted for one datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// Payload format version
    pub format_version: u32,
    /// Every collection, in name order
    pub collections: Vec<CollectionState>,
}

impl SnapshotPayload {
    /// Create a payload at the current format version
    pub fn new(collections: Vec<CollectionState>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collections,
        }
    }

    /// Total records across all collections
    pub fn record_count(&self) -> usize {
        self.collections.iter().map(|c| c.items.len()).sum()
    }
}

/// Temp path used while writing `path`: `<path>.tmp`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes snapshot files with atomic replacement.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    compression_level: i32,
}

impl SnapshotWriter {
    /// Create a writer using the given zstd level
    pub fn new(compression_level: i32) -> Self {
        Self { compression_level }
    }

    /// Configured zstd level
    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    /// Write `payload` to `path`, replacing any existing file atomically.
    ///
    /// Returns the size of the written file. On failure the previous file at
    /// `path` is untouched and the temp file is removed.
    pub fn write(&self, path: &Path, signature: &str, payload: &SnapshotPayload) -> Result<u64> {
        let temp = temp_path(path);

        match fs::remove_file(&temp) {
            Ok(()) => debug!("Removed stale temp file {}", temp.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let result = self.write_temp(&temp, signature, payload).and_then(|size| {
            fs::rename(&temp, path)?;
            Ok(size)
        });

        if let Err(e) = &result {
            warn!("Snapshot write to {} failed: {}", path.display(), e);
            let _ = fs::remove_file(&temp);
        }
        result
    }

    fn write_temp(&self, temp: &Path, signature: &str, payload: &SnapshotPayload) -> Result<u64> {
        let file = OpenOptions::new().write(true).create_new(true).open(temp)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, signature)?;

        let mut encoder = zstd::Encoder::new(writer, self.compression_level)?;
        encoder.include_checksum(true)?;
        bincode::serialize_into(&mut encoder, payload).map_err(|e| match *e {
            bincode::ErrorKind::Io(io) => Error::Io(io),
            other => Error::Encode(other.to_string()),
        })?;

        let writer = encoder.finish()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(file.metadata()?.len())
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

/// Reads snapshot files.
pub struct SnapshotReader;

impl SnapshotReader {
    /// Read and decode the snapshot at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `path` does not exist
    /// - [`Error::SignatureMismatch`] if the header differs from
    ///   `expected_signature` (checked before decompression)
    /// - [`Error::Decode`] for a malformed header, corrupt or truncated
    ///   payload, or unsupported format version
    pub fn read(path: &Path, expected_signature: &str) -> Result<SnapshotPayload> {
        let mut reader = BufReader::new(open_existing(path)?);

        let found = read_header(&mut reader)?;
        if found != expected_signature {
            warn!(
                "Signature mismatch for {}: expected {:?}, found {:?}",
                path.display(),
                expected_signature,
                found
            );
            return Err(Error::SignatureMismatch {
                expected: expected_signature.to_string(),
                found,
            });
        }

        // Decompress the whole frame first: the content checksum is verified
        // at frame end, and decoding from a slice bounds every length prefix
        // by the bytes actually present.
        let mut decoder = zstd::Decoder::with_buffer(reader).map_err(payload_error)?;
        let mut body = Vec::new();
        decoder.read_to_end(&mut body).map_err(payload_error)?;

        let payload: SnapshotPayload =
            bincode::deserialize(&body).map_err(|e| Error::Decode(e.to_string()))?;

        if payload.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::Decode(format!(
                "unsupported snapshot format version {} (expected {})",
                payload.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(payload)
    }
}

fn payload_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof | io::ErrorKind::Other => {
            Error::Decode(format!("snapshot payload: {}", e))
        }
        _ => Error::Io(e),
    }
}
