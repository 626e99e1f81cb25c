//! Error types for datastore operations.
//!
//! Every layer (collections, snapshot format, the datastore itself) reports
//! failures through this one enum. Nothing is retried internally; errors are
//! returned to the caller as-is.

use std::path::PathBuf;
use thiserror::Error;

/// All datastore errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A collection bound to one record kind was handed a document of another
    #[error("type mismatch: collection holds {expected} but document is {actual}")]
    TypeMismatch {
        /// Kind the collection is bound to
        expected: String,
        /// Kind of the rejected document
        actual: String,
    },

    /// The file header signature does not match the expected signature
    ///
    /// `found` is the raw header value, including the `datastore:` prefix.
    #[error("signature mismatch: expected {expected:?}, found {found:?}")]
    SignatureMismatch {
        /// Signature the caller asked for
        expected: String,
        /// Signature stored on disk
        found: String,
    },

    /// The datastore file does not exist
    #[error("datastore not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Underlying read/write/rename failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot payload or record body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// A record could not be encoded
    #[error("encode error: {0}")]
    Encode(String),

    /// Flush was called on a datastore with no backing file
    #[error("datastore is in-memory only and cannot be flushed")]
    NotPersistable,
}

/// Result type for datastore operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a `TypeMismatch` from the bound and offered kinds.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a type mismatch.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Error::TypeMismatch { .. })
    }

    /// Check if this is a signature mismatch.
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Error::SignatureMismatch { .. })
    }
}
