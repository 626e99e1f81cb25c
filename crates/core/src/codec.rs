//! Record codec
//!
//! Record bodies are bincode-encoded. The codec is opaque to the rest of the
//! system: collections hand it a record and get bytes back, the registry hands
//! it bytes and a target type.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a record body.
pub fn encode_record<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>> {
    bincode::serialize(record).map_err(|e| Error::Encode(e.to_string()))
}

/// Decode a record body into `T`.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Decode(e.to_string()))
}
