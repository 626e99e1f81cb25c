//! Signature header
//!
//! Every datastore file starts with a zstd skippable frame carrying the
//! signature string, followed by the compressed snapshot frame:
//!
//! ```text
//! +-------------------+-------------+-----------------+----------------------+
//! | magic (u32 LE)    | len (u32 LE)| signature bytes | zstd frame (payload) |
//! | 0x184D2A50        |             | "datastore:..." |                      |
//! +-------------------+-------------+-----------------+----------------------+
//! ```
//!
//! A skippable frame is ignored by any zstd decoder, so the file stays a valid
//! zstd stream, and the signature can be read without touching the payload.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use datastore_core::{Error, Result};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

/// Prefix prepended to every caller-supplied signature
pub const SIGNATURE_PREFIX: &str = "datastore:";

/// Recommended file extension for datastore files
pub const EXTENSION: &str = ".datastore";

/// zstd skippable frame magic used for the header
pub const HEADER_MAGIC: u32 = 0x184D_2A50;

/// Upper bound on the stored signature length
pub const MAX_SIGNATURE_LEN: usize = 64 * 1024;

/// Build the header value for a caller signature.
///
/// ```
/// assert_eq!(datastore_durability::signature("pets.v1"), "datastore:pets.v1");
/// ```
pub fn signature(signature: &str) -> String {
    format!("{}{}", SIGNATURE_PREFIX, signature)
}

/// Write the header frame.
pub fn write_header<W: Write>(writer: &mut W, signature: &str) -> Result<()> {
    let bytes = signature.as_bytes();
    if bytes.len() > MAX_SIGNATURE_LEN {
        return Err(Error::Encode(format!(
            "signature is {} bytes, limit is {}",
            bytes.len(),
            MAX_SIGNATURE_LEN
        )));
    }

    writer.write_u32::<LittleEndian>(HEADER_MAGIC)?;
    writer.write_u32::<LittleEndian>(bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Read the header frame, leaving `reader` positioned at the payload.
pub fn read_header<R: Read>(reader: &mut R) -> Result<String> {
    let magic = reader.read_u32::<LittleEndian>().map_err(header_error)?;
    if magic != HEADER_MAGIC {
        return Err(Error::Decode(format!(
            "not a datastore file: header magic {:#010x}",
            magic
        )));
    }

    let len = reader.read_u32::<LittleEndian>().map_err(header_error)? as usize;
    if len > MAX_SIGNATURE_LEN {
        return Err(Error::Decode(format!(
            "header signature length {} exceeds limit {}",
            len, MAX_SIGNATURE_LEN
        )));
    }

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).map_err(header_error)?;
    String::from_utf8(bytes).map_err(|e| Error::Decode(format!("header signature: {}", e)))
}

/// Read the signature stored in a datastore file without decoding it.
///
/// Returns the raw header value, including the `datastore:` prefix.
pub fn read_signature(path: impl AsRef<Path>) -> Result<String> {
    let file = open_existing(path.as_ref())?;
    read_header(&mut BufReader::new(file))
}

/// Open a file for reading, mapping a missing file to [`Error::NotFound`].
pub(crate) fn open_existing(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

fn header_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Decode("truncated datastore header".to_string()),
        _ => Error::Io(e),
    }
}
