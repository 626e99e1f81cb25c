//! Core types for the datastore
//!
//! This crate defines the pieces every other layer builds on:
//! - [`Error`] / [`Result`]: the single error type surfaced to callers
//! - [`Document`] / [`Record`] / [`DynRecord`]: the record capability contract
//! - [`KindRegistry`]: the explicit registry of decodable record kinds
//! - [`codec`]: the bincode record codec

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod document;
pub mod error;
pub mod registry;

pub use codec::{decode_record, encode_record};
pub use document::{Document, DynRecord, Record};
pub use error::{Error, Result};
pub use registry::KindRegistry;
