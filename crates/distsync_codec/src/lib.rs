//! # distsync Codec
//!
//! Field values and deterministic CBOR encoding for distsync stores.
//!
//! This crate provides:
//! - [`Value`], the dynamic field value every store returns
//! - [`FieldMap`], an ordered field-name → value map
//! - CBOR helpers ([`to_cbor`], [`from_cbor`]) and a small framing format
//!   (magic + version + payload) used by the file store
//!
//! ## Usage
//!
//! ```
//! use distsync_codec::{from_cbor, to_cbor, Value};
//!
//! let value = Value::Integer(42);
//! let bytes = to_cbor(&value).unwrap();
//! let decoded: Value = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{decode_framed, from_cbor};
pub use encoder::{encode_framed, to_cbor};
pub use error::{CodecError, CodecResult};
pub use value::{FieldMap, Value};
