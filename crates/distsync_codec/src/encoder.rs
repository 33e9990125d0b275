//! Deterministic CBOR encoder.

use crate::error::{CodecError, CodecResult};
use serde::Serialize;

/// Encode any serializable value to CBOR bytes.
///
/// Output is deterministic as long as the input only uses ordered
/// collections (`Vec`, `BTreeMap`), which is the case for every type this
/// workspace persists.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Encode a value behind a 4-byte magic and a 1-byte format version.
///
/// Layout: `magic (4) | version (1) | CBOR payload`.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encode_framed<T: Serialize + ?Sized>(
    magic: [u8; 4],
    version: u8,
    value: &T,
) -> CodecResult<Vec<u8>> {
    let payload = to_cbor(value)?;
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.extend_from_slice(&magic);
    out.push(version);
    out.extend_from_slice(&payload);
    Ok(out)
}
