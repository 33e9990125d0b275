//! CBOR decoder.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Decode a payload written by [`crate::encode_framed`].
///
/// Versions newer than `max_version` are rejected; the caller gets the
/// version it actually read back so it can migrate older layouts.
///
/// # Errors
///
/// Returns an error on a short buffer, a magic mismatch, an unsupported
/// version, or an invalid payload.
pub fn decode_framed<T: DeserializeOwned>(
    magic: [u8; 4],
    max_version: u8,
    bytes: &[u8],
) -> CodecResult<(u8, T)> {
    if bytes.len() < 5 {
        return Err(CodecError::UnexpectedEof);
    }
    if bytes[..4] != magic {
        return Err(CodecError::BadMagic { expected: magic });
    }
    let version = bytes[4];
    if version == 0 || version > max_version {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            supported: max_version,
        });
    }
    let value = from_cbor(&bytes[5..])?;
    Ok((version, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_framed;
    use crate::value::Value;

    #[test]
    fn rejects_short_input() {
        let result: CodecResult<(u8, Value)> = decode_framed(*b"TEST", 1, b"TE");
        assert_eq!(result.unwrap_err(), CodecError::UnexpectedEof);
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = encode_framed(*b"TEST", 1, &Value::Null).unwrap();
        let result: CodecResult<(u8, Value)> = decode_framed(*b"NOPE", 1, &bytes);
        assert!(matches!(result, Err(CodecError::BadMagic { .. })));
    }

    #[test]
    fn rejects_future_version() {
        let bytes = encode_framed(*b"TEST", 2, &Value::Null).unwrap();
        let result: CodecResult<(u8, Value)> = decode_framed(*b"TEST", 1, &bytes);
        assert_eq!(
            result.unwrap_err(),
            CodecError::UnsupportedVersion {
                found: 2,
                supported: 1
            }
        );
    }

    #[test]
    fn rejects_garbage_payload() {
        let mut bytes = b"TEST".to_vec();
        bytes.push(1);
        bytes.extend_from_slice(&[0xff, 0xff, 0x00]);
        let result: CodecResult<(u8, Value)> = decode_framed(*b"TEST", 1, &bytes);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }
}
