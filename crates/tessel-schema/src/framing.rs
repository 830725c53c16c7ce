//! Size-prefixed framing of binary artifacts.
//!
//! A framed binary is laid out as follows (all integers little-endian):
//!
//! ```text
//! [u32 length of everything that follows][4-byte identifier][32-byte SHA-256 digest of the payload][payload]
//! ```
//!
//! where the payload is the protobuf encoding of a [`Binary`]. The digest makes any corruption of the payload
//! detectable before decoding.

use prost::Message;
use sha2::{Digest, Sha256};

use crate::binary::Binary;
use crate::errors::SchemaError;
use crate::verifier::verify_binary;

/// File identifier of framed binaries.
pub const BINARY_IDENTIFIER: [u8; 4] = *b"TTNB";

const PREFIX_SIZE: usize = 4;
const DIGEST_SIZE: usize = 32;
const HEADER_SIZE: usize = PREFIX_SIZE + BINARY_IDENTIFIER.len() + DIGEST_SIZE;

/// Encodes and frames the provided [`Binary`]. Fails if the framed binary does not fit in a `u32` size prefix.
pub fn finish_size_prefixed(binary: &Binary) -> Result<Vec<u8>, SchemaError> {
    let payload = binary.encode_to_vec();
    let length = frame_length(payload.len())?;
    let mut buffer = Vec::with_capacity(HEADER_SIZE + payload.len());
    buffer.extend_from_slice(&length.to_le_bytes());
    buffer.extend_from_slice(&BINARY_IDENTIFIER);
    buffer.extend_from_slice(&Sha256::digest(&payload));
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

/// Returns the value of the size prefix for a payload of `payload_length` bytes.
fn frame_length(payload_length: usize) -> Result<u32, SchemaError> {
    (HEADER_SIZE - PREFIX_SIZE)
        .checked_add(payload_length)
        .and_then(|length| u32::try_from(length).ok())
        .ok_or(SchemaError::PayloadTooLarge { length: payload_length })
}

/// Returns the total length of the framed binary at the start of `buffer`, including its size prefix.
pub fn size_prefixed_length(buffer: &[u8]) -> Result<usize, SchemaError> {
    let prefix = buffer.first_chunk::<PREFIX_SIZE>().ok_or(SchemaError::TruncatedBuffer { length: buffer.len() })?;
    Ok(u32::from_le_bytes(*prefix) as usize + PREFIX_SIZE)
}

/// Checks the framing of `buffer`, decodes its payload, and verifies the structure of the decoded [`Binary`].
pub fn verify_size_prefixed(buffer: &[u8]) -> Result<Binary, SchemaError> {
    if buffer.len() < HEADER_SIZE {
        return Err(SchemaError::TruncatedBuffer { length: buffer.len() });
    }
    let length = size_prefixed_length(buffer)?;
    if length != buffer.len() {
        return Err(SchemaError::LengthMismatch { declared: length - PREFIX_SIZE, actual: buffer.len() - PREFIX_SIZE });
    }

    let (identifier, rest) = buffer[PREFIX_SIZE..].split_at(BINARY_IDENTIFIER.len());
    if identifier != BINARY_IDENTIFIER {
        let mut found = [0; 4];
        found.copy_from_slice(identifier);
        return Err(SchemaError::UnknownIdentifier { found });
    }

    let (digest, payload) = rest.split_at(DIGEST_SIZE);
    if Sha256::digest(payload).as_slice() != digest {
        return Err(SchemaError::DigestMismatch);
    }

    let binary = Binary::decode(payload)?;
    verify_binary(&binary)?;
    Ok(binary)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::binary::{ObjectTable, Program};
    use crate::records::{DebugInfo, MlirSnapshot, SystemDesc, Version};

    fn binary() -> Binary {
        Binary {
            version: Some(Version { major: 1, minor: 2, patch: 3 }),
            build_identity: "abc123".into(),
            system_desc: Some(SystemDesc::default()),
            objects: Some(ObjectTable {
                debug_infos: vec![DebugInfo {
                    mlir: Some(MlirSnapshot { name: "ttnn".into(), source: "module {}".into() }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            programs: vec![Program { name: "main".into(), ..Default::default() }],
        }
    }

    #[test]
    fn test_finish_and_verify() {
        let buffer = finish_size_prefixed(&binary()).unwrap();
        assert_eq!(size_prefixed_length(&buffer), Ok(buffer.len()));
        assert_eq!(&buffer[4..8], b"TTNB");
        assert_eq!(verify_size_prefixed(&buffer), Ok(binary()));
    }

    #[test]
    fn test_verify_rejects_every_single_byte_corruption() {
        let buffer = finish_size_prefixed(&binary()).unwrap();
        for index in 0..buffer.len() {
            let mut corrupted = buffer.clone();
            corrupted[index] ^= 0x01;
            assert!(verify_size_prefixed(&corrupted).is_err(), "corruption at byte {index} was not detected");
        }
    }

    #[test]
    fn test_verify_framing_errors() {
        assert_eq!(verify_size_prefixed(&[1, 2, 3]), Err(SchemaError::TruncatedBuffer { length: 3 }));

        let mut buffer = finish_size_prefixed(&binary()).unwrap();
        buffer.push(0);
        assert!(matches!(verify_size_prefixed(&buffer), Err(SchemaError::LengthMismatch { .. })));

        let mut buffer = finish_size_prefixed(&binary()).unwrap();
        buffer[4..8].copy_from_slice(b"XXXX");
        assert_eq!(verify_size_prefixed(&buffer), Err(SchemaError::UnknownIdentifier { found: *b"XXXX" }));

        let mut buffer = finish_size_prefixed(&binary()).unwrap();
        let last = buffer.len() - 1;
        buffer[last] ^= 0xff;
        assert_eq!(verify_size_prefixed(&buffer), Err(SchemaError::DigestMismatch));
    }

    #[test]
    fn test_frame_length_limits() {
        assert_eq!(frame_length(0), Ok(36));
        assert_eq!(frame_length(u32::MAX as usize - 36), Ok(u32::MAX));
        assert_eq!(
            frame_length(u32::MAX as usize - 35),
            Err(SchemaError::PayloadTooLarge { length: u32::MAX as usize - 35 })
        );
        assert_eq!(frame_length(usize::MAX), Err(SchemaError::PayloadTooLarge { length: usize::MAX }));
    }
}
