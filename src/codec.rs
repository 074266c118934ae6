use crate::change_detector::ReferenceDelta;
use crate::keys::{Category, Phase, SectionKey};
use std::collections::BTreeSet;
use thiserror::Error;

/// Encoded width of a section key: 1 + 1 + 2 + 2 + 2 bytes.
pub const SECTION_KEY_WIDTH: usize = 8;
/// Encoded width of a reference delta: flag + key + segment id.
pub const REFERENCE_DELTA_WIDTH: usize = 1 + SECTION_KEY_WIDTH + 8;

/// Decode failure for the fixed-width encodings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer truncated: needed {needed} bytes, had {had}")]
    Truncated { needed: usize, had: usize },
    #[error("unknown category ordinal {0}")]
    UnknownCategoryOrdinal(u8),
    #[error("unknown phase ordinal {0}")]
    UnknownPhaseOrdinal(u8),
    #[error("invalid removal flag {0}")]
    InvalidFlag(u8),
}

/// Encodes a key so unsigned byte-lexicographic order equals the key order.
pub fn encode_key(key: &SectionKey) -> [u8; SECTION_KEY_WIDTH] {
    let mut bytes = [0u8; SECTION_KEY_WIDTH];
    bytes[0] = key.category.ordinal();
    bytes[1] = key.phase.ordinal();
    bytes[2..4].copy_from_slice(&key.number.to_be_bytes());
    bytes[4..6].copy_from_slice(&key.section.to_be_bytes());
    bytes[6..8].copy_from_slice(&key.subsection.to_be_bytes());
    bytes
}

/// Exact inverse of [`encode_key`].
pub fn decode_key(bytes: &[u8]) -> Result<SectionKey, CodecError> {
    if bytes.len() < SECTION_KEY_WIDTH {
        return Err(CodecError::Truncated {
            needed: SECTION_KEY_WIDTH,
            had: bytes.len(),
        });
    }
    let category =
        Category::from_ordinal(bytes[0]).ok_or(CodecError::UnknownCategoryOrdinal(bytes[0]))?;
    let phase = Phase::from_ordinal(bytes[1]).ok_or(CodecError::UnknownPhaseOrdinal(bytes[1]))?;
    Ok(SectionKey {
        category,
        phase,
        number: u16::from_be_bytes([bytes[2], bytes[3]]),
        section: u16::from_be_bytes([bytes[4], bytes[5]]),
        subsection: u16::from_be_bytes([bytes[6], bytes[7]]),
    })
}

/// Encodes a key set as a big-endian count prefix followed by each key.
pub fn encode_key_set(keys: &BTreeSet<SectionKey>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + keys.len() * SECTION_KEY_WIDTH);
    bytes.extend_from_slice(&(keys.len() as u32).to_be_bytes());
    for key in keys {
        bytes.extend_from_slice(&encode_key(key));
    }
    bytes
}

/// Exact inverse of [`encode_key_set`].
pub fn decode_key_set(bytes: &[u8]) -> Result<BTreeSet<SectionKey>, CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::Truncated {
            needed: 4,
            had: bytes.len(),
        });
    }
    let count = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let needed = 4 + count * SECTION_KEY_WIDTH;
    if bytes.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            had: bytes.len(),
        });
    }
    let mut keys = BTreeSet::new();
    for index in 0..count {
        let offset = 4 + index * SECTION_KEY_WIDTH;
        keys.insert(decode_key(&bytes[offset..offset + SECTION_KEY_WIDTH])?);
    }
    Ok(keys)
}

/// Encodes a reference delta as flag byte, key, and segment id.
pub fn encode_reference_delta(delta: &ReferenceDelta) -> [u8; REFERENCE_DELTA_WIDTH] {
    let mut bytes = [0u8; REFERENCE_DELTA_WIDTH];
    bytes[0] = u8::from(delta.removed);
    bytes[1..9].copy_from_slice(&encode_key(&delta.key));
    bytes[9..17].copy_from_slice(&delta.segment_id.to_be_bytes());
    bytes
}

/// Exact inverse of [`encode_reference_delta`].
pub fn decode_reference_delta(bytes: &[u8]) -> Result<ReferenceDelta, CodecError> {
    if bytes.len() < REFERENCE_DELTA_WIDTH {
        return Err(CodecError::Truncated {
            needed: REFERENCE_DELTA_WIDTH,
            had: bytes.len(),
        });
    }
    let removed = match bytes[0] {
        0 => false,
        1 => true,
        other => return Err(CodecError::InvalidFlag(other)),
    };
    let key = decode_key(&bytes[1..9])?;
    let segment_id = u64::from_be_bytes([
        bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15], bytes[16],
    ]);
    Ok(ReferenceDelta {
        removed,
        key,
        segment_id,
    })
}
