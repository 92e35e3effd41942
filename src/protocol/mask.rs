//! Payload masking (RFC 6455 Section 5.3).
//!
//! The transform XORs each payload byte with `key[i % 4]`. XOR is its own
//! inverse, so the same function masks and unmasks.

/// Apply a 4-byte XOR mask to `data` in place.
///
/// Processes eight bytes per iteration with a widened key, then finishes
/// the tail byte-by-byte.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    let key_u64 = u64::from_ne_bytes([
        key[0], key[1], key[2], key[3], key[0], key[1], key[2], key[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = u64::from_ne_bytes(word) ^ key_u64;
        chunk.copy_from_slice(&masked.to_ne_bytes());
    }

    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}
