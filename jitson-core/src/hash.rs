//! A small, fast, non-cryptographic 64-bit hash.
//!
//! `spec.md` §4.6/§9 leaves the choice of hash function open ("a 64-bit
//! non-cryptographic hash") as long as the same function is used for both
//! bucket placement and lookup. We hand-roll an FxHash-style multiply/xor
//! mix rather than pull in a crate, matching the teacher's habit of
//! hand-rolling small hot-path primitives (e.g. the 40-byte `StackValue`
//! layout in `tagged_stack.rs`) instead of reaching for a dependency when a
//! dozen lines suffice.

/// Large odd constant used by FxHash-family hashes; chosen for good
/// avalanche behaviour on short keys such as object member names.
const SEED: u64 = 0x51_7c_c1_b7_27_22_0a_95;

/// Hash a byte slice (typically an object member name) to a 64-bit value.
///
/// The same function must be used both when inserting into an object's
/// bucket index (§4.6) and when looking a member up; changing it changes
/// the bucket assignment of every previously-indexed object.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut state = SEED;
    for chunk in bytes.chunks(8) {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        let w = u64::from_le_bytes(word);
        state = (state.rotate_left(5) ^ w).wrapping_mul(SEED);
    }
    state ^ (bytes.len() as u64)
}

/// Reduce a hash to a bucket index in `0..bucket_count`.
///
/// `bucket_count` of zero is a contract violation (an object index is
/// never built with zero buckets): callers guarantee `bucket_count > 0`.
pub fn bucket_of(hash: u64, bucket_count: u32) -> u32 {
    debug_assert!(bucket_count > 0, "bucket_of called with zero buckets");
    (hash % bucket_count as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_hash() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
    }

    #[test]
    fn different_bytes_usually_differ() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn empty_is_stable() {
        assert_eq!(hash_bytes(b""), hash_bytes(b""));
    }

    #[test]
    fn bucket_of_is_in_range() {
        for key in ["a", "biglongname", "c", "d", "f", ""] {
            let h = hash_bytes(key.as_bytes());
            assert!(bucket_of(h, 5) < 5);
        }
    }

    #[test]
    fn long_keys_mix_all_chunks() {
        let a = hash_bytes(b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1");
        let b = hash_bytes(b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa2");
        assert_ne!(a, b);
    }
}
