//! Blake2b-256 hashing helper.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// Hash arbitrary bytes to a 32-byte Blake2b digest.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(blake2b_256(b"ebb"), blake2b_256(b"ebb"));
    }

    #[test]
    fn distinct_inputs_distinct_digests() {
        assert_ne!(blake2b_256(b"a"), blake2b_256(b"b"));
    }
}
