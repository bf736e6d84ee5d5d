//! Proof-of-work: nonce search and validation.

use ebb_types::BlockHash;

use crate::block::BlockHeader;
use crate::error::ChainError;

/// Difficulty used by scenario chains; low enough to solve in a few
/// hundred hashes on average.
pub const EASY_BITS: u32 = 8;

/// Nonce search bound; hit only at difficulties far above `EASY_BITS`.
const MAX_SOLVE_ITERS: u64 = 1 << 24;

/// Count of leading zero bits in a hash.
fn leading_zero_bits(hash: &BlockHash) -> u32 {
    let mut count = 0;
    for byte in hash.as_bytes() {
        if *byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count
}

/// Does `hash` meet the difficulty target?
pub fn check(hash: &BlockHash, bits: u32) -> bool {
    leading_zero_bits(hash) >= bits
}

/// Find a nonce for `header` meeting its own `bits` target.
pub fn solve(header: &mut BlockHeader) -> Result<(), ChainError> {
    for nonce in 0..MAX_SOLVE_ITERS {
        header.nonce = nonce;
        if check(&header.hash(), header.bits) {
            return Ok(());
        }
    }
    Err(ChainError::WorkExhausted { bits: header.bits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_types::Timestamp;

    fn header(bits: u32) -> BlockHeader {
        BlockHeader {
            height: 1,
            previous: BlockHash::ZERO,
            timestamp: Timestamp::new(42),
            bits,
            nonce: 0,
            tx_commitment: [7u8; 32],
        }
    }

    #[test]
    fn solve_meets_target() {
        let mut h = header(EASY_BITS);
        solve(&mut h).unwrap();
        assert!(check(&h.hash(), EASY_BITS));
    }

    #[test]
    fn zero_bits_accepts_any_hash() {
        assert!(check(&BlockHash::new([0xFF; 32]), 0));
    }

    #[test]
    fn leading_zeros_counted_across_bytes() {
        let mut bytes = [0u8; 32];
        bytes[2] = 0x10;
        assert_eq!(leading_zero_bits(&BlockHash::new(bytes)), 19);
    }

    #[test]
    fn all_zero_hash_has_256_bits() {
        assert_eq!(leading_zero_bits(&BlockHash::ZERO), 256);
    }
}
