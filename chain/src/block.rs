//! Block and header types.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use ebb_types::{BlockHash, Timestamp};

use crate::tx::Tx;

/// Native-asset subsidy paid by every coinbase.
pub const BLOCK_SUBSIDY: u64 = 50_000_000;

/// Fixed spacing between a block's timestamp and its parent's.
pub const BLOCK_INTERVAL_SECS: u64 = 10;

/// Block header; `bits` is the required number of leading zero bits in
/// the header hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub previous: BlockHash,
    pub timestamp: Timestamp,
    pub bits: u32,
    pub nonce: u64,
    pub tx_commitment: [u8; 32],
}

impl BlockHeader {
    /// Blake2b-256 of the serialized header.
    pub fn hash(&self) -> BlockHash {
        let bytes = bincode::serialize(self).expect("header serialization should not fail");
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(&bytes);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        BlockHash::new(out)
    }
}

/// A height-ordered container of transactions plus a coinbase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub coinbase: Tx,
    pub transactions: Vec<Tx>,
}

impl Block {
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Commit to the block's transactions: a hash over all tx ids,
    /// coinbase first.
    pub fn tx_commitment(coinbase: &Tx, transactions: &[Tx]) -> [u8; 32] {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(coinbase.id().as_bytes());
        for tx in transactions {
            hasher.update(tx.id().as_bytes());
        }
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }

    /// All transactions in application order, coinbase first.
    pub fn all_txs(&self) -> impl Iterator<Item = &Tx> {
        std::iter::once(&self.coinbase).chain(self.transactions.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::ControlProgram;

    fn header(nonce: u64) -> BlockHeader {
        BlockHeader {
            height: 1,
            previous: BlockHash::ZERO,
            timestamp: Timestamp::new(100),
            bits: 8,
            nonce,
            tx_commitment: [0u8; 32],
        }
    }

    #[test]
    fn hash_changes_with_nonce() {
        assert_ne!(header(0).hash(), header(1).hash());
    }

    #[test]
    fn commitment_covers_coinbase() {
        let a = Tx::coinbase(ControlProgram::anchor(), 1, BLOCK_SUBSIDY);
        let b = Tx::coinbase(ControlProgram::anchor(), 2, BLOCK_SUBSIDY);
        assert_ne!(
            Block::tx_commitment(&a, &[]),
            Block::tx_commitment(&b, &[])
        );
    }
}
