//! The in-memory chain service.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use ebb_types::{AssetId, BlockHash, Timestamp};

use crate::block::{Block, BlockHeader, BLOCK_SUBSIDY};
use crate::error::ChainError;
use crate::tx::{ControlProgram, Tx, TxInput};
use crate::work;

/// Timestamp of the genesis block.
const GENESIS_TIME: u64 = 1_500_000_000;

/// Owns every seen block plus the active chain index.
///
/// Detached blocks stay in the block store so a wallet can still fetch
/// them by hash while unwinding its own state.
pub struct Chain {
    blocks: HashMap<BlockHash, Block>,
    /// `active[h]` is the hash of the active-chain block at height `h`.
    active: Vec<BlockHash>,
}

impl Chain {
    /// Create a chain holding only the genesis block.
    pub fn new() -> Self {
        let coinbase = Tx::coinbase(ControlProgram::anchor(), 0, BLOCK_SUBSIDY);
        let mut header = BlockHeader {
            height: 0,
            previous: BlockHash::ZERO,
            timestamp: Timestamp::new(GENESIS_TIME),
            bits: work::EASY_BITS,
            nonce: 0,
            tx_commitment: Block::tx_commitment(&coinbase, &[]),
        };
        work::solve(&mut header).expect("genesis must solve at easy difficulty");
        let genesis = Block {
            header,
            coinbase,
            transactions: vec![],
        };
        let hash = genesis.hash();
        let mut blocks = HashMap::new();
        blocks.insert(hash, genesis);
        Self {
            blocks,
            active: vec![hash],
        }
    }

    /// Height of the active chain tip.
    pub fn height(&self) -> u64 {
        (self.active.len() - 1) as u64
    }

    /// The active chain tip.
    pub fn best_block(&self) -> &Block {
        let hash = self.active.last().expect("active chain is never empty");
        &self.blocks[hash]
    }

    /// The active-chain block at `height`.
    pub fn get_block_by_height(&self, height: u64) -> Result<&Block, ChainError> {
        let hash = self
            .active
            .get(height as usize)
            .ok_or(ChainError::UnknownHeight(height))?;
        Ok(&self.blocks[hash])
    }

    /// Any known block by hash, active or detached.
    pub fn get_block(&self, hash: &BlockHash) -> Option<&Block> {
        self.blocks.get(hash)
    }

    /// Validate `block` against the tip, solve its proof-of-work, and
    /// append it to the active chain.
    pub fn solve_and_attach(&mut self, mut block: Block) -> Result<BlockHash, ChainError> {
        self.validate_link(&block)?;
        self.validate_txs(&block)?;

        work::solve(&mut block.header)?;
        let hash = block.hash();
        debug!(height = block.height(), %hash, txs = block.transactions.len(), "block attached");
        self.blocks.insert(hash, block);
        self.active.push(hash);
        Ok(hash)
    }

    /// Truncate the active chain back to `target`, which must already
    /// lie on it. Blocks above the target stay in the store.
    pub fn reorganize_to(&mut self, target: &Block) -> Result<(), ChainError> {
        let height = target.height();
        let hash = target.hash();
        match self.active.get(height as usize) {
            Some(active_hash) if *active_hash == hash => {}
            _ => return Err(ChainError::NotInActiveChain { hash, height }),
        }
        let detached = self.active.split_off(height as usize + 1);
        info!(
            tip = height,
            detached = detached.len(),
            "chain reorganized"
        );
        Ok(())
    }

    fn validate_link(&self, block: &Block) -> Result<(), ChainError> {
        let tip = self.best_block();
        if block.height() != tip.height() + 1 {
            return Err(ChainError::BadHeight {
                tip: tip.height(),
                got: block.height(),
            });
        }
        if block.header.previous != tip.hash() {
            return Err(ChainError::BadPrevious {
                tip: tip.hash(),
                got: block.header.previous,
            });
        }
        Ok(())
    }

    /// Structural transaction checks: commitment, coinbase shape,
    /// per-asset balance, and witness signatures over the tx id.
    ///
    /// Control programs are opaque here; quorum composition against
    /// account key sets is the transaction builder's responsibility.
    fn validate_txs(&self, block: &Block) -> Result<(), ChainError> {
        let height = block.height();
        if block.header.tx_commitment != Block::tx_commitment(&block.coinbase, &block.transactions)
        {
            return Err(ChainError::BadTxCommitment { height });
        }

        match block.coinbase.inputs.as_slice() {
            [TxInput::Coinbase { height: h }] if *h == height => {}
            _ => {
                return Err(ChainError::BadCoinbase {
                    height,
                    reason: "coinbase must carry exactly one coinbase input at block height"
                        .into(),
                })
            }
        }

        for tx in &block.transactions {
            let id = tx.id();
            if tx.inputs.is_empty()
                || tx.inputs.iter().any(|i| matches!(i, TxInput::Coinbase { .. }))
            {
                return Err(ChainError::BadWitness { tx: id });
            }

            let mut totals: BTreeMap<AssetId, (u128, u128)> = BTreeMap::new();
            for input in &tx.inputs {
                totals.entry(input.asset()).or_default().0 += input.amount() as u128;
                let witnesses = input.witnesses();
                if witnesses.is_empty()
                    || witnesses.iter().any(|w| {
                        !ebb_crypto::verify_signature(id.as_bytes(), &w.signature, &w.pubkey)
                    })
                {
                    return Err(ChainError::BadWitness { tx: id });
                }
            }
            for output in &tx.outputs {
                totals.entry(output.asset).or_default().1 += output.amount as u128;
            }
            for (asset, (inputs, outputs)) in totals {
                if inputs != outputs {
                    return Err(ChainError::UnbalancedTx {
                        tx: id,
                        asset,
                        inputs,
                        outputs,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_INTERVAL_SECS;

    fn empty_block_on(chain: &Chain) -> Block {
        let tip = chain.best_block();
        let height = tip.height() + 1;
        let coinbase = Tx::coinbase(ControlProgram::anchor(), height, BLOCK_SUBSIDY);
        let header = BlockHeader {
            height,
            previous: tip.hash(),
            timestamp: tip.header.timestamp.saturating_add(BLOCK_INTERVAL_SECS),
            bits: tip.header.bits,
            nonce: 0,
            tx_commitment: Block::tx_commitment(&coinbase, &[]),
        };
        Block {
            header,
            coinbase,
            transactions: vec![],
        }
    }

    #[test]
    fn new_chain_has_genesis_tip() {
        let chain = Chain::new();
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.best_block().height(), 0);
    }

    #[test]
    fn attach_extends_tip() {
        let mut chain = Chain::new();
        let hash = chain.solve_and_attach(empty_block_on(&chain)).unwrap();
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.best_block().hash(), hash);
        assert!(work::check(&hash, work::EASY_BITS));
    }

    #[test]
    fn attach_rejects_stale_parent() {
        let mut chain = Chain::new();
        let stale = empty_block_on(&chain);
        chain.solve_and_attach(empty_block_on(&chain)).unwrap();
        let err = chain.solve_and_attach(stale).unwrap_err();
        assert!(matches!(err, ChainError::BadHeight { tip: 1, got: 1 }));
    }

    #[test]
    fn attach_rejects_wrong_coinbase_height() {
        let mut chain = Chain::new();
        let mut block = empty_block_on(&chain);
        block.coinbase = Tx::coinbase(ControlProgram::anchor(), 9, BLOCK_SUBSIDY);
        block.header.tx_commitment = Block::tx_commitment(&block.coinbase, &block.transactions);
        let err = chain.solve_and_attach(block).unwrap_err();
        assert!(matches!(err, ChainError::BadCoinbase { height: 1, .. }));
    }

    #[test]
    fn attach_rejects_tampered_commitment() {
        let mut chain = Chain::new();
        let mut block = empty_block_on(&chain);
        block.header.tx_commitment = [0xFF; 32];
        let err = chain.solve_and_attach(block).unwrap_err();
        assert!(matches!(err, ChainError::BadTxCommitment { height: 1 }));
    }

    #[test]
    fn reorganize_truncates_to_target() {
        let mut chain = Chain::new();
        chain.solve_and_attach(empty_block_on(&chain)).unwrap();
        chain.solve_and_attach(empty_block_on(&chain)).unwrap();
        chain.solve_and_attach(empty_block_on(&chain)).unwrap();
        let target = chain.get_block_by_height(1).unwrap().clone();
        let detached_hash = chain.get_block_by_height(3).unwrap().hash();

        chain.reorganize_to(&target).unwrap();
        assert_eq!(chain.height(), 1);
        // Detached blocks remain fetchable by hash.
        assert!(chain.get_block(&detached_hash).is_some());
        assert!(matches!(
            chain.get_block_by_height(2),
            Err(ChainError::UnknownHeight(2))
        ));
    }

    #[test]
    fn reorganize_rejects_unknown_target() {
        let mut chain = Chain::new();
        chain.solve_and_attach(empty_block_on(&chain)).unwrap();
        let mut foreign = empty_block_on(&chain);
        foreign.header.previous = BlockHash::new([9u8; 32]);
        let err = chain.reorganize_to(&foreign).unwrap_err();
        assert!(matches!(err, ChainError::NotInActiveChain { .. }));
    }
}
