use thiserror::Error;

use ebb_types::{AssetId, BlockHash, TxId};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block height {got} does not extend tip height {tip}")]
    BadHeight { tip: u64, got: u64 },

    #[error("block previous hash {got} does not match tip {tip}")]
    BadPrevious { tip: BlockHash, got: BlockHash },

    #[error("no block at height {0} on the active chain")]
    UnknownHeight(u64),

    #[error("block {hash} at height {height} is not on the active chain")]
    NotInActiveChain { hash: BlockHash, height: u64 },

    #[error("tx commitment mismatch in block at height {height}")]
    BadTxCommitment { height: u64 },

    #[error("invalid coinbase at height {height}: {reason}")]
    BadCoinbase { height: u64, reason: String },

    #[error(
        "transaction {tx} is unbalanced for asset {asset}: inputs {inputs}, outputs {outputs}"
    )]
    UnbalancedTx {
        tx: TxId,
        asset: AssetId,
        inputs: u128,
        outputs: u128,
    },

    #[error("transaction {tx} carries a missing or invalid witness")]
    BadWitness { tx: TxId },

    #[error("proof-of-work search exhausted at difficulty {bits}")]
    WorkExhausted { bits: u32 },
}
