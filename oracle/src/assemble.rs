//! Block assembly on top of the current chain tip.
//!
//! Pure with respect to the chain: nothing here mutates chain state.
//! The only wallet effect is deriving the coinbase change address.

use ebb_chain::{
    Block, BlockHeader, Chain, ControlProgram, Tx, BLOCK_INTERVAL_SECS, BLOCK_SUBSIDY,
};
use ebb_wallet::Wallet;

use crate::error::{ConfigError, ScenarioError};

/// Assemble a block holding `transactions`, with its coinbase paid to
/// a fresh change address of `coinbase_account`.
pub fn assemble_block(
    chain: &Chain,
    wallet: &mut Wallet,
    coinbase_account: &str,
    transactions: Vec<Tx>,
) -> Result<Block, ScenarioError> {
    let program = wallet
        .accounts
        .derive_address(coinbase_account, true)
        .map_err(|_| ConfigError::UnknownAccount(coinbase_account.to_string()))?;
    Ok(block_on_tip(chain, program, transactions))
}

/// An empty filler block; its coinbase pays the unowned anchor program
/// so wallet balances are untouched.
pub fn filler_block(chain: &Chain) -> Block {
    block_on_tip(chain, ControlProgram::anchor(), Vec::new())
}

fn block_on_tip(chain: &Chain, coinbase_program: ControlProgram, transactions: Vec<Tx>) -> Block {
    let tip = chain.best_block();
    let height = tip.height() + 1;
    let coinbase = Tx::coinbase(coinbase_program, height, BLOCK_SUBSIDY);
    let header = BlockHeader {
        height,
        previous: tip.hash(),
        timestamp: tip.header.timestamp.saturating_add(BLOCK_INTERVAL_SECS),
        bits: tip.header.bits,
        nonce: 0,
        tx_commitment: Block::tx_commitment(&coinbase, &transactions),
    };
    Block {
        header,
        coinbase,
        transactions,
    }
}
