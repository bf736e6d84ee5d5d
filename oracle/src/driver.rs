//! Atomic block application across the chain/wallet pair.

use tracing::error;

use ebb_chain::{Block, Chain};
use ebb_wallet::Wallet;

use crate::assemble;
use crate::error::ScenarioError;

/// Applies blocks to the chain and wallet as a unit.
pub struct ChainDriver<'a> {
    chain: &'a mut Chain,
    wallet: &'a mut Wallet,
}

impl<'a> ChainDriver<'a> {
    pub fn new(chain: &'a mut Chain, wallet: &'a mut Wallet) -> Self {
        Self { chain, wallet }
    }

    /// Solve and attach `block` to the chain, then index it into the
    /// wallet. Either half failing aborts the scenario; a wallet-side
    /// failure after the chain accepted the block is surfaced loudly
    /// since the two views now disagree.
    pub fn attach(&mut self, block: Block) -> Result<(), ScenarioError> {
        let height = block.height();
        self.chain.solve_and_attach(block)?;
        let attached = self.chain.best_block().clone();
        if let Err(err) = self.wallet.attach_block(&attached) {
            error!(height, %err, "wallet failed to index a chain-accepted block");
            return Err(err.into());
        }
        Ok(())
    }

    /// Attach `count` filler blocks on top of the tip. A filler attach
    /// failure aborts the scenario like any other attach failure.
    pub fn extend(&mut self, count: u64) -> Result<(), ScenarioError> {
        for _ in 0..count {
            let block = assemble::filler_block(self.chain);
            self.attach(block)?;
        }
        Ok(())
    }
}
