//! The reorg orchestrator: runs one scenario from setup through
//! rollback validation.

use std::collections::HashSet;

use tempfile::TempDir;
use tracing::info;

use ebb_chain::{Block, Chain, Tx};
use ebb_wallet::{BalanceSnapshot, KeyStore, Wallet};

use crate::assemble;
use crate::config::{Action, BlockConfig, ScenarioConfig};
use crate::driver::ChainDriver;
use crate::error::{ConfigError, InvariantError, ScenarioError};
use crate::txbuild::TxBuilder;

/// Everything a scenario run owns: collaborators are created per run
/// and torn down with it, so runs are fully isolated. The keystore
/// directory is released on every exit path when the context drops.
pub struct ScenarioContext {
    pub keystore: KeyStore,
    pub chain: Chain,
    pub wallet: Wallet,
    _keydir: TempDir,
}

impl ScenarioContext {
    pub fn new() -> Result<Self, ScenarioError> {
        let keydir = TempDir::new().map_err(ConfigError::Io)?;
        let keystore = KeyStore::open(keydir.path())?;
        Ok(Self {
            keystore,
            chain: Chain::new(),
            wallet: Wallet::new(),
            _keydir: keydir,
        })
    }
}

/// Fork-point selection state. Arming is the single explicit
/// transition; the armed block and snapshot are consumed exactly once
/// by the reorg phase.
enum ForkPoint {
    Unarmed,
    Armed {
        block: Block,
        snapshot: BalanceSnapshot,
    },
}

/// A configured scenario, runnable any number of times; each run gets
/// a fresh context.
pub struct Scenario {
    config: ScenarioConfig,
}

impl Scenario {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(Self::new(ScenarioConfig::from_json(json)?))
    }

    /// Run the scenario to a terminal state: `Ok(())` when every
    /// post-state held and, if a fork point armed, the post-reorg
    /// balances match the armed snapshot. Any error aborts the run.
    pub fn run(&self) -> Result<(), ScenarioError> {
        let mut ctx = ScenarioContext::new()?;
        self.run_in(&mut ctx)
    }

    /// Run against a caller-owned context, leaving it inspectable
    /// afterwards.
    pub fn run_in(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        self.setup(ctx)?;
        match self.play_blocks(ctx)? {
            ForkPoint::Unarmed => Ok(()),
            ForkPoint::Armed { block, snapshot } => self.reorg(ctx, &block, snapshot),
        }
    }

    /// Create keys and accounts from the declarative config. Assets are
    /// created lazily by `issue` actions during the block loop.
    fn setup(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        for key in &self.config.keys {
            ctx.keystore.create_key(&key.name, &key.password)?;
        }
        for account in &self.config.accounts {
            let mut pubkeys = Vec::with_capacity(account.keys.len());
            for alias in &account.keys {
                let record = ctx
                    .keystore
                    .find_key(alias)
                    .map_err(|_| ConfigError::UnknownKey(alias.clone()))?;
                pubkeys.push(record.pubkey);
            }
            ctx.wallet
                .accounts
                .create(pubkeys, account.quorum, &account.name)?;
        }
        Ok(())
    }

    /// Build the signed transactions for one block. All builders share
    /// a reservation set so no UTXO is selected twice within the block.
    fn build_transactions(
        &self,
        ctx: &mut ScenarioContext,
        block_cfg: &BlockConfig,
    ) -> Result<Vec<Tx>, ScenarioError> {
        let mut reserved = HashSet::new();
        let mut transactions = Vec::with_capacity(block_cfg.transactions.len());
        for tx_cfg in &block_cfg.transactions {
            let mut builder = TxBuilder::new(&mut ctx.wallet, &ctx.keystore, &mut reserved);
            for action in &tx_cfg.inputs {
                match action {
                    Action::SpendAccount {
                        name,
                        asset,
                        amount,
                    } => builder.add_spend_input(name, asset, *amount)?,
                    Action::Issue {
                        name,
                        asset,
                        amount,
                    } => builder.add_issuance_input(name, asset, *amount)?,
                    misplaced @ (Action::Output { .. } | Action::Retire { .. }) => {
                        return Err(ConfigError::MisplacedAction {
                            action: misplaced.kind(),
                            position: "input",
                        }
                        .into())
                    }
                }
            }
            for action in &tx_cfg.outputs {
                match action {
                    Action::Output {
                        name,
                        asset,
                        amount,
                    } => builder.add_output(name, asset, *amount)?,
                    Action::Retire { asset, amount, .. } => {
                        builder.add_retirement(asset, *amount)?
                    }
                    misplaced @ (Action::SpendAccount { .. } | Action::Issue { .. }) => {
                        return Err(ConfigError::MisplacedAction {
                            action: misplaced.kind(),
                            position: "output",
                        }
                        .into())
                    }
                }
            }
            transactions.push(builder.sign(&tx_cfg.passwords)?);
        }
        Ok(transactions)
    }

    fn verify_post_states(
        ctx: &ScenarioContext,
        block_cfg: &BlockConfig,
    ) -> Result<(), ScenarioError> {
        for state in &block_cfg.post_states {
            let actual = ctx.wallet.balance_of(&state.name, &state.asset);
            if actual != state.amount {
                return Err(InvariantError::PostStateMismatch {
                    account: state.name.clone(),
                    asset: state.asset.clone(),
                    expected: state.amount,
                    actual,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Attach every configured block plus its fillers, verifying
    /// post-states and arming the fork point along the way.
    fn play_blocks(&self, ctx: &mut ScenarioContext) -> Result<ForkPoint, ScenarioError> {
        let mut fork = ForkPoint::Unarmed;
        for block_cfg in &self.config.blocks {
            let transactions = self.build_transactions(ctx, block_cfg)?;
            let block = assemble::assemble_block(
                &ctx.chain,
                &mut ctx.wallet,
                &block_cfg.coinbase_account,
                transactions,
            )?;
            ChainDriver::new(&mut ctx.chain, &mut ctx.wallet).attach(block)?;
            Self::verify_post_states(ctx, block_cfg)?;

            // Snapshot before any filler: the rollback must land on
            // exactly this post-block state.
            if let Some(rollback_to) = self.config.rollback_to {
                let attached = ctx.chain.best_block().clone();
                let height = attached.height();
                if height <= rollback_to && rollback_to <= height + block_cfg.append {
                    info!(height, rollback_to, "fork point armed");
                    fork = ForkPoint::Armed {
                        snapshot: ctx.wallet.snapshot(),
                        block: attached,
                    };
                }
            }

            ChainDriver::new(&mut ctx.chain, &mut ctx.wallet).extend(block_cfg.append)?;
        }
        Ok(fork)
    }

    /// Detach every block above the fork point, most recent first, and
    /// require balance convergence to the armed snapshot.
    fn reorg(
        &self,
        ctx: &mut ScenarioContext,
        fork_block: &Block,
        expected: BalanceSnapshot,
    ) -> Result<(), ScenarioError> {
        let fork_height = fork_block.height();
        let mut detached = Vec::new();
        let mut height = ctx.chain.height();
        while height > fork_height {
            detached.push(ctx.chain.get_block_by_height(height)?.clone());
            height -= 1;
        }

        info!(
            fork = fork_height,
            detached = detached.len(),
            "reorganizing chain"
        );
        ctx.chain.reorganize_to(fork_block)?;
        for block in &detached {
            ctx.wallet.detach_block(block)?;
        }

        let actual = ctx.wallet.snapshot();
        if actual != expected {
            return Err(InvariantError::SnapshotMismatch {
                height: fork_height,
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    }
}
