use thiserror::Error;

use ebb_chain::ChainError;
use ebb_wallet::{BalanceSnapshot, KeyError, WalletError};

/// Malformed or inconsistent scenario input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown key alias: {0}")]
    UnknownKey(String),

    #[error("unknown account alias: {0}")]
    UnknownAccount(String),

    #[error("unknown asset alias: {0}")]
    UnknownAsset(String),

    #[error("action `{action}` is not valid as a transaction {position}")]
    MisplacedAction {
        action: &'static str,
        position: &'static str,
    },

    #[error("failed to parse scenario document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read scenario document: {0}")]
    Io(#[from] std::io::Error),
}

/// Transaction or block assembly failure.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "insufficient balance for account {account}, asset {asset}: need {needed}, have {available}"
    )]
    InsufficientBalance {
        account: String,
        asset: String,
        needed: u64,
        available: u64,
    },

    #[error("no supplied password unlocks key {pubkey} required by {signer}")]
    Signature { pubkey: String, signer: String },

    #[error("asset {0} cannot be issued")]
    NotIssuable(String),
}

/// A declared or implied balance invariant did not hold.
#[derive(Debug, Error)]
pub enum InvariantError {
    #[error(
        "post-state mismatch for account {account}, asset {asset}: expected {expected}, have {actual}"
    )]
    PostStateMismatch {
        account: String,
        asset: String,
        expected: u64,
        actual: u64,
    },

    #[error(
        "balances diverged after rollback to height {height}: expected {expected:?}, have {actual:?}"
    )]
    SnapshotMismatch {
        height: u64,
        expected: BalanceSnapshot,
        actual: BalanceSnapshot,
    },
}

/// Any failure that aborts a scenario run.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantError),
}
