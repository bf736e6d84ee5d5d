//! Declarative scenario configuration.
//!
//! The document enumerates keys, accounts, and an ordered list of
//! blocks; each block carries its transactions, expected post-state
//! balances, and a filler-block count. A top-level `rollback_to`
//! height selects the reorg fork point.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub keys: Vec<KeyConfig>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
    /// Fork-point height; absent means no reorg is exercised.
    #[serde(default)]
    pub rollback_to: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyConfig {
    pub name: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub keys: Vec<String>,
    pub quorum: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockConfig {
    pub coinbase_account: String,
    #[serde(default)]
    pub transactions: Vec<TransactionConfig>,
    #[serde(default)]
    pub post_states: Vec<PostState>,
    /// Filler blocks attached after this one.
    #[serde(default)]
    pub append: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionConfig {
    #[serde(default)]
    pub passwords: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<Action>,
    #[serde(default)]
    pub outputs: Vec<Action>,
}

/// Expected (account, asset) balance after a block attaches.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostState {
    pub name: String,
    pub asset: String,
    pub amount: u64,
}

/// A typed transaction-building instruction.
///
/// The set is closed: a new action kind must be handled everywhere an
/// `Action` is matched, and an input-only action appearing among
/// outputs (or vice versa) is a configuration error.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SpendAccount {
        name: String,
        asset: String,
        amount: u64,
    },
    Issue {
        name: String,
        asset: String,
        amount: u64,
    },
    Output {
        name: String,
        asset: String,
        amount: u64,
    },
    Retire {
        #[serde(default)]
        name: String,
        asset: String,
        amount: u64,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SpendAccount { .. } => "spend_account",
            Action::Issue { .. } => "issue",
            Action::Output { .. } => "output",
            Action::Retire { .. } => "retire",
        }
    }
}

impl ScenarioConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_actions() {
        let doc = r#"{
            "keys": [{"name": "k1", "password": "pw"}],
            "accounts": [{"name": "a1", "keys": ["k1"], "quorum": 1}],
            "blocks": [{
                "coinbase_account": "a1",
                "transactions": [{
                    "passwords": ["pw"],
                    "inputs": [{"type": "issue", "name": "a1", "asset": "coin", "amount": 1000}],
                    "outputs": [{"type": "output", "name": "a1", "asset": "coin", "amount": 1000}]
                }],
                "post_states": [{"name": "a1", "asset": "coin", "amount": 1000}],
                "append": 2
            }],
            "rollback_to": 1
        }"#;
        let config = ScenarioConfig::from_json(doc).unwrap();
        assert_eq!(config.rollback_to, Some(1));
        let tx = &config.blocks[0].transactions[0];
        assert!(matches!(tx.inputs[0], Action::Issue { ref asset, amount: 1000, .. } if asset == "coin"));
        assert!(matches!(tx.outputs[0], Action::Output { .. }));
    }

    #[test]
    fn rollback_defaults_to_none() {
        let config = ScenarioConfig::from_json(r#"{"keys": [], "accounts": []}"#).unwrap();
        assert_eq!(config.rollback_to, None);
        assert!(config.blocks.is_empty());
    }

    #[test]
    fn retire_needs_no_account() {
        let action: Action = serde_json::from_str(
            r#"{"type": "retire", "asset": "coin", "amount": 5}"#,
        )
        .unwrap();
        assert!(matches!(action, Action::Retire { ref name, .. } if name.is_empty()));
    }

    #[test]
    fn unknown_action_type_fails_parse() {
        let err = serde_json::from_str::<Action>(
            r#"{"type": "teleport", "asset": "coin", "amount": 5}"#,
        );
        assert!(err.is_err());
    }
}
