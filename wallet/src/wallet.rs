//! The wallet's UTXO balance index and the block attach/detach
//! protocol.
//!
//! Attach and detach are strict inverses and strictly ordered: blocks
//! attach in increasing height order and detach in exact reverse
//! attachment order. Violating either is a contract error, not a
//! recoverable condition.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use ebb_chain::{Block, ControlProgram, OutPoint, TxInput};
use ebb_types::AssetId;

use crate::account::AccountRegistry;
use crate::asset::AssetRegistry;
use crate::balance::{BalanceRecord, BalanceSnapshot};
use crate::error::WalletError;

/// An unspent output owned by one of the wallet's accounts.
#[derive(Clone, Debug)]
pub struct OwnedUtxo {
    pub account: String,
    pub asset: AssetId,
    pub amount: u64,
    pub program: ControlProgram,
    pub change: bool,
}

/// Aggregated per-account wallet state over an attached chain prefix.
pub struct Wallet {
    pub accounts: AccountRegistry,
    pub assets: AssetRegistry,
    utxos: BTreeMap<OutPoint, OwnedUtxo>,
    /// Height of the last attached block; 0 before any attach.
    height: u64,
}

impl Wallet {
    pub fn new() -> Self {
        Self {
            accounts: AccountRegistry::new(),
            assets: AssetRegistry::new(),
            utxos: BTreeMap::new(),
            height: 0,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Apply a block's effects to the balance index.
    pub fn attach_block(&mut self, block: &Block) -> Result<(), WalletError> {
        if block.height() != self.height + 1 {
            return Err(WalletError::AttachOutOfOrder {
                expected: self.height + 1,
                got: block.height(),
            });
        }

        let mut spent = 0usize;
        let mut gained = 0usize;
        for tx in block.all_txs() {
            let id = tx.id();
            for input in &tx.inputs {
                if let TxInput::Spend { source, .. } = input {
                    if self.utxos.remove(source).is_some() {
                        spent += 1;
                    }
                }
            }
            for (index, output) in tx.outputs.iter().enumerate() {
                let Some(info) = self.accounts.program_owner(&output.program) else {
                    continue;
                };
                self.utxos.insert(
                    OutPoint {
                        tx: id,
                        index: index as u32,
                    },
                    OwnedUtxo {
                        account: info.account.clone(),
                        asset: output.asset,
                        amount: output.amount,
                        program: output.program.clone(),
                        change: info.change,
                    },
                );
                gained += 1;
            }
        }

        self.height = block.height();
        debug!(height = self.height, spent, gained, "wallet attached block");
        Ok(())
    }

    /// Reverse a previously attached block. Must be the most recently
    /// attached one.
    pub fn detach_block(&mut self, block: &Block) -> Result<(), WalletError> {
        if self.height == 0 || block.height() != self.height {
            warn!(
                got = block.height(),
                expected = self.height,
                "detach out of reverse-attachment order"
            );
            return Err(WalletError::DetachOutOfOrder {
                expected: self.height,
                got: block.height(),
            });
        }

        let txs: Vec<_> = block.all_txs().collect();
        for tx in txs.into_iter().rev() {
            let id = tx.id();
            for (index, _) in tx.outputs.iter().enumerate() {
                self.utxos.remove(&OutPoint {
                    tx: id,
                    index: index as u32,
                });
            }
            for input in &tx.inputs {
                let TxInput::Spend {
                    source,
                    asset,
                    amount,
                    program,
                    ..
                } = input
                else {
                    continue;
                };
                let Some(info) = self.accounts.program_owner(program) else {
                    continue;
                };
                self.utxos.insert(
                    *source,
                    OwnedUtxo {
                        account: info.account.clone(),
                        asset: *asset,
                        amount: *amount,
                        program: program.clone(),
                        change: info.change,
                    },
                );
            }
        }

        self.height -= 1;
        debug!(height = self.height, "wallet detached block");
        Ok(())
    }

    /// Aggregated balances across all accounts and assets, ordered by
    /// account then asset alias. Each UTXO contributes exactly once.
    pub fn get_account_balances(&self) -> Vec<BalanceRecord> {
        let mut totals: BTreeMap<(String, String), u64> = BTreeMap::new();
        for utxo in self.utxos.values() {
            let asset = self.assets.alias_of(&utxo.asset);
            *totals
                .entry((utxo.account.clone(), asset))
                .or_default() += utxo.amount;
        }
        totals
            .into_iter()
            .map(|((account, asset), amount)| BalanceRecord {
                account,
                asset,
                amount,
            })
            .collect()
    }

    /// Confirmed balance for an (account, asset) pair; 0 when the pair
    /// has no history.
    pub fn balance_of(&self, account: &str, asset: &str) -> u64 {
        self.utxos
            .values()
            .filter(|u| u.account == account)
            .filter(|u| self.assets.alias_of(&u.asset) == asset)
            .map(|u| u.amount)
            .sum()
    }

    /// Full normalized balance capture at the current height.
    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot::from_records(&self.get_account_balances())
    }

    /// Spendable UTXOs for an account and asset, excluding outpoints
    /// already reserved by in-flight transactions.
    pub fn spendable_utxos(
        &self,
        account: &str,
        asset: &AssetId,
        exclude: &HashSet<OutPoint>,
    ) -> Vec<(OutPoint, OwnedUtxo)> {
        self.utxos
            .iter()
            .filter(|(outpoint, _)| !exclude.contains(outpoint))
            .filter(|(_, u)| u.account == account && u.asset == *asset)
            .map(|(outpoint, u)| (*outpoint, u.clone()))
            .collect()
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_chain::{BlockHeader, Tx, TxOutput, BLOCK_SUBSIDY};
    use ebb_types::{BlockHash, PublicKey, Timestamp};

    fn block_at(height: u64, transactions: Vec<Tx>) -> Block {
        let coinbase = Tx::coinbase(ControlProgram::anchor(), height, BLOCK_SUBSIDY);
        let header = BlockHeader {
            height,
            previous: BlockHash::ZERO,
            timestamp: Timestamp::new(height * 10),
            bits: 0,
            nonce: 0,
            tx_commitment: Block::tx_commitment(&coinbase, &transactions),
        };
        Block {
            header,
            coinbase,
            transactions,
        }
    }

    fn wallet_with_account(alias: &str) -> Wallet {
        let mut wallet = Wallet::new();
        wallet
            .accounts
            .create(vec![PublicKey([1u8; 32])], 1, alias)
            .unwrap();
        wallet
    }

    fn issue_tx(wallet: &mut Wallet, to: &str, asset: AssetId, amount: u64) -> Tx {
        let program = wallet.accounts.derive_address(to, false).unwrap();
        Tx::new(
            vec![TxInput::Issue {
                asset,
                amount,
                issuance_program: ControlProgram::new(vec![0x52]),
                witnesses: vec![],
            }],
            vec![TxOutput {
                asset,
                amount,
                program,
            }],
        )
    }

    #[test]
    fn attach_indexes_owned_outputs_only() {
        let mut wallet = wallet_with_account("a1");
        let asset = AssetId::new([9u8; 32]);
        let tx = issue_tx(&mut wallet, "a1", asset, 1000);

        wallet.attach_block(&block_at(1, vec![tx])).unwrap();
        assert_eq!(wallet.height(), 1);
        // Filler coinbase pays the anchor program; nothing owned there.
        let records = wallet.get_account_balances();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].account, "a1");
        assert_eq!(records[0].amount, 1000);
    }

    #[test]
    fn detach_restores_prior_state() {
        let mut wallet = wallet_with_account("a1");
        let asset = AssetId::new([9u8; 32]);
        let tx = issue_tx(&mut wallet, "a1", asset, 1000);
        let b1 = block_at(1, vec![tx]);

        wallet.attach_block(&b1).unwrap();
        let before = wallet.snapshot();

        let b2 = block_at(2, vec![]);
        wallet.attach_block(&b2).unwrap();
        wallet.detach_block(&b2).unwrap();
        assert_eq!(wallet.snapshot(), before);
    }

    #[test]
    fn detach_reinserts_spent_outputs() {
        let mut wallet = wallet_with_account("a1");
        let asset = AssetId::new([9u8; 32]);
        let tx = issue_tx(&mut wallet, "a1", asset, 1000);
        let source = tx.outpoint(0);
        let program = tx.outputs[0].program.clone();
        wallet.attach_block(&block_at(1, vec![tx])).unwrap();

        // Spend the whole 1000 to the retirement program.
        let burn = Tx::new(
            vec![TxInput::Spend {
                source,
                asset,
                amount: 1000,
                program,
                witnesses: vec![],
            }],
            vec![TxOutput {
                asset,
                amount: 1000,
                program: ControlProgram::retirement(),
            }],
        );
        let b2 = block_at(2, vec![burn]);
        wallet.attach_block(&b2).unwrap();
        assert_eq!(wallet.balance_of("a1", &wallet.assets.alias_of(&asset)), 0);

        wallet.detach_block(&b2).unwrap();
        assert_eq!(
            wallet.balance_of("a1", &wallet.assets.alias_of(&asset)),
            1000
        );
    }

    #[test]
    fn attach_out_of_order_rejected() {
        let mut wallet = wallet_with_account("a1");
        let err = wallet.attach_block(&block_at(3, vec![])).unwrap_err();
        assert!(matches!(
            err,
            WalletError::AttachOutOfOrder {
                expected: 1,
                got: 3
            }
        ));
    }

    #[test]
    fn detach_out_of_order_rejected() {
        let mut wallet = wallet_with_account("a1");
        let b1 = block_at(1, vec![]);
        let b2 = block_at(2, vec![]);
        wallet.attach_block(&b1).unwrap();
        wallet.attach_block(&b2).unwrap();

        let err = wallet.detach_block(&b1).unwrap_err();
        assert!(matches!(
            err,
            WalletError::DetachOutOfOrder {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn zero_balance_for_unknown_pair() {
        let wallet = wallet_with_account("a1");
        assert_eq!(wallet.balance_of("a1", "coin"), 0);
        assert_eq!(wallet.balance_of("ghost", "coin"), 0);
    }

    #[test]
    fn spendable_respects_exclusions() {
        let mut wallet = wallet_with_account("a1");
        let asset = AssetId::new([9u8; 32]);
        let tx = issue_tx(&mut wallet, "a1", asset, 1000);
        let outpoint = tx.outpoint(0);
        wallet.attach_block(&block_at(1, vec![tx])).unwrap();

        let none = HashSet::new();
        assert_eq!(wallet.spendable_utxos("a1", &asset, &none).len(), 1);

        let mut reserved = HashSet::new();
        reserved.insert(outpoint);
        assert!(wallet.spendable_utxos("a1", &asset, &reserved).is_empty());
    }
}
