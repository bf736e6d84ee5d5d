//! Transaction builder: turns declarative actions into a signed
//! transaction against the wallet's registries and UTXO set.

use std::collections::HashSet;

use ebb_chain::{InputWitness, OutPoint, Tx, TxInput, TxOutput};
use ebb_types::PublicKey;
use ebb_wallet::{KeyError, KeyStore, Wallet, NATIVE_ASSET_ALIAS};

use crate::error::{BuildError, ConfigError, ScenarioError};

/// The key set that must authorize one input.
struct SignerSet {
    pubkeys: Vec<PublicKey>,
    quorum: usize,
    label: String,
}

/// Accumulates inputs and outputs, then signs.
///
/// `reserved` is shared across all builders for one block so that two
/// transactions in the same block cannot select the same UTXO.
pub struct TxBuilder<'a> {
    wallet: &'a mut Wallet,
    keystore: &'a KeyStore,
    reserved: &'a mut HashSet<OutPoint>,
    inputs: Vec<(TxInput, SignerSet)>,
    outputs: Vec<TxOutput>,
}

impl<'a> TxBuilder<'a> {
    pub fn new(
        wallet: &'a mut Wallet,
        keystore: &'a KeyStore,
        reserved: &'a mut HashSet<OutPoint>,
    ) -> Self {
        Self {
            wallet,
            keystore,
            reserved,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Spend `amount` of `asset` from `account`'s confirmed UTXOs.
    /// Overshoot goes back to a fresh change address.
    pub fn add_spend_input(
        &mut self,
        account: &str,
        asset: &str,
        amount: u64,
    ) -> Result<(), ScenarioError> {
        let (pubkeys, quorum) = {
            let acc = self
                .wallet
                .accounts
                .find_by_alias(account)
                .map_err(|_| ConfigError::UnknownAccount(account.to_string()))?;
            (acc.pubkeys.clone(), acc.quorum)
        };
        let asset_id = self
            .wallet
            .assets
            .find_by_alias(asset)
            .map_err(|_| ConfigError::UnknownAsset(asset.to_string()))?
            .id;

        let candidates = self.wallet.spendable_utxos(account, &asset_id, self.reserved);
        let available: u64 = candidates.iter().map(|(_, u)| u.amount).sum();
        if available < amount {
            return Err(BuildError::InsufficientBalance {
                account: account.to_string(),
                asset: asset.to_string(),
                needed: amount,
                available,
            }
            .into());
        }

        let mut taken = 0u64;
        for (outpoint, utxo) in candidates {
            if taken >= amount {
                break;
            }
            taken += utxo.amount;
            self.reserved.insert(outpoint);
            self.inputs.push((
                TxInput::Spend {
                    source: outpoint,
                    asset: asset_id,
                    amount: utxo.amount,
                    program: utxo.program,
                    witnesses: vec![],
                },
                SignerSet {
                    pubkeys: pubkeys.clone(),
                    quorum,
                    label: format!("account {account}"),
                },
            ));
        }

        let change = taken - amount;
        if change > 0 {
            let program = self.wallet.accounts.derive_address(account, true)?;
            self.outputs.push(TxOutput {
                asset: asset_id,
                amount: change,
                program,
            });
        }
        Ok(())
    }

    /// Add an issuance input, defining the asset from the issuing
    /// account's key set on first reference (idempotent per alias).
    pub fn add_issuance_input(
        &mut self,
        account: &str,
        asset: &str,
        amount: u64,
    ) -> Result<(), ScenarioError> {
        if asset == NATIVE_ASSET_ALIAS {
            return Err(BuildError::NotIssuable(asset.to_string()).into());
        }
        let (pubkeys, quorum) = {
            let acc = self
                .wallet
                .accounts
                .find_by_alias(account)
                .map_err(|_| ConfigError::UnknownAccount(account.to_string()))?;
            (acc.pubkeys.clone(), acc.quorum)
        };
        let definition = match self.wallet.assets.find_by_alias(asset) {
            Ok(existing) => existing.clone(),
            Err(_) => self.wallet.assets.define(&pubkeys, quorum, asset)?.clone(),
        };

        self.inputs.push((
            TxInput::Issue {
                asset: definition.id,
                amount,
                issuance_program: definition.issuance_program.clone(),
                witnesses: vec![],
            },
            SignerSet {
                pubkeys: definition.issuer_pubkeys,
                quorum: definition.quorum,
                label: format!("asset {asset}"),
            },
        ));
        Ok(())
    }

    /// Send `amount` of `asset` to a fresh external address of `account`.
    pub fn add_output(
        &mut self,
        account: &str,
        asset: &str,
        amount: u64,
    ) -> Result<(), ScenarioError> {
        let asset_id = self
            .wallet
            .assets
            .find_by_alias(asset)
            .map_err(|_| ConfigError::UnknownAsset(asset.to_string()))?
            .id;
        let program = self
            .wallet
            .accounts
            .derive_address(account, false)
            .map_err(|_| ConfigError::UnknownAccount(account.to_string()))?;
        self.outputs.push(TxOutput {
            asset: asset_id,
            amount,
            program,
        });
        Ok(())
    }

    /// Burn `amount` of `asset` permanently.
    pub fn add_retirement(&mut self, asset: &str, amount: u64) -> Result<(), ScenarioError> {
        let asset_id = self
            .wallet
            .assets
            .find_by_alias(asset)
            .map_err(|_| ConfigError::UnknownAsset(asset.to_string()))?
            .id;
        self.outputs.push(TxOutput {
            asset: asset_id,
            amount,
            program: ebb_chain::ControlProgram::retirement(),
        });
        Ok(())
    }

    /// Produce the signed transaction. Every input must reach its
    /// signer quorum using keys unlockable by `passwords`.
    pub fn sign(self, passwords: &[String]) -> Result<Tx, ScenarioError> {
        let Self {
            keystore,
            inputs: pairs,
            outputs,
            ..
        } = self;
        let (inputs, signers): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        let mut tx = Tx::new(inputs, outputs);
        let id = tx.id();

        for (input, signer) in tx.inputs.iter_mut().zip(&signers) {
            let Some(witnesses) = input.witnesses_mut() else {
                continue;
            };
            let mut signed = 0;
            let mut locked: Option<PublicKey> = None;
            for pubkey in &signer.pubkeys {
                if signed == signer.quorum {
                    break;
                }
                match sign_with_any(keystore, pubkey, passwords, id.as_bytes())? {
                    Some(signature) => {
                        witnesses.push(InputWitness {
                            pubkey: *pubkey,
                            signature,
                        });
                        signed += 1;
                    }
                    None => {
                        locked.get_or_insert(*pubkey);
                    }
                }
            }
            if signed < signer.quorum {
                let pubkey = locked
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "<none>".to_string());
                return Err(BuildError::Signature {
                    pubkey,
                    signer: signer.label.clone(),
                }
                .into());
            }
        }
        Ok(tx)
    }
}

/// Try each password against one key. `Ok(None)` means no password
/// unlocks it; hard keystore failures propagate.
fn sign_with_any(
    keystore: &KeyStore,
    pubkey: &PublicKey,
    passwords: &[String],
    message: &[u8],
) -> Result<Option<ebb_types::Signature>, ScenarioError> {
    for password in passwords {
        match keystore.sign(pubkey, password, message) {
            Ok(signature) => return Ok(Some(signature)),
            Err(KeyError::WrongPassword { .. }) | Err(KeyError::UnknownKey(_)) => continue,
            Err(err) => return Err(ScenarioError::Key(err)),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, KeyStore, Wallet) {
        let dir = TempDir::new().unwrap();
        let mut keystore = KeyStore::open(dir.path()).unwrap();
        let record = keystore.create_key("k1", "pw").unwrap();
        let mut wallet = Wallet::new();
        wallet
            .accounts
            .create(vec![record.pubkey], 1, "a1")
            .unwrap();
        (dir, keystore, wallet)
    }

    fn passwords(pw: &str) -> Vec<String> {
        vec![pw.to_string()]
    }

    #[test]
    fn issue_defines_asset_and_signs() {
        let (_dir, keystore, mut wallet) = setup();
        let mut reserved = HashSet::new();
        let mut builder = TxBuilder::new(&mut wallet, &keystore, &mut reserved);
        builder.add_issuance_input("a1", "coin", 1000).unwrap();
        builder.add_output("a1", "coin", 1000).unwrap();
        let tx = builder.sign(&passwords("pw")).unwrap();

        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.inputs[0].witnesses().len(), 1);
        assert!(wallet.assets.find_by_alias("coin").is_ok());
    }

    #[test]
    fn issue_is_idempotent_per_alias() {
        let (_dir, keystore, mut wallet) = setup();
        let mut reserved = HashSet::new();
        let mut builder = TxBuilder::new(&mut wallet, &keystore, &mut reserved);
        builder.add_issuance_input("a1", "coin", 10).unwrap();
        builder.add_issuance_input("a1", "coin", 20).unwrap();
        let tx = builder.sign(&passwords("pw")).unwrap();
        assert_eq!(tx.inputs[0].asset(), tx.inputs[1].asset());
    }

    #[test]
    fn native_asset_is_not_issuable() {
        let (_dir, keystore, mut wallet) = setup();
        let mut reserved = HashSet::new();
        let mut builder = TxBuilder::new(&mut wallet, &keystore, &mut reserved);
        let err = builder
            .add_issuance_input("a1", NATIVE_ASSET_ALIAS, 1)
            .unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::Build(BuildError::NotIssuable(_))
        ));
    }

    #[test]
    fn spend_of_unknown_asset_is_config_error() {
        let (_dir, keystore, mut wallet) = setup();
        let mut reserved = HashSet::new();
        let mut builder = TxBuilder::new(&mut wallet, &keystore, &mut reserved);
        let err = builder.add_spend_input("a1", "phantom", 5).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::Config(ConfigError::UnknownAsset(a)) if a == "phantom"
        ));
    }

    #[test]
    fn spend_without_funds_is_insufficient() {
        let (_dir, keystore, mut wallet) = setup();
        let mut reserved = HashSet::new();
        let mut builder = TxBuilder::new(&mut wallet, &keystore, &mut reserved);
        builder.add_issuance_input("a1", "coin", 1).unwrap();
        // "coin" now exists but no UTXO has confirmed yet.
        let err = builder.add_spend_input("a1", "coin", 5).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::Build(BuildError::InsufficientBalance {
                needed: 5,
                available: 0,
                ..
            })
        ));
    }

    #[test]
    fn wrong_password_is_signature_error() {
        let (_dir, keystore, mut wallet) = setup();
        let mut reserved = HashSet::new();
        let mut builder = TxBuilder::new(&mut wallet, &keystore, &mut reserved);
        builder.add_issuance_input("a1", "coin", 10).unwrap();
        let err = builder.sign(&passwords("wrong")).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::Build(BuildError::Signature { .. })
        ));
    }
}
