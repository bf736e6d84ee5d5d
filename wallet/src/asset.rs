//! Asset registry.

use std::collections::{BTreeMap, HashMap};

use ebb_chain::ControlProgram;
use ebb_types::{AssetId, PublicKey};

use crate::error::WalletError;

/// Alias under which the built-in gas asset is registered.
pub const NATIVE_ASSET_ALIAS: &str = "native";

/// An issuable asset. The issuance policy (keys + quorum) is captured
/// at definition time and never changes.
#[derive(Clone, Debug)]
pub struct Asset {
    pub id: AssetId,
    pub alias: String,
    pub issuer_pubkeys: Vec<PublicKey>,
    pub quorum: usize,
    pub issuance_program: ControlProgram,
}

/// Assets by alias with a reverse id index for balance reporting.
pub struct AssetRegistry {
    by_alias: BTreeMap<String, Asset>,
    alias_by_id: HashMap<AssetId, String>,
}

impl AssetRegistry {
    /// A registry with the native asset pre-registered.
    pub fn new() -> Self {
        let native = Asset {
            id: AssetId::NATIVE,
            alias: NATIVE_ASSET_ALIAS.to_string(),
            issuer_pubkeys: vec![],
            quorum: 0,
            issuance_program: ControlProgram::anchor(),
        };
        let mut by_alias = BTreeMap::new();
        let mut alias_by_id = HashMap::new();
        alias_by_id.insert(native.id, native.alias.clone());
        by_alias.insert(native.alias.clone(), native);
        Self {
            by_alias,
            alias_by_id,
        }
    }

    /// Define a new asset issued under `quorum` of `issuer_keys`.
    ///
    /// The asset id is the hash of the issuance program, so identical
    /// policies under different aliases still get distinct ids via the
    /// alias binding.
    pub fn define(
        &mut self,
        issuer_keys: &[PublicKey],
        quorum: usize,
        alias: &str,
    ) -> Result<&Asset, WalletError> {
        if self.by_alias.contains_key(alias) {
            return Err(WalletError::DuplicateAsset(alias.to_string()));
        }

        let mut preimage = Vec::new();
        preimage.extend_from_slice(b"ebb.issue.v1");
        preimage.extend_from_slice(alias.as_bytes());
        preimage.extend_from_slice(&(quorum as u32).to_le_bytes());
        for key in issuer_keys {
            preimage.extend_from_slice(key.as_bytes());
        }
        let digest = ebb_crypto::blake2b_256(&preimage);

        let mut program_bytes = Vec::with_capacity(33);
        program_bytes.push(0x52);
        program_bytes.extend_from_slice(&digest);
        let issuance_program = ControlProgram::new(program_bytes);
        let id = AssetId::new(ebb_crypto::blake2b_256(issuance_program.as_bytes()));

        let asset = Asset {
            id,
            alias: alias.to_string(),
            issuer_pubkeys: issuer_keys.to_vec(),
            quorum,
            issuance_program,
        };
        self.alias_by_id.insert(id, alias.to_string());
        Ok(self.by_alias.entry(alias.to_string()).or_insert(asset))
    }

    pub fn find_by_alias(&self, alias: &str) -> Result<&Asset, WalletError> {
        self.by_alias
            .get(alias)
            .ok_or_else(|| WalletError::UnknownAsset(alias.to_string()))
    }

    pub fn find_by_id(&self, id: &AssetId) -> Option<&Asset> {
        self.alias_by_id
            .get(id)
            .and_then(|alias| self.by_alias.get(alias))
    }

    /// Alias for an asset id; hex of the id if it was never registered.
    pub fn alias_of(&self, id: &AssetId) -> String {
        self.alias_by_id
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<PublicKey> {
        (0..n).map(|i| PublicKey([i as u8 + 1; 32])).collect()
    }

    #[test]
    fn native_is_preregistered() {
        let reg = AssetRegistry::new();
        let native = reg.find_by_alias(NATIVE_ASSET_ALIAS).unwrap();
        assert_eq!(native.id, AssetId::NATIVE);
        assert_eq!(reg.alias_of(&AssetId::NATIVE), NATIVE_ASSET_ALIAS);
    }

    #[test]
    fn define_assigns_stable_distinct_ids() {
        let mut reg = AssetRegistry::new();
        let gold = reg.define(&keys(1), 1, "gold").unwrap().id;
        let coin = reg.define(&keys(1), 1, "coin").unwrap().id;
        assert_ne!(gold, coin);
        assert_eq!(reg.find_by_alias("gold").unwrap().id, gold);
        assert_eq!(reg.find_by_id(&coin).unwrap().alias, "coin");
    }

    #[test]
    fn duplicate_alias_rejected() {
        let mut reg = AssetRegistry::new();
        reg.define(&keys(1), 1, "gold").unwrap();
        let err = reg.define(&keys(2), 2, "gold").unwrap_err();
        assert!(matches!(err, WalletError::DuplicateAsset(a) if a == "gold"));
    }

    #[test]
    fn native_alias_cannot_be_redefined() {
        let mut reg = AssetRegistry::new();
        let err = reg.define(&keys(1), 1, NATIVE_ASSET_ALIAS).unwrap_err();
        assert!(matches!(err, WalletError::DuplicateAsset(_)));
    }

    #[test]
    fn unregistered_id_falls_back_to_hex() {
        let reg = AssetRegistry::new();
        let id = AssetId::new([7u8; 32]);
        assert_eq!(reg.alias_of(&id), id.to_string());
    }
}
