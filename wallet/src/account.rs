//! Account registry and address derivation.

use std::collections::{BTreeMap, HashMap};

use ebb_chain::ControlProgram;
use ebb_types::PublicKey;

use crate::error::WalletError;

/// A multi-key account. Immutable after creation apart from its
/// address derivation counter.
#[derive(Clone, Debug)]
pub struct Account {
    pub alias: String,
    pub pubkeys: Vec<PublicKey>,
    pub quorum: usize,
    next_index: u64,
}

/// Which account owns a derived control program, and whether it was
/// derived as a change address.
#[derive(Clone, Debug)]
pub struct ProgramInfo {
    pub account: String,
    pub change: bool,
}

/// Accounts by alias plus the ownership index over derived programs.
#[derive(Default)]
pub struct AccountRegistry {
    accounts: BTreeMap<String, Account>,
    programs: HashMap<ControlProgram, ProgramInfo>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account under a unique alias.
    pub fn create(
        &mut self,
        pubkeys: Vec<PublicKey>,
        quorum: usize,
        alias: &str,
    ) -> Result<&Account, WalletError> {
        if self.accounts.contains_key(alias) {
            return Err(WalletError::DuplicateAccount(alias.to_string()));
        }
        if quorum == 0 || quorum > pubkeys.len() {
            return Err(WalletError::InvalidQuorum {
                alias: alias.to_string(),
                quorum,
                keys: pubkeys.len(),
            });
        }
        let account = Account {
            alias: alias.to_string(),
            pubkeys,
            quorum,
            next_index: 0,
        };
        Ok(self.accounts.entry(alias.to_string()).or_insert(account))
    }

    pub fn find_by_alias(&self, alias: &str) -> Result<&Account, WalletError> {
        self.accounts
            .get(alias)
            .ok_or_else(|| WalletError::UnknownAccount(alias.to_string()))
    }

    /// Derive a fresh receiving address for `alias`. Every call yields
    /// a distinct program, registered in the ownership index.
    pub fn derive_address(
        &mut self,
        alias: &str,
        change: bool,
    ) -> Result<ControlProgram, WalletError> {
        let account = self
            .accounts
            .get_mut(alias)
            .ok_or_else(|| WalletError::UnknownAccount(alias.to_string()))?;
        let index = account.next_index;
        account.next_index += 1;

        let mut preimage = Vec::with_capacity(alias.len() + 16);
        preimage.extend_from_slice(b"ebb.addr.v1");
        preimage.extend_from_slice(alias.as_bytes());
        preimage.push(change as u8);
        preimage.extend_from_slice(&index.to_le_bytes());
        let digest = ebb_crypto::blake2b_256(&preimage);

        let mut bytes = Vec::with_capacity(33);
        bytes.push(0x51);
        bytes.extend_from_slice(&digest);
        let program = ControlProgram::new(bytes);

        self.programs.insert(
            program.clone(),
            ProgramInfo {
                account: alias.to_string(),
                change,
            },
        );
        Ok(program)
    }

    /// Resolve a control program to its owning account, if any.
    pub fn program_owner(&self, program: &ControlProgram) -> Option<&ProgramInfo> {
        self.programs.get(program)
    }
}
