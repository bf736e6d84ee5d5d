//! Wallet subsystem: credential store, account and asset registries,
//! and the UTXO balance index driven by the block attach/detach
//! protocol.

pub mod account;
pub mod asset;
pub mod balance;
pub mod error;
pub mod keystore;
pub mod wallet;

pub use account::{Account, AccountRegistry, ProgramInfo};
pub use asset::{Asset, AssetRegistry, NATIVE_ASSET_ALIAS};
pub use balance::{BalanceRecord, BalanceSnapshot};
pub use error::{KeyError, WalletError};
pub use keystore::{KeyStore, PublicKeyRecord};
pub use wallet::{OwnedUtxo, Wallet};
