//! Shared primitive types for the ebb workspace.

pub mod hash;
pub mod keys;
pub mod time;

pub use hash::{AssetId, BlockHash, TxId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use time::Timestamp;
