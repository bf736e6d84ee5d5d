//! The chain service: blocks, transactions, proof-of-work, reorganization.
//!
//! `Chain` keeps every seen block in memory plus an index of the active
//! chain by height. Attaching solves proof-of-work and validates the
//! block against the tip; `reorganize_to` truncates the active index
//! back to an earlier block while keeping detached blocks retrievable
//! by hash.

pub mod block;
pub mod chain;
pub mod error;
pub mod tx;
pub mod work;

pub use block::{Block, BlockHeader, BLOCK_INTERVAL_SECS, BLOCK_SUBSIDY};
pub use chain::Chain;
pub use error::ChainError;
pub use tx::{ControlProgram, InputWitness, OutPoint, Tx, TxInput, TxOutput};
