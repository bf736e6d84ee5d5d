//! The reconciliation oracle.
//!
//! Runs a declarative scenario against a fresh chain + wallet pair:
//! builds and attaches blocks, verifies declared post-state balances,
//! then forces a chain reorganization and proves the wallet's
//! aggregated balances converge back to the snapshot taken at the fork
//! point.

pub mod assemble;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod scenario;
pub mod txbuild;

pub use config::{Action, ScenarioConfig};
pub use error::{BuildError, ConfigError, InvariantError, ScenarioError};
pub use scenario::{Scenario, ScenarioContext};
