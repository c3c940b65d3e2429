//! Differential conformance testing for fungible-token contracts.
//!
//! A [`ReferenceModel`] describes what a conforming token must do. The
//! [`DifferentialOracle`] runs every operation against the model and a real
//! token behind a [`Substrate`], and classifies the outcome as a [`Verdict`].
//! [`Campaign`] drives randomized sequences through the oracle; the
//! [`scenarios`] module holds the fixed checklist sequences.

pub mod campaign;
pub mod chain;
pub mod config;
pub mod error;
pub mod model;
pub mod notification;
pub mod oracle;
pub mod scenarios;
pub mod shrink;
pub mod substrate;
pub mod verdict;

pub use alloy_primitives::{Address, U256};

pub use campaign::{Campaign, CampaignConfig, CampaignReport, Flow, SequenceFailure};
pub use chain::{Ledger, MemoryChain, Revert, TokenLogic};
pub use config::{ScenarioConfig, TokenproofConfig, CONFIG_FILE};
pub use error::{CampaignError, ModelError, OracleError, SubstrateError};
pub use model::{ModelConfig, OpOptions, ReferenceModel};
pub use notification::{EmittedEvent, EventValue, Notification};
pub use oracle::DifferentialOracle;
pub use scenarios::{Level, Scenario, ScenarioReport, ScenarioStatus, SCENARIOS};
pub use substrate::{
    with_snapshot, Account, CallReceipt, CallStatus, SnapshotGuard, SnapshotId, Substrate,
    TokenCall, TokenQuery,
};
pub use verdict::{Verdict, Violation, ViolationKind, Warning, WarningKind, WarningStats};

#[cfg(test)]
mod tests;
