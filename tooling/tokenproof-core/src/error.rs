use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::verdict::Violation;

/// Precondition failures of the reference model.
///
/// These mean "the modeled operation must fail"; the oracle turns them into
/// expectations, never into conformance verdicts on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("{role} must not be the null account")]
    NullAccount { role: &'static str },
    #[error("insufficient balance of {account}: have {balance}, need {required}")]
    InsufficientBalance {
        account: Address,
        balance: U256,
        required: U256,
    },
    #[error("insufficient allowance of {spender} over {owner}: have {allowance}, need {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: U256,
        required: U256,
    },
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
    #[error("initial supply {supply} is less than the sum of the initial balances {balances}")]
    SupplyBelowBalances { supply: U256, balances: U256 },
}

/// Failures of the execution substrate itself (not of the token under test).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstrateError {
    #[error("no token deployed at {0}")]
    UnknownContract(Address),
    #[error("snapshot {0} does not exist")]
    UnknownSnapshot(u64),
    #[error("view call {query} reverted: {reason}")]
    QueryReverted { query: String, reason: String },
    #[error("minting {amount} to {to} failed: {reason}")]
    MintFailed {
        to: Address,
        amount: U256,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Violation(#[from] Violation),
    #[error("reference model rejected the operation: {0}")]
    Model(#[from] ModelError),
    #[error("substrate failure: {0}")]
    Substrate(#[from] SubstrateError),
}

impl OracleError {
    /// Stable label used to recognise "the same failure" when shrinking.
    pub fn signature(&self) -> String {
        match self {
            OracleError::Violation(v) => format!("violation:{:?}", v.kind),
            OracleError::Model(_) => "model".to_string(),
            OracleError::Substrate(_) => "substrate".to_string(),
        }
    }

    pub fn as_violation(&self) -> Option<&Violation> {
        match self {
            OracleError::Violation(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("invalid campaign configuration: {0}")]
    InvalidConfig(String),
    #[error("sequence setup failed: {0}")]
    Setup(#[source] OracleError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Substrate(#[from] SubstrateError),
}
