//! Execution adapter: the narrow interface the oracle needs from whatever
//! actually runs the token (an in-process chain, a fork, a node).
//!
//! Handles are normalized to [`Address`] at this boundary; nothing past it
//! sees anything but raw addresses.

use std::fmt;
use std::ops::{Deref, DerefMut};

use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::error::SubstrateError;
use crate::notification::EmittedEvent;

/// Mutating calls of the token interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum TokenCall {
    Transfer {
        to: Address,
        amount: U256,
    },
    TransferFrom {
        from: Address,
        to: Address,
        amount: U256,
    },
    Approve {
        spender: Address,
        amount: U256,
    },
}

impl TokenCall {
    pub fn name(&self) -> &'static str {
        match self {
            TokenCall::Transfer { .. } => "transfer",
            TokenCall::TransferFrom { .. } => "transferFrom",
            TokenCall::Approve { .. } => "approve",
        }
    }
}

impl fmt::Display for TokenCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenCall::Transfer { to, amount } => write!(f, "transfer({to}, {amount})"),
            TokenCall::TransferFrom { from, to, amount } => {
                write!(f, "transferFrom({from}, {to}, {amount})")
            }
            TokenCall::Approve { spender, amount } => write!(f, "approve({spender}, {amount})"),
        }
    }
}

/// View calls of the token interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenQuery {
    TotalSupply,
    BalanceOf(Address),
    Allowance { owner: Address, spender: Address },
}

impl fmt::Display for TokenQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenQuery::TotalSupply => f.write_str("totalSupply()"),
            TokenQuery::BalanceOf(account) => write!(f, "balanceOf({account})"),
            TokenQuery::Allowance { owner, spender } => write!(f, "allowance({owner}, {spender})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    /// The call completed. `None` means the implementation returned no data.
    Returned(Option<bool>),
    Reverted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReceipt {
    pub status: CallStatus,
    /// Always empty for a reverted call.
    pub events: Vec<EmittedEvent>,
}

impl CallReceipt {
    pub fn reverted(&self) -> bool {
        matches!(self.status, CallStatus::Reverted(_))
    }

    /// `true` only for an explicit `true` return value.
    pub fn returned_true(&self) -> bool {
        matches!(self.status, CallStatus::Returned(Some(true)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(pub u64);

pub trait Substrate {
    fn accounts(&self) -> Vec<Address>;

    fn call(
        &mut self,
        token: Address,
        caller: Address,
        call: &TokenCall,
    ) -> Result<CallReceipt, SubstrateError>;

    fn read(&self, token: Address, query: &TokenQuery) -> Result<U256, SubstrateError>;

    fn snapshot(&mut self) -> Result<SnapshotId, SubstrateError>;

    /// Restore the state captured by `id`. The snapshot is consumed, as are
    /// any taken after it.
    fn revert_to(&mut self, id: SnapshotId) -> Result<(), SubstrateError>;

    /// Test-only cheat: credit `amount` to `to` and to the total supply
    /// without going through the token's own entry points.
    fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), SubstrateError>;
}

impl<S: Substrate + ?Sized> Substrate for &mut S {
    fn accounts(&self) -> Vec<Address> {
        (**self).accounts()
    }

    fn call(
        &mut self,
        token: Address,
        caller: Address,
        call: &TokenCall,
    ) -> Result<CallReceipt, SubstrateError> {
        (**self).call(token, caller, call)
    }

    fn read(&self, token: Address, query: &TokenQuery) -> Result<U256, SubstrateError> {
        (**self).read(token, query)
    }

    fn snapshot(&mut self) -> Result<SnapshotId, SubstrateError> {
        (**self).snapshot()
    }

    fn revert_to(&mut self, id: SnapshotId) -> Result<(), SubstrateError> {
        (**self).revert_to(id)
    }

    fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), SubstrateError> {
        (**self).mint(token, to, amount)
    }
}

// ── Scoped snapshots ──────────────────────────────────────────────────────────

/// Restores the substrate to the state it had at construction when dropped,
/// on every exit path including unwinding.
pub struct SnapshotGuard<'a, S: Substrate + ?Sized> {
    substrate: &'a mut S,
    id: SnapshotId,
}

impl<'a, S: Substrate + ?Sized> SnapshotGuard<'a, S> {
    pub fn new(substrate: &'a mut S) -> Result<Self, SubstrateError> {
        let id = substrate.snapshot()?;
        tracing::trace!(snapshot = id.0, "snapshot taken");
        Ok(Self { substrate, id })
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }
}

impl<S: Substrate + ?Sized> Deref for SnapshotGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.substrate
    }
}

impl<S: Substrate + ?Sized> DerefMut for SnapshotGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.substrate
    }
}

impl<S: Substrate + ?Sized> Drop for SnapshotGuard<'_, S> {
    fn drop(&mut self) {
        match self.substrate.revert_to(self.id) {
            Ok(()) => tracing::trace!(snapshot = self.id.0, "snapshot restored"),
            Err(err) => {
                tracing::error!(snapshot = self.id.0, error = %err, "failed to restore snapshot");
                // Continuing on a corrupted substrate would make every later
                // verdict meaningless.
                if !std::thread::panicking() {
                    panic!("failed to restore snapshot {}: {err}", self.id.0);
                }
            }
        }
    }
}

/// Run `f` against the substrate and roll back everything it did.
pub fn with_snapshot<S, R, E, F>(substrate: &mut S, f: F) -> Result<R, E>
where
    S: Substrate + ?Sized,
    E: From<SubstrateError>,
    F: FnOnce(&mut S) -> Result<R, E>,
{
    let mut guard = SnapshotGuard::new(substrate)?;
    f(&mut *guard)
}

// ── Account handles ───────────────────────────────────────────────────────────

/// A labelled account handle, as scenario code likes to pass around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub label: String,
    pub address: Address,
}

impl Account {
    pub fn new(label: impl Into<String>, address: Address) -> Self {
        Self {
            label: label.into(),
            address,
        }
    }

    pub fn null() -> Self {
        Self::new("null", Address::ZERO)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.address)
    }
}

impl From<Account> for Address {
    fn from(account: Account) -> Self {
        account.address
    }
}

impl From<&Account> for Address {
    fn from(account: &Account) -> Self {
        account.address
    }
}
