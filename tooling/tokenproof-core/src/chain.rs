//! `MemoryChain`: a small in-process substrate that hosts [`TokenLogic`]
//! implementations.
//!
//! Calls are atomic (a revert restores the contract and drops its events) and
//! snapshots form a stack, so the oracle's probes behave exactly as they
//! would against a forked node.

use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::error::SubstrateError;
use crate::notification::EmittedEvent;
use crate::substrate::{CallReceipt, CallStatus, SnapshotId, Substrate, TokenCall, TokenQuery};

/// Reason a token implementation rejected a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Revert(pub String);

impl Revert {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A token contract as seen by `MemoryChain`.
pub trait TokenLogic: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Execute a mutating call. Events pushed before an `Err` are discarded.
    fn execute(
        &mut self,
        caller: Address,
        call: &TokenCall,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert>;

    fn query(&self, query: &TokenQuery) -> Result<U256, Revert>;

    /// Storage-level credit used by test setup.
    fn mint(&mut self, to: Address, amount: U256) -> Result<(), Revert>;

    fn box_clone(&self) -> Box<dyn TokenLogic>;
}

impl Clone for Box<dyn TokenLogic> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

// ── Ledger ────────────────────────────────────────────────────────────────────

/// Plain token storage: supply, balances, allowances. Implementations layer
/// their own rules on top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    total_supply: U256,
    balances: BTreeMap<Address, U256>,
    allowances: BTreeMap<(Address, Address), U256>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn set_total_supply(&mut self, value: U256) {
        self.total_supply = value;
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn set_balance(&mut self, account: Address, value: U256) {
        if value.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, value);
        }
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_allowance(&mut self, owner: Address, spender: Address, value: U256) {
        if value.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), value);
        }
    }

    pub fn mint(&mut self, to: Address, amount: U256) -> Result<(), Revert> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| Revert::new("total supply overflow"))?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| Revert::new("balance overflow"))?;
        self.total_supply = supply;
        self.set_balance(to, balance);
        Ok(())
    }

    /// Move `amount` from `from` to `to` with the usual balance check.
    pub fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), Revert> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(Revert::new("transfer amount exceeds balance"));
        }
        self.set_balance(from, from_balance - amount);
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| Revert::new("balance overflow"))?;
        self.set_balance(to, to_balance);
        Ok(())
    }

    pub fn query(&self, query: &TokenQuery) -> U256 {
        match *query {
            TokenQuery::TotalSupply => self.total_supply,
            TokenQuery::BalanceOf(account) => self.balance_of(account),
            TokenQuery::Allowance { owner, spender } => self.allowance(owner, spender),
        }
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

type Contracts = BTreeMap<Address, Box<dyn TokenLogic>>;

#[derive(Debug, Clone)]
pub struct MemoryChain {
    accounts: Vec<Address>,
    contracts: Contracts,
    snapshots: Vec<Contracts>,
    deployed: u64,
}

impl MemoryChain {
    /// A chain with `n_accounts` deterministic, non-null externally owned
    /// accounts.
    pub fn new(n_accounts: usize) -> Self {
        let accounts = (1..=n_accounts as u64)
            .map(|i| indexed_address(0xA0, i))
            .collect();
        Self {
            accounts,
            contracts: Contracts::new(),
            snapshots: Vec::new(),
            deployed: 0,
        }
    }

    pub fn deploy(&mut self, logic: Box<dyn TokenLogic>) -> Address {
        self.deployed += 1;
        let address = indexed_address(0xC0, self.deployed);
        tracing::debug!(token = logic.name(), %address, "deployed token");
        self.contracts.insert(address, logic);
        address
    }

    pub fn token_name(&self, token: Address) -> Option<&str> {
        self.contracts.get(&token).map(|logic| logic.name())
    }

    /// Number of live snapshots.
    pub fn snapshot_depth(&self) -> usize {
        self.snapshots.len()
    }

    fn contract(&self, token: Address) -> Result<&dyn TokenLogic, SubstrateError> {
        self.contracts
            .get(&token)
            .map(|logic| &**logic)
            .ok_or(SubstrateError::UnknownContract(token))
    }

    fn contract_mut(&mut self, token: Address) -> Result<&mut Box<dyn TokenLogic>, SubstrateError> {
        self.contracts
            .get_mut(&token)
            .ok_or(SubstrateError::UnknownContract(token))
    }
}

fn indexed_address(prefix: u8, index: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = prefix;
    bytes[12..].copy_from_slice(&index.to_be_bytes());
    Address::from(bytes)
}

impl Substrate for MemoryChain {
    fn accounts(&self) -> Vec<Address> {
        self.accounts.clone()
    }

    fn call(
        &mut self,
        token: Address,
        caller: Address,
        call: &TokenCall,
    ) -> Result<CallReceipt, SubstrateError> {
        let logic = self.contract_mut(token)?;
        let before = logic.clone();
        let mut events = Vec::new();

        let receipt = match logic.execute(caller, call, &mut events) {
            Ok(returned) => CallReceipt {
                status: CallStatus::Returned(returned),
                events,
            },
            Err(Revert(reason)) => {
                *logic = before;
                CallReceipt {
                    status: CallStatus::Reverted(reason),
                    events: Vec::new(),
                }
            }
        };
        tracing::trace!(%token, %caller, %call, status = ?receipt.status, "call");
        Ok(receipt)
    }

    fn read(&self, token: Address, query: &TokenQuery) -> Result<U256, SubstrateError> {
        self.contract(token)?
            .query(query)
            .map_err(|Revert(reason)| SubstrateError::QueryReverted {
                query: query.to_string(),
                reason,
            })
    }

    fn snapshot(&mut self) -> Result<SnapshotId, SubstrateError> {
        self.snapshots.push(self.contracts.clone());
        Ok(SnapshotId(self.snapshots.len() as u64 - 1))
    }

    fn revert_to(&mut self, id: SnapshotId) -> Result<(), SubstrateError> {
        let index = usize::try_from(id.0).map_err(|_| SubstrateError::UnknownSnapshot(id.0))?;
        if index >= self.snapshots.len() {
            return Err(SubstrateError::UnknownSnapshot(id.0));
        }
        self.snapshots.truncate(index + 1);
        if let Some(contracts) = self.snapshots.pop() {
            self.contracts = contracts;
        }
        Ok(())
    }

    fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), SubstrateError> {
        self.contract_mut(token)?
            .mint(to, amount)
            .map_err(|Revert(reason)| SubstrateError::MintFailed { to, amount, reason })
    }
}
