//! In-memory reference model of the token interface.
//!
//! The model mirrors `totalSupply`, balances and allowances and nothing else.
//! Every mutating operation has a `dry_run` mode so the oracle can ask "would
//! this succeed?" without needing to roll the model back.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::notification::Notification;

pub type Balances = BTreeMap<Address, U256>;
pub type Allowances = BTreeMap<Address, BTreeMap<Address, U256>>;

/// Per-operation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpOptions {
    /// Permit the null account where it is otherwise rejected
    /// (mint target, burn source, approval spender, transfer receiver).
    pub allow_null: bool,
    /// Validate and report notifications without mutating state.
    pub dry_run: bool,
}

impl OpOptions {
    pub const fn new() -> Self {
        Self {
            allow_null: false,
            dry_run: false,
        }
    }

    pub const fn allowing_null(mut self, allow: bool) -> Self {
        self.allow_null = allow;
        self
    }

    pub const fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub initial_supply: U256,
    #[serde(default = "default_static_max_allowance")]
    pub static_max_allowance: bool,
    #[serde(default)]
    pub initial_balances: Balances,
    #[serde(default)]
    pub initial_allowances: Allowances,
}

fn default_static_max_allowance() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            initial_supply: U256::ZERO,
            static_max_allowance: default_static_max_allowance(),
            initial_balances: Balances::new(),
            initial_allowances: Allowances::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceModel {
    total_supply: U256,
    balances: Balances,
    allowances: Allowances,
    static_max_allowance: bool,
}

impl ReferenceModel {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let mut model = Self::empty(config.static_max_allowance);
        model.total_supply = config.initial_supply;
        for (account, value) in config.initial_balances {
            model.set_balance(account, value);
        }
        for (owner, spenders) in config.initial_allowances {
            for (spender, value) in spenders {
                model.set_allowance(owner, spender, value);
            }
        }

        let balances = model.sum_balances()?;
        if model.total_supply < balances {
            return Err(ModelError::SupplyBelowBalances {
                supply: model.total_supply,
                balances,
            });
        }
        Ok(model)
    }

    pub fn empty(static_max_allowance: bool) -> Self {
        Self {
            total_supply: U256::ZERO,
            balances: Balances::new(),
            allowances: Allowances::new(),
            static_max_allowance,
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&owner)
            .and_then(|spenders| spenders.get(&spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn static_max_allowance(&self) -> bool {
        self.static_max_allowance
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn allowances(&self) -> &Allowances {
        &self.allowances
    }

    pub fn sum_balances(&self) -> Result<U256, ModelError> {
        self.balances.values().try_fold(U256::ZERO, |acc, value| {
            acc.checked_add(*value)
                .ok_or(ModelError::Overflow("sum of balances"))
        })
    }

    // ── Writes (zero entries are dropped so reads never see stale keys) ──────

    fn set_balance(&mut self, account: Address, value: U256) {
        if value.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, value);
        }
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, value: U256) {
        if value.is_zero() {
            if let Some(spenders) = self.allowances.get_mut(&owner) {
                spenders.remove(&spender);
                if spenders.is_empty() {
                    self.allowances.remove(&owner);
                }
            }
        } else {
            self.allowances
                .entry(owner)
                .or_default()
                .insert(spender, value);
        }
    }

    // ── Operations ────────────────────────────────────────────────────────────

    pub fn mint(
        &mut self,
        to: Address,
        amount: U256,
        opts: OpOptions,
    ) -> Result<Vec<Notification>, ModelError> {
        if to == Address::ZERO && !opts.allow_null {
            return Err(ModelError::NullAccount { role: "mint recipient" });
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(ModelError::Overflow("total supply"))?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(ModelError::Overflow("mint recipient balance"))?;

        if !opts.dry_run {
            self.total_supply = supply;
            self.set_balance(to, balance);
        }
        Ok(vec![Notification::Transfer {
            from: Address::ZERO,
            to,
            value: amount,
        }])
    }

    pub fn burn(
        &mut self,
        from: Address,
        amount: U256,
        opts: OpOptions,
    ) -> Result<Vec<Notification>, ModelError> {
        if from == Address::ZERO && !opts.allow_null {
            return Err(ModelError::NullAccount { role: "burn source" });
        }
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(ModelError::InsufficientBalance {
                account: from,
                balance,
                required: amount,
            });
        }

        if !opts.dry_run {
            self.set_balance(from, balance - amount);
            self.total_supply -= amount;
        }
        Ok(vec![Notification::Transfer {
            from,
            to: Address::ZERO,
            value: amount,
        }])
    }

    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
        opts: OpOptions,
    ) -> Result<Vec<Notification>, ModelError> {
        if owner == Address::ZERO {
            return Err(ModelError::NullAccount { role: "owner" });
        }
        if spender == Address::ZERO && !opts.allow_null {
            return Err(ModelError::NullAccount { role: "spender" });
        }

        if !opts.dry_run {
            self.set_allowance(owner, spender, amount);
        }
        Ok(vec![Notification::Approval {
            owner,
            spender,
            value: amount,
        }])
    }

    pub fn transfer(
        &mut self,
        owner: Address,
        receiver: Address,
        amount: U256,
        opts: OpOptions,
    ) -> Result<Vec<Notification>, ModelError> {
        // A zero-value transfer from the null account is tolerated.
        if !amount.is_zero() && owner == Address::ZERO {
            return Err(ModelError::NullAccount { role: "owner" });
        }
        if receiver == Address::ZERO && !opts.allow_null {
            return Err(ModelError::NullAccount { role: "receiver" });
        }
        let balance = self.balance_of(owner);
        if balance < amount {
            return Err(ModelError::InsufficientBalance {
                account: owner,
                balance,
                required: amount,
            });
        }

        let debited = balance - amount;
        let receiver_before = if receiver == owner {
            debited
        } else {
            self.balance_of(receiver)
        };
        let credited = receiver_before
            .checked_add(amount)
            .ok_or(ModelError::Overflow("receiver balance"))?;

        if !opts.dry_run {
            self.set_balance(owner, debited);
            self.set_balance(receiver, credited);
        }
        Ok(vec![Notification::Transfer {
            from: owner,
            to: receiver,
            value: amount,
        }])
    }

    pub fn transfer_from(
        &mut self,
        owner: Address,
        spender: Address,
        receiver: Address,
        amount: U256,
        opts: OpOptions,
    ) -> Result<Vec<Notification>, ModelError> {
        if spender == Address::ZERO {
            return Err(ModelError::NullAccount { role: "spender" });
        }
        let allowance = self.allowance(owner, spender);
        if allowance < amount {
            return Err(ModelError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                required: amount,
            });
        }

        let notifications = self.transfer(owner, receiver, amount, opts)?;

        // MAX is only a sentinel when stickiness is enabled; otherwise it is
        // decremented like any other allowance.
        if !opts.dry_run && (allowance != U256::MAX || !self.static_max_allowance) {
            self.set_allowance(owner, spender, allowance - amount);
        }
        Ok(notifications)
    }

    // ── Predicates ────────────────────────────────────────────────────────────

    pub fn should_approve_succeed(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
        allow_null: bool,
    ) -> bool {
        let opts = OpOptions::new().allowing_null(allow_null).dry_run();
        self.approve(owner, spender, amount, opts).is_ok()
    }

    pub fn should_transfer_succeed(
        &mut self,
        owner: Address,
        receiver: Address,
        amount: U256,
        allow_null: bool,
    ) -> bool {
        let opts = OpOptions::new().allowing_null(allow_null).dry_run();
        self.transfer(owner, receiver, amount, opts).is_ok()
    }

    pub fn should_transfer_from_succeed(
        &mut self,
        owner: Address,
        spender: Address,
        receiver: Address,
        amount: U256,
        allow_null: bool,
    ) -> bool {
        let opts = OpOptions::new().allowing_null(allow_null).dry_run();
        self.transfer_from(owner, spender, receiver, amount, opts)
            .is_ok()
    }
}
