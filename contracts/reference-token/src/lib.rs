//! Conforming fungible tokens for `MemoryChain`.
//!
//! One implementation, [`StandardToken`], covers the legitimate variations
//! found in deployed tokens through a [`Behaviour`]. Each named preset
//! mirrors a well-known implementation family.

use serde::{Deserialize, Serialize};
use tokenproof_core::chain::{Ledger, Revert, TokenLogic};
use tokenproof_core::notification::{EmittedEvent, EventValue, ORIGIN_FIELD};
use tokenproof_core::{Address, TokenCall, TokenQuery, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    Reject,
    Accept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    Revert,
    ReturnFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnSuccess {
    ReturnTrue,
    /// No return data at all.
    ReturnNothing,
}

/// Field names used in emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventNaming {
    /// `from`/`to`/`value`, `owner`/`spender`/`value`.
    Standard,
    /// `src`/`dst`/`wad`, `src`/`guy`/`wad`.
    Dapp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behaviour {
    pub null_receiver: NullPolicy,
    pub null_spender: NullPolicy,
    pub on_failure: OnFailure,
    pub on_success: OnSuccess,
    /// An allowance of `MAX` is never spent.
    pub infinite_allowance: bool,
    pub event_naming: EventNaming,
    /// Append the caller as an extra `origin` field to every event.
    pub origin_field: bool,
}

impl Behaviour {
    pub const fn openzeppelin() -> Self {
        Self {
            null_receiver: NullPolicy::Reject,
            null_spender: NullPolicy::Reject,
            on_failure: OnFailure::Revert,
            on_success: OnSuccess::ReturnTrue,
            infinite_allowance: true,
            event_naming: EventNaming::Standard,
            origin_field: false,
        }
    }

    pub const fn solmate() -> Self {
        Self {
            null_receiver: NullPolicy::Accept,
            null_spender: NullPolicy::Accept,
            ..Self::openzeppelin()
        }
    }

    pub const fn dapp() -> Self {
        Self {
            event_naming: EventNaming::Dapp,
            origin_field: true,
            ..Self::solmate()
        }
    }

    pub const fn legacy_false() -> Self {
        Self {
            on_failure: OnFailure::ReturnFalse,
            infinite_allowance: false,
            ..Self::openzeppelin()
        }
    }

    pub const fn no_return() -> Self {
        Self {
            on_success: OnSuccess::ReturnNothing,
            null_receiver: NullPolicy::Accept,
            ..Self::openzeppelin()
        }
    }

    pub const fn finite_allowance() -> Self {
        Self {
            infinite_allowance: false,
            ..Self::openzeppelin()
        }
    }
}

impl Default for Behaviour {
    fn default() -> Self {
        Self::openzeppelin()
    }
}

/// Every preset with its name, in a stable order.
pub const PRESETS: &[(&str, Behaviour)] = &[
    ("openzeppelin", Behaviour::openzeppelin()),
    ("solmate", Behaviour::solmate()),
    ("dapp", Behaviour::dapp()),
    ("legacy-false", Behaviour::legacy_false()),
    ("no-return", Behaviour::no_return()),
    ("finite-allowance", Behaviour::finite_allowance()),
];

pub fn preset(name: &str) -> Option<Behaviour> {
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, behaviour)| *behaviour)
}

#[derive(Debug, Clone)]
pub struct StandardToken {
    name: String,
    behaviour: Behaviour,
    ledger: Ledger,
}

impl StandardToken {
    pub fn new(name: impl Into<String>, behaviour: Behaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            ledger: Ledger::new(),
        }
    }

    pub fn behaviour(&self) -> &Behaviour {
        &self.behaviour
    }

    fn fail(&self, reason: &str) -> Result<Option<bool>, Revert> {
        match self.behaviour.on_failure {
            OnFailure::Revert => Err(Revert::new(reason)),
            OnFailure::ReturnFalse => Ok(Some(false)),
        }
    }

    fn succeed(&self) -> Result<Option<bool>, Revert> {
        match self.behaviour.on_success {
            OnSuccess::ReturnTrue => Ok(Some(true)),
            OnSuccess::ReturnNothing => Ok(None),
        }
    }

    fn event(&self, name: &str, caller: Address, first: Address, second: Address, amount: U256) -> EmittedEvent {
        let names = match (self.behaviour.event_naming, name) {
            (EventNaming::Standard, "Transfer") => ["from", "to", "value"],
            (EventNaming::Standard, _) => ["owner", "spender", "value"],
            (EventNaming::Dapp, "Transfer") => ["src", "dst", "wad"],
            (EventNaming::Dapp, _) => ["src", "guy", "wad"],
        };
        let mut event = EmittedEvent::new(name)
            .with_field(names[0], EventValue::Address(first))
            .with_field(names[1], EventValue::Address(second))
            .with_field(names[2], EventValue::Uint(amount));
        if self.behaviour.origin_field {
            event = event.with_field(ORIGIN_FIELD, EventValue::Address(caller));
        }
        event
    }

    fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert> {
        if spender == Address::ZERO && self.behaviour.null_spender == NullPolicy::Reject {
            return self.fail("approve to the zero address");
        }
        self.ledger.set_allowance(owner, spender, amount);
        events.push(self.event("Approval", owner, owner, spender, amount));
        self.succeed()
    }

    fn transfer(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: U256,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert> {
        if to == Address::ZERO && self.behaviour.null_receiver == NullPolicy::Reject {
            return self.fail("transfer to the zero address");
        }
        if self.ledger.balance_of(from) < amount {
            return self.fail("transfer amount exceeds balance");
        }
        self.ledger.move_balance(from, to, amount)?;
        events.push(self.event("Transfer", caller, from, to, amount));
        self.succeed()
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert> {
        let allowance = self.ledger.allowance(from, spender);
        if allowance < amount {
            return self.fail("insufficient allowance");
        }
        // Checked before the allowance is spent so a `false` return leaves
        // no partial update behind.
        if to == Address::ZERO && self.behaviour.null_receiver == NullPolicy::Reject {
            return self.fail("transfer to the zero address");
        }
        if self.ledger.balance_of(from) < amount {
            return self.fail("transfer amount exceeds balance");
        }
        if !(self.behaviour.infinite_allowance && allowance == U256::MAX) {
            self.ledger.set_allowance(from, spender, allowance - amount);
        }
        self.transfer(spender, from, to, amount, events)
    }
}

impl TokenLogic for StandardToken {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &mut self,
        caller: Address,
        call: &TokenCall,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert> {
        match *call {
            TokenCall::Approve { spender, amount } => self.approve(caller, spender, amount, events),
            TokenCall::Transfer { to, amount } => self.transfer(caller, caller, to, amount, events),
            TokenCall::TransferFrom { from, to, amount } => {
                self.transfer_from(caller, from, to, amount, events)
            }
        }
    }

    fn query(&self, query: &TokenQuery) -> Result<U256, Revert> {
        Ok(self.ledger.query(query))
    }

    fn mint(&mut self, to: Address, amount: U256) -> Result<(), Revert> {
        self.ledger.mint(to, amount)
    }

    fn box_clone(&self) -> Box<dyn TokenLogic> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_presets_are_named_uniquely() {
        for (name, behaviour) in PRESETS {
            assert_eq!(preset(name), Some(*behaviour));
        }
        assert_eq!(preset("unknown"), None);
        assert_eq!(Behaviour::default(), Behaviour::openzeppelin());
    }

    #[test]
    fn test_return_false_leaves_allowance_untouched() {
        let mut token = StandardToken::new("legacy", Behaviour::legacy_false());
        let (owner, spender) = (addr(1), addr(2));
        token.ledger.set_allowance(owner, spender, U256::from(5u64));

        let mut events = Vec::new();
        let result = token.execute(
            spender,
            &TokenCall::TransferFrom {
                from: owner,
                to: spender,
                amount: U256::from(5u64),
            },
            &mut events,
        );

        assert_eq!(result, Ok(Some(false)));
        assert!(events.is_empty());
        assert_eq!(token.ledger.allowance(owner, spender), U256::from(5u64));
    }

    #[test]
    fn test_dapp_events_carry_origin() {
        let mut token = StandardToken::new("dapp", Behaviour::dapp());
        let mut events = Vec::new();
        token
            .execute(
                addr(1),
                &TokenCall::Approve {
                    spender: addr(2),
                    amount: U256::from(3u64),
                },
                &mut events,
            )
            .unwrap();

        let names: Vec<_> = events[0].fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["src", "guy", "wad", ORIGIN_FIELD]);
        assert!(events[0].matches(&tokenproof_core::Notification::Approval {
            owner: addr(1),
            spender: addr(2),
            value: U256::from(3u64),
        }));
    }
}
