//! A small configurable token used by the unit tests.

use alloy_primitives::{Address, U256};

use crate::chain::{Ledger, MemoryChain, Revert, TokenLogic};
use crate::model::ReferenceModel;
use crate::notification::EmittedEvent;
use crate::oracle::DifferentialOracle;
use crate::substrate::{Substrate, TokenCall, TokenQuery};

/// One deviation from the conforming behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quirk {
    #[default]
    None,
    /// Failures return `false` instead of reverting.
    ReturnFalse,
    /// Successful calls return no data.
    NoReturn,
    /// Transfers to the null account go through.
    AcceptNullReceiver,
    /// `approve` with the null spender goes through.
    AcceptNullSpender,
    /// `transferFrom` never spends the allowance.
    SkipAllowanceDecrement,
    /// `approve` emits nothing.
    NoApprovalEvent,
    /// One base unit of every positive transfer is burned.
    FeeOnTransfer,
    /// An allowance of `MAX` is spent like any other.
    FiniteMaxAllowance,
    /// `approve` takes effect for any spender but returns `false`.
    SilentApprove,
}

#[derive(Debug, Clone, Default)]
pub struct QuirkToken {
    ledger: Ledger,
    quirk: Quirk,
}

impl QuirkToken {
    pub fn new(quirk: Quirk) -> Self {
        Self {
            ledger: Ledger::new(),
            quirk,
        }
    }

    fn fail(&self, reason: &str) -> Result<Option<bool>, Revert> {
        match self.quirk {
            Quirk::ReturnFalse => Ok(Some(false)),
            _ => Err(Revert::new(reason)),
        }
    }

    fn ok(&self) -> Result<Option<bool>, Revert> {
        match self.quirk {
            Quirk::NoReturn => Ok(None),
            _ => Ok(Some(true)),
        }
    }

    fn move_tokens(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert> {
        if to == Address::ZERO && self.quirk != Quirk::AcceptNullReceiver {
            return self.fail("transfer to the zero address");
        }
        if self.ledger.balance_of(from) < amount {
            return self.fail("transfer amount exceeds balance");
        }
        if self.quirk == Quirk::FeeOnTransfer && !amount.is_zero() {
            let fee = U256::from(1u64);
            self.ledger.move_balance(from, to, amount - fee)?;
            let remaining = self.ledger.balance_of(from) - fee;
            self.ledger.set_balance(from, remaining);
            self.ledger.set_total_supply(self.ledger.total_supply() - fee);
        } else {
            self.ledger.move_balance(from, to, amount)?;
        }
        events.push(EmittedEvent::transfer(from, to, amount));
        self.ok()
    }
}

impl TokenLogic for QuirkToken {
    fn name(&self) -> &str {
        "quirk"
    }

    fn execute(
        &mut self,
        caller: Address,
        call: &TokenCall,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert> {
        match *call {
            TokenCall::Approve { spender, amount } => {
                let accepts_null = matches!(self.quirk, Quirk::AcceptNullSpender | Quirk::SilentApprove);
                if spender == Address::ZERO && !accepts_null {
                    return self.fail("approve to the zero address");
                }
                self.ledger.set_allowance(caller, spender, amount);
                if self.quirk != Quirk::NoApprovalEvent {
                    events.push(EmittedEvent::approval(caller, spender, amount));
                }
                if self.quirk == Quirk::SilentApprove {
                    return Ok(Some(false));
                }
                self.ok()
            }
            TokenCall::Transfer { to, amount } => self.move_tokens(caller, to, amount, events),
            TokenCall::TransferFrom { from, to, amount } => {
                let allowance = self.ledger.allowance(from, caller);
                if allowance < amount {
                    return self.fail("insufficient allowance");
                }
                if self.ledger.balance_of(from) < amount {
                    return self.fail("transfer amount exceeds balance");
                }
                let sticky = allowance == U256::MAX && self.quirk != Quirk::FiniteMaxAllowance;
                if !sticky && self.quirk != Quirk::SkipAllowanceDecrement {
                    self.ledger.set_allowance(from, caller, allowance - amount);
                }
                self.move_tokens(from, to, amount, events)
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

pub const ACCOUNTS: usize = 6;

pub fn deploy(quirk: Quirk) -> (MemoryChain, Address) {
    let mut chain = MemoryChain::new(ACCOUNTS);
    let token = chain.deploy(Box::new(QuirkToken::new(quirk)));
    (chain, token)
}

pub fn accounts(chain: &MemoryChain) -> Vec<Address> {
    chain.accounts()
}

pub fn oracle(chain: &mut MemoryChain, token: Address) -> DifferentialOracle<&mut MemoryChain> {
    DifferentialOracle::new(chain, token, ReferenceModel::empty(true))
}

pub fn u(value: u64) -> U256 {
    U256::from(value)
}
