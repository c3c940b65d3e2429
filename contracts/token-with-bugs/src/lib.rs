//! Deliberately broken tokens. Each [`Bug`] breaks exactly one rule; the
//! oracle must catch every one of them.

use serde::Serialize;
use tokenproof_core::chain::{Ledger, Revert, TokenLogic};
use tokenproof_core::notification::EmittedEvent;
use tokenproof_core::{Address, TokenCall, TokenQuery, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bug {
    /// `transferFrom` never spends the allowance.
    SkipAllowanceDecrement,
    /// A self-transfer credits the receiver without debiting the sender.
    SelfTransferMints,
    /// `approve` emits no `Approval` event.
    MissingApprovalEvent,
    /// `transferFrom` emits no `Transfer` event.
    MissingTransferFromEvent,
    /// One base unit of every positive transfer is burned.
    FeeOnTransfer,
    /// `transfer` does not check the sender's balance and wraps around.
    NoBalanceCheck,
    /// `approve` adds to the allowance instead of replacing it.
    ApproveAdds,
    /// Failing calls return `true` and change nothing.
    TrueOnFailure,
    /// `transferFrom` checks the spender's balance, not the owner's.
    ChecksSpenderBalance,
    /// `Transfer` events swap sender and receiver.
    SwappedTransferEvent,
}

impl Bug {
    pub const ALL: [Bug; 10] = [
        Bug::SkipAllowanceDecrement,
        Bug::SelfTransferMints,
        Bug::MissingApprovalEvent,
        Bug::MissingTransferFromEvent,
        Bug::FeeOnTransfer,
        Bug::NoBalanceCheck,
        Bug::ApproveAdds,
        Bug::TrueOnFailure,
        Bug::ChecksSpenderBalance,
        Bug::SwappedTransferEvent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Bug::SkipAllowanceDecrement => "skip-allowance-decrement",
            Bug::SelfTransferMints => "self-transfer-mints",
            Bug::MissingApprovalEvent => "missing-approval-event",
            Bug::MissingTransferFromEvent => "missing-transfer-from-event",
            Bug::FeeOnTransfer => "fee-on-transfer",
            Bug::NoBalanceCheck => "no-balance-check",
            Bug::ApproveAdds => "approve-adds",
            Bug::TrueOnFailure => "true-on-failure",
            Bug::ChecksSpenderBalance => "checks-spender-balance",
            Bug::SwappedTransferEvent => "swapped-transfer-event",
        }
    }

    pub fn from_name(name: &str) -> Option<Bug> {
        Bug::ALL.into_iter().find(|bug| bug.name() == name)
    }
}

#[derive(Debug, Clone)]
pub struct BuggyToken {
    bug: Bug,
    ledger: Ledger,
}

impl BuggyToken {
    pub fn new(bug: Bug) -> Self {
        Self {
            bug,
            ledger: Ledger::new(),
        }
    }

    pub fn bug(&self) -> Bug {
        self.bug
    }

    fn fail(&self, reason: &str) -> Result<Option<bool>, Revert> {
        if self.bug == Bug::TrueOnFailure {
            Ok(Some(true))
        } else {
            Err(Revert::new(reason))
        }
    }

    fn transfer_event(&self, from: Address, to: Address, amount: U256) -> EmittedEvent {
        if self.bug == Bug::SwappedTransferEvent {
            EmittedEvent::transfer(to, from, amount)
        } else {
            EmittedEvent::transfer(from, to, amount)
        }
    }

    fn move_tokens(&mut self, from: Address, to: Address, amount: U256) -> Result<(), Revert> {
        match self.bug {
            Bug::SelfTransferMints if from == to => {
                let credited = self
                    .ledger
                    .balance_of(to)
                    .checked_add(amount)
                    .ok_or_else(|| Revert::new("balance overflow"))?;
                self.ledger.set_balance(to, credited);
                Ok(())
            }
            Bug::NoBalanceCheck => {
                let debited = self.ledger.balance_of(from).wrapping_sub(amount);
                self.ledger.set_balance(from, debited);
                let credited = self.ledger.balance_of(to).wrapping_add(amount);
                self.ledger.set_balance(to, credited);
                Ok(())
            }
            Bug::FeeOnTransfer if !amount.is_zero() => {
                let fee = U256::from(1u64);
                self.ledger.move_balance(from, to, amount - fee)?;
                let remaining = self.ledger.balance_of(from) - fee;
                self.ledger.set_balance(from, remaining);
                self.ledger
                    .set_total_supply(self.ledger.total_supply() - fee);
                Ok(())
            }
            _ => self.ledger.move_balance(from, to, amount),
        }
    }

    fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert> {
        if to == Address::ZERO {
            return self.fail("transfer to the zero address");
        }
        if self.bug != Bug::NoBalanceCheck && self.ledger.balance_of(from) < amount {
            return self.fail("transfer amount exceeds balance");
        }
        self.move_tokens(from, to, amount)?;
        events.push(self.transfer_event(from, to, amount));
        Ok(Some(true))
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
        if to == Address::ZERO {
            return self.fail("transfer to the zero address");
        }
        let checked = if self.bug == Bug::ChecksSpenderBalance {
            spender
        } else {
            from
        };
        if self.ledger.balance_of(checked) < amount {
            return self.fail("transfer amount exceeds balance");
        }
        if allowance != U256::MAX && self.bug != Bug::SkipAllowanceDecrement {
            self.ledger.set_allowance(from, spender, allowance - amount);
        }
        self.move_tokens(from, to, amount)?;
        if self.bug != Bug::MissingTransferFromEvent {
            events.push(self.transfer_event(from, to, amount));
        }
        Ok(Some(true))
    }
}

impl TokenLogic for BuggyToken {
    fn name(&self) -> &str {
        self.bug.name()
    }

    fn execute(
        &mut self,
        caller: Address,
        call: &TokenCall,
        events: &mut Vec<EmittedEvent>,
    ) -> Result<Option<bool>, Revert> {
        match *call {
            TokenCall::Approve { spender, amount } => {
                if spender == Address::ZERO {
                    return self.fail("approve to the zero address");
                }
                let value = if self.bug == Bug::ApproveAdds {
                    self.ledger.allowance(caller, spender).saturating_add(amount)
                } else {
                    amount
                };
                self.ledger.set_allowance(caller, spender, value);
                if self.bug != Bug::MissingApprovalEvent {
                    events.push(EmittedEvent::approval(caller, spender, value));
                }
                Ok(Some(true))
            }
            TokenCall::Transfer { to, amount } => self.transfer(caller, to, amount, events),
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
