//! Differential oracle: runs each operation against the reference model and
//! the real token, then classifies what it saw.
//!
//! Public assertions return a [`Verdict`]. Internally everything is a
//! `Result<Vec<Warning>, OracleError>` so checks compose with `?`.

use std::fmt;

use alloy_primitives::{Address, U256};

use crate::error::{ModelError, OracleError, SubstrateError};
use crate::model::{ModelConfig, OpOptions, ReferenceModel};
use crate::notification::{all_emitted, Notification};
use crate::substrate::{with_snapshot, CallReceipt, CallStatus, Substrate, TokenCall, TokenQuery};
use crate::verdict::{Verdict, Violation, ViolationKind, Warning, WarningKind};

type Checked = Result<Vec<Warning>, OracleError>;

fn violation(kind: ViolationKind, message: impl Into<String>) -> OracleError {
    OracleError::Violation(Violation::new(kind, message))
}

fn describe_return(status: &CallStatus) -> String {
    match status {
        CallStatus::Returned(Some(value)) => value.to_string(),
        CallStatus::Returned(None) => "no data".to_string(),
        CallStatus::Reverted(reason) => format!("revert ({reason})"),
    }
}

/// Arguments shared by `transfer` (no spender) and `transferFrom`.
#[derive(Debug, Clone, Copy)]
struct TransferArgs {
    owner: Address,
    spender: Option<Address>,
    receiver: Address,
    amount: U256,
}

impl TransferArgs {
    fn caller(&self) -> Address {
        self.spender.unwrap_or(self.owner)
    }

    fn call(&self) -> TokenCall {
        match self.spender {
            Some(_) => TokenCall::TransferFrom {
                from: self.owner,
                to: self.receiver,
                amount: self.amount,
            },
            None => TokenCall::Transfer {
                to: self.receiver,
                amount: self.amount,
            },
        }
    }

    fn notification(&self) -> Notification {
        Notification::Transfer {
            from: self.owner,
            to: self.receiver,
            value: self.amount,
        }
    }
}

impl fmt::Display for TransferArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.spender {
            Some(spender) => write!(
                f,
                "transferFrom(owner={}, spender={spender}, receiver={}, amount={})",
                self.owner, self.receiver, self.amount
            ),
            None => write!(
                f,
                "transfer(from={}, receiver={}, amount={})",
                self.owner, self.receiver, self.amount
            ),
        }
    }
}

pub struct DifferentialOracle<S: Substrate> {
    substrate: S,
    token: Address,
    model: ReferenceModel,
}

impl<S: Substrate> DifferentialOracle<S> {
    pub fn new(substrate: S, token: Address, model: ReferenceModel) -> Self {
        Self {
            substrate,
            token,
            model,
        }
    }

    /// Build the model from the token's current on-chain state: total supply,
    /// the balance of every known account and every pairwise allowance.
    pub fn observe(
        substrate: S,
        token: Address,
        static_max_allowance: bool,
    ) -> Result<Self, OracleError> {
        let accounts = substrate.accounts();
        let mut config = ModelConfig {
            initial_supply: substrate.read(token, &TokenQuery::TotalSupply)?,
            static_max_allowance,
            ..ModelConfig::default()
        };
        for &owner in &accounts {
            let balance = substrate.read(token, &TokenQuery::BalanceOf(owner))?;
            config.initial_balances.insert(owner, balance);
            for &spender in &accounts {
                let allowance = substrate.read(token, &TokenQuery::Allowance { owner, spender })?;
                if !allowance.is_zero() {
                    config
                        .initial_allowances
                        .entry(owner)
                        .or_default()
                        .insert(spender, allowance);
                }
            }
        }

        let model = ReferenceModel::new(config)?;
        Ok(Self::new(substrate, token, model))
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn model(&self) -> &ReferenceModel {
        &self.model
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    pub fn substrate_mut(&mut self) -> &mut S {
        &mut self.substrate
    }

    pub fn into_parts(self) -> (S, ReferenceModel) {
        (self.substrate, self.model)
    }

    pub fn balance_of(&self, account: impl Into<Address>) -> Result<U256, SubstrateError> {
        self.substrate
            .read(self.token, &TokenQuery::BalanceOf(account.into()))
    }

    pub fn allowance(
        &self,
        owner: impl Into<Address>,
        spender: impl Into<Address>,
    ) -> Result<U256, SubstrateError> {
        self.substrate.read(
            self.token,
            &TokenQuery::Allowance {
                owner: owner.into(),
                spender: spender.into(),
            },
        )
    }

    /// Credit `amount` to `to` on both sides. A zero amount is a no-op.
    pub fn mint(&mut self, to: impl Into<Address>, amount: U256) -> Result<(), OracleError> {
        let to = to.into();
        if amount.is_zero() {
            return Ok(());
        }
        self.model.mint(to, amount, OpOptions::new().dry_run())?;
        self.substrate.mint(self.token, to, amount)?;
        self.model.mint(to, amount, OpOptions::new())?;
        Ok(())
    }

    // ── Routed assertions ─────────────────────────────────────────────────────

    pub fn assert_approve(
        &mut self,
        owner: impl Into<Address>,
        spender: impl Into<Address>,
        amount: U256,
        should_zero_spender_fail: bool,
    ) -> Verdict {
        let (owner, spender) = (owner.into(), spender.into());
        if spender == Address::ZERO {
            self.approve_zero_spender(owner, amount, should_zero_spender_fail)
                .into()
        } else {
            self.approve_checked(owner, spender, amount, false).into()
        }
    }

    pub fn assert_transfer(
        &mut self,
        owner: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: U256,
    ) -> Verdict {
        let args = TransferArgs {
            owner: owner.into(),
            spender: None,
            receiver: receiver.into(),
            amount,
        };
        self.transfer_routed(args).into()
    }

    pub fn assert_transfer_from(
        &mut self,
        owner: impl Into<Address>,
        spender: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: U256,
    ) -> Verdict {
        let args = TransferArgs {
            owner: owner.into(),
            spender: Some(spender.into()),
            receiver: receiver.into(),
            amount,
        };
        self.transfer_routed(args).into()
    }

    // ── Forced expectations ───────────────────────────────────────────────────

    pub fn assert_approve_valid(
        &mut self,
        owner: impl Into<Address>,
        spender: impl Into<Address>,
        amount: U256,
    ) -> Verdict {
        self.approve_checked(owner.into(), spender.into(), amount, false)
            .into()
    }

    pub fn assert_approve_zero_spender_valid(
        &mut self,
        owner: impl Into<Address>,
        amount: U256,
        should_zero_spender_fail: bool,
    ) -> Verdict {
        self.approve_zero_spender(owner.into(), amount, should_zero_spender_fail)
            .into()
    }

    pub fn assert_transfer_succeeds(
        &mut self,
        owner: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: U256,
    ) -> Verdict {
        let args = TransferArgs {
            owner: owner.into(),
            spender: None,
            receiver: receiver.into(),
            amount,
        };
        self.transfer_success(args, false).into()
    }

    pub fn assert_transfer_reverts(
        &mut self,
        owner: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: U256,
    ) -> Verdict {
        let args = TransferArgs {
            owner: owner.into(),
            spender: None,
            receiver: receiver.into(),
            amount,
        };
        self.transfer_revert(args).into()
    }

    pub fn assert_transfer_from_succeeds(
        &mut self,
        owner: impl Into<Address>,
        spender: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: U256,
    ) -> Verdict {
        let args = TransferArgs {
            owner: owner.into(),
            spender: Some(spender.into()),
            receiver: receiver.into(),
            amount,
        };
        self.transfer_success(args, false).into()
    }

    pub fn assert_transfer_from_reverts(
        &mut self,
        owner: impl Into<Address>,
        spender: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: U256,
    ) -> Verdict {
        let args = TransferArgs {
            owner: owner.into(),
            spender: Some(spender.into()),
            receiver: receiver.into(),
            amount,
        };
        self.transfer_revert(args).into()
    }

    // ── Snapshot probes ───────────────────────────────────────────────────────
    //
    // Probes judge by observed state, never by the returned boolean.

    /// Did `approve` set the allowance to `amount`? State is restored.
    ///
    /// When the allowance already equalled `amount` there is no delta to
    /// observe, and a matching `Approval` event decides.
    pub fn try_approve_and_restore(
        &mut self,
        owner: impl Into<Address>,
        spender: impl Into<Address>,
        amount: U256,
    ) -> Result<bool, OracleError> {
        let (owner, spender) = (owner.into(), spender.into());
        let token = self.token;
        let approved = with_snapshot(
            &mut self.substrate,
            |s: &mut S| -> Result<bool, SubstrateError> {
                let query = TokenQuery::Allowance { owner, spender };
                let before = s.read(token, &query)?;
                let receipt = s.call(token, owner, &TokenCall::Approve { spender, amount })?;
                if receipt.reverted() {
                    return Ok(false);
                }
                let after = s.read(token, &query)?;
                if after != amount {
                    return Ok(false);
                }
                if before != after {
                    return Ok(true);
                }
                let expected = Notification::Approval {
                    owner,
                    spender,
                    value: amount,
                };
                Ok(receipt.events.iter().any(|event| event.matches(&expected)))
            },
        )?;
        tracing::debug!(%owner, %spender, %amount, approved, "approve probe");
        Ok(approved)
    }

    pub fn try_transfer_and_restore(
        &mut self,
        owner: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: U256,
    ) -> Result<bool, OracleError> {
        self.probe_transfer(TransferArgs {
            owner: owner.into(),
            spender: None,
            receiver: receiver.into(),
            amount,
        })
    }

    pub fn try_transfer_from_and_restore(
        &mut self,
        owner: impl Into<Address>,
        spender: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: U256,
    ) -> Result<bool, OracleError> {
        self.probe_transfer(TransferArgs {
            owner: owner.into(),
            spender: Some(spender.into()),
            receiver: receiver.into(),
            amount,
        })
    }

    /// A transfer "happened" when the owner lost exactly `amount` and the
    /// receiver gained exactly `amount`.
    fn probe_transfer(&mut self, args: TransferArgs) -> Result<bool, OracleError> {
        let token = self.token;
        let happened = with_snapshot(
            &mut self.substrate,
            |s: &mut S| -> Result<bool, SubstrateError> {
                let from_before = s.read(token, &TokenQuery::BalanceOf(args.owner))?;
                let to_before = s.read(token, &TokenQuery::BalanceOf(args.receiver))?;
                let receipt = s.call(token, args.caller(), &args.call())?;
                if receipt.reverted() {
                    return Ok(false);
                }
                let from_after = s.read(token, &TokenQuery::BalanceOf(args.owner))?;
                let to_after = s.read(token, &TokenQuery::BalanceOf(args.receiver))?;

                let debited = from_before.checked_sub(from_after);
                let credited = to_after.checked_sub(to_before);
                Ok(debited == Some(args.amount) && credited == Some(args.amount))
            },
        )?;
        tracing::debug!(%args, happened, "transfer probe");
        Ok(happened)
    }

    // ── State checks ──────────────────────────────────────────────────────────

    pub fn assert_balances_match_expected(&self) -> Verdict {
        self.check_balances().into()
    }

    pub fn assert_allowances_match_expected(&self) -> Verdict {
        self.check_allowances().into()
    }

    pub fn assert_total_supply_matches_expected(&self) -> Verdict {
        self.check_total_supply().into()
    }

    /// `balanceOf(null)` should be zero. Never fails: a non-zero balance is a
    /// warning and a reverting read is accepted.
    pub fn check_null_account_custody(&self) -> Verdict {
        self.check_null_custody().into()
    }

    /// Balances, allowances, total supply and null custody in one pass.
    pub fn assert_invariants(&self) -> Verdict {
        let result = self.check_balances().and_then(|mut warnings| {
            warnings.extend(self.check_allowances()?);
            warnings.extend(self.check_total_supply()?);
            warnings.extend(self.check_null_custody()?);
            Ok(warnings)
        });
        result.into()
    }

    fn check_balances(&self) -> Checked {
        for account in self.substrate.accounts() {
            let expected = self.model.balance_of(account);
            let got = self.balance_of(account)?;
            if got != expected {
                return Err(violation(
                    ViolationKind::BalanceMismatch,
                    format!("balanceOf({account}): expected {expected}, got {got}"),
                ));
            }
        }
        Ok(Vec::new())
    }

    fn check_allowances(&self) -> Checked {
        let accounts = self.substrate.accounts();
        for &owner in &accounts {
            for &spender in &accounts {
                let expected = self.model.allowance(owner, spender);
                let got = self.allowance(owner, spender)?;
                if got != expected {
                    return Err(violation(
                        ViolationKind::AllowanceMismatch,
                        format!("allowance({owner}, {spender}): expected {expected}, got {got}"),
                    ));
                }
            }
        }
        Ok(Vec::new())
    }

    fn check_total_supply(&self) -> Checked {
        let expected = self.model.total_supply();
        let got = self.substrate.read(self.token, &TokenQuery::TotalSupply)?;
        if got != expected {
            return Err(violation(
                ViolationKind::TotalSupplyMismatch,
                format!("totalSupply(): expected {expected}, got {got}"),
            ));
        }
        Ok(Vec::new())
    }

    fn check_null_custody(&self) -> Checked {
        match self.balance_of(Address::ZERO) {
            Ok(balance) if balance.is_zero() => Ok(Vec::new()),
            Ok(balance) => Ok(vec![Warning::new(
                WarningKind::NullAccountHoldsBalance,
                format!("the null account holds {balance} tokens"),
            )]),
            Err(SubstrateError::QueryReverted { .. }) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    // ── Approve ───────────────────────────────────────────────────────────────

    fn approve_checked(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
        allow_null: bool,
    ) -> Checked {
        let opts = OpOptions::new().allowing_null(allow_null);
        self.model.approve(owner, spender, amount, opts.dry_run())?;

        let receipt = self
            .substrate
            .call(self.token, owner, &TokenCall::Approve { spender, amount })?;
        let signature = format!("approve(owner={owner}, spender={spender}, amount={amount})");
        if let CallStatus::Reverted(reason) = &receipt.status {
            return Err(violation(
                ViolationKind::UnexpectedRevert,
                format!("{signature} reverted: {reason}"),
            ));
        }

        let expected = self.model.approve(owner, spender, amount, opts)?;
        self.finish_success(&signature, &receipt, &expected, "Approval")
    }

    fn approve_zero_spender(&mut self, owner: Address, amount: U256, should_fail: bool) -> Checked {
        let spender = Address::ZERO;
        let approved = self.try_approve_and_restore(owner, spender, amount)?;
        if approved && should_fail {
            return Err(violation(
                ViolationKind::NullSpenderApproved,
                format!("approve(owner={owner}, spender=null, amount={amount}) took effect"),
            ));
        }
        if !approved {
            return Ok(Vec::new());
        }

        let mut warnings = self.approve_checked(owner, spender, amount, true)?;
        warnings.push(Warning::new(
            WarningKind::NullAccountAccepted,
            format!("approve(owner={owner}, spender=null, amount={amount}) succeeded"),
        ));
        Ok(warnings)
    }

    // ── Transfer / transferFrom ───────────────────────────────────────────────

    fn model_transfer(
        &mut self,
        args: TransferArgs,
        opts: OpOptions,
    ) -> Result<Vec<Notification>, ModelError> {
        match args.spender {
            Some(spender) => {
                self.model
                    .transfer_from(args.owner, spender, args.receiver, args.amount, opts)
            }
            None => self
                .model
                .transfer(args.owner, args.receiver, args.amount, opts),
        }
    }

    fn should_succeed(&mut self, args: TransferArgs, allow_null: bool) -> bool {
        match args.spender {
            Some(spender) => self.model.should_transfer_from_succeed(
                args.owner,
                spender,
                args.receiver,
                args.amount,
                allow_null,
            ),
            None => self.model.should_transfer_succeed(
                args.owner,
                args.receiver,
                args.amount,
                allow_null,
            ),
        }
    }

    fn transfer_routed(&mut self, args: TransferArgs) -> Checked {
        if args.receiver == Address::ZERO {
            self.transfer_to_null(args)
        } else if self.should_succeed(args, false) {
            self.transfer_success(args, false)
        } else {
            self.transfer_revert(args)
        }
    }

    fn transfer_success(&mut self, args: TransferArgs, allow_null: bool) -> Checked {
        let opts = OpOptions::new().allowing_null(allow_null);
        self.model_transfer(args, opts.dry_run())?;

        let receipt = self
            .substrate
            .call(self.token, args.caller(), &args.call())?;
        if let CallStatus::Reverted(reason) = &receipt.status {
            return Err(violation(
                ViolationKind::UnexpectedRevert,
                format!("{args} reverted: {reason}"),
            ));
        }

        let expected = self.model_transfer(args, opts)?;
        self.finish_success(&args.to_string(), &receipt, &expected, "Transfer")
    }

    fn transfer_revert(&mut self, args: TransferArgs) -> Checked {
        let receipt = self
            .substrate
            .call(self.token, args.caller(), &args.call())?;
        match receipt.status {
            CallStatus::Reverted(_) => Ok(Vec::new()),
            CallStatus::Returned(Some(false)) => {
                if all_emitted(&receipt.events, &[args.notification()]) {
                    return Err(violation(
                        ViolationKind::UnexpectedNotification,
                        format!("Transfer event emitted on unsuccessful {args}"),
                    ));
                }
                Ok(vec![Warning::new(
                    WarningKind::ReturnFalseInsteadOfRevert,
                    format!("unsuccessful {args} returned false; consider reverting"),
                )])
            }
            ref status => Err(violation(
                ViolationKind::NeitherRevertedNorFalse,
                format!(
                    "unsuccessful {args} neither reverted nor returned false (returned {})",
                    describe_return(status)
                ),
            )),
        }
    }

    /// The standard leaves transfers to the null account undefined, so the
    /// probe's observed balances decide what actually happened.
    fn transfer_to_null(&mut self, args: TransferArgs) -> Checked {
        let expected = self.should_succeed(args, true);
        let observed = self.probe_transfer(args)?;

        match (expected, observed) {
            (true, true) => {
                let mut warnings = self.transfer_success(args, true)?;
                warnings.push(Warning::new(
                    WarningKind::NullAccountAccepted,
                    format!("{args} succeeded"),
                ));
                Ok(warnings)
            }
            (true, false) => self.transfer_revert(args),
            (false, true) => {
                tracing::warn!(%args, "probe moved balances although the model expects failure");
                let mut warnings = self.transfer_revert(args)?;
                warnings.push(Warning::new(
                    WarningKind::ProbeDisagreement,
                    format!("{args} moved balances in a probe although it should fail"),
                ));
                Ok(warnings)
            }
            (false, false) => self.transfer_revert(args),
        }
    }

    fn finish_success(
        &self,
        signature: &str,
        receipt: &CallReceipt,
        expected: &[Notification],
        event: &str,
    ) -> Checked {
        let mut warnings = Vec::new();
        if !receipt.returned_true() {
            warnings.push(Warning::new(
                WarningKind::FalsyReturnOnSuccess,
                format!(
                    "successful {signature} returned {}",
                    describe_return(&receipt.status)
                ),
            ));
        }
        if !all_emitted(&receipt.events, expected) {
            return Err(violation(
                ViolationKind::MissingNotification,
                format!("no {event} event on successful {signature}"),
            ));
        }
        Ok(warnings)
    }
}

impl<S: Substrate> fmt::Debug for DifferentialOracle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DifferentialOracle")
            .field("token", &self.token)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
