//! Named, fixed conformance scenarios built on the oracle.
//!
//! Levels follow the usual checklist split: `Minimal` properties MUST hold,
//! `Recommended` SHOULD hold, `Desirable` are sane-token expectations and
//! `Fingerprint` merely describes implementation choices. A scenario marked
//! as an expected failure reports `XFail` when it fails and `XPass` when it
//! passes; neither counts against the token.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, SubstrateError};
use crate::oracle::DifferentialOracle;
use crate::substrate::{with_snapshot, Substrate};
use crate::verdict::{Verdict, Violation, ViolationKind, Warning, WarningKind};

/// Scenarios address at most this many distinct accounts.
pub const MIN_ACCOUNTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Minimal,
    Recommended,
    Desirable,
    Fingerprint,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Minimal,
        Level::Recommended,
        Level::Desirable,
        Level::Fingerprint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Minimal => "minimal",
            Level::Recommended => "recommended",
            Level::Desirable => "desirable",
            Level::Fingerprint => "fingerprint",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown scenario level '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Pass,
    /// Expected to fail on many conforming tokens, with the reason.
    XFail(&'static str),
}

pub type ScenarioFn = fn(&mut ScenarioContext<'_>) -> Result<(), OracleError>;

#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub level: Level,
    pub description: &'static str,
    pub expectation: Expectation,
    /// Overrides the infinite-allowance setting of the model.
    pub static_max_allowance: Option<bool>,
    pub run: ScenarioFn,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("expectation", &self.expectation)
            .finish_non_exhaustive()
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// What a scenario body sees: the oracle, the known accounts and a place to
/// collect warnings.
pub struct ScenarioContext<'a> {
    oracle: DifferentialOracle<&'a mut dyn Substrate>,
    accounts: Vec<Address>,
    warnings: Vec<Warning>,
}

impl<'a> ScenarioContext<'a> {
    fn absorb(&mut self, verdict: Verdict) -> Result<(), OracleError> {
        let warnings = verdict.into_result()?;
        self.warnings.extend(warnings);
        Ok(())
    }

    /// The `index`-th known account. Scenarios only run with at least
    /// [`MIN_ACCOUNTS`] accounts.
    pub fn account(&self, index: usize) -> Address {
        self.accounts[index]
    }

    pub fn oracle(&mut self) -> &mut DifferentialOracle<&'a mut dyn Substrate> {
        &mut self.oracle
    }

    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        self.warnings.push(Warning::new(kind, message));
    }

    pub fn mint(&mut self, to: Address, amount: U256) -> Result<(), OracleError> {
        self.oracle.mint(to, amount)
    }

    pub fn approve_valid(&mut self, owner: Address, spender: Address, amount: U256) -> Result<(), OracleError> {
        let verdict = self.oracle.assert_approve_valid(owner, spender, amount);
        self.absorb(verdict)
    }

    pub fn approve_zero_spender(&mut self, owner: Address, amount: U256, should_fail: bool) -> Result<(), OracleError> {
        let verdict = self
            .oracle
            .assert_approve_zero_spender_valid(owner, amount, should_fail);
        self.absorb(verdict)
    }

    pub fn transfer_succeeds(&mut self, owner: Address, receiver: Address, amount: U256) -> Result<(), OracleError> {
        let verdict = self.oracle.assert_transfer_succeeds(owner, receiver, amount);
        self.absorb(verdict)
    }

    pub fn transfer_reverts(&mut self, owner: Address, receiver: Address, amount: U256) -> Result<(), OracleError> {
        let verdict = self.oracle.assert_transfer_reverts(owner, receiver, amount);
        self.absorb(verdict)
    }

    pub fn transfer_from_succeeds(
        &mut self,
        owner: Address,
        spender: Address,
        receiver: Address,
        amount: U256,
    ) -> Result<(), OracleError> {
        let verdict = self
            .oracle
            .assert_transfer_from_succeeds(owner, spender, receiver, amount);
        self.absorb(verdict)
    }

    pub fn transfer_from_reverts(
        &mut self,
        owner: Address,
        spender: Address,
        receiver: Address,
        amount: U256,
    ) -> Result<(), OracleError> {
        let verdict = self
            .oracle
            .assert_transfer_from_reverts(owner, spender, receiver, amount);
        self.absorb(verdict)
    }

    pub fn balances_match(&mut self) -> Result<(), OracleError> {
        let verdict = self.oracle.assert_balances_match_expected();
        self.absorb(verdict)
    }

    pub fn allowances_match(&mut self) -> Result<(), OracleError> {
        let verdict = self.oracle.assert_allowances_match_expected();
        self.absorb(verdict)
    }

    pub fn total_supply_matches(&mut self) -> Result<(), OracleError> {
        let verdict = self.oracle.assert_total_supply_matches_expected();
        self.absorb(verdict)
    }

    pub fn null_custody(&mut self) -> Result<(), OracleError> {
        let verdict = self.oracle.check_null_account_custody();
        self.absorb(verdict)
    }
}

fn u(value: u64) -> U256 {
    U256::from(value)
}

fn not_held(message: impl Into<String>) -> OracleError {
    Violation::new(ViolationKind::PropertyNotHeld, message).into()
}

// ── Running ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed(String),
    XFailed(String),
    XPassed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub level: Level,
    #[serde(flatten)]
    pub status: ScenarioStatus,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioReport {
    pub results: Vec<ScenarioResult>,
}

impl ScenarioReport {
    pub fn count(&self, predicate: impl Fn(&ScenarioStatus) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.status)).count()
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ScenarioStatus::Failed(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

/// Run one scenario in a snapshot, with a model observed from the token's
/// current state.
pub fn run_scenario(
    substrate: &mut dyn Substrate,
    token: Address,
    scenario: &Scenario,
    static_max_allowance: bool,
) -> Result<ScenarioResult, SubstrateError> {
    let span = tracing::debug_span!("scenario", name = scenario.name);
    let _entered = span.enter();

    let static_max_allowance = scenario.static_max_allowance.unwrap_or(static_max_allowance);
    let (outcome, warnings) = with_snapshot(substrate, |s| -> Result<_, SubstrateError> {
        let accounts = s.accounts();
        if accounts.len() < MIN_ACCOUNTS {
            let error = not_held(format!(
                "scenarios need at least {MIN_ACCOUNTS} accounts, substrate has {}",
                accounts.len()
            ));
            return Ok((Err(error), Vec::new()));
        }
        let s: &mut dyn Substrate = s;
        let oracle = match DifferentialOracle::observe(s, token, static_max_allowance) {
            Ok(oracle) => oracle,
            Err(error) => return Ok((Err(error), Vec::new())),
        };
        let mut ctx = ScenarioContext {
            oracle,
            accounts,
            warnings: Vec::new(),
        };
        let outcome = (scenario.run)(&mut ctx);
        Ok((outcome, ctx.warnings))
    })?;

    let status = match (outcome, scenario.expectation) {
        (Ok(()), Expectation::Pass) => ScenarioStatus::Passed,
        (Ok(()), Expectation::XFail(_)) => ScenarioStatus::XPassed,
        (Err(error), Expectation::Pass) => ScenarioStatus::Failed(error.to_string()),
        (Err(error), Expectation::XFail(reason)) => {
            ScenarioStatus::XFailed(format!("{reason} ({error})"))
        }
    };
    tracing::debug!(status = ?status, warnings = warnings.len(), "scenario finished");

    Ok(ScenarioResult {
        name: scenario.name,
        level: scenario.level,
        status,
        warnings,
    })
}

pub fn run_scenarios<'s>(
    substrate: &mut dyn Substrate,
    token: Address,
    scenarios: impl IntoIterator<Item = &'s Scenario>,
    static_max_allowance: bool,
) -> Result<ScenarioReport, SubstrateError> {
    let mut report = ScenarioReport::default();
    for scenario in scenarios {
        report
            .results
            .push(run_scenario(substrate, token, scenario, static_max_allowance)?);
    }
    Ok(report)
}

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

// ── Catalogue ─────────────────────────────────────────────────────────────────

const NOT_STANDARD: &str = "not part of the standard";
const NULL_RECEIVER_ALLOWED: &str = "transfers to the null account may be allowed, though discouraged";

pub static SCENARIOS: &[Scenario] = &[
    // Minimal
    Scenario {
        name: "positive_approval_event_emission",
        level: Level::Minimal,
        description: "A successful approve of a positive amount emits Approval",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "positive_approve_allows_positive_transfer_from",
        level: Level::Minimal,
        description: "An approved spender can transferFrom any amount up to the allowance",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            ctx.mint(owner, u(200))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, spender, u(50))?;
            ctx.transfer_from_succeeds(owner, spender, spender, u(50))?;
            ctx.transfer_from_reverts(owner, spender, spender, u(50))?;

            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, spender, u(75))?;
            ctx.transfer_from_reverts(owner, spender, spender, u(75))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "positive_approve_allows_zero_transfer_from",
        level: Level::Minimal,
        description: "An approved spender can transferFrom zero",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            ctx.mint(owner, u(200))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, spender, U256::ZERO)?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "zero_approve_leads_to_allowance",
        level: Level::Minimal,
        description: "Approving zero emits Approval and resets the allowance",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.approve_valid(owner, spender, U256::ZERO)?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "positive_transfer_event_emission",
        level: Level::Minimal,
        description: "A successful transfer of a positive amount emits Transfer",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, receiver) = (ctx.account(0), ctx.account(1));
            ctx.mint(owner, u(100))?;
            ctx.transfer_succeeds(owner, receiver, u(100))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "positive_transfer_from_event_emission",
        level: Level::Minimal,
        description: "A successful transferFrom of a positive amount emits Transfer",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(200))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, u(50))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "user_balance_initialized",
        level: Level::Minimal,
        description: "balanceOf is correct after two users' balances are initialized",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (reference, owner) = (ctx.account(0), ctx.account(1));
            let (first, second) = (ctx.account(2), ctx.account(3));
            ctx.mint(reference, u(100))?;
            ctx.mint(owner, u(100))?;
            ctx.transfer_succeeds(owner, first, u(50))?;
            ctx.transfer_succeeds(owner, second, u(50))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "zero_transfer_from_by_other_possible",
        level: Level::Minimal,
        description: "Anyone can transferFrom zero, approved or not",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            let (receiver, other) = (ctx.account(2), ctx.account(3));
            ctx.mint(owner, u(200))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, U256::ZERO)?;
            ctx.transfer_from_succeeds(owner, other, receiver, U256::ZERO)?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "zero_transfer_from_by_other_to_self_possible",
        level: Level::Minimal,
        description: "Anyone can transferFrom zero back to the owner",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, other) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(200))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, owner, U256::ZERO)?;
            ctx.transfer_from_succeeds(owner, other, owner, U256::ZERO)?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "zero_transfer_from_by_self_possible",
        level: Level::Minimal,
        description: "The owner can transferFrom zero from their own account",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, other) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(200))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, owner, spender, U256::ZERO)?;
            ctx.transfer_from_succeeds(owner, owner, other, U256::ZERO)?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "zero_transfer_from_by_self_to_self_possible",
        level: Level::Minimal,
        description: "The owner can transferFrom zero from and to themselves",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            ctx.transfer_from_succeeds(owner, owner, owner, U256::ZERO)?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "zero_transfer_to_others_possible",
        level: Level::Minimal,
        description: "A zero transfer to another account succeeds and emits Transfer",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, receiver) = (ctx.account(0), ctx.account(1));
            ctx.transfer_succeeds(owner, receiver, U256::ZERO)?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "zero_transfer_to_self_possible",
        level: Level::Minimal,
        description: "A zero self-transfer succeeds and emits Transfer",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            ctx.transfer_succeeds(owner, owner, U256::ZERO)?;
            ctx.balances_match()
        },
    },
    // Recommended
    Scenario {
        name: "cannot_transfer_from_more_than_allowance",
        level: Level::Recommended,
        description: "transferFrom above the allowance fails even with enough balance",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(200))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_reverts(owner, spender, receiver, u(150))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "cannot_transfer_from_more_than_balance",
        level: Level::Recommended,
        description: "transferFrom above the owner's balance fails even with enough allowance",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(200))?;
            ctx.approve_valid(owner, spender, u(300))?;
            ctx.transfer_from_reverts(owner, spender, receiver, u(250))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "cannot_transfer_more_than_balance",
        level: Level::Recommended,
        description: "transfer above the sender's balance fails",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, receiver) = (ctx.account(0), ctx.account(1));
            ctx.mint(owner, u(200))?;
            ctx.transfer_reverts(owner, receiver, u(250))?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "no_approval_cannot_transfer_from",
        level: Level::Recommended,
        description: "transferFrom of a positive amount without approval fails",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(200))?;
            ctx.transfer_from_reverts(owner, spender, receiver, u(100))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "no_self_approval_cannot_self_transfer_from",
        level: Level::Recommended,
        description: "The owner cannot transferFrom their own tokens without self-approval",
        expectation: Expectation::XFail("self-spend without self-approval is not covered by the standard"),
        static_max_allowance: None,
        run: |ctx| {
            let (owner, receiver) = (ctx.account(0), ctx.account(1));
            ctx.mint(owner, u(200))?;
            ctx.transfer_from_reverts(owner, owner, receiver, u(100))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    // Desirable
    Scenario {
        name: "address_zero_has_no_token",
        level: Level::Desirable,
        description: "The null account holds no tokens",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| ctx.null_custody(),
    },
    Scenario {
        name: "cannot_approve_null_spender",
        level: Level::Desirable,
        description: "Approving the null account as spender is rejected",
        expectation: Expectation::XFail("approvals to the null account may be allowed, though discouraged"),
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            for amount in [U256::ZERO, u(1), U256::MAX] {
                ctx.approve_zero_spender(owner, amount, true)?;
            }
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "null_spender_approval_is_consistent",
        level: Level::Desirable,
        description: "A null-spender approval, if accepted, behaves like any other approval",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            for amount in [U256::ZERO, u(1), U256::MAX] {
                ctx.approve_zero_spender(owner, amount, false)?;
            }
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "no_fee_on_transfer",
        level: Level::Desirable,
        description: "transfer delivers the full amount",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, receiver) = (ctx.account(0), ctx.account(1));
            ctx.mint(owner, u(100))?;
            ctx.transfer_succeeds(owner, receiver, u(100))?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "no_fee_on_transfer_from",
        level: Level::Desirable,
        description: "transferFrom delivers the full amount",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(100))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, u(100))?;
            ctx.allowances_match()?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "multiple_transfer_from_exceed_allowance",
        level: Level::Desirable,
        description: "transferFrom stops once the allowance is spent",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            for _ in 0..2 {
                ctx.mint(owner, u(100))?;
                ctx.approve_valid(owner, spender, u(50))?;
                ctx.transfer_from_succeeds(owner, spender, receiver, u(50))?;
                ctx.transfer_from_reverts(owner, spender, receiver, u(50))?;
            }
            ctx.allowances_match()?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "overwrite_approve",
        level: Level::Desirable,
        description: "Consecutive approvals overwrite each other (positive/zero in any order)",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            for amount in [10u64, 0, 0, 10] {
                ctx.approve_valid(owner, spender, u(amount))?;
            }
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "positive_multiple_transfer",
        level: Level::Desirable,
        description: "Several transfers succeed while their sum fits the balance",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, receiver) = (ctx.account(0), ctx.account(1));
            ctx.mint(owner, u(100))?;
            ctx.transfer_succeeds(owner, receiver, u(50))?;
            ctx.transfer_succeeds(owner, receiver, u(50))?;
            ctx.transfer_reverts(owner, receiver, u(50))?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "positive_multiple_transfer_from",
        level: Level::Desirable,
        description: "Several transferFroms succeed while their sum fits the balance",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(100))?;
            ctx.approve_valid(owner, spender, u(200))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, u(50))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, u(50))?;
            ctx.transfer_from_reverts(owner, spender, receiver, u(50))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "positive_self_approve_transfer_from",
        level: Level::Desirable,
        description: "Self-approval followed by a self transferFrom is allowed",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            ctx.mint(owner, u(100))?;
            ctx.approve_valid(owner, owner, u(100))?;
            ctx.transfer_from_succeeds(owner, owner, owner, u(100))?;
            ctx.balances_match()?;
            if ctx.allowances_match().is_err() {
                ctx.warn(
                    WarningKind::SelfSpendKeepsAllowance,
                    "self transferFrom to self did not spend the self-allowance",
                );
            }
            Ok(())
        },
    },
    Scenario {
        name: "self_transfer_keeps_balance",
        level: Level::Desirable,
        description: "Self-transfers of zero or the full balance leave the balance unchanged",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            ctx.transfer_succeeds(owner, owner, U256::ZERO)?;
            ctx.mint(owner, u(100))?;
            ctx.transfer_succeeds(owner, owner, u(100))?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "positive_total_transfer_to_other",
        level: Level::Desirable,
        description: "The whole balance can be sent, directly or through an approval",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(100))?;
            ctx.transfer_succeeds(owner, receiver, u(100))?;
            ctx.mint(owner, u(100))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, u(100))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "positive_transfer_to_null_reverts",
        level: Level::Desirable,
        description: "A positive transfer to the null account reverts",
        expectation: Expectation::XFail(NULL_RECEIVER_ALLOWED),
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            ctx.mint(owner, u(100))?;
            for amount in [u(1), u(100), U256::MAX] {
                ctx.transfer_reverts(owner, Address::ZERO, amount)?;
            }
            ctx.balances_match()
        },
    },
    Scenario {
        name: "positive_transfer_from_to_null_reverts",
        level: Level::Desirable,
        description: "A positive transferFrom to the null account reverts",
        expectation: Expectation::XFail(NULL_RECEIVER_ALLOWED),
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            ctx.mint(owner, u(100))?;
            ctx.transfer_from_reverts(owner, spender, Address::ZERO, u(100))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_reverts(owner, spender, Address::ZERO, u(100))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "zero_transfer_to_null_reverts",
        level: Level::Desirable,
        description: "A zero transfer to the null account reverts",
        expectation: Expectation::XFail(NULL_RECEIVER_ALLOWED),
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            ctx.transfer_reverts(owner, Address::ZERO, U256::ZERO)?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "total_supply_constant_after_transfers",
        level: Level::Desirable,
        description: "transfer and transferFrom leave totalSupply unchanged",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(200))?;
            ctx.transfer_succeeds(owner, receiver, u(100))?;
            ctx.total_supply_matches()?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, u(100))?;
            ctx.total_supply_matches()
        },
    },
    Scenario {
        name: "transfers_do_not_touch_bystanders",
        level: Level::Desirable,
        description: "Only sender and receiver balances change",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            let (receiver, other) = (ctx.account(2), ctx.account(3));
            ctx.mint(owner, u(200))?;
            ctx.mint(other, u(100))?;
            ctx.transfer_succeeds(owner, receiver, u(100))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, u(100))?;
            ctx.balances_match()
        },
    },
    Scenario {
        name: "transfer_from_decreases_allowance",
        level: Level::Desirable,
        description: "transferFrom decreases the allowance by exactly the amount",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(100))?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, u(100))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "zero_multiple_transfer_from",
        level: Level::Desirable,
        description: "Repeated zero transferFroms succeed with or without approval",
        expectation: Expectation::Pass,
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
            ctx.transfer_from_succeeds(owner, spender, receiver, U256::ZERO)?;
            ctx.transfer_from_succeeds(owner, spender, receiver, U256::ZERO)?;
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.transfer_from_succeeds(owner, spender, receiver, U256::ZERO)?;
            ctx.transfer_from_succeeds(owner, spender, receiver, U256::ZERO)?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    // Fingerprint
    Scenario {
        name: "can_approve_more_than_balance",
        level: Level::Fingerprint,
        description: "Approvals above the owner's balance are accepted",
        expectation: Expectation::XFail(NOT_STANDARD),
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            ctx.approve_valid(owner, spender, u(100))?;
            ctx.mint(owner, u(100))?;
            ctx.approve_valid(owner, spender, u(200))?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "infinite_approval_constant",
        level: Level::Fingerprint,
        description: "A MAX allowance is not decreased by transferFrom",
        expectation: Expectation::XFail(NOT_STANDARD),
        static_max_allowance: Some(true),
        run: infinite_approval,
    },
    Scenario {
        name: "infinite_approval_not_constant",
        level: Level::Fingerprint,
        description: "A MAX allowance is decreased by transferFrom like any other",
        expectation: Expectation::XFail(NOT_STANDARD),
        static_max_allowance: Some(false),
        run: infinite_approval,
    },
    Scenario {
        name: "maintains_balance_above_approvals",
        level: Level::Fingerprint,
        description: "transfer is refused when it would leave less than the total approved",
        expectation: Expectation::XFail(NOT_STANDARD),
        static_max_allowance: None,
        run: |ctx| {
            let owner = ctx.account(0);
            let (first, second) = (ctx.account(1), ctx.account(2));
            ctx.mint(owner, u(350))?;
            ctx.approve_valid(owner, first, u(100))?;
            ctx.approve_valid(owner, second, u(200))?;
            ctx.transfer_reverts(owner, first, u(100))?;
            ctx.balances_match()?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "overwrite_approve_positive_to_positive",
        level: Level::Fingerprint,
        description: "A positive allowance can be overwritten with another positive one",
        expectation: Expectation::XFail(NOT_STANDARD),
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            ctx.approve_valid(owner, spender, U256::MAX)?;
            ctx.approve_valid(owner, spender, u(10))?;
            ctx.approve_valid(owner, spender, u(1))?;
            ctx.allowances_match()
        },
    },
    Scenario {
        name: "reverts_on_infinite_approval",
        level: Level::Fingerprint,
        description: "approve(MAX) is rejected",
        expectation: Expectation::XFail(NOT_STANDARD),
        static_max_allowance: None,
        run: |ctx| {
            let (owner, spender) = (ctx.account(0), ctx.account(1));
            if ctx.approve_valid(owner, spender, U256::MAX).is_ok() {
                return Err(not_held("approve(MAX) was accepted"));
            }
            Ok(())
        },
    },
    Scenario {
        name: "transfer_from_overspends_allowance",
        level: Level::Fingerprint,
        description: "transferFrom decreases the allowance by more than the amount",
        expectation: Expectation::XFail(NOT_STANDARD),
        static_max_allowance: None,
        run: |ctx| {
            let (real, expected) = spend_and_compare(ctx)?;
            if real < u(200) && real < expected {
                Ok(())
            } else {
                Err(not_held(format!("allowance is {real}, model expects {expected}")))
            }
        },
    },
    Scenario {
        name: "transfer_from_underspends_allowance",
        level: Level::Fingerprint,
        description: "transferFrom decreases the allowance by less than the amount",
        expectation: Expectation::XFail(NOT_STANDARD),
        static_max_allowance: None,
        run: |ctx| {
            let (real, expected) = spend_and_compare(ctx)?;
            if u(200) > real && real > expected {
                Ok(())
            } else {
                Err(not_held(format!("allowance is {real}, model expects {expected}")))
            }
        },
    },
];

fn infinite_approval(ctx: &mut ScenarioContext<'_>) -> Result<(), OracleError> {
    let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
    ctx.mint(owner, u(200))?;
    ctx.approve_valid(owner, spender, U256::MAX)?;
    ctx.transfer_from_succeeds(owner, spender, receiver, u(100))?;
    ctx.balances_match()?;
    ctx.allowances_match()
}

/// Approve 200, spend 100, return (real allowance, model allowance).
fn spend_and_compare(ctx: &mut ScenarioContext<'_>) -> Result<(U256, U256), OracleError> {
    let (owner, spender, receiver) = (ctx.account(0), ctx.account(1), ctx.account(2));
    ctx.mint(owner, u(300))?;
    ctx.approve_valid(owner, spender, u(200))?;
    ctx.transfer_from_succeeds(owner, spender, receiver, u(100))?;
    let oracle = ctx.oracle();
    let real = oracle.allowance(owner, spender)?;
    let expected = oracle.model().allowance(owner, spender);
    Ok((real, expected))
}
